use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 退出信号: cloned into the Ctrl+C handler, polled by the driver before
/// every read.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let stop = StopSignal::new();
        let handler = stop.clone();
        assert!(!stop.is_raised());
        std::thread::spawn(move || handler.raise()).join().unwrap();
        assert!(stop.is_raised());
    }
}
