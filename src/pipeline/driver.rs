/// 流水线驱动 (Pipeline driver)
/// 职责: 读帧 → 推理 → 分析 → 绘制 → 写出, 维护状态机
///
/// 并行模式: 主线程读帧并投递给 worker (每个 worker 持有自己的模型),
/// 结果经 ReorderBuffer 按帧序号恢复顺序后, 仍由主线程绘制并写出。
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Instant;

use crossbeam_channel::{bounded, unbounded};
use image::RgbImage;

use super::{
    FrameAnalysis, FrameAnalyzer, PipelineState, ReorderBuffer, ReportWriter, RunSummary,
    StopSignal,
};
use crate::config::PipelineConfig;
use crate::counting::FrameCountResult;
use crate::detection::{ClassRegistry, RawTensor};
use crate::error::{PipelineError, PipelineResult};
use crate::input::FrameSource;
use crate::models::Model;
use crate::output::FrameSink;
use crate::renderer::OverlayRenderer;

const PROGRESS_EVERY: u64 = 100;

/// An analysed frame, or the index of the frame whose worker panicked.
type WorkerResult = Result<(RgbImage, FrameAnalysis), u64>;

pub struct PipelineDriver {
    analyzer: FrameAnalyzer,
    renderer: OverlayRenderer,
    report: Option<ReportWriter>,
    state: PipelineState,
    frame_index: u64,
    frame_size: Option<(u32, u32)>,
    totals: FrameCountResult,
    started: Instant,
}

/// Frames still owned by the driver after reading: queued, in a worker, or
/// waiting in the reorder buffer.
struct InFlight {
    count: usize,
    capacity: usize,
}

impl PipelineDriver {
    pub fn new(config: PipelineConfig, registry: ClassRegistry) -> Self {
        let analyzer = FrameAnalyzer::new(&config, registry);
        let totals = FrameCountResult::zeroed(analyzer.counter().classes());
        Self {
            analyzer,
            renderer: OverlayRenderer::default(),
            report: None,
            state: PipelineState::Idle,
            frame_index: 0,
            frame_size: None,
            totals,
            started: Instant::now(),
        }
    }

    pub fn with_renderer(mut self, renderer: OverlayRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_report(mut self, report: ReportWriter) -> Self {
        self.report = Some(report);
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Index of the next frame to be read; equals the frames processed so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn analyzer(&self) -> &FrameAnalyzer {
        &self.analyzer
    }

    /// Decode..Count for one frame, without touching the run state.
    pub fn analyze(
        &self,
        frame_index: u64,
        tensors: &[RawTensor],
        width: u32,
        height: u32,
    ) -> FrameAnalysis {
        self.analyzer.analyze(frame_index, tensors, width, height)
    }

    /// Sequential loop: each frame is written before the next is read.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        model: &mut dyn Model,
        sink: &mut dyn FrameSink,
        stop: &StopSignal,
    ) -> PipelineResult<RunSummary> {
        self.begin()?;
        log::info!("sequential run, model: {}", model.summary());

        let mut stopped_early = false;
        loop {
            if stop.is_raised() {
                stopped_early = true;
                break;
            }
            let Some(frame) = self.read(source)? else {
                break;
            };

            let index = self.frame_index;
            let tensors = infer_or_degrade(model, index, &frame);
            let (width, height) = frame.dimensions();

            self.transition(PipelineState::Decoding);
            let (candidates, decode) = self.analyzer.decode(&tensors, width, height);
            self.transition(PipelineState::Suppressing);
            let detections = self.analyzer.suppress(candidates);
            self.transition(PipelineState::Filtering);
            let counted = self.analyzer.filter(&detections);
            self.transition(PipelineState::Counting);
            let counts = self.analyzer.count(&counted);

            let analysis = FrameAnalysis {
                frame_index: index,
                decode,
                detections,
                counted,
                counts,
            };
            self.emit(frame, &analysis, sink)?;
        }

        self.finish(sink, stopped_early)
    }

    /// Worker pool, one model per worker. Output order equals input order.
    /// A single model falls back to [`run`](Self::run).
    pub fn run_parallel(
        &mut self,
        source: &mut dyn FrameSource,
        mut models: Vec<Box<dyn Model>>,
        sink: &mut dyn FrameSink,
        stop: &StopSignal,
    ) -> PipelineResult<RunSummary> {
        match models.len() {
            0 => {
                return Err(PipelineError::invalid_config(
                    "parallel run needs at least one model",
                ))
            }
            1 => {
                let mut model = models.remove(0);
                return self.run(source, model.as_mut(), sink, stop);
            }
            _ => {}
        }

        self.begin()?;
        let workers = models.len();
        log::info!(
            "parallel run: {workers} workers, model: {}",
            models[0].summary()
        );

        let mut in_flight = InFlight {
            count: 0,
            capacity: 2 * workers,
        };
        let mut stopped_early = false;
        let mut reorder = ReorderBuffer::new(self.frame_index);

        let outcome = thread::scope(|scope| -> PipelineResult<()> {
            let (job_tx, job_rx) = bounded::<(u64, RgbImage)>(in_flight.capacity);
            let (done_tx, done_rx) = unbounded::<WorkerResult>();

            for (worker, mut model) in models.into_iter().enumerate() {
                let job_rx = job_rx.clone();
                let done_tx = done_tx.clone();
                let analyzer = self.analyzer.clone();
                scope.spawn(move || {
                    for (index, frame) in job_rx.iter() {
                        let analysis = panic::catch_unwind(AssertUnwindSafe(|| {
                            let tensors = infer_or_degrade(model.as_mut(), index, &frame);
                            let (width, height) = frame.dimensions();
                            analyzer.analyze(index, &tensors, width, height)
                        }));
                        let done = match analysis {
                            Ok(analysis) => Ok((frame, analysis)),
                            Err(_) => Err(index),
                        };
                        let failed = done.is_err();
                        if done_tx.send(done).is_err() || failed {
                            break;
                        }
                    }
                    log::debug!("worker {worker} exiting");
                });
            }
            drop(job_rx);
            drop(done_tx);

            let mut job_tx = Some(job_tx);
            let mut next_read = self.frame_index;
            loop {
                // read ahead until the in-flight window is full
                while let Some(tx) = &job_tx {
                    if in_flight.count >= in_flight.capacity {
                        break;
                    }
                    if stop.is_raised() {
                        stopped_early = true;
                        job_tx = None;
                        break;
                    }
                    match self.read(source)? {
                        Some(frame) => {
                            if tx.send((next_read, frame)).is_err() {
                                return Err(self.abort(PipelineError::source_unreadable(
                                    "all workers exited",
                                )));
                            }
                            next_read += 1;
                            in_flight.count += 1;
                        }
                        None => job_tx = None,
                    }
                }

                if in_flight.count == 0 {
                    return Ok(());
                }

                let (frame, analysis) = match done_rx.recv() {
                    Ok(Ok(done)) => done,
                    Ok(Err(frame)) => {
                        return Err(self.abort(PipelineError::WorkerPanicked { frame }))
                    }
                    Err(_) => {
                        return Err(self.abort(PipelineError::source_unreadable(
                            "workers exited with frames outstanding",
                        )))
                    }
                };
                reorder.push(analysis.frame_index, (frame, analysis));
                while let Some((frame, analysis)) = reorder.pop_ready() {
                    in_flight.count -= 1;
                    self.emit(frame, &analysis, sink)?;
                }
            }
        });

        outcome?;
        self.finish(sink, stopped_early)
    }

    fn begin(&mut self) -> PipelineResult<()> {
        if self.state != PipelineState::Idle {
            return Err(PipelineError::invalid_config(format!(
                "driver already used (state {:?})",
                self.state
            )));
        }
        self.started = Instant::now();
        self.transition(PipelineState::Running);
        Ok(())
    }

    /// Next frame; every frame must match the first frame's size.
    fn read(&mut self, source: &mut dyn FrameSource) -> PipelineResult<Option<RgbImage>> {
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(None),
            Err(e) => return Err(self.abort(e)),
        };

        let size = frame.dimensions();
        match self.frame_size {
            None => {
                log::info!("frame size {}x{}", size.0, size.1);
                self.frame_size = Some(size);
            }
            Some(expected) if expected != size => {
                return Err(self.abort(PipelineError::source_unreadable(format!(
                    "frame {} is {}x{}, expected {}x{}",
                    self.frame_index, size.0, size.1, expected.0, expected.1
                ))));
            }
            Some(_) => {}
        }
        Ok(Some(frame))
    }

    /// Render, write and record one analysed frame.
    fn emit(
        &mut self,
        mut frame: RgbImage,
        analysis: &FrameAnalysis,
        sink: &mut dyn FrameSink,
    ) -> PipelineResult<()> {
        self.transition(PipelineState::Rendering);
        let labels = self.analyzer.labels(analysis);
        self.renderer.render(
            &mut frame,
            &labels,
            self.analyzer.zone().zone(),
            &analysis.counts,
        );

        if let Err(e) = sink.write(&frame) {
            return Err(self.abort(e));
        }
        if let Some(report) = &mut self.report {
            if let Err(e) = report.write(analysis) {
                return Err(self.abort(e));
            }
        }

        if analysis.decode.malformed > 0 {
            log::warn!(
                "frame {}: {} malformed detection rows skipped",
                analysis.frame_index,
                analysis.decode.malformed
            );
        }
        self.totals.accumulate(&analysis.counts);
        self.frame_index += 1;
        self.transition(PipelineState::Running);

        if self.frame_index % PROGRESS_EVERY == 0 {
            let elapsed = self.started.elapsed().as_secs_f64();
            log::info!(
                "{} frames, {:.1} fps, {} vehicles in zone this frame",
                self.frame_index,
                self.frame_index as f64 / elapsed.max(f64::EPSILON),
                analysis.counts.total()
            );
        }
        Ok(())
    }

    fn finish(
        &mut self,
        sink: &mut dyn FrameSink,
        stopped_early: bool,
    ) -> PipelineResult<RunSummary> {
        if stopped_early {
            log::info!("stop requested after {} frames", self.frame_index);
        }
        if let Err(e) = sink.finish() {
            return Err(self.abort(e));
        }
        if let Some(report) = &mut self.report {
            if let Err(e) = report.flush() {
                return Err(self.abort(e));
            }
        }
        self.transition(PipelineState::Finished);

        Ok(RunSummary {
            frames: self.frame_index,
            stopped_early,
            final_state: self.state,
            totals: self.totals.clone(),
        })
    }

    fn abort(&mut self, error: PipelineError) -> PipelineError {
        log::error!("aborting at frame {}: {error}", self.frame_index);
        self.transition(PipelineState::Aborted);
        error
    }

    fn transition(&mut self, next: PipelineState) {
        log::trace!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// A failed or panicking forward pass yields no detections; the frame is
/// still written.
fn infer_or_degrade(model: &mut dyn Model, frame_index: u64, frame: &RgbImage) -> Vec<RawTensor> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| model.infer_frame(frame_index, frame)));
    match result {
        Ok(Ok(tensors)) => tensors,
        Ok(Err(e)) => {
            log::warn!("frame {frame_index}: inference failed, no detections: {e:#}");
            Vec::new()
        }
        Err(_) => {
            log::warn!("frame {frame_index}: inference panicked, no detections");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReplayModel;
    use crate::output::ImageSequenceSink;

    struct Blank(u32);

    impl FrameSource for Blank {
        fn next_frame(&mut self) -> PipelineResult<Option<RgbImage>> {
            if self.0 == 0 {
                return Ok(None);
            }
            self.0 -= 1;
            Ok(Some(RgbImage::new(100, 100)))
        }

        fn fps(&self) -> Option<f64> {
            None
        }
    }

    #[test]
    fn sequential_run_finishes_and_totals_counts() {
        let car = ndarray::array![[0.5, 0.5, 0.2, 0.2, 0.9]];
        let mut model = ReplayModel::from_frames(vec![vec![car.clone()], vec![], vec![car]]);
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ImageSequenceSink::create(dir.path()).unwrap();

        let mut driver =
            PipelineDriver::new(PipelineConfig::default(), ClassRegistry::new(["car"]));
        assert_eq!(driver.state(), PipelineState::Idle);
        let summary = driver
            .run(&mut Blank(3), &mut model, &mut sink, &StopSignal::new())
            .unwrap();

        assert_eq!(summary.frames, 3);
        assert!(!summary.stopped_early);
        assert_eq!(summary.final_state, PipelineState::Finished);
        assert_eq!(summary.totals.get("car"), Some(2));
        assert_eq!(driver.frame_index(), 3);
        assert!(sink.is_finished());
    }

    #[test]
    fn driver_runs_once() {
        let mut driver = PipelineDriver::new(PipelineConfig::default(), ClassRegistry::new(["car"]));
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ImageSequenceSink::create(dir.path()).unwrap();
        let mut model = ReplayModel::from_frames(vec![]);
        let stop = StopSignal::new();
        driver.run(&mut Blank(1), &mut model, &mut sink, &stop).unwrap();
        let err = driver
            .run(&mut Blank(1), &mut model, &mut sink, &stop)
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig { .. }));
    }

    #[test]
    fn no_models_is_a_config_error() {
        let mut driver = PipelineDriver::new(PipelineConfig::default(), ClassRegistry::new(["car"]));
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ImageSequenceSink::create(dir.path()).unwrap();
        let err = driver
            .run_parallel(&mut Blank(1), Vec::new(), &mut sink, &StopSignal::new())
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig { .. }));
        assert_eq!(driver.state(), PipelineState::Idle);
    }
}
