/// 视频处理流水线 (Video Processing Pipeline)
///
/// 每帧: 推理 → 解码 → NMS → 区域过滤 → 计数 → 绘制 → 输出
/// - FrameAnalyzer: 纯计算部分 (Decode..Count), 无跨帧状态
/// - PipelineDriver: 状态机 + 顺序/并行运行循环, 唯一的输出写入者
/// - ReorderBuffer: 并行模式下恢复帧顺序
/// - StopSignal: 协作式退出 (Ctrl+C)
pub mod analyzer;
pub mod driver;
pub mod ordering;
pub mod report;
pub mod stop;

use serde::Serialize;

use crate::counting::FrameCountResult;

pub use analyzer::{FrameAnalysis, FrameAnalyzer};
pub use driver::PipelineDriver;
pub use ordering::ReorderBuffer;
pub use report::ReportWriter;
pub use stop::StopSignal;

/// 流水线状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Running,
    Decoding,
    Suppressing,
    Filtering,
    Counting,
    Rendering,
    Finished,
    Aborted,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Finished | PipelineState::Aborted)
    }
}

/// 运行统计
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Frames written to the sink.
    pub frames: u64,
    /// The stop signal ended the run before the source was exhausted.
    pub stopped_early: bool,
    pub final_state: PipelineState,
    /// Per-class counts summed over all frames (vehicle-frames, not
    /// distinct vehicles).
    pub totals: FrameCountResult,
}
