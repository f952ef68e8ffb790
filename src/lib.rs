#![allow(clippy::type_complexity)]
// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 命令行 + 流水线配置
pub mod counting; // 逐帧车辆计数
pub mod detection; // 张量解码 + NMS + 类别表
pub mod error; // 错误类型
pub mod input; // 视频输入系统
pub mod models; // 推理后端接口与实现
pub mod output; // 标注帧输出
pub mod pipeline; // 流水线驱动
pub mod renderer; // 叠加层绘制
pub mod zone; // 计数区域

pub use crate::config::{Args, PipelineConfig};
pub use crate::counting::{FrameCountResult, FrameCounter, VehicleClassSet};
pub use crate::detection::{
    non_max_suppression, BoxDecoder, ClassRegistry, Detection, NmsMode, RawTensor, Rect,
    RowLayout, Suppressor,
};
pub use crate::error::{PipelineError, PipelineResult};
pub use crate::input::FrameSource;
pub use crate::models::Model;
pub use crate::output::FrameSink;
pub use crate::pipeline::{
    FrameAnalysis, PipelineDriver, PipelineState, RunSummary, StopSignal,
};
pub use crate::renderer::OverlayRenderer;
pub use crate::zone::{Polygon, ZoneFilter};
