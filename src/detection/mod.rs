/// 检测系统 (Detection System)
///
/// 单帧检测后处理, 无跨帧状态:
/// - BoxDecoder:  原始张量 → 候选框
/// - Suppressor:  非极大值抑制
/// - ClassRegistry: 类别名称表
pub mod decoder;
pub mod nms;
pub mod registry;
pub mod types;

pub use decoder::{BoxDecoder, DecodeStats, RowLayout};
pub use nms::{non_max_suppression, NmsMode, Suppressor};
pub use registry::ClassRegistry;
pub use types::{Detection, RawTensor, Rect};
