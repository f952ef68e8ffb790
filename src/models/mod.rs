/// 推理后端统一接口 (Inference backends)
///
/// # 架构说明
///
/// 模型只负责前向传播: 图片 → 原始张量集合 (`Vec<RawTensor>`)。
/// 解码、NMS、区域过滤和计数都在 `detection` / `pipeline` 中完成,
/// 与具体后端无关。
///
/// - **ReplayModel**: 从 JSON Lines 文件回放预先导出的张量 (总是编译)
/// - **OnnxModel**: ONNX Runtime 推理 (feature `onnx`)
///
/// ## 使用示例
/// ```no_run
/// use vehicle_counter::models::load_model;
///
/// let mut model = load_model("detections.jsonl".as_ref(), 416)?;
/// let frame = image::RgbImage::new(640, 480);
/// let tensors = model.infer(&frame)?;
/// # Ok::<(), anyhow::Error>(())
/// ```
use std::path::Path;

use anyhow::{bail, Result};
use image::RgbImage;

use crate::detection::RawTensor;

#[cfg(feature = "onnx")]
pub mod onnx;
pub mod replay;

#[cfg(feature = "onnx")]
pub use onnx::OnnxModel;
pub use replay::ReplayModel;

/// 模型类型枚举 (根据文件扩展名识别)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// `.onnx` 网络
    Onnx,
    /// `.jsonl` / `.json` 张量回放
    Replay,
}

impl ModelKind {
    /// 从模型路径推断模型类型
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "onnx" => Some(ModelKind::Onnx),
            "jsonl" | "json" => Some(ModelKind::Replay),
            _ => None,
        }
    }
}

/// 统一的推理接口
///
/// ```text
/// RgbImage → infer → Vec<RawTensor> (每行: cx, cy, w, h, scores...)
/// ```
///
/// 一个实例同一时间只被一个线程使用; 并行模式下每个 worker 持有自己的实例。
pub trait Model: Send {
    /// 前向传播
    fn infer(&mut self, frame: &RgbImage) -> Result<Vec<RawTensor>>;

    /// 带帧序号的前向传播. Backends whose output depends on the frame's
    /// position in the stream override this; the rest ignore the index.
    fn infer_frame(&mut self, frame_index: u64, frame: &RgbImage) -> Result<Vec<RawTensor>> {
        let _ = frame_index;
        self.infer(frame)
    }

    /// 打印模型信息
    fn summary(&self) -> String;
}

/// Open a model by extension. `input_size` is the square network input of
/// ONNX models and is ignored by replays.
pub fn load_model(path: &Path, input_size: u32) -> Result<Box<dyn Model>> {
    match ModelKind::from_path(path) {
        Some(ModelKind::Replay) => Ok(Box::new(ReplayModel::load(path)?)),
        #[cfg(feature = "onnx")]
        Some(ModelKind::Onnx) => Ok(Box::new(OnnxModel::new(path, input_size)?)),
        #[cfg(not(feature = "onnx"))]
        Some(ModelKind::Onnx) => {
            let _ = input_size;
            bail!(
                "{} is an ONNX model; rebuild with `--features onnx`",
                path.display()
            )
        }
        None => bail!(
            "unrecognised model file {} (expected .onnx or .jsonl)",
            path.display()
        ),
    }
}

/// `count` independent instances of the same model, one per worker.
pub fn load_models(path: &Path, input_size: u32, count: usize) -> Result<Vec<Box<dyn Model>>> {
    if let Some(ModelKind::Replay) = ModelKind::from_path(path) {
        // replays share one parsed file
        let replay = ReplayModel::load(path)?;
        return Ok((0..count.max(1))
            .map(|_| Box::new(replay.clone()) as Box<dyn Model>)
            .collect());
    }
    (0..count.max(1))
        .map(|_| load_model(path, input_size))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_extension() {
        assert_eq!(
            ModelKind::from_path(Path::new("yolov3.onnx")),
            Some(ModelKind::Onnx)
        );
        assert_eq!(
            ModelKind::from_path(Path::new("runs/day1.JSONL")),
            Some(ModelKind::Replay)
        );
        assert_eq!(ModelKind::from_path(Path::new("yolov3.weights")), None);
        assert_eq!(ModelKind::from_path(Path::new("model")), None);
    }

    #[test]
    fn unknown_extension_is_an_error() {
        let err = load_model(Path::new("yolov3.weights"), 416).err().unwrap();
        assert!(err.to_string().contains("yolov3.weights"));
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn onnx_without_feature_explains_how_to_enable_it() {
        let err = load_model(Path::new("yolov3.onnx"), 416).err().unwrap();
        assert!(err.to_string().contains("--features onnx"));
    }
}
