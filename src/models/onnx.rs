// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// ONNX Runtime 推理后端
// 包含: 模型加载、预处理、推理、输出整形

use std::path::Path;

use anyhow::{Context, Result};
use image::{imageops::FilterType, RgbImage};
use ndarray::{s, Array2};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;

use super::Model;
use crate::detection::RawTensor;

/// Square-input detector, e.g. YOLOv3 exported at 416x416.
///
/// Boxes are expected normalised to `[0, 1]`; the row layout (plain or
/// darknet objectness) is chosen in the pipeline config.
pub struct OnnxModel {
    session: Session,
    input_size: u32,
    source: String,
}

impl OnnxModel {
    pub fn new(path: &Path, input_size: u32) -> Result<Self> {
        let session = Session::builder()
            .context("failed to create ORT session builder")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("failed to set ORT optimization level")?
            .with_intra_threads(1)
            .context("failed to set ORT intra threads")?
            .commit_from_file(path)
            .with_context(|| format!("failed to load ONNX model {}", path.display()))?;
        log::info!("onnx model {} loaded, input {input_size}x{input_size}", path.display());
        Ok(Self {
            session,
            input_size,
            source: path.display().to_string(),
        })
    }

    /// 预处理: RGB 图片 → NCHW [1, 3, S, S], 像素 / 255
    fn preprocess(&self, frame: &RgbImage) -> Result<Tensor<f32>> {
        let size = self.input_size;
        let resized = image::imageops::resize(frame, size, size, FilterType::Triangle);

        let plane = (size * size) as usize;
        let mut data = vec![0f32; 3 * plane];
        for (x, y, px) in resized.enumerate_pixels() {
            let i = (y * size + x) as usize;
            let [r, g, b] = px.0;
            data[i] = r as f32 / 255.0;
            data[plane + i] = g as f32 / 255.0;
            data[2 * plane + i] = b as f32 / 255.0;
        }

        let shape = [1usize, 3, size as usize, size as usize];
        Tensor::from_array((shape, data.into_boxed_slice()))
            .context("failed to create input tensor")
    }
}

/// Collapse an output to `rows x values`. `[1, C, N]` heads with fewer
/// channels than anchors (YOLOv8 style) are transposed to one row per anchor,
/// and their boxes, given in input pixels, are scaled to `[0, 1]`.
fn to_rows(shape: &[i64], data: &[f32], input_size: u32) -> Result<RawTensor> {
    let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
    let cols = dims.last().copied().unwrap_or(0);
    let rows = if cols == 0 { 0 } else { data.len() / cols };

    if let [1, c, n] = dims[..] {
        if c < n {
            let mut t = Array2::from_shape_vec((c, n), data.to_vec())?
                .reversed_axes()
                .as_standard_layout()
                .into_owned();
            let boxes = c.min(4);
            t.slice_mut(s![.., ..boxes])
                .mapv_inplace(|v| v / input_size as f32);
            return Ok(t);
        }
    }
    Ok(Array2::from_shape_vec((rows, cols), data.to_vec())?)
}

impl Model for OnnxModel {
    fn infer(&mut self, frame: &RgbImage) -> Result<Vec<RawTensor>> {
        let input = self.preprocess(frame)?;
        let outputs = self
            .session
            .run(ort::inputs![input])
            .context("onnx inference failed")?;

        let mut tensors = Vec::with_capacity(outputs.len());
        for (name, value) in outputs.iter() {
            let (shape, data) = value
                .try_extract_tensor::<f32>()
                .with_context(|| format!("output {name} is not an f32 tensor"))?;
            tensors.push(to_rows(shape, data, self.input_size)?);
        }
        Ok(tensors)
    }

    fn summary(&self) -> String {
        format!(
            "onnx model {} ({}x{})",
            self.source, self.input_size, self.input_size
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_detection_rows() {
        let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let t = to_rows(&[1, 2, 6], &data, 416).unwrap();
        assert_eq!(t.shape(), &[2, 6]);
        assert_eq!(t[[1, 0]], 6.0);
    }

    #[test]
    fn channel_major_head_is_transposed_and_normalised() {
        // 5 channels x 8 anchors, input 16x16
        let data: Vec<f32> = (0..40).map(|v| v as f32).collect();
        let t = to_rows(&[1, 5, 8], &data, 16).unwrap();
        assert_eq!(t.shape(), &[8, 5]);
        assert_eq!(t[[0, 1]], 0.5);
        assert_eq!(t[[3, 3]], 27.0 / 16.0);
        // scores untouched
        assert_eq!(t[[3, 4]], 35.0);
    }
}
