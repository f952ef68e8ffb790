// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 张量回放 (Tensor replay)
//!
//! One JSON Lines record per frame: a list of tensors, each a list of rows.
//!
//! ```text
//! [[[0.5, 0.5, 0.2, 0.2, 0.9, 0.05]]]
//! []
//! ```
//!
//! A blank line is a frame without output. Frames past the end of the file
//! also produce no output.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use image::RgbImage;
use ndarray::Array2;

use super::Model;
use crate::detection::RawTensor;

#[derive(Debug, Clone)]
pub struct ReplayModel {
    frames: Arc<Vec<Vec<RawTensor>>>,
    cursor: u64,
    source: String,
}

impl ReplayModel {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read tensor replay {}", path.display()))?;
        let frames = Self::parse(&text)
            .with_context(|| format!("failed to parse tensor replay {}", path.display()))?;
        log::debug!("replay {}: {} frames", path.display(), frames.len());
        Ok(Self {
            frames: Arc::new(frames),
            cursor: 0,
            source: path.display().to_string(),
        })
    }

    pub fn from_frames(frames: Vec<Vec<RawTensor>>) -> Self {
        Self {
            frames: Arc::new(frames),
            cursor: 0,
            source: "<memory>".to_string(),
        }
    }

    fn parse(text: &str) -> Result<Vec<Vec<RawTensor>>> {
        let mut frames = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                frames.push(Vec::new());
                continue;
            }
            let tensors: Vec<Vec<Vec<f32>>> = serde_json::from_str(line)
                .with_context(|| format!("line {}", lineno + 1))?;
            let tensors = tensors
                .into_iter()
                .map(to_tensor)
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("line {}", lineno + 1))?;
            frames.push(tensors);
        }
        Ok(frames)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn tensors_at(&self, frame_index: u64) -> Vec<RawTensor> {
        usize::try_from(frame_index)
            .ok()
            .and_then(|i| self.frames.get(i))
            .cloned()
            .unwrap_or_default()
    }
}

/// Short rows are padded with NaN to the widest row; the decoder skips them
/// as malformed.
fn to_tensor(rows: Vec<Vec<f32>>) -> Result<RawTensor> {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let height = rows.len();
    let mut flat = Vec::with_capacity(height * width);
    for mut row in rows {
        row.resize(width, f32::NAN);
        flat.extend(row);
    }
    Ok(Array2::from_shape_vec((height, width), flat)?)
}

impl Model for ReplayModel {
    fn infer(&mut self, _frame: &RgbImage) -> Result<Vec<RawTensor>> {
        let tensors = self.tensors_at(self.cursor);
        self.cursor += 1;
        Ok(tensors)
    }

    fn infer_frame(&mut self, frame_index: u64, _frame: &RgbImage) -> Result<Vec<RawTensor>> {
        self.cursor = frame_index + 1;
        Ok(self.tensors_at(frame_index))
    }

    fn summary(&self) -> String {
        format!("tensor replay {} ({} frames)", self.source, self.frames.len())
    }
}
