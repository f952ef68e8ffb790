//! 检测框解码 (Box decoder)
//! 职责: 原始张量行 → 像素坐标检测框
//!
//! Each tensor row holds a normalized center/size box followed by class
//! scores. Rows are decoded independently; a malformed row (no finite score,
//! or a non-finite box value) is skipped and counted, it never fails the frame.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use super::types::{Detection, RawTensor, Rect};

const CXYWH_OFFSET: usize = 4;

/// Column layout of a detector output row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowLayout {
    /// `[cx, cy, w, h, score_0, score_1, ...]`
    #[default]
    Plain,
    /// `[cx, cy, w, h, objectness, score_0, ...]`, YOLOv3 / darknet heads.
    /// The objectness column is ignored.
    Darknet,
}

impl RowLayout {
    pub fn score_offset(&self) -> usize {
        match self {
            RowLayout::Plain => CXYWH_OFFSET,
            RowLayout::Darknet => CXYWH_OFFSET + 1,
        }
    }
}

impl std::str::FromStr for RowLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" => Ok(RowLayout::Plain),
            "darknet" | "yolov3" => Ok(RowLayout::Darknet),
            other => Err(format!("unknown row layout '{other}' (expected plain or darknet)")),
        }
    }
}

/// Bookkeeping for one decode pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub rows: usize,
    pub malformed: usize,
    pub below_threshold: usize,
}

#[derive(Debug, Clone)]
pub struct BoxDecoder {
    conf_threshold: f32,
    layout: RowLayout,
}

impl BoxDecoder {
    pub fn new(conf_threshold: f32, layout: RowLayout) -> Self {
        Self {
            conf_threshold,
            layout,
        }
    }

    pub fn conf_threshold(&self) -> f32 {
        self.conf_threshold
    }

    pub fn layout(&self) -> RowLayout {
        self.layout
    }

    pub fn decode(&self, tensors: &[RawTensor], width: u32, height: u32) -> Vec<Detection> {
        self.decode_with_stats(tensors, width, height).0
    }

    /// Decode every row of every tensor, in input order.
    pub fn decode_with_stats(
        &self,
        tensors: &[RawTensor],
        width: u32,
        height: u32,
    ) -> (Vec<Detection>, DecodeStats) {
        let mut stats = DecodeStats::default();
        let mut detections = Vec::new();

        for tensor in tensors {
            for row in tensor.rows() {
                stats.rows += 1;
                match self.decode_row(row, width, height) {
                    RowOutcome::Kept(det) => detections.push(det),
                    RowOutcome::BelowThreshold => stats.below_threshold += 1,
                    RowOutcome::Malformed => stats.malformed += 1,
                }
            }
        }

        (detections, stats)
    }

    fn decode_row(&self, row: ArrayView1<f32>, width: u32, height: u32) -> RowOutcome {
        let offset = self.layout.score_offset();
        if row.len() <= offset {
            return RowOutcome::Malformed;
        }

        if row.iter().take(CXYWH_OFFSET).any(|v| !v.is_finite()) {
            return RowOutcome::Malformed;
        }

        // argmax over finite scores, first maximum wins
        let scores = row.slice(ndarray::s![offset..]);
        let Some((class_id, confidence)) = scores
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, score)| score.is_finite())
            .reduce(|max, x| if x.1 > max.1 { x } else { max })
        else {
            return RowOutcome::Malformed;
        };

        if confidence <= self.conf_threshold {
            return RowOutcome::BelowThreshold;
        }

        let width = width as f64;
        let height = height as f64;
        let center_x = (row[0] as f64 * width) as i32;
        let center_y = (row[1] as f64 * height) as i32;
        let w = ((row[2] as f64 * width) as i32).max(0);
        let h = ((row[3] as f64 * height) as i32).max(0);
        let x = (center_x as f64 - w as f64 / 2.0) as i32;
        let y = (center_y as f64 - h as f64 / 2.0) as i32;

        RowOutcome::Kept(Detection::new(Rect::new(x, y, w, h), class_id, confidence))
    }
}

enum RowOutcome {
    Kept(Detection),
    BelowThreshold,
    Malformed,
}
