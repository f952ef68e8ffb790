//! 非极大值抑制 (Non-maximum suppression)

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::types::Detection;

/// Which candidates compete with each other during suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NmsMode {
    /// Every candidate competes with every other, whatever its class.
    #[default]
    Pooled,
    /// Candidates only suppress candidates of the same class.
    PerClass,
}

impl std::str::FromStr for NmsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pooled" => Ok(NmsMode::Pooled),
            "per-class" | "per_class" | "class" => Ok(NmsMode::PerClass),
            other => Err(format!("unknown nms mode '{other}' (expected pooled or per-class)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Suppressor {
    iou_threshold: f32,
    mode: NmsMode,
}

impl Suppressor {
    pub fn new(iou_threshold: f32, mode: NmsMode) -> Self {
        Self {
            iou_threshold,
            mode,
        }
    }

    pub fn iou_threshold(&self) -> f32 {
        self.iou_threshold
    }

    /// Kept detections, highest confidence first.
    pub fn suppress(&self, candidates: Vec<Detection>) -> Vec<Detection> {
        match self.mode {
            NmsMode::Pooled => {
                let mut xs = candidates;
                non_max_suppression(&mut xs, self.iou_threshold, |_, _| true);
                xs
            }
            NmsMode::PerClass => {
                let mut xs = candidates;
                non_max_suppression(&mut xs, self.iou_threshold, |a, b| {
                    a.class_id == b.class_id
                });
                xs
            }
        }
    }
}

/// Greedy NMS in place. `competes` decides whether a kept box may suppress
/// a later one at all.
///
/// The sort is stable so equal confidences keep their encounter order.
pub fn non_max_suppression<F>(xs: &mut Vec<Detection>, iou_threshold: f32, competes: F)
where
    F: Fn(&Detection, &Detection) -> bool,
{
    xs.sort_by(|b1, b2| {
        b2.confidence
            .partial_cmp(&b1.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if !competes(&xs[prev_index], &xs[index]) {
                continue;
            }
            if xs[prev_index].iou(&xs[index]) > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            // kept boxes stay packed at the front in sorted order
            xs[current_index] = xs[index];
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}
