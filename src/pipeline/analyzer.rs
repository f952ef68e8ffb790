use crate::config::PipelineConfig;
use crate::counting::{FrameCountResult, FrameCounter};
use crate::detection::{BoxDecoder, ClassRegistry, DecodeStats, Detection, RawTensor, Suppressor};
use crate::renderer::BoxLabel;
use crate::zone::ZoneFilter;

/// Everything one frame produced, from raw tensors to counts.
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    pub frame_index: u64,
    pub decode: DecodeStats,
    /// Kept after suppression, highest confidence first.
    pub detections: Vec<Detection>,
    /// Vehicle detections whose center lies in the zone.
    pub counted: Vec<Detection>,
    pub counts: FrameCountResult,
}

/// The Decode..Count pass. Read-only after construction; parallel workers
/// each hold a clone.
#[derive(Debug, Clone)]
pub struct FrameAnalyzer {
    registry: ClassRegistry,
    decoder: BoxDecoder,
    suppressor: Suppressor,
    zone: ZoneFilter,
    counter: FrameCounter,
    draw_all_classes: bool,
}

impl FrameAnalyzer {
    pub fn new(config: &PipelineConfig, registry: ClassRegistry) -> Self {
        Self {
            registry,
            decoder: BoxDecoder::new(config.conf_threshold, config.row_layout),
            suppressor: Suppressor::new(config.nms_threshold, config.nms_mode),
            zone: ZoneFilter::new(config.zone.clone()),
            counter: FrameCounter::new(config.vehicle_classes.clone()),
            draw_all_classes: config.draw_all_classes,
        }
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    pub fn zone(&self) -> &ZoneFilter {
        &self.zone
    }

    pub fn counter(&self) -> &FrameCounter {
        &self.counter
    }

    pub fn decode(
        &self,
        tensors: &[RawTensor],
        width: u32,
        height: u32,
    ) -> (Vec<Detection>, DecodeStats) {
        self.decoder.decode_with_stats(tensors, width, height)
    }

    pub fn suppress(&self, candidates: Vec<Detection>) -> Vec<Detection> {
        self.suppressor.suppress(candidates)
    }

    /// Vehicle detections inside the zone.
    pub fn filter(&self, detections: &[Detection]) -> Vec<Detection> {
        detections
            .iter()
            .filter(|d| self.counter.vehicle_name(d, &self.registry).is_some())
            .filter(|d| self.zone.accepts(d))
            .copied()
            .collect()
    }

    pub fn count(&self, counted: &[Detection]) -> FrameCountResult {
        self.counter.count(counted, &self.registry)
    }

    pub fn analyze(
        &self,
        frame_index: u64,
        tensors: &[RawTensor],
        width: u32,
        height: u32,
    ) -> FrameAnalysis {
        let (candidates, decode) = self.decode(tensors, width, height);
        let detections = self.suppress(candidates);
        let counted = self.filter(&detections);
        let counts = self.count(&counted);
        FrameAnalysis {
            frame_index,
            decode,
            detections,
            counted,
            counts,
        }
    }

    /// Boxes to draw: vehicle classes, or every known class when
    /// `draw_all_classes` is set. Unknown class ids are never drawn.
    pub fn labels(&self, analysis: &FrameAnalysis) -> Vec<BoxLabel> {
        analysis
            .detections
            .iter()
            .filter_map(|d| {
                let name = if self.draw_all_classes {
                    self.registry.name(d.class_id)
                } else {
                    self.counter.vehicle_name(d, &self.registry)
                }?;
                Some(BoxLabel::new(d.rect, name, d.confidence))
            })
            .collect()
    }
}
