//! 计数配置 - 命令行参数 + JSON配置文件
//!
//! `PipelineConfig` is the value object handed to the driver. It can come
//! from a JSON file; command line flags override individual fields.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::counting::VehicleClassSet;
use crate::detection::{NmsMode, RowLayout};
use crate::error::{PipelineError, PipelineResult};
use crate::zone::Polygon;

pub const DEFAULT_CONF_THRESHOLD: f32 = 0.5;
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.4;
pub const DEFAULT_FPS: f64 = 25.0;
pub const DEFAULT_NAMES: &str = "coco.names";

/// 视频车辆计数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Count vehicles inside a polygonal zone, frame by frame", long_about = None)]
pub struct Args {
    /// Input: a directory of frames, or a video file (needs the `ffmpeg` feature)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output: a directory for annotated frames, or a video file (`ffmpeg` feature)
    #[arg(short, long, default_value = "output.mp4")]
    pub output: PathBuf,

    /// Detector: `.onnx` model (`onnx` feature) or `.jsonl` tensor replay file
    #[arg(short, long)]
    pub model: PathBuf,

    /// Newline-delimited class names
    #[arg(long, default_value = DEFAULT_NAMES)]
    pub names: PathBuf,

    /// JSON pipeline config; flags below override its fields
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Confidence threshold
    #[arg(long)]
    pub conf_thres: Option<f32>,

    /// NMS IoU threshold
    #[arg(long)]
    pub nms_thres: Option<f32>,

    /// NMS mode: pooled | per-class
    #[arg(long)]
    pub nms_mode: Option<NmsMode>,

    /// Tensor row layout: plain | darknet
    #[arg(long)]
    pub layout: Option<RowLayout>,

    /// Zone polygon as 'x1,y1 x2,y2 x3,y3 ...'
    #[arg(long)]
    pub polygon: Option<String>,

    /// Counted classes, comma separated
    #[arg(long, value_delimiter = ',')]
    pub vehicle_classes: Option<Vec<String>>,

    /// Also draw detections of non-vehicle classes
    #[arg(long)]
    pub draw_all: bool,

    /// TTF/OTF font for labels and counts; without it only shapes are drawn
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Frame rate for image-sequence input
    #[arg(long)]
    pub fps: Option<f64>,

    /// Worker threads; 1 runs the sequential pipeline
    #[arg(short, long, default_value_t = 1)]
    pub workers: usize,

    /// Per-frame counts as JSON Lines
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Write the resolved pipeline config (file + flags) to this path
    #[arg(long)]
    pub save_config: Option<PathBuf>,

    /// Network input size for ONNX models
    #[arg(long, default_value_t = 416)]
    pub input_size: u32,
}

impl Args {
    /// Resolve the pipeline config: file (if any), then flag overrides.
    pub fn pipeline_config(&self) -> PipelineResult<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(v) = self.conf_thres {
            config.conf_threshold = v;
        }
        if let Some(v) = self.nms_thres {
            config.nms_threshold = v;
        }
        if let Some(v) = self.nms_mode {
            config.nms_mode = v;
        }
        if let Some(v) = self.layout {
            config.row_layout = v;
        }
        if let Some(s) = &self.polygon {
            let polygon = Polygon::parse(s).map_err(PipelineError::invalid_config)?;
            config.zone = if polygon.vertices().is_empty() {
                None
            } else {
                Some(polygon)
            };
        }
        if let Some(classes) = &self.vehicle_classes {
            config.vehicle_classes = VehicleClassSet::new(classes.iter().map(|c| c.trim()));
        }
        if self.draw_all {
            config.draw_all_classes = true;
        }

        config.validate()?;
        Ok(config)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Filtering strictness
    pub conf_threshold: f32,
    /// Suppression strictness (IoU above this is suppressed)
    pub nms_threshold: f32,
    pub nms_mode: NmsMode,
    pub row_layout: RowLayout,
    /// Counting zone; absent means the whole frame
    pub zone: Option<Polygon>,
    pub vehicle_classes: VehicleClassSet,
    pub draw_all_classes: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            conf_threshold: DEFAULT_CONF_THRESHOLD,
            nms_threshold: DEFAULT_NMS_THRESHOLD,
            nms_mode: NmsMode::Pooled,
            row_layout: RowLayout::Plain,
            zone: None,
            vehicle_classes: VehicleClassSet::default(),
            draw_all_classes: false,
        }
    }
}

impl PipelineConfig {
    /// 从JSON文件加载配置
    pub fn load<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            PipelineError::invalid_config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| {
            PipelineError::invalid_config(format!("cannot parse {}: {e}", path.display()))
        })?;
        log::info!("pipeline config loaded from {}", path.display());
        Ok(config)
    }

    /// 保存配置到JSON文件
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        log::info!("pipeline config saved to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> PipelineResult<()> {
        for (name, value) in [
            ("conf_threshold", self.conf_threshold),
            ("nms_threshold", self.nms_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PipelineError::invalid_config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.vehicle_classes.is_empty() {
            return Err(PipelineError::invalid_config(
                "vehicle_classes must name at least one class",
            ));
        }
        Ok(())
    }

    /// 打印当前配置
    pub fn log_summary(&self) {
        log::info!(
            "conf {:.2} | nms {:.2} ({:?}) | layout {:?} | zone {} | classes {}",
            self.conf_threshold,
            self.nms_threshold,
            self.nms_mode,
            self.row_layout,
            match &self.zone {
                Some(z) => format!("{} vertices", z.vertices().len()),
                None => "whole frame".to_string(),
            },
            self.vehicle_classes.names().join(",")
        );
    }
}
