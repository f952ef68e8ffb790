//! 逐帧报告 (JSON Lines)
//!
//! ```text
//! {"frame":0,"detections":[{"box":{"x":40,"y":40,"w":20,"h":20},"class_id":2,"confidence":0.9}],"counted":1,"counts":{"car":1,"bus":0,"truck":0,"motorbike":0}}
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use super::FrameAnalysis;
use crate::counting::FrameCountResult;
use crate::detection::Detection;
use crate::error::{PipelineError, PipelineResult};

#[derive(Serialize)]
struct FrameRecord<'a> {
    frame: u64,
    detections: &'a [Detection],
    counted: usize,
    counts: &'a FrameCountResult,
}

pub struct ReportWriter {
    out: Box<dyn Write + Send>,
}

impl ReportWriter {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self { out: Box::new(out) }
    }

    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create report {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }

    pub fn write(&mut self, analysis: &FrameAnalysis) -> PipelineResult<()> {
        let record = FrameRecord {
            frame: analysis.frame_index,
            detections: &analysis.detections,
            counted: analysis.counted.len(),
            counts: &analysis.counts,
        };
        serde_json::to_writer(&mut self.out, &record)
            .map_err(|e| PipelineError::sink_unwritable(format!("report: {e}")))?;
        self.out
            .write_all(b"\n")
            .map_err(|e| PipelineError::sink_unwritable(format!("report: {e}")))
    }

    pub fn flush(&mut self) -> PipelineResult<()> {
        self.out
            .flush()
            .map_err(|e| PipelineError::sink_unwritable(format!("report: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::detection::ClassRegistry;
    use crate::pipeline::FrameAnalyzer;
    use ndarray::array;

    #[test]
    fn one_json_object_per_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.jsonl");
        let analyzer = FrameAnalyzer::new(
            &PipelineConfig::default(),
            ClassRegistry::new(["person", "bicycle", "car"]),
        );

        let mut report = ReportWriter::create(&path).unwrap();
        let tensors = vec![array![[0.5, 0.5, 0.2, 0.2, 0.0, 0.0, 0.9]]];
        report.write(&analyzer.analyze(0, &tensors, 100, 100)).unwrap();
        report.write(&analyzer.analyze(1, &[], 100, 100)).unwrap();
        report.flush().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["frame"], 0);
        assert_eq!(lines[0]["counted"], 1);
        assert_eq!(lines[0]["counts"]["car"], 1);
        assert_eq!(lines[0]["detections"][0]["box"]["x"], 40);
        assert_eq!(lines[0]["detections"][0]["class_id"], 2);
        assert_eq!(lines[1]["detections"].as_array().unwrap().len(), 0);
        assert_eq!(lines[1]["counts"]["motorbike"], 0);
    }
}
