use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::RgbImage;

use super::FrameSource;
use crate::error::{PipelineError, PipelineResult};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "tif"];

/// Frames read from the image files of a directory, in file-name order.
#[derive(Debug)]
pub struct ImageSequenceSource {
    files: Vec<PathBuf>,
    next: usize,
    fps: Option<f64>,
}

impl ImageSequenceSource {
    pub fn open(dir: &Path, fps: Option<f64>) -> Result<Self> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)
            .with_context(|| format!("failed to list frame directory {}", dir.display()))?
        {
            let path = entry?.path();
            if path.is_file() && is_image(&path) {
                files.push(path);
            }
        }
        if files.is_empty() {
            bail!("no image frames found in {}", dir.display());
        }
        files.sort();
        log::debug!("{} frames in {}", files.len(), dir.display());
        Ok(Self::from_files(files, fps))
    }

    pub fn from_files(files: Vec<PathBuf>, fps: Option<f64>) -> Self {
        Self {
            files,
            next: 0,
            fps,
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> PipelineResult<Option<RgbImage>> {
        let Some(path) = self.files.get(self.next) else {
            return Ok(None);
        };
        self.next += 1;
        let frame = image::open(path)
            .map_err(|e| {
                PipelineError::source_unreadable(format!("{}: {e}", path.display()))
            })?
            .to_rgb8();
        Ok(Some(frame))
    }

    fn fps(&self) -> Option<f64> {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_frame(dir: &Path, name: &str, shade: u8) {
        RgbImage::from_pixel(8, 6, image::Rgb([shade, 0, 0]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn reads_frames_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "frame_002.png", 20);
        write_frame(dir.path(), "frame_000.png", 0);
        write_frame(dir.path(), "frame_001.png", 10);
        fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

        let mut source = ImageSequenceSource::open(dir.path(), Some(30.0)).unwrap();
        assert_eq!(source.len(), 3);
        assert_eq!(source.fps(), Some(30.0));

        let shades: Vec<u8> = std::iter::from_fn(|| source.next_frame().unwrap())
            .map(|f| f.get_pixel(0, 0).0[0])
            .collect();
        assert_eq!(shades, vec![0, 10, 20]);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn empty_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ImageSequenceSource::open(dir.path(), None).is_err());
    }

    #[test]
    fn corrupt_frame_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "a.png", 0);
        fs::write(dir.path().join("b.png"), b"definitely not png").unwrap();

        let mut source = ImageSequenceSource::open(dir.path(), None).unwrap();
        assert!(source.next_frame().unwrap().is_some());
        let err = source.next_frame().unwrap_err();
        assert!(matches!(err, PipelineError::FrameSourceUnreadable { .. }));
        assert!(err.to_string().contains("b.png"));
    }
}
