//! 叠加层绘制 (Overlay rendering)
//!
//! Boxes with `"<class> <conf>"` labels, the zone outline and the per-class
//! count block, drawn in place on the output frame. Text needs a font; without
//! one only shapes are drawn.

use std::fs;
use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut};
use imageproc::rect::Rect as DrawRect;

use crate::counting::FrameCountResult;
use crate::detection::Rect;
use crate::zone::Polygon;

pub const BOX_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
pub const TEXT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const ZONE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

const THICKNESS: i32 = 2;
const LABEL_SCALE: f32 = 20.0;
const COUNT_SCALE: f32 = 28.0;
const LABEL_GAP: i32 = 8;
const COUNT_ORIGIN: (i32, i32) = (10, 40);
const COUNT_STEP: i32 = 30;

/// One box to draw and its caption.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxLabel {
    pub rect: Rect,
    pub text: String,
}

impl BoxLabel {
    pub fn new(rect: Rect, class_name: &str, confidence: f32) -> Self {
        Self {
            rect,
            text: format!("{class_name} {confidence:.2}"),
        }
    }
}

pub struct OverlayRenderer {
    font: Option<FontVec>,
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(None)
    }
}

impl OverlayRenderer {
    pub fn new(font: Option<FontVec>) -> Self {
        Self { font }
    }

    /// Load a TTF/OTF font for labels and counts.
    pub fn from_font_file(path: &Path) -> Result<Self> {
        let bytes =
            fs::read(path).with_context(|| format!("failed to read font {}", path.display()))?;
        let font = FontVec::try_from_vec(bytes)
            .with_context(|| format!("{} is not a usable font", path.display()))?;
        Ok(Self::new(Some(font)))
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Zone first, then boxes, then the count block on top.
    pub fn render(
        &self,
        frame: &mut RgbImage,
        boxes: &[BoxLabel],
        zone: Option<&Polygon>,
        counts: &FrameCountResult,
    ) {
        if let Some(polygon) = zone {
            draw_polygon_outline(frame, polygon);
        }
        for label in boxes {
            draw_box(frame, &label.rect);
            self.draw_text(
                frame,
                label.rect.x,
                label
                    .rect
                    .y
                    .saturating_sub(LABEL_GAP + LABEL_SCALE as i32),
                LABEL_SCALE,
                &label.text,
            );
        }
        let (x, mut y) = COUNT_ORIGIN;
        for (name, count) in counts.iter() {
            let text = format!("{}: {count}", capitalize(name));
            self.draw_text(frame, x, y - COUNT_SCALE as i32, COUNT_SCALE, &text);
            y += COUNT_STEP;
        }
    }

    /// Anchors further than one frame size off-canvas are skipped.
    fn draw_text(&self, frame: &mut RgbImage, x: i32, y: i32, scale: f32, text: &str) {
        let (width, height) = (frame.width() as i64, frame.height() as i64);
        let (ax, ay) = (x as i64, y as i64);
        if ax <= -width || ax >= width || ay <= -height || ay >= height {
            return;
        }
        if let Some(font) = &self.font {
            draw_text_mut(frame, TEXT_COLOR, x, y, PxScale::from(scale), font, text);
        }
    }
}

fn draw_box(frame: &mut RgbImage, rect: &Rect) {
    // edges outside the frame stay outside after clamping
    let margin = THICKNESS as i64 + 1;
    let clamp_x = |v: i64| v.clamp(-margin, frame.width() as i64 + margin);
    let clamp_y = |v: i64| v.clamp(-margin, frame.height() as i64 + margin);
    let left = clamp_x(rect.x as i64);
    let top = clamp_y(rect.y as i64);
    let right = clamp_x(rect.x as i64 + rect.w.max(0) as i64);
    let bottom = clamp_y(rect.y as i64 + rect.h.max(0) as i64);

    for i in 0..THICKNESS as i64 {
        let outline = DrawRect::at((left - i) as i32, (top - i) as i32).of_size(
            (right - left + 2 * i).max(1) as u32,
            (bottom - top + 2 * i).max(1) as u32,
        );
        draw_hollow_rect_mut(frame, outline, BOX_COLOR);
    }
}

fn draw_polygon_outline(frame: &mut RgbImage, polygon: &Polygon) {
    let vertices = polygon.vertices();
    if vertices.len() < 2 {
        return;
    }
    for (i, &(ax, ay)) in vertices.iter().enumerate() {
        let (bx, by) = vertices[(i + 1) % vertices.len()];
        for (dx, dy) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)] {
            draw_line_segment_mut(
                frame,
                (ax as f32 + dx, ay as f32 + dy),
                (bx as f32 + dx, by as f32 + dy),
                ZONE_COLOR,
            );
        }
    }
}

/// `"motorbike"` → `"Motorbike"`
fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counting::VehicleClassSet;

    fn blank() -> RgbImage {
        RgbImage::from_pixel(60, 60, Rgb([0, 0, 0]))
    }

    #[test]
    fn box_outline_uses_box_color() {
        let mut frame = blank();
        let label = BoxLabel::new(Rect::new(10, 10, 20, 15), "car", 0.93);
        OverlayRenderer::default().render(
            &mut frame,
            &[label],
            None,
            &FrameCountResult::zeroed(&VehicleClassSet::default()),
        );
        assert_eq!(*frame.get_pixel(10, 10), BOX_COLOR);
        assert_eq!(*frame.get_pixel(9, 9), BOX_COLOR);
        assert_eq!(*frame.get_pixel(29, 24), BOX_COLOR);
        // interior untouched
        assert_eq!(*frame.get_pixel(20, 17), Rgb([0, 0, 0]));
    }

    #[test]
    fn zone_outline_uses_zone_color() {
        let mut frame = blank();
        let zone = Polygon::new(vec![(5, 5), (50, 5), (50, 50)]);
        OverlayRenderer::default().render(
            &mut frame,
            &[],
            Some(&zone),
            &FrameCountResult::zeroed(&VehicleClassSet::default()),
        );
        assert_eq!(*frame.get_pixel(20, 5), ZONE_COLOR);
        assert_eq!(*frame.get_pixel(50, 30), ZONE_COLOR);
        assert_eq!(*frame.get_pixel(10, 40), Rgb([0, 0, 0]));
    }

    #[test]
    fn boxes_leaving_the_frame_are_clipped() {
        let mut frame = blank();
        let labels = [
            BoxLabel::new(Rect::new(-30, -30, 200, 200), "bus", 0.5),
            BoxLabel::new(Rect::new(40, 40, 0, 0), "truck", 0.5),
        ];
        OverlayRenderer::default().render(
            &mut frame,
            &labels,
            None,
            &FrameCountResult::zeroed(&VehicleClassSet::default()),
        );
        assert_eq!(*frame.get_pixel(40, 40), BOX_COLOR);
    }

    #[test]
    fn extreme_boxes_draw_without_overflow() {
        let mut frame = blank();
        let labels = [
            BoxLabel::new(Rect::new(i32::MAX, i32::MAX, i32::MAX, i32::MAX), "car", 0.9),
            BoxLabel::new(Rect::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX), "car", 0.9),
            BoxLabel::new(Rect::new(-20, 10, i32::MAX, 20), "bus", 0.9),
        ];
        OverlayRenderer::default().render(
            &mut frame,
            &labels,
            None,
            &FrameCountResult::zeroed(&VehicleClassSet::default()),
        );
        // the third box runs off the right edge
        assert_eq!(*frame.get_pixel(30, 10), BOX_COLOR);
        assert_eq!(*frame.get_pixel(30, 20), Rgb([0, 0, 0]));
    }

    #[test]
    fn no_font_draws_no_text() {
        let mut frame = blank();
        let renderer = OverlayRenderer::default();
        assert!(!renderer.has_font());
        renderer.render(
            &mut frame,
            &[],
            None,
            &FrameCountResult::zeroed(&VehicleClassSet::default()),
        );
        assert!(frame.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn label_text_format() {
        assert_eq!(BoxLabel::new(Rect::new(0, 0, 1, 1), "car", 0.876).text, "car 0.88");
        assert_eq!(capitalize("motorbike"), "Motorbike");
        assert_eq!(capitalize("BUS"), "Bus");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn unreadable_font_is_an_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(OverlayRenderer::from_font_file(file.path()).is_err());
    }
}
