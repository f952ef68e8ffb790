/// 检测数据结构定义
/// Data structures shared by the decode / suppress / count stages
use ndarray::Array2;
use serde::Serialize;

/// One output tensor of the detector: one row per anchor.
pub type RawTensor = Array2<f32>;

/// Axis-aligned box in integer pixel offsets from the frame's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    /// Width and height are clamped to zero.
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self {
            x,
            y,
            w: w.max(0),
            h: h.max(0),
        }
    }

    pub fn xmax(&self) -> i64 {
        self.x as i64 + self.w as i64
    }

    pub fn ymax(&self) -> i64 {
        self.y as i64 + self.h as i64
    }

    pub fn area(&self) -> i64 {
        self.w as i64 * self.h as i64
    }

    /// Box center, integer division as used for zone tests.
    pub fn center(&self) -> (i32, i32) {
        (self.x.saturating_add(self.w / 2), self.y.saturating_add(self.h / 2))
    }

    pub fn intersection_area(&self, another: &Rect) -> i64 {
        let l = (self.x as i64).max(another.x as i64);
        let r = self.xmax().min(another.xmax());
        let t = (self.y as i64).max(another.y as i64);
        let b = self.ymax().min(another.ymax());
        (r - l).max(0) * (b - t).max(0)
    }

    pub fn union_area(&self, another: &Rect) -> i64 {
        self.area() + another.area() - self.intersection_area(another)
    }

    /// Intersection over union. Degenerate boxes never overlap anything.
    pub fn iou(&self, another: &Rect) -> f32 {
        if self.area() == 0 || another.area() == 0 {
            return 0.0;
        }
        let union = self.union_area(another);
        if union <= 0 {
            return 0.0;
        }
        (self.intersection_area(another) as f64 / union as f64) as f32
    }
}

/// 检测框 (Detection bounding box)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
    #[serde(rename = "box")]
    pub rect: Rect,
    pub class_id: usize,
    pub confidence: f32,
}

impl Detection {
    pub fn new(rect: Rect, class_id: usize, confidence: f32) -> Self {
        Self {
            rect,
            class_id,
            confidence,
        }
    }

    pub fn iou(&self, another: &Detection) -> f32 {
        self.rect.iou(&another.rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_is_symmetric() {
        let pairs = [
            (Rect::new(0, 0, 10, 10), Rect::new(5, 5, 10, 10)),
            (Rect::new(-4, 3, 7, 2), Rect::new(0, 0, 3, 9)),
            (Rect::new(0, 0, 10, 10), Rect::new(20, 20, 5, 5)),
            (Rect::new(0, 0, 0, 10), Rect::new(0, 0, 10, 10)),
        ];
        for (a, b) in pairs {
            assert_eq!(a.iou(&b), b.iou(&a));
        }
    }

    #[test]
    fn iou_with_itself_is_one() {
        for r in [Rect::new(0, 0, 1, 1), Rect::new(-3, 7, 40, 12), Rect::new(100, 100, 3, 900)] {
            assert_eq!(r.iou(&r), 1.0);
        }
    }

    #[test]
    fn degenerate_boxes_have_zero_iou() {
        let flat = Rect::new(0, 0, 10, 0);
        assert_eq!(flat.iou(&flat), 0.0);
        assert_eq!(flat.iou(&Rect::new(0, 0, 10, 10)), 0.0);
    }

    #[test]
    fn touching_edges_do_not_overlap() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(10, 0, 10, 10);
        assert_eq!(a.intersection_area(&b), 0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn partial_overlap_ratio() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(0, 0, 10, 7);
        assert!((a.iou(&b) - 0.7).abs() < 1e-6);
    }

    #[test]
    fn negative_sizes_clamp_to_zero() {
        let r = Rect::new(5, 5, -3, 4);
        assert_eq!(r.w, 0);
        assert_eq!(r.area(), 0);
    }

    #[test]
    fn center_truncates() {
        assert_eq!(Rect::new(40, 40, 20, 20).center(), (50, 50));
        assert_eq!(Rect::new(0, 0, 5, 3).center(), (2, 1));
        assert_eq!(Rect::new(i32::MAX - 1, 0, i32::MAX, 4).center(), (i32::MAX, 2));
    }
}
