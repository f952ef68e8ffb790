//! 计数区域 (Counting zone)
//!
//! A zone is a simple polygon in frame pixel coordinates. Containment uses
//! exact integer arithmetic and treats edges and vertices as inside.

use serde::{Deserialize, Serialize};

use crate::detection::Detection;

/// Ordered vertices, implicitly closed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon {
    vertices: Vec<(i32, i32)>,
}

impl Polygon {
    pub fn new(vertices: Vec<(i32, i32)>) -> Self {
        Self { vertices }
    }

    /// Parse `"x1,y1 x2,y2 x3,y3 ..."`. An empty string is an empty polygon.
    pub fn parse(s: &str) -> Result<Self, String> {
        let mut vertices = Vec::new();
        for part in s.split_whitespace() {
            let (x, y) = part
                .split_once(',')
                .ok_or_else(|| format!("vertex '{part}' is not of the form x,y"))?;
            let x = x
                .trim()
                .parse::<i32>()
                .map_err(|e| format!("vertex '{part}': bad x: {e}"))?;
            let y = y
                .trim()
                .parse::<i32>()
                .map_err(|e| format!("vertex '{part}': bad y: {e}"))?;
            vertices.push((x, y));
        }
        Ok(Self { vertices })
    }

    pub fn vertices(&self) -> &[(i32, i32)] {
        &self.vertices
    }

    /// Fewer than three vertices cannot bound an area.
    pub fn is_usable(&self) -> bool {
        self.vertices.len() >= 3
    }

    /// Crossing-number test; boundary points count as inside.
    pub fn contains(&self, point: (i32, i32)) -> bool {
        let (px, py) = widen(point);
        let n = self.vertices.len();
        let mut inside = false;

        for i in 0..n {
            let (ax, ay) = widen(self.vertices[i]);
            let (bx, by) = widen(self.vertices[(i + 1) % n]);

            if on_segment((ax, ay), (bx, by), (px, py)) {
                return true;
            }

            // half-open rule on y so shared vertices are crossed once
            if (ay > py) != (by > py) {
                // x of the edge at height py, compared without division
                let lhs = (px - ax) * (by - ay);
                let rhs = (bx - ax) * (py - ay);
                let crosses = if by > ay { lhs < rhs } else { lhs > rhs };
                if crosses {
                    inside = !inside;
                }
            }
        }

        inside
    }
}

/// Coordinate differences span 33 bits, their products need 128.
fn widen(p: (i32, i32)) -> (i128, i128) {
    (p.0 as i128, p.1 as i128)
}

fn on_segment(a: (i128, i128), b: (i128, i128), p: (i128, i128)) -> bool {
    let cross = (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0);
    cross == 0
        && p.0 >= a.0.min(b.0)
        && p.0 <= a.0.max(b.0)
        && p.1 >= a.1.min(b.1)
        && p.1 <= a.1.max(b.1)
}

/// Zone restriction for counting. Without a usable polygon every detection
/// is inside.
#[derive(Debug, Clone, Default)]
pub struct ZoneFilter {
    zone: Option<Polygon>,
}

impl ZoneFilter {
    pub fn new(zone: Option<Polygon>) -> Self {
        let zone = match zone {
            Some(polygon) if polygon.is_usable() => Some(polygon),
            Some(polygon) => {
                log::warn!(
                    "zone has {} vertices, need at least 3; zone restriction disabled",
                    polygon.vertices().len()
                );
                None
            }
            None => None,
        };
        Self { zone }
    }

    /// The polygon in effect, if any.
    pub fn zone(&self) -> Option<&Polygon> {
        self.zone.as_ref()
    }

    pub fn contains_point(&self, point: (i32, i32)) -> bool {
        match &self.zone {
            Some(polygon) => polygon.contains(point),
            None => true,
        }
    }

    pub fn accepts(&self, detection: &Detection) -> bool {
        self.contains_point(detection.rect.center())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Rect;

    fn square() -> Polygon {
        Polygon::new(vec![(0, 0), (10, 0), (10, 10), (0, 10)])
    }

    fn centered_at(cx: i32, cy: i32) -> Detection {
        Detection::new(Rect::new(cx - 2, cy - 2, 4, 4), 0, 0.9)
    }

    #[test]
    fn square_inside_and_outside() {
        let filter = ZoneFilter::new(Some(square()));
        assert!(filter.accepts(&centered_at(5, 5)));
        assert!(!filter.accepts(&centered_at(15, 15)));
    }

    #[test]
    fn edges_and_vertices_are_inside() {
        let poly = square();
        for p in [(0, 0), (10, 10), (5, 0), (10, 5), (0, 7), (3, 10)] {
            assert!(poly.contains(p), "{p:?} should be on the boundary");
        }
        assert!(!poly.contains((11, 5)));
        assert!(!poly.contains((-1, 0)));
    }

    #[test]
    fn diagonal_edge_boundary() {
        let tri = Polygon::new(vec![(0, 0), (10, 0), (0, 10)]);
        assert!(tri.contains((5, 5)));
        assert!(tri.contains((2, 2)));
        assert!(!tri.contains((6, 6)));
    }

    #[test]
    fn concave_polygon() {
        // U shape opening upwards
        let u = Polygon::new(vec![
            (0, 0),
            (30, 0),
            (30, 30),
            (20, 30),
            (20, 10),
            (10, 10),
            (10, 30),
            (0, 30),
        ]);
        assert!(u.contains((5, 20)));
        assert!(u.contains((25, 20)));
        assert!(u.contains((15, 5)));
        assert!(!u.contains((15, 20)));
        assert!(u.contains((15, 10)));
    }

    #[test]
    fn ray_through_vertex_counts_once() {
        let diamond = Polygon::new(vec![(5, 0), (10, 5), (5, 10), (0, 5)]);
        assert!(diamond.contains((5, 5)));
        assert!(!diamond.contains((-3, 5)));
        assert!(!diamond.contains((12, 5)));
        assert!(!diamond.contains((1, 1)));
    }

    #[test]
    fn missing_or_degenerate_zone_accepts_everything() {
        let anywhere = [centered_at(5, 5), centered_at(-100, 4000), centered_at(0, 0)];
        let filters = [
            ZoneFilter::new(None),
            ZoneFilter::new(Some(Polygon::new(vec![]))),
            ZoneFilter::new(Some(Polygon::new(vec![(0, 0), (10, 10)]))),
        ];
        for filter in &filters {
            assert!(filter.zone().is_none());
            assert!(anywhere.iter().all(|d| filter.accepts(d)));
        }
    }

    #[test]
    fn uses_truncated_box_center() {
        let filter = ZoneFilter::new(Some(square()));
        // center (10 + 1/2, 10 + 1/2) truncates to (10, 10), a vertex
        assert!(filter.accepts(&Detection::new(Rect::new(10, 10, 1, 1), 0, 0.9)));
        assert!(!filter.accepts(&Detection::new(Rect::new(10, 10, 2, 2), 0, 0.9)));
    }

    #[test]
    fn full_range_vertices_do_not_overflow() {
        let tri = Polygon::new(vec![(i32::MIN, i32::MIN), (i32::MAX, i32::MIN), (i32::MIN, i32::MAX)]);
        assert!(tri.contains((-1, -1)));
        // hypotenuse is x + y == -1
        assert!(tri.contains((0, -1)));
        assert!(!tri.contains((0, 0)));
        assert!(!tri.contains((i32::MAX, i32::MAX)));
        assert!(tri.contains((i32::MIN, 0)));
    }

    #[test]
    fn parses_cli_polygon() {
        let poly = Polygon::parse("472,2119 3384,2103 2604,735 1436,711").unwrap();
        assert_eq!(poly.vertices().len(), 4);
        assert_eq!(poly.vertices()[1], (3384, 2103));
        assert!(Polygon::parse("").unwrap().vertices().is_empty());
        assert!(Polygon::parse("1,2 3").is_err());
        assert!(Polygon::parse("1,x").is_err());
    }

    #[test]
    fn polygon_json_is_a_plain_vertex_list() {
        let poly: Polygon = serde_json::from_str("[[0,0],[10,0],[10,10]]").unwrap();
        assert_eq!(poly.vertices(), &[(0, 0), (10, 0), (10, 10)]);
    }
}
