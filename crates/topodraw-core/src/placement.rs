//! Grid placement of new devices on the canvas

use serde::{Deserialize, Serialize};

use crate::device::Position;

/// Width and height of every device footprint
pub const FOOTPRINT: i32 = 80;
/// Distance between neighbouring grid candidates
pub const GRID_STEP: i32 = 100;
/// Coordinate of the first grid candidate on both axes
pub const GRID_ORIGIN: i32 = 20;
/// Position used when no grid slot is free
pub const FALLBACK_POSITION: Position = Position::new(GRID_ORIGIN, GRID_ORIGIN);

/// Drawing area size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: i32,
    pub height: i32,
}

impl Canvas {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    /// The footprint of a device at `position`
    pub fn footprint(position: Position) -> Self {
        Self {
            x: position.x,
            y: position.y,
            width: FOOTPRINT,
            height: FOOTPRINT,
        }
    }

    /// Whether the interiors overlap; rectangles sharing only an edge do not
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// Find the first free grid slot for a new footprint
///
/// Candidates are scanned column by column: y increases for each x, then x
/// advances. The first candidate that does not intersect an occupied
/// rectangle wins. A full canvas falls back to [`FALLBACK_POSITION`], which
/// may overlap an existing device.
pub fn place_without_overlap(canvas: Canvas, occupied: &[Rect]) -> Position {
    let max_x = canvas.width.saturating_sub(FOOTPRINT);
    let max_y = canvas.height.saturating_sub(FOOTPRINT);
    let mut x = GRID_ORIGIN;
    while x < max_x {
        let mut y = GRID_ORIGIN;
        while y < max_y {
            let candidate = Position::new(x, y);
            let bounds = Rect::footprint(candidate);
            if !occupied.iter().any(|r| r.intersects(&bounds)) {
                return candidate;
            }
            y = y.saturating_add(GRID_STEP);
        }
        x = x.saturating_add(GRID_STEP);
    }
    FALLBACK_POSITION
}

/// Constrain a footprint to lie inside the canvas
///
/// On a canvas smaller than the footprint the device is pinned to the
/// origin.
pub fn clamp(position: Position, canvas: Canvas) -> Position {
    let max_x = canvas.width.saturating_sub(FOOTPRINT).max(0);
    let max_y = canvas.height.saturating_sub(FOOTPRINT).max(0);
    Position::new(position.x.clamp(0, max_x), position.y.clamp(0, max_y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_canvas_uses_origin_slot() {
        let pos = place_without_overlap(Canvas::default(), &[]);
        assert_eq!(pos, Position::new(20, 20));
    }

    #[test]
    fn test_scans_down_the_column_first() {
        let occupied = [Rect::footprint(Position::new(20, 20))];
        let pos = place_without_overlap(Canvas::default(), &occupied);
        assert_eq!(pos, Position::new(20, 120));
    }

    #[test]
    fn test_moves_to_next_column_when_full() {
        let canvas = Canvas::new(800, 300);
        // Rows at y = 20 and 120 fit; y = 220 does not (220 >= 300 - 80)
        let occupied = [
            Rect::footprint(Position::new(20, 20)),
            Rect::footprint(Position::new(20, 120)),
        ];
        assert_eq!(place_without_overlap(canvas, &occupied), Position::new(120, 20));
    }

    #[test]
    fn test_overlap_anywhere_in_footprint_blocks_slot() {
        let occupied = [Rect::footprint(Position::new(60, 60))];
        let pos = place_without_overlap(Canvas::default(), &occupied);
        // (20, 20) and (20, 120) both overlap the 60..140 square
        assert_eq!(pos, Position::new(20, 220));
    }

    #[test]
    fn test_touching_edges_do_not_overlap() {
        let a = Rect::footprint(Position::new(0, 0));
        let b = Rect::footprint(Position::new(80, 0));
        assert!(!a.intersects(&b));
        assert!(a.intersects(&Rect::footprint(Position::new(79, 79))));
    }

    #[test]
    fn test_full_canvas_falls_back() {
        let canvas = Canvas::new(200, 200);
        let occupied = [Rect::footprint(Position::new(20, 20))];
        assert_eq!(place_without_overlap(canvas, &occupied), FALLBACK_POSITION);

        // Too small for any candidate at all
        assert_eq!(place_without_overlap(Canvas::new(50, 50), &[]), FALLBACK_POSITION);
    }

    #[test]
    fn test_placement_is_deterministic() {
        let occupied: Vec<Rect> = [(20, 20), (20, 120), (120, 20), (300, 300)]
            .into_iter()
            .map(|(x, y)| Rect::footprint(Position::new(x, y)))
            .collect();
        let first = place_without_overlap(Canvas::default(), &occupied);
        for _ in 0..10 {
            assert_eq!(place_without_overlap(Canvas::default(), &occupied), first);
        }
    }

    #[test]
    fn test_clamp_keeps_footprint_inside() {
        let canvas = Canvas::new(400, 300);
        assert_eq!(clamp(Position::new(-10, 50), canvas), Position::new(0, 50));
        assert_eq!(clamp(Position::new(900, 900), canvas), Position::new(320, 220));
        assert_eq!(clamp(Position::new(5, 5), Canvas::new(40, 40)), Position::new(0, 0));
    }

    #[test]
    fn test_extreme_canvas_sizes_do_not_overflow() {
        let tiny = Canvas::new(i32::MIN, i32::MIN);
        assert_eq!(place_without_overlap(tiny, &[]), FALLBACK_POSITION);
        assert_eq!(clamp(Position::new(30, 30), tiny), Position::new(0, 0));

        let huge = Canvas::new(i32::MAX, i32::MAX);
        assert_eq!(place_without_overlap(huge, &[]), Position::new(20, 20));
        assert_eq!(
            clamp(Position::new(i32::MAX, 5), huge),
            Position::new(i32::MAX - FOOTPRINT, 5)
        );
    }
}
