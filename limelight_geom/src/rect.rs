//! Axis-aligned rectangles with the union semantics bounds aggregation needs.

use kurbo::Point;

/// An axis-aligned rectangle described by its origin and extent.
///
/// ## Emptiness
///
/// A rectangle is *empty* when either extent is `<= 0`. The all-zero
/// rectangle doubles as the conventional "empty" sentinel: unioning with an
/// empty rectangle is a no-op, and unioning an empty rectangle with a
/// non-empty one copies the other operand. This means a genuine zero-area
/// rectangle at the origin is indistinguishable from "no rectangle" — a
/// deliberate conflation that bounds-aggregation code relies on.
///
/// ## Edges
///
/// Containment is inclusive on all four edges, and two rectangles that only
/// touch along an edge still count as intersecting.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Rectangle {
    /// Minimum x.
    pub x: f64,
    /// Minimum y.
    pub y: f64,
    /// Horizontal extent.
    pub width: f64,
    /// Vertical extent.
    pub height: f64,
}

impl Rectangle {
    /// The all-zero (empty) rectangle.
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        width: 0.0,
        height: 0.0,
    };

    /// Construct from origin and extent.
    #[inline]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Returns true when either extent is zero or negative.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Inclusive containment test against a coordinate pair.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }

    /// Inclusive containment test against a point.
    #[inline]
    pub fn contains_point(&self, p: Point) -> bool {
        self.contains(p.x, p.y)
    }

    /// Returns true when `other` lies entirely within this rectangle.
    pub fn contains_rect(&self, other: &Self) -> bool {
        self.x <= other.x
            && self.y <= other.y
            && other.x + other.width <= self.x + self.width
            && other.y + other.height <= self.y + self.height
    }

    /// Returns true unless the rectangles are fully separated on an axis.
    /// Edge-touching rectangles count as intersecting.
    pub fn intersects(&self, other: &Self) -> bool {
        !(other.y + other.height < self.y
            || other.x > self.x + self.width
            || other.y > self.y + self.height
            || other.x + other.width < self.x)
    }

    /// The overlapping region of two rectangles, or [`Rectangle::ZERO`] when
    /// they do not overlap.
    pub fn intersection(&self, other: &Self) -> Self {
        let l = self.x.max(other.x);
        let t = self.y.max(other.y);
        let r = (self.x + self.width).min(other.x + other.width);
        let b = (self.y + self.height).min(other.y + other.height);
        if r < l || b < t {
            Self::ZERO
        } else {
            Self::new(l, t, r - l, b - t)
        }
    }

    /// The smallest rectangle containing both operands.
    ///
    /// Unioning with an empty rectangle returns the other operand unchanged.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let mut out = *self;
        out.union_with(other);
        out
    }

    /// Grow this rectangle in place to contain `other`.
    ///
    /// A no-op when `other` is empty; copies `other` when `self` is empty.
    pub fn union_with(&mut self, other: &Self) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = *other;
            return;
        }
        self.union_with_point(other.x, other.y);
        self.union_with_point(other.x + other.width, other.y + other.height);
    }

    /// Grow this rectangle in place to contain the point `(x, y)`.
    pub fn union_with_point(&mut self, x: f64, y: f64) {
        let min_x = self.x.min(x);
        let min_y = self.y.min(y);
        self.width = (self.x + self.width).max(x) - min_x;
        self.height = (self.y + self.height).max(y) - min_y;
        self.x = min_x;
        self.y = min_y;
    }

    /// Grow this rectangle in place to contain the segment `(x0, y0)-(x1, y1)`.
    ///
    /// When the rectangle is zero-sized it is re-seeded at the first point
    /// instead of being unioned with it, so an accumulation loop can start
    /// from [`Rectangle::ZERO`] without pinning the result to the origin.
    pub fn union_with_line(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) {
        if self.width == 0.0 && self.height == 0.0 {
            self.set_origin(x0, y0);
        } else {
            self.union_with_point(x0, y0);
        }
        self.union_with_point(x1, y1);
    }

    /// Collapse to a zero-sized rectangle at `(x, y)`.
    pub fn set_origin(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
        self.width = 0.0;
        self.height = 0.0;
    }

    /// Reset to the all-zero rectangle.
    pub fn set_empty(&mut self) {
        *self = Self::ZERO;
    }

    /// Translate the rectangle by `(dx, dy)`.
    pub fn offset(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }

    /// Grow the rectangle by `dx`/`dy` on each side.
    pub fn inflate(&mut self, dx: f64, dy: f64) {
        self.x -= dx;
        self.y -= dy;
        self.width += 2.0 * dx;
        self.height += 2.0 * dy;
    }
}

impl From<Rectangle> for kurbo::Rect {
    fn from(r: Rectangle) -> Self {
        Self::new(r.x, r.y, r.x + r.width, r.y + r.height)
    }
}

impl From<kurbo::Rect> for Rectangle {
    fn from(r: kurbo::Rect) -> Self {
        Self::new(r.x0, r.y0, r.width(), r.height())
    }
}
