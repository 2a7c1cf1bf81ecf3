use bevy::math::DVec2;

/// Axis-aligned rectangle in double precision, y growing downwards.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DoubleRect {
    pub origin: DVec2,
    pub dimension: DVec2,
}

impl DoubleRect {
    pub fn new(origin: DVec2, dimension: DVec2) -> Self {
        Self { origin, dimension }
    }

    pub fn from_ltrb(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self::new(DVec2::new(left, top), DVec2::new(right - left, bottom - top))
    }

    pub fn left(&self) -> f64 {
        self.origin.x
    }

    pub fn top(&self) -> f64 {
        self.origin.y
    }

    pub fn right(&self) -> f64 {
        self.origin.x + self.dimension.x
    }

    pub fn bottom(&self) -> f64 {
        self.origin.y + self.dimension.y
    }

    pub fn width(&self) -> f64 {
        self.dimension.x
    }

    pub fn height(&self) -> f64 {
        self.dimension.y
    }

    pub fn center(&self) -> DVec2 {
        self.origin + self.dimension / 2.0
    }

    /// Inclusive on all edges
    pub fn contains(&self, point: DVec2) -> bool {
        point.x >= self.left()
            && point.x <= self.right()
            && point.y >= self.top()
            && point.y <= self.bottom()
    }

    pub fn contains_rect(&self, other: &DoubleRect) -> bool {
        self.left() <= other.left()
            && self.top() <= other.top()
            && self.right() >= other.right()
            && self.bottom() >= other.bottom()
    }

    /// True when the interiors overlap; touching edges do not count.
    pub fn intersects(&self, other: &DoubleRect) -> bool {
        self.left() < other.right()
            && other.left() < self.right()
            && self.top() < other.bottom()
            && other.top() < self.bottom()
    }

    pub fn intersection(&self, other: &DoubleRect) -> Option<DoubleRect> {
        if !self.intersects(other) {
            return None;
        }
        Some(Self::from_ltrb(
            self.left().max(other.left()),
            self.top().max(other.top()),
            self.right().min(other.right()),
            self.bottom().min(other.bottom()),
        ))
    }

    pub fn translate(&self, delta: DVec2) -> DoubleRect {
        Self::new(self.origin + delta, self.dimension)
    }

    pub fn inflate(&self, amount: f64) -> DoubleRect {
        Self::new(
            self.origin - DVec2::splat(amount),
            self.dimension + DVec2::splat(amount * 2.0),
        )
    }
}
