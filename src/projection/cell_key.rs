use std::fmt;
use std::str::FromStr;

use bevy::math::DVec2;
use thiserror::Error;

use super::rect::DoubleRect;

/// Quadtree address of a map cell.
///
/// Formats as its quadrant path, one digit per level: `qx + 2 * qy` where
/// `qx`/`qy` pick the right/bottom half. The root is the empty path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CellKeyError {
    #[error("invalid quadrant digit {0:?}")]
    InvalidDigit(char),
    #[error("cell key path longer than {0} levels")]
    TooDeep(u8),
}

/// Deepest supported level
pub const MAX_CELL_ZOOM: u8 = 30;

impl CellKey {
    pub const ROOT: CellKey = CellKey { zoom: 0, x: 0, y: 0 };

    pub fn new(zoom: u8, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }

    /// Number of cells along one axis at this zoom level
    pub fn grid_size(zoom: u8) -> u32 {
        1 << zoom
    }

    pub fn parent(&self) -> Option<CellKey> {
        (self.zoom > 0).then(|| CellKey::new(self.zoom - 1, self.x >> 1, self.y >> 1))
    }

    /// Children ordered by quadrant digit
    pub fn children(&self) -> [CellKey; 4] {
        let zoom = self.zoom + 1;
        let x = self.x << 1;
        let y = self.y << 1;
        [
            CellKey::new(zoom, x, y),
            CellKey::new(zoom, x + 1, y),
            CellKey::new(zoom, x, y + 1),
            CellKey::new(zoom, x + 1, y + 1),
        ]
    }

    /// Quadrant digits from the root down
    pub fn quadrants(&self) -> Vec<u8> {
        (0..self.zoom)
            .rev()
            .map(|level| {
                let qx = (self.x >> level) & 1;
                let qy = (self.y >> level) & 1;
                (qx + 2 * qy) as u8
            })
            .collect()
    }

    pub fn ancestor_at(&self, zoom: u8) -> Option<CellKey> {
        (zoom <= self.zoom).then(|| {
            let shift = self.zoom - zoom;
            CellKey::new(zoom, self.x >> shift, self.y >> shift)
        })
    }

    pub fn is_ancestor_of(&self, other: &CellKey) -> bool {
        self.zoom < other.zoom && other.ancestor_at(self.zoom) == Some(*self)
    }

    /// Rectangle of this cell inside `map_rect`
    pub fn compute_rect(&self, map_rect: &DoubleRect) -> DoubleRect {
        let size = map_rect.dimension / Self::grid_size(self.zoom) as f64;
        DoubleRect::new(
            map_rect.origin + DVec2::new(self.x as f64, self.y as f64) * size,
            size,
        )
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for digit in self.quadrants() {
            write!(f, "{digit}")?;
        }
        Ok(())
    }
}

impl FromStr for CellKey {
    type Err = CellKeyError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        if path.len() > MAX_CELL_ZOOM as usize {
            return Err(CellKeyError::TooDeep(MAX_CELL_ZOOM));
        }
        path.chars().try_fold(CellKey::ROOT, |key, c| {
            let digit = c.to_digit(4).ok_or(CellKeyError::InvalidDigit(c))?;
            Ok(key.children()[digit as usize])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_rect() -> DoubleRect {
        DoubleRect::new(DVec2::ZERO, DVec2::splat(256.0))
    }

    #[test]
    fn test_quad_path_round_trip() {
        let key: CellKey = "0312".parse().unwrap();
        assert_eq!(key, CellKey::new(4, 0b0110, 0b0101));
        assert_eq!(key.to_string(), "0312");
        assert_eq!(CellKey::ROOT.to_string(), "");
        assert_eq!("04".parse::<CellKey>(), Err(CellKeyError::InvalidDigit('4')));
    }

    #[test]
    fn test_child_rect_is_inside_parent() {
        let rect = map_rect();
        let mut key = CellKey::ROOT;
        for digit in [3usize, 0, 2, 1, 3, 3] {
            let child = key.children()[digit];
            assert!(key.compute_rect(&rect).contains_rect(&child.compute_rect(&rect)));
            assert_eq!(child.parent(), Some(key));
            assert!(key.is_ancestor_of(&child));
            key = child;
        }
    }

    #[test]
    fn test_siblings_partition_parent() {
        let rect = map_rect();
        let parent: CellKey = "21".parse().unwrap();
        let children = parent.children();
        let parent_rect = parent.compute_rect(&rect);

        let area: f64 = children
            .iter()
            .map(|child| {
                let r = child.compute_rect(&rect);
                r.width() * r.height()
            })
            .sum();
        assert!((area - parent_rect.width() * parent_rect.height()).abs() < 1e-9);

        for (i, a) in children.iter().enumerate() {
            for b in &children[i + 1..] {
                assert!(!a.compute_rect(&rect).intersects(&b.compute_rect(&rect)));
            }
        }
    }

    #[test]
    fn test_ancestor_lookup() {
        let key: CellKey = "1230".parse().unwrap();
        assert_eq!(key.ancestor_at(2), Some("12".parse().unwrap()));
        assert_eq!(key.ancestor_at(0), Some(CellKey::ROOT));
        assert_eq!(key.ancestor_at(5), None);
        assert!(!key.is_ancestor_of(&key));
    }
}
