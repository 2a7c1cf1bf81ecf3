use std::collections::{BTreeMap, BTreeSet};

use crate::projection::CellKey;

/// Cells that became live or dead in one update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellDiff {
    pub to_request: BTreeSet<CellKey>,
    pub to_remove: BTreeSet<CellKey>,
}

impl CellDiff {
    pub fn is_empty(&self) -> bool {
        self.to_request.is_empty() && self.to_remove.is_empty()
    }
}

/// Reference counts of required cells.
///
/// A cell is tracked while at least one requirement holds it. Several
/// requirements (overlapping map repetitions, prefetch rings) may hold the same
/// cell; it only drops out when the last one lets go.
#[derive(Debug, Clone, Default)]
pub struct RefCountedCells {
    counts: BTreeMap<CellKey, usize>,
}

impl RefCountedCells {
    /// Returns true when the cell was not tracked before
    pub fn acquire(&mut self, cell: CellKey) -> bool {
        let count = self.counts.entry(cell).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Returns true when the last reference was released.
    ///
    /// Releasing an untracked cell is a no-op.
    pub fn release(&mut self, cell: CellKey) -> bool {
        match self.counts.get_mut(&cell) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                self.counts.remove(&cell);
                true
            }
            None => false,
        }
    }

    pub fn count(&self, cell: &CellKey) -> usize {
        self.counts.get(cell).copied().unwrap_or(0)
    }

    pub fn contains(&self, cell: &CellKey) -> bool {
        self.counts.contains_key(cell)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn cells(&self) -> impl Iterator<Item = &CellKey> {
        self.counts.keys()
    }

    /// Replaces the tracked requirements with `requirements`, touching only
    /// the counts that differ.
    pub fn update(&mut self, requirements: impl IntoIterator<Item = CellKey>) -> CellDiff {
        let mut wanted: BTreeMap<CellKey, usize> = BTreeMap::new();
        for cell in requirements {
            *wanted.entry(cell).or_insert(0) += 1;
        }

        let mut diff = CellDiff::default();
        for (&cell, &count) in &wanted {
            for _ in self.count(&cell)..count {
                if self.acquire(cell) {
                    diff.to_request.insert(cell);
                }
            }
        }

        let held: Vec<(CellKey, usize)> = self.counts.iter().map(|(c, n)| (*c, *n)).collect();
        for (cell, count) in held {
            let keep = wanted.get(&cell).copied().unwrap_or(0);
            for _ in keep..count {
                if self.release(cell) {
                    diff.to_remove.insert(cell);
                }
            }
        }
        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pan_only_touches_changed_cells() {
        let a = CellKey::new(2, 0, 0);
        let b = CellKey::new(2, 1, 0);
        let c = CellKey::new(2, 2, 0);
        let mut cells = RefCountedCells::default();

        let first = cells.update([a, b]);
        assert_eq!(first.to_request, BTreeSet::from([a, b]));

        let second = cells.update([b, c]);
        assert_eq!(second.to_request, BTreeSet::from([c]));
        assert_eq!(second.to_remove, BTreeSet::from([a]));
        assert_eq!(cells.count(&b), 1);
        assert!(!cells.contains(&a));
    }

    #[test]
    fn test_cell_survives_until_last_reader_releases() {
        let a = CellKey::new(1, 0, 0);
        let mut cells = RefCountedCells::default();

        let diff = cells.update([a, a]);
        assert_eq!(diff.to_request.len(), 1);
        assert_eq!(cells.count(&a), 2);

        assert!(cells.update([a]).is_empty());
        assert_eq!(cells.count(&a), 1);

        let diff = cells.update([]);
        assert_eq!(diff.to_remove, BTreeSet::from([a]));
        assert!(cells.is_empty());
    }

    #[test]
    fn test_tracked_set_equals_union_of_requirements() {
        let mut cells = RefCountedCells::default();
        let frames: [&[CellKey]; 3] = [
            &[CellKey::new(3, 1, 1), CellKey::new(3, 2, 1)],
            &[CellKey::new(3, 2, 1), CellKey::new(3, 2, 1), CellKey::new(3, 5, 5)],
            &[CellKey::new(3, 0, 0)],
        ];
        for frame in frames {
            cells.update(frame.iter().copied());
            let tracked: BTreeSet<CellKey> = cells.cells().copied().collect();
            let required: BTreeSet<CellKey> = frame.iter().copied().collect();
            assert_eq!(tracked, required);
        }
    }

    #[test]
    fn test_release_of_untracked_cell_is_noop() {
        let mut cells = RefCountedCells::default();
        assert!(!cells.release(CellKey::ROOT));
        assert!(cells.acquire(CellKey::ROOT));
        assert!(!cells.acquire(CellKey::ROOT));
    }
}
