//! Spatial indexing for agent and food neighbourhood queries.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors emitted by spatial index implementations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    /// Indicates configuration values that cannot be used (e.g., non-positive cell size).
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Common behaviour exposed by neighbourhood indices.
///
/// Entries are identified by their position in the slice handed to
/// [`NeighborhoodIndex::rebuild`]; callers keep the mapping to their own ids.
pub trait NeighborhoodIndex {
    /// Rebuild internal structures from entry positions.
    fn rebuild(&mut self, positions: &[(f32, f32)]) -> Result<(), IndexError>;

    /// Visit neighbours of entry `idx` within the provided squared radius.
    fn neighbors_within(
        &self,
        idx: usize,
        radius_sq: f32,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    );

    /// Visit every entry within `radius` of an arbitrary point.
    fn query_point(
        &self,
        point: (f32, f32),
        radius: f32,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    );

    /// Closest entry to `point` accepted by `filter`, with its squared distance.
    fn nearest(
        &self,
        point: (f32, f32),
        filter: &mut dyn FnMut(usize) -> bool,
    ) -> Option<(usize, OrderedFloat<f32>)>;

    /// Number of indexed entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Uniform grid over a fixed rectangular world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniformGridIndex {
    /// Edge length of each grid cell used for bucketing.
    pub cell_size: f32,
    pub width: f32,
    pub height: f32,
    #[serde(skip)]
    cols: usize,
    #[serde(skip)]
    rows: usize,
    #[serde(skip)]
    buckets: Vec<Vec<usize>>,
    #[serde(skip)]
    positions: Vec<(f32, f32)>,
}

impl UniformGridIndex {
    /// Create a grid covering a `width × height` world.
    #[must_use]
    pub fn new(cell_size: f32, width: f32, height: f32) -> Self {
        Self {
            cell_size,
            width,
            height,
            cols: 0,
            rows: 0,
            buckets: Vec::new(),
            positions: Vec::new(),
        }
    }

    /// Grid dimensions as `(columns, rows)` after the last rebuild.
    #[must_use]
    pub const fn dimensions(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    /// Position recorded for entry `idx` at the last rebuild.
    #[must_use]
    pub fn position(&self, idx: usize) -> Option<(f32, f32)> {
        self.positions.get(idx).copied()
    }

    fn validate(&self) -> Result<(), IndexError> {
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(IndexError::InvalidConfig("cell_size must be positive"));
        }
        if !(self.width.is_finite() && self.width > 0.0) {
            return Err(IndexError::InvalidConfig("width must be positive"));
        }
        if !(self.height.is_finite() && self.height > 0.0) {
            return Err(IndexError::InvalidConfig("height must be positive"));
        }
        Ok(())
    }

    fn cell_coords(&self, (x, y): (f32, f32)) -> (usize, usize) {
        let cx = (x / self.cell_size).floor().max(0.0) as usize;
        let cy = (y / self.cell_size).floor().max(0.0) as usize;
        (
            cx.min(self.cols.saturating_sub(1)),
            cy.min(self.rows.saturating_sub(1)),
        )
    }

    fn bucket(&self, cx: usize, cy: usize) -> &[usize] {
        &self.buckets[cy * self.cols + cx]
    }

    fn visit_cell_range(
        &self,
        point: (f32, f32),
        radius_sq: f32,
        min: (usize, usize),
        max: (usize, usize),
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    ) {
        for cy in min.1..=max.1 {
            for cx in min.0..=max.0 {
                for &idx in self.bucket(cx, cy) {
                    let (x, y) = self.positions[idx];
                    let dist_sq = (x - point.0).powi(2) + (y - point.1).powi(2);
                    if dist_sq <= radius_sq {
                        visitor(idx, OrderedFloat(dist_sq));
                    }
                }
            }
        }
    }

    fn visit_radius(
        &self,
        point: (f32, f32),
        radius: f32,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    ) {
        if self.positions.is_empty() || radius < 0.0 {
            return;
        }
        let min = self.cell_coords((point.0 - radius, point.1 - radius));
        let max = self.cell_coords((point.0 + radius, point.1 + radius));
        self.visit_cell_range(point, radius * radius, min, max, visitor);
    }
}

impl Default for UniformGridIndex {
    fn default() -> Self {
        Self::new(64.0, 1024.0, 768.0)
    }
}

impl NeighborhoodIndex for UniformGridIndex {
    fn rebuild(&mut self, positions: &[(f32, f32)]) -> Result<(), IndexError> {
        self.validate()?;
        let cols = (self.width / self.cell_size).ceil().max(1.0) as usize;
        let rows = (self.height / self.cell_size).ceil().max(1.0) as usize;
        if cols != self.cols || rows != self.rows {
            self.cols = cols;
            self.rows = rows;
            self.buckets = vec![Vec::new(); cols * rows];
        } else {
            for bucket in &mut self.buckets {
                bucket.clear();
            }
        }
        self.positions.clear();
        self.positions.extend_from_slice(positions);
        for (idx, &pos) in positions.iter().enumerate() {
            let (cx, cy) = self.cell_coords(pos);
            self.buckets[cy * cols + cx].push(idx);
        }
        Ok(())
    }

    fn neighbors_within(
        &self,
        idx: usize,
        radius_sq: f32,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    ) {
        let Some(origin) = self.position(idx) else {
            return;
        };
        self.visit_radius(origin, radius_sq.max(0.0).sqrt(), &mut |other, dist| {
            if other != idx {
                visitor(other, dist);
            }
        });
    }

    fn query_point(
        &self,
        point: (f32, f32),
        radius: f32,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f32>),
    ) {
        self.visit_radius(point, radius, visitor);
    }

    fn nearest(
        &self,
        point: (f32, f32),
        filter: &mut dyn FnMut(usize) -> bool,
    ) -> Option<(usize, OrderedFloat<f32>)> {
        if self.positions.is_empty() {
            return None;
        }
        let (ox, oy) = self.cell_coords(point);
        let max_ring = self.cols.max(self.rows);
        let mut best: Option<(usize, OrderedFloat<f32>)> = None;

        for ring in 0..=max_ring {
            let min_x = ox.saturating_sub(ring);
            let min_y = oy.saturating_sub(ring);
            let max_x = (ox + ring).min(self.cols - 1);
            let max_y = (oy + ring).min(self.rows - 1);
            for cy in min_y..=max_y {
                for cx in min_x..=max_x {
                    // Only the outer shell of the ring is new.
                    let on_shell = cx.abs_diff(ox) == ring || cy.abs_diff(oy) == ring;
                    if !on_shell {
                        continue;
                    }
                    for &idx in self.bucket(cx, cy) {
                        if !filter(idx) {
                            continue;
                        }
                        let (x, y) = self.positions[idx];
                        let dist = OrderedFloat((x - point.0).powi(2) + (y - point.1).powi(2));
                        if best.is_none_or(|(_, d)| dist < d) {
                            best = Some((idx, dist));
                        }
                    }
                }
            }
            // Anything in later rings is at least `ring * cell_size` away.
            if let Some((_, dist)) = best {
                let reach = ring as f32 * self.cell_size;
                if dist.0 <= reach * reach {
                    break;
                }
            }
        }
        best
    }

    fn len(&self) -> usize {
        self.positions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_force_nearest(positions: &[(f32, f32)], point: (f32, f32)) -> usize {
        positions
            .iter()
            .enumerate()
            .min_by_key(|(_, (x, y))| OrderedFloat((x - point.0).powi(2) + (y - point.1).powi(2)))
            .map(|(idx, _)| idx)
            .expect("non-empty")
    }

    fn scatter(count: usize) -> Vec<(f32, f32)> {
        // Deterministic low-discrepancy layout; no rng needed for index tests.
        (0..count)
            .map(|i| {
                let f = i as f32;
                ((f * 97.31) % 1000.0, (f * 53.77) % 750.0)
            })
            .collect()
    }

    #[test]
    fn rejects_invalid_configuration() {
        let mut grid = UniformGridIndex::new(0.0, 100.0, 100.0);
        assert_eq!(
            grid.rebuild(&[]),
            Err(IndexError::InvalidConfig("cell_size must be positive"))
        );
        let mut grid = UniformGridIndex::new(10.0, -1.0, 100.0);
        assert!(grid.rebuild(&[]).is_err());
    }

    #[test]
    fn neighbors_within_excludes_self_and_respects_radius() {
        let mut grid = UniformGridIndex::new(10.0, 100.0, 100.0);
        let positions = [(5.0, 5.0), (8.0, 5.0), (30.0, 5.0), (5.0, 14.0)];
        grid.rebuild(&positions).expect("rebuild");
        let mut seen = Vec::new();
        grid.neighbors_within(0, 100.0, &mut |idx, dist| seen.push((idx, dist.0)));
        seen.sort_by_key(|(idx, _)| *idx);
        assert_eq!(seen, vec![(1, 9.0), (3, 81.0)]);
    }

    #[test]
    fn query_point_crosses_cell_boundaries() {
        let mut grid = UniformGridIndex::new(10.0, 100.0, 100.0);
        let positions = [(9.5, 9.5), (10.5, 10.5), (50.0, 50.0)];
        grid.rebuild(&positions).expect("rebuild");
        let mut hits = Vec::new();
        grid.query_point((10.0, 10.0), 1.0, &mut |idx, _| hits.push(idx));
        hits.sort_unstable();
        assert_eq!(hits, vec![0, 1]);
    }

    #[test]
    fn positions_outside_world_are_clamped_into_edge_cells() {
        let mut grid = UniformGridIndex::new(10.0, 50.0, 50.0);
        grid.rebuild(&[(-5.0, -5.0), (80.0, 80.0)]).expect("rebuild");
        assert_eq!(grid.dimensions(), (5, 5));
        let found = grid.nearest((49.0, 49.0), &mut |_| true);
        assert_eq!(found.map(|(idx, _)| idx), Some(1));
    }

    #[test]
    fn nearest_matches_brute_force() {
        let positions = scatter(300);
        let mut grid = UniformGridIndex::new(64.0, 1024.0, 768.0);
        grid.rebuild(&positions).expect("rebuild");
        for probe in [(0.0, 0.0), (512.0, 384.0), (1000.0, 10.0), (33.3, 700.0)] {
            let (idx, _) = grid.nearest(probe, &mut |_| true).expect("nearest");
            let expected = brute_force_nearest(&positions, probe);
            let d = |i: usize| {
                (positions[i].0 - probe.0).powi(2) + (positions[i].1 - probe.1).powi(2)
            };
            assert!((d(idx) - d(expected)).abs() < 1e-3, "probe {probe:?}");
        }
    }

    #[test]
    fn nearest_honours_filter_and_searches_far_rings() {
        let mut grid = UniformGridIndex::new(10.0, 200.0, 200.0);
        let positions = [(1.0, 1.0), (2.0, 2.0), (190.0, 190.0)];
        grid.rebuild(&positions).expect("rebuild");
        let found = grid.nearest((0.0, 0.0), &mut |idx| idx == 2);
        assert_eq!(found.map(|(idx, _)| idx), Some(2));
        assert!(grid.nearest((0.0, 0.0), &mut |_| false).is_none());
    }

    #[test]
    fn empty_index_yields_nothing() {
        let mut grid = UniformGridIndex::default();
        grid.rebuild(&[]).expect("rebuild");
        assert!(grid.is_empty());
        assert!(grid.nearest((10.0, 10.0), &mut |_| true).is_none());
        let mut count = 0;
        grid.query_point((10.0, 10.0), 100.0, &mut |_, _| count += 1);
        assert_eq!(count, 0);
    }
}
