//! Bounded fitness-sorted genome archives.

use evobots_brain::Genome;
use ordered_float::OrderedFloat;
use rand::{Rng, RngCore};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

/// Unit of currency in the gene pool and hall of fame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneEntry {
    pub fitness: f32,
    pub genome: Genome,
}

impl GeneEntry {
    #[must_use]
    pub fn new(fitness: f32, genome: Genome) -> Self {
        Self { fitness, genome }
    }
}

/// Result of offering an entry to an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Appended,
    /// The previous worst entry was evicted.
    Replaced,
    Rejected,
}

impl InsertOutcome {
    #[must_use]
    pub const fn accepted(self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

fn sort_descending(entries: &mut [GeneEntry]) {
    entries.sort_by_key(|entry| Reverse(OrderedFloat(entry.fitness)));
}

/// Top-K archive sorted by fitness, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenePool {
    capacity: usize,
    entries: Vec<GeneEntry>,
}

impl GenePool {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Build a pool from loaded entries, sorting and truncating to capacity.
    #[must_use]
    pub fn from_entries(capacity: usize, mut entries: Vec<GeneEntry>) -> Self {
        entries.retain(|entry| entry.fitness.is_finite());
        sort_descending(&mut entries);
        entries.truncate(capacity);
        Self { capacity, entries }
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[GeneEntry] {
        &self.entries
    }

    #[must_use]
    pub fn best(&self) -> Option<&GeneEntry> {
        self.entries.first()
    }

    #[must_use]
    pub fn worst(&self) -> Option<&GeneEntry> {
        self.entries.last()
    }

    /// Mean fitness of the archived entries.
    #[must_use]
    pub fn average_fitness(&self) -> Option<f32> {
        if self.entries.is_empty() {
            return None;
        }
        let total: f32 = self.entries.iter().map(|entry| entry.fitness).sum();
        Some(total / self.entries.len() as f32)
    }

    /// Append while below capacity, otherwise evict the worst entry only when
    /// `fitness` beats it. The genome is copied only on acceptance.
    pub fn try_insert(&mut self, fitness: f32, genome: &Genome) -> InsertOutcome {
        if !fitness.is_finite() || self.capacity == 0 {
            return InsertOutcome::Rejected;
        }
        let outcome = if self.entries.len() < self.capacity {
            self.entries.push(GeneEntry::new(fitness, genome.clone()));
            InsertOutcome::Appended
        } else {
            match self.entries.last_mut() {
                Some(worst) if fitness > worst.fitness => {
                    *worst = GeneEntry::new(fitness, genome.clone());
                    InsertOutcome::Replaced
                }
                _ => return InsertOutcome::Rejected,
            }
        };
        sort_descending(&mut self.entries);
        outcome
    }

    /// Uniformly random entry, or `None` when empty.
    pub fn sample(&self, rng: &mut dyn RngCore) -> Option<&GeneEntry> {
        if self.entries.is_empty() {
            return None;
        }
        let idx = rng.random_range(0..self.entries.len());
        self.entries.get(idx)
    }

    /// Pairwise genome distances, computed in parallel.
    #[must_use]
    pub fn distance_matrix(&self) -> Vec<Vec<f32>> {
        let entries = &self.entries;
        (0..entries.len())
            .into_par_iter()
            .map(|i| {
                (0..entries.len())
                    .map(|j| {
                        if i == j {
                            0.0
                        } else {
                            entries[i].genome.distance(&entries[j].genome)
                        }
                    })
                    .collect()
            })
            .collect()
    }

    /// Mean pairwise genome distance; zero for fewer than two entries.
    #[must_use]
    pub fn diversity(&self) -> f32 {
        let n = self.entries.len();
        if n < 2 {
            return 0.0;
        }
        let matrix = self.distance_matrix();
        let total: f32 = matrix
            .iter()
            .enumerate()
            .map(|(i, row)| row[i + 1..].iter().sum::<f32>())
            .sum();
        total / (n * (n - 1) / 2) as f32
    }

    /// Drop entries closer than `min_distance` to a fitter kept entry, then
    /// truncate to capacity. Returns the number of entries removed.
    pub fn prune_for_diversity(&mut self, min_distance: f32) -> usize {
        let before = self.entries.len();
        if before < 2 {
            return 0;
        }
        let matrix = self.distance_matrix();
        let mut kept: Vec<usize> = Vec::with_capacity(before);
        for candidate in 0..before {
            if kept
                .iter()
                .all(|&other| matrix[candidate][other] >= min_distance)
            {
                kept.push(candidate);
            }
        }
        let mut keep_mask = vec![false; before];
        for idx in kept {
            keep_mask[idx] = true;
        }
        let mut mask = keep_mask.into_iter();
        self.entries.retain(|_| mask.next().unwrap_or(false));
        self.entries.truncate(self.capacity);
        before - self.entries.len()
    }
}

/// Small all-time-best archive: insert-if-better-than-worst, never pruned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HallOfFame {
    pool: GenePool,
}

impl HallOfFame {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            pool: GenePool::new(capacity),
        }
    }

    #[must_use]
    pub fn from_entries(capacity: usize, entries: Vec<GeneEntry>) -> Self {
        Self {
            pool: GenePool::from_entries(capacity, entries),
        }
    }

    /// Offer an entry. A genome already present only has its fitness raised.
    pub fn try_insert(&mut self, fitness: f32, genome: &Genome) -> InsertOutcome {
        if let Some(existing) = self
            .pool
            .entries
            .iter_mut()
            .find(|entry| entry.genome == *genome)
        {
            if fitness > existing.fitness {
                existing.fitness = fitness;
                sort_descending(&mut self.pool.entries);
                return InsertOutcome::Replaced;
            }
            return InsertOutcome::Rejected;
        }
        self.pool.try_insert(fitness, genome)
    }

    #[must_use]
    pub fn entries(&self) -> &[GeneEntry] {
        self.pool.entries()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    #[must_use]
    pub fn best(&self) -> Option<&GeneEntry> {
        self.pool.best()
    }

    pub fn sample(&self, rng: &mut dyn RngCore) -> Option<&GeneEntry> {
        self.pool.sample(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn genome(value: f32) -> Genome {
        Genome::filled(value, value)
    }

    fn fitnesses(pool: &GenePool) -> Vec<f32> {
        pool.entries().iter().map(|entry| entry.fitness).collect()
    }

    #[test]
    fn full_pool_rejects_weaker_entries() {
        let mut pool = GenePool::new(2);
        assert_eq!(pool.try_insert(10.0, &genome(0.1)), InsertOutcome::Appended);
        assert_eq!(pool.try_insert(20.0, &genome(0.2)), InsertOutcome::Appended);
        assert_eq!(pool.try_insert(5.0, &genome(0.3)), InsertOutcome::Rejected);
        assert_eq!(fitnesses(&pool), vec![20.0, 10.0]);
    }

    #[test]
    fn full_pool_evicts_current_minimum() {
        let mut pool = GenePool::new(2);
        pool.try_insert(20.0, &genome(0.2));
        pool.try_insert(10.0, &genome(0.1));
        assert_eq!(pool.try_insert(15.0, &genome(0.3)), InsertOutcome::Replaced);
        assert_eq!(fitnesses(&pool), vec![20.0, 15.0]);
        assert_eq!(pool.entries()[1].genome, genome(0.3));
    }

    #[test]
    fn equal_to_minimum_is_a_no_op() {
        let mut pool = GenePool::new(2);
        pool.try_insert(20.0, &genome(0.2));
        pool.try_insert(10.0, &genome(0.1));
        let before = pool.clone();
        assert_eq!(pool.try_insert(10.0, &genome(0.9)), InsertOutcome::Rejected);
        assert_eq!(pool, before);
    }

    #[test]
    fn non_finite_fitness_and_zero_capacity_reject() {
        let mut pool = GenePool::new(3);
        assert_eq!(pool.try_insert(f32::NAN, &genome(0.0)), InsertOutcome::Rejected);
        let mut empty = GenePool::new(0);
        assert_eq!(empty.try_insert(1.0, &genome(0.0)), InsertOutcome::Rejected);
        assert!(pool.is_empty() && empty.is_empty());
    }

    #[test]
    fn stays_sorted_and_bounded_under_churn() {
        let mut rng = SmallRng::seed_from_u64(0xDEADBEEF);
        let mut pool = GenePool::new(8);
        for i in 0..200 {
            let fitness = rng.random_range(0.0..1_000.0);
            pool.try_insert(fitness, &genome(i as f32 * 0.001));
            assert!(pool.len() <= 8);
            assert!(
                pool.entries()
                    .windows(2)
                    .all(|pair| pair[0].fitness >= pair[1].fitness)
            );
        }
    }

    #[test]
    fn from_entries_sorts_and_truncates() {
        let entries = vec![
            GeneEntry::new(1.0, genome(0.1)),
            GeneEntry::new(3.0, genome(0.3)),
            GeneEntry::new(2.0, genome(0.2)),
        ];
        let pool = GenePool::from_entries(2, entries);
        assert_eq!(fitnesses(&pool), vec![3.0, 2.0]);
    }

    #[test]
    fn prune_removes_near_duplicates_of_fitter_entries() {
        let mut pool = GenePool::new(10);
        pool.try_insert(50.0, &genome(0.0));
        pool.try_insert(40.0, &genome(0.05));
        pool.try_insert(30.0, &genome(1.0));
        pool.try_insert(20.0, &genome(1.1));
        pool.try_insert(10.0, &genome(-1.0));
        let removed = pool.prune_for_diversity(0.2);
        assert_eq!(removed, 2);
        assert_eq!(fitnesses(&pool), vec![50.0, 30.0, 10.0]);
    }

    #[test]
    fn diversity_is_mean_pairwise_distance() {
        let mut pool = GenePool::new(3);
        assert_eq!(pool.diversity(), 0.0);
        pool.try_insert(2.0, &genome(0.0));
        pool.try_insert(1.0, &genome(1.0));
        assert!((pool.diversity() - 1.0).abs() < 1e-6);
        let matrix = pool.distance_matrix();
        assert_eq!(matrix[0][0], 0.0);
        assert!((matrix[0][1] - matrix[1][0]).abs() < 1e-6);
    }

    #[test]
    fn sample_on_empty_pool_is_none() {
        let mut rng = SmallRng::seed_from_u64(1);
        let pool = GenePool::new(4);
        assert!(pool.sample(&mut rng).is_none());
    }

    #[test]
    fn hall_of_fame_deduplicates_genomes() {
        let mut hof = HallOfFame::new(2);
        assert_eq!(hof.try_insert(10.0, &genome(0.5)), InsertOutcome::Appended);
        assert_eq!(hof.try_insert(5.0, &genome(0.5)), InsertOutcome::Rejected);
        assert_eq!(hof.try_insert(12.0, &genome(0.5)), InsertOutcome::Replaced);
        assert_eq!(hof.len(), 1);
        assert_eq!(hof.best().map(|entry| entry.fitness), Some(12.0));
        hof.try_insert(3.0, &genome(0.1));
        assert_eq!(hof.try_insert(2.0, &genome(0.2)), InsertOutcome::Rejected);
        assert_eq!(hof.len(), 2);
    }
}
