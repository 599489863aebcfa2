use evobots_brain::{Genome, crossover, mutate};
use ordered_float::OrderedFloat;
use rand::RngCore;
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};

use crate::{EvolutionSettings, GeneEntry, GenePool};

/// Draw `k` distinct entries (fewer if the slice is shorter) and return the
/// index of the fittest, or `None` for an empty slice.
pub fn tournament_select(entries: &[GeneEntry], k: usize, rng: &mut dyn RngCore) -> Option<usize> {
    if entries.is_empty() || k == 0 {
        return None;
    }
    let amount = k.min(entries.len());
    sample(rng, entries.len(), amount)
        .into_iter()
        .max_by_key(|&idx| OrderedFloat(entries[idx].fitness))
}

/// Two tournament winners; the second tournament excludes the first winner.
/// Returns `None` when fewer than two entries exist.
pub fn select_parents(
    entries: &[GeneEntry],
    k: usize,
    rng: &mut dyn RngCore,
) -> Option<(usize, usize)> {
    if entries.len() < 2 {
        return None;
    }
    let first = tournament_select(entries, k, rng)?;
    let amount = k.min(entries.len() - 1);
    let second = sample(rng, entries.len() - 1, amount)
        .into_iter()
        .map(|idx| if idx >= first { idx + 1 } else { idx })
        .max_by_key(|&idx| OrderedFloat(entries[idx].fitness))?;
    Some((first, second))
}

/// Crossover child of two tournament winners, mutated with `attempts` point
/// mutations. `None` when the pool cannot supply two distinct parents.
pub fn breed(pool: &GenePool, k: usize, attempts: usize, rng: &mut dyn RngCore) -> Option<Genome> {
    let entries = pool.entries();
    let (a, b) = select_parents(entries, k, rng)?;
    let mut child = crossover(&entries[a].genome, &entries[b].genome, rng);
    mutate(&mut child, attempts, rng);
    Some(child)
}

/// Mutation rate that grows while the pool's best fitness stalls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveMutation {
    base: f32,
    growth: f32,
    max: f32,
    patience: u32,
    rate: f32,
    stalled_checks: u32,
    best_seen: Option<f32>,
}

impl AdaptiveMutation {
    #[must_use]
    pub fn new(settings: &EvolutionSettings) -> Self {
        Self {
            base: settings.base_mutation_rate,
            growth: settings.mutation_growth,
            max: settings.max_mutation_rate,
            patience: settings.mutation_patience,
            rate: settings.base_mutation_rate,
            stalled_checks: 0,
            best_seen: None,
        }
    }

    #[must_use]
    pub const fn rate(&self) -> f32 {
        self.rate
    }

    #[must_use]
    pub const fn stalled_checks(&self) -> u32 {
        self.stalled_checks
    }

    /// Record the pool's best fitness at a maintenance check; returns the new rate.
    pub fn observe(&mut self, best: Option<f32>) -> f32 {
        let improved = match (best, self.best_seen) {
            (Some(current), Some(previous)) => current > previous,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if improved {
            self.best_seen = best;
            self.rate = self.base;
            self.stalled_checks = 0;
        } else {
            self.stalled_checks += 1;
            if self.stalled_checks >= self.patience.max(1) {
                self.rate = (self.rate * self.growth).min(self.max);
                self.stalled_checks = 0;
            }
        }
        self.rate
    }

    /// Point-mutation count for the current rate; always at least one.
    #[must_use]
    pub fn attempts(&self, scale: f32) -> usize {
        ((scale * self.rate).round() as usize).max(1)
    }
}
