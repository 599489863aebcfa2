use crate::{FitnessWeights, LifetimeStats};

/// Weighted linear fitness of an agent's lifetime.
///
/// Agents below `min_food` or `min_life` score zero before the penalty; short
/// lives pay `early_death_penalty` whether gated or not.
#[must_use]
pub fn fitness(stats: &LifetimeStats, weights: &FitnessWeights) -> f32 {
    let gated = stats.food_eaten < weights.min_food || stats.lifetime_ticks < weights.min_life;
    let mut score = if gated {
        0.0
    } else {
        weights.food * stats.food_eaten as f32
            + weights.life * stats.lifetime_ticks as f32
            + weights.explore * stats.visited_cells.len() as f32
            + weights.players * stats.players_eaten as f32
            + weights.wall_penalty * stats.ticks_near_wall as f32
    };
    if stats.lifetime_ticks < weights.early_death_threshold {
        score -= weights.early_death_penalty;
    }
    score
}
