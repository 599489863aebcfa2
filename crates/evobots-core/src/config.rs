use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when constructing world state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorldStateError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error("spatial index rejected configuration: {0}")]
    Index(#[from] evobots_index::IndexError),
}

/// Weights and gates of the lifetime fitness function.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FitnessWeights {
    pub food: f32,
    pub life: f32,
    pub explore: f32,
    pub players: f32,
    /// Added once per tick spent within `wall_margin` of a boundary; negative.
    pub wall_penalty: f32,
    pub min_food: u32,
    pub min_life: u64,
    pub early_death_threshold: u64,
    pub early_death_penalty: f32,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            food: 10.0,
            life: 1.0,
            explore: 3.0,
            players: 25.0,
            wall_penalty: -0.05,
            min_food: 2,
            min_life: 1_000,
            early_death_threshold: 500,
            early_death_penalty: 50.0,
        }
    }
}

/// Per-channel sensor gains applied after normalisation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SensorGains {
    pub food_distance: f32,
    pub food_angle: f32,
    pub agent_distance: f32,
    pub agent_angle: f32,
    pub wall: f32,
    pub speed: f32,
    pub size_difference: f32,
    pub own_size: f32,
    pub own_food: f32,
}

impl Default for SensorGains {
    fn default() -> Self {
        Self {
            food_distance: 50.0,
            food_angle: 50.0,
            agent_distance: 30.0,
            agent_angle: 30.0,
            wall: 10.0,
            speed: 10.0,
            size_difference: 30.0,
            own_size: 20.0,
            own_food: 20.0,
        }
    }
}

/// Gene pool, hall of fame, refill and mutation-rate tuning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EvolutionSettings {
    pub gene_pool_capacity: usize,
    pub hall_of_fame_capacity: usize,
    /// Dead agents must score strictly above this to be offered to the pool.
    pub pool_fitness_floor: f32,
    pub check_interval: u64,
    /// Fraction of `min_bots` kept as elites (at least one).
    pub elite_fraction: f32,
    pub elite_min_food: u32,
    pub elite_min_life: u64,
    /// Extra top performers offered to the pool per maintenance round.
    pub pool_offer_cap: usize,
    pub prune_min_distance: f32,
    pub tournament_size: usize,
    pub hall_of_fame_chance: f32,
    pub random_chance: f32,
    pub clone_chance: f32,
    pub base_mutation_rate: f32,
    pub mutation_growth: f32,
    pub max_mutation_rate: f32,
    pub mutation_patience: u32,
    pub mutation_attempt_scale: f32,
}

impl Default for EvolutionSettings {
    fn default() -> Self {
        Self {
            gene_pool_capacity: 50,
            hall_of_fame_capacity: 10,
            pool_fitness_floor: 0.0,
            check_interval: 500,
            elite_fraction: 0.1,
            elite_min_food: 2,
            elite_min_life: 2_000,
            pool_offer_cap: 5,
            prune_min_distance: 0.2,
            tournament_size: 5,
            hall_of_fame_chance: 0.05,
            random_chance: 0.3,
            clone_chance: 0.4,
            base_mutation_rate: 0.3,
            mutation_growth: 1.5,
            max_mutation_rate: 2.0,
            mutation_patience: 3,
            mutation_attempt_scale: 10.0,
        }
    }
}

/// Pursuit agents that prey on smaller players.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HunterSettings {
    pub count: usize,
    pub size: u32,
    pub speed: f32,
    /// A hunter only targets agents it exceeds by this size ratio.
    pub prey_ratio: f32,
    pub heading_noise: f32,
}

impl Default for HunterSettings {
    fn default() -> Self {
        Self {
            count: 5,
            size: 25,
            speed: 0.2,
            prey_ratio: 1.2,
            heading_noise: 0.2,
        }
    }
}

/// Static configuration for an EvoBots world.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EvoBotsConfig {
    /// Width of the world in world units.
    pub world_width: f32,
    /// Height of the world in world units.
    pub world_height: f32,
    pub default_size: u32,
    pub min_size: u32,
    pub max_size: u32,
    pub max_speed: f32,
    /// Lower bound on the size-dependent speed factor.
    pub min_speed_factor: f32,
    /// Maximum heading change per tick, radians.
    pub max_turn: f32,
    pub food_size: f32,
    pub food_count: usize,
    /// Ticks between hunger checks.
    pub kill_time: u32,
    pub kill_on_starvation: bool,
    /// Largest food value covered by the size lookup table.
    pub max_table_food: u32,
    /// Food needed to cover ~63% of the gap between default and max size.
    pub food_size_scale: f32,
    /// A player only eats agents it exceeds by this size ratio.
    pub eat_size_ratio: f32,
    pub eaten_transfer_fraction: f32,
    pub eaten_food_bonus: u32,
    /// Per-tick split probability; zero disables mitosis.
    pub mitosis_chance: f32,
    pub mitosis_perturbation: f32,
    pub grid_cell_size: f32,
    pub exploration_cell_size: f32,
    pub wall_margin: f32,
    pub initial_bots: usize,
    pub min_bots: usize,
    pub hunters: HunterSettings,
    pub human_player: bool,
    /// Smoothing factor for sensor low-pass filtering.
    pub sensor_alpha: f32,
    pub sensor_gains: SensorGains,
    pub fitness: FitnessWeights,
    pub evolution: EvolutionSettings,
    /// Number of tick summaries kept in history.
    pub history_capacity: usize,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
}

impl Default for EvoBotsConfig {
    fn default() -> Self {
        Self {
            world_width: 1_024.0,
            world_height: 768.0,
            default_size: 10,
            min_size: 4,
            max_size: 100,
            max_speed: 2.0,
            min_speed_factor: 0.3,
            max_turn: 1.0,
            food_size: 5.0,
            food_count: 25,
            kill_time: 500,
            kill_on_starvation: true,
            max_table_food: 400,
            food_size_scale: 40.0,
            eat_size_ratio: 1.2,
            eaten_transfer_fraction: 0.5,
            eaten_food_bonus: 1,
            mitosis_chance: 0.0,
            mitosis_perturbation: 0.05,
            grid_cell_size: 64.0,
            exploration_cell_size: 32.0,
            wall_margin: 20.0,
            initial_bots: 25,
            min_bots: 25,
            hunters: HunterSettings::default(),
            human_player: false,
            sensor_alpha: 0.2,
            sensor_gains: SensorGains::default(),
            fitness: FitnessWeights::default(),
            evolution: EvolutionSettings::default(),
            history_capacity: 256,
            rng_seed: None,
        }
    }
}

impl EvoBotsConfig {
    /// Check every value the simulation relies on.
    pub fn validate(&self) -> Result<(), WorldStateError> {
        if !(self.world_width > 0.0 && self.world_height > 0.0) {
            return Err(WorldStateError::InvalidConfig(
                "world dimensions must be positive",
            ));
        }
        if self.min_size == 0 || self.min_size > self.default_size || self.default_size > self.max_size
        {
            return Err(WorldStateError::InvalidConfig(
                "sizes must satisfy 0 < min_size <= default_size <= max_size",
            ));
        }
        if self.max_size as f32 >= self.world_width.min(self.world_height) {
            return Err(WorldStateError::InvalidConfig(
                "max_size must be smaller than the world",
            ));
        }
        if self.max_speed <= 0.0 || self.min_speed_factor <= 0.0 || self.max_turn <= 0.0 {
            return Err(WorldStateError::InvalidConfig(
                "speed and turn limits must be positive",
            ));
        }
        if self.food_size <= 0.0 {
            return Err(WorldStateError::InvalidConfig("food_size must be positive"));
        }
        if self.kill_time == 0 {
            return Err(WorldStateError::InvalidConfig("kill_time must be non-zero"));
        }
        if self.eat_size_ratio <= 0.0 {
            return Err(WorldStateError::InvalidConfig("eat_size_ratio must be positive"));
        }
        if self.max_table_food == 0 || self.food_size_scale <= 0.0 {
            return Err(WorldStateError::InvalidConfig(
                "size table parameters must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.eaten_transfer_fraction)
            || !(0.0..=1.0).contains(&self.mitosis_chance)
            || self.mitosis_perturbation < 0.0
        {
            return Err(WorldStateError::InvalidConfig(
                "transfer fraction and mitosis chance must be in [0, 1]",
            ));
        }
        if self.grid_cell_size <= 0.0 || self.exploration_cell_size <= 0.0 || self.wall_margin < 0.0
        {
            return Err(WorldStateError::InvalidConfig(
                "cell sizes must be positive and wall_margin non-negative",
            ));
        }
        if self.hunters.count > 0
            && (self.hunters.size == 0 || self.hunters.speed < 0.0 || self.hunters.prey_ratio <= 0.0)
        {
            return Err(WorldStateError::InvalidConfig(
                "hunter size and prey ratio must be positive",
            ));
        }
        if self.hunters.count > 0
            && self.hunters.size as f32 >= self.world_width.min(self.world_height)
        {
            return Err(WorldStateError::InvalidConfig(
                "hunter size must be smaller than the world",
            ));
        }
        if !(0.0..=1.0).contains(&self.sensor_alpha) {
            return Err(WorldStateError::InvalidConfig("sensor_alpha must be in [0, 1]"));
        }
        let evo = &self.evolution;
        if evo.check_interval == 0 || evo.tournament_size == 0 {
            return Err(WorldStateError::InvalidConfig(
                "check_interval and tournament_size must be non-zero",
            ));
        }
        for chance in [
            evo.elite_fraction,
            evo.hall_of_fame_chance,
            evo.random_chance,
            evo.clone_chance,
        ] {
            if !(0.0..=1.0).contains(&chance) {
                return Err(WorldStateError::InvalidConfig(
                    "evolution probabilities must be in [0, 1]",
                ));
            }
        }
        if evo.base_mutation_rate < 0.0
            || evo.max_mutation_rate < evo.base_mutation_rate
            || evo.mutation_growth < 1.0
            || evo.mutation_attempt_scale < 0.0
            || evo.prune_min_distance < 0.0
        {
            return Err(WorldStateError::InvalidConfig(
                "mutation rates must satisfy 0 <= base <= max and growth >= 1",
            ));
        }
        if self.history_capacity == 0 {
            return Err(WorldStateError::InvalidConfig(
                "history_capacity must be non-zero",
            ));
        }
        Ok(())
    }

    /// Number of elites retained at each maintenance round.
    #[must_use]
    pub fn elite_count(&self) -> usize {
        ((self.min_bots as f32 * self.evolution.elite_fraction).round() as usize).max(1)
    }

    /// Returns the configured RNG seed, generating one from entropy if absent.
    pub(crate) fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}
