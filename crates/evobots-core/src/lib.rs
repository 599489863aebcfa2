//! Core simulation types for EvoBots: agents, the gene pool and the
//! population control loop that keeps an evolving world populated.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

mod agent;
mod arena;
mod config;
mod fitness;
mod gene_pool;
mod population;
mod reproduction;
mod sensors;
mod size;
mod world;

pub use agent::{Agent, DecisionPolicy, LifetimeStats, SpawnOrigin};
pub use arena::AgentArena;
pub use config::{
    EvoBotsConfig, EvolutionSettings, FitnessWeights, HunterSettings, SensorGains,
    WorldStateError,
};
pub use fitness::fitness;
pub use gene_pool::{GeneEntry, GenePool, HallOfFame, InsertOutcome};
pub use population::{MaintenanceReport, PopulationManager, RefillChoice, rank_bots};
pub use reproduction::{AdaptiveMutation, breed, select_parents, tournament_select};
pub use sensors::{SensorFrame, SensorState};
pub use size::SizeTable;
pub use world::{Food, PopulationStats, TickSummary, WorldState};

pub use evobots_brain::{Genome, INPUT_SIZE, OUTPUT_SIZE};

new_key_type! {
    /// Stable handle for agents backed by a generational slot map.
    pub struct AgentId;
    /// Stable handle for food pellets.
    pub struct FoodId;
}

const FULL_TURN: f32 = std::f32::consts::TAU;
const HALF_TURN: f32 = std::f32::consts::PI;

fn wrap_signed_angle(mut angle: f32) -> f32 {
    if angle.is_nan() {
        return 0.0;
    }
    while angle <= -HALF_TURN {
        angle += FULL_TURN;
    }
    while angle > HALF_TURN {
        angle -= FULL_TURN;
    }
    angle
}

fn wrap_unsigned_angle(angle: f32) -> f32 {
    if angle.is_nan() {
        return 0.0;
    }
    angle.rem_euclid(FULL_TURN)
}

/// Monotonic simulation tick counter.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// World-space point; agents and food are addressed by their centre.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance_sq(self, other: Self) -> f32 {
        (self.x - other.x).powi(2) + (self.y - other.y).powi(2)
    }

    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        self.distance_sq(other).sqrt()
    }

    #[must_use]
    pub const fn as_tuple(self) -> (f32, f32) {
        (self.x, self.y)
    }
}
