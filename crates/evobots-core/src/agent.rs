use evobots_brain::Genome;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::{AgentId, Position, SensorState};

/// How an agent picks its heading and speed each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DecisionPolicy {
    /// Evolved network driven by smoothed sensor inputs.
    Neural(Genome),
    /// Hunter: chase the nearest edible agent not claimed by another hunter.
    Pursuit,
    /// Human: steer toward the externally supplied pointer.
    PointerFollow,
}

/// Where an agent's genome came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpawnOrigin {
    Fresh,
    Seeded,
    HallOfFame,
    EliteClone,
    Crossover,
    Mitosis,
    Hunter,
    Human,
}

/// Counters feeding the fitness function.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LifetimeStats {
    pub food_eaten: u32,
    pub lifetime_ticks: u64,
    /// Ticks since the last meal or hunger step.
    pub hunger_ticks: u32,
    pub players_eaten: u32,
    pub distance_traveled: f32,
    pub visited_cells: HashSet<(i32, i32)>,
    pub ticks_near_wall: u64,
}

/// A single simulated body: physics state, counters and decision policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub position: Position,
    pub size: u32,
    pub heading: f32,
    pub speed: f32,
    pub alive: bool,
    /// Current reserve, drawn down by hunger.
    pub food_count: u32,
    pub stats: LifetimeStats,
    pub sensors: SensorState,
    pub policy: DecisionPolicy,
    pub origin: SpawnOrigin,
    /// Prey currently chased by a hunter.
    pub target: Option<AgentId>,
}

impl Agent {
    /// Construct a living agent with fresh counters.
    #[must_use]
    pub fn new(
        position: Position,
        size: u32,
        heading: f32,
        policy: DecisionPolicy,
        origin: SpawnOrigin,
    ) -> Self {
        Self {
            position,
            size,
            heading,
            speed: 0.0,
            alive: true,
            food_count: 0,
            stats: LifetimeStats::default(),
            sensors: SensorState::default(),
            policy,
            origin,
            target: None,
        }
    }

    #[must_use]
    pub fn is_hunter(&self) -> bool {
        matches!(self.policy, DecisionPolicy::Pursuit)
    }

    #[must_use]
    pub fn is_human(&self) -> bool {
        matches!(self.policy, DecisionPolicy::PointerFollow)
    }

    /// Bots are agents whose genomes compete in the gene pool.
    #[must_use]
    pub fn is_bot(&self) -> bool {
        matches!(self.policy, DecisionPolicy::Neural(_))
    }

    #[must_use]
    pub fn genome(&self) -> Option<&Genome> {
        match &self.policy {
            DecisionPolicy::Neural(genome) => Some(genome),
            _ => None,
        }
    }

    #[must_use]
    pub fn radius(&self) -> f32 {
        self.size as f32 * 0.5
    }

    /// Circle overlap: centre distance minus both radii is non-positive.
    #[must_use]
    pub fn overlaps(&self, position: Position, radius: f32) -> bool {
        self.position.distance(position) - self.radius() - radius <= 0.0
    }

    /// Whether this agent is large enough to eat `other`.
    #[must_use]
    pub fn can_eat(&self, other: &Agent, ratio: f32) -> bool {
        self.size as f32 > other.size as f32 * ratio
    }

    /// Mark a visit to the exploration cell containing the current position.
    pub fn visit_cell(&mut self, cell_size: f32) {
        let cell = (
            (self.position.x / cell_size).floor() as i32,
            (self.position.y / cell_size).floor() as i32,
        );
        self.stats.visited_cells.insert(cell);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bot(x: f32, y: f32, size: u32) -> Agent {
        Agent::new(
            Position::new(x, y),
            size,
            0.0,
            DecisionPolicy::Neural(Genome::filled(0.0, 0.0)),
            SpawnOrigin::Fresh,
        )
    }

    #[test]
    fn overlap_uses_edge_distance() {
        let a = bot(0.0, 0.0, 20);
        assert!(a.overlaps(Position::new(15.0, 0.0), 5.0));
        assert!(!a.overlaps(Position::new(15.1, 0.0), 5.0));
    }

    #[test]
    fn eating_requires_size_ratio() {
        let big = bot(0.0, 0.0, 20);
        let small = bot(0.0, 0.0, 10);
        let medium = bot(0.0, 0.0, 17);
        assert!(big.can_eat(&small, 1.2));
        assert!(!big.can_eat(&medium, 1.2));
        assert!(!small.can_eat(&big, 1.2));
    }

    #[test]
    fn exploration_cells_are_deduplicated() {
        let mut agent = bot(5.0, 5.0, 10);
        agent.visit_cell(32.0);
        agent.position = Position::new(20.0, 20.0);
        agent.visit_cell(32.0);
        agent.position = Position::new(40.0, 20.0);
        agent.visit_cell(32.0);
        assert_eq!(agent.stats.visited_cells.len(), 2);
    }

    #[test]
    fn policy_classification() {
        let hunter = Agent::new(
            Position::default(),
            25,
            0.0,
            DecisionPolicy::Pursuit,
            SpawnOrigin::Hunter,
        );
        assert!(hunter.is_hunter());
        assert!(!hunter.is_bot());
        assert!(hunter.genome().is_none());
        assert!(bot(0.0, 0.0, 10).genome().is_some());
    }
}
