use evobots_brain::perturb;
use evobots_index::{NeighborhoodIndex, UniformGridIndex};
use rand::{Rng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use tracing::{debug, info, warn};

use crate::{
    Agent, AgentArena, AgentId, DecisionPolicy, EvoBotsConfig, FoodId, GeneEntry,
    MaintenanceReport, PopulationManager, Position, SensorFrame, SizeTable, SpawnOrigin, Tick,
    WorldStateError, rank_bots, wrap_signed_angle, wrap_unsigned_angle,
};

/// Candidate positions tried before a spawn accepts an overlapping spot.
const SPAWN_ATTEMPTS: usize = 32;

/// A food pellet addressed by its centre.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Food {
    pub position: Position,
    pub size: f32,
}

impl Food {
    #[must_use]
    pub fn radius(&self) -> f32 {
        self.size * 0.5
    }
}

/// Summary recorded after each tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickSummary {
    pub tick: Tick,
    pub living_bots: usize,
    pub hunters: usize,
    pub food: usize,
    pub births: usize,
    pub deaths: usize,
    pub pool_size: usize,
    pub hall_of_fame_size: usize,
    pub best_fitness: Option<f32>,
    pub mutation_rate: f32,
    /// Set on ticks that ran periodic maintenance.
    pub maintenance: Option<MaintenanceReport>,
}

/// Snapshot of the currently fittest living bot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopulationStats {
    pub id: AgentId,
    pub fitness: f32,
    pub lifetime_ticks: u64,
    pub food_eaten: u32,
    pub players_eaten: u32,
    pub size: u32,
}

/// Heading and speed chosen for one agent this tick.
#[derive(Debug, Clone, Copy)]
struct Steer {
    heading: f32,
    speed: f32,
}

pub struct WorldState {
    config: EvoBotsConfig,
    tick: Tick,
    rng: SmallRng,
    agents: AgentArena,
    food: SlotMap<FoodId, Food>,
    sizes: SizeTable,
    population: PopulationManager,
    agent_index: UniformGridIndex,
    agent_slots: Vec<AgentId>,
    food_index: UniformGridIndex,
    food_slots: Vec<FoodId>,
    pointer: Option<Position>,
    pending_spawns: Vec<Agent>,
    last_births: usize,
    last_deaths: usize,
    history: VecDeque<TickSummary>,
}

impl fmt::Debug for WorldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldState")
            .field("tick", &self.tick)
            .field("agent_count", &self.agents.len())
            .field("food_count", &self.food.len())
            .field("pool_size", &self.population.pool().len())
            .finish()
    }
}

impl WorldState {
    /// Instantiate a new world with empty archives.
    pub fn new(config: EvoBotsConfig) -> Result<Self, WorldStateError> {
        Self::with_archives(config, Vec::new(), Vec::new())
    }

    /// Instantiate a world whose gene pool and hall of fame start from loaded
    /// entries. Initial bots sample their genomes from a non-empty pool.
    pub fn with_archives(
        config: EvoBotsConfig,
        pool: Vec<GeneEntry>,
        hall_of_fame: Vec<GeneEntry>,
    ) -> Result<Self, WorldStateError> {
        config.validate()?;
        let mut agent_index =
            UniformGridIndex::new(config.grid_cell_size, config.world_width, config.world_height);
        let mut food_index = agent_index.clone();
        agent_index.rebuild(&[])?;
        food_index.rebuild(&[])?;

        let mut population = PopulationManager::new(&config);
        population.restore(pool, hall_of_fame);
        let history_capacity = config.history_capacity;
        let mut world = Self {
            rng: config.seeded_rng(),
            sizes: SizeTable::new(&config),
            config,
            tick: Tick::zero(),
            agents: AgentArena::new(),
            food: SlotMap::with_key(),
            population,
            agent_index,
            agent_slots: Vec::new(),
            food_index,
            food_slots: Vec::new(),
            pointer: None,
            pending_spawns: Vec::new(),
            last_births: 0,
            last_deaths: 0,
            history: VecDeque::with_capacity(history_capacity),
        };
        world.populate();
        info!(
            bots = world.living_bots(),
            hunters = world.hunter_count(),
            food = world.food.len(),
            pool = world.population.pool().len(),
            "world initialised"
        );
        Ok(world)
    }

    fn populate(&mut self) {
        for _ in 0..self.config.food_count {
            self.spawn_random_food();
        }
        for _ in 0..self.config.hunters.count {
            let size = self.config.hunters.size;
            let position = self.free_position(size as f32 * 0.5);
            let heading = self.rng.random_range(0.0..crate::FULL_TURN);
            let mut hunter = Agent::new(
                position,
                size,
                heading,
                DecisionPolicy::Pursuit,
                SpawnOrigin::Hunter,
            );
            hunter.speed = self.config.hunters.speed;
            self.agents.insert(hunter);
        }
        if self.config.human_player {
            let position =
                Position::new(self.config.world_width * 0.5, self.config.world_height * 0.5);
            self.agents.insert(Agent::new(
                position,
                self.config.default_size,
                0.0,
                DecisionPolicy::PointerFollow,
                SpawnOrigin::Human,
            ));
        }
        for _ in 0..self.config.initial_bots {
            let seeded = self
                .population
                .pool()
                .sample(&mut self.rng)
                .map(|entry| entry.genome.clone());
            match seeded {
                Some(genome) => self.spawn_bot(genome, SpawnOrigin::Seeded),
                None => {
                    let genome = evobots_brain::Genome::random(&mut self.rng);
                    self.spawn_bot(genome, SpawnOrigin::Fresh)
                }
            };
        }
    }

    /// Advance the simulation by one tick.
    pub fn step(&mut self) -> TickSummary {
        let next_tick = self.tick.next();
        self.last_births = 0;
        self.last_deaths = 0;

        self.stage_index();
        self.stage_agents();
        self.stage_spawn_commit();
        self.stage_death_sweep();
        let maintenance = next_tick
            .0
            .is_multiple_of(self.config.evolution.check_interval)
            .then(|| self.stage_maintenance());
        self.stage_refill();

        self.tick = next_tick;
        let summary = self.summarize(maintenance);
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(summary.clone());
        summary
    }

    fn stage_index(&mut self) {
        self.agent_slots.clear();
        let mut positions = Vec::with_capacity(self.agents.len());
        for (id, agent) in self.agents.iter() {
            if agent.alive {
                self.agent_slots.push(id);
                positions.push(agent.position.as_tuple());
            }
        }
        if let Err(err) = self.agent_index.rebuild(&positions) {
            warn!(?err, "agent index rebuild failed");
        }

        self.food_slots.clear();
        positions.clear();
        for (id, food) in &self.food {
            self.food_slots.push(id);
            positions.push(food.position.as_tuple());
        }
        if let Err(err) = self.food_index.rebuild(&positions) {
            warn!(?err, "food index rebuild failed");
        }
    }

    fn stage_agents(&mut self) {
        let handles: Vec<AgentId> = self.agents.iter_handles().collect();
        let mut claimed: HashSet<AgentId> = HashSet::new();
        for id in handles {
            if !self.advance_clocks(id) {
                continue;
            }
            if self.try_mitosis(id) {
                continue;
            }
            let Some(agent) = self.agents.get(id) else {
                continue;
            };
            let steer = if agent.is_hunter() {
                self.pursuit_steer(id, &mut claimed)
            } else if agent.is_human() {
                self.pointer_steer(id)
            } else {
                self.neural_steer(id)
            };
            if let Some(steer) = steer {
                self.integrate(id, steer);
            }
            self.consume_food(id);
            self.consume_agents(id);
            self.track_wall(id);
        }
    }

    /// Lifetime, exploration and hunger bookkeeping. Returns false when the
    /// agent is (or just became) dead.
    fn advance_clocks(&mut self, id: AgentId) -> bool {
        let Some(agent) = self.agents.get_mut(id) else {
            return false;
        };
        if !agent.alive {
            return false;
        }
        agent.stats.lifetime_ticks += 1;
        agent.visit_cell(self.config.exploration_cell_size);
        if agent.is_hunter() {
            return true;
        }
        agent.stats.hunger_ticks += 1;
        if agent.stats.hunger_ticks >= self.config.kill_time {
            agent.stats.hunger_ticks = 0;
            if agent.food_count > 0 {
                agent.food_count -= 1;
                agent.size = self.sizes.shrink(agent.size);
            } else if self.config.kill_on_starvation {
                agent.alive = false;
                return false;
            }
        }
        true
    }

    fn try_mitosis(&mut self, id: AgentId) -> bool {
        let chance = self.config.mitosis_chance;
        if chance <= 0.0 {
            return false;
        }
        let Some(parent) = self.agents.get_mut(id) else {
            return false;
        };
        if !parent.is_bot() || parent.food_count < 2 || self.rng.random::<f32>() >= chance {
            return false;
        }
        let Some(genome) = parent.genome().cloned() else {
            return false;
        };
        parent.alive = false;
        let size = (parent.size / 2).max(self.config.min_size);
        let food_count = parent.food_count / 2;
        let (position, heading) = (parent.position, parent.heading);
        for _ in 0..2 {
            let mut child_genome = genome.clone();
            perturb(&mut child_genome, self.config.mitosis_perturbation, &mut self.rng);
            let mut child = Agent::new(
                position,
                size,
                heading,
                DecisionPolicy::Neural(child_genome),
                SpawnOrigin::Mitosis,
            );
            child.food_count = food_count;
            self.pending_spawns.push(child);
        }
        true
    }

    fn sensor_frame(&self, id: AgentId) -> Option<SensorFrame> {
        let agent = self.agents.get(id)?;
        let origin = agent.position.as_tuple();

        let nearest_food = self
            .food_index
            .nearest(origin, &mut |slot| self.food.contains_key(self.food_slots[slot]))
            .and_then(|(slot, _)| self.food.get(self.food_slots[slot]))
            .map(|food| (food.position.x - origin.0, food.position.y - origin.1));

        let nearest_agent = self
            .agent_index
            .nearest(origin, &mut |slot| {
                let other = self.agent_slots[slot];
                other != id && self.agents.get(other).is_some_and(|a| a.alive)
            })
            .and_then(|(slot, _)| self.agents.get(self.agent_slots[slot]))
            .map(|other| {
                (
                    other.position.x - origin.0,
                    other.position.y - origin.1,
                    other.size,
                )
            });

        Some(SensorFrame {
            position: agent.position,
            heading: agent.heading,
            speed: agent.speed,
            size: agent.size,
            food_count: agent.food_count,
            nearest_food,
            nearest_agent,
        })
    }

    fn size_capped_speed(&self, size: u32) -> f32 {
        let factor = (self.config.default_size as f32 / size.max(1) as f32)
            .max(self.config.min_speed_factor);
        self.config.max_speed * factor
    }

    fn neural_steer(&mut self, id: AgentId) -> Option<Steer> {
        let raw = self.sensor_frame(id)?.raw_inputs(&self.config);
        let max_speed = self.size_capped_speed(self.agents.get(id)?.size);
        let alpha = self.config.sensor_alpha;
        let max_turn = self.config.max_turn;
        let agent = self.agents.get_mut(id)?;
        let inputs = agent.sensors.update(&raw, alpha);
        let DecisionPolicy::Neural(genome) = &agent.policy else {
            return None;
        };
        let output = genome.predict(&inputs, &mut self.rng);
        let turn = wrap_signed_angle(output.heading - agent.heading).clamp(-max_turn, max_turn);
        Some(Steer {
            heading: wrap_unsigned_angle(agent.heading + turn),
            speed: output.speed_fraction.clamp(0.0, 1.0) * max_speed,
        })
    }

    fn pursuit_steer(&mut self, id: AgentId, claimed: &mut HashSet<AgentId>) -> Option<Steer> {
        let hunter = self.agents.get(id)?;
        let origin = hunter.position;
        let ratio = self.config.hunters.prey_ratio;
        let pick = |exclude_claimed: bool| {
            self.agent_index
                .nearest(origin.as_tuple(), &mut |slot| {
                    let other = self.agent_slots[slot];
                    if other == id || (exclude_claimed && claimed.contains(&other)) {
                        return false;
                    }
                    self.agents.get(other).is_some_and(|prey| {
                        prey.alive && !prey.is_hunter() && hunter.can_eat(prey, ratio)
                    })
                })
                .map(|(slot, _)| self.agent_slots[slot])
        };
        let target = pick(true).or_else(|| pick(false));
        let target_position = target.and_then(|t| self.agents.get(t)).map(|prey| prey.position);

        if let Some(target) = target {
            claimed.insert(target);
        }
        let noise = self.config.hunters.heading_noise;
        let speed = self.config.hunters.speed;
        let hunter = self.agents.get_mut(id)?;
        hunter.target = target;
        let destination = target_position?;
        let (dx, dy) = (destination.x - origin.x, destination.y - origin.y);
        if dx * dx + dy * dy <= 1e-6 {
            return None;
        }
        let jitter = if noise > 0.0 {
            self.rng.random_range(-noise..=noise)
        } else {
            0.0
        };
        Some(Steer {
            heading: wrap_unsigned_angle(dy.atan2(dx) + jitter),
            speed,
        })
    }

    fn pointer_steer(&self, id: AgentId) -> Option<Steer> {
        let agent = self.agents.get(id)?;
        let pointer = self.pointer?;
        let (dx, dy) = (pointer.x - agent.position.x, pointer.y - agent.position.y);
        let distance = (dx * dx + dy * dy).sqrt();
        if distance < 1.0 {
            return Some(Steer {
                heading: agent.heading,
                speed: 0.0,
            });
        }
        Some(Steer {
            heading: wrap_unsigned_angle(dy.atan2(dx)),
            speed: self.size_capped_speed(agent.size).min(distance),
        })
    }

    fn integrate(&mut self, id: AgentId, steer: Steer) {
        let (width, height) = (self.config.world_width, self.config.world_height);
        let Some(agent) = self.agents.get_mut(id) else {
            return;
        };
        agent.heading = steer.heading;
        agent.speed = steer.speed;
        let radius = agent.radius();
        let before = agent.position;
        agent.position.x =
            (before.x + steer.heading.cos() * steer.speed).clamp(radius, width - radius);
        agent.position.y =
            (before.y + steer.heading.sin() * steer.speed).clamp(radius, height - radius);
        agent.stats.distance_traveled += before.distance(agent.position);
    }

    fn consume_food(&mut self, id: AgentId) {
        let Some(agent) = self.agents.get(id) else {
            return;
        };
        if !agent.alive || agent.is_hunter() {
            return;
        }
        let reach = agent.radius() + self.config.food_size * 0.5;
        let mut eaten: Vec<FoodId> = Vec::new();
        self.food_index
            .query_point(agent.position.as_tuple(), reach, &mut |slot, _| {
                let food_id = self.food_slots[slot];
                if let Some(food) = self.food.get(food_id)
                    && agent.overlaps(food.position, food.radius())
                {
                    eaten.push(food_id);
                }
            });
        if eaten.is_empty() {
            return;
        }

        let mut meals = 0u32;
        for food_id in eaten {
            if self.food.remove(food_id).is_some() {
                meals += 1;
            }
        }
        if let Some(agent) = self.agents.get_mut(id) {
            agent.food_count += meals;
            agent.stats.food_eaten += meals;
            agent.stats.hunger_ticks = 0;
            agent.size = self.sizes.grow(agent.size, meals);
        }
        for _ in 0..meals {
            self.spawn_random_food();
        }
    }

    fn consume_agents(&mut self, id: AgentId) {
        let Some(eater) = self.agents.get(id) else {
            return;
        };
        if !eater.alive {
            return;
        }
        let ratio = if eater.is_hunter() {
            self.config.hunters.prey_ratio
        } else {
            self.config.eat_size_ratio
        };
        // Others may have moved since the index snapshot.
        let slack = self.config.max_speed * self.config.default_size as f32
            / self.config.min_size as f32
            + 1.0;
        let reach = eater.radius() + self.config.max_size as f32 * 0.5 + slack;
        let mut victims: Vec<AgentId> = Vec::new();
        self.agent_index
            .query_point(eater.position.as_tuple(), reach, &mut |slot, _| {
                let other = self.agent_slots[slot];
                if other == id {
                    return;
                }
                if let Some(prey) = self.agents.get(other)
                    && prey.alive
                    && !prey.is_hunter()
                    && eater.can_eat(prey, ratio)
                    && eater.overlaps(prey.position, prey.radius())
                {
                    victims.push(other);
                }
            });

        let fraction = self.config.eaten_transfer_fraction;
        let bonus = self.config.eaten_food_bonus;
        for victim in victims {
            let Some((eater, prey)) = self.agents.pair_mut(id, victim) else {
                continue;
            };
            if !prey.alive {
                continue;
            }
            prey.alive = false;
            eater.stats.players_eaten += 1;
            if eater.is_hunter() {
                continue;
            }
            let transfer = (prey.food_count as f32 * fraction).ceil() as u32 + bonus;
            eater.food_count += transfer;
            eater.stats.food_eaten += transfer;
            eater.stats.hunger_ticks = 0;
            eater.size = self.sizes.grow(eater.size, transfer);
        }
    }

    fn track_wall(&mut self, id: AgentId) {
        let (width, height) = (self.config.world_width, self.config.world_height);
        let margin = self.config.wall_margin;
        let Some(agent) = self.agents.get_mut(id) else {
            return;
        };
        if !agent.alive {
            return;
        }
        let r = agent.radius();
        let Position { x, y } = agent.position;
        if x - r < margin || width - x - r < margin || y - r < margin || height - y - r < margin {
            agent.stats.ticks_near_wall += 1;
        }
    }

    fn stage_spawn_commit(&mut self) {
        if self.pending_spawns.is_empty() {
            return;
        }
        let spawns = std::mem::take(&mut self.pending_spawns);
        self.last_births += spawns.len();
        for agent in spawns {
            self.agents.insert(agent);
        }
    }

    fn stage_death_sweep(&mut self) {
        let dead: HashSet<AgentId> = self
            .agents
            .iter()
            .filter(|(_, agent)| !agent.alive && !agent.is_hunter())
            .map(|(id, _)| id)
            .collect();
        if dead.is_empty() {
            return;
        }
        let removed = self.agents.remove_many(&dead);
        self.last_deaths = removed.len();
        for (_, agent) in &removed {
            self.population.record_death(agent);
        }
    }

    fn stage_maintenance(&mut self) -> MaintenanceReport {
        let report = self.population.maintain(self.agents.as_slice());
        info!(
            tick = self.tick.next().0,
            bots = self.living_bots(),
            pool = self.population.pool().len(),
            best = ?report.best_fitness,
            diversity = report.diversity,
            mutation_rate = report.mutation_rate,
            "maintenance round"
        );
        report
    }

    fn stage_refill(&mut self) {
        // The human counts toward the floor; hunters do not.
        let mut living = self
            .agents
            .as_slice()
            .iter()
            .filter(|agent| agent.alive && !agent.is_hunter())
            .count();
        while living < self.config.min_bots {
            let choice = self.population.choose_refill(&mut self.rng);
            let origin = choice.origin();
            self.spawn_bot(choice.into_genome(), origin);
            self.last_births += 1;
            living += 1;
        }
    }

    fn summarize(&self, maintenance: Option<MaintenanceReport>) -> TickSummary {
        let summary = TickSummary {
            tick: self.tick,
            living_bots: self.living_bots(),
            hunters: self.hunter_count(),
            food: self.food.len(),
            births: self.last_births,
            deaths: self.last_deaths,
            pool_size: self.population.pool().len(),
            hall_of_fame_size: self.population.hall_of_fame().len(),
            best_fitness: self.population.pool().best().map(|entry| entry.fitness),
            mutation_rate: self.population.mutation_rate(),
            maintenance,
        };
        if summary.deaths > 0 || summary.births > 0 {
            debug!(
                tick = summary.tick.0,
                births = summary.births,
                deaths = summary.deaths,
                bots = summary.living_bots,
                "population churn"
            );
        }
        summary
    }

    /// Uniform position whose circle avoids live agents and food; after
    /// [`SPAWN_ATTEMPTS`] misses the last candidate is accepted.
    fn free_position(&mut self, radius: f32) -> Position {
        let (width, height) = (self.config.world_width, self.config.world_height);
        let mut candidate = Position::new(width * 0.5, height * 0.5);
        for _ in 0..SPAWN_ATTEMPTS {
            candidate = Position::new(
                self.rng.random_range(radius..=width - radius),
                self.rng.random_range(radius..=height - radius),
            );
            let blocked_by_agent = self
                .agents
                .iter()
                .any(|(_, agent)| agent.alive && agent.overlaps(candidate, radius));
            let blocked_by_food = self
                .food
                .values()
                .any(|food| food.position.distance(candidate) - food.radius() - radius <= 0.0);
            if !blocked_by_agent && !blocked_by_food {
                break;
            }
        }
        candidate
    }

    fn spawn_random_food(&mut self) -> FoodId {
        let size = self.config.food_size;
        let position = self.free_position(size * 0.5);
        self.food.insert(Food { position, size })
    }

    fn spawn_bot(&mut self, genome: evobots_brain::Genome, origin: SpawnOrigin) -> AgentId {
        let size = self.config.default_size;
        let position = self.free_position(size as f32 * 0.5);
        let heading = self.rng.random_range(0.0..crate::FULL_TURN);
        self.agents.insert(Agent::new(
            position,
            size,
            heading,
            DecisionPolicy::Neural(genome),
            origin,
        ))
    }

    /// Insert an agent directly, bypassing spawn placement.
    pub fn spawn_agent(&mut self, agent: Agent) -> AgentId {
        self.agents.insert(agent)
    }

    /// Place a food pellet at `position`.
    pub fn spawn_food_at(&mut self, position: Position) -> FoodId {
        self.food.insert(Food {
            position,
            size: self.config.food_size,
        })
    }

    /// Offer migrant genomes to the gene pool; returns how many were accepted.
    pub fn import_migrants(&mut self, migrants: &[GeneEntry]) -> usize {
        migrants
            .iter()
            .filter(|entry| {
                self.population
                    .offer(entry.fitness, &entry.genome)
                    .accepted()
            })
            .count()
    }

    /// Update the pointer followed by the human-controlled agent.
    pub fn set_pointer(&mut self, pointer: Option<Position>) {
        self.pointer = pointer;
    }

    /// Fittest living bot by the current fitness function.
    #[must_use]
    pub fn best_living(&self) -> Option<PopulationStats> {
        let agents = self.agents.as_slice();
        let &(idx, fitness) = rank_bots(agents, &self.config.fitness).first()?;
        let id = self.agents.iter_handles().nth(idx)?;
        let agent = &agents[idx];
        Some(PopulationStats {
            id,
            fitness,
            lifetime_ticks: agent.stats.lifetime_ticks,
            food_eaten: agent.stats.food_eaten,
            players_eaten: agent.stats.players_eaten,
            size: agent.size,
        })
    }

    /// Living agents that carry a genome.
    #[must_use]
    pub fn living_bots(&self) -> usize {
        self.agents
            .as_slice()
            .iter()
            .filter(|agent| agent.alive && agent.is_bot())
            .count()
    }

    #[must_use]
    pub fn hunter_count(&self) -> usize {
        self.agents
            .as_slice()
            .iter()
            .filter(|agent| agent.is_hunter())
            .count()
    }

    /// Returns an immutable reference to configuration.
    #[must_use]
    pub fn config(&self) -> &EvoBotsConfig {
        &self.config
    }

    /// Current simulation tick.
    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    #[must_use]
    pub fn agents(&self) -> &AgentArena {
        &self.agents
    }

    pub fn food(&self) -> impl Iterator<Item = (FoodId, &Food)> + '_ {
        self.food.iter()
    }

    #[must_use]
    pub fn food_count(&self) -> usize {
        self.food.len()
    }

    #[must_use]
    pub fn population(&self) -> &PopulationManager {
        &self.population
    }

    #[must_use]
    pub fn sizes(&self) -> &SizeTable {
        &self.sizes
    }

    /// Iterate over retained tick summaries.
    pub fn history(&self) -> impl Iterator<Item = &TickSummary> {
        self.history.iter()
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use evobots_brain::Genome;

    fn quiet_config() -> EvoBotsConfig {
        EvoBotsConfig {
            food_count: 0,
            initial_bots: 0,
            min_bots: 0,
            hunters: crate::HunterSettings {
                count: 0,
                ..Default::default()
            },
            rng_seed: Some(42),
            ..EvoBotsConfig::default()
        }
    }

    fn bot_at(x: f32, y: f32, size: u32) -> Agent {
        Agent::new(
            Position::new(x, y),
            size,
            0.0,
            DecisionPolicy::Neural(Genome::filled(0.0, 0.0)),
            SpawnOrigin::Fresh,
        )
    }

    #[test]
    fn world_state_initialises_from_config() {
        let world = WorldState::new(EvoBotsConfig {
            rng_seed: Some(7),
            ..EvoBotsConfig::default()
        })
        .expect("world");
        assert_eq!(world.living_bots(), 25);
        assert_eq!(world.hunter_count(), 5);
        assert_eq!(world.food_count(), 25);
        assert_eq!(world.tick(), Tick(0));
        for (_, agent) in world.agents().iter() {
            let r = agent.radius();
            assert!(agent.position.x >= r && agent.position.x <= 1_024.0 - r);
            assert!(agent.position.y >= r && agent.position.y <= 768.0 - r);
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let result = WorldState::new(EvoBotsConfig {
            grid_cell_size: 0.0,
            ..EvoBotsConfig::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn starving_agent_dies_when_hunger_clock_expires() {
        let mut world = WorldState::new(quiet_config()).expect("world");
        let mut agent = bot_at(300.0, 300.0, 10);
        agent.stats.hunger_ticks = world.config().kill_time - 1;
        let id = world.spawn_agent(agent);
        let summary = world.step();
        assert!(!world.agents().contains(id));
        assert_eq!(summary.deaths, 1);
    }

    #[test]
    fn fed_agent_shrinks_instead_of_dying() {
        let mut world = WorldState::new(quiet_config()).expect("world");
        let mut agent = bot_at(300.0, 300.0, 14);
        agent.food_count = 2;
        agent.stats.hunger_ticks = world.config().kill_time - 1;
        let id = world.spawn_agent(agent);
        world.step();
        let agent = world.agents().get(id).expect("alive");
        assert!(agent.alive);
        assert_eq!(agent.food_count, 1);
        assert!(agent.size < 14);
        assert_eq!(agent.stats.hunger_ticks, 0);
    }

    #[test]
    fn larger_agent_eats_overlapping_smaller_agent() {
        let mut world = WorldState::new(quiet_config()).expect("world");
        let big = world.spawn_agent(bot_at(300.0, 300.0, 20));
        let small = world.spawn_agent(bot_at(305.0, 300.0, 10));
        let summary = world.step();
        assert!(!world.agents().contains(small));
        let eater = world.agents().get(big).expect("eater survives");
        assert_eq!(eater.stats.players_eaten, 1);
        assert_eq!(eater.food_count, 1);
        assert_eq!(eater.stats.food_eaten, 1);
        assert!(eater.size > 20);
        assert_eq!(summary.deaths, 1);
    }

    #[test]
    fn similar_sized_agents_do_not_eat_each_other() {
        let mut world = WorldState::new(quiet_config()).expect("world");
        let a = world.spawn_agent(bot_at(300.0, 300.0, 11));
        let b = world.spawn_agent(bot_at(303.0, 300.0, 10));
        world.step();
        assert!(world.agents().contains(a));
        assert!(world.agents().contains(b));
    }

    #[test]
    fn eating_food_grows_agent_and_respawns_pellet() {
        let mut world = WorldState::new(quiet_config()).expect("world");
        let id = world.spawn_agent(bot_at(200.0, 200.0, 10));
        world.spawn_food_at(Position::new(203.0, 200.0));
        world.step();
        let agent = world.agents().get(id).expect("agent");
        assert_eq!(agent.stats.food_eaten, 1);
        assert_eq!(agent.food_count, 1);
        assert!(agent.size > 10);
        assert_eq!(world.food_count(), 1);
        let (_, pellet) = world.food().next().expect("respawned pellet");
        assert_ne!(pellet.position, Position::new(203.0, 200.0));
    }

    #[test]
    fn hunter_never_starves_or_grows() {
        let mut config = quiet_config();
        config.kill_time = 2;
        let mut world = WorldState::new(config).expect("world");
        let mut hunter = Agent::new(
            Position::new(400.0, 400.0),
            25,
            0.0,
            DecisionPolicy::Pursuit,
            SpawnOrigin::Hunter,
        );
        hunter.speed = 0.2;
        let hunter_id = world.spawn_agent(hunter);
        let prey = world.spawn_agent(bot_at(410.0, 400.0, 10));
        for _ in 0..5 {
            world.step();
        }
        let hunter = world.agents().get(hunter_id).expect("hunter");
        assert!(hunter.alive);
        assert_eq!(hunter.size, 25);
        assert_eq!(hunter.stats.players_eaten, 1);
        assert!(!world.agents().contains(prey));
    }

    #[test]
    fn refill_keeps_population_at_floor() {
        let mut world = WorldState::new(EvoBotsConfig {
            rng_seed: Some(99),
            kill_time: 5,
            ..EvoBotsConfig::default()
        })
        .expect("world");
        for _ in 0..60 {
            let summary = world.step();
            assert!(summary.living_bots >= world.config().min_bots);
            assert_eq!(summary.hunters, 5);
        }
        assert!(world.history().count() == 60);
    }

    #[test]
    fn human_player_counts_toward_population_floor() {
        let mut world = WorldState::new(EvoBotsConfig {
            human_player: true,
            min_bots: 4,
            ..quiet_config()
        })
        .expect("world");
        let summary = world.step();
        assert_eq!(summary.living_bots, 3);
        assert_eq!(
            world.agents().iter().filter(|(_, a)| a.is_human()).count(),
            1
        );
    }

    #[test]
    fn seeded_world_samples_initial_genomes_from_pool() {
        let pool = vec![GeneEntry::new(10.0, Genome::filled(0.25, 0.0))];
        let world = WorldState::with_archives(
            EvoBotsConfig {
                rng_seed: Some(5),
                initial_bots: 4,
                ..EvoBotsConfig::default()
            },
            pool,
            Vec::new(),
        )
        .expect("world");
        let seeded = world
            .agents()
            .iter()
            .filter(|(_, agent)| agent.origin == SpawnOrigin::Seeded)
            .count();
        assert_eq!(seeded, 4);
    }

    #[test]
    fn pointer_follow_moves_toward_pointer() {
        let mut world = WorldState::new(EvoBotsConfig {
            human_player: true,
            ..quiet_config()
        })
        .expect("world");
        let (id, start) = world
            .agents()
            .iter()
            .find(|(_, agent)| agent.is_human())
            .map(|(id, agent)| (id, agent.position))
            .expect("human");
        world.set_pointer(Some(Position::new(start.x + 100.0, start.y)));
        world.step();
        let moved = world.agents().get(id).expect("human").position;
        assert!(moved.x > start.x);
        assert!((moved.y - start.y).abs() < 1e-3);
    }

    #[test]
    fn mitosis_splits_fat_bot_into_two_children() {
        let mut world = WorldState::new(EvoBotsConfig {
            mitosis_chance: 1.0,
            ..quiet_config()
        })
        .expect("world");
        let mut parent = bot_at(500.0, 400.0, 20);
        parent.food_count = 4;
        let parent_id = world.spawn_agent(parent);
        let summary = world.step();
        assert!(!world.agents().contains(parent_id));
        assert_eq!(summary.births, 2);
        let children: Vec<&Agent> = world
            .agents()
            .iter()
            .map(|(_, agent)| agent)
            .filter(|agent| agent.origin == SpawnOrigin::Mitosis)
            .collect();
        assert_eq!(children.len(), 2);
        assert!(children.iter().all(|c| c.size == 10 && c.food_count == 2));
    }

    #[test]
    fn maintenance_runs_on_check_interval() {
        let mut config = quiet_config();
        config.evolution.check_interval = 3;
        let mut world = WorldState::new(config).expect("world");
        assert!(world.step().maintenance.is_none());
        assert!(world.step().maintenance.is_none());
        assert!(world.step().maintenance.is_some());
    }

    #[test]
    fn migrants_are_offered_to_pool() {
        let mut world = WorldState::new(quiet_config()).expect("world");
        let migrants = vec![
            GeneEntry::new(5.0, Genome::filled(0.1, 0.0)),
            GeneEntry::new(f32::NAN, Genome::filled(0.2, 0.0)),
        ];
        assert_eq!(world.import_migrants(&migrants), 1);
        assert_eq!(world.population().pool().len(), 1);
    }
}
