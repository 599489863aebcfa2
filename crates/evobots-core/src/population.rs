//! Gene-pool bookkeeping and refill policy owned by the world.

use evobots_brain::Genome;
use ordered_float::OrderedFloat;
use rand::{Rng, RngCore};
use rayon::prelude::*;
use std::cmp::Reverse;
use tracing::debug;

use crate::{
    AdaptiveMutation, Agent, EvoBotsConfig, EvolutionSettings, FitnessWeights, GeneEntry,
    GenePool, HallOfFame, InsertOutcome, SpawnOrigin, breed, fitness,
};

/// Genome chosen for a new agent, tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum RefillChoice {
    HallOfFame(Genome),
    Fresh(Genome),
    EliteClone(Genome),
    Crossover(Genome),
}

impl RefillChoice {
    #[must_use]
    pub fn origin(&self) -> SpawnOrigin {
        match self {
            Self::HallOfFame(_) => SpawnOrigin::HallOfFame,
            Self::Fresh(_) => SpawnOrigin::Fresh,
            Self::EliteClone(_) => SpawnOrigin::EliteClone,
            Self::Crossover(_) => SpawnOrigin::Crossover,
        }
    }

    #[must_use]
    pub fn into_genome(self) -> Genome {
        match self {
            Self::HallOfFame(g) | Self::Fresh(g) | Self::EliteClone(g) | Self::Crossover(g) => g,
        }
    }
}

/// Outcome of one periodic maintenance round.
#[derive(Debug, Clone, PartialEq)]
pub struct MaintenanceReport {
    pub ranked: usize,
    pub elites: usize,
    pub offered: usize,
    pub accepted: usize,
    pub pruned: usize,
    pub best_fitness: Option<f32>,
    pub average_fitness: Option<f32>,
    pub diversity: f32,
    pub mutation_rate: f32,
}

/// Fitness of every living bot, best first, as `(dense index, fitness)`.
#[must_use]
pub fn rank_bots(agents: &[Agent], weights: &FitnessWeights) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = agents
        .par_iter()
        .enumerate()
        .filter(|(_, agent)| agent.alive && agent.is_bot())
        .map(|(idx, agent)| (idx, fitness(&agent.stats, weights)))
        .collect();
    ranked.sort_by_key(|&(idx, score)| (Reverse(OrderedFloat(score)), idx));
    ranked
}

/// Owns the gene pool, hall of fame, elites and adaptive mutation state.
#[derive(Debug, Clone)]
pub struct PopulationManager {
    settings: EvolutionSettings,
    weights: FitnessWeights,
    elite_count: usize,
    pool: GenePool,
    hall_of_fame: HallOfFame,
    elites: Vec<GeneEntry>,
    mutation: AdaptiveMutation,
    last_death_fitness: Option<f32>,
    last_report: Option<MaintenanceReport>,
}

impl PopulationManager {
    #[must_use]
    pub fn new(config: &EvoBotsConfig) -> Self {
        let settings = config.evolution;
        Self {
            settings,
            weights: config.fitness,
            elite_count: config.elite_count(),
            pool: GenePool::new(settings.gene_pool_capacity),
            hall_of_fame: HallOfFame::new(settings.hall_of_fame_capacity),
            elites: Vec::new(),
            mutation: AdaptiveMutation::new(&settings),
            last_death_fitness: None,
            last_report: None,
        }
    }

    /// Replace both archives, e.g. after loading them from disk.
    pub fn restore(&mut self, pool: Vec<GeneEntry>, hall_of_fame: Vec<GeneEntry>) {
        self.pool = GenePool::from_entries(self.settings.gene_pool_capacity, pool);
        self.hall_of_fame =
            HallOfFame::from_entries(self.settings.hall_of_fame_capacity, hall_of_fame);
    }

    #[must_use]
    pub fn pool(&self) -> &GenePool {
        &self.pool
    }

    #[must_use]
    pub fn hall_of_fame(&self) -> &HallOfFame {
        &self.hall_of_fame
    }

    #[must_use]
    pub fn elites(&self) -> &[GeneEntry] {
        &self.elites
    }

    #[must_use]
    pub fn mutation_rate(&self) -> f32 {
        self.mutation.rate()
    }

    #[must_use]
    pub fn last_death_fitness(&self) -> Option<f32> {
        self.last_death_fitness
    }

    #[must_use]
    pub fn last_report(&self) -> Option<&MaintenanceReport> {
        self.last_report.as_ref()
    }

    /// Offer an entry to the gene pool and, independently, the hall of fame.
    /// Returns the gene-pool outcome.
    pub fn offer(&mut self, fitness: f32, genome: &Genome) -> InsertOutcome {
        let outcome = self.pool.try_insert(fitness, genome);
        self.hall_of_fame.try_insert(fitness, genome);
        outcome
    }

    /// Score a dead bot and offer it when it clears the fitness floor.
    pub fn record_death(&mut self, agent: &Agent) -> Option<InsertOutcome> {
        let genome = agent.genome()?;
        let score = fitness(&agent.stats, &self.weights);
        self.last_death_fitness = Some(score);
        if score > self.settings.pool_fitness_floor {
            Some(self.offer(score, genome))
        } else {
            None
        }
    }

    /// Recompute elites from the living population, feed the pool, prune it
    /// for diversity and update the adaptive mutation rate.
    pub fn maintain(&mut self, agents: &[Agent]) -> MaintenanceReport {
        let ranked = rank_bots(agents, &self.weights);

        self.elites = ranked
            .iter()
            .filter(|(idx, _)| {
                let stats = &agents[*idx].stats;
                stats.food_eaten >= self.settings.elite_min_food
                    && stats.lifetime_ticks >= self.settings.elite_min_life
            })
            .take(self.elite_count)
            .filter_map(|&(idx, score)| {
                agents[idx]
                    .genome()
                    .map(|genome| GeneEntry::new(score, genome.clone()))
            })
            .collect();

        let mut offered = 0;
        let mut accepted = 0;
        let elites = std::mem::take(&mut self.elites);
        for elite in &elites {
            offered += 1;
            if self.offer(elite.fitness, &elite.genome).accepted() {
                accepted += 1;
            }
        }
        self.elites = elites;

        let floor = self.settings.pool_fitness_floor;
        let extra: Vec<(usize, f32)> = ranked
            .iter()
            .copied()
            .filter(|&(_, score)| score > floor)
            .take(self.settings.pool_offer_cap)
            .collect();
        for (idx, score) in extra {
            if let Some(genome) = agents[idx].genome() {
                offered += 1;
                if self.offer(score, genome).accepted() {
                    accepted += 1;
                }
            }
        }

        let pruned = self.pool.prune_for_diversity(self.settings.prune_min_distance);
        let best_fitness = self.pool.best().map(|entry| entry.fitness);
        let mutation_rate = self.mutation.observe(best_fitness);

        let report = MaintenanceReport {
            ranked: ranked.len(),
            elites: self.elites.len(),
            offered,
            accepted,
            pruned,
            best_fitness,
            average_fitness: self.pool.average_fitness(),
            diversity: self.pool.diversity(),
            mutation_rate,
        };
        debug!(
            ranked = report.ranked,
            elites = report.elites,
            accepted = report.accepted,
            pruned = report.pruned,
            best = ?report.best_fitness,
            mutation_rate = report.mutation_rate,
            "population maintenance"
        );
        self.last_report = Some(report.clone());
        report
    }

    /// Pick the genome for one refill spawn.
    pub fn choose_refill(&self, rng: &mut dyn RngCore) -> RefillChoice {
        let settings = &self.settings;
        if !self.hall_of_fame.is_empty() && rng.random::<f32>() < settings.hall_of_fame_chance {
            if let Some(entry) = self.hall_of_fame.sample(rng) {
                return RefillChoice::HallOfFame(entry.genome.clone());
            }
        }
        let cold = self.pool.is_empty() && self.elites.is_empty();
        if cold || rng.random::<f32>() < settings.random_chance {
            return RefillChoice::Fresh(Genome::random(rng));
        }
        if !self.elites.is_empty() && rng.random::<f32>() < settings.clone_chance {
            return self.clone_elite(rng);
        }
        let attempts = self.mutation.attempts(settings.mutation_attempt_scale);
        if let Some(child) = breed(&self.pool, settings.tournament_size, attempts, rng) {
            return RefillChoice::Crossover(child);
        }
        // Fewer than two pool entries cannot breed.
        RefillChoice::Fresh(Genome::random(rng))
    }

    fn clone_elite(&self, rng: &mut dyn RngCore) -> RefillChoice {
        let idx = rng.random_range(0..self.elites.len());
        RefillChoice::EliteClone(self.elites[idx].genome.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DecisionPolicy, Position};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn bot(food: u32, life: u64, weight: f32) -> Agent {
        let mut agent = Agent::new(
            Position::new(10.0, 10.0),
            10,
            0.0,
            DecisionPolicy::Neural(Genome::filled(weight, 0.0)),
            SpawnOrigin::Fresh,
        );
        agent.stats.food_eaten = food;
        agent.stats.lifetime_ticks = life;
        agent
    }

    #[test]
    fn cold_start_always_refills_with_fresh_genomes() {
        let manager = PopulationManager::new(&EvoBotsConfig::default());
        let mut rng = SmallRng::seed_from_u64(0xDEADBEEF);
        for _ in 0..50 {
            assert!(matches!(manager.choose_refill(&mut rng), RefillChoice::Fresh(_)));
        }
    }

    #[test]
    fn record_death_respects_floor_and_tracks_last_fitness() {
        let mut manager = PopulationManager::new(&EvoBotsConfig::default());
        assert_eq!(manager.record_death(&bot(0, 10, 0.1)), None);
        assert_eq!(manager.last_death_fitness(), Some(-50.0));
        assert_eq!(
            manager.record_death(&bot(5, 3_000, 0.2)),
            Some(InsertOutcome::Appended)
        );
        assert_eq!(manager.pool().len(), 1);
        assert_eq!(manager.hall_of_fame().len(), 1);
    }

    #[test]
    fn hunters_are_never_recorded() {
        let mut manager = PopulationManager::new(&EvoBotsConfig::default());
        let mut hunter = bot(10, 10_000, 0.0);
        hunter.policy = DecisionPolicy::Pursuit;
        assert_eq!(manager.record_death(&hunter), None);
        assert!(manager.pool().is_empty());
    }

    #[test]
    fn maintenance_selects_gated_elites_and_feeds_pool() {
        let mut manager = PopulationManager::new(&EvoBotsConfig::default());
        let agents = vec![
            bot(5, 3_000, 0.0),
            bot(1, 9_000, 0.5),
            bot(3, 2_500, 1.0),
            bot(0, 100, 1.5),
        ];
        let report = manager.maintain(&agents);
        assert_eq!(report.ranked, 4);
        assert_eq!(report.elites, 2);
        assert_eq!(manager.elites()[0].genome, Genome::filled(0.0, 0.0));
        assert!(manager.pool().len() >= 2);
        assert!(report.best_fitness.is_some());
        assert_eq!(manager.last_report(), Some(&report));
    }

    fn exploit_only_config() -> EvoBotsConfig {
        let mut config = EvoBotsConfig::default();
        config.evolution.hall_of_fame_chance = 0.0;
        config.evolution.random_chance = 0.0;
        config.evolution.clone_chance = 0.0;
        config
    }

    #[test]
    fn single_entry_pool_refills_fresh_even_with_elites() {
        let mut manager = PopulationManager::new(&exploit_only_config());
        let report = manager.maintain(&[bot(5, 3_000, 0.3)]);
        assert_eq!(report.elites, 1);
        assert_eq!(manager.pool().len(), 1);
        let mut rng = SmallRng::seed_from_u64(3);
        for _ in 0..100 {
            assert!(matches!(manager.choose_refill(&mut rng), RefillChoice::Fresh(_)));
        }
    }

    #[test]
    fn elite_clone_copies_genome_exactly() {
        let mut config = exploit_only_config();
        config.evolution.clone_chance = 1.0;
        let mut manager = PopulationManager::new(&config);
        manager.maintain(&[bot(5, 3_000, 0.3)]);
        let mut rng = SmallRng::seed_from_u64(8);
        for _ in 0..20 {
            match manager.choose_refill(&mut rng) {
                RefillChoice::EliteClone(genome) => {
                    assert_eq!(genome, Genome::filled(0.3, 0.0));
                }
                other => panic!("expected an elite clone, got {:?}", other.origin()),
            }
        }
    }

    #[test]
    fn warm_pool_produces_non_fresh_choices() {
        let mut manager = PopulationManager::new(&EvoBotsConfig::default());
        manager.restore(
            (0..6)
                .map(|i| GeneEntry::new(100.0 - i as f32, Genome::filled(i as f32, 0.0)))
                .collect(),
            Vec::new(),
        );
        let mut rng = SmallRng::seed_from_u64(11);
        let crossovers = (0..200)
            .filter(|_| matches!(manager.choose_refill(&mut rng), RefillChoice::Crossover(_)))
            .count();
        assert!(crossovers > 50, "expected mostly crossover, got {crossovers}");
    }
}
