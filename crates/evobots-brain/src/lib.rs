//! Neural genomes driving EvoBots players.
//!
//! A genome is the complete weight set of a small fixed-topology feed-forward
//! network (`12 → 12 → 12 → 12 → 2`). Genomes are plain values: agents, the
//! gene pool, and the hall of fame each own their own copy, and every genetic
//! operator produces a fresh genome instead of editing a shared one.

mod genetics;
mod genome;

pub use genetics::{
    CrossoverOp, crossover, crossover_layer, mutate, mutate_layer_entry, perturb,
};
pub use genome::{Genome, GenomeError, Layer, NetworkOutput};

/// Number of sensor inputs fed into each network.
pub const INPUT_SIZE: usize = 12;
/// Number of outputs produced by each network (heading, speed).
pub const OUTPUT_SIZE: usize = 2;
/// Neuron counts for every layer boundary, input first.
pub const LAYER_SIZES: [usize; 5] = [INPUT_SIZE, 12, 12, 12, OUTPUT_SIZE];
/// Number of weight layers in a genome.
pub const LAYER_COUNT: usize = LAYER_SIZES.len() - 1;
