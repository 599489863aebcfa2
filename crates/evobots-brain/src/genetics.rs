//! Crossover and mutation operators over [`Genome`] values.

use rand::{Rng, RngCore};

use crate::genome::{Genome, Layer};

const MUTATION_NOISE: f32 = 0.1;
const AMPLIFY_CHANCE: f32 = 0.05;
const AMPLIFY_FACTOR: f32 = 5.0;
const RESET_CHANCE: f32 = 0.01;
const RESET_RANGE: f32 = 0.5;

/// Recombination mechanism applied to one parameter buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CrossoverOp {
    /// Per-entry coin flip between the parents.
    Uniform,
    /// Entries before `point` come from the first parent, the rest from the second.
    SinglePoint { point: usize },
    /// `alpha * a + (1 - alpha) * b` for every entry.
    Arithmetic { alpha: f32 },
}

impl CrossoverOp {
    /// Draw one of the three mechanisms with equal probability.
    pub fn random(len: usize, rng: &mut dyn RngCore) -> Self {
        match rng.random_range(0..3) {
            0 => Self::Uniform,
            1 => Self::SinglePoint {
                point: rng.random_range(0..=len),
            },
            _ => Self::Arithmetic {
                alpha: rng.random::<f32>(),
            },
        }
    }

    /// Combine two equally sized buffers.
    pub fn apply(self, a: &[f32], b: &[f32], rng: &mut dyn RngCore) -> Vec<f32> {
        debug_assert_eq!(a.len(), b.len());
        match self {
            Self::Uniform => a
                .iter()
                .zip(b)
                .map(|(&x, &y)| if rng.random::<bool>() { x } else { y })
                .collect(),
            Self::SinglePoint { point } => a
                .iter()
                .zip(b)
                .enumerate()
                .map(|(i, (&x, &y))| if i < point { x } else { y })
                .collect(),
            Self::Arithmetic { alpha } => a
                .iter()
                .zip(b)
                .map(|(&x, &y)| alpha * x + (1.0 - alpha) * y)
                .collect(),
        }
    }
}

/// Recombine one layer, rolling the weight and bias mechanisms independently.
pub fn crossover_layer(a: &Layer, b: &Layer, rng: &mut dyn RngCore) -> Layer {
    let mut child = a.clone();
    let weight_op = CrossoverOp::random(a.weights().len(), rng);
    let weights = weight_op.apply(a.weights(), b.weights(), rng);
    child.weights_mut().copy_from_slice(&weights);

    let bias_op = CrossoverOp::random(a.biases().len(), rng);
    let biases = bias_op.apply(a.biases(), b.biases(), rng);
    child.biases_mut().copy_from_slice(&biases);
    child
}

/// Produce a child genome, re-rolling the mechanism for every layer.
#[must_use]
pub fn crossover(a: &Genome, b: &Genome, rng: &mut dyn RngCore) -> Genome {
    let mut child = a.clone();
    for (slot, (la, lb)) in child
        .layers_mut()
        .iter_mut()
        .zip(a.layers().iter().zip(b.layers()))
    {
        *slot = crossover_layer(la, lb, rng);
    }
    child
}

/// Nudge one random entry: small uniform noise, occasionally amplified, and a
/// rare full reset.
pub fn mutate_layer_entry(values: &mut [f32], rng: &mut dyn RngCore) {
    if values.is_empty() {
        return;
    }
    let idx = rng.random_range(0..values.len());
    let mut noise = rng.random_range(-MUTATION_NOISE..=MUTATION_NOISE);
    if rng.random::<f32>() < AMPLIFY_CHANCE {
        noise *= AMPLIFY_FACTOR;
    }
    values[idx] += noise;
    if rng.random::<f32>() < RESET_CHANCE {
        values[idx] = rng.random_range(-RESET_RANGE..=RESET_RANGE);
    }
}

/// Apply `attempts` point mutations, each touching one weight and one bias.
pub fn mutate(genome: &mut Genome, attempts: usize, rng: &mut dyn RngCore) {
    let layer_count = genome.layers().len();
    if layer_count == 0 {
        return;
    }
    for _ in 0..attempts {
        let layer = rng.random_range(0..layer_count);
        mutate_layer_entry(genome.layers_mut()[layer].weights_mut(), rng);
        let layer = rng.random_range(0..layer_count);
        mutate_layer_entry(genome.layers_mut()[layer].biases_mut(), rng);
    }
}

/// Add `U(-magnitude, magnitude)` to every weight and bias.
pub fn perturb(genome: &mut Genome, magnitude: f32, rng: &mut dyn RngCore) {
    if magnitude <= 0.0 {
        return;
    }
    for layer in genome.layers_mut() {
        for w in layer.weights_mut() {
            *w += rng.random_range(-magnitude..=magnitude);
        }
        for b in layer.biases_mut() {
            *b += rng.random_range(-magnitude..=magnitude);
        }
    }
}
