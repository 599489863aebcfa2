use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use thiserror::Error;

use crate::{INPUT_SIZE, LAYER_COUNT, LAYER_SIZES, OUTPUT_SIZE};

const LEAKY_SLOPE: f32 = 0.01;
const HEADING_JITTER: f32 = 0.1;

/// Errors raised when genome data does not match the fixed topology.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GenomeError {
    #[error("expected {expected} layers, found {actual}")]
    LayerCount { expected: usize, actual: usize },
    #[error("weight and bias layer counts differ ({weights} vs {biases})")]
    BiasLayerCount { weights: usize, biases: usize },
    #[error("layer {index} has {actual} weights, expected {expected}")]
    WeightLength {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("layer {index} has {actual} biases, expected {expected}")]
    BiasLength {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("layer {index} has zero-sized dimensions")]
    ZeroSizedLayer { index: usize },
}

/// One dense layer: a row-major `inputs × outputs` weight matrix plus biases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    inputs: usize,
    outputs: usize,
    weights: Vec<f32>,
    biases: Vec<f32>,
}

impl Layer {
    /// Build a layer, checking that the buffers match the declared shape.
    pub fn new(
        index: usize,
        inputs: usize,
        outputs: usize,
        weights: Vec<f32>,
        biases: Vec<f32>,
    ) -> Result<Self, GenomeError> {
        if inputs == 0 || outputs == 0 {
            return Err(GenomeError::ZeroSizedLayer { index });
        }
        if weights.len() != inputs * outputs {
            return Err(GenomeError::WeightLength {
                index,
                expected: inputs * outputs,
                actual: weights.len(),
            });
        }
        if biases.len() != outputs {
            return Err(GenomeError::BiasLength {
                index,
                expected: outputs,
                actual: biases.len(),
            });
        }
        Ok(Self {
            inputs,
            outputs,
            weights,
            biases,
        })
    }

    /// Glorot-uniform weights in `±sqrt(6 / (in + out))` and zero biases.
    fn xavier(inputs: usize, outputs: usize, rng: &mut dyn RngCore) -> Self {
        let scale = (6.0 / (inputs + outputs) as f32).sqrt();
        let weights = (0..inputs * outputs)
            .map(|_| rng.random_range(-scale..=scale))
            .collect();
        Self {
            inputs,
            outputs,
            weights,
            biases: vec![0.0; outputs],
        }
    }

    #[must_use]
    pub const fn inputs(&self) -> usize {
        self.inputs
    }

    #[must_use]
    pub const fn outputs(&self) -> usize {
        self.outputs
    }

    #[must_use]
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Mutable weight view; the slice keeps the shape fixed.
    pub fn weights_mut(&mut self) -> &mut [f32] {
        &mut self.weights
    }

    #[must_use]
    pub fn biases(&self) -> &[f32] {
        &self.biases
    }

    pub fn biases_mut(&mut self) -> &mut [f32] {
        &mut self.biases
    }

    fn forward_into(&self, input: &[f32], next: &mut Vec<f32>) {
        next.clear();
        next.extend_from_slice(&self.biases);
        for (i, &x) in input.iter().enumerate().take(self.inputs) {
            let row = &self.weights[i * self.outputs..(i + 1) * self.outputs];
            for (acc, &w) in next.iter_mut().zip(row) {
                *acc += x * w;
            }
        }
    }
}

/// Decoded network decision for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkOutput {
    /// Desired absolute heading in radians, roughly `[0, 2π]` plus jitter.
    pub heading: f32,
    /// Desired fraction of the maximum speed in `[0, 1]`.
    pub speed_fraction: f32,
}

/// Complete weight set of one player's network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    layers: Vec<Layer>,
}

impl Genome {
    /// Fresh Xavier-initialised genome.
    #[must_use]
    pub fn random(rng: &mut dyn RngCore) -> Self {
        let layers = LAYER_SIZES
            .windows(2)
            .map(|pair| Layer::xavier(pair[0], pair[1], rng))
            .collect();
        Self { layers }
    }

    /// Genome whose every weight is `weight` and every bias is `bias`.
    #[must_use]
    pub fn filled(weight: f32, bias: f32) -> Self {
        let layers = LAYER_SIZES
            .windows(2)
            .map(|pair| Layer {
                inputs: pair[0],
                outputs: pair[1],
                weights: vec![weight; pair[0] * pair[1]],
                biases: vec![bias; pair[1]],
            })
            .collect();
        Self { layers }
    }

    /// Assemble a genome from per-layer flattened weights and biases.
    pub fn from_parts(weights: Vec<Vec<f32>>, biases: Vec<Vec<f32>>) -> Result<Self, GenomeError> {
        if weights.len() != LAYER_COUNT {
            return Err(GenomeError::LayerCount {
                expected: LAYER_COUNT,
                actual: weights.len(),
            });
        }
        if biases.len() != weights.len() {
            return Err(GenomeError::BiasLayerCount {
                weights: weights.len(),
                biases: biases.len(),
            });
        }
        let layers = weights
            .into_iter()
            .zip(biases)
            .enumerate()
            .map(|(index, (w, b))| {
                Layer::new(index, LAYER_SIZES[index], LAYER_SIZES[index + 1], w, b)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { layers })
    }

    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    /// Total number of weights and biases.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .map(|layer| layer.weights.len() + layer.biases.len())
            .sum()
    }

    /// Deterministic forward pass: leaky-ReLU hidden layers, `tanh` on the
    /// heading output and `sigmoid` on the speed output.
    #[must_use]
    pub fn forward(&self, inputs: &[f32; INPUT_SIZE]) -> [f32; OUTPUT_SIZE] {
        let mut current = inputs.to_vec();
        let mut next = Vec::with_capacity(INPUT_SIZE);
        let last = self.layers.len() - 1;
        for (index, layer) in self.layers.iter().enumerate() {
            layer.forward_into(&current, &mut next);
            if index < last {
                for value in &mut next {
                    *value = leaky_relu(*value);
                }
            }
            std::mem::swap(&mut current, &mut next);
        }
        [current[0].tanh(), sigmoid(current[1])]
    }

    /// Forward pass mapped onto a heading and speed fraction, with a small
    /// uniform heading jitter drawn from `rng`.
    pub fn predict(&self, inputs: &[f32; INPUT_SIZE], rng: &mut dyn RngCore) -> NetworkOutput {
        let [heading, speed] = self.forward(inputs);
        let jitter = rng.random_range(-HEADING_JITTER..=HEADING_JITTER);
        NetworkOutput {
            heading: (heading + 1.0) * PI + jitter,
            speed_fraction: speed,
        }
    }

    /// Mean absolute difference across every weight and bias.
    #[must_use]
    pub fn distance(&self, other: &Self) -> f32 {
        let mut total = 0.0_f32;
        let mut count = 0usize;
        for (a, b) in self.layers.iter().zip(&other.layers) {
            for (x, y) in a.weights.iter().zip(&b.weights) {
                total += (x - y).abs();
            }
            for (x, y) in a.biases.iter().zip(&b.biases) {
                total += (x - y).abs();
            }
            count += a.weights.len().min(b.weights.len()) + a.biases.len().min(b.biases.len());
        }
        if count == 0 { 0.0 } else { total / count as f32 }
    }
}

fn leaky_relu(x: f32) -> f32 {
    if x > 0.0 { x } else { LEAKY_SLOPE * x }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn random_genome_matches_topology() {
        let mut rng = SmallRng::seed_from_u64(0xDEADBEEF);
        let genome = Genome::random(&mut rng);
        assert_eq!(genome.layers().len(), LAYER_COUNT);
        for (index, layer) in genome.layers().iter().enumerate() {
            assert_eq!(layer.inputs(), LAYER_SIZES[index]);
            assert_eq!(layer.outputs(), LAYER_SIZES[index + 1]);
            assert_eq!(layer.weights().len(), layer.inputs() * layer.outputs());
            assert!(layer.biases().iter().all(|&b| b == 0.0));
        }
        assert_eq!(genome.parameter_count(), 12 * 12 * 3 + 12 * 2 + 12 * 3 + 2);
    }

    #[test]
    fn xavier_weights_stay_within_scale() {
        let mut rng = SmallRng::seed_from_u64(7);
        let genome = Genome::random(&mut rng);
        let hidden_scale = (6.0_f32 / 24.0).sqrt();
        let output_scale = (6.0_f32 / 14.0).sqrt();
        assert!(genome.layers()[0].weights().iter().all(|w| w.abs() <= hidden_scale));
        assert!(genome.layers()[3].weights().iter().all(|w| w.abs() <= output_scale));
    }

    #[test]
    fn zero_genome_outputs_neutral_heading_and_half_speed() {
        let genome = Genome::filled(0.0, 0.0);
        let outputs = genome.forward(&[1.0; INPUT_SIZE]);
        assert!(outputs[0].abs() < 1e-7);
        assert!((outputs[1] - 0.5).abs() < 1e-7);
    }

    #[test]
    fn hidden_layers_use_leaky_relu() {
        // Negative inputs with identity-like weights leak through at 1% per layer.
        let genome = Genome::filled(1.0, 0.0);
        let outputs = genome.forward(&[-1.0; INPUT_SIZE]);
        // Layer 1: -12 -> -0.12, layer 2: -1.44 -> -0.0144, layer 3: -0.1728 -> -0.001728,
        // output: 12 * -0.001728 = -0.020736.
        assert!((outputs[0] - (-0.020736_f32).tanh()).abs() < 1e-5);
    }

    #[test]
    fn predict_maps_heading_into_full_turn() {
        let mut rng = SmallRng::seed_from_u64(99);
        let genome = Genome::random(&mut rng);
        for _ in 0..32 {
            let out = genome.predict(&[0.3; INPUT_SIZE], &mut rng);
            assert!(out.heading >= -HEADING_JITTER - 1e-6);
            assert!(out.heading <= 2.0 * PI + HEADING_JITTER + 1e-6);
            assert!((0.0..=1.0).contains(&out.speed_fraction));
        }
    }

    #[test]
    fn seeded_predictions_are_reproducible() {
        let genome = Genome::random(&mut SmallRng::seed_from_u64(1));
        let a = genome.predict(&[0.5; INPUT_SIZE], &mut SmallRng::seed_from_u64(2));
        let b = genome.predict(&[0.5; INPUT_SIZE], &mut SmallRng::seed_from_u64(2));
        assert_eq!(a, b);
    }

    #[test]
    fn from_parts_rejects_wrong_shapes() {
        let genome = Genome::filled(0.5, 0.1);
        let weights: Vec<Vec<f32>> = genome.layers().iter().map(|l| l.weights().to_vec()).collect();
        let biases: Vec<Vec<f32>> = genome.layers().iter().map(|l| l.biases().to_vec()).collect();
        assert_eq!(
            Genome::from_parts(weights.clone(), biases.clone()).expect("valid"),
            genome
        );

        let mut short = weights.clone();
        short[1].pop();
        assert_eq!(
            Genome::from_parts(short, biases.clone()),
            Err(GenomeError::WeightLength {
                index: 1,
                expected: 144,
                actual: 143
            })
        );

        let mut bad_bias = biases.clone();
        bad_bias[3].push(0.0);
        assert_eq!(
            Genome::from_parts(weights.clone(), bad_bias),
            Err(GenomeError::BiasLength {
                index: 3,
                expected: 2,
                actual: 3
            })
        );

        assert_eq!(
            Genome::from_parts(weights[..3].to_vec(), biases[..3].to_vec()),
            Err(GenomeError::LayerCount {
                expected: LAYER_COUNT,
                actual: 3
            })
        );
        assert_eq!(
            Genome::from_parts(weights, Vec::new()),
            Err(GenomeError::BiasLayerCount {
                weights: LAYER_COUNT,
                biases: 0
            })
        );
    }

    #[test]
    fn distance_is_mean_absolute_difference() {
        let a = Genome::filled(0.0, 0.0);
        let b = Genome::filled(1.0, 1.0);
        assert!((a.distance(&b) - 1.0).abs() < 1e-6);
        assert_eq!(a.distance(&a), 0.0);
        let c = Genome::filled(0.5, 0.0);
        let expected = 0.5 * (12 * 12 * 3 + 24) as f32 / a.parameter_count() as f32;
        assert!((a.distance(&c) - expected).abs() < 1e-6);
    }
}
