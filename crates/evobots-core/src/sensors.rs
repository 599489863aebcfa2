//! Sensory input construction and temporal smoothing.

use evobots_brain::INPUT_SIZE;
use serde::{Deserialize, Serialize};

use crate::{EvoBotsConfig, HALF_TURN, Position, wrap_signed_angle};

/// Own-food reading saturates at this many units.
const FOOD_INPUT_CAP: f32 = 20.0;

/// Everything an agent perceives on one tick, before normalisation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorFrame {
    pub position: Position,
    pub heading: f32,
    pub speed: f32,
    pub size: u32,
    pub food_count: u32,
    /// Offset to the nearest food centre.
    pub nearest_food: Option<(f32, f32)>,
    /// Offset to the nearest agent centre plus that agent's size.
    pub nearest_agent: Option<(f32, f32, u32)>,
}

fn sign_extend(value: f32) -> f32 {
    2.0 * value.clamp(0.0, 1.0) - 1.0
}

fn relative_angle(dx: f32, dy: f32, heading: f32) -> f32 {
    wrap_signed_angle(dy.atan2(dx) - heading) / HALF_TURN
}

impl SensorFrame {
    /// Normalised, gain-scaled inputs in network order.
    #[must_use]
    pub fn raw_inputs(&self, config: &EvoBotsConfig) -> [f32; INPUT_SIZE] {
        let gains = &config.sensor_gains;
        let width = config.world_width;
        let height = config.world_height;
        let diagonal = (width * width + height * height).sqrt();
        let own_radius = self.size as f32 * 0.5;

        let (food_distance, food_angle) = match self.nearest_food {
            Some((dx, dy)) => (
                sign_extend((dx * dx + dy * dy).sqrt() / diagonal),
                relative_angle(dx, dy, self.heading),
            ),
            None => (1.0, 0.0),
        };

        let (agent_distance, agent_angle, size_difference) = match self.nearest_agent {
            Some((dx, dy, other_size)) => {
                let edge = ((dx * dx + dy * dy).sqrt() - own_radius - other_size as f32 * 0.5)
                    .max(0.0);
                (
                    sign_extend(edge / diagonal),
                    relative_angle(dx, dy, self.heading),
                    (self.size as f32 - other_size as f32) / config.default_size as f32,
                )
            }
            None => (1.0, 0.0, 0.0),
        };

        let Position { x, y } = self.position;
        [
            food_distance * gains.food_distance,
            food_angle * gains.food_angle,
            agent_distance * gains.agent_distance,
            agent_angle * gains.agent_angle,
            sign_extend(x / width) * gains.wall,
            sign_extend((width - x) / width) * gains.wall,
            sign_extend(y / height) * gains.wall,
            sign_extend((height - y) / height) * gains.wall,
            (self.speed / config.max_speed).clamp(0.0, 1.0) * gains.speed,
            size_difference * gains.size_difference,
            self.size as f32 / config.max_size as f32 * gains.own_size,
            (self.food_count as f32).min(FOOD_INPUT_CAP) / FOOD_INPUT_CAP * gains.own_food,
        ]
    }
}

/// Exponentially smoothed copy of the sensor vector carried across ticks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorState {
    smoothed: [f32; INPUT_SIZE],
}

impl Default for SensorState {
    fn default() -> Self {
        Self {
            smoothed: [0.0; INPUT_SIZE],
        }
    }
}

impl SensorState {
    /// Blend `raw` into the running average and return the new inputs.
    pub fn update(&mut self, raw: &[f32; INPUT_SIZE], alpha: f32) -> [f32; INPUT_SIZE] {
        for (smoothed, &value) in self.smoothed.iter_mut().zip(raw) {
            *smoothed = alpha * value + (1.0 - alpha) * *smoothed;
        }
        self.smoothed
    }

    #[must_use]
    pub const fn current(&self) -> &[f32; INPUT_SIZE] {
        &self.smoothed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> SensorFrame {
        SensorFrame {
            position: Position::new(512.0, 384.0),
            heading: 0.0,
            speed: 1.0,
            size: 10,
            food_count: 0,
            nearest_food: None,
            nearest_agent: None,
        }
    }

    #[test]
    fn missing_targets_read_as_far_and_straight_ahead() {
        let config = EvoBotsConfig::default();
        let inputs = frame().raw_inputs(&config);
        assert_eq!(inputs[0], config.sensor_gains.food_distance);
        assert_eq!(inputs[1], 0.0);
        assert_eq!(inputs[2], config.sensor_gains.agent_distance);
        assert_eq!(inputs[3], 0.0);
        assert_eq!(inputs[9], 0.0);
        // Centred agent: every wall term is zero.
        for wall in &inputs[4..8] {
            assert!(wall.abs() < 1e-5);
        }
        assert!((inputs[8] - 0.5 * config.sensor_gains.speed).abs() < 1e-5);
        assert!((inputs[10] - 0.1 * config.sensor_gains.own_size).abs() < 1e-5);
    }

    #[test]
    fn targets_report_relative_angle_and_edge_distance() {
        let config = EvoBotsConfig::default();
        let sensed = SensorFrame {
            heading: std::f32::consts::FRAC_PI_2,
            nearest_food: Some((0.0, 10.0)),
            nearest_agent: Some((15.0, 0.0, 20)),
            ..frame()
        };
        let inputs = sensed.raw_inputs(&config);
        // Food straight ahead.
        assert!(inputs[1].abs() < 1e-5);
        // Agent a quarter turn to the right.
        assert!((inputs[3] + 0.5 * config.sensor_gains.agent_angle).abs() < 1e-4);
        // Edges touch: 15 - 5 - 10 = 0 -> -1 after sign extension.
        assert!((inputs[2] + config.sensor_gains.agent_distance).abs() < 1e-4);
        assert!((inputs[9] + config.sensor_gains.size_difference).abs() < 1e-5);
    }

    #[test]
    fn smoothing_blends_with_previous_value() {
        let mut state = SensorState::default();
        let raw = [10.0; INPUT_SIZE];
        let first = state.update(&raw, 0.2);
        assert!((first[0] - 2.0).abs() < 1e-6);
        let second = state.update(&raw, 0.2);
        assert!((second[0] - 3.6).abs() < 1e-5);
        assert_eq!(state.current(), &second);
    }
}
