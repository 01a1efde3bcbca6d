// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tracksense

//! Sensor simulator for demo/testing

use std::f64::consts::PI;
use std::time::Duration;

use async_trait::async_trait;
use rand::prelude::*;
use rand_distr::StandardNormal;
use tokio::time::{interval, Interval, MissedTickBehavior};

use super::{Sample, SensorStatus, SensorType, SignalSource};
use crate::analysis::LevelAnalyser;
use crate::config::NoiseConfig;
use crate::error::Result;

const GRAVITY: f64 = 9.81;

/// Simulates a person walking (with the odd jump or dance move) or a room's noise
pub struct SensorSimulator {
    id: String,
    sensor_type: SensorType,
    sample_rate: f64,
    status: SensorStatus,
    rng: StdRng,
    ticker: Option<Interval>,

    // Simulation state
    time: f64,
    step_period: f64,
    gesture_probability: f64,
    analyser: Option<LevelAnalyser>,
    fft_size: usize,
    loudness: f64,
    limit: Option<u64>,
    produced: u64,
}

impl SensorSimulator {
    /// Walking accelerometer
    pub fn walking(id: &str, sample_rate: f64) -> Self {
        Self::build(id, SensorType::Accelerometer, sample_rate, StdRng::from_entropy())
    }

    /// Room microphone
    pub fn noise(id: &str, config: &NoiseConfig) -> Self {
        let mut sim = Self::build(id, SensorType::Microphone, config.frame_rate_hz, StdRng::from_entropy());
        let analyser = LevelAnalyser::new(config);
        sim.fft_size = analyser.fft_size();
        sim.analyser = Some(analyser);
        sim
    }

    fn build(id: &str, sensor_type: SensorType, sample_rate: f64, rng: StdRng) -> Self {
        Self {
            id: id.to_string(),
            sensor_type,
            sample_rate: sample_rate.max(1.0),
            status: SensorStatus::Disconnected,
            rng,
            ticker: None,
            time: 0.0,
            step_period: 0.6,
            gesture_probability: 0.002,
            analyser: None,
            fft_size: 256,
            loudness: 0.05,
            limit: None,
            produced: 0,
        }
    }

    /// Deterministic output for tests
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// End the stream after `count` samples
    pub fn with_limit(mut self, count: u64) -> Self {
        self.limit = Some(count);
        self
    }

    pub fn with_gesture_probability(mut self, probability: f64) -> Self {
        self.gesture_probability = probability.clamp(0.0, 1.0);
        self
    }

    fn generate(&mut self) -> Sample {
        self.time += 1.0 / self.sample_rate;
        match self.sensor_type {
            SensorType::Accelerometer => self.generate_accelerometer(),
            SensorType::Microphone => self.generate_noise_level(),
        }
    }

    fn generate_accelerometer(&mut self) -> Sample {
        let mut x = 0.05 * self.rng.sample::<f64, _>(StandardNormal);
        let y = 0.05 * self.rng.sample::<f64, _>(StandardNormal);
        let mut z = GRAVITY + 0.05 * self.rng.sample::<f64, _>(StandardNormal);

        // Heel strike: a short vertical bump at the start of each stride
        let phase = self.time % self.step_period;
        if phase < 0.1 {
            z += 5.0 * (PI * phase / 0.1).sin();
        }

        if self.rng.gen::<f64>() < self.gesture_probability {
            if self.rng.gen_bool(0.5) {
                z = self.rng.gen_range(26.0..32.0);
            } else {
                x = self.rng.gen_range(8.0..12.0);
                z = self.rng.gen_range(12.0..16.0);
            }
        }

        Sample::vector(x, y, z)
    }

    fn generate_noise_level(&mut self) -> Sample {
        // Loudness drifts, with occasional bursts
        self.loudness = (self.loudness + self.rng.gen_range(-0.01..0.01)).clamp(0.01, 0.3);
        let burst = if self.rng.gen::<f64>() < 0.01 { self.rng.gen_range(0.3..0.9) } else { 0.0 };
        let amplitude = self.loudness + burst;
        let freq = self.rng.gen_range(4.0..40.0);

        let frame: Vec<f32> = (0..self.fft_size)
            .map(|i| {
                let t = i as f64 / self.fft_size as f64;
                (amplitude * (2.0 * PI * freq * t).sin() + 0.01 * self.rng.sample::<f64, _>(StandardNormal)) as f32
            })
            .collect();

        let level = self.analyser.as_mut().map(|a| a.average_level(&frame)).unwrap_or(0.0);
        Sample::scalar(level)
    }
}

#[async_trait]
impl SignalSource for SensorSimulator {
    fn id(&self) -> &str { &self.id }
    fn sensor_type(&self) -> SensorType { self.sensor_type }
    fn status(&self) -> SensorStatus { self.status }

    async fn connect(&mut self) -> Result<()> {
        let mut ticker = interval(Duration::from_secs_f64(1.0 / self.sample_rate));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
        self.status = SensorStatus::Active;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.ticker = None;
        self.status = SensorStatus::Disconnected;
        Ok(())
    }

    async fn next_sample(&mut self) -> Result<Option<Sample>> {
        if self.limit.is_some_and(|limit| self.produced >= limit) {
            return Ok(None);
        }
        let Some(ticker) = self.ticker.as_mut() else {
            return Ok(None);
        };
        ticker.tick().await;
        self.produced += 1;
        Ok(Some(self.generate()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_walking_samples_hover_around_gravity() {
        let mut sim = SensorSimulator::walking("sim-accel", 60.0)
            .with_seed(7)
            .with_gesture_probability(0.0)
            .with_limit(120);
        sim.connect().await.unwrap();

        let mut count = 0;
        while let Some(sample) = sim.next_sample().await.unwrap() {
            let [_, _, z] = sample.axes();
            assert!(z > 8.0 && z < 16.0, "z = {z}");
            count += 1;
        }
        assert_eq!(count, 120);
    }

    #[tokio::test(start_paused = true)]
    async fn test_noise_levels_in_byte_range() {
        let mut sim = SensorSimulator::noise("sim-mic", &NoiseConfig::default())
            .with_seed(3)
            .with_limit(30);
        sim.connect().await.unwrap();

        while let Some(sample) = sim.next_sample().await.unwrap() {
            let level = sample.value();
            assert!((0.0..=255.0).contains(&level));
        }
    }

    #[tokio::test]
    async fn test_disconnected_simulator_yields_nothing() {
        let mut sim = SensorSimulator::walking("sim-accel", 60.0);
        assert_eq!(sim.next_sample().await.unwrap(), None);
    }
}
