// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tracksense

//! Spectrum analysis - byte-scaled frequency data and average loudness
//!
//! Mirrors a browser analyser node: Blackman window, FFT magnitude scaled by
//! 1/N, exponential smoothing across frames, conversion to decibels and
//! linear mapping of `[min_decibels, max_decibels]` onto `0..=255`.

use std::f64::consts::PI;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::config::NoiseConfig;

const MIN_FFT_SIZE: usize = 32;
const MAX_FFT_SIZE: usize = 32768;

/// Converts time-domain frames into an average loudness level
pub struct LevelAnalyser {
    fft_size: usize,
    smoothing: f64,
    min_decibels: f64,
    max_decibels: f64,
    window: Vec<f64>,
    smoothed: Vec<f64>,
    fft: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex<f64>>,
}

impl LevelAnalyser {
    pub fn new(config: &NoiseConfig) -> Self {
        let fft_size = config.fft_size.clamp(MIN_FFT_SIZE, MAX_FFT_SIZE).next_power_of_two();

        let window = (0..fft_size)
            .map(|n| {
                let x = n as f64 / fft_size as f64;
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            })
            .collect();

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Self {
            fft_size,
            smoothing: config.smoothing.clamp(0.0, 1.0),
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels.max(config.min_decibels + 1.0),
            window,
            smoothed: vec![0.0; fft_size / 2],
            fft,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of frequency bins produced per frame
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Byte-scaled magnitude of each frequency bin for one frame.
    ///
    /// Only the most recent `fft_size` samples are used; shorter frames are
    /// zero-padded at the front.
    pub fn byte_frequency_data(&mut self, frame: &[f32]) -> Vec<u8> {
        let n = self.fft_size;
        let tail = &frame[frame.len().saturating_sub(n)..];
        let pad = n - tail.len();

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = if i < pad { 0.0 } else { f64::from(tail[i - pad]) };
            let sample = if sample.is_finite() { sample } else { 0.0 };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process(&mut self.buffer);

        let range = self.max_decibels - self.min_decibels;
        let scale = 1.0 / n as f64;

        self.smoothed
            .iter_mut()
            .zip(self.buffer.iter())
            .map(|(prev, bin)| {
                let magnitude = bin.norm() * scale;
                *prev = self.smoothing * *prev + (1.0 - self.smoothing) * magnitude;

                let db = if *prev > 0.0 { 20.0 * prev.log10() } else { f64::NEG_INFINITY };
                let byte = (255.0 / range * (db - self.min_decibels)).floor();
                byte.clamp(0.0, 255.0) as u8
            })
            .collect()
    }

    /// Mean of the byte frequency data for one frame, in `0.0..=255.0`
    pub fn average_level(&mut self, frame: &[f32]) -> f64 {
        let bins = self.byte_frequency_data(frame);
        if bins.is_empty() {
            return 0.0;
        }
        bins.iter().map(|&b| f64::from(b)).sum::<f64>() / bins.len() as f64
    }

    /// Forget smoothing history
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|v| *v = 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(amplitude: f32, cycles: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * cycles * i as f32 / len as f32).sin())
            .collect()
    }

    #[test]
    fn test_silence_is_zero() {
        let mut analyser = LevelAnalyser::new(&NoiseConfig::default());
        assert_eq!(analyser.bin_count(), 128);
        assert_eq!(analyser.average_level(&vec![0.0; 256]), 0.0);
    }

    #[test]
    fn test_louder_frames_score_higher() {
        let config = NoiseConfig { smoothing: 0.0, ..NoiseConfig::default() };
        let mut quiet = LevelAnalyser::new(&config);
        let mut loud = LevelAnalyser::new(&config);

        let quiet_level = quiet.average_level(&sine(0.01, 16.0, 256));
        let loud_level = loud.average_level(&sine(0.9, 16.0, 256));

        assert!(loud_level > quiet_level, "{loud_level} <= {quiet_level}");
        assert!(loud_level <= 255.0);
    }

    #[test]
    fn test_peak_bin_saturates_for_full_scale_tone() {
        let config = NoiseConfig { smoothing: 0.0, ..NoiseConfig::default() };
        let mut analyser = LevelAnalyser::new(&config);
        let bins = analyser.byte_frequency_data(&sine(1.0, 16.0, 256));
        assert_eq!(bins[16], 255);
    }

    #[test]
    fn test_smoothing_decays_gradually() {
        let mut analyser = LevelAnalyser::new(&NoiseConfig::default());
        let loud = analyser.average_level(&sine(0.9, 16.0, 256));
        let after = analyser.average_level(&vec![0.0; 256]);

        assert!(after > 0.0);
        assert!(after <= loud);

        analyser.reset();
        assert_eq!(analyser.average_level(&vec![0.0; 256]), 0.0);
    }

    #[test]
    fn test_fft_size_is_kept_in_analyser_range() {
        let sized = |fft_size| LevelAnalyser::new(&NoiseConfig { fft_size, ..NoiseConfig::default() }).fft_size();
        assert_eq!(sized(0), 32);
        assert_eq!(sized(200), 256);
        assert_eq!(sized(32768), 32768);
        assert_eq!(sized(usize::MAX), 32768);
    }

    #[test]
    fn test_short_frames_are_padded() {
        let mut analyser = LevelAnalyser::new(&NoiseConfig::default());
        let bins = analyser.byte_frequency_data(&[0.5; 10]);
        assert_eq!(bins.len(), 128);
    }
}
