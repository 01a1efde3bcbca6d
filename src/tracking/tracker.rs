// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tracksense

//! Tracker - drives one source through one detector into one accumulator

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::{Accumulator, AccumulatorMode};
use crate::config::{GestureConfig, StepConfig};
use crate::core::{EventBus, TrackerStatus};
use crate::db::{keys, parse_count, SharedStore};
use crate::detection::{
    DetectorOutput, EventDetector, EventKind, GestureDetector, NoiseDetector, StepDetector,
};
use crate::error::Result;
use crate::sensors::{Sample, SignalSource};

/// Per-metric pipeline.
///
/// Samples are handled one at a time in arrival order. A tracker can be run
/// again after it stops; the detector keeps its state between runs and gets
/// [`EventDetector::on_restart`] before the second and later runs.
pub struct Tracker<D: EventDetector> {
    name: String,
    source: Box<dyn SignalSource>,
    detector: D,
    accumulator: Accumulator,
    event_bus: Arc<EventBus>,
    status: TrackerStatus,
    epoch: Instant,
    runs: u32,
    samples: u64,
}

impl<D: EventDetector> Tracker<D> {
    pub fn new(
        name: &str,
        source: Box<dyn SignalSource>,
        detector: D,
        accumulator: Accumulator,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            name: name.to_string(),
            source,
            detector,
            accumulator,
            event_bus,
            status: TrackerStatus::Idle,
            epoch: Instant::now(),
            runs: 0,
            samples: 0,
        }
    }

    /// Subscribe and process samples until the source ends, a shutdown
    /// signal arrives or an error occurs. Returns the final status.
    pub async fn run(&mut self, mut shutdown: broadcast::Receiver<()>) -> TrackerStatus {
        self.set_status(TrackerStatus::Starting);

        if let Err(e) = self.source.connect().await {
            warn!("{}: cannot start: {}", self.name, e);
            self.set_status(TrackerStatus::Failed(e.to_string()));
            return self.status.clone();
        }

        if self.runs > 0 {
            self.detector.on_restart();
        }
        self.runs += 1;

        if let Err(e) = self.accumulator.refresh() {
            error!("{}: cannot read {}: {}", self.name, self.accumulator.key(), e);
            let _ = self.source.disconnect().await;
            self.set_status(TrackerStatus::Failed(e.to_string()));
            return self.status.clone();
        }

        info!(
            "{} tracking via {} ({} = {})",
            self.name,
            self.source.id(),
            self.accumulator.key(),
            self.accumulator.current_value()
        );
        let mut changes = self.accumulator.store().subscribe();
        let mut watch_store = true;
        self.set_status(TrackerStatus::Tracking);

        let outcome = loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    debug!("{}: shutdown requested", self.name);
                    break Ok(());
                }

                next = self.source.next_sample() => match next {
                    Ok(Some(sample)) => {
                        if let Err(e) = self.process(&sample) {
                            break Err(e);
                        }
                    }
                    Ok(None) => {
                        debug!("{}: source ended", self.name);
                        break Ok(());
                    }
                    Err(e) => break Err(e),
                },

                change = changes.recv(), if watch_store => match change {
                    Ok(change) if change.key == self.accumulator.key() => {
                        let stored = change.value.as_deref().map(parse_count).unwrap_or(0);
                        if stored != self.accumulator.current_value() {
                            if let Err(e) = self.accumulator.refresh() {
                                break Err(e);
                            }
                        }
                    }
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => watch_store = false,
                },
            }
        };

        self.detector.cancel_pending();
        if let Err(e) = self.source.disconnect().await {
            warn!("{}: disconnect failed: {}", self.name, e);
        }

        match outcome {
            Ok(()) => self.set_status(TrackerStatus::Stopped),
            Err(e) => {
                error!("{} stopped on error: {}", self.name, e);
                self.set_status(TrackerStatus::Failed(e.to_string()));
            }
        }
        self.status.clone()
    }

    fn process(&mut self, sample: &Sample) -> Result<()> {
        let now_ms = self.now_ms();
        self.samples += 1;

        match self.detector.on_sample(sample, now_ms) {
            DetectorOutput::Fired(event) => {
                let value = self.accumulator.increment()?;
                debug!(tracker = %self.name, kind = ?event.kind, value, "Event counted");
                self.event_bus.publish_activity(&self.name, event, value);
            }
            DetectorOutput::Level(level) => {
                let previous = self.accumulator.current_value();
                let max = self.accumulator.update_max(level.round() as u64)?;
                if max > previous {
                    self.event_bus.publish_level(&self.name, level, max);
                }
            }
            DetectorOutput::NoEvent => {}
        }
        Ok(())
    }

    fn set_status(&mut self, status: TrackerStatus) {
        self.status = status.clone();
        self.event_bus.publish_status(&self.name, status);
    }

    /// Milliseconds since the tracker was created; keeps counting across runs
    pub fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> &TrackerStatus {
        &self.status
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    pub fn samples_processed(&self) -> u64 {
        self.samples
    }
}

impl<D: EventDetector + 'static> Tracker<D> {
    /// Run on a task; the tracker is handed back when it stops
    pub fn spawn(mut self, shutdown: broadcast::Receiver<()>) -> JoinHandle<(Self, TrackerStatus)> {
        tokio::spawn(async move {
            let status = self.run(shutdown).await;
            (self, status)
        })
    }
}

impl Tracker<StepDetector> {
    pub fn steps(
        store: SharedStore,
        source: Box<dyn SignalSource>,
        config: &StepConfig,
        event_bus: Arc<EventBus>,
    ) -> Result<Self> {
        let accumulator = Accumulator::open(store, keys::STEP_COUNT, AccumulatorMode::Count)?;
        Ok(Self::new("steps", source, StepDetector::from_config(config), accumulator, event_bus))
    }
}

impl Tracker<GestureDetector> {
    pub fn movements(
        store: SharedStore,
        source: Box<dyn SignalSource>,
        config: &GestureConfig,
        event_bus: Arc<EventBus>,
    ) -> Result<Self> {
        let accumulator = Accumulator::open(store, keys::MOVEMENT_COUNT, AccumulatorMode::Count)?;
        Ok(Self::new("movements", source, GestureDetector::from_config(config), accumulator, event_bus))
    }

    /// Gesture on display right now
    pub fn current_movement(&self) -> Option<EventKind> {
        self.detector.current_movement(self.now_ms())
    }
}

impl Tracker<NoiseDetector> {
    pub fn noise(store: SharedStore, source: Box<dyn SignalSource>, event_bus: Arc<EventBus>) -> Result<Self> {
        let accumulator = Accumulator::open(store, keys::HIGHEST_NOISE_LEVEL, AccumulatorMode::Max)?;
        Ok(Self::new("noise", source, NoiseDetector::new(), accumulator, event_bus))
    }

    pub fn current_level(&self) -> f64 {
        self.detector.current_level()
    }
}
