// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tracksense

//! Periodic re-identification
//!
//! The session recognises the song that is playing, then attributes the
//! growth of the aggregate total to it once per tick. When the countdown
//! expires a new recognition cycle starts and the following activity goes to
//! whatever song it finds.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{AudioCapture, Recognizer, Song, TrackRecord, Tracklist};
use crate::core::{CountdownTimer, EventBus, TimerState};
use crate::db::{keys, SharedStore};
use crate::error::{Result, TrackerError};
use crate::tracking::{Accumulator, AccumulatorMode, AggregateView};

/// Status lines shown while a cycle runs
pub mod status {
    pub const REQUESTING_ACCESS: &str = "Requesting microphone access...";
    pub const RECORDING: &str = "Recording audio...";
    pub const NO_SONG: &str = "No song detected";
    pub const ACCESS_FAILED: &str = "Microphone access denied or detection failed.";
    pub const DETECTION_ERROR_PREFIX: &str = "Error detecting song: ";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Listening,
    Recognized,
    NotRecognized,
}

pub struct RecognitionSession<R: Recognizer, C: AudioCapture> {
    recognizer: R,
    capture: C,
    store: SharedStore,
    aggregate: AggregateView,
    detections: Accumulator,
    tracklist: Tracklist,
    timer: CountdownTimer,
    recording_window: Duration,
    event_bus: Arc<EventBus>,
    state: SessionState,
    last_outcome: Option<SessionState>,
    snapshot: u64,
    /// Record of the song on display; activity is credited only to it
    active: Option<Uuid>,
    song: Option<Song>,
    status: String,
}

impl<R: Recognizer, C: AudioCapture> RecognitionSession<R, C> {
    /// Claims `detectionCount` and takes the current total as the first snapshot.
    /// Records loaded from an earlier run are kept but never credited again.
    pub fn new(
        store: SharedStore,
        recognizer: R,
        capture: C,
        reidentify_every: Duration,
        recording_window: Duration,
        event_bus: Arc<EventBus>,
    ) -> Result<Self> {
        let detections = Accumulator::open(store.clone(), keys::DETECTION_COUNT, AccumulatorMode::Count)?;
        let aggregate = AggregateView::activity(store.clone());
        let tracklist = Tracklist::load(store.as_ref())?;
        let snapshot = aggregate.recompute()?;

        Ok(Self {
            recognizer,
            capture,
            store,
            aggregate,
            detections,
            tracklist,
            timer: CountdownTimer::new(reidentify_every),
            recording_window,
            event_bus,
            state: SessionState::Idle,
            last_outcome: None,
            snapshot,
            active: None,
            song: None,
            status: String::new(),
        })
    }

    /// One recognition cycle: access, recording window, vendor round trip.
    ///
    /// Returns the outcome and leaves the session `Idle`. A signal on `cancel`
    /// during the window abandons the cycle and yields `Idle`. Every failure
    /// ends up in the status line.
    pub async fn identify(&mut self, cancel: &mut broadcast::Receiver<()>) -> SessionState {
        self.state = SessionState::Listening;
        self.set_status(status::REQUESTING_ACCESS);

        if let Err(e) = self.capture.request_access().await {
            warn!("Microphone unavailable: {}", e);
            return self.finish(SessionState::NotRecognized, status::ACCESS_FAILED);
        }

        self.set_status(status::RECORDING);
        if let Err(e) = self.capture.start().await {
            warn!("Recording failed to start: {}", e);
            return self.finish(SessionState::NotRecognized, status::ACCESS_FAILED);
        }

        let cancelled = tokio::select! {
            _ = sleep(self.recording_window) => false,
            _ = cancel.recv() => true,
        };
        if cancelled {
            self.capture.abort().await;
            debug!("Recording cancelled");
            return self.finish(SessionState::Idle, "");
        }

        let sample = match self.capture.stop().await {
            Ok(sample) => sample,
            Err(e) => {
                warn!("Recording failed: {}", e);
                return self.finish(SessionState::NotRecognized, status::ACCESS_FAILED);
            }
        };

        let failure = match self.recognizer.identify(sample).await {
            Ok(song) => match self.record_song(song) {
                Ok(()) => return self.finish(SessionState::Recognized, ""),
                Err(e) => e,
            },
            Err(e) if e.is_no_match() => {
                info!("No match: {}", e);
                return self.finish(SessionState::NotRecognized, status::NO_SONG);
            }
            Err(e) => e,
        };

        let message = format!("{}{}", status::DETECTION_ERROR_PREFIX, error_detail(&failure));
        error!("{}", message);
        self.finish(SessionState::NotRecognized, &message)
    }

    /// Close out the previous song and make `song` the active record.
    /// Nothing changes unless the new record is stored.
    fn record_song(&mut self, song: Song) -> Result<()> {
        self.attribute()?;

        let record = TrackRecord::new(song.clone());
        let id = record.id;
        let mut tracklist = self.tracklist.clone();
        tracklist.push(record);
        tracklist.save(self.store.as_ref())?;

        self.tracklist = tracklist;
        self.active = Some(id);
        info!("Now playing: {}", song);
        self.song = Some(song);

        if let Err(e) = self.detections.increment() {
            warn!("Detection not counted: {}", e);
        }
        match self.aggregate.recompute() {
            Ok(total) => self.snapshot = total,
            Err(e) => warn!("Total unavailable after recognition: {}", e),
        }
        Ok(())
    }

    /// Credit the growth of the total since the last snapshot to the song on
    /// display and return the amount credited. With no song on display the
    /// snapshot still moves forward and nothing is credited.
    pub fn attribute(&mut self) -> Result<u64> {
        let total = self.aggregate.recompute()?;
        let delta = total.saturating_sub(self.snapshot);
        self.snapshot = total;

        let Some(id) = self.active else {
            return Ok(0);
        };
        if delta == 0 || !self.tracklist.attribute(id, delta) {
            return Ok(0);
        }
        self.tracklist.save(self.store.as_ref())?;
        debug!(delta, total, "Activity attributed");
        Ok(delta)
    }

    /// Advance by `elapsed`: attribute, then re-identify if the countdown
    /// expired. Returns the outcome when a recognition cycle ran.
    pub async fn tick(&mut self, elapsed: Duration, cancel: &mut broadcast::Receiver<()>) -> Option<SessionState> {
        if let Err(e) = self.attribute() {
            warn!("Activity not attributed: {}", e);
        }
        if self.timer.tick(elapsed) {
            info!("Re-identifying");
            return Some(self.identify(cancel).await);
        }
        None
    }

    /// Identify once, then tick every second until shutdown
    pub async fn run(&mut self, mut shutdown: broadcast::Receiver<()>) {
        // A shutdown during a recording window is consumed by that cycle
        if self.identify(&mut shutdown).await != SessionState::Idle {
            let mut ticker = interval(Duration::from_secs(1));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.recv() => break,
                    _ = ticker.tick() => {
                        if self.tick(Duration::from_secs(1), &mut shutdown).await == Some(SessionState::Idle) {
                            break;
                        }
                    }
                }
            }
        }

        if let Err(e) = self.attribute() {
            warn!("Activity not attributed: {}", e);
        }
        info!("Recognition session stopped");
    }

    /// Publish the cycle result and go back to `Idle`
    fn finish(&mut self, outcome: SessionState, message: &str) -> SessionState {
        self.last_outcome = Some(outcome);
        self.set_status(message);
        self.state = SessionState::Idle;
        outcome
    }

    fn set_status(&mut self, message: &str) {
        self.status = message.to_string();
        self.event_bus.publish_recognition(message);
    }

    /// Clear the displayed song; the tracklist is kept and the record stops
    /// receiving activity
    pub fn reset_song(&mut self) {
        self.song = None;
        self.active = None;
        self.state = SessionState::Idle;
        self.set_status("");
    }

    pub fn toggle_timer(&mut self) -> TimerState {
        let state = self.timer.toggle();
        debug!("Re-identification timer {:?}", state);
        state
    }

    pub fn timer(&self) -> &CountdownTimer {
        &self.timer
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Result of the most recent cycle
    pub fn last_outcome(&self) -> Option<SessionState> {
        self.last_outcome
    }

    pub fn song(&self) -> Option<&Song> {
        self.song.as_ref()
    }

    /// Tracklist record of the song on display
    pub fn active_record(&self) -> Option<&TrackRecord> {
        self.active.and_then(|id| self.tracklist.get(id))
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn snapshot(&self) -> u64 {
        self.snapshot
    }

    pub fn tracklist(&self) -> &Tracklist {
        &self.tracklist
    }
}

fn error_detail(e: &TrackerError) -> String {
    match e {
        TrackerError::TransientNetworkFailure(detail) => detail.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::db::{read_count, KeyChange, KeyClaims, KeyValueStore, MemoryStore};
    use crate::recognition::BufferCapture;

    struct StubRecognizer {
        answers: Mutex<VecDeque<Result<Song>>>,
        calls: Arc<AtomicUsize>,
    }

    impl StubRecognizer {
        fn new(answers: Vec<Result<Song>>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let stub = Self { answers: Mutex::new(answers.into()), calls: calls.clone() };
            (stub, calls)
        }
    }

    #[async_trait]
    impl Recognizer for StubRecognizer {
        async fn identify(&self, _sample: Vec<u8>) -> Result<Song> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answers
                .lock()
                .pop_front()
                .unwrap_or(Err(TrackerError::VendorRejected { code: 1001, msg: "No result".into() }))
        }
    }

    /// Memory store whose tracklist key cannot be written
    struct TracklistReadOnly {
        inner: MemoryStore,
    }

    impl KeyValueStore for TracklistReadOnly {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            if key == keys::TRACKLIST {
                return Err(TrackerError::Storage("disk full".into()));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }

        fn subscribe(&self) -> broadcast::Receiver<KeyChange> {
            self.inner.subscribe()
        }

        fn claims(&self) -> &KeyClaims {
            self.inner.claims()
        }
    }

    fn song(title: &str) -> Song {
        Song { title: Some(title.to_string()), artists: vec!["Artist".to_string()], album: None }
    }

    fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.set(keys::STEP_COUNT, "3").unwrap();
        store.set(keys::MOVEMENT_COUNT, "2").unwrap();
        store.set(keys::HIGHEST_NOISE_LEVEL, "40").unwrap();
        store.set(keys::DETECTION_COUNT, "1").unwrap();
        store
    }

    fn session(
        store: Arc<MemoryStore>,
        recognizer: StubRecognizer,
        capture: BufferCapture,
    ) -> RecognitionSession<StubRecognizer, BufferCapture> {
        RecognitionSession::new(
            store,
            recognizer,
            capture,
            Duration::from_secs(120),
            Duration::from_secs(10),
            Arc::new(EventBus::default()),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_recognised_song_becomes_active() {
        let store = seeded_store();
        let (recognizer, _) = StubRecognizer::new(vec![Ok(song("First"))]);
        let mut session = session(store.clone(), recognizer, BufferCapture::new(vec![1, 2, 3]));
        let (_cancel_tx, mut cancel) = broadcast::channel(1);

        assert_eq!(session.identify(&mut cancel).await, SessionState::Recognized);
        assert_eq!(session.status(), "");
        assert_eq!(session.song().map(|s| s.display_title()), Some("First"));
        assert_eq!(read_count(store.as_ref(), keys::DETECTION_COUNT).unwrap(), 2);
        assert_eq!(Tracklist::load(store.as_ref()).unwrap().len(), 1);
        assert_eq!(session.snapshot(), 47);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delta_since_snapshot_is_attributed() {
        let store = seeded_store();
        store.set(keys::DETECTION_COUNT, "0").unwrap();
        let (recognizer, _) = StubRecognizer::new(vec![Ok(song("First"))]);
        let mut session = session(store.clone(), recognizer, BufferCapture::new(vec![0; 8]));
        let (_cancel_tx, mut cancel) = broadcast::channel(1);
        session.identify(&mut cancel).await;
        assert_eq!(session.snapshot(), 46);

        store.set(keys::STEP_COUNT, "9").unwrap();
        assert_eq!(session.attribute().unwrap(), 6);
        assert_eq!(session.snapshot(), 52);

        let saved = Tracklist::load(store.as_ref()).unwrap();
        assert_eq!(saved.latest().map(|r| r.activity), Some(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_drop_attributes_nothing() {
        let store = seeded_store();
        let (recognizer, _) = StubRecognizer::new(vec![Ok(song("First"))]);
        let mut session = session(store.clone(), recognizer, BufferCapture::new(vec![0; 8]));
        let (_cancel_tx, mut cancel) = broadcast::channel(1);
        session.identify(&mut cancel).await;

        AggregateView::activity(store.clone()).reset_all().unwrap();
        assert_eq!(session.attribute().unwrap(), 0);
        assert_eq!(session.snapshot(), 0);

        store.set(keys::STEP_COUNT, "4").unwrap();
        assert_eq!(session.attribute().unwrap(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_match_and_failures_leave_activity_alone() {
        let store = seeded_store();
        let (recognizer, _) = StubRecognizer::new(vec![
            Err(TrackerError::VendorRejected { code: 1001, msg: "No result".into() }),
            Err(TrackerError::TransientNetworkFailure("connection refused".into())),
        ]);
        let mut session = session(store.clone(), recognizer, BufferCapture::new(vec![0; 8]));
        let (_cancel_tx, mut cancel) = broadcast::channel(1);

        assert_eq!(session.identify(&mut cancel).await, SessionState::NotRecognized);
        assert_eq!(session.status(), status::NO_SONG);

        assert_eq!(session.identify(&mut cancel).await, SessionState::NotRecognized);
        assert_eq!(session.status(), "Error detecting song: connection refused");

        assert!(session.tracklist().is_empty());
        assert_eq!(AggregateView::activity(store).recompute().unwrap(), 46);
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_microphone() {
        let (recognizer, calls) = StubRecognizer::new(vec![]);
        let mut session = session(seeded_store(), recognizer, BufferCapture::denied());
        let (_cancel_tx, mut cancel) = broadcast::channel(1);

        assert_eq!(session.identify(&mut cancel).await, SessionState::NotRecognized);
        assert_eq!(session.status(), status::ACCESS_FAILED);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_recording_window() {
        let (recognizer, calls) = StubRecognizer::new(vec![Ok(song("Never"))]);
        let mut session = session(seeded_store(), recognizer, BufferCapture::new(vec![0; 8]));
        let (cancel_tx, mut cancel) = broadcast::channel(1);
        cancel_tx.send(()).unwrap();

        assert_eq!(session.identify(&mut cancel).await, SessionState::Idle);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(session.song().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_starts_new_cycle_unless_paused() {
        let (recognizer, calls) = StubRecognizer::new(vec![Ok(song("A")), Ok(song("B"))]);
        let mut session = RecognitionSession::new(
            seeded_store(),
            recognizer,
            BufferCapture::new(vec![0; 8]),
            Duration::from_secs(3),
            Duration::from_secs(1),
            Arc::new(EventBus::default()),
        )
        .unwrap();
        let (_cancel_tx, mut cancel) = broadcast::channel(1);

        assert_eq!(session.toggle_timer(), TimerState::Paused);
        for _ in 0..5 {
            assert!(session.tick(Duration::from_secs(1), &mut cancel).await.is_none());
        }
        assert_eq!(session.toggle_timer(), TimerState::Running);

        let mut cycles = 0;
        for _ in 0..6 {
            if session.tick(Duration::from_secs(1), &mut cancel).await.is_some() {
                cycles += 1;
            }
        }
        assert_eq!(cycles, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(session.tracklist().len(), 2);
        assert_eq!(session.song().map(|s| s.display_title()), Some("B"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_song_keeps_tracklist() {
        let (recognizer, _) = StubRecognizer::new(vec![Ok(song("First"))]);
        let mut session = session(seeded_store(), recognizer, BufferCapture::new(vec![0; 8]));
        let (_cancel_tx, mut cancel) = broadcast::channel(1);
        session.identify(&mut cancel).await;

        session.reset_song();
        assert!(session.song().is_none());
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.tracklist().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stored_records_are_not_credited_on_startup() {
        let store = seeded_store();
        let mut previous = Tracklist::default();
        previous.push(TrackRecord::new(song("Yesterday")));
        previous.save(store.as_ref()).unwrap();

        let (recognizer, _) = StubRecognizer::new(vec![]);
        let mut session = session(store.clone(), recognizer, BufferCapture::new(vec![0; 8]));
        store.set(keys::STEP_COUNT, "13").unwrap();

        assert!(session.song().is_none());
        assert_eq!(session.attribute().unwrap(), 0);
        assert_eq!(session.snapshot(), 56);
        assert_eq!(Tracklist::load(store.as_ref()).unwrap().latest().map(|r| r.activity), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_song_stops_attribution() {
        let store = seeded_store();
        let (recognizer, _) = StubRecognizer::new(vec![Ok(song("First"))]);
        let mut session = session(store.clone(), recognizer, BufferCapture::new(vec![0; 8]));
        let (_cancel_tx, mut cancel) = broadcast::channel(1);
        session.identify(&mut cancel).await;
        assert_eq!(session.active_record().map(|r| r.song.display_title()), Some("First"));

        session.reset_song();
        store.set(keys::STEP_COUNT, "18").unwrap();

        assert_eq!(session.attribute().unwrap(), 0);
        assert!(session.active_record().is_none());
        assert_eq!(session.snapshot(), 62);
        assert_eq!(Tracklist::load(store.as_ref()).unwrap().latest().map(|r| r.activity), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsaved_song_is_reported_and_not_counted() {
        let store = Arc::new(TracklistReadOnly { inner: MemoryStore::new() });
        store.set(keys::DETECTION_COUNT, "1").unwrap();
        let (recognizer, _) = StubRecognizer::new(vec![Ok(song("First"))]);
        let mut session = RecognitionSession::new(
            store.clone(),
            recognizer,
            BufferCapture::new(vec![0; 8]),
            Duration::from_secs(120),
            Duration::from_secs(10),
            Arc::new(EventBus::default()),
        )
        .unwrap();
        let (_cancel_tx, mut cancel) = broadcast::channel(1);

        assert_eq!(session.identify(&mut cancel).await, SessionState::NotRecognized);
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.status(), "Error detecting song: storage error: disk full");
        assert_eq!(read_count(store.as_ref(), keys::DETECTION_COUNT).unwrap(), 1);
        assert!(session.song().is_none());
        assert!(session.tracklist().is_empty());

        // The next tick carries on
        assert!(session.tick(Duration::from_secs(1), &mut cancel).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_ends_idle_with_outcome_kept() {
        let (recognizer, _) = StubRecognizer::new(vec![Ok(song("First"))]);
        let mut session = session(seeded_store(), recognizer, BufferCapture::new(vec![0; 8]));
        let (_cancel_tx, mut cancel) = broadcast::channel(1);
        assert_eq!(session.last_outcome(), None);

        assert_eq!(session.identify(&mut cancel).await, SessionState::Recognized);
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.last_outcome(), Some(SessionState::Recognized));

        assert_eq!(session.identify(&mut cancel).await, SessionState::NotRecognized);
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.last_outcome(), Some(SessionState::NotRecognized));
        assert_eq!(session.song().map(|s| s.display_title()), Some("First"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_while_recording_ends_run() {
        let (recognizer, calls) = StubRecognizer::new(vec![Ok(song("Never"))]);
        let mut session = session(seeded_store(), recognizer, BufferCapture::new(vec![0; 8]));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(async move {
            session.run(shutdown_rx).await;
            session
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown_tx.send(()).unwrap();

        let session = handle.await.unwrap();
        assert_eq!(session.last_outcome(), Some(SessionState::Idle));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
