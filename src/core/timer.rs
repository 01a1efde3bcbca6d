// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/tracksense

//! Countdown timer for periodic operations

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerState {
    Running,
    Paused,
}

/// Repeating countdown advanced by explicit ticks.
///
/// Expiry rearms the countdown with the full period.
#[derive(Debug, Clone)]
pub struct CountdownTimer {
    period: Duration,
    remaining: Duration,
    state: TimerState,
}

impl CountdownTimer {
    pub fn new(period: Duration) -> Self {
        let period = period.max(Duration::from_secs(1));
        Self {
            period,
            remaining: period,
            state: TimerState::Running,
        }
    }

    /// Advance by `elapsed`. Returns true when the countdown expired on this tick.
    pub fn tick(&mut self, elapsed: Duration) -> bool {
        if self.state == TimerState::Paused {
            return false;
        }
        if elapsed >= self.remaining {
            debug!("Countdown of {:?} expired", self.period);
            self.remaining = self.period;
            true
        } else {
            self.remaining -= elapsed;
            false
        }
    }

    pub fn pause(&mut self) {
        self.state = TimerState::Paused;
    }

    pub fn resume(&mut self) {
        self.state = TimerState::Running;
    }

    pub fn toggle(&mut self) -> TimerState {
        match self.state {
            TimerState::Running => self.pause(),
            TimerState::Paused => self.resume(),
        }
        self.state
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expires_after_period_and_rearms() {
        let mut timer = CountdownTimer::new(Duration::from_secs(3));
        assert!(!timer.tick(Duration::from_secs(1)));
        assert!(!timer.tick(Duration::from_secs(1)));
        assert!(timer.tick(Duration::from_secs(1)));
        assert_eq!(timer.remaining(), Duration::from_secs(3));
    }

    #[test]
    fn test_paused_timer_does_not_advance() {
        let mut timer = CountdownTimer::new(Duration::from_secs(2));
        assert_eq!(timer.toggle(), TimerState::Paused);
        assert!(!timer.tick(Duration::from_secs(10)));
        assert_eq!(timer.remaining(), Duration::from_secs(2));

        assert_eq!(timer.toggle(), TimerState::Running);
        assert!(!timer.tick(Duration::from_secs(1)));
        assert_eq!(timer.remaining(), Duration::from_secs(1));
    }
}
