//! Session Timer Scheduler
//!
//! Holds the session's periodic timers (sampling, alert countdown, traffic
//! polling) as cancellable slots. Every arm issues a fresh [`TimerToken`], so a
//! firing that raced with a cancel or re-arm can be recognized and dropped.
//!
//! Intervals are created lazily on the first poll of [`Scheduler::next`],
//! anchored to the instant the slot was armed. Arming and cancelling are plain
//! synchronous calls.

use serde::Serialize;
use std::time::Duration;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::debug;

/// Periodic timers owned by a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TimerKind {
    /// Sample, buffer, and assess
    Sampling,
    /// One-second alert countdown
    Countdown,
    /// Live traffic poll
    Traffic,
}

/// Identity of one arming of a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken {
    kind: TimerKind,
    generation: u64,
}

impl TimerToken {
    pub fn kind(&self) -> TimerKind {
        self.kind
    }
}

#[derive(Debug)]
struct TimerSlot {
    token: TimerToken,
    period: Duration,
    first_fire: Instant,
    interval: Option<Interval>,
}

/// Cancellable periodic timers
#[derive(Debug, Default)]
pub struct Scheduler {
    sampling: Option<TimerSlot>,
    countdown: Option<TimerSlot>,
    traffic: Option<TimerSlot>,
    generation: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, kind: TimerKind) -> &Option<TimerSlot> {
        match kind {
            TimerKind::Sampling => &self.sampling,
            TimerKind::Countdown => &self.countdown,
            TimerKind::Traffic => &self.traffic,
        }
    }

    fn slot_mut(&mut self, kind: TimerKind) -> &mut Option<TimerSlot> {
        match kind {
            TimerKind::Sampling => &mut self.sampling,
            TimerKind::Countdown => &mut self.countdown,
            TimerKind::Traffic => &mut self.traffic,
        }
    }

    /// Arm (or re-arm) a timer. The first firing is one full period from now.
    pub fn arm(&mut self, kind: TimerKind, period: Duration) -> TimerToken {
        self.generation += 1;
        let token = TimerToken {
            kind,
            generation: self.generation,
        };
        debug!("Arming {:?} timer every {:?}", kind, period);
        *self.slot_mut(kind) = Some(TimerSlot {
            token,
            period,
            first_fire: Instant::now() + period,
            interval: None,
        });
        token
    }

    /// Cancel a timer. Returns `false` if it was not armed.
    pub fn cancel(&mut self, kind: TimerKind) -> bool {
        let was_armed = self.slot_mut(kind).take().is_some();
        if was_armed {
            debug!("Cancelled {:?} timer", kind);
        }
        was_armed
    }

    pub fn cancel_all(&mut self) {
        self.cancel(TimerKind::Sampling);
        self.cancel(TimerKind::Countdown);
        self.cancel(TimerKind::Traffic);
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.slot(kind).is_some()
    }

    pub fn period(&self, kind: TimerKind) -> Option<Duration> {
        self.slot(kind).as_ref().map(|slot| slot.period)
    }

    /// Whether a token belongs to the timer's current arming
    pub fn is_current(&self, token: TimerToken) -> bool {
        self.slot(token.kind)
            .as_ref()
            .is_some_and(|slot| slot.token == token)
    }

    /// Wait for the next firing of any armed timer.
    ///
    /// Pends forever when nothing is armed. Cancel safe: dropping the future
    /// loses no firing.
    pub async fn next(&mut self) -> TimerToken {
        let Self {
            sampling,
            countdown,
            traffic,
            ..
        } = self;

        tokio::select! {
            token = wait_slot(sampling) => token,
            token = wait_slot(countdown) => token,
            token = wait_slot(traffic) => token,
        }
    }
}

async fn wait_slot(slot: &mut Option<TimerSlot>) -> TimerToken {
    let Some(slot) = slot else {
        return std::future::pending().await;
    };

    let period = slot.period;
    let first_fire = slot.first_fire;
    let interval = slot.interval.get_or_insert_with(|| {
        let mut interval = time::interval_at(first_fire, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });
    interval.tick().await;
    slot.token
}
