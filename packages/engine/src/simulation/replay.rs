// packages/engine/src/simulation/replay.rs
//! Replay of recorded driving events
//!
//! Events are re-enacted one after another in start-time order. Each step
//! shows the recorded initial speed, holds for the recorded duration (scaled
//! by the configured time scale) and then shows the final speed and adds the
//! event's distance and fuel to the totals. Nothing is written back to the
//! store.
//!
//! ```text
//! begin_replay ─▶ [ step_started ─▶ sleep(duration × scale) ─▶ step_finished ]* ─▶ finish_replay
//! ```

use crate::simulation::session::SharedState;
use crate::store::models::DrivingEvent;
use crate::utils::errors::Result;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Summary of a replay that ran to the end
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayReport {
    pub events_played: usize,
    pub total_distance: f64,
    pub fuel_used: f64,
}

/// Plays recorded events into a dashboard state
#[derive(Debug, Clone)]
pub struct ReplayEngine {
    time_scale: f64,
}

impl ReplayEngine {
    /// `time_scale` multiplies every recorded duration (1.0 = real time)
    pub fn new(time_scale: f64) -> Self {
        Self {
            time_scale: if time_scale > 0.0 { time_scale } else { 1.0 },
        }
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    /// How long a step holds before its final state is shown
    ///
    /// Durations too large for a [`Duration`] saturate at [`Duration::MAX`].
    pub fn step_delay(&self, event: &DrivingEvent) -> Duration {
        let secs = event.duration_seconds * self.time_scale;
        if secs.is_nan() || secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Sort events by start time, keeping the given order for ties
    pub fn order(mut events: Vec<DrivingEvent>) -> Vec<DrivingEvent> {
        events.sort_by_key(|e| e.start_time);
        events
    }

    /// Play `events` into `state`, which must already be replaying
    ///
    /// Returns once the last step has finished and the state has left
    /// replay. If the replay is cancelled elsewhere, the next step fails
    /// with a rejection and playback stops.
    pub async fn play(&self, events: Vec<DrivingEvent>, state: &SharedState) -> Result<ReplayReport> {
        let events = Self::order(events);
        let started = Instant::now();
        info!("Replaying {} events", events.len());

        for (index, event) in events.iter().enumerate() {
            debug!(
                "Replay step {}/{}: {} {} -> {} km/h",
                index + 1,
                events.len(),
                event.event_type,
                event.initial_speed,
                event.final_speed
            );

            state.update(|s| s.replay_step_started(event))?;
            tokio::time::sleep(self.step_delay(event)).await;
            state.update(|s| s.replay_step_finished(event))?;

            metrics::counter!("dashboard_replay_steps_total").increment(1);
        }

        let report = state.update(|s| {
            s.finish_replay().map(|_| ReplayReport {
                events_played: events.len(),
                total_distance: s.total_distance(),
                fuel_used: s.fuel_used(),
            })
        })?;

        info!(
            "Replay finished: {} events in {:?}",
            report.events_played,
            started.elapsed()
        );

        Ok(report)
    }
}
