// packages/engine/src/simulation/state.rs
//! Dashboard state machine
//!
//! ```text
//!            start              accelerate / brake
//! Stopped ─────────▶ Idle ─────────────────────────▶ Maneuvering
//!    ▲                 ▲ ◀───────────────────────────────┘
//!    │                 │        complete_maneuver
//!    │ finish/cancel   │ stop (from Idle or Maneuvering) ──▶ Stopped
//!    │                 │
//! Replaying ◀── begin_replay (from Stopped)
//! ```
//!
//! All readouts (speed, fuel, totals) live next to a single [`Phase`] value,
//! so "accelerating", "braking" and "replaying" can never be true together.
//! Every transition leaves speed within `[0, max_speed]` and fuel within
//! `[0, 100]`. Invalid transitions return a [`Rejection`] and leave the state
//! untouched.

use crate::simulation::physics::{
    acceleration_final_speed, braking_final_speed, deduct_fuel, distance_km, fuel_consumption,
    is_valid_percentage, round_to, FULL_TANK,
};
use crate::store::models::{Car, DrivingEvent, EventType, NewDrivingEvent};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;

/// Shortest duration a recorded event may have, in seconds
const MIN_EVENT_DURATION_SECS: f64 = 0.001;

/// Why a command was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("no car selected")]
    NoCarSelected,

    #[error("the car cannot be changed while the dashboard is running")]
    CarLocked,

    #[error("the dashboard is not started")]
    NotStarted,

    #[error("the dashboard is running")]
    DashboardRunning,

    #[error("a maneuver is already in progress")]
    ManeuverInProgress,

    #[error("a replay is in progress")]
    ReplayInProgress,

    #[error("the tank is empty")]
    OutOfFuel,

    #[error("the car is not moving")]
    Stationary,

    #[error("invalid command percentage: {0}")]
    InvalidPercentage(u8),

    #[error("no maneuver is pending")]
    NoPendingManeuver,

    #[error("maneuver {0} is no longer pending")]
    StaleManeuver(u64),

    #[error("no replay is in progress")]
    NotReplaying,
}

/// A maneuver waiting for its completion timer
#[derive(Debug, Clone, PartialEq)]
pub struct PendingManeuver {
    /// Identity checked on completion so a stale timer cannot complete a newer maneuver
    pub id: u64,
    pub kind: EventType,
    pub percentage: u8,

    /// Speed when the maneuver started
    pub initial_speed: f64,

    /// Speed the maneuver ends at; fixed when the maneuver starts
    pub final_speed: f64,

    /// Fuel already deducted from the tank
    pub fuel_consumed: f64,

    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Stopped,
    Idle,
    Maneuvering(PendingManeuver),

    /// Playing stored events back; `step` is the maneuver being re-enacted
    Replaying { step: Option<EventType> },
}

/// Status line shown on the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardStatus {
    Stopped,
    Waiting,
    Accelerating,
    Braking,
    AccelerationComplete,
    BrakingComplete,
    Replaying,
}

impl DashboardStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DashboardStatus::Stopped => "Stopped",
            DashboardStatus::Waiting => "Waiting",
            DashboardStatus::Accelerating => "Accelerating",
            DashboardStatus::Braking => "Braking",
            DashboardStatus::AccelerationComplete => "Acceleration complete",
            DashboardStatus::BrakingComplete => "Braking complete",
            DashboardStatus::Replaying => "Replaying",
        }
    }
}

/// Read-only copy of the dashboard readouts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub car_id: Option<i64>,
    pub status: DashboardStatus,
    pub displayed_speed: f64,
    pub current_speed: f64,
    pub fuel_level: f64,
    pub total_distance: f64,
    pub fuel_used: f64,
    pub acceleration_percentage: u8,
    pub is_started: bool,
    pub is_accelerating: bool,
    pub is_braking: bool,
    pub is_replaying: bool,
    pub replay_step: Option<EventType>,
}

/// State of one dashboard session
#[derive(Debug, Clone)]
pub struct SimulationState {
    car: Option<Car>,
    phase: Phase,

    /// Authoritative speed; changes when a maneuver completes
    speed: f64,

    /// Speed on the gauge; jumps to the target as soon as a maneuver starts
    displayed_speed: f64,

    fuel_level: f64,
    total_distance: f64,
    fuel_used: f64,
    acceleration_percentage: u8,
    last_completed: Option<EventType>,
    maneuver_duration: f64,
    next_maneuver_id: u64,
}

impl SimulationState {
    /// New stopped state; `maneuver_duration` is in seconds
    pub fn new(maneuver_duration: f64) -> Self {
        Self {
            car: None,
            phase: Phase::Stopped,
            speed: 0.0,
            displayed_speed: 0.0,
            fuel_level: FULL_TANK,
            total_distance: 0.0,
            fuel_used: 0.0,
            acceleration_percentage: 0,
            last_completed: None,
            maneuver_duration,
            next_maneuver_id: 1,
        }
    }

    pub fn car(&self) -> Option<&Car> {
        self.car.as_ref()
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn displayed_speed(&self) -> f64 {
        self.displayed_speed
    }

    pub fn fuel_level(&self) -> f64 {
        self.fuel_level
    }

    pub fn total_distance(&self) -> f64 {
        self.total_distance
    }

    pub fn fuel_used(&self) -> f64 {
        self.fuel_used
    }

    pub fn maneuver_duration(&self) -> f64 {
        self.maneuver_duration
    }

    pub fn is_started(&self) -> bool {
        matches!(self.phase, Phase::Idle | Phase::Maneuvering(_))
    }

    pub fn is_accelerating(&self) -> bool {
        matches!(&self.phase, Phase::Maneuvering(m) if m.kind == EventType::Acceleration)
    }

    pub fn is_braking(&self) -> bool {
        matches!(&self.phase, Phase::Maneuvering(m) if m.kind == EventType::Braking)
    }

    pub fn is_replaying(&self) -> bool {
        matches!(self.phase, Phase::Replaying { .. })
    }

    pub fn pending(&self) -> Option<&PendingManeuver> {
        match &self.phase {
            Phase::Maneuvering(pending) => Some(pending),
            _ => None,
        }
    }

    pub fn status(&self) -> DashboardStatus {
        match &self.phase {
            Phase::Stopped => DashboardStatus::Stopped,
            Phase::Replaying { .. } => DashboardStatus::Replaying,
            Phase::Maneuvering(m) => match m.kind {
                EventType::Acceleration => DashboardStatus::Accelerating,
                EventType::Braking => DashboardStatus::Braking,
            },
            Phase::Idle => match self.last_completed {
                Some(EventType::Acceleration) => DashboardStatus::AccelerationComplete,
                Some(EventType::Braking) => DashboardStatus::BrakingComplete,
                None => DashboardStatus::Waiting,
            },
        }
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            car_id: self.car.as_ref().map(|c| c.id),
            status: self.status(),
            displayed_speed: self.displayed_speed,
            current_speed: self.speed,
            fuel_level: self.fuel_level,
            total_distance: self.total_distance,
            fuel_used: self.fuel_used,
            acceleration_percentage: self.acceleration_percentage,
            is_started: self.is_started(),
            is_accelerating: self.is_accelerating(),
            is_braking: self.is_braking(),
            is_replaying: self.is_replaying(),
            replay_step: match self.phase {
                Phase::Replaying { step } => step,
                _ => None,
            },
        }
    }

    fn require_car(&self) -> Result<&Car, Rejection> {
        self.car.as_ref().ok_or(Rejection::NoCarSelected)
    }

    fn clamp_speed(&self, speed: f64) -> f64 {
        let max = self.car.as_ref().map(|c| c.max_speed).unwrap_or(f64::MAX);
        speed.clamp(0.0, max.max(0.0))
    }

    fn reset_readouts(&mut self) {
        self.speed = 0.0;
        self.displayed_speed = 0.0;
        self.fuel_level = FULL_TANK;
        self.total_distance = 0.0;
        self.fuel_used = 0.0;
        self.last_completed = None;
    }

    /// Choose the vehicle; only while stopped
    pub fn select_car(&mut self, car: Car) -> Result<(), Rejection> {
        match self.phase {
            Phase::Stopped => {}
            Phase::Replaying { .. } => return Err(Rejection::ReplayInProgress),
            Phase::Idle | Phase::Maneuvering(_) => return Err(Rejection::CarLocked),
        }
        self.car = Some(car);
        self.speed = 0.0;
        self.displayed_speed = 0.0;
        Ok(())
    }

    /// Reset readouts and enter Idle
    pub fn start(&mut self) -> Result<(), Rejection> {
        self.require_car()?;
        match self.phase {
            Phase::Maneuvering(_) => return Err(Rejection::ManeuverInProgress),
            Phase::Replaying { .. } => return Err(Rejection::ReplayInProgress),
            Phase::Stopped | Phase::Idle => {}
        }
        self.reset_readouts();
        self.phase = Phase::Idle;
        Ok(())
    }

    /// Enter Stopped, returning the maneuver that was discarded, if any
    pub fn stop(&mut self) -> Option<PendingManeuver> {
        let previous = std::mem::replace(&mut self.phase, Phase::Stopped);
        self.speed = 0.0;
        self.displayed_speed = 0.0;
        match previous {
            Phase::Maneuvering(pending) => Some(pending),
            _ => None,
        }
    }

    fn require_idle(&self) -> Result<&Car, Rejection> {
        let car = self.require_car()?;
        match self.phase {
            Phase::Idle => Ok(car),
            Phase::Stopped => Err(Rejection::NotStarted),
            Phase::Maneuvering(_) => Err(Rejection::ManeuverInProgress),
            Phase::Replaying { .. } => Err(Rejection::ReplayInProgress),
        }
    }

    fn begin(&mut self, pending: PendingManeuver) -> PendingManeuver {
        self.next_maneuver_id += 1;
        self.displayed_speed = pending.final_speed;
        self.phase = Phase::Maneuvering(pending.clone());
        pending
    }

    /// Start accelerating; the fuel is deducted immediately
    pub fn begin_acceleration(
        &mut self,
        percentage: u8,
        now: DateTime<Utc>,
    ) -> Result<PendingManeuver, Rejection> {
        if !is_valid_percentage(percentage) {
            return Err(Rejection::InvalidPercentage(percentage));
        }
        let car = self.require_idle()?;
        if self.fuel_level <= 0.0 {
            return Err(Rejection::OutOfFuel);
        }

        let duration = self.maneuver_duration;
        let final_speed = acceleration_final_speed(car, self.speed, percentage, duration);
        let consumed = fuel_consumption(car, percentage, duration);
        let pending = PendingManeuver {
            id: self.next_maneuver_id,
            kind: EventType::Acceleration,
            percentage,
            initial_speed: self.speed,
            final_speed: self.clamp_speed(final_speed),
            fuel_consumed: consumed.min(self.fuel_level),
            started_at: now,
        };

        self.fuel_level = deduct_fuel(self.fuel_level, consumed);
        self.acceleration_percentage = percentage;
        Ok(self.begin(pending))
    }

    /// Start braking; requires a moving car
    pub fn begin_braking(
        &mut self,
        percentage: u8,
        now: DateTime<Utc>,
    ) -> Result<PendingManeuver, Rejection> {
        if !is_valid_percentage(percentage) {
            return Err(Rejection::InvalidPercentage(percentage));
        }
        let car = self.require_idle()?;
        if self.speed <= 0.0 {
            return Err(Rejection::Stationary);
        }

        let final_speed = braking_final_speed(car, self.speed, percentage, self.maneuver_duration);
        let pending = PendingManeuver {
            id: self.next_maneuver_id,
            kind: EventType::Braking,
            percentage,
            initial_speed: self.speed,
            final_speed,
            fuel_consumed: 0.0,
            started_at: now,
        };

        Ok(self.begin(pending))
    }

    /// Finish maneuver `id` after `elapsed_secs` of wall-clock time
    ///
    /// Applies the final speed and totals, returns to Idle and yields the
    /// event to persist.
    pub fn complete_maneuver(
        &mut self,
        id: u64,
        elapsed_secs: f64,
    ) -> Result<NewDrivingEvent, Rejection> {
        let pending = match &self.phase {
            Phase::Maneuvering(pending) if pending.id == id => pending.clone(),
            Phase::Maneuvering(_) => return Err(Rejection::StaleManeuver(id)),
            _ => return Err(Rejection::NoPendingManeuver),
        };
        let car_id = self.require_car()?.id;

        let duration = round_to(elapsed_secs, 3).max(MIN_EVENT_DURATION_SECS);
        let initial_speed = round_to(pending.initial_speed, 2);
        let final_speed = round_to(pending.final_speed, 2);
        let fuel_consumed = round_to(pending.fuel_consumed, 2);
        let distance = distance_km(initial_speed, final_speed, duration);
        let end_time = pending.started_at + Duration::microseconds((duration * 1_000_000.0) as i64);

        self.speed = pending.final_speed;
        self.displayed_speed = pending.final_speed;
        self.total_distance += distance;
        self.fuel_used += fuel_consumed;
        self.last_completed = Some(pending.kind);
        self.phase = Phase::Idle;

        Ok(NewDrivingEvent {
            car_id,
            event_type: pending.kind,
            initial_speed,
            final_speed,
            acceleration_percentage: pending.percentage as i64,
            duration_seconds: duration,
            fuel_consumed,
            distance_traveled: distance,
            start_time: pending.started_at,
            end_time,
        })
    }

    /// Enter replay; readouts reset to a fresh start
    pub fn begin_replay(&mut self) -> Result<(), Rejection> {
        self.require_car()?;
        match self.phase {
            Phase::Stopped => {}
            Phase::Replaying { .. } => return Err(Rejection::ReplayInProgress),
            Phase::Idle | Phase::Maneuvering(_) => return Err(Rejection::DashboardRunning),
        }
        self.reset_readouts();
        self.phase = Phase::Replaying { step: None };
        Ok(())
    }

    /// Show the start of a recorded event
    pub fn replay_step_started(&mut self, event: &DrivingEvent) -> Result<(), Rejection> {
        if !self.is_replaying() {
            return Err(Rejection::NotReplaying);
        }
        let speed = self.clamp_speed(event.initial_speed);
        self.speed = speed;
        self.displayed_speed = speed;
        if event.event_type == EventType::Acceleration {
            self.acceleration_percentage = event.acceleration_percentage.clamp(0, 100) as u8;
        }
        self.phase = Phase::Replaying {
            step: Some(event.event_type),
        };
        Ok(())
    }

    /// Show the end of a recorded event and accumulate its totals
    pub fn replay_step_finished(&mut self, event: &DrivingEvent) -> Result<(), Rejection> {
        if !self.is_replaying() {
            return Err(Rejection::NotReplaying);
        }
        let speed = self.clamp_speed(event.final_speed);
        let fuel = event.fuel_consumed.max(0.0);
        self.speed = speed;
        self.displayed_speed = speed;
        self.total_distance += event.distance_traveled.max(0.0);
        self.fuel_used += fuel;
        self.fuel_level = deduct_fuel(self.fuel_level, fuel);
        self.phase = Phase::Replaying { step: None };
        Ok(())
    }

    /// Leave replay after the last event
    pub fn finish_replay(&mut self) -> Result<(), Rejection> {
        if !self.is_replaying() {
            return Err(Rejection::NotReplaying);
        }
        self.phase = Phase::Stopped;
        Ok(())
    }

    /// Abort replay, keeping every total applied so far; returns whether a replay was running
    pub fn cancel_replay(&mut self) -> bool {
        if self.is_replaying() {
            self.phase = Phase::Stopped;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::physics::tests::test_car;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn started() -> SimulationState {
        let mut state = SimulationState::new(1.0);
        state.select_car(test_car()).unwrap();
        state.start().unwrap();
        state
    }

    fn recorded(kind: EventType, initial: f64, final_speed: f64, fuel: f64) -> DrivingEvent {
        DrivingEvent {
            id: 1,
            car_id: 1,
            event_type: kind,
            initial_speed: initial,
            final_speed,
            acceleration_percentage: 40,
            duration_seconds: 1.0,
            fuel_consumed: fuel,
            distance_traveled: 0.01,
            start_time: now(),
            end_time: now() + Duration::seconds(1),
        }
    }

    fn assert_exclusive_flags(state: &SimulationState) {
        let active = [state.is_accelerating(), state.is_braking(), state.is_replaying()]
            .iter()
            .filter(|f| **f)
            .count();
        assert!(active <= 1);
    }

    #[test]
    fn test_start_requires_car() {
        let mut state = SimulationState::new(1.0);
        assert_eq!(state.start(), Err(Rejection::NoCarSelected));
        assert_eq!(state.status(), DashboardStatus::Stopped);
    }

    #[test]
    fn test_reference_acceleration() {
        let mut state = started();
        let pending = state.begin_acceleration(50, now()).unwrap();

        assert_eq!(pending.final_speed, 10.0);
        assert_eq!(pending.fuel_consumed, 2.5);
        assert_eq!(state.fuel_level(), 97.5);
        assert_eq!(state.displayed_speed(), 10.0);
        assert_eq!(state.speed(), 0.0);
        assert!(state.is_accelerating());
        assert_exclusive_flags(&state);

        let event = state.complete_maneuver(pending.id, 1.0).unwrap();
        assert_eq!(event.event_type, EventType::Acceleration);
        assert_eq!(event.initial_speed, 0.0);
        assert_eq!(event.final_speed, 10.0);
        assert_eq!(event.fuel_consumed, 2.5);
        assert_eq!(event.acceleration_percentage, 50);
        assert_eq!(event.distance_traveled, 0.0014);
        assert_eq!(event.end_time - event.start_time, Duration::seconds(1));

        assert_eq!(state.speed(), 10.0);
        assert_eq!(state.fuel_used(), 2.5);
        assert_eq!(state.status(), DashboardStatus::AccelerationComplete);
    }

    #[test]
    fn test_second_maneuver_rejected_while_pending() {
        let mut state = started();
        state.begin_acceleration(100, now()).unwrap();

        assert_eq!(
            state.begin_acceleration(10, now()),
            Err(Rejection::ManeuverInProgress)
        );
        assert_eq!(state.begin_braking(10, now()), Err(Rejection::ManeuverInProgress));
        assert_eq!(state.fuel_level(), 95.0);
    }

    #[test]
    fn test_braking_requires_speed() {
        let mut state = started();
        assert_eq!(state.begin_braking(50, now()), Err(Rejection::Stationary));

        let pending = state.begin_acceleration(100, now()).unwrap();
        state.complete_maneuver(pending.id, 1.0).unwrap();

        let pending = state.begin_braking(40, now()).unwrap();
        assert_eq!(pending.final_speed, 10.0);
        assert!(state.is_braking());
        let event = state.complete_maneuver(pending.id, 1.0).unwrap();
        assert_eq!(event.fuel_consumed, 0.0);
        assert_eq!(state.speed(), 10.0);
        assert_eq!(state.fuel_level(), 95.0);
        assert_eq!(state.status(), DashboardStatus::BrakingComplete);
    }

    #[test]
    fn test_commands_rejected_when_stopped() {
        let mut state = SimulationState::new(1.0);
        state.select_car(test_car()).unwrap();
        assert_eq!(state.begin_acceleration(50, now()), Err(Rejection::NotStarted));
        assert_eq!(state.begin_acceleration(55, now()), Err(Rejection::InvalidPercentage(55)));
    }

    #[test]
    fn test_out_of_fuel() {
        let mut state = started();
        // 5% per full-throttle second: twenty seconds empties the tank
        for _ in 0..20 {
            let pending = state.begin_acceleration(100, now()).unwrap();
            state.complete_maneuver(pending.id, 1.0).unwrap();
            assert!((0.0..=FULL_TANK).contains(&state.fuel_level()));
        }
        assert_eq!(state.fuel_level(), 0.0);
        assert_eq!(state.begin_acceleration(10, now()), Err(Rejection::OutOfFuel));
        assert!(state.speed() <= test_car().max_speed);
    }

    #[test]
    fn test_stop_discards_pending() {
        let mut state = started();
        let pending = state.begin_acceleration(50, now()).unwrap();

        let discarded = state.stop().unwrap();
        assert_eq!(discarded.id, pending.id);
        assert_eq!(state.status(), DashboardStatus::Stopped);
        assert_eq!(state.speed(), 0.0);
        assert_eq!(
            state.complete_maneuver(pending.id, 1.0),
            Err(Rejection::NoPendingManeuver)
        );
    }

    #[test]
    fn test_stale_completion_rejected() {
        let mut state = started();
        let first = state.begin_acceleration(50, now()).unwrap();
        state.stop();
        state.start().unwrap();
        let second = state.begin_acceleration(50, now()).unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(
            state.complete_maneuver(first.id, 1.0),
            Err(Rejection::StaleManeuver(first.id))
        );
        assert!(state.is_accelerating());
    }

    #[test]
    fn test_car_locked_while_running() {
        let mut state = started();
        assert_eq!(state.select_car(test_car()), Err(Rejection::CarLocked));
    }

    #[test]
    fn test_restart_resets_readouts() {
        let mut state = started();
        let pending = state.begin_acceleration(100, now()).unwrap();
        state.complete_maneuver(pending.id, 1.0).unwrap();
        state.stop();

        state.start().unwrap();
        assert_eq!(state.fuel_level(), FULL_TANK);
        assert_eq!(state.total_distance(), 0.0);
        assert_eq!(state.fuel_used(), 0.0);
        assert_eq!(state.status(), DashboardStatus::Waiting);
    }

    #[test]
    fn test_replay_transitions() {
        let mut state = SimulationState::new(1.0);
        state.select_car(test_car()).unwrap();
        state.begin_replay().unwrap();
        assert!(state.is_replaying());
        assert!(!state.is_started());

        let event = recorded(EventType::Acceleration, 0.0, 8.0, 2.0);
        state.replay_step_started(&event).unwrap();
        assert_eq!(state.snapshot().replay_step, Some(EventType::Acceleration));
        assert_eq!(state.snapshot().acceleration_percentage, 40);
        assert_exclusive_flags(&state);

        state.replay_step_finished(&event).unwrap();
        assert_eq!(state.displayed_speed(), 8.0);
        assert_eq!(state.fuel_level(), 98.0);
        assert_eq!(state.fuel_used(), 2.0);

        state.finish_replay().unwrap();
        assert!(!state.is_replaying());
        assert_eq!(state.finish_replay(), Err(Rejection::NotReplaying));
    }

    #[test]
    fn test_replay_rejected_while_running() {
        let mut state = started();
        assert_eq!(state.begin_replay(), Err(Rejection::DashboardRunning));
        state.stop();
        state.begin_replay().unwrap();
        assert_eq!(state.begin_acceleration(10, now()), Err(Rejection::ReplayInProgress));
        assert_eq!(state.start(), Err(Rejection::ReplayInProgress));
    }

    #[test]
    fn test_cancel_replay_keeps_totals() {
        let mut state = SimulationState::new(1.0);
        state.select_car(test_car()).unwrap();
        state.begin_replay().unwrap();

        let event = recorded(EventType::Acceleration, 0.0, 8.0, 2.0);
        state.replay_step_started(&event).unwrap();
        state.replay_step_finished(&event).unwrap();
        state.replay_step_started(&recorded(EventType::Braking, 8.0, 4.0, 0.0)).unwrap();

        assert!(state.cancel_replay());
        assert_eq!(state.status(), DashboardStatus::Stopped);
        assert_eq!(state.total_distance(), 0.01);
        assert_eq!(state.fuel_used(), 2.0);
        assert!(!state.cancel_replay());
    }

    #[test]
    fn test_replayed_speed_is_clamped() {
        let mut state = SimulationState::new(1.0);
        state.select_car(test_car()).unwrap();
        state.begin_replay().unwrap();

        let event = recorded(EventType::Acceleration, -5.0, 900.0, 250.0);
        state.replay_step_started(&event).unwrap();
        assert_eq!(state.speed(), 0.0);
        state.replay_step_finished(&event).unwrap();
        assert_eq!(state.speed(), 200.0);
        assert_eq!(state.fuel_level(), 0.0);
    }
}
