// packages/engine/src/simulation/session.rs
//! Dashboard session
//!
//! Binds a [`SimulationState`] to its timers and to the Events API:
//!
//! - accelerate/brake start a maneuver and schedule its completion
//! - completion applies the result and posts the event to the backend
//! - replay loads a car's events and plays them back on a background task
//! - stop discards the pending maneuver, then waits for any completion that
//!   already applied so its event is still written
//!
//! Every state change is published on a watch channel so readers can follow
//! the dashboard without polling.

use crate::simulation::backend::EventsBackend;
use crate::simulation::keyboard::{ChordDecoder, Command, KeyEvent};
use crate::simulation::replay::ReplayEngine;
use crate::simulation::state::{DashboardSnapshot, PendingManeuver, Rejection, SimulationState};
use crate::simulation::timer::DeferredAction;
use crate::store::models::Car;
use crate::utils::config::SimulationConfig;
use crate::utils::errors::{EngineError, Result};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Dashboard state shared between the session and its background tasks
///
/// The lock is never held across an await point.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<Mutex<SimulationState>>,
    updates: Arc<watch::Sender<DashboardSnapshot>>,
}

impl SharedState {
    pub fn new(state: SimulationState) -> Self {
        let (updates, _) = watch::channel(state.snapshot());
        Self {
            inner: Arc::new(Mutex::new(state)),
            updates: Arc::new(updates),
        }
    }

    /// Mutate the state and publish the resulting snapshot
    pub fn update<R>(&self, f: impl FnOnce(&mut SimulationState) -> R) -> R {
        let mut state = self.inner.lock();
        let result = f(&mut state);
        self.updates.send_replace(state.snapshot());
        result
    }

    pub fn read<R>(&self, f: impl FnOnce(&SimulationState) -> R) -> R {
        f(&self.inner.lock())
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.read(|s| s.snapshot())
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.updates.subscribe()
    }
}

/// One dashboard driving one car
pub struct DashboardSession<B: EventsBackend> {
    backend: Arc<B>,
    state: SharedState,
    chord: Mutex<ChordDecoder>,
    maneuver_timers: Mutex<Vec<DeferredAction>>,
    replay_task: Mutex<Option<DeferredAction>>,
    replay_engine: ReplayEngine,
    cars: Mutex<Vec<Car>>,
}

impl<B: EventsBackend> DashboardSession<B> {
    pub fn new(backend: Arc<B>, config: &SimulationConfig) -> Self {
        Self {
            backend,
            state: SharedState::new(SimulationState::new(config.maneuver_duration_secs)),
            chord: Mutex::new(ChordDecoder::new()),
            maneuver_timers: Mutex::new(Vec::new()),
            replay_task: Mutex::new(None),
            replay_engine: ReplayEngine::new(config.replay_time_scale),
            cars: Mutex::new(Vec::new()),
        }
    }

    /// Create a session, load the car catalogue and select the first car
    pub async fn connect(backend: Arc<B>, config: &SimulationConfig) -> Result<Self> {
        let session = Self::new(backend, config);
        let cars = session.refresh_cars().await?;
        if let Some(first) = cars.first() {
            session.select_car(first.id).await?;
        }
        Ok(session)
    }

    pub async fn refresh_cars(&self) -> Result<Vec<Car>> {
        let cars = self.backend.list_cars().await?;
        info!("Loaded {} cars", cars.len());
        *self.cars.lock() = cars.clone();
        Ok(cars)
    }

    pub fn car(&self) -> Option<Car> {
        self.state.read(|s| s.car().cloned())
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.state.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.state.subscribe()
    }

    /// Select a car by id, stopping the dashboard or replay first
    pub async fn select_car(&self, car_id: i64) -> Result<()> {
        let car = self
            .cars
            .lock()
            .iter()
            .find(|c| c.id == car_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("car {}", car_id)))?;

        if self.state.read(|s| s.is_started() || s.is_replaying()) {
            self.stop().await;
        }

        self.state.update(|s| s.select_car(car.clone()))?;
        info!("Selected car {} ({})", car.id, car.name);
        Ok(())
    }

    /// Start the dashboard; a running replay is cancelled first
    pub async fn start(&self) -> Result<()> {
        if self.state.read(|s| s.is_replaying()) {
            self.stop_replay().await;
        }
        self.state.update(|s| s.start())?;
        info!("Vehicle started, controls enabled");
        Ok(())
    }

    /// Stop the dashboard, discarding any maneuver not yet completed
    ///
    /// The pending maneuver is discarded under the state lock, so its
    /// completion either already applied or never will. Completions that
    /// already applied are awaited until their event is written.
    pub async fn stop(&self) {
        if self.state.read(|s| s.is_replaying()) {
            self.stop_replay().await;
        }

        if let Some(discarded) = self.state.update(|s| s.stop()) {
            debug!("Discarded unconfirmed {} maneuver {}", discarded.kind, discarded.id);
        }
        self.chord.lock().reset();

        let timers = std::mem::take(&mut *self.maneuver_timers.lock());
        for timer in timers {
            timer.disarm().await;
        }
        info!("Vehicle stopped");
    }

    pub fn accelerate(&self, percentage: u8) -> Result<PendingManeuver> {
        let pending = self
            .state
            .update(|s| s.begin_acceleration(percentage, Utc::now()))
            .map_err(|r| self.rejected("acceleration", r))?;

        info!(
            "Accelerating at {}%: {:.2} -> {:.2} km/h, {:.2}% fuel",
            percentage, pending.initial_speed, pending.final_speed, pending.fuel_consumed
        );
        self.schedule_completion(&pending);
        Ok(pending)
    }

    pub fn brake(&self, percentage: u8) -> Result<PendingManeuver> {
        let pending = self
            .state
            .update(|s| s.begin_braking(percentage, Utc::now()))
            .map_err(|r| self.rejected("braking", r))?;

        info!(
            "Braking at {}%: {:.2} -> {:.2} km/h",
            percentage, pending.initial_speed, pending.final_speed
        );
        self.schedule_completion(&pending);
        Ok(pending)
    }

    fn rejected(&self, action: &str, rejection: Rejection) -> EngineError {
        debug!("Ignoring {}: {}", action, rejection);
        EngineError::Rejected(rejection)
    }

    fn schedule_completion(&self, pending: &PendingManeuver) {
        let state = self.state.clone();
        let backend = Arc::clone(&self.backend);
        let id = pending.id;
        let kind = pending.kind;
        let started = tokio::time::Instant::now();
        let delay = Duration::try_from_secs_f64(self.state.read(|s| s.maneuver_duration()))
            .unwrap_or(Duration::MAX);

        let timer = DeferredAction::schedule(delay, async move {
            let elapsed = started.elapsed().as_secs_f64();
            let event = match state.update(|s| s.complete_maneuver(id, elapsed)) {
                Ok(event) => event,
                Err(rejection) => {
                    debug!("Dropping completion of maneuver {}: {}", id, rejection);
                    return;
                }
            };

            metrics::counter!("dashboard_maneuvers_completed_total", "kind" => kind.as_str())
                .increment(1);

            match backend.create_event(&event).await {
                Ok(stored) => {
                    info!(
                        "Recorded {} event {} ({:.2} -> {:.2} km/h, {:.4} km)",
                        stored.event_type,
                        stored.id,
                        stored.initial_speed,
                        stored.final_speed,
                        stored.distance_traveled
                    );
                }
                Err(e) => {
                    metrics::counter!("dashboard_event_persist_failures_total").increment(1);
                    warn!("Failed to record {} event: {}", kind, e);
                }
            }
        });

        let mut timers = self.maneuver_timers.lock();
        timers.retain(|t| !t.is_finished());
        timers.push(timer);
    }

    /// Feed a key event through the chord decoder and run the resulting command
    ///
    /// Key presses are ignored while the dashboard is not started; releases
    /// always reach the decoder so a modifier cannot stay stuck.
    pub fn handle_key(&self, event: KeyEvent) -> Result<Option<Command>> {
        if matches!(event, KeyEvent::Pressed(_)) && !self.state.read(|s| s.is_started()) {
            return Ok(None);
        }

        let command = self.chord.lock().feed(event);
        match command {
            Some(Command::Accelerate(percentage)) => {
                self.accelerate(percentage)?;
            }
            Some(Command::Brake(percentage)) => {
                self.brake(percentage)?;
            }
            None => {}
        }
        Ok(command)
    }

    /// Replay the selected car's recorded events on a background task
    ///
    /// A running dashboard is stopped first. Returns the number of events
    /// scheduled; zero leaves the state untouched.
    pub async fn start_replay(&self) -> Result<usize> {
        let car = self.car().ok_or(Rejection::NoCarSelected)?;
        if self.state.read(|s| s.is_replaying()) {
            return Err(Rejection::ReplayInProgress.into());
        }
        if self.state.read(|s| s.is_started()) {
            self.stop().await;
        }

        let events = self.backend.events_for_car(car.id).await.map_err(|e| {
            warn!("Failed to load events for replay of car {}: {}", car.id, e);
            e
        })?;

        if events.is_empty() {
            info!("No events to replay for car {}", car.id);
            return Ok(0);
        }

        self.state.update(|s| s.begin_replay())?;
        let count = events.len();

        let state = self.state.clone();
        let engine = self.replay_engine.clone();
        let exit = ReplayExit(state.clone());
        let task = DeferredAction::spawn(async move {
            let _exit = exit;
            if let Err(e) = engine.play(events, &state).await {
                debug!("Replay ended early: {}", e);
            }
        });
        *self.replay_task.lock() = Some(task);

        Ok(count)
    }

    /// Cancel a running replay, keeping the totals applied so far
    pub async fn stop_replay(&self) -> bool {
        let was_replaying = self.state.update(|s| s.cancel_replay());

        let task = self.replay_task.lock().take();
        if let Some(task) = task {
            task.cancel_and_wait().await;
        }

        if was_replaying {
            info!("Replay stopped");
        }
        was_replaying
    }

    /// Wait until no replay is running
    pub async fn wait_for_replay(&self) {
        let mut updates = self.subscribe();
        let _ = updates.wait_for(|s| !s.is_replaying).await;
    }

    /// Wait for every scheduled maneuver completion, including its write
    pub async fn settle(&self) {
        let timers = std::mem::take(&mut *self.maneuver_timers.lock());
        for timer in timers {
            timer.join().await;
        }
    }
}

/// Leaves replay when the playback task ends, however it ends
struct ReplayExit(SharedState);

impl Drop for ReplayExit {
    fn drop(&mut self) {
        if self.0.read(|s| s.is_replaying()) && self.0.update(|s| s.cancel_replay()) {
            debug!("Replay task ended before finishing playback");
        }
    }
}

impl<B: EventsBackend> Drop for DashboardSession<B> {
    fn drop(&mut self) {
        for timer in self.maneuver_timers.get_mut().drain(..) {
            timer.cancel();
        }
        if let Some(task) = self.replay_task.get_mut().take() {
            task.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::keyboard::Key;
    use crate::simulation::state::DashboardStatus;
    use crate::store::models::{DrivingEvent, EventType, NewCar, NewDrivingEvent};
    use crate::store::EventStore;
    use async_trait::async_trait;

    /// Store whose writes take a while, like a slow Events API
    struct SlowStore(Arc<EventStore>);

    #[async_trait]
    impl EventsBackend for SlowStore {
        async fn list_cars(&self) -> Result<Vec<Car>> {
            self.0.list_cars().await
        }

        async fn events_for_car(&self, car_id: i64) -> Result<Vec<DrivingEvent>> {
            self.0.list_events_for_car(car_id).await
        }

        async fn create_event(&self, event: &NewDrivingEvent) -> Result<DrivingEvent> {
            tokio::time::sleep(Duration::from_millis(300)).await;
            self.0.insert_event(event).await
        }
    }

    fn config() -> SimulationConfig {
        SimulationConfig {
            maneuver_duration_secs: 1.0,
            replay_time_scale: 1.0,
            ..Default::default()
        }
    }

    async fn session() -> (Arc<EventStore>, DashboardSession<EventStore>, Car) {
        let store = Arc::new(EventStore::in_memory().await.unwrap());
        let car = store
            .insert_car(&NewCar::new("Test", "T1", 200.0, 20.0, 5.0).with_braking(25.0))
            .await
            .unwrap();
        let session = DashboardSession::connect(Arc::clone(&store), &config())
            .await
            .unwrap();
        (store, session, car)
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_selects_first_car() {
        let (_, session, car) = session().await;
        assert_eq!(session.car().unwrap().id, car.id);
        assert_eq!(session.snapshot().status, DashboardStatus::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acceleration_is_recorded() {
        let (store, session, car) = session().await;
        session.start().await.unwrap();

        session.accelerate(50).unwrap();
        let snapshot = session.snapshot();
        assert!(snapshot.is_accelerating);
        assert_eq!(snapshot.displayed_speed, 10.0);
        assert_eq!(snapshot.fuel_level, 97.5);

        session.settle().await;

        let events = store.list_events_for_car(car.id).await.unwrap();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.event_type, EventType::Acceleration);
        assert_eq!(event.initial_speed, 0.0);
        assert_eq!(event.final_speed, 10.0);
        assert_eq!(event.fuel_consumed, 2.5);
        assert_eq!(event.duration_seconds, 1.0);
        assert!(event.end_time > event.start_time);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.status, DashboardStatus::AccelerationComplete);
        assert_eq!(snapshot.current_speed, 10.0);
        assert_eq!(snapshot.fuel_used, 2.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_maneuver_rejected() {
        let (store, session, car) = session().await;
        session.start().await.unwrap();

        session.accelerate(100).unwrap();
        let second = session.accelerate(100);
        assert!(matches!(
            second,
            Err(EngineError::Rejected(Rejection::ManeuverInProgress))
        ));

        session.settle().await;
        assert_eq!(store.list_events_for_car(car.id).await.unwrap().len(), 1);
        assert_eq!(session.snapshot().fuel_level, 95.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_maneuver() {
        let (store, session, car) = session().await;
        session.start().await.unwrap();
        session.accelerate(50).unwrap();

        session.stop().await;
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert!(store.list_events_for_car(car.id).await.unwrap().is_empty());
        let snapshot = session.snapshot();
        assert_eq!(snapshot.status, DashboardStatus::Stopped);
        assert_eq!(snapshot.current_speed, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keyboard_chords_drive_the_car() {
        let (store, session, car) = session().await;

        // Ignored while stopped
        assert_eq!(session.handle_key(KeyEvent::Pressed(Key::Space)).unwrap(), None);
        assert_eq!(session.handle_key(KeyEvent::Pressed(Key::Digit(5))).unwrap(), None);

        session.start().await.unwrap();
        session.handle_key(KeyEvent::Pressed(Key::Space)).unwrap();
        let command = session.handle_key(KeyEvent::Pressed(Key::Digit(0))).unwrap();
        assert_eq!(command, Some(Command::Accelerate(100)));
        session.settle().await;

        session.handle_key(KeyEvent::Pressed(Key::Control)).unwrap();
        let command = session.handle_key(KeyEvent::Pressed(Key::Digit(4))).unwrap();
        assert_eq!(command, Some(Command::Brake(40)));
        session.settle().await;
        session.handle_key(KeyEvent::Released(Key::Control)).unwrap();

        let events = store.list_events_for_car(car.id).await.unwrap();
        let kinds: Vec<_> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(kinds, vec![EventType::Acceleration, EventType::Braking]);
        assert_eq!(events[1].initial_speed, 20.0);
        assert_eq!(events[1].final_speed, 10.0);
        assert_eq!(events[1].acceleration_percentage, 40);
        assert_eq!(session.snapshot().current_speed, 10.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_of_recorded_session() {
        let (store, session, car) = session().await;
        session.start().await.unwrap();
        for pct in [50, 100, 30] {
            session.accelerate(pct).unwrap();
            session.settle().await;
        }
        let recorded = store.list_events_for_car(car.id).await.unwrap();
        assert_eq!(recorded.len(), 3);

        let scheduled = session.start_replay().await.unwrap();
        assert_eq!(scheduled, 3);
        assert!(!session.snapshot().is_started);
        assert!(session.snapshot().is_replaying);

        session.wait_for_replay().await;

        let snapshot = session.snapshot();
        assert!(!snapshot.is_replaying);
        assert_eq!(snapshot.status, DashboardStatus::Stopped);
        assert_eq!(snapshot.current_speed, recorded[2].final_speed);
        let fuel: f64 = recorded.iter().map(|e| e.fuel_consumed).sum();
        assert!((snapshot.fuel_used - fuel).abs() < 1e-9);

        // Replay never writes
        assert_eq!(store.list_events_for_car(car.id).await.unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_with_no_events() {
        let (_, session, _) = session().await;
        assert_eq!(session.start_replay().await.unwrap(), 0);
        assert!(!session.snapshot().is_replaying);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_replay_keeps_totals() {
        let (store, session, car) = session().await;
        session.start().await.unwrap();
        for _ in 0..3 {
            session.accelerate(100).unwrap();
            session.settle().await;
        }
        session.stop().await;

        session.start_replay().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(session.stop_replay().await);

        let snapshot = session.snapshot();
        assert!(!snapshot.is_replaying);
        assert_eq!(snapshot.fuel_used, 5.0);

        // Cancelled playback does not resume
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(session.snapshot().fuel_used, 5.0);
        assert_eq!(store.list_events_for_car(car.id).await.unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_cancels_replay() {
        let (_, session, _) = session().await;
        session.start().await.unwrap();
        session.accelerate(100).unwrap();
        session.settle().await;
        session.stop().await;

        session.start_replay().await.unwrap();
        session.start().await.unwrap();

        let snapshot = session.snapshot();
        assert!(!snapshot.is_replaying);
        assert!(snapshot.is_started);
        assert_eq!(snapshot.fuel_level, 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_car_stops_dashboard() {
        let (store, session, car) = session().await;
        let other = store
            .insert_car(&NewCar::new("Other", "O1", 120.0, 10.0, 3.0))
            .await
            .unwrap();
        session.refresh_cars().await.unwrap();

        session.start().await.unwrap();
        session.accelerate(50).unwrap();
        session.select_car(other.id).await.unwrap();

        assert_eq!(session.car().unwrap().id, other.id);
        assert!(!session.snapshot().is_started);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(store.list_events_for_car(car.id).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_unknown_car() {
        let (_, session, _) = session().await;
        assert!(matches!(
            session.select_car(999).await,
            Err(EngineError::NotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_waits_for_applied_completion() {
        let store = Arc::new(EventStore::in_memory().await.unwrap());
        let car = store
            .insert_car(&NewCar::new("Test", "T1", 200.0, 20.0, 5.0))
            .await
            .unwrap();
        let backend = Arc::new(SlowStore(Arc::clone(&store)));
        let session = DashboardSession::connect(backend, &config()).await.unwrap();

        session.start().await.unwrap();
        session.accelerate(100).unwrap();

        // Completion has applied, its write is still in flight
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(session.snapshot().fuel_used, 5.0);

        session.stop().await;
        drop(session);

        let events = store.list_events_for_car(car.id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].fuel_consumed, 5.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_forgets_primed_chord() {
        let (store, session, car) = session().await;
        session.start().await.unwrap();
        session.handle_key(KeyEvent::Pressed(Key::Space)).unwrap();

        session.stop().await;
        session.start().await.unwrap();
        let command = session.handle_key(KeyEvent::Pressed(Key::Digit(5))).unwrap();

        assert_eq!(command, None);
        assert!(!session.snapshot().is_accelerating);
        session.settle().await;
        assert!(store.list_events_for_car(car.id).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_of_oversized_duration() {
        let (store, session, car) = session().await;
        let start = Utc::now();
        store
            .insert_event(&NewDrivingEvent {
                car_id: car.id,
                event_type: EventType::Braking,
                initial_speed: 10.0,
                final_speed: 5.0,
                acceleration_percentage: 20,
                duration_seconds: 1e20,
                fuel_consumed: 0.0,
                distance_traveled: 0.01,
                start_time: start,
                end_time: start + chrono::Duration::seconds(1),
            })
            .await
            .unwrap();

        assert_eq!(session.start_replay().await.unwrap(), 1);
        tokio::time::sleep(Duration::from_secs(5)).await;

        let snapshot = session.snapshot();
        assert!(snapshot.is_replaying);
        assert_eq!(snapshot.displayed_speed, 10.0);

        assert!(session.stop_replay().await);
        assert!(!session.snapshot().is_replaying);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_state_cleared_when_task_dies() {
        let (_, session, _) = session().await;
        session.start().await.unwrap();
        session.accelerate(100).unwrap();
        session.settle().await;
        session.stop().await;

        session.start_replay().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(session.snapshot().is_replaying);

        // Kill playback without going through stop_replay
        let task = session.replay_task.lock().take().unwrap();
        task.cancel_and_wait().await;

        assert!(!session.snapshot().is_replaying);
        tokio::time::timeout(Duration::from_secs(1), session.wait_for_replay())
            .await
            .unwrap();
    }
}
