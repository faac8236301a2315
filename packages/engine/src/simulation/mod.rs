// packages/engine/src/simulation/mod.rs
//! Dashboard simulation
//!
//! - **Physics**: speed, fuel and distance formulas
//! - **State**: the dashboard state machine and its snapshots
//! - **Keyboard**: the two-key chord protocol
//! - **Timer**: cancellable deferred actions
//! - **Replay**: playback of recorded events
//! - **Session**: state, timers and the Events API wired together
//!
//! ```text
//! KeyEvent ─▶ ChordDecoder ─▶ DashboardSession ─▶ SimulationState
//!                                   │ (1s later)          │
//!                                   ▼                     ▼
//!                            EventsBackend          watch::Receiver
//! ```

pub mod backend;
pub mod keyboard;
pub mod physics;
pub mod replay;
pub mod session;
pub mod state;
pub mod timer;

pub use backend::EventsBackend;
pub use keyboard::{ChordDecoder, Command, Key, KeyEvent};
pub use replay::{ReplayEngine, ReplayReport};
pub use session::{DashboardSession, SharedState};
pub use state::{DashboardSnapshot, DashboardStatus, PendingManeuver, Phase, Rejection, SimulationState};
pub use timer::DeferredAction;
