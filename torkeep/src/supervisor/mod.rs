//! Per-download supervisors.
//!
//! A [`Supervisor`] drives one download through the engine and guarantees
//! that progress is checkpointed before it exits. Every supervisor runs on
//! its own tokio task; the registry only holds a [`SupervisorHandle`].
//!
//! # Event loop
//!
//! ```text
//! every poll_interval:
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │ 1. drain engine events (non-blocking), dispatch in order     │
//!   │ 2. Active and checkpoint_interval elapsed → checkpoint       │
//!   │ 3. stop flag raised → final checkpoint, enter Draining       │
//!   │ 4. ask the engine for a fresh status update                  │
//!   └──────────────────────────────────────────────────────────────┘
//!
//! transfer-finished / transfer-error ──► checkpoint, done, Draining
//! checkpoint result while Draining    ──► Terminated
//! Terminated ──► engine.remove(handle), persist session state, exit
//! ```
//!
//! At most one checkpoint is outstanding at a time. A request made while
//! one is pending is queued and issued when the pending result arrives.
//!
//! # Example
//!
//! ```ignore
//! use torkeep::supervisor::{Supervisor, SupervisorConfig};
//!
//! let supervisor = Supervisor::new(descriptor, engine, files, SupervisorConfig::default());
//! let handle = supervisor.spawn();
//! println!("{}", handle.snapshot().status_line());
//!
//! handle.stop();
//! let report = handle.join().await?;
//! assert!(report.final_state.is_terminated());
//! ```

mod config;
mod daemon;
mod error;
mod handle;
mod state;

pub use config::{
    SupervisorConfig, DEFAULT_CHECKPOINT_INTERVAL_SECS, DEFAULT_CHECKPOINT_RETRIES,
    DEFAULT_POLL_INTERVAL_MS,
};
pub use daemon::Supervisor;
pub use error::SupervisorError;
pub use handle::{SupervisorHandle, SupervisorReport};
pub use state::{format_status_line, SupervisorSnapshot, SupervisorState};
