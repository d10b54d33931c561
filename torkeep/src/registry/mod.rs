//! The download registry.
//!
//! The registry is the one place that knows which downloads exist. It keeps
//! the persisted id → save-path mapping, owns a managed copy of every added
//! `.torrent` file, and starts one [`Supervisor`](crate::supervisor::Supervisor)
//! per download.
//!
//! ```text
//!   front end ──add/remove/list──► Registry ──spawn──► Supervisor task (×N)
//!                                     │                      │
//!                                     │◄── watch snapshots ──┘
//!                                     ▼
//!                                 data.json
//! ```
//!
//! Removing a download raises its stop flag and returns at once. The
//! supervisor finishes its drain in the background; [`Registry::shutdown`]
//! waits for those too.

mod config;
mod downloads;
mod error;
mod mapping;

pub use config::{RegistryConfig, DEFAULT_DATA_FILE, DEFAULT_SESSIONS_DIR, DEFAULT_TORRENT_DIR};
pub use downloads::{DownloadEntry, DownloadId, Registry, STALE_TEMP_AGE};
pub use error::{RegistryError, RegistryResult};
pub use mapping::RegistryFile;
