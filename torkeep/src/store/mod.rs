//! Persisted resume and session state.
//!
//! Every download has one resume file keyed by its source name, and the
//! process has one session file shared by all downloads:
//!
//! ```text
//! <sessions_dir>/
//!   ├── ubuntu-24.04.iso.torrent.resume_file
//!   ├── c12fe1c06bba254a9dc9f519b335aa7c1367a88a.resume_file
//!   └── engine.session
//! ```
//!
//! Reads treat a missing file as "no state". Writes go to a sibling
//! `.tmp` file which is flushed and renamed over the target, so a crash
//! mid-write never leaves a truncated blob under the real name.
//!
//! # Example
//!
//! ```ignore
//! use torkeep::store::{ResumeLookup, StateFiles};
//!
//! let files = StateFiles::new("/var/lib/torkeep/sessions");
//! match files.load_resume(&descriptor, engine.as_ref()) {
//!     ResumeLookup::Loaded(data) => params = params.with_resume(data),
//!     other => tracing::debug!(lookup = ?other, "starting without resume data"),
//! }
//! ```

mod atomic;
mod error;
mod files;

pub use atomic::{temp_path_for, write_atomic, TEMP_SUFFIX};
pub use error::{StoreError, StoreResult};
pub use files::{ResumeLookup, StateFiles, RESUME_SUFFIX, SESSION_FILE_NAME};
