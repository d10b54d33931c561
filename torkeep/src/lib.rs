//! torkeep: supervised, resumable peer-to-peer downloads.
//!
//! Each download runs under its own [`supervisor::Supervisor`], which
//! drives a shared [`engine::TransferEngine`], checkpoints progress to a
//! resume file and never exits without a final checkpoint attempt. The
//! [`registry::Registry`] owns the set of downloads and their persisted
//! mapping.
//!
//! ```text
//! registry ──► supervisor (one task per download) ──► engine
//!                 │                                     │
//!                 └──► store (resume + session files) ◄─┘ (opaque blobs)
//! ```

pub mod config;
pub mod descriptor;
pub mod engine;
pub mod logging;
pub mod registry;
pub mod store;
pub mod supervisor;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
