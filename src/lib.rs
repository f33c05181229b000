//! Chordline server library
//!
//! Encrypted command protocol for remote chord recognition: the server, its client,
//! the credential store and the chord pipeline.

pub mod chords;
pub mod client;
pub mod config;
pub mod protocol;
pub mod server;
pub mod sqlite_persistence;
pub mod user;

// Re-export commonly used types for convenience
pub use chords::{CentroidModel, ChordEvent, ChordPipeline, ChordTimeline, MfccExtractor};
pub use client::ChordClient;
pub use server::{run_server, ChordServer, ServerConfig, ServerState};
pub use user::{SqliteUserStore, UserStore};
