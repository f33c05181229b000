//! Common test infrastructure
//!
//! Each test spawns an isolated server with its own user database, a synthetic
//! chord model and cheap RSA keys, then talks to it over real TCP.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::TestServer;
//!
//! #[tokio::test]
//! async fn test_signin() {
//!     let server = TestServer::spawn().await;
//!     let mut client = server.connect().await;
//!     let response = client.sign_in("alice", "pw1").await.unwrap();
//! }
//! ```

mod constants;
mod fixtures;
mod server;

pub use constants::*;
#[allow(unused_imports)]
pub use fixtures::{write_tone_wav, write_tone_wav_at, Tone};
pub use server::TestServer;
