//! Test server lifecycle management
//!
//! Each test gets an isolated server on a random port with its own database.

use super::constants::*;
use super::fixtures::write_test_model;
use chordline_server::chords::{CentroidModel, ChordPipeline, MfccExtractor};
use chordline_server::client::ChordClient;
use chordline_server::protocol::DEFAULT_MAX_FRAME_LEN;
use chordline_server::server::{ChordServer, LiveConnections, ServerConfig, ServerState};
use chordline_server::user::SqliteUserStore;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn test_config() -> ServerConfig {
    ServerConfig {
        rsa_key_bits: TEST_RSA_KEY_BITS,
        max_frame_len: DEFAULT_MAX_FRAME_LEN,
    }
}

/// Running server plus the temp resources it uses.
///
/// When dropped, the server stops accepting and temp files are removed.
pub struct TestServer {
    pub addr: SocketAddr,
    pub live_connections: Arc<LiveConnections>,
    pub db_path: PathBuf,

    temp_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

#[allow(dead_code)]
impl TestServer {
    pub async fn spawn() -> Self {
        Self::spawn_with(test_config()).await
    }

    pub async fn spawn_with(config: ServerConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let model_path = write_test_model(temp_dir.path()).expect("Failed to write test model");
        let model = CentroidModel::load(&model_path).expect("Failed to load test model");
        let pipeline = ChordPipeline::new(Arc::new(MfccExtractor::default()), Arc::new(model))
            .expect("Failed to build pipeline");
        Self::spawn_in(temp_dir, config, pipeline).await
    }

    /// Spawns with a caller-supplied chord pipeline.
    pub async fn spawn_with_pipeline(pipeline: ChordPipeline) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        Self::spawn_in(temp_dir, test_config(), pipeline).await
    }

    async fn spawn_in(temp_dir: TempDir, config: ServerConfig, pipeline: ChordPipeline) -> Self {
        let db_path = temp_dir.path().join("user_db.db");
        let user_store = SqliteUserStore::new(&db_path).expect("Failed to open user store");
        let state = ServerState::new(config, Arc::new(user_store), Arc::new(pipeline));

        let server = ChordServer::bind("127.0.0.1:0", state)
            .await
            .expect("Failed to bind to random port");
        let addr = server.local_addr().expect("Failed to get local address");
        let live_connections = server.live_connections();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            server
                .run_until(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        TestServer {
            addr,
            live_connections,
            db_path,
            temp_dir,
            _shutdown_tx: Some(shutdown_tx),
        }
    }

    pub async fn connect(&self) -> ChordClient {
        ChordClient::connect(self.addr)
            .await
            .expect("Failed to connect to test server")
    }

    /// Connects and registers the default test user.
    pub async fn connect_signed_up(&self) -> ChordClient {
        let mut client = self.connect().await;
        let response = client
            .sign_up(TEST_USER, TEST_PASS, TEST_EMAIL, TEST_ANIMAL)
            .await
            .expect("Signup failed");
        assert_eq!(response, "Signup successful");
        client
    }

    /// Directory for files the server should be able to read.
    pub fn files_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Polls until the live connection count equals `expected`.
    pub async fn wait_for_live_connections(&self, expected: usize) {
        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(CONDITION_TIMEOUT_MS);
        loop {
            let current = self.live_connections.current();
            if current == expected {
                return;
            }
            if start.elapsed() > timeout {
                panic!(
                    "Live connections stayed at {} instead of {} for {}ms",
                    current, expected, CONDITION_TIMEOUT_MS
                );
            }
            tokio::time::sleep(Duration::from_millis(CONDITION_POLL_INTERVAL_MS)).await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
