//! Routes decrypted commands to their handlers and writes the responses.

use anyhow::Result;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, info, warn};

use crate::chords::{AnalysisError, ChordTimeline};
use crate::protocol::message::{
    SigninRequest, SignupRequest, PROCESS_AUDIO_FAILED, SIGNIN_INCOMPLETE,
    SIGNIN_INVALID_CREDENTIALS, SIGNIN_STORAGE_ERROR, SIGNIN_SUCCESSFUL, SIGNUP_INCOMPLETE,
    SIGNUP_STORAGE_ERROR, SIGNUP_SUCCESSFUL, SIGNUP_USERNAME_TAKEN,
};
use crate::protocol::{Command, CommandError, FramedChannel, MessageType, RawMessage};
use crate::user::NewUser;

use super::session::ConnectionSession;
use super::state::ServerState;

/// What the read loop does after a message has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

/// Handles one message read off the wire.
///
/// Transport and decryption failures are returned as errors and end the connection.
/// Everything else is answered or logged.
pub async fn dispatch<S>(
    state: &ServerState,
    session: &mut ConnectionSession,
    channel: &mut FramedChannel<S>,
    message: RawMessage,
) -> Result<Flow>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Some(message_type) = MessageType::from_code(message.message_type) else {
        warn!(
            "Ignoring message of unknown type {} ({} bytes)",
            message.message_type,
            message.payload.len()
        );
        return Ok(Flow::Continue);
    };

    let text = session.cipher().open_text(&message.payload)?;
    debug!("Received {:?} message ({} bytes)", message_type, text.len());

    let command = match Command::parse(message_type, &text) {
        Ok(command) => command,
        Err(CommandError::IncompleteSignup) => {
            respond(session, channel, SIGNUP_INCOMPLETE).await?;
            return Ok(Flow::Continue);
        }
        Err(CommandError::IncompleteSignin) => {
            respond(session, channel, SIGNIN_INCOMPLETE).await?;
            return Ok(Flow::Continue);
        }
        Err(CommandError::InvalidTempo(text)) => {
            warn!("Ignoring malformed tempo message: {:?}", text);
            return Ok(Flow::Continue);
        }
        Err(CommandError::InvalidOpenFile(text)) => {
            warn!("Ignoring malformed open file message: {:?}", text);
            return Ok(Flow::Continue);
        }
    };

    match command {
        Command::Telemetry(action) => {
            info!("Client action: {}", action);
        }
        Command::Signup(request) => {
            let response = sign_up(state, request).await?;
            respond(session, channel, response).await?;
        }
        Command::Signin(request) => {
            let response = sign_in(state, request).await?;
            respond(session, channel, response).await?;
        }
        Command::SetTempo(bpm) => {
            info!("Tempo set to {} BPM", bpm);
            session.set_tempo(bpm);
        }
        Command::OpenFile(path) => {
            info!("Selected file {}", path.display());
            session.select_file(path);
        }
        Command::ProcessAudio => {
            let reply = process_audio(state, session).await?;
            respond(session, channel, &reply).await?;
        }
        Command::Terminate => {
            info!("Client requested termination");
            return Ok(Flow::Close);
        }
    }
    Ok(Flow::Continue)
}

async fn respond<S>(
    session: &ConnectionSession,
    channel: &mut FramedChannel<S>,
    text: &str,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let sealed = session.cipher().seal(text.as_bytes())?;
    channel.write_frame(&sealed).await?;
    Ok(())
}

async fn sign_up(state: &ServerState, request: SignupRequest) -> Result<&'static str> {
    let store = state.user_store.clone();
    let username = request.username.clone();
    let inserted = tokio::task::spawn_blocking(move || {
        store.insert_user(&NewUser {
            username: &request.username,
            password: &request.password,
            email: &request.email,
            favorite_animal: &request.favorite_animal,
        })
    })
    .await?;

    Ok(match inserted {
        Ok(true) => {
            info!("Signed up user {}", username);
            SIGNUP_SUCCESSFUL
        }
        Ok(false) => {
            info!("Signup rejected, username {} already exists", username);
            SIGNUP_USERNAME_TAKEN
        }
        Err(err) => {
            error!("Signup of {} failed: {:#}", username, err);
            SIGNUP_STORAGE_ERROR
        }
    })
}

async fn sign_in(state: &ServerState, request: SigninRequest) -> Result<&'static str> {
    let store = state.user_store.clone();
    let username = request.username.clone();
    let valid = tokio::task::spawn_blocking(move || {
        store.validate_user(&request.username, &request.password)
    })
    .await?;

    Ok(match valid {
        Ok(true) => {
            info!("User {} signed in", username);
            SIGNIN_SUCCESSFUL
        }
        Ok(false) => {
            info!("Invalid credentials for {}", username);
            SIGNIN_INVALID_CREDENTIALS
        }
        Err(err) => {
            error!("Signin of {} failed: {:#}", username, err);
            SIGNIN_STORAGE_ERROR
        }
    })
}

/// Runs the chord pipeline on the selected file and returns the reply text.
///
/// The reply is the JSON timeline, `[]` when there is nothing to analyze or the file
/// cannot be loaded, and [`PROCESS_AUDIO_FAILED`] when no segment could be classified.
/// A stored analysis is reused until the file or tempo changes.
async fn process_audio(state: &ServerState, session: &mut ConnectionSession) -> Result<String> {
    if session.audio_processed() {
        if let Some(timeline) = session.timeline() {
            debug!("Returning the stored analysis ({} chord changes)", timeline.len());
            return Ok(timeline.to_json()?);
        }
    }

    let Some((path, bpm)) = session.analysis_request() else {
        warn!(
            "Process audio requested without {}",
            match (session.selected_file().is_some(), session.tempo().is_some()) {
                (false, false) => "a file or a tempo",
                (false, true) => "a file",
                _ => "a tempo",
            }
        );
        return Ok(ChordTimeline::new().to_json()?);
    };

    let pipeline = state.pipeline.clone();
    let analyzed_path = path.clone();
    let result = tokio::task::spawn_blocking(move || pipeline.analyze_file(&analyzed_path, bpm))
        .await?;

    match result {
        Ok(timeline) => {
            info!(
                "Analyzed {} at {} BPM: {} chord changes",
                path.display(),
                bpm,
                timeline.len()
            );
            let reply = timeline.to_json()?;
            session.record_analysis(timeline);
            Ok(reply)
        }
        Err(err) if err.downcast_ref::<AnalysisError>().is_some() => {
            error!(
                "No chords found in {} at {} BPM: {:#}",
                path.display(),
                bpm,
                err
            );
            Ok(PROCESS_AUDIO_FAILED.to_string())
        }
        Err(err) => {
            warn!("Audio processing of {} failed: {:#}", path.display(), err);
            Ok(ChordTimeline::new().to_json()?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chords::{ChordClassifier, ChordPipeline, FeatureExtractor};
    use crate::protocol::{ProtocolError, SessionCipher, SessionKey, DEFAULT_MAX_FRAME_LEN};
    use crate::server::ServerConfig;
    use crate::user::UserStore;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tokio::io::{duplex, DuplexStream};

    #[derive(Default)]
    struct InMemoryUserStore {
        users: Mutex<HashMap<String, String>>,
    }

    impl UserStore for InMemoryUserStore {
        fn insert_user(&self, user: &NewUser<'_>) -> Result<bool> {
            let mut users = self.users.lock().unwrap();
            if users.contains_key(user.username) {
                return Ok(false);
            }
            users.insert(user.username.to_string(), user.password.to_string());
            Ok(true)
        }

        fn validate_user(&self, username: &str, password: &str) -> Result<bool> {
            let users = self.users.lock().unwrap();
            Ok(users.get(username).map(|p| p == password).unwrap_or(false))
        }
    }

    struct ConstantExtractor;

    impl FeatureExtractor for ConstantExtractor {
        fn feature_len(&self) -> usize {
            1
        }

        fn sample_rate(&self) -> u32 {
            1000
        }

        fn extract(&self, _samples: &[f32], _sample_rate: u32) -> Result<Vec<f32>> {
            Ok(vec![0.0])
        }
    }

    struct BrokenExtractor;

    impl FeatureExtractor for BrokenExtractor {
        fn feature_len(&self) -> usize {
            1
        }

        fn sample_rate(&self) -> u32 {
            1000
        }

        fn extract(&self, _samples: &[f32], _sample_rate: u32) -> Result<Vec<f32>> {
            anyhow::bail!("extractor unavailable")
        }
    }

    struct AlwaysC;

    impl ChordClassifier for AlwaysC {
        fn feature_len(&self) -> usize {
            1
        }

        fn predict(&self, _features: &[f32]) -> Result<String> {
            Ok("C".to_string())
        }
    }

    struct Harness {
        state: ServerState,
        session: ConnectionSession,
        server: FramedChannel<DuplexStream>,
        client: FramedChannel<DuplexStream>,
        client_cipher: SessionCipher,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_pipeline(
                ChordPipeline::new(Arc::new(ConstantExtractor), Arc::new(AlwaysC)).unwrap(),
            )
        }

        fn with_pipeline(pipeline: ChordPipeline) -> Self {
            let state = ServerState::new(
                ServerConfig::default(),
                Arc::new(InMemoryUserStore::default()),
                Arc::new(pipeline),
            );
            let key = SessionKey::generate();
            let (server_io, client_io) = duplex(64 * 1024);
            Harness {
                state,
                session: ConnectionSession::new(SessionCipher::new(key.clone())),
                server: FramedChannel::new(server_io, DEFAULT_MAX_FRAME_LEN),
                client: FramedChannel::new(client_io, DEFAULT_MAX_FRAME_LEN),
                client_cipher: SessionCipher::new(key),
            }
        }

        async fn send(&mut self, message_type: u32, text: &str) -> Result<Flow> {
            let message = RawMessage {
                message_type,
                payload: self.client_cipher.seal(text.as_bytes()).unwrap(),
            };
            dispatch(&self.state, &mut self.session, &mut self.server, message).await
        }

        async fn response(&mut self) -> String {
            let frame = self.client.read_frame().await.unwrap();
            self.client_cipher.open_text(&frame).unwrap()
        }
    }

    #[tokio::test]
    async fn signup_then_signin() {
        let mut h = Harness::new();

        h.send(1, "signup:alice:pw1:a@x.com:cat").await.unwrap();
        assert_eq!(h.response().await, SIGNUP_SUCCESSFUL);

        h.send(1, "signup:alice:pw2:a@x.com:dog").await.unwrap();
        assert_eq!(h.response().await, SIGNUP_USERNAME_TAKEN);

        h.send(2, "signin:alice:pw1").await.unwrap();
        assert_eq!(h.response().await, SIGNIN_SUCCESSFUL);

        h.send(2, "signin:alice:wrong").await.unwrap();
        assert_eq!(h.response().await, SIGNIN_INVALID_CREDENTIALS);
    }

    #[tokio::test]
    async fn malformed_auth_messages_get_failure_responses() {
        let mut h = Harness::new();

        h.send(1, "signup:alice:pw1").await.unwrap();
        assert_eq!(h.response().await, SIGNUP_INCOMPLETE);

        h.send(2, "signin:alice").await.unwrap();
        assert_eq!(h.response().await, SIGNIN_INCOMPLETE);
    }

    #[tokio::test]
    async fn tempo_and_file_update_the_session() {
        let mut h = Harness::new();

        assert_eq!(h.send(3, "BPM set to: 120").await.unwrap(), Flow::Continue);
        assert_eq!(h.send(4, "Open file: /tmp/a.wav").await.unwrap(), Flow::Continue);
        assert_eq!(h.session.tempo(), Some(120));
        assert_eq!(
            h.session.selected_file(),
            Some(std::path::Path::new("/tmp/a.wav"))
        );

        h.send(3, "BPM set to: lots").await.unwrap();
        assert_eq!(h.session.tempo(), Some(120));
    }

    #[tokio::test]
    async fn process_audio_without_selection_returns_empty_timeline() {
        let mut h = Harness::new();
        h.send(5, "process_audio").await.unwrap();
        assert_eq!(h.response().await, "[]");
        assert!(!h.session.audio_processed());
    }

    #[tokio::test]
    async fn process_audio_with_unreadable_file_returns_empty_timeline() {
        let mut h = Harness::new();
        h.send(3, "BPM set to: 120").await.unwrap();
        h.send(4, "Open file: /definitely/not/here.wav").await.unwrap();
        h.send(5, "process_audio").await.unwrap();
        assert_eq!(h.response().await, "[]");
    }

    /// Five seconds of silence at 1 kHz.
    fn write_silent_wav(dir: &tempfile::TempDir, name: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 1000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..5000 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    #[tokio::test]
    async fn process_audio_returns_the_timeline() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_silent_wav(&dir, "song.wav");

        let mut h = Harness::new();
        h.send(3, "BPM set to: 120").await.unwrap();
        h.send(4, &format!("Open file: {}", path.display())).await.unwrap();
        h.send(5, "process_audio").await.unwrap();
        assert_eq!(h.response().await, r#"[["C",0.0]]"#);
        assert!(h.session.audio_processed());
    }

    #[tokio::test]
    async fn stored_analysis_is_reused_until_the_file_changes() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_silent_wav(&dir, "song.wav");

        let mut h = Harness::new();
        h.send(3, "BPM set to: 120").await.unwrap();
        h.send(4, &format!("Open file: {}", path.display())).await.unwrap();
        h.send(5, "process_audio").await.unwrap();
        assert_eq!(h.response().await, r#"[["C",0.0]]"#);

        std::fs::remove_file(&path).unwrap();
        h.send(5, "process_audio").await.unwrap();
        assert_eq!(h.response().await, r#"[["C",0.0]]"#);

        h.send(4, &format!("Open file: {}", path.display())).await.unwrap();
        assert!(!h.session.audio_processed());
        h.send(5, "process_audio").await.unwrap();
        assert_eq!(h.response().await, "[]");
    }

    #[tokio::test]
    async fn all_segments_failing_gets_the_failure_reply() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_silent_wav(&dir, "song.wav");
        let pipeline = ChordPipeline::new(Arc::new(BrokenExtractor), Arc::new(AlwaysC)).unwrap();

        let mut h = Harness::with_pipeline(pipeline);
        h.send(3, "BPM set to: 120").await.unwrap();
        h.send(4, &format!("Open file: {}", path.display())).await.unwrap();
        assert_eq!(h.send(5, "process_audio").await.unwrap(), Flow::Continue);
        assert_eq!(h.response().await, PROCESS_AUDIO_FAILED);
        assert!(!h.session.audio_processed());
    }

    #[tokio::test]
    async fn track_shorter_than_a_segment_is_an_empty_timeline() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_silent_wav(&dir, "short.wav");
        let pipeline = ChordPipeline::new(Arc::new(BrokenExtractor), Arc::new(AlwaysC)).unwrap();

        // At 40 BPM one segment lasts six seconds, longer than the file.
        let mut h = Harness::with_pipeline(pipeline);
        h.send(3, "BPM set to: 40").await.unwrap();
        h.send(4, &format!("Open file: {}", path.display())).await.unwrap();
        h.send(5, "process_audio").await.unwrap();
        assert_eq!(h.response().await, "[]");
    }

    #[tokio::test]
    async fn unknown_type_is_ignored() {
        let mut h = Harness::new();
        assert_eq!(h.send(42, "whatever").await.unwrap(), Flow::Continue);

        h.send(2, "signin:nobody:pw").await.unwrap();
        assert_eq!(h.response().await, SIGNIN_INVALID_CREDENTIALS);
    }

    #[tokio::test]
    async fn telemetry_has_no_response_and_terminate_closes() {
        let mut h = Harness::new();
        assert_eq!(h.send(0, "Start_audio").await.unwrap(), Flow::Continue);
        assert_eq!(h.send(6, "terminate").await.unwrap(), Flow::Close);
    }

    #[tokio::test]
    async fn undecryptable_payload_is_fatal() {
        let mut h = Harness::new();
        let message = RawMessage {
            message_type: 2,
            payload: vec![1, 2, 3],
        };
        let err = dispatch(&h.state, &mut h.session, &mut h.server, message)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProtocolError>(),
            Some(ProtocolError::Crypto(_))
        ));
    }
}
