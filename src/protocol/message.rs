//! Message types and the text commands they carry.

use std::path::PathBuf;

/// Tags of the 8-byte message header. This is the whole command surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Telemetry,
    Signup,
    Signin,
    SetTempo,
    OpenFile,
    ProcessAudio,
    Terminate,
}

impl MessageType {
    pub fn code(self) -> u32 {
        match self {
            MessageType::Telemetry => 0,
            MessageType::Signup => 1,
            MessageType::Signin => 2,
            MessageType::SetTempo => 3,
            MessageType::OpenFile => 4,
            MessageType::ProcessAudio => 5,
            MessageType::Terminate => 6,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(MessageType::Telemetry),
            1 => Some(MessageType::Signup),
            2 => Some(MessageType::Signin),
            3 => Some(MessageType::SetTempo),
            4 => Some(MessageType::OpenFile),
            5 => Some(MessageType::ProcessAudio),
            6 => Some(MessageType::Terminate),
            _ => None,
        }
    }
}

pub const SIGNUP_SUCCESSFUL: &str = "Signup successful";
pub const SIGNUP_INCOMPLETE: &str = "Signup failed - Incomplete signup information";
pub const SIGNUP_USERNAME_TAKEN: &str = "Signup failed - Username already exists";
pub const SIGNIN_SUCCESSFUL: &str = "Signin successful";
pub const SIGNIN_INVALID_CREDENTIALS: &str = "Signin failed - Invalid credentials";
pub const SIGNIN_INCOMPLETE: &str = "Signin failed - Incomplete signin information";
pub const SIGNUP_STORAGE_ERROR: &str = "Signup failed - Internal error";
pub const SIGNIN_STORAGE_ERROR: &str = "Signin failed - Internal error";
/// Sent instead of a timeline when the track had whole segments and none classified.
/// Every other process-audio reply is a JSON array.
pub const PROCESS_AUDIO_FAILED: &str = "Processing failed - No segment could be analyzed";

pub const PROCESS_AUDIO_REQUEST: &str = "process_audio";
pub const TERMINATE_REQUEST: &str = "terminate";

const TEMPO_PREFIX: &str = "BPM set to";
const OPEN_FILE_PREFIX: &str = "Open file";

/// True when an authentication response string reports success.
pub fn is_success_response(response: &str) -> bool {
    response.ends_with("successful")
}

/// Client-side reading of a signup or signin response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Success,
    Failure(String),
}

impl AuthOutcome {
    pub fn from_response(response: &str) -> Self {
        if is_success_response(response) {
            AuthOutcome::Success
        } else {
            AuthOutcome::Failure(response.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub email: String,
    pub favorite_animal: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigninRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Telemetry(String),
    Signup(SignupRequest),
    Signin(SigninRequest),
    SetTempo(u32),
    OpenFile(PathBuf),
    ProcessAudio,
    Terminate,
}

/// Why a payload could not be turned into a [`Command`]. Always recoverable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    IncompleteSignup,
    IncompleteSignin,
    InvalidTempo(String),
    InvalidOpenFile(String),
}

impl Command {
    pub fn parse(message_type: MessageType, text: &str) -> Result<Command, CommandError> {
        match message_type {
            MessageType::Telemetry => Ok(Command::Telemetry(text.to_string())),
            MessageType::Signup => parse_signup(text).map(Command::Signup),
            MessageType::Signin => parse_signin(text).map(Command::Signin),
            MessageType::SetTempo => parse_tempo(text).map(Command::SetTempo),
            MessageType::OpenFile => parse_open_file(text).map(Command::OpenFile),
            MessageType::ProcessAudio => Ok(Command::ProcessAudio),
            MessageType::Terminate => Ok(Command::Terminate),
        }
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Command::Telemetry(_) => MessageType::Telemetry,
            Command::Signup(_) => MessageType::Signup,
            Command::Signin(_) => MessageType::Signin,
            Command::SetTempo(_) => MessageType::SetTempo,
            Command::OpenFile(_) => MessageType::OpenFile,
            Command::ProcessAudio => MessageType::ProcessAudio,
            Command::Terminate => MessageType::Terminate,
        }
    }

    /// Renders the command the way clients put it on the wire.
    pub fn to_payload(&self) -> String {
        match self {
            Command::Telemetry(action) => action.clone(),
            Command::Signup(r) => format!(
                "signup:{}:{}:{}:{}",
                r.username, r.password, r.email, r.favorite_animal
            ),
            Command::Signin(r) => format!("signin:{}:{}", r.username, r.password),
            Command::SetTempo(bpm) => format!("{}: {}", TEMPO_PREFIX, bpm),
            Command::OpenFile(path) => format!("{}: {}", OPEN_FILE_PREFIX, path.display()),
            Command::ProcessAudio => PROCESS_AUDIO_REQUEST.to_string(),
            Command::Terminate => TERMINATE_REQUEST.to_string(),
        }
    }
}

/// `signup:user:pass:email:animal`, the last field keeps any further colons.
fn parse_signup(text: &str) -> Result<SignupRequest, CommandError> {
    let parts: Vec<&str> = text.splitn(5, ':').collect();
    if parts.len() < 5 {
        return Err(CommandError::IncompleteSignup);
    }
    Ok(SignupRequest {
        username: parts[1].trim().to_string(),
        password: parts[2].trim().to_string(),
        email: parts[3].trim().to_string(),
        favorite_animal: parts[4].trim().to_string(),
    })
}

fn parse_signin(text: &str) -> Result<SigninRequest, CommandError> {
    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() != 3 {
        return Err(CommandError::IncompleteSignin);
    }
    Ok(SigninRequest {
        username: parts[1].trim().to_string(),
        password: parts[2].trim().to_string(),
    })
}

fn value_after_separator(text: &str) -> Option<&str> {
    text.split_once(": ").map(|(_, value)| value)
}

fn parse_tempo(text: &str) -> Result<u32, CommandError> {
    value_after_separator(text)
        .and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|bpm| *bpm > 0)
        .ok_or_else(|| CommandError::InvalidTempo(text.to_string()))
}

fn parse_open_file(text: &str) -> Result<PathBuf, CommandError> {
    match value_after_separator(text) {
        Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => Err(CommandError::InvalidOpenFile(text.to_string())),
    }
}
