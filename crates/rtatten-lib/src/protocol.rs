use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::registration::RegistrationConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Registration pipeline step run on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegStep {
    Skullstrip,
    Registration,
    Makemask,
}

impl RegStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegStep::Skullstrip => "skullstrip",
            RegStep::Registration => "registration",
            RegStep::Makemask => "makemask",
        }
    }
}

impl fmt::Display for RegStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegStep {
    type Err = SessionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "skullstrip" => Ok(RegStep::Skullstrip),
            "registration" => Ok(RegStep::Registration),
            "makemask" => Ok(RegStep::Makemask),
            other => Err(SessionError::validation(format!(
                "unknown registration step '{other}'"
            ))),
        }
    }
}

/// Image series requested from the scanner host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    Highres,
    Functional,
}

impl UploadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadKind::Highres => "highres",
            UploadKind::Functional => "functional",
        }
    }
}

impl fmt::Display for UploadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadKind {
    type Err = SessionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "highres" => Ok(UploadKind::Highres),
            "functional" => Ok(UploadKind::Functional),
            other => Err(SessionError::validation(format!(
                "unknown upload type '{other}'"
            ))),
        }
    }
}

/// Commands sent from the console to the control server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum OutboundMessage {
    GetDefaultConfig,
    Run {
        config: SessionConfig,
    },
    Stop,
    RunReg {
        #[serde(rename = "regType")]
        reg_type: RegStep,
        config: SessionConfig,
        #[serde(rename = "regConfig")]
        reg_config: RegistrationConfig,
    },
    StopReg,
    UploadImages {
        #[serde(rename = "type")]
        kind: UploadKind,
        #[serde(rename = "scanFolder")]
        scan_folder: String,
        #[serde(rename = "scanNum")]
        scan_num: String,
        #[serde(rename = "numDicoms")]
        num_dicoms: String,
    },
}

impl OutboundMessage {
    pub fn cmd(&self) -> &'static str {
        match self {
            OutboundMessage::GetDefaultConfig => "getDefaultConfig",
            OutboundMessage::Run { .. } => "run",
            OutboundMessage::Stop => "stop",
            OutboundMessage::RunReg { .. } => "runReg",
            OutboundMessage::StopReg => "stopReg",
            OutboundMessage::UploadImages { .. } => "uploadImages",
        }
    }

    /// JSON text frame for the socket.
    pub fn encode(&self) -> SessionResult<String> {
        serde_json::to_string(self).map_err(|err| {
            SessionError::Protocol(format!("failed to encode {}: {err}", self.cmd()))
        })
    }
}

/// Status payload: either plain text or a list of process names.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StatusText {
    Text(String),
    Parts(Vec<String>),
}

impl StatusText {
    pub fn into_text(self) -> String {
        match self {
            StatusText::Text(text) => text,
            StatusText::Parts(parts) => parts.join(" "),
        }
    }
}

/// Events pushed by the control server.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum InboundMessage {
    Config {
        value: SessionConfig,
        #[serde(default)]
        filesremote: Option<bool>,
    },
    UserLog {
        value: String,
    },
    RegLog {
        value: String,
    },
    RunStatus {
        #[serde(default)]
        status: Option<StatusText>,
    },
    RegStatus {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        status: Option<StatusText>,
    },
    UploadProgress {
        #[serde(rename = "type")]
        kind: String,
        progress: StatusText,
    },
    Error {
        error: String,
    },
    /// Placeholder for unrecognized commands; `decode` reports these as errors.
    #[serde(other)]
    Unknown,
}

impl InboundMessage {
    /// Decode one JSON text frame.
    pub fn decode(frame: &str) -> SessionResult<Self> {
        let raw: Value = serde_json::from_str(frame)
            .map_err(|err| SessionError::Protocol(format!("malformed message: {err}")))?;
        let cmd = raw
            .get("cmd")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| SessionError::Protocol("message has no cmd field".into()))?;
        match serde_json::from_value::<InboundMessage>(raw) {
            Ok(InboundMessage::Unknown) => Err(SessionError::Protocol(format!(
                "Unknown message type: {cmd}"
            ))),
            Ok(message) => Ok(message),
            Err(err) => Err(SessionError::Protocol(format!(
                "malformed {cmd} message: {err}"
            ))),
        }
    }
}
