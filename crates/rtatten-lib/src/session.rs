use crate::config::{load_config_text, ConfigValue, SessionConfig};
use crate::error::{SessionError, SessionResult};
use crate::protocol::{InboundMessage, OutboundMessage};
use crate::registration::{
    refresh_registration, RegistrationConfig, RegistrationFields, RegistrationInfo,
};
use crate::transport::TransportEvent;
use chrono::{Local, NaiveDate};
use log::{debug, info, warn};

const DEFAULT_CONFIG_NAME: &str = "Default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Append-only run or registration log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogBuffer {
    lines: Vec<String>,
}

impl LogBuffer {
    pub fn push(&mut self, line: &str) {
        self.lines.push(line.trim().to_string());
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn last(&self) -> Option<&str> {
        self.lines.last().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Part of the session a view needs to redraw after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Connection(ConnectionState),
    Config,
    Registration,
    RunLog,
    RegLog,
    RunStatus,
    RegInfo(String),
    Error,
}

/// Result of feeding one transport event into the session.
#[derive(Debug, Default, PartialEq)]
pub struct Transition {
    pub changes: Vec<Change>,
    pub outbound: Option<OutboundMessage>,
}

/// Client-side session model shared by every view.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub(crate) config: SessionConfig,
    config_name: String,
    settings_error: String,
    files_remote: bool,
    pub(crate) reg_fields: RegistrationFields,
    pub(crate) reg_config: RegistrationConfig,
    reg_info: RegistrationInfo,
    pub(crate) run_status: String,
    pub(crate) error: String,
    connection: ConnectionState,
    pub(crate) run_log: LogBuffer,
    pub(crate) reg_log: LogBuffer,
    pinned_date: Option<NaiveDate>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            config: SessionConfig::default(),
            config_name: DEFAULT_CONFIG_NAME.into(),
            settings_error: String::new(),
            files_remote: true,
            reg_fields: RegistrationFields::default(),
            reg_config: RegistrationConfig::default(),
            reg_info: RegistrationInfo::default(),
            run_status: String::new(),
            error: String::new(),
            connection: ConnectionState::Disconnected,
            run_log: LogBuffer::default(),
            reg_log: LogBuffer::default(),
            pinned_date: None,
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the date used when the session date is `now`.
    pub fn pin_date(&mut self, date: NaiveDate) {
        self.pinned_date = Some(date);
    }

    fn today(&self) -> NaiveDate {
        self.pinned_date
            .unwrap_or_else(|| Local::now().date_naive())
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn config_name(&self) -> &str {
        &self.config_name
    }

    pub fn settings_error(&self) -> Option<&str> {
        non_empty(&self.settings_error)
    }

    pub fn files_remote(&self) -> bool {
        self.files_remote
    }

    pub fn registration_fields(&self) -> &RegistrationFields {
        &self.reg_fields
    }

    pub fn registration_config(&self) -> &RegistrationConfig {
        &self.reg_config
    }

    pub fn registration_info(&self) -> &RegistrationInfo {
        &self.reg_info
    }

    pub fn run_status(&self) -> Option<&str> {
        non_empty(&self.run_status)
    }

    pub fn error(&self) -> Option<&str> {
        non_empty(&self.error)
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn run_log(&self) -> &LogBuffer {
        &self.run_log
    }

    pub fn reg_log(&self) -> &LogBuffer {
        &self.reg_log
    }

    /// Store `err` where the operator will see it; the newest error wins.
    pub fn record_error(&mut self, err: &SessionError) {
        warn!("{err}");
        match err {
            SessionError::ConfigParse(_) => self.settings_error = err.to_string(),
            _ => self.error = err.to_string(),
        }
    }

    pub fn clear_error(&mut self) {
        self.error.clear();
    }

    pub fn clear_run_status(&mut self) {
        self.run_status.clear();
    }

    pub fn begin_connect(&mut self) {
        self.connection = ConnectionState::Connecting;
    }

    /// Rebuild the registration parameters from the current inputs.
    pub fn refresh_registration(&mut self) -> SessionResult<()> {
        let today = self.today();
        let next = refresh_registration(
            &self.config,
            &self.reg_fields,
            &self.reg_config,
            &mut self.reg_info,
            today,
        )?;
        self.reg_config = next;
        Ok(())
    }

    fn refresh_or_record(&mut self) -> Change {
        match self.refresh_registration() {
            Ok(()) => Change::Registration,
            Err(err) => {
                self.record_error(&err);
                Change::Error
            }
        }
    }

    pub fn replace_config(&mut self, config: SessionConfig) -> Vec<Change> {
        self.config.replace(config);
        vec![Change::Config, self.refresh_or_record()]
    }

    /// Set `key` in whichever section holds it.
    pub fn set_config_item(&mut self, key: &str, value: ConfigValue) -> SessionResult<Vec<Change>> {
        let next = self.config.with_value(key, value)?;
        Ok(self.replace_config(next))
    }

    /// Set `key` from raw text typed into its input.
    pub fn set_config_input(&mut self, key: &str, raw: &str) -> SessionResult<Vec<Change>> {
        let current = self.config.get(key);
        self.set_config_item(key, ConfigValue::from_input(raw, &current))
    }

    pub fn set_section_item(
        &mut self,
        section: &str,
        key: &str,
        value: ConfigValue,
    ) -> Vec<Change> {
        let next = self.config.with_section_value(section, key, value);
        self.replace_config(next)
    }

    pub fn set_registration_field(
        &mut self,
        name: &str,
        value: &str,
    ) -> SessionResult<Vec<Change>> {
        self.reg_fields.set(name, value)?;
        Ok(vec![self.refresh_or_record()])
    }

    /// Replace the configuration with a settings file's contents.
    ///
    /// A parse failure only touches the settings error.
    pub fn load_config_text(&mut self, name: &str, text: &str) -> SessionResult<Vec<Change>> {
        let config = load_config_text(text)?;
        self.config_name = name.to_string();
        self.settings_error.clear();
        Ok(self.replace_config(config))
    }

    /// Feed one socket lifecycle event or frame into the session.
    pub fn apply_transport(&mut self, event: TransportEvent) -> Transition {
        match event {
            TransportEvent::Opened => {
                info!("session socket connected");
                self.connection = ConnectionState::Connected;
                Transition {
                    changes: vec![Change::Connection(self.connection)],
                    outbound: Some(OutboundMessage::GetDefaultConfig),
                }
            }
            TransportEvent::Closed => {
                info!("session socket closed");
                self.connection = ConnectionState::Disconnected;
                Transition {
                    changes: vec![Change::Connection(self.connection)],
                    outbound: None,
                }
            }
            TransportEvent::Error(message) => {
                self.record_error(&SessionError::Transport(message));
                Transition {
                    changes: vec![Change::Error],
                    outbound: None,
                }
            }
            TransportEvent::Frame(text) => {
                if self.connection == ConnectionState::Disconnected {
                    debug!("dropping frame received while disconnected");
                    return Transition::default();
                }
                debug!("inbound frame: {text}");
                let changes = match InboundMessage::decode(&text) {
                    Ok(message) => self.apply_message(message),
                    Err(err) => {
                        self.record_error(&err);
                        vec![Change::Error]
                    }
                };
                Transition {
                    changes,
                    outbound: None,
                }
            }
        }
    }

    /// Apply one decoded server message.
    pub fn apply_message(&mut self, message: InboundMessage) -> Vec<Change> {
        match message {
            InboundMessage::Config { value, filesremote } => {
                if let Some(remote) = filesremote {
                    self.files_remote = remote;
                }
                self.replace_config(value)
            }
            InboundMessage::UserLog { value } => {
                self.run_log.push(&value);
                vec![Change::RunLog]
            }
            InboundMessage::RegLog { value } => {
                self.reg_log.push(&value);
                vec![Change::RegLog]
            }
            InboundMessage::RunStatus { status } => {
                self.run_status = status.map(|s| s.into_text()).unwrap_or_default();
                vec![Change::RunStatus]
            }
            InboundMessage::RegStatus { kind, status } => {
                match status.map(|s| s.into_text()).filter(|text| !text.is_empty()) {
                    Some(text) => self.reg_info.set(&kind, text),
                    None => {
                        self.reg_info.remove(&kind);
                    }
                }
                vec![Change::RegInfo(kind)]
            }
            InboundMessage::UploadProgress { kind, progress } => {
                self.reg_info.set(&kind, progress.into_text());
                vec![Change::RegInfo(kind)]
            }
            InboundMessage::Error { error } => {
                warn!("server error: {error}");
                self.error = error;
                vec![Change::Error]
            }
            InboundMessage::Unknown => {
                self.record_error(&SessionError::Protocol("Unknown message type".into()));
                vec![Change::Error]
            }
        }
    }
}

fn non_empty(text: &str) -> Option<&str> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
