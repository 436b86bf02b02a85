//! Operator console: the session model wired to a transport.

use crate::config::ConfigValue;
use crate::error::{SessionError, SessionResult};
use crate::protocol::{OutboundMessage, RegStep, UploadKind};
use crate::reg_control;
use crate::run_control;
use crate::session::{Change, SessionState};
use crate::transport::{Transport, TransportEvent};
use crossbeam_channel::Receiver;
use log::{debug, info};

/// Owns the session state and the link to the experiment server.
///
/// Every operation that fails records its error on the session so views can
/// show it, and also hands it back to the caller.
pub struct Console<T: Transport> {
    state: SessionState,
    transport: T,
}

impl<T: Transport> Console<T> {
    pub fn new(state: SessionState, transport: T) -> Self {
        Self { state, transport }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Apply one transport event, sending any reply it calls for.
    pub fn handle_event(&mut self, event: TransportEvent) -> Vec<Change> {
        let transition = self.state.apply_transport(event);
        let mut changes = transition.changes;
        if let Some(message) = transition.outbound {
            if self.send(&message).is_err() {
                changes.push(Change::Error);
            }
        }
        changes
    }

    /// Drain every event already queued on `events` without blocking.
    pub fn pump(&mut self, events: &Receiver<TransportEvent>) -> Vec<Change> {
        let mut changes = Vec::new();
        while let Ok(event) = events.try_recv() {
            changes.extend(self.handle_event(event));
        }
        changes
    }

    pub fn request_default_config(&mut self) -> SessionResult<()> {
        self.send(&OutboundMessage::GetDefaultConfig)
    }

    pub fn start_run(&mut self) -> SessionResult<()> {
        let message = self.guard(run_control::start)?;
        info!("starting run");
        self.send(&message)
    }

    pub fn stop_run(&mut self) -> SessionResult<()> {
        self.send(&run_control::stop())
    }

    pub fn run_registration(&mut self, step: RegStep) -> SessionResult<()> {
        let message = self.guard(|state| reg_control::run_step(state, step))?;
        info!("running registration step {step}");
        self.send(&message)
    }

    pub fn stop_registration(&mut self) -> SessionResult<()> {
        self.send(&reg_control::stop_step())
    }

    pub fn upload_images(&mut self, kind: UploadKind) -> SessionResult<()> {
        let message = reg_control::upload_images(&self.state, kind);
        self.send(&message)
    }

    pub fn set_config_item(&mut self, key: &str, value: ConfigValue) -> SessionResult<Vec<Change>> {
        self.guard(|state| state.set_config_item(key, value))
    }

    pub fn set_config_input(&mut self, key: &str, raw: &str) -> SessionResult<Vec<Change>> {
        self.guard(|state| state.set_config_input(key, raw))
    }

    pub fn set_section_item(
        &mut self,
        section: &str,
        key: &str,
        value: ConfigValue,
    ) -> Vec<Change> {
        self.state.set_section_item(section, key, value)
    }

    pub fn set_registration_field(
        &mut self,
        name: &str,
        value: &str,
    ) -> SessionResult<Vec<Change>> {
        self.guard(|state| state.set_registration_field(name, value))
    }

    /// Replace the configuration with the contents of a settings file.
    pub fn load_config_text(&mut self, name: &str, text: &str) -> SessionResult<Vec<Change>> {
        self.guard(|state| state.load_config_text(name, text))
    }

    pub fn clear_run_status(&mut self) -> Vec<Change> {
        self.state.clear_run_status();
        vec![Change::RunStatus]
    }

    fn send(&mut self, message: &OutboundMessage) -> SessionResult<()> {
        debug!("sending {}", message.cmd());
        self.transport.send(message).map_err(|err| {
            self.state.record_error(&err);
            err
        })
    }

    fn guard<R>(
        &mut self,
        op: impl FnOnce(&mut SessionState) -> SessionResult<R>,
    ) -> SessionResult<R> {
        op(&mut self.state).map_err(|err: SessionError| {
            self.state.record_error(&err);
            err
        })
    }
}
