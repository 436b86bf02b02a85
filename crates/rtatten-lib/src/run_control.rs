//! Start and stop of the classification run.

use crate::config::{ConfigValue, SEQUENCE_KEYS};
use crate::error::SessionResult;
use crate::protocol::OutboundMessage;
use crate::session::SessionState;

/// Prepare a `run` command from the current configuration.
///
/// The run log, error and run status are reset first. Malformed `Runs` or
/// `ScanNums` abort before anything is sent; otherwise the normalized lists
/// and coerced values are written back into the session.
pub fn start(state: &mut SessionState) -> SessionResult<OutboundMessage> {
    state.run_log.clear();
    state.clear_error();
    state.clear_run_status();

    let mut config = state.config.clone();
    for key in SEQUENCE_KEYS {
        let numbers = config.normalize_sequence(key)?;
        config = config.with_value(key, ConfigValue::List(numbers))?;
    }
    let config = config.normalize();
    state.replace_config(config.clone());
    Ok(OutboundMessage::Run { config })
}

pub fn stop() -> OutboundMessage {
    OutboundMessage::Stop
}
