pub mod coerce;
pub mod config;
pub mod console;
pub mod error;
pub mod protocol;
pub mod reg_control;
pub mod registration;
pub mod run_control;
pub mod session;
pub mod transport;

pub use config::{ConfigValue, SessionConfig};
pub use console::Console;
pub use error::{SessionError, SessionResult};
pub use protocol::{InboundMessage, OutboundMessage, RegStep, UploadKind};
pub use registration::{RegistrationConfig, RegistrationFields, RegistrationInfo};
pub use session::{Change, ConnectionState, LogBuffer, SessionState};
pub use transport::{Transport, TransportEvent, WebSocketTransport};
