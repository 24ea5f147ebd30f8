//! Transport implementations.

#[cfg(feature = "mock")]
pub mod mock;

pub mod serve;
pub mod subcommand;

#[cfg(feature = "mock")]
pub use mock::MockTransport;
pub use serve::ServeTransport;
pub use subcommand::SubcommandTransport;

use crate::config::{Config, TransportKind};
use crate::transport::Transport;

/// Creates the transport selected by `config.transport`.
///
/// Nothing is spawned yet: the server transport starts its child on unlock.
pub fn new_transport(config: &Config) -> Box<dyn Transport> {
    match config.transport {
        TransportKind::Subcommand => Box::new(SubcommandTransport::new(config)),
        TransportKind::Serve { .. } => Box::new(ServeTransport::new(config)),
    }
}
