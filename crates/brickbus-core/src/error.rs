use thiserror::Error;

/// Errors for the whole binding.
///
/// Every variant is `Clone`: events carry their error along when they are
/// deep-copied for concurrently notified subscribers, so io errors are
/// stringified on entry via `From<std::io::Error>`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Registry errors, returned synchronously from attach/release/subscribe
    #[error("Connector with this name already attached: {name}")]
    DuplicateConnectorName { name: String },

    #[error("No connector attached under this name: {name}")]
    UnknownConnectorName { name: String },

    #[error("Subscriber with this id already registered under the same subscription: {id}")]
    SubscriberExists { id: String },

    #[error("No subscriber to release: {id}")]
    NoSubscriberToRelease { id: String },

    // Wire errors
    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    #[error("Device reported error code {code}: {}", device_error_message(*code))]
    Device { code: u8 },

    // Transport errors, routed through events to the default subscriber
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Connector is closed")]
    ConnectorClosed,

    // Subscriber-local errors, reported only to the owning handler
    #[error("Packet decode failed: {0}")]
    Decode(String),

    #[error("Event does not match the subscription")]
    SubscriptionMismatch,

    #[error("Timed out waiting for a result")]
    Timeout,

    #[error("Result channel closed before a value arrived")]
    ChannelClosed,
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

fn device_error_message(code: u8) -> &'static str {
    match code {
        1 => "invalid parameter",
        2 => "function not supported",
        _ => "unknown error",
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_becomes_transport() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: Error = io.into();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[test]
    fn test_device_error_display() {
        assert_eq!(
            Error::Device { code: 1 }.to_string(),
            "Device reported error code 1: invalid parameter"
        );
        assert_eq!(
            Error::Device { code: 2 }.to_string(),
            "Device reported error code 2: function not supported"
        );
    }
}
