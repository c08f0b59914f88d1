use thiserror::Error;

/// Failure modes of a single driver write. None of these reach command-sink
/// callers: the device writer logs them and moves on, since camera
/// reachability is outside our control and most of these transports have no
/// fast failure path for a single command.
#[derive(Error, Debug)]
pub enum DriverError {
    /// The endpoint could not be resolved or connected. Skipped; the next
    /// command attempts a fresh connection.
    #[error("endpoint unavailable: {0}")]
    EndpointUnavailable(String),

    /// The protocol or device lacks this control. Skipped, never retried.
    #[error("unsupported capability: {0}")]
    UnsupportedCapability(&'static str),

    /// The write itself failed (reset connection, malformed response, SOAP
    /// fault). The connection is torn down so the next command reconnects.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DriverError>;
