//! Error types shared by the queue managers

/// Result type that returns an [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Things that can go wrong while talking to the broker or preparing
/// message bodies
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The broker address failed to parse as an AMQP URI
    #[error("Failed to parse broker address {0}: {1}")]
    InvalidAddress(String, String),

    /// The connection to the broker could not be opened
    #[error("Unable to reach the broker")]
    Connect(#[source] lapin::Error),

    /// The channel could not be created, or dropped mid-operation
    #[error("Channel error")]
    Channel(#[source] lapin::Error),

    /// The broker refused or failed the queue declaration
    #[error("Queue declaration failed")]
    Declare(#[source] lapin::Error),

    /// The broker refused or failed a publish
    #[error("Publish failed")]
    Publish(#[source] lapin::Error),

    /// The broker returned a negative publisher confirm
    #[error("The broker did not confirm the publish")]
    Nack,

    /// The body could not be serialized to JSON. With the default
    /// serializer this is the "not JSON serializable" case
    #[error("Message body is not JSON serializable")]
    Serialize(#[source] serde_json::Error),

    /// An inbound payload was valid UTF-8 but not valid JSON
    #[error("Message body is not valid JSON")]
    Deserialize(#[source] serde_json::Error),

    /// An inbound payload was not valid UTF-8
    #[error("Message body is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),

    /// A password file could not be read
    #[error("Unable to read the password file")]
    Io(#[from] std::io::Error),

    /// `connect` was called on a manager that already holds a live
    /// connection
    #[error("Manager is already connected")]
    AlreadyConnected,

    /// The operation needs a live channel but the manager never
    /// connected, or the transport dropped
    #[error("Manager is not connected")]
    NotConnected,

    /// The manager was closed and will not accept further operations
    #[error("Manager is closed")]
    Closed,

    /// A synchronous connect did not become ready within the
    /// configured timeout
    #[error("Timed out waiting for the queue declaration")]
    DeclareTimeout,
}
