use thiserror::Error;

/// Errors raised while registering or resolving runtime clients.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A client without an id was handed to `register`.
    #[error("invalid client supplied: client id must not be empty")]
    InvalidClient,

    /// A second client tried to claim an id that is already taken.
    #[error("a {kind} client with ID '{id}' is already registered")]
    DuplicateClient { kind: &'static str, id: String },

    /// No preference is configured and the default policy found nothing.
    #[error("no {kind} client is configured and the default client is not registered")]
    NoClientConfigured { kind: &'static str },

    /// The preferred client never showed up before the deadline.
    #[error("no {kind} client with ID '{id}' is registered")]
    ClientNotRegistered { kind: &'static str, id: String },

    /// The resolved client failed its one-time setup.
    #[error("failed to configure {kind} client '{id}'")]
    Configure {
        kind: &'static str,
        id: String,
        #[source]
        source: anyhow::Error,
    },
}

impl RegistryError {
    /// Returns `true` for errors caused by a misbehaving caller rather than by
    /// configuration. These should never be retried or shown as settings
    /// problems.
    pub fn is_programmer_error(&self) -> bool {
        matches!(self, Self::InvalidClient | Self::DuplicateClient { .. })
    }
}
