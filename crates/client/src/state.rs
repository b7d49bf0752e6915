use std::fmt;

/// Lifecycle of the client's single logical connection.
///
/// ```text
/// disconnected -> connecting -> connected -> (disconnected | error) -> connecting ...
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// The last attempt failed. A retry may be pending unless the failure
    /// was an authorization failure or retries are exhausted.
    Error,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host visibility, as reported by whatever embeds the client
/// (page visibility in a browser shell, resume notifications elsewhere).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}
