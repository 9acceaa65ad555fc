//! Session configuration.

/// Limits applied to every [`ProtocolSession`](crate::ProtocolSession).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Largest reassembled document the receive loop accepts, in bytes.
    ///
    /// A message that grows past this is dropped whole: the rest of its
    /// frames are skipped up to the end-of-message marker and the loop
    /// carries on with the next message.
    ///
    /// Default: 1 MiB.
    pub max_message_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_message_size: 1024 * 1024,
        }
    }
}
