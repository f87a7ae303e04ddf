use std::time::Duration;

/// Connection timeout used when none is configured.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Largest value accepted in a `get` response, memcache's default item size limit.
pub const DEFAULT_MAX_VALUE_SIZE: usize = 1024 * 1024;

/// Settings applied to every [`ServerLink`](crate::ServerLink) opened by a client.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkConfig {
    /// Upper bound for dialing a single resolved endpoint.
    pub connect_timeout: Duration,

    /// Read and write timeout for the socket. With [`None`] an exchange blocks
    /// until the peer responds or the transport fails.
    pub io_timeout: Option<Duration>,

    /// A `VALUE` header announcing a longer payload is rejected before any of
    /// the payload is read.
    pub max_value_size: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: None,
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
        }
    }
}

impl LinkConfig {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    pub fn with_max_value_size(mut self, size: usize) -> Self {
        self.max_value_size = size;
        self
    }
}
