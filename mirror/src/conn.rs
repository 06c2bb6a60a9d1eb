use std::time::Duration;

/// Options used to open a read or write side connection.
#[derive(Debug, Clone)]
pub struct ConnOpts {
    /// Connection address. The driver registries pick the first driver that
    /// supports it.
    pub dsn: String,
    /// Timeout applied to individual database operations. Zero disables it.
    pub timeout: Duration,
    /// Maximum amount of time a pooled connection may be reused. Zero keeps
    /// connections indefinitely.
    pub max_conn_lifetime: Duration,
    /// Maximum number of open connections.
    pub max_conns: usize,
    /// Maximum number of idle connections kept in the pool.
    pub max_idle_conns: usize,
}

impl ConnOpts {
    /// Creates options for the given DSN with conservative pool defaults.
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            timeout: Duration::ZERO,
            max_conn_lifetime: Duration::ZERO,
            max_conns: 5,
            max_idle_conns: 0,
        }
    }
}
