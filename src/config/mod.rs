use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for the upload endpoint
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address (default: 127.0.0.1:3000)
    pub bind_addr: SocketAddr,

    /// Maximum file size in bytes (default: 256 MB)
    pub max_file_size: usize,

    /// Probability in [0, 1] that an attempt is failed on purpose before
    /// hashing (default: 0.0)
    pub failure_rate: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            max_file_size: 256 * 1024 * 1024, // 256 MB
            failure_rate: 0.0,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            bind_addr: env::var("BIND_ADDR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.bind_addr),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            failure_rate: env::var("FAILURE_RATE")
                .ok()
                .and_then(|v| v.parse::<f64>().ok())
                .map(|v| v.clamp(0.0, 1.0))
                .unwrap_or(default.failure_rate),
        }
    }

    /// Flaky endpoint for exercising client retries (10% failures)
    pub fn development() -> Self {
        Self {
            failure_rate: 0.1,
            ..Self::default()
        }
    }
}

/// Client-side retry and progress settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first attempt (default: 3)
    pub max_retries: u32,

    /// Delay before the first retry (default: 1000 ms)
    pub base_delay: Duration,

    /// Backoff cap (default: 10000 ms)
    pub max_delay: Duration,

    /// Pause between simulated progress steps (default: 100 ms)
    pub progress_tick: Duration,

    /// Upper bound on a single attempt's round trip (default: 30 s)
    pub request_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            progress_tick: Duration::from_millis(100),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();
        let millis = |key: &str, fallback: Duration| {
            env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(fallback)
        };

        Self {
            max_retries: env::var("MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_retries),
            base_delay: millis("RETRY_BASE_DELAY_MS", default.base_delay),
            max_delay: millis("RETRY_MAX_DELAY_MS", default.max_delay),
            progress_tick: millis("PROGRESS_TICK_MS", default.progress_tick),
            request_timeout: env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.request_timeout),
        }
    }
}
