// Project-wide constants
//
// Centralised here so port numbers and other magic values have one
// source of truth. Import via `use crate::config::constants::*;`.

/// Default bind address for the public API server.
pub const DEFAULT_API_ADDR: &str = "127.0.0.1:8080";

/// Default bind address for the analysis gateway.
pub const DEFAULT_GATEWAY_ADDR: &str = "127.0.0.1:8090";

/// Default URL the API server uses to reach the gateway.
pub const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:8090";

/// Default Claude model for provider requests.
pub const DEFAULT_CHAT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Default maximum tokens for provider requests.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Default sampling temperature for provider requests.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Maximum concurrent provider requests in flight.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 5;

/// HTTP timeout for provider and gateway calls, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Largest accepted upload, in bytes.
pub const DEFAULT_MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Total budget used when translating a priority score into an absolute
/// allocation amount.
pub const DEFAULT_TOTAL_BUDGET: f64 = 50_000_000.0;

/// TTL for processed-content cache entries, in seconds.
pub const CONTENT_CACHE_TTL_SECS: u64 = 3600;

/// TTL for fetched-URL cache entries, in seconds.
pub const URL_CACHE_TTL_SECS: u64 = 1800;

/// TTL for gateway pending-request entries, in seconds.
pub const PENDING_TTL_SECS: u64 = 3600;

/// Sustained request rate per client IP.
pub const DEFAULT_RATE_LIMIT_RPS: f64 = 10.0;

/// Burst capacity per client IP.
pub const DEFAULT_RATE_LIMIT_BURST: f64 = 40.0;
