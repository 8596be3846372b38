//! Consolidated constants for the Sigil authority
//!
//! Centralizes the limits and default values shared by the subsystems.
//! Runtime-tunable values surface again as [`crate::config::AuthorityConfig`]
//! defaults; the constants here are the single source for both.

// =============================================================================
// Challenges & replay protection
// =============================================================================

/// Challenge nonce length in bytes.
pub const NONCE_BYTES: usize = 32;

/// Challenge lifetime in nanoseconds (90 seconds).
pub const CHALLENGE_TTL_NS: u64 = 90_000_000_000;

/// Replay-window for consumed nonces in nanoseconds (1 hour).
///
/// Must be at least the challenge TTL; kept generous to tolerate clock skew.
pub const REPLAY_WINDOW_NS: u64 = 3_600_000_000_000;

// =============================================================================
// Rate limiting & lockout
// =============================================================================

/// Maximum requests per identity within one rate window.
pub const RATE_LIMIT_MAX: u32 = 30;

/// Rate-limit window in nanoseconds (30 seconds).
pub const RATE_WINDOW_NS: u64 = 30_000_000_000;

/// Failed proof attempts before an identity is locked out.
pub const MAX_FAILED_ATTEMPTS: u32 = 5;

/// Lockout duration in nanoseconds (15 minutes).
pub const LOCKOUT_DURATION_NS: u64 = 900_000_000_000;

/// Risk-score increment applied per failed proof attempt.
pub const FAILED_ATTEMPT_RISK_STEP: f64 = 0.1;

// =============================================================================
// Identities & devices
// =============================================================================

/// Maximum device keys one identity may carry.
pub const MAX_DEVICES_PER_IDENTITY: usize = 10;

/// Role that gates administrative operations at the facade.
pub const ADMIN_ROLE: &str = "admin.security";

/// Metadata key under which a linked wallet identity is stored.
pub const WALLET_METADATA_KEY: &str = "wallet.id";

// =============================================================================
// Sessions
// =============================================================================

/// Maximum concurrent sessions per identity; the oldest is evicted beyond this.
pub const MAX_SESSIONS_PER_IDENTITY: usize = 10;

/// Session token length in bytes (128 bits of CSPRNG entropy).
pub const SESSION_TOKEN_BYTES: usize = 16;

/// Default session lifetime in seconds (1 hour).
pub const SESSION_DEFAULT_TTL_S: u64 = 3_600;

/// Maximum session lifetime in seconds (24 hours).
pub const SESSION_MAX_TTL_S: u64 = 86_400;

/// Minimum session lifetime in seconds.
pub const SESSION_MIN_TTL_S: u64 = 1;

/// Session risk score at or above which issuance is refused (0-10 scale).
pub const HIGH_RISK_THRESHOLD: u8 = 7;

// =============================================================================
// Event fabric
// =============================================================================

/// Capacity of each priority queue.
pub const MAX_QUEUE_SIZE: usize = 10_000;

/// Delivery attempts before an event is dropped.
pub const MAX_RETRIES: u32 = 3;

/// High-priority batch size per scheduler cycle; normal and low lanes run
/// at one half and one quarter of this.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Retention window for the delivered-event history, in days.
pub const RETENTION_DAYS: u64 = 30;
