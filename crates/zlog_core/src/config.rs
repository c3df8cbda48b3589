//! Log configuration.

use std::time::Duration;

/// Stripe width used when a log is created without an explicit one.
pub const DEFAULT_STRIPE_WIDTH: u32 = 5;

/// How appends react to losing a position to another writer.
///
/// A lost race is the only failure the core retries on its own. Every
/// retry allocates a fresh position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of positions tried per append; `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Retries until a position is won, without pausing.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            max_attempts: None,
            backoff: Duration::ZERO,
        }
    }

    /// Gives up after `max_attempts` positions.
    #[must_use]
    pub const fn bounded(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            backoff: Duration::ZERO,
        }
    }

    /// Sets the pause between attempts.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Returns true if another attempt may follow `attempts` failed ones.
    #[must_use]
    pub fn allows_retry(&self, attempts: u32) -> bool {
        !matches!(self.max_attempts, Some(max) if attempts >= max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Configuration for opening a log.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the log if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to error if the log already exists.
    pub error_if_exists: bool,

    /// Stripe width used if the log is created.
    pub stripe_width: u32,

    /// Retry behaviour of appends that lose their position.
    pub retry_policy: RetryPolicy,

    /// Whether stream sync fills holes below the tail.
    ///
    /// When disabled, a sync stops at the first unwritten position and
    /// resumes there next time.
    pub fill_gaps_on_sync: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: false,
            error_if_exists: false,
            stripe_width: DEFAULT_STRIPE_WIDTH,
            retry_policy: RetryPolicy::default(),
            fill_gaps_on_sync: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the log if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to error if the log exists.
    #[must_use]
    pub const fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    /// Sets the stripe width used on creation.
    #[must_use]
    pub const fn stripe_width(mut self, width: u32) -> Self {
        self.stripe_width = width;
        self
    }

    /// Sets the append retry policy.
    #[must_use]
    pub const fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Sets whether stream sync fills holes.
    #[must_use]
    pub const fn fill_gaps_on_sync(mut self, value: bool) -> Self {
        self.fill_gaps_on_sync = value;
        self
    }
}
