use std::time::Duration;

/// Tunable knobs for a running engine: pool sizing and the default timeout
/// applied to a blocking emission that does not specify one explicitly.
#[non_exhaustive]
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Worker count for the decision pool (runs match-and-fire passes).
    /// Never blocks on a reply, so a fixed-size pool is safe here.
    pub decision_pool_size: usize,
    /// Initial worker count for the reaction pool. Grows for the duration of
    /// any reaction body that calls a blocking emission, via
    /// [`crate::pool::mark_idle`].
    pub reaction_pool_size: usize,
    /// Applied to a blocking emission when the caller passes `None`.
    pub default_reply_timeout: Option<Duration>,
}

impl EngineConfig {
    pub const DEFAULT: Self = EngineConfig {
        decision_pool_size: 4,
        reaction_pool_size: 4,
        default_reply_timeout: None,
    };

    pub const fn with_pool_sizes(mut self, decision: usize, reaction: usize) -> Self {
        self.decision_pool_size = decision;
        self.reaction_pool_size = reaction;
        self
    }

    pub const fn with_default_reply_timeout(mut self, timeout: Duration) -> Self {
        self.default_reply_timeout = Some(timeout);
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Maps `0..=3` onto `ERROR..=TRACE` and installs a `tracing-subscriber`
/// formatter at that level as the global default. A second call is a no-op:
/// only the first subscriber installed in a process wins.
pub fn set_log_level(level: u8) {
    let filter = match level {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::WARN,
        2 => tracing::Level::INFO,
        _ => tracing::Level::TRACE,
    };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let cfg = EngineConfig::DEFAULT.with_pool_sizes(8, 2);
        assert_eq!(cfg.decision_pool_size, 8);
        assert_eq!(cfg.reaction_pool_size, 2);
    }
}
