use thiserror::Error;

/// Why a proposed assignment failed to satisfy a reaction's patterns. Not
/// itself user-facing; the scheduler uses it to decide whether to keep
/// searching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchFailure {
    ConstantMismatch,
    ArbitraryRejected,
    NotBlockingReplySlot,
    GuardFailed,
}

/// Fatal, activation-time configuration problems, checked before the
/// [`StaticAnalyzer`](crate::StaticAnalyzer) ever runs.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("reaction {reaction} has no input molecules")]
    EmptyInputPattern { reaction: String },
    #[error("reaction {reaction} consumes blocking molecule {molecule} without a reply binder")]
    MissingReplyBinder { reaction: String, molecule: String },
    #[error("reaction {reaction} binds a reply on non-blocking molecule {molecule}")]
    ReplyBinderOnNonBlocking { reaction: String, molecule: String },
}
