use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use join_core::{Bindings, Guard, InputPattern, OutputPattern, ReactionDescriptor};

use crate::jdef::ReactionBody;

static NEXT_SOURCE_HASH: AtomicU64 = AtomicU64::new(1);

/// A fluent builder for a [`ReactionDescriptor`], standing in for the
/// surface macro that would normally derive one from reaction syntax.
#[derive(Default)]
pub struct ReactionBuilder {
    inputs: Vec<InputPattern>,
    guard: Option<Guard>,
    outputs: Vec<OutputPattern>,
    retry: bool,
}

impl ReactionBuilder {
    pub fn new() -> Self {
        ReactionBuilder::default()
    }

    pub fn input(mut self, pattern: InputPattern) -> Self {
        self.inputs.push(pattern);
        self
    }

    pub fn guard(mut self, f: impl Fn(&Bindings) -> bool + Send + Sync + 'static) -> Self {
        self.guard = Some(Guard::new(f));
        self
    }

    /// Declares an emission the reaction's body is expected to perform, for
    /// the static analyzer's livelock/deadlock checks. Declaring this does
    /// not itself cause anything to be emitted — the body must still call
    /// the injector.
    pub fn output(mut self, pattern: OutputPattern) -> Self {
        self.outputs.push(pattern);
        self
    }

    /// Marks the reaction so a `UserReactionError` re-emits its consumed
    /// inputs instead of discarding them.
    pub fn retry(mut self) -> Self {
        self.retry = true;
        self
    }

    pub fn body(self, f: impl Fn(Bindings) + Send + Sync + 'static) -> ReactionDescriptor<ReactionBody> {
        let source_hash = NEXT_SOURCE_HASH.fetch_add(1, Ordering::Relaxed);
        ReactionDescriptor::new(
            self.inputs,
            self.guard,
            self.outputs,
            Arc::new(f) as ReactionBody,
            self.retry,
            source_hash,
        )
    }
}
