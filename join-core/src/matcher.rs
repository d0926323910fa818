use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::descriptor::ReactionDescriptor;
use crate::error::MatchFailure;

/// A value bound into a reaction's environment: a molecule payload, an
/// `Arbitrary` sub-binding, or a reply handle, all type-erased behind `Any`.
pub type BoundValue = Arc<dyn Any + Send + Sync>;

/// The ordered environment a reaction body runs with; layout matches the
/// reaction's input-pattern order (with an extra slot per blocking input for
/// its reply handle, immediately following the input's value slot).
pub type Bindings = Vec<BoundValue>;

static NEXT_ARBITRARY_HASH: AtomicU64 = AtomicU64::new(1);

/// One candidate molecule value proposed against an input pattern: its
/// payload, and (for blocking molecules) the reply handle carried alongside
/// it.
pub struct Candidate {
    pub value: BoundValue,
    pub reply: Option<BoundValue>,
}

enum MatcherKind {
    Wildcard,
    SimpleVar,
    Constant(Arc<dyn Fn(&dyn Any) -> bool + Send + Sync>),
    Arbitrary(Arc<dyn Fn(&dyn Any) -> Option<BoundValue> + Send + Sync>),
}

/// A single value-matcher, one of the four shapes in the join-calculus
/// pattern language. Carries a human-readable label (used to render
/// diagnostics) and a content hash the [`StaticAnalyzer`](crate::StaticAnalyzer)
/// uses to decide whether two `Constant`/`Arbitrary` matchers are comparable.
///
/// [`StaticAnalyzer`]: crate::StaticAnalyzer
pub struct Matcher {
    kind: MatcherKind,
    label: String,
    content_hash: u64,
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

impl Matcher {
    pub fn wildcard() -> Self {
        Matcher {
            kind: MatcherKind::Wildcard,
            label: "_".to_string(),
            content_hash: 0,
        }
    }

    pub fn simple_var(label: impl Into<String>) -> Self {
        Matcher {
            kind: MatcherKind::SimpleVar,
            label: label.into(),
            content_hash: 0,
        }
    }

    /// A matcher that tests structural equality against `value`, for any
    /// `T: Eq + Hash + Send + Sync + 'static`. `label` is used only for
    /// diagnostics.
    pub fn constant<T>(label: impl Into<String>, value: T) -> Self
    where
        T: Eq + std::hash::Hash + Send + Sync + 'static,
    {
        use std::hash::Hasher;
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        std::any::TypeId::of::<T>().hash(&mut hasher);
        value.hash(&mut hasher);
        let content_hash = hasher.finish();
        let value = Arc::new(value);
        let test = move |any: &dyn Any| any.downcast_ref::<T>() == Some(value.as_ref());
        Matcher {
            kind: MatcherKind::Constant(Arc::new(test)),
            label: label.into(),
            content_hash,
        }
    }

    /// A matcher driven by a predicate-plus-binder: `f` runs on the
    /// candidate value and, if it returns `Some`, the reaction binds the
    /// returned sub-value. Two `Arbitrary` matchers are never considered
    /// comparable by the analyzer (conservative default — see
    /// [`Matcher::weaker_or_equal`]).
    pub fn arbitrary<T, U>(
        label: impl Into<String>,
        f: impl Fn(&T) -> Option<U> + Send + Sync + 'static,
    ) -> Self
    where
        T: Send + Sync + 'static,
        U: Send + Sync + 'static,
    {
        let wrapped = move |any: &dyn Any| -> Option<BoundValue> {
            let typed = any.downcast_ref::<T>()?;
            f(typed).map(|u| Arc::new(u) as BoundValue)
        };
        Matcher {
            kind: MatcherKind::Arbitrary(Arc::new(wrapped)),
            label: label.into(),
            content_hash: NEXT_ARBITRARY_HASH.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_infallible(&self) -> bool {
        matches!(self.kind, MatcherKind::Wildcard | MatcherKind::SimpleVar)
    }

    fn is_specific(&self) -> bool {
        matches!(
            self.kind,
            MatcherKind::Constant(_) | MatcherKind::Arbitrary(_)
        )
    }

    /// Is `self` at least as weak (covers at least as much) as `other`?
    /// Implements the partial order `Wildcard ≥ SimpleVar ≥
    /// Constant/Arbitrary`. Two specific matchers are only comparable if
    /// their content hashes agree; anything the analyzer cannot compare
    /// is conservatively reported as *not* weaker.
    pub fn weaker_or_equal(&self, other: &Matcher) -> bool {
        match (&self.kind, &other.kind) {
            (MatcherKind::Wildcard, _) => true,
            (_, MatcherKind::Wildcard) => false,
            (MatcherKind::SimpleVar, _) => true,
            (_, MatcherKind::SimpleVar) => false,
            _ if self.is_specific() && other.is_specific() => {
                self.content_hash == other.content_hash
            }
            _ => false,
        }
    }

    /// Does this matcher reproduce the same value it was compared against
    /// at construction (used by the livelock check to decide whether a
    /// `Constant` output "covers" a `Constant` input)?
    pub fn covers_output_hash(&self, output_hash: u64) -> bool {
        self.is_specific() && self.content_hash == output_hash
    }

    /// The stable content hash backing `Constant`/`Arbitrary` comparisons.
    /// Exposed so callers can construct an [`OutputShape::Constant`] that
    /// matches a given input's matcher without duplicating its hash logic.
    ///
    /// [`OutputShape::Constant`]: crate::OutputShape::Constant
    pub fn content_hash(&self) -> u64 {
        self.content_hash
    }

    pub(crate) fn kind(&self) -> &MatcherKind {
        &self.kind
    }
}

/// Evaluates reactions' input patterns against proposed molecule
/// assignments.
pub struct PatternMatcher;

impl PatternMatcher {
    /// Evaluates `desc`'s input patterns left-to-right against `assignment`
    /// (one candidate per input, in declaration order), binds variables,
    /// and finally evaluates the guard. Short-circuits on the first
    /// mismatch.
    pub fn try_match<B>(
        desc: &ReactionDescriptor<B>,
        assignment: &[Candidate],
    ) -> Result<Bindings, MatchFailure> {
        debug_assert_eq!(desc.inputs.len(), assignment.len());
        let mut bindings = Bindings::with_capacity(desc.inputs.len() * 2);
        for (pattern, candidate) in desc.inputs.iter().zip(assignment) {
            let bound = match pattern.matcher().kind() {
                MatcherKind::Wildcard | MatcherKind::SimpleVar => candidate.value.clone(),
                MatcherKind::Constant(test) => {
                    if test(candidate.value.as_ref()) {
                        candidate.value.clone()
                    } else {
                        return Err(MatchFailure::ConstantMismatch);
                    }
                }
                MatcherKind::Arbitrary(f) => match f(candidate.value.as_ref()) {
                    Some(bound) => bound,
                    None => return Err(MatchFailure::ArbitraryRejected),
                },
            };
            bindings.push(bound);
            if pattern.binds_reply() {
                match &candidate.reply {
                    Some(r) => bindings.push(r.clone()),
                    None => return Err(MatchFailure::NotBlockingReplySlot),
                }
            }
        }
        if let Some(guard) = &desc.guard {
            if !(guard.0)(&bindings) {
                return Err(MatchFailure::GuardFailed);
            }
        }
        Ok(bindings)
    }

    /// A cheap, single-position feasibility check used by the scheduler's
    /// backtracking search to prune branches before a full `try_match`.
    pub fn quick_check(pattern: &crate::descriptor::InputPattern, value: &dyn Any) -> bool {
        match pattern.matcher().kind() {
            MatcherKind::Wildcard | MatcherKind::SimpleVar => true,
            MatcherKind::Constant(test) => test(value),
            MatcherKind::Arbitrary(f) => f(value).is_some(),
        }
    }
}
