//! Pattern matching and static analysis primitives for join-calculus reactions.
//!
//! This crate is the pure, non-threaded half of the engine: it knows how to
//! represent a reaction's input patterns, evaluate them against a proposed
//! assignment of molecule values, and statically analyze a reaction list for
//! shadowing, livelock and deadlock hazards. It has no notion of a thread
//! pool, a bag, or a scheduler — those live in the `joinrun` crate, which
//! drives this one.

mod analysis;
mod debug;
mod descriptor;
mod error;
mod matcher;
mod molecule;

pub use analysis::{
    validate_shape, ConsumerSignature, NoLookup, ReactionLookup, StaticAnalyzer, WarningsAndErrors,
};
pub use descriptor::{Guard, InputPattern, OutputPattern, OutputShape, ReactionDescriptor};
pub use error::{ConfigurationError, MatchFailure};
pub use matcher::{BoundValue, Bindings, Candidate, Matcher, PatternMatcher};
pub use molecule::MoleculeId;
