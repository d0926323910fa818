//! A concurrent chemical-machine runtime implementing the join calculus.
//!
//! Callers declare molecules with [`declare_nonblocking`]/[`declare_blocking`],
//! build reactions with [`ReactionBuilder`], and bind them into a running
//! [`JoinDefinition`] with [`JoinDefinition::activate`]. Emitting a molecule
//! through its injector inserts it into the definition's soup and triggers a
//! scheduler pass; a blocking molecule's emitter waits for the consuming
//! reaction's reply.

mod bag;
mod bindings;
mod config;
mod error;
mod injector;
mod jdef;
mod pool;
mod reaction;
mod registry;
mod reply;
mod scheduler;

pub use bindings::{reply_handle, value};
pub use config::{set_log_level, EngineConfig};
pub use error::{ActivationError, ConfigurationError, EmitError, PoolError};
pub use injector::{declare_blocking, declare_nonblocking, BlockingInjector, MolInjector};
pub use jdef::{JoinDefinition, ReactionBody};
pub use pool::{new_blocking_aware_pool, new_fixed_pool, IdleGuard, ThreadPoolContract};
pub use reaction::ReactionBuilder;
pub use reply::{Outcome, ReplyHandle, ReplySlot};

pub use join_core::{
    Bindings, BoundValue, ConsumerSignature, Guard, InputPattern, Matcher, MoleculeId, NoLookup,
    OutputPattern, OutputShape, ReactionDescriptor, ReactionLookup, StaticAnalyzer, WarningsAndErrors,
};

#[cfg(test)]
mod tests;
