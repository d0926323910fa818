use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use join_core::{InputPattern, Matcher, MoleculeId};

use crate::error::EmitError;
use crate::pool;
use crate::reply::{deadline_from, Outcome, ReplySlot};
use crate::scheduler;

fn bound_jdef(id: &MoleculeId) -> Result<Arc<crate::jdef::JoinDefinition>, EmitError> {
    id.binding()
        .and_then(|b| b.clone().downcast::<crate::jdef::JoinDefinition>().ok())
        .ok_or_else(|| EmitError::NotBound(id.name().to_string()))
}

/// A handle whose invocation emits a non-blocking molecule value into its
/// join definition's soup.
pub struct MolInjector<T> {
    id: MoleculeId,
    _marker: PhantomData<fn(T)>,
}

impl<T: Send + Sync + fmt::Debug + 'static> MolInjector<T> {
    pub fn declare(name: impl Into<String>) -> Self {
        MolInjector {
            id: MoleculeId::new(name, false),
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> &MoleculeId {
        &self.id
    }

    pub fn emit(&self, value: T) -> Result<(), EmitError> {
        let jdef = bound_jdef(&self.id)?;
        let repr = format!("{value:?}");
        jdef.emit_value(self.id.clone(), Arc::new(value), None, repr)
    }

    pub fn wildcard(&self) -> InputPattern {
        InputPattern::value(self.id.clone(), Matcher::wildcard())
    }

    pub fn var(&self, label: impl Into<String>) -> InputPattern {
        InputPattern::value(self.id.clone(), Matcher::simple_var(label))
    }

    pub fn constant(&self, value: T) -> InputPattern
    where
        T: Eq + Hash,
    {
        let label = format!("{value:?}");
        InputPattern::value(self.id.clone(), Matcher::constant(label, value))
    }

    pub fn arbitrary<U: Send + Sync + 'static>(
        &self,
        label: impl Into<String>,
        f: impl Fn(&T) -> Option<U> + Send + Sync + 'static,
    ) -> InputPattern {
        InputPattern::value(self.id.clone(), Matcher::arbitrary(label, f))
    }

    pub fn log_soup(&self) -> Result<String, EmitError> {
        Ok(bound_jdef(&self.id)?.log_soup())
    }

    pub fn set_log_level(&self, level: u8) {
        crate::config::set_log_level(level);
    }
}

impl<T> Clone for MolInjector<T> {
    fn clone(&self) -> Self {
        MolInjector {
            id: self.id.clone(),
            _marker: PhantomData,
        }
    }
}

/// A handle whose invocation emits a blocking molecule value and waits for
/// the consuming reaction's reply.
pub struct BlockingInjector<T, R> {
    id: MoleculeId,
    _marker: PhantomData<fn(T) -> R>,
}

impl<T, R> BlockingInjector<T, R>
where
    T: Send + Sync + fmt::Debug + 'static,
    R: Send + Sync + 'static,
{
    pub fn declare(name: impl Into<String>) -> Self {
        BlockingInjector {
            id: MoleculeId::new(name, true),
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> &MoleculeId {
        &self.id
    }

    /// Emits `value` and blocks until replied, timed out, or a protocol
    /// fault. `timeout` of `None` waits indefinitely. If the calling thread
    /// is itself running inside a reaction body, the wait runs under that
    /// reaction pool's `mark_idle` scope so the pool can backfill capacity.
    pub fn emit(&self, value: T, timeout: Option<Duration>) -> Result<Option<R>, EmitError> {
        let jdef = bound_jdef(&self.id)?;
        let (slot, handle) = ReplySlot::<R>::new();
        let repr = format!("{value:?}");
        jdef.emit_value(
            self.id.clone(),
            Arc::new(value),
            Some(Arc::new(handle)),
            repr,
        )?;

        let deadline = deadline_from(timeout);
        let wait = || slot.wait(deadline);
        let outcome = match scheduler::current_reaction_pool() {
            Some(reaction_pool) => pool::mark_idle(reaction_pool.as_ref(), wait),
            None => wait(),
        };

        match outcome {
            Outcome::Replied(value) => Ok(Some(value)),
            Outcome::TimedOut => Ok(None),
            Outcome::Failed(reason) => Err(EmitError::ProtocolFault(reason)),
        }
    }

    pub fn wildcard(&self) -> InputPattern {
        InputPattern::blocking(self.id.clone(), Matcher::wildcard())
    }

    pub fn var(&self, label: impl Into<String>) -> InputPattern {
        InputPattern::blocking(self.id.clone(), Matcher::simple_var(label))
    }

    pub fn constant(&self, value: T) -> InputPattern
    where
        T: Eq + Hash,
    {
        let label = format!("{value:?}");
        InputPattern::blocking(self.id.clone(), Matcher::constant(label, value))
    }

    pub fn log_soup(&self) -> Result<String, EmitError> {
        Ok(bound_jdef(&self.id)?.log_soup())
    }

    pub fn set_log_level(&self, level: u8) {
        crate::config::set_log_level(level);
    }
}

impl<T, R> Clone for BlockingInjector<T, R> {
    fn clone(&self) -> Self {
        BlockingInjector {
            id: self.id.clone(),
            _marker: PhantomData,
        }
    }
}

pub fn declare_nonblocking<T: Send + Sync + fmt::Debug + 'static>(
    name: impl Into<String>,
) -> MolInjector<T> {
    MolInjector::declare(name)
}

pub fn declare_blocking<T, R>(name: impl Into<String>) -> BlockingInjector<T, R>
where
    T: Send + Sync + fmt::Debug + 'static,
    R: Send + Sync + 'static,
{
    BlockingInjector::declare(name)
}
