use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use join_core::{ConsumerSignature, MoleculeId, ReactionLookup};
use parking_lot::Mutex;

use crate::jdef::JoinDefinition;

struct Registry {
    bindings: Mutex<HashMap<u64, Arc<JoinDefinition>>>,
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(|| Registry {
        bindings: Mutex::new(HashMap::new()),
    })
}

/// Atomically binds every id in `ids` to `jdef`, or fails with the first id
/// already owned elsewhere — in which case nothing is bound, preserving the
/// idempotence-of-activation-failure law.
pub(crate) fn bind_all(ids: &[MoleculeId], jdef: &Arc<JoinDefinition>) -> Result<(), MoleculeId> {
    let reg = registry();
    let mut map = reg.bindings.lock();
    for id in ids {
        if map.contains_key(&id.raw_id()) {
            return Err(id.clone());
        }
    }
    for id in ids {
        map.insert(id.raw_id(), jdef.clone());
        let _ = id.bind(jdef.clone() as Arc<dyn std::any::Any + Send + Sync>);
    }
    Ok(())
}

pub(crate) fn lookup(id: &MoleculeId) -> Option<Arc<JoinDefinition>> {
    registry().bindings.lock().get(&id.raw_id()).cloned()
}

/// A [`ReactionLookup`] implementation over the process-wide registry, used
/// so the static analyzer can see consumers of a blocking molecule owned by
/// a *different*, already-activated `JoinDefinition`.
pub(crate) struct RegistryLookup;

impl ReactionLookup for RegistryLookup {
    fn consumers_of(&self, id: &MoleculeId) -> Vec<ConsumerSignature> {
        lookup(id).map(|jdef| jdef.consumers_of(id)).unwrap_or_default()
    }
}
