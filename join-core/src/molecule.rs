use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

struct MoleculeInfo {
    id: u64,
    name: String,
    blocking: bool,
    // Cached binding to the owning join definition, set once at activation
    // time. Type-erased so this crate need not know about `JoinDefinition`.
    binding: OnceLock<Arc<dyn Any + Send + Sync>>,
}

/// A unique, opaque handle to a declared molecule.
///
/// Cloning a `MoleculeId` is cheap (it shares the underlying identity
/// record); clones compare equal and hash the same. Identity, not name, is
/// what the bag and matcher use — two molecules declared with the same name
/// are still distinct.
#[derive(Clone)]
pub struct MoleculeId(Arc<MoleculeInfo>);

impl MoleculeId {
    pub fn new(name: impl Into<String>, blocking: bool) -> Self {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        MoleculeId(Arc::new(MoleculeInfo {
            id,
            name: name.into(),
            blocking,
            binding: OnceLock::new(),
        }))
    }

    pub fn raw_id(&self) -> u64 {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn is_blocking(&self) -> bool {
        self.0.blocking
    }

    /// Records the (type-erased) owning join definition. Returns `Err` if a
    /// binding was already recorded — callers must treat that as a logic
    /// error, since the single-binding invariant is meant to be enforced
    /// before this is ever called twice.
    #[doc(hidden)]
    pub fn bind(&self, owner: Arc<dyn Any + Send + Sync>) -> Result<(), ()> {
        self.0.binding.set(owner).map_err(|_| ())
    }

    #[doc(hidden)]
    pub fn binding(&self) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.0.binding.get()
    }
}

impl PartialEq for MoleculeId {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}
impl Eq for MoleculeId {}

impl std::hash::Hash for MoleculeId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state)
    }
}

impl fmt::Display for MoleculeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

impl fmt::Debug for MoleculeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MoleculeId")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("blocking", &self.0.blocking)
            .finish()
    }
}
