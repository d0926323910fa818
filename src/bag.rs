use std::collections::HashMap;

use join_core::{BoundValue, MoleculeId};
use rand::seq::SliceRandom;
use rand::Rng;

/// One molecule value resident in a [`MoleculeBag`]: its type-erased
/// payload, a reply handle if the molecule is blocking, and a pre-rendered
/// debug string used by `log_soup`.
pub struct StoredValue {
    pub value: BoundValue,
    pub reply: Option<BoundValue>,
    pub repr: String,
}

/// The multiset of pending molecule values owned by one `JoinDefinition`,
/// keyed by molecule identity. Every operation here is called only while
/// the owning definition's mutex is held, so no internal synchronization is
/// needed.
#[derive(Default)]
pub struct MoleculeBag {
    slots: HashMap<MoleculeId, Vec<StoredValue>>,
}

impl MoleculeBag {
    pub fn new() -> Self {
        MoleculeBag {
            slots: HashMap::new(),
        }
    }

    pub fn insert(&mut self, id: MoleculeId, value: StoredValue) {
        self.slots.entry(id).or_default().push(value);
    }

    pub fn count(&self, id: &MoleculeId) -> usize {
        self.slots.get(id).map_or(0, Vec::len)
    }

    pub fn peek(&self, id: &MoleculeId, index: usize) -> Option<&StoredValue> {
        self.slots.get(id).and_then(|v| v.get(index))
    }

    /// Removes and returns the value at `index` within `id`'s multiset.
    /// Swap-removes, so callers must take candidate indices from a single
    /// [`shuffled_indices`](Self::shuffled_indices) snapshot and never reuse
    /// one after a removal from the same id within the same pass.
    pub fn remove(&mut self, id: &MoleculeId, index: usize) -> StoredValue {
        let values = self.slots.get_mut(id).expect("remove of unknown molecule id");
        values.swap_remove(index)
    }

    /// A fairness-respecting traversal order over `id`'s current candidates:
    /// shuffled, so repeated decision passes do not always prefer the same
    /// value when several are available.
    pub fn shuffled_indices(&self, id: &MoleculeId, rng: &mut impl Rng) -> Vec<usize> {
        let len = self.count(id);
        let mut indices: Vec<usize> = (0..len).collect();
        indices.shuffle(rng);
        indices
    }

    /// Sorted (by name) listing of every resident value's pre-rendered
    /// `repr`, for `log_soup`.
    pub fn listing(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = Vec::new();
        for (id, values) in &self.slots {
            for stored in values {
                entries.push((id.name().to_string(), stored.repr.clone()));
            }
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn stored(n: i32) -> StoredValue {
        StoredValue {
            value: Arc::new(n) as BoundValue,
            reply: None,
            repr: n.to_string(),
        }
    }

    #[test]
    fn insert_and_count() {
        let id = MoleculeId::new("a", false);
        let mut bag = MoleculeBag::new();
        assert_eq!(bag.count(&id), 0);
        bag.insert(id.clone(), stored(1));
        bag.insert(id.clone(), stored(2));
        assert_eq!(bag.count(&id), 2);
    }

    #[test]
    fn remove_swap_removes() {
        let id = MoleculeId::new("a", false);
        let mut bag = MoleculeBag::new();
        bag.insert(id.clone(), stored(1));
        bag.insert(id.clone(), stored(2));
        let removed = bag.remove(&id, 0);
        assert_eq!(*removed.value.downcast_ref::<i32>().unwrap(), 1);
        assert_eq!(bag.count(&id), 1);
    }

    #[test]
    fn listing_sorted_by_name() {
        let a = MoleculeId::new("b_mol", false);
        let b = MoleculeId::new("a_mol", false);
        let mut bag = MoleculeBag::new();
        bag.insert(a, stored(1));
        bag.insert(b, stored(2));
        let listing = bag.listing();
        assert_eq!(listing[0].0, "a_mol");
        assert_eq!(listing[1].0, "b_mol");
    }
}
