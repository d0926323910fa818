use std::sync::Arc;

use join_core::Bindings;

use crate::reply::ReplyHandle;

/// Downcasts the bound value at `index` to `T`. Panics if the reaction's
/// input patterns and its body disagree about a slot's type — a
/// configuration bug in the reaction, not a runtime condition callers need
/// to handle.
pub fn value<T: Send + Sync + 'static>(bindings: &Bindings, index: usize) -> Arc<T> {
    bindings[index]
        .clone()
        .downcast::<T>()
        .unwrap_or_else(|_| panic!("binding {index} is not of the expected type"))
}

/// Downcasts the bound value at `index` to a reply handle for `R`. Used for
/// the slot immediately following a blocking input's value slot.
pub fn reply_handle<R: Send + Sync + 'static>(bindings: &Bindings, index: usize) -> Arc<ReplyHandle<R>> {
    bindings[index]
        .clone()
        .downcast::<ReplyHandle<R>>()
        .unwrap_or_else(|_| panic!("binding {index} is not a reply handle of the expected type"))
}
