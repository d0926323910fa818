use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use join_core::{Bindings, Candidate, MoleculeId, PatternMatcher, ReactionDescriptor};
use rand::Rng;

use crate::bag::MoleculeBag;
use crate::jdef::{JoinDefinition, ReactionBody};
use crate::pool::ThreadPoolContract;

thread_local! {
    static CURRENT_REACTION_POOL: RefCell<Option<Arc<dyn ThreadPoolContract>>> = RefCell::new(None);
}

/// The reaction pool a blocking emission should `mark_idle` against, if the
/// calling thread is currently running inside a reaction body. `None` means
/// the emitter is outside any reaction (e.g. the program's main thread),
/// where a blocking wait needs no pool compensation.
pub(crate) fn current_reaction_pool() -> Option<Arc<dyn ThreadPoolContract>> {
    CURRENT_REACTION_POOL.with(|cell| cell.borrow().clone())
}

fn with_reaction_pool<R>(pool: Arc<dyn ThreadPoolContract>, f: impl FnOnce() -> R) -> R {
    let previous = CURRENT_REACTION_POOL.with(|cell| cell.borrow_mut().replace(pool));
    let result = f();
    CURRENT_REACTION_POOL.with(|cell| *cell.borrow_mut() = previous);
    result
}

struct ConsumedValue {
    id: MoleculeId,
    value: join_core::BoundValue,
    reply: Option<join_core::BoundValue>,
}

/// One pass of the decision step: find at most one enabled reaction, remove
/// its matched tuple from the bag, and submit its body to the reaction
/// pool. Runs entirely under the bag lock up to the point of submission.
pub(crate) fn run_decision_pass(jdef: &Arc<JoinDefinition>) {
    let found = {
        let mut bag = jdef.bag_mut();
        try_find_and_consume(jdef, &mut bag)
    };
    let Some((label, retry, body, bindings, consumed)) = found else {
        return;
    };
    let jdef = jdef.clone();
    let reaction_pool = jdef.reaction_pool();
    let submission = reaction_pool.submit(Box::new(move || {
        run_reaction_body(&jdef, retry, label, body, bindings, consumed);
    }));
    if let Err(e) = submission {
        tracing::error!("failed to submit matched reaction to the reaction pool: {e}");
    }
}

#[allow(clippy::type_complexity)]
fn try_find_and_consume(
    jdef: &Arc<JoinDefinition>,
    bag: &mut MoleculeBag,
) -> Option<(String, bool, ReactionBody, Bindings, Vec<ConsumedValue>)> {
    let reactions = jdef.reactions();
    let n = reactions.len();
    if n == 0 {
        return None;
    }
    let start = jdef.last_run().load(Ordering::Relaxed) % n;
    let mut rng = rand::thread_rng();

    for offset in 0..n {
        let idx = (start + offset) % n;
        let reaction = &reactions[idx];
        let Some((chosen, bindings)) = search_reaction(reaction, bag, &mut rng) else {
            continue;
        };

        // Inputs address distinct molecule ids (linear patterns only), so
        // removing one chosen index never invalidates another.
        let consumed = chosen
            .into_iter()
            .map(|(id, index)| {
                let stored = bag.remove(&id, index);
                ConsumedValue {
                    id,
                    value: stored.value,
                    reply: stored.reply,
                }
            })
            .collect();

        jdef.last_run().store(idx + 1, Ordering::Relaxed);
        return Some((reaction.input_label(), reaction.retry, reaction.body.clone(), bindings, consumed));
    }
    None
}

fn search_reaction(
    reaction: &ReactionDescriptor<ReactionBody>,
    bag: &MoleculeBag,
    rng: &mut impl Rng,
) -> Option<(Vec<(MoleculeId, usize)>, Bindings)> {
    let mut chosen = Vec::with_capacity(reaction.inputs.len());
    if !backtrack(reaction, bag, rng, 0, &mut chosen) {
        return None;
    }
    let assignment: Vec<Candidate> = chosen
        .iter()
        .map(|(id, index)| {
            let stored = bag
                .peek(id, *index)
                .expect("chosen candidate removed mid-pass under the bag lock");
            Candidate {
                value: stored.value.clone(),
                reply: stored.reply.clone(),
            }
        })
        .collect();
    match PatternMatcher::try_match(reaction, &assignment) {
        Ok(bindings) => Some((chosen, bindings)),
        Err(_) => None,
    }
}

/// Depth-first search over one candidate per input pattern, pruned by
/// `quick_check`. The guard itself is only evaluated once, against the full
/// assignment, in `search_reaction`.
fn backtrack(
    reaction: &ReactionDescriptor<ReactionBody>,
    bag: &MoleculeBag,
    rng: &mut impl Rng,
    pos: usize,
    chosen: &mut Vec<(MoleculeId, usize)>,
) -> bool {
    if pos == reaction.inputs.len() {
        return true;
    }
    let pattern = &reaction.inputs[pos];
    let id = pattern.molecule();
    for index in bag.shuffled_indices(id, rng) {
        let Some(stored) = bag.peek(id, index) else {
            continue;
        };
        if !PatternMatcher::quick_check(pattern, stored.value.as_ref()) {
            continue;
        }
        chosen.push((id.clone(), index));
        if backtrack(reaction, bag, rng, pos + 1, chosen) {
            return true;
        }
        chosen.pop();
    }
    false
}

fn run_reaction_body(
    jdef: &Arc<JoinDefinition>,
    retry: bool,
    label: String,
    body: ReactionBody,
    bindings: Bindings,
    consumed: Vec<ConsumedValue>,
) {
    let pool = jdef.reaction_pool();
    let outcome = with_reaction_pool(pool, || catch_unwind(AssertUnwindSafe(|| body(bindings))));

    match outcome {
        Ok(()) => tracing::debug!(reaction = %label, "reaction completed"),
        Err(_) if retry => {
            tracing::warn!(reaction = %label, "reaction faulted; re-emitting consumed molecules");
            for c in consumed {
                if let Err(e) = jdef.emit_value(c.id, c.value, c.reply, "<retried>".to_string()) {
                    tracing::error!("failed to re-emit after a retried fault: {e}");
                }
            }
        }
        Err(_) => {
            tracing::error!(reaction = %label, "reaction faulted; consumed molecules discarded");
        }
    }

    // A pass only ever fires one reaction; re-trigger in case the soup still
    // has an enabled reaction this pass didn't reach.
    if let Err(e) = jdef.schedule_decision_pass() {
        tracing::debug!("no further decision pass scheduled: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_reaction_pool_is_none_outside_a_reaction_body() {
        assert!(current_reaction_pool().is_none());
    }

    #[test]
    fn with_reaction_pool_restores_previous_value() {
        let pool = crate::pool::new_fixed_pool(1);
        with_reaction_pool(pool.clone(), || {
            assert!(current_reaction_pool().is_some());
            with_reaction_pool(pool.clone(), || {
                assert!(current_reaction_pool().is_some());
            });
            assert!(current_reaction_pool().is_some());
        });
        assert!(current_reaction_pool().is_none());
    }
}
