use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use join_core::{
    validate_shape, Bindings, BoundValue, ConsumerSignature, MoleculeId, ReactionDescriptor,
    StaticAnalyzer, WarningsAndErrors,
};
use parking_lot::Mutex;

use crate::bag::{MoleculeBag, StoredValue};
use crate::error::{ActivationError, EmitError};
use crate::pool::ThreadPoolContract;
use crate::registry::{self, RegistryLookup};

/// A reaction body: runs for effect over its bound environment, typically
/// emitting further molecules through injectors captured in its closure.
/// Reified as an `Arc` (rather than a plain closure type) so the scheduler
/// can clone it out from under the bag lock before running it.
pub type ReactionBody = Arc<dyn Fn(Bindings) + Send + Sync>;

/// `"<sig>; …"`: each reaction's molecule names sorted alphabetically and
/// joined by `" + "`, reactions joined by `"; "`. Shared by the `site`
/// string embedded in analyzer error messages and by `log_soup`'s header.
fn join_signature(reactions: &[ReactionDescriptor<ReactionBody>]) -> String {
    reactions
        .iter()
        .map(|r| {
            let mut names: Vec<&str> = r.inputs.iter().map(|ip| ip.molecule().name()).collect();
            names.sort_unstable();
            names.join(" + ")
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// The binding unit: owns a soup, a frozen reaction list, and references to
/// the two pools reactions run on. Published once by [`JoinDefinition::activate`]
/// and immutable thereafter.
pub struct JoinDefinition {
    bag: Mutex<MoleculeBag>,
    reactions: Vec<ReactionDescriptor<ReactionBody>>,
    bound_ids: Vec<MoleculeId>,
    decision_pool: Arc<dyn ThreadPoolContract>,
    reaction_pool: Arc<dyn ThreadPoolContract>,
    last_run: AtomicUsize,
    site: String,
}

impl JoinDefinition {
    /// Validates shape, runs the static analyzer (consulting the
    /// process-wide registry for cross-definition deadlock checks), and —
    /// if there are no fatal errors — binds every molecule this reaction
    /// list addresses and publishes the definition. A failed activation
    /// leaves no molecule bound.
    pub fn activate(
        reactions: Vec<ReactionDescriptor<ReactionBody>>,
        decision_pool: Arc<dyn ThreadPoolContract>,
        reaction_pool: Arc<dyn ThreadPoolContract>,
    ) -> Result<(Arc<JoinDefinition>, WarningsAndErrors), ActivationError> {
        validate_shape(&reactions)?;

        let mut bound_ids: Vec<MoleculeId> = Vec::new();
        for r in &reactions {
            for ip in &r.inputs {
                if !bound_ids.contains(ip.molecule()) {
                    bound_ids.push(ip.molecule().clone());
                }
            }
        }

        let site = format!("Join{{{}}}", join_signature(&reactions));

        let result = StaticAnalyzer::analyze(&reactions, &site, &RegistryLookup);
        if result.is_fatal() {
            return Err(ActivationError::StaticAnalysis(result.errors.join("; ")));
        }
        for warning in &result.warnings {
            tracing::warn!(site = %site, "{warning}");
        }

        let jdef = Arc::new(JoinDefinition {
            bag: Mutex::new(MoleculeBag::new()),
            reactions,
            bound_ids: bound_ids.clone(),
            decision_pool,
            reaction_pool,
            last_run: AtomicUsize::new(0),
            site,
        });

        registry::bind_all(&bound_ids, &jdef)
            .map_err(|id| ActivationError::AlreadyBound(id.name().to_string()))?;

        tracing::info!(site = %jdef.site, "activated join definition");
        Ok((jdef, result))
    }

    pub(crate) fn reactions(&self) -> &[ReactionDescriptor<ReactionBody>] {
        &self.reactions
    }

    pub(crate) fn bag_mut(&self) -> parking_lot::MutexGuard<'_, MoleculeBag> {
        self.bag.lock()
    }

    pub(crate) fn last_run(&self) -> &AtomicUsize {
        &self.last_run
    }

    pub(crate) fn reaction_pool(&self) -> Arc<dyn ThreadPoolContract> {
        self.reaction_pool.clone()
    }

    /// Inserts a value into the bag and kicks off a decision pass on the
    /// decision pool. Used both for fresh emissions and for re-emitting a
    /// reaction's consumed inputs on a `retry=true` fault.
    pub(crate) fn emit_value(
        self: &Arc<Self>,
        id: MoleculeId,
        value: BoundValue,
        reply: Option<BoundValue>,
        repr: String,
    ) -> Result<(), EmitError> {
        self.bag.lock().insert(id, StoredValue { value, reply, repr });
        self.schedule_decision_pass()
    }

    pub(crate) fn schedule_decision_pass(self: &Arc<Self>) -> Result<(), EmitError> {
        let jdef = self.clone();
        self.decision_pool
            .submit(Box::new(move || crate::scheduler::run_decision_pass(&jdef)))
            .map_err(EmitError::PoolRejected)
    }

    /// Reaction signatures known locally that consume `id`, used by
    /// [`RegistryLookup`] to answer cross-definition deadlock queries.
    pub(crate) fn consumers_of(&self, id: &MoleculeId) -> Vec<ConsumerSignature> {
        self.reactions
            .iter()
            .filter(|r| r.inputs.iter().any(|ip| ip.molecule() == id))
            .map(|r| ConsumerSignature {
                reaction_label: r.input_label(),
                required: r
                    .inputs
                    .iter()
                    .map(|ip| ip.molecule().clone())
                    .filter(|m| m != id)
                    .collect(),
            })
            .collect()
    }

    /// `"Join{<sig>; …}\n<molecule listing>"`: per-reaction molecule names
    /// sorted alphabetically and joined by `" + "`, reactions joined by
    /// `"; "`; molecule listing sorted by name or `"No molecules"`.
    pub fn log_soup(&self) -> String {
        let header = format!("Join{{{}}}", join_signature(&self.reactions));

        let listing = self.bag.lock().listing();
        let body = if listing.is_empty() {
            "No molecules".to_string()
        } else {
            let rendered: Vec<String> = listing
                .iter()
                .map(|(name, repr)| format!("{name}({repr})"))
                .collect();
            format!("Molecules: {}", rendered.join(", "))
        };
        format!("{header}\n{body}")
    }

    /// Forwards to both pools' `shutdown_now`; safe to call more than once.
    pub fn shutdown(&self) {
        self.decision_pool.shutdown_now();
        self.reaction_pool.shutdown_now();
    }

    pub fn bound_ids(&self) -> &[MoleculeId] {
        &self.bound_ids
    }
}
