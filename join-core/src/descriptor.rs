use std::fmt;
use std::sync::Arc;

use crate::matcher::{Bindings, Matcher};
use crate::molecule::MoleculeId;

/// One input slot of a reaction: which molecule it addresses, how its value
/// is matched, and whether it also binds a reply handle (mandatory for, and
/// exclusive to, blocking molecules).
pub struct InputPattern {
    molecule: MoleculeId,
    matcher: Matcher,
    binds_reply: bool,
}

impl InputPattern {
    /// An input pattern on a non-blocking molecule.
    pub fn value(molecule: MoleculeId, matcher: Matcher) -> Self {
        InputPattern {
            molecule,
            matcher,
            binds_reply: false,
        }
    }

    /// An input pattern on a blocking molecule: matches its value with
    /// `matcher` and additionally binds a reply handle.
    pub fn blocking(molecule: MoleculeId, matcher: Matcher) -> Self {
        InputPattern {
            molecule,
            matcher,
            binds_reply: true,
        }
    }

    pub fn molecule(&self) -> &MoleculeId {
        &self.molecule
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn binds_reply(&self) -> bool {
        self.binds_reply
    }
}

impl fmt::Display for InputPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.molecule.name(), self.matcher.label())
    }
}

/// The shape of one emission in a reaction's (derived) output sequence, used
/// by the livelock check to decide whether an output "covers" one of the
/// reaction's own inputs.
pub enum OutputShape {
    /// Re-emits a value bound from one of the reaction's inputs unchanged.
    PassThrough,
    /// Emits a value equal (by content hash) to a specific constant.
    Constant(u64),
    /// Emits a value with no statically knowable relationship to the inputs.
    Fresh,
}

/// One emission in a reaction's (derived) output sequence.
pub struct OutputPattern {
    molecule: MoleculeId,
    shape: OutputShape,
    /// Rendered form used in diagnostics, e.g. `"b(1)"`.
    label: String,
}

impl OutputPattern {
    pub fn new(molecule: MoleculeId, shape: OutputShape, label: impl Into<String>) -> Self {
        OutputPattern {
            molecule,
            shape,
            label: label.into(),
        }
    }

    pub fn molecule(&self) -> &MoleculeId {
        &self.molecule
    }

    pub fn shape(&self) -> &OutputShape {
        &self.shape
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// A boolean predicate over a reaction's bound variables, re-evaluated on
/// every candidate tuple. Must be total and side-effect-free; the engine
/// cannot verify this and the analyzer cannot prove it.
pub struct Guard(pub(crate) Arc<dyn Fn(&Bindings) -> bool + Send + Sync>);

impl Guard {
    pub fn new(f: impl Fn(&Bindings) -> bool + Send + Sync + 'static) -> Self {
        Guard(Arc::new(f))
    }
}

/// The normalized representation of a reaction, as produced by the (out of
/// scope) surface macro/frontend and consumed by the matcher, scheduler and
/// analyzer. Generic over the body type so this crate never needs to know
/// what a reaction actually does.
pub struct ReactionDescriptor<B> {
    pub inputs: Vec<InputPattern>,
    pub guard: Option<Guard>,
    pub outputs: Vec<OutputPattern>,
    pub body: B,
    pub retry: bool,
    pub source_hash: u64,
}

impl<B> ReactionDescriptor<B> {
    pub fn new(
        inputs: Vec<InputPattern>,
        guard: Option<Guard>,
        outputs: Vec<OutputPattern>,
        body: B,
        retry: bool,
        source_hash: u64,
    ) -> Self {
        ReactionDescriptor {
            inputs,
            guard,
            outputs,
            body,
            retry,
            source_hash,
        }
    }

    /// The reaction's input signature rendered for diagnostics, e.g.
    /// `"a(1)+b(_)"` — no separating spaces, matching the static analyzer's
    /// message format.
    pub fn input_label(&self) -> String {
        self.inputs
            .iter()
            .map(|ip| ip.to_string())
            .collect::<Vec<_>>()
            .join("+")
    }

    /// The reaction's output sequence rendered for diagnostics, e.g.
    /// `"b(1)+b(2)+a(1)"`.
    pub fn output_label(&self) -> String {
        self.outputs
            .iter()
            .map(|op| op.label().to_string())
            .collect::<Vec<_>>()
            .join("+")
    }
}
