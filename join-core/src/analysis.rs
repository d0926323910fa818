use std::collections::HashMap;

use crate::descriptor::{OutputShape, ReactionDescriptor};
use crate::error::ConfigurationError;
use crate::molecule::MoleculeId;

/// What another, already-activated reaction elsewhere in the process is
/// known to consume — used only by the cross-`JoinDefinition` deadlock
/// check.
pub struct ConsumerSignature {
    pub reaction_label: String,
    /// The molecule ids this consumer requires *besides* the blocking one
    /// it was looked up by.
    pub required: Vec<MoleculeId>,
}

/// Supplies the [`StaticAnalyzer`] with knowledge of reactions outside the
/// list it was given, so it can detect deadlocks that span two
/// `JoinDefinition`s. `joinrun` implements this over its process-wide
/// registry; tests can implement it directly over a fixture.
pub trait ReactionLookup {
    fn consumers_of(&self, id: &MoleculeId) -> Vec<ConsumerSignature>;
}

/// A lookup with no external knowledge — used when analyzing a
/// self-contained set of reactions in isolation.
pub struct NoLookup;
impl ReactionLookup for NoLookup {
    fn consumers_of(&self, _id: &MoleculeId) -> Vec<ConsumerSignature> {
        Vec::new()
    }
}

/// The result of running the [`StaticAnalyzer`] over one `JoinDefinition`'s
/// reaction list.
pub struct WarningsAndErrors {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub site: String,
}

impl WarningsAndErrors {
    pub fn is_fatal(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Validates the structural shape reactions must have before the heavier
/// shadowing/livelock/deadlock analysis runs: non-empty input lists, and
/// reply binders present iff the molecule is blocking.
pub fn validate_shape<B>(reactions: &[ReactionDescriptor<B>]) -> Result<(), ConfigurationError> {
    for r in reactions {
        if r.inputs.is_empty() {
            return Err(ConfigurationError::EmptyInputPattern {
                reaction: r.input_label(),
            });
        }
        for ip in &r.inputs {
            if ip.molecule().is_blocking() && !ip.binds_reply() {
                return Err(ConfigurationError::MissingReplyBinder {
                    reaction: r.input_label(),
                    molecule: ip.molecule().name().to_string(),
                });
            }
            if !ip.molecule().is_blocking() && ip.binds_reply() {
                return Err(ConfigurationError::ReplyBinderOnNonBlocking {
                    reaction: r.input_label(),
                    molecule: ip.molecule().name().to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Static analysis of a reaction list for shadowing, livelock and deadlock
/// hazards, run once per `JoinDefinition` at activation time.
pub struct StaticAnalyzer;

impl StaticAnalyzer {
    pub fn analyze<B>(
        reactions: &[ReactionDescriptor<B>],
        site: &str,
        lookup: &dyn ReactionLookup,
    ) -> WarningsAndErrors {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        Self::check_shadowing(reactions, site, &mut errors);
        Self::check_livelock(reactions, site, &mut warnings, &mut errors);
        Self::check_deadlock(reactions, lookup, &mut warnings);

        WarningsAndErrors {
            warnings,
            errors,
            site: site.to_string(),
        }
    }

    fn check_shadowing<B>(reactions: &[ReactionDescriptor<B>], site: &str, errors: &mut Vec<String>) {
        let mut clauses = Vec::new();
        for (i, shadowed) in reactions.iter().enumerate() {
            let mut shadowers = Vec::new();
            for (j, candidate) in reactions.iter().enumerate() {
                if i == j {
                    continue;
                }
                if shadows(candidate, shadowed) {
                    shadowers.push(candidate.input_label());
                }
            }
            if !shadowers.is_empty() {
                clauses.push(format!(
                    "reaction {} is shadowed by {}",
                    shadowed.input_label(),
                    shadowers.join(", ")
                ));
            }
        }
        if !clauses.is_empty() {
            errors.push(format!(
                "In {}: Unavoidable indeterminism: {}",
                site,
                clauses.join("; ")
            ));
        }
    }

    fn check_livelock<B>(
        reactions: &[ReactionDescriptor<B>],
        site: &str,
        warnings: &mut Vec<String>,
        errors: &mut Vec<String>,
    ) {
        let mut unavoidable = Vec::new();
        for r in reactions {
            match livelock_shape(r) {
                LivelockShape::None => {}
                LivelockShape::Unavoidable => unavoidable.push(r.input_label()),
                LivelockShape::Possible => {
                    warnings.push(format!(
                        "Possible livelock: reaction {} => {}",
                        r.input_label(),
                        r.output_label()
                    ));
                }
            }
        }
        if !unavoidable.is_empty() {
            let plural = if unavoidable.len() > 1 { "s" } else { "" };
            errors.push(format!(
                "In {}: Unavoidable livelock: reaction{} {}",
                site,
                plural,
                unavoidable.join(", ")
            ));
        }
    }

    fn check_deadlock<B>(
        reactions: &[ReactionDescriptor<B>],
        lookup: &dyn ReactionLookup,
        warnings: &mut Vec<String>,
    ) {
        for r in reactions {
            for (pos, out) in r.outputs.iter().enumerate() {
                if !out.molecule().is_blocking() {
                    continue;
                }
                let mut consumers = local_consumers(reactions, out.molecule());
                consumers.extend(lookup.consumers_of(out.molecule()));
                let later: Vec<&crate::descriptor::OutputPattern> = r.outputs[pos + 1..].iter().collect();
                for consumer in &consumers {
                    let needs_later_output = later
                        .iter()
                        .any(|later_out| consumer.required.contains(later_out.molecule()));
                    if needs_later_output {
                        warnings.push(format!(
                            "Possible deadlock: molecule {} may deadlock due to outputs of {}",
                            out.molecule().name(),
                            r.input_label()
                        ));
                        break;
                    }
                }
            }
        }
    }
}

enum LivelockShape {
    None,
    Unavoidable,
    Possible,
}

/// Are `r`'s inputs a multiset-subset of its own outputs, by molecule id
/// count? If so, classify as unavoidable (no guard, every input covered by
/// an infallible or exactly-reproducing output) or merely possible.
fn livelock_shape<B>(r: &ReactionDescriptor<B>) -> LivelockShape {
    let mut output_counts: HashMap<&MoleculeId, usize> = HashMap::new();
    for out in &r.outputs {
        *output_counts.entry(out.molecule()).or_insert(0) += 1;
    }
    let mut input_counts: HashMap<&MoleculeId, usize> = HashMap::new();
    for ip in &r.inputs {
        *input_counts.entry(ip.molecule()).or_insert(0) += 1;
    }
    for (id, count) in &input_counts {
        if output_counts.get(id).copied().unwrap_or(0) < *count {
            return LivelockShape::None;
        }
    }

    let covered = r.guard.is_none() && all_inputs_covered(r);
    if covered {
        LivelockShape::Unavoidable
    } else {
        LivelockShape::Possible
    }
}

fn all_inputs_covered<B>(r: &ReactionDescriptor<B>) -> bool {
    for ip in &r.inputs {
        if ip.matcher().is_infallible() {
            continue;
        }
        let covered = r.outputs.iter().any(|out| {
            out.molecule() == ip.molecule()
                && match out.shape() {
                    OutputShape::PassThrough => true,
                    OutputShape::Constant(hash) => ip.matcher().covers_output_hash(*hash),
                    OutputShape::Fresh => false,
                }
        });
        if !covered {
            return false;
        }
    }
    true
}

/// `r1` shadows `r2` iff `r1` has no guard and every one of `r1`'s inputs
/// can be paired with a distinct input of `r2` on the same molecule with a
/// weaker-or-equal matcher.
fn shadows<B>(r1: &ReactionDescriptor<B>, r2: &ReactionDescriptor<B>) -> bool {
    if r1.guard.is_some() {
        return false;
    }
    if r1.inputs.len() > r2.inputs.len() {
        return false;
    }
    let mut used = vec![false; r2.inputs.len()];
    'outer: for ip1 in &r1.inputs {
        for (j, ip2) in r2.inputs.iter().enumerate() {
            if used[j] || ip2.molecule() != ip1.molecule() {
                continue;
            }
            if ip1.matcher().weaker_or_equal(ip2.matcher()) {
                used[j] = true;
                continue 'outer;
            }
        }
        return false;
    }
    true
}

fn local_consumers<B>(reactions: &[ReactionDescriptor<B>], id: &MoleculeId) -> Vec<ConsumerSignature> {
    reactions
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Guard, InputPattern, OutputPattern};
    use crate::matcher::{Bindings, Matcher};

    fn reaction(
        inputs: Vec<InputPattern>,
        outputs: Vec<OutputPattern>,
        guard: Option<Guard>,
    ) -> ReactionDescriptor<()> {
        ReactionDescriptor::new(inputs, guard, outputs, (), false, 0)
    }

    #[test]
    fn detects_shadowing() {
        let a = MoleculeId::new("a", false);
        let b = MoleculeId::new("b", false);
        let r1 = reaction(vec![InputPattern::value(a.clone(), Matcher::wildcard())], vec![], None);
        let r2 = reaction(
            vec![
                InputPattern::value(a.clone(), Matcher::wildcard()),
                InputPattern::value(b.clone(), Matcher::wildcard()),
            ],
            vec![],
            None,
        );
        let result = StaticAnalyzer::analyze(&[r1, r2], "Join{a + a + b}", &NoLookup);
        assert!(result.errors.iter().any(|e| e.contains("Unavoidable indeterminism")));
    }

    #[test]
    fn no_shadowing_when_guard_present() {
        let a = MoleculeId::new("a", false);
        let b = MoleculeId::new("b", false);
        let r1 = reaction(
            vec![InputPattern::value(a.clone(), Matcher::wildcard())],
            vec![],
            Some(Guard::new(|_: &Bindings| true)),
        );
        let r2 = reaction(
            vec![
                InputPattern::value(a.clone(), Matcher::wildcard()),
                InputPattern::value(b.clone(), Matcher::wildcard()),
            ],
            vec![],
            None,
        );
        let result = StaticAnalyzer::analyze(&[r1, r2], "Join{}", &NoLookup);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn detects_unavoidable_livelock() {
        let a = MoleculeId::new("a", false);
        let b = MoleculeId::new("b", false);
        let r = reaction(
            vec![
                InputPattern::value(a.clone(), Matcher::constant("1", 1_i32)),
                InputPattern::value(b.clone(), Matcher::wildcard()),
            ],
            vec![
                OutputPattern::new(b.clone(), OutputShape::Fresh, "b(1)"),
                OutputPattern::new(b.clone(), OutputShape::Fresh, "b(2)"),
                OutputPattern::new(
                    a.clone(),
                    OutputShape::Constant(Matcher::constant("1", 1_i32).content_hash()),
                    "a(1)",
                ),
            ],
            None,
        );
        let result = StaticAnalyzer::analyze(&[r], "Join{a + b}", &NoLookup);
        assert!(result.errors.iter().any(|e| e.contains("Unavoidable livelock")));
    }

    #[test]
    fn detects_possible_deadlock_across_definitions() {
        let f = MoleculeId::new("f", true);
        let a = MoleculeId::new("a", false);
        let c = MoleculeId::new("c", false);

        let consuming = reaction(
            vec![
                InputPattern::blocking(f.clone(), Matcher::wildcard()),
                InputPattern::value(a.clone(), Matcher::wildcard()),
            ],
            vec![],
            None,
        );

        struct Fixture(Vec<ConsumerSignature>);
        impl ReactionLookup for Fixture {
            fn consumers_of(&self, _id: &MoleculeId) -> Vec<ConsumerSignature> {
                self.0
                    .iter()
                    .map(|c| ConsumerSignature {
                        reaction_label: c.reaction_label.clone(),
                        required: c.required.clone(),
                    })
                    .collect()
            }
        }
        let lookup = Fixture(local_consumers(std::slice::from_ref(&consuming), &f));

        let producing = reaction(
            vec![InputPattern::value(c.clone(), Matcher::wildcard())],
            vec![
                OutputPattern::new(f.clone(), OutputShape::Fresh, "f()"),
                OutputPattern::new(a.clone(), OutputShape::Fresh, "a(1)"),
            ],
            None,
        );

        let result = StaticAnalyzer::analyze(&[producing], "Join{c}", &lookup);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("Possible deadlock: molecule f")));
    }
}
