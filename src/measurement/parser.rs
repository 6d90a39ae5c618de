//! Correlates chronological instrumentation events into measurement results.
//!
//! The parser does all its work at construction: it pairs enter/left events
//! per code section, attributes each well-formed pair (or capture event) to
//! the measurable element owning that section, and materialises the
//! per-element result sets.
//!
//! Malformed facts are dropped, never escalated: a left without a prior
//! enter, an enter never left, an event for a section no element owns, or a
//! demand value outside its domain each produce a `warn` log line and bump
//! the drop counter queryable through [`EventParser::dropped_events`]. The
//! parser extracts whatever well-formed facts exist; validating the
//! measurement tool is not its job.

use super::events::MeasurementEvent;
use super::results::{MeasurementResult, Parameterisation};
use super::{CodeSection, MeasurableElement};
use im::Vector;
use log::warn;
use std::collections::HashMap;

/// How a code section relates to the element owning it.
#[derive(Clone, Debug)]
enum SectionRole {
    /// The section of a resource-demanding action.
    ResourceAction(MeasurableElement),
    /// Alternative `index` of a branch element.
    BranchAlternative(MeasurableElement, usize),
    /// The loop statement section itself.
    LoopStatement(MeasurableElement),
    /// The body section of a loop.
    LoopBody(MeasurableElement),
    /// The call site of an observed parameter.
    ParameterSite(MeasurableElement),
    /// Known section with no fact of its own (e.g. a branch statement).
    Inert,
}

/// Per-loop repetition bookkeeping between loop-statement visits.
#[derive(Default)]
struct LoopCounter {
    passes: u64,
    first_parameterisation: Option<Parameterisation>,
}

pub struct EventParser {
    results: HashMap<MeasurableElement, Vector<MeasurementResult>>,
    dropped: usize,
}

impl EventParser {
    /// Parse `events` against the element universe.
    ///
    /// The stream is assumed chronological; ordering between unrelated
    /// sections carries no meaning beyond enter-before-left pairing.
    pub fn new(events: &[MeasurementEvent], universe: &[MeasurableElement]) -> Self {
        let roles = section_roles(universe);
        let mut parser = Self {
            results: HashMap::new(),
            dropped: 0,
        };
        parser.correlate(events, &roles);
        parser
    }

    /// Results correlated to `element`; empty, never an error, for elements
    /// without events. Idempotent.
    pub fn results_for(&self, element: &MeasurableElement) -> Vector<MeasurementResult> {
        self.results.get(element).cloned().unwrap_or_default()
    }

    /// All per-element result sets with at least one fact.
    pub fn all_results(&self) -> &HashMap<MeasurableElement, Vector<MeasurementResult>> {
        &self.results
    }

    /// Number of malformed facts dropped while parsing.
    pub fn dropped_events(&self) -> usize {
        self.dropped
    }

    fn correlate(&mut self, events: &[MeasurementEvent], roles: &HashMap<CodeSection, SectionRole>) {
        let mut open_enters: HashMap<CodeSection, Vec<Option<Parameterisation>>> = HashMap::new();
        let mut loop_counters: HashMap<MeasurableElement, LoopCounter> = HashMap::new();

        for event in events {
            let Some(role) = roles.get(event.section()) else {
                self.drop_fact(format_args!(
                    "event for unknown section {}",
                    event.section()
                ));
                continue;
            };
            match event {
                MeasurementEvent::SectionEntered {
                    section,
                    parameterisation,
                } => {
                    open_enters
                        .entry(section.clone())
                        .or_default()
                        .push(parameterisation.clone());
                }
                MeasurementEvent::SectionLeft { section } => {
                    let Some(entered_with) =
                        open_enters.get_mut(section).and_then(Vec::pop)
                    else {
                        self.drop_fact(format_args!("left without enter for {section}"));
                        continue;
                    };
                    self.record_completed_pass(role, entered_with, &mut loop_counters);
                }
                MeasurementEvent::ResourceDemandCaptured {
                    section,
                    resource,
                    value,
                    parameterisation,
                } => {
                    let SectionRole::ResourceAction(element) = role else {
                        self.drop_fact(format_args!(
                            "demand captured for non-resource section {section}"
                        ));
                        continue;
                    };
                    match MeasurementResult::resource_demand(*value, resource.clone()) {
                        Ok(result) => self.push_result(
                            element.clone(),
                            result.with_parameterisation(parameterisation.clone()),
                        ),
                        Err(fault) => {
                            self.drop_fact(format_args!("{fault} (section {section})"))
                        }
                    }
                }
                MeasurementEvent::ParameterCaptured {
                    section,
                    value,
                    parameterisation,
                    ..
                } => {
                    let SectionRole::ParameterSite(element) = role else {
                        self.drop_fact(format_args!(
                            "parameter captured for non-parameter section {section}"
                        ));
                        continue;
                    };
                    self.push_result(
                        element.clone(),
                        MeasurementResult::parameter_value(value.clone())
                            .with_parameterisation(parameterisation.clone()),
                    );
                }
            }
        }

        // An enter never left is a partial pass, not a fact.
        for pending in open_enters.into_values() {
            for _ in pending {
                self.drop_fact(format_args!("section entered but never left"));
            }
        }
        // Body passes observed without a closing loop-statement visit still
        // witness repetitions; emit what was counted.
        for (owner, counter) in loop_counters {
            if counter.passes > 0 {
                self.emit_loop_repetition(owner, counter);
            }
        }
    }

    fn record_completed_pass(
        &mut self,
        role: &SectionRole,
        entered_with: Option<Parameterisation>,
        loop_counters: &mut HashMap<MeasurableElement, LoopCounter>,
    ) {
        match role {
            SectionRole::BranchAlternative(branch, index) => {
                self.push_result(
                    branch.clone(),
                    MeasurementResult::branch_decision(*index)
                        .with_parameterisation(entered_with),
                );
            }
            SectionRole::LoopBody(owner) => {
                let counter = loop_counters.entry(owner.clone()).or_default();
                counter.passes += 1;
                if counter.first_parameterisation.is_none() {
                    counter.first_parameterisation = entered_with;
                }
            }
            SectionRole::LoopStatement(owner) => {
                let mut counter = loop_counters.remove(owner).unwrap_or_default();
                if counter.first_parameterisation.is_none() {
                    counter.first_parameterisation = entered_with;
                }
                self.emit_loop_repetition(owner.clone(), counter);
            }
            // Resource sections yield facts via capture events only; inert
            // sections (branch statements) pair up without producing one.
            SectionRole::ResourceAction(_) | SectionRole::ParameterSite(_) | SectionRole::Inert => {}
        }
    }

    fn emit_loop_repetition(&mut self, owner: MeasurableElement, counter: LoopCounter) {
        self.push_result(
            owner,
            MeasurementResult::loop_repetition(counter.passes)
                .with_parameterisation(counter.first_parameterisation),
        );
    }

    fn push_result(&mut self, element: MeasurableElement, result: MeasurementResult) {
        self.results.entry(element).or_default().push_back(result);
    }

    fn drop_fact(&mut self, reason: std::fmt::Arguments<'_>) {
        warn!("dropping malformed measurement fact: {reason}");
        self.dropped += 1;
    }
}

/// Map every section the universe knows about to its role.
///
/// A section owned by several elements keeps the first role encountered;
/// universes are expected to keep sections disjoint.
fn section_roles(universe: &[MeasurableElement]) -> HashMap<CodeSection, SectionRole> {
    let mut roles = HashMap::new();
    for element in universe {
        match element {
            MeasurableElement::ResourceDemand { section, .. } => {
                roles
                    .entry(section.clone())
                    .or_insert_with(|| SectionRole::ResourceAction(element.clone()));
            }
            MeasurableElement::Branch {
                section,
                alternatives,
            } => {
                roles.entry(section.clone()).or_insert(SectionRole::Inert);
                for (index, alternative) in alternatives.iter().enumerate() {
                    roles
                        .entry(alternative.clone())
                        .or_insert_with(|| SectionRole::BranchAlternative(element.clone(), index));
                }
            }
            MeasurableElement::Loop { section, body } => {
                roles
                    .entry(section.clone())
                    .or_insert_with(|| SectionRole::LoopStatement(element.clone()));
                roles
                    .entry(body.clone())
                    .or_insert_with(|| SectionRole::LoopBody(element.clone()));
            }
            MeasurableElement::Parameter { section, .. } => {
                roles
                    .entry(section.clone())
                    .or_insert_with(|| SectionRole::ParameterSite(element.clone()));
            }
        }
    }
    roles
}
