//! The shared blackboard all analysis participants work against.
//!
//! The board owns the element universe, per-element measurement results,
//! per-element expression proposals, the open-questions worklist, and a
//! typed side channel for participant-private state. Persistent collections
//! back every read: snapshot accessors hand out structurally shared copies,
//! so no caller can mutate board state behind the board's back, and taking
//! a snapshot costs pointer copies, not deep clones.
//!
//! Capability scoping lives in [`views`]: contributors never touch `Board`
//! directly, only a [`views::ReadOnlyView`] or [`views::ReadWriteView`]
//! wrapping the shared handle.

pub mod views;

pub use views::{BoardHandle, ReadOnlyView, ReadWriteView};

use crate::expression::ExprRef;
use crate::fitness::{FitnessFunction, MeanSquaredError};
use crate::measurement::results::MeasurementResult;
use crate::measurement::{ElementKind, MeasurableElement};
use im::{HashMap as ImHashMap, OrdSet, Vector};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    /// The element was never seeded into the universe.
    #[error("element {id} is not part of the analysed universe")]
    UnknownElement { id: String },
}

/// A participant that stows private state in the board's side channel.
///
/// The associated `Slot` type is the participant's whole stored state; the
/// board keys it by the participant type, so two participants of the same
/// type share one slot.
pub trait BoardParticipant {
    type Slot: Clone + Send + Sync + 'static;
}

pub struct Board {
    universe: OrdSet<MeasurableElement>,
    results: ImHashMap<MeasurableElement, Vector<MeasurementResult>>,
    proposals: ImHashMap<MeasurableElement, Vector<ExprRef>>,
    open_questions: OrdSet<MeasurableElement>,
    side_channel: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    fitness: Arc<dyn FitnessFunction>,
}

fn of_kind(set: &OrdSet<MeasurableElement>, kind: ElementKind) -> OrdSet<MeasurableElement> {
    set.iter()
        .filter(|element| element.kind() == kind)
        .cloned()
        .collect()
}

impl Board {
    /// Seed a board with the element universe, graded by mean squared
    /// error. Every element starts as an open question with no results and
    /// no proposals.
    pub fn new<I>(universe: I) -> Self
    where
        I: IntoIterator<Item = MeasurableElement>,
    {
        Self::with_fitness(universe, Arc::new(MeanSquaredError))
    }

    /// Seed a board that grades proposals with a caller-chosen fitness
    /// function.
    pub fn with_fitness<I>(universe: I, fitness: Arc<dyn FitnessFunction>) -> Self
    where
        I: IntoIterator<Item = MeasurableElement>,
    {
        let universe: OrdSet<MeasurableElement> = universe.into_iter().collect();
        let open_questions = universe.clone();
        Self {
            universe,
            results: ImHashMap::new(),
            proposals: ImHashMap::new(),
            open_questions,
            side_channel: HashMap::new(),
            fitness,
        }
    }

    /// The fitness function every grader of this board's proposals uses.
    pub fn fitness(&self) -> Arc<dyn FitnessFunction> {
        Arc::clone(&self.fitness)
    }

    pub fn universe(&self) -> OrdSet<MeasurableElement> {
        self.universe.clone()
    }

    pub fn contains(&self, element: &MeasurableElement) -> bool {
        self.universe.contains(element)
    }

    pub fn all_rdseffs(&self) -> OrdSet<MeasurableElement> {
        of_kind(&self.universe, ElementKind::ResourceDemand)
    }

    pub fn all_branches(&self) -> OrdSet<MeasurableElement> {
        of_kind(&self.universe, ElementKind::Branch)
    }

    pub fn all_loops(&self) -> OrdSet<MeasurableElement> {
        of_kind(&self.universe, ElementKind::Loop)
    }

    pub fn all_parameters(&self) -> OrdSet<MeasurableElement> {
        of_kind(&self.universe, ElementKind::Parameter)
    }

    pub fn rdseffs_to_be_measured(&self) -> OrdSet<MeasurableElement> {
        of_kind(&self.open_questions, ElementKind::ResourceDemand)
    }

    pub fn branches_to_be_measured(&self) -> OrdSet<MeasurableElement> {
        of_kind(&self.open_questions, ElementKind::Branch)
    }

    pub fn loops_to_be_measured(&self) -> OrdSet<MeasurableElement> {
        of_kind(&self.open_questions, ElementKind::Loop)
    }

    pub fn parameters_to_be_measured(&self) -> OrdSet<MeasurableElement> {
        of_kind(&self.open_questions, ElementKind::Parameter)
    }

    /// Flag `elements` for (re)measurement. Validates the whole batch
    /// first, so an unknown element leaves nothing flagged.
    pub fn add_to_be_measured<'a, I>(&mut self, elements: I) -> Result<(), BoardError>
    where
        I: IntoIterator<Item = &'a MeasurableElement>,
    {
        let elements: Vec<&MeasurableElement> = elements.into_iter().collect();
        for element in &elements {
            self.require_known(element)?;
        }
        for element in elements {
            self.open_questions.insert(element.clone());
        }
        Ok(())
    }

    fn require_known(&self, element: &MeasurableElement) -> Result<(), BoardError> {
        if self.contains(element) {
            Ok(())
        } else {
            Err(BoardError::UnknownElement { id: element.id() })
        }
    }

    /// Snapshot of the results recorded for `element`; empty for a known
    /// element without measurements.
    pub fn results_for(
        &self,
        element: &MeasurableElement,
    ) -> Result<Vector<MeasurementResult>, BoardError> {
        self.require_known(element)?;
        Ok(self.results.get(element).cloned().unwrap_or_default())
    }

    pub fn add_results<I>(
        &mut self,
        element: &MeasurableElement,
        new_results: I,
    ) -> Result<(), BoardError>
    where
        I: IntoIterator<Item = MeasurementResult>,
    {
        self.require_known(element)?;
        let slot = self
            .results
            .entry(element.clone())
            .or_insert_with(Vector::new);
        slot.extend(new_results);
        Ok(())
    }

    /// Snapshot of the proposals recorded for `element`.
    pub fn proposals_for(
        &self,
        element: &MeasurableElement,
    ) -> Result<Vector<ExprRef>, BoardError> {
        self.require_known(element)?;
        Ok(self.proposals.get(element).cloned().unwrap_or_default())
    }

    pub fn add_proposal(
        &mut self,
        element: &MeasurableElement,
        proposal: ExprRef,
    ) -> Result<(), BoardError> {
        self.require_known(element)?;
        self.proposals
            .entry(element.clone())
            .or_insert_with(Vector::new)
            .push_back(proposal);
        Ok(())
    }

    pub fn open_questions(&self) -> OrdSet<MeasurableElement> {
        self.open_questions.clone()
    }

    pub fn is_open(&self, element: &MeasurableElement) -> bool {
        self.open_questions.contains(element)
    }

    /// Mark `element` answered. Idempotent for already-closed elements.
    pub fn close_question(&mut self, element: &MeasurableElement) -> Result<(), BoardError> {
        self.require_known(element)?;
        self.open_questions.remove(element);
        Ok(())
    }

    /// Reopen `element`, e.g. after new measurements invalidate proposals.
    pub fn reopen_question(&mut self, element: &MeasurableElement) -> Result<(), BoardError> {
        self.require_known(element)?;
        self.open_questions.insert(element.clone());
        Ok(())
    }

    /// Participant-private state, if the participant stored any.
    pub fn slot<P: BoardParticipant + 'static>(&self) -> Option<P::Slot> {
        self.side_channel
            .get(&TypeId::of::<P>())
            .and_then(|boxed| boxed.downcast_ref::<P::Slot>())
            .cloned()
    }

    pub fn store_slot<P: BoardParticipant + 'static>(&mut self, value: P::Slot) {
        self.side_channel
            .insert(TypeId::of::<P>(), Box::new(value));
    }

    pub fn clear_slot<P: BoardParticipant + 'static>(&mut self) {
        self.side_channel.remove(&TypeId::of::<P>());
    }
}
