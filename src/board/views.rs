//! Capability-scoped views over a shared board.
//!
//! Contributors receive a [`ReadOnlyView`] while deciding whether to act and
//! a [`ReadWriteView`] while acting. Both are thin wrappers over the same
//! `Arc<RwLock<Board>>`; equality and hashing go by board identity, so two
//! views are interchangeable keys exactly when they expose the same board.

use super::{Board, BoardError, BoardParticipant};
use crate::expression::ExprRef;
use crate::fitness::FitnessFunction;
use crate::measurement::results::MeasurementResult;
use crate::measurement::MeasurableElement;
use im::{OrdSet, Vector};
use parking_lot::RwLock;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Shared ownership of a live board.
pub type BoardHandle = Arc<RwLock<Board>>;

/// Wrap a freshly seeded board for sharing.
pub fn share(board: Board) -> BoardHandle {
    Arc::new(RwLock::new(board))
}

macro_rules! view_identity {
    ($view:ident) => {
        impl Clone for $view {
            fn clone(&self) -> Self {
                Self {
                    board: Arc::clone(&self.board),
                }
            }
        }

        impl PartialEq for $view {
            fn eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.board, &other.board)
            }
        }

        impl Eq for $view {}

        impl Hash for $view {
            fn hash<H: Hasher>(&self, state: &mut H) {
                (Arc::as_ptr(&self.board) as usize).hash(state);
            }
        }

        impl fmt::Debug for $view {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($view))
                    .field("board", &Arc::as_ptr(&self.board))
                    .finish()
            }
        }
    };
}

macro_rules! kind_queries {
    ($($method:ident),+ $(,)?) => {
        $(
            pub fn $method(&self) -> OrdSet<MeasurableElement> {
                self.board.read().$method()
            }
        )+
    };
}

/// Inspection capability only. Everything it returns is a snapshot.
pub struct ReadOnlyView {
    board: BoardHandle,
}

view_identity!(ReadOnlyView);

impl ReadOnlyView {
    pub fn new(board: BoardHandle) -> Self {
        Self { board }
    }

    pub fn universe(&self) -> OrdSet<MeasurableElement> {
        self.board.read().universe()
    }

    pub fn contains(&self, element: &MeasurableElement) -> bool {
        self.board.read().contains(element)
    }

    pub fn results_for(
        &self,
        element: &MeasurableElement,
    ) -> Result<Vector<MeasurementResult>, BoardError> {
        self.board.read().results_for(element)
    }

    pub fn proposals_for(
        &self,
        element: &MeasurableElement,
    ) -> Result<Vector<ExprRef>, BoardError> {
        self.board.read().proposals_for(element)
    }

    pub fn open_questions(&self) -> OrdSet<MeasurableElement> {
        self.board.read().open_questions()
    }

    kind_queries!(
        all_rdseffs,
        all_branches,
        all_loops,
        all_parameters,
        rdseffs_to_be_measured,
        branches_to_be_measured,
        loops_to_be_measured,
        parameters_to_be_measured,
    );

    pub fn is_open(&self, element: &MeasurableElement) -> bool {
        self.board.read().is_open(element)
    }

    pub fn fitness(&self) -> Arc<dyn FitnessFunction> {
        self.board.read().fitness()
    }

    pub fn slot<P: BoardParticipant + 'static>(&self) -> Option<P::Slot> {
        self.board.read().slot::<P>()
    }
}

/// Inspection plus mutation capability.
pub struct ReadWriteView {
    board: BoardHandle,
}

view_identity!(ReadWriteView);

impl ReadWriteView {
    pub fn new(board: BoardHandle) -> Self {
        Self { board }
    }

    /// The same board, without the write capability.
    pub fn as_read_only(&self) -> ReadOnlyView {
        ReadOnlyView::new(Arc::clone(&self.board))
    }

    pub fn universe(&self) -> OrdSet<MeasurableElement> {
        self.board.read().universe()
    }

    pub fn results_for(
        &self,
        element: &MeasurableElement,
    ) -> Result<Vector<MeasurementResult>, BoardError> {
        self.board.read().results_for(element)
    }

    pub fn proposals_for(
        &self,
        element: &MeasurableElement,
    ) -> Result<Vector<ExprRef>, BoardError> {
        self.board.read().proposals_for(element)
    }

    pub fn open_questions(&self) -> OrdSet<MeasurableElement> {
        self.board.read().open_questions()
    }

    kind_queries!(
        all_rdseffs,
        all_branches,
        all_loops,
        all_parameters,
        rdseffs_to_be_measured,
        branches_to_be_measured,
        loops_to_be_measured,
        parameters_to_be_measured,
    );

    pub fn is_open(&self, element: &MeasurableElement) -> bool {
        self.board.read().is_open(element)
    }

    pub fn fitness(&self) -> Arc<dyn FitnessFunction> {
        self.board.read().fitness()
    }

    pub fn add_results<I>(
        &self,
        element: &MeasurableElement,
        results: I,
    ) -> Result<(), BoardError>
    where
        I: IntoIterator<Item = MeasurementResult>,
    {
        self.board.write().add_results(element, results)
    }

    pub fn add_proposal(
        &self,
        element: &MeasurableElement,
        proposal: ExprRef,
    ) -> Result<(), BoardError> {
        self.board.write().add_proposal(element, proposal)
    }

    pub fn close_question(&self, element: &MeasurableElement) -> Result<(), BoardError> {
        self.board.write().close_question(element)
    }

    pub fn reopen_question(&self, element: &MeasurableElement) -> Result<(), BoardError> {
        self.board.write().reopen_question(element)
    }

    pub fn add_to_be_measured<'a, I>(&self, elements: I) -> Result<(), BoardError>
    where
        I: IntoIterator<Item = &'a MeasurableElement>,
    {
        self.board.write().add_to_be_measured(elements)
    }

    pub fn slot<P: BoardParticipant + 'static>(&self) -> Option<P::Slot> {
        self.board.read().slot::<P>()
    }

    pub fn store_slot<P: BoardParticipant + 'static>(&self, value: P::Slot) {
        self.board.write().store_slot::<P>(value);
    }

    pub fn clear_slot<P: BoardParticipant + 'static>(&self) {
        self.board.write().clear_slot::<P>();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::results::ResourceType;
    use crate::measurement::CodeSection;
    use pretty_assertions::assert_eq;

    fn element() -> MeasurableElement {
        MeasurableElement::ResourceDemand {
            section: CodeSection::new("src/lib.rs", 1, 9),
            resource: ResourceType::Cpu,
        }
    }

    fn shared_board() -> BoardHandle {
        share(Board::new(vec![element()]))
    }

    #[test]
    fn views_over_the_same_board_are_equal() {
        let handle = shared_board();
        let a = ReadOnlyView::new(Arc::clone(&handle));
        let b = ReadOnlyView::new(Arc::clone(&handle));
        assert_eq!(a, b);

        let other = shared_board();
        let c = ReadOnlyView::new(other);
        assert_ne!(a, c);
    }

    #[test]
    fn writes_through_one_view_are_visible_through_another() {
        let handle = shared_board();
        let writer = ReadWriteView::new(Arc::clone(&handle));
        let reader = ReadOnlyView::new(handle);

        writer
            .add_results(
                &element(),
                vec![MeasurementResult::resource_demand(2.5, ResourceType::Cpu).unwrap()],
            )
            .unwrap();
        assert_eq!(reader.results_for(&element()).unwrap().len(), 1);
    }

    #[test]
    fn views_expose_the_kind_scoped_worklist() {
        let handle = shared_board();
        let writer = ReadWriteView::new(Arc::clone(&handle));
        let reader = ReadOnlyView::new(handle);

        assert_eq!(reader.all_rdseffs().len(), 1);
        writer.close_question(&element()).unwrap();
        assert!(reader.rdseffs_to_be_measured().is_empty());

        writer.add_to_be_measured([&element()]).unwrap();
        assert_eq!(reader.rdseffs_to_be_measured().len(), 1);
    }

    #[test]
    fn read_write_view_downgrades_to_the_same_board() {
        let handle = shared_board();
        let writer = ReadWriteView::new(Arc::clone(&handle));
        let reader = writer.as_read_only();
        assert_eq!(reader, ReadOnlyView::new(handle));
    }
}
