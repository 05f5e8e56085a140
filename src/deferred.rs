//! Settle-once completion cells shared between a producer and its waiters

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::ViewError;

/// A completion signal that is resolved or rejected exactly once.
///
/// Clones share the same cell, so a view can hand out its readiness signal
/// and later settle it from its own poll loop.
#[derive(Debug)]
pub struct Deferred<T: Clone> {
    cell: Rc<RefCell<Option<Result<T, ViewError>>>>,
}

impl<T: Clone> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<T: Clone> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Deferred<T> {
    pub fn new() -> Self {
        Self {
            cell: Rc::new(RefCell::new(None)),
        }
    }

    pub fn resolved(value: T) -> Self {
        let deferred = Self::new();
        deferred.resolve(value);
        deferred
    }

    /// Returns false when the cell was already settled
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Returns false when the cell was already settled
    pub fn reject(&self, err: ViewError) -> bool {
        self.settle(Err(err))
    }

    fn settle(&self, outcome: Result<T, ViewError>) -> bool {
        let mut cell = self.cell.borrow_mut();
        if cell.is_some() {
            return false;
        }
        *cell = Some(outcome);
        true
    }

    pub fn is_settled(&self) -> bool {
        self.cell.borrow().is_some()
    }

    pub fn is_resolved(&self) -> bool {
        matches!(*self.cell.borrow(), Some(Ok(_)))
    }

    pub fn outcome(&self) -> Option<Result<T, ViewError>> {
        self.cell.borrow().clone()
    }

    pub fn value(&self) -> Option<T> {
        self.outcome().and_then(Result::ok)
    }

    pub fn error(&self) -> Option<ViewError> {
        self.outcome().and_then(Result::err)
    }

    /// True when both handles point at the same cell
    pub fn same_as(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}
