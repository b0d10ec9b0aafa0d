use super::conditions::Predicate;
use super::operator::{BoxedOperator, OpIterator, Operator, OperatorState};
use crate::core::{Result, Row, Schema};

/// Filter - passes through the child rows the predicate accepts, in order
pub struct Filter {
    predicate: Predicate,
    child: BoxedOperator,
    state: OperatorState,
}

impl Filter {
    /// Fails with `NoSuchElement` if the predicate's field is out of range
    pub fn new(predicate: Predicate, child: BoxedOperator) -> Result<Self> {
        child.schema().field(predicate.field)?;
        Ok(Self {
            predicate,
            child,
            state: OperatorState::default(),
        })
    }

    #[must_use]
    pub const fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Take the child back, e.g. to rebuild the plan around a new one
    #[must_use]
    pub fn into_child(self) -> BoxedOperator {
        self.child
    }

    /// Same filter over a different child
    pub fn with_child(self, child: BoxedOperator) -> Result<Self> {
        Self::new(self.predicate, child)
    }
}

impl Operator for Filter {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn state(&self) -> &OperatorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OperatorState {
        &mut self.state
    }

    fn open_inner(&mut self) -> Result<()> {
        self.child.open()
    }

    fn fetch_next(&mut self) -> Result<Option<Row>> {
        while self.child.has_next()? {
            let row = self.child.next()?;
            if self.predicate.filter(&row)? {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn rewind_inner(&mut self) -> Result<()> {
        self.child.rewind()
    }

    fn close_inner(&mut self) {
        self.child.close();
    }

    fn output_schema(&self) -> &Schema {
        self.child.schema()
    }

    fn child_operators(&self) -> Vec<&dyn OpIterator> {
        vec![self.child.as_ref()]
    }
}
