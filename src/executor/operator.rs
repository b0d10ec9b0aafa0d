//! Pull-based iterator protocol shared by every relational operator.
//!
//! An operator is either CLOSED or OPEN. `open` moves it to OPEN, `close`
//! back to CLOSED. While OPEN, `has_next`/`next` pull rows and `rewind`
//! restarts from the position of the most recent `open`.
//!
//! Implementors provide [`Operator`]; the public [`OpIterator`] surface,
//! including the one-row lookahead behind `has_next`, comes from the blanket
//! impl below. Using an operator while CLOSED, or opening it twice, fails
//! with `NoSuchElement`.

use crate::core::{DatabaseError, Result, Row, Schema};

/// Owned child of a composite operator
pub type BoxedOperator = Box<dyn OpIterator>;

pub trait OpIterator {
    fn open(&mut self) -> Result<()>;

    /// True while another row can be produced; may pull from children
    fn has_next(&mut self) -> Result<bool>;

    /// Next row; `NoSuchElement` once exhausted
    fn next(&mut self) -> Result<Row>;

    fn rewind(&mut self) -> Result<()>;

    /// Release resources; closing a CLOSED operator does nothing
    fn close(&mut self);

    fn schema(&self) -> &Schema;

    /// Direct children, left to right
    fn children(&self) -> Vec<&dyn OpIterator>;
}

/// Open flag plus the row fetched by `has_next` but not yet returned
#[derive(Debug, Default)]
pub struct OperatorState {
    open: bool,
    lookahead: Option<Row>,
}

impl OperatorState {
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open
    }

    fn check_open(&self, name: &str) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(DatabaseError::NoSuchElement(format!("{name} is not open")))
        }
    }
}

/// Hooks implemented by each operator
pub trait Operator {
    /// Short name used in logs and error messages
    fn name(&self) -> &'static str;

    fn state(&self) -> &OperatorState;
    fn state_mut(&mut self) -> &mut OperatorState;

    fn open_inner(&mut self) -> Result<()>;

    /// Produce the next row, or `None` when exhausted
    fn fetch_next(&mut self) -> Result<Option<Row>>;

    fn rewind_inner(&mut self) -> Result<()>;

    fn close_inner(&mut self);

    fn output_schema(&self) -> &Schema;

    fn child_operators(&self) -> Vec<&dyn OpIterator>;
}

impl<T: Operator> OpIterator for T {
    fn open(&mut self) -> Result<()> {
        if self.state().open {
            return Err(DatabaseError::NoSuchElement(format!("{} is already open", self.name())));
        }
        self.open_inner()?;

        let state = self.state_mut();
        state.open = true;
        state.lookahead = None;
        tracing::trace!(operator = self.name(), "opened");
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool> {
        self.state().check_open(self.name())?;
        if self.state().lookahead.is_none() {
            let row = self.fetch_next()?;
            self.state_mut().lookahead = row;
        }
        Ok(self.state().lookahead.is_some())
    }

    fn next(&mut self) -> Result<Row> {
        if !self.has_next()? {
            return Err(DatabaseError::NoSuchElement(format!("{} is exhausted", self.name())));
        }
        let name = self.name();
        self.state_mut()
            .lookahead
            .take()
            .ok_or_else(|| DatabaseError::NoSuchElement(format!("{name} is exhausted")))
    }

    fn rewind(&mut self) -> Result<()> {
        self.state().check_open(self.name())?;
        self.rewind_inner()?;
        self.state_mut().lookahead = None;
        Ok(())
    }

    fn close(&mut self) {
        if !self.state().open {
            return;
        }
        self.close_inner();

        let state = self.state_mut();
        state.open = false;
        state.lookahead = None;
        tracing::trace!(operator = self.name(), "closed");
    }

    fn schema(&self) -> &Schema {
        self.output_schema()
    }

    fn children(&self) -> Vec<&dyn OpIterator> {
        self.child_operators()
    }
}

/// Pull every remaining row out of an open operator
pub fn drain(op: &mut dyn OpIterator) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    while op.has_next()? {
        rows.push(op.next()?);
    }
    Ok(rows)
}
