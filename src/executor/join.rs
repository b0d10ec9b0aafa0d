use super::conditions::JoinPredicate;
use super::operator::{BoxedOperator, OpIterator, Operator, OperatorState};
use crate::core::{DatabaseError, Result, Row, Schema};

/// Nested-loop join.
///
/// For every left (outer) row the right (inner) child is scanned in full;
/// each matching pair is emitted as the left values followed by the right
/// values. The current outer row is kept between calls, so the inner scan
/// resumes where the previous match left off.
pub struct Join {
    predicate: JoinPredicate,
    left: BoxedOperator,
    right: BoxedOperator,
    schema: Schema,
    /// Outer row whose inner scan is in progress
    outer: Option<Row>,
    state: OperatorState,
}

impl Join {
    /// Fails with `NoSuchElement` for an out-of-range join field and with
    /// `SchemaMismatch` when the two join fields have different types
    pub fn new(
        predicate: JoinPredicate,
        left: BoxedOperator,
        right: BoxedOperator,
    ) -> Result<Self> {
        let left_type = left.schema().field_type(predicate.field1)?;
        let right_type = right.schema().field_type(predicate.field2)?;
        if left_type != right_type {
            return Err(DatabaseError::SchemaMismatch(format!(
                "join compares {left_type} with {right_type}"
            )));
        }

        let schema = Schema::merge(left.schema(), right.schema());
        Ok(Self {
            predicate,
            left,
            right,
            schema,
            outer: None,
            state: OperatorState::default(),
        })
    }

    #[must_use]
    pub const fn predicate(&self) -> &JoinPredicate {
        &self.predicate
    }

    /// Names of the left and right join fields
    #[must_use]
    pub fn join_field_names(&self) -> (Option<&str>, Option<&str>) {
        let left = self
            .left
            .schema()
            .field_name(self.predicate.field1)
            .ok()
            .flatten();
        let right = self
            .right
            .schema()
            .field_name(self.predicate.field2)
            .ok()
            .flatten();
        (left, right)
    }

    /// Take both children back as `(left, right)`
    #[must_use]
    pub fn into_children(self) -> (BoxedOperator, BoxedOperator) {
        (self.left, self.right)
    }

    pub fn with_children(self, left: BoxedOperator, right: BoxedOperator) -> Result<Self> {
        Self::new(self.predicate, left, right)
    }
}

impl Operator for Join {
    fn name(&self) -> &'static str {
        "join"
    }

    fn state(&self) -> &OperatorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OperatorState {
        &mut self.state
    }

    fn open_inner(&mut self) -> Result<()> {
        self.left.open()?;
        if let Err(e) = self.right.open() {
            self.left.close();
            return Err(e);
        }
        self.outer = None;
        Ok(())
    }

    fn fetch_next(&mut self) -> Result<Option<Row>> {
        loop {
            if self.outer.is_none() {
                if !self.left.has_next()? {
                    return Ok(None);
                }
                self.outer = Some(self.left.next()?);
            }

            if let Some(outer) = &self.outer {
                while self.right.has_next()? {
                    let inner = self.right.next()?;
                    if self.predicate.filter(outer, &inner)? {
                        return Ok(Some(Row::concat(outer, &inner)));
                    }
                }
            }

            // Inner side exhausted for this outer row
            self.outer = None;
            self.right.rewind()?;
        }
    }

    fn rewind_inner(&mut self) -> Result<()> {
        self.left.rewind()?;
        self.right.rewind()?;
        self.outer = None;
        Ok(())
    }

    fn close_inner(&mut self) {
        self.left.close();
        self.right.close();
        self.outer = None;
    }

    fn output_schema(&self) -> &Schema {
        &self.schema
    }

    fn child_operators(&self) -> Vec<&dyn OpIterator> {
        vec![self.left.as_ref(), self.right.as_ref()]
    }
}
