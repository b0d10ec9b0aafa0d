use super::operator::{OpIterator, Operator, OperatorState};
use crate::core::{Result, Row, Schema};

/// Operator over rows already held in memory
pub struct RowsIterator {
    schema: Schema,
    rows: Vec<Row>,
    cursor: usize,
    state: OperatorState,
}

impl RowsIterator {
    /// Every row must conform to `schema`
    pub fn new(schema: Schema, rows: Vec<Row>) -> Result<Self> {
        for row in &rows {
            row.check_schema(&schema)?;
        }
        Ok(Self {
            schema,
            rows,
            cursor: 0,
            state: OperatorState::default(),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Operator for RowsIterator {
    fn name(&self) -> &'static str {
        "rows"
    }

    fn state(&self) -> &OperatorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OperatorState {
        &mut self.state
    }

    fn open_inner(&mut self) -> Result<()> {
        self.cursor = 0;
        Ok(())
    }

    fn fetch_next(&mut self) -> Result<Option<Row>> {
        let row = self.rows.get(self.cursor).cloned();
        if row.is_some() {
            self.cursor += 1;
        }
        Ok(row)
    }

    fn rewind_inner(&mut self) -> Result<()> {
        self.cursor = 0;
        Ok(())
    }

    fn close_inner(&mut self) {}

    fn output_schema(&self) -> &Schema {
        &self.schema
    }

    fn child_operators(&self) -> Vec<&dyn OpIterator> {
        Vec::new()
    }
}
