use super::aggregator::{AggregateOp, Aggregator};
use super::operator::{BoxedOperator, OpIterator, Operator, OperatorState};
use super::rows::RowsIterator;
use crate::core::{Result, Row, Schema};

/// Aggregate - blocking operator computing one aggregate, optionally grouped.
///
/// `open` consumes the whole child before the first row is available.
/// `rewind` replays the computed groups without touching the child again.
pub struct Aggregate {
    child: BoxedOperator,
    aggregator: Aggregator,
    result: Option<RowsIterator>,
    state: OperatorState,
}

impl Aggregate {
    /// `InvalidArgument` if `op` is not valid for the aggregated field's type,
    /// `NoSuchElement` if a field index is out of range
    pub fn new(
        child: BoxedOperator,
        agg_field: usize,
        group_field: Option<usize>,
        op: AggregateOp,
    ) -> Result<Self> {
        let aggregator = Aggregator::new(child.schema(), group_field, agg_field, op)?;
        Ok(Self {
            child,
            aggregator,
            result: None,
            state: OperatorState::default(),
        })
    }

    #[must_use]
    pub const fn group_field(&self) -> Option<usize> {
        self.aggregator.group_field()
    }

    #[must_use]
    pub const fn aggregate_field(&self) -> usize {
        self.aggregator.agg_field()
    }

    #[must_use]
    pub const fn aggregate_op(&self) -> AggregateOp {
        self.aggregator.op()
    }

    /// Name of the grouping field in the child, if grouping and named
    #[must_use]
    pub fn group_field_name(&self) -> Option<&str> {
        let field = self.group_field()?;
        self.child.schema().field_name(field).ok().flatten()
    }

    #[must_use]
    pub fn aggregate_field_name(&self) -> Option<&str> {
        self.child
            .schema()
            .field_name(self.aggregate_field())
            .ok()
            .flatten()
    }

    #[must_use]
    pub fn into_child(self) -> BoxedOperator {
        self.child
    }

    pub fn with_child(self, child: BoxedOperator) -> Result<Self> {
        Self::new(child, self.aggregate_field(), self.group_field(), self.aggregate_op())
    }

    /// Drain the open child into the aggregator and build the result rows
    fn materialize(&mut self) -> Result<()> {
        while self.child.has_next()? {
            let row = self.child.next()?;
            self.aggregator.merge_row(&row)?;
        }

        let mut result = self.aggregator.iterator()?;
        result.open()?;
        tracing::trace!(groups = result.len(), "aggregate materialized");
        self.result = Some(result);
        Ok(())
    }
}

impl Operator for Aggregate {
    fn name(&self) -> &'static str {
        "aggregate"
    }

    fn state(&self) -> &OperatorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut OperatorState {
        &mut self.state
    }

    fn open_inner(&mut self) -> Result<()> {
        self.child.open()?;

        self.aggregator.clear();
        if let Err(e) = self.materialize() {
            // Leave the child closed so the operator can be opened again
            self.child.close();
            self.aggregator.clear();
            return Err(e);
        }
        Ok(())
    }

    fn fetch_next(&mut self) -> Result<Option<Row>> {
        let Some(result) = self.result.as_mut() else {
            return Ok(None);
        };
        if result.has_next()? {
            result.next().map(Some)
        } else {
            Ok(None)
        }
    }

    fn rewind_inner(&mut self) -> Result<()> {
        match self.result.as_mut() {
            Some(result) => result.rewind(),
            None => Ok(()),
        }
    }

    fn close_inner(&mut self) {
        self.child.close();
        if let Some(mut result) = self.result.take() {
            result.close();
        }
    }

    fn output_schema(&self) -> &Schema {
        self.aggregator.schema()
    }

    fn child_operators(&self) -> Vec<&dyn OpIterator> {
        vec![self.child.as_ref()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DataType, DatabaseError, Value};
    use crate::executor::operator::drain;

    /// Counts how often the wrapped child is opened and read
    struct CountingChild {
        inner: RowsIterator,
        opens: std::rc::Rc<std::cell::Cell<usize>>,
    }

    impl OpIterator for CountingChild {
        fn open(&mut self) -> Result<()> {
            self.opens.set(self.opens.get() + 1);
            self.inner.open()
        }
        fn has_next(&mut self) -> Result<bool> {
            self.inner.has_next()
        }
        fn next(&mut self) -> Result<Row> {
            self.inner.next()
        }
        fn rewind(&mut self) -> Result<()> {
            self.opens.set(self.opens.get() + 1);
            self.inner.rewind()
        }
        fn close(&mut self) {
            self.inner.close();
        }
        fn schema(&self) -> &Schema {
            self.inner.schema()
        }
        fn children(&self) -> Vec<&dyn OpIterator> {
            Vec::new()
        }
    }

    /// Fails with an abort on its second row while `armed` is set
    struct AbortingChild {
        inner: RowsIterator,
        armed: std::rc::Rc<std::cell::Cell<bool>>,
        served: usize,
    }

    impl OpIterator for AbortingChild {
        fn open(&mut self) -> Result<()> {
            self.served = 0;
            self.inner.open()
        }
        fn has_next(&mut self) -> Result<bool> {
            self.inner.has_next()
        }
        fn next(&mut self) -> Result<Row> {
            if self.armed.get() && self.served == 1 {
                return Err(DatabaseError::TransactionAborted(3, "lock wait timed out".to_string()));
            }
            self.served += 1;
            self.inner.next()
        }
        fn rewind(&mut self) -> Result<()> {
            self.served = 0;
            self.inner.rewind()
        }
        fn close(&mut self) {
            self.inner.close();
        }
        fn schema(&self) -> &Schema {
            self.inner.schema()
        }
        fn children(&self) -> Vec<&dyn OpIterator> {
            Vec::new()
        }
    }

    fn grouped_rows() -> RowsIterator {
        let schema = Schema::named(&[(DataType::Text, "g"), (DataType::Int, "v")]).unwrap();
        let rows = [("A", 3), ("B", 1), ("A", 5)]
            .iter()
            .map(|(g, v)| Row::new(vec![Value::from(*g), Value::Int(*v)]))
            .collect();
        RowsIterator::new(schema, rows).unwrap()
    }

    fn sorted_pairs(rows: &[Row]) -> Vec<(String, i32)> {
        let mut pairs: Vec<(String, i32)> = rows
            .iter()
            .map(|r| (r.values[0].as_text().unwrap().to_string(), r.values[1].as_int().unwrap()))
            .collect();
        pairs.sort();
        pairs
    }

    #[test]
    fn test_grouped_sum() {
        let mut agg =
            Aggregate::new(Box::new(grouped_rows()), 1, Some(0), AggregateOp::Sum).unwrap();
        agg.open().unwrap();

        let rows = drain(&mut agg).unwrap();
        assert_eq!(sorted_pairs(&rows), vec![("A".to_string(), 8), ("B".to_string(), 1)]);
    }

    #[test]
    fn test_ungrouped_count() {
        let mut agg =
            Aggregate::new(Box::new(grouped_rows()), 1, None, AggregateOp::Count).unwrap();
        agg.open().unwrap();

        let rows = drain(&mut agg).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values, vec![Value::Int(3)]);
    }

    #[test]
    fn test_rewind_does_not_reread_child() {
        let opens = std::rc::Rc::new(std::cell::Cell::new(0));
        let child = CountingChild {
            inner: grouped_rows(),
            opens: std::rc::Rc::clone(&opens),
        };
        let mut agg = Aggregate::new(Box::new(child), 1, Some(0), AggregateOp::Max).unwrap();

        agg.open().unwrap();
        let first = drain(&mut agg).unwrap();
        agg.rewind().unwrap();
        let second = drain(&mut agg).unwrap();

        assert_eq!(opens.get(), 1);
        assert_eq!(first, second);
        assert_eq!(sorted_pairs(&first), vec![("A".to_string(), 5), ("B".to_string(), 1)]);
    }

    #[test]
    fn test_reopen_recomputes() {
        let mut agg = Aggregate::new(Box::new(grouped_rows()), 1, None, AggregateOp::Sum).unwrap();
        agg.open().unwrap();
        assert_eq!(drain(&mut agg).unwrap()[0].values, vec![Value::Int(9)]);
        agg.close();

        agg.open().unwrap();
        assert_eq!(drain(&mut agg).unwrap()[0].values, vec![Value::Int(9)]);
    }

    #[test]
    fn test_failed_open_can_be_retried() {
        let armed = std::rc::Rc::new(std::cell::Cell::new(true));
        let child = AbortingChild {
            inner: grouped_rows(),
            armed: std::rc::Rc::clone(&armed),
            served: 0,
        };
        let mut agg = Aggregate::new(Box::new(child), 1, None, AggregateOp::Count).unwrap();

        let err = agg.open().unwrap_err();
        assert!(err.is_abort());
        assert!(matches!(agg.has_next(), Err(DatabaseError::NoSuchElement(_))));
        agg.close();

        armed.set(false);
        agg.open().unwrap();
        let rows = drain(&mut agg).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values, vec![Value::Int(3)]);
    }

    #[test]
    fn test_text_field_only_counts() {
        let err = Aggregate::new(Box::new(grouped_rows()), 0, None, AggregateOp::Sum)
            .err()
            .unwrap();
        assert!(matches!(err, DatabaseError::InvalidArgument(_)));

        let agg = Aggregate::new(Box::new(grouped_rows()), 0, None, AggregateOp::Count).unwrap();
        assert_eq!(agg.schema().num_fields(), 1);
    }

    #[test]
    fn test_introspection() {
        let agg = Aggregate::new(Box::new(grouped_rows()), 1, Some(0), AggregateOp::Avg).unwrap();
        assert_eq!(agg.group_field(), Some(0));
        assert_eq!(agg.aggregate_field(), 1);
        assert_eq!(agg.aggregate_op(), AggregateOp::Avg);
        assert_eq!(agg.group_field_name(), Some("g"));
        assert_eq!(agg.aggregate_field_name(), Some("v"));
        assert_eq!(agg.schema().field_name(1).unwrap(), Some("avg(v)"));
        assert_eq!(agg.children().len(), 1);
    }
}
