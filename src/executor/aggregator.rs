//! Grouped aggregation state.
//!
//! An [`Aggregator`] consumes rows one at a time with [`Aggregator::merge_row`]
//! and keeps a running value and count per group. Nothing is finalized until
//! [`Aggregator::iterator`] materializes one output row per group: AVG is
//! divided (truncating toward zero) only there.
//!
//! The backend is picked from the aggregated field's type. INT fields get the
//! numeric backend (MIN, MAX, SUM, AVG, COUNT); TEXT fields get the comparable
//! backend, which only counts.

use std::collections::HashMap;

use super::rows::RowsIterator;
use crate::core::{DataType, DatabaseError, Field, Result, Row, Schema, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

impl std::fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Min => "min",
            Self::Max => "max",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Count => "count",
        };
        write!(f, "{name}")
    }
}

/// Key of one aggregation group
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Value(Value),
    /// The single group used when no grouping field is set
    NoGrouping,
}

#[derive(Debug, Clone, Copy)]
struct Accumulator {
    value: i64,
    count: i64,
}

/// Accumulators in first-seen group order
#[derive(Debug, Default)]
struct GroupTable {
    keys: Vec<GroupKey>,
    accumulators: HashMap<GroupKey, Accumulator>,
}

impl GroupTable {
    fn entry(&mut self, key: GroupKey, init: impl FnOnce() -> Accumulator) -> &mut Accumulator {
        if !self.accumulators.contains_key(&key) {
            self.keys.push(key.clone());
        }
        self.accumulators.entry(key).or_insert_with(init)
    }

    fn iter(&self) -> impl Iterator<Item = (&GroupKey, &Accumulator)> {
        self.keys
            .iter()
            .filter_map(|key| self.accumulators.get(key).map(|acc| (key, acc)))
    }

    fn clear(&mut self) {
        self.keys.clear();
        self.accumulators.clear();
    }
}

/// Where the aggregator reads its input and what it produces
#[derive(Debug, Clone)]
struct AggregateSpec {
    group_field: Option<usize>,
    agg_field: usize,
    op: AggregateOp,
    output: Schema,
}

impl AggregateSpec {
    fn group_key(&self, row: &Row) -> Result<GroupKey> {
        match self.group_field {
            Some(field) => Ok(GroupKey::Value(row.get(field)?.clone())),
            None => Ok(GroupKey::NoGrouping),
        }
    }

    fn output_row(&self, key: &GroupKey, aggregate: i64) -> Result<Row> {
        let aggregate = i32::try_from(aggregate).map_err(|_| {
            DatabaseError::InvalidArgument(format!(
                "{} result {aggregate} does not fit in INT",
                self.op
            ))
        })?;
        let values = match key {
            GroupKey::Value(group) => vec![group.clone(), Value::Int(aggregate)],
            GroupKey::NoGrouping => vec![Value::Int(aggregate)],
        };
        Ok(Row::new(values))
    }
}

/// Aggregation over INT values
#[derive(Debug)]
pub struct NumericAggregator {
    spec: AggregateSpec,
    groups: GroupTable,
}

impl NumericAggregator {
    fn merge_row(&mut self, row: &Row) -> Result<()> {
        let key = self.spec.group_key(row)?;
        let value = row.get(self.spec.agg_field)?.as_int().ok_or_else(|| {
            DatabaseError::SchemaMismatch("aggregated field is not INT".to_string())
        })?;
        let value = i64::from(value);

        let op = self.spec.op;
        let acc = self.groups.entry(key, || Accumulator {
            value: match op {
                AggregateOp::Min => i64::from(i32::MAX),
                AggregateOp::Max => i64::from(i32::MIN),
                AggregateOp::Sum | AggregateOp::Avg | AggregateOp::Count => 0,
            },
            count: 0,
        });

        acc.count += 1;
        match op {
            AggregateOp::Min => acc.value = acc.value.min(value),
            AggregateOp::Max => acc.value = acc.value.max(value),
            AggregateOp::Sum | AggregateOp::Avg => acc.value += value,
            AggregateOp::Count => acc.value += 1,
        }
        Ok(())
    }

    fn finalize(&self, acc: &Accumulator) -> i64 {
        match self.spec.op {
            AggregateOp::Avg => acc.value / acc.count,
            _ => acc.value,
        }
    }
}

/// Aggregation over values that can only be compared; supports COUNT
#[derive(Debug)]
pub struct ComparableAggregator {
    spec: AggregateSpec,
    groups: GroupTable,
}

impl ComparableAggregator {
    fn merge_row(&mut self, row: &Row) -> Result<()> {
        let key = self.spec.group_key(row)?;
        row.get(self.spec.agg_field)?;
        let acc = self.groups.entry(key, || Accumulator { value: 0, count: 0 });
        acc.count += 1;
        Ok(())
    }
}

#[derive(Debug)]
pub enum Aggregator {
    Numeric(NumericAggregator),
    Comparable(ComparableAggregator),
}

impl Aggregator {
    /// Aggregate field `agg_field` of rows shaped like `input`, grouped by
    /// `group_field` when given.
    ///
    /// Fails with `NoSuchElement` for out-of-range fields and with
    /// `InvalidArgument` when a TEXT field is asked for anything but COUNT.
    pub fn new(
        input: &Schema,
        group_field: Option<usize>,
        agg_field: usize,
        op: AggregateOp,
    ) -> Result<Self> {
        let agg = input.field(agg_field)?;
        let mut fields = Vec::with_capacity(2);
        if let Some(group_field) = group_field {
            fields.push(input.field(group_field)?.clone());
        }
        let agg_name = agg.name.as_ref().map(|name| format!("{op}({name})"));
        fields.push(Field::new(DataType::Int, agg_name.as_deref()));

        let spec = AggregateSpec {
            group_field,
            agg_field,
            op,
            output: Schema::new(fields)?,
        };

        if agg.data_type.is_numeric() {
            Ok(Self::Numeric(NumericAggregator {
                spec,
                groups: GroupTable::default(),
            }))
        } else if op == AggregateOp::Count {
            Ok(Self::Comparable(ComparableAggregator {
                spec,
                groups: GroupTable::default(),
            }))
        } else {
            Err(DatabaseError::InvalidArgument(format!(
                "{op} is not supported on {} fields",
                agg.data_type
            )))
        }
    }

    const fn spec(&self) -> &AggregateSpec {
        match self {
            Self::Numeric(agg) => &agg.spec,
            Self::Comparable(agg) => &agg.spec,
        }
    }

    /// Shape of the materialized rows: `(group?, aggregate INT)`
    #[must_use]
    pub const fn schema(&self) -> &Schema {
        &self.spec().output
    }

    #[must_use]
    pub const fn op(&self) -> AggregateOp {
        self.spec().op
    }

    #[must_use]
    pub const fn group_field(&self) -> Option<usize> {
        self.spec().group_field
    }

    #[must_use]
    pub const fn agg_field(&self) -> usize {
        self.spec().agg_field
    }

    /// Fold one input row into its group
    pub fn merge_row(&mut self, row: &Row) -> Result<()> {
        match self {
            Self::Numeric(agg) => agg.merge_row(row),
            Self::Comparable(agg) => agg.merge_row(row),
        }
    }

    /// Forget every group seen so far
    pub fn clear(&mut self) {
        match self {
            Self::Numeric(agg) => agg.groups.clear(),
            Self::Comparable(agg) => agg.groups.clear(),
        }
    }

    /// Materialize one row per group
    pub fn iterator(&self) -> Result<RowsIterator> {
        let spec = self.spec();
        let rows = match self {
            Self::Numeric(agg) => agg
                .groups
                .iter()
                .map(|(key, acc)| spec.output_row(key, agg.finalize(acc)))
                .collect::<Result<Vec<_>>>()?,
            Self::Comparable(agg) => agg
                .groups
                .iter()
                .map(|(key, acc)| spec.output_row(key, acc.count))
                .collect::<Result<Vec<_>>>()?,
        };
        RowsIterator::new(spec.output.clone(), rows)
    }
}
