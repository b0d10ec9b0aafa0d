//! Executor module - pull-based relational operators
//!
//! Structure:
//! - operator: the open/has_next/next/rewind/close protocol
//! - rows, seq_scan: leaf operators (in-memory rows, heap file scan)
//! - conditions: predicates used by Filter and Join
//! - filter, join: row selection and nested-loop join
//! - aggregator, aggregate: grouped MIN/MAX/SUM/AVG/COUNT
//! - dml: INSERT/DELETE through the page cache

pub mod operator;
pub mod rows;
pub mod seq_scan;
pub mod conditions;
pub mod filter;
pub mod join;
pub mod aggregator;
pub mod aggregate;
pub mod dml;

pub use operator::{drain, BoxedOperator, OpIterator, Operator, OperatorState};
pub use rows::RowsIterator;
pub use seq_scan::SeqScan;
pub use conditions::{CompareOp, JoinPredicate, Predicate};
pub use filter::Filter;
pub use join::Join;
pub use aggregator::{AggregateOp, Aggregator, GroupKey};
pub use aggregate::Aggregate;
pub use dml::{Delete, Insert};
