use super::error::{DatabaseError, Result};
use super::schema::Schema;
use super::value::Value;
use crate::storage::page::RecordId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Row {
    pub values: Vec<Value>,
    /// Page and slot this row was read from (set by storage, used by DELETE)
    pub record_id: Option<RecordId>,
}

impl Row {
    pub const fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            record_id: None,
        }
    }

    /// Build a row, checking arity and field types against `schema`
    pub fn conforming(schema: &Schema, values: Vec<Value>) -> Result<Self> {
        let row = Self::new(values);
        row.check_schema(schema)?;
        Ok(row)
    }

    #[must_use]
    pub const fn with_record_id(mut self, record_id: RecordId) -> Self {
        self.record_id = Some(record_id);
        self
    }

    pub fn check_schema(&self, schema: &Schema) -> Result<()> {
        if self.values.len() != schema.num_fields() {
            return Err(DatabaseError::SchemaMismatch(format!(
                "row has {} values, schema has {} fields",
                self.values.len(),
                schema.num_fields()
            )));
        }
        for (i, value) in self.values.iter().enumerate() {
            let expected = schema.field_type(i)?;
            if value.data_type() != expected {
                return Err(DatabaseError::SchemaMismatch(format!(
                    "field {i}: expected {expected}, got {}",
                    value.data_type()
                )));
            }
        }
        Ok(())
    }

    pub fn get(&self, i: usize) -> Result<&Value> {
        self.values.get(i).ok_or_else(|| {
            DatabaseError::NoSuchElement(format!(
                "field index {i} out of range for row of {} values",
                self.values.len()
            ))
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Left values followed by right values; the result has no origin
    #[must_use]
    pub fn concat(left: &Self, right: &Self) -> Self {
        let mut values = Vec::with_capacity(left.len() + right.len());
        values.extend(left.values.iter().cloned());
        values.extend(right.values.iter().cloned());
        Self::new(values)
    }
}

impl std::fmt::Display for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self.values.iter().map(ToString::to_string).collect();
        write!(f, "{}", rendered.join("\t"))
    }
}
