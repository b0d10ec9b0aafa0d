//! Row shape descriptor.
//!
//! A [`Schema`] is an ordered, immutable list of typed (optionally named)
//! fields. Equality and hashing look only at the type sequence; names are
//! informational and are carried through `merge` so plans stay readable.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::data_type::DataType;
use super::error::{DatabaseError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub data_type: DataType,
    pub name: Option<String>,
}

impl Field {
    #[must_use]
    pub fn new(data_type: DataType, name: Option<&str>) -> Self {
        Self {
            data_type,
            name: name.map(str::to_string),
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name.as_deref().unwrap_or("?"), self.data_type)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// Build a schema; at least one field is required
    pub fn new(fields: Vec<Field>) -> Result<Self> {
        if fields.is_empty() {
            return Err(DatabaseError::InvalidArgument(
                "schema must contain at least one field".to_string(),
            ));
        }
        Ok(Self { fields })
    }

    /// Schema with named fields
    pub fn named(fields: &[(DataType, &str)]) -> Result<Self> {
        Self::new(
            fields
                .iter()
                .map(|(data_type, name)| Field::new(*data_type, Some(name)))
                .collect(),
        )
    }

    /// Schema with anonymous fields
    pub fn from_types(types: &[DataType]) -> Result<Self> {
        Self::new(types.iter().map(|t| Field::new(*t, None)).collect())
    }

    #[must_use]
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn field(&self, i: usize) -> Result<&Field> {
        self.fields.get(i).ok_or_else(|| {
            DatabaseError::NoSuchElement(format!(
                "field index {i} out of range for {} fields",
                self.fields.len()
            ))
        })
    }

    pub fn field_type(&self, i: usize) -> Result<DataType> {
        self.field(i).map(|f| f.data_type)
    }

    /// Name of field `i`, `None` for anonymous fields
    pub fn field_name(&self, i: usize) -> Result<Option<&str>> {
        self.field(i).map(|f| f.name.as_deref())
    }

    /// Index of the first field carrying `name`
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|f| f.name.as_deref() == Some(name))
            .ok_or_else(|| DatabaseError::NoSuchElement(format!("no field named '{name}'")))
    }

    /// Byte size of one row of this shape
    #[must_use]
    pub fn size(&self) -> usize {
        self.fields.iter().map(|f| f.data_type.len()).sum()
    }

    /// `a`'s fields followed by `b`'s
    #[must_use]
    pub fn merge(a: &Self, b: &Self) -> Self {
        let mut fields = Vec::with_capacity(a.fields.len() + b.fields.len());
        fields.extend(a.fields.iter().cloned());
        fields.extend(b.fields.iter().cloned());
        Self { fields }
    }

    /// Copy of this schema with every named field prefixed by `alias.`
    #[must_use]
    pub fn with_alias(&self, alias: &str) -> Self {
        let fields = self
            .fields
            .iter()
            .map(|f| Field {
                data_type: f.data_type,
                name: f.name.as_ref().map(|n| format!("{alias}.{n}")),
            })
            .collect();
        Self { fields }
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|(a, b)| a.data_type == b.data_type)
    }
}

impl Eq for Schema {}

// Must agree with `eq`: names are left out.
impl Hash for Schema {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fields.len().hash(state);
        for field in &self.fields {
            field.data_type.hash(state);
        }
    }
}

impl std::fmt::Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{field}")?;
        }
        Ok(())
    }
}
