// Module declarations
pub mod error;
pub mod value;
pub mod data_type;
pub mod schema;
pub mod row;

// Re-exports for convenience
pub use error::{DatabaseError, Result};
pub use value::Value;
pub use data_type::{DataType, STRING_LEN};
pub use schema::{Field, Schema};
pub use row::Row;
