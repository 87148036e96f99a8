use thiserror::Error;

/// Errors raised while turning a table struct into a schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("'{type_name}' is not a struct with named fields")]
    NotAStruct { type_name: String },

    #[error("unsupported type '{rust_type}' for column '{column}' in table '{table}'")]
    UnsupportedType {
        table: String,
        column: String,
        rust_type: String,
    },
}
