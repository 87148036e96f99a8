use partial_tables_schema::SchemaError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("schema error in table '{table}': {source}")]
    Schema {
        table: &'static str,
        #[source]
        source: SchemaError,
    },

    #[error("table '{name}' is registered more than once")]
    DuplicateTable { name: String },
}
