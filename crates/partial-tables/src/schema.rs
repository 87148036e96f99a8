//! Schema collection and DDL generation.
//!
//! ## Example
//!
//! ```ignore
//! use partial_tables::SchemaCodegen;
//!
//! let schema = partial_tables::collect_schema();
//! for statement in schema.to_sql() {
//!     client.batch_execute(&statement).await?;
//! }
//! ```

use partial_tables_schema::{Index, Schema, Table, TableDef};

use crate::Error;

/// Extension trait for Schema to add SQL generation.
pub trait SchemaCodegen {
    /// Generate SQL to create all tables and indices, one statement per entry.
    fn to_sql(&self) -> Vec<String>;
}

impl SchemaCodegen for Schema {
    fn to_sql(&self) -> Vec<String> {
        let mut statements = Vec::new();
        for table in self.iter_tables() {
            statements.push(create_table_sql(table));
            for idx in &table.indices {
                statements.push(create_index_sql(table, idx));
            }
        }
        statements
    }
}

/// Quote a PostgreSQL identifier.
///
/// Always quotes identifiers to avoid issues with reserved keywords like
/// `user`, `order`, `table`, `group`, etc. Doubles any embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Generate CREATE TABLE SQL statement.
pub fn create_table_sql(table: &Table) -> String {
    let mut sql = format!("CREATE TABLE {} (\n", quote_ident(&table.name));

    // Collect primary key columns
    let pk_columns: Vec<&str> = table
        .columns
        .iter()
        .filter(|c| c.primary_key)
        .map(|c| c.name.as_str())
        .collect();

    // If there's more than one PK column, we need a table constraint
    let use_table_pk_constraint = pk_columns.len() > 1;

    let mut parts: Vec<String> = table
        .columns
        .iter()
        .map(|col| {
            let mut def = format!("    {} {}", quote_ident(&col.name), col.pg_type);

            if col.primary_key && col.auto_generated && col.default.is_none() {
                def.push_str(" GENERATED BY DEFAULT AS IDENTITY");
            }

            // Only add inline PRIMARY KEY for single-column PKs
            if col.primary_key && !use_table_pk_constraint {
                def.push_str(" PRIMARY KEY");
            }

            // PK columns are implicitly NOT NULL, except in composite PKs
            if !col.nullable && (!col.primary_key || use_table_pk_constraint) {
                def.push_str(" NOT NULL");
            }

            if col.unique && !col.primary_key {
                def.push_str(" UNIQUE");
            }

            if let Some(default) = &col.default {
                def.push_str(&format!(" DEFAULT {}", default));
            }

            def
        })
        .collect();

    if use_table_pk_constraint {
        let quoted_pk_cols: Vec<_> = pk_columns.iter().map(|c| quote_ident(c)).collect();
        parts.push(format!("    PRIMARY KEY ({})", quoted_pk_cols.join(", ")));
    }

    sql.push_str(&parts.join(",\n"));
    sql.push_str("\n);");

    sql
}

/// Generate CREATE INDEX SQL statement for a given index.
pub fn create_index_sql(table: &Table, idx: &Index) -> String {
    let unique = if idx.unique { "UNIQUE " } else { "" };
    let quoted_cols: Vec<_> = idx.columns.iter().map(|c| quote_ident(c)).collect();
    format!(
        "CREATE {}INDEX {} ON {} ({});",
        unique,
        quote_ident(&idx.name),
        quote_ident(&table.name),
        quoted_cols.join(", "),
    )
}

/// Collect schema from all registered table types.
///
/// Definitions that fail to convert are logged and skipped; use
/// [`try_collect_schema`] to get the error instead.
pub fn collect_schema() -> Schema {
    let mut schema = Schema::new();
    for def in inventory::iter::<TableDef> {
        match def.to_table() {
            Ok(Some(table)) => {
                if schema.tables.contains_key(&table.name) {
                    tracing::warn!(table = %table.name, "table registered twice, keeping the first");
                    continue;
                }
                schema.tables.insert(table.name.clone(), table);
            }
            Ok(None) => {
                tracing::warn!(
                    type_name = def.shape.type_identifier,
                    "registered type has no partial::table attribute, skipping"
                );
            }
            Err(e) => {
                tracing::warn!(
                    type_name = def.shape.type_identifier,
                    error = %e,
                    "skipping table definition"
                );
            }
        }
    }
    schema
}

/// Collect schema from all registered table types, failing on the first
/// broken definition.
pub fn try_collect_schema() -> crate::Result<Schema> {
    let mut schema = Schema::new();
    for def in inventory::iter::<TableDef> {
        let table = def.to_table().map_err(|source| Error::Schema {
            table: def.shape.type_identifier,
            source,
        })?;
        let Some(table) = table else {
            continue;
        };
        if schema.tables.contains_key(&table.name) {
            return Err(Error::DuplicateTable { name: table.name });
        }
        schema.tables.insert(table.name.clone(), table);
    }
    Ok(schema)
}
