//! Schema types and nullability rewriting for partial tables.
//!
//! A *partial variant* is a table that stores drafts of another table: it
//! flattens the same base struct, but the fields marked
//! `#[facet(partial::allowed)]` may be NULL in it. This crate holds the pieces
//! that make that work:
//!
//! - [`TypeExpr`] and [`rewrite_with_optional`], which turn marked type hints
//!   into `Option<_>` hints
//! - [`type_hints`], which resolves hints from facet shapes
//! - [`TableModel`], which applies the rewrite to a table definition
//! - [`Table`], [`Column`] and friends, the resulting schema

use facet::{Def, Facet, Shape};
use indexmap::IndexMap;
use std::fmt;

pub mod applier;
mod error;
pub mod hints;
pub mod rewrite;
pub mod type_expr;

pub use applier::{Application, ApplyMode, ColumnDescriptor, TableModel, is_partial_variant};
pub use error::SchemaError;
pub use hints::{FieldHint, TypeHints, shape_expr, type_hints};
pub use rewrite::{Fallback, ReconstructError, Rewrite, Rewriter, rewrite_with_optional};
pub use type_expr::{Arity, GenericArgs, GenericOrigin, Origin, Tag, TypeExpr, TypeRef};

/// Attribute namespace used by this crate.
pub const NS: &str = "partial";

// Define the partial attribute grammar using facet's macro.
// This generates:
// - `Attr` enum with all attribute variants
// - `__attr!` macro for parsing attributes
// - Re-exports for use as `partial::table`, `partial::allowed`, etc.
facet::define_attr_grammar! {
    ns "partial";
    crate_path ::partial_tables;

    /// Partial-tables attribute types.
    pub enum Attr {
        /// Marks a struct as a database table.
        ///
        /// Usage: `#[facet(partial::table = "table_name")]`
        Table(&'static str),

        /// Marks a table as the partial variant of its base struct.
        ///
        /// Usage: `#[facet(partial::variant)]`
        Variant,

        /// Marks a field (or a newtype) as nullable in partial variants.
        ///
        /// Usage: `#[facet(partial::allowed)]`
        Allowed,

        /// Marks a field as the primary key.
        ///
        /// Usage: `#[facet(partial::pk)]`
        Pk,

        /// Marks a field as having a unique constraint.
        ///
        /// Usage: `#[facet(partial::unique)]`
        Unique,

        /// Marks a field as auto-generated (e.g., identity columns).
        ///
        /// Usage: `#[facet(partial::auto)]`
        Auto,

        /// Sets a default value expression for the column.
        ///
        /// Usage: `#[facet(partial::default = "now()")]`
        Default(&'static str),

        /// Overrides the column name (default: the field name).
        ///
        /// Usage: `#[facet(partial::column = "column_name")]`
        Column(&'static str),

        /// Creates an index on this column.
        ///
        /// Usage: `#[facet(partial::index)]` or `#[facet(partial::index = "index_name")]`
        Index(Option<&'static str>),
    }
}

/// Postgres column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgType {
    /// SMALLINT (2 bytes)
    SmallInt,
    /// INTEGER (4 bytes)
    Integer,
    /// BIGINT (8 bytes)
    BigInt,
    /// REAL (4 bytes floating point)
    Real,
    /// DOUBLE PRECISION (8 bytes floating point)
    DoublePrecision,
    /// NUMERIC (arbitrary precision)
    Numeric,
    /// BOOLEAN
    Boolean,
    /// TEXT
    Text,
    /// BYTEA (binary)
    Bytea,
    /// TIMESTAMPTZ
    Timestamptz,
    /// DATE
    Date,
    /// TIME
    Time,
    /// UUID
    Uuid,
    /// TEXT[] (array of text)
    TextArray,
    /// BIGINT[] (array of bigint)
    BigIntArray,
    /// INTEGER[] (array of integer)
    IntegerArray,
}

impl fmt::Display for PgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PgType::SmallInt => write!(f, "SMALLINT"),
            PgType::Integer => write!(f, "INTEGER"),
            PgType::BigInt => write!(f, "BIGINT"),
            PgType::Real => write!(f, "REAL"),
            PgType::DoublePrecision => write!(f, "DOUBLE PRECISION"),
            PgType::Numeric => write!(f, "NUMERIC"),
            PgType::Boolean => write!(f, "BOOLEAN"),
            PgType::Text => write!(f, "TEXT"),
            PgType::Bytea => write!(f, "BYTEA"),
            PgType::Timestamptz => write!(f, "TIMESTAMPTZ"),
            PgType::Date => write!(f, "DATE"),
            PgType::Time => write!(f, "TIME"),
            PgType::Uuid => write!(f, "UUID"),
            PgType::TextArray => write!(f, "TEXT[]"),
            PgType::BigIntArray => write!(f, "BIGINT[]"),
            PgType::IntegerArray => write!(f, "INTEGER[]"),
        }
    }
}

/// A database column definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Postgres type
    pub pg_type: PgType,
    /// Final type hint of the field (rewritten for partial variants)
    pub hint: TypeRef,
    /// Whether the column allows NULL
    pub nullable: bool,
    /// Default value expression (if any)
    pub default: Option<String>,
    /// Whether this is a primary key
    pub primary_key: bool,
    /// Whether this has a unique constraint
    pub unique: bool,
    /// Whether this column is auto-generated (identity, default now(), ...)
    pub auto_generated: bool,
    /// Whether the field carries `partial::allowed`
    pub partial_allowed: bool,
}

/// A database index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    /// Index name
    pub name: String,
    /// Column(s) in the index
    pub columns: Vec<String>,
    /// Whether this is a unique index
    pub unique: bool,
}

/// A database table definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Table name
    pub name: String,
    /// Columns
    pub columns: Vec<Column>,
    /// Indices
    pub indices: Vec<Index>,
    /// Whether this table is a partial variant
    pub partial: bool,
}

impl Table {
    /// Get a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// A complete database schema.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    /// Tables in the schema, indexed by name
    pub tables: IndexMap<String, Table>,
}

impl Schema {
    /// Create a new empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a table by name.
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Iterate over all tables.
    pub fn iter_tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }
}

// =============================================================================
// Table definition registration
// =============================================================================

/// A registered table definition.
///
/// This is submitted to inventory by `partial_tables::register_table!`.
pub struct TableDef {
    /// The facet shape of the table struct.
    pub shape: &'static Shape,
    /// How partial variants get their nullability.
    pub mode: ApplyMode,
}

impl TableDef {
    /// Create a new table definition from a Facet type.
    pub const fn new<T: Facet<'static>>() -> Self {
        Self {
            shape: T::SHAPE,
            mode: ApplyMode::Descriptors,
        }
    }

    /// Use `mode` instead of [`ApplyMode::Descriptors`].
    pub const fn with_mode(mut self, mode: ApplyMode) -> Self {
        self.mode = mode;
        self
    }

    /// Get the table name from the `partial::table` attribute.
    pub fn table_name(&self) -> Option<&'static str> {
        self.shape
            .attributes
            .iter()
            .find(|attr| attr.ns == Some(NS) && attr.key == "table")
            .and_then(applier::attr_str)
    }

    /// Resolve the definition and apply partial nullability to it.
    pub fn model(&self) -> Result<(TableModel, Application), SchemaError> {
        let mut model = TableModel::from_shape(self.shape)?;
        let application = model.apply_partial_fields(self.mode);
        Ok((model, application))
    }

    /// Convert this definition to a Table struct.
    ///
    /// Returns `Ok(None)` for structs without a `partial::table` attribute.
    pub fn to_table(&self) -> Result<Option<Table>, SchemaError> {
        let Some(table_name) = self.table_name() else {
            return Ok(None);
        };
        let (model, application) = self.model()?;

        if !application.is_empty() {
            tracing::debug!(
                table = table_name,
                changed = ?application.changed,
                fallbacks = application.fallbacks.len(),
                "applied partial variant"
            );
        }

        let mut columns = Vec::new();
        let mut indices = Vec::new();

        for (name, field_hint) in &model.fields {
            let field = field_hint.field;
            let desc = model
                .descriptors
                .get(name)
                .cloned()
                .unwrap_or_else(|| ColumnDescriptor::from_field(field));
            let hint = model
                .hints
                .get(name)
                .cloned()
                .unwrap_or_else(|| field_hint.expr.clone());

            // Determine if nullable (Option<T> types)
            let (inner_shape, option_field) = unwrap_option(field.shape());

            // Map type to Postgres
            let pg_type =
                shape_to_pg_type(inner_shape).ok_or_else(|| SchemaError::UnsupportedType {
                    table: table_name.to_string(),
                    column: desc.name.clone(),
                    rust_type: inner_shape.to_string(),
                })?;

            let nullable = desc
                .nullable
                .unwrap_or(option_field || hint.is_optional());

            if let Some(index) = &desc.index {
                let idx_name = index
                    .clone()
                    .unwrap_or_else(|| index_name(table_name, &[&desc.name]));
                indices.push(Index {
                    name: idx_name,
                    columns: vec![desc.name.clone()],
                    unique: false,
                });
            }

            columns.push(Column {
                name: desc.name,
                pg_type,
                partial_allowed: hint.mentions_partial_allowed(),
                hint,
                nullable,
                default: desc.default.clone(),
                primary_key: desc.primary_key,
                unique: desc.unique,
                auto_generated: desc.auto_generated || is_auto_generated_default(&desc.default),
            });
        }

        Ok(Some(Table {
            name: table_name.to_string(),
            columns,
            indices,
            partial: model.partial,
        }))
    }
}

inventory::collect!(TableDef);

/// Generate a standard index name for a table and columns.
///
/// Uses the convention `idx_{table}_{columns}` where columns are joined by underscore.
pub fn index_name(table: &str, columns: &[impl AsRef<str>]) -> String {
    let cols: Vec<&str> = columns.iter().map(|c| c.as_ref()).collect();
    format!("idx_{}_{}", table, cols.join("_"))
}

/// Unwrap Option<T> to get the inner type and nullability.
fn unwrap_option(shape: &'static Shape) -> (&'static Shape, bool) {
    match &shape.def {
        Def::Option(def) => (def.t, true),
        _ => (shape, false),
    }
}

/// Check if a default value indicates an auto-generated column.
fn is_auto_generated_default(default: &Option<String>) -> bool {
    let Some(def) = default else {
        return false;
    };

    let lower = def.to_lowercase();
    lower.contains("nextval(")
        || lower.contains("gen_random_uuid()")
        || lower.contains("uuid_generate_v")
        || lower.contains("now()")
        || lower.contains("current_timestamp")
}

/// Map a Rust type to a Postgres type.
///
/// Takes a Shape to properly handle generic types like `Vec<u8>`. Transparent
/// newtypes map to the type they wrap.
pub fn shape_to_pg_type(shape: &Shape) -> Option<PgType> {
    // Check for Vec<T> types - shape.def is List
    if let Def::List(def) = &shape.def {
        let inner = def.t;
        return if inner == u8::SHAPE {
            Some(PgType::Bytea)
        } else if inner == String::SHAPE {
            Some(PgType::TextArray)
        } else if inner == i64::SHAPE {
            Some(PgType::BigIntArray)
        } else if inner == i32::SHAPE {
            Some(PgType::IntegerArray)
        } else {
            None
        };
    }

    // Check for slice &[u8] (bytea)
    if let Def::Slice(def) = &shape.def {
        return (def.t == u8::SHAPE).then_some(PgType::Bytea);
    }

    rust_type_to_pg(shape).or_else(|| shape.inner.and_then(shape_to_pg_type))
}

/// Map a Rust scalar type to a Postgres type.
pub fn rust_type_to_pg(shape: &Shape) -> Option<PgType> {
    // Integers: SmallInt (2 bytes)
    if shape == i8::SHAPE || shape == u8::SHAPE || shape == i16::SHAPE {
        Some(PgType::SmallInt)
    // Integers: Integer (4 bytes)
    } else if shape == u16::SHAPE || shape == i32::SHAPE {
        Some(PgType::Integer)
    // Integers: BigInt (8 bytes)
    } else if shape == u32::SHAPE
        || shape == i64::SHAPE
        || shape == u64::SHAPE
        || shape == isize::SHAPE
        || shape == usize::SHAPE
    {
        Some(PgType::BigInt)
    // Floats
    } else if shape == f32::SHAPE {
        Some(PgType::Real)
    } else if shape == f64::SHAPE {
        Some(PgType::DoublePrecision)
    } else if shape == bool::SHAPE {
        Some(PgType::Boolean)
    } else if shape == String::SHAPE {
        Some(PgType::Text)
    } else if shape == rust_decimal::Decimal::SHAPE {
        Some(PgType::Numeric)
    } else if shape == jiff::Timestamp::SHAPE || shape == jiff::Zoned::SHAPE {
        Some(PgType::Timestamptz)
    } else if shape == jiff::civil::Date::SHAPE {
        Some(PgType::Date)
    } else if shape == jiff::civil::Time::SHAPE {
        Some(PgType::Time)
    } else if shape == chrono::DateTime::<chrono::Utc>::SHAPE
        || shape == chrono::DateTime::<chrono::Local>::SHAPE
        || shape == chrono::NaiveDateTime::SHAPE
    {
        Some(PgType::Timestamptz)
    } else if shape == chrono::NaiveDate::SHAPE {
        Some(PgType::Date)
    } else if shape == chrono::NaiveTime::SHAPE {
        Some(PgType::Time)
    } else if shape == uuid::Uuid::SHAPE {
        Some(PgType::Uuid)
    } else {
        None
    }
}
