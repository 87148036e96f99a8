//! Nullable partial variants of Postgres tables, powered by facet reflection.
//!
//! A partial variant stores drafts of another table. Both tables flatten the
//! same base struct; fields marked `#[facet(partial::allowed)]` become
//! nullable in the table tagged `#[facet(partial::variant)]` and stay
//! `NOT NULL` everywhere else.
//!
//! ```ignore
//! use facet::Facet;
//! use partial_tables as partial;
//!
//! #[derive(Facet)]
//! pub struct BusinessBase {
//!     #[facet(partial::pk, partial::auto)]
//!     pub id: i64,
//!     pub business_name: String,
//!     #[facet(partial::allowed)]
//!     pub city: String,
//!     #[facet(partial::allowed)]
//!     pub address: String,
//! }
//!
//! #[derive(Facet)]
//! #[facet(partial::table = "business")]
//! pub struct Business {
//!     #[facet(flatten)]
//!     pub base: BusinessBase,
//! }
//!
//! #[derive(Facet)]
//! #[facet(partial::table = "business_draft", partial::variant)]
//! pub struct BusinessDraft {
//!     #[facet(flatten)]
//!     pub base: BusinessBase,
//! }
//!
//! partial::register_table!(Business);
//! partial::register_table!(BusinessDraft);
//!
//! let schema = partial::collect_schema();
//! ```
//!
//! The rewrite happens once, when a [`TableDef`] is turned into a [`Table`].
//! Rebuilding a generic type around a nullable field can fail for exotic
//! containers; the field then keeps its declared type and a warning is
//! logged.

mod error;
pub mod schema;

pub use error::Error;
pub use schema::{
    SchemaCodegen, collect_schema, create_index_sql, create_table_sql, quote_ident,
    try_collect_schema,
};

pub use partial_tables_schema::{
    Application, ApplyMode, Arity, Column, ColumnDescriptor, Fallback, FieldHint, GenericArgs,
    GenericOrigin, Index, Origin, PgType, ReconstructError, Rewrite, Rewriter, Schema,
    SchemaError, Table, TableDef, TableModel, Tag, TypeExpr, TypeHints, TypeRef,
    is_partial_variant, rewrite_with_optional, shape_expr, type_hints,
};

// Re-export attr grammar
pub use partial_tables_schema::{__attr, __parse_attr, Attr};

// Re-export inventory for `register_table!`
pub use inventory;

/// Result type for partial-tables operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Register a `#[derive(Facet)]` table struct so [`collect_schema`] sees it.
///
/// An optional second argument selects the [`ApplyMode`]:
///
/// ```ignore
/// partial_tables::register_table!(BusinessDraft);
/// partial_tables::register_table!(ProfileDraft, partial_tables::ApplyMode::HintsOnly);
/// ```
#[macro_export]
macro_rules! register_table {
    ($ty:ty) => {
        $crate::inventory::submit! {
            $crate::TableDef::new::<$ty>()
        }
    };
    ($ty:ty, $mode:expr) => {
        $crate::inventory::submit! {
            $crate::TableDef::new::<$ty>().with_mode($mode)
        }
    };
}
