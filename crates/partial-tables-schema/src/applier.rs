//! Applying nullability to partial variants.
//!
//! A table struct tagged `#[facet(partial::variant)]` is a draft version of
//! another table: every field whose hint carries `partial::allowed` becomes
//! nullable. [`TableModel`] holds what a table definition declares (hints and
//! column descriptors) and [`TableModel::apply_partial_fields`] rewrites it
//! in place, once, before the table is built.

use facet::{Field, Shape};
use indexmap::IndexMap;

use crate::hints::{FieldHint, TypeHints, type_hints};
use crate::rewrite::{Fallback, Rewriter};
use crate::type_expr::TypeRef;
use crate::{Attr, NS, SchemaError};

/// Which flavour of nullability the applier produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApplyMode {
    /// Replace the descriptor of every rewritten field with a fresh nullable
    /// one. Constraints inherited from the base (unique, default, index) do
    /// not carry over. A marked field that is already `Option<_>` is not
    /// rewritten, so it keeps its descriptor and constraints.
    #[default]
    Descriptors,

    /// Only rewrite hints; nullability follows from the field's hint being
    /// `Option<_>`. Descriptors keep their constraints.
    HintsOnly,
}

/// How a field is persisted as a column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnDescriptor {
    /// Column name
    pub name: String,
    /// Explicit nullability; `None` means "follow the type hint"
    pub nullable: Option<bool>,
    /// Whether this is a primary key
    pub primary_key: bool,
    /// Whether this has a unique constraint
    pub unique: bool,
    /// Whether this column is filled in by the database
    pub auto_generated: bool,
    /// Default value expression (if any)
    pub default: Option<String>,
    /// Field-level index; `Some(None)` asks for a generated name
    pub index: Option<Option<String>>,
}

impl ColumnDescriptor {
    /// Read the descriptor declared by `field`'s attributes.
    pub fn from_field(field: &'static Field) -> Self {
        let mut desc = ColumnDescriptor {
            name: field.name.to_string(),
            ..Default::default()
        };

        for attr in field.attributes.iter().filter(|a| a.ns == Some(NS)) {
            match attr.key {
                "column" => {
                    if let Some(name) = attr_str(attr) {
                        desc.name = name.to_string();
                    }
                }
                "pk" => desc.primary_key = true,
                "unique" => desc.unique = true,
                "auto" => desc.auto_generated = true,
                "default" => desc.default = attr_str(attr).map(str::to_string),
                "index" => {
                    desc.index = Some(attr_str(attr).filter(|s| !s.is_empty()).map(str::to_string))
                }
                _ => {}
            }
        }

        desc
    }

    /// A descriptor that only says "this column may be NULL".
    pub fn nullable(name: impl Into<String>) -> Self {
        ColumnDescriptor {
            name: name.into(),
            nullable: Some(true),
            ..Default::default()
        }
    }
}

/// What the applier did to one table.
#[derive(Debug, Clone, Default)]
pub struct Application {
    /// Fields whose hint was rewritten, in declaration order
    pub changed: Vec<&'static str>,
    /// Rebuilds that failed; the affected hints were kept as declared
    pub fallbacks: Vec<Fallback>,
}

impl Application {
    /// Whether any hint was rewritten.
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Everything a table definition declares, before it becomes a [`crate::Table`].
#[derive(Debug, Clone)]
pub struct TableModel {
    /// Shape of the table struct
    pub shape: &'static Shape,
    /// Whether the struct is tagged `partial::variant`
    pub partial: bool,
    /// Resolved fields, including flattened ones
    pub fields: TypeHints,
    /// Current hint per field; rewritten hints replace the declared ones
    pub hints: IndexMap<&'static str, TypeRef>,
    /// Current column descriptor per field
    pub descriptors: IndexMap<&'static str, ColumnDescriptor>,
}

impl TableModel {
    /// Resolve hints and descriptors for `shape`.
    pub fn from_shape(shape: &'static Shape) -> Result<Self, SchemaError> {
        let fields = type_hints(shape)?;
        let hints = fields
            .iter()
            .map(|(name, hint)| (*name, hint.expr.clone()))
            .collect();
        let descriptors = fields
            .iter()
            .map(|(name, hint)| (*name, ColumnDescriptor::from_field(hint.field)))
            .collect();

        Ok(TableModel {
            shape,
            partial: is_partial_variant(shape),
            fields,
            hints,
            descriptors,
        })
    }

    /// The resolved field behind `name`.
    pub fn field(&self, name: &str) -> Option<&FieldHint> {
        self.fields.get(name)
    }

    /// Make every `partial::allowed` field nullable if this is a partial variant.
    ///
    /// Non-partial tables are left untouched. The hint table is only replaced
    /// when at least one hint changed.
    pub fn apply_partial_fields(&mut self, mode: ApplyMode) -> Application {
        if !self.partial {
            return Application::default();
        }

        let mut rewriter = Rewriter::new();
        let mut updated = self.hints.clone();
        let mut changed = Vec::new();

        for (name, hint) in &self.hints {
            let rewrite = rewriter.rewrite(hint);
            if !rewrite.is_changed() {
                continue;
            }

            let new_hint = rewrite.into_expr();
            tracing::debug!(
                table = self.shape.type_identifier,
                field = *name,
                from = %hint,
                to = %new_hint,
                "field is nullable in partial variant"
            );
            updated.insert(*name, new_hint);
            changed.push(*name);

            if mode == ApplyMode::Descriptors
                && let Some(desc) = self.descriptors.get_mut(name)
            {
                *desc = ColumnDescriptor::nullable(desc.name.clone());
            }
        }

        if !changed.is_empty() {
            self.hints = updated;
        }

        Application {
            changed,
            fallbacks: rewriter.into_fallbacks(),
        }
    }
}

/// Whether `shape` is tagged `#[facet(partial::variant)]`.
pub fn is_partial_variant(shape: &Shape) -> bool {
    shape
        .attributes
        .iter()
        .any(|attr| attr.ns == Some(NS) && attr.key == "variant")
}

/// String payload of a `partial::` attribute.
pub(crate) fn attr_str(attr: &facet::Attr) -> Option<&'static str> {
    match attr.get_as::<Attr>() {
        Some(Attr::Table(s) | Attr::Column(s) | Attr::Default(s)) => Some(*s),
        Some(Attr::Index(name)) => *name,
        Some(_) => None,
        None => attr.get_as::<&'static str>().copied(),
    }
}
