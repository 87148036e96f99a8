//! Type hints resolved from facet shapes.
//!
//! Every field of a table struct gets a [`TypeRef`] describing its declared
//! type, with namespaced attributes kept as [`Tag`]s. Fields marked
//! `#[facet(flatten)]` pull in the hints of the flattened struct, which is
//! how a table inherits the fields of a shared base struct.

use facet::{Def, Field, Shape, StructKind, Type, UserType};
use indexmap::IndexMap;

use crate::type_expr::{Origin, Tag, TypeExpr, TypeRef};
use crate::{NS, SchemaError};

/// Resolved hint for one (possibly inherited) field.
#[derive(Debug, Clone)]
pub struct FieldHint {
    /// The field the hint was declared on
    pub field: &'static Field,
    /// Declared type, with the field's namespaced attributes as tags
    pub expr: TypeRef,
    /// Names of the flattened fields this hint was reached through, outermost first
    pub inherited_via: Vec<&'static str>,
}

impl FieldHint {
    /// Whether this hint comes from a flattened base struct.
    pub fn is_inherited(&self) -> bool {
        !self.inherited_via.is_empty()
    }
}

/// All field hints of a struct, keyed by field name, in declaration order.
pub type TypeHints = IndexMap<&'static str, FieldHint>;

/// Resolve the hints of every field of `shape`, including flattened ones.
pub fn type_hints(shape: &'static Shape) -> Result<TypeHints, SchemaError> {
    let mut hints = TypeHints::new();
    collect_hints(shape, &mut Vec::new(), &mut hints)?;
    Ok(hints)
}

fn collect_hints(
    shape: &'static Shape,
    via: &mut Vec<&'static str>,
    hints: &mut TypeHints,
) -> Result<(), SchemaError> {
    let struct_type = match &shape.ty {
        Type::User(UserType::Struct(s)) if s.kind == StructKind::Struct => s,
        _ => {
            return Err(SchemaError::NotAStruct {
                type_name: shape.type_identifier.to_string(),
            });
        }
    };

    for field in struct_type.fields {
        if field.is_flattened() {
            via.push(field.name);
            collect_hints(field.shape(), via, hints)?;
            via.pop();
            continue;
        }

        let tags = tags_from_attrs(field.attributes.iter().map(|a| (a.ns, a.key)));
        let base = shape_expr(field.shape());
        let expr = if tags.is_empty() {
            base
        } else {
            TypeExpr::annotated(base, tags)
        };

        // A field declared later (closer to the table) shadows an inherited one.
        hints.shift_remove(field.name);
        hints.insert(
            field.name,
            FieldHint {
                field,
                expr,
                inherited_via: via.clone(),
            },
        );
    }

    Ok(())
}

/// Turn `(namespace, key)` attribute pairs into tags. Builtin facet
/// attributes (no namespace) are not tags.
pub fn tags_from_attrs(
    attrs: impl IntoIterator<Item = (Option<&'static str>, &'static str)>,
) -> Vec<Tag> {
    attrs
        .into_iter()
        .filter_map(|(ns, key)| match ns {
            Some(NS) if key == "allowed" => Some(Tag::PartialAllowed),
            Some(ns) => Some(Tag::Attr { ns, key }),
            None => None,
        })
        .collect()
}

/// Build the type expression for a shape.
///
/// A shape whose container carries namespaced attributes (for instance a
/// newtype marked `#[facet(partial::allowed)]`) becomes an annotated
/// expression, so the marker survives inside generic parameters.
pub fn shape_expr(shape: &'static Shape) -> TypeRef {
    let base = bare_shape_expr(shape);
    let tags = tags_from_attrs(shape.attributes.iter().map(|a| (a.ns, a.key)));
    if tags.is_empty() {
        base
    } else {
        TypeExpr::annotated(base, tags)
    }
}

fn bare_shape_expr(shape: &'static Shape) -> TypeRef {
    match &shape.def {
        Def::Option(def) => TypeExpr::optional(shape_expr(def.t)),
        Def::List(def) => TypeExpr::generic(Origin::List, vec![shape_expr(def.t)]),
        Def::Array(def) => TypeExpr::generic(Origin::List, vec![shape_expr(def.t)]),
        Def::Slice(def) => TypeExpr::generic(Origin::List, vec![shape_expr(def.t)]),
        Def::Set(def) => TypeExpr::generic(Origin::Set, vec![shape_expr(def.t)]),
        Def::Map(def) => {
            TypeExpr::generic(Origin::Map, vec![shape_expr(def.k), shape_expr(def.v)])
        }
        Def::Result(def) => {
            TypeExpr::generic(Origin::Result, vec![shape_expr(def.t), shape_expr(def.e)])
        }
        Def::Pointer(def) => match def.pointee {
            Some(pointee) => TypeExpr::generic(
                Origin::Named {
                    name: shape.type_identifier.to_string(),
                    arity: 1,
                },
                vec![shape_expr(pointee)],
            ),
            None => TypeExpr::plain(shape.type_identifier),
        },
        _ => match &shape.ty {
            Type::User(UserType::Struct(s)) if s.kind == StructKind::Tuple => {
                let params = s.fields.iter().map(|f| shape_expr(f.shape())).collect();
                TypeExpr::generic(Origin::Tuple, params)
            }
            _ if !shape.type_params.is_empty() => {
                let params: Vec<TypeRef> = shape
                    .type_params
                    .iter()
                    .map(|tp| shape_expr(tp.shape()))
                    .collect();
                TypeExpr::generic(
                    Origin::Named {
                        name: shape.type_identifier.to_string(),
                        arity: params.len(),
                    },
                    params,
                )
            }
            _ => TypeExpr::plain(shape.type_identifier),
        },
    }
}
