//! Nullability rewriting for type expressions.
//!
//! Walks a type expression and wraps every annotated sub-expression that
//! carries [`crate::Tag::PartialAllowed`] in `Option<_>`, rebuilding the generic
//! containers and annotations around it. Sub-expressions that need no
//! change are returned as the same [`TypeRef`], so callers can compare the
//! result with [`Arc::ptr_eq`].
//!
//! Rebuilding a generic container may fail (arity mismatch, an origin that
//! refuses new parameters). That is not an error: the original expression is
//! kept and the failure is reported as a [`Fallback`].

use std::sync::Arc;

use thiserror::Error;

use crate::type_expr::{Arity, GenericArgs, TypeExpr, TypeRef};

/// Why a generic container could not be rebuilt with rewritten parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconstructError {
    #[error("{origin} expects {expected} parameter(s), got {found}")]
    ArityMismatch {
        origin: String,
        expected: Arity,
        found: usize,
    },

    #[error("{origin} cannot be reconstructed: {reason}")]
    Unsupported { origin: String, reason: String },
}

/// A sub-expression that was left as-is because its container could not be
/// rebuilt.
#[derive(Debug, Clone)]
pub struct Fallback {
    /// The expression that was kept unchanged
    pub original: TypeRef,
    /// What went wrong while rebuilding it
    pub error: ReconstructError,
}

/// Outcome of rewriting one expression.
#[derive(Debug, Clone)]
pub enum Rewrite {
    /// No marker anywhere; carries the input itself.
    Unchanged(TypeRef),
    /// A new expression with the marked parts made optional.
    Rewritten(TypeRef),
    /// Rebuilding this expression failed; carries the input itself.
    Fallback {
        original: TypeRef,
        error: ReconstructError,
    },
}

impl Rewrite {
    /// The resulting expression, whatever the outcome.
    pub fn expr(&self) -> &TypeRef {
        match self {
            Rewrite::Unchanged(expr) | Rewrite::Rewritten(expr) => expr,
            Rewrite::Fallback { original, .. } => original,
        }
    }

    /// Consume into the resulting expression.
    pub fn into_expr(self) -> TypeRef {
        match self {
            Rewrite::Unchanged(expr) | Rewrite::Rewritten(expr) => expr,
            Rewrite::Fallback { original, .. } => original,
        }
    }

    /// Whether a new expression was produced.
    pub fn is_changed(&self) -> bool {
        matches!(self, Rewrite::Rewritten(_))
    }
}

/// Rewrites expressions and remembers every fallback it took, at any depth.
#[derive(Debug, Default)]
pub struct Rewriter {
    fallbacks: Vec<Fallback>,
}

impl Rewriter {
    /// Create a rewriter with no recorded fallbacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fallbacks recorded so far.
    pub fn fallbacks(&self) -> &[Fallback] {
        &self.fallbacks
    }

    /// Take the recorded fallbacks.
    pub fn into_fallbacks(self) -> Vec<Fallback> {
        self.fallbacks
    }

    /// Rewrite `expr`, making every marked sub-expression optional.
    pub fn rewrite(&mut self, expr: &TypeRef) -> Rewrite {
        match expr.as_ref() {
            TypeExpr::Annotated { base, tags } if expr.is_partial_allowed() => {
                // Already optional: wrapping again would give Option<Option<T>>.
                if base.is_optional() {
                    return Rewrite::Unchanged(Arc::clone(expr));
                }
                Rewrite::Rewritten(TypeExpr::annotated(
                    TypeExpr::optional(Arc::clone(base)),
                    tags.clone(),
                ))
            }

            TypeExpr::Annotated { base, tags } => {
                let new_base = self.rewrite(base).into_expr();
                if Arc::ptr_eq(&new_base, base) {
                    Rewrite::Unchanged(Arc::clone(expr))
                } else {
                    Rewrite::Rewritten(TypeExpr::annotated(new_base, tags.clone()))
                }
            }

            TypeExpr::Generic { origin, params } if !params.is_empty() => {
                let new_params: Vec<TypeRef> =
                    params.iter().map(|p| self.rewrite(p).into_expr()).collect();

                let changed = new_params
                    .iter()
                    .zip(params.iter())
                    .any(|(new, old)| !Arc::ptr_eq(new, old));
                if !changed {
                    return Rewrite::Unchanged(Arc::clone(expr));
                }

                match origin.parameterize(GenericArgs::from_vec(new_params)) {
                    Ok(rebuilt) => Rewrite::Rewritten(TypeExpr::generic(origin.clone(), rebuilt)),
                    Err(error) => {
                        tracing::warn!(
                            expr = %expr,
                            error = %error,
                            "could not rebuild generic type, keeping it as declared"
                        );
                        self.fallbacks.push(Fallback {
                            original: Arc::clone(expr),
                            error: error.clone(),
                        });
                        Rewrite::Fallback {
                            original: Arc::clone(expr),
                            error,
                        }
                    }
                }
            }

            _ => Rewrite::Unchanged(Arc::clone(expr)),
        }
    }
}

/// Rewrite `expr` with a fresh [`Rewriter`].
///
/// Nested fallbacks are logged but not returned; use a [`Rewriter`] to
/// collect them.
pub fn rewrite_with_optional(expr: &TypeRef) -> Rewrite {
    Rewriter::new().rewrite(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_expr::{GenericOrigin, Origin, Tag};

    fn marked(base: TypeRef) -> TypeRef {
        TypeExpr::annotated(base, vec![Tag::PartialAllowed])
    }

    #[derive(Debug)]
    struct Refusing;

    impl GenericOrigin for Refusing {
        fn name(&self) -> &str {
            "Refusing"
        }

        fn parameterize(&self, _args: GenericArgs) -> Result<Vec<TypeRef>, ReconstructError> {
            Err(ReconstructError::Unsupported {
                origin: "Refusing".to_string(),
                reason: "never accepts new parameters".to_string(),
            })
        }
    }

    /// Accepts only a single parameter, and only as `GenericArgs::One`.
    #[derive(Debug)]
    struct StrictSingle;

    impl GenericOrigin for StrictSingle {
        fn name(&self) -> &str {
            "StrictSingle"
        }

        fn parameterize(&self, args: GenericArgs) -> Result<Vec<TypeRef>, ReconstructError> {
            match args {
                GenericArgs::One(only) => Ok(vec![only]),
                GenericArgs::Many(params) => Err(ReconstructError::Unsupported {
                    origin: "StrictSingle".to_string(),
                    reason: format!("got a list of {} parameters", params.len()),
                }),
            }
        }
    }

    #[test]
    fn test_marker_wraps_base_and_keeps_tags() {
        let tags = vec![
            Tag::Attr {
                ns: "partial",
                key: "unique",
            },
            Tag::PartialAllowed,
        ];
        let expr = TypeExpr::annotated(TypeExpr::plain("String"), tags.clone());

        let rewrite = rewrite_with_optional(&expr);
        assert!(rewrite.is_changed());

        match rewrite.expr().as_ref() {
            TypeExpr::Annotated { base, tags: new_tags } => {
                assert_eq!(base.as_ref(), TypeExpr::optional(TypeExpr::plain("String")).as_ref());
                assert_eq!(new_tags, &tags);
            }
            other => panic!("expected an annotated expression, got {other:?}"),
        }
    }

    #[test]
    fn test_plain_is_unchanged_by_identity() {
        let expr = TypeExpr::plain("String");
        let rewrite = rewrite_with_optional(&expr);
        assert!(matches!(rewrite, Rewrite::Unchanged(_)));
        assert!(Arc::ptr_eq(rewrite.expr(), &expr));
    }

    #[test]
    fn test_unmarked_annotation_is_unchanged_by_identity() {
        let expr = TypeExpr::annotated(
            TypeExpr::generic(Origin::List, vec![TypeExpr::plain("i64")]),
            vec![Tag::Attr {
                ns: "partial",
                key: "index",
            }],
        );
        let rewrite = rewrite_with_optional(&expr);
        assert!(Arc::ptr_eq(rewrite.expr(), &expr));
    }

    #[test]
    fn test_propagates_through_containers() {
        let x = TypeExpr::plain("String");
        let y = marked(TypeExpr::plain("i64"));
        let expr = TypeExpr::generic(Origin::Map, vec![Arc::clone(&x), y]);

        let rewrite = rewrite_with_optional(&expr);
        let TypeExpr::Generic { origin, params } = rewrite.expr().as_ref() else {
            panic!("expected a generic expression");
        };
        assert_eq!(origin, &Origin::Map);
        assert_eq!(params.len(), 2);
        assert!(Arc::ptr_eq(&params[0], &x), "untouched parameter keeps identity");
        assert_eq!(
            params[1].as_ref(),
            marked(TypeExpr::optional(TypeExpr::plain("i64"))).as_ref()
        );
    }

    #[test]
    fn test_propagates_through_unmarked_annotation() {
        let inner = TypeExpr::generic(Origin::List, vec![marked(TypeExpr::plain("String"))]);
        let tags = vec![Tag::Attr {
            ns: "partial",
            key: "index",
        }];
        let expr = TypeExpr::annotated(inner, tags.clone());

        let rewrite = rewrite_with_optional(&expr);
        let expected = TypeExpr::annotated(
            TypeExpr::generic(
                Origin::List,
                vec![marked(TypeExpr::optional(TypeExpr::plain("String")))],
            ),
            tags,
        );
        assert_eq!(rewrite.expr().as_ref(), expected.as_ref());
    }

    #[test]
    fn test_single_parameter_reconstruction() {
        let origin = Origin::Custom(Arc::new(StrictSingle));
        let expr = TypeExpr::generic(origin.clone(), vec![marked(TypeExpr::plain("String"))]);

        let rewrite = rewrite_with_optional(&expr);
        assert!(rewrite.is_changed());
        let TypeExpr::Generic { params, .. } = rewrite.expr().as_ref() else {
            panic!("expected a generic expression");
        };
        assert_eq!(params.len(), 1);
        assert!(params[0].is_optional());
    }

    #[test]
    fn test_single_element_tuple_stays_a_tuple() {
        let expr = TypeExpr::generic(Origin::Tuple, vec![marked(TypeExpr::plain("u8"))]);
        let rewrite = rewrite_with_optional(&expr);
        assert_eq!(rewrite.expr().to_string(), "(Option<u8> #[partial::allowed],)");
    }

    #[test]
    fn test_failing_origin_falls_back_to_original() {
        let expr = TypeExpr::generic(
            Origin::Custom(Arc::new(Refusing)),
            vec![marked(TypeExpr::plain("String"))],
        );

        let mut rewriter = Rewriter::new();
        let rewrite = rewriter.rewrite(&expr);

        assert!(matches!(rewrite, Rewrite::Fallback { .. }));
        assert!(!rewrite.is_changed());
        assert!(Arc::ptr_eq(rewrite.expr(), &expr));
        assert_eq!(rewriter.fallbacks().len(), 1);
    }

    #[test]
    fn test_nested_fallback_is_recorded_and_siblings_still_rewritten() {
        let refusing = TypeExpr::generic(
            Origin::Custom(Arc::new(Refusing)),
            vec![marked(TypeExpr::plain("String"))],
        );
        let expr = TypeExpr::generic(
            Origin::Tuple,
            vec![Arc::clone(&refusing), marked(TypeExpr::plain("i32"))],
        );

        let mut rewriter = Rewriter::new();
        let rewrite = rewriter.rewrite(&expr);

        assert!(rewrite.is_changed());
        let params = rewrite.expr().params();
        assert!(Arc::ptr_eq(&params[0], &refusing));
        assert!(params[1].is_optional());

        let fallbacks = rewriter.into_fallbacks();
        assert_eq!(fallbacks.len(), 1);
        assert!(Arc::ptr_eq(&fallbacks[0].original, &refusing));
    }

    #[test]
    fn test_arity_mismatch_falls_back() {
        // A hand-built Map with a single parameter cannot be rebuilt.
        let expr = TypeExpr::generic(Origin::Map, vec![marked(TypeExpr::plain("String"))]);
        let rewrite = rewrite_with_optional(&expr);
        match rewrite {
            Rewrite::Fallback { original, error } => {
                assert!(Arc::ptr_eq(&original, &expr));
                assert_eq!(
                    error,
                    ReconstructError::ArityMismatch {
                        origin: "Map".to_string(),
                        expected: Arity::Exactly(2),
                        found: 1,
                    }
                );
            }
            other => panic!("expected a fallback, got {other:?}"),
        }
    }

    #[test]
    fn test_idempotent_on_marked_field() {
        let expr = marked(TypeExpr::plain("String"));
        let once = rewrite_with_optional(&expr).into_expr();
        let twice = rewrite_with_optional(&once);
        assert!(matches!(twice, Rewrite::Unchanged(_)));
        assert!(Arc::ptr_eq(twice.expr(), &once));
    }

    #[test]
    fn test_marked_optional_is_not_double_wrapped() {
        let expr = marked(TypeExpr::optional(TypeExpr::plain("String")));
        let rewrite = rewrite_with_optional(&expr);
        assert!(Arc::ptr_eq(rewrite.expr(), &expr));
    }
}
