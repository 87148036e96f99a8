//! Type expressions: the declared shape of a field's type.
//!
//! A type expression is either a plain type, a generic container
//! parameterized by other type expressions, or an annotated expression that
//! carries auxiliary tags next to its base. Expressions are shared through
//! [`TypeRef`] so that "did anything change" can be answered with
//! [`Arc::ptr_eq`] instead of a structural comparison.

use std::fmt;
use std::sync::Arc;

use crate::rewrite::ReconstructError;

/// Shared handle to a type expression.
pub type TypeRef = Arc<TypeExpr>;

/// A recursive description of a field's declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// A type without parameters (`String`, `i64`, a user struct).
    Plain {
        /// Type name without generic parameters
        name: String,
    },

    /// A generic container applied to parameters (`Vec<T>`, `Option<T>`, ...).
    Generic {
        /// The generic declaration being applied
        origin: Origin,
        /// Parameters, in declaration order
        params: Vec<TypeRef>,
    },

    /// A base expression plus auxiliary tags.
    Annotated {
        /// The annotated expression
        base: TypeRef,
        /// Tags, in declaration order
        tags: Vec<Tag>,
    },
}

impl TypeExpr {
    /// A plain type.
    pub fn plain(name: impl Into<String>) -> TypeRef {
        Arc::new(TypeExpr::Plain { name: name.into() })
    }

    /// A generic container applied to `params`.
    ///
    /// No arity checking happens here; use [`Origin::parameterize`] for that.
    pub fn generic(origin: Origin, params: Vec<TypeRef>) -> TypeRef {
        Arc::new(TypeExpr::Generic { origin, params })
    }

    /// `Option<inner>`.
    pub fn optional(inner: TypeRef) -> TypeRef {
        Self::generic(Origin::Option, vec![inner])
    }

    /// `base` with `tags` attached.
    pub fn annotated(base: TypeRef, tags: Vec<Tag>) -> TypeRef {
        Arc::new(TypeExpr::Annotated { base, tags })
    }

    /// Whether this expression is `Option<_>`, looking through annotations.
    pub fn is_optional(&self) -> bool {
        match self {
            TypeExpr::Generic {
                origin: Origin::Option,
                ..
            } => true,
            TypeExpr::Annotated { base, .. } => base.is_optional(),
            _ => false,
        }
    }

    /// Whether this expression carries the nullability marker at its top level.
    pub fn is_partial_allowed(&self) -> bool {
        match self {
            TypeExpr::Annotated { tags, .. } => tags.contains(&Tag::PartialAllowed),
            _ => false,
        }
    }

    /// Whether the nullability marker appears anywhere in this expression.
    pub fn mentions_partial_allowed(&self) -> bool {
        match self {
            TypeExpr::Plain { .. } => false,
            TypeExpr::Generic { params, .. } => params.iter().any(|p| p.mentions_partial_allowed()),
            TypeExpr::Annotated { base, tags } => {
                tags.contains(&Tag::PartialAllowed) || base.mentions_partial_allowed()
            }
        }
    }

    /// Parameters of a generic expression, empty for everything else.
    pub fn params(&self) -> &[TypeRef] {
        match self {
            TypeExpr::Generic { params, .. } => params,
            _ => &[],
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Plain { name } => write!(f, "{name}"),
            TypeExpr::Generic {
                origin: Origin::Tuple,
                params,
            } => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                if params.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            TypeExpr::Generic { origin, params } => {
                write!(f, "{}<", origin.name())?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ">")
            }
            TypeExpr::Annotated { base, tags } => {
                write!(f, "{base} #[")?;
                for (i, t) in tags.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// An auxiliary tag attached to an annotated expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    /// The field may be NULL when it appears on a partial variant.
    PartialAllowed,

    /// Any other namespaced attribute, carried along untouched.
    Attr {
        /// Attribute namespace (e.g. `partial`)
        ns: &'static str,
        /// Attribute key (e.g. `unique`)
        key: &'static str,
    },
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::PartialAllowed => write!(f, "partial::allowed"),
            Tag::Attr { ns, key } => write!(f, "{ns}::{key}"),
        }
    }
}

/// How many parameters a generic origin takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many parameters
    Exactly(usize),
    /// One or more parameters
    AtLeastOne,
}

impl Arity {
    fn accepts(&self, n: usize) -> bool {
        match self {
            Arity::Exactly(expected) => n == *expected,
            Arity::AtLeastOne => n >= 1,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "{n}"),
            Arity::AtLeastOne => write!(f, "at least 1"),
        }
    }
}

/// Parameters handed to [`Origin::parameterize`].
///
/// A single parameter is passed as [`GenericArgs::One`], never as a
/// one-element list.
#[derive(Debug, Clone)]
pub enum GenericArgs {
    /// Exactly one parameter
    One(TypeRef),
    /// Zero or several parameters
    Many(Vec<TypeRef>),
}

impl GenericArgs {
    /// Build from a parameter list, collapsing the single-parameter case.
    pub fn from_vec(mut params: Vec<TypeRef>) -> Self {
        if params.len() == 1
            && let Some(only) = params.pop()
        {
            return GenericArgs::One(only);
        }
        GenericArgs::Many(params)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        match self {
            GenericArgs::One(_) => 1,
            GenericArgs::Many(params) => params.len(),
        }
    }

    /// Whether there are no parameters at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten back into a parameter list.
    pub fn into_vec(self) -> Vec<TypeRef> {
        match self {
            GenericArgs::One(only) => vec![only],
            GenericArgs::Many(params) => params,
        }
    }
}

/// A generic declaration supplied from outside this crate.
///
/// Implementors decide how (and whether) they can be applied to a new
/// parameter list.
pub trait GenericOrigin: fmt::Debug + Send + Sync {
    /// Name used for display and equality.
    fn name(&self) -> &str;

    /// Validate `args` and return the parameter list of the reconstructed
    /// container.
    fn parameterize(&self, args: GenericArgs) -> Result<Vec<TypeRef>, ReconstructError>;
}

/// The generic declaration a [`TypeExpr::Generic`] applies.
#[derive(Debug, Clone)]
pub enum Origin {
    /// `Option<T>`
    Option,
    /// `Vec<T>`, slices, arrays
    List,
    /// `HashSet<T>`, `BTreeSet<T>`
    Set,
    /// `HashMap<K, V>`, `BTreeMap<K, V>`
    Map,
    /// `Result<T, E>`
    Result,
    /// `(A, B, ...)`
    Tuple,
    /// A user generic or smart pointer known by name (`Arc<T>`, `Wrapper<A, B>`).
    Named {
        /// Type identifier without parameters
        name: String,
        /// Number of type parameters
        arity: usize,
    },
    /// An origin implemented outside this crate.
    Custom(Arc<dyn GenericOrigin>),
}

impl Origin {
    /// Display name of this origin.
    pub fn name(&self) -> &str {
        match self {
            Origin::Option => "Option",
            Origin::List => "Vec",
            Origin::Set => "Set",
            Origin::Map => "Map",
            Origin::Result => "Result",
            Origin::Tuple => "Tuple",
            Origin::Named { name, .. } => name,
            Origin::Custom(custom) => custom.name(),
        }
    }

    /// Parameter count this origin accepts.
    ///
    /// Custom origins validate their own arguments and report `AtLeastOne`.
    pub fn arity(&self) -> Arity {
        match self {
            Origin::Option | Origin::List | Origin::Set => Arity::Exactly(1),
            Origin::Map | Origin::Result => Arity::Exactly(2),
            Origin::Tuple | Origin::Custom(_) => Arity::AtLeastOne,
            Origin::Named { arity, .. } => Arity::Exactly(*arity),
        }
    }

    /// Re-apply this origin to a new parameter list.
    pub fn parameterize(&self, args: GenericArgs) -> Result<Vec<TypeRef>, ReconstructError> {
        if let Origin::Custom(custom) = self {
            return custom.parameterize(args);
        }

        let arity = self.arity();
        if !arity.accepts(args.len()) {
            return Err(ReconstructError::ArityMismatch {
                origin: self.name().to_string(),
                expected: arity,
                found: args.len(),
            });
        }
        Ok(args.into_vec())
    }
}

impl PartialEq for Origin {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Origin::Option, Origin::Option)
            | (Origin::List, Origin::List)
            | (Origin::Set, Origin::Set)
            | (Origin::Map, Origin::Map)
            | (Origin::Result, Origin::Result)
            | (Origin::Tuple, Origin::Tuple) => true,
            (
                Origin::Named { name: a, arity: x },
                Origin::Named { name: b, arity: y },
            ) => a == b && x == y,
            (Origin::Custom(a), Origin::Custom(b)) => a.name() == b.name(),
            _ => false,
        }
    }
}
