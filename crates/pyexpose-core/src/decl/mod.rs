//! Declaration model: the linked type and symbol graph.
//!
//! This module provides the semantic data model for pyexpose:
//! - [`record`]: raw introspection records that reference each other by string identifier
//! - [`DeclGraph`]: the arena that links those records into a navigable graph
//! - [`Ty`]: a type reference, either a node of the graph or a synthetic wrapper around one
//!
//! Every declaration lives in one arena indexed by [`DeclId`]. Cross-references
//! (bases, member types, enclosing contexts) are ids, never owning pointers, so
//! mutually referencing classes need no cycle breaking.
//!
//! # Access Model
//!
//! [`Access`] is ordered from least to most restrictive. Composing an access
//! with the access of an inheritance edge takes the maximum: public members of
//! a privately inherited base are private through the derived class.

pub mod graph;
pub mod record;
pub mod types;

use serde::{Deserialize, Serialize};

pub use graph::DeclGraph;
pub use record::{IntrospectionTable, Record};
pub use types::{Shape, Ty, TypeKey};

// ============================================================================
// ID Types
// ============================================================================

/// Index of a declaration in the graph arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct DeclId(pub u32);

impl DeclId {
    /// Create a new declaration ID.
    pub fn new(id: u32) -> Self {
        DeclId(id)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for DeclId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "decl_{}", self.0)
    }
}

// ============================================================================
// Enums
// ============================================================================

/// Member access level, ordered from least to most restrictive.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    #[default]
    Public,
    Protected,
    Private,
}

impl Access {
    /// Access of a member seen through an inheritance edge with access `edge`.
    pub fn through(self, edge: Access) -> Access {
        self.max(edge)
    }
}

/// `const`/`volatile`/`restrict` flags of a cv-qualified type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CvQualifiers {
    pub is_const: bool,
    pub is_volatile: bool,
    pub is_restrict: bool,
}

impl CvQualifiers {
    /// Just `const`.
    pub const CONST: CvQualifiers = CvQualifiers {
        is_const: true,
        is_volatile: false,
        is_restrict: false,
    };
}

// ============================================================================
// Linked Declarations
// ============================================================================

/// One inheritance edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Base {
    pub ty: Ty,
    pub access: Access,
    pub is_virtual: bool,
    pub offset: u64,
}

/// A parameter of a callable.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub ty: Ty,
    pub name: Option<String>,
    /// Default-value expression, verbatim.
    pub default: Option<String>,
}

impl Argument {
    pub fn new(ty: Ty) -> Self {
        Argument {
            ty,
            name: None,
            default: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Return type and parameters of a function type or callable.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub returns: Ty,
    pub args: Vec<Argument>,
    pub variadic: bool,
}

/// A class or struct.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: Option<String>,
    pub is_struct: bool,
    pub bases: Vec<Base>,
    pub size: Option<u64>,
}

/// A named type without members of its own (fundamental, enumeration, union).
#[derive(Debug, Clone, PartialEq)]
pub struct NamedType {
    pub name: Option<String>,
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: Ty,
    pub access: Access,
    pub offset: u64,
    pub is_static: bool,
}

/// A free function or a method.
#[derive(Debug, Clone, PartialEq)]
pub struct Callable {
    pub name: String,
    pub signature: Signature,
    pub access: Access,
    pub is_operator: bool,
    pub is_static: bool,
    pub is_const: bool,
    pub is_virtual: bool,
    pub is_pure_virtual: bool,
    /// Exception specification; `Some("")` means `throw()`.
    pub throw: Option<String>,
    pub attributes: Vec<String>,
}

impl Callable {
    /// Number of leading parameters without a default value.
    pub fn mandatory_args(&self) -> usize {
        self.signature
            .args
            .iter()
            .take_while(|a| a.default.is_none())
            .count()
    }

    /// Whether a call can raise a native exception.
    pub fn can_throw(&self) -> bool {
        !(self.throw.as_deref() == Some("") || self.attributes.iter().any(|a| a == "nothrow"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorDecl {
    pub name: Option<String>,
    pub args: Vec<Argument>,
    pub variadic: bool,
    pub access: Access,
    pub artificial: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DestructorDecl {
    pub name: String,
    pub access: Access,
    pub is_virtual: bool,
    pub artificial: bool,
}

/// The closed set of declaration kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum DeclKind {
    Namespace { name: Option<String> },
    Class(ClassDecl),
    Union(NamedType),
    Enumeration(NamedType),
    Fundamental(NamedType),
    Pointer(Ty),
    Reference(Ty),
    CvQualified(Ty, CvQualifiers),
    Array { element: Ty, max: Option<u64> },
    FunctionType(Signature),
    /// Pointer-to-member-function type.
    MethodType {
        class: Ty,
        signature: Signature,
        is_const: bool,
    },
    /// Pointer-to-data-member type.
    OffsetType { class: Ty, member: Ty },
    Typedef { name: String, target: Ty },
    Field(FieldDecl),
    Function(Callable),
    Method(Callable),
    Constructor(ConstructorDecl),
    Destructor(DestructorDecl),
    Variable {
        name: String,
        ty: Ty,
        init: Option<String>,
    },
    Unimplemented,
    /// An identifier that was referenced but never defined.
    Unresolved,
}

impl DeclKind {
    /// Short description used in error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            DeclKind::Namespace { .. } => "namespace",
            DeclKind::Class(c) if c.is_struct => "struct",
            DeclKind::Class(_) => "class",
            DeclKind::Union(_) => "union",
            DeclKind::Enumeration(_) => "enumeration",
            DeclKind::Fundamental(_) => "fundamental type",
            DeclKind::Pointer(_) => "pointer type",
            DeclKind::Reference(_) => "reference type",
            DeclKind::CvQualified(..) => "cv-qualified type",
            DeclKind::Array { .. } => "array type",
            DeclKind::FunctionType(_) => "function type",
            DeclKind::MethodType { .. } => "method type",
            DeclKind::OffsetType { .. } => "member pointer type",
            DeclKind::Typedef { .. } => "typedef",
            DeclKind::Field(_) => "member variable",
            DeclKind::Function(_) => "function",
            DeclKind::Method(_) => "method",
            DeclKind::Constructor(_) => "constructor",
            DeclKind::Destructor(_) => "destructor",
            DeclKind::Variable { .. } => "variable",
            DeclKind::Unimplemented => "unimplemented declaration",
            DeclKind::Unresolved => "undefined declaration",
        }
    }

    /// Whether members can be looked up inside this declaration.
    pub fn is_scope(&self) -> bool {
        matches!(
            self,
            DeclKind::Namespace { .. } | DeclKind::Class(_) | DeclKind::Union(_)
        )
    }

    /// Whether this is a function or method.
    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            DeclKind::Function(c) | DeclKind::Method(c) => Some(c),
            _ => None,
        }
    }
}

/// A declaration node in the arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Decl {
    /// Identifier from the introspection table.
    pub key: String,
    /// Enclosing namespace or class.
    pub context: Option<DeclId>,
    pub kind: DeclKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_composes_to_the_more_restrictive_level() {
        assert_eq!(Access::Public.through(Access::Private), Access::Private);
        assert_eq!(Access::Protected.through(Access::Public), Access::Protected);
        assert_eq!(Access::Private.through(Access::Protected), Access::Private);
    }

    #[test]
    fn access_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Access::Protected).unwrap(),
            "\"protected\""
        );
    }
}
