//! Type references, structural identity and the unwrap helpers.
//!
//! A [`Ty`] is either a node of the graph or a synthetic wrapper built on top
//! of one (binding code frequently needs `T *` or `T const &` for a `T` that
//! the declaration dump never spelled out). Two types are equal when their
//! canonical strings are equal; typedefs are transparent.

use std::fmt;

use super::graph::DeclGraph;
use super::{CvQualifiers, DeclId, DeclKind, Signature};

/// Maximum typedef/declarator nesting followed before giving up.
const MAX_DEPTH: usize = 64;

/// A reference to a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    Node(DeclId),
    Pointer(Box<Ty>),
    Reference(Box<Ty>),
    Qualified(Box<Ty>, CvQualifiers),
}

impl Ty {
    pub fn node(id: DeclId) -> Ty {
        Ty::Node(id)
    }

    pub fn pointer(self) -> Ty {
        Ty::Pointer(Box::new(self))
    }

    pub fn reference(self) -> Ty {
        Ty::Reference(Box::new(self))
    }

    pub fn constant(self) -> Ty {
        Ty::Qualified(Box::new(self), CvQualifiers::CONST)
    }
}

impl From<DeclId> for Ty {
    fn from(id: DeclId) -> Self {
        Ty::Node(id)
    }
}

/// Canonical string of a type; the equality and hash key of types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(pub String);

impl TypeKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The outermost constructor of a type after typedefs are unwrapped.
#[derive(Debug, Clone)]
pub enum Shape<'g> {
    Pointer(Ty),
    Reference(Ty),
    Qualified(Ty, CvQualifiers),
    Array(Ty, Option<u64>),
    /// Anything else: a named type, a function type, or a non-type declaration.
    Decl(DeclId, &'g DeclKind),
}

impl DeclGraph {
    // ========================================================================
    // Structural views
    // ========================================================================

    /// Follow typedef chains starting at `id`.
    pub fn resolve_typedefs(&self, mut id: DeclId) -> DeclId {
        for _ in 0..MAX_DEPTH {
            match &self.get(id).kind {
                DeclKind::Typedef {
                    target: Ty::Node(next),
                    ..
                } => id = *next,
                _ => return id,
            }
        }
        id
    }

    /// The outermost constructor of `ty`.
    pub fn shape<'g>(&'g self, ty: &Ty) -> Shape<'g> {
        match ty {
            Ty::Pointer(inner) => Shape::Pointer((**inner).clone()),
            Ty::Reference(inner) => Shape::Reference((**inner).clone()),
            Ty::Qualified(inner, cv) => Shape::Qualified((**inner).clone(), *cv),
            Ty::Node(id) => {
                let id = self.resolve_typedefs(*id);
                match &self.get(id).kind {
                    DeclKind::Typedef { target, .. } => self.shape(&target.clone()),
                    DeclKind::Pointer(inner) => Shape::Pointer(inner.clone()),
                    DeclKind::Reference(inner) => Shape::Reference(inner.clone()),
                    DeclKind::CvQualified(inner, cv) => Shape::Qualified(inner.clone(), *cv),
                    DeclKind::Array { element, max } => Shape::Array(element.clone(), *max),
                    kind => Shape::Decl(id, kind),
                }
            }
        }
    }

    /// Drop typedefs wrapped around the outermost constructor.
    pub fn unwrap_typedef(&self, ty: &Ty) -> Ty {
        match ty {
            Ty::Node(id) => match &self.get(self.resolve_typedefs(*id)).kind {
                DeclKind::Typedef { target, .. } => self.unwrap_typedef(target),
                _ => Ty::Node(self.resolve_typedefs(*id)),
            },
            other => other.clone(),
        }
    }

    /// Drop one level of cv-qualification, if present.
    pub fn strip_cv(&self, ty: &Ty) -> Ty {
        match self.shape(ty) {
            Shape::Qualified(inner, _) => self.unwrap_typedef(&inner),
            _ => self.unwrap_typedef(ty),
        }
    }

    /// Drop one level of pointer or reference, then cv-qualification.
    pub fn strip_pointer_or_reference(&self, ty: &Ty) -> Ty {
        match self.shape(ty) {
            Shape::Pointer(inner) | Shape::Reference(inner) => self.strip_cv(&inner),
            _ => self.strip_cv(ty),
        }
    }

    /// Whether the outermost constructor is a `const` qualification.
    pub fn is_const(&self, ty: &Ty) -> bool {
        matches!(self.shape(ty), Shape::Qualified(_, cv) if cv.is_const)
    }

    /// The class a type names directly, without looking through pointers.
    pub fn class_of(&self, ty: &Ty) -> Option<DeclId> {
        match self.shape(ty) {
            Shape::Decl(id, DeclKind::Class(_)) => Some(id),
            _ => None,
        }
    }

    // ========================================================================
    // Identity
    // ========================================================================

    /// The canonical string of a type.
    pub fn type_string(&self, ty: &Ty) -> String {
        match ty {
            Ty::Node(id) => self.canonical(*id).to_string(),
            other => self.render(other, "", 0),
        }
    }

    pub fn key(&self, ty: &Ty) -> TypeKey {
        TypeKey(self.type_string(ty))
    }

    /// Structural equality.
    pub fn same_type(&self, a: &Ty, b: &Ty) -> bool {
        a == b || self.type_string(a) == self.type_string(b)
    }

    /// A declaration of `name` with type `ty`: `char const *name`.
    pub fn declaration(&self, ty: &Ty, name: &str) -> String {
        self.render(ty, name, 0)
    }

    /// Render `ty` in declarator syntax with `deriv` as the declarator.
    pub(crate) fn render(&self, ty: &Ty, deriv: &str, depth: usize) -> String {
        if depth > MAX_DEPTH {
            return "<recursive type>".to_string();
        }
        let depth = depth + 1;
        match ty {
            Ty::Pointer(inner) => self.render(inner, &format!("*{deriv}"), depth),
            Ty::Reference(inner) => self.render(inner, &format!("&{deriv}"), depth),
            Ty::Qualified(inner, cv) => self.render(inner, &qualified(*cv, deriv), depth),
            Ty::Node(id) => self.render_node(*id, deriv, depth),
        }
    }

    fn render_node(&self, id: DeclId, deriv: &str, depth: usize) -> String {
        let decl = self.get(id);
        match &decl.kind {
            DeclKind::Pointer(inner) => self.render(inner, &format!("*{deriv}"), depth),
            DeclKind::Reference(inner) => self.render(inner, &format!("&{deriv}"), depth),
            DeclKind::CvQualified(inner, cv) => self.render(inner, &qualified(*cv, deriv), depth),
            DeclKind::Typedef { target, .. } => self.render(target, deriv, depth),
            DeclKind::Array { element, max } => {
                let part = match max {
                    Some(max) => format!("[{}]", max + 1),
                    None => "[]".to_string(),
                };
                let inner = if deriv.is_empty() {
                    part
                } else {
                    format!("({deriv}){part}")
                };
                self.render(element, &inner, depth)
            }
            DeclKind::FunctionType(sig) => {
                let declarator = format!("({deriv})({})", self.render_args(sig, depth));
                self.render(&sig.returns, &declarator, depth)
            }
            DeclKind::MethodType {
                class,
                signature,
                is_const,
            } => {
                let mut declarator = format!(
                    "({}::{deriv})({})",
                    self.render(class, "", depth),
                    self.render_args(signature, depth)
                );
                if *is_const {
                    declarator.push_str(" const");
                }
                self.render(&signature.returns, &declarator, depth)
            }
            DeclKind::OffsetType { class, member } => {
                let declarator = format!("({}::{deriv})", self.render(class, "", depth));
                self.render(member, &declarator, depth)
            }
            DeclKind::Unresolved => with_declarator(format!("<undefined {}>", decl.key), deriv),
            _ => with_declarator(self.full_name(id), deriv),
        }
    }

    fn render_args(&self, sig: &Signature, depth: usize) -> String {
        let mut parts: Vec<String> = sig
            .args
            .iter()
            .map(|a| self.render(&a.ty, "", depth))
            .collect();
        if sig.variadic {
            parts.push("...".to_string());
        }
        parts.join(",")
    }
}

fn qualified(cv: CvQualifiers, deriv: &str) -> String {
    let mut words = Vec::new();
    if cv.is_const {
        words.push("const");
    }
    if cv.is_volatile {
        words.push("volatile");
    }
    if cv.is_restrict {
        words.push("restrict");
    }
    if !deriv.is_empty() {
        words.push(deriv);
    }
    words.join(" ")
}

fn with_declarator(name: String, deriv: &str) -> String {
    if deriv.is_empty() {
        name
    } else {
        format!("{name} {deriv}")
    }
}
