//! The declaration arena and the link pass that builds it.
//!
//! [`DeclGraph::link`] turns an [`IntrospectionTable`] into an immutable graph
//! in two phases:
//!
//! 1. Every record gets a [`DeclId`] in document order.
//! 2. Every identifier field is resolved to an id. An identifier that no
//!    record defines gets a sentinel [`DeclKind::Unresolved`] node; consumers
//!    raise [`SpecError::DanglingReference`] only if they dereference it.
//!
//! Member lists are not read from the records. They are rebuilt from the
//! `context` attribute each child carries.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::record::{ArgumentRecord, ClassRecord, FunctionRecord, MethodRecord};
use super::{
    Access, Argument, Base, Callable, ClassDecl, ConstructorDecl, CvQualifiers, Decl, DeclId,
    DeclKind, DestructorDecl, FieldDecl, IntrospectionTable, NamedType, Record, Signature, Ty,
};
use crate::error::{SpecError, SpecResult};

/// Name recorded for the global namespace.
pub const ROOT_NAMESPACE: &str = "::";

/// Immutable, linked declaration graph.
#[derive(Debug, Clone)]
pub struct DeclGraph {
    decls: Vec<Decl>,
    by_key: HashMap<String, DeclId>,
    members: Vec<Vec<DeclId>>,
    canonical: Vec<String>,
    root: DeclId,
}

/// Identifier resolution state for the link pass.
struct Linker<'t> {
    by_key: HashMap<&'t str, DeclId>,
    defined: usize,
    sentinels: Vec<String>,
}

impl<'t> Linker<'t> {
    fn id(&mut self, key: &str) -> DeclId {
        if let Some(id) = self.by_key.get(key) {
            return *id;
        }
        if let Some(pos) = self.sentinels.iter().position(|s| s == key) {
            return DeclId((self.defined + pos) as u32);
        }
        self.sentinels.push(key.to_string());
        DeclId((self.defined + self.sentinels.len() - 1) as u32)
    }

    fn ty(&mut self, key: &str) -> Ty {
        Ty::Node(self.id(key))
    }

    fn args(&mut self, args: &[ArgumentRecord]) -> Vec<Argument> {
        args.iter()
            .map(|a| Argument {
                ty: self.ty(&a.ty),
                name: a.name.clone(),
                default: a.default.clone(),
            })
            .collect()
    }

    fn class(&mut self, record: &ClassRecord, is_struct: bool) -> DeclKind {
        DeclKind::Class(ClassDecl {
            name: record.name.clone(),
            is_struct,
            bases: record
                .bases
                .iter()
                .map(|b| Base {
                    ty: self.ty(&b.ty),
                    access: b.access,
                    is_virtual: b.is_virtual,
                    offset: b.offset,
                })
                .collect(),
            size: record.size,
        })
    }

    fn function(&mut self, record: &FunctionRecord, is_operator: bool) -> DeclKind {
        DeclKind::Function(Callable {
            name: record.name.clone(),
            signature: Signature {
                returns: self.ty(&record.returns),
                args: self.args(&record.arguments),
                variadic: record.variadic,
            },
            access: Access::Public,
            is_operator,
            is_static: false,
            is_const: false,
            is_virtual: false,
            is_pure_virtual: false,
            throw: record.throw.clone(),
            attributes: record.attributes.clone(),
        })
    }

    fn method(&mut self, record: &MethodRecord, is_operator: bool) -> DeclKind {
        DeclKind::Method(Callable {
            name: record.name.clone(),
            signature: Signature {
                returns: self.ty(&record.returns),
                args: self.args(&record.arguments),
                variadic: record.variadic,
            },
            access: record.access,
            is_operator,
            is_static: record.is_static,
            is_const: record.is_const,
            is_virtual: record.is_virtual || record.pure_virtual,
            is_pure_virtual: record.pure_virtual,
            throw: record.throw.clone(),
            attributes: record.attributes.clone(),
        })
    }

    fn kind(&mut self, record: &Record) -> DeclKind {
        match record {
            Record::Namespace { name, .. } => DeclKind::Namespace { name: name.clone() },
            Record::Class(c) => self.class(c, false),
            Record::Struct(c) => self.class(c, true),
            Record::Union { name, size, .. } => DeclKind::Union(NamedType {
                name: name.clone(),
                size: *size,
            }),
            Record::Enumeration { name, size, .. } => DeclKind::Enumeration(NamedType {
                name: name.clone(),
                size: *size,
            }),
            Record::FundamentalType { name, size } => DeclKind::Fundamental(NamedType {
                name: Some(name.clone()),
                size: *size,
            }),
            Record::PointerType { ty } => DeclKind::Pointer(self.ty(ty)),
            Record::ReferenceType { ty } => DeclKind::Reference(self.ty(ty)),
            Record::CvQualifiedType {
                ty,
                is_const,
                is_volatile,
                is_restrict,
            } => DeclKind::CvQualified(
                self.ty(ty),
                CvQualifiers {
                    is_const: *is_const,
                    is_volatile: *is_volatile,
                    is_restrict: *is_restrict,
                },
            ),
            Record::ArrayType { ty, max } => DeclKind::Array {
                element: self.ty(ty),
                max: *max,
            },
            Record::FunctionType {
                returns,
                arguments,
                variadic,
            } => DeclKind::FunctionType(Signature {
                returns: self.ty(returns),
                args: self.args(arguments),
                variadic: *variadic,
            }),
            Record::MethodType {
                basetype,
                returns,
                arguments,
                variadic,
                is_const,
            } => DeclKind::MethodType {
                class: self.ty(basetype),
                signature: Signature {
                    returns: self.ty(returns),
                    args: self.args(arguments),
                    variadic: *variadic,
                },
                is_const: *is_const,
            },
            Record::OffsetType { basetype, ty } => DeclKind::OffsetType {
                class: self.ty(basetype),
                member: self.ty(ty),
            },
            Record::Typedef { name, ty, .. } => DeclKind::Typedef {
                name: name.clone(),
                target: self.ty(ty),
            },
            Record::Field {
                name,
                ty,
                access,
                offset,
                is_static,
                ..
            } => DeclKind::Field(FieldDecl {
                name: name.clone(),
                ty: self.ty(ty),
                access: *access,
                offset: *offset,
                is_static: *is_static,
            }),
            Record::Function(f) => self.function(f, false),
            Record::OperatorFunction(f) => self.function(f, true),
            Record::Method(m) => self.method(m, false),
            Record::OperatorMethod(m) => self.method(m, true),
            Record::Constructor {
                name,
                access,
                arguments,
                variadic,
                artificial,
                ..
            } => DeclKind::Constructor(ConstructorDecl {
                name: name.clone(),
                args: self.args(arguments),
                variadic: *variadic,
                access: *access,
                artificial: *artificial,
            }),
            Record::Destructor {
                name,
                access,
                is_virtual,
                artificial,
                ..
            } => DeclKind::Destructor(DestructorDecl {
                name: name.clone(),
                access: *access,
                is_virtual: *is_virtual,
                artificial: *artificial,
            }),
            Record::Variable { name, ty, init, .. } => DeclKind::Variable {
                name: name.clone(),
                ty: self.ty(ty),
                init: init.clone(),
            },
            Record::Unimplemented => DeclKind::Unimplemented,
        }
    }
}

impl DeclGraph {
    /// Link an introspection table into a graph.
    ///
    /// Fails only when a class-member record does not name its class.
    pub fn link(table: &IntrospectionTable) -> SpecResult<DeclGraph> {
        let mut linker = Linker {
            by_key: table
                .iter()
                .enumerate()
                .map(|(i, (key, _))| (key, DeclId(i as u32)))
                .collect(),
            defined: table.len(),
            sentinels: Vec::new(),
        };

        let mut decls = Vec::with_capacity(table.len() + 1);
        let mut root = None;
        for (key, record) in table.iter() {
            let context = match record.context() {
                Some(ctx) => Some(linker.id(ctx)),
                None if record.requires_context() => {
                    return Err(SpecError::MissingAttribute {
                        key: key.to_string(),
                        attribute: "context".to_string(),
                    });
                }
                None => None,
            };
            if root.is_none() && context.is_none() && matches!(record, Record::Namespace { .. }) {
                root = Some(DeclId(decls.len() as u32));
            }
            decls.push(Decl {
                key: key.to_string(),
                context,
                kind: linker.kind(record),
            });
        }

        let unresolved = linker.sentinels.len();
        for key in linker.sentinels {
            decls.push(Decl {
                key,
                context: None,
                kind: DeclKind::Unresolved,
            });
        }

        let root = match root {
            Some(root) => root,
            None => {
                decls.push(Decl {
                    key: ROOT_NAMESPACE.to_string(),
                    context: None,
                    kind: DeclKind::Namespace {
                        name: Some(ROOT_NAMESPACE.to_string()),
                    },
                });
                DeclId((decls.len() - 1) as u32)
            }
        };

        let mut members = vec![Vec::new(); decls.len()];
        for (i, decl) in decls.iter().enumerate() {
            if let Some(ctx) = decl.context {
                members[ctx.index()].push(DeclId(i as u32));
            }
        }

        let by_key = decls
            .iter()
            .enumerate()
            .map(|(i, d)| (d.key.clone(), DeclId(i as u32)))
            .collect();

        let mut graph = DeclGraph {
            decls,
            by_key,
            members,
            canonical: Vec::new(),
            root,
        };
        graph.canonical = (0..graph.decls.len())
            .map(|i| graph.render(&Ty::Node(DeclId(i as u32)), "", 0))
            .collect();

        debug!(
            declarations = graph.decls.len(),
            unresolved, "linked declaration graph"
        );
        Ok(graph)
    }

    // ========================================================================
    // Node access
    // ========================================================================

    /// Get a declaration by id.
    ///
    /// Ids are only ever created by [`DeclGraph::link`], so they are always in range.
    pub fn get(&self, id: DeclId) -> &Decl {
        &self.decls[id.index()]
    }

    pub fn kind(&self, id: DeclId) -> &DeclKind {
        &self.get(id).kind
    }

    /// Look up a declaration by its table identifier.
    pub fn by_key(&self, key: &str) -> Option<DeclId> {
        self.by_key.get(key).copied()
    }

    /// The global namespace.
    pub fn root(&self) -> DeclId {
        self.root
    }

    /// Number of nodes, sentinels included.
    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    /// All ids in arena order.
    pub fn ids(&self) -> impl Iterator<Item = DeclId> + '_ {
        (0..self.decls.len()).map(|i| DeclId(i as u32))
    }

    /// Members declared directly inside `id`, in document order.
    pub fn members(&self, id: DeclId) -> &[DeclId] {
        &self.members[id.index()]
    }

    /// Cached canonical string of a node.
    pub fn canonical(&self, id: DeclId) -> &str {
        &self.canonical[id.index()]
    }

    /// Error out when `id` is a sentinel for an undefined identifier.
    pub fn ensure_defined(&self, id: DeclId) -> SpecResult<()> {
        match self.kind(id) {
            DeclKind::Unresolved => Err(SpecError::DanglingReference {
                key: self.get(id).key.clone(),
            }),
            _ => Ok(()),
        }
    }

    // ========================================================================
    // Names
    // ========================================================================

    /// The declared name, if the node has one.
    pub fn name(&self, id: DeclId) -> Option<&str> {
        match self.kind(id) {
            DeclKind::Namespace { name } => name.as_deref(),
            DeclKind::Class(c) => c.name.as_deref(),
            DeclKind::Union(t) | DeclKind::Enumeration(t) | DeclKind::Fundamental(t) => {
                t.name.as_deref()
            }
            DeclKind::Typedef { name, .. } | DeclKind::Variable { name, .. } => Some(name),
            DeclKind::Field(f) => Some(&f.name),
            DeclKind::Function(c) | DeclKind::Method(c) => Some(&c.name),
            DeclKind::Constructor(c) => c.name.as_deref(),
            DeclKind::Destructor(d) => Some(&d.name),
            _ => None,
        }
    }

    /// The name as written in source: `operator+`, `~Widget`.
    pub fn canon_name(&self, id: DeclId) -> String {
        match self.kind(id) {
            DeclKind::Function(c) | DeclKind::Method(c) if c.is_operator => {
                format!("operator {}", c.name)
            }
            DeclKind::Destructor(d) => format!("~{}", d.name),
            _ => self.name(id).unwrap_or_default().to_string(),
        }
    }

    /// An unnamed namespace other than the root; its members are reached
    /// without naming it.
    fn is_anonymous_namespace(&self, id: DeclId) -> bool {
        matches!(self.kind(id), DeclKind::Namespace { name }
            if name.as_deref().is_none_or(|n| n == ROOT_NAMESPACE))
    }

    /// Qualified name, joining enclosing scopes with `::`.
    ///
    /// Anonymous namespaces are skipped; the scopes around them are kept.
    pub fn full_name(&self, id: DeclId) -> String {
        let mut parts = vec![self.canon_name(id)];
        let mut seen = HashSet::from([id]);
        let mut ctx = self.get(id).context;
        while let Some(c) = ctx {
            if c == self.root || !seen.insert(c) {
                break;
            }
            if !self.is_anonymous_namespace(c) {
                parts.push(self.canon_name(c));
            }
            ctx = self.get(c).context;
        }
        parts.reverse();
        parts.join("::")
    }

    /// Access of a class member; everything else is public.
    pub fn access(&self, id: DeclId) -> Access {
        match self.kind(id) {
            DeclKind::Field(f) => f.access,
            DeclKind::Method(c) => c.access,
            DeclKind::Constructor(c) => c.access,
            DeclKind::Destructor(d) => d.access,
            _ => Access::Public,
        }
    }

    // ========================================================================
    // Classes
    // ========================================================================

    pub fn class(&self, id: DeclId) -> Option<&ClassDecl> {
        match self.kind(id) {
            DeclKind::Class(c) => Some(c),
            _ => None,
        }
    }

    /// Direct bases of a class; empty for anything else.
    pub fn bases(&self, id: DeclId) -> &[Base] {
        self.class(id).map(|c| c.bases.as_slice()).unwrap_or(&[])
    }

    /// Total number of direct and indirect bases, counted per inheritance path.
    pub fn base_class_count(&self, id: DeclId) -> usize {
        let mut path = HashSet::new();
        self.count_bases(id, &mut path)
    }

    fn count_bases(&self, id: DeclId, path: &mut HashSet<DeclId>) -> usize {
        if !path.insert(id) {
            return 0;
        }
        let count = self
            .bases(id)
            .iter()
            .map(|b| {
                1 + self
                    .class_of(&b.ty)
                    .map(|base| self.count_bases(base, path))
                    .unwrap_or(0)
            })
            .sum();
        path.remove(&id);
        count
    }

    /// Whether `base` is `class` or one of its direct or indirect bases.
    pub fn is_base_of(&self, base: DeclId, class: DeclId) -> bool {
        let mut stack = vec![class];
        let mut seen = HashSet::new();
        while let Some(c) = stack.pop() {
            if c == base {
                return true;
            }
            if seen.insert(c) {
                stack.extend(self.bases(c).iter().filter_map(|b| self.class_of(&b.ty)));
            }
        }
        false
    }

    /// Whether any member of the class is pure virtual.
    pub fn is_abstract(&self, id: DeclId) -> bool {
        self.members(id)
            .iter()
            .any(|m| matches!(self.kind(*m), DeclKind::Method(c) if c.is_pure_virtual))
    }

    /// Constructors declared by the class, in document order.
    pub fn constructors(&self, id: DeclId) -> impl Iterator<Item = (DeclId, &ConstructorDecl)> {
        self.members(id)
            .iter()
            .filter_map(move |m| match self.kind(*m) {
                DeclKind::Constructor(c) => Some((*m, c)),
                _ => None,
            })
    }

    /// Whether destroying a value of this type runs no user code.
    pub fn has_trivial_destructor(&self, ty: &Ty) -> bool {
        let mut seen = HashSet::new();
        self.trivially_destructible(ty, &mut seen)
    }

    fn trivially_destructible(&self, ty: &Ty, seen: &mut HashSet<DeclId>) -> bool {
        let class = match self.shape(&self.strip_cv(ty)) {
            super::Shape::Array(element, _) => return self.trivially_destructible(&element, seen),
            super::Shape::Decl(id, DeclKind::Class(_)) => id,
            _ => return true,
        };
        if !seen.insert(class) {
            return true;
        }
        let own = self.members(class).iter().all(|m| match self.kind(*m) {
            DeclKind::Destructor(d) => d.artificial,
            DeclKind::Field(f) if !f.is_static => self.trivially_destructible(&f.ty, seen),
            _ => true,
        });
        own && self
            .bases(class)
            .iter()
            .all(|b| self.trivially_destructible(&b.ty, seen))
    }
}
