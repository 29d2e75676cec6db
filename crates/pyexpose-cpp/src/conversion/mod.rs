//! Conversion registry: native types to and from runtime objects.
//!
//! The registry starts from the built-in scalar mappings resolved in
//! [`scalar`] and grows as classes are exposed. Every conversion is a
//! [`Template`] with a `{0}` placeholder for the expression being converted.
//!
//! # Ownership
//!
//! Returning a pointer or reference to an exposed class needs an
//! [`OwnershipSemantic`]. Wrapping semantics set a capability flag on the
//! class the first time they are used, so wrapper support is generated only
//! for classes that need it.
//!
//! # Helpers
//!
//! A class without a registered conversion may provide one by naming
//! convention: `__py_to_pyobject__()`, `static __py_from_pyobject__(PyObject *)`
//! and a `__py_cast_as_member_t__` field. A helper with the wrong signature is
//! reported as a warning and ignored.

pub mod scalar;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use pyexpose_core::decl::{Access, Callable, DeclGraph, DeclId, DeclKind, Shape, Ty, TypeKey};
use pyexpose_core::diagnostics::{BuildConfig, Diagnostics};
use pyexpose_core::error::{SpecError, SpecResult};

use crate::lookup::lookup_member;
use crate::overload::accepts_args;

pub use scalar::{coercion_guards, Bucket, NumericGuard, Scalar, ScalarTypes, COERCION};

/// Method converting an instance to a runtime object.
pub const TO_RUNTIME_HELPER: &str = "__py_to_pyobject__";
/// Static method building an instance from a runtime object.
pub const FROM_RUNTIME_HELPER: &str = "__py_from_pyobject__";
/// Field whose type names a member-storage descriptor.
pub const CAST_AS_MEMBER_FIELD: &str = "__py_cast_as_member_t__";

// ============================================================================
// Templates
// ============================================================================

/// A code template with `{0}` standing for the converted expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Template(String);

impl Template {
    pub const PLACEHOLDER: &'static str = "{0}";

    pub fn new(text: impl Into<String>) -> Self {
        Template(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substitute `expr` for every placeholder.
    pub fn fill(&self, expr: &str) -> String {
        self.0.replace(Self::PLACEHOLDER, expr)
    }

    /// Compose: the result applies `inner` first, then this template.
    pub fn wrap(&self, inner: &str) -> Template {
        Template(self.fill(inner))
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `*({0})` for pointers, `{0}` otherwise.
fn deref_placeholder(graph: &DeclGraph, ty: &Ty) -> &'static str {
    match graph.shape(ty) {
        Shape::Pointer(_) => "*({0})",
        _ => Template::PLACEHOLDER,
    }
}

// ============================================================================
// Ownership
// ============================================================================

/// How a returned value's lifetime relates to the runtime object wrapping it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipSemantic {
    /// The value is copied into a new runtime object.
    #[default]
    Copy,
    /// The runtime object refers to the value and keeps its owner alive.
    OwningReference,
    /// The runtime object takes ownership of a heap pointer.
    OwningPointer,
    /// The runtime object refers to the value without any lifetime link.
    UnmanagedReference,
    /// The call returns the receiver itself.
    #[serde(rename = "self")]
    SelfReturn,
}

/// Wrapper kinds an exposed class must support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Capabilities {
    pub owning_reference: bool,
    pub owning_pointer: bool,
    pub unmanaged_reference: bool,
}

impl Capabilities {
    fn mark(&mut self, semantic: OwnershipSemantic) -> bool {
        let flag = match semantic {
            OwnershipSemantic::OwningReference => &mut self.owning_reference,
            OwnershipSemantic::OwningPointer => &mut self.owning_pointer,
            OwnershipSemantic::UnmanagedReference => &mut self.unmanaged_reference,
            OwnershipSemantic::Copy | OwnershipSemantic::SelfReturn => return false,
        };
        !std::mem::replace(flag, true)
    }

    pub fn any(&self) -> bool {
        self.owning_reference || self.owning_pointer || self.unmanaged_reference
    }
}

// ============================================================================
// Exposed Classes
// ============================================================================

/// A class registered with the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposedClass {
    pub class: DeclId,
    /// Runtime-side name.
    pub name: String,
    pub capabilities: Capabilities,
    /// Exposed direct bases, in declaration order.
    pub bases: Vec<DeclId>,
    /// Exposed direct subclasses, in registration order.
    pub derived: Vec<DeclId>,
    /// Some exposed descendant inherits from more than one exposed class.
    pub multi_inherit_subclass: bool,
}

impl ExposedClass {
    /// Whether the class itself has more than one exposed base.
    pub fn multi_inherit(&self) -> bool {
        self.bases.len() > 1
    }

    /// Expression extracting a native reference from a checked runtime object.
    pub fn cast_base(&self) -> Template {
        if self.multi_inherit_subclass {
            Template(format!("get_base_{}({{0}},false)", self.name))
        } else {
            Template(format!("cast_base_{}({{0}})", self.name))
        }
    }
}

/// A runtime-to-native conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromTemplate {
    pub template: Template,
    /// The result refers to existing storage and may be bound to a
    /// non-const reference.
    pub aliasable: bool,
}

/// A resolved runtime-to-native conversion and the type it produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromRuntime {
    pub template: Template,
    pub produced: Ty,
}

/// Instance check and cast for an argument of exposed-class type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckAndCast {
    pub class: DeclId,
    pub check: Template,
    pub cast: Template,
}

// ============================================================================
// Registry
// ============================================================================

/// Conversion registry bound to one declaration graph.
#[derive(Debug)]
pub struct ConversionRegistry<'g> {
    graph: &'g DeclGraph,
    scalars: ScalarTypes,
    to: HashMap<TypeKey, Template>,
    from: HashMap<TypeKey, FromTemplate>,
    storage: HashMap<TypeKey, String>,
    from_ssize: HashMap<TypeKey, Template>,
    buckets: HashMap<TypeKey, Bucket>,
    classes: Vec<ExposedClass>,
    class_keys: HashMap<TypeKey, usize>,
}

impl<'g> ConversionRegistry<'g> {
    /// Create a registry holding the scalar conversions declared in `graph`.
    pub fn new(graph: &'g DeclGraph, config: &BuildConfig) -> Self {
        let scalars = ScalarTypes::resolve(graph, config);
        let mut registry = ConversionRegistry {
            graph,
            scalars: ScalarTypes::default(),
            to: HashMap::new(),
            from: HashMap::new(),
            storage: HashMap::new(),
            from_ssize: HashMap::new(),
            buckets: HashMap::new(),
            classes: Vec::new(),
            class_keys: HashMap::new(),
        };
        for (scalar, ty) in &scalars.types {
            let key = graph.key(ty);
            if let Some(to) = scalar.to_template() {
                registry
                    .to
                    .entry(key.clone())
                    .or_insert_with(|| Template::new(to));
            }
            if let Some((from, aliasable)) = scalar.from_template() {
                registry
                    .from
                    .entry(key.clone())
                    .or_insert_with(|| FromTemplate {
                        template: Template::new(from),
                        aliasable,
                    });
            }
            if let Some(storage) = scalar.storage() {
                registry
                    .storage
                    .entry(key.clone())
                    .or_insert_with(|| storage.to_string());
            }
            if let Some(narrow) = scalar.from_ssize_template() {
                registry
                    .from_ssize
                    .entry(key.clone())
                    .or_insert_with(|| Template::new(narrow));
            }
            if let Some(bucket) = scalar.bucket(scalars.long_is_wide) {
                registry.buckets.entry(key).or_insert(bucket);
            }
        }
        debug!(
            scalars = scalars.types.len(),
            long_is_wide = scalars.long_is_wide,
            "scalar conversions registered"
        );
        registry.scalars = scalars;
        registry
    }

    pub fn graph(&self) -> &'g DeclGraph {
        self.graph
    }

    pub fn scalars(&self) -> &ScalarTypes {
        &self.scalars
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Expose `class` under the runtime name `name`.
    ///
    /// Registering the same class again is a no-op.
    pub fn register_class(&mut self, class: DeclId, name: &str) -> SpecResult<()> {
        let graph = self.graph;
        graph.ensure_defined(class)?;
        if graph.class(class).is_none() {
            return Err(SpecError::wrong_kind(graph.full_name(class), "class"));
        }
        let key = graph.key(&Ty::Node(class));
        if self.class_keys.contains_key(&key) {
            return Ok(());
        }
        self.to.insert(
            key.clone(),
            Template(format!("reinterpret_cast<PyObject*>(new obj_{name}({{0}}))")),
        );
        self.from.insert(
            key.clone(),
            FromTemplate {
                template: Template(format!("get_base_{name}({{0}})")),
                aliasable: true,
            },
        );
        self.class_keys.insert(key, self.classes.len());
        self.classes.push(ExposedClass {
            class,
            name: name.to_string(),
            capabilities: Capabilities::default(),
            bases: Vec::new(),
            derived: Vec::new(),
            multi_inherit_subclass: false,
        });
        debug!(class = %graph.full_name(class), name, "class exposed");
        Ok(())
    }

    /// Register explicit conversions for a type, replacing existing ones.
    pub fn register_conversion(
        &mut self,
        ty: &Ty,
        to: Option<Template>,
        from: Option<FromTemplate>,
    ) {
        let key = self.graph.key(ty);
        trace!(ty = %key, "conversion registered");
        if let Some(to) = to {
            self.to.insert(key.clone(), to);
        }
        if let Some(from) = from {
            self.from.insert(key, from);
        }
    }

    /// Register a member-storage descriptor for a type.
    pub fn register_storage(&mut self, ty: &Ty, descriptor: impl Into<String>) {
        self.storage.insert(self.graph.key(ty), descriptor.into());
    }

    /// Record exposed bases and subclasses once every class is registered.
    pub fn link_hierarchy(&mut self) {
        let graph = self.graph;
        let bases: Vec<Vec<usize>> = self
            .classes
            .iter()
            .map(|c| {
                graph
                    .bases(c.class)
                    .iter()
                    .filter_map(|b| self.class_keys.get(&graph.key(&b.ty)).copied())
                    .collect()
            })
            .collect();

        for class in &mut self.classes {
            class.bases.clear();
            class.derived.clear();
        }
        for (index, class_bases) in bases.iter().enumerate() {
            let id = self.classes[index].class;
            for &base in class_bases {
                let base_id = self.classes[base].class;
                self.classes[index].bases.push(base_id);
                self.classes[base].derived.push(id);
            }
        }

        // A class has a multiply-inheriting subclass when any exposed
        // ancestor of a multiply-inheriting class is it.
        for class in &mut self.classes {
            class.multi_inherit_subclass = false;
        }
        let mut stack: Vec<usize> = (0..self.classes.len())
            .filter(|&i| bases[i].len() > 1)
            .flat_map(|i| bases[i].iter().copied())
            .collect();
        while let Some(index) = stack.pop() {
            if std::mem::replace(&mut self.classes[index].multi_inherit_subclass, true) {
                continue;
            }
            stack.extend(bases[index].iter().copied());
        }
        debug!(
            classes = self.classes.len(),
            multi = self
                .classes
                .iter()
                .filter(|c| c.multi_inherit_subclass)
                .count(),
            "class hierarchy linked"
        );
    }

    // ========================================================================
    // Exposed class queries
    // ========================================================================

    pub fn classes(&self) -> &[ExposedClass] {
        &self.classes
    }

    /// The exposed class named by `ty` (typedefs and cv-qualifiers ignored).
    pub fn exposed(&self, ty: &Ty) -> Option<&ExposedClass> {
        let key = self.graph.key(&self.graph.strip_cv(ty));
        self.class_keys.get(&key).map(|&i| &self.classes[i])
    }

    pub fn exposed_class(&self, class: DeclId) -> Option<&ExposedClass> {
        self.exposed(&Ty::Node(class))
    }

    fn mark(&mut self, ty: &Ty, semantic: OwnershipSemantic) -> Option<String> {
        let key = self.graph.key(&self.graph.strip_cv(ty));
        let index = *self.class_keys.get(&key)?;
        let class = &mut self.classes[index];
        if class.capabilities.mark(semantic) {
            debug!(class = %class.name, ?semantic, "wrapper capability required");
        }
        Some(class.name.clone())
    }

    // ========================================================================
    // Native to runtime
    // ========================================================================

    fn to_base(&self, ty: &Ty, diag: &mut Diagnostics) -> SpecResult<Option<Template>> {
        let graph = self.graph;
        if let Some(t) = self.to.get(&graph.key(ty)) {
            return Ok(Some(t.clone()));
        }
        let Some(class) = graph.class_of(ty) else {
            return Ok(None);
        };
        let pyobject = self.scalars.get(Scalar::PyObject);
        let found = self.find_helper(class, TO_RUNTIME_HELPER, false, diag, |f| {
            pyobject.is_some_and(|p| graph.same_type(&f.signature.returns, p))
                && accepts_args(graph, f, &[])
        })?;
        Ok(found.map(|_| Template(format!("({{0}}).{TO_RUNTIME_HELPER}()"))))
    }

    /// Template converting a value of `ty` to a runtime object.
    ///
    /// `owner` is the expression of the object that keeps a returned
    /// reference alive. `temporary` is false when the value outlives the
    /// conversion (a data member, a global), which lets unmanaged references
    /// wrap non-reference types.
    pub fn to_runtime(
        &mut self,
        ty: &Ty,
        semantic: OwnershipSemantic,
        owner: Option<&str>,
        temporary: bool,
        diag: &mut Diagnostics,
    ) -> SpecResult<Template> {
        let graph = self.graph;
        let t = graph.strip_cv(ty);
        let missing_owner = || SpecError::MissingOwner {
            ty: graph.type_string(&t),
        };

        if semantic == OwnershipSemantic::SelfReturn {
            let owner = owner.ok_or_else(missing_owner)?;
            return Ok(Template(format!("({{0}},Py_INCREF({owner}),{owner})")));
        }

        if semantic == OwnershipSemantic::UnmanagedReference && !temporary {
            let target = graph.strip_pointer_or_reference(&t);
            if let Some(name) = self.mark(&target, semantic) {
                return Ok(Template(format!(
                    "reinterpret_cast<PyObject*>(new uref_{name}({}))",
                    deref_placeholder(graph, &t)
                )));
            }
        }

        if let Some(tpl) = self.to_base(&t, diag)? {
            return Ok(tpl);
        }

        match graph.shape(&t) {
            Shape::Array(element, _) => {
                let element = if graph.is_const(ty) {
                    element.constant()
                } else {
                    element
                };
                if let Some(tpl) = self.to.get(&graph.key(&element.pointer())) {
                    return Ok(tpl.clone());
                }
            }
            Shape::Pointer(inner) => {
                if let Some(tpl) = self.to_pointee(&t, &inner, true, semantic, owner, diag)? {
                    return Ok(tpl);
                }
            }
            Shape::Reference(inner) => {
                if let Some(tpl) = self.to_pointee(&t, &inner, false, semantic, owner, diag)? {
                    return Ok(tpl);
                }
            }
            _ => {}
        }

        Err(SpecError::NoToRuntimeConversion {
            ty: graph.type_string(&t),
        })
    }

    fn to_pointee(
        &mut self,
        t: &Ty,
        inner: &Ty,
        is_pointer: bool,
        semantic: OwnershipSemantic,
        owner: Option<&str>,
        diag: &mut Diagnostics,
    ) -> SpecResult<Option<Template>> {
        let graph = self.graph;
        let pointee = graph.strip_cv(inner);
        if semantic == OwnershipSemantic::Copy {
            let tpl = self.to_base(&pointee, diag)?;
            return Ok(tpl.map(|tpl| if is_pointer { tpl.wrap("*({0})") } else { tpl }));
        }
        if self.exposed(&pointee).is_none() {
            return Ok(None);
        }
        let deref = deref_placeholder(graph, t);
        let owner = match (semantic, owner) {
            (OwnershipSemantic::OwningReference, None) => {
                return Err(SpecError::MissingOwner {
                    ty: graph.type_string(t),
                })
            }
            (_, owner) => owner.unwrap_or_default(),
        };
        let Some(name) = self.mark(&pointee, semantic) else {
            return Ok(None);
        };
        let tpl = match semantic {
            OwnershipSemantic::OwningReference => format!(
                "reinterpret_cast<PyObject*>(new ref_{name}({deref},reinterpret_cast<PyObject*>({owner})))"
            ),
            OwnershipSemantic::UnmanagedReference => {
                format!("reinterpret_cast<PyObject*>(new uref_{name}({deref}))")
            }
            OwnershipSemantic::OwningPointer => {
                let addr = if is_pointer { "{0}" } else { "&({0})" };
                format!("reinterpret_cast<PyObject*>(new ptr_{name}({addr}))")
            }
            OwnershipSemantic::Copy | OwnershipSemantic::SelfReturn => return Ok(None),
        };
        Ok(Some(Template(tpl)))
    }

    // ========================================================================
    // Runtime to native
    // ========================================================================

    fn from_base(&self, ty: &Ty, diag: &mut Diagnostics) -> SpecResult<Option<FromTemplate>> {
        let graph = self.graph;
        if let Some(f) = self.from.get(&graph.key(ty)) {
            return Ok(Some(f.clone()));
        }
        let Some(class) = graph.class_of(ty) else {
            return Ok(None);
        };
        let Some(pyobject) = self.scalars.get(Scalar::PyObject) else {
            return Ok(None);
        };
        let returned = |f: &Callable| match graph.shape(&f.signature.returns) {
            Shape::Reference(inner) => (graph.strip_cv(&inner), !graph.is_const(&inner)),
            _ => (graph.strip_cv(&f.signature.returns), false),
        };
        let found = self.find_helper(class, FROM_RUNTIME_HELPER, true, diag, |f| {
            accepts_args(graph, f, std::slice::from_ref(pyobject))
                && graph.same_type(&returned(f).0, ty)
        })?;
        Ok(found.and_then(|id| {
            let f = graph.kind(id).as_callable()?;
            Some(FromTemplate {
                template: Template(format!(
                    "{}::{FROM_RUNTIME_HELPER}({{0}})",
                    graph.full_name(class)
                )),
                aliasable: returned(f).1,
            })
        }))
    }

    /// Template converting a runtime object to `ty`, and the type it yields.
    ///
    /// Pointer and reference parameters accept the pointee's conversion only
    /// when its result may be aliased or the pointee is const.
    pub fn from_runtime(&self, ty: &Ty, diag: &mut Diagnostics) -> SpecResult<FromRuntime> {
        let graph = self.graph;
        let produce = |f: FromTemplate, t: Ty| FromRuntime {
            produced: if f.aliasable { t.reference() } else { t },
            template: f.template,
        };

        if let Some(f) = self.from_base(ty, diag)? {
            return Ok(produce(f, ty.clone()));
        }
        match graph.shape(ty) {
            Shape::Reference(inner) => {
                let nt = graph.strip_cv(&inner);
                if let Some(f) = self.from_base(&nt, diag)? {
                    if f.aliasable || graph.is_const(&inner) {
                        return Ok(produce(f, nt));
                    }
                }
            }
            Shape::Pointer(inner) => {
                let nt = graph.strip_cv(&inner);
                if let Some(f) = self.from_base(&nt, diag)? {
                    if f.aliasable || graph.is_const(&inner) {
                        return Ok(FromRuntime {
                            template: Template::new("&({0})").wrap(f.template.as_str()),
                            produced: nt.pointer(),
                        });
                    }
                }
            }
            Shape::Qualified(inner, _) => {
                if let Some(f) = self.from_base(&inner, diag)? {
                    return Ok(produce(f, inner));
                }
            }
            _ => {}
        }
        Err(SpecError::NoFromRuntimeConversion {
            ty: graph.type_string(ty),
        })
    }

    /// Instance check and cast for a parameter of exposed-class type.
    pub fn check_and_cast(&self, ty: &Ty) -> SpecResult<CheckAndCast> {
        let graph = self.graph;
        let target = graph.strip_pointer_or_reference(ty);
        let class = self
            .exposed(&target)
            .ok_or_else(|| SpecError::NoFromRuntimeConversion {
                ty: graph.type_string(&target),
            })?;
        let mut cast = class.cast_base();
        if matches!(graph.shape(ty), Shape::Pointer(_)) {
            cast = Template(format!("&{cast}"));
        }
        Ok(CheckAndCast {
            class: class.class,
            check: Template(format!(
                "PyObject_TypeCheck({{0}},get_obj_{}Type())",
                class.name
            )),
            cast,
        })
    }

    // ========================================================================
    // Buckets and storage
    // ========================================================================

    /// Coercion bucket of a parameter type.
    ///
    /// Pointers and references classify by their pointee.
    pub fn bucket_of(&self, ty: &Ty) -> Option<Bucket> {
        let graph = self.graph;
        if let Some(b) = self.buckets.get(&graph.key(ty)) {
            return Some(*b);
        }
        match graph.shape(ty) {
            Shape::Pointer(inner) | Shape::Reference(inner) => {
                self.buckets.get(&graph.key(&graph.strip_cv(&inner))).copied()
            }
            _ => None,
        }
    }

    /// Template turning a runtime-supplied `Py_ssize_t` into the integer type
    /// `ty`, for parameters fed from a length or index.
    pub fn from_py_ssize_t(&self, ty: &Ty) -> Option<Template> {
        let graph = self.graph;
        self.from_ssize.get(&graph.key(&graph.strip_cv(ty))).cloned()
    }

    /// Direct-storage descriptor for a data member of type `ty`, if any.
    pub fn member_storage_descriptor(&self, ty: &Ty) -> Option<String> {
        let graph = self.graph;
        if let Some(d) = self.storage.get(&graph.key(ty)) {
            return Some(d.clone());
        }
        let class = graph.class_of(ty)?;
        let found = lookup_member(graph, class, CAST_AS_MEMBER_FIELD, Access::Public);
        let first = found.first()?;
        matches!(graph.kind(first.decl), DeclKind::Field(_))
            .then(|| format!("{}::{CAST_AS_MEMBER_FIELD}", graph.full_name(class)))
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn find_helper(
        &self,
        class: DeclId,
        name: &str,
        want_static: bool,
        diag: &mut Diagnostics,
        check: impl Fn(&Callable) -> bool,
    ) -> SpecResult<Option<DeclId>> {
        let graph = self.graph;
        let found = lookup_member(graph, class, name, Access::Public);
        let Some(first) = found.first() else {
            return Ok(None);
        };
        if !matches!(graph.kind(first.decl), DeclKind::Method(_)) {
            return Ok(None);
        }
        let class_name = graph.name(class).unwrap_or_default();
        for m in &found {
            let Some(f) = graph.kind(m.decl).as_callable() else {
                continue;
            };
            if !check(f) {
                continue;
            }
            if f.is_static == want_static {
                return Ok(Some(m.decl));
            }
            diag.warn(format!(
                "\"{class_name}\" has a method named {name} but it can't be used because it's {}static",
                if f.is_static { "" } else { "not " }
            ))?;
            return Ok(None);
        }
        diag.warn(format!(
            "\"{class_name}\" has a method named {name} but is has the wrong format"
        ))?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_fill_and_wrap() {
        let t = Template::new("PyInt_FromLong({0})");
        assert_eq!(t.fill("x"), "PyInt_FromLong(x)");
        assert_eq!(t.wrap("*({0})").fill("p"), "PyInt_FromLong(*(p))");
    }

    #[test]
    fn test_capability_marked_once() {
        let mut caps = Capabilities::default();
        assert!(caps.mark(OwnershipSemantic::OwningReference));
        assert!(!caps.mark(OwnershipSemantic::OwningReference));
        assert!(!caps.mark(OwnershipSemantic::Copy));
        assert!(caps.any());
    }

    #[test]
    fn test_semantic_names() {
        let s: OwnershipSemantic = serde_json::from_str("\"owning_reference\"").unwrap();
        assert_eq!(s, OwnershipSemantic::OwningReference);
        let s: OwnershipSemantic = serde_json::from_str("\"self\"").unwrap();
        assert_eq!(s, OwnershipSemantic::SelfReturn);
    }
}
