//! Module build: from a binding plan and a declaration graph to the
//! artifacts a code emitter consumes.
//!
//! The build runs in a fixed order. Conversions and classes are registered
//! first, then the class hierarchy is linked, then every function, method,
//! constructor, member and property is planned. Capabilities and base accessors are
//! read last, once every conversion that can require a wrapper has run. Any
//! error aborts the build.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use pyexpose_core::decl::{DeclGraph, DeclId, DeclKind, Ty};
use pyexpose_core::diagnostics::{BuildConfig, Diagnostics, Warning};
use pyexpose_core::error::{SpecError, SpecResult};

use crate::bases::all_fields;
use crate::callplan::{build_constructor, build_function, build_getter, build_setter, CallPlan};
use crate::conversion::{
    Capabilities, ConversionRegistry, FromTemplate, OwnershipSemantic, Template,
};
use crate::hierarchy::{downcast, Downcast};
use crate::lookup::find;
use crate::overload::{
    resolve_overloads, select_constructors, ConstructorSpec, OverloadSpec, ResolvedOverload,
};
use crate::validation::validate_identifier;

// ============================================================================
// Binding Plan
// ============================================================================

/// What to expose, as read from the binding directives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BindingPlan {
    pub module: String,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub conversions: Vec<ConversionPlan>,
    #[serde(default)]
    pub classes: Vec<ClassPlan>,
    #[serde(default)]
    pub functions: Vec<FunctionPlan>,
}

/// A user-supplied conversion for a named type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConversionPlan {
    #[serde(rename = "type")]
    pub ty: String,
    pub to: Option<String>,
    pub from: Option<String>,
    /// The `from` conversion yields a reference to existing storage.
    pub aliasable: bool,
    /// Member-storage descriptor.
    pub storage: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClassPlan {
    /// Runtime-side name.
    pub name: String,
    /// Native class, looked up from the global namespace.
    pub cpp: String,
    /// Constructor directives; absent to choose automatically.
    #[serde(default)]
    pub init: Option<Vec<ConstructorSpec>>,
    #[serde(default)]
    pub methods: Vec<FunctionPlan>,
    #[serde(default)]
    pub members: Vec<MemberPlan>,
    #[serde(default)]
    pub properties: Vec<PropertyPlan>,
    #[serde(default)]
    pub doc: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FunctionPlan {
    pub name: String,
    /// Overload directives; absent to expose every overload of `name`.
    #[serde(default)]
    pub overloads: Vec<OverloadSpec>,
    #[serde(default)]
    pub doc: Option<String>,
}

impl FunctionPlan {
    fn overload_specs(&self) -> Vec<OverloadSpec> {
        if self.overloads.is_empty() {
            vec![OverloadSpec::new(&self.name)]
        } else {
            self.overloads.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MemberPlan {
    pub name: String,
    /// Field name inside the class.
    pub cpp: String,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default)]
    pub semantic: OwnershipSemantic,
    #[serde(default)]
    pub doc: Option<String>,
}

/// A computed attribute backed by accessor functions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PropertyPlan {
    pub name: String,
    /// Getter; it cannot be overloaded.
    pub get: Option<OverloadSpec>,
    /// Setter overloads, dispatched on the assigned value.
    pub set: Vec<OverloadSpec>,
    pub doc: Option<String>,
}

// ============================================================================
// Artifacts
// ============================================================================

/// A planned glue function and its rendered body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlueFunction {
    #[serde(flatten)]
    pub plan: CallPlan,
    /// Method table flags.
    pub flags: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

impl From<CallPlan> for GlueFunction {
    fn from(plan: CallPlan) -> Self {
        GlueFunction {
            flags: plan.flags(),
            code: plan.render(1),
            plan,
            doc: None,
        }
    }
}

impl GlueFunction {
    fn with_doc(mut self, doc: Option<&str>) -> Self {
        self.doc = doc.map(str::to_string);
        self
    }
}

/// Accessors of one exposed data member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberArtifact {
    pub name: String,
    pub field: DeclId,
    /// Byte offset in the class, inherited fields included.
    pub offset: Option<u64>,
    /// Direct-storage descriptor; accessor functions are used without one.
    pub storage: Option<String>,
    pub get: Template,
    /// `None` for read-only and const members.
    pub set: Option<Template>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

/// Accessor functions of one property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyArtifact {
    pub name: String,
    pub get: Option<GlueFunction>,
    pub set: Option<GlueFunction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassArtifacts {
    pub name: String,
    pub cpp: String,
    pub class: DeclId,
    /// Runtime names of the exposed direct bases.
    pub bases: Vec<String>,
    pub capabilities: Capabilities,
    pub init: GlueFunction,
    pub methods: Vec<GlueFunction>,
    pub members: Vec<MemberArtifact>,
    pub properties: Vec<PropertyArtifact>,
    pub downcast: Downcast,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

/// Everything planned for one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleArtifacts {
    pub module: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    pub classes: Vec<ClassArtifacts>,
    pub functions: Vec<GlueFunction>,
    pub warnings: Vec<Warning>,
}

// ============================================================================
// Build
// ============================================================================

/// Resolve a type named in the plan.
fn named_type(graph: &DeclGraph, name: &str) -> SpecResult<Ty> {
    let found = find(graph, graph.root(), name)?;
    let id = *found.first().ok_or_else(|| SpecError::not_found(name))?;
    if graph.kind(id).as_callable().is_some() || matches!(graph.kind(id), DeclKind::Namespace { .. })
    {
        return Err(SpecError::wrong_kind(name, "type"));
    }
    graph.ensure_defined(id)?;
    Ok(Ty::Node(id))
}

fn named_class(graph: &DeclGraph, name: &str) -> SpecResult<DeclId> {
    let ty = named_type(graph, name)?;
    graph
        .class_of(&ty)
        .ok_or_else(|| SpecError::wrong_kind(name, "class"))
}

fn plan_function(
    registry: &mut ConversionRegistry<'_>,
    scope: DeclId,
    class: Option<DeclId>,
    plan: &FunctionPlan,
    diag: &mut Diagnostics,
) -> SpecResult<GlueFunction> {
    let graph = registry.graph();
    validate_identifier(&plan.name)?;
    let mut overloads = Vec::new();
    for spec in plan.overload_specs() {
        for mut ov in resolve_overloads(graph, scope, &spec)? {
            if let Some(class) = class {
                ov.bind_receiver(graph, class)?;
            }
            overloads.push(ov);
        }
    }
    let planned = build_function(registry, &plan.name, &overloads, class, diag)?;
    Ok(GlueFunction::from(planned).with_doc(plan.doc.as_deref()))
}

/// Resolve accessor directives inside `class`, binding free functions to the
/// receiver.
fn accessor_overloads(
    graph: &DeclGraph,
    class: DeclId,
    specs: &[OverloadSpec],
) -> SpecResult<Vec<ResolvedOverload>> {
    let mut overloads = Vec::new();
    for spec in specs {
        for mut ov in resolve_overloads(graph, class, spec)? {
            ov.bind_receiver(graph, class)?;
            overloads.push(ov);
        }
    }
    Ok(overloads)
}

fn plan_property(
    registry: &mut ConversionRegistry<'_>,
    class: DeclId,
    plan: &PropertyPlan,
    diag: &mut Diagnostics,
) -> SpecResult<PropertyArtifact> {
    let graph = registry.graph();
    validate_identifier(&plan.name)?;
    if plan.get.is_none() && plan.set.is_empty() {
        return Err(SpecError::invalid(format!(
            "property \"{}\" defined with neither a getter nor a setter",
            plan.name
        )));
    }

    let get = match &plan.get {
        Some(spec) => {
            let overloads = accessor_overloads(graph, class, std::slice::from_ref(spec))?;
            let [overload] = overloads.as_slice() else {
                return Err(SpecError::invalid(format!(
                    "getter of property \"{}\" names {} overloads, it must name one",
                    plan.name,
                    overloads.len()
                )));
            };
            let name = format!("get_{}", plan.name);
            Some(GlueFunction::from(build_getter(registry, &name, overload, class, diag)?))
        }
        None => None,
    };
    let set = if plan.set.is_empty() {
        None
    } else {
        let overloads = accessor_overloads(graph, class, &plan.set)?;
        let name = format!("set_{}", plan.name);
        Some(GlueFunction::from(build_setter(registry, &name, &overloads, class, diag)?))
    };
    Ok(PropertyArtifact {
        name: plan.name.clone(),
        get,
        set,
        doc: plan.doc.clone(),
    })
}

fn plan_member(
    registry: &mut ConversionRegistry<'_>,
    class: DeclId,
    plan: &MemberPlan,
    diag: &mut Diagnostics,
) -> SpecResult<MemberArtifact> {
    let graph = registry.graph();
    validate_identifier(&plan.name)?;
    let found = find(graph, class, &plan.cpp)?;
    let field = *found.first().ok_or_else(|| SpecError::not_found(&plan.cpp))?;
    let DeclKind::Field(decl) = graph.kind(field) else {
        return Err(SpecError::wrong_kind(graph.full_name(field), "member variable"));
    };
    let ty = &decl.ty;
    let get = registry.to_runtime(ty, plan.semantic, Some("self"), false, diag)?;
    let set = if plan.readonly || graph.is_const(ty) {
        None
    } else {
        Some(registry.from_runtime(ty, diag)?.template)
    };
    let offset = all_fields(graph, class)
        .into_iter()
        .find(|f| f.decl == field)
        .map(|f| f.offset);
    Ok(MemberArtifact {
        name: plan.name.clone(),
        field,
        offset,
        storage: registry.member_storage_descriptor(ty),
        get,
        set,
        doc: plan.doc.clone(),
    })
}

/// Plan every entity of `plan` against `graph`.
pub fn build_module(
    graph: &DeclGraph,
    plan: &BindingPlan,
    config: &BuildConfig,
) -> SpecResult<ModuleArtifacts> {
    validate_identifier(&plan.module)?;
    let mut diag = Diagnostics::new(config);
    let mut registry = ConversionRegistry::new(graph, config);

    for conv in &plan.conversions {
        let ty = named_type(graph, &conv.ty)?;
        registry.register_conversion(
            &ty,
            conv.to.as_deref().map(Template::new),
            conv.from.as_deref().map(|from| FromTemplate {
                template: Template::new(from),
                aliasable: conv.aliasable,
            }),
        );
        if let Some(storage) = &conv.storage {
            registry.register_storage(&ty, storage.as_str());
        }
    }

    let mut class_ids = Vec::with_capacity(plan.classes.len());
    for class in &plan.classes {
        validate_identifier(&class.name)?;
        let id = named_class(graph, &class.cpp)?;
        registry.register_class(id, &class.name)?;
        class_ids.push(id);
    }
    registry.link_hierarchy();

    let mut planned = Vec::with_capacity(plan.classes.len());
    for (class, &id) in plan.classes.iter().zip(&class_ids) {
        let choice = select_constructors(graph, id, class.init.as_deref())?;
        let init = GlueFunction::from(build_constructor(&registry, id, &choice, &mut diag)?);
        let mut methods = Vec::with_capacity(class.methods.len());
        for method in &class.methods {
            methods.push(plan_function(&mut registry, id, Some(id), method, &mut diag)?);
        }
        let mut members = Vec::with_capacity(class.members.len());
        for member in &class.members {
            members.push(plan_member(&mut registry, id, member, &mut diag)?);
        }
        let mut properties = Vec::with_capacity(class.properties.len());
        for property in &class.properties {
            properties.push(plan_property(&mut registry, id, property, &mut diag)?);
        }
        planned.push((init, methods, members, properties));
    }

    let mut functions = Vec::with_capacity(plan.functions.len());
    for function in &plan.functions {
        functions.push(plan_function(&mut registry, graph.root(), None, function, &mut diag)?);
    }

    let mut classes = Vec::with_capacity(planned.len());
    for ((class, &id), (init, methods, members, properties)) in
        plan.classes.iter().zip(&class_ids).zip(planned)
    {
        let exposed = registry
            .exposed_class(id)
            .ok_or_else(|| SpecError::wrong_kind(&class.cpp, "exposed class"))?;
        let bases = exposed
            .bases
            .iter()
            .filter_map(|&b| registry.exposed_class(b).map(|e| e.name.clone()))
            .collect();
        classes.push(ClassArtifacts {
            name: class.name.clone(),
            cpp: graph.full_name(id),
            class: id,
            bases,
            capabilities: exposed.capabilities,
            init,
            methods,
            members,
            properties,
            downcast: downcast(&registry, id)?,
            doc: class.doc.clone(),
        });
    }

    let warnings = diag.into_warnings();
    debug!(
        classes = classes.len(),
        functions = functions.len(),
        "module planned"
    );
    info!(module = %plan.module, warnings = warnings.len(), "module build complete");
    Ok(ModuleArtifacts {
        module: plan.module.clone(),
        doc: plan.doc.clone(),
        classes,
        functions,
        warnings,
    })
}
