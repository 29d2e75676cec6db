//! Call plans: how one exposed function, method or constructor receives its
//! arguments and reaches the native callable.
//!
//! A single overload parses its arguments with an [`ArgParser`] and may accept
//! keywords. Several overloads go through a dispatch tree, reject keywords,
//! and fall through to a "no such overload" failure.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;
use tracing::debug;

use pyexpose_core::decl::{Argument, Callable, DeclGraph, DeclId, DeclKind, Shape, Ty};
use pyexpose_core::diagnostics::Diagnostics;
use pyexpose_core::error::{RuntimeFailure, SpecError, SpecResult};

use crate::conversion::{ConversionRegistry, OwnershipSemantic, Template};
use crate::dispatch::emit::INDENT;
use crate::dispatch::{self, build_tree, emit, emit_checks, Candidate, RuntimeValue, Step};
use crate::overload::{expand_defaults, ConstructorChoice, ResolvedOverload, RECEIVER};

/// The receiver of a method as a runtime object.
pub const SELF_OBJECT: &str = "reinterpret_cast<PyObject*>(self)";

const NOT_IMPLEMENTED: &str = "PyErr_SetString(PyExc_NotImplementedError,not_implemented_msg);";

const NO_KEYWORDS_CHECK: &str = "if(kwds && PyDict_Size(kwds)) {
    PyErr_SetString(PyExc_TypeError,no_keywords_msg);
    throw py_error_set();
}";

// ============================================================================
// Call Sites
// ============================================================================

/// What happens with the value a call produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallResult {
    Void,
    Convert { template: Template },
    /// Placement construction into the wrapper.
    Construct,
    /// The value is discarded and success is reported as `0`.
    Status,
    /// Pure virtual: raise instead of calling.
    NotImplemented,
}

/// One overload's call expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallSite {
    pub callee: String,
    /// Arguments supplied by the glue, by parameter index.
    pub binds: BTreeMap<usize, String>,
    pub result: CallResult,
}

impl CallSite {
    /// Statement calling the overload with the caller's converted `args`.
    pub fn render(&self, args: &[String], errval: &str) -> String {
        let call = || {
            let mut all = args.to_vec();
            // Bound parameters never follow an omittable default, so each
            // index is within the arguments placed so far.
            for (&index, value) in &self.binds {
                all.insert(index.min(all.len()), value.clone());
            }
            format!("{}({})", self.callee, all.join(","))
        };
        match &self.result {
            CallResult::Void => format!("{}; Py_RETURN_NONE;", call()),
            CallResult::Convert { template } => format!("return {};", template.fill(&call())),
            CallResult::Construct => format!("{}; goto success;", call()),
            CallResult::Status => format!("{}; return 0;", call()),
            CallResult::NotImplemented => format!("{NOT_IMPLEMENTED} return {errval};"),
        }
    }
}

fn is_void(graph: &DeclGraph, ty: &Ty) -> bool {
    matches!(
        graph.shape(ty),
        Shape::Decl(_, DeclKind::Fundamental(t)) if t.name.as_deref() == Some("void")
    )
}

/// The callable of `ov` and the expression naming it in a call.
fn callee<'g>(
    graph: &'g DeclGraph,
    ov: &ResolvedOverload,
    class: Option<DeclId>,
) -> SpecResult<(&'g Callable, String)> {
    let f = ov.callable(graph).ok_or_else(|| {
        SpecError::wrong_kind(graph.full_name(ov.decl), "function or method")
    })?;
    let is_method = matches!(graph.kind(ov.decl), DeclKind::Method(_));
    let callee = match class {
        Some(class) if is_method && !f.is_static => {
            let name = graph.canon_name(ov.decl);
            if f.is_virtual {
                // Qualified so that an override in a runtime subclass is not re-entered.
                format!("{RECEIVER}.{}::{name}", graph.full_name(class))
            } else {
                format!("{RECEIVER}.{name}")
            }
        }
        _ => graph.full_name(ov.decl),
    };
    Ok((f, callee))
}

/// Call site of a function or method overload.
///
/// `class` is the exposed class when the overload is called as a method.
fn call_site(
    registry: &mut ConversionRegistry<'_>,
    ov: &ResolvedOverload,
    class: Option<DeclId>,
    diag: &mut Diagnostics,
) -> SpecResult<CallSite> {
    let graph = registry.graph();
    let (f, callee) = callee(graph, ov, class)?;
    let is_method = matches!(graph.kind(ov.decl), DeclKind::Method(_));

    let returns = &f.signature.returns;
    let bound = class.is_some() && !ov.is_static;
    let result = if is_method && f.is_pure_virtual {
        CallResult::NotImplemented
    } else if ov.semantic == OwnershipSemantic::SelfReturn {
        let owner = bound.then_some(SELF_OBJECT);
        CallResult::Convert {
            template: registry.to_runtime(returns, ov.semantic, owner, true, diag)?,
        }
    } else if is_void(graph, returns) {
        CallResult::Void
    } else {
        let owner = bound.then_some("self");
        CallResult::Convert {
            template: registry.to_runtime(returns, ov.semantic, owner, true, diag)?,
        }
    };

    Ok(CallSite {
        callee,
        binds: ov.binds.clone(),
        result,
    })
}

// ============================================================================
// Calling Conventions
// ============================================================================

/// How the runtime passes arguments to the glue function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallingConvention {
    NoArgs,
    SingleObject,
    VarArgs,
    VarArgsKeywords,
}

impl CallingConvention {
    pub fn flags(self) -> &'static str {
        match self {
            CallingConvention::NoArgs => "METH_NOARGS",
            CallingConvention::SingleObject => "METH_O",
            CallingConvention::VarArgs => "METH_VARARGS",
            CallingConvention::VarArgsKeywords => "METH_VARARGS|METH_KEYWORDS",
        }
    }

    /// Parameters following the receiver in the glue function.
    pub fn parameters(self) -> &'static str {
        match self {
            CallingConvention::NoArgs => ",PyObject *",
            CallingConvention::SingleObject => ",PyObject *arg",
            CallingConvention::VarArgs => ",PyObject *args",
            CallingConvention::VarArgsKeywords => ",PyObject *args,PyObject *kwds",
        }
    }
}

// ============================================================================
// Argument Parser
// ============================================================================

/// One parameter read by an [`ArgParser`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedParam {
    pub name: Option<String>,
    pub default: Option<String>,
    /// Declaration of the local holding the converted value.
    pub declaration: String,
    pub convert: Template,
    /// A defaulted const reference keeps its default in a local.
    pub default_local: Option<String>,
}

/// Positional and keyword argument reader for a single overload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArgParser {
    pub keywords: bool,
    pub params: Vec<ParsedParam>,
}

impl ArgParser {
    pub fn build(
        registry: &ConversionRegistry<'_>,
        args: &[&Argument],
        keywords: bool,
        diag: &mut Diagnostics,
    ) -> SpecResult<ArgParser> {
        let graph = registry.graph();
        let mut params = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let conv = registry.from_runtime(&arg.ty, diag)?;
            let default_local = match (&arg.default, graph.shape(&arg.ty)) {
                (Some(default), Shape::Reference(inner)) if graph.is_const(&inner) => Some(
                    format!("{} = {default};", graph.declaration(&graph.strip_cv(&inner), &format!("temp{i}"))),
                ),
                _ => None,
            };
            params.push(ParsedParam {
                name: arg.name.clone(),
                default: arg.default.clone(),
                declaration: graph.declaration(&conv.produced, &format!("_{i}")),
                convert: conv.template,
                default_local,
            });
        }
        Ok(ArgParser { keywords, params })
    }

    /// Locals holding the converted arguments.
    pub fn vars(&self) -> Vec<String> {
        (0..self.params.len()).map(|i| format!("_{i}")).collect()
    }

    fn names_var(&self) -> &'static str {
        if self.keywords && self.params.iter().any(|p| p.name.is_some()) {
            "names"
        } else {
            "0"
        }
    }

    pub fn render(&self, level: usize) -> String {
        let ind = INDENT.repeat(level);
        let mut out = String::new();
        let kwds = if self.keywords { "kwds" } else { "0" };
        let _ = writeln!(out, "{ind}get_arg ga(args,{kwds});");
        let names = self.names_var();
        if names == "names" {
            let list: Vec<String> = self
                .params
                .iter()
                .map(|p| match &p.name {
                    Some(n) => format!("\"{n}\""),
                    None => "0".to_string(),
                })
                .collect();
            let _ = writeln!(out, "{ind}const char *names[] = {{{}}};", list.join(","));
        }
        if !self.params.is_empty() {
            let _ = writeln!(out, "{ind}PyObject *temp;");
        }
        for (i, p) in self.params.iter().enumerate() {
            let key = match (&p.name, names) {
                (Some(_), "names") => format!("names[{i}]"),
                _ => "0".to_string(),
            };
            match &p.default {
                Some(default) => {
                    let value = match &p.default_local {
                        Some(local) => {
                            let _ = writeln!(out, "{ind}{local}");
                            format!("temp{i}")
                        }
                        None => default.clone(),
                    };
                    let _ = writeln!(out, "{ind}temp = ga({key},false);");
                    let _ = writeln!(
                        out,
                        "{ind}{} = temp ? {} : {value};",
                        p.declaration,
                        p.convert.fill("temp")
                    );
                }
                None => {
                    let _ = writeln!(out, "{ind}temp = ga({key},true);");
                    let _ = writeln!(out, "{ind}{} = {};", p.declaration, p.convert.fill("temp"));
                }
            }
        }
        let _ = writeln!(out, "{ind}ga.finished({names});");
        out
    }

    /// Check a call's argument count and keyword names.
    pub fn accepts(&self, positional: usize, keywords: &[String]) -> Result<(), RuntimeFailure> {
        let max = self.params.len();
        let min = self.params.iter().take_while(|p| p.default.is_none()).count();
        let wrong_count = || RuntimeFailure::WrongArgumentCount {
            min,
            max,
            received: positional + keywords.len(),
        };
        if !keywords.is_empty() && !self.keywords {
            return Err(RuntimeFailure::UnexpectedKeywordArguments);
        }
        if positional > max {
            return Err(wrong_count());
        }
        let mut filled: Vec<bool> = (0..max).map(|i| i < positional).collect();
        for keyword in keywords {
            let slot = self
                .params
                .iter()
                .position(|p| p.name.as_deref() == Some(keyword.as_str()));
            match slot {
                Some(i) if !filled[i] => filled[i] = true,
                _ => {
                    return Err(RuntimeFailure::UnknownKeyword {
                        name: keyword.clone(),
                    })
                }
            }
        }
        if filled[..min].iter().any(|f| !f) {
            return Err(wrong_count());
        }
        Ok(())
    }
}

// ============================================================================
// Call Plans
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "body", rename_all = "snake_case")]
pub enum CallBody {
    /// Every overload is pure virtual.
    NotImplemented,
    /// The class has no constructor usable from the runtime.
    Inaccessible { class: String },
    /// The only overload, with arguments converted in place.
    Direct { args: Vec<String> },
    Parsed { parser: ArgParser },
    Dispatch {
        reject_keywords: bool,
        steps: Vec<Step>,
        /// Arguments named by the "no such overload" failure.
        fallthrough: String,
    },
}

/// Everything needed to generate one glue function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallPlan {
    pub name: String,
    pub convention: CallingConvention,
    pub is_static: bool,
    /// Value returned to signal an error.
    pub errval: &'static str,
    /// Signatures of the overloads, indexed like `calls`.
    pub overloads: Vec<String>,
    pub calls: Vec<CallSite>,
    pub body: CallBody,
}

impl CallPlan {
    /// Method table flags.
    pub fn flags(&self) -> String {
        let mut flags = self.convention.flags().to_string();
        if self.is_static {
            flags.push_str("|METH_STATIC");
        }
        flags
    }

    /// The glue function body, indented by `level`.
    pub fn render(&self, level: usize) -> String {
        let ind = INDENT.repeat(level);
        let errval = self.errval;
        let call = |c: &dispatch::CallStep| match self.calls.get(c.candidate) {
            Some(site) => site.render(&c.args, errval),
            None => format!("return {errval};"),
        };
        let mut out = String::new();
        match &self.body {
            CallBody::NotImplemented => {
                let _ = writeln!(out, "{ind}{NOT_IMPLEMENTED}");
                let _ = writeln!(out, "{ind}return {errval};");
            }
            CallBody::Inaccessible { class } => {
                let _ = writeln!(
                    out,
                    "{ind}PyErr_SetString(PyExc_TypeError,\"cannot create '{class}' instances\");"
                );
                let _ = writeln!(out, "{ind}return {errval};");
            }
            CallBody::Direct { args } => {
                if let Some(site) = self.calls.first() {
                    let _ = writeln!(out, "{ind}{}", site.render(args, errval));
                }
            }
            CallBody::Parsed { parser } => {
                out.push_str(&parser.render(level));
                if let Some(site) = self.calls.first() {
                    let _ = writeln!(out, "{ind}{}", site.render(&parser.vars(), errval));
                }
            }
            CallBody::Dispatch {
                reject_keywords,
                steps,
                fallthrough,
            } => {
                if *reject_keywords {
                    for line in NO_KEYWORDS_CHECK.lines() {
                        let _ = writeln!(out, "{ind}{line}");
                    }
                }
                out.push_str(&dispatch::render(steps, level, &call));
                let _ = writeln!(out, "{ind}NoSuchOverload({fallthrough});");
                let _ = writeln!(out, "{ind}return {errval};");
            }
        }
        out
    }

    /// Index of the overload a runtime call reaches.
    pub fn route(
        &self,
        graph: &DeclGraph,
        args: &[RuntimeValue],
        keywords: &[String],
    ) -> Result<usize, RuntimeFailure> {
        if !keywords.is_empty() && self.convention != CallingConvention::VarArgsKeywords {
            return Err(RuntimeFailure::UnexpectedKeywordArguments);
        }
        let exactly = |n: usize| {
            if args.len() == n {
                Ok(())
            } else {
                Err(RuntimeFailure::WrongArgumentCount {
                    min: n,
                    max: n,
                    received: args.len(),
                })
            }
        };
        match &self.body {
            CallBody::NotImplemented => Err(RuntimeFailure::NotImplemented),
            CallBody::Inaccessible { class } => Err(RuntimeFailure::InaccessibleConstructor {
                class: class.clone(),
            }),
            CallBody::Direct { args: direct } => exactly(direct.len()).map(|()| 0),
            CallBody::Parsed { parser } => parser.accepts(args.len(), keywords).map(|()| 0),
            CallBody::Dispatch {
                reject_keywords,
                steps,
                ..
            } => {
                if *reject_keywords && !keywords.is_empty() {
                    return Err(RuntimeFailure::UnexpectedKeywordArguments);
                }
                if self.convention == CallingConvention::SingleObject {
                    exactly(1)?;
                }
                dispatch::route(steps, args, graph)
            }
        }
    }
}

/// Candidates for a dispatch tree, one per admissible call length.
fn candidates(graph: &DeclGraph, overloads: &[ResolvedOverload], expand: bool) -> Vec<Candidate> {
    let mut out = Vec::new();
    for (id, ov) in overloads.iter().enumerate() {
        let label = ov.label(graph);
        let args: Vec<Argument> = ov.runtime_args().into_iter().cloned().collect();
        let lists = if expand { expand_defaults(&args) } else { vec![args] };
        for list in lists {
            out.push(Candidate {
                id,
                label: label.clone(),
                args: list.into_iter().map(|a| a.ty).collect(),
            });
        }
    }
    out
}

/// Plan the glue function of an exposed function or method.
///
/// `class` is the exposed class the overloads are methods of.
pub fn build_function(
    registry: &mut ConversionRegistry<'_>,
    name: &str,
    overloads: &[ResolvedOverload],
    class: Option<DeclId>,
    diag: &mut Diagnostics,
) -> SpecResult<CallPlan> {
    let graph = registry.graph();
    if overloads.is_empty() {
        return Err(SpecError::invalid(format!("\"{name}\" has no overloads")));
    }

    let mut calls = Vec::with_capacity(overloads.len());
    for ov in overloads {
        calls.push(call_site(registry, ov, class, diag)?);
    }
    let registry = &*registry;
    let labels: Vec<String> = overloads.iter().map(|ov| ov.label(graph)).collect();

    let runtime: Vec<Vec<&Argument>> = overloads.iter().map(|ov| ov.runtime_args()).collect();
    let max = runtime.iter().map(Vec::len).max().unwrap_or(0);
    let min = runtime
        .iter()
        .map(|args| args.iter().take_while(|a| a.default.is_none()).count())
        .min()
        .unwrap_or(0);
    let single = overloads.len() == 1;

    let convention = if max == 0 {
        if let [a, b, ..] = labels.as_slice() {
            return Err(SpecError::AmbiguousOverload {
                first: a.clone(),
                second: b.clone(),
            });
        }
        CallingConvention::NoArgs
    } else if max == 1 && min == 1 && runtime[0][0].name.is_none() {
        CallingConvention::SingleObject
    } else if single && runtime[0].iter().any(|a| a.name.is_some()) {
        CallingConvention::VarArgsKeywords
    } else {
        CallingConvention::VarArgs
    };

    let all_pure = calls.iter().all(|c| c.result == CallResult::NotImplemented);
    let body = if all_pure {
        CallBody::NotImplemented
    } else {
        match convention {
            CallingConvention::NoArgs => CallBody::Direct { args: Vec::new() },
            CallingConvention::SingleObject if single => {
                let conv = registry.from_runtime(&runtime[0][0].ty, diag)?;
                CallBody::Direct {
                    args: vec![conv.template.fill("arg")],
                }
            }
            CallingConvention::SingleObject => {
                let tree = build_tree(candidates(graph, overloads, false), registry)?;
                CallBody::Dispatch {
                    reject_keywords: false,
                    steps: emit_checks(&tree, &["arg".to_string()], registry, diag)?,
                    fallthrough: "arg".to_string(),
                }
            }
            _ if single => CallBody::Parsed {
                parser: ArgParser::build(
                    registry,
                    &runtime[0],
                    convention == CallingConvention::VarArgsKeywords,
                    diag,
                )?,
            },
            _ => {
                let tree = build_tree(candidates(graph, overloads, true), registry)?;
                CallBody::Dispatch {
                    reject_keywords: false,
                    steps: emit(&tree, registry, diag)?,
                    fallthrough: "args".to_string(),
                }
            }
        }
    };
    debug!(name, overloads = overloads.len(), ?convention, "call plan built");

    Ok(CallPlan {
        name: name.to_string(),
        convention,
        is_static: class.is_some() && overloads.iter().all(|ov| ov.is_static),
        errval: "0",
        overloads: labels,
        calls,
        body,
    })
}

/// Plan the getter of a property: one overload taking no arguments.
pub fn build_getter(
    registry: &mut ConversionRegistry<'_>,
    name: &str,
    overload: &ResolvedOverload,
    class: DeclId,
    diag: &mut Diagnostics,
) -> SpecResult<CallPlan> {
    let graph = registry.graph();
    if !overload.runtime_args().is_empty() {
        return Err(SpecError::invalid(format!(
            "\"{}\" must take no arguments to be used as a getter",
            overload.label(graph)
        )));
    }
    build_function(registry, name, std::slice::from_ref(overload), Some(class), diag)
}

/// Plan the setter of a property.
///
/// Every overload takes the assigned value as its only argument; several
/// overloads dispatch on that value. Results are discarded.
pub fn build_setter(
    registry: &ConversionRegistry<'_>,
    name: &str,
    overloads: &[ResolvedOverload],
    class: DeclId,
    diag: &mut Diagnostics,
) -> SpecResult<CallPlan> {
    let graph = registry.graph();
    if overloads.is_empty() {
        return Err(SpecError::invalid(format!("\"{name}\" has no overloads")));
    }
    let mut calls = Vec::with_capacity(overloads.len());
    for ov in overloads {
        if ov.runtime_args().len() != 1 {
            return Err(SpecError::invalid(format!(
                "\"{}\" must take exactly one argument to be used as a setter",
                ov.label(graph)
            )));
        }
        let (f, callee) = callee(graph, ov, Some(class))?;
        let is_method = matches!(graph.kind(ov.decl), DeclKind::Method(_));
        calls.push(CallSite {
            callee,
            binds: ov.binds.clone(),
            result: if is_method && f.is_pure_virtual {
                CallResult::NotImplemented
            } else {
                CallResult::Status
            },
        });
    }
    let body = if calls.iter().all(|c| c.result == CallResult::NotImplemented) {
        CallBody::NotImplemented
    } else if let [only] = overloads {
        let conv = registry.from_runtime(&only.runtime_args()[0].ty, diag)?;
        CallBody::Direct {
            args: vec![conv.template.fill("arg")],
        }
    } else {
        let tree = build_tree(candidates(graph, overloads, false), registry)?;
        CallBody::Dispatch {
            reject_keywords: false,
            steps: emit_checks(&tree, &["arg".to_string()], registry, diag)?,
            fallthrough: "arg".to_string(),
        }
    };
    debug!(name, overloads = overloads.len(), "setter plan built");
    Ok(CallPlan {
        name: name.to_string(),
        convention: CallingConvention::SingleObject,
        is_static: false,
        errval: "-1",
        overloads: overloads.iter().map(|ov| ov.label(graph)).collect(),
        calls,
        body,
    })
}

/// Plan the initializer of an exposed class.
pub fn build_constructor(
    registry: &ConversionRegistry<'_>,
    class: DeclId,
    choice: &ConstructorChoice,
    diag: &mut Diagnostics,
) -> SpecResult<CallPlan> {
    let graph = registry.graph();
    let class_name = graph.full_name(class);
    let plan = |overloads: Vec<String>, calls: Vec<CallSite>, body: CallBody| CallPlan {
        name: "__init__".to_string(),
        convention: CallingConvention::VarArgsKeywords,
        is_static: false,
        errval: "-1",
        overloads,
        calls,
        body,
    };

    let overloads = match choice {
        ConstructorChoice::Inaccessible => {
            return Ok(plan(
                Vec::new(),
                Vec::new(),
                CallBody::Inaccessible { class: class_name },
            ))
        }
        ConstructorChoice::Overloads(overloads) if overloads.is_empty() => {
            return Err(SpecError::NoDefaultConstructor { class: class_name })
        }
        ConstructorChoice::Overloads(overloads) => overloads,
    };

    let calls: Vec<CallSite> = overloads
        .iter()
        .map(|ov| CallSite {
            callee: format!("new(&self->base) {class_name}"),
            binds: ov.binds.clone(),
            result: CallResult::Construct,
        })
        .collect();
    let labels = overloads.iter().map(|ov| ov.label(graph)).collect();

    let body = if let [only] = overloads.as_slice() {
        CallBody::Parsed {
            parser: ArgParser::build(registry, &only.runtime_args(), true, diag)?,
        }
    } else {
        let tree = build_tree(candidates(graph, overloads, true), registry)?;
        CallBody::Dispatch {
            reject_keywords: true,
            steps: emit(&tree, registry, diag)?,
            fallthrough: "args".to_string(),
        }
    };
    debug!(class = %class_name, overloads = overloads.len(), "constructor plan built");
    Ok(plan(labels, calls, body))
}
