//! Overload selection.
//!
//! An overload directive names a callable, optionally with an arity filter,
//! explicit parameter types, bound parameter values and a return ownership
//! semantic. Selection turns it into the [`ResolvedOverload`]s that call plans
//! are built from:
//!
//! 1. Find the name in scope, keeping only callables whose arity admits the
//!    requested one.
//! 2. When several remain, drop const methods if non-const ones exist.
//! 3. With explicit parameter types, take the first compatible candidate and
//!    cut its parameter list to the given length; otherwise take them all.
//!
//! Constructors follow their own rules, see [`select_constructors`].

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::debug;

use pyexpose_core::decl::{Access, Argument, Callable, DeclGraph, DeclId, DeclKind, Shape, Ty};
use pyexpose_core::error::{SpecError, SpecResult};

use crate::conversion::OwnershipSemantic;
use crate::lookup::{find, find_filtered, inherited_lookup_with_count, SCOPE_SEPARATOR};

/// Expression naming the receiver inside a method body.
pub const RECEIVER: &str = "base";

// ============================================================================
// Argument Compatibility
// ============================================================================

/// Number of leading parameters without a default value.
pub fn mandatory(args: &[Argument]) -> usize {
    args.iter().take_while(|a| a.default.is_none()).count()
}

/// Whether `f` can be called with exactly the parameter types `types`.
///
/// Trailing defaulted parameters may be left out.
pub fn accepts_args(graph: &DeclGraph, f: &Callable, types: &[Ty]) -> bool {
    let args = &f.signature.args;
    args.len() >= types.len()
        && mandatory(args) <= types.len()
        && args
            .iter()
            .zip(types)
            .all(|(a, t)| graph.same_type(&a.ty, t))
}

/// The parameters of `args` selected by the canonical type strings `given`,
/// or `None` when they don't match.
fn compatible(graph: &DeclGraph, args: &[Argument], given: &[String]) -> Option<Vec<Argument>> {
    let matches = args.len() >= given.len()
        && mandatory(args) <= given.len()
        && args
            .iter()
            .zip(given)
            .all(|(a, t)| graph.type_string(&a.ty) == *t);
    matches.then(|| args[..given.len()].to_vec())
}

/// One parameter list per admissible call length.
///
/// `f(a, b = 1, c = 2)` expands to `f(a)`, `f(a, b)` and `f(a, b, c)`. The
/// expanded lists carry no default values.
pub fn expand_defaults(args: &[Argument]) -> Vec<Vec<Argument>> {
    let mut lists = Vec::new();
    let mut prefix: Vec<Argument> = Vec::with_capacity(args.len());
    for arg in args {
        if arg.default.is_some() {
            lists.push(prefix.clone());
        }
        prefix.push(Argument {
            default: None,
            ..arg.clone()
        });
    }
    lists.push(prefix);
    lists
}

/// A bound parameter preceded by a defaulted parameter the caller may omit,
/// as `(bound, defaulted)` indices.
///
/// Calls that leave the default out would shift the bound value into the
/// wrong position.
fn bound_after_default(
    args: &[Argument],
    binds: &BTreeMap<usize, String>,
) -> Option<(usize, usize)> {
    let &last = binds.keys().next_back()?;
    let defaulted = args
        .iter()
        .take(last)
        .enumerate()
        .position(|(i, a)| a.default.is_some() && !binds.contains_key(&i))?;
    let bound = binds.keys().copied().find(|&i| i > defaulted)?;
    Some((bound, defaulted))
}

// ============================================================================
// Directives
// ============================================================================

/// A `def` overload directive of the binding plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OverloadSpec {
    /// Name of the callable, looked up from the enclosing scope.
    pub func: String,
    /// Canonical parameter types selecting one overload.
    pub args: Option<Vec<String>>,
    /// Ownership semantic of the returned value.
    pub semantic: OwnershipSemantic,
    /// Overrides whether the callable is bound to an instance.
    #[serde(rename = "static")]
    pub is_static: Option<bool>,
    /// Only consider callables that can be called with this many arguments.
    pub arity: Option<usize>,
    /// Parameters fixed to an expression, by zero-based index.
    pub binds: BTreeMap<usize, String>,
}

impl OverloadSpec {
    pub fn new(func: impl Into<String>) -> Self {
        OverloadSpec {
            func: func.into(),
            ..OverloadSpec::default()
        }
    }
}

/// An `init` overload directive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConstructorSpec {
    pub args: Option<Vec<String>>,
    pub binds: BTreeMap<usize, String>,
}

// ============================================================================
// Resolved Overloads
// ============================================================================

/// A callable chosen for a call site.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOverload {
    pub decl: DeclId,
    /// Parameters in declaration order, possibly cut short.
    pub args: Vec<Argument>,
    /// Parameters supplied by the glue instead of the caller.
    pub binds: BTreeMap<usize, String>,
    pub semantic: OwnershipSemantic,
    pub is_static: bool,
    /// Return type; `None` for constructors.
    pub returns: Option<Ty>,
}

impl ResolvedOverload {
    fn from_callable(id: DeclId, f: &Callable, args: Vec<Argument>, spec: &OverloadSpec) -> Self {
        ResolvedOverload {
            decl: id,
            args,
            binds: BTreeMap::new(),
            semantic: spec.semantic,
            is_static: spec.is_static.unwrap_or(f.is_static),
            returns: Some(f.signature.returns.clone()),
        }
    }

    /// Parameters the caller supplies.
    pub fn runtime_args(&self) -> Vec<&Argument> {
        self.args
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.binds.contains_key(i))
            .map(|(_, a)| a)
            .collect()
    }

    /// The callable, unless this is a constructor.
    pub fn callable<'g>(&self, graph: &'g DeclGraph) -> Option<&'g Callable> {
        graph.kind(self.decl).as_callable()
    }

    /// `name(T1,T2)` over the caller-supplied parameters.
    pub fn label(&self, graph: &DeclGraph) -> String {
        let types: Vec<String> = self
            .runtime_args()
            .iter()
            .map(|a| graph.type_string(&a.ty))
            .collect();
        format!("{}({})", graph.full_name(self.decl), types.join(","))
    }

    fn bind(&mut self, graph: &DeclGraph, binds: &BTreeMap<usize, String>) -> SpecResult<()> {
        for (&index, value) in binds {
            if index >= self.args.len() {
                return Err(SpecError::invalid(format!(
                    "\"{}\" doesn't have an argument #{}",
                    graph.canon_name(self.decl),
                    index + 1
                )));
            }
            self.binds.insert(index, value.clone());
        }
        if let Some((bound, defaulted)) = bound_after_default(&self.args, &self.binds) {
            return Err(SpecError::invalid(format!(
                "argument #{} of \"{}\" is bound but follows the defaulted argument #{}",
                bound + 1,
                graph.canon_name(self.decl),
                defaulted + 1
            )));
        }
        Ok(())
    }

    /// Bind the receiver of a free function exposed as a method.
    ///
    /// The first unbound parameter must be the class, or a pointer or
    /// reference to it.
    pub fn bind_receiver(&mut self, graph: &DeclGraph, class: DeclId) -> SpecResult<()> {
        if self.is_static || !matches!(graph.kind(self.decl), DeclKind::Function(_)) {
            return Ok(());
        }
        let first = (0..self.args.len()).find(|i| !self.binds.contains_key(i));
        let receiver = first.and_then(|i| {
            let ty = &self.args[i].ty;
            let target = graph.strip_pointer_or_reference(ty);
            graph
                .same_type(&target, &Ty::Node(class))
                .then(|| (i, matches!(graph.shape(ty), Shape::Pointer(_))))
        });
        let Some((index, by_pointer)) = receiver else {
            return Err(SpecError::invalid(format!(
                "The first parameter of \"{}\" should be of type \"{}\" or be a reference or pointer to it.",
                graph.canon_name(self.decl),
                graph.full_name(class)
            )));
        };
        let value = if by_pointer {
            format!("&{RECEIVER}")
        } else {
            RECEIVER.to_string()
        };
        self.binds.insert(index, value);
        Ok(())
    }
}

// ============================================================================
// Selection
// ============================================================================

/// Candidates named by `spec.func` in `scope`.
///
/// Inside a class, `Base::member` is looked up through the named base, which
/// must be a base of the class.
fn candidates(graph: &DeclGraph, scope: DeclId, spec: &OverloadSpec) -> SpecResult<Vec<DeclId>> {
    let arity = spec.arity;
    let admits = move |g: &DeclGraph, id: DeclId| match (arity, g.kind(id).as_callable()) {
        (Some(n), Some(f)) => f.mandatory_args() <= n && n <= f.signature.args.len(),
        _ => true,
    };

    if graph.class(scope).is_some() && !spec.func.starts_with(SCOPE_SEPARATOR) {
        if let Some((base, member)) = spec.func.rsplit_once(SCOPE_SEPARATOR) {
            let names_class = find(graph, scope, base)?
                .first()
                .is_some_and(|&id| graph.class_of(&Ty::Node(id)).is_some());
            if names_class {
                let (found, count) =
                    inherited_lookup_with_count(graph, scope, base, member, Access::Private)?;
                debug!(base, member, subobjects = count, "inherited overload lookup");
                let found: Vec<DeclId> = found
                    .into_iter()
                    .map(|m| m.decl)
                    .filter(|&id| admits(graph, id))
                    .collect();
                if found.is_empty() {
                    return Err(SpecError::not_found(&spec.func));
                }
                return Ok(found);
            }
        }
    }
    find_filtered(graph, scope, &spec.func, admits)
}

/// Resolve one overload directive from `scope`.
pub fn resolve_overloads(
    graph: &DeclGraph,
    scope: DeclId,
    spec: &OverloadSpec,
) -> SpecResult<Vec<ResolvedOverload>> {
    let found = candidates(graph, scope, spec)?;
    let mut options: Vec<(DeclId, &Callable)> = Vec::with_capacity(found.len());
    for id in found {
        match graph.kind(id).as_callable() {
            Some(f) => options.push((id, f)),
            None => {
                return Err(SpecError::wrong_kind(
                    graph.full_name(id),
                    "function or method",
                ))
            }
        }
    }

    if options.len() > 1 && options.iter().any(|(_, f)| !f.is_const) {
        options.retain(|(_, f)| !f.is_const);
    }

    let Some(given) = &spec.args else {
        return options
            .into_iter()
            .map(|(id, f)| {
                let mut ov = ResolvedOverload::from_callable(id, f, f.signature.args.clone(), spec);
                ov.bind(graph, &spec.binds)?;
                Ok(ov)
            })
            .collect();
    };

    for &(id, f) in &options {
        if let Some(args) = compatible(graph, &f.signature.args, given) {
            let mut ov = ResolvedOverload::from_callable(id, f, args, spec);
            ov.bind(graph, &spec.binds)?;
            return Ok(vec![ov]);
        }
    }
    Err(SpecError::NoMatchingSignature {
        name: spec.func.clone(),
        candidates: options
            .iter()
            .map(|(_, f)| candidate_line(graph, &f.signature.args))
            .collect(),
    })
}

fn candidate_line(graph: &DeclGraph, args: &[Argument]) -> String {
    let types: Vec<String> = args.iter().map(|a| graph.type_string(&a.ty)).collect();
    format!("\n({})", types.join(","))
}

// ============================================================================
// Constructors
// ============================================================================

/// Constructors chosen for a class.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstructorChoice {
    Overloads(Vec<ResolvedOverload>),
    /// The class cannot be instantiated from the runtime.
    Inaccessible,
}

/// Choose the constructors exposed for `class`.
///
/// Only public constructors are considered. Without directives the single
/// user-declared constructor is used, else the default constructor. Classes
/// without public constructors are not instantiable, nor are abstract classes
/// without directives.
pub fn select_constructors(
    graph: &DeclGraph,
    class: DeclId,
    specs: Option<&[ConstructorSpec]>,
) -> SpecResult<ConstructorChoice> {
    let public: Vec<(DeclId, &Vec<Argument>, bool)> = graph
        .constructors(class)
        .filter(|(_, c)| c.access == Access::Public)
        .map(|(id, c)| (id, &c.args, c.artificial))
        .collect();
    if public.is_empty() || (specs.is_none() && graph.is_abstract(class)) {
        debug!(class = %graph.full_name(class), "class is not instantiable");
        return Ok(ConstructorChoice::Inaccessible);
    }
    let overload = |id: DeclId, args: Vec<Argument>| ResolvedOverload {
        decl: id,
        args,
        binds: BTreeMap::new(),
        semantic: OwnershipSemantic::Copy,
        is_static: true,
        returns: None,
    };

    let Some(specs) = specs else {
        let user: Vec<_> = public.iter().filter(|(_, _, artificial)| !artificial).collect();
        if let [(id, args, _)] = user.as_slice() {
            return Ok(ConstructorChoice::Overloads(vec![overload(*id, (*args).clone())]));
        }
        return match public.iter().find(|(_, args, _)| args.is_empty()) {
            Some((id, _, _)) => Ok(ConstructorChoice::Overloads(vec![overload(*id, Vec::new())])),
            None => Err(SpecError::NoDefaultConstructor {
                class: graph.full_name(class),
            }),
        };
    };

    let mut chosen = Vec::new();
    for spec in specs {
        let picked: Vec<ResolvedOverload> = match &spec.args {
            None => public
                .iter()
                .map(|(id, args, _)| overload(*id, (*args).clone()))
                .collect(),
            Some(given) => {
                let first = public
                    .iter()
                    .find_map(|(id, args, _)| compatible(graph, args, given).map(|a| overload(*id, a)));
                match first {
                    Some(ov) => vec![ov],
                    None => {
                        return Err(SpecError::NoMatchingSignature {
                            name: graph.full_name(class),
                            candidates: public
                                .iter()
                                .map(|(_, args, _)| candidate_line(graph, args))
                                .collect(),
                        })
                    }
                }
            }
        };
        for mut ov in picked {
            ov.bind(graph, &spec.binds)?;
            chosen.push(ov);
        }
    }
    Ok(ConstructorChoice::Overloads(chosen))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arg(ty: u32) -> Argument {
        Argument::new(Ty::Node(DeclId(ty)))
    }

    #[test]
    fn test_expand_defaults_yields_each_prefix() {
        let args = vec![arg(1), arg(2).with_default("1"), arg(3).with_default("2")];
        let lists = expand_defaults(&args);
        let lengths: Vec<usize> = lists.iter().map(Vec::len).collect();
        assert_eq!(lengths, vec![1, 2, 3]);
        assert!(lists.iter().flatten().all(|a| a.default.is_none()));
    }

    #[test]
    fn test_expand_defaults_without_defaults() {
        let args = vec![arg(1), arg(2)];
        assert_eq!(expand_defaults(&args), vec![args.clone()]);
        assert_eq!(expand_defaults(&[]), vec![Vec::<Argument>::new()]);
    }

    #[test]
    fn test_mandatory_stops_at_first_default() {
        let args = vec![arg(1), arg(2).with_default("0"), arg(3)];
        assert_eq!(mandatory(&args), 1);
    }

    #[test]
    fn test_bind_after_omittable_default() {
        let args = vec![arg(1), arg(2).with_default("0"), arg(3).with_default("1")];
        let binds = |keys: &[usize]| -> BTreeMap<usize, String> {
            keys.iter().map(|&k| (k, "x".to_string())).collect()
        };
        assert_eq!(bound_after_default(&args, &binds(&[2])), Some((2, 1)));
        assert_eq!(bound_after_default(&args, &binds(&[1, 2])), None);
        assert_eq!(bound_after_default(&args, &binds(&[0])), None);
        assert_eq!(bound_after_default(&args, &binds(&[1])), None);
        assert_eq!(bound_after_default(&args, &BTreeMap::new()), None);
    }

    #[test]
    fn test_overload_spec_defaults() {
        let spec: OverloadSpec =
            serde_json::from_str(r#"{"func": "area", "binds": {"1": "0"}}"#).unwrap();
        assert_eq!(spec.func, "area");
        assert_eq!(spec.semantic, OwnershipSemantic::Copy);
        assert_eq!(spec.binds.get(&1).map(String::as_str), Some("0"));
        assert_eq!(spec.is_static, None);
    }
}
