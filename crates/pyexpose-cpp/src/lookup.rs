//! Scope and inheritance-aware name lookup.
//!
//! Two entry points:
//!
//! - [`find`]: qualified or unqualified name resolution from a scope, walking
//!   outward through enclosing scopes the way the host language does.
//! - [`lookup_member`]: member lookup inside a class, breadth-first over the
//!   inheritance graph with access promotion along each edge.
//!
//! Unqualified member lookup hides: the first inheritance level that yields
//! any admitted match wins, even when a deeper level would match better.

use std::collections::HashSet;

use pyexpose_core::decl::{Access, DeclGraph, DeclId, DeclKind, Ty};
use pyexpose_core::error::{SpecError, SpecResult};

use crate::bases::{traverse_bases, BaseCache};

/// Scope separator of the host language.
pub const SCOPE_SEPARATOR: &str = "::";

/// A member found by [`lookup_member`], with its effective access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberMatch {
    pub decl: DeclId,
    pub access: Access,
}

/// Typedef members stand for the declaration they alias.
fn real_decl(graph: &DeclGraph, id: DeclId) -> DeclId {
    match graph.kind(id) {
        DeclKind::Typedef { .. } => graph.resolve_typedefs(id),
        _ => id,
    }
}

// ============================================================================
// Member Lookup
// ============================================================================

/// Look up `name` among the members of `class` and its bases.
///
/// Level 0 is the class itself, level 1 its direct bases, and so on. A member
/// reached through inheritance edges has the most restrictive access of its
/// own access and every edge on the path. Members whose effective access is
/// more restrictive than `floor` are not admitted. The matches of the first
/// level with any admitted match are returned.
pub fn lookup_member(
    graph: &DeclGraph,
    class: DeclId,
    name: &str,
    floor: Access,
) -> Vec<MemberMatch> {
    lookup_member_filtered(graph, class, name, floor, |_, _| true)
}

/// [`lookup_member`] with an extra predicate on candidate members.
pub fn lookup_member_filtered(
    graph: &DeclGraph,
    class: DeclId,
    name: &str,
    floor: Access,
    accept: impl Fn(&DeclGraph, DeclId) -> bool,
) -> Vec<MemberMatch> {
    let mut level: Vec<(DeclId, Access)> = vec![(class, Access::Public)];
    let mut visited = HashSet::new();

    while !level.is_empty() {
        let mut matches: Vec<MemberMatch> = Vec::new();
        for &(scope, path_access) in &level {
            for &member in graph.members(scope) {
                if graph.canon_name(member) != name || !accept(graph, member) {
                    continue;
                }
                let access = graph.access(member).through(path_access);
                let decl = real_decl(graph, member);
                if access <= floor && matches.iter().all(|m| m.decl != decl) {
                    matches.push(MemberMatch { decl, access });
                }
            }
        }
        if !matches.is_empty() {
            return matches;
        }

        let mut next: Vec<(DeclId, Access)> = Vec::new();
        for &(scope, path_access) in &level {
            visited.insert(scope);
            for base in graph.bases(scope) {
                let Some(base_class) = graph.class_of(&base.ty) else {
                    continue;
                };
                let access = base.access.through(path_access);
                match next.iter_mut().find(|(c, _)| *c == base_class) {
                    Some(entry) => entry.1 = entry.1.min(access),
                    None if !visited.contains(&base_class) => next.push((base_class, access)),
                    None => {}
                }
            }
        }
        level = next;
    }
    Vec::new()
}

/// Look up a member through an explicitly named base: `Base::member`.
///
/// `base_name` is resolved from `class`'s scope and must name `class` itself
/// or one of its direct or indirect bases. The member is then looked up in
/// that base, and its access is composed with the least restrictive path
/// from `class` to the base.
///
/// # Returns
///
/// The matches and the number of distinct base subobjects the path reaches
/// (a virtual base counts once).
pub fn inherited_lookup_with_count(
    graph: &DeclGraph,
    class: DeclId,
    base_name: &str,
    member: &str,
    floor: Access,
) -> SpecResult<(Vec<MemberMatch>, usize)> {
    let base = find(graph, class, base_name)?
        .into_iter()
        .find_map(|id| graph.class_of(&Ty::Node(id)))
        .ok_or_else(|| SpecError::wrong_kind(base_name, "class"))?;

    if base == class {
        return Ok((lookup_member(graph, class, member, floor), 1));
    }
    if !graph.is_base_of(base, class) {
        return Err(SpecError::NotABaseClass {
            base: graph.full_name(base),
            class: graph.full_name(class),
        });
    }

    let mut cache: BaseCache<()> = BaseCache::new();
    let frames = traverse_bases(graph, class, &mut cache, |_, _| ());
    let mut count = 0;
    let mut path_access: Option<Access> = None;
    for frame in frames.iter().filter(|f| f.class == base) {
        path_access = Some(path_access.map_or(frame.access, |a| a.min(frame.access)));
        if !frame.shared {
            count += 1;
        }
    }
    let path_access = path_access.unwrap_or(Access::Public);

    let matches = lookup_member(graph, base, member, Access::Private)
        .into_iter()
        .map(|m| MemberMatch {
            decl: m.decl,
            access: m.access.through(path_access),
        })
        .filter(|m| m.access <= floor)
        .collect();
    Ok((matches, count))
}

// ============================================================================
// Scoped Name Resolution
// ============================================================================

/// Resolve a possibly qualified name starting from `scope`.
///
/// A leading `::` starts at the global namespace. The head segment is looked
/// up in `scope` and then in each enclosing scope; the remaining segments are
/// looked up strictly inside the previous one.
pub fn find(graph: &DeclGraph, scope: DeclId, name: &str) -> SpecResult<Vec<DeclId>> {
    find_filtered(graph, scope, name, |_, _| true)
}

/// [`find`] with a predicate applied to the final segment's matches.
pub fn find_filtered(
    graph: &DeclGraph,
    scope: DeclId,
    name: &str,
    accept: impl Fn(&DeclGraph, DeclId) -> bool,
) -> SpecResult<Vec<DeclId>> {
    let (start, rest, outward) = match name.strip_prefix(SCOPE_SEPARATOR) {
        Some(rest) => (graph.root(), rest, false),
        None => (scope, name, true),
    };
    let found = resolve(graph, start, rest, outward, &accept)?;
    if found.is_empty() {
        return Err(SpecError::not_found(name));
    }
    Ok(found)
}

fn resolve(
    graph: &DeclGraph,
    scope: DeclId,
    name: &str,
    outward: bool,
    accept: &dyn Fn(&DeclGraph, DeclId) -> bool,
) -> SpecResult<Vec<DeclId>> {
    let (head, tail) = match name.split_once(SCOPE_SEPARATOR) {
        Some((head, tail)) => (head, Some(tail)),
        None => (name, None),
    };

    let mut current = Some(scope);
    while let Some(s) = current {
        let found = match tail {
            None => local(graph, s, head, accept),
            Some(_) => local(graph, s, head, &|_, _| true),
        };
        if let Some(first) = found.first() {
            let Some(tail) = tail else {
                return Ok(found);
            };
            let inner = scope_of(graph, *first).ok_or_else(|| SpecError::NotAScope {
                name: head.to_string(),
            })?;
            return resolve(graph, inner, tail, false, accept);
        }
        if !outward {
            break;
        }
        current = graph.get(s).context;
    }
    Ok(Vec::new())
}

/// Matches for a single segment directly inside `scope`.
fn local(
    graph: &DeclGraph,
    scope: DeclId,
    name: &str,
    accept: &dyn Fn(&DeclGraph, DeclId) -> bool,
) -> Vec<DeclId> {
    match graph.kind(scope) {
        DeclKind::Class(_) => {
            lookup_member_filtered(graph, scope, name, Access::Private, |g, id| accept(g, id))
                .into_iter()
                .map(|m| m.decl)
                .collect()
        }
        _ => {
            let mut found = Vec::new();
            for &member in graph.members(scope) {
                if graph.canon_name(member) == name && accept(graph, member) {
                    let decl = real_decl(graph, member);
                    if !found.contains(&decl) {
                        found.push(decl);
                    }
                }
            }
            found
        }
    }
}

/// The scope a declaration opens, looking through typedefs.
fn scope_of(graph: &DeclGraph, id: DeclId) -> Option<DeclId> {
    let id = graph.resolve_typedefs(id);
    graph.kind(id).is_scope().then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyexpose_core::decl::IntrospectionTable;
    use serde_json::json;

    fn graph(value: serde_json::Value) -> DeclGraph {
        let table: IntrospectionTable = serde_json::from_value(value).unwrap();
        DeclGraph::link(&table).unwrap()
    }

    /// `class B { public: void m(); }; class C : private B {};`
    fn private_inheritance() -> DeclGraph {
        graph(json!({
            "_1": { "kind": "Namespace", "name": "::" },
            "_2": { "kind": "FundamentalType", "name": "void" },
            "_3": { "kind": "Class", "name": "B", "context": "_1" },
            "_4": { "kind": "Method", "name": "m", "returns": "_2", "context": "_3" },
            "_5": { "kind": "Class", "name": "C", "context": "_1",
                    "bases": [ { "type": "_3", "access": "private" } ] },
            "_6": { "kind": "Method", "name": "n", "returns": "_2", "context": "_5",
                    "access": "protected" }
        }))
    }

    #[test]
    fn test_lookup_private_base_hides_at_public_floor() {
        let g = private_inheritance();
        let c = g.by_key("_5").unwrap();
        assert!(lookup_member(&g, c, "m", Access::Public).is_empty());
    }

    #[test]
    fn test_lookup_private_base_promotes_access() {
        let g = private_inheritance();
        let c = g.by_key("_5").unwrap();
        let found = lookup_member(&g, c, "m", Access::Private);
        assert_eq!(
            found,
            vec![MemberMatch {
                decl: g.by_key("_4").unwrap(),
                access: Access::Private
            }]
        );
    }

    #[test]
    fn test_lookup_own_access_filters_level_zero() {
        let g = private_inheritance();
        let c = g.by_key("_5").unwrap();
        assert!(lookup_member(&g, c, "n", Access::Public).is_empty());
        assert_eq!(lookup_member(&g, c, "n", Access::Protected).len(), 1);
    }

    #[test]
    fn test_lookup_nearer_level_hides_deeper() {
        let g = graph(json!({
            "_1": { "kind": "Namespace", "name": "::" },
            "_2": { "kind": "FundamentalType", "name": "int" },
            "_3": { "kind": "Class", "name": "A", "context": "_1" },
            "_4": { "kind": "Method", "name": "f", "returns": "_2", "context": "_3",
                    "arguments": [ { "type": "_2" } ] },
            "_5": { "kind": "Class", "name": "B", "context": "_1",
                    "bases": [ { "type": "_3" } ] },
            "_6": { "kind": "Method", "name": "f", "returns": "_2", "context": "_5" }
        }));
        let found = lookup_member(&g, g.by_key("_5").unwrap(), "f", Access::Public);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].decl, g.by_key("_6").unwrap());
    }

    #[test]
    fn test_find_walks_outward_and_qualifies() {
        let g = graph(json!({
            "_1": { "kind": "Namespace", "name": "::" },
            "_2": { "kind": "Namespace", "name": "outer", "context": "_1" },
            "_3": { "kind": "Namespace", "name": "inner", "context": "_2" },
            "_4": { "kind": "Class", "name": "Widget", "context": "_2" },
            "_5": { "kind": "FundamentalType", "name": "int" },
            "_6": { "kind": "Field", "name": "count", "type": "_5", "context": "_4" },
            "_7": { "kind": "Typedef", "name": "W", "type": "_4", "context": "_3" }
        }));
        let inner = g.by_key("_3").unwrap();
        assert_eq!(find(&g, inner, "Widget").unwrap(), vec![g.by_key("_4").unwrap()]);
        assert_eq!(
            find(&g, inner, "Widget::count").unwrap(),
            vec![g.by_key("_6").unwrap()]
        );
        assert_eq!(
            find(&g, inner, "W::count").unwrap(),
            vec![g.by_key("_6").unwrap()]
        );
        assert_eq!(
            find(&g, inner, "::outer::Widget").unwrap(),
            vec![g.by_key("_4").unwrap()]
        );
        assert_eq!(
            find(&g, inner, "::Widget"),
            Err(SpecError::not_found("::Widget"))
        );
    }

    #[test]
    fn test_find_rejects_non_scope_head() {
        let g = graph(json!({
            "_1": { "kind": "Namespace", "name": "::" },
            "_2": { "kind": "FundamentalType", "name": "int" },
            "_3": { "kind": "Variable", "name": "limit", "type": "_2", "context": "_1" }
        }));
        assert_eq!(
            find(&g, g.root(), "limit::x"),
            Err(SpecError::NotAScope {
                name: "limit".to_string()
            })
        );
    }

    #[test]
    fn test_inherited_lookup_requires_a_base() {
        let g = private_inheritance();
        let b = g.by_key("_3").unwrap();
        let err = inherited_lookup_with_count(&g, b, "C", "n", Access::Private).unwrap_err();
        assert_eq!(
            err,
            SpecError::NotABaseClass {
                base: "C".to_string(),
                class: "B".to_string()
            }
        );
    }

    #[test]
    fn test_inherited_lookup_counts_subobjects() {
        let g = private_inheritance();
        let c = g.by_key("_5").unwrap();
        let (found, count) = inherited_lookup_with_count(&g, c, "B", "m", Access::Private).unwrap();
        assert_eq!(count, 1);
        assert_eq!(found[0].access, Access::Private);
    }
}
