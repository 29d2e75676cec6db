//! Partitioning of exposed class hierarchies at multiple inheritance.
//!
//! Casting a runtime object to a base class is free while every subclass
//! inherits from one exposed class only. A subclass with several exposed
//! bases places some of them at a non-zero offset, so the base accessor must
//! test for it and adjust the pointer through the subclass first.
//!
//! [`partition`] folds every single-inheritance subclass into the node of its
//! base and opens a new node at each multiply-inheriting one. [`downcast`]
//! turns the tree into the ordered checks of the base accessor, most derived
//! first.

use std::collections::HashSet;
use std::fmt::Write as _;

use serde::Serialize;
use tracing::debug;

use pyexpose_core::decl::DeclId;
use pyexpose_core::error::{SpecError, SpecResult};

use crate::conversion::{ConversionRegistry, ExposedClass};

/// A run of classes joined by single inheritance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionNode {
    /// The class the run starts at.
    pub main: DeclId,
    /// Every class of the run, `main` first.
    pub classes: Vec<DeclId>,
    /// Runs starting at multiply-inheriting subclasses.
    pub derived: Vec<PartitionNode>,
}

impl PartitionNode {
    fn new(main: DeclId) -> Self {
        PartitionNode {
            main,
            classes: vec![main],
            derived: Vec::new(),
        }
    }

    /// Whether the tree has no fork.
    pub fn is_trivial(&self) -> bool {
        self.derived.is_empty()
    }

    /// Number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        1 + self.derived.iter().map(PartitionNode::node_count).sum::<usize>()
    }

    /// Every class in the tree, depth first.
    pub fn all_classes(&self) -> Vec<DeclId> {
        let mut out = self.classes.clone();
        for d in &self.derived {
            out.extend(d.all_classes());
        }
        out
    }
}

fn exposed<'r>(registry: &'r ConversionRegistry<'_>, class: DeclId) -> SpecResult<&'r ExposedClass> {
    registry
        .exposed_class(class)
        .ok_or_else(|| SpecError::wrong_kind(registry.graph().full_name(class), "exposed class"))
}

/// Partition `class` and its exposed descendants.
///
/// A class reached through several bases is placed once, at its first
/// encounter.
pub fn partition(registry: &ConversionRegistry<'_>, class: DeclId) -> SpecResult<PartitionNode> {
    let mut root = PartitionNode::new(class);
    let mut seen = HashSet::from([class]);
    for &d in &exposed(registry, class)?.derived {
        chain(registry, d, &mut root, &mut seen)?;
    }
    if !root.is_trivial() {
        debug!(
            class = %registry.graph().full_name(class),
            nodes = root.node_count(),
            "hierarchy partitioned"
        );
    }
    Ok(root)
}

fn chain(
    registry: &ConversionRegistry<'_>,
    class: DeclId,
    node: &mut PartitionNode,
    seen: &mut HashSet<DeclId>,
) -> SpecResult<()> {
    if !seen.insert(class) {
        return Ok(());
    }
    let info = exposed(registry, class)?;
    let node = if info.multi_inherit() {
        node.derived.push(PartitionNode::new(class));
        let last = node.derived.len() - 1;
        &mut node.derived[last]
    } else {
        node.classes.push(class);
        node
    };
    for &d in &info.derived {
        chain(registry, d, node, seen)?;
    }
    Ok(())
}

// ============================================================================
// Downcast Chains
// ============================================================================

/// One explicit test of a base accessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DowncastCheck {
    pub class: DeclId,
    /// Runtime name of the subclass.
    pub name: String,
    /// Native type of the subclass.
    pub ty: String,
}

/// The base accessor `get_base_<name>` of an exposed class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Downcast {
    pub class: DeclId,
    pub name: String,
    pub ty: String,
    /// Subclass tests in evaluation order; empty when the cast is direct.
    pub checks: Vec<DowncastCheck>,
}

/// Build the base accessor of `class`.
pub fn downcast(registry: &ConversionRegistry<'_>, class: DeclId) -> SpecResult<Downcast> {
    let graph = registry.graph();
    let tree = partition(registry, class)?;
    let mut checks = Vec::new();
    for d in &tree.derived {
        collect_checks(registry, d, &mut checks)?;
    }
    Ok(Downcast {
        class,
        name: exposed(registry, class)?.name.clone(),
        ty: graph.full_name(class),
        checks,
    })
}

/// Subclass nodes are tested before the node itself.
fn collect_checks(
    registry: &ConversionRegistry<'_>,
    node: &PartitionNode,
    out: &mut Vec<DowncastCheck>,
) -> SpecResult<()> {
    for d in &node.derived {
        collect_checks(registry, d, out)?;
    }
    out.push(DowncastCheck {
        class: node.main,
        name: exposed(registry, node.main)?.name.clone(),
        ty: registry.graph().full_name(node.main),
    });
    Ok(())
}

impl Downcast {
    pub fn is_direct(&self) -> bool {
        self.checks.is_empty()
    }

    /// Source of the accessor.
    pub fn render(&self) -> String {
        let Downcast { name, ty, .. } = self;
        let mut out = String::new();
        if self.is_direct() {
            let _ = write!(
                out,
                "{ty} &get_base_{name}(PyObject *o) {{
    if(UNLIKELY(!PyObject_TypeCheck(o,get_obj_{name}Type()))) {{
        PyErr_SetString(PyExc_TypeError,\"object is not an instance of {name}\");
        throw py_error_set();
    }}
    return cast_base_{name}(o);
}}
"
            );
            return out;
        }
        let _ = write!(
            out,
            "#ifdef PYEXPOSE_TEMPLATE_HELPERS
{ty} &get_base_{name}(PyObject *x,bool safe) {{
#else
{ty} &get_base_{name}(PyObject *x,bool safe=true) {{
#endif
"
        );
        for check in &self.checks {
            // The offset test folds to false when the base sits at offset zero.
            let _ = write!(
                out,
                "    if(reinterpret_cast<long>(static_cast<{ty}*>(reinterpret_cast<{other_ty}*>(1))) != 1 &&
            PyObject_TypeCheck(x,get_obj_{other}Type()))
        return cast_base_{other}(x);
",
                other_ty = check.ty,
                other = check.name
            );
        }
        let _ = write!(
            out,
            "    if(UNLIKELY(safe && !PyObject_TypeCheck(x,get_obj_{name}Type()))) {{
        PyErr_SetString(PyExc_TypeError,\"object is not an instance of {name}\");
        throw py_error_set();
    }}
    assert(PyObject_TypeCheck(x,get_obj_{name}Type()));
    return cast_base_{name}(x);
}}
"
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_accessor_has_no_fork() {
        let d = Downcast {
            class: DeclId(1),
            name: "Shape".to_string(),
            ty: "geom::Shape".to_string(),
            checks: Vec::new(),
        };
        let text = d.render();
        assert!(text.starts_with("geom::Shape &get_base_Shape(PyObject *o) {"));
        assert!(!text.contains("reinterpret_cast<long>"));
    }

    #[test]
    fn test_forked_accessor_tests_subclasses_in_order() {
        let d = Downcast {
            class: DeclId(1),
            name: "A".to_string(),
            ty: "A".to_string(),
            checks: vec![
                DowncastCheck {
                    class: DeclId(3),
                    name: "E".to_string(),
                    ty: "E".to_string(),
                },
                DowncastCheck {
                    class: DeclId(2),
                    name: "D".to_string(),
                    ty: "D".to_string(),
                },
            ],
        };
        let text = d.render();
        let e = text.find("cast_base_E(x)").unwrap();
        let dd = text.find("cast_base_D(x)").unwrap();
        let a = text.find("cast_base_A(x)").unwrap();
        assert!(e < dd && dd < a);
        assert!(text.contains("static_cast<A*>(reinterpret_cast<D*>(1))"));
    }

    #[test]
    fn test_partition_node_counts() {
        let mut root = PartitionNode::new(DeclId(1));
        root.classes.push(DeclId(2));
        root.derived.push(PartitionNode::new(DeclId(3)));
        assert_eq!(root.node_count(), 2);
        assert_eq!(root.all_classes(), vec![DeclId(1), DeclId(2), DeclId(3)]);
        assert!(!root.is_trivial());
    }
}
