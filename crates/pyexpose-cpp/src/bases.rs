//! Whole-hierarchy base traversal with virtual-base sharing.
//!
//! [`traverse_bases`] visits every base-class subobject of a class, depth
//! first in declaration order. Per-class data is produced by a generator and
//! memoized in an explicit [`BaseCache`] owned by the caller, so the
//! generator runs once per class for the lifetime of the cache. A virtual
//! base reached a second time within one traversal is reported as a shared
//! frame: it contributes no new data, but it is not missing either.

use std::collections::{HashMap, HashSet};

use pyexpose_core::decl::{Access, DeclGraph, DeclId, DeclKind, Ty};

/// One base-class subobject reached by a traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseFrame {
    pub class: DeclId,
    /// Access composed along the inheritance path.
    pub access: Access,
    /// Byte offset of the subobject within the most-derived class.
    pub offset: u64,
    pub is_virtual: bool,
    /// 1 for direct bases.
    pub depth: usize,
    /// A virtual base already counted earlier in this traversal.
    pub shared: bool,
}

/// Memo of per-class data, shared by the traversals it is passed to.
#[derive(Debug)]
pub struct BaseCache<T> {
    entries: HashMap<DeclId, T>,
}

impl<T> Default for BaseCache<T> {
    fn default() -> Self {
        BaseCache {
            entries: HashMap::new(),
        }
    }
}

impl<T> BaseCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Data generated for `class`, if it was visited.
    pub fn get(&self, class: DeclId) -> Option<&T> {
        self.entries.get(&class)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Visit every base subobject of `class`, excluding `class` itself.
///
/// `generate` is called at most once per class per cache.
pub fn traverse_bases<T>(
    graph: &DeclGraph,
    class: DeclId,
    cache: &mut BaseCache<T>,
    mut generate: impl FnMut(&DeclGraph, DeclId) -> T,
) -> Vec<BaseFrame> {
    let mut state = Traversal {
        path: vec![class],
        virtual_seen: HashSet::new(),
        frames: Vec::new(),
    };
    walk(graph, class, Access::Public, 0, 1, cache, &mut generate, &mut state);
    state.frames
}

/// State of one call to [`traverse_bases`].
struct Traversal {
    path: Vec<DeclId>,
    /// Virtual bases already reported.
    virtual_seen: HashSet<DeclId>,
    frames: Vec<BaseFrame>,
}

#[allow(clippy::too_many_arguments)]
fn walk<T>(
    graph: &DeclGraph,
    class: DeclId,
    access: Access,
    offset: u64,
    depth: usize,
    cache: &mut BaseCache<T>,
    generate: &mut impl FnMut(&DeclGraph, DeclId) -> T,
    state: &mut Traversal,
) {
    for base in graph.bases(class) {
        let Some(base_class) = graph.class_of(&base.ty) else {
            continue;
        };
        if state.path.contains(&base_class) {
            continue;
        }
        let frame = BaseFrame {
            class: base_class,
            access: base.access.through(access),
            offset: offset + base.offset,
            is_virtual: base.is_virtual,
            depth,
            shared: base.is_virtual && !state.virtual_seen.insert(base_class),
        };
        state.frames.push(frame);
        if frame.shared {
            continue;
        }
        if !cache.entries.contains_key(&base_class) {
            let value = generate(graph, base_class);
            cache.entries.insert(base_class, value);
        }
        state.path.push(base_class);
        walk(
            graph,
            base_class,
            frame.access,
            frame.offset,
            depth + 1,
            cache,
            generate,
            state,
        );
        state.path.pop();
    }
}

// ============================================================================
// Fields
// ============================================================================

/// A non-static data member as laid out in a most-derived object.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSlot {
    pub decl: DeclId,
    pub name: String,
    pub ty: Ty,
    pub access: Access,
    pub offset: u64,
}

fn own_fields(graph: &DeclGraph, class: DeclId) -> Vec<FieldSlot> {
    graph
        .members(class)
        .iter()
        .filter_map(|&m| match graph.kind(m) {
            DeclKind::Field(f) if !f.is_static => Some(FieldSlot {
                decl: m,
                name: f.name.clone(),
                ty: f.ty.clone(),
                access: f.access,
                offset: f.offset,
            }),
            _ => None,
        })
        .collect()
}

/// Every non-static field of `class` and its bases, sorted by offset.
///
/// Inherited fields carry their composed access and absolute offset. Fields
/// of a virtual base appear once.
pub fn all_fields(graph: &DeclGraph, class: DeclId) -> Vec<FieldSlot> {
    let mut cache = BaseCache::new();
    let frames = traverse_bases(graph, class, &mut cache, own_fields);

    let mut fields = own_fields(graph, class);
    for frame in frames.iter().filter(|f| !f.shared) {
        let Some(inherited) = cache.get(frame.class) else {
            continue;
        };
        fields.extend(inherited.iter().map(|f| FieldSlot {
            access: f.access.through(frame.access),
            offset: f.offset + frame.offset,
            ..f.clone()
        }));
    }
    fields.sort_by_key(|f| f.offset);
    fields
}
