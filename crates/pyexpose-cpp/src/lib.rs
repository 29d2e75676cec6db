//! C++ binding planner for pyexpose.
//!
//! This crate turns a linked declaration graph and a binding plan into the
//! artifacts of an extension module. It includes:
//! - Scope and inheritance-aware name lookup
//! - The conversion registry and scalar coercion buckets
//! - Overload dispatch trees, their emission and their evaluation
//! - Hierarchy partitioning for base accessors
//! - Overload selection, call plans and the module build

pub mod bases;
pub mod callplan;
pub mod conversion;
pub mod dispatch;
pub mod hierarchy;
pub mod lookup;
pub mod module;
pub mod overload;
pub mod validation;

pub use module::{build_module, BindingPlan, GlueFunction, ModuleArtifacts};
