//! pyexpose: plans Python extension glue for C++ declarations.
//!
//! The library is a thin front door over the workspace crates; the planning
//! itself lives in `pyexpose-core` and `pyexpose-cpp`.

// Core infrastructure - re-exported from pyexpose-core
pub use pyexpose_core::decl;
pub use pyexpose_core::diagnostics;
pub use pyexpose_core::error;

// Host-language planning - re-exported from pyexpose-cpp
pub use pyexpose_cpp::bases;
pub use pyexpose_cpp::callplan;
pub use pyexpose_cpp::conversion;
pub use pyexpose_cpp::dispatch;
pub use pyexpose_cpp::hierarchy;
pub use pyexpose_cpp::lookup;
pub use pyexpose_cpp::module;
pub use pyexpose_cpp::overload;
pub use pyexpose_cpp::validation;

// Front door
pub mod cli;
pub mod output;
