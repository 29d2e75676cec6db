//! Compile-only test to verify public API surface.
//!
//! This file serves as a compile-time contract for the public API.
//! If this file fails to compile, the public API has regressed.
//!
//! Run with: cargo test -p pyexpose -- api_surface

// Allow unused imports - this test is about compile-time verification, not runtime usage
#![allow(unused_imports)]

// ============================================================================
// Core Infrastructure Types
// ============================================================================

// decl module - introspection records and the declaration graph
use pyexpose::decl::{
    Access, Argument, Callable, ConstructorDecl, DeclGraph, DeclId, DeclKind, FieldDecl,
    IntrospectionTable, Record, Shape, Ty, TypeKey,
};

// error module - error taxonomies and codes
use pyexpose::error::{ExposeError, OutputErrorCode, RuntimeFailure, SpecError, SpecResult};

// diagnostics module - configuration and warnings
use pyexpose::diagnostics::{BuildConfig, Diagnostics, Warning};

// ============================================================================
// Planning
// ============================================================================

use pyexpose::bases::{all_fields, traverse_bases, BaseCache, BaseFrame, FieldSlot};
use pyexpose::callplan::{
    build_constructor, build_function, build_getter, build_setter, ArgParser, CallBody,
    CallPlan, CallResult, CallSite, CallingConvention, ParsedParam,
};
use pyexpose::conversion::{
    coercion_guards, Bucket, Capabilities, CheckAndCast, ConversionRegistry, ExposedClass,
    FromRuntime, FromTemplate, NumericGuard, OwnershipSemantic, Scalar, ScalarTypes, Template,
    COERCION,
};
use pyexpose::dispatch::{
    build_tree, emit, emit_checks, render, route, Candidate, DispatchNode, RuntimeValue, Step,
};
use pyexpose::hierarchy::{downcast, partition, Downcast, DowncastCheck, PartitionNode};
use pyexpose::lookup::{find, lookup_member, MemberMatch, SCOPE_SEPARATOR};
use pyexpose::module::{
    build_module, BindingPlan, ClassArtifacts, ClassPlan, ConversionPlan, FunctionPlan,
    GlueFunction, MemberArtifact, MemberPlan, ModuleArtifacts, PropertyArtifact, PropertyPlan,
};
use pyexpose::overload::{
    expand_defaults, resolve_overloads, select_constructors, ConstructorChoice, ConstructorSpec,
    OverloadSpec, ResolvedOverload,
};
use pyexpose::validation::{backup_name, is_reserved, validate_identifier};

// ============================================================================
// Front Door
// ============================================================================

use pyexpose::cli::{load_decls, load_plan, run_build, DeclsDocument};
use pyexpose::output::{emit_response, BuildResponse, ErrorInfo, ErrorResponse, SCHEMA_VERSION};

#[test]
fn api_surface_compiles() {
    // This test passes if the file compiles.
}
