//! Shared declaration fixtures for integration tests.
//!
//! Each fixture is an introspection table written as JSON, the same shape
//! the CLI reads, linked into a [`DeclGraph`].

#![allow(dead_code)]

use pyexpose_core::decl::{DeclGraph, DeclId, IntrospectionTable};
use pyexpose_core::diagnostics::BuildConfig;
use pyexpose_cpp::module::{build_module, BindingPlan, ModuleArtifacts};
use serde_json::{json, Value};

/// Fundamental types shared by every fixture (LP64 widths).
fn fundamentals() -> Value {
    json!({
        "_1": { "kind": "Namespace", "name": "::" },
        "_2": { "kind": "FundamentalType", "name": "void" },
        "_3": { "kind": "FundamentalType", "name": "int", "size": 32 },
        "_4": { "kind": "FundamentalType", "name": "unsigned int", "size": 32 },
        "_5": { "kind": "FundamentalType", "name": "long unsigned int", "size": 64 },
        "_6": { "kind": "FundamentalType", "name": "long int", "size": 64 },
        "_7": { "kind": "FundamentalType", "name": "double", "size": 64 },
        "_8": { "kind": "FundamentalType", "name": "char", "size": 8 },
        "_9": { "kind": "CvQualifiedType", "type": "_8", "const": true },
        "_10": { "kind": "PointerType", "type": "_9" },
        "_11": { "kind": "FundamentalType", "name": "short int", "size": 16 }
    })
}

/// Link `records` on top of the shared fundamentals.
pub fn link(records: Value) -> DeclGraph {
    let mut all = fundamentals();
    if let (Some(base), Value::Object(extra)) = (all.as_object_mut(), records) {
        base.extend(extra);
    }
    let table: IntrospectionTable = serde_json::from_value(all).expect("fixture table");
    DeclGraph::link(&table).expect("fixture links")
}

/// ```c++
/// namespace geom {
///   struct Point {
///     double x, y;
///     Point();
///     Point(double x, double y);
///     double norm() const;
///     void scale(double factor);
///   };
///   double distance(const Point &a, const Point &b);
///   class Shape {
///   public:
///     Shape();
///     virtual double area() const = 0;
///   };
///   class Circle : public Shape {
///   public:
///     Circle(double r);
///     double area() const;
///     double diameter() const;
///     void set_diameter(double d);
///     double radius;
///   };
///   double perimeter(const Circle &c);
///   void f(int, double, const char *);
///   void f(int, int, const char *);
///   void f(int);
///   void g(int);
///   void g(short);
///   double clamp(double v, double lo = 0, double hi = 1);
/// }
/// ```
pub fn geometry() -> DeclGraph {
    link(json!({
        "_20": { "kind": "Namespace", "name": "geom", "context": "_1" },

        "_21": { "kind": "Struct", "name": "Point", "context": "_20", "size": 16 },
        "_22": { "kind": "Field", "name": "x", "type": "_7", "context": "_21", "offset": 0 },
        "_23": { "kind": "Field", "name": "y", "type": "_7", "context": "_21", "offset": 8 },
        "_24": { "kind": "Constructor", "name": "Point", "context": "_21" },
        "_25": { "kind": "Constructor", "name": "Point", "context": "_21",
                 "arguments": [ { "type": "_7", "name": "x" }, { "type": "_7", "name": "y" } ] },
        "_26": { "kind": "Method", "name": "norm", "returns": "_7", "context": "_21",
                 "const": true },
        "_27": { "kind": "Method", "name": "scale", "returns": "_2", "context": "_21",
                 "arguments": [ { "type": "_7", "name": "factor" } ] },
        "_28": { "kind": "CvQualifiedType", "type": "_21", "const": true },
        "_29": { "kind": "ReferenceType", "type": "_28" },
        "_30": { "kind": "Function", "name": "distance", "returns": "_7", "context": "_20",
                 "arguments": [ { "type": "_29", "name": "a" }, { "type": "_29", "name": "b" } ] },

        "_31": { "kind": "Class", "name": "Shape", "context": "_20", "size": 8 },
        "_32": { "kind": "Method", "name": "area", "returns": "_7", "context": "_31",
                 "const": true, "virtual": true, "pure_virtual": true },

        "_33": { "kind": "Class", "name": "Circle", "context": "_20", "size": 16,
                 "bases": [ { "type": "_31" } ] },
        "_34": { "kind": "Constructor", "name": "Circle", "context": "_33",
                 "arguments": [ { "type": "_7", "name": "r" } ] },
        "_35": { "kind": "Method", "name": "area", "returns": "_7", "context": "_33",
                 "const": true, "virtual": true },
        "_36": { "kind": "Field", "name": "radius", "type": "_7", "context": "_33", "offset": 8 },
        "_37": { "kind": "CvQualifiedType", "type": "_33", "const": true },
        "_38": { "kind": "ReferenceType", "type": "_37" },
        "_39": { "kind": "Function", "name": "perimeter", "returns": "_7", "context": "_20",
                 "arguments": [ { "type": "_38", "name": "c" } ] },

        "_40": { "kind": "Function", "name": "f", "returns": "_2", "context": "_20",
                 "arguments": [ { "type": "_3" }, { "type": "_7" }, { "type": "_10" } ] },
        "_41": { "kind": "Function", "name": "f", "returns": "_2", "context": "_20",
                 "arguments": [ { "type": "_3" }, { "type": "_3" }, { "type": "_10" } ] },
        "_42": { "kind": "Function", "name": "f", "returns": "_2", "context": "_20",
                 "arguments": [ { "type": "_3" } ] },
        "_43": { "kind": "Function", "name": "g", "returns": "_2", "context": "_20",
                 "arguments": [ { "type": "_3" } ] },
        "_44": { "kind": "Function", "name": "g", "returns": "_2", "context": "_20",
                 "arguments": [ { "type": "_11" } ] },
        "_45": { "kind": "Function", "name": "clamp", "returns": "_7", "context": "_20",
                 "arguments": [ { "type": "_7", "name": "v" },
                                { "type": "_7", "name": "lo", "default": "0" },
                                { "type": "_7", "name": "hi", "default": "1" } ] },

        "_46": { "kind": "Constructor", "name": "Shape", "context": "_31" },
        "_47": { "kind": "Method", "name": "diameter", "returns": "_7", "context": "_33",
                 "const": true },
        "_48": { "kind": "Method", "name": "set_diameter", "returns": "_2", "context": "_33",
                 "arguments": [ { "type": "_7", "name": "d" } ] }
    }))
}

/// ```c++
/// struct A {};
/// struct B : A {};
/// struct C : A {};
/// struct D : B, C {};
/// struct E : D {};
/// ```
pub fn diamond() -> DeclGraph {
    link(json!({
        "_20": { "kind": "Struct", "name": "A", "context": "_1", "size": 4 },
        "_21": { "kind": "Constructor", "name": "A", "context": "_20", "artificial": true },
        "_22": { "kind": "Struct", "name": "B", "context": "_1", "size": 4,
                 "bases": [ { "type": "_20" } ] },
        "_23": { "kind": "Constructor", "name": "B", "context": "_22", "artificial": true },
        "_24": { "kind": "Struct", "name": "C", "context": "_1", "size": 4,
                 "bases": [ { "type": "_20" } ] },
        "_25": { "kind": "Constructor", "name": "C", "context": "_24", "artificial": true },
        "_26": { "kind": "Struct", "name": "D", "context": "_1", "size": 8,
                 "bases": [ { "type": "_22", "offset": 0 }, { "type": "_24", "offset": 4 } ] },
        "_27": { "kind": "Constructor", "name": "D", "context": "_26", "artificial": true },
        "_28": { "kind": "Struct", "name": "E", "context": "_1", "size": 8,
                 "bases": [ { "type": "_26" } ] },
        "_29": { "kind": "Constructor", "name": "E", "context": "_28", "artificial": true }
    }))
}

pub fn id(graph: &DeclGraph, key: &str) -> DeclId {
    graph.by_key(key).expect("fixture key")
}

pub fn plan(value: Value) -> BindingPlan {
    serde_json::from_value(value).expect("binding plan")
}

pub fn build(graph: &DeclGraph, value: Value) -> ModuleArtifacts {
    build_module(graph, &plan(value), &BuildConfig::default()).expect("module builds")
}
