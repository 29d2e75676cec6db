//! End-to-end module builds over the geometry fixture.

mod support;

use pyexpose_core::diagnostics::BuildConfig;
use pyexpose_core::error::{RuntimeFailure, SpecError};
use pyexpose_cpp::callplan::{CallBody, CallingConvention};
use pyexpose_cpp::dispatch::RuntimeValue;
use pyexpose_cpp::module::{build_module, ClassArtifacts, ModuleArtifacts};
use serde_json::json;

use support::{build, geometry, plan};

fn geometry_module() -> ModuleArtifacts {
    build(
        &geometry(),
        json!({
            "module": "geom",
            "classes": [
                { "name": "Point", "cpp": "geom::Point",
                  "methods": [ { "name": "norm" }, { "name": "scale" } ],
                  "members": [ { "name": "x", "cpp": "x" },
                               { "name": "y", "cpp": "y", "readonly": true } ] },
                { "name": "Shape", "cpp": "geom::Shape",
                  "methods": [ { "name": "area" } ] },
                { "name": "Circle", "cpp": "geom::Circle",
                  "methods": [ { "name": "area" },
                               { "name": "perimeter",
                                 "overloads": [ { "func": "perimeter" } ] } ],
                  "members": [ { "name": "radius", "cpp": "radius" } ] }
            ],
            "functions": [ { "name": "distance", "overloads": [ { "func": "geom::distance" } ] } ]
        }),
    )
}

fn class<'a>(module: &'a ModuleArtifacts, name: &str) -> &'a ClassArtifacts {
    module
        .classes
        .iter()
        .find(|c| c.name == name)
        .expect("class planned")
}

mod classes {
    use super::*;

    #[test]
    fn default_constructor_is_chosen_among_several() {
        let module = geometry_module();
        let point = class(&module, "Point");
        assert_eq!(point.cpp, "geom::Point");
        assert_eq!(point.init.plan.errval, "-1");
        assert_eq!(point.init.plan.overloads, vec!["geom::Point::Point()".to_string()]);
        assert!(matches!(point.init.plan.body, CallBody::Parsed { .. }));
        let graph = geometry();
        assert_eq!(point.init.plan.route(&graph, &[], &[]), Ok(0));
        assert!(point.init.plan.route(&graph, &[RuntimeValue::Int(1)], &[]).is_err());
    }

    #[test]
    fn abstract_class_cannot_be_instantiated() {
        let module = geometry_module();
        let shape = class(&module, "Shape");
        let graph = geometry();
        assert_eq!(
            shape.init.plan.route(&graph, &[], &[]),
            Err(RuntimeFailure::InaccessibleConstructor {
                class: "geom::Shape".to_string()
            })
        );
        assert!(shape.init.code.contains("cannot create 'geom::Shape' instances"));
    }

    #[test]
    fn abstract_class_with_init_directive_is_constructible() {
        let module = build(
            &geometry(),
            json!({
                "module": "geom",
                "classes": [ { "name": "Shape", "cpp": "geom::Shape", "init": [ {} ] } ]
            }),
        );
        let init = &class(&module, "Shape").init;
        assert_eq!(init.plan.overloads, vec!["geom::Shape::Shape()".to_string()]);
        assert_eq!(init.plan.route(&geometry(), &[], &[]), Ok(0));
        assert!(!init.code.contains("cannot create"));
    }

    #[test]
    fn pure_virtual_method_raises_not_implemented() {
        let module = geometry_module();
        let area = &class(&module, "Shape").methods[0].plan;
        assert_eq!(area.body, CallBody::NotImplemented);
        assert_eq!(
            area.route(&geometry(), &[], &[]),
            Err(RuntimeFailure::NotImplemented)
        );
        assert!(area.render(1).contains("PyExc_NotImplementedError"));
    }

    #[test]
    fn virtual_override_is_called_qualified() {
        let module = geometry_module();
        let area = &class(&module, "Circle").methods[0].plan;
        assert_eq!(area.convention, CallingConvention::NoArgs);
        assert!(area.calls[0].callee.ends_with("base.geom::Circle::area"));
    }

    #[test]
    fn free_function_binds_the_receiver() {
        let module = geometry_module();
        let perimeter = &class(&module, "Circle").methods[1];
        assert_eq!(perimeter.plan.convention, CallingConvention::NoArgs);
        assert_eq!(perimeter.flags, "METH_NOARGS");
        let text = &perimeter.code;
        assert!(text.contains("geom::perimeter(base)"), "{text}");
    }

    #[test]
    fn exposed_bases_are_listed_by_runtime_name() {
        let module = geometry_module();
        assert_eq!(class(&module, "Circle").bases, vec!["Shape".to_string()]);
        assert!(class(&module, "Shape").downcast.is_direct());
    }
}

mod methods_and_members {
    use super::*;

    #[test]
    fn const_method_without_arguments() {
        let module = geometry_module();
        let norm = &class(&module, "Point").methods[0].plan;
        assert_eq!(norm.name, "norm");
        assert_eq!(norm.convention, CallingConvention::NoArgs);
        assert!(norm.calls[0].render(&[], "0").contains("base.norm()"));
    }

    #[test]
    fn named_parameters_take_keywords() {
        let module = geometry_module();
        let scale = &class(&module, "Point").methods[1].plan;
        assert_eq!(scale.convention, CallingConvention::VarArgsKeywords);
        let graph = geometry();
        assert_eq!(scale.route(&graph, &[], &["factor".to_string()]), Ok(0));
        assert_eq!(
            scale.route(&graph, &[], &["ratio".to_string()]),
            Err(RuntimeFailure::UnknownKeyword {
                name: "ratio".to_string()
            })
        );
    }

    #[test]
    fn members_carry_storage_and_offsets() {
        let module = geometry_module();
        let point = class(&module, "Point");
        let x = &point.members[0];
        assert_eq!(x.offset, Some(0));
        assert_eq!(x.storage.as_deref(), Some("T_DOUBLE"));
        assert!(x.set.is_some());

        let y = &point.members[1];
        assert_eq!(y.offset, Some(8));
        assert_eq!(y.set, None);

        let radius = &class(&module, "Circle").members[0];
        assert_eq!(radius.offset, Some(8));
    }

    #[test]
    fn free_function_with_named_references() {
        let module = geometry_module();
        let distance = &module.functions[0];
        assert!(!distance.plan.is_static);
        assert_eq!(distance.flags, "METH_VARARGS|METH_KEYWORDS");
        let graph = geometry();
        assert_eq!(
            distance
                .plan
                .route(&graph, &[], &["a".to_string(), "b".to_string()]),
            Ok(0)
        );
        assert!(distance.code.contains("geom::distance("));
    }

    #[test]
    fn no_warnings_for_a_clean_plan() {
        assert!(geometry_module().warnings.is_empty());
    }
}

mod constructor_directives {
    use super::*;

    #[test]
    fn explicit_signature_picks_the_matching_constructor() {
        let module = build(
            &geometry(),
            json!({
                "module": "geom",
                "classes": [ { "name": "Point", "cpp": "geom::Point",
                               "init": [ { "args": ["double", "double"] } ] } ]
            }),
        );
        assert_eq!(
            class(&module, "Point").init.plan.overloads,
            vec!["geom::Point::Point(double,double)".to_string()]
        );
    }

    #[test]
    fn unmatched_signature_lists_the_candidates() {
        let err = build_module(
            &geometry(),
            &plan(json!({
                "module": "geom",
                "classes": [ { "name": "Point", "cpp": "geom::Point",
                               "init": [ { "args": ["int"] } ] } ]
            })),
            &BuildConfig::default(),
        )
        .unwrap_err();
        let SpecError::NoMatchingSignature { candidates, .. } = &err else {
            panic!("unexpected error: {err:?}");
        };
        assert!(candidates.contains("\n(double,double)"));
    }
}

mod bound_arguments {
    use super::*;

    fn clamp(binds: serde_json::Value) -> Result<ModuleArtifacts, SpecError> {
        build_module(
            &geometry(),
            &plan(json!({
                "module": "geom",
                "functions": [ { "name": "clamp",
                                 "overloads": [ { "func": "geom::clamp", "binds": binds } ] } ]
            })),
            &BuildConfig::default(),
        )
    }

    #[test]
    fn binding_trailing_arguments_removes_their_defaults() {
        let module = clamp(json!({ "1": "-1.0", "2": "1.0" })).unwrap();
        let clamp = &module.functions[0];
        assert!(clamp.code.contains("geom::clamp(_0,-1.0,1.0)"), "{}", clamp.code);
        let graph = geometry();
        assert_eq!(clamp.plan.route(&graph, &[RuntimeValue::Float(0.5)], &[]), Ok(0));
    }

    #[test]
    fn binding_after_an_omittable_default_is_rejected() {
        let err = clamp(json!({ "2": "1.0" })).unwrap_err();
        assert!(
            matches!(&err, SpecError::Invalid { message } if message.contains("argument #3")),
            "{err:?}"
        );
    }
}

mod properties {
    use super::*;

    fn circle_properties(properties: serde_json::Value) -> Result<ModuleArtifacts, SpecError> {
        build_module(
            &geometry(),
            &plan(json!({
                "module": "geom",
                "doc": "Plane geometry.",
                "classes": [ { "name": "Circle", "cpp": "geom::Circle",
                               "doc": "A circle.",
                               "methods": [ { "name": "area", "doc": "Enclosed area." } ],
                               "members": [ { "name": "radius", "cpp": "radius",
                                              "doc": "Radius." } ],
                               "properties": properties } ]
            })),
            &BuildConfig::default(),
        )
    }

    fn diameter() -> ModuleArtifacts {
        circle_properties(json!([
            { "name": "diameter",
              "get": { "func": "diameter" },
              "set": [ { "func": "set_diameter" } ],
              "doc": "Twice the radius." }
        ]))
        .unwrap()
    }

    #[test]
    fn getter_takes_no_arguments() {
        let module = diameter();
        let prop = &class(&module, "Circle").properties[0];
        let get = prop.get.as_ref().expect("getter planned");
        assert_eq!(get.plan.name, "get_diameter");
        assert_eq!(get.plan.convention, CallingConvention::NoArgs);
        assert!(get.code.contains("base.diameter()"), "{}", get.code);
    }

    #[test]
    fn setter_reports_status() {
        let module = diameter();
        let prop = &class(&module, "Circle").properties[0];
        let set = prop.set.as_ref().expect("setter planned");
        assert_eq!(set.plan.name, "set_diameter");
        assert_eq!(set.plan.errval, "-1");
        assert_eq!(set.plan.convention, CallingConvention::SingleObject);
        assert!(set.code.contains("base.set_diameter("), "{}", set.code);
        assert!(set.code.contains("return 0;"));

        let graph = geometry();
        assert_eq!(set.plan.route(&graph, &[RuntimeValue::Float(2.0)], &[]), Ok(0));
        assert!(set.plan.route(&graph, &[], &[]).is_err());
    }

    #[test]
    fn docs_reach_the_artifacts() {
        let module = diameter();
        assert_eq!(module.doc.as_deref(), Some("Plane geometry."));
        let circle = class(&module, "Circle");
        assert_eq!(circle.doc.as_deref(), Some("A circle."));
        assert_eq!(circle.methods[0].doc.as_deref(), Some("Enclosed area."));
        assert_eq!(circle.members[0].doc.as_deref(), Some("Radius."));
        assert_eq!(circle.properties[0].doc.as_deref(), Some("Twice the radius."));
        assert_eq!(circle.init.doc, None);
    }

    #[test]
    fn property_needs_an_accessor() {
        let err = circle_properties(json!([ { "name": "diameter" } ])).unwrap_err();
        assert!(matches!(err, SpecError::Invalid { .. }), "{err:?}");
    }

    #[test]
    fn getter_must_take_no_arguments() {
        let err = circle_properties(json!([
            { "name": "diameter", "get": { "func": "set_diameter" } }
        ]))
        .unwrap_err();
        assert!(
            matches!(&err, SpecError::Invalid { message } if message.contains("getter")),
            "{err:?}"
        );
    }

    #[test]
    fn setter_must_take_one_argument() {
        let err = circle_properties(json!([
            { "name": "diameter", "set": [ { "func": "diameter" } ] }
        ]))
        .unwrap_err();
        assert!(
            matches!(&err, SpecError::Invalid { message } if message.contains("setter")),
            "{err:?}"
        );
    }
}

mod specification_errors {
    use super::*;

    fn build_err(value: serde_json::Value) -> SpecError {
        build_module(&geometry(), &plan(value), &BuildConfig::default()).unwrap_err()
    }

    #[test]
    fn overloads_with_one_bucket_are_ambiguous() {
        let err = build_err(json!({
            "module": "geom",
            "functions": [ { "name": "g", "overloads": [ { "func": "geom::g" } ] } ]
        }));
        assert!(matches!(err, SpecError::AmbiguousOverload { .. }), "{err:?}");
    }

    #[test]
    fn reserved_method_name_is_rejected() {
        let err = build_err(json!({
            "module": "geom",
            "classes": [ { "name": "Point", "cpp": "geom::Point",
                           "methods": [ { "name": "print", "overloads": [ { "func": "norm" } ] } ] } ]
        }));
        assert_eq!(
            err,
            SpecError::ReservedIdentifier {
                name: "print".to_string()
            }
        );
    }

    #[test]
    fn member_must_name_a_field() {
        let err = build_err(json!({
            "module": "geom",
            "classes": [ { "name": "Point", "cpp": "geom::Point",
                           "members": [ { "name": "norm", "cpp": "norm" } ] } ]
        }));
        assert!(
            matches!(&err, SpecError::WrongKind { expected, .. } if expected == "member variable"),
            "{err:?}"
        );
    }

    #[test]
    fn unknown_class_is_not_found() {
        let err = build_err(json!({
            "module": "geom",
            "classes": [ { "name": "Nope", "cpp": "geom::Nope" } ]
        }));
        assert!(matches!(err, SpecError::NotFound { .. }), "{err:?}");
    }

    #[test]
    fn invalid_module_name() {
        let err = build_err(json!({ "module": "geom-2" }));
        assert_eq!(
            err,
            SpecError::InvalidIdentifier {
                name: "geom-2".to_string()
            }
        );
    }
}
