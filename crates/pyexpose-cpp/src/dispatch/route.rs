//! Routing evaluator for emitted dispatch steps.
//!
//! Interprets steps the way the generated glue executes them: blocks run in
//! order, a failed guard skips its block, and a block that does not reach a
//! call falls through to the next one.

use std::fmt;

use serde::{Deserialize, Serialize};

use pyexpose_core::decl::{DeclGraph, DeclId};
use pyexpose_core::error::RuntimeFailure;

use super::emit::{CountOp, Guard, Step};
use crate::conversion::NumericGuard;

/// A modelled runtime argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RuntimeValue {
    Int(i64),
    Long(i128),
    Float(f64),
    Bool(bool),
    Str(String),
    Unicode(String),
    /// Instance of the exposed class.
    Instance(DeclId),
    None,
}

impl RuntimeValue {
    /// Runtime type name, as reported by failed dispatch.
    pub fn type_name(&self) -> &'static str {
        match self {
            RuntimeValue::Int(_) => "int",
            RuntimeValue::Long(_) => "long",
            RuntimeValue::Float(_) => "float",
            RuntimeValue::Bool(_) => "bool",
            RuntimeValue::Str(_) => "str",
            RuntimeValue::Unicode(_) => "unicode",
            RuntimeValue::Instance(_) => "instance",
            RuntimeValue::None => "NoneType",
        }
    }

    fn passes(&self, guard: &Guard, graph: &DeclGraph) -> bool {
        match (guard, self) {
            (Guard::Instance { class, .. }, RuntimeValue::Instance(actual)) => {
                graph.is_base_of(*class, *actual)
            }
            (Guard::Numeric { check }, value) => match check {
                NumericGuard::Number => matches!(
                    value,
                    RuntimeValue::Int(_)
                        | RuntimeValue::Long(_)
                        | RuntimeValue::Float(_)
                        | RuntimeValue::Bool(_)
                ),
                NumericGuard::Int => matches!(value, RuntimeValue::Int(_) | RuntimeValue::Bool(_)),
                NumericGuard::Long => matches!(value, RuntimeValue::Long(_)),
                NumericGuard::Float => matches!(value, RuntimeValue::Float(_)),
            },
            (Guard::Unicode { .. }, RuntimeValue::Unicode(_)) => true,
            (Guard::Unicode { or_str }, RuntimeValue::Str(_)) => *or_str,
            (Guard::Str, RuntimeValue::Str(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RuntimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeValue::Int(v) => write!(f, "{v}"),
            RuntimeValue::Long(v) => write!(f, "{v}L"),
            RuntimeValue::Float(v) => write!(f, "{v:?}"),
            RuntimeValue::Bool(v) => f.write_str(if *v { "True" } else { "False" }),
            RuntimeValue::Str(v) => write!(f, "{v:?}"),
            RuntimeValue::Unicode(v) => write!(f, "u{v:?}"),
            RuntimeValue::Instance(id) => write!(f, "<{id}>"),
            RuntimeValue::None => f.write_str("None"),
        }
    }
}

/// Candidate id reached by calling with `args`.
pub fn route(
    steps: &[Step],
    args: &[RuntimeValue],
    graph: &DeclGraph,
) -> Result<usize, RuntimeFailure> {
    run(steps, args, graph).ok_or_else(|| RuntimeFailure::NoMatchingOverload {
        received: args.iter().map(|a| a.type_name().to_string()).collect(),
    })
}

fn run(steps: &[Step], args: &[RuntimeValue], graph: &DeclGraph) -> Option<usize> {
    for step in steps {
        let reached = match step {
            Step::ArgCount {
                op,
                count,
                then,
                otherwise,
            } => {
                let holds = match op {
                    CountOp::Equal => args.len() == *count,
                    CountOp::Greater => args.len() > *count,
                };
                run(if holds { then } else { otherwise }, args, graph)
            }
            Step::Check {
                index, guard, body, ..
            } => match args.get(*index) {
                Some(value) if value.passes(guard, graph) => run(body, args, graph),
                _ => None,
            },
            Step::Call(call) => Some(call.candidate),
        };
        if reached.is_some() {
            return reached;
        }
    }
    None
}
