//! Emission of dispatch trees as guarded steps.
//!
//! Steps mirror the generated glue: sequential `if` blocks that either return
//! from a matching call or fall through to the next block. Rendering is a
//! plain walk over the steps; the caller supplies the text of each call.

use std::fmt::Write as _;

use serde::Serialize;

use pyexpose_core::decl::DeclId;
use pyexpose_core::diagnostics::Diagnostics;
use pyexpose_core::error::SpecResult;

use super::{Candidate, DispatchNode};
use crate::conversion::{coercion_guards, Bucket, ConversionRegistry, NumericGuard, Template};

/// Expression used to fetch argument `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgAccessor {
    /// Items of the positional argument tuple `args`.
    Tuple,
    /// Named variables, one per argument.
    Vars(Vec<String>),
}

impl ArgAccessor {
    pub fn get(&self, index: usize) -> String {
        match self {
            ArgAccessor::Tuple => format!("PyTuple_GET_ITEM(args,{index})"),
            ArgAccessor::Vars(vars) => vars.get(index).cloned().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CountOp {
    Equal,
    Greater,
}

impl CountOp {
    fn symbol(self) -> &'static str {
        match self {
            CountOp::Equal => "==",
            CountOp::Greater => ">",
        }
    }
}

/// Runtime type test applied to one argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Guard {
    /// Instance of an exposed class or one of its subclasses.
    Instance { class: DeclId, check: Template },
    Numeric { check: NumericGuard },
    /// Unicode object; with `or_str`, narrow strings are accepted too.
    Unicode { or_str: bool },
    Str,
}

impl Guard {
    fn render(&self, arg: &str) -> String {
        match self {
            Guard::Instance { check, .. } => check.fill(arg),
            Guard::Numeric { check } => format!("{}({arg})", check.function()),
            Guard::Unicode { or_str: true } => {
                format!("PyUnicode_Check({arg}) || PyString_Check({arg})")
            }
            Guard::Unicode { or_str: false } => format!("PyUnicode_Check({arg})"),
            Guard::Str => format!("PyString_Check({arg})"),
        }
    }
}

/// A call of the overload with the given candidate id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallStep {
    pub candidate: usize,
    /// Converted argument expressions.
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    ArgCount {
        op: CountOp,
        count: usize,
        then: Vec<Step>,
        otherwise: Vec<Step>,
    },
    Check {
        index: usize,
        arg: String,
        guard: Guard,
        body: Vec<Step>,
    },
    Call(CallStep),
}

// ============================================================================
// Emission
// ============================================================================

struct Emitter<'a, 'g> {
    registry: &'a ConversionRegistry<'g>,
    accessor: &'a ArgAccessor,
    diag: &'a mut Diagnostics,
}

impl Emitter<'_, '_> {
    /// `conv` holds the cast chosen for each consumed class argument; bucket
    /// arguments convert through the registry at the call.
    fn node(
        &mut self,
        node: &DispatchNode,
        conv: &mut Vec<Option<Template>>,
        skip: usize,
        exact: bool,
    ) -> SpecResult<Vec<Step>> {
        let consumed = conv.len();
        if skip > 0 {
            let mut steps = self.checks(node, conv, skip - 1, exact)?;
            if let Some(terminal) = &node.terminal {
                steps.push(self.call(terminal, conv)?);
            }
            return Ok(steps);
        }
        if node.has_children() {
            let min = node.min_arg_length();
            let max = node.max_arg_length();
            if min == max {
                let mut then = self.checks(node, conv, min.saturating_sub(1), true)?;
                if let Some(terminal) = &node.terminal {
                    then.push(self.call(terminal, conv)?);
                }
                return Ok(vec![Step::ArgCount {
                    op: CountOp::Equal,
                    count: consumed + min,
                    then,
                    otherwise: Vec::new(),
                }]);
            }
            // Children re-check the length themselves, so shorter argument
            // lists never index past the end.
            let then = self.checks(node, conv, 0, false)?;
            let otherwise = match &node.terminal {
                Some(terminal) => vec![self.call(terminal, conv)?],
                None => Vec::new(),
            };
            return Ok(vec![Step::ArgCount {
                op: CountOp::Greater,
                count: consumed,
                then,
                otherwise,
            }]);
        }
        let Some(terminal) = &node.terminal else {
            return Ok(Vec::new());
        };
        let call = self.call(terminal, conv)?;
        if exact {
            return Ok(vec![call]);
        }
        Ok(vec![Step::ArgCount {
            op: CountOp::Equal,
            count: consumed,
            then: vec![call],
            otherwise: Vec::new(),
        }])
    }

    /// Guarded branches for the argument at `conv.len()`.
    fn checks(
        &mut self,
        node: &DispatchNode,
        conv: &mut Vec<Option<Template>>,
        skip: usize,
        exact: bool,
    ) -> SpecResult<Vec<Step>> {
        let index = conv.len();
        let arg = self.accessor.get(index);
        let mut steps = Vec::new();

        for branch in &node.objects {
            let cc = self.registry.check_and_cast(&branch.ty)?;
            conv.push(Some(cc.cast));
            let body = self.node(&branch.node, conv, skip, exact);
            conv.pop();
            steps.push(Step::Check {
                index,
                arg: arg.clone(),
                guard: Guard::Instance {
                    class: cc.class,
                    check: cc.check,
                },
                body: body?,
            });
        }

        let mask = Bucket::NUMERIC
            .iter()
            .filter(|b| node.bucket(**b).is_some())
            .fold(0, |m, b| m | b.mask_bit());
        let numeric = Bucket::NUMERIC.iter().zip(coercion_guards(mask));
        let mut bucket_steps: Vec<(Bucket, Guard)> = numeric
            .filter_map(|(b, g)| g.map(|check| (*b, Guard::Numeric { check })))
            .collect();
        if node.bucket(Bucket::Unicode).is_some() {
            bucket_steps.push((
                Bucket::Unicode,
                Guard::Unicode {
                    or_str: node.bucket(Bucket::Str).is_none(),
                },
            ));
        }
        if node.bucket(Bucket::Str).is_some() {
            bucket_steps.push((Bucket::Str, Guard::Str));
        }

        for (bucket, guard) in bucket_steps {
            let Some(child) = node.bucket(bucket) else {
                continue;
            };
            conv.push(None);
            let body = self.node(child, conv, skip, exact);
            conv.pop();
            steps.push(Step::Check {
                index,
                arg: arg.clone(),
                guard,
                body: body?,
            });
        }
        Ok(steps)
    }

    fn call(&mut self, terminal: &Candidate, conv: &[Option<Template>]) -> SpecResult<Step> {
        let mut args = Vec::with_capacity(terminal.args.len());
        for (i, (ty, cast)) in terminal.args.iter().zip(conv).enumerate() {
            let expr = self.accessor.get(i);
            args.push(match cast {
                Some(cast) => cast.fill(&expr),
                None => self.registry.from_runtime(ty, self.diag)?.template.fill(&expr),
            });
        }
        Ok(Step::Call(CallStep {
            candidate: terminal.id,
            args,
        }))
    }
}

/// Emit the steps of a dispatch tree reading arguments from the tuple `args`.
pub fn emit(
    tree: &DispatchNode,
    registry: &ConversionRegistry<'_>,
    diag: &mut Diagnostics,
) -> SpecResult<Vec<Step>> {
    let accessor = ArgAccessor::Tuple;
    let mut emitter = Emitter {
        registry,
        accessor: &accessor,
        diag,
    };
    emitter.node(tree, &mut Vec::new(), 0, false)
}

/// Emit only the argument checks, for a call whose argument count is fixed
/// and whose arguments are held in `vars`.
pub fn emit_checks(
    tree: &DispatchNode,
    vars: &[String],
    registry: &ConversionRegistry<'_>,
    diag: &mut Diagnostics,
) -> SpecResult<Vec<Step>> {
    let accessor = ArgAccessor::Vars(vars.to_vec());
    let mut emitter = Emitter {
        registry,
        accessor: &accessor,
        diag,
    };
    emitter.checks(tree, &mut Vec::new(), vars.len().saturating_sub(1), true)
}

// ============================================================================
// Rendering
// ============================================================================

pub(crate) const INDENT: &str = "    ";

/// Render steps as glue code, indented by `level`.
///
/// `call` produces the statement for a call step; it must return or jump.
pub fn render(steps: &[Step], level: usize, call: &dyn Fn(&CallStep) -> String) -> String {
    let mut out = String::new();
    render_into(&mut out, steps, level, call);
    out
}

fn render_into(out: &mut String, steps: &[Step], level: usize, call: &dyn Fn(&CallStep) -> String) {
    let ind = INDENT.repeat(level);
    for step in steps {
        match step {
            Step::ArgCount {
                op,
                count,
                then,
                otherwise,
            } => {
                let _ = writeln!(out, "{ind}if(PyTuple_GET_SIZE(args) {} {count}) {{", op.symbol());
                render_into(out, then, level + 1, call);
                if !otherwise.is_empty() {
                    let _ = writeln!(out, "{ind}}} else {{");
                    render_into(out, otherwise, level + 1, call);
                }
                let _ = writeln!(out, "{ind}}}");
            }
            Step::Check {
                arg, guard, body, ..
            } => {
                let _ = writeln!(out, "{ind}if({}) {{", guard.render(arg));
                render_into(out, body, level + 1, call);
                let _ = writeln!(out, "{ind}}}");
            }
            Step::Call(c) => {
                let _ = writeln!(out, "{ind}{}", call(c));
            }
        }
    }
}

/// Every call step reachable in `steps`.
pub fn calls(steps: &[Step]) -> Vec<&CallStep> {
    let mut found = Vec::new();
    let mut stack: Vec<&[Step]> = vec![steps];
    while let Some(steps) = stack.pop() {
        for step in steps {
            match step {
                Step::ArgCount {
                    then, otherwise, ..
                } => {
                    stack.push(then);
                    stack.push(otherwise);
                }
                Step::Check { body, .. } => stack.push(body),
                Step::Call(c) => found.push(c),
            }
        }
    }
    found
}
