//! AIR: the tree intermediate representation handed over by the parser.
//!
//! Every alternative knows how to rebind itself against a scope chain
//! (structural sharing when nothing changes), how to enumerate captured
//! variables, and how to solidify itself into exactly one AVMC record.

mod solidify;

use crate::gc::VarVisitor;
use crate::reference::Reference;
use crate::runtime::context::{AnalyticContext, Scope};
use crate::source::SourceLocation;
use crate::value::{ByteString, Value};
use crate::value::ops::Operator;

/// Status code returned by every AVMC handler. Loop and block handlers
/// convert typed breaks into `Next` when the label matches; function
/// boundaries convert the return statuses into the caller's result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum AirStatus {
    Next = 0,
    ReturnVoid,
    ReturnRef,
    BreakUnspec,
    BreakSwitch,
    BreakWhile,
    BreakFor,
    ContinueUnspec,
    ContinueWhile,
    ContinueFor,
}

impl AirStatus {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(raw: u8) -> Option<Self> {
        use AirStatus::*;
        const TABLE: &[AirStatus] = &[
            Next,
            ReturnVoid,
            ReturnRef,
            BreakUnspec,
            BreakSwitch,
            BreakWhile,
            BreakFor,
            ContinueUnspec,
            ContinueWhile,
            ContinueFor,
        ];
        TABLE.get(raw as usize).copied()
    }
}

/// How a call in tail position projects its eventual result.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum PtcMode {
    /// Not a tail call; invoke directly.
    #[default]
    None = 0,
    ByRef,
    ByVal,
    Void,
}

impl PtcMode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(PtcMode::None),
            1 => Some(PtcMode::ByRef),
            2 => Some(PtcMode::ByVal),
            3 => Some(PtcMode::Void),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub enum AirNode {
    // statement-like
    ClearStack,
    ExecuteBlock {
        code_body: Vec<AirNode>,
    },
    DeclareVariable {
        sloc: SourceLocation,
        name: String,
    },
    InitializeVariable {
        sloc: SourceLocation,
        immutable: bool,
    },
    DefineNullVariable {
        sloc: SourceLocation,
        immutable: bool,
        name: String,
    },
    IfStatement {
        negative: bool,
        code_true: Vec<AirNode>,
        code_false: Vec<AirNode>,
    },
    SwitchStatement {
        code_labels: Vec<Vec<AirNode>>,
        code_clauses: Vec<Vec<AirNode>>,
        names_added: Vec<Vec<String>>,
    },
    DoWhileStatement {
        code_body: Vec<AirNode>,
        negative: bool,
        code_cond: Vec<AirNode>,
    },
    WhileStatement {
        negative: bool,
        code_cond: Vec<AirNode>,
        code_body: Vec<AirNode>,
    },
    ForEachStatement {
        name_key: String,
        name_mapped: String,
        sloc_init: SourceLocation,
        code_init: Vec<AirNode>,
        code_body: Vec<AirNode>,
    },
    ForStatement {
        code_init: Vec<AirNode>,
        code_cond: Vec<AirNode>,
        code_step: Vec<AirNode>,
        code_body: Vec<AirNode>,
    },
    TryStatement {
        sloc_try: SourceLocation,
        code_try: Vec<AirNode>,
        sloc_catch: SourceLocation,
        name_except: String,
        code_catch: Vec<AirNode>,
    },
    ThrowStatement {
        sloc: SourceLocation,
    },
    AssertStatement {
        sloc: SourceLocation,
        msg: String,
    },
    ReturnStatement {
        sloc: SourceLocation,
        by_ref: bool,
        is_void: bool,
    },
    SimpleStatus {
        status: AirStatus,
    },
    DeferExpression {
        sloc: SourceLocation,
        code_body: Vec<AirNode>,
    },
    DeclareReference {
        name: String,
    },
    InitializeReference {
        sloc: SourceLocation,
        name: String,
    },
    DefineFunction {
        sloc: SourceLocation,
        name: String,
        params: Vec<String>,
        code_body: Vec<AirNode>,
    },
    // expression-like
    PushGlobalReference {
        sloc: SourceLocation,
        name: String,
    },
    PushLocalReference {
        sloc: SourceLocation,
        depth: u32,
        name: String,
    },
    PushBoundReference {
        reference: Reference,
    },
    PushConstant {
        value: Value,
    },
    PushConstantSmallInt {
        value: i64,
    },
    PushUnnamedArray {
        sloc: SourceLocation,
        nelems: u32,
    },
    PushUnnamedObject {
        sloc: SourceLocation,
        keys: Vec<ByteString>,
    },
    BranchExpression {
        sloc: SourceLocation,
        assign: bool,
        coalescence: bool,
        code_true: Vec<AirNode>,
        code_false: Vec<AirNode>,
    },
    FunctionCall {
        sloc: SourceLocation,
        nargs: u32,
        ptc: PtcMode,
    },
    VariadicCall {
        sloc: SourceLocation,
        ptc: PtcMode,
    },
    ImportCall {
        sloc: SourceLocation,
        nargs: u32,
    },
    ApplyOperator {
        sloc: SourceLocation,
        assign: bool,
        op: Operator,
    },
    CheckArgument {
        sloc: SourceLocation,
        by_ref: bool,
    },
    CatchExpression {
        code_body: Vec<AirNode>,
    },
    SingleStepTrap {
        sloc: SourceLocation,
    },
}

fn rebind_nodes_in(dirty: &mut bool, code: &mut [AirNode], ctx: &dyn Scope) {
    for node in code.iter_mut() {
        if let Some(bound) = node.rebind_opt(ctx) {
            *node = bound;
            *dirty = true;
        }
    }
}

fn rebind_nested_in(dirty: &mut bool, code: &mut [Vec<AirNode>], ctx: &dyn Scope) {
    for list in code.iter_mut() {
        rebind_nodes_in(dirty, list, ctx);
    }
}

fn collect_from(code: &[AirNode], visitor: &mut dyn VarVisitor) {
    for node in code {
        node.collect_variables(visitor);
    }
}

impl AirNode {
    /// Rebind this subtree against a scope chain. Returns a new subtree
    /// only if any child was rebound; `None` means the existing node can
    /// be shared.
    pub fn rebind_opt(&self, ctx: &dyn Scope) -> Option<AirNode> {
        match self {
            AirNode::ExecuteBlock { code_body } => {
                let mut dirty = false;
                let mut bound = code_body.clone();
                let ctx_body = AnalyticContext::new_plain(ctx);
                rebind_nodes_in(&mut dirty, &mut bound, &ctx_body);
                dirty.then_some(AirNode::ExecuteBlock { code_body: bound })
            }

            AirNode::IfStatement {
                negative,
                code_true,
                code_false,
            } => {
                let mut dirty = false;
                let mut bound_true = code_true.clone();
                let mut bound_false = code_false.clone();
                let ctx_body = AnalyticContext::new_plain(ctx);
                rebind_nodes_in(&mut dirty, &mut bound_true, &ctx_body);
                rebind_nodes_in(&mut dirty, &mut bound_false, &ctx_body);
                dirty.then_some(AirNode::IfStatement {
                    negative: *negative,
                    code_true: bound_true,
                    code_false: bound_false,
                })
            }

            AirNode::SwitchStatement {
                code_labels,
                code_clauses,
                names_added,
            } => {
                // Labels are evaluated in the same scope as the condition;
                // they are not part of the body.
                let mut dirty = false;
                let mut bound_labels = code_labels.clone();
                let mut bound_clauses = code_clauses.clone();
                rebind_nested_in(&mut dirty, &mut bound_labels, ctx);
                let ctx_body = AnalyticContext::new_plain(ctx);
                rebind_nested_in(&mut dirty, &mut bound_clauses, &ctx_body);
                dirty.then_some(AirNode::SwitchStatement {
                    code_labels: bound_labels,
                    code_clauses: bound_clauses,
                    names_added: names_added.clone(),
                })
            }

            AirNode::DoWhileStatement {
                code_body,
                negative,
                code_cond,
            } => {
                let mut dirty = false;
                let mut bound_body = code_body.clone();
                let mut bound_cond = code_cond.clone();
                let ctx_body = AnalyticContext::new_plain(ctx);
                rebind_nodes_in(&mut dirty, &mut bound_body, &ctx_body);
                rebind_nodes_in(&mut dirty, &mut bound_cond, ctx);
                dirty.then_some(AirNode::DoWhileStatement {
                    code_body: bound_body,
                    negative: *negative,
                    code_cond: bound_cond,
                })
            }

            AirNode::WhileStatement {
                negative,
                code_cond,
                code_body,
            } => {
                let mut dirty = false;
                let mut bound_cond = code_cond.clone();
                let mut bound_body = code_body.clone();
                rebind_nodes_in(&mut dirty, &mut bound_cond, ctx);
                let ctx_body = AnalyticContext::new_plain(ctx);
                rebind_nodes_in(&mut dirty, &mut bound_body, &ctx_body);
                dirty.then_some(AirNode::WhileStatement {
                    negative: *negative,
                    code_cond: bound_cond,
                    code_body: bound_body,
                })
            }

            AirNode::ForEachStatement {
                name_key,
                name_mapped,
                sloc_init,
                code_init,
                code_body,
            } => {
                // The key and mapped references live in a dedicated scope
                // where the initializer is evaluated; the body runs in an
                // inner scope created per iteration.
                let mut dirty = false;
                let mut bound_init = code_init.clone();
                let mut bound_body = code_body.clone();
                let ctx_for = AnalyticContext::new_plain(ctx);
                ctx_for.insert_name(name_key);
                ctx_for.insert_name(name_mapped);
                rebind_nodes_in(&mut dirty, &mut bound_init, &ctx_for);
                let ctx_body = AnalyticContext::new_plain(&ctx_for);
                rebind_nodes_in(&mut dirty, &mut bound_body, &ctx_body);
                dirty.then_some(AirNode::ForEachStatement {
                    name_key: name_key.clone(),
                    name_mapped: name_mapped.clone(),
                    sloc_init: sloc_init.clone(),
                    code_init: bound_init,
                    code_body: bound_body,
                })
            }

            AirNode::ForStatement {
                code_init,
                code_cond,
                code_step,
                code_body,
            } => {
                let mut dirty = false;
                let mut bound_init = code_init.clone();
                let mut bound_cond = code_cond.clone();
                let mut bound_step = code_step.clone();
                let mut bound_body = code_body.clone();
                let ctx_for = AnalyticContext::new_plain(ctx);
                rebind_nodes_in(&mut dirty, &mut bound_init, &ctx_for);
                rebind_nodes_in(&mut dirty, &mut bound_cond, &ctx_for);
                rebind_nodes_in(&mut dirty, &mut bound_step, &ctx_for);
                let ctx_body = AnalyticContext::new_plain(&ctx_for);
                rebind_nodes_in(&mut dirty, &mut bound_body, &ctx_body);
                dirty.then_some(AirNode::ForStatement {
                    code_init: bound_init,
                    code_cond: bound_cond,
                    code_step: bound_step,
                    code_body: bound_body,
                })
            }

            AirNode::TryStatement {
                sloc_try,
                code_try,
                sloc_catch,
                name_except,
                code_catch,
            } => {
                let mut dirty = false;
                let mut bound_try = code_try.clone();
                let mut bound_catch = code_catch.clone();
                let ctx_try = AnalyticContext::new_plain(ctx);
                rebind_nodes_in(&mut dirty, &mut bound_try, &ctx_try);
                let ctx_catch = AnalyticContext::new_plain(ctx);
                ctx_catch.insert_name(name_except);
                rebind_nodes_in(&mut dirty, &mut bound_catch, &ctx_catch);
                dirty.then_some(AirNode::TryStatement {
                    sloc_try: sloc_try.clone(),
                    code_try: bound_try,
                    sloc_catch: sloc_catch.clone(),
                    name_except: name_except.clone(),
                    code_catch: bound_catch,
                })
            }

            AirNode::DefineFunction {
                sloc,
                name,
                params,
                code_body,
            } => {
                // The only scenario where names in the outer scope are
                // visible to the body of a function.
                let mut dirty = false;
                let mut bound = code_body.clone();
                let ctx_func = AnalyticContext::new_function(Some(ctx), params);
                rebind_nodes_in(&mut dirty, &mut bound, &ctx_func);
                dirty.then_some(AirNode::DefineFunction {
                    sloc: sloc.clone(),
                    name: name.clone(),
                    params: params.clone(),
                    code_body: bound,
                })
            }

            AirNode::BranchExpression {
                sloc,
                assign,
                coalescence,
                code_true,
                code_false,
            } => {
                let mut dirty = false;
                let mut bound_true = code_true.clone();
                let mut bound_false = code_false.clone();
                rebind_nodes_in(&mut dirty, &mut bound_true, ctx);
                rebind_nodes_in(&mut dirty, &mut bound_false, ctx);
                dirty.then_some(AirNode::BranchExpression {
                    sloc: sloc.clone(),
                    assign: *assign,
                    coalescence: *coalescence,
                    code_true: bound_true,
                    code_false: bound_false,
                })
            }

            AirNode::DeferExpression { sloc, code_body } => {
                let mut dirty = false;
                let mut bound = code_body.clone();
                rebind_nodes_in(&mut dirty, &mut bound, ctx);
                dirty.then_some(AirNode::DeferExpression {
                    sloc: sloc.clone(),
                    code_body: bound,
                })
            }

            AirNode::CatchExpression { code_body } => {
                let mut dirty = false;
                let mut bound = code_body.clone();
                rebind_nodes_in(&mut dirty, &mut bound, ctx);
                dirty.then_some(AirNode::CatchExpression { code_body: bound })
            }

            AirNode::PushLocalReference { depth, name, .. } => {
                let mut scope: &dyn Scope = ctx;
                for _ in 0..*depth {
                    scope = scope.parent_scope()?;
                }
                if scope.is_analytic() {
                    return None;
                }
                let reference = scope.lookup_for_rebind(name)?;
                Some(AirNode::PushBoundReference { reference })
            }

            _ => None,
        }
    }

    /// Enumerate variables captured in this subtree, for garbage
    /// collection of instantiated closures.
    pub fn collect_variables(&self, visitor: &mut dyn VarVisitor) {
        match self {
            AirNode::ExecuteBlock { code_body }
            | AirNode::DeferExpression { code_body, .. }
            | AirNode::CatchExpression { code_body }
            | AirNode::DefineFunction { code_body, .. } => collect_from(code_body, visitor),

            AirNode::IfStatement {
                code_true,
                code_false,
                ..
            }
            | AirNode::BranchExpression {
                code_true,
                code_false,
                ..
            } => {
                collect_from(code_true, visitor);
                collect_from(code_false, visitor);
            }

            AirNode::SwitchStatement {
                code_labels,
                code_clauses,
                ..
            } => {
                for list in code_labels.iter().chain(code_clauses) {
                    collect_from(list, visitor);
                }
            }

            AirNode::DoWhileStatement {
                code_body,
                code_cond,
                ..
            }
            | AirNode::WhileStatement {
                code_cond,
                code_body,
                ..
            } => {
                collect_from(code_cond, visitor);
                collect_from(code_body, visitor);
            }

            AirNode::ForEachStatement {
                code_init,
                code_body,
                ..
            } => {
                collect_from(code_init, visitor);
                collect_from(code_body, visitor);
            }

            AirNode::ForStatement {
                code_init,
                code_cond,
                code_step,
                code_body,
            } => {
                collect_from(code_init, visitor);
                collect_from(code_cond, visitor);
                collect_from(code_step, visitor);
                collect_from(code_body, visitor);
            }

            AirNode::TryStatement {
                code_try,
                code_catch,
                ..
            } => {
                collect_from(code_try, visitor);
                collect_from(code_catch, visitor);
            }

            AirNode::PushBoundReference { reference } => reference.for_each_variable(visitor),

            AirNode::PushConstant { value } => value.for_each_variable(visitor),

            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::global::GlobalContext;

    #[test]
    fn rebind_shares_clean_subtrees() {
        let global = GlobalContext::new();
        let node = AirNode::ExecuteBlock {
            code_body: vec![AirNode::PushConstantSmallInt { value: 3 }],
        };
        let ctx = AnalyticContext::new_function(Some(&global as &dyn Scope), &[]);
        assert!(node.rebind_opt(&ctx).is_none());
    }

    #[test]
    fn rebind_binds_resolvable_global_scope_names() {
        let global = GlobalContext::new();
        global.insert_named_reference(
            "answer",
            crate::reference::Reference::constant(Value::Integer(42)),
        );
        // Depth 1 walks out of the function scope into the global one.
        let node = AirNode::PushLocalReference {
            sloc: SourceLocation::default(),
            depth: 1,
            name: "answer".to_string(),
        };
        let ctx = AnalyticContext::new_function(Some(&global as &dyn Scope), &[]);
        let bound = node.rebind_opt(&ctx).expect("should bind");
        assert!(matches!(bound, AirNode::PushBoundReference { .. }));

        // Names that resolve inside the analytic scope stay unbound.
        let node = AirNode::PushLocalReference {
            sloc: SourceLocation::default(),
            depth: 0,
            name: "answer".to_string(),
        };
        assert!(node.rebind_opt(&ctx).is_none());
    }

    #[test]
    fn status_and_ptc_selectors_round_trip() {
        for raw in 0..10u8 {
            let status = AirStatus::from_u8(raw).unwrap();
            assert_eq!(status.as_u8(), raw);
        }
        assert!(AirStatus::from_u8(10).is_none());
        for raw in 0..4u8 {
            let mode = PtcMode::from_u8(raw).unwrap();
            assert_eq!(mode.as_u8(), raw);
        }
        assert!(PtcMode::from_u8(4).is_none());
    }
}
