//! Shared builders for hand-assembled AIR programs. The parser is an
//! external collaborator, so tests construct the trees it would emit.

#![allow(dead_code)]

use asteria::value::ops::Operator;
use asteria::{AirNode, AirStatus, PtcMode, SourceLocation, Value};

pub fn sloc(line: u32) -> SourceLocation {
    SourceLocation::new("scenario", line, 1)
}

pub fn clear() -> AirNode {
    AirNode::ClearStack
}

pub fn push_int(value: i64) -> AirNode {
    AirNode::PushConstantSmallInt { value }
}

pub fn push_value(value: Value) -> AirNode {
    AirNode::PushConstant { value }
}

pub fn push_str(text: &str) -> AirNode {
    AirNode::PushConstant {
        value: Value::string(text),
    }
}

pub fn push_local(line: u32, depth: u32, name: &str) -> AirNode {
    AirNode::PushLocalReference {
        sloc: sloc(line),
        depth,
        name: name.to_string(),
    }
}

pub fn push_global(line: u32, name: &str) -> AirNode {
    AirNode::PushGlobalReference {
        sloc: sloc(line),
        name: name.to_string(),
    }
}

pub fn apply(line: u32, op: Operator) -> AirNode {
    AirNode::ApplyOperator {
        sloc: sloc(line),
        assign: false,
        op,
    }
}

pub fn apply_assign(line: u32, op: Operator) -> AirNode {
    AirNode::ApplyOperator {
        sloc: sloc(line),
        assign: true,
        op,
    }
}

pub fn call(line: u32, nargs: u32) -> AirNode {
    AirNode::FunctionCall {
        sloc: sloc(line),
        nargs,
        ptc: PtcMode::None,
    }
}

pub fn call_ptc(line: u32, nargs: u32, ptc: PtcMode) -> AirNode {
    AirNode::FunctionCall {
        sloc: sloc(line),
        nargs,
        ptc,
    }
}

pub fn ret_val(line: u32) -> AirNode {
    AirNode::ReturnStatement {
        sloc: sloc(line),
        by_ref: false,
        is_void: false,
    }
}

pub fn ret_ref(line: u32) -> AirNode {
    AirNode::ReturnStatement {
        sloc: sloc(line),
        by_ref: true,
        is_void: false,
    }
}

pub fn throw_stmt(line: u32) -> AirNode {
    AirNode::ThrowStatement { sloc: sloc(line) }
}

pub fn status(status: AirStatus) -> AirNode {
    AirNode::SimpleStatus { status }
}

/// `var <name> = <init>;`
pub fn stmt_var(line: u32, name: &str, init: Vec<AirNode>) -> Vec<AirNode> {
    let mut code = vec![
        clear(),
        AirNode::DeclareVariable {
            sloc: sloc(line),
            name: name.to_string(),
        },
    ];
    code.extend(init);
    code.push(AirNode::InitializeVariable {
        sloc: sloc(line),
        immutable: false,
    });
    code
}

/// `func <name>(<params>) { <body> }`
pub fn stmt_func(line: u32, name: &str, params: &[&str], body: Vec<AirNode>) -> Vec<AirNode> {
    vec![
        clear(),
        AirNode::DeclareVariable {
            sloc: sloc(line),
            name: name.to_string(),
        },
        AirNode::DefineFunction {
            sloc: sloc(line),
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            code_body: body,
        },
        AirNode::InitializeVariable {
            sloc: sloc(line),
            immutable: true,
        },
    ]
}

/// An expression statement.
pub fn stmt(expr: Vec<AirNode>) -> Vec<AirNode> {
    let mut code = vec![clear()];
    code.extend(expr);
    code
}

/// `return <expr>;`
pub fn stmt_return(line: u32, expr: Vec<AirNode>) -> Vec<AirNode> {
    let mut code = stmt(expr);
    code.push(ret_val(line));
    code
}

pub fn flatten(stmts: Vec<Vec<AirNode>>) -> Vec<AirNode> {
    stmts.into_iter().flatten().collect()
}
