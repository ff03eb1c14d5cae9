//! Lowers each AIR alternative into exactly one AVMC record whose handler
//! implements the alternative's semantics. Block bodies are solidified
//! into nested sub-queues carried in the record's payload.

use crate::air::{AirNode, AirStatus, PtcMode};
use crate::avmc::{AvmcQueue, AvmcRecord, Sparam, Uparam};
use crate::reference::{RefModifier, Reference};
use crate::runtime::context::{do_execute_block, ExecutiveContext, Scope};
use crate::runtime::error::{ErrorKind, RuntimeError};
use crate::runtime::function::FunctionValue;
use crate::runtime::global::GlobalContext;
use crate::runtime::loader::{canonicalize_import, LoadError};
use crate::runtime::optimizer::{rebind_nodes, AirOptimizer};
use crate::runtime::ptc::{check_function_result, PtcArguments};
use crate::source::SourceLocation;
use crate::value::ops::{self, Operator};
use crate::value::{Compare, Object, Value};

pub(crate) fn solidify_nodes(code: &[AirNode]) -> AvmcQueue {
    let mut queue = AvmcQueue::new();
    for node in code {
        node.solidify(&mut queue);
    }
    queue
}

fn solidify_lists(code: &[Vec<AirNode>]) -> Vec<AvmcQueue> {
    code.iter().map(|list| solidify_nodes(list)).collect()
}

fn corrupted() -> RuntimeError {
    RuntimeError::native(
        ErrorKind::UnreachableTarget,
        "corrupted instruction payload",
    )
}

impl AirNode {
    /// Append this node's packed record to the queue.
    pub fn solidify(&self, queue: &mut AvmcQueue) {
        match self {
            AirNode::ClearStack => {
                queue.append(AvmcRecord::new(
                    do_clear_stack,
                    Uparam::default(),
                    Sparam::None,
                    None,
                ));
            }

            AirNode::ExecuteBlock { code_body } => {
                queue.append(AvmcRecord::new(
                    do_execute_block_record,
                    Uparam::default(),
                    Sparam::Queue(solidify_nodes(code_body)),
                    None,
                ));
            }

            AirNode::DeclareVariable { sloc, name } => {
                queue.append(AvmcRecord::new(
                    do_declare_variable,
                    Uparam::default(),
                    Sparam::Name(name.clone()),
                    Some(sloc),
                ));
            }

            AirNode::InitializeVariable { sloc, immutable } => {
                let uparam = Uparam {
                    b0: *immutable,
                    ..Uparam::default()
                };
                queue.append(AvmcRecord::new(
                    do_initialize_variable,
                    uparam,
                    Sparam::None,
                    Some(sloc),
                ));
            }

            AirNode::DefineNullVariable {
                sloc,
                immutable,
                name,
            } => {
                let uparam = Uparam {
                    b0: *immutable,
                    ..Uparam::default()
                };
                queue.append(AvmcRecord::new(
                    do_define_null_variable,
                    uparam,
                    Sparam::Name(name.clone()),
                    Some(sloc),
                ));
            }

            AirNode::IfStatement {
                negative,
                code_true,
                code_false,
            } => {
                let uparam = Uparam {
                    b0: *negative,
                    ..Uparam::default()
                };
                queue.append(AvmcRecord::new(
                    do_if_statement,
                    uparam,
                    Sparam::TwoQueues(solidify_nodes(code_true), solidify_nodes(code_false)),
                    None,
                ));
            }

            AirNode::SwitchStatement {
                code_labels,
                code_clauses,
                names_added,
            } => {
                queue.append(AvmcRecord::new(
                    do_switch_statement,
                    Uparam::default(),
                    Sparam::Switch {
                        labels: solidify_lists(code_labels),
                        clauses: solidify_lists(code_clauses),
                        names_added: names_added.clone(),
                    },
                    None,
                ));
            }

            AirNode::DoWhileStatement {
                code_body,
                negative,
                code_cond,
            } => {
                let uparam = Uparam {
                    b0: *negative,
                    ..Uparam::default()
                };
                queue.append(AvmcRecord::new(
                    do_do_while_statement,
                    uparam,
                    Sparam::TwoQueues(solidify_nodes(code_body), solidify_nodes(code_cond)),
                    None,
                ));
            }

            AirNode::WhileStatement {
                negative,
                code_cond,
                code_body,
            } => {
                let uparam = Uparam {
                    b0: *negative,
                    ..Uparam::default()
                };
                queue.append(AvmcRecord::new(
                    do_while_statement,
                    uparam,
                    Sparam::TwoQueues(solidify_nodes(code_cond), solidify_nodes(code_body)),
                    None,
                ));
            }

            AirNode::ForEachStatement {
                name_key,
                name_mapped,
                sloc_init,
                code_init,
                code_body,
            } => {
                queue.append(AvmcRecord::new(
                    do_for_each_statement,
                    Uparam::default(),
                    Sparam::ForEach {
                        name_key: name_key.clone(),
                        name_mapped: name_mapped.clone(),
                        sloc_init: sloc_init.clone(),
                        queue_init: solidify_nodes(code_init),
                        queue_body: solidify_nodes(code_body),
                    },
                    None,
                ));
            }

            AirNode::ForStatement {
                code_init,
                code_cond,
                code_step,
                code_body,
            } => {
                queue.append(AvmcRecord::new(
                    do_for_statement,
                    Uparam::default(),
                    Sparam::For {
                        queue_init: solidify_nodes(code_init),
                        queue_cond: solidify_nodes(code_cond),
                        queue_step: solidify_nodes(code_step),
                        queue_body: solidify_nodes(code_body),
                    },
                    None,
                ));
            }

            AirNode::TryStatement {
                sloc_try,
                code_try,
                sloc_catch,
                name_except,
                code_catch,
            } => {
                queue.append(AvmcRecord::new(
                    do_try_statement,
                    Uparam::default(),
                    Sparam::Try {
                        queue_try: solidify_nodes(code_try),
                        sloc_catch: sloc_catch.clone(),
                        name_except: name_except.clone(),
                        queue_catch: solidify_nodes(code_catch),
                    },
                    Some(sloc_try),
                ));
            }

            AirNode::ThrowStatement { sloc } => {
                queue.append(AvmcRecord::new(
                    do_throw_statement,
                    Uparam::default(),
                    Sparam::None,
                    Some(sloc),
                ));
            }

            AirNode::AssertStatement { sloc, msg } => {
                queue.append(AvmcRecord::new(
                    do_assert_statement,
                    Uparam::default(),
                    Sparam::Text(msg.clone()),
                    Some(sloc),
                ));
            }

            AirNode::ReturnStatement {
                sloc,
                by_ref,
                is_void,
            } => {
                let uparam = Uparam {
                    b0: *by_ref,
                    b1: *is_void,
                    ..Uparam::default()
                };
                queue.append(AvmcRecord::new(
                    do_return_statement,
                    uparam,
                    Sparam::None,
                    Some(sloc),
                ));
            }

            AirNode::SimpleStatus { status } => {
                let uparam = Uparam {
                    u0: status.as_u8(),
                    ..Uparam::default()
                };
                queue.append(AvmcRecord::new(
                    do_simple_status,
                    uparam,
                    Sparam::None,
                    None,
                ));
            }

            AirNode::DeferExpression { sloc, code_body } => {
                queue.append(AvmcRecord::new(
                    do_defer_expression,
                    Uparam::default(),
                    Sparam::AirBody(code_body.clone()),
                    Some(sloc),
                ));
            }

            AirNode::DeclareReference { name } => {
                queue.append(AvmcRecord::new(
                    do_declare_reference,
                    Uparam::default(),
                    Sparam::Name(name.clone()),
                    None,
                ));
            }

            AirNode::InitializeReference { sloc, name } => {
                queue.append(AvmcRecord::new(
                    do_initialize_reference,
                    Uparam::default(),
                    Sparam::Name(name.clone()),
                    Some(sloc),
                ));
            }

            AirNode::DefineFunction {
                sloc,
                name,
                params,
                code_body,
            } => {
                queue.append(AvmcRecord::new(
                    do_define_function,
                    Uparam::default(),
                    Sparam::FuncDef {
                        name: name.clone(),
                        params: params.clone(),
                        body: code_body.clone(),
                    },
                    Some(sloc),
                ));
            }

            AirNode::PushGlobalReference { sloc, name } => {
                queue.append(AvmcRecord::new(
                    do_push_global_reference,
                    Uparam::default(),
                    Sparam::Name(name.clone()),
                    Some(sloc),
                ));
            }

            AirNode::PushLocalReference { sloc, depth, name } => {
                let uparam = Uparam {
                    u2345: *depth,
                    ..Uparam::default()
                };
                queue.append(AvmcRecord::new(
                    do_push_local_reference,
                    uparam,
                    Sparam::Name(name.clone()),
                    Some(sloc),
                ));
            }

            AirNode::PushBoundReference { reference } => {
                queue.append(AvmcRecord::new(
                    do_push_bound_reference,
                    Uparam::default(),
                    Sparam::Ref(reference.clone()),
                    None,
                ));
            }

            AirNode::PushConstant { value } => {
                queue.append(AvmcRecord::new(
                    do_push_constant,
                    Uparam::default(),
                    Sparam::Value(value.clone()),
                    None,
                ));
            }

            AirNode::PushConstantSmallInt { value } => {
                // 48-bit immediates ride in the uparam; anything wider
                // falls back to a full constant payload.
                const LIMIT: i64 = 1 << 47;
                if (-LIMIT..LIMIT).contains(value) {
                    let uparam = Uparam::default().with_immediate48(*value);
                    queue.append(AvmcRecord::new(
                        do_push_constant_small_int,
                        uparam,
                        Sparam::None,
                        None,
                    ));
                } else {
                    queue.append(AvmcRecord::new(
                        do_push_constant,
                        Uparam::default(),
                        Sparam::Value(Value::Integer(*value)),
                        None,
                    ));
                }
            }

            AirNode::PushUnnamedArray { sloc, nelems } => {
                let uparam = Uparam {
                    u2345: *nelems,
                    ..Uparam::default()
                };
                queue.append(AvmcRecord::new(
                    do_push_unnamed_array,
                    uparam,
                    Sparam::None,
                    Some(sloc),
                ));
            }

            AirNode::PushUnnamedObject { sloc, keys } => {
                queue.append(AvmcRecord::new(
                    do_push_unnamed_object,
                    Uparam::default(),
                    Sparam::Keys(keys.clone()),
                    Some(sloc),
                ));
            }

            AirNode::BranchExpression {
                sloc,
                assign,
                coalescence,
                code_true,
                code_false,
            } => {
                let uparam = Uparam {
                    b0: *assign,
                    b1: *coalescence,
                    ..Uparam::default()
                };
                queue.append(AvmcRecord::new(
                    do_branch_expression,
                    uparam,
                    Sparam::TwoQueues(solidify_nodes(code_true), solidify_nodes(code_false)),
                    Some(sloc),
                ));
            }

            AirNode::FunctionCall { sloc, nargs, ptc } => {
                let uparam = Uparam {
                    u0: ptc.as_u8(),
                    u2345: *nargs,
                    ..Uparam::default()
                };
                queue.append(AvmcRecord::new(
                    do_function_call,
                    uparam,
                    Sparam::None,
                    Some(sloc),
                ));
            }

            AirNode::VariadicCall { sloc, ptc } => {
                let uparam = Uparam {
                    u0: ptc.as_u8(),
                    ..Uparam::default()
                };
                queue.append(AvmcRecord::new(
                    do_variadic_call,
                    uparam,
                    Sparam::None,
                    Some(sloc),
                ));
            }

            AirNode::ImportCall { sloc, nargs } => {
                let uparam = Uparam {
                    u2345: *nargs,
                    ..Uparam::default()
                };
                queue.append(AvmcRecord::new(
                    do_import_call,
                    uparam,
                    Sparam::None,
                    Some(sloc),
                ));
            }

            AirNode::ApplyOperator { sloc, assign, op } => {
                let uparam = Uparam {
                    b0: *assign,
                    u1: op.as_u8(),
                    ..Uparam::default()
                };
                queue.append(AvmcRecord::new(
                    do_apply_operator,
                    uparam,
                    Sparam::None,
                    Some(sloc),
                ));
            }

            AirNode::CheckArgument { sloc, by_ref } => {
                let uparam = Uparam {
                    b0: *by_ref,
                    ..Uparam::default()
                };
                queue.append(AvmcRecord::new(
                    do_check_argument,
                    uparam,
                    Sparam::None,
                    Some(sloc),
                ));
            }

            AirNode::CatchExpression { code_body } => {
                queue.append(AvmcRecord::new(
                    do_catch_expression,
                    Uparam::default(),
                    Sparam::Queue(solidify_nodes(code_body)),
                    None,
                ));
            }

            AirNode::SingleStepTrap { sloc } => {
                queue.append(AvmcRecord::new(
                    do_single_step_trap,
                    Uparam::default(),
                    Sparam::None,
                    Some(sloc),
                ));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// handlers

fn do_clear_stack(
    ctx: &ExecutiveContext<'_>,
    _rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    ctx.stack().borrow_mut().clear();
    Ok(AirStatus::Next)
}

fn do_execute_block_record(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let Sparam::Queue(queue_body) = rec.sparam() else {
        return Err(corrupted());
    };
    // The block may contain control statements, so the status is forwarded
    // verbatim.
    do_execute_block(queue_body, ctx)
}

fn do_declare_variable(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let Sparam::Name(name) = rec.sparam() else {
        return Err(corrupted());
    };
    let sloc = rec.sloc_or_default();
    let var = ctx.global().create_variable();
    ctx.insert_named_reference(name.clone(), Reference::variable(var.clone()));
    ctx.global()
        .with_hooks(|h| h.on_variable_declare(&sloc, name));
    // A copy of the reference stays on the stack; the initializer hands it
    // back to `initialize_variable`.
    ctx.stack().borrow_mut().push(Reference::variable(var));
    Ok(AirStatus::Next)
}

fn do_initialize_variable(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let up = rec.uparam();
    let (value, var) = {
        let mut stack = ctx.stack().borrow_mut();
        let init = stack.pop()?;
        let value = init.dereference_readonly()?;
        let holder = stack.pop()?;
        let var = holder.unphase_variable_opt().ok_or_else(corrupted)?;
        (value, var)
    };
    var.initialize(value);
    var.set_immutable(up.b0);
    Ok(AirStatus::Next)
}

fn do_define_null_variable(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let Sparam::Name(name) = rec.sparam() else {
        return Err(corrupted());
    };
    let up = rec.uparam();
    let sloc = rec.sloc_or_default();
    let var = ctx.global().create_variable();
    ctx.insert_named_reference(name.clone(), Reference::variable(var.clone()));
    ctx.global()
        .with_hooks(|h| h.on_variable_declare(&sloc, name));
    var.initialize(Value::Null);
    var.set_immutable(up.b0);
    Ok(AirStatus::Next)
}

fn do_if_statement(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let Sparam::TwoQueues(queue_true, queue_false) = rec.sparam() else {
        return Err(corrupted());
    };
    let test = ctx.stack().borrow().top()?.dereference_readonly()?.test();
    if test != rec.uparam().b0 {
        do_execute_block(queue_true, ctx)
    } else {
        do_execute_block(queue_false, ctx)
    }
}

fn do_switch_statement(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let Sparam::Switch {
        labels,
        clauses,
        names_added,
    } = rec.sparam()
    else {
        return Err(corrupted());
    };
    let nclauses = labels.len();
    let cond = ctx.stack().borrow().top()?.dereference_readonly()?;

    // Scan labels in source order; the first one that compares partially
    // equal wins. An empty label is the `default` clause, which wins only
    // if nothing else matches.
    let mut target = None;
    for index in 0..nclauses {
        if labels[index].is_empty() {
            target.get_or_insert(index);
            continue;
        }
        let status = labels[index].execute(ctx)?;
        debug_assert_eq!(status, AirStatus::Next);
        let label = {
            let mut stack = ctx.stack().borrow_mut();
            let top = stack.top_mut()?;
            check_function_result(top, ctx.global())?;
            top.dereference_readonly()?
        };
        if label.compare(&cond) == Compare::Equal {
            target = Some(index);
            break;
        }
    }
    let Some(target) = target else {
        return Ok(AirStatus::Next);
    };
    let ctx_body = ExecutiveContext::new_plain(ctx);
    let mut status = AirStatus::Next;
    let run = (|| -> Result<(), RuntimeError> {
        for index in 0..nclauses {
            if index < target {
                // Declarations bypassed by the jump still exist as
                // uninitialized placeholders in the body scope.
                for name in &names_added[index] {
                    ctx_body.insert_named_reference(name.clone(), Reference::void());
                }
            } else {
                status = clauses[index].execute(&ctx_body)?;
                match status {
                    AirStatus::BreakUnspec | AirStatus::BreakSwitch => {
                        status = AirStatus::Next;
                        break;
                    }
                    AirStatus::Next => {}
                    _ => break,
                }
            }
        }
        Ok(())
    })();
    match run {
        Ok(()) => ctx_body.on_scope_exit_normal(status),
        Err(mut err) => {
            ctx_body.on_scope_exit_exceptional(&mut err);
            Err(err)
        }
    }
}

fn do_do_while_statement(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let Sparam::TwoQueues(queue_body, queue_cond) = rec.sparam() else {
        return Err(corrupted());
    };
    let negative = rec.uparam().b0;
    let mut status;
    loop {
        status = do_execute_block(queue_body, ctx)?;
        match status {
            AirStatus::BreakUnspec | AirStatus::BreakWhile => {
                status = AirStatus::Next;
                break;
            }
            AirStatus::Next | AirStatus::ContinueUnspec | AirStatus::ContinueWhile => {}
            _ => break,
        }
        let cond_status = queue_cond.execute(ctx)?;
        debug_assert_eq!(cond_status, AirStatus::Next);
        if ctx.stack().borrow().top()?.dereference_readonly()?.test() == negative {
            status = AirStatus::Next;
            break;
        }
    }
    Ok(status)
}

fn do_while_statement(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let Sparam::TwoQueues(queue_cond, queue_body) = rec.sparam() else {
        return Err(corrupted());
    };
    let negative = rec.uparam().b0;
    let mut status = AirStatus::Next;
    loop {
        let cond_status = queue_cond.execute(ctx)?;
        debug_assert_eq!(cond_status, AirStatus::Next);
        if ctx.stack().borrow().top()?.dereference_readonly()?.test() == negative {
            break;
        }
        status = do_execute_block(queue_body, ctx)?;
        match status {
            AirStatus::BreakUnspec | AirStatus::BreakWhile => {
                status = AirStatus::Next;
                break;
            }
            AirStatus::Next | AirStatus::ContinueUnspec | AirStatus::ContinueWhile => {
                status = AirStatus::Next;
            }
            _ => break,
        }
    }
    Ok(status)
}

fn do_for_each_statement(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let Sparam::ForEach {
        name_key,
        name_mapped,
        sloc_init,
        queue_init,
        queue_body,
    } = rec.sparam()
    else {
        return Err(corrupted());
    };
    // The key and mapped references outlast every iteration, so they live
    // in a dedicated outer scope.
    let ctx_for = ExecutiveContext::new_plain(ctx);
    let run = do_for_each_loop(
        &ctx_for, name_key, name_mapped, sloc_init, queue_init, queue_body,
    );
    match run {
        Ok(status) => ctx_for.on_scope_exit_normal(status),
        Err(mut err) => {
            ctx_for.on_scope_exit_exceptional(&mut err);
            Err(err)
        }
    }
}

fn do_for_each_loop(
    ctx_for: &ExecutiveContext<'_>,
    name_key: &str,
    name_mapped: &str,
    sloc_init: &SourceLocation,
    queue_init: &AvmcQueue,
    queue_body: &AvmcQueue,
) -> Result<AirStatus, RuntimeError> {
    let init_status = queue_init.execute(ctx_for)?;
    debug_assert_eq!(init_status, AirStatus::Next);
    let mapped_base = ctx_for.stack().borrow_mut().pop()?;
    ctx_for.insert_named_reference(name_mapped.to_string(), mapped_base.clone());

    let range = mapped_base.dereference_readonly()?;
    let mut kvar = None;
    let mut bind = |key_value: Value, modifier: RefModifier| -> Result<(), RuntimeError> {
        // The key variable is allocated once and re-initialized per round.
        let var = match kvar.clone() {
            Some(var) => var,
            None => {
                let var = ctx_for.global().create_variable();
                ctx_for
                    .insert_named_reference(name_key.to_string(), Reference::variable(var.clone()));
                kvar = Some(var.clone());
                var
            }
        };
        var.initialize(key_value);
        var.set_immutable(true);
        let mut mapped = mapped_base.clone();
        mapped.push_modifier(modifier)?;
        mapped.dereference_readonly()?;
        ctx_for.insert_named_reference(name_mapped.to_string(), mapped);
        Ok(())
    };

    match range {
        Value::Null => Ok(AirStatus::Next),
        Value::Array(arr) => {
            let mut status = AirStatus::Next;
            for index in 0..arr.len() as i64 {
                bind(Value::Integer(index), RefModifier::ArrayIndex(index))?;
                status = do_execute_block(queue_body, ctx_for)?;
                match status {
                    AirStatus::BreakUnspec | AirStatus::BreakFor => {
                        status = AirStatus::Next;
                        break;
                    }
                    AirStatus::Next | AirStatus::ContinueUnspec | AirStatus::ContinueFor => {
                        status = AirStatus::Next;
                    }
                    _ => break,
                }
            }
            Ok(status)
        }
        Value::Object(obj) => {
            let mut status = AirStatus::Next;
            for key in obj.keys() {
                bind(
                    Value::String(key.clone()),
                    RefModifier::ObjectKey(key.clone()),
                )?;
                status = do_execute_block(queue_body, ctx_for)?;
                match status {
                    AirStatus::BreakUnspec | AirStatus::BreakFor => {
                        status = AirStatus::Next;
                        break;
                    }
                    AirStatus::Next | AirStatus::ContinueUnspec | AirStatus::ContinueFor => {
                        status = AirStatus::Next;
                    }
                    _ => break,
                }
            }
            Ok(status)
        }
        other => Err(RuntimeError::native_at(
            ErrorKind::TypeMismatch,
            format!("range value not iterable (value was of type `{}`)", other.type_name()),
            sloc_init,
        )),
    }
}

fn do_for_statement(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let Sparam::For {
        queue_init,
        queue_cond,
        queue_step,
        queue_body,
    } = rec.sparam()
    else {
        return Err(corrupted());
    };
    // Names declared in the first segment outlast every iteration.
    let ctx_for = ExecutiveContext::new_plain(ctx);
    let run = (|| -> Result<AirStatus, RuntimeError> {
        let init_status = queue_init.execute(&ctx_for)?;
        debug_assert_eq!(init_status, AirStatus::Next);
        let mut status = AirStatus::Next;
        loop {
            // An empty condition makes the loop infinite.
            let cond_status = queue_cond.execute(&ctx_for)?;
            debug_assert_eq!(cond_status, AirStatus::Next);
            {
                let stack = ctx_for.stack().borrow();
                if !stack.is_empty() && !stack.top()?.dereference_readonly()?.test() {
                    break;
                }
            }
            status = do_execute_block(queue_body, &ctx_for)?;
            match status {
                AirStatus::BreakUnspec | AirStatus::BreakFor => {
                    status = AirStatus::Next;
                    break;
                }
                AirStatus::Next | AirStatus::ContinueUnspec | AirStatus::ContinueFor => {
                    status = AirStatus::Next;
                }
                _ => break,
            }
            let step_status = queue_step.execute(&ctx_for)?;
            debug_assert_eq!(step_status, AirStatus::Next);
        }
        Ok(status)
    })();
    match run {
        Ok(status) => ctx_for.on_scope_exit_normal(status),
        Err(mut err) => {
            ctx_for.on_scope_exit_exceptional(&mut err);
            Err(err)
        }
    }
}

fn do_try_statement(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let Sparam::Try {
        queue_try,
        sloc_catch,
        name_except,
        queue_catch,
    } = rec.sparam()
    else {
        return Err(corrupted());
    };
    match do_execute_block(queue_try, ctx) {
        Ok(status) => {
            if status == AirStatus::ReturnRef {
                // Keeping a result reference across a `try` boundary is a
                // tail-call barrier.
                let mut stack = ctx.stack().borrow_mut();
                check_function_result(stack.top_mut()?, ctx.global())?;
            }
            Ok(status)
        }
        Err(mut except) => {
            except.push_frame_try(rec.sloc_or_default());

            let ctx_catch = ExecutiveContext::new_plain(ctx);
            ctx_catch.insert_named_reference(
                name_except.clone(),
                Reference::temporary(except.value().clone()),
            );
            let mut backtrace = Vec::with_capacity(except.frames().len());
            for frame in except.frames() {
                let mut entry = Object::default();
                entry.insert(b"frame".to_vec(), Value::string(frame.kind.as_str()));
                entry.insert(b"file".to_vec(), Value::string(frame.sloc.file.clone()));
                entry.insert(b"line".to_vec(), Value::Integer(frame.sloc.line as i64));
                entry.insert(b"column".to_vec(), Value::Integer(frame.sloc.column as i64));
                entry.insert(b"value".to_vec(), frame.value.clone());
                backtrace.push(Value::Object(entry));
            }
            ctx_catch.insert_named_reference(
                "__backtrace",
                Reference::temporary(Value::Array(backtrace)),
            );

            match queue_catch.execute(&ctx_catch) {
                Ok(status) => ctx_catch.on_scope_exit_normal(status),
                Err(mut nested) => {
                    ctx_catch.on_scope_exit_exceptional(&mut nested);
                    nested.push_frame_catch(sloc_catch.clone(), except.into_value());
                    Err(nested)
                }
            }
        }
    }
}

fn do_throw_statement(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let value = ctx.stack().borrow_mut().pop()?.dereference_readonly()?;
    Err(RuntimeError::user_thrown(value, &rec.sloc_or_default()))
}

fn do_assert_statement(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let Sparam::Text(msg) = rec.sparam() else {
        return Err(corrupted());
    };
    let value = ctx.stack().borrow_mut().pop()?.dereference_readonly()?;
    if !value.test() {
        return Err(RuntimeError::assertion(msg.clone(), &rec.sloc_or_default()));
    }
    Ok(AirStatus::Next)
}

fn do_return_statement(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let up = rec.uparam();
    if up.b1 {
        return Ok(AirStatus::ReturnVoid);
    }
    let mut stack = ctx.stack().borrow_mut();
    let top = stack.top_mut()?;
    if top.is_void() {
        return Ok(AirStatus::ReturnVoid);
    }
    if up.b0 {
        // Returned by reference: the result must be dereferenceable.
        top.dereference_readonly()?;
    } else {
        top.dereference_copy()?;
    }
    Ok(AirStatus::ReturnRef)
}

fn do_simple_status(
    _ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    AirStatus::from_u8(rec.uparam().u0).ok_or_else(corrupted)
}

fn do_defer_expression(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let Sparam::AirBody(code_body) = rec.sparam() else {
        return Err(corrupted());
    };
    // Capture local references now, then instantiate the expression and
    // queue it on the current scope.
    let bound = rebind_nodes(code_body, ctx as &dyn Scope);
    let queue = solidify_nodes(&bound);
    ctx.defer_expression(rec.sloc_or_default(), queue);
    Ok(AirStatus::Next)
}

fn do_declare_reference(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let Sparam::Name(name) = rec.sparam() else {
        return Err(corrupted());
    };
    ctx.insert_named_reference(name.clone(), Reference::void());
    Ok(AirStatus::Next)
}

fn do_initialize_reference(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let Sparam::Name(name) = rec.sparam() else {
        return Err(corrupted());
    };
    let reference = ctx.stack().borrow_mut().pop()?;
    ctx.insert_named_reference(name.clone(), reference);
    Ok(AirStatus::Next)
}

fn do_define_function(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let Sparam::FuncDef { name, params, body } = rec.sparam() else {
        return Err(corrupted());
    };
    let sloc = rec.sloc_or_default();
    let optimizer = AirOptimizer::rebind(Some(ctx as &dyn Scope), params.clone(), body);
    let target = optimizer.create_function(sloc, name.clone());
    ctx.stack()
        .borrow_mut()
        .push(Reference::temporary(Value::Function(FunctionValue::new(
            target,
        ))));
    Ok(AirStatus::Next)
}

fn do_push_global_reference(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let Sparam::Name(name) = rec.sparam() else {
        return Err(corrupted());
    };
    let Some(reference) = ctx.global().get_named_reference_opt(name) else {
        return Err(RuntimeError::native_at(
            ErrorKind::KeyNotFound,
            format!("undeclared identifier `{name}`"),
            &rec.sloc_or_default(),
        ));
    };
    ctx.stack().borrow_mut().push(reference);
    Ok(AirStatus::Next)
}

fn do_push_local_reference(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let Sparam::Name(name) = rec.sparam() else {
        return Err(corrupted());
    };
    let ctx_at_depth = ctx.context_at_depth(rec.uparam().u2345)?;
    let Some(reference) = ctx_at_depth.get_named_reference_opt(name) else {
        return Err(RuntimeError::native_at(
            ErrorKind::KeyNotFound,
            format!("undeclared identifier `{name}`"),
            &rec.sloc_or_default(),
        ));
    };
    ctx.stack().borrow_mut().push(reference);
    Ok(AirStatus::Next)
}

fn do_push_bound_reference(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let Sparam::Ref(reference) = rec.sparam() else {
        return Err(corrupted());
    };
    ctx.stack().borrow_mut().push(reference.clone());
    Ok(AirStatus::Next)
}

fn do_push_constant(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let Sparam::Value(value) = rec.sparam() else {
        return Err(corrupted());
    };
    ctx.stack()
        .borrow_mut()
        .push(Reference::temporary(value.clone()));
    Ok(AirStatus::Next)
}

fn do_push_constant_small_int(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let value = rec.uparam().immediate48();
    ctx.stack()
        .borrow_mut()
        .push(Reference::temporary(Value::Integer(value)));
    Ok(AirStatus::Next)
}

fn do_push_unnamed_array(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let count = rec.uparam().u2345 as usize;
    let mut stack = ctx.stack().borrow_mut();
    let refs = stack.pop_n(count)?;
    let mut arr = Vec::with_capacity(count);
    for reference in refs {
        arr.push(reference.dereference_readonly()?);
    }
    stack.push(Reference::temporary(Value::Array(arr)));
    Ok(AirStatus::Next)
}

fn do_push_unnamed_object(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let Sparam::Keys(keys) = rec.sparam() else {
        return Err(corrupted());
    };
    let mut stack = ctx.stack().borrow_mut();
    let refs = stack.pop_n(keys.len())?;
    // With duplicate keys the rightmost value takes precedence.
    let mut obj = Object::with_capacity(keys.len());
    for (key, reference) in keys.iter().zip(refs) {
        obj.insert(key.clone(), reference.dereference_readonly()?);
    }
    stack.push(Reference::temporary(Value::Object(obj)));
    Ok(AirStatus::Next)
}

fn do_branch_expression(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let Sparam::TwoQueues(queue_true, queue_false) = rec.sparam() else {
        return Err(corrupted());
    };
    let up = rec.uparam();
    let take_true = {
        let value = ctx.stack().borrow().top()?.dereference_readonly()?;
        if up.b1 {
            value.is_null()
        } else {
            value.test()
        }
    };
    if take_true {
        do_evaluate_subexpression(ctx, up.b0, queue_true)
    } else {
        do_evaluate_subexpression(ctx, up.b0, queue_false)
    }
}

fn do_evaluate_subexpression(
    ctx: &ExecutiveContext<'_>,
    assign: bool,
    queue: &AvmcQueue,
) -> Result<AirStatus, RuntimeError> {
    if queue.is_empty() {
        // Leave the condition as the result.
        return Ok(AirStatus::Next);
    }
    if assign {
        // Evaluate and assign the result to the first operand. The value
        // has to be copied, in case a reference into the LHS is returned.
        let status = queue.execute(ctx)?;
        debug_assert_eq!(status, AirStatus::Next);
        let value = ctx.stack().borrow_mut().pop()?.dereference_readonly()?;
        let stack = ctx.stack().borrow();
        stack.top()?.modify_value(move |slot| {
            *slot = value;
            Ok(())
        })?;
        Ok(AirStatus::Next)
    } else {
        // Discard the condition, then forward the status so pending tail
        // calls propagate.
        ctx.stack().borrow_mut().pop()?;
        queue.execute(ctx)
    }
}

fn do_function_call(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let up = rec.uparam();
    let sloc = rec.sloc_or_default();
    let _sentry = ctx.global().recursion_guard(&sloc)?;
    ctx.global().with_hooks(|h| h.on_single_step_trap(&sloc));

    let args = pop_arguments_via_alt_stack(ctx, up.u2345 as usize)?;
    let (target, self_ref) = pop_callee(ctx)?;
    let mode = PtcMode::from_u8(up.u0).ok_or_else(corrupted)?;

    if mode == PtcMode::None {
        let result = do_invoke_nontail(self_ref, ctx.global(), &sloc, &target, args)?;
        ctx.stack().borrow_mut().push(result);
        Ok(AirStatus::Next)
    } else {
        // Replace the caller's result with a pending-tail-call thunk; it
        // is resolved lazily at the next barrier.
        let thunk = Reference::ptc(PtcArguments {
            sloc,
            ptc_mode: mode,
            target,
            self_ref,
            args,
        });
        ctx.stack().borrow_mut().push(thunk);
        Ok(AirStatus::ReturnRef)
    }
}

/// Move `count` argument references from the evaluation stack through the
/// argument-assembly stack, so the callee sees them in source order.
fn pop_arguments_via_alt_stack(
    ctx: &ExecutiveContext<'_>,
    count: usize,
) -> Result<Vec<Reference>, RuntimeError> {
    let mut alt = ctx.alt_stack().borrow_mut();
    alt.clear();
    let popped = ctx.stack().borrow_mut().pop_n(count)?;
    for reference in popped {
        alt.push(reference);
    }
    let len = alt.len();
    alt.pop_n(len)
}

/// Read the callee value (which must be a function) and take its `this`
/// reference off the stack.
fn pop_callee(ctx: &ExecutiveContext<'_>) -> Result<(FunctionValue, Reference), RuntimeError> {
    let value = ctx.stack().borrow().top()?.dereference_readonly()?;
    if value.is_null() {
        return Err(RuntimeError::native(
            ErrorKind::TypeMismatch,
            "function not found",
        ));
    }
    let target = value.as_function()?.clone();
    let mut self_ref = ctx.stack().borrow_mut().pop()?;
    self_ref.pop_modifier();
    Ok((target, self_ref))
}

pub(crate) fn do_invoke_nontail(
    self_ref: Reference,
    global: &GlobalContext,
    sloc: &SourceLocation,
    target: &FunctionValue,
    args: Vec<Reference>,
) -> Result<Reference, RuntimeError> {
    global.with_hooks(|h| h.on_function_call(sloc, target));
    let invoked = target.invoke(self_ref, global, args).and_then(|mut result| {
        check_function_result(&mut result, global)?;
        Ok(result)
    });
    match invoked {
        Ok(result) => {
            global.with_hooks(|h| h.on_function_return(sloc, target, &result));
            Ok(result)
        }
        Err(mut err) => {
            err.push_frame_call(sloc.clone());
            global.with_hooks(|h| h.on_function_except(sloc, target, &err));
            Err(err)
        }
    }
}

fn do_variadic_call(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let up = rec.uparam();
    let sloc = rec.sloc_or_default();
    let _sentry = ctx.global().recursion_guard(&sloc)?;
    ctx.global().with_hooks(|h| h.on_single_step_trap(&sloc));

    // The argument operand sits on top: null, an argument array, or a
    // generator function called once per argument index.
    let operand = ctx.stack().borrow().top()?.dereference_readonly()?;
    let args = match operand {
        Value::Null => {
            ctx.stack().borrow_mut().pop()?;
            Vec::new()
        }
        Value::Array(arr) => {
            ctx.stack().borrow_mut().pop()?;
            arr.into_iter().map(Reference::temporary).collect()
        }
        Value::Function(generator) => {
            let mut gref = ctx.stack().borrow_mut().pop()?;
            gref.pop_modifier();
            let gself = gref.clone();
            let count_ref =
                do_invoke_nontail(gref, ctx.global(), &sloc, &generator, Vec::new())?;
            let count_val = count_ref.dereference_readonly()?;
            let Value::Integer(count) = count_val else {
                return Err(RuntimeError::native_at(
                    ErrorKind::TypeMismatch,
                    format!(
                        "variadic argument count not valid (value was of type `{}`)",
                        count_val.type_name()
                    ),
                    &sloc,
                ));
            };
            if count < 0 {
                return Err(RuntimeError::native_at(
                    ErrorKind::TypeMismatch,
                    format!("variadic argument count was negative (value was `{count}`)"),
                    &sloc,
                ));
            }
            let mut collected = Vec::with_capacity(count as usize);
            for index in 0..count {
                let arg = do_invoke_nontail(
                    gself.clone(),
                    ctx.global(),
                    &sloc,
                    &generator,
                    vec![Reference::temporary(Value::Integer(index))],
                )?;
                arg.dereference_readonly()?;
                collected.push(arg);
            }
            collected
        }
        other => {
            return Err(RuntimeError::native_at(
                ErrorKind::TypeMismatch,
                format!(
                    "invalid argument generator (value was of type `{}`)",
                    other.type_name()
                ),
                &sloc,
            ));
        }
    };

    let (target, self_ref) = pop_callee(ctx)?;
    let mode = PtcMode::from_u8(up.u0).ok_or_else(corrupted)?;
    if mode == PtcMode::None {
        let result = do_invoke_nontail(self_ref, ctx.global(), &sloc, &target, args)?;
        ctx.stack().borrow_mut().push(result);
        Ok(AirStatus::Next)
    } else {
        let thunk = Reference::ptc(PtcArguments {
            sloc,
            ptc_mode: mode,
            target,
            self_ref,
            args,
        });
        ctx.stack().borrow_mut().push(thunk);
        Ok(AirStatus::ReturnRef)
    }
}

fn do_import_call(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let up = rec.uparam();
    let sloc = rec.sloc_or_default();
    let _sentry = ctx.global().recursion_guard(&sloc)?;
    ctx.global().with_hooks(|h| h.on_single_step_trap(&sloc));

    if up.u2345 == 0 {
        return Err(corrupted());
    }
    let args = ctx.stack().borrow_mut().pop_n(up.u2345 as usize - 1)?;

    let path_val = ctx.stack().borrow().top()?.dereference_readonly()?;
    let path_bytes = path_val.as_string()?.clone();
    let path_text = String::from_utf8(path_bytes).map_err(|_| {
        RuntimeError::native_at(ErrorKind::Io, "import path was not valid UTF-8", &sloc)
    })?;
    let canonical = canonicalize_import(&sloc.file, &path_text).map_err(RuntimeError::from)?;

    // Reentrant loads of the same canonical path are self-imports.
    let _guard = ctx.global().begin_load(&canonical)?;
    let loader = ctx.global().module_loader().ok_or(LoadError::NoLoader)?;
    let compiler = ctx.global().script_compiler().ok_or(LoadError::NoCompiler)?;
    let bytes = loader.load(&canonical).map_err(|source| LoadError::Io {
        path: canonical.clone(),
        source,
    })?;
    let code = compiler.compile(&canonical, &bytes)?;

    let script_sloc = SourceLocation::new(canonical.to_string_lossy(), 0, 0);
    let optimizer = AirOptimizer::rebind(
        Some(ctx.global() as &dyn Scope),
        vec!["...".to_string()],
        &code,
    );
    let target = FunctionValue::new(optimizer.create_function(script_sloc.clone(), "[file scope]"));

    // Invoke the file-scope function with `this` bound to null; its result
    // replaces the path on the stack.
    ctx.stack().borrow_mut().pop()?;
    let result = do_invoke_nontail(
        Reference::temporary(Value::Null),
        ctx.global(),
        &sloc,
        &target,
        args,
    )
    .map_err(|mut err| {
        err.push_frame_file(script_sloc);
        err
    })?;
    ctx.stack().borrow_mut().push(result);
    Ok(AirStatus::Next)
}

fn do_check_argument(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    if rec.uparam().b0 {
        // Passed by reference: must be dereferenceable.
        ctx.stack().borrow().top()?.dereference_readonly()?;
    } else {
        // Passed by copy: decay to a temporary.
        ctx.stack().borrow_mut().top_mut()?.dereference_copy()?;
    }
    Ok(AirStatus::Next)
}

fn do_catch_expression(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let Sparam::Queue(queue_body) = rec.sparam() else {
        return Err(corrupted());
    };
    // Evaluate the operand; its stack delta is discarded and the thrown
    // value (or null) becomes the result.
    let old_size = ctx.stack().borrow().len();
    let caught = match queue_body.execute(ctx) {
        Ok(_) => Value::Null,
        Err(err) => err.into_value(),
    };
    let mut stack = ctx.stack().borrow_mut();
    stack.truncate(old_size);
    stack.push(Reference::temporary(caught));
    Ok(AirStatus::Next)
}

fn do_single_step_trap(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let sloc = rec.sloc_or_default();
    ctx.global().with_hooks(|h| h.on_single_step_trap(&sloc));
    Ok(AirStatus::Next)
}

fn do_apply_operator(
    ctx: &ExecutiveContext<'_>,
    rec: &AvmcRecord,
) -> Result<AirStatus, RuntimeError> {
    let up = rec.uparam();
    let op = Operator::from_u8(up.u1).ok_or_else(corrupted)?;
    let assign = up.b0;
    match op {
        Operator::Inc => do_step_operator(ctx, assign, 1),
        Operator::Dec => do_step_operator(ctx, assign, -1),
        Operator::Unset => {
            let mut stack = ctx.stack().borrow_mut();
            let top = stack.top_mut()?;
            let removed = top.dereference_unset()?;
            top.set_temporary(removed);
            Ok(AirStatus::Next)
        }
        Operator::Head => do_push_subscript(ctx, RefModifier::ArrayHead),
        Operator::Tail => do_push_subscript(ctx, RefModifier::ArrayTail),
        Operator::Random => {
            let seed = ctx.global().random_u32();
            do_push_subscript(ctx, RefModifier::ArrayRandom(seed))
        }
        Operator::Assign => {
            let value = ctx.stack().borrow_mut().pop()?.dereference_readonly()?;
            let stack = ctx.stack().borrow();
            stack.top()?.modify_value(move |slot| {
                *slot = value;
                Ok(())
            })?;
            Ok(AirStatus::Next)
        }
        Operator::Index => {
            let subscript = ctx.stack().borrow_mut().pop()?.dereference_readonly()?;
            let modifier = match subscript {
                Value::Integer(index) => RefModifier::ArrayIndex(index),
                Value::String(key) => RefModifier::ObjectKey(key),
                other => {
                    return Err(RuntimeError::native(
                        ErrorKind::TypeMismatch,
                        format!(
                            "subscript value not valid (value was of type `{}`)",
                            other.type_name()
                        ),
                    ));
                }
            };
            do_push_subscript(ctx, modifier)
        }
        Operator::Fma => {
            let mut stack = ctx.stack().borrow_mut();
            let z = stack.pop()?.dereference_readonly()?;
            let y = stack.pop()?.dereference_readonly()?;
            if assign {
                let top = stack.top()?;
                top.modify_value(move |slot| {
                    *slot = ops::apply_fma(slot.clone(), y, z)?;
                    Ok(())
                })?;
            } else {
                let top = stack.top_mut()?;
                let x = top.dereference_readonly()?;
                top.set_temporary(ops::apply_fma(x, y, z)?);
            }
            Ok(AirStatus::Next)
        }
        op if op.as_u8() >= Operator::Assign.as_u8() => {
            // binary
            let mut stack = ctx.stack().borrow_mut();
            let rhs = stack.pop()?.dereference_readonly()?;
            if assign {
                let top = stack.top()?;
                top.modify_value(move |slot| {
                    *slot = ops::apply_binary(op, slot.clone(), rhs)?;
                    Ok(())
                })?;
            } else {
                let top = stack.top_mut()?;
                let lhs = top.dereference_readonly()?;
                top.set_temporary(ops::apply_binary(op, lhs, rhs)?);
            }
            Ok(AirStatus::Next)
        }
        op => {
            // unary
            let mut stack = ctx.stack().borrow_mut();
            if assign {
                let top = stack.top()?;
                top.modify_value(|slot| {
                    *slot = ops::apply_unary(op, slot.clone())?;
                    Ok(())
                })?;
            } else {
                let top = stack.top_mut()?;
                let value = top.dereference_readonly()?;
                top.set_temporary(ops::apply_unary(op, value)?);
            }
            Ok(AirStatus::Next)
        }
    }
}

/// `++`/`--`: the prefix form leaves the lvalue on the stack, the postfix
/// form replaces it with the old value as a temporary.
fn do_step_operator(
    ctx: &ExecutiveContext<'_>,
    postfix: bool,
    delta: i64,
) -> Result<AirStatus, RuntimeError> {
    let mut stack = ctx.stack().borrow_mut();
    let top = stack.top_mut()?;
    let old = top.modify_value(|slot| {
        let old = slot.clone();
        match slot {
            Value::Integer(value) => {
                *value = value.checked_add(delta).ok_or_else(|| {
                    RuntimeError::native(
                        ErrorKind::ArithmeticOverflow,
                        format!("integer increment overflow (operand was `{value}`)"),
                    )
                })?;
            }
            Value::Real(value) => {
                *value += delta as f64;
            }
            other => {
                return Err(RuntimeError::native(
                    ErrorKind::TypeMismatch,
                    format!(
                        "increment not applicable (operand was of type `{}`)",
                        other.type_name()
                    ),
                ));
            }
        }
        Ok(old)
    })?;
    if postfix {
        top.set_temporary(old);
    }
    Ok(AirStatus::Next)
}

fn do_push_subscript(
    ctx: &ExecutiveContext<'_>,
    modifier: RefModifier,
) -> Result<AirStatus, RuntimeError> {
    let mut stack = ctx.stack().borrow_mut();
    let top = stack.top_mut()?;
    top.push_modifier(modifier)?;
    top.dereference_readonly()?;
    Ok(AirStatus::Next)
}
