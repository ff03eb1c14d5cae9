//! End-to-end programs exercising the documented behavior of the engine.

mod common;

use common::*;

use asteria::value::ops::Operator;
use asteria::{
    AirNode, ErrorKind, FunctionValue, Reference, Script, Value,
};

/// A `format` binding good enough for scripts: `$1`, `$2`, ... expand to
/// the positional arguments after the template.
fn format_binding() -> FunctionValue {
    FunctionValue::native("format", |_self, _global, args| {
        let mut values = Vec::with_capacity(args.len());
        for arg in &args {
            values.push(arg.dereference_readonly()?);
        }
        let template = values
            .first()
            .map(|v| v.as_string().cloned())
            .transpose()?
            .unwrap_or_default();
        let mut text = String::from_utf8_lossy(&template).to_string();
        for (index, value) in values.iter().enumerate().skip(1) {
            text = text.replace(&format!("${index}"), &value.to_string());
        }
        Ok(Reference::temporary(Value::string(text)))
    })
}

#[test]
fn for_each_over_array_binds_key_and_mapped() {
    // var out = ""; for each k, v -> ["a","b","c"] { out += format("$1=$2;", k, v); }
    // return out;
    let script = Script::new();
    script.global().insert_named_reference(
        "format",
        Reference::constant(Value::Function(format_binding())),
    );

    let body = stmt(vec![
        push_local(4, 2, "out"),
        push_global(4, "format"),
        push_str("$1=$2;"),
        push_local(4, 1, "k"),
        push_local(4, 1, "v"),
        call(4, 3),
        apply_assign(4, Operator::Add),
    ]);
    let range = Value::Array(vec![
        Value::string("a"),
        Value::string("b"),
        Value::string("c"),
    ]);
    let code = flatten(vec![
        stmt_var(1, "out", vec![push_str("")]),
        vec![
            clear(),
            AirNode::ForEachStatement {
                name_key: "k".to_string(),
                name_mapped: "v".to_string(),
                sloc_init: sloc(3),
                code_init: vec![push_value(range)],
                code_body: body,
            },
        ],
        stmt_return(6, vec![push_local(6, 0, "out")]),
    ]);

    let result = script.execute("scenario", &code).unwrap();
    assert_eq!(result, Value::string("0=a;1=b;2=c;"));
}

#[test]
fn nested_function_sees_enclosing_function_by_name() {
    // func three() {
    //   func two() {
    //     func one() { return typeof two; }
    //     return one();
    //   }
    //   return two();
    // }
    // return three();
    let one_body = stmt_return(3, vec![push_local(3, 2, "two"), apply(3, Operator::Typeof)]);
    let two_body = flatten(vec![
        stmt_func(2, "one", &[], one_body),
        stmt_return(4, vec![push_local(4, 0, "one"), call(4, 0)]),
    ]);
    let three_body = flatten(vec![
        stmt_func(1, "two", &[], two_body),
        stmt_return(5, vec![push_local(5, 0, "two"), call(5, 0)]),
    ]);
    let code = flatten(vec![
        stmt_func(1, "three", &[], three_body),
        stmt_return(7, vec![push_local(7, 0, "three"), call(7, 0)]),
    ]);

    let result = Script::new().execute("scenario", &code).unwrap();
    assert_eq!(result, Value::string("function"));
}

#[test]
fn integer_subscript_on_object_through_reference_fails() {
    // var obj = {}; noop(->obj[1]);
    let code = flatten(vec![
        stmt_var(1, "obj", vec![push_value(Value::Object(Default::default()))]),
        stmt_func(2, "noop", &["x"], Vec::new()),
        stmt(vec![
            push_local(3, 0, "noop"),
            push_local(3, 0, "obj"),
            push_int(1),
            apply(3, Operator::Index),
            AirNode::CheckArgument {
                sloc: sloc(3),
                by_ref: true,
            },
            call(3, 1),
        ]),
    ]);

    let err = Script::new().execute("scenario", &code).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[test]
fn overflow_in_try_is_caught_and_lhs_is_untouched() {
    // var a = 1;
    // try { a = a + 9223372036854775807; }
    // catch (e) { assert typeof e == "string"; }
    // return a;
    let try_body = stmt(vec![
        push_local(2, 1, "a"),
        push_local(2, 1, "a"),
        push_value(Value::Integer(i64::MAX)),
        apply(2, Operator::Add),
        apply(2, Operator::Assign),
    ]);
    let catch_body = {
        let mut code = stmt(vec![
            push_local(3, 0, "e"),
            apply(3, Operator::Typeof),
            push_str("string"),
            apply(3, Operator::CmpEq),
        ]);
        code.push(AirNode::AssertStatement {
            sloc: sloc(3),
            msg: "typeof e == \"string\"".to_string(),
        });
        code
    };
    let code = flatten(vec![
        stmt_var(1, "a", vec![push_int(1)]),
        vec![
            clear(),
            AirNode::TryStatement {
                sloc_try: sloc(2),
                code_try: try_body,
                sloc_catch: sloc(3),
                name_except: "e".to_string(),
                code_catch: catch_body,
            },
        ],
        stmt_return(4, vec![push_local(4, 0, "a")]),
    ]);

    let result = Script::new().execute("scenario", &code).unwrap();
    assert_eq!(result, Value::Integer(1));
}

#[test]
fn catch_clause_exposes_backtrace() {
    // try { throw "bang"; } catch (e) { return __backtrace; }
    let try_body = {
        let mut code = stmt(vec![push_str("bang")]);
        code.push(throw_stmt(2));
        code
    };
    let catch_body = stmt_return(3, vec![push_local(3, 0, "__backtrace")]);
    let code = vec![
        clear(),
        AirNode::TryStatement {
            sloc_try: sloc(1),
            code_try: try_body,
            sloc_catch: sloc(3),
            name_except: "e".to_string(),
            code_catch: catch_body,
        },
    ];

    let result = Script::new().execute("scenario", &code).unwrap();
    let frames = result.as_array().unwrap().clone();
    assert!(!frames.is_empty());
    let first = frames[0].as_object().unwrap().clone();
    assert_eq!(first.get(b"frame".as_slice()).unwrap(), &Value::string("throw"));
    assert_eq!(first.get(b"file".as_slice()).unwrap(), &Value::string("scenario"));
    assert_eq!(first.get(b"line".as_slice()).unwrap(), &Value::Integer(2));
    assert_eq!(first.get(b"value".as_slice()).unwrap(), &Value::string("bang"));
}

#[test]
fn catch_expression_yields_thrown_value_or_null() {
    // return catch(throw "x");
    let code = vec![
        clear(),
        AirNode::CatchExpression {
            code_body: vec![push_str("x"), throw_stmt(1)],
        },
        ret_val(1),
    ];
    let result = Script::new().execute("scenario", &code).unwrap();
    assert_eq!(result, Value::string("x"));

    // return catch(42);
    let code = vec![
        clear(),
        AirNode::CatchExpression {
            code_body: vec![push_int(42)],
        },
        ret_val(1),
    ];
    let result = Script::new().execute("scenario", &code).unwrap();
    assert_eq!(result, Value::Null);
}

#[test]
fn variadic_call_spreads_an_argument_array() {
    let script = Script::new();
    script.global().insert_named_reference(
        "sum3",
        Reference::constant(Value::Function(FunctionValue::native(
            "sum3",
            |_self, _global, args| {
                let mut total = 0;
                for arg in &args {
                    total += arg.dereference_readonly()?.as_integer()?;
                }
                Ok(Reference::temporary(Value::Integer(total)))
            },
        ))),
    );

    let args = Value::Array(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
    let code = flatten(vec![stmt_return(
        1,
        vec![
            push_global(1, "sum3"),
            push_value(args),
            AirNode::VariadicCall {
                sloc: sloc(1),
                ptc: asteria::PtcMode::None,
            },
        ],
    )]);
    let result = script.execute("scenario", &code).unwrap();
    assert_eq!(result, Value::Integer(6));
}

#[test]
fn variadic_call_drives_a_generator_function() {
    let script = Script::new();
    script.global().insert_named_reference(
        "gen",
        Reference::constant(Value::Function(FunctionValue::native(
            "gen",
            |_self, _global, args| {
                if args.is_empty() {
                    return Ok(Reference::temporary(Value::Integer(2)));
                }
                let index = args[0].dereference_readonly()?.as_integer()?;
                Ok(Reference::temporary(Value::Integer(index * 10)))
            },
        ))),
    );
    script.global().insert_named_reference(
        "add2",
        Reference::constant(Value::Function(FunctionValue::native(
            "add2",
            |_self, _global, args| {
                let a = args[0].dereference_readonly()?.as_integer()?;
                let b = args[1].dereference_readonly()?.as_integer()?;
                Ok(Reference::temporary(Value::Integer(a + b)))
            },
        ))),
    );

    let code = flatten(vec![stmt_return(
        1,
        vec![
            push_global(1, "add2"),
            push_global(1, "gen"),
            AirNode::VariadicCall {
                sloc: sloc(1),
                ptc: asteria::PtcMode::None,
            },
        ],
    )]);
    let result = script.execute("scenario", &code).unwrap();
    assert_eq!(result, Value::Integer(10));
}

#[test]
fn varg_exposes_trailing_arguments() {
    // func count(...) { return __varg(); }  count(7, 8, 9) == 3
    let count_body = stmt_return(2, vec![push_local(2, 0, "__varg"), call(2, 0)]);
    let code = flatten(vec![
        stmt_func(1, "count", &["..."], count_body),
        stmt_return(
            3,
            vec![
                push_local(3, 0, "count"),
                push_int(7),
                push_int(8),
                push_int(9),
                call(3, 3),
            ],
        ),
    ]);
    let result = Script::new().execute("scenario", &code).unwrap();
    assert_eq!(result, Value::Integer(3));

    // func second(...) { return __varg(1); }  second(7, 8, 9) == 8
    let second_body = stmt_return(2, vec![push_local(2, 0, "__varg"), push_int(1), call(2, 1)]);
    let code = flatten(vec![
        stmt_func(1, "second", &["..."], second_body),
        stmt_return(
            3,
            vec![
                push_local(3, 0, "second"),
                push_int(7),
                push_int(8),
                push_int(9),
                call(3, 3),
            ],
        ),
    ]);
    let result = Script::new().execute("scenario", &code).unwrap();
    assert_eq!(result, Value::Integer(8));
}

#[test]
fn typeof_and_countof_algebra_holds_end_to_end() {
    // var xs = [1, 2, 3]; var ys = xs; return countof ys;
    let code = flatten(vec![
        stmt_var(
            1,
            "xs",
            vec![push_value(Value::Array(vec![
                Value::Integer(1),
                Value::Integer(2),
                Value::Integer(3),
            ]))],
        ),
        stmt_var(2, "ys", vec![push_local(2, 0, "xs")]),
        stmt_return(3, vec![push_local(3, 0, "ys"), apply(3, Operator::Countof)]),
    ]);
    let result = Script::new().execute("scenario", &code).unwrap();
    assert_eq!(result, Value::Integer(3));

    // typeof survives assignment through a reference.
    let code = flatten(vec![
        stmt_var(1, "a", vec![push_str("text")]),
        stmt_var(2, "b", vec![push_value(Value::Null)]),
        stmt(vec![
            push_local(3, 0, "b"),
            push_local(3, 0, "a"),
            apply(3, Operator::Assign),
        ]),
        stmt_return(4, vec![push_local(4, 0, "b"), apply(4, Operator::Typeof)]),
    ]);
    let result = Script::new().execute("scenario", &code).unwrap();
    assert_eq!(result, Value::string("string"));
}

#[test]
fn mutation_through_object_member_reference_is_visible() {
    // var o = {}; o.n = 1; o.n += 41; return o.n;
    let code = flatten(vec![
        stmt_var(1, "o", vec![push_value(Value::Object(Default::default()))]),
        stmt(vec![
            push_local(2, 0, "o"),
            push_str("n"),
            apply(2, Operator::Index),
            push_int(1),
            apply(2, Operator::Assign),
        ]),
        stmt(vec![
            push_local(3, 0, "o"),
            push_str("n"),
            apply(3, Operator::Index),
            push_int(41),
            apply_assign(3, Operator::Add),
        ]),
        stmt_return(
            4,
            vec![
                push_local(4, 0, "o"),
                push_str("n"),
                apply(4, Operator::Index),
            ],
        ),
    ]);
    let result = Script::new().execute("scenario", &code).unwrap();
    assert_eq!(result, Value::Integer(42));
}
