//! Module loading through the loader and compiler seams.

mod common;

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use common::*;

use asteria::{
    AirNode, ErrorKind, ModuleLoader, RuntimeError, Script, ScriptCompiler, Value,
};

struct MapLoader {
    files: HashMap<PathBuf, Vec<u8>>,
}

impl ModuleLoader for MapLoader {
    fn load(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such module"))
    }
}

/// Stand-in for the external parser: compiles a few known byte streams
/// into canned AIR bodies.
struct StubCompiler;

impl ScriptCompiler for StubCompiler {
    fn compile(&self, path: &Path, source: &[u8]) -> Result<Vec<AirNode>, RuntimeError> {
        match source {
            b"forty-two" => Ok(flatten(vec![stmt_return(1, vec![push_int(42)])])),
            b"echo-first-arg" => Ok(flatten(vec![stmt_return(
                1,
                vec![push_local(1, 0, "__varg"), push_int(0), call(1, 1)],
            )])),
            b"self-import" => Ok(flatten(vec![stmt_return(
                1,
                vec![
                    push_value(Value::string(path.to_string_lossy().as_ref())),
                    AirNode::ImportCall {
                        sloc: sloc(1),
                        nargs: 1,
                    },
                ],
            )])),
            _ => Err(RuntimeError::native(
                ErrorKind::Parse,
                "unrecognized module source",
            )),
        }
    }
}

fn script_with_modules(files: &[(&str, &[u8])]) -> Script {
    let script = Script::new();
    let files = files
        .iter()
        .map(|(path, bytes)| (PathBuf::from(path), bytes.to_vec()))
        .collect();
    script
        .global()
        .set_module_loader(Some(Rc::new(MapLoader { files })));
    script
        .global()
        .set_script_compiler(Some(Rc::new(StubCompiler)));
    script
}

#[test]
fn import_runs_the_module_and_yields_its_result() {
    let script = script_with_modules(&[("/lib/mod.ast", b"forty-two")]);
    let code = flatten(vec![stmt_return(
        1,
        vec![
            push_value(Value::string("/lib/mod.ast")),
            AirNode::ImportCall {
                sloc: sloc(1),
                nargs: 1,
            },
        ],
    )]);
    let result = script.execute("scenario", &code).unwrap();
    assert_eq!(result, Value::Integer(42));
}

#[test]
fn import_passes_trailing_arguments_to_the_module() {
    let script = script_with_modules(&[("/lib/echo.ast", b"echo-first-arg")]);
    let code = flatten(vec![stmt_return(
        1,
        vec![
            push_value(Value::string("/lib/echo.ast")),
            push_int(7),
            AirNode::ImportCall {
                sloc: sloc(1),
                nargs: 2,
            },
        ],
    )]);
    let result = script.execute("scenario", &code).unwrap();
    assert_eq!(result, Value::Integer(7));
}

#[test]
fn relative_imports_resolve_against_the_importing_file() {
    let script = script_with_modules(&[("/scripts/lib/mod.ast", b"forty-two")]);
    // The importing file is /scripts/main.ast; "lib/mod.ast" is relative.
    let code = vec![
        clear(),
        push_value(Value::string("lib/mod.ast")),
        AirNode::ImportCall {
            sloc: asteria::SourceLocation::new("/scripts/main.ast", 1, 1),
            nargs: 1,
        },
        ret_val(1),
    ];
    let result = script.execute("scenario", &code).unwrap();
    assert_eq!(result, Value::Integer(42));
}

#[test]
fn self_import_is_detected_and_fails() {
    let script = script_with_modules(&[("/lib/self.ast", b"self-import")]);
    let code = flatten(vec![stmt_return(
        1,
        vec![
            push_value(Value::string("/lib/self.ast")),
            AirNode::ImportCall {
                sloc: sloc(1),
                nargs: 1,
            },
        ],
    )]);
    let err = script.execute("scenario", &code).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn missing_modules_surface_as_io_errors() {
    let script = script_with_modules(&[]);
    let code = flatten(vec![stmt_return(
        1,
        vec![
            push_value(Value::string("/lib/nope.ast")),
            AirNode::ImportCall {
                sloc: sloc(1),
                nargs: 1,
            },
        ],
    )]);
    let err = script.execute("scenario", &code).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}
