use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use gojs_wasm_host::{GuestExit, HostConfig, Session, run_module};
use wasmtime::{Engine, Module};

#[derive(Clone, Default)]
struct SharedOutput(Arc<Mutex<Vec<u8>>>);

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

const HELLO_GUEST: &str = r#"
(module
  (import "go" "runtime.wasmWrite" (func $write (param i32)))
  (import "go" "runtime.wasmExit" (func $exit (param i32)))
  (memory (export "mem") 1)
  (data (i32.const 1024) "hello, guest\n")
  (func (export "run") (param $argc i32) (param $argv i32)
    (i64.store (i32.const 520) (i64.const 1))
    (i64.store (i32.const 528) (i64.const 1024))
    (i64.store (i32.const 536) (i64.const 13))
    (call $write (i32.const 512))
    (i32.store (i32.const 520) (local.get $argc))
    (call $exit (i32.const 512))
    unreachable))
"#;

const RETURNING_GUEST: &str = r#"
(module
  (memory (export "memory") 1)
  (func (export "run") (param i32 i32)))
"#;

const FAULTING_GUEST: &str = r#"
(module
  (import "go" "syscall/js.valueGet" (func $get (param i32)))
  (memory (export "mem") 1)
  (data (i32.const 1024) "length")
  (func (export "run") (param i32 i32)
    ;; undefined has no properties
    (i32.store (i32.const 520) (i32.const 1))
    (i64.store (i32.const 528) (i64.const 1024))
    (i64.store (i32.const 536) (i64.const 6))
    (call $get (i32.const 512))))
"#;

const ARGV_GUEST: &str = r#"
(module
  (import "go" "runtime.wasmExit" (func $exit (param i32)))
  (memory (export "mem") 1)
  (func (export "run") (param $argc i32) (param $argv i32)
    ;; exit with the first byte of argv[1]
    (i32.store (i32.const 520)
      (i32.load8_u (i32.load (i32.add (local.get $argv) (i32.const 8)))))
    (call $exit (i32.const 512))))
"#;

fn engine() -> Engine {
    HostConfig::default().build_engine().unwrap()
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_guest_writes_and_exits() {
    let engine = engine();
    let module = Module::new(&engine, HELLO_GUEST).unwrap();
    let output = SharedOutput::default();
    let code = run_module(
        &engine,
        &module,
        Session::with_output(output.clone()),
        &args(&["guest.wasm", "a", "b"]),
        &[],
    )
    .unwrap();
    assert_eq!(code, 3);
    assert_eq!(output.0.lock().unwrap().as_slice(), b"hello, guest\n");
}

#[test]
fn test_guest_returning_from_run_exits_zero() {
    let engine = engine();
    let module = Module::new(&engine, RETURNING_GUEST).unwrap();
    let code = run_module(&engine, &module, Session::with_output(io::sink()), &[], &[]).unwrap();
    assert_eq!(code, 0);
}

#[test]
fn test_fatal_host_error_traps_guest() {
    let engine = engine();
    let module = Module::new(&engine, FAULTING_GUEST).unwrap();
    let err = run_module(&engine, &module, Session::with_output(io::sink()), &[], &[])
        .unwrap_err();
    assert!(err.downcast_ref::<GuestExit>().is_none());
    assert!(format!("{err:#}").contains("has no properties"), "{err:#}");
}

#[test]
fn test_guest_sees_argv() {
    let engine = engine();
    let module = Module::new(&engine, ARGV_GUEST).unwrap();
    let env = vec![("GOJS_TEST".to_string(), "1".to_string())];
    let code = run_module(
        &engine,
        &module,
        Session::with_output(io::sink()),
        &args(&["guest.wasm", "*"]),
        &env,
    )
    .unwrap();
    assert_eq!(code, b'*' as i32);
}
