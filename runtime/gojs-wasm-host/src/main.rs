use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use gojs_wasm_host::{HostConfig, Session, run_module};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use wasmtime::Module;

fn init_logging() {
    let filter = EnvFilter::try_from_env("GOJS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let mut args = env::args_os()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned());
    let wasm_path = match args.next() {
        Some(flag) if flag == "-h" || flag == "--help" => {
            eprintln!("usage: gojs-wasm-host <module.wasm> [args...]");
            return Ok(());
        }
        Some(path) => PathBuf::from(path),
        None => bail!("usage: gojs-wasm-host <module.wasm> [args...]"),
    };

    let config = HostConfig::from_env();
    debug!(?config, "host config");
    let engine = config.build_engine()?;

    let read_start = Instant::now();
    let wasm_bytes = fs::read(&wasm_path).with_context(|| format!("read {wasm_path:?}"))?;
    debug!(elapsed = ?read_start.elapsed(), "read guest wasm");
    let compile_start = Instant::now();
    let module = Module::new(&engine, wasm_bytes)
        .map_err(anyhow::Error::from)
        .with_context(|| format!("compile {wasm_path:?}"))?;
    debug!(elapsed = ?compile_start.elapsed(), "compiled guest module");

    let guest_args: Vec<String> = std::iter::once(wasm_path.display().to_string())
        .chain(args)
        .collect();
    let guest_env: Vec<(String, String)> = env::vars_os()
        .map(|(key, value)| {
            (key.to_string_lossy().into_owned(), value.to_string_lossy().into_owned())
        })
        .collect();

    let code = run_module(&engine, &module, Session::new(), &guest_args, &guest_env)?;
    debug!(code, "exiting");
    process::exit(code);
}
