//! Instantiates a guest, lays out its argv and environment, and runs it.

use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info};
use wasmtime::{Engine, Instance, Linker, Memory, Module, Store};

use crate::error::{BootstrapError, GuestExit};
use crate::linker::{HostState, add_to_linker};
use crate::memory::GuestMemory;
use crate::session::Session;

/// Guest address where argument and environment strings start.
pub const ARGV_BASE: u64 = 4096;

/// First address of the guest's static data; argv and env must end below it.
pub const ARGV_LIMIT: u64 = 12288;

/// Writes `args` and `env` as NUL-terminated strings from [`ARGV_BASE`],
/// followed by the pointer table the guest runtime walks at startup. Returns
/// `(argc, argv)`. Nothing is written at or past [`ARGV_LIMIT`].
pub fn write_argv<M>(
    mem: &mut M,
    args: &[String],
    env: &[(String, String)],
) -> Result<(i32, i32), BootstrapError>
where
    M: GuestMemory + ?Sized,
{
    let mut offset = ARGV_BASE;
    let mut pointers = Vec::with_capacity(args.len() + env.len() + 2);
    for arg in args {
        pointers.push(push_c_string(mem, &mut offset, arg)?);
    }
    pointers.push(0);

    let mut env: Vec<&(String, String)> = env.iter().collect();
    env.sort_by(|a, b| a.0.cmp(&b.0));
    for (key, value) in env {
        let entry = format!("{key}={value}");
        pointers.push(push_c_string(mem, &mut offset, &entry)?);
    }
    pointers.push(0);

    let argv = offset;
    check_limit(argv + 8 * pointers.len() as u64)?;
    for ptr in pointers {
        mem.write_u32(offset, ptr as u32)?;
        mem.write_u32(offset + 4, 0)?;
        offset += 8;
    }
    Ok((args.len() as i32, argv as i32))
}

fn push_c_string<M>(mem: &mut M, offset: &mut u64, s: &str) -> Result<u64, BootstrapError>
where
    M: GuestMemory + ?Sized,
{
    let ptr = *offset;
    check_limit(ptr + s.len() as u64 + 1)?;
    mem.write_bytes(ptr, s.as_bytes())?;
    mem.write_u8(ptr + s.len() as u64, 0)?;
    *offset = (ptr + s.len() as u64 + 1).next_multiple_of(8);
    Ok(ptr)
}

fn check_limit(end: u64) -> Result<(), BootstrapError> {
    if end >= ARGV_LIMIT {
        return Err(BootstrapError::TooLarge {
            end,
            limit: ARGV_LIMIT,
        });
    }
    Ok(())
}

/// Runs `module` to completion and returns its exit code. A guest that
/// returns from `run` without calling `runtime.wasmExit` exits with 0.
pub fn run_module(
    engine: &Engine,
    module: &Module,
    session: Session,
    args: &[String],
    env: &[(String, String)],
) -> Result<i32> {
    let mut store = Store::new(engine, HostState::new(session));
    let mut linker = Linker::new(engine);
    add_to_linker(&mut linker)?;

    let instance = linker
        .instantiate(&mut store, module)
        .map_err(anyhow::Error::from)
        .context("instantiate guest")?;
    let memory = guest_memory(&mut store, &instance)?;
    store.data_mut().set_memory(memory);

    let (argc, argv) = write_argv(memory.data_mut(&mut store), args, env)
        .context("write guest argv")?;
    debug!(argc, argv, "guest argv written");

    let run = instance
        .get_typed_func::<(i32, i32), ()>(&mut store, "run")
        .map_err(anyhow::Error::from)
        .context("missing run export")?;
    let start = Instant::now();
    let outcome = run.call(&mut store, (argc, argv));
    debug!(elapsed = ?start.elapsed(), handles = store.data().session.values().len(), "guest stopped");

    match outcome {
        Ok(()) => Ok(store.data().session.exit_code().unwrap_or(0)),
        Err(err) => match err.downcast_ref::<GuestExit>() {
            Some(exit) => {
                info!(code = exit.code, "guest exited");
                Ok(exit.code)
            }
            None => Err(anyhow::Error::from(err).context("guest trapped")),
        },
    }
}

fn guest_memory(store: &mut Store<HostState>, instance: &Instance) -> Result<Memory> {
    instance
        .get_memory(&mut *store, "mem")
        .or_else(|| instance.get_memory(&mut *store, "memory"))
        .context("guest exports no linear memory")
}
