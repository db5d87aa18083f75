//! Wires the host function set into a wasmtime [`Linker`].

use tracing::{debug, error};
use wasmtime::{Caller, Extern, Linker, Memory};

use crate::error::GuestExit;
use crate::imports::{IMPORT_MODULE, IMPORTS, Import};
use crate::session::Session;

/// Store data for one guest instance.
pub struct HostState {
    pub session: Session,
    memory: Option<Memory>,
}

impl HostState {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            memory: None,
        }
    }

    pub fn set_memory(&mut self, memory: Memory) {
        self.memory = Some(memory);
    }
}

pub fn add_to_linker(linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
    for import in IMPORTS {
        linker.func_wrap(
            IMPORT_MODULE,
            import.name,
            move |mut caller: Caller<'_, HostState>, sp: i32| -> wasmtime::Result<()> {
                dispatch(&mut caller, import, sp)
            },
        )?;
    }
    Ok(())
}

fn dispatch(caller: &mut Caller<'_, HostState>, import: &Import, sp: i32) -> wasmtime::Result<()> {
    let memory = ensure_memory(caller)?;
    let (data, state) = memory.data_and_store_mut(&mut *caller);
    debug!(import = import.name, sp, "host call");
    if let Err(err) = (import.func)(&mut state.session, data, sp as u32) {
        error!(import = import.name, sp, %err, "host call failed");
        state.session.terminate(1);
        return Err(wasmtime::Error::new(err));
    }
    if let Some(code) = state.session.exit_code() {
        return Err(wasmtime::Error::new(GuestExit { code }));
    }
    Ok(())
}

fn ensure_memory(caller: &mut Caller<'_, HostState>) -> wasmtime::Result<Memory> {
    if let Some(mem) = caller.data().memory {
        return Ok(mem);
    }
    for name in ["mem", "memory"] {
        if let Some(mem) = caller.get_export(name).and_then(Extern::into_memory) {
            caller.data_mut().memory = Some(mem);
            return Ok(mem);
        }
    }
    Err(wasmtime::Error::msg("guest exports no linear memory"))
}
