//! Host functions imported by the guest from the `go` module.
//!
//! Every import takes the guest stack pointer `sp`. Arguments and results
//! live at fixed byte offsets from it; those offsets are part of the ABI the
//! guest compiler emits and must not drift.

use std::time::{SystemTime, UNIX_EPOCH};

use gojs_obj_model::{HostObject, JsError, SlotValue, Value};
use tracing::{debug, trace};

use crate::codec::{load_slice_of_values, load_string, load_value, store_slice, store_value};
use crate::error::HostError;
use crate::memory::GuestMemory;
use crate::session::Session;

pub const IMPORT_MODULE: &str = "go";

pub type HostResult = Result<(), HostError>;

/// Signature shared by every entry in [`IMPORTS`]. Guest memory arrives as a
/// plain byte slice.
pub type HostFn = fn(&mut Session, &mut [u8], u32) -> HostResult;

#[derive(Clone, Copy)]
pub struct Import {
    pub name: &'static str,
    pub func: HostFn,
}

pub const IMPORTS: &[Import] = &[
    Import { name: "debug", func: debug_value::<[u8]> },
    Import { name: "runtime.wasmExit", func: wasm_exit::<[u8]> },
    Import { name: "runtime.wasmWrite", func: wasm_write::<[u8]> },
    Import { name: "runtime.nanotime", func: nanotime::<[u8]> },
    Import { name: "runtime.walltime", func: walltime::<[u8]> },
    Import { name: "runtime.scheduleCallback", func: schedule_callback::<[u8]> },
    Import { name: "runtime.clearScheduledCallback", func: clear_scheduled_callback::<[u8]> },
    Import { name: "runtime.getRandomData", func: get_random_data::<[u8]> },
    Import { name: "syscall/js.stringVal", func: string_val::<[u8]> },
    Import { name: "syscall/js.valueGet", func: value_get::<[u8]> },
    Import { name: "syscall/js.valueCall", func: value_call::<[u8]> },
    Import { name: "syscall/js.valueNew", func: value_new::<[u8]> },
    Import { name: "syscall/js.valuePrepareString", func: value_prepare_string::<[u8]> },
    Import { name: "syscall/js.valueLoadString", func: value_load_string::<[u8]> },
];

pub fn find(name: &str) -> Option<&'static Import> {
    IMPORTS.iter().find(|import| import.name == name)
}

fn at(sp: u32, offset: u64) -> u64 {
    sp as u64 + offset
}

/// `debug` hands over a raw value rather than a stack pointer.
pub fn debug_value<M: GuestMemory + ?Sized>(_: &mut Session, _: &mut M, value: u32) -> HostResult {
    debug!(value, "guest debug");
    Ok(())
}

pub fn schedule_callback<M: GuestMemory + ?Sized>(_: &mut Session, _: &mut M, sp: u32) -> HostResult {
    debug!(sp, "runtime.scheduleCallback ignored");
    Ok(())
}

pub fn clear_scheduled_callback<M: GuestMemory + ?Sized>(
    _: &mut Session,
    _: &mut M,
    sp: u32,
) -> HostResult {
    debug!(sp, "runtime.clearScheduledCallback ignored");
    Ok(())
}

pub fn wasm_exit<M: GuestMemory + ?Sized>(session: &mut Session, mem: &mut M, sp: u32) -> HostResult {
    let code = mem.read_i32(at(sp, 8))?;
    debug!(code, "runtime.wasmExit");
    session.terminate(code);
    Ok(())
}

pub fn wasm_write<M: GuestMemory + ?Sized>(session: &mut Session, mem: &mut M, sp: u32) -> HostResult {
    let fd = mem.read_i64(at(sp, 8))?;
    let bytes = mem.slice(at(sp, 16))?;
    trace!(fd, len = bytes.len(), "runtime.wasmWrite");
    let out = session.output();
    out.write_all(bytes)?;
    out.flush()?;
    Ok(())
}

pub fn nanotime<M: GuestMemory + ?Sized>(session: &mut Session, mem: &mut M, sp: u32) -> HostResult {
    mem.write_i64(at(sp, 8), session.elapsed_nanos())?;
    Ok(())
}

pub fn walltime<M: GuestMemory + ?Sized>(_: &mut Session, mem: &mut M, sp: u32) -> HostResult {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    mem.write_i64(at(sp, 8), now.as_secs() as i64)?;
    mem.write_i32(at(sp, 16), now.subsec_nanos() as i32)?;
    Ok(())
}

pub fn get_random_data<M: GuestMemory + ?Sized>(_: &mut Session, mem: &mut M, sp: u32) -> HostResult {
    let buf = mem.slice_mut(at(sp, 8))?;
    trace!(len = buf.len(), "runtime.getRandomData");
    getrandom::fill(buf)?;
    Ok(())
}

pub fn string_val<M: GuestMemory + ?Sized>(session: &mut Session, mem: &mut M, sp: u32) -> HostResult {
    let s = load_string(mem, at(sp, 8))?;
    store_value(session.values_mut(), mem, at(sp, 24), s)?;
    Ok(())
}

pub fn value_prepare_string<M: GuestMemory + ?Sized>(
    session: &mut Session,
    mem: &mut M,
    sp: u32,
) -> HostResult {
    let s = load_string(mem, at(sp, 8))?;
    let len = s.len() as i64;
    store_value(session.values_mut(), mem, at(sp, 16), s)?;
    mem.write_i64(at(sp, 24), len)?;
    Ok(())
}

pub fn value_load_string<M: GuestMemory + ?Sized>(
    session: &mut Session,
    mem: &mut M,
    sp: u32,
) -> HostResult {
    let value = load_value(session.values(), mem, at(sp, 8))?;
    let Some(s) = value.get().as_str() else {
        return Err(HostError::NotAString {
            id: value.id(),
            kind: value.get().kind(),
        });
    };
    let copied = store_slice(mem, at(sp, 16), s.as_bytes())?;
    trace!(id = %value.id(), copied, "syscall/js.valueLoadString");
    Ok(())
}

pub fn value_get<M: GuestMemory + ?Sized>(session: &mut Session, mem: &mut M, sp: u32) -> HostResult {
    let target = load_value(session.values(), mem, at(sp, 8))?;
    let name = load_string(mem, at(sp, 16))?;
    let source = target
        .get()
        .as_property_source()
        .ok_or_else(|| not_property_source(&target, &name))?;
    let result = source.property(&name);
    debug!(target = %target.id(), property = %name, "syscall/js.valueGet");
    store_value(session.values_mut(), mem, at(sp, 32), result)?;
    Ok(())
}

/// Looks the method up as a property and calls it. A missing or
/// non-callable method, or one that fails, is reported to the guest as an
/// error value with the ok flag cleared.
pub fn value_call<M: GuestMemory + ?Sized>(session: &mut Session, mem: &mut M, sp: u32) -> HostResult {
    let target = load_value(session.values(), mem, at(sp, 8))?;
    let name = load_string(mem, at(sp, 16))?;
    let source = target
        .get()
        .as_property_source()
        .ok_or_else(|| not_property_source(&target, &name))?;
    let args = load_slice_of_values(session.values(), mem, at(sp, 32))?;
    debug!(target = %target.id(), method = %name, argc = args.len(), "syscall/js.valueCall");

    let method = source.property(&name);
    let outcome = match method.host().as_function() {
        Some(func) => func.call(&args).map_err(JsError::new),
        None => Err(JsError::new(format!(
            "{}.{name} is not a function",
            target.get().kind()
        ))),
    };
    store_outcome(session, mem, sp, 56, outcome)
}

pub fn value_new<M: GuestMemory + ?Sized>(session: &mut Session, mem: &mut M, sp: u32) -> HostResult {
    let target = load_value(session.values(), mem, at(sp, 8))?;
    let args = load_slice_of_values(session.values(), mem, at(sp, 16))?;
    debug!(target = %target.id(), argc = args.len(), "syscall/js.valueNew");

    let outcome = match target.get().as_constructible() {
        Some(ctor) => Ok(SlotValue::Host(ctor.construct(&args))),
        None => Err(JsError::new(format!(
            "value {} of type {} is not a constructor",
            target.id(),
            target.get().kind()
        ))),
    };
    store_outcome(session, mem, sp, 40, outcome)
}

/// Writes a result slot at `sp + offset` and the ok flag right after it.
fn store_outcome<M: GuestMemory + ?Sized>(
    session: &mut Session,
    mem: &mut M,
    sp: u32,
    offset: u64,
    outcome: Result<SlotValue, JsError>,
) -> HostResult {
    let (value, ok) = match outcome {
        Ok(value) => (value, 1),
        Err(err) => {
            debug!(%err, "reporting error to guest");
            (SlotValue::from(HostObject::Error(err)), 0)
        }
    };
    store_value(session.values_mut(), mem, at(sp, offset), value)?;
    mem.write_u8(at(sp, offset + 8), ok)?;
    Ok(())
}

fn not_property_source(target: &Value, name: &str) -> HostError {
    HostError::NotPropertySource {
        id: target.id(),
        kind: target.get().kind(),
        property: name.to_string(),
    }
}
