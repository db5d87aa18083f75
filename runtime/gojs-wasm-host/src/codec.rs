//! Moves values between guest slots and the session's handle table.

use gojs_obj_model::{HandleTable, HostValue, Ref, Slot, SlotValue, TypeFlag, Value};
use tracing::trace;

use crate::memory::{GuestMemory, MemoryError};

/// Encodes `value` into the 8-byte slot at `addr`, minting a handle if the
/// datum has never crossed the boundary.
pub fn store_value<M>(
    table: &mut HandleTable,
    mem: &mut M,
    addr: u64,
    value: impl Into<SlotValue>,
) -> Result<(), MemoryError>
where
    M: GuestMemory + ?Sized,
{
    let slot = match value.into() {
        SlotValue::Value(existing) => {
            // Shorthand payloads for the two absent values: only the low word
            // is written, the guest reads it as a zero-tagged reference.
            if existing.id() == Ref::UNDEFINED {
                trace!(addr, "store undefined");
                return mem.write_u32(addr, 0);
            }
            if existing.id() == Ref::NULL {
                trace!(addr, "store null");
                return mem.write_u32(addr, 1);
            }
            Slot::boxed(existing.id(), existing.get().type_flag())
        }
        SlotValue::Host(host) => match host {
            HostValue::Number(n) => Slot::from_float(n),
            HostValue::NaN => Slot::nan(),
            HostValue::Null => Slot::boxed(Ref::NULL, TypeFlag::Object),
            HostValue::Bool(true) => Slot::boxed(Ref::TRUE, TypeFlag::Object),
            HostValue::Bool(false) => Slot::boxed(Ref::FALSE, TypeFlag::Object),
            HostValue::Undefined => {
                let undefined = table.undefined().clone();
                return store_value(table, mem, addr, undefined);
            }
            HostValue::Memory => Slot::boxed(Ref::MEMORY, TypeFlag::Object),
            HostValue::Instance => Slot::boxed(Ref::INSTANCE, TypeFlag::Object),
            host @ (HostValue::String(_) | HostValue::Function(_) | HostValue::Object(_)) => {
                let flag = host.type_flag();
                let id = table.intern(host);
                Slot::boxed(id, flag)
            }
        },
    };
    trace!(addr, bits = slot.bits(), "store slot");
    mem.write_bytes(addr, &slot.to_le_bytes())
}

/// Reads the handle word at `addr` and resolves it.
pub fn load_value<M>(table: &HandleTable, mem: &M, addr: u64) -> Result<Value, MemoryError>
where
    M: GuestMemory + ?Sized,
{
    let id = Ref::new(mem.read_u32(addr)?);
    trace!(addr, %id, "load value");
    Ok(table.lookup(id).clone())
}

/// Reads a whole slot: plain doubles come back as numbers, anything boxed
/// is resolved through the table.
pub fn load_slot<M>(table: &HandleTable, mem: &M, addr: u64) -> Result<SlotValue, MemoryError>
where
    M: GuestMemory + ?Sized,
{
    let slot = Slot::from_bits(mem.read_u64(addr)?);
    match slot.as_float() {
        Some(n) => Ok(SlotValue::Host(HostValue::Number(n))),
        None => Ok(SlotValue::Value(table.lookup(Ref::new(slot.payload())).clone())),
    }
}

/// Reads a `(ptr, len)` header at `addr` naming `len` consecutive 4-byte
/// handles and resolves each of them.
pub fn load_slice_of_values<M>(
    table: &HandleTable,
    mem: &M,
    addr: u64,
) -> Result<Vec<Value>, MemoryError>
where
    M: GuestMemory + ?Sized,
{
    let (array_addr, len) = mem.slice_header(addr)?;
    let byte_len = len.checked_mul(4).ok_or(MemoryError {
        offset: array_addr,
        len,
        size: mem.size(),
    })?;
    let raw = mem.span(array_addr, byte_len)?;
    Ok(raw
        .chunks_exact(4)
        .map(|word| {
            let id = Ref::new(u32::from_le_bytes([word[0], word[1], word[2], word[3]]));
            table.lookup(id).clone()
        })
        .collect())
}

/// Reads the span described at `addr` as text. Invalid UTF-8 is replaced
/// rather than rejected, as a JS `TextDecoder` would.
pub fn load_string<M>(mem: &M, addr: u64) -> Result<String, MemoryError>
where
    M: GuestMemory + ?Sized,
{
    let bytes = mem.slice(addr)?;
    let s = String::from_utf8_lossy(bytes).into_owned();
    trace!(addr, len = s.len(), "load string");
    Ok(s)
}

/// Copies `bytes` over the span described at `addr`; extra bytes on either
/// side are left alone.
pub fn store_slice<M>(mem: &mut M, addr: u64, bytes: &[u8]) -> Result<usize, MemoryError>
where
    M: GuestMemory + ?Sized,
{
    let dst = mem.slice_mut(addr)?;
    let n = dst.len().min(bytes.len());
    dst[..n].copy_from_slice(&bytes[..n]);
    Ok(n)
}
