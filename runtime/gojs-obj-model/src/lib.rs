//! Host-side object model for Go `js/wasm` guests.
//! Values cross the guest boundary as NaN-boxed 8-byte slots carrying either a
//! plain double or a 32-bit handle into a per-session table.

mod handle_table;
mod object;
mod slot;
mod value;

pub use handle_table::HandleTable;
pub use object::{
    ByteArray, ByteKind, Constructible, HostObject, JsArray, JsError, Namespace, PropertySource,
    global,
};
pub use slot::{NAN_HEAD, Slot, TypeFlag};
pub use value::{HostFunction, HostValue, Ref, SlotValue, Value};
