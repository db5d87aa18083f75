//! Host side of the Go `js/wasm` guest ABI, run under wasmtime.
//!
//! The guest talks to its host through single-argument imports in the `go`
//! module. Each import reads its operands from guest memory at fixed offsets
//! from a stack pointer and writes results back the same way; values that
//! are not plain numbers travel as NaN-boxed handles into a per-session
//! table (see [`gojs_obj_model`]).

pub mod codec;
pub mod config;
pub mod error;
pub mod imports;
pub mod linker;
pub mod memory;
pub mod runner;
pub mod session;

pub use config::{CacheMode, HostConfig};
pub use error::{BootstrapError, GuestExit, HostError};
pub use linker::{HostState, add_to_linker};
pub use memory::{GuestMemory, MemoryError};
pub use runner::{ARGV_BASE, ARGV_LIMIT, run_module, write_argv};
pub use session::Session;
