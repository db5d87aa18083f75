use std::io;

use gojs_obj_model::Ref;
use thiserror::Error;

use crate::memory::MemoryError;

/// Fatal failure of a host call. Any of these ends the guest session.
#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error("value {id} of type {kind} has no properties (wanted {property:?})")]
    NotPropertySource {
        id: Ref,
        kind: &'static str,
        property: String,
    },

    #[error("value {id} of type {kind} is not a string")]
    NotAString { id: Ref, kind: &'static str },

    #[error("writing guest output: {0}")]
    Output(#[from] io::Error),

    #[error("filling guest buffer with random bytes: {0}")]
    Entropy(#[from] getrandom::Error),
}

/// Raised out of the executor when the guest calls `runtime.wasmExit`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("guest exited with code {code}")]
pub struct GuestExit {
    pub code: i32,
}

/// Failure laying out the guest's argv and environment.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error("command line and environment need guest memory up to {end:#x}, limit is {limit:#x}")]
    TooLarge { end: u64, limit: u64 },
}
