use std::fmt;
use std::io::{self, Write};
use std::time::Instant;

use gojs_obj_model::HandleTable;

/// Everything one guest run owns: its handle table, its clock origin, the
/// stream its writes go to, and whether it has asked to stop.
pub struct Session {
    values: HandleTable,
    time_origin: Instant,
    output: Box<dyn Write + Send>,
    exit_code: Option<i32>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }

    pub fn with_output(output: impl Write + Send + 'static) -> Self {
        Self {
            values: HandleTable::new(),
            time_origin: Instant::now(),
            output: Box::new(output),
            exit_code: None,
        }
    }

    pub fn values(&self) -> &HandleTable {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut HandleTable {
        &mut self.values
    }

    pub fn output(&mut self) -> &mut dyn Write {
        &mut *self.output
    }

    pub fn elapsed_nanos(&self) -> i64 {
        i64::try_from(self.time_origin.elapsed().as_nanos()).unwrap_or(i64::MAX)
    }

    /// First code wins.
    pub fn terminate(&mut self, code: i32) {
        self.exit_code.get_or_insert(code);
    }

    pub fn is_terminated(&self) -> bool {
        self.exit_code.is_some()
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("handles", &self.values.len())
            .field("exit_code", &self.exit_code)
            .finish_non_exhaustive()
    }
}
