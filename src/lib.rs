pub mod vm;

pub use crate::vm::error::{ExecutionError, FormatError, LinkageError, Result, VmError};
pub use crate::vm::vm::Vm;
