use thiserror::Error;

pub type Result<T> = std::result::Result<T, VmError>;

/// Umbrella error for everything the VM can surface to an embedder.
///
/// `Format` is recoverable by the caller of `load_class` (skip the file and
/// try the next candidate); `Linkage` and `Execution` abort interpretation.
#[derive(Error, Debug)]
pub enum VmError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Linkage(#[from] LinkageError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{class}.{method} at byte {offset}: {source}")]
    At {
        class: String,
        method: String,
        offset: usize,
        source: Box<VmError>,
    },
}

/// The decoder refuses a class file.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("could not read class file: {0}")]
    Io(#[from] std::io::Error),
    #[error("truncated class file")]
    Truncated,
    #[error("bad magic number 0x{0:08x}")]
    BadMagic(u32),
    #[error("unknown constant pool tag {0}")]
    UnknownTag(u8),
    #[error("malformed descriptor {0:?}")]
    BadDescriptor(String),
    #[error("constant pool index {index} does not name a {expected}")]
    BadIndex { index: u16, expected: &'static str },
    #[error("constant pool holds invalid utf8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// The resolver cannot find a class, method or field.
#[derive(Error, Debug)]
pub enum LinkageError {
    #[error("could not resolve class {0}")]
    ClassNotFound(String),
    #[error("could not resolve method {class}.{name}{descriptor}")]
    MethodNotFound {
        class: String,
        name: String,
        descriptor: String,
    },
    #[error("method {class}.{name} has no code")]
    AbstractMethod { class: String, name: String },
    #[error("could not resolve field {class}.{name}")]
    FieldNotFound { class: String, name: String },
    #[error("no loaded class declares main([Ljava/lang/String;)V")]
    NoMainMethod,
}

/// Byte code faulted the interpreter in a way it cannot recover from
/// locally. A verifier would have rejected most of these up front.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("cannot execute instruction 0x{0:02x}")]
    UnknownInstruction(u8),
    #[error("instruction stream ends inside an instruction")]
    TruncatedCode,
    #[error("ran off the end of the instruction stream")]
    EndOfCode,
    #[error("jump target {0} is not an instruction boundary")]
    BadJumpTarget(usize),
    #[error("pop from an empty operand stack")]
    StackUnderflow,
    #[error("expected {expected} on the operand stack")]
    TypeMismatch { expected: &'static str },
    #[error("constant pool entry {index} is not a {expected}")]
    InvalidConstant { index: u16, expected: &'static str },
    #[error("division by zero")]
    DivisionByZero,
    #[error("null reference in {0}")]
    NullPointer(&'static str),
    #[error("array index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i32, len: usize },
    #[error("negative array length {0}")]
    NegativeArrayLength(i32),
    #[error("cannot cast {from} to {to}")]
    ClassCast { from: String, to: String },
    #[error("no native method registered for {0}")]
    UnknownNative(String),
    #[error("unhandled exception: {0}")]
    UnhandledException(String),
    #[error("internal interpreter error: {0}")]
    Internal(&'static str),
}
