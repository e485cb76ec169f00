use crate::vm::class_file::parse_class;
use crate::vm::class_loader::ClassRegistry;
use crate::vm::classes::ClassId;
use crate::vm::error::{LinkageError, Result, VmError};
use crate::vm::heap::{Heap, HeapPtr};
use crate::vm::natives::{builtin_registry, NativeFn};
use crate::vm::stack::{Frame, FrameStack};
use crate::vm::value::Value;
use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::Path;

const MAIN_DESCRIPTOR: &str = "([Ljava/lang/String;)V";

/// Where interpreted output goes: the process stdout for `run`, an
/// in-memory buffer for `start` so embedders and tests can read it back.
pub enum OutputSink {
    Stdout(io::Stdout),
    Captured(Vec<u8>),
}

impl Write for OutputSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputSink::Stdout(out) => out.write(buf),
            OutputSink::Captured(buf_out) => buf_out.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputSink::Stdout(out) => out.flush(),
            OutputSink::Captured(_) => Ok(()),
        }
    }
}

/// The virtual machine: loaded classes, heap, frame stack and the native
/// bridge. Single-threaded; `step` is the only suspension point, so a
/// host may interleave stepping with its own work freely.
pub struct Vm {
    pub(crate) classes: ClassRegistry,
    pub(crate) heap: Heap,
    pub(crate) frames: FrameStack,
    pub(crate) natives: HashMap<&'static str, NativeFn>,
    pub(crate) output: RefCell<OutputSink>,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    /// A fresh VM with the native registry pre-populated.
    pub fn new() -> Self {
        Self {
            classes: ClassRegistry::new(),
            heap: Heap::new(),
            frames: FrameStack::new(),
            natives: builtin_registry(),
            output: RefCell::new(OutputSink::Stdout(io::stdout())),
        }
    }

    /// Add a directory to the resolver search path.
    pub fn add_directory(&self, dir: impl AsRef<Path>) {
        self.classes.add_directory(dir.as_ref().to_path_buf());
    }

    /// Decode a class file from disk into the registry.
    pub fn load_class(&self, path: impl AsRef<Path>) -> Result<()> {
        let data = std::fs::read(path.as_ref())?;
        self.load_class_bytes(&data)
    }

    /// Decode an in-memory class file into the registry. The class is
    /// named by its own `this_class` entry.
    pub fn load_class_bytes(&self, data: &[u8]) -> Result<()> {
        let class = parse_class(data)?;
        self.classes.register(class);
        Ok(())
    }

    /// Register (or replace) a host-implemented native method.
    pub fn register_native(&mut self, name: &'static str, callback: NativeFn) {
        self.natives.insert(name, callback);
    }

    /// Locate `main`, seed the root frame and interpret to termination,
    /// writing to the process stdout.
    pub fn run(&mut self) -> Result<()> {
        *self.output.borrow_mut() = OutputSink::Stdout(io::stdout());
        self.seed_main()?;
        while !self.done() {
            self.step()?;
        }
        Ok(())
    }

    /// Like `run`, but only seeds the frames and captures output in an
    /// internal buffer; the host drives execution with `step`.
    pub fn start(&mut self) -> Result<()> {
        *self.output.borrow_mut() = OutputSink::Captured(Vec::new());
        self.seed_main()
    }

    /// Execute one instruction (or one native call) of the active frame.
    /// A no-op once the root frame is all that remains.
    pub fn step(&self) -> Result<()> {
        self.step_inner().map_err(|e| self.locate(e))
    }

    /// True when interpretation has terminated.
    pub fn done(&self) -> bool {
        self.frames.is_empty() || self.frames.top().root
    }

    /// The currently executing frame, for read-only inspection.
    pub fn active_frame(&self) -> Ref<Frame> {
        self.frames.top()
    }

    /// Output captured since `start`; `None` when running against stdout.
    pub fn captured_output(&self) -> Option<String> {
        match &*self.output.borrow() {
            OutputSink::Captured(buf) => Some(String::from_utf8_lossy(buf).into_owned()),
            OutputSink::Stdout(_) => None,
        }
    }

    /// Find the first loaded class declaring `main([Ljava/lang/String;)V`
    /// and push the root frame plus the main frame. The argument array is
    /// a single null placeholder; actual process arguments are not
    /// propagated.
    fn seed_main(&self) -> Result<()> {
        let main_class = self
            .classes
            .find(|c| c.method("main", MAIN_DESCRIPTOR).is_some())
            .ok_or(LinkageError::NoMainMethod)?;
        let class_name = self.classes.get(main_class).name().to_string();

        let root = Frame::root_frame();
        root.push(Value::Null);
        self.frames.push(root);
        self.invoke_exact(&class_name, "main", MAIN_DESCRIPTOR)
    }

    /// Wrap an interpreter error with the active position, once.
    fn locate(&self, err: VmError) -> VmError {
        if matches!(err, VmError::At { .. }) || self.frames.is_empty() {
            return err;
        }
        let frame = self.frames.top();
        let (class, method) = match (frame.class, frame.method) {
            (Some(c), Some(m)) => {
                let class = self.classes.get(c);
                (class.name().to_string(), class.methods[m].name.clone())
            }
            _ => return err,
        };
        let offset = frame.pc.borrow().current_offset();
        VmError::At {
            class,
            method,
            offset,
            source: Box::new(err),
        }
    }

    /// Build a `java/lang/String` instance backed by a byte array, the
    /// layout the `print` native and `ldc` of string constants share.
    pub(crate) fn new_java_string(&self, contents: &str) -> Result<HeapPtr> {
        let string_class = self.classes.resolve("java/lang/String")?;
        let ptr = self.heap.new_object(Some(string_class));
        let bytes: Vec<Value> = contents.bytes().map(Value::Byte).collect();
        let count = bytes.len();
        let array = self.heap.new_array(None, bytes);
        self.heap
            .set_object_field(ptr, "value", Value::Array(array))?;
        self.heap
            .set_object_field(ptr, "count", Value::Int(count as i32))?;
        Ok(ptr)
    }

    /// Read back the byte array behind a string object.
    pub(crate) fn java_string(&self, ptr: HeapPtr) -> Result<String> {
        use crate::vm::error::ExecutionError;
        use crate::vm::value::Type;
        let value = self.heap.object_field(ptr, "value", Type::Reference)?;
        let array = match value {
            Value::Array(array) => array,
            _ => {
                return Err(ExecutionError::TypeMismatch {
                    expected: "string object",
                }
                .into())
            }
        };
        let len = self.heap.array_len(array)?;
        let mut bytes = Vec::with_capacity(len);
        for i in 0..len {
            match self.heap.array_get(array, i as i32)? {
                Value::Byte(b) => bytes.push(b),
                Value::Int(v) => bytes.push(v as u8),
                _ => {
                    return Err(ExecutionError::TypeMismatch {
                        expected: "string object",
                    }
                    .into())
                }
            }
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Name of the runtime class behind a reference, for diagnostics and
    /// dispatch.
    pub(crate) fn class_name_of(&self, ptr: HeapPtr) -> Result<String> {
        use crate::vm::error::ExecutionError;
        let id = self
            .heap
            .class_of(ptr)
            .ok_or(ExecutionError::Internal("reference without a class"))?;
        Ok(self.classes.get(id).name().to_string())
    }

    /// True when `child` is `parent` or a transitive subclass of it. The
    /// walk follows the super-class chain only; declared interfaces are
    /// not consulted.
    pub(crate) fn implements(&self, child: ClassId, parent: ClassId) -> Result<bool> {
        let parent_name = self.classes.get(parent).name().to_string();
        let mut current = child;
        loop {
            let (name, super_name) = {
                let class = self.classes.get(current);
                (
                    class.name().to_string(),
                    class.super_name().map(str::to_string),
                )
            };
            if name == parent_name {
                return Ok(true);
            }
            match super_name {
                Some(super_name) if name != "java/lang/Object" => {
                    current = self.classes.resolve(&super_name)?;
                }
                _ => return Ok(false),
            }
        }
    }
}
