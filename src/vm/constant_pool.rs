use crate::vm::error::ExecutionError;
use std::fmt;

/// One constant pool entry. The pool is a closed sum: every symbolic
/// reference an instruction can carry is one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantPoolEntry {
    /// Slot 0, which the class file format leaves unused.
    Unused,
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    ClassInfo {
        name_index: u16,
    },
    StringRef {
        utf8_index: u16,
    },
    FieldRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    MethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    InterfaceMethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    MethodHandle {
        reference_kind: u8,
        reference_index: u16,
    },
    MethodType {
        descriptor_index: u16,
    },
    InvokeDynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    /// Trailing slot of a long or double constant.
    WidePart2,
}

impl fmt::Display for ConstantPoolEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ConstantPoolEntry::*;
        match self {
            Unused => write!(f, "(unused)"),
            Utf8(s) => write!(f, "(utf8) {:?}", s),
            Integer(v) => write!(f, "(int) {}", v),
            Float(v) => write!(f, "(float) {}", v),
            Long(v) => write!(f, "(long) {}", v),
            Double(v) => write!(f, "(double) {}", v),
            ClassInfo { name_index } => write!(f, "(class) name: {}", name_index),
            StringRef { utf8_index } => write!(f, "(string) utf8: {}", utf8_index),
            FieldRef {
                class_index,
                name_and_type_index,
            } => write!(f, "(fieldref) class: {}, nat: {}", class_index, name_and_type_index),
            MethodRef {
                class_index,
                name_and_type_index,
            } => write!(f, "(methodref) class: {}, nat: {}", class_index, name_and_type_index),
            InterfaceMethodRef {
                class_index,
                name_and_type_index,
            } => write!(
                f,
                "(interfacemethodref) class: {}, nat: {}",
                class_index, name_and_type_index
            ),
            NameAndType {
                name_index,
                descriptor_index,
            } => write!(f, "(nameandtype) name: {}, descriptor: {}", name_index, descriptor_index),
            MethodHandle {
                reference_kind,
                reference_index,
            } => write!(f, "(methodhandle) kind: {}, index: {}", reference_kind, reference_index),
            MethodType { descriptor_index } => write!(f, "(methodtype) descriptor: {}", descriptor_index),
            InvokeDynamic {
                bootstrap_method_attr_index,
                name_and_type_index,
            } => write!(
                f,
                "(invokedynamic) bootstrap: {}, nat: {}",
                bootstrap_method_attr_index, name_and_type_index
            ),
            WidePart2 => write!(f, "(wide part 2)"),
        }
    }
}

/// The resolved names behind a field-ref, method-ref or
/// interface-method-ref entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolicRef {
    pub class_name: String,
    pub name: String,
    pub descriptor: String,
}

/// A class's constant pool, 1-indexed the way instructions index it.
/// Slot 0 holds [`ConstantPoolEntry::Unused`]; the slot after a long or
/// double holds [`ConstantPoolEntry::WidePart2`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConstantPool {
    entries: Vec<ConstantPoolEntry>,
}

impl ConstantPool {
    pub fn new(entries: Vec<ConstantPoolEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ConstantPoolEntry] {
        &self.entries
    }

    pub fn get(&self, index: u16) -> Result<&ConstantPoolEntry, ExecutionError> {
        match self.entries.get(index as usize) {
            Some(ConstantPoolEntry::Unused) | Some(ConstantPoolEntry::WidePart2) | None => {
                Err(ExecutionError::InvalidConstant {
                    index,
                    expected: "constant",
                })
            }
            Some(entry) => Ok(entry),
        }
    }

    pub fn utf8(&self, index: u16) -> Result<&str, ExecutionError> {
        match self.get(index)? {
            ConstantPoolEntry::Utf8(s) => Ok(s),
            _ => Err(ExecutionError::InvalidConstant {
                index,
                expected: "utf8 string",
            }),
        }
    }

    /// Follow a class-info entry to the class name it carries.
    pub fn class_name(&self, index: u16) -> Result<&str, ExecutionError> {
        match self.get(index)? {
            ConstantPoolEntry::ClassInfo { name_index } => self.utf8(*name_index),
            _ => Err(ExecutionError::InvalidConstant {
                index,
                expected: "class info",
            }),
        }
    }

    /// Follow a string-ref entry to its backing utf8 contents.
    pub fn string(&self, index: u16) -> Result<&str, ExecutionError> {
        match self.get(index)? {
            ConstantPoolEntry::StringRef { utf8_index } => self.utf8(*utf8_index),
            _ => Err(ExecutionError::InvalidConstant {
                index,
                expected: "string constant",
            }),
        }
    }

    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str), ExecutionError> {
        match self.get(index)? {
            ConstantPoolEntry::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            _ => Err(ExecutionError::InvalidConstant {
                index,
                expected: "name-and-type",
            }),
        }
    }

    pub fn field_ref(&self, index: u16) -> Result<SymbolicRef, ExecutionError> {
        match self.get(index)? {
            ConstantPoolEntry::FieldRef {
                class_index,
                name_and_type_index,
            } => self.symbolic(*class_index, *name_and_type_index),
            _ => Err(ExecutionError::InvalidConstant {
                index,
                expected: "field ref",
            }),
        }
    }

    pub fn method_ref(&self, index: u16) -> Result<SymbolicRef, ExecutionError> {
        match self.get(index)? {
            ConstantPoolEntry::MethodRef {
                class_index,
                name_and_type_index,
            } => self.symbolic(*class_index, *name_and_type_index),
            _ => Err(ExecutionError::InvalidConstant {
                index,
                expected: "method ref",
            }),
        }
    }

    pub fn interface_method_ref(&self, index: u16) -> Result<SymbolicRef, ExecutionError> {
        match self.get(index)? {
            ConstantPoolEntry::InterfaceMethodRef {
                class_index,
                name_and_type_index,
            } => self.symbolic(*class_index, *name_and_type_index),
            _ => Err(ExecutionError::InvalidConstant {
                index,
                expected: "interface method ref",
            }),
        }
    }

    fn symbolic(&self, class_index: u16, nat_index: u16) -> Result<SymbolicRef, ExecutionError> {
        let class_name = self.class_name(class_index)?.to_string();
        let (name, descriptor) = self.name_and_type(nat_index)?;
        Ok(SymbolicRef {
            class_name,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        })
    }
}

impl fmt::Display for ConstantPool {
    /// One line per slot, the dump the class-dump tooling prints.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate().skip(1) {
            writeln!(f, "{:4} {}", i, entry)?;
        }
        Ok(())
    }
}
