use crate::vm::constant_pool::ConstantPool;
use crate::vm::error::FormatError;
use crate::vm::value::{Type, Value};
use bitflags::bitflags;

bitflags! {
    #[derive(Default)]
    pub struct AccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const NATIVE = 0x0100;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
    }
}

pub type ClassId = usize;

/// One entry of a method's exception table. The byte range [start, end)
/// is relative to the owning code block; `handler` is the absolute byte
/// index of the first handler instruction. `catch_type` 0 catches
/// anything; otherwise `class_name` holds the catch class resolved from
/// the pool at decode time.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionHandler {
    pub start: u16,
    pub end: u16,
    pub handler: u16,
    pub catch_type: u16,
    pub class_name: Option<String>,
}

impl ExceptionHandler {
    pub fn covers(&self, byte_index: usize) -> bool {
        byte_index >= self.start as usize && byte_index < self.end as usize
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub bytes: Vec<u8>,
    pub handlers: Vec<ExceptionHandler>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub name: String,
    /// The raw descriptor string, e.g. `(I)V`.
    pub descriptor: String,
    /// Parsed argument kinds followed by the return kind.
    pub signature: Vec<Type>,
    pub flags: AccessFlags,
    /// Absent for native and abstract methods.
    pub code: Option<Code>,
}

impl Method {
    pub fn is_static(&self) -> bool {
        self.flags.contains(AccessFlags::STATIC)
    }

    pub fn is_native(&self) -> bool {
        self.flags.contains(AccessFlags::NATIVE)
    }

    /// Argument count, not counting the receiver.
    pub fn num_args(&self) -> usize {
        self.signature.len() - 1
    }

    pub fn return_type(&self) -> Type {
        self.signature[self.signature.len() - 1]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub descriptor: String,
    pub value_type: Type,
    pub flags: AccessFlags,
    /// The shared slot for static fields; unused for instance fields,
    /// whose values live per-object on the heap.
    pub value: Value,
}

/// An in-memory class: the decoder's output and the unit the loader
/// registers. Mutable only through the `initialised` flag and the static
/// field slots; alive for the process lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct Class {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub flags: AccessFlags,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub initialised: bool,
    name: String,
    super_name: Option<String>,
}

impl Class {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        minor_version: u16,
        major_version: u16,
        constant_pool: ConstantPool,
        flags: AccessFlags,
        this_class: u16,
        super_class: u16,
        interfaces: Vec<u16>,
        fields: Vec<Field>,
        methods: Vec<Method>,
        name: String,
        super_name: Option<String>,
    ) -> Self {
        Self {
            minor_version,
            major_version,
            constant_pool,
            flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            initialised: false,
            name,
            super_name,
        }
    }

    /// Binary name, e.g. `java/lang/String`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Binary name of the super class; `None` only for the root class.
    pub fn super_name(&self) -> Option<&str> {
        self.super_name.as_deref()
    }

    /// First method matching both name and descriptor, with its index.
    pub fn method(&self, name: &str, descriptor: &str) -> Option<(usize, &Method)> {
        self.methods
            .iter()
            .enumerate()
            .find(|(_, m)| m.name == name && m.descriptor == descriptor)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.iter().any(|m| m.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.name == name)
    }
}

/// Decode a field descriptor into its kind. Arrays and class references
/// both collapse to `Type::Reference`.
pub fn parse_field_type(descriptor: &str) -> Result<Type, FormatError> {
    let bad = || FormatError::BadDescriptor(descriptor.to_string());
    match descriptor.as_bytes().first().ok_or_else(bad)? {
        b'B' => Ok(Type::Byte),
        b'C' => Ok(Type::Char),
        b'D' => Ok(Type::Double),
        b'F' => Ok(Type::Float),
        b'I' => Ok(Type::Int),
        b'J' => Ok(Type::Long),
        b'S' => Ok(Type::Short),
        b'Z' => Ok(Type::Boolean),
        b'[' => Ok(Type::Reference),
        b'L' if descriptor.ends_with(';') => Ok(Type::Reference),
        _ => Err(bad()),
    }
}

/// Decode a method descriptor into the ordered argument kinds followed by
/// the return kind. `L<name>;` emits one `Reference` token; `[` continues
/// an array dimension and emits nothing of its own.
pub fn parse_signature(descriptor: &str) -> Result<Vec<Type>, FormatError> {
    let bad = || FormatError::BadDescriptor(descriptor.to_string());
    if !descriptor.starts_with('(') {
        return Err(bad());
    }
    let mut kinds = Vec::new();
    let mut closed = false;
    let mut chars = descriptor[1..].chars();
    while let Some(c) = chars.next() {
        let kind = match c {
            ')' => {
                if closed {
                    return Err(bad());
                }
                closed = true;
                continue;
            }
            '[' => continue,
            'B' => Type::Byte,
            'C' => Type::Char,
            'D' => Type::Double,
            'F' => Type::Float,
            'I' => Type::Int,
            'J' => Type::Long,
            'S' => Type::Short,
            'Z' => Type::Boolean,
            'V' => Type::Void,
            'L' => {
                // skip the class name up to the terminating ';'
                loop {
                    match chars.next() {
                        Some(';') => break,
                        Some(_) => continue,
                        None => return Err(bad()),
                    }
                }
                Type::Reference
            }
            _ => return Err(bad()),
        };
        kinds.push(kind);
        if closed {
            // the return kind is exactly one token
            if chars.next().is_some() {
                return Err(bad());
            }
            return Ok(kinds);
        }
    }
    // never saw ')' or never saw a return kind
    Err(bad())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_int_signature() {
        assert_eq!(
            parse_signature("(II)V").unwrap(),
            vec![Type::Int, Type::Int, Type::Void]
        );
    }

    #[test]
    fn references_and_arrays() {
        assert_eq!(
            parse_signature("(Ljava/lang/String;[I)Ljava/lang/Object;").unwrap(),
            vec![Type::Reference, Type::Int, Type::Reference]
        );
        assert_eq!(
            parse_signature("(J[[D)V").unwrap(),
            vec![Type::Long, Type::Double, Type::Void]
        );
        assert_eq!(
            parse_signature("([Ljava/lang/String;)V").unwrap(),
            vec![Type::Reference, Type::Void]
        );
    }

    #[test]
    fn malformed_signatures_are_rejected() {
        assert!(parse_signature("I)V").is_err());
        assert!(parse_signature("(I").is_err());
        assert!(parse_signature("(X)V").is_err());
        assert!(parse_signature("(Ljava/lang/String)V").is_err());
        assert!(parse_signature("(I)VV").is_err());
        assert!(parse_signature("(I)").is_err());
    }

    #[test]
    fn field_types() {
        assert_eq!(parse_field_type("I").unwrap(), Type::Int);
        assert_eq!(parse_field_type("[C").unwrap(), Type::Reference);
        assert_eq!(
            parse_field_type("Ljava/lang/Object;").unwrap(),
            Type::Reference
        );
        assert!(parse_field_type("Ljava/lang/Object").is_err());
        assert!(parse_field_type("Q").is_err());
        assert!(parse_field_type("").is_err());
    }
}
