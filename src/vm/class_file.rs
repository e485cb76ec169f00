//! Decoder for the class-file binary format: big-endian, starting with
//! the magic word `0xCAFEBABE`. Only the constant pool, fields, methods
//! and `Code` attributes are materialized; every other attribute is
//! skipped by its declared length.
use crate::vm::classes::{
    parse_field_type, parse_signature, AccessFlags, Class, Code, ExceptionHandler, Field, Method,
};
use crate::vm::constant_pool::{ConstantPool, ConstantPoolEntry};
use crate::vm::error::FormatError;
use byteorder::{BigEndian, ReadBytesExt};
use log::trace;
use std::io::{Cursor, Read};

const MAGIC: u32 = 0xCAFE_BABE;

/// Big-endian primitive reads over the class-file bytes. Reading past the
/// end surfaces as `FormatError::Truncated`.
struct ClassReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> ClassReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    fn u1(&mut self) -> Result<u8, FormatError> {
        self.cursor.read_u8().map_err(|_| FormatError::Truncated)
    }

    fn u2(&mut self) -> Result<u16, FormatError> {
        self.cursor
            .read_u16::<BigEndian>()
            .map_err(|_| FormatError::Truncated)
    }

    fn u4(&mut self) -> Result<u32, FormatError> {
        self.cursor
            .read_u32::<BigEndian>()
            .map_err(|_| FormatError::Truncated)
    }

    fn u8(&mut self) -> Result<u64, FormatError> {
        self.cursor
            .read_u64::<BigEndian>()
            .map_err(|_| FormatError::Truncated)
    }

    fn bytes(&mut self, count: usize) -> Result<Vec<u8>, FormatError> {
        let mut buf = vec![0u8; count];
        self.cursor
            .read_exact(&mut buf)
            .map_err(|_| FormatError::Truncated)?;
        Ok(buf)
    }

    fn skip(&mut self, count: u32) -> Result<(), FormatError> {
        self.bytes(count as usize).map(|_| ())
    }
}

/// Decode one class file. Two decodes of the same bytes yield structurally
/// equal classes.
pub fn parse_class(data: &[u8]) -> Result<Class, FormatError> {
    let mut r = ClassReader::new(data);
    let magic = r.u4()?;
    if magic != MAGIC {
        return Err(FormatError::BadMagic(magic));
    }
    let minor_version = r.u2()?;
    let major_version = r.u2()?;

    let cp_count = r.u2()?;
    let pool = parse_constant_pool(&mut r, cp_count)?;

    let flags = AccessFlags::from_bits_truncate(r.u2()?);
    let this_class = r.u2()?;
    let super_class = r.u2()?;

    let interface_count = r.u2()?;
    let mut interfaces = Vec::with_capacity(interface_count as usize);
    for _ in 0..interface_count {
        interfaces.push(r.u2()?);
    }

    let field_count = r.u2()?;
    let mut fields = Vec::with_capacity(field_count as usize);
    for _ in 0..field_count {
        fields.push(parse_field(&mut r, &pool)?);
    }

    let method_count = r.u2()?;
    let mut methods = Vec::with_capacity(method_count as usize);
    for _ in 0..method_count {
        methods.push(parse_method(&mut r, &pool)?);
    }

    // trailing class-level attributes are skipped bit-for-bit
    skip_attributes(&mut r)?;

    let name = pool_class_name(&pool, this_class)?.to_string();
    let super_name = if super_class == 0 {
        None
    } else {
        Some(pool_class_name(&pool, super_class)?.to_string())
    };
    trace!("decoded class {} (super {:?})", name, super_name);

    Ok(Class::new(
        minor_version,
        major_version,
        pool,
        flags,
        this_class,
        super_class,
        interfaces,
        fields,
        methods,
        name,
        super_name,
    ))
}

fn parse_constant_pool(r: &mut ClassReader, cp_count: u16) -> Result<ConstantPool, FormatError> {
    // index 0 is unused; entries run from 1 to cp_count - 1
    let mut entries = vec![ConstantPoolEntry::Unused];
    let mut i = 1u16;
    while cp_count > 0 && i < cp_count {
        let tag = r.u1()?;
        let entry = match tag {
            1 => {
                let length = r.u2()?;
                let bytes = r.bytes(length as usize)?;
                ConstantPoolEntry::Utf8(String::from_utf8(bytes)?)
            }
            3 => ConstantPoolEntry::Integer(r.u4()? as i32),
            4 => ConstantPoolEntry::Float(f32::from_bits(r.u4()?)),
            5 => ConstantPoolEntry::Long(r.u8()? as i64),
            6 => ConstantPoolEntry::Double(f64::from_bits(r.u8()?)),
            7 => ConstantPoolEntry::ClassInfo { name_index: r.u2()? },
            8 => ConstantPoolEntry::StringRef { utf8_index: r.u2()? },
            9 => ConstantPoolEntry::FieldRef {
                class_index: r.u2()?,
                name_and_type_index: r.u2()?,
            },
            10 => ConstantPoolEntry::MethodRef {
                class_index: r.u2()?,
                name_and_type_index: r.u2()?,
            },
            11 => ConstantPoolEntry::InterfaceMethodRef {
                class_index: r.u2()?,
                name_and_type_index: r.u2()?,
            },
            12 => ConstantPoolEntry::NameAndType {
                name_index: r.u2()?,
                descriptor_index: r.u2()?,
            },
            15 => ConstantPoolEntry::MethodHandle {
                reference_kind: r.u1()?,
                reference_index: r.u2()?,
            },
            16 => ConstantPoolEntry::MethodType {
                descriptor_index: r.u2()?,
            },
            18 => ConstantPoolEntry::InvokeDynamic {
                bootstrap_method_attr_index: r.u2()?,
                name_and_type_index: r.u2()?,
            },
            other => return Err(FormatError::UnknownTag(other)),
        };
        let wide = matches!(
            entry,
            ConstantPoolEntry::Long(_) | ConstantPoolEntry::Double(_)
        );
        entries.push(entry);
        if wide {
            // wide constants occupy two slots; the second is a sentinel
            entries.push(ConstantPoolEntry::WidePart2);
            i += 2;
        } else {
            i += 1;
        }
    }
    Ok(ConstantPool::new(entries))
}

fn pool_utf8<'p>(pool: &'p ConstantPool, index: u16, expected: &'static str) -> Result<&'p str, FormatError> {
    pool.utf8(index)
        .map_err(|_| FormatError::BadIndex { index, expected })
}

fn pool_class_name<'p>(pool: &'p ConstantPool, index: u16) -> Result<&'p str, FormatError> {
    pool.class_name(index).map_err(|_| FormatError::BadIndex {
        index,
        expected: "class info",
    })
}

fn parse_field(r: &mut ClassReader, pool: &ConstantPool) -> Result<Field, FormatError> {
    let flags = AccessFlags::from_bits_truncate(r.u2()?);
    let name_index = r.u2()?;
    let descriptor_index = r.u2()?;
    skip_attributes(r)?;

    let name = pool_utf8(pool, name_index, "field name")?.to_string();
    let descriptor = pool_utf8(pool, descriptor_index, "field descriptor")?.to_string();
    let value_type = parse_field_type(&descriptor)?;
    Ok(Field {
        name,
        value: value_type.zero_value(),
        value_type,
        descriptor,
        flags,
    })
}

fn parse_method(r: &mut ClassReader, pool: &ConstantPool) -> Result<Method, FormatError> {
    let flags = AccessFlags::from_bits_truncate(r.u2()?);
    let name_index = r.u2()?;
    let descriptor_index = r.u2()?;

    let name = pool_utf8(pool, name_index, "method name")?.to_string();
    let descriptor = pool_utf8(pool, descriptor_index, "method descriptor")?.to_string();
    let signature = parse_signature(&descriptor)?;

    let mut code = None;
    let attr_count = r.u2()?;
    for _ in 0..attr_count {
        let attr_name_index = r.u2()?;
        let length = r.u4()?;
        let attr_name = pool_utf8(pool, attr_name_index, "attribute name")?;
        if attr_name == "Code" {
            code = Some(parse_code(r, pool)?);
        } else {
            r.skip(length)?;
        }
    }

    Ok(Method {
        name,
        descriptor,
        signature,
        flags,
        code,
    })
}

fn parse_code(r: &mut ClassReader, pool: &ConstantPool) -> Result<Code, FormatError> {
    let max_stack = r.u2()?;
    let max_locals = r.u2()?;
    let code_length = r.u4()?;
    let bytes = r.bytes(code_length as usize)?;

    let handler_count = r.u2()?;
    let mut handlers = Vec::with_capacity(handler_count as usize);
    for _ in 0..handler_count {
        let start = r.u2()?;
        let end = r.u2()?;
        let handler = r.u2()?;
        let catch_type = r.u2()?;
        let class_name = if catch_type == 0 {
            None
        } else {
            Some(pool_class_name(pool, catch_type)?.to_string())
        };
        handlers.push(ExceptionHandler {
            start,
            end,
            handler,
            catch_type,
            class_name,
        });
    }

    // attributes nested inside Code (line tables etc.) are skipped
    skip_attributes(r)?;

    Ok(Code {
        max_stack,
        max_locals,
        bytes,
        handlers,
    })
}

fn skip_attributes(r: &mut ClassReader) -> Result<(), FormatError> {
    let count = r.u2()?;
    for _ in 0..count {
        let _name_index = r.u2()?;
        let length = r.u4()?;
        r.skip(length)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_magic_is_refused() {
        let err = parse_class(&[0xde, 0xad, 0xbe, 0xef, 0, 0, 0, 52]).unwrap_err();
        assert!(matches!(err, FormatError::BadMagic(0xdeadbeef)));
    }

    #[test]
    fn truncation_is_refused() {
        assert!(matches!(
            parse_class(&[0xca, 0xfe]),
            Err(FormatError::Truncated)
        ));
        assert!(matches!(
            parse_class(&[0xca, 0xfe, 0xba, 0xbe, 0, 0]),
            Err(FormatError::Truncated)
        ));
    }

    #[test]
    fn unknown_constant_tag_is_fatal() {
        // magic, versions, cp_count 2, then a bogus tag
        let data = [0xca, 0xfe, 0xba, 0xbe, 0, 0, 0, 52, 0, 2, 99];
        assert!(matches!(
            parse_class(&data),
            Err(FormatError::UnknownTag(99))
        ));
    }
}
