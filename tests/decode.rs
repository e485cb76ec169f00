//! Decoder round-trips over builder-produced class files.
mod support;

use demitasse::vm::class_file::parse_class;
use demitasse::vm::classes::AccessFlags;
use demitasse::vm::constant_pool::ConstantPoolEntry;
use demitasse::vm::opcodes::{Mnemonic, ProgramCounter};
use demitasse::vm::value::{Type, Value};
use support::*;

fn sample_class() -> Vec<u8> {
    let mut b = ClassFileBuilder::new("Sample", Some("java/lang/Object"));
    b.native_method(ACC_PUBLIC | ACC_STATIC, "printInt", "(I)V");
    b.field(ACC_PUBLIC | ACC_STATIC, "counter", "I");
    b.field(ACC_PUBLIC, "next", "Ljava/lang/Object;");
    let print_int = b.method_ref("Sample", "printInt", "(I)V");
    let counter = b.field_ref("Sample", "counter", "I");
    let greeting = b.string("hi");
    let big = b.long(1 << 40);

    let mut code = Vec::new();
    code.extend([LDC, greeting as u8, POP]);
    code.extend(with_u16(LDC2_W, big));
    code.push(POP);
    code.extend(with_u16(GETSTATIC, counter));
    code.extend(with_u16(INVOKESTATIC, print_int));
    code.push(RETURN);
    b.method(ACC_PUBLIC | ACC_STATIC, "main", "([Ljava/lang/String;)V", 2, 1, code);
    b.build()
}

#[test]
fn decoded_shape_matches_the_builder() {
    let class = parse_class(&sample_class()).unwrap();
    assert_eq!(class.name(), "Sample");
    assert_eq!(class.super_name(), Some("java/lang/Object"));
    assert_eq!(class.major_version, 52);
    assert!(class.flags.contains(AccessFlags::PUBLIC));
    assert!(!class.initialised);

    assert_eq!(class.fields.len(), 2);
    assert_eq!(class.fields[0].name, "counter");
    assert_eq!(class.fields[0].value_type, Type::Int);
    assert_eq!(class.fields[0].value, Value::Int(0));
    assert_eq!(class.fields[1].value_type, Type::Reference);
    assert_eq!(class.fields[1].value, Value::Null);

    let (_, print_int) = class.method("printInt", "(I)V").unwrap();
    assert!(print_int.is_native());
    assert!(print_int.code.is_none());
    assert_eq!(print_int.signature, vec![Type::Int, Type::Void]);

    let (_, main) = class.method("main", "([Ljava/lang/String;)V").unwrap();
    let code = main.code.as_ref().unwrap();
    assert_eq!(code.max_stack, 2);
    assert_eq!(code.max_locals, 1);
    assert_eq!(main.signature, vec![Type::Reference, Type::Void]);
}

#[test]
fn two_decodes_are_structurally_equal() {
    let bytes = sample_class();
    let first = parse_class(&bytes).unwrap();
    let second = parse_class(&bytes).unwrap();
    assert_eq!(first, second);
}

#[test]
fn constant_pool_dump_survives_a_redecode() {
    let bytes = sample_class();
    let first = parse_class(&bytes).unwrap();
    let dump = first.constant_pool.to_string();
    // one line per slot past the unused zeroth
    assert_eq!(dump.lines().count(), first.constant_pool.len() - 1);
    assert!(dump.contains("(methodref)"));
    assert!(dump.contains("(long)"));

    let second = parse_class(&bytes).unwrap();
    assert_eq!(first.constant_pool, second.constant_pool);
    assert_eq!(dump, second.constant_pool.to_string());
}

#[test]
fn wide_constants_use_a_sentinel_slot() {
    let class = parse_class(&sample_class()).unwrap();
    let pool = &class.constant_pool;
    let long_at = pool
        .entries()
        .iter()
        .position(|e| matches!(e, ConstantPoolEntry::Long(_)))
        .unwrap();
    assert_eq!(pool.entries()[long_at], ConstantPoolEntry::Long(1 << 40));
    assert_eq!(pool.entries()[long_at + 1], ConstantPoolEntry::WidePart2);
}

#[test]
fn instruction_operands_index_entries_of_the_expected_kind() {
    let class = parse_class(&sample_class()).unwrap();
    let (_, main) = class.method("main", "([Ljava/lang/String;)V").unwrap();
    let code = main.code.as_ref().unwrap();
    let mut pc = ProgramCounter::new(&code.bytes).unwrap();
    for op in pc.ops().to_vec() {
        match op.mnemonic {
            Mnemonic::Ldc => {
                assert!(class.constant_pool.get(op.u8() as u16).is_ok());
            }
            Mnemonic::Ldc2W => {
                assert!(matches!(
                    class.constant_pool.get(op.u16()),
                    Ok(ConstantPoolEntry::Long(_) | ConstantPoolEntry::Double(_))
                ));
            }
            Mnemonic::Getstatic => {
                assert!(class.constant_pool.field_ref(op.u16()).is_ok());
            }
            Mnemonic::Invokestatic => {
                assert!(class.constant_pool.method_ref(op.u16()).is_ok());
            }
            _ => {}
        }
    }
    // the cursor itself still walks the stream
    while pc.next().is_ok() {}
}

#[test]
fn exception_table_resolves_catch_classes_at_decode_time() {
    let mut b = ClassFileBuilder::new("Thrower", Some("java/lang/Object"));
    let e_class = b.class("E");
    b.method_with_handlers(
        ACC_PUBLIC | ACC_STATIC,
        "run",
        "()V",
        1,
        0,
        vec![RETURN],
        &[(0, 1, 0, e_class), (0, 1, 0, 0)],
    );
    let class = parse_class(&b.build()).unwrap();
    let (_, run) = class.method("run", "()V").unwrap();
    let handlers = &run.code.as_ref().unwrap().handlers;
    assert_eq!(handlers.len(), 2);
    assert_eq!(handlers[0].class_name.as_deref(), Some("E"));
    assert_eq!(handlers[0].catch_type, e_class);
    assert_eq!(handlers[1].class_name, None);
    assert_eq!(handlers[1].catch_type, 0);
    assert!(handlers[0].covers(0));
    assert!(!handlers[0].covers(1));
}

#[test]
fn root_class_has_no_super() {
    let class = parse_class(&object_class()).unwrap();
    assert_eq!(class.name(), "java/lang/Object");
    assert_eq!(class.super_name(), None);
    assert_eq!(class.super_class, 0);
}
