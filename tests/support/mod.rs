//! In-memory class-file builder for the integration tests: a small
//! constant-pool writer plus method/code assembly, emitting the same
//! big-endian layout the decoder consumes.
#![allow(dead_code)]

use demitasse::Vm;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_SUPER: u16 = 0x0020;
pub const ACC_NATIVE: u16 = 0x0100;

pub const NOP: u8 = 0;
pub const ACONST_NULL: u8 = 1;
pub const ICONST_0: u8 = 3;
pub const ICONST_1: u8 = 4;
pub const ICONST_2: u8 = 5;
pub const ICONST_3: u8 = 6;
pub const ICONST_4: u8 = 7;
pub const ICONST_5: u8 = 8;
pub const FCONST_2: u8 = 13;
pub const BIPUSH: u8 = 16;
pub const LDC: u8 = 18;
pub const LDC2_W: u8 = 20;
pub const ILOAD_1: u8 = 27;
pub const ILOAD_2: u8 = 28;
pub const ALOAD_0: u8 = 42;
pub const ALOAD_1: u8 = 43;
pub const ALOAD_2: u8 = 44;
pub const CALOAD: u8 = 52;
pub const ISTORE_1: u8 = 60;
pub const ISTORE_2: u8 = 61;
pub const ASTORE_1: u8 = 76;
pub const ASTORE_2: u8 = 77;
pub const CASTORE: u8 = 85;
pub const POP: u8 = 87;
pub const DUP: u8 = 89;
pub const IADD: u8 = 96;
pub const LADD: u8 = 97;
pub const FADD: u8 = 98;
pub const IINC: u8 = 132;
pub const IF_ICMPLE: u8 = 164;
pub const GOTO: u8 = 167;
pub const IRETURN: u8 = 172;
pub const ARETURN: u8 = 176;
pub const RETURN: u8 = 177;
pub const GETSTATIC: u8 = 178;
pub const PUTSTATIC: u8 = 179;
pub const GETFIELD: u8 = 180;
pub const PUTFIELD: u8 = 181;
pub const INVOKEVIRTUAL: u8 = 182;
pub const INVOKESPECIAL: u8 = 183;
pub const INVOKESTATIC: u8 = 184;
pub const NEW: u8 = 187;
pub const NEWARRAY: u8 = 188;
pub const ARRAYLENGTH: u8 = 190;
pub const ATHROW: u8 = 191;
pub const CHECKCAST: u8 = 192;
pub const INSTANCEOF: u8 = 193;

pub const T_BYTE: u8 = 8;

/// An instruction with a two-byte pool or branch operand.
pub fn with_u16(op: u8, operand: u16) -> [u8; 3] {
    [op, (operand >> 8) as u8, operand as u8]
}

#[derive(PartialEq)]
enum PoolEntry {
    Utf8(String),
    Class(u16),
    Str(u16),
    NameAndType(u16, u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    Int(i32),
    Long(i64),
    WideTail,
}

struct FieldDef {
    flags: u16,
    name: u16,
    descriptor: u16,
}

struct CodeDef {
    max_stack: u16,
    max_locals: u16,
    code: Vec<u8>,
    /// (start, end, handler, catch_type) with catch_type already a pool
    /// class index, or 0 for catch-any.
    handlers: Vec<(u16, u16, u16, u16)>,
}

struct MethodDef {
    flags: u16,
    name: u16,
    descriptor: u16,
    code: Option<CodeDef>,
}

pub struct ClassFileBuilder {
    pool: Vec<PoolEntry>,
    access: u16,
    this_class: u16,
    super_class: u16,
    fields: Vec<FieldDef>,
    methods: Vec<MethodDef>,
}

impl ClassFileBuilder {
    pub fn new(name: &str, super_name: Option<&str>) -> Self {
        let mut builder = Self {
            pool: Vec::new(),
            access: ACC_PUBLIC | ACC_SUPER,
            this_class: 0,
            super_class: 0,
            fields: Vec::new(),
            methods: Vec::new(),
        };
        builder.this_class = builder.class(name);
        builder.super_class = match super_name {
            Some(s) => builder.class(s),
            None => 0,
        };
        builder
    }

    fn push(&mut self, entry: PoolEntry) -> u16 {
        self.pool.push(entry);
        self.pool.len() as u16
    }

    fn intern(&mut self, entry: PoolEntry) -> u16 {
        match self.pool.iter().position(|e| *e == entry) {
            Some(i) => (i + 1) as u16,
            None => self.push(entry),
        }
    }

    pub fn utf8(&mut self, s: &str) -> u16 {
        self.intern(PoolEntry::Utf8(s.to_string()))
    }

    pub fn class(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        self.intern(PoolEntry::Class(name_index))
    }

    pub fn string(&mut self, s: &str) -> u16 {
        let utf8_index = self.utf8(s);
        self.intern(PoolEntry::Str(utf8_index))
    }

    pub fn int(&mut self, v: i32) -> u16 {
        self.intern(PoolEntry::Int(v))
    }

    /// Longs take two slots; the returned index names the first.
    pub fn long(&mut self, v: i64) -> u16 {
        let index = self.push(PoolEntry::Long(v));
        self.push(PoolEntry::WideTail);
        index
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.intern(PoolEntry::NameAndType(name_index, descriptor_index))
    }

    pub fn field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(class);
        let nat = self.name_and_type(name, descriptor);
        self.intern(PoolEntry::FieldRef(class_index, nat))
    }

    pub fn method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(class);
        let nat = self.name_and_type(name, descriptor);
        self.intern(PoolEntry::MethodRef(class_index, nat))
    }

    pub fn field(&mut self, flags: u16, name: &str, descriptor: &str) {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        self.fields.push(FieldDef {
            flags,
            name,
            descriptor,
        });
    }

    pub fn method(
        &mut self,
        flags: u16,
        name: &str,
        descriptor: &str,
        max_stack: u16,
        max_locals: u16,
        code: Vec<u8>,
    ) {
        self.method_with_handlers(flags, name, descriptor, max_stack, max_locals, code, &[]);
    }

    pub fn method_with_handlers(
        &mut self,
        flags: u16,
        name: &str,
        descriptor: &str,
        max_stack: u16,
        max_locals: u16,
        code: Vec<u8>,
        handlers: &[(u16, u16, u16, u16)],
    ) {
        self.utf8("Code");
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        self.methods.push(MethodDef {
            flags,
            name,
            descriptor,
            code: Some(CodeDef {
                max_stack,
                max_locals,
                code,
                handlers: handlers.to_vec(),
            }),
        });
    }

    /// A method whose body the host supplies.
    pub fn native_method(&mut self, flags: u16, name: &str, descriptor: &str) {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        self.methods.push(MethodDef {
            flags: flags | ACC_NATIVE,
            name,
            descriptor,
            code: None,
        });
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_u4(&mut out, 0xCAFEBABE);
        write_u2(&mut out, 0); // minor
        write_u2(&mut out, 52); // major

        write_u2(&mut out, self.pool.len() as u16 + 1);
        for entry in &self.pool {
            match entry {
                PoolEntry::Utf8(s) => {
                    out.push(1);
                    write_u2(&mut out, s.len() as u16);
                    out.extend_from_slice(s.as_bytes());
                }
                PoolEntry::Int(v) => {
                    out.push(3);
                    write_u4(&mut out, *v as u32);
                }
                PoolEntry::Long(v) => {
                    out.push(5);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                PoolEntry::Class(name) => {
                    out.push(7);
                    write_u2(&mut out, *name);
                }
                PoolEntry::Str(utf8) => {
                    out.push(8);
                    write_u2(&mut out, *utf8);
                }
                PoolEntry::FieldRef(class, nat) => {
                    out.push(9);
                    write_u2(&mut out, *class);
                    write_u2(&mut out, *nat);
                }
                PoolEntry::MethodRef(class, nat) => {
                    out.push(10);
                    write_u2(&mut out, *class);
                    write_u2(&mut out, *nat);
                }
                PoolEntry::NameAndType(name, descriptor) => {
                    out.push(12);
                    write_u2(&mut out, *name);
                    write_u2(&mut out, *descriptor);
                }
                PoolEntry::WideTail => {}
            }
        }

        write_u2(&mut out, self.access);
        write_u2(&mut out, self.this_class);
        write_u2(&mut out, self.super_class);
        write_u2(&mut out, 0); // interfaces

        write_u2(&mut out, self.fields.len() as u16);
        for field in &self.fields {
            write_u2(&mut out, field.flags);
            write_u2(&mut out, field.name);
            write_u2(&mut out, field.descriptor);
            write_u2(&mut out, 0); // attributes
        }

        let code_name = self
            .pool
            .iter()
            .position(|e| *e == PoolEntry::Utf8("Code".to_string()))
            .map(|i| (i + 1) as u16);

        write_u2(&mut out, self.methods.len() as u16);
        for method in &self.methods {
            write_u2(&mut out, method.flags);
            write_u2(&mut out, method.name);
            write_u2(&mut out, method.descriptor);
            match &method.code {
                None => write_u2(&mut out, 0),
                Some(code) => {
                    write_u2(&mut out, 1);
                    write_u2(&mut out, code_name.expect("Code name interned"));
                    let length = 2 + 2 + 4 + code.code.len() + 2 + 8 * code.handlers.len() + 2;
                    write_u4(&mut out, length as u32);
                    write_u2(&mut out, code.max_stack);
                    write_u2(&mut out, code.max_locals);
                    write_u4(&mut out, code.code.len() as u32);
                    out.extend_from_slice(&code.code);
                    write_u2(&mut out, code.handlers.len() as u16);
                    for (start, end, handler, catch_type) in &code.handlers {
                        write_u2(&mut out, *start);
                        write_u2(&mut out, *end);
                        write_u2(&mut out, *handler);
                        write_u2(&mut out, *catch_type);
                    }
                    write_u2(&mut out, 0); // code attributes
                }
            }
        }

        write_u2(&mut out, 0); // class attributes
        out
    }
}

fn write_u2(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn write_u4(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

/// `java/lang/Object` with an empty constructor, the root every test
/// hierarchy bottoms out in.
pub fn object_class() -> Vec<u8> {
    let mut b = ClassFileBuilder::new("java/lang/Object", None);
    b.method(ACC_PUBLIC, "<init>", "()V", 0, 1, vec![RETURN]);
    b.build()
}

/// A bare `java/lang/String`; instances get their `value` and `count`
/// fields set by the VM itself.
pub fn string_class() -> Vec<u8> {
    ClassFileBuilder::new("java/lang/String", Some("java/lang/Object")).build()
}

pub fn class_class() -> Vec<u8> {
    ClassFileBuilder::new("java/lang/Class", Some("java/lang/Object")).build()
}

/// The standard constructor body: call the super constructor, return.
pub fn default_init(b: &mut ClassFileBuilder, super_name: &str) {
    let super_init = b.method_ref(super_name, "<init>", "()V");
    let mut code = vec![ALOAD_0];
    code.extend(with_u16(INVOKESPECIAL, super_init));
    code.push(RETURN);
    b.method(ACC_PUBLIC, "<init>", "()V", 1, 1, code);
}

/// Load the given class files, run `main` to completion with output
/// captured, and hand the output back.
pub fn run_and_capture(classes: &[Vec<u8>]) -> demitasse::Result<String> {
    let mut vm = Vm::new();
    for class in classes {
        vm.load_class_bytes(class)?;
    }
    vm.start()?;
    while !vm.done() {
        vm.step()?;
    }
    Ok(vm.captured_output().unwrap_or_default())
}
