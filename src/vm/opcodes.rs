use crate::vm::error::ExecutionError;
use std::fmt;

/// Every byte code the interpreter understands. Anything else aborts
/// execution with `ExecutionError::UnknownInstruction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mnemonic {
    Nop,
    AconstNull,
    Iconst0,
    Iconst1,
    Iconst2,
    Iconst3,
    Iconst4,
    Iconst5,
    Fconst2,
    Dconst1,
    Bipush,
    Ldc,
    Ldc2W,
    Iload,
    Aload,
    Iload0,
    Iload1,
    Iload2,
    Iload3,
    Lload0,
    Lload1,
    Lload2,
    Lload3,
    Fload0,
    Fload1,
    Fload2,
    Fload3,
    Aload0,
    Aload1,
    Aload2,
    Aload3,
    Caload,
    Istore,
    Astore,
    Istore1,
    Istore2,
    Istore3,
    Astore1,
    Astore2,
    Astore3,
    Castore,
    Pop,
    Dup,
    DupX1,
    Iadd,
    Ladd,
    Fadd,
    Isub,
    Lsub,
    Fsub,
    Imul,
    Lmul,
    Fmul,
    Idiv,
    Ldiv,
    Fdiv,
    Iinc,
    Ifeq,
    Ifne,
    Ifge,
    Ifgt,
    Ifle,
    IfIcmpne,
    IfIcmpge,
    IfIcmpgt,
    IfIcmple,
    Goto,
    Ireturn,
    Lreturn,
    Freturn,
    Areturn,
    Return,
    Getstatic,
    Putstatic,
    Getfield,
    Putfield,
    Invokevirtual,
    Invokespecial,
    Invokestatic,
    Invokeinterface,
    New,
    Newarray,
    Anewarray,
    Arraylength,
    Athrow,
    Checkcast,
    Instanceof,
    Monitorenter,
    Monitorexit,
    Ifnull,
    Ifnonnull,
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Mnemonic::*;
        let name = match self {
            Nop => "nop",
            AconstNull => "aconst_null",
            Iconst0 => "iconst_0",
            Iconst1 => "iconst_1",
            Iconst2 => "iconst_2",
            Iconst3 => "iconst_3",
            Iconst4 => "iconst_4",
            Iconst5 => "iconst_5",
            Fconst2 => "fconst_2",
            Dconst1 => "dconst_1",
            Bipush => "bipush",
            Ldc => "ldc",
            Ldc2W => "ldc2_w",
            Iload => "iload",
            Aload => "aload",
            Iload0 => "iload_0",
            Iload1 => "iload_1",
            Iload2 => "iload_2",
            Iload3 => "iload_3",
            Lload0 => "lload_0",
            Lload1 => "lload_1",
            Lload2 => "lload_2",
            Lload3 => "lload_3",
            Fload0 => "fload_0",
            Fload1 => "fload_1",
            Fload2 => "fload_2",
            Fload3 => "fload_3",
            Aload0 => "aload_0",
            Aload1 => "aload_1",
            Aload2 => "aload_2",
            Aload3 => "aload_3",
            Caload => "caload",
            Istore => "istore",
            Astore => "astore",
            Istore1 => "istore_1",
            Istore2 => "istore_2",
            Istore3 => "istore_3",
            Astore1 => "astore_1",
            Astore2 => "astore_2",
            Astore3 => "astore_3",
            Castore => "castore",
            Pop => "pop",
            Dup => "dup",
            DupX1 => "dup_x1",
            Iadd => "iadd",
            Ladd => "ladd",
            Fadd => "fadd",
            Isub => "isub",
            Lsub => "lsub",
            Fsub => "fsub",
            Imul => "imul",
            Lmul => "lmul",
            Fmul => "fmul",
            Idiv => "idiv",
            Ldiv => "ldiv",
            Fdiv => "fdiv",
            Iinc => "iinc",
            Ifeq => "ifeq",
            Ifne => "ifne",
            Ifge => "ifge",
            Ifgt => "ifgt",
            Ifle => "ifle",
            IfIcmpne => "if_icmpne",
            IfIcmpge => "if_icmpge",
            IfIcmpgt => "if_icmpgt",
            IfIcmple => "if_icmple",
            Goto => "goto",
            Ireturn => "ireturn",
            Lreturn => "lreturn",
            Freturn => "freturn",
            Areturn => "areturn",
            Return => "return",
            Getstatic => "getstatic",
            Putstatic => "putstatic",
            Getfield => "getfield",
            Putfield => "putfield",
            Invokevirtual => "invokevirtual",
            Invokespecial => "invokespecial",
            Invokestatic => "invokestatic",
            Invokeinterface => "invokeinterface",
            New => "new",
            Newarray => "newarray",
            Anewarray => "anewarray",
            Arraylength => "arraylength",
            Athrow => "athrow",
            Checkcast => "checkcast",
            Instanceof => "instanceof",
            Monitorenter => "monitorenter",
            Monitorexit => "monitorexit",
            Ifnull => "ifnull",
            Ifnonnull => "ifnonnull",
        };
        f.write_str(name)
    }
}

/// Instruction byte plus mnemonic plus the number of embedded operand
/// bytes that follow it in the stream.
fn lookup(byte: u8) -> Result<(Mnemonic, usize), ExecutionError> {
    use Mnemonic::*;
    Ok(match byte {
        0 => (Nop, 0),
        1 => (AconstNull, 0),
        3 => (Iconst0, 0),
        4 => (Iconst1, 0),
        5 => (Iconst2, 0),
        6 => (Iconst3, 0),
        7 => (Iconst4, 0),
        8 => (Iconst5, 0),
        13 => (Fconst2, 0),
        15 => (Dconst1, 0),
        16 => (Bipush, 1),
        18 => (Ldc, 1),
        20 => (Ldc2W, 2),
        21 => (Iload, 1),
        25 => (Aload, 1),
        26 => (Iload0, 0),
        27 => (Iload1, 0),
        28 => (Iload2, 0),
        29 => (Iload3, 0),
        30 => (Lload0, 0),
        31 => (Lload1, 0),
        32 => (Lload2, 0),
        33 => (Lload3, 0),
        34 => (Fload0, 0),
        35 => (Fload1, 0),
        36 => (Fload2, 0),
        37 => (Fload3, 0),
        42 => (Aload0, 0),
        43 => (Aload1, 0),
        44 => (Aload2, 0),
        45 => (Aload3, 0),
        52 => (Caload, 0),
        54 => (Istore, 1),
        58 => (Astore, 1),
        60 => (Istore1, 0),
        61 => (Istore2, 0),
        62 => (Istore3, 0),
        76 => (Astore1, 0),
        77 => (Astore2, 0),
        78 => (Astore3, 0),
        85 => (Castore, 0),
        87 => (Pop, 0),
        89 => (Dup, 0),
        90 => (DupX1, 0),
        96 => (Iadd, 0),
        97 => (Ladd, 0),
        98 => (Fadd, 0),
        100 => (Isub, 0),
        101 => (Lsub, 0),
        102 => (Fsub, 0),
        104 => (Imul, 0),
        105 => (Lmul, 0),
        106 => (Fmul, 0),
        108 => (Idiv, 0),
        109 => (Ldiv, 0),
        110 => (Fdiv, 0),
        132 => (Iinc, 2),
        153 => (Ifeq, 2),
        154 => (Ifne, 2),
        156 => (Ifge, 2),
        157 => (Ifgt, 2),
        158 => (Ifle, 2),
        160 => (IfIcmpne, 2),
        162 => (IfIcmpge, 2),
        163 => (IfIcmpgt, 2),
        164 => (IfIcmple, 2),
        167 => (Goto, 2),
        172 => (Ireturn, 0),
        173 => (Lreturn, 0),
        174 => (Freturn, 0),
        176 => (Areturn, 0),
        177 => (Return, 0),
        178 => (Getstatic, 2),
        179 => (Putstatic, 2),
        180 => (Getfield, 2),
        181 => (Putfield, 2),
        182 => (Invokevirtual, 2),
        183 => (Invokespecial, 2),
        184 => (Invokestatic, 2),
        185 => (Invokeinterface, 4),
        187 => (New, 2),
        188 => (Newarray, 1),
        189 => (Anewarray, 2),
        190 => (Arraylength, 0),
        191 => (Athrow, 0),
        192 => (Checkcast, 2),
        193 => (Instanceof, 2),
        194 => (Monitorenter, 0),
        195 => (Monitorexit, 0),
        198 => (Ifnull, 2),
        199 => (Ifnonnull, 2),
        other => return Err(ExecutionError::UnknownInstruction(other)),
    })
}

/// One decoded instruction: the raw byte, its mnemonic and the embedded
/// operand bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpCode {
    pub byte: u8,
    pub mnemonic: Mnemonic,
    pub args: Vec<u8>,
}

impl OpCode {
    /// Decode the instruction starting at `bytes[0]`.
    pub fn decode(bytes: &[u8]) -> Result<OpCode, ExecutionError> {
        let byte = *bytes.first().ok_or(ExecutionError::TruncatedCode)?;
        let (mnemonic, argc) = lookup(byte)?;
        if bytes.len() < 1 + argc {
            return Err(ExecutionError::TruncatedCode);
        }
        Ok(OpCode {
            byte,
            mnemonic,
            args: bytes[1..1 + argc].to_vec(),
        })
    }

    pub fn width(&self) -> usize {
        1 + self.args.len()
    }

    pub fn u8(&self) -> u8 {
        self.args[0]
    }

    pub fn i8(&self) -> i8 {
        self.args[0] as i8
    }

    pub fn u16(&self) -> u16 {
        (self.args[0] as u16) << 8 | self.args[1] as u16
    }

    pub fn i16(&self) -> i16 {
        self.u16() as i16
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic)?;
        for a in &self.args {
            write!(f, " {}", a)?;
        }
        Ok(())
    }
}

/// Cursor over one method's instruction stream. Keeps a raw byte index
/// and an index into the pre-decoded opcode list in lock-step, so a
/// visualizer can show decoded instructions without rescanning bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramCounter {
    bytes: Vec<u8>,
    ops: Vec<OpCode>,
    /// Byte offset of each decoded opcode, parallel to `ops`.
    offsets: Vec<usize>,
    byte_index: usize,
    op_index: usize,
}

impl ProgramCounter {
    pub fn new(bytes: &[u8]) -> Result<Self, ExecutionError> {
        let mut ops = Vec::new();
        let mut offsets = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            let op = OpCode::decode(&bytes[i..])?;
            offsets.push(i);
            i += op.width();
            ops.push(op);
        }
        Ok(Self {
            bytes: bytes.to_vec(),
            ops,
            offsets,
            byte_index: 0,
            op_index: 0,
        })
    }

    /// A counter over an empty stream, for frames that never run code.
    pub fn empty() -> Self {
        Self {
            bytes: Vec::new(),
            ops: Vec::new(),
            offsets: Vec::new(),
            byte_index: 0,
            op_index: 0,
        }
    }

    /// The current opcode, advancing both cursors past it.
    pub fn next(&mut self) -> Result<OpCode, ExecutionError> {
        let op = self
            .ops
            .get(self.op_index)
            .ok_or(ExecutionError::EndOfCode)?
            .clone();
        self.byte_index += op.width();
        self.op_index += 1;
        Ok(op)
    }

    /// Byte offset of the most recently executed instruction (or 0 when
    /// nothing ran yet). This is the offset exception ranges are tested
    /// against and the base for relative jumps.
    pub fn current_offset(&self) -> usize {
        if self.op_index == 0 {
            0
        } else {
            self.offsets[self.op_index - 1]
        }
    }

    /// Relative jump: `offset` is counted from the start of the
    /// instruction that just executed.
    pub fn jump(&mut self, offset: i16) -> Result<(), ExecutionError> {
        let target = self.current_offset() as isize + offset as isize;
        if target < 0 {
            return Err(ExecutionError::BadJumpTarget(0));
        }
        self.jump_to(target as usize)
    }

    /// Absolute jump to a byte index, used for exception handler entry.
    pub fn jump_to(&mut self, target: usize) -> Result<(), ExecutionError> {
        match self.offsets.binary_search(&target) {
            Ok(i) => {
                self.byte_index = target;
                self.op_index = i;
                Ok(())
            }
            Err(_) => Err(ExecutionError::BadJumpTarget(target)),
        }
    }

    /// Back both cursors up to re-execute the instruction that just ran.
    pub fn rewind(&mut self) -> Result<(), ExecutionError> {
        self.jump_to(self.current_offset())
    }

    pub fn byte_index(&self) -> usize {
        self.byte_index
    }

    pub fn op_index(&self) -> usize {
        self.op_index
    }

    /// The pre-decoded instruction list, for visualizers.
    pub fn ops(&self) -> &[OpCode] {
        &self.ops
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}
