//! The dispatch loop. One `step` executes one instruction of the active
//! frame; invocations push frames, returns pop them, and a thrown value
//! moves between frames by explicit handler search rather than host
//! unwinding. The host error channel stays reserved for fatal aborts.
use crate::vm::classes::{parse_field_type, parse_signature, ClassId};
use crate::vm::constant_pool::{ConstantPoolEntry, SymbolicRef};
use crate::vm::error::{ExecutionError, LinkageError, Result};
use crate::vm::heap::HeapPtr;
use crate::vm::opcodes::{Mnemonic, ProgramCounter};
use crate::vm::stack::Frame;
use crate::vm::value::Value;
use crate::vm::vm::Vm;
use log::{debug, trace};

/// What an executed instruction asks the step driver to do next. Applied
/// only after the per-instruction borrow of the active frame has ended.
enum Transition {
    Continue,
    Invoke(InvokeKind, SymbolicRef),
    Return(Option<Value>),
    Throw(HeapPtr),
    Initialize(ClassId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InvokeKind {
    Virtual,
    Special,
    Static,
    Interface,
}

impl Vm {
    pub(crate) fn step_inner(&self) -> Result<()> {
        if self.done() {
            return Ok(());
        }
        let native = {
            let frame = self.frames.top();
            match (frame.class, frame.method) {
                (Some(class), Some(method)) => self.classes.get(class).methods[method].is_native(),
                _ => false,
            }
        };
        if native {
            return self.step_native();
        }
        let transition = self.execute_op()?;
        self.apply(transition)
    }

    /// Run the registered callback in place of byte code, then pop the
    /// native frame and hand any result to the caller.
    fn step_native(&self) -> Result<()> {
        let name = {
            let frame = self.frames.top();
            let class = frame
                .class
                .ok_or(ExecutionError::Internal("native frame without a class"))?;
            let method = frame
                .method
                .ok_or(ExecutionError::Internal("native frame without a method"))?;
            self.classes.get(class).methods[method].name.clone()
        };
        let callback = *self
            .natives
            .get(name.as_str())
            .ok_or_else(|| ExecutionError::UnknownNative(name.clone()))?;
        debug!("native {}", name);
        let result = {
            let frame = self.frames.top();
            let mut sink = self.output.borrow_mut();
            callback(self, &frame, &mut *sink)?
        };
        self.frames.pop();
        if let Some(value) = result {
            self.frames.top().push(value);
        }
        Ok(())
    }

    fn apply(&self, transition: Transition) -> Result<()> {
        match transition {
            Transition::Continue => Ok(()),
            Transition::Return(value) => self.apply_return(value),
            Transition::Invoke(kind, sref) => self.apply_invoke(kind, sref),
            Transition::Throw(ptr) => self.apply_throw(ptr),
            Transition::Initialize(class) => self.begin_initialization(class),
        }
    }

    fn apply_return(&self, value: Option<Value>) -> Result<()> {
        debug!("return {:?}", value);
        self.frames.pop();
        if self.frames.is_empty() {
            return Ok(());
        }
        if let Some(value) = value {
            self.frames.top().push(value);
        }
        // a <clinit> pseudo-root is dropped so that the static access
        // beneath it re-executes
        if self.frames.depth() > 1
            && self.frames.top().root
            && self.frames.top().discard_on_return
        {
            self.frames.pop();
        }
        Ok(())
    }

    fn apply_invoke(&self, kind: InvokeKind, sref: SymbolicRef) -> Result<()> {
        let signature = parse_signature(&sref.descriptor)?;
        let argc = signature.len() - 1;

        // virtual and interface calls dispatch on the runtime class of
        // the receiver, which sits below the arguments
        let start_name = match kind {
            InvokeKind::Virtual | InvokeKind::Interface => {
                match self.frames.top().pick(argc)? {
                    Value::Object(ptr) => self.class_name_of(ptr)?,
                    Value::Null => {
                        return Err(ExecutionError::NullPointer("invoke receiver").into())
                    }
                    _ => {
                        return Err(ExecutionError::TypeMismatch {
                            expected: "object receiver",
                        }
                        .into())
                    }
                }
            }
            InvokeKind::Special | InvokeKind::Static => sref.class_name.clone(),
        };

        let start = self.classes.resolve(&start_name)?;

        // first static touch runs the class initializer; the invoke
        // rewinds and re-executes once it has finished
        if kind == InvokeKind::Static && !self.classes.get(start).initialised {
            self.frames.top().pc.borrow_mut().rewind()?;
            return self.begin_initialization(start);
        }

        self.invoke_on(start, &sref.name, &sref.descriptor, argc)
    }

    /// Non-virtual invocation by exact class name, used for seeding
    /// `main`, running `<clinit>` and rendering throwables.
    pub(crate) fn invoke_exact(&self, class_name: &str, name: &str, descriptor: &str) -> Result<()> {
        let signature = parse_signature(descriptor)?;
        let start = self.classes.resolve(class_name)?;
        self.invoke_on(start, name, descriptor, signature.len() - 1)
    }

    /// Resolve the method starting at `start` (walking the super chain),
    /// collect arguments from the caller and push the callee frame.
    fn invoke_on(&self, start: ClassId, name: &str, descriptor: &str, argc: usize) -> Result<()> {
        let (target, method_idx) = self.resolve_method(start, name, descriptor)?;
        let (target_name, is_static, is_native, max_locals, code_bytes) = {
            let class = self.classes.get(target);
            let method = &class.methods[method_idx];
            (
                class.name().to_string(),
                method.is_static(),
                method.is_native(),
                method.code.as_ref().map(|c| c.max_locals).unwrap_or(0),
                method.code.as_ref().map(|c| c.bytes.clone()),
            )
        };

        // pop the arguments (and the receiver for instance methods) in
        // reverse so argument 0 lands first
        let total = argc + usize::from(!is_static);
        let mut args = vec![Value::Null; total];
        {
            let caller = self.frames.top();
            for slot in args.iter_mut().rev() {
                *slot = caller.pop()?;
            }
        }
        debug!("call {}.{}{} {:?}", target_name, name, descriptor, args);

        let frame = if is_native {
            Frame::new(
                target,
                method_idx,
                Frame::argument_slots(&args),
                ProgramCounter::empty(),
            )
        } else {
            let bytes = code_bytes.ok_or_else(|| LinkageError::AbstractMethod {
                class: target_name,
                name: name.to_string(),
            })?;
            let pc = ProgramCounter::new(&bytes)?;
            Frame::new(target, method_idx, max_locals as usize, pc)
        };
        frame.store_arguments(args);
        self.frames.push(frame);
        Ok(())
    }

    /// First method matching name and descriptor in `start` or, failing
    /// that, its super classes. Running out of supers is fatal.
    fn resolve_method(&self, start: ClassId, name: &str, descriptor: &str) -> Result<(ClassId, usize)> {
        let mut current = start;
        loop {
            let (found, super_name) = {
                let class = self.classes.get(current);
                (
                    class.method(name, descriptor).map(|(i, _)| i),
                    class.super_name().map(str::to_string),
                )
            };
            if let Some(index) = found {
                return Ok((current, index));
            }
            match super_name {
                Some(super_name) => current = self.classes.resolve(&super_name)?,
                None => {
                    return Err(LinkageError::MethodNotFound {
                        class: self.classes.get(start).name().to_string(),
                        name: name.to_string(),
                        descriptor: descriptor.to_string(),
                    }
                    .into())
                }
            }
        }
    }

    /// Mark `class` initialised and, when it declares `<clinit>`, run it
    /// in a fresh pseudo-root frame. The flag goes up before the body so
    /// cyclic static initializers terminate.
    fn begin_initialization(&self, class: ClassId) -> Result<()> {
        {
            self.classes.get_mut(class).initialised = true;
        }
        let (name, has_clinit) = {
            let c = self.classes.get(class);
            (c.name().to_string(), c.method("<clinit>", "()V").is_some())
        };
        if !has_clinit {
            return Ok(());
        }
        debug!("initializing {}", name);
        let mut root = Frame::root_frame();
        root.discard_on_return = true;
        self.frames.push(root);
        self.invoke_exact(&name, "<clinit>", "()V")
    }

    /// Walk the frame stack looking for a handler whose byte range covers
    /// the faulting instruction and whose catch class admits the
    /// throwable. Reaching the true bottom of the stack renders the
    /// throwable through its own `toString` and aborts; a `<clinit>`
    /// pseudo-root is not a bottom and the search continues in the frame
    /// whose static access ran the initializer.
    fn apply_throw(&self, throwable: HeapPtr) -> Result<()> {
        let throwable_class = self
            .heap
            .class_of(throwable)
            .ok_or(ExecutionError::Internal("throwable without a class"))?;
        // a frame entered by discarding a pseudo-root sits rewound at its
        // static access, so the handler search tests the byte cursor
        // instead of the last executed instruction
        let mut at_rewound_access = false;
        loop {
            let (is_root, is_pseudo) = {
                let frame = self.frames.top();
                (frame.root, frame.discard_on_return)
            };
            if is_root {
                if is_pseudo {
                    self.frames.pop();
                    at_rewound_access = true;
                    continue;
                }
                let rendered = self.render_throwable(throwable)?;
                return Err(ExecutionError::UnhandledException(rendered).into());
            }
            let handler_pc = self.find_handler(throwable_class, at_rewound_access)?;
            match handler_pc {
                Some(target) => {
                    let frame = self.frames.top();
                    frame.pc.borrow_mut().jump_to(target)?;
                    frame.push(Value::Object(throwable));
                    return Ok(());
                }
                None => {
                    self.frames.pop();
                    at_rewound_access = false;
                }
            }
        }
    }

    /// Search the active frame's exception table in declaration order.
    fn find_handler(
        &self,
        throwable_class: ClassId,
        at_rewound_access: bool,
    ) -> Result<Option<usize>> {
        let (class_id, method_idx, index) = {
            let frame = self.frames.top();
            let class = frame
                .class
                .ok_or(ExecutionError::Internal("unwinding a frame without a method"))?;
            let method = frame
                .method
                .ok_or(ExecutionError::Internal("unwinding a frame without a method"))?;
            let pc = frame.pc.borrow();
            let index = if at_rewound_access {
                pc.byte_index()
            } else {
                pc.current_offset()
            };
            (class, method, index)
        };
        let handlers = {
            let class = self.classes.get(class_id);
            class.methods[method_idx]
                .code
                .as_ref()
                .map(|c| c.handlers.clone())
                .unwrap_or_default()
        };
        for handler in &handlers {
            if !handler.covers(index) {
                continue;
            }
            let admits = match &handler.class_name {
                // catch-type 0 catches anything
                None => true,
                Some(catch_name) => {
                    let catch_class = self.classes.resolve(catch_name)?;
                    self.implements(throwable_class, catch_class)?
                }
            };
            if admits {
                return Ok(Some(handler.handler as usize));
            }
        }
        Ok(None)
    }

    /// Invoke the throwable's `toString` polymorphically in a nested root
    /// frame and read the resulting string back.
    fn render_throwable(&self, throwable: HeapPtr) -> Result<String> {
        let class_name = self.class_name_of(throwable)?;
        let base = self.frames.depth();
        let root = Frame::root_frame();
        root.push(Value::Object(throwable));
        self.frames.push(root);
        self.invoke_exact(&class_name, "toString", "()Ljava/lang/String;")?;
        while self.frames.depth() > base + 1 {
            self.step_inner()?;
        }
        let result = self.frames.top().pop()?;
        self.frames.pop();
        match result {
            Value::Object(ptr) => self.java_string(ptr),
            other => Ok(other.to_string()),
        }
    }

    /// Execute the next instruction of the active frame and report how
    /// control should continue.
    fn execute_op(&self) -> Result<Transition> {
        use Mnemonic::*;

        let frame = self.frames.top();
        let class_id = frame
            .class
            .ok_or(ExecutionError::Internal("stepping a frame without a method"))?;
        let op = frame.pc.borrow_mut().next()?;
        trace!("{:4} {}", frame.pc.borrow().current_offset(), op);

        let transition = match op.mnemonic {
            Nop | Monitorenter | Monitorexit => Transition::Continue,

            AconstNull => {
                frame.push(Value::Null);
                Transition::Continue
            }
            Iconst0 => {
                frame.push(Value::Int(0));
                Transition::Continue
            }
            Iconst1 => {
                frame.push(Value::Int(1));
                Transition::Continue
            }
            Iconst2 => {
                frame.push(Value::Int(2));
                Transition::Continue
            }
            Iconst3 => {
                frame.push(Value::Int(3));
                Transition::Continue
            }
            Iconst4 => {
                frame.push(Value::Int(4));
                Transition::Continue
            }
            Iconst5 => {
                frame.push(Value::Int(5));
                Transition::Continue
            }
            Fconst2 => {
                frame.push(Value::Float(2.0));
                Transition::Continue
            }
            Dconst1 => {
                frame.push(Value::Double(1.0));
                Transition::Continue
            }
            Bipush => {
                frame.push(Value::Int(op.i8() as i32));
                Transition::Continue
            }

            Ldc => {
                let index = op.u8() as u16;
                self.load_constant(&frame, class_id, index)?;
                Transition::Continue
            }
            Ldc2W => {
                let index = op.u16();
                let entry = self.classes.get(class_id).constant_pool.get(index)?.clone();
                match entry {
                    ConstantPoolEntry::Long(v) => frame.push(Value::Long(v)),
                    ConstantPoolEntry::Double(v) => frame.push(Value::Double(v)),
                    _ => {
                        return Err(ExecutionError::InvalidConstant {
                            index,
                            expected: "long or double",
                        }
                        .into())
                    }
                }
                Transition::Continue
            }

            Iload | Aload => {
                frame.push(frame.local(op.u8() as usize));
                Transition::Continue
            }
            Iload0 | Aload0 | Lload0 | Fload0 => {
                frame.push(frame.local(0));
                Transition::Continue
            }
            Iload1 | Aload1 | Lload1 | Fload1 => {
                frame.push(frame.local(1));
                Transition::Continue
            }
            Iload2 | Aload2 | Lload2 | Fload2 => {
                frame.push(frame.local(2));
                Transition::Continue
            }
            Iload3 | Aload3 | Lload3 | Fload3 => {
                frame.push(frame.local(3));
                Transition::Continue
            }

            Istore | Astore => {
                let value = frame.pop()?;
                frame.set_local(op.u8() as usize, value);
                Transition::Continue
            }
            Istore1 | Astore1 => {
                let value = frame.pop()?;
                frame.set_local(1, value);
                Transition::Continue
            }
            Istore2 | Astore2 => {
                let value = frame.pop()?;
                frame.set_local(2, value);
                Transition::Continue
            }
            Istore3 | Astore3 => {
                let value = frame.pop()?;
                frame.set_local(3, value);
                Transition::Continue
            }

            Caload => {
                let index = frame.pop_int()?;
                let array = frame.pop_array("caload")?;
                match self.heap.array_get(array, index)? {
                    Value::Byte(b) => frame.push(Value::Int(b as i32)),
                    _ => {
                        return Err(ExecutionError::TypeMismatch {
                            expected: "byte array element",
                        }
                        .into())
                    }
                }
                Transition::Continue
            }
            Castore => {
                let value = frame.pop_int()?;
                let index = frame.pop_int()?;
                let array = frame.pop_array("castore")?;
                self.heap.array_set(array, index, Value::Byte(value as u8))?;
                Transition::Continue
            }

            Pop => {
                frame.pop()?;
                Transition::Continue
            }
            Dup => {
                frame.dup()?;
                Transition::Continue
            }
            DupX1 => {
                frame.dup_x1()?;
                Transition::Continue
            }

            Iadd | Isub | Imul | Idiv => {
                let x = frame.pop_int()?;
                let y = frame.pop_int()?;
                let result = match op.mnemonic {
                    Iadd => y.wrapping_add(x),
                    Isub => y.wrapping_sub(x),
                    Imul => y.wrapping_mul(x),
                    _ => {
                        if x == 0 {
                            return Err(ExecutionError::DivisionByZero.into());
                        }
                        y.wrapping_div(x)
                    }
                };
                frame.push(Value::Int(result));
                Transition::Continue
            }
            Ladd | Lsub | Lmul | Ldiv => {
                let x = frame.pop_long()?;
                let y = frame.pop_long()?;
                let result = match op.mnemonic {
                    Ladd => y.wrapping_add(x),
                    Lsub => y.wrapping_sub(x),
                    Lmul => y.wrapping_mul(x),
                    _ => {
                        if x == 0 {
                            return Err(ExecutionError::DivisionByZero.into());
                        }
                        y.wrapping_div(x)
                    }
                };
                frame.push(Value::Long(result));
                Transition::Continue
            }
            Fadd | Fsub | Fmul | Fdiv => {
                let x = frame.pop_float()?;
                let y = frame.pop_float()?;
                let result = match op.mnemonic {
                    Fadd => y + x,
                    Fsub => y - x,
                    Fmul => y * x,
                    _ => y / x,
                };
                frame.push(Value::Float(result));
                Transition::Continue
            }

            Iinc => {
                let index = op.args[0] as usize;
                let delta = op.args[1] as i8 as i32;
                let current: i32 = frame
                    .local(index)
                    .try_into()
                    .map_err(|_| ExecutionError::TypeMismatch { expected: "int" })?;
                frame.set_local(index, Value::Int(current.wrapping_add(delta)));
                Transition::Continue
            }

            Ifeq | Ifne | Ifge | Ifgt | Ifle => {
                let c = frame.pop_int()?;
                let taken = match op.mnemonic {
                    Ifeq => c == 0,
                    Ifne => c != 0,
                    Ifge => c >= 0,
                    Ifgt => c > 0,
                    _ => c <= 0,
                };
                if taken {
                    frame.pc.borrow_mut().jump(op.i16())?;
                }
                Transition::Continue
            }
            IfIcmpne | IfIcmpge | IfIcmpgt | IfIcmple => {
                let v2 = frame.pop_int()?;
                let v1 = frame.pop_int()?;
                let taken = match op.mnemonic {
                    IfIcmpne => v1 != v2,
                    IfIcmpge => v1 >= v2,
                    IfIcmpgt => v1 > v2,
                    _ => v1 <= v2,
                };
                if taken {
                    frame.pc.borrow_mut().jump(op.i16())?;
                }
                Transition::Continue
            }
            Goto => {
                frame.pc.borrow_mut().jump(op.i16())?;
                Transition::Continue
            }
            Ifnull | Ifnonnull => {
                let is_null = frame.pop_reference()?.is_null();
                let taken = if op.mnemonic == Ifnull { is_null } else { !is_null };
                if taken {
                    frame.pc.borrow_mut().jump(op.i16())?;
                }
                Transition::Continue
            }

            Ireturn | Lreturn | Freturn | Areturn => Transition::Return(Some(frame.pop()?)),
            Return => Transition::Return(None),

            Getstatic => {
                let index = op.u16();
                let fref = self.field_ref(class_id, index)?;
                let target = self.classes.resolve(&fref.class_name)?;
                if !self.classes.get(target).initialised {
                    frame.pc.borrow_mut().rewind()?;
                    return Ok(Transition::Initialize(target));
                }
                let value = self
                    .classes
                    .get(target)
                    .field(&fref.name)
                    .map(|f| f.value.clone())
                    .ok_or_else(|| LinkageError::FieldNotFound {
                        class: fref.class_name.clone(),
                        name: fref.name.clone(),
                    })?;
                frame.push(value);
                Transition::Continue
            }
            Putstatic => {
                let index = op.u16();
                let fref = self.field_ref(class_id, index)?;
                let target = self.classes.resolve(&fref.class_name)?;
                if !self.classes.get(target).initialised {
                    frame.pc.borrow_mut().rewind()?;
                    return Ok(Transition::Initialize(target));
                }
                let value = frame.pop()?;
                let mut class = self.classes.get_mut(target);
                match class.field_mut(&fref.name) {
                    Some(field) => field.value = value,
                    None => {
                        return Err(LinkageError::FieldNotFound {
                            class: fref.class_name.clone(),
                            name: fref.name.clone(),
                        }
                        .into())
                    }
                }
                Transition::Continue
            }
            Getfield => {
                let index = op.u16();
                let fref = self.field_ref(class_id, index)?;
                let object = frame.pop_object("getfield")?;
                let kind = parse_field_type(&fref.descriptor).map_err(|_| {
                    ExecutionError::InvalidConstant {
                        index,
                        expected: "field descriptor",
                    }
                })?;
                let value = self.heap.object_field(object, &fref.name, kind)?;
                frame.push(value);
                Transition::Continue
            }
            Putfield => {
                let index = op.u16();
                let fref = self.field_ref(class_id, index)?;
                let value = frame.pop()?;
                let object = frame.pop_object("putfield")?;
                self.heap.set_object_field(object, &fref.name, value)?;
                Transition::Continue
            }

            Invokevirtual => {
                let mref = self.method_ref(class_id, op.u16())?;
                Transition::Invoke(InvokeKind::Virtual, mref)
            }
            Invokespecial => {
                let mref = self.method_ref(class_id, op.u16())?;
                Transition::Invoke(InvokeKind::Special, mref)
            }
            Invokestatic => {
                let mref = self.method_ref(class_id, op.u16())?;
                Transition::Invoke(InvokeKind::Static, mref)
            }
            Invokeinterface => {
                let index = op.u16();
                let mref = self
                    .classes
                    .get(class_id)
                    .constant_pool
                    .interface_method_ref(index)?;
                Transition::Invoke(InvokeKind::Interface, mref)
            }

            New => {
                let name = self.class_name_at(class_id, op.u16())?;
                let target = self.classes.resolve(&name)?;
                let ptr = self.heap.new_object(Some(target));
                frame.push(Value::Object(ptr));
                Transition::Continue
            }
            Newarray => {
                let _atype = op.u8();
                let count = frame.pop_int()?;
                if count < 0 {
                    return Err(ExecutionError::NegativeArrayLength(count).into());
                }
                let ptr = self.heap.new_array(None, vec![Value::Byte(0); count as usize]);
                frame.push(Value::Array(ptr));
                Transition::Continue
            }
            Anewarray => {
                let name = self.class_name_at(class_id, op.u16())?;
                let target = self.classes.resolve(&name)?;
                let count = frame.pop_int()?;
                if count < 0 {
                    return Err(ExecutionError::NegativeArrayLength(count).into());
                }
                let ptr = self
                    .heap
                    .new_array(Some(target), vec![Value::Null; count as usize]);
                frame.push(Value::Array(ptr));
                Transition::Continue
            }
            Arraylength => {
                let array = frame.pop_array("arraylength")?;
                frame.push(Value::Int(self.heap.array_len(array)? as i32));
                Transition::Continue
            }

            Athrow => Transition::Throw(frame.pop_object("athrow")?),

            Checkcast => {
                let target_name = self.class_name_at(class_id, op.u16())?;
                let reference = frame.pop_reference()?;
                if reference.is_null() {
                    frame.push(reference);
                } else {
                    let ptr = match reference {
                        Value::Object(p) | Value::Array(p) => p,
                        _ => {
                            return Err(ExecutionError::Internal(
                                "non-reference after pop_reference",
                            )
                            .into())
                        }
                    };
                    let target = self.classes.resolve(&target_name)?;
                    let admitted = match self.heap.class_of(ptr) {
                        Some(runtime) => self.implements(runtime, target)?,
                        None => false,
                    };
                    if !admitted {
                        let from = match self.heap.class_of(ptr) {
                            Some(rt) => self.classes.get(rt).name().to_string(),
                            None => "untyped array".to_string(),
                        };
                        return Err(ExecutionError::ClassCast {
                            from,
                            to: target_name,
                        }
                        .into());
                    }
                    frame.push(reference);
                }
                Transition::Continue
            }
            Instanceof => {
                let target_name = self.class_name_at(class_id, op.u16())?;
                let reference = frame.pop_reference()?;
                let result = if reference.is_null() {
                    0
                } else {
                    let ptr = match reference {
                        Value::Object(p) | Value::Array(p) => p,
                        _ => {
                            return Err(ExecutionError::Internal(
                                "non-reference after pop_reference",
                            )
                            .into())
                        }
                    };
                    let target = self.classes.resolve(&target_name)?;
                    match self.heap.class_of(ptr) {
                        Some(runtime) if self.implements(runtime, target)? => 1,
                        _ => 0,
                    }
                };
                frame.push(Value::Int(result));
                Transition::Continue
            }
        };
        Ok(transition)
    }

    /// `ldc`: push an int, float, string object or class object depending
    /// on the kind of the pool entry.
    fn load_constant(&self, frame: &Frame, class_id: ClassId, index: u16) -> Result<()> {
        let entry = self.classes.get(class_id).constant_pool.get(index)?.clone();
        match entry {
            ConstantPoolEntry::Integer(v) => frame.push(Value::Int(v)),
            ConstantPoolEntry::Float(v) => frame.push(Value::Float(v)),
            ConstantPoolEntry::StringRef { .. } => {
                let contents = {
                    self.classes
                        .get(class_id)
                        .constant_pool
                        .string(index)?
                        .to_string()
                };
                let ptr = self.new_java_string(&contents)?;
                frame.push(Value::Object(ptr));
            }
            ConstantPoolEntry::ClassInfo { .. } => {
                let class_class = self.classes.resolve("java/lang/Class")?;
                let ptr = self.heap.new_object(Some(class_class));
                frame.push(Value::Object(ptr));
            }
            _ => {
                return Err(ExecutionError::InvalidConstant {
                    index,
                    expected: "loadable constant",
                }
                .into())
            }
        }
        Ok(())
    }

    fn field_ref(&self, class_id: ClassId, index: u16) -> Result<SymbolicRef> {
        Ok(self.classes.get(class_id).constant_pool.field_ref(index)?)
    }

    fn method_ref(&self, class_id: ClassId, index: u16) -> Result<SymbolicRef> {
        Ok(self.classes.get(class_id).constant_pool.method_ref(index)?)
    }

    fn class_name_at(&self, class_id: ClassId, index: u16) -> Result<String> {
        Ok(self
            .classes
            .get(class_id)
            .constant_pool
            .class_name(index)?
            .to_string())
    }
}
