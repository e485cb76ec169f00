//! Host-implemented method bodies. When the interpreter is about to step
//! a frame whose method carries the `NATIVE` flag, it calls the callback
//! registered under the method's simple name instead of byte code; the
//! returned value, if any, is pushed onto the caller's operand stack.
use crate::vm::error::{ExecutionError, Result};
use crate::vm::heap::HeapPtr;
use crate::vm::stack::Frame;
use crate::vm::value::Value;
use crate::vm::vm::Vm;
use std::collections::HashMap;
use std::io::Write;

pub type NativeFn = fn(&Vm, &Frame, &mut dyn Write) -> Result<Option<Value>>;

/// The callbacks every fresh VM starts with.
pub fn builtin_registry() -> HashMap<&'static str, NativeFn> {
    let mut registry: HashMap<&'static str, NativeFn> = HashMap::new();
    registry.insert("print", print_string);
    registry.insert("printInt", print_int);
    registry.insert("printLong", print_long);
    registry.insert("printFloat", print_float);
    registry.insert("printChar", print_char);
    registry.insert("arraycopy", arraycopy);
    registry.insert("desiredAssertionStatus0", desired_assertion_status);
    registry.insert("fillInStackTrace", fill_in_stack_trace);
    registry.insert("registerNatives", register_natives);
    registry.insert("getClass", get_class);
    registry
}

fn object_arg(frame: &Frame, index: usize, context: &'static str) -> Result<HeapPtr> {
    match frame.local(index) {
        Value::Object(ptr) => Ok(ptr),
        Value::Null => Err(ExecutionError::NullPointer(context).into()),
        _ => Err(ExecutionError::TypeMismatch { expected: "object" }.into()),
    }
}

fn array_arg(frame: &Frame, index: usize, context: &'static str) -> Result<HeapPtr> {
    match frame.local(index) {
        Value::Array(ptr) => Ok(ptr),
        Value::Null => Err(ExecutionError::NullPointer(context).into()),
        _ => Err(ExecutionError::TypeMismatch { expected: "array" }.into()),
    }
}

fn int_arg(frame: &Frame, index: usize) -> Result<i32> {
    frame
        .local(index)
        .try_into()
        .map_err(|_| ExecutionError::TypeMismatch { expected: "int" }.into())
}

/// Print the byte array backing a string object, no newline of its own.
fn print_string(vm: &Vm, frame: &Frame, out: &mut dyn Write) -> Result<Option<Value>> {
    let ptr = object_arg(frame, 0, "print")?;
    write!(out, "{}", vm.java_string(ptr)?)?;
    Ok(None)
}

fn print_int(_vm: &Vm, frame: &Frame, out: &mut dyn Write) -> Result<Option<Value>> {
    writeln!(out, "{}", int_arg(frame, 0)?)?;
    Ok(None)
}

fn print_long(_vm: &Vm, frame: &Frame, out: &mut dyn Write) -> Result<Option<Value>> {
    let value: i64 = frame
        .local(0)
        .try_into()
        .map_err(|_| ExecutionError::TypeMismatch { expected: "long" })?;
    writeln!(out, "{}", value)?;
    Ok(None)
}

fn print_float(_vm: &Vm, frame: &Frame, out: &mut dyn Write) -> Result<Option<Value>> {
    let value: f32 = frame
        .local(0)
        .try_into()
        .map_err(|_| ExecutionError::TypeMismatch { expected: "float" })?;
    writeln!(out, "{}", value)?;
    Ok(None)
}

fn print_char(_vm: &Vm, frame: &Frame, out: &mut dyn Write) -> Result<Option<Value>> {
    let value = int_arg(frame, 0)?;
    let c = char::from_u32(value as u32)
        .ok_or(ExecutionError::TypeMismatch { expected: "char" })?;
    write!(out, "{}", c)?;
    Ok(None)
}

/// (src, srcPos, dst, dstPos, length): element-wise copy between arrays.
fn arraycopy(vm: &Vm, frame: &Frame, _out: &mut dyn Write) -> Result<Option<Value>> {
    let src = array_arg(frame, 0, "arraycopy src")?;
    let src_pos = int_arg(frame, 1)?;
    let dst = array_arg(frame, 2, "arraycopy dst")?;
    let dst_pos = int_arg(frame, 3)?;
    let length = int_arg(frame, 4)?;
    for i in 0..length {
        let value = vm.heap.array_get(src, src_pos + i)?;
        vm.heap.array_set(dst, dst_pos + i, value)?;
    }
    Ok(None)
}

fn desired_assertion_status(_vm: &Vm, _frame: &Frame, _out: &mut dyn Write) -> Result<Option<Value>> {
    Ok(Some(Value::Int(0)))
}

/// Clears the receiver's stack trace and hands the receiver back.
fn fill_in_stack_trace(vm: &Vm, frame: &Frame, _out: &mut dyn Write) -> Result<Option<Value>> {
    let ptr = object_arg(frame, 0, "fillInStackTrace")?;
    vm.heap.set_object_field(ptr, "stackTrace", Value::Null)?;
    Ok(Some(Value::Object(ptr)))
}

fn register_natives(_vm: &Vm, _frame: &Frame, _out: &mut dyn Write) -> Result<Option<Value>> {
    Ok(None)
}

/// Returns a fresh `java/lang/Class` instance whose `name` field holds
/// the receiver's class name.
fn get_class(vm: &Vm, frame: &Frame, _out: &mut dyn Write) -> Result<Option<Value>> {
    let ptr = object_arg(frame, 0, "getClass")?;
    let name = vm.class_name_of(ptr)?;
    let class_class = vm.classes.resolve("java/lang/Class")?;
    let class_object = vm.heap.new_object(Some(class_class));
    let name_string = vm.new_java_string(&name)?;
    vm.heap
        .set_object_field(class_object, "name", Value::Object(name_string))?;
    Ok(Some(Value::Object(class_object)))
}
