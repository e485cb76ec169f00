use crate::vm::classes::ClassId;
use crate::vm::error::ExecutionError;
use crate::vm::value::{Type, Value};
use std::cell::RefCell;
use std::collections::HashMap;

pub type HeapPtr = usize;

/// One heap record. Objects map field names to values; arrays hold a
/// heterogeneous element vector plus an optional element class.
#[derive(Debug, Clone, PartialEq)]
pub enum HeapEntry {
    Object {
        class: Option<ClassId>,
        fields: HashMap<String, Value>,
    },
    Array {
        class: Option<ClassId>,
        contents: Vec<Value>,
    },
}

/// Append-only arena of objects and arrays. There is no collection;
/// records live for the process lifetime and handles stay valid forever.
#[derive(Default)]
pub struct Heap {
    entries: RefCell<Vec<HeapEntry>>,
}

impl Heap {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn new_object(&self, class: Option<ClassId>) -> HeapPtr {
        let mut entries = self.entries.borrow_mut();
        entries.push(HeapEntry::Object {
            class,
            fields: HashMap::new(),
        });
        entries.len() - 1
    }

    pub fn new_array(&self, class: Option<ClassId>, contents: Vec<Value>) -> HeapPtr {
        let mut entries = self.entries.borrow_mut();
        entries.push(HeapEntry::Array { class, contents });
        entries.len() - 1
    }

    /// Class of the object or array behind `ptr`, if it has one.
    pub fn class_of(&self, ptr: HeapPtr) -> Option<ClassId> {
        match self.entries.borrow().get(ptr) {
            Some(HeapEntry::Object { class, .. }) => *class,
            Some(HeapEntry::Array { class, .. }) => *class,
            None => None,
        }
    }

    pub fn array_len(&self, ptr: HeapPtr) -> Result<usize, ExecutionError> {
        match self.entries.borrow().get(ptr) {
            Some(HeapEntry::Array { contents, .. }) => Ok(contents.len()),
            _ => Err(ExecutionError::TypeMismatch { expected: "array" }),
        }
    }

    pub fn array_get(&self, ptr: HeapPtr, index: i32) -> Result<Value, ExecutionError> {
        match self.entries.borrow().get(ptr) {
            Some(HeapEntry::Array { contents, .. }) => {
                if index < 0 || index as usize >= contents.len() {
                    return Err(ExecutionError::IndexOutOfBounds {
                        index,
                        len: contents.len(),
                    });
                }
                Ok(contents[index as usize].clone())
            }
            _ => Err(ExecutionError::TypeMismatch { expected: "array" }),
        }
    }

    pub fn array_set(&self, ptr: HeapPtr, index: i32, value: Value) -> Result<(), ExecutionError> {
        match self.entries.borrow_mut().get_mut(ptr) {
            Some(HeapEntry::Array { contents, .. }) => {
                if index < 0 || index as usize >= contents.len() {
                    return Err(ExecutionError::IndexOutOfBounds {
                        index,
                        len: contents.len(),
                    });
                }
                contents[index as usize] = value;
                Ok(())
            }
            _ => Err(ExecutionError::TypeMismatch { expected: "array" }),
        }
    }

    /// Read an instance field, materializing the zero value of `kind` on
    /// the first read of a field that was never written.
    pub fn object_field(
        &self,
        ptr: HeapPtr,
        name: &str,
        kind: Type,
    ) -> Result<Value, ExecutionError> {
        match self.entries.borrow_mut().get_mut(ptr) {
            Some(HeapEntry::Object { fields, .. }) => Ok(fields
                .entry(name.to_string())
                .or_insert_with(|| kind.zero_value())
                .clone()),
            _ => Err(ExecutionError::TypeMismatch { expected: "object" }),
        }
    }

    pub fn set_object_field(
        &self,
        ptr: HeapPtr,
        name: &str,
        value: Value,
    ) -> Result<(), ExecutionError> {
        match self.entries.borrow_mut().get_mut(ptr) {
            Some(HeapEntry::Object { fields, .. }) => {
                fields.insert(name.to_string(), value);
                Ok(())
            }
            _ => Err(ExecutionError::TypeMismatch { expected: "object" }),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Snapshot for visualizers.
    pub fn inspect(&self) -> Vec<HeapEntry> {
        self.entries.borrow().clone()
    }
}
