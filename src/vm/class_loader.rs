use crate::vm::class_file::parse_class;
use crate::vm::classes::{Class, ClassId};
use crate::vm::error::{LinkageError, Result};
use log::{debug, info};
use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Owns every loaded class. The vector is append-only: a `ClassId` handed
/// out once stays valid for the process lifetime. Resolution falls back
/// to the directory search path, probing `<dir>/<binary name>.class`.
#[derive(Default)]
pub struct ClassRegistry {
    classes: RefCell<Vec<Class>>,
    by_name: RefCell<HashMap<String, ClassId>>,
    dirs: RefCell<Vec<PathBuf>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add_directory(&self, dir: impl Into<PathBuf>) {
        self.dirs.borrow_mut().push(dir.into());
    }

    /// Append a decoded class and hand out its id.
    pub fn register(&self, class: Class) -> ClassId {
        let mut classes = self.classes.borrow_mut();
        let id = classes.len();
        self.by_name
            .borrow_mut()
            .insert(class.name().to_string(), id);
        info!("loaded class {} as #{}", class.name(), id);
        classes.push(class);
        id
    }

    pub fn lookup(&self, name: &str) -> Option<ClassId> {
        self.by_name.borrow().get(name).copied()
    }

    /// Resolve a binary name to a loaded class, consulting the directory
    /// search path for classes not seen yet. Array-of-reference
    /// descriptors (`[L<name>;`) resolve to their element class.
    pub fn resolve(&self, name: &str) -> Result<ClassId> {
        let name = strip_array_descriptor(name);
        if let Some(id) = self.lookup(name) {
            return Ok(id);
        }
        for dir in self.dirs.borrow().iter() {
            let path = dir.join(format!("{}.class", name));
            let data = match fs::read(&path) {
                Ok(data) => data,
                Err(_) => continue,
            };
            match parse_class(&data) {
                Ok(class) => {
                    self.register(class);
                }
                Err(err) => {
                    debug!("skipping {}: {}", path.display(), err);
                }
            }
        }
        self.lookup(name)
            .ok_or_else(|| LinkageError::ClassNotFound(name.to_string()).into())
    }

    pub fn get(&self, id: ClassId) -> Ref<Class> {
        Ref::map(self.classes.borrow(), |classes| &classes[id])
    }

    pub fn get_mut(&self, id: ClassId) -> RefMut<Class> {
        RefMut::map(self.classes.borrow_mut(), |classes| &mut classes[id])
    }

    pub fn len(&self) -> usize {
        self.classes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.borrow().is_empty()
    }

    /// First registered class satisfying `predicate`, in load order.
    pub fn find(&self, predicate: impl Fn(&Class) -> bool) -> Option<ClassId> {
        self.classes.borrow().iter().position(|c| predicate(c))
    }
}

fn strip_array_descriptor(name: &str) -> &str {
    if let Some(stripped) = name.strip_prefix("[L") {
        stripped.strip_suffix(';').unwrap_or(stripped)
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_descriptors_resolve_to_the_element_class() {
        assert_eq!(
            strip_array_descriptor("[Ljava/lang/String;"),
            "java/lang/String"
        );
        assert_eq!(strip_array_descriptor("java/lang/String"), "java/lang/String");
    }

    #[test]
    fn missing_class_is_a_linkage_error() {
        let registry = ClassRegistry::new();
        assert!(registry.resolve("does/not/Exist").is_err());
    }
}
