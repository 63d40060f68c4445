//! Path resolution and the per-session path registry.
//!
//! # Responsibilities
//! - Walk a [`Bind`] structure and list every tagged field with its absolute path
//! - Recurse into nested structures, list elements (by position) and map entries (by key)
//! - Keep the session registry used by Watch to map a field back to its path

use dashmap::DashMap;

use crate::binding::field::{Bind, Field, FieldKey, FieldKind, FieldMut, IntoField, ScalarKind};
use crate::binding::path::join;
use crate::error::{Error, Result};

/// Absolute path, kind and storage location of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub path: String,
    pub kind: FieldKind,
    pub key: FieldKey,
}

/// Absolute path → field descriptor, plus the reverse location → path index.
///
/// Entries are only meaningful for the session (configuration value) that
/// produced them. Registering a path again replaces its descriptor.
#[derive(Debug, Default)]
pub struct PathRegistry {
    by_path: DashMap<String, FieldDescriptor>,
    by_key: DashMap<FieldKey, String>,
}

impl PathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, descriptor: FieldDescriptor) {
        self.by_key.insert(descriptor.key, descriptor.path.clone());
        self.by_path.insert(descriptor.path.clone(), descriptor);
    }

    pub fn extend(&self, descriptors: impl IntoIterator<Item = FieldDescriptor>) {
        for descriptor in descriptors {
            self.insert(descriptor);
        }
    }

    /// Descriptor registered at an absolute path.
    pub fn get(&self, path: &str) -> Option<FieldDescriptor> {
        self.by_path.get(path).map(|entry| entry.value().clone())
    }

    /// Descriptor of the field stored at `key`.
    pub fn lookup(&self, key: &FieldKey) -> Option<FieldDescriptor> {
        let path = self.by_key.get(key)?.value().clone();
        self.get(&path)
    }

    pub fn path_of(&self, key: &FieldKey) -> Option<String> {
        self.by_key.get(key).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// All descriptors, sorted by path.
    pub fn entries(&self) -> Vec<FieldDescriptor> {
        let mut entries: Vec<_> = self.by_path.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }
}

/// List every tagged field reachable from `root`, in traversal order.
///
/// Fails with a structural error when `root` is not a [`Bind`] structure.
pub fn resolve<F: IntoField + 'static>(root: &mut F) -> Result<Vec<FieldDescriptor>> {
    match root.as_field() {
        FieldMut::Struct(target) => {
            let mut descriptors = Vec::new();
            walk("", target, &mut descriptors);
            Ok(descriptors)
        }
        _ => Err(Error::Structural {
            type_name: std::any::type_name::<F>(),
        }),
    }
}

pub(crate) fn walk(base: &str, target: &mut dyn Bind, out: &mut Vec<FieldDescriptor>) {
    for field in target.fields().into_iter().filter(Field::is_tagged) {
        let path = join(base, field.segment());
        out.push(FieldDescriptor {
            path: path.clone(),
            kind: field.kind(),
            key: field.key(),
        });

        match field.into_value() {
            FieldMut::Scalar(_) | FieldMut::StringMap(None) => {}
            FieldMut::Struct(nested) => walk(&path, nested, out),
            FieldMut::ScalarList(list) => {
                let kind = FieldKind::Scalar(list.kind());
                for (index, key) in list.element_keys().into_iter().enumerate() {
                    out.push(FieldDescriptor {
                        path: join(&path, &index.to_string()),
                        kind,
                        key,
                    });
                }
            }
            FieldMut::StructList(list) => {
                let keys = list.element_keys();
                for (index, (element, key)) in list.elements().into_iter().zip(keys).enumerate() {
                    let element_path = join(&path, &index.to_string());
                    out.push(FieldDescriptor {
                        path: element_path.clone(),
                        kind: FieldKind::Struct,
                        key,
                    });
                    walk(&element_path, element, out);
                }
            }
            FieldMut::StringMap(Some(map)) => {
                for (name, value) in map.iter() {
                    out.push(FieldDescriptor {
                        path: join(&path, name),
                        kind: FieldKind::Scalar(ScalarKind::String),
                        key: FieldKey::of(value),
                    });
                }
            }
        }
    }
}
