//! Save: push a configuration value into the store.
//!
//! # Responsibilities
//! - Write every tagged scalar as a leaf, formatted canonically
//! - Create directories for lists and maps, tolerating "already exists"
//! - Append scalar list elements in order; give struct list elements
//!   their own index-named directory
//! - Overwrite the stored positions of a list that already exists, and
//!   append only the elements beyond them
//!
//! Save is not transactional: writes that succeeded before a failure stay.

use futures_util::future::BoxFuture;

use crate::binding::field::{Bind, Field, FieldMut, IntoField};
use crate::binding::path::join;
use crate::binding::resolver::{walk, PathRegistry};
use crate::binding::unmarshal::ordered_children;
use crate::error::{Error, Result};
use crate::store::{Store, StoreError};

/// Register and write every tagged field of `root`.
pub async fn save<S, F>(store: &S, root: &mut F, registry: &PathRegistry, ttl: u64) -> Result<()>
where
    S: Store + ?Sized,
    F: IntoField + 'static,
{
    let FieldMut::Struct(target) = root.as_field() else {
        return Err(Error::Structural {
            type_name: std::any::type_name::<F>(),
        });
    };

    let mut descriptors = Vec::new();
    walk("", &mut *target, &mut descriptors);
    registry.extend(descriptors);

    Marshaler { store, ttl }.save_struct(String::new(), target).await
}

struct Marshaler<'s, S: ?Sized> {
    store: &'s S,
    ttl: u64,
}

impl<S: Store + ?Sized> Marshaler<'_, S> {
    fn save_struct<'a>(&'a self, base: String, target: &'a mut dyn Bind) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let fields: Vec<Field<'_>> = target.fields();
            for field in fields {
                if !field.is_tagged() {
                    continue;
                }
                let path = join(&base, field.segment());
                self.save_field(&path, field.into_value()).await?;
            }
            Ok(())
        })
    }

    async fn save_field(&self, path: &str, value: FieldMut<'_>) -> Result<()> {
        match value {
            FieldMut::Scalar(scalar) => self.set(path, &scalar.format()).await,
            FieldMut::Struct(nested) => self.save_struct(path.to_string(), nested).await,
            FieldMut::ScalarList(list) => {
                let stored = if self.create_dir(path).await? {
                    Vec::new()
                } else {
                    self.stored_positions(path).await?
                };
                for (position, value) in list.formatted().into_iter().enumerate() {
                    match stored.get(position) {
                        Some(key) => self.set(key, &value).await?,
                        None => {
                            tracing::debug!(path, position, "Appending list element");
                            self.store
                                .create_in_order(path, &value, self.ttl)
                                .await
                                .map_err(|source| Error::store(path, source))?;
                        }
                    }
                }
                Ok(())
            }
            FieldMut::StructList(list) => {
                self.create_dir(path).await?;
                for (index, element) in list.elements().into_iter().enumerate() {
                    let element_path = join(path, &index.to_string());
                    self.create_dir(&element_path).await?;
                    self.save_struct(element_path, element).await?;
                }
                Ok(())
            }
            FieldMut::StringMap(map) => {
                self.create_dir(path).await?;
                if let Some(map) = map {
                    let mut entries: Vec<_> = map.iter().collect();
                    entries.sort();
                    for (name, value) in entries {
                        self.set(&join(path, name), value).await?;
                    }
                }
                Ok(())
            }
        }
    }

    async fn set(&self, path: &str, value: &str) -> Result<()> {
        tracing::debug!(path, "Setting leaf");
        match self.store.set(path, value, self.ttl).await {
            Ok(_) => Ok(()),
            Err(StoreError::NotFile(_)) => Err(Error::type_mismatch(
                path,
                "cannot write a scalar over a directory",
            )),
            Err(source) => Err(Error::store(path, source)),
        }
    }

    /// Returns false when the directory was already there.
    async fn create_dir(&self, path: &str) -> Result<bool> {
        match self.store.create_dir(path, self.ttl).await {
            Ok(_) => {
                tracing::debug!(path, "Directory created");
                Ok(true)
            }
            Err(e) if e.is_already_exists() => {
                tracing::debug!(path, "Directory already exists");
                Ok(false)
            }
            Err(source) => Err(Error::store(path, source)),
        }
    }

    /// Keys of the positions an existing list directory holds, in list order.
    async fn stored_positions(&self, path: &str) -> Result<Vec<String>> {
        let node = self
            .store
            .get(path, true, false)
            .await
            .map_err(|source| Error::store(path, source))?;
        if !node.dir {
            return Err(Error::type_mismatch(path, "expected a directory, found a leaf"));
        }
        Ok(ordered_children(&node)?
            .into_iter()
            .map(|child| child.key.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Nested {
        subfield1: String,
    }

    crate::bind!(Nested { subfield1 => "/subfield1" });

    #[derive(Default)]
    struct Sample {
        field1: String,
        field2: i32,
        field3: i64,
        field4: bool,
        field5: Nested,
        field6: HashMap<String, String>,
        field7: Vec<String>,
        extra: String,
    }

    crate::bind!(Sample {
        field1 => "/field1",
        field2 => "/field2",
        field3 => "/field3",
        field4 => "/field4",
        field5 => "/field5",
        field6 => "/field6",
        field7 => "/field7",
    });

    #[tokio::test]
    async fn test_save_writes_every_tagged_field() {
        let store = MemoryStore::new();
        let registry = PathRegistry::new();
        let mut sample = Sample {
            field1: "value1".into(),
            field2: 10,
            field3: 999,
            field4: true,
            field5: Nested { subfield1: "value2".into() },
            field6: HashMap::from([("key1".to_string(), "value3".to_string())]),
            field7: vec!["value4".into(), "value5".into(), "value6".into()],
            extra: "not saved".into(),
        };

        save(&store, &mut sample, &registry, 0).await.unwrap();

        assert_eq!(store.value("/field1").as_deref(), Some("value1"));
        assert_eq!(store.value("/field2").as_deref(), Some("10"));
        assert_eq!(store.value("/field3").as_deref(), Some("999"));
        assert_eq!(store.value("/field4").as_deref(), Some("true"));
        assert_eq!(store.value("/field5/subfield1").as_deref(), Some("value2"));
        assert_eq!(store.value("/field6/key1").as_deref(), Some("value3"));
        assert_eq!(store.value("/field7/0").as_deref(), Some("value4"));
        assert_eq!(store.value("/field7/1").as_deref(), Some("value5"));
        assert_eq!(store.value("/field7/2").as_deref(), Some("value6"));
        assert!(store.snapshot().find("/extra").is_none());
        assert!(registry.get("/field5/subfield1").is_some());
    }

    #[tokio::test]
    async fn test_save_scalar_over_directory_is_type_mismatch() {
        let store = MemoryStore::new();
        store.create_dir("/field1", 0).await.unwrap();

        let mut sample = Sample::default();
        let err = save(&store, &mut sample, &PathRegistry::new(), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { ref path, .. } if path == "/field1"));
    }

    #[tokio::test]
    async fn test_resave_overwrites_list_positions() {
        let store = MemoryStore::new();
        let registry = PathRegistry::new();
        let mut sample = Sample {
            field7: vec!["a".into(), "b".into()],
            ..Sample::default()
        };
        save(&store, &mut sample, &registry, 0).await.unwrap();

        sample.field7 = vec!["x".into(), "y".into(), "z".into()];
        save(&store, &mut sample, &registry, 0).await.unwrap();

        let field7 = store.get("/field7", true, false).await.unwrap();
        assert_eq!(field7.nodes.len(), 3);
        assert_eq!(store.value("/field7/0").as_deref(), Some("x"));
        assert_eq!(store.value("/field7/1").as_deref(), Some("y"));
        assert_eq!(store.value("/field7/2").as_deref(), Some("z"));
    }

    #[tokio::test]
    async fn test_save_applies_ttl() {
        let store = MemoryStore::new();
        let mut sample = Sample::default();
        save(&store, &mut sample, &PathRegistry::new(), 60).await.unwrap();

        let node = store.get("/field1", false, false).await.unwrap();
        assert_eq!(node.ttl, Some(60));
    }
}
