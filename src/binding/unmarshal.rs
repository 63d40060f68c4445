//! Load: pull stored values into a configuration value.
//!
//! # Responsibilities
//! - Read each tagged leaf and parse it into the bound field
//! - Rebuild lists from a directory's children, ordered by numeric suffix
//! - Fill pre-allocated maps from a directory's leaves
//!
//! Load stops at the first failure. Fields written before it keep their
//! new values.

use futures_util::future::BoxFuture;

use crate::binding::field::{Bind, Field, FieldMut, IntoField};
use crate::binding::path::join;
use crate::error::{Error, Result};
use crate::store::{Node, Store};

/// Read every tagged field of `root` from the store.
pub async fn load<S, F>(store: &S, root: &mut F) -> Result<()>
where
    S: Store + ?Sized,
    F: IntoField + 'static,
{
    let FieldMut::Struct(target) = root.as_field() else {
        return Err(Error::Structural {
            type_name: std::any::type_name::<F>(),
        });
    };
    Unmarshaler { store }.load_struct(String::new(), target).await
}

/// Read a single field rooted at `path`.
pub async fn load_field<S>(store: &S, path: &str, field: FieldMut<'_>) -> Result<()>
where
    S: Store + ?Sized,
{
    Unmarshaler { store }.load_field(path, field).await
}

struct Unmarshaler<'s, S: ?Sized> {
    store: &'s S,
}

impl<S: Store + ?Sized> Unmarshaler<'_, S> {
    fn load_struct<'a>(&'a self, base: String, target: &'a mut dyn Bind) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let fields: Vec<Field<'_>> = target.fields();
            for field in fields {
                if !field.is_tagged() {
                    continue;
                }
                let path = join(&base, field.segment());
                self.load_field(&path, field.into_value()).await?;
            }
            Ok(())
        })
    }

    async fn load_field(&self, path: &str, field: FieldMut<'_>) -> Result<()> {
        match field {
            FieldMut::Scalar(mut scalar) => {
                let node = self.get(path, false).await?;
                if node.dir {
                    return Err(Error::type_mismatch(
                        path,
                        format!("expected a {} leaf, found a directory", scalar.kind()),
                    ));
                }
                scalar
                    .assign(&node.value)
                    .map_err(|reason| Error::type_mismatch(path, reason))
            }
            FieldMut::Struct(nested) => self.load_struct(path.to_string(), nested).await,
            FieldMut::ScalarList(mut list) => {
                let node = self.get_dir(path, true).await?;
                let children = ordered_children(&node)?;
                let mut texts = Vec::with_capacity(children.len());
                for child in children {
                    if child.dir {
                        return Err(Error::type_mismatch(
                            &child.key,
                            format!("expected a {} leaf, found a directory", list.kind()),
                        ));
                    }
                    texts.push(child.value.as_str());
                }
                list.replace(&texts)
                    .map_err(|reason| Error::type_mismatch(path, reason))
            }
            FieldMut::StructList(list) => {
                let node = self.get_dir(path, true).await?;
                let keys: Vec<String> = ordered_children(&node)?
                    .into_iter()
                    .map(|child| child.key.clone())
                    .collect();
                list.reset(keys.len());
                for (element, key) in list.elements().into_iter().zip(keys) {
                    self.load_struct(key, element).await?;
                }
                Ok(())
            }
            FieldMut::StringMap(None) => Err(Error::NilDestination {
                path: path.to_string(),
            }),
            FieldMut::StringMap(Some(map)) => {
                let node = self.get_dir(path, false).await?;
                for child in node.nodes.iter().filter(|child| !child.dir) {
                    map.insert(child.name().to_string(), child.value.clone());
                }
                Ok(())
            }
        }
    }

    async fn get(&self, path: &str, recursive: bool) -> Result<Node> {
        tracing::debug!(path, recursive, "Fetching node");
        self.store
            .get(path, true, recursive)
            .await
            .map_err(|source| Error::store(path, source))
    }

    async fn get_dir(&self, path: &str, recursive: bool) -> Result<Node> {
        let node = self.get(path, recursive).await?;
        if !node.dir {
            return Err(Error::type_mismatch(path, "expected a directory, found a leaf"));
        }
        Ok(node)
    }
}

/// Children of a list directory, ordered by their numeric key suffix.
pub(crate) fn ordered_children(node: &Node) -> Result<Vec<&Node>> {
    let mut indexed = node
        .nodes
        .iter()
        .map(|child| match child.name().parse::<u64>() {
            Ok(index) => Ok((index, child)),
            Err(_) => Err(Error::type_mismatch(
                &child.key,
                "list entry key is not numeric",
            )),
        })
        .collect::<Result<Vec<_>>>()?;
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, child)| child).collect())
}
