//! Structural mapping between configuration values and store paths.
//!
//! # Data Flow
//! ```text
//! T: Bind ──fields()──▶ Field { segment, FieldMut }
//!     → resolver.rs  (absolute paths, PathRegistry)
//!     → marshal.rs   (Save: Set / CreateDir / CreateInOrder)
//!     → unmarshal.rs (Load: Get, parse, rebuild lists and maps)
//!     → watcher.rs   (Watch: blocking subscription on one path)
//! ```
//!
//! # Design Decisions
//! - Fields opt in through [`Bind`]; anything not listed is never touched
//! - Every traversal matches on the closed [`FieldMut`] variant, so an
//!   unsupported field type is a compile error rather than a runtime one
//! - Traversals are depth-first in declaration order and stop at the first
//!   error; nothing is rolled back
//! - A field's identity for Watch is its storage location plus its type

pub mod field;
pub mod marshal;
pub mod path;
pub mod resolver;
pub mod unmarshal;
pub mod watcher;

pub use field::{Bind, Field, FieldKey, FieldKind, FieldMut, IntoField, ScalarKind, StructList};
pub use marshal::save;
pub use path::join;
pub use resolver::{resolve, FieldDescriptor, PathRegistry};
pub use unmarshal::load;
pub use watcher::{WatchHandle, WatchOutcome};
