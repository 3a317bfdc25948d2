//! # Types Module
//!
//! The host's type space, made explicit. Rust has no runtime reflection, so every
//! "binary module" the host knows about is a [`Module`] value holding the
//! [`TypeInfo`]s it exports, and every type mentioned by a handler definition or by
//! generated source is a [`TypeRef`].
//!
//! The [`TypeCatalog`] always contains the bootstrap modules:
//!
//! - `core` - `Object`, `Bool`, `Int`, `Long`, `Float`, `String`, `List<T>`, `Map<K, V>`
//! - `forge.host` - the base `Controller` type endpoint types extend
//! - `forge.bridge` - the `RequestProcessor` contract generated operations call into

mod catalog;
mod module;
mod type_ref;

pub use catalog::{
    controller_type, object_type, processor_type, TypeCatalog, BRIDGE_MODULE, CORE_MODULE,
    HOST_MODULE,
};
pub use module::{FieldInfo, Module, ModuleOrigin, TypeInfo};
pub use type_ref::{ModuleId, Primitive, TypeRef};
