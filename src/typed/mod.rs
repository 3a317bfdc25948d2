//! # Typed Module
//!
//! Typed handlers behind the request processing bridge.
//!
//! Generated operations hand the dispatcher a JSON request object keyed by its
//! `(request type, response type)` pair. [`HandlerDispatcher`] decodes that object
//! into the handler's own request struct with serde and encodes the handler's
//! response the same way, so handlers never touch raw JSON.
//!
//! ```rust
//! use brrtforge::bridge::{RequestDispatcher, RequestKey};
//! use brrtforge::typed::HandlerDispatcher;
//! use brrtforge::types::TypeRef;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Deserialize)]
//! struct GetPet {
//!     #[serde(rename = "Id")]
//!     id: i64,
//! }
//!
//! #[derive(Serialize)]
//! struct Pet {
//!     id: i64,
//!     name: String,
//! }
//!
//! let key = RequestKey::new(TypeRef::named("app.pets", "GetPet"), TypeRef::named("app.pets", "Pet"));
//! let mut dispatcher = HandlerDispatcher::new();
//! dispatcher.register_fn(key.clone(), |req: GetPet| {
//!     Ok(Pet { id: req.id, name: "Fluffy".to_string() })
//! });
//!
//! let pet = dispatcher.process(&key, serde_json::json!({ "Id": 7 })).unwrap();
//! assert_eq!(pet["name"], "Fluffy");
//! ```

mod core;

pub use core::*;
