//! # Synthesizer Module
//!
//! Turns each [`HandlerDefinition`](crate::definition::HandlerDefinition) into
//! forge source: one operation, plus one carrier shape when any parameter is
//! bound from the request body or a form.
//!
//! Source text is rendered with Askama. Operation names come from a
//! [`NameAllocator`] shared across a compilation (`Ping`, `Ping2`, ...); carrier
//! shapes and request variables carry a surrogate identifier from a
//! [`SurrogateSource`]. With [`SurrogateMode::Sequential`] the same definitions
//! always produce byte-identical source; with [`SurrogateMode::Random`] only the
//! surrogate identifiers differ between runs.

mod names;
mod surrogate;
mod synthesizer;
mod templates;

pub use names::{sanitize_ident, NameAllocator, NameCollisionExhaustion, DEFAULT_MAX_NAME_SUFFIX};
pub use surrogate::{SurrogateMode, SurrogateSource};
pub use synthesizer::{synthesize, OperationSpec, SynthesisError, Synthesizer};
