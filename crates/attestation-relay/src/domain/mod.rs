//! # Domain Module
//!
//! Wire envelopes, claim identity and keys, the quorum threshold, the
//! relay's error type and the rules a receipt log must satisfy.

pub mod entities;
pub mod errors;
pub mod invariants;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use value_objects::*;
