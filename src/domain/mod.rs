//! Domain Layer - Core entities and value objects
//!
//! This module contains the dependency record model, the identifiers it is keyed
//! by, and the reference-URL rules shared by every input format.

pub mod entities;
pub mod errors;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use value_objects::*;
