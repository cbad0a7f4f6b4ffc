//! Report parsers for the supported upload formats

pub mod bom;
pub mod scan;
pub mod traits;

pub use bom::*;
pub use scan::*;
pub use traits::*;
