//! Clients for the feed and session services

pub mod feed;
pub mod traits;
pub mod validator;

pub use feed::*;
pub use traits::*;
pub use validator::*;
