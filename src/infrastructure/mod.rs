//! Infrastructure Layer - External concerns and implementations
//!
//! This module handles the feed and session services, report parsing, and the
//! dependency store.

pub mod api_clients;
pub mod parsers;
pub mod repositories;
pub mod resilience;
pub mod storage;
pub mod vulnerability_index;

// Re-export specific items to avoid ambiguous glob conflicts
pub use api_clients::{
    AdvisoryFeed, AllowAllValidator, FeedClient, HttpSessionValidator, SessionCredential,
    SessionValidator,
};
pub use parsers::{ParseContext, ParserRegistry, ReportParser};
pub use repositories::*;
pub use resilience::*;
pub use vulnerability_index::{IndexHandle, VulnerabilityIndex};
