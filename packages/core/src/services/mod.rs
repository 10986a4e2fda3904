//! Services
//!
//! - `TreeService` - creates nodes, moves subtrees and answers relation reads
//!
//! The service owns transaction boundaries and retries; the path arithmetic
//! lives in [`crate::operations`].

pub mod error;
pub mod tree_service;

pub use error::TreeServiceError;
pub use tree_service::TreeService;
