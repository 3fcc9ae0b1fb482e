//! Application services and the ports they depend on.

pub mod comments;
pub mod error;
pub mod pagination;
pub mod repos;
