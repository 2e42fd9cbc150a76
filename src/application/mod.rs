//! Application services layer scaffolding.

pub mod cascade;
pub mod pagination;
pub mod preview;
pub mod repos;
