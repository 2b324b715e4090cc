//! Procore Types
//!
//! Configuration, token, domain model and request type definitions.

pub mod config;
pub mod models;
pub mod pagination;
pub mod requests;
pub mod token;

pub use config::*;
pub use models::*;
pub use pagination::*;
pub use requests::*;
pub use token::*;
