//! Core Components
//!
//! HTTP transport and PKCE primitives shared by the auth and client layers.

pub mod pkce;
pub mod transport;

pub use pkce::*;
pub use transport::*;
