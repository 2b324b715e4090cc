//! Authentication
//!
//! Token storage, the token manager, the OAuth/PKCE flow helper and the
//! transport decorator that authenticates API requests.

pub mod file_storage;
pub mod flow;
pub mod handler;
pub mod manager;
pub mod storage;

pub use file_storage::FileTokenStorage;
pub use flow::{AuthorizationUrl, OAuthFlowHelper};
pub use handler::AuthenticatedTransport;
pub use manager::{DefaultTokenManager, MockTokenManager, TokenManager};
pub use storage::{validate_key, InMemoryTokenStorage, MockTokenStorage, TokenStorage};
