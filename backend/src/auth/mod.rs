//! Authentication
//!
//! Users, password hashing, opaque session tokens stored server-side with an
//! expiry, and the [`CurrentUser`] extractor that gates protected routes.

pub mod extractor;
pub mod models;
pub mod password;
pub mod store;
pub mod token;
pub mod validation;

pub use extractor::{session_cookie, session_token_from_headers, CurrentUser, SESSION_COOKIE};
pub use models::{User, UserCredentials};
pub use password::{hash_password, verify_password};
pub use store::AuthStore;
pub use token::generate_session_token;
