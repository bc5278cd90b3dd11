//! API middleware

mod push_token;

pub use push_token::{PushAuthorized, PUSH_TOKEN_HEADER};
