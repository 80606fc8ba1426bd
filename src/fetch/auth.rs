//! [`HttpClient`](super::HttpClient) decorators that add credentials.

mod api_key;

pub use api_key::ApiKey;
