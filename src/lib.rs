// mangofetch library.
// Shared HTTP getter with URL-keyed response caching and typed errors.

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod opendota;

pub use config::Config;
pub use error::{FetchError, Result};
pub use http::{ErrorOverrides, GetRequest, HttpGetter, Payload, PostRequest, Representation};
