//! Trading API access for perpdeck.
//!
//! - `ApiClient`: capability trait used by the atoms
//! - `HttpApiClient`: reqwest implementation with bounded retry
//! - `MockApiClient`: canned responses and call recording

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod mock;

pub use client::{endpoint, ApiClient};
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use http::HttpApiClient;
pub use mock::{MockApiClient, MockCall};
