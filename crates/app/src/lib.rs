pub mod client;
pub mod config;
pub mod error;
pub mod fixtures;
pub mod harness;
pub mod model;
pub mod normalize;
pub mod scenario;

pub use client::{ApiClient, ApiResponse};
pub use error::ApiError;
pub use normalize::{ItemLookup, Normalized, normalize};
