pub mod client;
pub mod error;
pub mod types;

pub use client::{ArcClient, ContentApi};
pub use error::{ApiError, ErrorKind};
pub use types::{SearchQuery, SearchResponse, Story};
