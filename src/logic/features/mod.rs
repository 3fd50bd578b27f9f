//! Features Module - Feature Extraction Engine
//!
//! Layout, validated vector type, and the URL → vector extractors.

pub mod layout;
pub mod vector;
pub mod page;
pub mod http;


// Re-export common types
pub use layout::{FEATURE_COUNT, FEATURE_LAYOUT, feature_name};
pub use vector::{ExtractError, FeatureError, FeatureExtractor, FeatureVector};
pub use page::{DomainAgeLookup, PageSnapshot, UnknownDomainAge};
pub use http::HttpFeatureExtractor;
