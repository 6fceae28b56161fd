//! Workspace model loading, merging, caching and bootstrap.

pub mod bootstrap;
pub mod document;
pub mod includes;
pub mod layout;
pub mod model;
pub mod parse_info;
pub mod partials;
pub mod provider;
pub mod token;

pub use bootstrap::build_initial_config;
pub use layout::WorkspaceLayout;
pub use model::{ContentDescriptor, Field, WorkspaceConfig};
pub use parse_info::{ParseInfo, ParseInfoEntry};
pub use partials::{HttpFetcher, PartialFetcher, PartialResolution, PartialSource};
pub use provider::ConfigProvider;
pub use token::CacheToken;
