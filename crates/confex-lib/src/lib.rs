//! Resolves abstract build environment requirements ("something that provides a C compiler",
//! "library `z`", "program `pkg-config`") into an ordered, validated set of tool applications.
//!
//! See [`configure`] for the request surface and [`augment_resolver`] for the search itself.

pub mod error;
pub use error::Result;
pub use error::Error;

pub mod config;
pub use config::ConfigureOptions;

pub mod environment;
pub use environment::BuildEnvironment;
pub use environment::EnvironmentId;
pub use environment::Value;
pub use environment::memory::MemoryEnvironment;
pub use environment::memory::ToolDefinition;

pub mod catalog;
pub use catalog::ToolCatalog;
pub use catalog::ToolRegistry;
pub use catalog::ComponentFlags;

pub mod specification;
pub use specification::Specification;
pub use specification::Check;
pub use specification::CheckContext;

pub mod config_header;
pub use config_header::ConfigHeader;

pub mod checks;
pub mod augment_resolver;

pub mod configure;
pub use configure::Configure;
pub use configure::Finished;
pub use configure::Binding;
pub use configure::Listing;
