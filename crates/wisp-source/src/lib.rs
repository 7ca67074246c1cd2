//! Script source loading for wisp.
//!
//! Objects name their behavior by a source path. Before a script runs,
//! the [`SourceResolver`] flattens the file's `@import` closure into a
//! single compilation unit and reports the newest modification time in
//! that closure, which the script engine uses to decide whether its
//! compiled copy is stale.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use wisp_source::{MemorySourceTree, SourceResolver};
//!
//! let tree = MemorySourceTree::new()
//!     .with_file("/lib/greet.lua", "function greet() return 'hi' end")
//!     .with_file("/rooms/tavern.lua", "-- @import ../lib/greet.lua\nprint(greet())");
//!
//! let resolver = SourceResolver::new(Arc::new(tree));
//! let unit = resolver.resolve("/rooms/tavern.lua").unwrap();
//! assert_eq!(unit.dependencies, vec!["/lib/greet.lua", "/rooms/tavern.lua"]);
//! assert!(unit.source.starts_with("function greet()"));
//! ```

mod error;
pub mod path;
mod resolver;
mod tree;

pub use error::SourceError;
pub use resolver::{Resolved, SourceResolver};
pub use tree::{FsSourceTree, MemorySourceTree, SourceFile, SourceTree};
