//! `@import` flattening with a per-entry cache.
//!
//! # Directives
//!
//! A directive must start at column 0:
//!
//! ```text
//! -- @import lib/door.lua
//! // @import /lib/common.lua
//! ```
//!
//! Directive lines are dropped from the output. Everything else is
//! copied through unchanged.
//!
//! # Ordering
//!
//! ```text
//!        A              output: D, B, C, A
//!       / \
//!      B   C            D appears once; its mtime still counts
//!       \ /
//!        D
//! ```
//!
//! Resolution is a depth-first walk; a file is emitted after all of its
//! imports. The cache holds one [`Resolved`] per entry path and is only
//! cleared by [`SourceResolver::invalidate`] and
//! [`SourceResolver::invalidate_all`].
//!
//! Closures are loaded without holding the cache lock. Every
//! invalidation bumps a generation counter, and a load that started
//! before an invalidation is returned to its caller but not cached.

use crate::path::{normalize, resolve_import};
use crate::tree::SourceTree;
use crate::SourceError;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace};

const DIRECTIVE_PREFIXES: [&str; 2] = ["-- @import", "// @import"];

/// A flattened compilation unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Normalized entry path.
    pub path: String,
    /// Concatenated source, dependencies first.
    pub source: Arc<str>,
    /// Maximum modification time over the whole closure.
    pub modified: u64,
    /// Every file in the closure in output order, entry last.
    pub dependencies: Vec<String>,
}

impl Resolved {
    #[must_use]
    pub fn depends_on(&self, path: &str) -> bool {
        self.dependencies.iter().any(|d| d == path)
    }
}

/// Resolves and caches import closures over a [`SourceTree`].
pub struct SourceResolver {
    tree: Arc<dyn SourceTree>,
    cache: RwLock<Cache>,
}

#[derive(Default)]
struct Cache {
    entries: HashMap<String, Arc<Resolved>>,
    generation: u64,
}

impl std::fmt::Debug for SourceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceResolver")
            .field("cached", &self.cache.read().entries.len())
            .finish()
    }
}

impl SourceResolver {
    #[must_use]
    pub fn new(tree: Arc<dyn SourceTree>) -> Self {
        Self {
            tree,
            cache: RwLock::new(Cache::default()),
        }
    }

    /// Returns the flattened source for `path`, from cache when present.
    ///
    /// # Errors
    ///
    /// Any load failure in the closure, a malformed directive, or
    /// [`SourceError::ImportCycle`].
    pub fn resolve(&self, path: &str) -> Result<Arc<Resolved>, SourceError> {
        let entry = normalize(path)?;
        let generation = {
            let cache = self.cache.read();
            if let Some(hit) = cache.entries.get(&entry) {
                trace!(path = %entry, "source cache hit");
                return Ok(Arc::clone(hit));
            }
            cache.generation
        };

        let mut walk = Walk::default();
        walk.visit(self.tree.as_ref(), &entry)?;
        let resolved = Arc::new(Resolved {
            path: entry.clone(),
            source: Arc::from(walk.output),
            modified: walk.modified,
            dependencies: walk.order,
        });
        debug!(
            path = %entry,
            files = resolved.dependencies.len(),
            modified = resolved.modified,
            "resolved source"
        );
        let mut cache = self.cache.write();
        if cache.generation == generation {
            cache.entries.insert(entry, Arc::clone(&resolved));
        } else {
            debug!(path = %entry, "invalidated while loading, not cached");
        }
        Ok(resolved)
    }

    /// Drops every cached closure that includes `path`. Returns how many
    /// entries were removed.
    pub fn invalidate(&self, path: &str) -> usize {
        let Ok(path) = normalize(path) else {
            return 0;
        };
        let mut cache = self.cache.write();
        cache.generation += 1;
        let before = cache.entries.len();
        cache
            .entries
            .retain(|entry, resolved| entry != &path && !resolved.depends_on(&path));
        let removed = before - cache.entries.len();
        if removed > 0 {
            debug!(path = %path, removed, "invalidated source cache");
        }
        removed
    }

    pub fn invalidate_all(&self) {
        let mut cache = self.cache.write();
        cache.generation += 1;
        cache.entries.clear();
    }

    /// Entry paths currently cached, sorted.
    #[must_use]
    pub fn cached_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.cache.read().entries.keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[derive(Default)]
struct Walk {
    stack: Vec<String>,
    done: HashSet<String>,
    order: Vec<String>,
    output: String,
    modified: u64,
}

impl Walk {
    fn visit(&mut self, tree: &dyn SourceTree, path: &str) -> Result<(), SourceError> {
        let file = tree.load(path)?;
        self.modified = self.modified.max(file.modified);
        self.stack.push(path.to_string());

        let mut body = String::with_capacity(file.text.len());
        for (idx, line) in file.text.lines().enumerate() {
            let Some(target) = directive_target(line) else {
                body.push_str(line);
                body.push('\n');
                continue;
            };
            if target.is_empty() {
                return Err(SourceError::InvalidDirective {
                    path: path.to_string(),
                    line: idx + 1,
                });
            }
            let import = resolve_import(path, target)?;
            if self.stack.contains(&import) {
                return Err(SourceError::ImportCycle {
                    path: import,
                    chain: self.stack.clone(),
                });
            }
            if self.done.contains(&import) {
                continue;
            }
            self.visit(tree, &import)?;
        }

        self.stack.pop();
        self.done.insert(path.to_string());
        self.order.push(path.to_string());
        self.output.push_str(&body);
        Ok(())
    }
}

/// Returns the import target if `line` is a directive.
fn directive_target(line: &str) -> Option<&str> {
    DIRECTIVE_PREFIXES.iter().find_map(|prefix| {
        let rest = line.strip_prefix(prefix)?;
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return None;
        }
        Some(rest.trim().trim_matches(|c| c == '"' || c == '\''))
    })
}
