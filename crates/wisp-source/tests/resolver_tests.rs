//! Import resolution behavior over whole closures.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use wisp_source::{
    FsSourceTree, MemorySourceTree, SourceError, SourceFile, SourceResolver, SourceTree,
};

// =============================================================================
// Ordering
// =============================================================================

mod ordering {
    use super::*;

    fn diamond() -> MemorySourceTree {
        MemorySourceTree::new()
            .with_file("/d.lua", "d = true")
            .with_file("/b.lua", "-- @import d.lua\nb = true")
            .with_file("/c.lua", "-- @import /d.lua\nc = true")
            .with_file("/a.lua", "-- @import b.lua\n-- @import c.lua\na = true")
    }

    #[test]
    fn diamond_includes_shared_dependency_once() {
        let resolver = SourceResolver::new(Arc::new(diamond()));
        let unit = resolver.resolve("/a.lua").unwrap();

        assert_eq!(&*unit.source, "d = true\nb = true\nc = true\na = true\n");
        assert_eq!(unit.source.matches("d = true").count(), 1);
        assert_eq!(unit.dependencies, vec!["/d.lua", "/b.lua", "/c.lua", "/a.lua"]);
    }

    #[test]
    fn diamond_mtime_counts_deduplicated_file() {
        let tree = diamond();
        tree.write_at("/d.lua", "d = true", 9_000).unwrap();
        let resolver = SourceResolver::new(Arc::new(tree));
        assert_eq!(resolver.resolve("/a.lua").unwrap().modified, 9_000);
    }

    #[test]
    fn resolution_is_deterministic() {
        let first = SourceResolver::new(Arc::new(diamond()))
            .resolve("/a.lua")
            .unwrap();
        let second = SourceResolver::new(Arc::new(diamond()))
            .resolve("/a.lua")
            .unwrap();
        assert_eq!(first.source, second.source);
        assert_eq!(first.dependencies, second.dependencies);
    }

    #[test]
    fn slash_comment_directive() {
        let tree = MemorySourceTree::new()
            .with_file("/lib/util.lua", "util = 1")
            .with_file("/rooms/a.lua", "// @import ../lib/util.lua\nroom = 1");
        let unit = SourceResolver::new(Arc::new(tree))
            .resolve("/rooms/a.lua")
            .unwrap();
        assert_eq!(&*unit.source, "util = 1\nroom = 1\n");
    }
}

// =============================================================================
// Cycles
// =============================================================================

mod cycles {
    use super::*;

    #[test]
    fn two_file_cycle_is_hard_failure() {
        let tree = MemorySourceTree::new()
            .with_file("/a.lua", "-- @import b.lua\n")
            .with_file("/b.lua", "-- @import a.lua\n");
        let resolver = SourceResolver::new(Arc::new(tree));

        match resolver.resolve("/a.lua") {
            Err(SourceError::ImportCycle { path, chain }) => {
                assert_eq!(path, "/a.lua");
                assert_eq!(chain, vec!["/a.lua", "/b.lua"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
        assert!(resolver.cached_paths().is_empty());
    }

    #[test]
    fn long_cycle_reports_offender() {
        let tree = MemorySourceTree::new()
            .with_file("/a.lua", "-- @import b.lua\n")
            .with_file("/b.lua", "-- @import c.lua\n")
            .with_file("/c.lua", "-- @import b.lua\n");
        let err = SourceResolver::new(Arc::new(tree))
            .resolve("/a.lua")
            .unwrap_err();
        assert!(matches!(err, SourceError::ImportCycle { ref path, .. } if path == "/b.lua"));
    }
}

// =============================================================================
// Cache
// =============================================================================

mod cache {
    use super::*;

    #[test]
    fn cached_until_invalidated() {
        let tree = Arc::new(
            MemorySourceTree::new()
                .with_file("/lib.lua", "v = 1")
                .with_file("/a.lua", "-- @import lib.lua\n"),
        );
        let resolver = SourceResolver::new(tree.clone());

        let first = resolver.resolve("/a.lua").unwrap();
        tree.write("/lib.lua", "v = 2").unwrap();
        let stale = resolver.resolve("/a.lua").unwrap();
        assert!(Arc::ptr_eq(&first, &stale));

        assert_eq!(resolver.invalidate("/lib.lua"), 1);
        let fresh = resolver.resolve("/a.lua").unwrap();
        assert_eq!(&*fresh.source, "v = 2\n");
        assert!(fresh.modified > first.modified);
    }

    #[test]
    fn invalidate_only_touches_dependents() {
        let tree = MemorySourceTree::new()
            .with_file("/lib.lua", "lib = 1")
            .with_file("/a.lua", "-- @import lib.lua\n")
            .with_file("/b.lua", "b = 1");
        let resolver = SourceResolver::new(Arc::new(tree));
        resolver.resolve("/a.lua").unwrap();
        resolver.resolve("/b.lua").unwrap();
        resolver.resolve("/lib.lua").unwrap();

        assert_eq!(resolver.invalidate("/lib.lua"), 2);
        assert_eq!(resolver.cached_paths(), vec!["/b.lua"]);
    }

    /// Pauses the first load of a closure after reading it, until the
    /// test has edited the tree.
    struct PausingTree {
        inner: MemorySourceTree,
        pause: AtomicBool,
        loaded: Barrier,
        resume: Barrier,
    }

    impl SourceTree for PausingTree {
        fn load(&self, path: &str) -> Result<SourceFile, SourceError> {
            let file = self.inner.load(path)?;
            if self.pause.swap(false, Ordering::SeqCst) {
                self.loaded.wait();
                self.resume.wait();
            }
            Ok(file)
        }
    }

    #[test]
    fn invalidation_during_load_is_not_lost() {
        let tree = Arc::new(PausingTree {
            inner: MemorySourceTree::new().with_file("/a.lua", "v = 1"),
            pause: AtomicBool::new(true),
            loaded: Barrier::new(2),
            resume: Barrier::new(2),
        });
        let resolver = Arc::new(SourceResolver::new(tree.clone()));

        let r = Arc::clone(&resolver);
        let loader = std::thread::spawn(move || r.resolve("/a.lua").unwrap());
        tree.loaded.wait();
        tree.inner.write("/a.lua", "v = 2").unwrap();
        assert_eq!(resolver.invalidate("/a.lua"), 0);
        tree.resume.wait();

        let raced = loader.join().unwrap();
        assert_eq!(&*raced.source, "v = 1\n");
        assert!(resolver.cached_paths().is_empty());
        assert_eq!(&*resolver.resolve("/a.lua").unwrap().source, "v = 2\n");
    }

    #[test]
    fn invalidate_all_clears() {
        let tree = MemorySourceTree::new().with_file("/a.lua", "a = 1");
        let resolver = SourceResolver::new(Arc::new(tree));
        resolver.resolve("/a.lua").unwrap();
        resolver.invalidate_all();
        assert!(resolver.cached_paths().is_empty());
    }
}

// =============================================================================
// Filesystem
// =============================================================================

#[test]
fn filesystem_tree_resolves_relative_imports() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("lib")).unwrap();
    std::fs::create_dir_all(dir.path().join("rooms")).unwrap();
    std::fs::write(dir.path().join("lib/door.lua"), "door = true\n").unwrap();
    std::fs::write(
        dir.path().join("rooms/tavern.lua"),
        "-- @import ../lib/door.lua\ntavern = true\n",
    )
    .unwrap();

    let resolver = SourceResolver::new(Arc::new(FsSourceTree::new(dir.path())));
    let unit = resolver.resolve("rooms/tavern.lua").unwrap();
    assert_eq!(&*unit.source, "door = true\ntavern = true\n");
    assert_eq!(unit.path, "/rooms/tavern.lua");
}
