//! The wisp object runtime.
//!
//! Everything in a wisp world is an [`Object`](wisp_types::Object) whose
//! behavior lives in a script. This crate owns the world and decides
//! when scripts run:
//!
//! ```text
//!   typed command ─┐
//!   admin / emit  ─┼──▶ Dispatcher ──▶ ScriptEngine (wisp-lua)
//!   timer fire    ─┘        │                │
//!                           │        HostApi calls
//!                           ▼                │
//!            Containment · ObjectStore · TimerRegistry · SkillConfigStore
//! ```
//!
//! # Modules
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`store`] | object storage with per-object locks |
//! | [`containment`] | moves, creation and removal; keeps the graph a forest |
//! | [`challenge`] | skill challenges for visibility, exits and emits |
//! | [`dispatch`] | command routing, emit cascades, invocation lifecycle |
//! | [`timer`] | persisted timers and their tokio driver |
//! | [`snapshot`] | JSON world snapshots |
//! | [`admin`] | wizard commands |
//! | [`config`] | layered TOML configuration |
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use wisp_runtime::{BufferSink, Dispatcher, CommandOutcome};
//! use wisp_script::testing::ScriptedEngine;
//! use wisp_source::MemorySourceTree;
//! use wisp_types::ObjectId;
//!
//! let dispatcher = Dispatcher::builder(
//!     Arc::new(ScriptedEngine::new()),
//!     Arc::new(
//!         MemorySourceTree::new()
//!             .with_file("/room.lua", "")
//!             .with_file("/me.lua", ""),
//!     ),
//! )
//! .build()
//! .unwrap();
//!
//! let root = ObjectId::root();
//! let room = dispatcher.create_object(&root, "/room.lua", &root).unwrap();
//! let me = dispatcher.create_object(&root, "/me.lua", &room).unwrap();
//!
//! let screen = Arc::new(BufferSink::new());
//! dispatcher.attach_session(&me, screen.clone()).unwrap();
//! let outcome = dispatcher.command(&me, "dance").unwrap();
//! assert_eq!(outcome, CommandOutcome::Unknown);
//! assert!(screen.contains("Unknown command"));
//! ```

pub mod admin;
pub mod challenge;
pub mod config;
pub mod containment;
pub mod dispatch;
mod error;
pub mod output;
pub mod skill_config;
pub mod snapshot;
pub mod stats;
pub mod store;
pub mod timer;

pub use admin::{Admin, AdminCommand};
pub use config::{ConfigLoader, WispConfig};
pub use containment::{Containment, MoveRecord};
pub use dispatch::{CommandOutcome, Dispatcher, DispatcherBuilder, UNKNOWN_COMMAND};
pub use error::RuntimeError;
pub use output::{BufferSink, OutputSink};
pub use skill_config::SkillConfigStore;
pub use snapshot::WorldSnapshot;
pub use stats::{DispatchStats, StatsSnapshot};
pub use store::{MemoryStore, ObjectHandle, ObjectStore};
pub use timer::{
    Clock, ManualClock, SystemClock, TimerDriver, TimerEntry, TimerFire, TimerInfo, TimerRegistry,
};
