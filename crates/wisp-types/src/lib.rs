//! Core types for wisp.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  wisp-types   : ids, object model, tags, ErrorCode  ◄── HERE │
//! │  wisp-source  : @import flattening and caching              │
//! │  wisp-script  : ScriptEngine / HostApi contract             │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │  wisp-runtime : store, containment, dispatcher, timers      │
//! │  wisp-lua     : Lua implementation of ScriptEngine          │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │  wisp-cli     : console and admin commands                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use wisp_types::{Challenge, Description, Object, ObjectId, Skill};
//!
//! let gem = Object::new("gem", Some(ObjectId::root()), "/gem.lua").with_descriptions(vec![
//!     Description::new("a hidden gem").with_challenge(Challenge::new("perception", 100.0)),
//! ]);
//! assert_eq!(gem.descriptions[0].challenges[0].skill, "perception");
//!
//! let viewer = Object::new("alice", Some(ObjectId::root()), "")
//!     .with_skill("perception", Skill::new(200.0, 0.0));
//! assert_eq!(viewer.practical("perception"), 200.0);
//! ```

mod error;
pub mod event;
mod id;
mod object;

pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use event::{events, Tag};
pub use id::{ObjectId, TimerId, ROOT_ID};
pub use object::{Challenge, Description, Exit, MovementConfig, Object, Skill, SkillConfig};
