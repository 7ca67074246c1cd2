//! A world running real Lua scripts from an in-memory source tree.
//!
//! Every test starts from two rooms joined by an exit pair:
//!
//! ```text
//! genesis
//! ├── tavern  (/tavern.lua, exit north → street)
//! │   ├── alice   session
//! │   └── bob     session
//! └── street  (/street.lua, exit south → tavern)
//! ```
//!
//! Scripts are written with [`LuaWorld::script`] before the objects
//! that use them are added with [`LuaWorld::add`].

#![allow(dead_code)]

use serde_json::json;
use std::sync::Arc;
use wisp_lua::{LuaEngine, LuaEnv};
use wisp_runtime::{BufferSink, Dispatcher, ManualClock, WispConfig};
use wisp_source::MemorySourceTree;
use wisp_types::{Object, ObjectId, Skill};

pub const TAVERN: &str = r#"
setDescriptions({ { Short = "a smoky tavern", Long = "Smoke curls under low beams." } })
setExits({ { Descriptions = { { Short = "north" } }, Destination = "street" } })
"#;

pub const STREET: &str = r#"
setDescriptions({ { Short = "a muddy street" } })
setExits({ { Descriptions = { { Short = "south" } }, Destination = "tavern" } })
"#;

pub fn person(name: &str) -> String {
    format!(r#"setDescriptions({{ {{ Short = "{name}" }} }})"#)
}

pub struct LuaWorld {
    pub dispatcher: Dispatcher,
    pub tree: Arc<MemorySourceTree>,
    pub clock: Arc<ManualClock>,
    pub alice_screen: Arc<BufferSink>,
    pub bob_screen: Arc<BufferSink>,
}

pub fn id(s: &str) -> ObjectId {
    ObjectId::new(s)
}

impl LuaWorld {
    pub fn new() -> Self {
        Self::with_env(LuaEnv::default())
    }

    pub fn with_env(env: LuaEnv) -> Self {
        let tree = Arc::new(MemorySourceTree::new());
        let clock = Arc::new(ManualClock::new(0));
        let dispatcher = Dispatcher::builder(Arc::new(LuaEngine::new(env)), tree.clone())
            .config(WispConfig::default())
            .clock(clock.clone())
            .build()
            .unwrap();

        let world = Self {
            dispatcher,
            tree,
            clock,
            alice_screen: Arc::new(BufferSink::new()),
            bob_screen: Arc::new(BufferSink::new()),
        };

        world.script("/tavern.lua", TAVERN);
        world.script("/street.lua", STREET);
        world.script("/alice.lua", &person("alice"));
        world.script("/bob.lua", &person("bob"));
        world.add("tavern", "genesis", "/tavern.lua");
        world.add("street", "genesis", "/street.lua");
        world.add("alice", "tavern", "/alice.lua");
        world.add("bob", "tavern", "/bob.lua");

        world
            .dispatcher
            .attach_session(&id("alice"), world.alice_screen.clone())
            .unwrap();
        world
            .dispatcher
            .attach_session(&id("bob"), world.bob_screen.clone())
            .unwrap();
        world
    }

    /// Writes (or rewrites) a script and drops any cached copy.
    pub fn script(&self, path: &str, text: &str) {
        self.tree.write(path, text).unwrap();
        self.dispatcher.invalidate_source(path);
    }

    /// Adds an object and runs its script once so its descriptions,
    /// exits and skills are in place.
    pub fn add(&self, object: &str, location: &str, path: &str) {
        self.dispatcher
            .containment()
            .insert_object(Object::new(object, Some(id(location)), path))
            .unwrap();
        self.boot(object);
    }

    /// Runs `object`'s top-level body with an event nobody handles.
    pub fn boot(&self, object: &str) {
        self.dispatcher.emit(&id(object), "boot", json!({})).unwrap();
    }

    pub fn object(&self, s: &str) -> Object {
        self.dispatcher.object(&id(s)).unwrap()
    }

    pub fn state(&self, s: &str) -> serde_json::Value {
        let state = self.object(s).state;
        if state.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&state).unwrap()
        }
    }

    pub fn set_skill(&self, object: &str, skill: &str, practical: f64) {
        self.dispatcher
            .store()
            .update(&id(object), &mut |o| {
                o.skills.insert(skill.to_string(), Skill::new(practical, 0.0));
            })
            .unwrap();
    }

    pub fn set_state(&self, object: &str, state: &str) {
        self.dispatcher
            .store()
            .update(&id(object), &mut |o| o.state = state.to_string())
            .unwrap();
    }
}
