//! A small two-room world driven by closure scripts.
//!
//! ```text
//! genesis
//! ├── tavern  (exit north → street)
//! │   ├── alice   session
//! │   └── bob     session
//! └── street  (exit south → tavern)
//! ```

#![allow(dead_code)]

use std::sync::Arc;
use wisp_runtime::{BufferSink, Dispatcher, ManualClock, WispConfig};
use wisp_script::testing::ScriptedEngine;
use wisp_source::MemorySourceTree;
use wisp_types::{Description, Exit, Object, ObjectId};

pub const PATHS: &[&str] = &[
    "/tavern.lua",
    "/street.lua",
    "/alice.lua",
    "/bob.lua",
    "/orc.lua",
    "/gem.lua",
    "/echo.lua",
];

pub struct World {
    pub dispatcher: Dispatcher,
    pub engine: Arc<ScriptedEngine>,
    pub clock: Arc<ManualClock>,
    pub alice_screen: Arc<BufferSink>,
    pub bob_screen: Arc<BufferSink>,
}

pub fn id(s: &str) -> ObjectId {
    ObjectId::new(s)
}

impl World {
    pub fn new() -> Self {
        Self::with_config(WispConfig::default())
    }

    pub fn with_config(config: WispConfig) -> Self {
        let tree = MemorySourceTree::new();
        for path in PATHS {
            tree.write(path, "").unwrap();
        }
        let engine = Arc::new(ScriptedEngine::new());
        let clock = Arc::new(ManualClock::new(0));
        let dispatcher = Dispatcher::builder(engine.clone(), Arc::new(tree))
            .config(config)
            .clock(clock.clone())
            .build()
            .unwrap();

        let world = Self {
            dispatcher,
            engine,
            clock,
            alice_screen: Arc::new(BufferSink::new()),
            bob_screen: Arc::new(BufferSink::new()),
        };

        world.place(
            Object::new("tavern", Some(ObjectId::root()), "/tavern.lua")
                .with_descriptions(vec![Description::new("a smoky tavern")])
                .with_exit(Exit::new("north", "street")),
        );
        world.place(
            Object::new("street", Some(ObjectId::root()), "/street.lua")
                .with_descriptions(vec![Description::new("a muddy street")])
                .with_exit(Exit::new("south", "tavern")),
        );
        world.place(
            Object::new("alice", Some(id("tavern")), "/alice.lua")
                .with_descriptions(vec![Description::new("alice")]),
        );
        world.place(
            Object::new("bob", Some(id("tavern")), "/bob.lua")
                .with_descriptions(vec![Description::new("bob")]),
        );

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

    pub fn place(&self, object: Object) {
        self.dispatcher.containment().insert_object(object).unwrap();
    }

    pub fn object(&self, s: &str) -> Object {
        self.dispatcher.object(&id(s)).unwrap()
    }

    pub fn edit(&self, s: &str, f: impl Fn(&mut Object)) {
        self.dispatcher
            .store()
            .update(&id(s), &mut |o| f(o))
            .unwrap();
    }

    /// Events delivered to `object`, in order.
    pub fn events_of(&self, object: &str) -> Vec<String> {
        self.engine
            .invocations()
            .into_iter()
            .filter(|(o, _)| o.as_str() == object)
            .map(|(_, e)| e)
            .collect()
    }
}
