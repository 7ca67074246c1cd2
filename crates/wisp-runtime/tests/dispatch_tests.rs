//! Command routing, emit cascades and the invocation lifecycle.

mod common;

use common::{id, World};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Barrier};
use wisp_runtime::{CommandOutcome, RuntimeError, WispConfig};
use wisp_script::testing::reply;
use wisp_script::{InvocationOutcome, ScriptError};
use wisp_types::{events, Challenge, Description, Exit, Object, Skill, SkillConfig, Tag};

// =============================================================================
// Command precedence
// =============================================================================

mod precedence {
    use super::*;

    #[test]
    fn actor_claims_first() {
        let w = World::new();
        w.engine
            .set("/alice.lua", |inv, _| Ok(reply(inv, inv.trigger.event == "wave")));
        w.engine.set("/tavern.lua", |inv, _| Ok(reply(inv, true)));

        let outcome = w.dispatcher.command(&id("alice"), "wave hello").unwrap();
        assert_eq!(outcome, CommandOutcome::Handled { by: id("alice") });
        assert!(w.events_of("tavern").is_empty());
    }

    #[test]
    fn actor_sees_command_tag_others_only_action() {
        let w = World::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        w.engine.set("/alice.lua", move |inv, _| {
            s.lock().push(("alice", inv.trigger.tags.clone()));
            Ok(reply(inv, false))
        });
        let s = seen.clone();
        w.engine.set("/tavern.lua", move |inv, _| {
            s.lock().push(("tavern", inv.trigger.tags.clone()));
            Ok(reply(inv, true))
        });

        w.dispatcher.command(&id("alice"), "wave").unwrap();
        let seen = seen.lock().clone();
        assert_eq!(seen[0], ("alice", vec![Tag::Command, Tag::Action]));
        assert_eq!(seen[1], ("tavern", vec![Tag::Action]));
    }

    #[test]
    fn location_before_siblings() {
        let w = World::new();
        w.engine.set("/tavern.lua", |inv, _| Ok(reply(inv, true)));
        w.engine.set("/bob.lua", |inv, _| Ok(reply(inv, true)));

        let outcome = w.dispatcher.command(&id("alice"), "dance").unwrap();
        assert_eq!(outcome, CommandOutcome::Handled { by: id("tavern") });
        assert!(w.events_of("bob").is_empty());
    }

    #[test]
    fn siblings_in_id_order() {
        let w = World::new();
        w.place(Object::new("zed-orc", Some(id("tavern")), "/orc.lua"));
        w.place(Object::new("a-orc", Some(id("tavern")), "/orc.lua"));
        w.engine.set("/orc.lua", |inv, _| Ok(reply(inv, true)));

        let outcome = w.dispatcher.command(&id("alice"), "growl").unwrap();
        assert_eq!(outcome, CommandOutcome::Handled { by: id("a-orc") });
        assert!(w.events_of("zed-orc").is_empty());
    }

    #[test]
    fn script_claims_exit_name_before_movement() {
        let w = World::new();
        w.engine
            .set("/tavern.lua", |inv, _| Ok(reply(inv, inv.trigger.event == "north")));

        let outcome = w.dispatcher.command(&id("alice"), "north").unwrap();
        assert_eq!(outcome, CommandOutcome::Handled { by: id("tavern") });
        assert_eq!(w.object("alice").location, Some(id("tavern")));
    }

    #[test]
    fn unknown_command_is_reported() {
        let w = World::new();
        let outcome = w.dispatcher.command(&id("alice"), "xyzzy").unwrap();
        assert_eq!(outcome, CommandOutcome::Unknown);
        assert_eq!(w.alice_screen.lines(), vec!["Unknown command"]);
    }

    #[test]
    fn blank_line_is_empty() {
        let w = World::new();
        assert_eq!(
            w.dispatcher.command(&id("alice"), "   ").unwrap(),
            CommandOutcome::Empty
        );
        assert!(w.engine.invocations().is_empty());
    }

    #[test]
    fn unknown_actor_is_error() {
        let w = World::new();
        assert!(matches!(
            w.dispatcher.command(&id("nobody"), "look"),
            Err(RuntimeError::NotFound(_))
        ));
    }
}

// =============================================================================
// Built-in verbs
// =============================================================================

mod builtins {
    use super::*;

    fn hide_gem(w: &World) {
        w.place(
            Object::new("gem", Some(id("tavern")), "/gem.lua").with_descriptions(vec![
                Description::new("a hidden gem").with_challenge(Challenge::new("perception", 100.0)),
            ]),
        );
    }

    fn set_perception(w: &World, practical: f64) {
        w.edit("alice", |o| {
            o.skills
                .insert("perception".into(), Skill::new(practical, 0.0));
        });
    }

    #[test]
    fn look_hides_objects_behind_failed_challenges() {
        let w = World::new();
        hide_gem(&w);
        set_perception(&w, 1.0);

        let outcome = w.dispatcher.command(&id("alice"), "look").unwrap();
        let CommandOutcome::Looked { text } = outcome else {
            panic!("expected look output");
        };
        assert_eq!(text, "A smoky tavern\nYou see bob.\nExits: north.");
        assert_eq!(w.alice_screen.lines(), vec![text]);
    }

    #[test]
    fn look_shows_objects_to_skilled_viewers() {
        let w = World::new();
        hide_gem(&w);
        set_perception(&w, 200.0);

        let text = w.dispatcher.look(&id("alice"), None).unwrap();
        assert!(text.contains("a hidden gem"));
    }

    #[test]
    fn look_at_named_object() {
        let w = World::new();
        w.place(
            Object::new("mug", Some(id("tavern")), "/gem.lua").with_descriptions(vec![
                Description::new("a mug").with_long("A chipped clay mug."),
            ]),
        );
        assert_eq!(
            w.dispatcher.look(&id("alice"), Some("a mug")).unwrap(),
            "A chipped clay mug."
        );
        assert_eq!(
            w.dispatcher.look(&id("alice"), Some("unicorn")).unwrap(),
            "You don't see that here."
        );
    }

    #[test]
    fn l_is_look() {
        let w = World::new();
        assert!(matches!(
            w.dispatcher.command(&id("alice"), "l").unwrap(),
            CommandOutcome::Looked { .. }
        ));
    }

    #[test]
    fn scan_lists_neighbours() {
        let w = World::new();
        w.place(
            Object::new("cart", Some(id("street")), "/gem.lua")
                .with_descriptions(vec![Description::new("a cart")]),
        );
        let text = w.dispatcher.scan(&id("alice")).unwrap();
        assert_eq!(text, "north: a muddy street (a cart)");
    }
}

// =============================================================================
// Exits and movement narration
// =============================================================================

mod exits {
    use super::*;

    #[test]
    fn exit_name_moves_actor_and_narrates() {
        let w = World::new();
        let outcome = w.dispatcher.command(&id("alice"), "north").unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::Moved {
                exit: "north".into(),
                destination: id("street"),
            }
        );
        assert_eq!(w.object("alice").location, Some(id("street")));
        assert!(!w.object("tavern").content.contains(&id("alice")));
        assert_eq!(w.bob_screen.lines(), vec!["Alice moves north."]);
        assert!(w.alice_screen.contains("A muddy street"));
        assert_eq!(w.events_of("bob"), vec!["north", events::MOVEMENT]);
    }

    #[test]
    fn exit_match_ignores_case() {
        let w = World::new();
        assert!(matches!(
            w.dispatcher.command(&id("alice"), "NORTH").unwrap(),
            CommandOutcome::Moved { .. }
        ));
    }

    #[test]
    fn arrivals_are_narrated_in_destination() {
        let w = World::new();
        w.dispatcher.move_object(&id("bob"), &id("street")).unwrap();
        w.bob_screen.take();

        w.dispatcher.command(&id("alice"), "north").unwrap();
        assert_eq!(w.bob_screen.lines(), vec!["Alice moves in."]);
    }

    #[test]
    fn locked_exit_blocks_and_reports() {
        let w = World::new();
        w.edit("tavern", |o| {
            o.exits = vec![Exit::new("north", "street")
                .with_use_challenge(Challenge::new("strength", 50.0))
                .with_message("The door is locked.")];
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        w.engine.set("/tavern.lua", move |inv, _| {
            if inv.trigger.event == events::EXIT_FAILED {
                s.lock().push(inv.trigger.payload.clone());
            }
            Ok(reply(inv, false))
        });

        let outcome = w.dispatcher.command(&id("alice"), "north").unwrap();
        assert_eq!(
            outcome,
            CommandOutcome::Blocked {
                exit: "north".into()
            }
        );
        assert_eq!(w.object("alice").location, Some(id("tavern")));
        assert_eq!(w.alice_screen.lines(), vec!["The door is locked."]);
        assert_eq!(
            seen.lock().clone(),
            vec![json!({"exit": "north", "subject": "alice"})]
        );
    }

    #[test]
    fn strong_actor_passes_locked_exit() {
        let w = World::new();
        w.edit("tavern", |o| {
            o.exits = vec![Exit::new("north", "street")
                .with_use_challenge(Challenge::new("strength", 50.0))];
        });
        w.edit("alice", |o| {
            o.skills.insert("strength".into(), Skill::new(50.0, 0.0));
        });
        assert!(matches!(
            w.dispatcher.command(&id("alice"), "north").unwrap(),
            CommandOutcome::Moved { .. }
        ));
    }

    #[test]
    fn hidden_mover_is_not_narrated() {
        let w = World::new();
        w.edit("alice", |o| {
            o.descriptions = vec![Description::new("a shadow")
                .with_challenge(Challenge::new("perception", 50.0))];
        });
        w.dispatcher.command(&id("alice"), "north").unwrap();
        assert!(w.bob_screen.lines().is_empty());
        assert_eq!(w.events_of("bob"), vec!["north", events::MOVEMENT]);
    }

    #[test]
    fn active_mover_renders_its_own_narration() {
        let w = World::new();
        w.edit("alice", |o| o.movement.active = true);
        w.engine.set("/alice.lua", |inv, host| {
            if inv.trigger.event == events::RENDER_MOVEMENT {
                let observer = inv.trigger.payload["Observer"].as_str().unwrap();
                host.emit(
                    &observer.into(),
                    events::MOVEMENT_RENDERED,
                    json!({"Message": "Alice vanishes in a puff of smoke."}),
                    vec![],
                )
                .unwrap();
                return Ok(reply(inv, true));
            }
            Ok(reply(inv, false))
        });

        w.dispatcher.command(&id("alice"), "north").unwrap();
        assert_eq!(
            w.bob_screen.lines(),
            vec!["Alice vanishes in a puff of smoke."]
        );
        assert_eq!(
            w.events_of("bob"),
            vec!["north", events::MOVEMENT, events::MOVEMENT_RENDERED]
        );
    }

    fn smoky_renderer(w: &World, replies: usize) {
        w.edit("alice", |o| o.movement.active = true);
        w.engine.set("/alice.lua", move |inv, host| {
            match inv.trigger.event.as_str() {
                events::RENDER_MOVEMENT => {
                    let observer = inv.trigger.payload["Observer"].as_str().unwrap();
                    for _ in 0..replies {
                        host.emit(
                            &observer.into(),
                            events::MOVEMENT_RENDERED,
                            json!({"Message": "Alice vanishes in a puff of smoke."}),
                            vec![],
                        )
                        .unwrap();
                    }
                }
                "shove" => {
                    host.move_object(&"alice".into(), &"street".into()).unwrap();
                }
                _ => return Ok(reply(inv, false)),
            }
            Ok(reply(inv, true))
        });
    }

    #[test]
    fn rendered_narration_is_printed_once() {
        let w = World::new();
        smoky_renderer(&w, 2);
        w.dispatcher.command(&id("alice"), "north").unwrap();
        assert_eq!(
            w.bob_screen.lines(),
            vec!["Alice vanishes in a puff of smoke."]
        );
        assert_eq!(
            w.events_of("bob"),
            vec![
                "north",
                events::MOVEMENT,
                events::MOVEMENT_RENDERED,
                events::MOVEMENT_RENDERED
            ]
        );
    }

    #[test]
    fn stray_movement_rendered_prints_nothing() {
        let w = World::new();
        w.engine.set("/bob.lua", |inv, host| {
            if inv.trigger.event == "curse" {
                host.emit(
                    &"alice".into(),
                    events::MOVEMENT_RENDERED,
                    json!({"Message": "The admin has banned you."}),
                    vec![],
                )
                .unwrap();
                return Ok(reply(inv, true));
            }
            Ok(reply(inv, false))
        });

        w.dispatcher.command(&id("bob"), "curse").unwrap();
        assert!(w.alice_screen.lines().is_empty());
        assert_eq!(w.events_of("alice"), vec![events::MOVEMENT_RENDERED]);
    }

    #[test]
    fn rendered_narration_survives_the_emit_limit() {
        let mut config = WispConfig::default();
        config.dispatch.max_emit_depth = 0;
        let w = World::with_config(config);
        smoky_renderer(&w, 1);

        w.dispatcher.command(&id("alice"), "north").unwrap();
        assert_eq!(
            w.bob_screen.lines(),
            vec!["Alice vanishes in a puff of smoke."]
        );
        assert_eq!(w.dispatcher.stats().snapshot().dropped_emits, 0);
    }

    #[test]
    fn dropped_render_falls_back_to_generated_text() {
        let mut config = WispConfig::default();
        config.dispatch.max_emit_depth = 0;
        let w = World::with_config(config);
        smoky_renderer(&w, 1);

        w.dispatcher.command(&id("alice"), "shove").unwrap();
        assert_eq!(w.object("alice").location, Some(id("street")));
        assert_eq!(w.bob_screen.lines(), vec!["Alice moves away."]);
    }

    #[test]
    fn active_mover_without_renderer_falls_back() {
        let w = World::new();
        w.edit("alice", |o| {
            o.movement.active = true;
            o.movement.verb = "sneaks".into();
        });
        w.dispatcher.command(&id("alice"), "north").unwrap();
        assert_eq!(w.bob_screen.lines(), vec!["Alice sneaks north."]);
    }

    #[test]
    fn script_moves_cannot_create_cycles() {
        let w = World::new();
        let result = Arc::new(Mutex::new(None));
        let r = result.clone();
        w.engine.set("/alice.lua", move |inv, host| {
            *r.lock() = Some(host.move_object(&"tavern".into(), &"alice".into()));
            Ok(reply(inv, true))
        });
        w.dispatcher.command(&id("alice"), "shove").unwrap();
        let err = result.lock().clone().unwrap().unwrap_err();
        assert_eq!(err.to_string(), "cannot move object into itself");
    }
}

// =============================================================================
// Emits
// =============================================================================

mod emits {
    use super::*;

    fn secret_sender(w: &World) {
        w.engine.set("/alice.lua", |inv, host| {
            host.emit(
                &"bob".into(),
                "secret",
                json!({"word": "xyzzy"}),
                vec![Challenge::new("magic", 10.0)],
            )
            .unwrap();
            Ok(reply(inv, true))
        });
    }

    #[test]
    fn gated_emit_dropped_for_unskilled_target() {
        let w = World::new();
        secret_sender(&w);
        w.dispatcher.command(&id("alice"), "whisper").unwrap();
        assert!(w.events_of("bob").is_empty());
    }

    #[test]
    fn gated_emit_delivered_to_skilled_target() {
        let w = World::new();
        secret_sender(&w);
        w.edit("bob", |o| {
            o.skills.insert("magic".into(), Skill::new(10.0, 0.0));
        });
        let payloads = Arc::new(Mutex::new(Vec::new()));
        let p = payloads.clone();
        w.engine.set("/bob.lua", move |inv, _| {
            assert_eq!(inv.trigger.tags, vec![Tag::Emit]);
            p.lock().push(inv.trigger.payload.clone());
            Ok(reply(inv, true))
        });

        w.dispatcher.command(&id("alice"), "whisper").unwrap();
        assert_eq!(payloads.lock().clone(), vec![json!({"word": "xyzzy"})]);
    }

    #[test]
    fn emit_to_missing_target_is_host_error() {
        let w = World::new();
        let result = Arc::new(Mutex::new(None));
        let r = result.clone();
        w.engine.set("/alice.lua", move |inv, host| {
            *r.lock() = Some(host.emit(&"ghost".into(), "boo", json!({}), vec![]));
            Ok(reply(inv, true))
        });
        w.dispatcher.command(&id("alice"), "haunt").unwrap();
        assert!(result.lock().clone().unwrap().is_err());
    }

    #[test]
    fn emit_to_location_gates_each_recipient() {
        let w = World::new();
        w.edit("bob", |o| {
            o.skills.insert("hearing".into(), Skill::new(5.0, 0.0));
        });
        w.engine.set("/tavern.lua", |inv, host| {
            if inv.trigger.event == "bell" {
                host.emit_to_location(
                    &"tavern".into(),
                    "ring",
                    json!({}),
                    vec![Challenge::new("hearing", 5.0)],
                )
                .unwrap();
            }
            Ok(reply(inv, true))
        });

        w.dispatcher.emit(&id("tavern"), "bell", json!({})).unwrap();
        assert_eq!(w.events_of("bob"), vec!["ring"]);
        assert!(w.events_of("alice").is_empty());
    }

    #[test]
    fn cascade_depth_is_bounded() {
        let mut config = WispConfig::default();
        config.dispatch.max_emit_depth = 3;
        let w = World::with_config(config);
        w.place(Object::new("echo", Some(id("tavern")), "/echo.lua"));
        w.engine.set("/echo.lua", |inv, host| {
            host.emit(&"echo".into(), "echo", json!({}), vec![]).unwrap();
            Ok(reply(inv, true))
        });

        w.dispatcher.emit(&id("echo"), "echo", json!({})).unwrap();
        assert_eq!(w.events_of("echo").len(), 4);
        assert_eq!(w.dispatcher.stats().snapshot().dropped_emits, 1);
    }

    #[test]
    fn cascade_is_breadth_first() {
        let w = World::new();
        w.engine.set("/tavern.lua", |inv, host| {
            if inv.trigger.event == "start" {
                host.emit(&"alice".into(), "first", json!({}), vec![]).unwrap();
                host.emit(&"bob".into(), "second", json!({}), vec![]).unwrap();
            }
            Ok(reply(inv, true))
        });
        w.engine.set("/alice.lua", |inv, host| {
            host.emit(&"bob".into(), "third", json!({}), vec![]).unwrap();
            Ok(reply(inv, true))
        });

        w.dispatcher.emit(&id("tavern"), "start", json!({})).unwrap();
        assert_eq!(w.events_of("bob"), vec!["second", "third"]);
    }
}

// =============================================================================
// Invocation lifecycle
// =============================================================================

mod lifecycle {
    use super::*;

    #[test]
    fn success_commits_state_and_drafts() {
        let w = World::new();
        w.engine.set("/alice.lua", |inv, host| {
            host.set_descriptions(vec![Description::new("alice the brave")])
                .unwrap();
            host.set_learning(true);
            let mut callbacks = BTreeMap::new();
            callbacks.insert("wave".to_string(), [Tag::Action].into_iter().collect());
            Ok(InvocationOutcome {
                handled: true,
                state: r#"{"waves":1}"#.into(),
                callbacks,
            })
        });

        w.dispatcher.command(&id("alice"), "wave").unwrap();
        let alice = w.object("alice");
        assert_eq!(alice.state, r#"{"waves":1}"#);
        assert_eq!(alice.descriptions[0].short, "alice the brave");
        assert!(alice.learning);
        assert!(alice.has_callback("wave", &[Tag::Action]));
    }

    #[test]
    fn failure_discards_state_and_drafts_but_keeps_effects() {
        let w = World::new();
        w.edit("alice", |o| o.state = r#"{"hp":10}"#.into());
        w.engine.set("/alice.lua", |_, host| {
            host.set_descriptions(vec![Description::new("corrupted")])
                .unwrap();
            host.move_object(&"bob".into(), &"street".into()).unwrap();
            Err(ScriptError::runtime("/alice.lua", "boom"))
        });

        w.dispatcher.command(&id("alice"), "explode").unwrap();
        let alice = w.object("alice");
        assert_eq!(alice.state, r#"{"hp":10}"#);
        assert_eq!(alice.descriptions[0].short, "alice");
        assert_eq!(w.object("bob").location, Some(id("street")));
    }

    #[test]
    fn failing_script_does_not_stop_routing() {
        let w = World::new();
        w.engine
            .set("/alice.lua", |_, _| Err(ScriptError::runtime("/alice.lua", "boom")));
        w.engine.set("/tavern.lua", |inv, _| Ok(reply(inv, true)));

        let debug = Arc::new(wisp_runtime::BufferSink::new());
        w.dispatcher
            .attach_debug(&id("alice"), &id("bob"), debug.clone())
            .unwrap();

        let outcome = w.dispatcher.command(&id("alice"), "wave").unwrap();
        assert_eq!(outcome, CommandOutcome::Handled { by: id("tavern") });

        let stats = w.dispatcher.stats().snapshot();
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.recent_errors[0].object, id("alice"));
        assert!(debug.contains("boom"));
    }

    #[test]
    fn engine_panic_is_contained() {
        let w = World::new();
        w.engine.set("/alice.lua", |_, _| panic!("engine bug"));
        w.dispatcher.emit(&id("alice"), "poke", json!({})).unwrap();

        let stats = w.dispatcher.stats().snapshot();
        assert_eq!(stats.errors, 1);
        assert!(stats.recent_errors[0].message.contains("engine bug"));
    }

    #[test]
    fn missing_source_is_reported() {
        let w = World::new();
        w.edit("alice", |o| o.source_path = "/nowhere.lua".into());
        w.dispatcher.emit(&id("alice"), "poke", json!({})).unwrap();
        assert_eq!(w.dispatcher.stats().snapshot().errors, 1);
        assert!(w.events_of("alice").is_empty());
    }

    #[test]
    fn script_log_reaches_debug_listeners() {
        let w = World::new();
        w.engine.set("/alice.lua", |inv, host| {
            host.log(wisp_script::LogLevel::Info, "hello from alice");
            Ok(reply(inv, true))
        });
        let debug = Arc::new(wisp_runtime::BufferSink::new());
        w.dispatcher
            .attach_debug(&id("alice"), &id("bob"), debug.clone())
            .unwrap();
        w.dispatcher.emit(&id("alice"), "poke", json!({})).unwrap();
        assert_eq!(debug.lines(), vec!["[info] hello from alice"]);
    }

    #[test]
    fn invocations_of_one_object_are_serialized() {
        let w = World::new();
        w.edit("alice", |o| o.state = "0".into());
        w.engine.set("/alice.lua", |inv, _| {
            let n: u64 = inv.state.parse().unwrap();
            std::thread::yield_now();
            Ok(InvocationOutcome {
                handled: true,
                state: (n + 1).to_string(),
                callbacks: BTreeMap::new(),
            })
        });

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let d = w.dispatcher.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        d.emit(&id("alice"), "inc", json!({})).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(w.object("alice").state, "100");
    }

    #[test]
    fn racing_cas_has_one_winner() {
        let w = World::new();
        let results = Arc::new(Mutex::new(Vec::new()));
        let barrier = Arc::new(Barrier::new(2));
        let (r, b) = (results.clone(), barrier.clone());
        w.engine.set("/orc.lua", move |inv, host| {
            b.wait();
            let won = host.cas_skill_config(
                "archery",
                None,
                SkillConfig {
                    forget: 1.0,
                    recharge: 2.0,
                    duration: 3.0,
                },
            );
            r.lock().push(won);
            Ok(reply(inv, true))
        });
        w.place(Object::new("orc-1", Some(id("tavern")), "/orc.lua"));
        w.place(Object::new("orc-2", Some(id("tavern")), "/orc.lua"));

        let handles: Vec<_> = ["orc-1", "orc-2"]
            .into_iter()
            .map(|orc| {
                let d = w.dispatcher.clone();
                std::thread::spawn(move || d.emit(&id(orc), "learn", json!({})).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let results = results.lock().clone();
        assert_eq!(results.len(), 2);
        assert_eq!(results.iter().filter(|won| **won).count(), 1);
        assert!(w.dispatcher.skill_configs().get("archery").is_some());
    }

    #[test]
    fn created_objects_hear_their_creator() {
        let w = World::new();
        let created = Arc::new(Mutex::new(None));
        w.engine.set("/alice.lua", |inv, host| {
            host.create_object("/gem.lua", &"tavern".into()).unwrap();
            Ok(reply(inv, true))
        });
        let c = created.clone();
        w.engine.set("/gem.lua", move |inv, host| {
            if inv.trigger.event == events::CREATED {
                *c.lock() = Some((host.id(), inv.trigger.payload.clone()));
            }
            Ok(reply(inv, true))
        });

        w.dispatcher.command(&id("alice"), "conjure").unwrap();
        let (gem, payload) = created.lock().clone().unwrap();
        assert_eq!(payload, json!({"creator": "alice"}));
        assert!(w.object("tavern").content.contains(&gem));
        assert_eq!(w.dispatcher.object(&gem).unwrap().source_path, "/gem.lua");
    }

    #[test]
    fn source_path_change_applies_next_invocation() {
        let w = World::new();
        w.engine.set("/alice.lua", |inv, host| {
            host.set_source_path("/orc.lua").unwrap();
            Ok(reply(inv, true))
        });
        w.engine.set("/orc.lua", |inv, _| Ok(reply(inv, true)));

        w.dispatcher.emit(&id("alice"), "transform", json!({})).unwrap();
        assert_eq!(w.object("alice").source_path, "/orc.lua");
    }
}

// =============================================================================
// Removal
// =============================================================================

mod removal {
    use super::*;

    #[test]
    fn removal_rules() {
        let w = World::new();
        let d = &w.dispatcher;
        let tavern = id("tavern");

        assert!(matches!(
            d.remove_object(&wisp_types::ObjectId::root(), None),
            Err(RuntimeError::RemoveRoot)
        ));
        assert!(matches!(
            d.remove_object(&tavern, Some(&tavern)),
            Err(RuntimeError::RemoveCurrentLocation)
        ));
        assert!(matches!(
            d.remove_object(&tavern, None),
            Err(RuntimeError::NotEmpty(_))
        ));
        assert!(d.remove_object(&id("bob"), Some(&tavern)).is_ok());
        assert!(!w.object("tavern").content.contains(&id("bob")));
    }

    #[test]
    fn script_cannot_remove_its_own_location() {
        let w = World::new();
        let result = Arc::new(Mutex::new(None));
        let r = result.clone();
        w.engine.set("/alice.lua", move |inv, host| {
            *r.lock() = Some(host.remove_object(&"tavern".into()));
            Ok(reply(inv, true))
        });
        w.dispatcher.command(&id("alice"), "destroy").unwrap();
        let err = result.lock().clone().unwrap().unwrap_err();
        assert_eq!(err.to_string(), "Can't remove current location");
    }
}
