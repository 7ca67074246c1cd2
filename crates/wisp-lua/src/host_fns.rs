//! Host functions installed as Lua globals.
//!
//! Each global forwards to the [`HostApi`] bound to the invocation.
//! Host failures surface in Lua as ordinary runtime errors, so a script
//! can `pcall` around a move that may be refused.
//!
//! Callback registrations are kept in a table in the named registry
//! ([`CALLBACKS_KEY`]) shaped `{ [event] = { fn = f, tags = {...} } }`.
//! The engine reads it back after the top-level body has run.

use crate::types::{
    challenges_from_lua, descriptions_from_lua, exits_from_lua, json_to_lua, lua_to_json,
    movement_from_lua, neighbourhood_to_lua, skill_config_from_lua, skill_config_to_lua,
    skills_from_lua, tags_from_lua,
};
use mlua::{Function, Lua, MultiValue, Table, Value};
use std::sync::Arc;
use wisp_script::{HostApi, HostError, LogLevel};
use wisp_types::{ObjectId, TimerId};

/// Named registry key of the callback table.
pub(crate) const CALLBACKS_KEY: &str = "wisp.callbacks";

fn host_err(err: HostError) -> mlua::Error {
    mlua::Error::RuntimeError(err.to_string())
}

/// Converts an optional payload; `nil` becomes an empty object.
fn payload(lua: &Lua, value: Value) -> mlua::Result<serde_json::Value> {
    match value {
        Value::Nil => Ok(serde_json::Value::Object(serde_json::Map::new())),
        value => lua_to_json(lua, value),
    }
}

fn millis(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value as u64
    } else {
        0
    }
}

pub(crate) fn lua_display(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => format!("{n}"),
        Value::String(s) => s
            .to_str()
            .map_or_else(|_| "<invalid utf8>".into(), |s| s.to_string()),
        Value::Table(_) => format!("table: {:p}", value.to_pointer()),
        Value::Function(_) => format!("function: {:p}", value.to_pointer()),
        _ => format!("{value:?}"),
    }
}

fn is_level_name(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "debug" | "trace" | "info" | "warn" | "warning" | "error"
    )
}

/// Splits `log(...)` arguments into a level and a message.
fn log_args(args: &MultiValue) -> (LogLevel, String) {
    let values: Vec<&Value> = args.iter().collect();
    if values.len() >= 2 {
        if let Value::String(s) = values[0] {
            if let Ok(name) = s.to_str() {
                if is_level_name(&name) {
                    let message = values[1..]
                        .iter()
                        .map(|v| lua_display(v))
                        .collect::<Vec<_>>()
                        .join(" ");
                    return (LogLevel::parse(&name), message);
                }
            }
        }
    }
    let message = values
        .iter()
        .map(|v| lua_display(v))
        .collect::<Vec<_>>()
        .join(" ");
    (LogLevel::Info, message)
}

/// Installs the callback registry and every host global on `lua`.
///
/// # Errors
///
/// Fails only if the VM cannot allocate the functions.
pub(crate) fn register(lua: &Lua, host: Arc<dyn HostApi>) -> mlua::Result<()> {
    lua.set_named_registry_value(CALLBACKS_KEY, lua.create_table()?)?;
    let globals = lua.globals();

    register_callbacks(lua, &globals)?;
    register_object_fns(lua, &globals, &host)?;
    register_world_fns(lua, &globals, &host)?;
    register_skill_fns(lua, &globals, &host)?;
    register_timer_fns(lua, &globals, &host)?;
    register_log_fns(lua, &globals, &host)?;
    Ok(())
}

fn register_callbacks(lua: &Lua, globals: &Table) -> mlua::Result<()> {
    let add = lua.create_function(|lua, (event, tags, f): (String, Value, Function)| {
        let tags = tags_from_lua(tags)?;
        let names = lua.create_sequence_from(tags.iter().map(|t| t.as_str()))?;
        let entry = lua.create_table()?;
        entry.set("fn", f)?;
        entry.set("tags", names)?;
        let callbacks: Table = lua.named_registry_value(CALLBACKS_KEY)?;
        callbacks.set(event, entry)
    })?;
    globals.set("addCallback", add)?;

    let remove = lua.create_function(|lua, event: String| {
        let callbacks: Table = lua.named_registry_value(CALLBACKS_KEY)?;
        callbacks.set(event, Value::Nil)
    })?;
    globals.set("removeCallback", remove)?;
    Ok(())
}

/// Draft setters and self queries.
fn register_object_fns(lua: &Lua, globals: &Table, host: &Arc<dyn HostApi>) -> mlua::Result<()> {
    {
        let host = Arc::clone(host);
        let f = lua.create_function(move |_, list: Value| {
            host.set_descriptions(descriptions_from_lua(list)?)
                .map_err(host_err)
        })?;
        globals.set("setDescriptions", f)?;
    }
    {
        let host = Arc::clone(host);
        let f = lua.create_function(move |_, list: Value| {
            host.set_exits(exits_from_lua(list)?).map_err(host_err)
        })?;
        globals.set("setExits", f)?;
    }
    {
        let host = Arc::clone(host);
        let f = lua.create_function(move |_, config: Value| {
            host.set_movement(movement_from_lua(config)?)
                .map_err(host_err)
        })?;
        globals.set("setMovement", f)?;
    }
    {
        let host = Arc::clone(host);
        let f = lua.create_function(move |_, skills: Value| {
            host.set_skills(skills_from_lua(skills)?).map_err(host_err)
        })?;
        globals.set("setSkills", f)?;
    }
    {
        let host = Arc::clone(host);
        let f = lua.create_function(move |_, ()| Ok(host.id().as_str().to_string()))?;
        globals.set("getId", f)?;
    }
    {
        let host = Arc::clone(host);
        let f = lua.create_function(move |_, ()| Ok(host.source_path()))?;
        globals.set("getSourcePath", f)?;
    }
    {
        let host = Arc::clone(host);
        let f = lua.create_function(move |_, path: String| {
            host.set_source_path(&path).map_err(host_err)
        })?;
        globals.set("setSourcePath", f)?;
    }
    {
        let host = Arc::clone(host);
        let f = lua.create_function(move |_, ()| Ok(host.learning()))?;
        globals.set("getLearning", f)?;
    }
    {
        let host = Arc::clone(host);
        let f = lua.create_function(move |_, learning: bool| {
            host.set_learning(learning);
            Ok(())
        })?;
        globals.set("setLearning", f)?;
    }
    Ok(())
}

/// Messaging and containment.
fn register_world_fns(lua: &Lua, globals: &Table, host: &Arc<dyn HostApi>) -> mlua::Result<()> {
    {
        let host = Arc::clone(host);
        let f = lua.create_function(
            move |lua, (target, event, body, challenges): (String, String, Value, Value)| {
                let body = payload(lua, body)?;
                let challenges = challenges_from_lua(challenges)?;
                host.emit(&ObjectId::new(target), &event, body, challenges)
                    .map_err(host_err)
            },
        )?;
        globals.set("emit", f)?;
    }
    {
        let host = Arc::clone(host);
        let f = lua.create_function(
            move |lua, (location, event, body, challenges): (String, String, Value, Value)| {
                let body = payload(lua, body)?;
                let challenges = challenges_from_lua(challenges)?;
                host.emit_to_location(&ObjectId::new(location), &event, body, challenges)
                    .map_err(host_err)
            },
        )?;
        globals.set("emitToLocation", f)?;
    }
    {
        let host = Arc::clone(host);
        let f = lua.create_function(move |_, ()| {
            let location = host.location().map_err(host_err)?;
            Ok(location.map(|id| id.as_str().to_string()))
        })?;
        globals.set("getLocation", f)?;
    }
    {
        let host = Arc::clone(host);
        let f = lua.create_function(move |_, (id, destination): (String, String)| {
            host.move_object(&ObjectId::new(id), &ObjectId::new(destination))
                .map_err(host_err)
        })?;
        globals.set("moveObject", f)?;
    }
    {
        let host = Arc::clone(host);
        let f = lua.create_function(move |lua, ()| {
            let content = host.content().map_err(host_err)?;
            lua.create_sequence_from(content.iter().map(|id| id.as_str().to_string()))
        })?;
        globals.set("getContent", f)?;
    }
    {
        let host = Arc::clone(host);
        let f = lua.create_function(move |lua, ()| {
            let hood = host.neighbourhood().map_err(host_err)?;
            neighbourhood_to_lua(lua, &hood)
        })?;
        globals.set("getNeighbourhood", f)?;
    }
    {
        let host = Arc::clone(host);
        let f = lua.create_function(move |_, (path, location): (String, Option<String>)| {
            let location = match location {
                Some(location) => ObjectId::new(location),
                None => host.location().map_err(host_err)?.ok_or_else(|| {
                    mlua::Error::RuntimeError("createObject: no location given".into())
                })?,
            };
            let id = host.create_object(&path, &location).map_err(host_err)?;
            Ok(id.as_str().to_string())
        })?;
        globals.set("createObject", f)?;
    }
    {
        let host = Arc::clone(host);
        let f = lua.create_function(move |_, id: String| {
            host.remove_object(&ObjectId::new(id)).map_err(host_err)
        })?;
        globals.set("removeObject", f)?;
    }
    Ok(())
}

fn register_skill_fns(lua: &Lua, globals: &Table, host: &Arc<dyn HostApi>) -> mlua::Result<()> {
    {
        let host = Arc::clone(host);
        let f = lua.create_function(move |lua, name: String| match host.skill_config(&name) {
            Some(config) => Ok(Value::Table(skill_config_to_lua(lua, &config)?)),
            None => Ok(Value::Nil),
        })?;
        globals.set("getSkillConfig", f)?;
    }
    {
        // Malformed arguments lose the race rather than raising.
        let host = Arc::clone(host);
        let f = lua.create_function(move |_, (name, expected, new): (String, Value, Value)| {
            let expected = match expected {
                Value::Nil => None,
                value => match skill_config_from_lua(value) {
                    Ok(config) => Some(config),
                    Err(_) => return Ok(false),
                },
            };
            let Ok(new) = skill_config_from_lua(new) else {
                return Ok(false);
            };
            Ok(host.cas_skill_config(&name, expected, new))
        })?;
        globals.set("casSkillConfig", f)?;
    }
    Ok(())
}

fn register_timer_fns(lua: &Lua, globals: &Table, host: &Arc<dyn HostApi>) -> mlua::Result<()> {
    {
        let host = Arc::clone(host);
        let f = lua.create_function(move |lua, (delay, event, body): (f64, String, Value)| {
            let body = payload(lua, body)?;
            let id = host
                .set_timeout(millis(delay), &event, body)
                .map_err(host_err)?;
            Ok(id.as_str().to_string())
        })?;
        globals.set("setTimeout", f)?;
    }
    {
        let host = Arc::clone(host);
        let f = lua.create_function(move |lua, (period, event, body): (f64, String, Value)| {
            let body = payload(lua, body)?;
            let id = host
                .set_interval(millis(period), &event, body)
                .map_err(host_err)?;
            Ok(id.as_str().to_string())
        })?;
        globals.set("setInterval", f)?;
    }
    {
        let host = Arc::clone(host);
        let f = lua.create_function(move |_, id: Option<String>| {
            if let Some(id) = id {
                host.clear_interval(&TimerId::new(id));
            }
            Ok(())
        })?;
        globals.set("clearInterval", f)?;
    }
    Ok(())
}

fn register_log_fns(lua: &Lua, globals: &Table, host: &Arc<dyn HostApi>) -> mlua::Result<()> {
    {
        let host = Arc::clone(host);
        let f = lua.create_function(move |_, args: MultiValue| {
            let (level, message) = log_args(&args);
            host.log(level, &message);
            Ok(())
        })?;
        globals.set("log", f)?;
    }
    {
        let host = Arc::clone(host);
        let f = lua.create_function(move |_, args: MultiValue| {
            let message = args.iter().map(lua_display).collect::<Vec<_>>().join("\t");
            host.log(LogLevel::Info, &message);
            Ok(())
        })?;
        globals.set("print", f)?;
    }
    {
        let host = Arc::clone(host);
        let f = lua.create_function(move |_, args: MultiValue| {
            let text = args.iter().map(lua_display).collect::<Vec<_>>().join(" ");
            host.echo(&text);
            Ok(())
        })?;
        globals.set("echo", f)?;
    }
    Ok(())
}

/// Exposes `state` to the script.
pub(crate) fn inject_state(lua: &Lua, state: &serde_json::Value) -> mlua::Result<()> {
    let value = match state {
        serde_json::Value::Null => Value::Table(lua.create_table()?),
        state => json_to_lua(lua, state)?,
    };
    lua.globals().set("state", value)
}
