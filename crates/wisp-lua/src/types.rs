//! Conversions between Lua values and the object model.
//!
//! Model types are converted field by field with PascalCase keys, the
//! same names their JSON form uses:
//!
//! ```lua
//! setDescriptions({
//!   { Short = "a rusty key", Long = "Orange with age.",
//!     Challenges = { { Skill = "perception", Level = 10 } } },
//! })
//! ```
//!
//! Free-form payloads and State go through serde instead.

use mlua::{DeserializeOptions, Lua, LuaSerdeExt, SerializeOptions, Table, Value};
use std::collections::{BTreeMap, BTreeSet};
use wisp_script::{Neighbourhood, ObjectView};
use wisp_types::{Challenge, Description, Exit, MovementConfig, Skill, SkillConfig, Tag};

type LuaResult<T> = mlua::Result<T>;

fn type_error(what: &str, message: impl std::fmt::Display) -> mlua::Error {
    mlua::Error::RuntimeError(format!("invalid {what}: {message}"))
}

fn expect_table(value: Value, what: &str) -> LuaResult<Table> {
    match value {
        Value::Table(t) => Ok(t),
        other => Err(type_error(what, format!("expected table, got {}", other.type_name()))),
    }
}

/// Items of a sequence table, in order.
fn sequence(table: &Table, what: &str) -> LuaResult<Vec<Value>> {
    table
        .clone()
        .sequence_values::<Value>()
        .collect::<LuaResult<Vec<_>>>()
        .map_err(|e| type_error(what, e))
}

fn required_string(table: &Table, key: &str, what: &str) -> LuaResult<String> {
    match table.get::<Value>(key)? {
        Value::String(s) => Ok(s.to_str()?.to_string()),
        Value::Nil => Err(type_error(what, format!("{key} is required"))),
        other => Err(type_error(
            what,
            format!("{key} must be a string, got {}", other.type_name()),
        )),
    }
}

fn optional_string(table: &Table, key: &str, what: &str) -> LuaResult<Option<String>> {
    match table.get::<Value>(key)? {
        Value::Nil => Ok(None),
        Value::String(s) => Ok(Some(s.to_str()?.to_string())),
        other => Err(type_error(
            what,
            format!("{key} must be a string, got {}", other.type_name()),
        )),
    }
}

fn number(table: &Table, key: &str, what: &str) -> LuaResult<f64> {
    match table.get::<Value>(key)? {
        Value::Nil => Ok(0.0),
        Value::Integer(i) => Ok(i as f64),
        Value::Number(n) => Ok(n),
        other => Err(type_error(
            what,
            format!("{key} must be a number, got {}", other.type_name()),
        )),
    }
}

// === Challenges ===

pub fn challenge_from_lua(value: Value) -> LuaResult<Challenge> {
    let t = expect_table(value, "challenge")?;
    Ok(Challenge {
        skill: required_string(&t, "Skill", "challenge")?,
        level: number(&t, "Level", "challenge")?,
        message: optional_string(&t, "Message", "challenge")?,
    })
}

/// A challenge list; `nil` means none.
pub fn challenges_from_lua(value: Value) -> LuaResult<Vec<Challenge>> {
    match value {
        Value::Nil => Ok(Vec::new()),
        value => {
            let t = expect_table(value, "challenges")?;
            sequence(&t, "challenges")?
                .into_iter()
                .map(challenge_from_lua)
                .collect()
        }
    }
}

// === Descriptions and exits ===

pub fn description_from_lua(value: Value) -> LuaResult<Description> {
    let t = expect_table(value, "description")?;
    Ok(Description {
        short: required_string(&t, "Short", "description")?,
        long: optional_string(&t, "Long", "description")?.unwrap_or_default(),
        unique: t.get::<Option<bool>>("Unique")?.unwrap_or(false),
        challenges: challenges_from_lua(t.get("Challenges")?)?,
    })
}

pub fn descriptions_from_lua(value: Value) -> LuaResult<Vec<Description>> {
    let t = expect_table(value, "descriptions")?;
    sequence(&t, "descriptions")?
        .into_iter()
        .map(description_from_lua)
        .collect()
}

pub fn exit_from_lua(value: Value) -> LuaResult<Exit> {
    let t = expect_table(value, "exit")?;
    Ok(Exit {
        descriptions: descriptions_from_lua(t.get("Descriptions")?)?,
        destination: required_string(&t, "Destination", "exit")?.into(),
        use_challenges: challenges_from_lua(t.get("UseChallenges")?)?,
        message: optional_string(&t, "Message", "exit")?,
    })
}

pub fn exits_from_lua(value: Value) -> LuaResult<Vec<Exit>> {
    let t = expect_table(value, "exits")?;
    sequence(&t, "exits")?.into_iter().map(exit_from_lua).collect()
}

// === Skills ===

/// `{ name = { Practical = n, Theoretical = n } }`.
pub fn skills_from_lua(value: Value) -> LuaResult<BTreeMap<String, Skill>> {
    let t = expect_table(value, "skills")?;
    let mut skills = BTreeMap::new();
    for pair in t.pairs::<String, Value>() {
        let (name, value) = pair.map_err(|e| type_error("skills", e))?;
        let s = expect_table(value, "skill")?;
        skills.insert(
            name,
            Skill {
                practical: number(&s, "Practical", "skill")?,
                theoretical: number(&s, "Theoretical", "skill")?,
            },
        );
    }
    Ok(skills)
}

pub fn skill_config_from_lua(value: Value) -> LuaResult<SkillConfig> {
    let t = expect_table(value, "skill config")?;
    Ok(SkillConfig {
        forget: number(&t, "Forget", "skill config")?,
        recharge: number(&t, "Recharge", "skill config")?,
        duration: number(&t, "Duration", "skill config")?,
    })
}

pub fn skill_config_to_lua(lua: &Lua, config: &SkillConfig) -> LuaResult<Table> {
    let t = lua.create_table()?;
    t.set("Forget", config.forget)?;
    t.set("Recharge", config.recharge)?;
    t.set("Duration", config.duration)?;
    Ok(t)
}

pub fn movement_from_lua(value: Value) -> LuaResult<MovementConfig> {
    let t = expect_table(value, "movement")?;
    Ok(MovementConfig {
        active: t.get::<Option<bool>>("Active")?.unwrap_or(false),
        verb: optional_string(&t, "Verb", "movement")?.unwrap_or_default(),
    })
}

// === Callback tags ===

/// A single tag name or a list of them.
pub fn tags_from_lua(value: Value) -> LuaResult<BTreeSet<Tag>> {
    let names: Vec<String> = match value {
        Value::String(s) => vec![s.to_str()?.to_string()],
        Value::Table(t) => t
            .sequence_values::<String>()
            .collect::<LuaResult<Vec<_>>>()
            .map_err(|e| type_error("tags", e))?,
        other => {
            return Err(type_error(
                "tags",
                format!("expected string or list, got {}", other.type_name()),
            ))
        }
    };
    let tags = names
        .iter()
        .map(|n| n.parse::<Tag>().map_err(mlua::Error::RuntimeError))
        .collect::<LuaResult<BTreeSet<_>>>()?;
    if tags.is_empty() {
        return Err(type_error("tags", "at least one tag is required"));
    }
    Ok(tags)
}

// === Views ===

pub fn object_view_to_lua(lua: &Lua, view: &ObjectView) -> LuaResult<Table> {
    let t = lua.create_table()?;
    t.set("Id", view.id.as_str())?;
    t.set("Short", view.short.as_str())?;
    if !view.long.is_empty() {
        t.set("Long", view.long.as_str())?;
    }
    Ok(t)
}

/// `{ Location = view?, Content = { view... }, Neighbours = { exit = view } }`.
pub fn neighbourhood_to_lua(lua: &Lua, hood: &Neighbourhood) -> LuaResult<Table> {
    let t = lua.create_table()?;
    if let Some(location) = &hood.location {
        t.set("Location", object_view_to_lua(lua, location)?)?;
    }
    let content = lua.create_table()?;
    for (i, view) in hood.content.iter().enumerate() {
        content.raw_set(i + 1, object_view_to_lua(lua, view)?)?;
    }
    t.set("Content", content)?;
    let neighbours = lua.create_table()?;
    for (exit, view) in &hood.neighbours {
        neighbours.set(exit.as_str(), object_view_to_lua(lua, view)?)?;
    }
    t.set("Neighbours", neighbours)?;
    Ok(t)
}

// === JSON ===

/// JSON to Lua. `null` becomes `nil`.
pub fn json_to_lua(lua: &Lua, value: &serde_json::Value) -> LuaResult<Value> {
    lua.to_value_with(
        value,
        SerializeOptions::new()
            .serialize_none_to_null(false)
            .serialize_unit_to_null(false),
    )
}

/// Lua to JSON. Functions and other non-data values are skipped.
pub fn lua_to_json(lua: &Lua, value: Value) -> LuaResult<serde_json::Value> {
    lua.from_value_with(value, DeserializeOptions::new().deny_unsupported_types(false))
}
