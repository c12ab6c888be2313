//! Embed assembly builtins. Pure.
//!
//! An embed is an ordinary map value tagged `type: "embed"`; the chat
//! layer consuming the render output decides how to post it. Builders
//! accept either a map value or a string holding the map's JSON (the
//! paren re-substitution form) and return the updated map.

use std::collections::BTreeMap;

use super::{FunctionTable, arg, builtin, text};
use crate::engine::EngineState;
use crate::error::EngineError;
use crate::value::Value;

pub(crate) fn register(table: &mut FunctionTable) {
    builtin!(table, "embed", Pure, embed);
    builtin!(table, "embedTitle", Pure, embed_title);
    builtin!(table, "embedDescription", Pure, embed_description);
    builtin!(table, "embedColor", Pure, embed_color);
    builtin!(table, "embedField", Pure, embed_field);
    builtin!(table, "embedFooter", Pure, embed_footer);
    builtin!(table, "embedThumbnail", Pure, embed_thumbnail);
}

fn as_embed(value: &Value) -> BTreeMap<String, Value> {
    let map = match value {
        Value::Map(map) => Some(map.clone()),
        Value::Str(s) if s.trim_start().starts_with('{') => {
            match serde_json::from_str::<Value>(s) {
                Ok(Value::Map(map)) => Some(map),
                _ => None,
            }
        }
        _ => None,
    };
    let mut map = map.unwrap_or_default();
    map.entry("type".to_string())
        .or_insert_with(|| Value::Str("embed".into()));
    map
}

/// `embed [title] [description]` - a fresh embed map.
async fn embed(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let mut map = as_embed(&Value::Null);
    if !text(&args, 0).is_empty() {
        map.insert("title".to_string(), Value::Str(text(&args, 0)));
    }
    if !text(&args, 1).is_empty() {
        map.insert("description".to_string(), Value::Str(text(&args, 1)));
    }
    Ok(Value::Map(map))
}

async fn embed_title(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let mut map = as_embed(&arg(&args, 0));
    map.insert("title".to_string(), Value::Str(text(&args, 1)));
    Ok(Value::Map(map))
}

async fn embed_description(
    _state: &mut EngineState<'_>,
    args: Vec<Value>,
) -> Result<Value, EngineError> {
    let mut map = as_embed(&arg(&args, 0));
    map.insert("description".to_string(), Value::Str(text(&args, 1)));
    Ok(Value::Map(map))
}

async fn embed_color(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let mut map = as_embed(&arg(&args, 0));
    map.insert("color".to_string(), Value::Str(text(&args, 1)));
    Ok(Value::Map(map))
}

/// `embedField e name value` - appends to the embed's `fields` list.
async fn embed_field(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let mut map = as_embed(&arg(&args, 0));
    let mut field = BTreeMap::new();
    field.insert("name".to_string(), Value::Str(text(&args, 1)));
    field.insert("value".to_string(), Value::Str(text(&args, 2)));

    let mut fields = match map.remove("fields").and_then(|f| f.as_list()) {
        Some(items) => items,
        None => Vec::new(),
    };
    fields.push(Value::Map(field));
    map.insert("fields".to_string(), Value::List(fields));
    Ok(Value::Map(map))
}

async fn embed_footer(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let mut map = as_embed(&arg(&args, 0));
    map.insert("footer".to_string(), Value::Str(text(&args, 1)));
    Ok(Value::Map(map))
}

async fn embed_thumbnail(
    _state: &mut EngineState<'_>,
    args: Vec<Value>,
) -> Result<Value, EngineError> {
    let mut map = as_embed(&arg(&args, 0));
    map.insert("thumbnail".to_string(), Value::Str(text(&args, 1)));
    Ok(Value::Map(map))
}

#[cfg(test)]
mod tests {
    use crate::test_utils::TestWorld;

    #[tokio::test]
    async fn embed_renders_as_json_map() {
        let world = TestWorld::new();
        let out = world.render(r#"{{embed "Title" "Body"}}"#).await;
        let json: serde_json::Value = serde_json::from_str(&out).expect("json embed");
        assert_eq!(json["type"], "embed");
        assert_eq!(json["title"], "Title");
        assert_eq!(json["description"], "Body");
    }

    #[tokio::test]
    async fn multi_word_title_survives_nesting() {
        let world = TestWorld::new();
        let out = world
            .render(r#"{{embedField (embed "My Title") "a" "1"}}"#)
            .await;
        let json: serde_json::Value = serde_json::from_str(&out).expect("json embed");
        assert_eq!(json["title"], "My Title");
        let fields = json["fields"].as_array().expect("fields list");
        assert_eq!(fields[0]["name"], "a");
        assert_eq!(fields[0]["value"], "1");
    }

    #[tokio::test]
    async fn fields_accumulate_through_nesting() {
        let world = TestWorld::new();
        let out = world
            .render(r#"{{embedField (embedField (embed "T") "a" "1") "b" "2"}}"#)
            .await;
        let json: serde_json::Value = serde_json::from_str(&out).expect("json embed");
        let fields = json["fields"].as_array().expect("fields list");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0]["name"], "a");
        assert_eq!(fields[1]["name"], "b");
    }
}
