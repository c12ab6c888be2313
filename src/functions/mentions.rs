//! Mention and id helpers. Pure.

use super::{FunctionTable, builtin, text};
use crate::engine::EngineState;
use crate::error::EngineError;
use crate::value::Value;

pub(crate) fn register(table: &mut FunctionTable) {
    builtin!(table, "userMention", Pure, user_mention);
    builtin!(table, "channelMention", Pure, channel_mention);
    builtin!(table, "roleMention", Pure, role_mention);
    builtin!(table, "mentionToID", Pure, mention_to_id);
    builtin!(table, "escapeMentions", Pure, escape_mentions);
    builtin!(table, "everyoneMention", Pure, everyone_mention);
}

async fn user_mention(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Str(format!("<@{}>", text(&args, 0))))
}

async fn channel_mention(
    _state: &mut EngineState<'_>,
    args: Vec<Value>,
) -> Result<Value, EngineError> {
    Ok(Value::Str(format!("<#{}>", text(&args, 0))))
}

async fn role_mention(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    Ok(Value::Str(format!("<@&{}>", text(&args, 0))))
}

/// Strips mention decoration, leaving the bare id. A bare id passes
/// through unchanged.
async fn mention_to_id(_state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let id: String = text(&args, 0)
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    Ok(Value::Str(id))
}

/// Defangs `@everyone` / `@here` and user mentions with a zero-width
/// space so echoed input cannot ping.
async fn escape_mentions(
    _state: &mut EngineState<'_>,
    args: Vec<Value>,
) -> Result<Value, EngineError> {
    let out = text(&args, 0)
        .replace("@everyone", "@\u{200b}everyone")
        .replace("@here", "@\u{200b}here")
        .replace("<@", "<@\u{200b}");
    Ok(Value::Str(out))
}

async fn everyone_mention(
    _state: &mut EngineState<'_>,
    _args: Vec<Value>,
) -> Result<Value, EngineError> {
    Ok(Value::Str("@everyone".to_string()))
}

#[cfg(test)]
mod tests {
    use crate::test_utils::TestWorld;

    #[tokio::test]
    async fn mention_forms() {
        let world = TestWorld::new();
        assert_eq!(world.render(r#"{{userMention "42"}}"#).await, "<@42>");
        assert_eq!(world.render(r#"{{channelMention "77"}}"#).await, "<#77>");
        assert_eq!(world.render(r#"{{roleMention "9"}}"#).await, "<@&9>");
    }

    #[tokio::test]
    async fn mention_to_id_strips_decoration() {
        let world = TestWorld::new();
        assert_eq!(world.render(r#"{{mentionToID "<@!123>"}}"#).await, "123");
        assert_eq!(world.render(r#"{{mentionToID "123"}}"#).await, "123");
    }

    #[tokio::test]
    async fn mention_from_context_id() {
        let world = TestWorld::new();
        assert_eq!(world.render("{{userMention .User.ID}}").await, "<@42>");
    }

    #[tokio::test]
    async fn escaping_defangs_pings() {
        let world = TestWorld::new();
        let out = world.render(r#"{{escapeMentions "hi @everyone"}}"#).await;
        assert_eq!(out, "hi @\u{200b}everyone");
    }
}
