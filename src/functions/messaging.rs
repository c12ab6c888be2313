//! Mutating platform builtins: role changes, nickname edits, messages.
//!
//! Each performs exactly one external side effect, catches every failure
//! internally, and returns a human-readable status string. A mutation
//! failure never aborts the render.

use tracing::debug;

use super::{FunctionTable, builtin, target_user, text};
use crate::engine::EngineState;
use crate::error::EngineError;
use crate::value::Value;

pub(crate) fn register(table: &mut FunctionTable) {
    builtin!(table, "addRole", MutatingIo, add_role);
    builtin!(table, "removeRole", MutatingIo, remove_role);
    builtin!(table, "toggleRole", MutatingIo, toggle_role);
    builtin!(table, "editNickname", MutatingIo, edit_nickname);
    builtin!(table, "sendMessage", MutatingIo, send_message);
    builtin!(table, "sendChannelMessage", MutatingIo, send_channel_message);
    builtin!(table, "sendDM", MutatingIo, send_dm);
    builtin!(table, "deleteMessage", MutatingIo, delete_message);
    builtin!(table, "addReaction", MutatingIo, add_reaction);
}

/// `addRole roleIdOrName [user]`.
async fn add_role(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let wanted = text(&args, 0);
    let user_id = target_user(state, &args, 1);
    let guild_id = state.ctx.guild_id.clone();
    let platform = state.engine.deps.platform.clone();

    let role = match platform.get_role(&guild_id, &wanted).await {
        Ok(Some(role)) => role,
        Ok(None) => return Ok(Value::Str(format!("Failed to add role: unknown role {wanted}"))),
        Err(err) => {
            debug!("addRole lookup failed: {err:#}");
            return Ok(Value::Str(format!("Failed to add role: {err}")));
        }
    };
    match platform.add_role(&guild_id, &user_id, &role.id).await {
        Ok(()) => Ok(Value::Str(format!("Added role: {}", role.name))),
        Err(err) => {
            debug!("addRole failed: {err:#}");
            Ok(Value::Str(format!("Failed to add role: {err}")))
        }
    }
}

/// `removeRole roleIdOrName [user]`.
async fn remove_role(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let wanted = text(&args, 0);
    let user_id = target_user(state, &args, 1);
    let guild_id = state.ctx.guild_id.clone();
    let platform = state.engine.deps.platform.clone();

    let role = match platform.get_role(&guild_id, &wanted).await {
        Ok(Some(role)) => role,
        Ok(None) => {
            return Ok(Value::Str(format!(
                "Failed to remove role: unknown role {wanted}"
            )));
        }
        Err(err) => {
            debug!("removeRole lookup failed: {err:#}");
            return Ok(Value::Str(format!("Failed to remove role: {err}")));
        }
    };
    match platform.remove_role(&guild_id, &user_id, &role.id).await {
        Ok(()) => Ok(Value::Str(format!("Removed role: {}", role.name))),
        Err(err) => {
            debug!("removeRole failed: {err:#}");
            Ok(Value::Str(format!("Failed to remove role: {err}")))
        }
    }
}

/// `toggleRole roleIdOrName [user]` - adds when absent, removes when held.
async fn toggle_role(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let wanted = text(&args, 0);
    let user_id = target_user(state, &args, 1);
    let guild_id = state.ctx.guild_id.clone();
    let platform = state.engine.deps.platform.clone();

    let role = match platform.get_role(&guild_id, &wanted).await {
        Ok(Some(role)) => role,
        Ok(None) => {
            return Ok(Value::Str(format!(
                "Failed to toggle role: unknown role {wanted}"
            )));
        }
        Err(err) => {
            debug!("toggleRole lookup failed: {err:#}");
            return Ok(Value::Str(format!("Failed to toggle role: {err}")));
        }
    };
    let held = match platform.get_member(&guild_id, &user_id).await {
        Ok(Some(member)) => member.roles.iter().any(|r| r == &role.id),
        Ok(None) => false,
        Err(err) => {
            debug!("toggleRole member lookup failed: {err:#}");
            return Ok(Value::Str(format!("Failed to toggle role: {err}")));
        }
    };
    let outcome = if held {
        platform
            .remove_role(&guild_id, &user_id, &role.id)
            .await
            .map(|()| format!("Removed role: {}", role.name))
    } else {
        platform
            .add_role(&guild_id, &user_id, &role.id)
            .await
            .map(|()| format!("Added role: {}", role.name))
    };
    match outcome {
        Ok(status) => Ok(Value::Str(status)),
        Err(err) => {
            debug!("toggleRole failed: {err:#}");
            Ok(Value::Str(format!("Failed to toggle role: {err}")))
        }
    }
}

/// `editNickname nick [user]`.
async fn edit_nickname(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let nickname = text(&args, 0);
    let user_id = target_user(state, &args, 1);
    let guild_id = state.ctx.guild_id.clone();
    match state
        .engine
        .deps
        .platform
        .edit_nickname(&guild_id, &user_id, &nickname)
        .await
    {
        Ok(()) => Ok(Value::Str(format!("Nickname set to: {nickname}"))),
        Err(err) => {
            debug!("editNickname failed: {err:#}");
            Ok(Value::Str(format!("Failed to edit nickname: {err}")))
        }
    }
}

/// `sendMessage content` - posts to the invoking channel.
async fn send_message(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let content = text(&args, 0);
    let channel_id = state.ctx.channel_id.clone().unwrap_or_default();
    if channel_id.is_empty() {
        return Ok(Value::Str("Failed to send message: no channel".to_string()));
    }
    deliver(state, &channel_id, &content).await
}

/// `sendChannelMessage channelId content`.
async fn send_channel_message(
    state: &mut EngineState<'_>,
    args: Vec<Value>,
) -> Result<Value, EngineError> {
    let channel_id = text(&args, 0);
    let content = text(&args, 1);
    deliver(state, &channel_id, &content).await
}

async fn deliver(
    state: &mut EngineState<'_>,
    channel_id: &str,
    content: &str,
) -> Result<Value, EngineError> {
    match state.engine.deps.platform.send_message(channel_id, content).await {
        Ok(message_id) => Ok(Value::Str(format!("Sent message: {message_id}"))),
        Err(err) => {
            debug!("sendMessage failed: {err:#}");
            Ok(Value::Str(format!("Failed to send message: {err}")))
        }
    }
}

/// `sendDM content [user]`.
async fn send_dm(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let content = text(&args, 0);
    let user_id = target_user(state, &args, 1);
    match state.engine.deps.platform.send_dm(&user_id, &content).await {
        Ok(message_id) => Ok(Value::Str(format!("Sent DM: {message_id}"))),
        Err(err) => {
            debug!("sendDM failed: {err:#}");
            Ok(Value::Str(format!("Failed to send DM: {err}")))
        }
    }
}

/// `deleteMessage messageId [channelId]` - defaults to the invoking
/// channel.
async fn delete_message(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let message_id = text(&args, 0);
    let channel_id = {
        let explicit = text(&args, 1);
        if explicit.is_empty() {
            state.ctx.channel_id.clone().unwrap_or_default()
        } else {
            explicit
        }
    };
    match state
        .engine
        .deps
        .platform
        .delete_message(&channel_id, &message_id)
        .await
    {
        Ok(()) => Ok(Value::Str("Deleted message".to_string())),
        Err(err) => {
            debug!("deleteMessage failed: {err:#}");
            Ok(Value::Str(format!("Failed to delete message: {err}")))
        }
    }
}

/// `addReaction emoji [messageId]` - defaults to the triggering message.
async fn add_reaction(state: &mut EngineState<'_>, args: Vec<Value>) -> Result<Value, EngineError> {
    let emoji = text(&args, 0);
    let message_id = {
        let explicit = text(&args, 1);
        if explicit.is_empty() {
            state
                .ctx
                .lookup("message.id")
                .map(|v| v.stringify())
                .unwrap_or_default()
        } else {
            explicit
        }
    };
    let channel_id = state.ctx.channel_id.clone().unwrap_or_default();
    match state
        .engine
        .deps
        .platform
        .add_reaction(&channel_id, &message_id, &emoji)
        .await
    {
        Ok(()) => Ok(Value::Str(format!("Reacted with {emoji}"))),
        Err(err) => {
            debug!("addReaction failed: {err:#}");
            Ok(Value::Str(format!("Failed to add reaction: {err}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::TestWorld;

    #[tokio::test]
    async fn add_role_reports_by_name() {
        let world = TestWorld::new();
        assert_eq!(world.render(r#"{{addRole "mods"}}"#).await, "Added role: mods");
        assert!(world.platform.role_grants().contains(&(
            "900".to_string(),
            "42".to_string(),
            "5".to_string()
        )));
    }

    #[tokio::test]
    async fn unknown_role_degrades_to_status_text() {
        let world = TestWorld::new();
        let outcome = world.render_outcome(r#"{{addRole "ghosts"}}"#).await;
        assert!(outcome.success);
        assert_eq!(
            outcome.output.as_deref(),
            Some("Failed to add role: unknown role ghosts")
        );
    }

    #[tokio::test]
    async fn platform_outage_keeps_render_alive() {
        let world = TestWorld::new();
        world.platform.fail_all();
        let outcome = world.render_outcome(r#"pre {{sendMessage "hi"}} post"#).await;
        assert!(outcome.success);
        let output = outcome.output.unwrap_or_default();
        assert!(output.starts_with("pre Failed to send message"), "got: {output}");
    }

    #[tokio::test]
    async fn toggle_role_flips_membership() {
        let world = TestWorld::new();
        assert_eq!(world.render(r#"{{toggleRole "mods"}}"#).await, "Added role: mods");
        assert_eq!(world.render(r#"{{toggleRole "mods"}}"#).await, "Removed role: mods");
    }

    #[tokio::test]
    async fn dm_goes_to_invoker_by_default() {
        let world = TestWorld::new();
        let out = world.render(r#"{{sendDM "psst"}}"#).await;
        assert!(out.starts_with("Sent DM:"), "got: {out}");
        assert_eq!(world.platform.dms(), vec![("42".to_string(), "psst".to_string())]);
    }
}
