//! Execution context assembly and normalization.
//!
//! Every render evaluates against one [`ExecutionContext`]: a snapshot of
//! the invoking user, member, channel, guild, and message, plus positional
//! arguments and a bounded registry snapshot.
//!
//! Historically two field-naming conventions coexisted in authored
//! templates (`.user.id` and `.User.ID`). The normalizer populates BOTH
//! conventions for every field, so either spelling resolves identically.
//! Contexts are fully serializable: the scheduler captures one at schedule
//! time and replays it verbatim later.
//!
//! The registry snapshot (`Reg`, `RegGuild`) is loaded at most once per
//! context build, bounded to the first N entries, and partitioned by the
//! entry `type`: `"guild"` and `"guild:<current-guild>"` are guild-scoped,
//! other `guild:` prefixes belong to foreign guilds and are skipped, and
//! everything else is global. An unavailable registry store leaves both
//! maps empty rather than failing the build.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::stores::RegistryStore;
use crate::value::Value;

/// Platform user entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub bot: bool,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Guild membership details for a user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemberRecord {
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
}

/// Channel entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub nsfw: bool,
}

/// Guild entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuildRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub member_count: i64,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default)]
    pub icon_url: Option<String>,
}

/// The message that triggered the command, when one exists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub author_id: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Role entity, shared by the platform adapter and permission store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub position: i64,
}

/// Canonical per-render context snapshot.
///
/// `data` holds every section under both naming conventions; positional
/// arguments are mirrored under `Args`/`args` and kept separately for
/// cheap access and replacement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub guild_id: String,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    data: BTreeMap<String, Value>,
    args: Vec<String>,
}

impl ExecutionContext {
    /// Resolves a dotted context path (without the leading `.`).
    ///
    /// Lookup is case-sensitive; the normalizer guarantees both
    /// conventions exist, so `user.id` and `User.ID` both resolve.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        let (head, rest) = match path.split_once('.') {
            Some((h, r)) => (h, r),
            None => (path, ""),
        };
        let section = self.data.get(head)?;
        if rest.is_empty() {
            Some(section.clone())
        } else {
            section.get_path(rest).cloned()
        }
    }

    /// Positional arguments, in order.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    /// Derives a sibling context with replaced positional arguments.
    /// Everything else, including the registry snapshot, is shared as-is.
    pub fn with_args(&self, args: Vec<String>) -> Self {
        let mut derived = self.clone();
        let list = Value::from(args.clone());
        derived.data.insert("Args".to_string(), list.clone());
        derived.data.insert("args".to_string(), list);
        derived.args = args;
        derived
    }

    /// Global registry snapshot lookup.
    pub(crate) fn reg_get(&self, key: &str) -> Option<Value> {
        match self.data.get("Reg") {
            Some(Value::Map(map)) => map.get(key).cloned(),
            _ => None,
        }
    }

    /// Current-guild registry snapshot lookup.
    pub(crate) fn reg_guild_get(&self, key: &str) -> Option<Value> {
        match self.data.get("RegGuild") {
            Some(Value::Map(map)) => map.get(key).cloned(),
            _ => None,
        }
    }
}

/// Assembles an [`ExecutionContext`] from typed entity records or a
/// pre-assembled map in either naming convention.
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    guild: GuildRecord,
    user: Option<UserRecord>,
    member: Option<MemberRecord>,
    channel: Option<ChannelRecord>,
    message: Option<MessageRecord>,
    extra: BTreeMap<String, Value>,
    args: Vec<String>,
}

impl ContextBuilder {
    pub fn new(guild: GuildRecord) -> Self {
        Self {
            guild,
            ..Self::default()
        }
    }

    pub fn user(mut self, user: UserRecord) -> Self {
        self.user = Some(user);
        self
    }

    pub fn member(mut self, member: MemberRecord) -> Self {
        self.member = Some(member);
        self
    }

    pub fn channel(mut self, channel: ChannelRecord) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn message(mut self, message: MessageRecord) -> Self {
        self.message = Some(message);
        self
    }

    pub fn args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Merges a pre-assembled section (either naming convention); used
    /// when the caller already holds a raw platform event object.
    pub fn section(mut self, name: &str, value: Value) -> Self {
        self.extra.insert(name.to_string(), value);
        self
    }

    /// Builds the context, loading the registry snapshot once (fail-soft).
    pub async fn build(self, registry: &dyn RegistryStore, snapshot_limit: usize) -> ExecutionContext {
        let guild_id = self.guild.id.clone();
        let (reg, reg_guild) = load_registry_snapshot(registry, snapshot_limit, &guild_id).await;
        let mut ctx = self.build_detached();
        ctx.data.insert("Reg".to_string(), Value::Map(reg));
        ctx.data.insert("RegGuild".to_string(), Value::Map(reg_guild));
        ctx
    }

    /// Builds the context with empty registry maps.
    pub fn build_detached(self) -> ExecutionContext {
        let mut data = BTreeMap::new();
        let guild_id = self.guild.id.clone();
        let user_id = self.user.as_ref().map(|u| u.id.clone());
        let channel_id = self.channel.as_ref().map(|c| c.id.clone());

        insert_section(&mut data, "guild", record_to_value(&self.guild));
        if let Some(user) = &self.user {
            insert_section(&mut data, "user", record_to_value(user));
        }
        if let Some(member) = &self.member {
            insert_section(&mut data, "member", record_to_value(member));
        }
        if let Some(channel) = &self.channel {
            insert_section(&mut data, "channel", record_to_value(channel));
        }
        if let Some(message) = &self.message {
            insert_section(&mut data, "message", record_to_value(message));
        }
        for (name, value) in self.extra {
            insert_section(&mut data, &snake_of(&name), value);
        }

        let args = Value::from(self.args.clone());
        data.insert("Args".to_string(), args.clone());
        data.insert("args".to_string(), args);
        data.insert("Reg".to_string(), Value::Map(BTreeMap::new()));
        data.insert("RegGuild".to_string(), Value::Map(BTreeMap::new()));

        ExecutionContext {
            guild_id,
            channel_id,
            user_id,
            data,
            args: self.args,
        }
    }
}

/// Loads and partitions the bounded registry snapshot. Store failures
/// degrade to empty maps.
pub(crate) async fn load_registry_snapshot(
    registry: &dyn RegistryStore,
    limit: usize,
    guild_id: &str,
) -> (BTreeMap<String, Value>, BTreeMap<String, Value>) {
    let mut global = BTreeMap::new();
    let mut guild = BTreeMap::new();
    let entries = match registry.list_entries(limit).await {
        Ok(entries) => entries,
        Err(err) => {
            debug!("registry snapshot unavailable: {err:#}");
            return (global, guild);
        }
    };
    let current = format!("guild:{guild_id}");
    for entry in entries {
        let value = Value::from_json(entry.value);
        if entry.entry_type == "guild" || entry.entry_type == current {
            guild.insert(entry.key, value);
        } else if entry.entry_type.starts_with("guild:") {
            // foreign guild's entry, never exposed here
        } else {
            global.insert(entry.key, value);
        }
    }
    (global, guild)
}

/// Serializes a record and expands it into a dual-convention map.
pub(crate) fn record_to_value<T: Serialize>(record: &T) -> Value {
    match serde_json::to_value(record) {
        Ok(json) => dualize(Value::from_json(json)),
        Err(_) => Value::Null,
    }
}

fn insert_section(data: &mut BTreeMap<String, Value>, snake_name: &str, value: Value) {
    let value = dualize(value);
    data.insert(snake_name.to_string(), value.clone());
    data.insert(pascal_of(snake_name), value);
}

/// Recursively re-keys a map so every field exists under both the
/// `snake_case` and the `PascalCase`/`ID` convention.
fn dualize(value: Value) -> Value {
    match value {
        Value::Map(map) => {
            let mut out = BTreeMap::new();
            for (key, inner) in map {
                let inner = dualize(inner);
                let snake = snake_of(&key);
                out.insert(pascal_of(&snake), inner.clone());
                out.insert(snake, inner);
            }
            Value::Map(out)
        }
        Value::List(items) => Value::List(items.into_iter().map(dualize).collect()),
        other => other,
    }
}

/// `member_count` -> `MemberCount`, `id` -> `ID`, `avatar_url` -> `AvatarURL`.
fn pascal_of(snake: &str) -> String {
    snake
        .split('_')
        .map(|part| match part {
            "id" => "ID".to_string(),
            "url" => "URL".to_string(),
            "nsfw" => "NSFW".to_string(),
            "dm" => "DM".to_string(),
            _ => {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        })
        .collect()
}

/// `MemberCount` -> `member_count`, `AvatarURL` -> `avatar_url`; snake
/// input passes through unchanged.
fn snake_of(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let mut out = String::with_capacity(key.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && chars[i - 1].is_lowercase();
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if i > 0 && (prev_lower || next_lower) && chars[i - 1] != '_' {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_context() -> ExecutionContext {
        ContextBuilder::new(GuildRecord {
            id: "900".into(),
            name: "testers".into(),
            member_count: 128,
            owner_id: "42".into(),
            icon_url: None,
        })
        .user(UserRecord {
            id: "42".into(),
            name: "alice".into(),
            discriminator: None,
            bot: false,
            avatar_url: Some("https://cdn.example/a.png".into()),
        })
        .member(MemberRecord {
            nickname: Some("Al".into()),
            roles: vec!["1".into(), "2".into()],
            joined_at: None,
        })
        .channel(ChannelRecord {
            id: "77".into(),
            name: "general".into(),
            topic: Some("chat".into()),
            nsfw: false,
        })
        .args(vec!["first".into(), "second".into()])
        .build_detached()
    }

    #[test]
    fn both_conventions_resolve_identically() {
        let ctx = sample_context();
        assert_eq!(ctx.lookup("user.id"), Some(Value::Str("42".into())));
        assert_eq!(ctx.lookup("User.ID"), Some(Value::Str("42".into())));
        assert_eq!(
            ctx.lookup("guild.member_count"),
            ctx.lookup("Guild.MemberCount")
        );
        assert_eq!(
            ctx.lookup("user.avatar_url"),
            ctx.lookup("User.AvatarURL")
        );
    }

    #[test]
    fn args_resolve_by_index() {
        let ctx = sample_context();
        assert_eq!(ctx.lookup("Args.0"), Some(Value::Str("first".into())));
        assert_eq!(ctx.lookup("args.1"), Some(Value::Str("second".into())));
    }

    #[test]
    fn with_args_replaces_only_positionals() {
        let ctx = sample_context();
        let derived = ctx.with_args(vec!["other".into()]);
        assert_eq!(derived.lookup("Args.0"), Some(Value::Str("other".into())));
        assert_eq!(derived.lookup("User.ID"), ctx.lookup("User.ID"));
        assert_eq!(ctx.lookup("Args.0"), Some(Value::Str("first".into())));
    }

    #[test]
    fn snake_and_pascal_conversions() {
        assert_eq!(pascal_of("member_count"), "MemberCount");
        assert_eq!(pascal_of("id"), "ID");
        assert_eq!(pascal_of("avatar_url"), "AvatarURL");
        assert_eq!(snake_of("MemberCount"), "member_count");
        assert_eq!(snake_of("AvatarURL"), "avatar_url");
        assert_eq!(snake_of("ID"), "id");
        assert_eq!(snake_of("already_snake"), "already_snake");
    }

    #[test]
    fn context_round_trips_through_serde() {
        let ctx = sample_context();
        let json = serde_json::to_string(&ctx).expect("serializes");
        let back: ExecutionContext = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(back.lookup("User.ID"), ctx.lookup("User.ID"));
        assert_eq!(back.args(), ctx.args());
    }
}
