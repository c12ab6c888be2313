//! Collaborator interfaces consumed by the engine and scheduler.
//!
//! The core owns no persistence and no platform connection. Everything
//! external - command storage, the chat platform, the key-value registry,
//! permissions, and the scheduled-job table - is reached through the
//! object-safe traits here and injected once at startup as a
//! [`Collaborators`] bundle. No module-level singletons.
//!
//! All trait methods return `anyhow::Result` so implementations can bubble
//! whatever their backend produces; the builtin handlers are responsible
//! for reducing those failures to fail-soft values or status strings (the
//! render must not abort on collaborator trouble).

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::context::{ChannelRecord, GuildRecord, MemberRecord, RoleRecord, UserRecord};
use crate::scheduler::ScheduledJob;

/// A stored custom command, resolved by numeric id or name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCommand {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub enabled: bool,
}

/// One key-value registry entry. The `entry_type` carries the scoping
/// convention: `"guild"` / `"guild:<id>"` are guild-scoped, anything else
/// is global.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub key: String,
    pub value: serde_json::Value,
    pub entry_type: String,
}

/// Resolves sibling custom commands within a guild.
#[async_trait]
pub trait CommandStore: Send + Sync {
    /// `id_or_name` matches the numeric id when it parses as one,
    /// otherwise the command name.
    async fn resolve(&self, guild_id: &str, id_or_name: &str) -> Result<Option<StoredCommand>>;
}

/// Read and mutate platform entities, send messages and DMs.
///
/// Mutation outcomes are reduced to status strings inside the builtin
/// handlers; an `Err` from any of these methods never propagates past
/// the handler that called it.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>>;
    async fn get_member(&self, guild_id: &str, user_id: &str) -> Result<Option<MemberRecord>>;
    async fn get_channel(&self, channel_id: &str) -> Result<Option<ChannelRecord>>;
    async fn get_guild(&self, guild_id: &str) -> Result<Option<GuildRecord>>;
    /// Resolves a role by id or by (case-sensitive) name.
    async fn get_role(&self, guild_id: &str, id_or_name: &str) -> Result<Option<RoleRecord>>;

    async fn add_role(&self, guild_id: &str, user_id: &str, role_id: &str) -> Result<()>;
    async fn remove_role(&self, guild_id: &str, user_id: &str, role_id: &str) -> Result<()>;
    async fn edit_nickname(&self, guild_id: &str, user_id: &str, nickname: &str) -> Result<()>;
    /// Returns the sent message's id.
    async fn send_message(&self, channel_id: &str, content: &str) -> Result<String>;
    /// Returns the sent message's id.
    async fn send_dm(&self, user_id: &str, content: &str) -> Result<String>;
    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<()>;
    async fn add_reaction(&self, channel_id: &str, message_id: &str, emoji: &str) -> Result<()>;
}

/// External guild/global key-value configuration store.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// First `limit` entries, used for the per-render snapshot.
    async fn list_entries(&self, limit: usize) -> Result<Vec<RegistryEntry>>;
    async fn get(&self, key: &str, entry_type: &str) -> Result<Option<serde_json::Value>>;
    async fn set(&self, key: &str, entry_type: &str, value: serde_json::Value) -> Result<()>;
    async fn delete(&self, key: &str, entry_type: &str) -> Result<()>;
}

/// Role and permission queries.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn user_roles(&self, guild_id: &str, user_id: &str) -> Result<Vec<RoleRecord>>;
    async fn check_permission(&self, guild_id: &str, user_id: &str, permission: &str)
    -> Result<bool>;
    async fn user_permissions(&self, guild_id: &str, user_id: &str) -> Result<Vec<String>>;
}

/// Persistence for scheduled jobs.
///
/// `select_due` must return jobs with `execute_at <= now` and
/// `executed = false`, ordered oldest-first, at most `limit` of them.
/// The mark methods set `executed = true` exactly once; implementations
/// must never flip it back.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: &ScheduledJob) -> Result<()>;
    async fn select_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ScheduledJob>>;
    async fn mark_done(&self, id: &str, at: DateTime<Utc>) -> Result<()>;
    async fn mark_failed(&self, id: &str, at: DateTime<Utc>, error: &str) -> Result<()>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn pending_for_guild(&self, guild_id: &str) -> Result<Vec<ScheduledJob>>;
}

/// The injected data-access context shared by the engine and scheduler.
#[derive(Clone)]
pub struct Collaborators {
    pub commands: Arc<dyn CommandStore>,
    pub platform: Arc<dyn PlatformAdapter>,
    pub registry: Arc<dyn RegistryStore>,
    pub permissions: Arc<dyn PermissionStore>,
    pub jobs: Arc<dyn JobStore>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
