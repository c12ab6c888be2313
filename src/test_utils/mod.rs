//! Test utilities: in-memory collaborator implementations.
//!
//! This module provides a complete fake backend (`TestWorld`) so engine
//! and scheduler behavior can be exercised without any real platform or
//! database. Every store records its mutations for assertions and can be
//! switched into a failing mode to exercise the fail-soft paths.
//!
//! Available to unit tests, the `tests/` suites, and downstream crates
//! writing their own collaborator-backed tests.

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::EnvFilter;

use crate::context::{
    ChannelRecord, ContextBuilder, ExecutionContext, GuildRecord, MemberRecord, RoleRecord,
    UserRecord,
};
use crate::engine::{Engine, EngineConfig};
use crate::error::RenderOutcome;
use crate::scheduler::ScheduledJob;
use crate::stores::{
    Collaborators, CommandStore, JobStore, PermissionStore, PlatformAdapter, RegistryEntry,
    RegistryStore, StoredCommand,
};

static INIT_LOGGING: Once = Once::new();

/// Initializes the tracing subscriber for tests, at most once per
/// process. Honors `RUST_LOG`; without it no subscriber is installed.
///
/// ```bash
/// RUST_LOG=ccengine=debug cargo test
/// ```
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        if std::env::var("RUST_LOG").is_err() {
            return;
        }
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// In-memory [`CommandStore`].
#[derive(Default)]
pub struct MemoryCommandStore {
    commands: Mutex<Vec<StoredCommand>>,
}

impl MemoryCommandStore {
    pub fn add(&self, id: i64, name: &str, code: &str, enabled: bool) {
        self.commands.lock().expect("lock").push(StoredCommand {
            id,
            name: name.to_string(),
            code: code.to_string(),
            enabled,
        });
    }
}

#[async_trait]
impl CommandStore for MemoryCommandStore {
    async fn resolve(&self, _guild_id: &str, id_or_name: &str) -> Result<Option<StoredCommand>> {
        let commands = self.commands.lock().expect("lock");
        if let Ok(id) = id_or_name.parse::<i64>() {
            return Ok(commands.iter().find(|c| c.id == id).cloned());
        }
        Ok(commands.iter().find(|c| c.name == id_or_name).cloned())
    }
}

/// In-memory [`PlatformAdapter`] with mutation logs and a failure switch.
pub struct MemoryPlatform {
    users: Mutex<HashMap<String, UserRecord>>,
    members: Mutex<HashMap<(String, String), MemberRecord>>,
    channels: Mutex<HashMap<String, ChannelRecord>>,
    guilds: Mutex<HashMap<String, GuildRecord>>,
    roles: Mutex<HashMap<String, Vec<RoleRecord>>>,
    sent: Mutex<Vec<(String, String)>>,
    dms: Mutex<Vec<(String, String)>>,
    role_grants: Mutex<Vec<(String, String, String)>>,
    nicknames: Mutex<Vec<(String, String, String)>>,
    deleted: Mutex<Vec<(String, String)>>,
    reactions: Mutex<Vec<(String, String, String)>>,
    next_message_id: Mutex<u64>,
    failing: AtomicBool,
}

impl MemoryPlatform {
    fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            members: Mutex::new(HashMap::new()),
            channels: Mutex::new(HashMap::new()),
            guilds: Mutex::new(HashMap::new()),
            roles: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            dms: Mutex::new(Vec::new()),
            role_grants: Mutex::new(Vec::new()),
            nicknames: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            reactions: Mutex::new(Vec::new()),
            next_message_id: Mutex::new(1000),
            failing: AtomicBool::new(false),
        }
    }

    /// Every subsequent call errors, exercising fail-soft handling.
    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn put_user(&self, user: UserRecord) {
        self.users.lock().expect("lock").insert(user.id.clone(), user);
    }

    pub fn put_member(&self, guild_id: &str, user_id: &str, member: MemberRecord) {
        self.members
            .lock()
            .expect("lock")
            .insert((guild_id.to_string(), user_id.to_string()), member);
    }

    pub fn put_channel(&self, channel: ChannelRecord) {
        self.channels
            .lock()
            .expect("lock")
            .insert(channel.id.clone(), channel);
    }

    pub fn put_guild(&self, guild: GuildRecord) {
        self.guilds.lock().expect("lock").insert(guild.id.clone(), guild);
    }

    pub fn put_role(&self, guild_id: &str, role: RoleRecord) {
        self.roles
            .lock()
            .expect("lock")
            .entry(guild_id.to_string())
            .or_default()
            .push(role);
    }

    pub fn sent_messages(&self) -> Vec<(String, String)> {
        self.sent.lock().expect("lock").clone()
    }

    pub fn dms(&self) -> Vec<(String, String)> {
        self.dms.lock().expect("lock").clone()
    }

    pub fn role_grants(&self) -> Vec<(String, String, String)> {
        self.role_grants.lock().expect("lock").clone()
    }

    pub fn nickname_edits(&self) -> Vec<(String, String, String)> {
        self.nicknames.lock().expect("lock").clone()
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("platform offline");
        }
        Ok(())
    }

    fn next_id(&self) -> String {
        let mut id = self.next_message_id.lock().expect("lock");
        *id += 1;
        id.to_string()
    }
}

#[async_trait]
impl PlatformAdapter for MemoryPlatform {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>> {
        self.check()?;
        Ok(self.users.lock().expect("lock").get(user_id).cloned())
    }

    async fn get_member(&self, guild_id: &str, user_id: &str) -> Result<Option<MemberRecord>> {
        self.check()?;
        Ok(self
            .members
            .lock()
            .expect("lock")
            .get(&(guild_id.to_string(), user_id.to_string()))
            .cloned())
    }

    async fn get_channel(&self, channel_id: &str) -> Result<Option<ChannelRecord>> {
        self.check()?;
        Ok(self.channels.lock().expect("lock").get(channel_id).cloned())
    }

    async fn get_guild(&self, guild_id: &str) -> Result<Option<GuildRecord>> {
        self.check()?;
        Ok(self.guilds.lock().expect("lock").get(guild_id).cloned())
    }

    async fn get_role(&self, guild_id: &str, id_or_name: &str) -> Result<Option<RoleRecord>> {
        self.check()?;
        let roles = self.roles.lock().expect("lock");
        Ok(roles
            .get(guild_id)
            .and_then(|list| {
                list.iter()
                    .find(|r| r.id == id_or_name || r.name == id_or_name)
            })
            .cloned())
    }

    async fn add_role(&self, guild_id: &str, user_id: &str, role_id: &str) -> Result<()> {
        self.check()?;
        self.role_grants.lock().expect("lock").push((
            guild_id.to_string(),
            user_id.to_string(),
            role_id.to_string(),
        ));
        let mut members = self.members.lock().expect("lock");
        let member = members
            .entry((guild_id.to_string(), user_id.to_string()))
            .or_default();
        if !member.roles.iter().any(|r| r == role_id) {
            member.roles.push(role_id.to_string());
        }
        Ok(())
    }

    async fn remove_role(&self, guild_id: &str, user_id: &str, role_id: &str) -> Result<()> {
        self.check()?;
        let mut members = self.members.lock().expect("lock");
        if let Some(member) = members.get_mut(&(guild_id.to_string(), user_id.to_string())) {
            member.roles.retain(|r| r != role_id);
        }
        Ok(())
    }

    async fn edit_nickname(&self, guild_id: &str, user_id: &str, nickname: &str) -> Result<()> {
        self.check()?;
        self.nicknames.lock().expect("lock").push((
            guild_id.to_string(),
            user_id.to_string(),
            nickname.to_string(),
        ));
        Ok(())
    }

    async fn send_message(&self, channel_id: &str, content: &str) -> Result<String> {
        self.check()?;
        self.sent
            .lock()
            .expect("lock")
            .push((channel_id.to_string(), content.to_string()));
        Ok(self.next_id())
    }

    async fn send_dm(&self, user_id: &str, content: &str) -> Result<String> {
        self.check()?;
        self.dms
            .lock()
            .expect("lock")
            .push((user_id.to_string(), content.to_string()));
        Ok(self.next_id())
    }

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<()> {
        self.check()?;
        self.deleted
            .lock()
            .expect("lock")
            .push((channel_id.to_string(), message_id.to_string()));
        Ok(())
    }

    async fn add_reaction(&self, channel_id: &str, message_id: &str, emoji: &str) -> Result<()> {
        self.check()?;
        self.reactions.lock().expect("lock").push((
            channel_id.to_string(),
            message_id.to_string(),
            emoji.to_string(),
        ));
        Ok(())
    }
}

/// In-memory [`RegistryStore`] with a failure switch.
#[derive(Default)]
pub struct MemoryRegistry {
    entries: Mutex<Vec<RegistryEntry>>,
    failing: AtomicBool,
}

impl MemoryRegistry {
    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn put(&self, key: &str, entry_type: &str, value: serde_json::Value) {
        let mut entries = self.entries.lock().expect("lock");
        entries.retain(|e| !(e.key == key && e.entry_type == entry_type));
        entries.push(RegistryEntry {
            key: key.to_string(),
            value,
            entry_type: entry_type.to_string(),
        });
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("registry offline");
        }
        Ok(())
    }
}

#[async_trait]
impl RegistryStore for MemoryRegistry {
    async fn list_entries(&self, limit: usize) -> Result<Vec<RegistryEntry>> {
        self.check()?;
        let entries = self.entries.lock().expect("lock");
        Ok(entries.iter().take(limit).cloned().collect())
    }

    async fn get(&self, key: &str, entry_type: &str) -> Result<Option<serde_json::Value>> {
        self.check()?;
        let entries = self.entries.lock().expect("lock");
        Ok(entries
            .iter()
            .find(|e| e.key == key && e.entry_type == entry_type)
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, entry_type: &str, value: serde_json::Value) -> Result<()> {
        self.check()?;
        self.put(key, entry_type, value);
        Ok(())
    }

    async fn delete(&self, key: &str, entry_type: &str) -> Result<()> {
        self.check()?;
        self.entries
            .lock()
            .expect("lock")
            .retain(|e| !(e.key == key && e.entry_type == entry_type));
        Ok(())
    }
}

/// In-memory [`PermissionStore`] with a failure switch.
#[derive(Default)]
pub struct MemoryPermissions {
    roles: Mutex<HashMap<(String, String), Vec<RoleRecord>>>,
    permissions: Mutex<HashMap<(String, String), Vec<String>>>,
    failing: AtomicBool,
}

impl MemoryPermissions {
    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn grant(&self, guild_id: &str, user_id: &str, permission: &str) {
        self.permissions
            .lock()
            .expect("lock")
            .entry((guild_id.to_string(), user_id.to_string()))
            .or_default()
            .push(permission.to_string());
    }

    pub fn grant_role(&self, guild_id: &str, user_id: &str, role: RoleRecord) {
        self.roles
            .lock()
            .expect("lock")
            .entry((guild_id.to_string(), user_id.to_string()))
            .or_default()
            .push(role);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("permission store offline");
        }
        Ok(())
    }
}

#[async_trait]
impl PermissionStore for MemoryPermissions {
    async fn user_roles(&self, guild_id: &str, user_id: &str) -> Result<Vec<RoleRecord>> {
        self.check()?;
        Ok(self
            .roles
            .lock()
            .expect("lock")
            .get(&(guild_id.to_string(), user_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn check_permission(
        &self,
        guild_id: &str,
        user_id: &str,
        permission: &str,
    ) -> Result<bool> {
        self.check()?;
        Ok(self
            .permissions
            .lock()
            .expect("lock")
            .get(&(guild_id.to_string(), user_id.to_string()))
            .is_some_and(|perms| perms.iter().any(|p| p == permission)))
    }

    async fn user_permissions(&self, guild_id: &str, user_id: &str) -> Result<Vec<String>> {
        self.check()?;
        Ok(self
            .permissions
            .lock()
            .expect("lock")
            .get(&(guild_id.to_string(), user_id.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

/// In-memory [`JobStore`] honoring the pending -> done/failed lifecycle.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<Vec<ScheduledJob>>,
    failing: AtomicBool,
}

impl MemoryJobStore {
    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn all(&self) -> Vec<ScheduledJob> {
        self.jobs.lock().expect("lock").clone()
    }

    pub fn pending(&self, guild_id: &str) -> Vec<ScheduledJob> {
        self.all()
            .into_iter()
            .filter(|j| j.guild_id == guild_id && j.is_pending())
            .collect()
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("job store offline");
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: &ScheduledJob) -> Result<()> {
        self.check()?;
        self.jobs.lock().expect("lock").push(job.clone());
        Ok(())
    }

    async fn select_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ScheduledJob>> {
        self.check()?;
        let jobs = self.jobs.lock().expect("lock");
        let mut due: Vec<ScheduledJob> = jobs
            .iter()
            .filter(|j| j.is_pending() && j.execute_at <= now)
            .cloned()
            .collect();
        due.sort_by_key(|j| j.execute_at);
        due.truncate(limit);
        Ok(due)
    }

    async fn mark_done(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        self.check()?;
        let mut jobs = self.jobs.lock().expect("lock");
        if let Some(job) = jobs.iter_mut().find(|j| j.id == id && j.is_pending()) {
            job.executed = true;
            job.executed_at = Some(at);
            job.error = None;
        }
        Ok(())
    }

    async fn mark_failed(&self, id: &str, at: DateTime<Utc>, error: &str) -> Result<()> {
        self.check()?;
        let mut jobs = self.jobs.lock().expect("lock");
        if let Some(job) = jobs.iter_mut().find(|j| j.id == id && j.is_pending()) {
            job.executed = true;
            job.executed_at = Some(at);
            job.error = Some(error.to_string());
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.check()?;
        // Hard delete is only effective while pending.
        self.jobs
            .lock()
            .expect("lock")
            .retain(|j| j.id != id || !j.is_pending());
        Ok(())
    }

    async fn pending_for_guild(&self, guild_id: &str) -> Result<Vec<ScheduledJob>> {
        self.check()?;
        Ok(self.pending(guild_id))
    }
}

/// A complete fake backend plus convenience render helpers.
///
/// The seeded world: guild `900` ("testers", owned by `42`), human users
/// `42` (alice) and `99` (eve), bot `300`, channel `77` ("general"), and
/// role `5` ("mods").
pub struct TestWorld {
    pub commands: Arc<MemoryCommandStore>,
    pub platform: Arc<MemoryPlatform>,
    pub registry: Arc<MemoryRegistry>,
    pub permissions: Arc<MemoryPermissions>,
    pub jobs: Arc<MemoryJobStore>,
}

impl TestWorld {
    pub fn new() -> Self {
        init_test_logging();
        let world = Self {
            commands: Arc::new(MemoryCommandStore::default()),
            platform: Arc::new(MemoryPlatform::new()),
            registry: Arc::new(MemoryRegistry::default()),
            permissions: Arc::new(MemoryPermissions::default()),
            jobs: Arc::new(MemoryJobStore::default()),
        };
        world.platform.put_guild(GuildRecord {
            id: "900".into(),
            name: "testers".into(),
            member_count: 3,
            owner_id: "42".into(),
            icon_url: None,
        });
        world.platform.put_user(UserRecord {
            id: "42".into(),
            name: "alice".into(),
            discriminator: Some("0042".into()),
            bot: false,
            avatar_url: None,
        });
        world.platform.put_user(UserRecord {
            id: "99".into(),
            name: "eve".into(),
            discriminator: None,
            bot: false,
            avatar_url: None,
        });
        world.platform.put_user(UserRecord {
            id: "300".into(),
            name: "helper".into(),
            discriminator: None,
            bot: true,
            avatar_url: None,
        });
        world.platform.put_channel(ChannelRecord {
            id: "77".into(),
            name: "general".into(),
            topic: Some("chatter".into()),
            nsfw: false,
        });
        world.platform.put_member(
            "900",
            "42",
            MemberRecord {
                nickname: Some("Al".into()),
                roles: Vec::new(),
                joined_at: None,
            },
        );
        world.platform.put_role(
            "900",
            RoleRecord {
                id: "5".into(),
                name: "mods".into(),
                position: 1,
            },
        );
        world
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            commands: self.commands.clone(),
            platform: self.platform.clone(),
            registry: self.registry.clone(),
            permissions: self.permissions.clone(),
            jobs: self.jobs.clone(),
        }
    }

    pub fn engine(&self) -> Engine {
        Engine::new(self.collaborators())
    }

    pub fn engine_with(&self, config: EngineConfig) -> Engine {
        Engine::with_config(self.collaborators(), config)
    }

    /// The seeded context without a registry snapshot.
    pub fn basic_context(&self) -> ExecutionContext {
        self.context_builder(Vec::new()).build_detached()
    }

    fn context_builder(&self, args: Vec<String>) -> ContextBuilder {
        ContextBuilder::new(GuildRecord {
            id: "900".into(),
            name: "testers".into(),
            member_count: 3,
            owner_id: "42".into(),
            icon_url: None,
        })
        .user(UserRecord {
            id: "42".into(),
            name: "alice".into(),
            discriminator: Some("0042".into()),
            bot: false,
            avatar_url: None,
        })
        .member(MemberRecord {
            nickname: Some("Al".into()),
            roles: Vec::new(),
            joined_at: None,
        })
        .channel(ChannelRecord {
            id: "77".into(),
            name: "general".into(),
            topic: Some("chatter".into()),
            nsfw: false,
        })
        .args(args)
    }

    /// Renders with a fresh engine and a freshly-built context (registry
    /// snapshot included); returns the output, empty on failure.
    pub async fn render(&self, template: &str) -> String {
        self.render_outcome(template).await.output.unwrap_or_default()
    }

    pub async fn render_with_args(&self, template: &str, args: Vec<String>) -> String {
        self.render_outcome_with_args(template, args)
            .await
            .output
            .unwrap_or_default()
    }

    pub async fn render_outcome(&self, template: &str) -> RenderOutcome {
        self.render_outcome_with_args(template, Vec::new()).await
    }

    pub async fn render_outcome_with_args(
        &self,
        template: &str,
        args: Vec<String>,
    ) -> RenderOutcome {
        let engine = self.engine();
        let ctx = engine.build_context(self.context_builder(args)).await;
        engine.render(template, &ctx).await
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}
