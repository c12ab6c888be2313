//! Guild custom-command template interpreter.
//!
//! Templates are plain text with embedded `{{ expression }}` regions. A
//! render extracts those regions in document order, evaluates each against
//! an immutable [`ExecutionContext`] plus a per-render variable store, and
//! splices the stringified results back into the surrounding text.
//!
//! Expressions call into a fixed builtin registry (string and numeric
//! helpers, context accessors, platform mutations, registry key-value
//! access, nested command execution). Builtins are classified by side
//! effect: pure helpers, read-only I/O that fails soft to neutral values,
//! mutating I/O that reports success or failure as in-band status text,
//! depth-guarded recursion, and deferred scheduling. Only a handler
//! failure aborts a render; everything else degrades to text.
//!
//! All external systems sit behind the trait objects in [`stores`], so the
//! engine itself is platform-agnostic and fully testable in memory. The
//! [`scheduler`] replays persisted jobs whose captured context makes a
//! deferred render indistinguishable from a live one.
//!
//! # Quick start
//!
//! ```no_run
//! # async fn demo(deps: ccengine::Collaborators) {
//! use ccengine::{ContextBuilder, Engine, GuildRecord};
//!
//! let engine = Engine::new(deps);
//! let ctx = engine
//!     .build_context(ContextBuilder::new(GuildRecord {
//!         id: "900".into(),
//!         name: "testers".into(),
//!         ..Default::default()
//!     }))
//!     .await;
//! let outcome = engine.render("Hello {{.User.Name}}!", &ctx).await;
//! # let _ = outcome;
//! # }
//! ```

pub mod context;
pub mod engine;
pub mod error;
pub mod functions;
pub mod scheduler;
pub mod stores;
pub mod value;

// Test utilities are part of the public API so downstream crates can drive
// the engine against the in-memory collaborators.
pub mod test_utils;

pub use context::{
    ChannelRecord, ContextBuilder, ExecutionContext, GuildRecord, MemberRecord, MessageRecord,
    RoleRecord, UserRecord,
};
pub use engine::{Engine, EngineConfig, EngineState};
pub use error::{EngineError, RenderOutcome};
pub use functions::SideEffectClass;
pub use scheduler::{ScheduledJob, Scheduler};
pub use stores::{
    Collaborators, CommandStore, JobStore, PermissionStore, PlatformAdapter, RegistryEntry,
    RegistryStore, StoredCommand,
};
pub use value::Value;
