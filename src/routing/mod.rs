//! Rule dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, path, method)
//!     → dispatcher.rs (ordered rule scan)
//!     → matcher.rs (evaluate match conditions)
//!     → rules.rs (static / redirect / respond / web handler)
//!     → Response written through the status-capturing writer
//!
//! Rule Compilation (at startup):
//!     RuleConfig[]
//!     → Compile matchers
//!     → Freeze as immutable RuleDispatcher
//! ```
//!
//! # Design Decisions
//! - Rules compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same rule
//! - First match wins (declaration order)

pub mod dispatcher;
pub mod error;
pub mod fs;
pub mod matcher;
pub mod rules;

pub use dispatcher::{Rule, RuleDispatcher, ServeContext};
pub use error::{DispatchFailure, RuleError};
pub use fs::StaticDir;
pub use rules::{build_rules, HandlerRule, RedirectRule, RespondRule, StaticRule};
