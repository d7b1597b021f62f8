//! # lumen-apply
//!
//! Preset compilation, matching and the apply pipeline.
//!
//! - [`keys`]: key classes, the neutral table and encoder profiles
//! - [`compiler`]: preset → per-key directives
//! - [`matcher`]: observed config × preset → field diagnostics
//! - [`pipeline`]: backup → detect → flush → apply → write
//! - [`diff`]: unified diff of a pending apply
//! - [`reconcile`]: active-preset resync and [`snapshot`] export

pub mod compiler;
pub mod diff;
pub mod error;
pub mod keys;
pub mod matcher;
pub mod pipeline;
pub mod reconcile;
pub mod snapshot;

pub use compiler::{compile, generate_neutral_config, CompiledConfig};
pub use diff::{diff, ConfigDiff};
pub use error::{ApplyError, Phase};
pub use matcher::{find_all_matching, match_preset, FieldMismatch, MatchReport};
pub use pipeline::{apply, ApplyOptions, ApplyReport, WriteResult};
pub use reconcile::{choose_active, resync, ResyncOutcome};
