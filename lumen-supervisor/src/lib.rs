//! Daemon lifecycle: supervised start/stop/restart, status watchdog,
//! crash recovery and the `lumen watch` runtime.

mod error;
pub mod flags;
pub mod lifecycle;
pub mod process;
pub mod recovery;
mod runtime;
pub mod status;
pub mod supervisor;
pub mod watchdog;

pub use error::SupervisorError;
pub use flags::UserStopFlag;
pub use lifecycle::{apply_and_restart, ApplyRestartOptions, ApplyRestartReport};
pub use process::{ProcessControl, SystemProcess};
pub use recovery::{recover, CommandDisplayControl, DisplayControl, RecoveryReport, StepOutcome};
pub use runtime::{init_tracing, recover_blocking, run, start_blocking};
pub use status::{HttpProbe, StatusSampler};
pub use supervisor::Supervisor;
pub use watchdog::{classify, TimerFired, TimerKind, Transition, Watchdog, WatchdogAction};
