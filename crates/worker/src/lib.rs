//! Job orchestration for relaydeck.
//!
//! Jobs are discovered from a directory of JSON job scripts, started and
//! stopped by name through the [`JobRegistry`], and driven from the wire by
//! the [`TaskDispatcher`]. The [`inventory`] poller streams the host's
//! inventory alongside them.

pub mod definition;
pub mod dispatcher;
pub mod error;
pub mod inventory;
pub mod registry;
pub mod script;

pub use definition::{DefinitionCache, DirectorySource, JobDefinition, JobSource};
pub use dispatcher::{ExitHandler, ProcessExit, TaskDispatcher};
pub use error::JobError;
pub use registry::{JobRegistry, StartOutcome, StopOutcome};
pub use script::{JobBody, JobContext, JobScript, Step};
