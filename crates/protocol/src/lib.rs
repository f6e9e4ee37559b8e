//! Shared data model for the bashai translation, execution and self-heal engine.
//!
//! Every value here is an immutable snapshot produced by one component and
//! consumed by another; only the controller appends to a [`Transcript`].

pub mod candidate;
pub mod execution;
pub mod os;
pub mod transcript;
pub mod verdict;

pub use candidate::{CandidateKind, CommandCandidate};
pub use execution::{ExecutionResult, SIGNAL_EXIT_CODE, SPAWN_FAILURE_EXIT_CODE, TIMEOUT_EXIT_CODE};
pub use os::{OsFamily, OsProfile, ShellDialect};
pub use transcript::{Attempt, Request, Transcript};
pub use verdict::SafetyVerdict;
