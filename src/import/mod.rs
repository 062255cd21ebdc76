// Import module
// Directory walking, per-file record construction and submission

pub mod session;
pub mod walk;

pub use session::{FileFailure, FileOutcome, ImportEvent, ImportSession, RunSummary};
pub use walk::{check_eligibility, Eligibility, EntryKind, SkipReason, Walker};
