//! Engine logic: pure calculators and the posting orchestrator.

pub mod builder;
pub mod matcher;
pub mod orchestrator;
pub mod resolver;
pub mod tax;

pub use builder::{build_journal_lines, BuiltJournal, LineSkip};
pub use matcher::match_rules;
pub use orchestrator::{
    FailReason, FailurePolicy, PostingEngine, PostingReport, RuleOutcome, SkipReason,
};
pub use resolver::resolve_amount;
pub use tax::compute_breakdown;
