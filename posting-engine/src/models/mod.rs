//! Domain models for the posting engine.

mod document;
mod gst;
mod journal;
mod rule;
mod run;
mod subledger;

pub use document::{DocumentTotals, SourceDocument, TaxableLine};
pub use gst::GstBreakdownRow;
pub use journal::{JournalHeader, JournalLine, JournalStatus, NewJournal, NewJournalLine};
pub use rule::{
    AccountingRule, AmountSource, Category, CreateRule, CreateRuleLine, RuleLine, RuleStatus,
    Trigger,
};
pub use run::{PostingRun, RunStatus};
pub use subledger::{Direction, NewSubledgerEntry, SubledgerEntry};
