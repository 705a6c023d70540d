//! Accounting rule configuration models.
//!
//! Rules are configured by an administrator outside this engine; the engine
//! only reads the active set for a tenant and fires every rule that matches
//! a document lifecycle event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Business document category a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Invoice,
    Payment,
}

impl Category {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Invoice => "invoice",
            Category::Payment => "payment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "invoice" => Some(Category::Invoice),
            "payment" => Some(Category::Payment),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle event that causes rule evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    InvoiceApproved,
    PaymentCreated,
    PaymentApproved,
}

impl Trigger {
    /// Get string representation for database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::InvoiceApproved => "invoice_approved",
            Trigger::PaymentCreated => "payment_created",
            Trigger::PaymentApproved => "payment_approved",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "invoice_approved" => Some(Trigger::InvoiceApproved),
            "payment_created" => Some(Trigger::PaymentCreated),
            "payment_approved" => Some(Trigger::PaymentApproved),
            _ => None,
        }
    }

    /// The document category this trigger belongs to.
    pub fn category(&self) -> Category {
        match self {
            Trigger::InvoiceApproved => Category::Invoice,
            Trigger::PaymentCreated | Trigger::PaymentApproved => Category::Payment,
        }
    }

    /// Map a document's new lifecycle status to the trigger it fires, if any.
    /// Most status changes (draft, awaiting_approval, rejected, ...) fire nothing.
    pub fn for_status(category: Category, status: &str) -> Option<Self> {
        match (category, status) {
            (Category::Invoice, "approved") => Some(Trigger::InvoiceApproved),
            (Category::Payment, "created") => Some(Trigger::PaymentCreated),
            (Category::Payment, "approved") => Some(Trigger::PaymentApproved),
            _ => None,
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rule activation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    Active,
    Inactive,
}

impl RuleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleStatus::Active => "active",
            RuleStatus::Inactive => "inactive",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "active" => RuleStatus::Active,
            _ => RuleStatus::Inactive,
        }
    }
}

/// Named quantity a rule line draws its posting amount from.
///
/// Closed set: every variant resolves against the document totals or the
/// GST breakdown. Stored as text in the rule configuration; labels that do
/// not parse are a per-line resolution error, never a silent zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountSource {
    ItemValue,
    TaxValue,
    DocumentValue,
    CgstValue,
    SgstValue,
    IgstValue,
}

impl AmountSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AmountSource::ItemValue => "item_value",
            AmountSource::TaxValue => "tax_value",
            AmountSource::DocumentValue => "document_value",
            AmountSource::CgstValue => "cgst_value",
            AmountSource::SgstValue => "sgst_value",
            AmountSource::IgstValue => "igst_value",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "item_value" => Some(AmountSource::ItemValue),
            "tax_value" => Some(AmountSource::TaxValue),
            "document_value" => Some(AmountSource::DocumentValue),
            "cgst_value" => Some(AmountSource::CgstValue),
            "sgst_value" => Some(AmountSource::SgstValue),
            "igst_value" => Some(AmountSource::IgstValue),
            _ => None,
        }
    }
}

/// Configured accounting rule with its ordered lines.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AccountingRule {
    pub rule_id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub category: String,
    pub reference_label: String,
    /// Optional subtype filter (invoice type or payment mode); unset matches all.
    pub transaction_type: Option<String>,
    pub trigger_action: String,
    /// Unset applies to every division.
    pub division_id: Option<Uuid>,
    pub status: String,
    pub created_utc: DateTime<Utc>,
    #[sqlx(skip)]
    pub lines: Vec<RuleLine>,
}

impl AccountingRule {
    /// Get parsed category.
    pub fn parsed_category(&self) -> Option<Category> {
        Category::from_str(&self.category)
    }

    /// Get parsed trigger.
    pub fn parsed_trigger(&self) -> Option<Trigger> {
        Trigger::from_str(&self.trigger_action)
    }

    pub fn is_active(&self) -> bool {
        RuleStatus::from_string(&self.status) == RuleStatus::Active
    }
}

/// Single debit/credit pairing within a rule.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RuleLine {
    pub rule_line_id: Uuid,
    pub rule_id: Uuid,
    /// 1-based position; defines the journal line pairing order.
    pub line_no: i32,
    pub debit_account: Option<String>,
    pub credit_account: Option<String>,
    pub amount_source: String,
    /// When set, the posted journal also produces a per-party subledger entry.
    pub track_subledger: bool,
}

impl RuleLine {
    /// Get parsed amount source; `None` for labels outside the closed set.
    pub fn parsed_amount_source(&self) -> Option<AmountSource> {
        AmountSource::from_str(&self.amount_source)
    }
}

/// Input for creating a rule.
#[derive(Debug, Clone)]
pub struct CreateRule {
    pub tenant_id: Uuid,
    pub name: String,
    pub category: Category,
    pub reference_label: String,
    pub transaction_type: Option<String>,
    pub trigger: Trigger,
    pub division_id: Option<Uuid>,
    pub lines: Vec<CreateRuleLine>,
}

/// Input for a rule line.
#[derive(Debug, Clone)]
pub struct CreateRuleLine {
    pub debit_account: Option<String>,
    pub credit_account: Option<String>,
    pub amount_source: AmountSource,
    pub track_subledger: bool,
}
