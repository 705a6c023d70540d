//! Accounting rule matching.

use uuid::Uuid;

use crate::models::{AccountingRule, Category, Trigger};

/// Filter a tenant's rules to those applying to a lifecycle event.
///
/// A rule matches when it is active, its category and trigger equal the
/// event's, its subtype filter is unset or equals the document subtype,
/// and its division scope is unset or equals the document division.
/// Every match fires independently; there is no priority ordering. An
/// empty result is normal; most transaction types have no rule.
pub fn match_rules<'a>(
    rules: &'a [AccountingRule],
    category: Category,
    trigger: Trigger,
    transaction_type: Option<&str>,
    division_id: Option<Uuid>,
) -> Vec<&'a AccountingRule> {
    rules
        .iter()
        .filter(|rule| {
            rule.is_active()
                && rule.parsed_category() == Some(category)
                && rule.parsed_trigger() == Some(trigger)
                && rule
                    .transaction_type
                    .as_deref()
                    .map_or(true, |subtype| Some(subtype) == transaction_type)
                && rule
                    .division_id
                    .map_or(true, |division| Some(division) == division_id)
        })
        .collect()
}
