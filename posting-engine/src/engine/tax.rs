//! GST breakdown calculation.

use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::models::{GstBreakdownRow, TaxableLine};

/// Compute the GST breakdown for a document's line items.
///
/// Lines are grouped by tax rate; each group becomes one row carrying the
/// summed taxable value and tax. When origin and destination state codes
/// are equal the tax splits into equal CGST and SGST halves at half the
/// rate each; otherwise the full tax is charged as IGST. A missing state
/// code on either side is treated as not-equal, so the charge defaults to
/// IGST. Zero-rate lines produce no row.
///
/// No rounding is applied here; callers own currency precision.
pub fn compute_breakdown(
    lines: &[TaxableLine],
    origin_state: Option<&str>,
    destination_state: Option<&str>,
) -> Vec<GstBreakdownRow> {
    let mut groups: BTreeMap<Decimal, (Decimal, Decimal)> = BTreeMap::new();

    for line in lines {
        if line.tax_rate.is_zero() {
            continue;
        }
        let tax = line.taxable_value * line.tax_rate / Decimal::ONE_HUNDRED;
        let group = groups.entry(line.tax_rate).or_default();
        group.0 += line.taxable_value;
        group.1 += tax;
    }

    let intra_state = match (origin_state, destination_state) {
        (Some(origin), Some(destination)) => origin == destination,
        _ => false,
    };

    let two = Decimal::TWO;
    groups
        .into_iter()
        .map(|(rate, (taxable_value, tax))| {
            if intra_state {
                GstBreakdownRow {
                    tax_rate: rate,
                    taxable_value,
                    cgst_rate: rate / two,
                    cgst_amount: tax / two,
                    sgst_rate: rate / two,
                    sgst_amount: tax / two,
                    igst_rate: Decimal::ZERO,
                    igst_amount: Decimal::ZERO,
                }
            } else {
                GstBreakdownRow {
                    tax_rate: rate,
                    taxable_value,
                    cgst_rate: Decimal::ZERO,
                    cgst_amount: Decimal::ZERO,
                    sgst_rate: Decimal::ZERO,
                    sgst_amount: Decimal::ZERO,
                    igst_rate: rate,
                    igst_amount: tax,
                }
            }
        })
        .collect()
}
