use crate::error::{ReconciliationError, Result};
use crate::schema::{
    ComparisonRecord, DataQualityIssue, LedgerEntry, MonthComparison, TrialBalanceRow,
};
use log::{debug, warn};
use std::collections::BTreeMap;

/// Result of joining a ledger against a trial balance. Data-quality
/// exclusions ride along as diagnostics so the caller can render partial
/// results next to their warnings.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonOutcome {
    pub records: Vec<ComparisonRecord>,
    pub issues: Vec<DataQualityIssue>,
}

struct LedgerAggregate {
    account_name: String,
    sort_code: i64,
    sort_code_name: String,
    monthly: BTreeMap<u32, f64>,
    total: f64,
}

/// Joins ledger entries with trial-balance rows per account and month.
///
/// Every account key present in either input appears exactly once in the
/// output, sorted by key; a key missing from one side contributes a zero
/// total for that side. Ledger amounts are summed wholesale while
/// trial-balance totals honor `active_months` only. Entries with a
/// non-finite amount or an out-of-range month are excluded from aggregation
/// and reported as [`DataQualityIssue`]s.
pub fn compare(
    ledger: &[LedgerEntry],
    balances: &[TrialBalanceRow],
    active_months: &[u32],
) -> Result<ComparisonOutcome> {
    for &month in active_months {
        if !(1..=12).contains(&month) {
            return Err(ReconciliationError::InvalidMonth(month));
        }
    }

    let mut issues = Vec::new();
    let mut by_account: BTreeMap<i64, LedgerAggregate> = BTreeMap::new();

    for entry in ledger {
        if !entry.amount.is_finite() {
            issues.push(DataQualityIssue {
                account_key: entry.account_key,
                month: Some(entry.month),
                detail: format!(
                    "non-finite ledger amount for account {} in month {}",
                    entry.account_key, entry.month
                ),
            });
            continue;
        }
        if !(1..=12).contains(&entry.month) {
            issues.push(DataQualityIssue {
                account_key: entry.account_key,
                month: Some(entry.month),
                detail: format!(
                    "ledger entry for account {} has month {} outside 1..=12",
                    entry.account_key, entry.month
                ),
            });
            continue;
        }

        let aggregate = by_account
            .entry(entry.account_key)
            .or_insert_with(|| LedgerAggregate {
                account_name: entry.account_name.clone(),
                sort_code: entry.sort_code,
                sort_code_name: entry.sort_code_name.clone(),
                monthly: BTreeMap::new(),
                total: 0.0,
            });
        *aggregate.monthly.entry(entry.month).or_insert(0.0) += entry.amount;
        aggregate.total += entry.amount;
    }

    // One row per account per fiscal year; a duplicate key keeps the first
    // row, matching the lookup the dashboard performed.
    let mut balance_rows: BTreeMap<i64, &TrialBalanceRow> = BTreeMap::new();
    for row in balances {
        balance_rows.entry(row.account_key).or_insert(row);
    }

    let mut keys: Vec<i64> = by_account.keys().copied().collect();
    keys.extend(balance_rows.keys().copied());
    keys.sort_unstable();
    keys.dedup();

    let mut records = Vec::with_capacity(keys.len());
    for key in keys {
        let aggregate = by_account.get(&key);
        let balance_row = balance_rows.get(&key);

        let ledger_total = aggregate.map(|a| a.total).unwrap_or(0.0);

        let mut balance_total = 0.0;
        if let Some(row) = balance_row {
            for &month in active_months {
                match row.monthly_totals.get(&month) {
                    Some(value) if value.is_finite() => balance_total += value,
                    Some(_) => issues.push(DataQualityIssue {
                        account_key: key,
                        month: Some(month),
                        detail: format!(
                            "non-finite trial balance figure for account {} in month {}",
                            key, month
                        ),
                    }),
                    None => {}
                }
            }
        }

        let per_month = active_months
            .iter()
            .map(|&month| {
                let ledger_amount = aggregate
                    .and_then(|a| a.monthly.get(&month))
                    .copied()
                    .unwrap_or(0.0);
                let balance_amount = balance_row
                    .and_then(|r| r.monthly_totals.get(&month))
                    .copied()
                    .filter(|v| v.is_finite())
                    .unwrap_or(0.0);
                MonthComparison {
                    month,
                    ledger: ledger_amount,
                    balance: balance_amount,
                    diff: ledger_amount - balance_amount,
                }
            })
            .collect();

        let difference = ledger_total - balance_total;
        let match_rate = if balance_total != 0.0 {
            (100.0 - (difference.abs() / balance_total.abs()) * 100.0).max(0.0)
        } else if ledger_total == 0.0 {
            100.0
        } else {
            0.0
        };

        records.push(ComparisonRecord {
            account_key: key,
            account_name: aggregate
                .map(|a| a.account_name.clone())
                .or_else(|| balance_row.map(|r| r.account_name.clone()))
                .unwrap_or_default(),
            sort_code: aggregate
                .map(|a| a.sort_code)
                .or_else(|| balance_row.map(|r| r.sort_code))
                .unwrap_or(0),
            sort_code_name: aggregate
                .map(|a| a.sort_code_name.clone())
                .or_else(|| balance_row.map(|r| r.sort_code_name.clone()))
                .unwrap_or_default(),
            ledger_total,
            balance_total,
            difference,
            match_rate,
            per_month,
        });
    }

    if !issues.is_empty() {
        warn!(
            "excluded {} amounts from comparison for data-quality reasons",
            issues.len()
        );
    }
    debug!(
        "compared {} ledger entries against {} trial balance rows into {} records",
        ledger.len(),
        balances.len(),
        records.len()
    );

    Ok(ComparisonOutcome { records, issues })
}
