//! # Ledger Reconciler
//!
//! A library for reconciling an independently maintained transaction ledger
//! against trial-balance figures, deriving indirect-method cash flow
//! statements from monthly balances, and ingesting reference-index
//! spreadsheet exports with an auditable add/update/error trail.
//!
//! ## Core Concepts
//!
//! - **Ledger entries**: transaction-level amounts, aggregated per account
//!   and month and compared against the authoritative trial balance
//! - **Match rate**: percentage expressing how closely the two sources agree
//!   for an account; discrepancies are severity-tagged through an injected
//!   [`AlertPolicy`]
//! - **Cash flow derivation**: balance changes classified through a
//!   per-tenant [`ClassificationTable`] and bridged from net income to net
//!   cash change, with any decomposition gap surfaced on the statement
//! - **Index reconciliation**: per-record idempotent upserts through a
//!   [`RecordStore`] port, best-effort with per-record failures, one audit
//!   record per run
//!
//! ## Example
//!
//! ```rust,ignore
//! use ledger_reconciler::*;
//!
//! let ledger = vec![LedgerEntry {
//!     account_key: 1600,
//!     account_name: "Acme Ltd".to_string(),
//!     sort_code: 160,
//!     sort_code_name: "Receivables".to_string(),
//!     amount: 500.0,
//!     month: 1,
//!     year: 2024,
//! }];
//!
//! let balances = vec![TrialBalanceRow {
//!     account_key: 1600,
//!     account_name: "Acme Ltd".to_string(),
//!     sort_code: 160,
//!     sort_code_name: "Receivables".to_string(),
//!     monthly_totals: [(1, 500.0)].into_iter().collect(),
//! }];
//!
//! let analysis = analyze(&ledger, &balances, &[1], &AlertPolicy::default())?;
//! assert_eq!(analysis.summary.match_rate, 100.0);
//! ```

pub mod cashflow;
pub mod comparison;
pub mod discrepancy;
pub mod error;
pub mod ingestion;
pub mod mapper;
pub mod reconciler;
pub mod schema;
pub mod store;

pub use cashflow::*;
pub use comparison::{compare, ComparisonOutcome};
pub use discrepancy::{classify, AlertPolicy, ClassifiedDiscrepancies};
pub use error::{ReconciliationError, Result};
pub use ingestion::*;
pub use mapper::*;
pub use reconciler::{IndexReconciler, ReconcileOutcome};
pub use schema::*;
pub use store::{MemoryStore, RecordStore, StoreError, UpsertOutcome};

use log::info;
use serde::{Deserialize, Serialize};

/// Complete dashboard payload for one reconciliation pass: the per-account
/// comparison, its data-quality diagnostics, and the classified
/// discrepancies. Always returned whole so the presentation layer can render
/// partial results next to their warnings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationAnalysis {
    pub records: Vec<ComparisonRecord>,
    pub issues: Vec<DataQualityIssue>,
    pub summary: DiscrepancySummary,
    pub alerts: Vec<Alert>,
    pub by_code: Vec<DiscrepancyByCode>,
    pub by_month: Vec<MonthlyDiscrepancy>,
}

impl ReconciliationAnalysis {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs the comparison engine and the discrepancy classifier in sequence —
/// the composition the reporting dashboard consumes.
pub fn analyze(
    ledger: &[LedgerEntry],
    balances: &[TrialBalanceRow],
    active_months: &[u32],
    policy: &AlertPolicy,
) -> Result<ReconciliationAnalysis> {
    info!(
        "analyzing {} ledger entries against {} trial balance rows over {} months",
        ledger.len(),
        balances.len(),
        active_months.len()
    );

    let outcome = comparison::compare(ledger, balances, active_months)?;
    let classified = discrepancy::classify(&outcome.records, policy);

    Ok(ReconciliationAnalysis {
        records: outcome.records,
        issues: outcome.issues,
        summary: classified.summary,
        alerts: classified.alerts,
        by_code: classified.by_code,
        by_month: classified.by_month,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn entry(account_key: i64, amount: f64, month: u32) -> LedgerEntry {
        LedgerEntry {
            account_key,
            account_name: format!("Account {}", account_key),
            sort_code: 600,
            sort_code_name: "Income".to_string(),
            amount,
            month,
            year: 2024,
        }
    }

    #[test]
    fn test_end_to_end_analysis() {
        let ledger = vec![entry(1600, 500.0, 1), entry(2000, 25_000.0, 1)];
        let balances = vec![TrialBalanceRow {
            account_key: 1600,
            account_name: "Account 1600".to_string(),
            sort_code: 600,
            sort_code_name: "Income".to_string(),
            monthly_totals: BTreeMap::from([(1, 500.0)]),
        }];

        let analysis = analyze(&ledger, &balances, &[1], &AlertPolicy::default()).unwrap();

        assert_eq!(analysis.summary.total_accounts, 2);
        assert_eq!(analysis.summary.matched_accounts, 1);
        assert_eq!(analysis.summary.critical_count, 1);
        assert!(analysis
            .alerts
            .iter()
            .any(|a| a.severity == Severity::Critical && a.account_key == Some(2000)));
        assert!(analysis.issues.is_empty());
    }

    #[test]
    fn test_analysis_serializes_for_export() {
        let analysis = analyze(&[], &[], &[], &AlertPolicy::default()).unwrap();
        let json = analysis.to_json().unwrap();
        assert!(json.contains("\"summary\""));
        assert!(json.contains("\"match_rate\": 100.0"));
    }
}
