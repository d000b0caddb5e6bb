use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Absolute tolerance under which two monetary amounts are considered equal.
/// Every discrepancy test and the cash-flow cross-check go through this
/// constant; it is never repeated as a literal at call sites.
pub const AMOUNT_EPSILON: f64 = 0.01;

/// A single transaction-level entry from the independently maintained ledger.
/// Amounts are signed: income negative, expense positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub account_key: i64,
    pub account_name: String,
    pub sort_code: i64,
    pub sort_code_name: String,
    pub amount: f64,
    pub month: u32,
    pub year: i32,
}

/// Authoritative per-account monthly figures for one fiscal year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBalanceRow {
    pub account_key: i64,
    pub account_name: String,
    pub sort_code: i64,
    pub sort_code_name: String,
    pub monthly_totals: BTreeMap<u32, f64>,
}

/// Opening/closing balance of one account for one month. Produced once per
/// ingestion batch; later imports for the same period supersede rather than
/// mutate earlier rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyBalance {
    pub account_key: i64,
    pub account_name: String,
    pub account_type: String,
    pub month: u32,
    pub year: i32,
    pub opening_balance: f64,
    pub closing_balance: f64,
    pub change: f64,
}

/// Per-account comparison of ledger totals against trial-balance totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRecord {
    pub account_key: i64,
    pub account_name: String,
    pub sort_code: i64,
    pub sort_code_name: String,
    pub ledger_total: f64,
    pub balance_total: f64,
    pub difference: f64,
    pub match_rate: f64,
    pub per_month: Vec<MonthComparison>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthComparison {
    pub month: u32,
    pub ledger: f64,
    pub balance: f64,
    pub diff: f64,
}

impl ComparisonRecord {
    pub fn is_discrepant(&self) -> bool {
        self.difference.abs() > AMOUNT_EPSILON
    }
}

/// An amount that had to be excluded from aggregation. Exclusions are
/// surfaced, never silently coerced to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQualityIssue {
    pub account_key: i64,
    pub month: Option<u32>,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscrepancySummary {
    pub total_accounts: usize,
    pub matched_accounts: usize,
    pub discrepancy_accounts: usize,
    pub match_rate: f64,
    pub total_discrepancy_amount: f64,
    pub critical_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    /// Sort rank, critical first.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::Warning => 1,
            Severity::Info => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    Discrepancy,
    Trend,
}

/// Severity-tagged finding for the presentation layer. Messages carry raw
/// numeric values; currency and locale formatting happen downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub severity: Severity,
    pub category: AlertCategory,
    pub title: String,
    pub message: String,
    pub value: f64,
    pub threshold: Option<f64>,
    pub account_key: Option<i64>,
    pub month: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscrepancyByCode {
    pub code: i64,
    pub name: String,
    pub discrepancy_amount: f64,
    pub discrepancy_count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyDiscrepancy {
    pub month: u32,
    pub total_discrepancy: f64,
    pub accounts_with_discrepancy: usize,
    pub match_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    Income,
    Cogs,
    Operating,
    Financial,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Customer,
    Supplier,
    Bank,
    Cash,
    Expense,
    Income,
    Asset,
    Liability,
    Equity,
    Other,
}

/// A classification code grouping accounts into report sections.
/// Unique per (tenant_id, code).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortCode {
    pub tenant_id: String,
    pub code: i64,
    pub name: String,
    pub parent_code: Option<i64>,
    pub report_type: Option<ReportType>,
    pub sort_order: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SortCodeInput {
    #[schemars(description = "Sort code number, the natural key within a tenant")]
    pub code: i64,

    #[schemars(description = "Display name of the sort code")]
    pub name: String,

    #[schemars(description = "Parent sort code for hierarchical report structures")]
    pub parent_code: Option<i64>,

    #[schemars(description = "Report section this code rolls into")]
    pub report_type: Option<ReportType>,

    #[schemars(description = "Position within the report section; defaults to the code itself")]
    pub sort_order: Option<i64>,
}

impl SortCodeInput {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(SortCodeInput)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

/// One card in the tenant's account index. Unique per (tenant_id, account_key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountIndexRecord {
    pub tenant_id: String,
    pub account_key: i64,
    pub account_name: String,
    pub sort_code: Option<i64>,
    pub account_type: Option<AccountType>,
    pub id_number: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub current_balance: f64,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AccountIndexInput {
    #[schemars(description = "Account key, the natural key within a tenant")]
    pub account_key: i64,

    #[schemars(description = "Display name of the account")]
    pub account_name: String,

    pub sort_code: Option<i64>,
    pub account_type: Option<AccountType>,
    pub id_number: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,

    #[schemars(description = "Balance carried on the export; missing means unchanged")]
    pub current_balance: Option<f64>,
}

impl AccountIndexInput {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AccountIndexInput)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    SortCodes,
    Accounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncSource {
    SpreadsheetExport,
    Manual,
    Api,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    Partial,
    Failed,
}

/// Append-only audit row summarizing one reference-index ingestion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSyncRecord {
    pub tenant_id: String,
    pub index_type: IndexKind,
    pub source: SyncSource,
    pub total: usize,
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub status: SyncStatus,
    pub error_message: Option<String>,
    pub actor: Option<String>,
    pub timestamp: DateTime<Utc>,
}
