use crate::schema::{
    Alert, AlertCategory, ComparisonRecord, DiscrepancyByCode, DiscrepancySummary,
    MonthlyDiscrepancy, Severity, AMOUNT_EPSILON,
};
use chrono::Utc;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Thresholds for severity tagging. Injected rather than baked in so a
/// tenant can tighten them; the defaults are the platform's historical
/// values. `warning_alert_cap` limits how many medium alerts are emitted per
/// run (a pagination concern) and does not affect the summary counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPolicy {
    pub critical_threshold: f64,
    pub warning_threshold: f64,
    pub low_match_rate_threshold: f64,
    pub warning_alert_cap: Option<usize>,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            critical_threshold: 10_000.0,
            warning_threshold: 1_000.0,
            low_match_rate_threshold: 80.0,
            warning_alert_cap: Some(5),
        }
    }
}

impl AlertPolicy {
    /// Severity of a discrepant difference. Thresholds are strict on the
    /// upper side: a difference of exactly `critical_threshold` is a warning.
    pub fn severity_for(&self, difference: f64) -> Severity {
        let magnitude = difference.abs();
        if magnitude > self.critical_threshold {
            Severity::Critical
        } else if magnitude > self.warning_threshold {
            Severity::Warning
        } else {
            Severity::Info
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedDiscrepancies {
    pub summary: DiscrepancySummary,
    pub alerts: Vec<Alert>,
    pub by_code: Vec<DiscrepancyByCode>,
    pub by_month: Vec<MonthlyDiscrepancy>,
}

/// Turns comparison records into a severity-tagged dashboard payload:
/// summary counts, sorted alerts, and rollups by sort code and by month.
pub fn classify(records: &[ComparisonRecord], policy: &AlertPolicy) -> ClassifiedDiscrepancies {
    let discrepant: Vec<&ComparisonRecord> =
        records.iter().filter(|r| r.is_discrepant()).collect();

    let summary = build_summary(records, &discrepant, policy);
    let by_code = build_by_code(&discrepant);
    let by_month = build_by_month(records);
    let alerts = build_alerts(&discrepant, &by_month, policy);

    debug!(
        "classified {} records: {} discrepant, {} alerts",
        records.len(),
        discrepant.len(),
        alerts.len()
    );

    ClassifiedDiscrepancies {
        summary,
        alerts,
        by_code,
        by_month,
    }
}

fn build_summary(
    records: &[ComparisonRecord],
    discrepant: &[&ComparisonRecord],
    policy: &AlertPolicy,
) -> DiscrepancySummary {
    let total = records.len();
    let matched = total - discrepant.len();

    let mut critical_count = 0;
    let mut warning_count = 0;
    let mut info_count = 0;
    for record in discrepant {
        match policy.severity_for(record.difference) {
            Severity::Critical => critical_count += 1,
            Severity::Warning => warning_count += 1,
            Severity::Info => info_count += 1,
        }
    }

    DiscrepancySummary {
        total_accounts: total,
        matched_accounts: matched,
        discrepancy_accounts: discrepant.len(),
        match_rate: if total > 0 {
            matched as f64 / total as f64 * 100.0
        } else {
            100.0
        },
        total_discrepancy_amount: discrepant.iter().map(|r| r.difference.abs()).sum(),
        critical_count,
        warning_count,
        info_count,
    }
}

fn build_by_code(discrepant: &[&ComparisonRecord]) -> Vec<DiscrepancyByCode> {
    let mut by_code: BTreeMap<i64, (String, f64, usize)> = BTreeMap::new();
    for record in discrepant {
        let slot = by_code
            .entry(record.sort_code)
            .or_insert_with(|| (record.sort_code_name.clone(), 0.0, 0));
        slot.1 += record.difference.abs();
        slot.2 += 1;
    }

    let grand_total: f64 = by_code.values().map(|(_, amount, _)| amount).sum();

    let mut rollup: Vec<DiscrepancyByCode> = by_code
        .into_iter()
        .map(|(code, (name, amount, count))| DiscrepancyByCode {
            code,
            name,
            discrepancy_amount: amount,
            discrepancy_count: count,
            percentage: if grand_total > 0.0 {
                amount / grand_total * 100.0
            } else {
                0.0
            },
        })
        .collect();

    rollup.sort_by(|a, b| b.discrepancy_amount.total_cmp(&a.discrepancy_amount));
    rollup
}

fn build_by_month(records: &[ComparisonRecord]) -> Vec<MonthlyDiscrepancy> {
    let months: BTreeSet<u32> = records
        .iter()
        .flat_map(|r| r.per_month.iter().map(|m| m.month))
        .collect();

    months
        .into_iter()
        .map(|month| {
            let mut total_discrepancy = 0.0;
            let mut accounts_with_discrepancy = 0;
            for record in records {
                if let Some(mc) = record.per_month.iter().find(|m| m.month == month) {
                    total_discrepancy += mc.diff.abs();
                    if mc.diff.abs() > AMOUNT_EPSILON {
                        accounts_with_discrepancy += 1;
                    }
                }
            }

            let total = records.len();
            MonthlyDiscrepancy {
                month,
                total_discrepancy,
                accounts_with_discrepancy,
                match_rate: if total > 0 {
                    (total - accounts_with_discrepancy) as f64 / total as f64 * 100.0
                } else {
                    100.0
                },
            }
        })
        .collect()
}

fn build_alerts(
    discrepant: &[&ComparisonRecord],
    by_month: &[MonthlyDiscrepancy],
    policy: &AlertPolicy,
) -> Vec<Alert> {
    let now = Utc::now();
    let mut alerts = Vec::new();

    for record in discrepant
        .iter()
        .filter(|r| policy.severity_for(r.difference) == Severity::Critical)
    {
        alerts.push(Alert {
            id: format!("disc-critical-{}", record.account_key),
            severity: Severity::Critical,
            category: AlertCategory::Discrepancy,
            title: "Significant discrepancy".to_string(),
            message: format!(
                "account {} ({}) differs from the trial balance by {:.2}",
                record.account_key,
                record.account_name,
                record.difference.abs()
            ),
            value: record.difference,
            threshold: Some(policy.critical_threshold),
            account_key: Some(record.account_key),
            month: None,
            timestamp: now,
        });
    }

    let warnings = discrepant
        .iter()
        .filter(|r| policy.severity_for(r.difference) == Severity::Warning);
    let capped: Vec<_> = match policy.warning_alert_cap {
        Some(cap) => warnings.take(cap).collect(),
        None => warnings.collect(),
    };
    for record in capped {
        alerts.push(Alert {
            id: format!("disc-warning-{}", record.account_key),
            severity: Severity::Warning,
            category: AlertCategory::Discrepancy,
            title: "Moderate discrepancy".to_string(),
            message: format!(
                "account {} ({}) differs from the trial balance by {:.2}",
                record.account_key,
                record.account_name,
                record.difference.abs()
            ),
            value: record.difference,
            threshold: Some(policy.warning_threshold),
            account_key: Some(record.account_key),
            month: None,
            timestamp: now,
        });
    }

    for month in by_month
        .iter()
        .filter(|m| m.match_rate < policy.low_match_rate_threshold)
    {
        alerts.push(Alert {
            id: format!("match-{}", month.month),
            severity: Severity::Warning,
            category: AlertCategory::Trend,
            title: "Low monthly match rate".to_string(),
            message: format!(
                "month {} matched only {:.1}% of accounts",
                month.month, month.match_rate
            ),
            value: month.match_rate,
            threshold: Some(policy.low_match_rate_threshold),
            account_key: None,
            month: Some(month.month),
            timestamp: now,
        });
    }

    alerts.sort_by_key(|a| a.severity.rank());
    alerts
}
