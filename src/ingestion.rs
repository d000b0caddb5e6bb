use crate::mapper::ColumnMapping;
use crate::schema::{AccountIndexInput, AccountType, ReportType, SortCodeInput};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One parsed row from the CSV collaborator, keyed by source column name.
pub type ParsedRow = BTreeMap<String, String>;

/// A row that could not be turned into a typed input. Collected, not
/// thrown, so a bad line never aborts an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowIssue {
    pub row: usize,
    pub detail: String,
}

/// Parses a monetary amount from export text: thousands separators and
/// currency noise are stripped, parenthesized values are negative.
/// Returns `None` for anything unparseable or non-finite rather than
/// coercing to zero.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned = raw.replace(',', "").replace('"', "").replace('₪', "");
    let cleaned = cleaned.trim();
    let (cleaned, negate) = match cleaned
        .strip_prefix('(')
        .and_then(|v| v.strip_suffix(')'))
    {
        Some(inner) => (inner.trim(), true),
        None => (cleaned, false),
    };

    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negate { -value } else { value })
}

pub fn parse_key(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

/// Canonical report-section classifier: the leading digit of the sort code
/// decides the section. Replaces the ad-hoc numeric range checks scattered
/// through the upload paths.
pub fn report_type_for_code(code: i64) -> Option<ReportType> {
    match code.to_string().chars().next() {
        Some('6') => Some(ReportType::Income),
        Some('7') => Some(ReportType::Cogs),
        Some('8') => Some(ReportType::Operating),
        Some('9') => Some(ReportType::Financial),
        _ => None,
    }
}

/// Canonical account-type classifier from the sort code's leading digit.
pub fn account_type_for_sort_code(code: i64) -> AccountType {
    match code.to_string().chars().next() {
        Some('1') => AccountType::Customer,
        Some('2') => AccountType::Supplier,
        Some('6') => AccountType::Income,
        Some('8') => AccountType::Expense,
        _ => AccountType::Other,
    }
}

fn mapped_value<'a>(
    row: &'a ParsedRow,
    mappings: &[ColumnMapping],
    target_field: &str,
) -> Option<&'a str> {
    let mapping = mappings.iter().find(|m| m.target_field == target_field)?;
    let value = row.get(&mapping.source_column)?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Builds sort-code inputs from mapped rows. Rows without a parseable code
/// or a name become [`RowIssue`]s; everything else flows through.
pub fn build_sort_code_inputs(
    rows: &[ParsedRow],
    mappings: &[ColumnMapping],
) -> (Vec<SortCodeInput>, Vec<RowIssue>) {
    let mut inputs = Vec::new();
    let mut issues = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        let code = match mapped_value(row, mappings, "code").and_then(parse_key) {
            Some(code) => code,
            None => {
                issues.push(RowIssue {
                    row: index,
                    detail: "missing or unparseable sort code".to_string(),
                });
                continue;
            }
        };
        let name = match mapped_value(row, mappings, "name") {
            Some(name) => name.to_string(),
            None => {
                issues.push(RowIssue {
                    row: index,
                    detail: format!("sort code {}: missing name", code),
                });
                continue;
            }
        };

        inputs.push(SortCodeInput {
            code,
            name,
            parent_code: mapped_value(row, mappings, "parent_code").and_then(parse_key),
            report_type: report_type_for_code(code),
            sort_order: mapped_value(row, mappings, "sort_order").and_then(parse_key),
        });
    }

    debug!(
        "built {} sort code inputs from {} rows ({} issues)",
        inputs.len(),
        rows.len(),
        issues.len()
    );
    (inputs, issues)
}

/// Builds account-index inputs from mapped rows. `forced_type` covers the
/// dedicated customer/supplier uploads; otherwise the type is derived from
/// the row's sort code.
pub fn build_account_inputs(
    rows: &[ParsedRow],
    mappings: &[ColumnMapping],
    forced_type: Option<AccountType>,
) -> (Vec<AccountIndexInput>, Vec<RowIssue>) {
    let mut inputs = Vec::new();
    let mut issues = Vec::new();

    for (index, row) in rows.iter().enumerate() {
        let account_key = match mapped_value(row, mappings, "account_key").and_then(parse_key) {
            Some(key) => key,
            None => {
                issues.push(RowIssue {
                    row: index,
                    detail: "missing or unparseable account key".to_string(),
                });
                continue;
            }
        };
        let account_name = match mapped_value(row, mappings, "account_name") {
            Some(name) => name.to_string(),
            None => {
                issues.push(RowIssue {
                    row: index,
                    detail: format!("account {}: missing name", account_key),
                });
                continue;
            }
        };

        let sort_code = mapped_value(row, mappings, "sort_code").and_then(parse_key);
        let account_type = forced_type.or(Some(
            sort_code.map_or(AccountType::Other, account_type_for_sort_code),
        ));

        let current_balance = match mapped_value(row, mappings, "current_balance") {
            Some(raw) => match parse_amount(raw) {
                Some(value) => Some(value),
                None => {
                    issues.push(RowIssue {
                        row: index,
                        detail: format!("account {}: unparseable balance '{}'", account_key, raw),
                    });
                    None
                }
            },
            None => None,
        };

        inputs.push(AccountIndexInput {
            account_key,
            account_name,
            sort_code,
            account_type,
            id_number: mapped_value(row, mappings, "id_number").map(str::to_string),
            address: mapped_value(row, mappings, "address").map(str::to_string),
            phone: mapped_value(row, mappings, "phone").map(str::to_string),
            email: mapped_value(row, mappings, "email").map(str::to_string),
            current_balance,
        });
    }

    debug!(
        "built {} account inputs from {} rows ({} issues)",
        inputs.len(),
        rows.len(),
        issues.len()
    );
    (inputs, issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::{suggest_mapping, UploadKind};

    fn row(pairs: &[(&str, &str)]) -> ParsedRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn sort_code_mappings() -> Vec<ColumnMapping> {
        let columns = vec!["קוד מיון".to_string(), "שם קוד מיון".to_string()];
        suggest_mapping(&columns, &UploadKind::SortCodes.fields())
    }

    #[test]
    fn test_parse_amount_handles_export_noise() {
        assert_eq!(parse_amount("1,234.56"), Some(1234.56));
        assert_eq!(parse_amount(" 500 "), Some(500.0));
        assert_eq!(parse_amount("(250)"), Some(-250.0));
        assert_eq!(parse_amount("-42.5"), Some(-42.5));
        assert_eq!(parse_amount("n/a"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn test_report_type_from_leading_digit() {
        assert_eq!(report_type_for_code(600), Some(ReportType::Income));
        assert_eq!(report_type_for_code(612), Some(ReportType::Income));
        assert_eq!(report_type_for_code(700), Some(ReportType::Cogs));
        assert_eq!(report_type_for_code(850), Some(ReportType::Operating));
        assert_eq!(report_type_for_code(900), Some(ReportType::Financial));
        assert_eq!(report_type_for_code(150), None);
    }

    #[test]
    fn test_account_type_from_leading_digit() {
        assert_eq!(account_type_for_sort_code(160), AccountType::Customer);
        assert_eq!(account_type_for_sort_code(210), AccountType::Supplier);
        assert_eq!(account_type_for_sort_code(600), AccountType::Income);
        assert_eq!(account_type_for_sort_code(820), AccountType::Expense);
        assert_eq!(account_type_for_sort_code(430), AccountType::Other);
    }

    #[test]
    fn test_build_sort_code_inputs_collects_issues() {
        let rows = vec![
            row(&[("קוד מיון", "600"), ("שם קוד מיון", "Sales")]),
            row(&[("קוד מיון", "abc"), ("שם קוד מיון", "Broken")]),
            row(&[("קוד מיון", "800"), ("שם קוד מיון", "")]),
        ];

        let (inputs, issues) = build_sort_code_inputs(&rows, &sort_code_mappings());
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].code, 600);
        assert_eq!(inputs[0].report_type, Some(ReportType::Income));
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].row, 1);
        assert_eq!(issues[1].row, 2);
    }

    #[test]
    fn test_build_account_inputs_with_forced_type() {
        let columns = vec![
            "מפתח".to_string(),
            "שם".to_string(),
            "קוד מיון".to_string(),
            "יתרה".to_string(),
        ];
        let mappings = suggest_mapping(&columns, &UploadKind::Accounts.fields());
        let rows = vec![row(&[
            ("מפתח", "1600"),
            ("שם", "Acme Ltd"),
            ("קוד מיון", "160"),
            ("יתרה", "12,000"),
        ])];

        let (inputs, issues) = build_account_inputs(&rows, &mappings, None);
        assert!(issues.is_empty());
        assert_eq!(inputs[0].account_type, Some(AccountType::Customer));
        assert_eq!(inputs[0].current_balance, Some(12_000.0));

        let (forced, _) =
            build_account_inputs(&rows, &mappings, Some(AccountType::Supplier));
        assert_eq!(forced[0].account_type, Some(AccountType::Supplier));
    }

    #[test]
    fn test_unparseable_balance_is_flagged_not_zeroed() {
        let columns = vec!["מפתח".to_string(), "שם".to_string(), "יתרה".to_string()];
        let mappings = suggest_mapping(&columns, &UploadKind::Accounts.fields());
        let rows = vec![row(&[("מפתח", "2000"), ("שם", "Supplies"), ("יתרה", "??")])];

        let (inputs, issues) = build_account_inputs(&rows, &mappings, None);
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].current_balance, None);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].detail.contains("2000"));
    }
}
