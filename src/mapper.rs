use serde::{Deserialize, Serialize};

/// A canonical target field an uploaded column can be mapped onto: the
/// machine name plus the display label operators see in the export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub label: String,
}

impl FieldSpec {
    pub fn new(name: &str, label: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
        }
    }
}

/// One proposed (or operator-confirmed) association between a source column
/// and a canonical field. Produced once per file selection and editable
/// before commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub source_column: String,
    pub target_field: String,
}

fn text_matches(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Proposes a mapping for each source column whose text equals a target
/// field's canonical name or display label, case-insensitively. Columns
/// without a match are simply absent from the result; that is a normal
/// outcome, not a failure.
pub fn suggest_mapping(
    source_columns: &[String],
    target_fields: &[FieldSpec],
) -> Vec<ColumnMapping> {
    let mut mappings = Vec::new();
    for column in source_columns {
        if let Some(field) = target_fields
            .iter()
            .find(|f| text_matches(&f.name, column) || text_matches(&f.label, column))
        {
            mappings.push(ColumnMapping {
                source_column: column.clone(),
                target_field: field.name.clone(),
            });
        }
    }
    mappings
}

/// Returns the required target fields with no mapped source column. A
/// non-empty result blocks ingestion before any write occurs.
pub fn validate_required_fields(mappings: &[ColumnMapping], required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|field| !mappings.iter().any(|m| m.target_field == **field))
        .map(|field| field.to_string())
        .collect()
}

/// The upload families the platform accepts, each with its canonical field
/// table (labels as they appear in the accounting-package exports) and the
/// fields an upload cannot proceed without.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadKind {
    Transactions,
    Balances,
    SortCodes,
    Accounts,
}

impl UploadKind {
    pub fn fields(&self) -> Vec<FieldSpec> {
        match self {
            UploadKind::Transactions => vec![
                FieldSpec::new("koteret", "מספר מסמך"),
                FieldSpec::new("sort_code", "קוד מיון"),
                FieldSpec::new("sort_code_name", "שם קוד מיון"),
                FieldSpec::new("account_key", "מפתח חשבון"),
                FieldSpec::new("account_name", "שם חשבון"),
                FieldSpec::new("amount", "סכום"),
                FieldSpec::new("details", "פרטים"),
                FieldSpec::new("transaction_date", "תאריך"),
                FieldSpec::new("counter_account_name", "שם חשבון נגדי"),
                FieldSpec::new("counter_account_number", "מספר חשבון נגדי"),
            ],
            UploadKind::Balances => vec![
                FieldSpec::new("account_key", "מפתח חשבון"),
                FieldSpec::new("account_name", "שם חשבון"),
                FieldSpec::new("month", "חודש"),
                FieldSpec::new("year", "שנה"),
                FieldSpec::new("opening_balance", "יתרת פתיחה"),
                FieldSpec::new("closing_balance", "יתרת סגירה"),
            ],
            UploadKind::SortCodes => vec![
                FieldSpec::new("code", "קוד מיון"),
                FieldSpec::new("name", "שם קוד מיון"),
                FieldSpec::new("parent_code", "קוד אב"),
                FieldSpec::new("sort_order", "סדר"),
            ],
            UploadKind::Accounts => vec![
                FieldSpec::new("account_key", "מפתח"),
                FieldSpec::new("account_name", "שם"),
                FieldSpec::new("sort_code", "קוד מיון"),
                FieldSpec::new("account_type", "סוג"),
                FieldSpec::new("id_number", "מספר זהות"),
                FieldSpec::new("address", "כתובת"),
                FieldSpec::new("phone", "טלפון"),
                FieldSpec::new("email", "דואר אלקטרוני"),
                FieldSpec::new("current_balance", "יתרה"),
            ],
        }
    }

    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            UploadKind::Transactions => &["transaction_date", "amount"],
            UploadKind::Balances => &["account_key", "month", "year"],
            UploadKind::SortCodes => &["code", "name"],
            UploadKind::Accounts => &["account_key", "account_name"],
        }
    }
}
