use anyhow::Result;
use ledger_reconciler::*;
use std::collections::BTreeMap;

const SORT_CODES_CSV: &str = "\
קוד מיון,שם קוד מיון,קוד אב
600,הכנסות ממכירות,
700,קניות,
800,הנהלה וכלליות,
";

const ACCOUNTS_CSV: &str = "\
מפתח,שם,קוד מיון,יתרה
1600,לקוח אלפא,160,\"12,500\"
1601,,160,300
2000,ספק בטא,210,(750)
";

fn parse_csv(text: &str) -> Result<(Vec<String>, Vec<ParsedRow>)> {
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            headers
                .iter()
                .cloned()
                .zip(record.iter().map(str::to_string))
                .collect(),
        );
    }
    Ok((headers, rows))
}

#[tokio::test]
async fn sort_code_upload_round_trip_is_idempotent() -> Result<()> {
    let (headers, rows) = parse_csv(SORT_CODES_CSV)?;

    let mappings = suggest_mapping(&headers, &UploadKind::SortCodes.fields());
    assert!(validate_required_fields(&mappings, UploadKind::SortCodes.required_fields())
        .is_empty());

    let (inputs, issues) = build_sort_code_inputs(&rows, &mappings);
    assert!(issues.is_empty());
    assert_eq!(inputs.len(), 3);
    assert_eq!(inputs[0].report_type, Some(ReportType::Income));

    let reconciler = IndexReconciler::new(MemoryStore::new());
    let first = reconciler
        .reconcile_sort_codes("tenant-a", &inputs, SyncSource::SpreadsheetExport, None)
        .await?;
    assert_eq!(first.added, 3);
    assert_eq!(first.updated, 0);
    assert!(first.errors.is_empty());
    assert_eq!(first.audit.status, SyncStatus::Success);

    // Re-running the unchanged export updates in place and adds nothing.
    let second = reconciler
        .reconcile_sort_codes("tenant-a", &inputs, SyncSource::SpreadsheetExport, None)
        .await?;
    assert_eq!(second.added, 0);
    assert_eq!(second.updated, 3);
    assert_eq!(second.added + second.updated + second.errors.len(), inputs.len());

    let codes = reconciler.store().sort_codes("tenant-a");
    assert_eq!(codes.len(), 3);

    let last = reconciler
        .store()
        .last_sync("tenant-a", IndexKind::SortCodes)
        .expect("audit trail must exist");
    assert_eq!(last.status, SyncStatus::Success);
    assert_eq!(reconciler.store().sync_log().len(), 2);
    Ok(())
}

#[tokio::test]
async fn account_upload_collects_row_and_write_failures() -> Result<()> {
    let (headers, rows) = parse_csv(ACCOUNTS_CSV)?;
    let mappings = suggest_mapping(&headers, &UploadKind::Accounts.fields());

    let (inputs, issues) = build_account_inputs(&rows, &mappings, None);
    // The empty-name row never reaches the reconciler.
    assert_eq!(inputs.len(), 2);
    assert_eq!(issues.len(), 1);
    assert_eq!(inputs[0].current_balance, Some(12_500.0));
    assert_eq!(inputs[0].account_type, Some(AccountType::Customer));
    assert_eq!(inputs[1].current_balance, Some(-750.0));
    assert_eq!(inputs[1].account_type, Some(AccountType::Supplier));

    let store = MemoryStore::new();
    store.fail_key(2000);
    let reconciler = IndexReconciler::new(store);

    let outcome = reconciler
        .reconcile_accounts("tenant-a", &inputs, SyncSource::SpreadsheetExport, Some("ops"))
        .await?;
    assert_eq!(outcome.added, 1);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].starts_with("account 2000:"));
    assert_eq!(outcome.added + outcome.updated + outcome.errors.len(), inputs.len());
    assert_eq!(outcome.audit.status, SyncStatus::Partial);

    let accounts = reconciler.store().accounts("tenant-a");
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].account_key, 1600);
    Ok(())
}

#[test]
fn missing_required_mapping_blocks_ingestion() {
    let headers = vec!["קוד מיון".to_string(), "הערות".to_string()];
    let mappings = suggest_mapping(&headers, &UploadKind::SortCodes.fields());

    let missing = validate_required_fields(&mappings, UploadKind::SortCodes.required_fields());
    assert_eq!(missing, vec!["name".to_string()]);
}

#[test]
fn dashboard_pipeline_flags_discrepancies_and_quality_issues() -> Result<()> {
    let ledger = vec![
        LedgerEntry {
            account_key: 1600,
            account_name: "לקוח אלפא".to_string(),
            sort_code: 160,
            sort_code_name: "לקוחות".to_string(),
            amount: 500.0,
            month: 1,
            year: 2024,
        },
        LedgerEntry {
            account_key: 2000,
            account_name: "ספק בטא".to_string(),
            sort_code: 210,
            sort_code_name: "ספקים".to_string(),
            amount: 13_000.0,
            month: 1,
            year: 2024,
        },
        LedgerEntry {
            account_key: 2000,
            account_name: "ספק בטא".to_string(),
            sort_code: 210,
            sort_code_name: "ספקים".to_string(),
            amount: f64::NAN,
            month: 2,
            year: 2024,
        },
    ];
    let balances = vec![TrialBalanceRow {
        account_key: 1600,
        account_name: "לקוח אלפא".to_string(),
        sort_code: 160,
        sort_code_name: "לקוחות".to_string(),
        monthly_totals: BTreeMap::from([(1, 500.0), (2, 0.0)]),
    }];

    let analysis = analyze(&ledger, &balances, &[1, 2], &AlertPolicy::default())?;

    assert_eq!(analysis.summary.total_accounts, 2);
    assert_eq!(analysis.summary.matched_accounts, 1);
    assert_eq!(analysis.summary.critical_count, 1);
    assert_eq!(analysis.issues.len(), 1);
    assert_eq!(analysis.issues[0].account_key, 2000);

    // The supplier account is ledger-only: total difference 13,000, match 0.
    let supplier = analysis
        .records
        .iter()
        .find(|r| r.account_key == 2000)
        .unwrap();
    assert_eq!(supplier.balance_total, 0.0);
    assert_eq!(supplier.match_rate, 0.0);
    assert!(analysis
        .alerts
        .iter()
        .any(|a| a.severity == Severity::Critical && a.account_key == Some(2000)));

    for record in &analysis.records {
        assert!((0.0..=100.0).contains(&record.match_rate));
    }
    Ok(())
}

#[test]
fn cash_flow_components_reconcile_or_carry_a_gap() -> Result<()> {
    fn balance(account_key: i64, month: u32, opening: f64, closing: f64) -> MonthlyBalance {
        MonthlyBalance {
            account_key,
            account_name: format!("Account {}", account_key),
            account_type: "other".to_string(),
            month,
            year: 2024,
            opening_balance: opening,
            closing_balance: closing,
            change: closing - opening,
        }
    }

    let balances = vec![
        balance(10000, 6, 5_000.0, 5_600.0),
        balance(13000, 6, 20_000.0, 19_500.0),
        balance(16000, 6, 3_000.0, 3_400.0),
        balance(20000, 6, 2_000.0, 2_250.0),
        balance(18000, 6, 1_000.0, 900.0),
        balance(25000, 6, 10_000.0, 9_000.0),
    ];

    let table = ClassificationTable::default();
    let statement = derive(&balances, 6, &table)?;

    let component_sum = statement.operating_cash_flow
        + statement.investing_cash_flow
        + statement.financing_cash_flow;
    let holds_within_epsilon =
        (component_sum - statement.net_cash_change).abs() <= AMOUNT_EPSILON;
    assert!(
        holds_within_epsilon || statement.reconciliation_gap.is_some(),
        "decomposition gap must never pass silently"
    );

    let steps = waterfall(&statement);
    assert_eq!(steps.first().unwrap().label, WaterfallLabel::NetIncome);
    let total = steps.last().unwrap();
    assert_eq!(total.kind, WaterfallKind::Total);
    assert_eq!(total.cumulative, statement.net_cash_change);

    let trend = monthly_trend(&balances, &[6], 2024, &table)?;
    assert_eq!(trend.len(), 1);
    assert_eq!(trend[0].closing_balance, 5_600.0 + 19_500.0);
    Ok(())
}
