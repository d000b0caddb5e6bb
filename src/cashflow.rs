use crate::error::{ReconciliationError, Result};
use crate::schema::{MonthlyBalance, AMOUNT_EPSILON};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashFlowBucket {
    Cash,
    Bank,
    Customers,
    Suppliers,
    Inventory,
    FixedAssets,
    Loans,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefixRule {
    pub prefix: String,
    pub bucket: CashFlowBucket,
}

/// Maps account keys to cash-flow buckets by string prefix of the decimal
/// key, longest prefix winning. Injected per tenant; the default reproduces
/// the platform's historical chart-of-accounts layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationTable {
    pub rules: Vec<PrefixRule>,
}

impl ClassificationTable {
    pub fn new(rules: Vec<PrefixRule>) -> Self {
        Self { rules }
    }

    pub fn bucket_for(&self, account_key: i64) -> Option<CashFlowBucket> {
        let key = account_key.to_string();
        self.rules
            .iter()
            .filter(|rule| key.starts_with(&rule.prefix))
            .max_by_key(|rule| rule.prefix.len())
            .map(|rule| rule.bucket)
    }
}

impl Default for ClassificationTable {
    fn default() -> Self {
        fn rule(prefix: &str, bucket: CashFlowBucket) -> PrefixRule {
            PrefixRule {
                prefix: prefix.to_string(),
                bucket,
            }
        }

        Self {
            rules: vec![
                rule("1000", CashFlowBucket::Cash),
                rule("1100", CashFlowBucket::Cash),
                rule("1200", CashFlowBucket::Cash),
                rule("1300", CashFlowBucket::Bank),
                rule("1400", CashFlowBucket::Bank),
                rule("1500", CashFlowBucket::Bank),
                rule("1600", CashFlowBucket::Customers),
                rule("1700", CashFlowBucket::Customers),
                rule("1800", CashFlowBucket::Inventory),
                rule("1900", CashFlowBucket::Inventory),
                rule("2000", CashFlowBucket::Suppliers),
                rule("2100", CashFlowBucket::Suppliers),
                rule("2200", CashFlowBucket::Suppliers),
                rule("1001", CashFlowBucket::FixedAssets),
                rule("1002", CashFlowBucket::FixedAssets),
                rule("2500", CashFlowBucket::Loans),
                rule("2600", CashFlowBucket::Loans),
            ],
        }
    }
}

/// Indirect-method cash flow for a single month, decomposed into operating,
/// investing, and financing components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowStatement {
    pub net_income: f64,
    pub depreciation: f64,
    pub receivables_change: f64,
    pub inventory_change: f64,
    pub payables_change: f64,
    pub other_operating: f64,
    pub operating_cash_flow: f64,

    pub property_purchase: f64,
    pub property_sale: f64,
    pub investing_cash_flow: f64,

    pub loan_proceeds: f64,
    pub loan_repayments: f64,
    pub financing_cash_flow: f64,

    pub net_cash_change: f64,
    pub opening_cash: f64,
    pub closing_cash: f64,

    /// Deviation of operating + investing + financing from the observed net
    /// cash change, when it exceeds the shared tolerance. The decomposition
    /// is an approximation; a mismatch is surfaced here, never hidden.
    pub reconciliation_gap: Option<f64>,
}

/// Derives the cash-flow statement for `month` from per-account balance
/// changes, classified through `table`.
///
/// `net_income` is a working-capital proxy (cash delta plus receivables
/// delta minus payables delta), not an audited P&L figure; the balance feed
/// carries no profit-and-loss rows to source one from.
pub fn derive(
    balances: &[MonthlyBalance],
    month: u32,
    table: &ClassificationTable,
) -> Result<CashFlowStatement> {
    if !(1..=12).contains(&month) {
        return Err(ReconciliationError::InvalidMonth(month));
    }

    let mut customers = 0.0;
    let mut suppliers = 0.0;
    let mut inventory = 0.0;
    let mut fixed_assets = 0.0;
    let mut loans = 0.0;
    let mut cash_change = 0.0;
    let mut opening_cash = 0.0;
    let mut closing_cash = 0.0;

    for balance in balances.iter().filter(|b| b.month == month) {
        if !balance.change.is_finite()
            || !balance.opening_balance.is_finite()
            || !balance.closing_balance.is_finite()
        {
            warn!(
                "skipping non-finite balance for account {} in month {}",
                balance.account_key, balance.month
            );
            continue;
        }

        match table.bucket_for(balance.account_key) {
            Some(CashFlowBucket::Cash) | Some(CashFlowBucket::Bank) => {
                cash_change += balance.change;
                opening_cash += balance.opening_balance;
                closing_cash += balance.closing_balance;
            }
            Some(CashFlowBucket::Customers) => customers += balance.change,
            Some(CashFlowBucket::Suppliers) => suppliers += balance.change,
            Some(CashFlowBucket::Inventory) => inventory += balance.change,
            Some(CashFlowBucket::FixedAssets) => fixed_assets += balance.change,
            Some(CashFlowBucket::Loans) => loans += balance.change,
            None => {}
        }
    }

    let net_income = cash_change + customers - suppliers;
    let operating_cash_flow = net_income - customers + suppliers - inventory;
    let investing_cash_flow = -fixed_assets;
    let financing_cash_flow = loans;
    let net_cash_change = closing_cash - opening_cash;

    let gap =
        operating_cash_flow + investing_cash_flow + financing_cash_flow - net_cash_change;
    let reconciliation_gap = if gap.abs() > AMOUNT_EPSILON {
        warn!(
            "cash flow components deviate from net cash change by {:.2} in month {}",
            gap, month
        );
        Some(gap)
    } else {
        None
    };

    debug!(
        "derived cash flow for month {}: operating {:.2}, investing {:.2}, financing {:.2}",
        month, operating_cash_flow, investing_cash_flow, financing_cash_flow
    );

    Ok(CashFlowStatement {
        net_income,
        // A depreciation add-back needs a fixed-asset schedule the balance
        // feed does not carry.
        depreciation: 0.0,
        receivables_change: customers,
        inventory_change: inventory,
        payables_change: suppliers,
        other_operating: 0.0,
        operating_cash_flow,
        property_purchase: fixed_assets.max(0.0),
        property_sale: (-fixed_assets).max(0.0),
        investing_cash_flow,
        loan_proceeds: loans.max(0.0),
        loan_repayments: (-loans).max(0.0),
        financing_cash_flow,
        net_cash_change,
        opening_cash,
        closing_cash,
        reconciliation_gap,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaterfallKind {
    Delta,
    Subtotal,
    Total,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaterfallLabel {
    NetIncome,
    Depreciation,
    ReceivablesChange,
    InventoryChange,
    PayablesChange,
    OtherOperating,
    OperatingCashFlow,
    InvestingCashFlow,
    FinancingCashFlow,
    NetCashChange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterfallStep {
    pub label: WaterfallLabel,
    pub value: f64,
    pub cumulative: f64,
    pub kind: WaterfallKind,
}

/// Builds the waterfall sequence bridging net income to the net cash
/// change: adjustments in canonical order, an operating subtotal, then the
/// investing and financing deltas. Zero-valued adjustment lines are omitted
/// from the sequence but remain inside the subtotals.
pub fn waterfall(data: &CashFlowStatement) -> Vec<WaterfallStep> {
    let mut steps = Vec::new();
    let mut cumulative = data.net_income;

    steps.push(WaterfallStep {
        label: WaterfallLabel::NetIncome,
        value: data.net_income,
        cumulative,
        kind: WaterfallKind::Delta,
    });

    let mut delta = |steps: &mut Vec<WaterfallStep>, label, value: f64| {
        if value != 0.0 {
            cumulative += value;
            steps.push(WaterfallStep {
                label,
                value,
                cumulative,
                kind: WaterfallKind::Delta,
            });
        }
    };

    delta(&mut steps, WaterfallLabel::Depreciation, data.depreciation);
    // An increase in receivables or inventory consumes cash.
    delta(
        &mut steps,
        WaterfallLabel::ReceivablesChange,
        -data.receivables_change,
    );
    delta(
        &mut steps,
        WaterfallLabel::InventoryChange,
        -data.inventory_change,
    );
    delta(
        &mut steps,
        WaterfallLabel::PayablesChange,
        data.payables_change,
    );
    delta(
        &mut steps,
        WaterfallLabel::OtherOperating,
        data.other_operating,
    );

    steps.push(WaterfallStep {
        label: WaterfallLabel::OperatingCashFlow,
        value: data.operating_cash_flow,
        cumulative: data.operating_cash_flow,
        kind: WaterfallKind::Subtotal,
    });
    let mut cumulative = data.operating_cash_flow;

    if data.investing_cash_flow != 0.0 {
        cumulative += data.investing_cash_flow;
        steps.push(WaterfallStep {
            label: WaterfallLabel::InvestingCashFlow,
            value: data.investing_cash_flow,
            cumulative,
            kind: WaterfallKind::Delta,
        });
    }

    if data.financing_cash_flow != 0.0 {
        cumulative += data.financing_cash_flow;
        steps.push(WaterfallStep {
            label: WaterfallLabel::FinancingCashFlow,
            value: data.financing_cash_flow,
            cumulative,
            kind: WaterfallKind::Delta,
        });
    }

    steps.push(WaterfallStep {
        label: WaterfallLabel::NetCashChange,
        value: data.net_cash_change,
        cumulative: data.net_cash_change,
        kind: WaterfallKind::Total,
    });

    steps
}

/// Per-month trend series for the bank-balance chart: a simplified
/// operating figure from working-capital movement, the total balance
/// change, and the closing cash position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowMonthSummary {
    pub month: u32,
    pub year: i32,
    pub operating: f64,
    pub investing: f64,
    pub financing: f64,
    pub net_change: f64,
    pub closing_balance: f64,
}

pub fn monthly_trend(
    balances: &[MonthlyBalance],
    active_months: &[u32],
    year: i32,
    table: &ClassificationTable,
) -> Result<Vec<CashFlowMonthSummary>> {
    for &month in active_months {
        if !(1..=12).contains(&month) {
            return Err(ReconciliationError::InvalidMonth(month));
        }
    }

    Ok(active_months
        .iter()
        .map(|&month| {
            let mut customers_change = 0.0;
            let mut suppliers_change = 0.0;
            let mut net_change = 0.0;
            let mut closing_balance = 0.0;

            for balance in balances.iter().filter(|b| b.month == month) {
                if !balance.change.is_finite() || !balance.closing_balance.is_finite() {
                    continue;
                }
                net_change += balance.change;
                match table.bucket_for(balance.account_key) {
                    Some(CashFlowBucket::Cash) | Some(CashFlowBucket::Bank) => {
                        closing_balance += balance.closing_balance;
                    }
                    Some(CashFlowBucket::Customers) => customers_change += balance.change,
                    Some(CashFlowBucket::Suppliers) => suppliers_change += balance.change,
                    _ => {}
                }
            }

            CashFlowMonthSummary {
                month,
                year,
                operating: suppliers_change - customers_change,
                investing: 0.0,
                financing: 0.0,
                net_change,
                closing_balance,
            }
        })
        .collect())
}
