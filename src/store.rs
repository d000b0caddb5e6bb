use crate::schema::{
    AccountIndexInput, AccountIndexRecord, IndexKind, IndexSyncRecord, SortCode, SortCodeInput,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("storage backend: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Added,
    Updated,
}

/// Persistence port for reference-index reconciliation. The methods are
/// batch-shaped so an implementation can coalesce round trips, but the
/// result list is positionally aligned with the input, preserving the
/// per-record partial-failure contract: one failed record never poisons its
/// neighbours.
#[allow(async_fn_in_trait)]
pub trait RecordStore {
    async fn upsert_sort_codes(
        &self,
        tenant_id: &str,
        inputs: &[SortCodeInput],
    ) -> Vec<Result<UpsertOutcome, StoreError>>;

    async fn upsert_accounts(
        &self,
        tenant_id: &str,
        inputs: &[AccountIndexInput],
    ) -> Vec<Result<UpsertOutcome, StoreError>>;

    async fn append_sync_record(&self, record: &IndexSyncRecord) -> Result<(), StoreError>;
}

#[derive(Default)]
struct MemoryStoreInner {
    sort_codes: BTreeMap<(String, i64), SortCode>,
    accounts: BTreeMap<(String, i64), AccountIndexRecord>,
    sync_log: Vec<IndexSyncRecord>,
    fail_keys: HashSet<i64>,
}

/// In-process [`RecordStore`] keyed by the natural keys, tenant-scoped.
/// Records are processed sequentially in input order, so overlapping keys
/// within one batch observe last-write-wins. Backend failures can be
/// simulated per natural key for exercising the partial-failure path.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a natural key whose writes will fail with a backend error.
    pub fn fail_key(&self, key: i64) {
        self.inner.lock().unwrap().fail_keys.insert(key);
    }

    /// Active sort codes for a tenant, ordered by sort order.
    pub fn sort_codes(&self, tenant_id: &str) -> Vec<SortCode> {
        let inner = self.inner.lock().unwrap();
        let mut codes: Vec<SortCode> = inner
            .sort_codes
            .values()
            .filter(|sc| sc.tenant_id == tenant_id && sc.is_active)
            .cloned()
            .collect();
        codes.sort_by_key(|sc| sc.sort_order);
        codes
    }

    /// Active account cards for a tenant, ordered by name.
    pub fn accounts(&self, tenant_id: &str) -> Vec<AccountIndexRecord> {
        let inner = self.inner.lock().unwrap();
        let mut accounts: Vec<AccountIndexRecord> = inner
            .accounts
            .values()
            .filter(|acc| acc.tenant_id == tenant_id && acc.is_active)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.account_name.cmp(&b.account_name));
        accounts
    }

    pub fn sync_log(&self) -> Vec<IndexSyncRecord> {
        self.inner.lock().unwrap().sync_log.clone()
    }

    /// Most recent audit row for a tenant and index kind.
    pub fn last_sync(&self, tenant_id: &str, index_type: IndexKind) -> Option<IndexSyncRecord> {
        self.inner
            .lock()
            .unwrap()
            .sync_log
            .iter()
            .rev()
            .find(|record| record.tenant_id == tenant_id && record.index_type == index_type)
            .cloned()
    }
}

impl RecordStore for MemoryStore {
    async fn upsert_sort_codes(
        &self,
        tenant_id: &str,
        inputs: &[SortCodeInput],
    ) -> Vec<Result<UpsertOutcome, StoreError>> {
        let mut inner = self.inner.lock().unwrap();
        inputs
            .iter()
            .map(|input| {
                if inner.fail_keys.contains(&input.code) {
                    return Err(StoreError::Backend(format!(
                        "write rejected for key {}",
                        input.code
                    )));
                }

                let key = (tenant_id.to_string(), input.code);
                if let Some(existing) = inner.sort_codes.get_mut(&key) {
                    existing.name = input.name.clone();
                    existing.parent_code = input.parent_code;
                    existing.report_type = input.report_type;
                    if let Some(order) = input.sort_order {
                        existing.sort_order = order;
                    }
                    Ok(UpsertOutcome::Updated)
                } else {
                    inner.sort_codes.insert(
                        key,
                        SortCode {
                            tenant_id: tenant_id.to_string(),
                            code: input.code,
                            name: input.name.clone(),
                            parent_code: input.parent_code,
                            report_type: input.report_type,
                            sort_order: input.sort_order.unwrap_or(input.code),
                            is_active: true,
                        },
                    );
                    Ok(UpsertOutcome::Added)
                }
            })
            .collect()
    }

    async fn upsert_accounts(
        &self,
        tenant_id: &str,
        inputs: &[AccountIndexInput],
    ) -> Vec<Result<UpsertOutcome, StoreError>> {
        let mut inner = self.inner.lock().unwrap();
        inputs
            .iter()
            .map(|input| {
                if inner.fail_keys.contains(&input.account_key) {
                    return Err(StoreError::Backend(format!(
                        "write rejected for key {}",
                        input.account_key
                    )));
                }

                let key = (tenant_id.to_string(), input.account_key);
                if let Some(existing) = inner.accounts.get_mut(&key) {
                    existing.account_name = input.account_name.clone();
                    existing.sort_code = input.sort_code;
                    existing.account_type = input.account_type;
                    existing.id_number = input.id_number.clone();
                    existing.address = input.address.clone();
                    existing.phone = input.phone.clone();
                    existing.email = input.email.clone();
                    if let Some(balance) = input.current_balance {
                        existing.current_balance = balance;
                    }
                    Ok(UpsertOutcome::Updated)
                } else {
                    inner.accounts.insert(
                        key,
                        AccountIndexRecord {
                            tenant_id: tenant_id.to_string(),
                            account_key: input.account_key,
                            account_name: input.account_name.clone(),
                            sort_code: input.sort_code,
                            account_type: input.account_type,
                            id_number: input.id_number.clone(),
                            address: input.address.clone(),
                            phone: input.phone.clone(),
                            email: input.email.clone(),
                            current_balance: input.current_balance.unwrap_or(0.0),
                            is_active: true,
                        },
                    );
                    Ok(UpsertOutcome::Added)
                }
            })
            .collect()
    }

    async fn append_sync_record(&self, record: &IndexSyncRecord) -> Result<(), StoreError> {
        self.inner.lock().unwrap().sync_log.push(record.clone());
        Ok(())
    }
}
