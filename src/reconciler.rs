use crate::error::Result;
use crate::schema::{
    AccountIndexInput, IndexKind, IndexSyncRecord, SortCodeInput, SyncSource, SyncStatus,
};
use crate::store::{RecordStore, StoreError, UpsertOutcome};
use chrono::Utc;
use log::info;

/// Tally of one reconciliation run. For every call,
/// `added + updated + errors.len() ==` the number of input records;
/// `invalid` counts the subset of `errors` that failed the pre-flight
/// validity check rather than the store write.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    pub added: usize,
    pub updated: usize,
    pub invalid: usize,
    pub errors: Vec<String>,
    pub audit: IndexSyncRecord,
}

/// Ingests parsed reference rows against a tenant's existing records via
/// idempotent per-record upserts, and appends one audit record per run.
///
/// Batches are best-effort: a failing record lands in the error list and the
/// rest proceed. Within one call, overlapping natural keys observe
/// last-write-wins in record order. Concurrent calls for the same tenant are
/// not coordinated here; consistency under races is the store's
/// responsibility.
pub struct IndexReconciler<S: RecordStore> {
    store: S,
}

impl<S: RecordStore> IndexReconciler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn reconcile_sort_codes(
        &self,
        tenant_id: &str,
        inputs: &[SortCodeInput],
        source: SyncSource,
        actor: Option<&str>,
    ) -> Result<ReconcileOutcome> {
        let mut errors = Vec::new();
        let mut valid = Vec::new();
        for input in inputs {
            if input.code == 0 {
                errors.push(format!("sort code {}: missing natural key", input.code));
            } else if input.name.trim().is_empty() {
                errors.push(format!("sort code {}: empty name", input.code));
            } else {
                valid.push(input.clone());
            }
        }
        let invalid = errors.len();

        let keys: Vec<i64> = valid.iter().map(|input| input.code).collect();
        let results = self.store.upsert_sort_codes(tenant_id, &valid).await;
        let (added, updated) = tally("sort code", &keys, results, &mut errors);

        self.finish(
            tenant_id,
            IndexKind::SortCodes,
            source,
            actor,
            inputs.len(),
            added,
            updated,
            invalid,
            errors,
        )
        .await
    }

    pub async fn reconcile_accounts(
        &self,
        tenant_id: &str,
        inputs: &[AccountIndexInput],
        source: SyncSource,
        actor: Option<&str>,
    ) -> Result<ReconcileOutcome> {
        let mut errors = Vec::new();
        let mut valid = Vec::new();
        for input in inputs {
            if input.account_key == 0 {
                errors.push(format!(
                    "account {}: missing natural key",
                    input.account_key
                ));
            } else if input.account_name.trim().is_empty() {
                errors.push(format!("account {}: empty name", input.account_key));
            } else {
                valid.push(input.clone());
            }
        }
        let invalid = errors.len();

        let keys: Vec<i64> = valid.iter().map(|input| input.account_key).collect();
        let results = self.store.upsert_accounts(tenant_id, &valid).await;
        let (added, updated) = tally("account", &keys, results, &mut errors);

        self.finish(
            tenant_id,
            IndexKind::Accounts,
            source,
            actor,
            inputs.len(),
            added,
            updated,
            invalid,
            errors,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn finish(
        &self,
        tenant_id: &str,
        index_type: IndexKind,
        source: SyncSource,
        actor: Option<&str>,
        total: usize,
        added: usize,
        updated: usize,
        invalid: usize,
        errors: Vec<String>,
    ) -> Result<ReconcileOutcome> {
        let status = if errors.is_empty() {
            SyncStatus::Success
        } else if added + updated == 0 {
            SyncStatus::Failed
        } else {
            SyncStatus::Partial
        };

        let audit = IndexSyncRecord {
            tenant_id: tenant_id.to_string(),
            index_type,
            source,
            total,
            added,
            updated,
            deleted: 0,
            status,
            error_message: if errors.is_empty() {
                None
            } else {
                Some(errors.join("; "))
            },
            actor: actor.map(str::to_string),
            timestamp: Utc::now(),
        };
        self.store.append_sync_record(&audit).await?;

        info!(
            "reconciled {:?} for tenant {}: {} added, {} updated, {} errors ({:?})",
            index_type,
            tenant_id,
            added,
            updated,
            errors.len(),
            status
        );

        Ok(ReconcileOutcome {
            added,
            updated,
            invalid,
            errors,
            audit,
        })
    }
}

fn tally(
    label: &str,
    keys: &[i64],
    results: Vec<std::result::Result<UpsertOutcome, StoreError>>,
    errors: &mut Vec<String>,
) -> (usize, usize) {
    let mut added = 0;
    let mut updated = 0;
    for (index, key) in keys.iter().enumerate() {
        match results.get(index) {
            Some(Ok(UpsertOutcome::Added)) => added += 1,
            Some(Ok(UpsertOutcome::Updated)) => updated += 1,
            Some(Err(err)) => errors.push(format!("{} {}: {}", label, key, err)),
            // A store must answer per record; a short result list would
            // otherwise let records vanish from the tally.
            None => errors.push(format!("{} {}: store returned no result", label, key)),
        }
    }
    (added, updated)
}
