//! Per-table reconciliation.
//!
//! Computes the difference between the keys already in the store and the
//! freshly fetched records, then applies it:
//!
//! > `to_insert` = records whose key is in `incoming - existing`
//! > `to_delete` = keys in `existing - incoming`

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Record, Row, RowKey, Table};
use crate::storage::CatalogStore;

/// Number of rows written to one table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableChanges {
    pub inserted: usize,
    pub deleted: usize,
}

impl TableChanges {
    pub fn has_changes(&self) -> bool {
        self.inserted > 0 || self.deleted > 0
    }
}

/// The planned writes for one table.
#[derive(Debug, Clone)]
pub struct ReconcilePlan<R> {
    pub table: Table,
    pub to_insert: Vec<R>,
    pub to_delete: Vec<RowKey>,
}

impl<R: Record> ReconcilePlan<R> {
    /// Diff the stored keys against the incoming records.
    ///
    /// Incoming records sharing a new key are all inserted. Deletions are
    /// unique and sorted.
    pub fn new(existing: &[RowKey], incoming: &[R]) -> Self {
        let existing_keys: HashSet<&RowKey> = existing.iter().collect();
        let incoming_keys: HashSet<RowKey> = incoming.iter().map(Record::key).collect();

        let to_insert = incoming
            .iter()
            .filter(|record| !existing_keys.contains(&record.key()))
            .cloned()
            .collect();

        let to_delete: BTreeSet<&RowKey> = existing
            .iter()
            .filter(|key| !incoming_keys.contains(*key))
            .collect();

        Self {
            table: R::TABLE,
            to_insert,
            to_delete: to_delete.into_iter().cloned().collect(),
        }
    }

    pub fn changes(&self) -> TableChanges {
        TableChanges {
            inserted: self.to_insert.len(),
            deleted: self.to_delete.len(),
        }
    }

    /// Write the plan: one batch insert, then one delete per key.
    pub async fn apply(&self, store: &dyn CatalogStore) -> Result<TableChanges> {
        if !self.to_insert.is_empty() {
            let rows = self
                .to_insert
                .iter()
                .map(Record::to_row)
                .collect::<Result<Vec<Row>>>()?;
            store.insert(self.table, rows).await?;
        }

        for key in &self.to_delete {
            log::debug!("Deleting {} {}", self.table, key);
            store.delete(self.table, key).await?;
        }

        Ok(self.changes())
    }
}

/// Bring one table of the store in line with `incoming`.
///
/// With `dry_run` the plan is computed and reported but nothing is written.
pub async fn reconcile<R: Record>(
    store: &dyn CatalogStore,
    incoming: &[R],
    dry_run: bool,
) -> Result<TableChanges> {
    let existing = store.select_keys(R::TABLE).await?;
    let plan = ReconcilePlan::new(&existing, incoming);

    let changes = if dry_run {
        plan.changes()
    } else {
        plan.apply(store).await?
    };

    log::info!(
        "{}: {} existing, {} incoming, +{} -{}{}",
        R::TABLE,
        existing.len(),
        incoming.len(),
        changes.inserted,
        changes.deleted,
        if dry_run { " (dry run)" } else { "" }
    );
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Department, InstructorAssignment};
    use crate::storage::LocalStore;
    use tempfile::TempDir;

    fn dept(code: &str) -> Department {
        Department {
            dept_code: code.to_string(),
        }
    }

    fn keys(codes: &[&str]) -> Vec<RowKey> {
        codes.iter().map(|c| RowKey::new([*c])).collect()
    }

    #[test]
    fn test_no_changes() {
        let plan = ReconcilePlan::new(&keys(&["CMPT", "MATH"]), &[dept("MATH"), dept("CMPT")]);
        assert!(!plan.changes().has_changes());
    }

    #[test]
    fn test_additions_and_removals() {
        let plan = ReconcilePlan::new(
            &keys(&["CMPT", "HIST", "ABCD"]),
            &[dept("CMPT"), dept("MATH")],
        );

        assert_eq!(plan.table, Table::Departments);
        assert_eq!(plan.to_insert, vec![dept("MATH")]);
        assert_eq!(plan.to_delete, keys(&["ABCD", "HIST"]));
    }

    #[test]
    fn test_empty_to_full() {
        let plan = ReconcilePlan::new(&[], &[dept("CMPT")]);
        assert_eq!(plan.changes(), TableChanges { inserted: 1, deleted: 0 });
    }

    #[test]
    fn test_full_to_empty() {
        let plan = ReconcilePlan::<Department>::new(&keys(&["CMPT", "CMPT"]), &[]);
        assert_eq!(plan.to_delete, keys(&["CMPT"]));
    }

    #[test]
    fn test_repeated_incoming_keys_all_inserted() {
        let ada = InstructorAssignment {
            dept_code: "CMPT".into(),
            course_number: "120".into(),
            section_code: "D100".into(),
            name: "Ada".into(),
        };
        let plan = ReconcilePlan::new(&[], &[ada.clone(), ada]);
        assert_eq!(plan.changes().inserted, 2);
    }

    #[tokio::test]
    async fn test_reconcile_converges_and_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        let first = reconcile(&store, &[dept("CMPT"), dept("ABCD")], false)
            .await
            .unwrap();
        assert_eq!(first, TableChanges { inserted: 2, deleted: 0 });

        let second = reconcile(&store, &[dept("CMPT"), dept("MATH")], false)
            .await
            .unwrap();
        assert_eq!(second, TableChanges { inserted: 1, deleted: 1 });

        let mut stored = store.select_keys(Table::Departments).await.unwrap();
        stored.sort();
        assert_eq!(stored, keys(&["CMPT", "MATH"]));

        let third = reconcile(&store, &[dept("CMPT"), dept("MATH")], false)
            .await
            .unwrap();
        assert!(!third.has_changes());
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        let changes = reconcile(&store, &[dept("CMPT")], true).await.unwrap();
        assert_eq!(changes.inserted, 1);
        assert!(store.select_keys(Table::Departments).await.unwrap().is_empty());
    }
}
