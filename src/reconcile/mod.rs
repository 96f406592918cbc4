//! Change-aware synchronization of scraped records into the store
//!
//! Reconciliation runs in two phases:
//! - [`diff`] compares incoming records with persisted ones by natural key and
//!   classifies each as an add, an update (with the differing fields) or a
//!   no-op. It never touches the store.
//! - [`Reconciler::apply`] upserts records one by one. A failing record is
//!   counted and the batch moves on.
//!
//! Records are never deleted: keys that disappear upstream stay in the store.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

use async_trait::async_trait;

use crate::models::{Competition, Region};
use crate::storage::CatalogStore;
use crate::utils::error::PersistenceError;

// ============================================================================
// Entity Trait
// ============================================================================

/// A record that can be diffed and upserted by natural key
#[async_trait]
pub trait Reconcilable: Clone + Send + Sync + 'static {
    /// Natural key
    type Key: Eq + Hash + Clone + fmt::Debug + fmt::Display + Send + Sync;

    /// Entity name used in logs and reports
    const ENTITY: &'static str;

    /// The record's natural key
    fn key(&self) -> Self::Key;

    /// Tracked fields in their persisted string form
    fn fields(&self) -> Vec<(&'static str, String)>;

    /// Level of the region this record must belong to, if any
    fn parent_level(&self) -> Option<u32> {
        None
    }

    /// Load every persisted record of this kind
    async fn load(store: &dyn CatalogStore) -> Result<Vec<Self>, PersistenceError>;

    /// Insert or update this record
    async fn upsert(&self, store: &dyn CatalogStore) -> Result<(), PersistenceError>;
}

#[async_trait]
impl Reconcilable for Region {
    type Key = u32;

    const ENTITY: &'static str = "region";

    fn key(&self) -> u32 {
        self.level
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("name_zh", self.name_zh.clone()),
            ("name_zht", self.name_zht.clone()),
            ("name_en", self.name_en.clone()),
        ]
    }

    async fn load(store: &dyn CatalogStore) -> Result<Vec<Self>, PersistenceError> {
        store.load_regions().await
    }

    async fn upsert(&self, store: &dyn CatalogStore) -> Result<(), PersistenceError> {
        store.upsert_region(self).await
    }
}

#[async_trait]
impl Reconcilable for Competition {
    type Key = i64;

    const ENTITY: &'static str = "competition";

    fn key(&self) -> i64 {
        self.id
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("levelid", self.region_level.to_string()),
            ("name_zh", self.name_zh.clone()),
            ("name_zht", self.name_zht.clone()),
            ("name_en", self.name_en.clone()),
            ("event_type", self.kind.as_str().to_string()),
            ("type_code", self.type_code.to_string()),
            ("access_url", self.detail_url.clone()),
            ("url_status", if self.url_is_valid { "1" } else { "0" }.to_string()),
        ]
    }

    fn parent_level(&self) -> Option<u32> {
        Some(self.region_level)
    }

    async fn load(store: &dyn CatalogStore) -> Result<Vec<Self>, PersistenceError> {
        store.load_competitions().await
    }

    async fn upsert(&self, store: &dyn CatalogStore) -> Result<(), PersistenceError> {
        store.upsert_competition(self).await
    }
}

// ============================================================================
// Change Set
// ============================================================================

/// One differing field between a persisted and an incoming record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub old: String,
    pub new: String,
}

/// Classification of one incoming record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change<K> {
    /// No persisted record shares the key; carries the full payload
    Add {
        key: K,
        fields: Vec<(&'static str, String)>,
    },
    /// A persisted record shares the key; carries only the differing fields
    Update { key: K, fields: Vec<FieldChange> },
}

impl<K> Change<K> {
    pub fn key(&self) -> &K {
        match self {
            Self::Add { key, .. } | Self::Update { key, .. } => key,
        }
    }

    pub fn is_add(&self) -> bool {
        matches!(self, Self::Add { .. })
    }
}

impl<K: fmt::Display> fmt::Display for Change<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add { key, fields } => {
                write!(f, "+ {key}:")?;
                for (name, value) in fields {
                    write!(f, " {name}={value:?}")?;
                }
                Ok(())
            }
            Self::Update { key, fields } => {
                write!(f, "~ {key}:")?;
                for change in fields {
                    write!(f, " {} {:?} -> {:?}", change.field, change.old, change.new)?;
                }
                Ok(())
            }
        }
    }
}

/// Result of [`diff`]: the changes and the incoming records behind them
#[derive(Debug, Clone)]
pub struct ChangeSet<T: Reconcilable> {
    changes: Vec<Change<T::Key>>,
    pending: Vec<T>,
    field_comparisons: usize,
}

impl<T: Reconcilable> ChangeSet<T> {
    /// All changes in incoming order
    pub fn changes(&self) -> &[Change<T::Key>] {
        &self.changes
    }

    /// Incoming records that need writing, aligned with [`Self::changes`]
    pub fn pending(&self) -> &[T] {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn add_count(&self) -> usize {
        self.changes.iter().filter(|c| c.is_add()).count()
    }

    pub fn update_count(&self) -> usize {
        self.changes.len() - self.add_count()
    }

    /// Number of pairwise field comparisons performed
    pub fn field_comparisons(&self) -> usize {
        self.field_comparisons
    }

    /// Emit one log event per change
    pub fn log(&self) {
        for change in &self.changes {
            match change {
                Change::Add { key, .. } => {
                    tracing::info!(entity = T::ENTITY, key = %key, "New record");
                }
                Change::Update { key, fields } => {
                    for f in fields {
                        tracing::info!(
                            entity = T::ENTITY,
                            key = %key,
                            field = f.field,
                            old = %f.old,
                            new = %f.new,
                            "Field changed"
                        );
                    }
                }
            }
        }
    }
}

/// Collapse records sharing a key into one, the last occurrence winning
///
/// The merged record keeps the position of the first occurrence.
fn dedupe_by_key<T: Reconcilable>(incoming: &[T]) -> Vec<T> {
    let mut positions: HashMap<T::Key, usize> = HashMap::with_capacity(incoming.len());
    let mut unique: Vec<T> = Vec::with_capacity(incoming.len());

    for entity in incoming {
        let key = entity.key();
        match positions.get(&key) {
            Some(&index) => {
                tracing::debug!(entity = T::ENTITY, key = %key, "Duplicate key in incoming batch");
                unique[index] = entity.clone();
            }
            None => {
                positions.insert(key, unique.len());
                unique.push(entity.clone());
            }
        }
    }

    unique
}

/// Compare incoming records against persisted ones
///
/// Returns whether anything changed, plus the change set. Records sharing a
/// key are one logical entity: duplicates in `incoming` collapse into a
/// single change. With no persisted records every incoming record is an add
/// and no field comparison takes place.
pub fn diff<T: Reconcilable>(incoming: &[T], existing: &[T]) -> (bool, ChangeSet<T>) {
    let incoming = dedupe_by_key(incoming);
    let mut changes = Vec::new();
    let mut pending = Vec::new();
    let mut field_comparisons = 0;

    if existing.is_empty() {
        for entity in incoming {
            changes.push(Change::Add {
                key: entity.key(),
                fields: entity.fields(),
            });
            pending.push(entity);
        }
    } else {
        let by_key: HashMap<T::Key, &T> = existing.iter().map(|e| (e.key(), e)).collect();

        for entity in incoming {
            let key = entity.key();
            let Some(current) = by_key.get(&key) else {
                changes.push(Change::Add {
                    key,
                    fields: entity.fields(),
                });
                pending.push(entity);
                continue;
            };

            let old_fields = current.fields();
            let new_fields = entity.fields();
            field_comparisons += new_fields.len();

            let differing: Vec<FieldChange> = old_fields
                .into_iter()
                .zip(new_fields)
                .filter(|((_, old), (_, new))| old != new)
                .map(|((field, old), (_, new))| FieldChange { field, old, new })
                .collect();

            if !differing.is_empty() {
                changes.push(Change::Update {
                    key,
                    fields: differing,
                });
                pending.push(entity);
            }
        }
    }

    let changed = !changes.is_empty();
    (
        changed,
        ChangeSet {
            changes,
            pending,
            field_comparisons,
        },
    )
}

// ============================================================================
// Apply
// ============================================================================

/// Outcome of an [`Reconciler::apply`] batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyResult {
    pub success_count: usize,
    pub error_count: usize,
    /// Records whose parent region is not persisted
    pub skipped_count: usize,
}

impl ApplyResult {
    /// A batch succeeds if at least one record was written
    pub fn is_success(&self) -> bool {
        self.success_count > 0
    }

    pub fn total(&self) -> usize {
        self.success_count + self.error_count + self.skipped_count
    }
}

/// Outcome of [`Reconciler::sync`]
#[derive(Debug, Clone)]
pub struct SyncReport<T: Reconcilable> {
    pub changed: bool,
    pub changes: ChangeSet<T>,
    pub applied: ApplyResult,
}

/// Diffs and upserts records against a [`CatalogStore`]
pub struct Reconciler<'a> {
    store: &'a dyn CatalogStore,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a dyn CatalogStore) -> Self {
        Self { store }
    }

    /// Diff `incoming` against what the store currently holds
    pub async fn diff_with_store<T: Reconcilable>(
        &self,
        incoming: &[T],
    ) -> Result<(bool, ChangeSet<T>), PersistenceError> {
        let existing = T::load(self.store).await?;
        Ok(diff(incoming, &existing))
    }

    /// Upsert every record, isolating per-record failures
    ///
    /// Records whose parent region is missing from the store are skipped and
    /// counted apart from successes and errors. Only a failure to read the
    /// persisted region levels aborts the batch.
    pub async fn apply<T: Reconcilable>(&self, entities: &[T]) -> Result<ApplyResult, PersistenceError> {
        let mut result = ApplyResult::default();

        let levels: Option<HashSet<u32>> = if entities.iter().any(|e| e.parent_level().is_some()) {
            Some(self.store.region_levels().await?)
        } else {
            None
        };

        for entity in entities {
            if let (Some(level), Some(levels)) = (entity.parent_level(), levels.as_ref()) {
                if !levels.contains(&level) {
                    tracing::warn!(
                        entity = T::ENTITY,
                        key = %entity.key(),
                        region_level = level,
                        "Skipping record with unknown region level"
                    );
                    result.skipped_count += 1;
                    continue;
                }
            }

            match entity.upsert(self.store).await {
                Ok(()) => result.success_count += 1,
                Err(e) => {
                    tracing::error!(
                        entity = T::ENTITY,
                        key = %entity.key(),
                        error = %e,
                        "Failed to upsert record"
                    );
                    result.error_count += 1;
                }
            }
        }

        tracing::info!(
            entity = T::ENTITY,
            success = result.success_count,
            errors = result.error_count,
            skipped = result.skipped_count,
            "Batch applied"
        );

        Ok(result)
    }

    /// Diff against the store, then write only the changed records
    pub async fn sync<T: Reconcilable>(&self, incoming: &[T]) -> Result<SyncReport<T>, PersistenceError> {
        let (changed, changes) = self.diff_with_store(incoming).await?;
        changes.log();

        let applied = if changed {
            self.apply(changes.pending()).await?
        } else {
            tracing::info!(entity = T::ENTITY, "No changes to apply");
            ApplyResult::default()
        };

        Ok(SyncReport {
            changed,
            changes,
            applied,
        })
    }
}
