//! Transactional write path backed by PostgreSQL.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, trace};
use uuid::Uuid;

use daybook_core::{
    new_v7, CatalogKind, CatalogRef, Entry, Error, Result, StoreTx, TransactionalStore,
};

use crate::rows::{classify_write_error, entry_from_row, linked_refs, CatalogTable, ENTRY_COLUMNS};

/// Opens [`PgStoreTx`] transactions on a pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionalStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await.map_err(Error::Database)?;
        trace!(subsystem = "database", component = "tx", "Transaction started");
        Ok(Box::new(PgStoreTx { tx }))
    }
}

/// A write transaction. Dropping it without commit rolls back.
pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn insert_entry(&mut self, entry: &Entry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO entry (
                id, owner_id, entry_type, title, body, starred, metadata,
                created_at_utc, updated_at_utc, deleted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(entry.id)
        .bind(entry.owner_id)
        .bind(entry.entry_type.as_str())
        .bind(&entry.title)
        .bind(&entry.body)
        .bind(entry.starred)
        .bind(entry.metadata.as_ref().map(Json))
        .bind(entry.created_at_utc)
        .bind(entry.updated_at_utc)
        .bind(entry.deleted_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| classify_write_error(e, || format!("entry {} already exists", entry.id)))?;
        Ok(())
    }

    async fn lock_entry(&mut self, owner_id: Uuid, entry_id: Uuid) -> Result<Option<Entry>> {
        let sql = format!(
            "SELECT {} FROM entry \
             WHERE id = $1 AND owner_id = $2 AND deleted_at IS NULL \
             FOR UPDATE",
            ENTRY_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(entry_id)
            .bind(owner_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(Error::Database)?;

        row.as_ref().map(entry_from_row).transpose()
    }

    async fn update_entry(&mut self, entry: &Entry) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE entry
            SET title = $3, body = $4, starred = $5, metadata = $6, updated_at_utc = $7
            WHERE id = $1 AND owner_id = $2
            "#,
        )
        .bind(entry.id)
        .bind(entry.owner_id)
        .bind(&entry.title)
        .bind(&entry.body)
        .bind(entry.starred)
        .bind(entry.metadata.as_ref().map(Json))
        .bind(entry.updated_at_utc)
        .execute(&mut *self.tx)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::EntryNotFound(entry.id));
        }
        Ok(())
    }

    async fn find_by_name(
        &mut self,
        kind: CatalogKind,
        owner_id: Uuid,
        name: &str,
    ) -> Result<Option<CatalogRef>> {
        let sql = format!(
            "SELECT id, name FROM {} WHERE owner_id = $1 AND lower(name) = lower($2)",
            CatalogTable::for_kind(kind).table
        );
        let row = sqlx::query(&sql)
            .bind(owner_id)
            .bind(name)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(|r| CatalogRef {
            id: r.get("id"),
            name: r.get("name"),
        }))
    }

    async fn create_catalog_row(
        &mut self,
        kind: CatalogKind,
        owner_id: Uuid,
        name: &str,
    ) -> Result<CatalogRef> {
        // A concurrent insert of the same name makes this statement wait for
        // the other transaction, then return no row once it commits.
        let sql = format!(
            "INSERT INTO {} (id, owner_id, name, created_at_utc) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT DO NOTHING \
             RETURNING id, name",
            CatalogTable::for_kind(kind).table
        );
        let row = sqlx::query(&sql)
            .bind(new_v7())
            .bind(owner_id)
            .bind(name)
            .bind(Utc::now())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| classify_write_error(e, || format!("{} '{}' already exists", kind, name)))?;

        match row {
            Some(r) => Ok(CatalogRef {
                id: r.get("id"),
                name: r.get("name"),
            }),
            None => {
                debug!(
                    subsystem = "database",
                    component = "tx",
                    kind = %kind,
                    name,
                    "Catalog insert skipped on existing name"
                );
                Err(Error::Conflict(format!("{} '{}' already exists", kind, name)))
            }
        }
    }

    async fn linked(&mut self, kind: CatalogKind, entry_id: Uuid) -> Result<Vec<CatalogRef>> {
        linked_refs(&mut *self.tx, kind, entry_id).await
    }

    async fn link(&mut self, kind: CatalogKind, entry_id: Uuid, item_id: Uuid) -> Result<()> {
        let t = CatalogTable::for_kind(kind);
        let sql = format!(
            "INSERT INTO {} (entry_id, {}) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            t.link_table, t.fk
        );
        sqlx::query(&sql)
            .bind(entry_id)
            .bind(item_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| classify_write_error(e, || format!("{} {} not found", kind, item_id)))?;
        Ok(())
    }

    async fn unlink(&mut self, kind: CatalogKind, entry_id: Uuid, item_id: Uuid) -> Result<()> {
        let t = CatalogTable::for_kind(kind);
        let sql = format!(
            "DELETE FROM {} WHERE entry_id = $1 AND {} = $2",
            t.link_table, t.fk
        );
        sqlx::query(&sql)
            .bind(entry_id)
            .bind(item_id)
            .execute(&mut *self.tx)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(Error::Database)?;
        trace!(subsystem = "database", component = "tx", "Transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(Error::Database)
    }
}
