//! Entry repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use daybook_core::defaults::{PAGE_LIMIT, PAGE_LIMIT_MAX, PAGE_OFFSET};
use daybook_core::{
    new_v7, Attachment, CatalogKind, EntryFull, EntryRepository, EntryType, Error,
    ListEntriesRequest, ListEntriesResponse, NewAttachment, Result,
};

use crate::rows::{entry_from_row, linked_refs, ENTRY_COLUMNS};

const ATTACHMENT_COLUMNS: &str =
    "id, entry_id, blob_key, file_name, mime_type, size_bytes, created_at_utc";

/// Filters shared by the list and count queries.
///
/// $1 owner, $2 entry type, $3 starred, $4 tag name, $5 person name. Null
/// parameters disable their filter.
const LIST_FILTER: &str = r#"
    e.owner_id = $1
    AND e.deleted_at IS NULL
    AND ($2::text IS NULL OR e.entry_type = $2)
    AND ($3::bool IS NULL OR e.starred = $3)
    AND ($4::text IS NULL OR EXISTS (
        SELECT 1 FROM entry_tag et JOIN tag t ON t.id = et.tag_id
        WHERE et.entry_id = e.id AND lower(t.name) = lower($4)
    ))
    AND ($5::text IS NULL OR EXISTS (
        SELECT 1 FROM entry_person ep JOIN person p ON p.id = ep.person_id
        WHERE ep.entry_id = e.id AND lower(p.name) = lower($5)
    ))
"#;

/// PostgreSQL implementation of EntryRepository.
#[derive(Clone)]
pub struct PgEntryRepository {
    pool: PgPool,
}

impl PgEntryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn attachment_from_row(row: &sqlx::postgres::PgRow) -> Attachment {
        Attachment {
            id: row.get("id"),
            entry_id: row.get("entry_id"),
            blob_key: row.get("blob_key"),
            file_name: row.get("file_name"),
            mime_type: row.get("mime_type"),
            size_bytes: row.get("size_bytes"),
            created_at_utc: row.get("created_at_utc"),
        }
    }
}

#[async_trait]
impl EntryRepository for PgEntryRepository {
    async fn fetch(&self, owner_id: Uuid, entry_id: Uuid) -> Result<EntryFull> {
        let sql = format!(
            "SELECT {} FROM entry WHERE id = $1 AND owner_id = $2 AND deleted_at IS NULL",
            ENTRY_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(entry_id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::EntryNotFound(entry_id))?;
        let entry = entry_from_row(&row)?;

        let tags = linked_refs(&self.pool, CatalogKind::Tag, entry_id).await?;
        let people = linked_refs(&self.pool, CatalogKind::Person, entry_id).await?;

        let sql = format!(
            "SELECT {} FROM attachment WHERE entry_id = $1 ORDER BY created_at_utc, id",
            ATTACHMENT_COLUMNS
        );
        let attachments = sqlx::query(&sql)
            .bind(entry_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?
            .iter()
            .map(Self::attachment_from_row)
            .collect();

        Ok(EntryFull {
            entry,
            tags,
            people,
            attachments,
        })
    }

    async fn list(&self, owner_id: Uuid, req: ListEntriesRequest) -> Result<ListEntriesResponse> {
        let limit = req.limit.unwrap_or(PAGE_LIMIT).clamp(1, PAGE_LIMIT_MAX);
        let offset = req.offset.unwrap_or(PAGE_OFFSET).max(0);
        let entry_type = req.entry_type.map(|t| t.as_str());

        let count_sql = format!("SELECT COUNT(*) FROM entry e WHERE {}", LIST_FILTER);
        let total = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(owner_id)
            .bind(entry_type)
            .bind(req.starred)
            .bind(req.tag.as_deref())
            .bind(req.person.as_deref())
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;

        let page_sql = format!(
            "SELECT {} FROM entry e WHERE {} \
             ORDER BY e.created_at_utc DESC, e.id DESC \
             LIMIT $6 OFFSET $7",
            ENTRY_COLUMNS, LIST_FILTER
        );
        let rows = sqlx::query(&page_sql)
            .bind(owner_id)
            .bind(entry_type)
            .bind(req.starred)
            .bind(req.tag.as_deref())
            .bind(req.person.as_deref())
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let entries = rows.iter().map(entry_from_row).collect::<Result<Vec<_>>>()?;
        Ok(ListEntriesResponse { entries, total })
    }

    async fn soft_delete(&self, owner_id: Uuid, entry_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE entry SET deleted_at = NOW() \
             WHERE id = $1 AND owner_id = $2 AND deleted_at IS NULL",
        )
        .bind(entry_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::EntryNotFound(entry_id));
        }
        Ok(())
    }

    async fn restore(&self, owner_id: Uuid, entry_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE entry SET deleted_at = NULL \
             WHERE id = $1 AND owner_id = $2 AND deleted_at IS NOT NULL",
        )
        .bind(entry_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::EntryNotFound(entry_id));
        }
        Ok(())
    }

    async fn entry_timestamps(
        &self,
        owner_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<DateTime<Utc>>> {
        sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            SELECT created_at_utc FROM entry
            WHERE owner_id = $1
              AND deleted_at IS NULL
              AND ($2::timestamptz IS NULL OR created_at_utc >= $2)
              AND ($3::timestamptz IS NULL OR created_at_utc <= $3)
            ORDER BY created_at_utc
            "#,
        )
        .bind(owner_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)
    }

    async fn count_by_type(
        &self,
        owner_id: Uuid,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<(EntryType, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT entry_type, COUNT(*) AS n FROM entry
            WHERE owner_id = $1
              AND deleted_at IS NULL
              AND ($2::timestamptz IS NULL OR created_at_utc <= $2)
            GROUP BY entry_type
            "#,
        )
        .bind(owner_id)
        .bind(until)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut counts = rows
            .iter()
            .map(|row| -> Result<(EntryType, i64)> {
                let entry_type: String = row.get("entry_type");
                Ok((entry_type.parse::<EntryType>()?, row.get::<i64, _>("n")))
            })
            .collect::<Result<Vec<_>>>()?;
        counts.sort();
        Ok(counts)
    }

    async fn add_attachment(
        &self,
        owner_id: Uuid,
        attachment: NewAttachment,
    ) -> Result<Attachment> {
        let sql = format!(
            "INSERT INTO attachment ({cols}) \
             SELECT $1, e.id, $3, $4, $5, $6, $7 FROM entry e \
             WHERE e.id = $2 AND e.owner_id = $8 AND e.deleted_at IS NULL \
             RETURNING {cols}",
            cols = ATTACHMENT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(new_v7())
            .bind(attachment.entry_id)
            .bind(&attachment.blob_key)
            .bind(&attachment.file_name)
            .bind(&attachment.mime_type)
            .bind(attachment.size_bytes)
            .bind(Utc::now())
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::EntryNotFound(attachment.entry_id))?;

        Ok(Self::attachment_from_row(&row))
    }

    async fn remove_attachment(&self, owner_id: Uuid, attachment_id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "DELETE FROM attachment a USING entry e \
             WHERE a.id = $1 AND a.entry_id = e.id AND e.owner_id = $2",
        )
        .bind(attachment_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!(
                "attachment {} not found",
                attachment_id
            )));
        }
        Ok(())
    }
}
