//! Table names and row mapping shared by the repositories.

use sqlx::postgres::{PgExecutor, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use uuid::Uuid;

use daybook_core::{sort_refs, CatalogKind, CatalogRef, Entry, EntryMetadata, EntryType, Error, Result};

/// Column list for entry queries, in the order `entry_from_row` reads them.
pub(crate) const ENTRY_COLUMNS: &str = "id, owner_id, entry_type, title, body, starred, \
     metadata, created_at_utc, updated_at_utc, deleted_at";

/// Physical layout of one catalog and its link table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CatalogTable {
    pub table: &'static str,
    pub link_table: &'static str,
    /// Foreign key column in `link_table` pointing at `table`.
    pub fk: &'static str,
    /// Nullable user-managed column (tag color, person group).
    pub extra: &'static str,
}

impl CatalogTable {
    pub fn for_kind(kind: CatalogKind) -> Self {
        match kind {
            CatalogKind::Tag => CatalogTable {
                table: "tag",
                link_table: "entry_tag",
                fk: "tag_id",
                extra: "color",
            },
            CatalogKind::Person => CatalogTable {
                table: "person",
                link_table: "entry_person",
                fk: "person_id",
                extra: "group_label",
            },
        }
    }
}

pub(crate) fn entry_from_row(row: &PgRow) -> Result<Entry> {
    let entry_type: String = row.try_get("entry_type").map_err(Error::Database)?;
    let metadata: Option<Json<EntryMetadata>> = row.try_get("metadata").map_err(Error::Database)?;

    Ok(Entry {
        id: row.try_get("id").map_err(Error::Database)?,
        owner_id: row.try_get("owner_id").map_err(Error::Database)?,
        entry_type: entry_type.parse::<EntryType>()?,
        title: row.try_get("title").map_err(Error::Database)?,
        body: row.try_get("body").map_err(Error::Database)?,
        starred: row.try_get("starred").map_err(Error::Database)?,
        metadata: metadata.map(|Json(m)| m),
        created_at_utc: row.try_get("created_at_utc").map_err(Error::Database)?,
        updated_at_utc: row.try_get("updated_at_utc").map_err(Error::Database)?,
        deleted_at: row.try_get("deleted_at").map_err(Error::Database)?,
    })
}

/// Catalog rows linked to an entry, sorted by case-insensitive name.
pub(crate) async fn linked_refs<'e, E>(
    executor: E,
    kind: CatalogKind,
    entry_id: Uuid,
) -> Result<Vec<CatalogRef>>
where
    E: PgExecutor<'e>,
{
    let t = CatalogTable::for_kind(kind);
    let sql = format!(
        "SELECT c.id, c.name FROM {table} c \
         JOIN {link} l ON l.{fk} = c.id \
         WHERE l.entry_id = $1",
        table = t.table,
        link = t.link_table,
        fk = t.fk,
    );

    let rows = sqlx::query(&sql)
        .bind(entry_id)
        .fetch_all(executor)
        .await
        .map_err(Error::Database)?;

    let mut refs: Vec<CatalogRef> = rows
        .into_iter()
        .map(|row| CatalogRef {
            id: row.get("id"),
            name: row.get("name"),
        })
        .collect();
    // Collation order differs from Rust's; keep one ordering across stores.
    sort_refs(&mut refs);
    Ok(refs)
}

/// Map unique and foreign key violations onto domain errors.
pub(crate) fn classify_write_error(err: sqlx::Error, what: impl FnOnce() -> String) -> Error {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => Error::Conflict(what()),
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => Error::NotFound(what()),
        _ => Error::Database(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_tables() {
        let tag = CatalogTable::for_kind(CatalogKind::Tag);
        assert_eq!(tag.table, "tag");
        assert_eq!(tag.link_table, "entry_tag");
        assert_eq!(tag.fk, "tag_id");
        assert_eq!(tag.extra, "color");

        let person = CatalogTable::for_kind(CatalogKind::Person);
        assert_eq!(person.table, "person");
        assert_eq!(person.link_table, "entry_person");
        assert_eq!(person.fk, "person_id");
        assert_eq!(person.extra, "group_label");
    }

    #[test]
    fn test_non_database_errors_pass_through() {
        let err = classify_write_error(sqlx::Error::RowNotFound, || "tag 'x'".into());
        assert!(matches!(err, Error::Database(sqlx::Error::RowNotFound)));
    }
}
