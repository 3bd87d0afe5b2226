//! Tag and person catalog repository implementation.

use std::cmp::Ordering;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use daybook_core::{validate_color, CatalogKind, CatalogRepository, Error, Person, Result, Tag};

use crate::rows::CatalogTable;

/// PostgreSQL implementation of CatalogRepository.
#[derive(Clone)]
pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Catalog rows with counts of non-deleted linked entries. When `item_id`
    /// is given only that row is returned.
    async fn rows_with_counts(
        &self,
        kind: CatalogKind,
        owner_id: Uuid,
        item_id: Option<Uuid>,
    ) -> Result<Vec<PgRow>> {
        let t = CatalogTable::for_kind(kind);
        let sql = format!(
            r#"
            SELECT c.id, c.owner_id, c.name, c.{extra} AS extra, c.created_at_utc,
                   COUNT(e.id) AS entry_count
            FROM {table} c
            LEFT JOIN {link} l ON l.{fk} = c.id
            LEFT JOIN entry e ON e.id = l.entry_id AND e.deleted_at IS NULL
            WHERE c.owner_id = $1 AND ($2::uuid IS NULL OR c.id = $2)
            GROUP BY c.id
            "#,
            extra = t.extra,
            table = t.table,
            link = t.link_table,
            fk = t.fk,
        );

        sqlx::query(&sql)
            .bind(owner_id)
            .bind(item_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn one_row(&self, kind: CatalogKind, owner_id: Uuid, item_id: Uuid) -> Result<PgRow> {
        self.rows_with_counts(kind, owner_id, Some(item_id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| not_found(kind, item_id))
    }

    async fn set_extra(
        &self,
        kind: CatalogKind,
        owner_id: Uuid,
        item_id: Uuid,
        value: Option<String>,
    ) -> Result<()> {
        let t = CatalogTable::for_kind(kind);
        let sql = format!(
            "UPDATE {} SET {} = $3 WHERE id = $1 AND owner_id = $2",
            t.table, t.extra
        );
        let result = sqlx::query(&sql)
            .bind(item_id)
            .bind(owner_id)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(not_found(kind, item_id));
        }
        Ok(())
    }

    async fn delete_row(&self, kind: CatalogKind, owner_id: Uuid, item_id: Uuid) -> Result<()> {
        // Link rows go with the catalog row through ON DELETE CASCADE.
        let sql = format!(
            "DELETE FROM {} WHERE id = $1 AND owner_id = $2",
            CatalogTable::for_kind(kind).table
        );
        let result = sqlx::query(&sql)
            .bind(item_id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(not_found(kind, item_id));
        }
        Ok(())
    }
}

fn not_found(kind: CatalogKind, item_id: Uuid) -> Error {
    Error::NotFound(format!("{} {} not found", kind, item_id))
}

fn by_name(a_name: &str, a_id: Uuid, b_name: &str, b_id: Uuid) -> Ordering {
    a_name
        .to_lowercase()
        .cmp(&b_name.to_lowercase())
        .then_with(|| a_id.cmp(&b_id))
}

fn tag_from_row(row: &PgRow) -> Tag {
    Tag {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        name: row.get("name"),
        color: row.get("extra"),
        created_at_utc: row.get("created_at_utc"),
        entry_count: row.get("entry_count"),
    }
}

fn person_from_row(row: &PgRow) -> Person {
    Person {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        name: row.get("name"),
        group_label: row.get("extra"),
        created_at_utc: row.get("created_at_utc"),
        entry_count: row.get("entry_count"),
    }
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn list_tags(&self, owner_id: Uuid) -> Result<Vec<Tag>> {
        let mut tags: Vec<Tag> = self
            .rows_with_counts(CatalogKind::Tag, owner_id, None)
            .await?
            .iter()
            .map(tag_from_row)
            .collect();
        tags.sort_by(|a, b| by_name(&a.name, a.id, &b.name, b.id));
        Ok(tags)
    }

    async fn list_people(&self, owner_id: Uuid) -> Result<Vec<Person>> {
        let mut people: Vec<Person> = self
            .rows_with_counts(CatalogKind::Person, owner_id, None)
            .await?
            .iter()
            .map(person_from_row)
            .collect();
        people.sort_by(|a, b| by_name(&a.name, a.id, &b.name, b.id));
        Ok(people)
    }

    async fn set_tag_color(
        &self,
        owner_id: Uuid,
        tag_id: Uuid,
        color: Option<String>,
    ) -> Result<Tag> {
        if let Some(color) = color.as_deref() {
            validate_color(color)?;
        }
        self.set_extra(CatalogKind::Tag, owner_id, tag_id, color)
            .await?;
        let row = self.one_row(CatalogKind::Tag, owner_id, tag_id).await?;
        Ok(tag_from_row(&row))
    }

    async fn set_person_group(
        &self,
        owner_id: Uuid,
        person_id: Uuid,
        group_label: Option<String>,
    ) -> Result<Person> {
        let group_label = group_label.filter(|g| !g.trim().is_empty());
        self.set_extra(CatalogKind::Person, owner_id, person_id, group_label)
            .await?;
        let row = self
            .one_row(CatalogKind::Person, owner_id, person_id)
            .await?;
        Ok(person_from_row(&row))
    }

    async fn delete_tag(&self, owner_id: Uuid, tag_id: Uuid) -> Result<()> {
        self.delete_row(CatalogKind::Tag, owner_id, tag_id).await
    }

    async fn delete_person(&self, owner_id: Uuid, person_id: Uuid) -> Result<()> {
        self.delete_row(CatalogKind::Person, owner_id, person_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_name_ignores_case_then_breaks_ties_on_id() {
        let (a, b) = (Uuid::from_u128(1), Uuid::from_u128(2));
        assert_eq!(by_name("alpha", b, "Beta", a), Ordering::Less);
        assert_eq!(by_name("Work", a, "work", b), Ordering::Less);
        assert_eq!(by_name("work", b, "Work", a), Ordering::Greater);
    }

    #[test]
    fn test_not_found_names_kind_and_id() {
        let id = Uuid::nil();
        let err = not_found(CatalogKind::Person, id);
        assert_eq!(err.to_string(), format!("Not found: person {} not found", id));
    }
}
