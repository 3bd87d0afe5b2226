//! Explicit management of an owner's tag and person catalogs.
//!
//! Rows are created lazily by the annotation pipeline; this service is the
//! only way they are recolored, regrouped, or deleted.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use daybook_core::{
    models::validate_color, within, CatalogRepository, EngineConfig, Person, Result, Tag,
};

#[derive(Clone)]
pub struct CatalogService {
    catalog: Arc<dyn CatalogRepository>,
    config: EngineConfig,
}

impl CatalogService {
    pub fn new(catalog: Arc<dyn CatalogRepository>, config: EngineConfig) -> Self {
        Self { catalog, config }
    }

    /// Tags with counts of non-deleted entries, ordered by name.
    pub async fn list_tags(&self, owner_id: Uuid) -> Result<Vec<Tag>> {
        within(
            self.config.store_timeout,
            "list_tags",
            self.catalog.list_tags(owner_id),
        )
        .await
    }

    /// People with counts of non-deleted entries, ordered by name.
    pub async fn list_people(&self, owner_id: Uuid) -> Result<Vec<Person>> {
        within(
            self.config.store_timeout,
            "list_people",
            self.catalog.list_people(owner_id),
        )
        .await
    }

    /// Set or clear (`None` or blank) a tag's `#RRGGBB` color.
    pub async fn update_tag(
        &self,
        owner_id: Uuid,
        tag_id: Uuid,
        color: Option<String>,
    ) -> Result<Tag> {
        let color = color
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        if let Some(color) = color.as_deref() {
            validate_color(color)?;
        }

        let tag = within(
            self.config.store_timeout,
            "update_tag",
            self.catalog.set_tag_color(owner_id, tag_id, color),
        )
        .await?;
        info!(
            subsystem = "annotate",
            component = "catalog_service",
            op = "update_tag",
            owner_id = %owner_id,
            tag_id = %tag_id,
            color = ?tag.color,
            "Tag updated"
        );
        Ok(tag)
    }

    /// Set or clear (`None` or blank) a person's group label.
    pub async fn update_person(
        &self,
        owner_id: Uuid,
        person_id: Uuid,
        group_label: Option<String>,
    ) -> Result<Person> {
        let group_label = group_label
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty());

        let person = within(
            self.config.store_timeout,
            "update_person",
            self.catalog.set_person_group(owner_id, person_id, group_label),
        )
        .await?;
        info!(
            subsystem = "annotate",
            component = "catalog_service",
            op = "update_person",
            owner_id = %owner_id,
            person_id = %person_id,
            group_label = ?person.group_label,
            "Person updated"
        );
        Ok(person)
    }

    /// Delete a tag and detach it from every entry.
    ///
    /// Entries whose body still contains the tag get it back on their next
    /// edit or re-annotation.
    pub async fn delete_tag(&self, owner_id: Uuid, tag_id: Uuid) -> Result<()> {
        within(
            self.config.store_timeout,
            "delete_tag",
            self.catalog.delete_tag(owner_id, tag_id),
        )
        .await?;
        info!(
            subsystem = "annotate",
            component = "catalog_service",
            op = "delete_tag",
            owner_id = %owner_id,
            tag_id = %tag_id,
            "Tag deleted"
        );
        Ok(())
    }

    /// Delete a person and detach them from every entry.
    pub async fn delete_person(&self, owner_id: Uuid, person_id: Uuid) -> Result<()> {
        within(
            self.config.store_timeout,
            "delete_person",
            self.catalog.delete_person(owner_id, person_id),
        )
        .await?;
        info!(
            subsystem = "annotate",
            component = "catalog_service",
            op = "delete_person",
            owner_id = %owner_id,
            person_id = %person_id,
            "Person deleted"
        );
        Ok(())
    }
}
