//! Integration tests for the PostgreSQL store.
//!
//! Run against a migrated database:
//! `DATABASE_URL=... cargo test -p daybook-db -- --ignored`

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use daybook_annotate::{CatalogService, EntryService};
use daybook_core::{
    new_v7, CatalogKind, CatalogRepository, CreateEntryRequest, EngineConfig, Entry, EntryFull,
    EntryRepository, EntryType, Error, ListEntriesRequest, NewAttachment, StoreTx,
    TransactionalStore, UpdateEntryRequest, UserPreferences,
};
use daybook_db::test_fixtures::connect_test;
use daybook_db::Database;
use daybook_insights::InsightsService;
use uuid::Uuid;

async fn setup() -> Database {
    let _ = dotenvy::dotenv();
    connect_test().await.expect("connect to test database")
}

fn entry_service(db: &Database) -> EntryService {
    EntryService::new(db.store.clone(), db.entries.clone(), EngineConfig::default())
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_catalog_names_unique_ignoring_case() {
    let db = setup().await;
    let owner = Uuid::new_v4();

    let mut tx = db.store.begin().await.unwrap();
    let first = tx
        .create_catalog_row(CatalogKind::Tag, owner, "Work")
        .await
        .unwrap();
    let dup = tx.create_catalog_row(CatalogKind::Tag, owner, "work").await;
    assert!(matches!(dup, Err(Error::Conflict(_))));

    let found = tx
        .find_by_name(CatalogKind::Tag, owner, "WORK")
        .await
        .unwrap()
        .expect("case-insensitive lookup");
    assert_eq!(found.id, first.id);
    assert_eq!(found.name, "Work");
    tx.rollback().await.unwrap();
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_dropped_transaction_rolls_back() {
    let db = setup().await;
    let owner = Uuid::new_v4();

    {
        let mut tx = db.store.begin().await.unwrap();
        tx.create_catalog_row(CatalogKind::Person, owner, "Jeremy")
            .await
            .unwrap();
    }

    let mut tx = db.store.begin().await.unwrap();
    let found = tx
        .find_by_name(CatalogKind::Person, owner, "Jeremy")
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_create_and_edit_entry_annotations() {
    let db = setup().await;
    let svc = entry_service(&db);
    let owner = Uuid::new_v4();

    let created = svc
        .create_entry(
            owner,
            CreateEntryRequest::new(EntryType::Journal)
                .with_body("Lunch with @Jeremy about #work-plans and #Work"),
        )
        .await
        .unwrap();
    let id = created.entry.id;
    assert_eq!(created.annotations().tag_names(), vec!["Work", "work-plans"]);
    assert_eq!(created.annotations().person_names(), vec!["Jeremy"]);

    let updated = svc
        .update_entry(owner, id, UpdateEntryRequest::body("Lunch with @Jeremy"))
        .await
        .unwrap();
    assert!(updated.annotations().tag_names().is_empty());
    assert_eq!(updated.annotations().person_names(), vec!["Jeremy"]);

    // Tag rows outlive their last association.
    let tags = db.catalog.list_tags(owner).await.unwrap();
    assert_eq!(tags.len(), 2);
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_concurrent_creates_share_one_catalog_row() {
    let db = setup().await;
    let svc = entry_service(&db);
    let owner = Uuid::new_v4();

    let a = svc.create_entry(
        owner,
        CreateEntryRequest::new(EntryType::Note).with_body("#Shared first"),
    );
    let b = svc.create_entry(
        owner,
        CreateEntryRequest::new(EntryType::Note).with_body("#shared second"),
    );
    let (a, b) = futures::join!(a, b);
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.tags.len(), 1);
    assert_eq!(b.tags.len(), 1);
    assert_eq!(a.tags[0].id, b.tags[0].id);
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_concurrent_creates_with_opposite_tag_order() {
    let db = setup().await;
    let svc = entry_service(&db);
    let owner = Uuid::new_v4();

    for round in 0..10 {
        let (x, y) = (format!("x{round}"), format!("y{round}"));
        let a = svc.create_entry(
            owner,
            CreateEntryRequest::new(EntryType::Note).with_body(format!("#{x} #{y}")),
        );
        let b = svc.create_entry(
            owner,
            CreateEntryRequest::new(EntryType::Note).with_body(format!("#{y} #{x}")),
        );
        let (a, b) = futures::join!(a, b);
        let (a, b) = (a.unwrap(), b.unwrap());

        let ids = |e: &EntryFull| {
            let mut ids: Vec<Uuid> = e.tags.iter().map(|t| t.id).collect();
            ids.sort();
            ids
        };
        assert_eq!(ids(&a).len(), 2);
        assert_eq!(ids(&a), ids(&b));
    }
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_list_filters_and_soft_delete() {
    let db = setup().await;
    let svc = entry_service(&db);
    let owner = Uuid::new_v4();

    let dream = svc
        .create_entry(
            owner,
            CreateEntryRequest::new(EntryType::Dream).with_body("flying over #Lisbon"),
        )
        .await
        .unwrap();
    svc.create_entry(owner, CreateEntryRequest::new(EntryType::Journal).with_body("quiet day"))
        .await
        .unwrap();

    let by_tag = svc
        .list_entries(
            owner,
            ListEntriesRequest {
                tag: Some("lisbon".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(by_tag.total, 1);
    assert_eq!(by_tag.entries[0].id, dream.entry.id);

    let journals = svc
        .list_entries(
            owner,
            ListEntriesRequest {
                entry_type: Some(EntryType::Journal),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(journals.total, 1);

    svc.delete_entry(owner, dream.entry.id).await.unwrap();
    assert!(matches!(
        svc.fetch_entry(owner, dream.entry.id).await,
        Err(Error::EntryNotFound(_))
    ));
    let all = svc.list_entries(owner, ListEntriesRequest::default()).await.unwrap();
    assert_eq!(all.total, 1);

    svc.restore_entry(owner, dream.entry.id).await.unwrap();
    let restored = svc.fetch_entry(owner, dream.entry.id).await.unwrap();
    assert_eq!(restored.annotations().tag_names(), vec!["Lisbon"]);
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_other_owner_cannot_see_entry() {
    let db = setup().await;
    let svc = entry_service(&db);
    let (owner, stranger) = (Uuid::new_v4(), Uuid::new_v4());

    let created = svc
        .create_entry(owner, CreateEntryRequest::new(EntryType::Idea).with_body("#secret"))
        .await
        .unwrap();

    assert!(matches!(
        db.entries.fetch(stranger, created.entry.id).await,
        Err(Error::EntryNotFound(_))
    ));
    assert!(matches!(
        db.entries.soft_delete(stranger, created.entry.id).await,
        Err(Error::EntryNotFound(_))
    ));
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_attachments() {
    let db = setup().await;
    let svc = entry_service(&db);
    let owner = Uuid::new_v4();
    let entry = svc
        .create_entry(owner, CreateEntryRequest::new(EntryType::Note))
        .await
        .unwrap()
        .entry;

    let attachment = svc
        .add_attachment(
            owner,
            NewAttachment {
                entry_id: entry.id,
                blob_key: "blobs/abc".into(),
                file_name: "photo.jpg".into(),
                mime_type: Some("image/jpeg".into()),
                size_bytes: 2048,
            },
        )
        .await
        .unwrap();

    let full = svc.fetch_entry(owner, entry.id).await.unwrap();
    assert_eq!(full.attachments.len(), 1);
    assert_eq!(full.attachments[0].id, attachment.id);

    let stranger = Uuid::new_v4();
    assert!(matches!(
        svc.remove_attachment(stranger, attachment.id).await,
        Err(Error::NotFound(_))
    ));
    svc.remove_attachment(owner, attachment.id).await.unwrap();
    assert!(svc.fetch_entry(owner, entry.id).await.unwrap().attachments.is_empty());
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_catalog_management() {
    let db = setup().await;
    let svc = entry_service(&db);
    let catalog = CatalogService::new(db.catalog.clone(), EngineConfig::default());
    let owner = Uuid::new_v4();

    let entry = svc
        .create_entry(owner, CreateEntryRequest::new(EntryType::Journal).with_body("#gym @Ana"))
        .await
        .unwrap();

    let tags = catalog.list_tags(owner).await.unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].entry_count, 1);

    let tag = catalog
        .update_tag(owner, tags[0].id, Some("#FF8800".into()))
        .await
        .unwrap();
    assert_eq!(tag.color.as_deref(), Some("#FF8800"));
    assert!(matches!(
        catalog.update_tag(owner, tags[0].id, Some("orange".into())).await,
        Err(Error::InvalidInput(_))
    ));

    let people = catalog.list_people(owner).await.unwrap();
    let person = catalog
        .update_person(owner, people[0].id, Some("Friends".into()))
        .await
        .unwrap();
    assert_eq!(person.group_label.as_deref(), Some("Friends"));

    catalog.delete_tag(owner, tag.id).await.unwrap();
    let full = svc.fetch_entry(owner, entry.entry.id).await.unwrap();
    assert!(full.tags.is_empty());
    assert_eq!(full.annotations().person_names(), vec!["Ana"]);
    assert!(matches!(
        catalog.delete_tag(owner, tag.id).await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
#[ignore = "requires migrated database"]
async fn test_heatmap_and_preferences() {
    let db = setup().await;
    let insights = InsightsService::new(
        db.entries.clone(),
        db.preferences.clone(),
        EngineConfig::default(),
    );
    let owner = Uuid::new_v4();

    let saved = insights
        .set_preferences(UserPreferences {
            owner_id: owner,
            timezone: "Europe/Berlin".into(),
            day_ends_at: None,
        })
        .await
        .unwrap();
    assert_eq!(insights.get_preferences(owner).await.unwrap(), saved);

    // 23:30 UTC on March 2 is already March 3 in Berlin.
    let base = Utc.with_ymd_and_hms(2026, 3, 2, 23, 30, 0).unwrap();
    let mut tx = db.store.begin().await.unwrap();
    for offset in [0, 2] {
        let created = base + Duration::days(offset);
        let entry = Entry {
            id: new_v7(),
            owner_id: owner,
            entry_type: EntryType::Journal,
            title: None,
            body: None,
            starred: false,
            metadata: None,
            created_at_utc: created,
            updated_at_utc: created,
            deleted_at: None,
        };
        tx.insert_entry(&entry).await.unwrap();
    }
    tx.commit().await.unwrap();

    let from = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
    let to = NaiveDate::from_ymd_opt(2026, 3, 6).unwrap();
    let heatmap = insights.heatmap(owner, from, to).await.unwrap();
    let counts: Vec<u32> = heatmap.days.values().copied().collect();
    assert_eq!(counts, vec![0, 1, 0, 1, 0]);
}
