mod common;

use assert_matches::assert_matches;
use common::{create_category, create_product, inventory_service, setup_db, ProductSpec};
use prato_api::{
    entities::{
        inventory_session_item::{self, Entity as InventorySessionItem},
        product,
    },
    errors::ServiceError,
};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

#[tokio::test]
async fn start_snapshots_active_products_with_current_stock_and_cost() {
    let db = setup_db().await;
    let (service, _rx) = inventory_service(db.clone());
    let org = Uuid::new_v4();
    let user = Uuid::new_v4();

    let produce = create_category(&db, org, "Produce").await;
    create_product(
        &db,
        org,
        ProductSpec {
            name: "Tomato",
            current_stock: dec!(12.5),
            avg_cost: Some(dec!(4.20)),
            category_id: Some(produce.id),
            ..Default::default()
        },
    )
    .await;
    // No average cost yet: the snapshot falls back to zero
    create_product(
        &db,
        org,
        ProductSpec {
            name: "Onion",
            current_stock: dec!(7),
            avg_cost: None,
            ..Default::default()
        },
    )
    .await;
    // Inactive products are not counted
    create_product(
        &db,
        org,
        ProductSpec {
            name: "Discontinued sauce",
            is_active: false,
            ..Default::default()
        },
    )
    .await;
    // Other organizations' catalogs stay out of the snapshot
    create_product(
        &db,
        Uuid::new_v4(),
        ProductSpec {
            name: "Foreign product",
            ..Default::default()
        },
    )
    .await;

    let session = service
        .start_session(Uuid::new_v4(), org, user, Some("monthly".into()))
        .await
        .unwrap();
    assert_eq!(session.status, "open");
    assert_eq!(session.notes.as_deref(), Some("monthly"));

    let items = InventorySessionItem::find()
        .filter(inventory_session_item::Column::SessionId.eq(session.id))
        .all(db.as_ref())
        .await
        .unwrap();
    assert_eq!(items.len(), 2);

    let tomato = items.iter().find(|i| i.product_name == "Tomato").unwrap();
    assert_eq!(tomato.expected_quantity, dec!(12.5));
    assert_eq!(tomato.cost_per_unit, dec!(4.20));
    assert_eq!(tomato.category_name.as_deref(), Some("Produce"));
    assert_eq!(tomato.unit, "kg");
    assert!(tomato.counted_quantity.is_none());
    assert!(!tomato.is_correct);

    let onion = items.iter().find(|i| i.product_name == "Onion").unwrap();
    assert_eq!(onion.cost_per_unit, dec!(0));
    assert!(onion.category_name.is_none());
}

#[tokio::test]
async fn snapshot_is_immune_to_later_catalog_edits() {
    let db = setup_db().await;
    let (service, _rx) = inventory_service(db.clone());
    let org = Uuid::new_v4();

    let tomato = create_product(
        &db,
        org,
        ProductSpec {
            name: "Tomato",
            current_stock: dec!(10),
            ..Default::default()
        },
    )
    .await;

    let session = service
        .start_session(Uuid::new_v4(), org, Uuid::new_v4(), None)
        .await
        .unwrap();

    // Stock moves after the session opened; expectations must not follow
    let mut live: product::ActiveModel = tomato.into();
    live.current_stock = Set(dec!(3));
    live.update(db.as_ref()).await.unwrap();

    let items = service.list_items(session.id, None).await.unwrap();
    assert_eq!(items[0].expected_quantity, dec!(10));
}

#[tokio::test]
async fn second_open_session_for_the_same_cost_center_conflicts() {
    let db = setup_db().await;
    let (service, _rx) = inventory_service(db.clone());
    let org = Uuid::new_v4();
    let cost_center = Uuid::new_v4();
    let user = Uuid::new_v4();

    service
        .start_session(cost_center, org, user, None)
        .await
        .unwrap();

    let err = service
        .start_session(cost_center, org, user, None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));

    // A different cost center is unaffected
    service
        .start_session(Uuid::new_v4(), org, user, None)
        .await
        .unwrap();
}

#[tokio::test]
async fn completed_session_frees_the_cost_center_for_a_new_one() {
    let db = setup_db().await;
    let (service, _rx) = inventory_service(db.clone());
    let org = Uuid::new_v4();
    let cost_center = Uuid::new_v4();
    let user = Uuid::new_v4();

    let first = service
        .start_session(cost_center, org, user, None)
        .await
        .unwrap();
    service.finish_session(first.id, user).await.unwrap();

    let second = service
        .start_session(cost_center, org, user, None)
        .await
        .unwrap();
    assert_ne!(second.id, first.id);
}

#[tokio::test]
async fn active_session_lookup_reports_item_count_then_none_after_finish() {
    let db = setup_db().await;
    let (service, _rx) = inventory_service(db.clone());
    let org = Uuid::new_v4();
    let cost_center = Uuid::new_v4();
    let user = Uuid::new_v4();

    assert!(service
        .get_active_session(cost_center)
        .await
        .unwrap()
        .is_none());

    create_product(&db, org, ProductSpec::default()).await;
    create_product(
        &db,
        org,
        ProductSpec {
            name: "Garlic",
            ..Default::default()
        },
    )
    .await;

    let session = service
        .start_session(cost_center, org, user, None)
        .await
        .unwrap();

    let (active, item_count) = service
        .get_active_session(cost_center)
        .await
        .unwrap()
        .expect("session should be active");
    assert_eq!(active.id, session.id);
    assert_eq!(item_count, 2);

    service.finish_session(session.id, user).await.unwrap();
    assert!(service
        .get_active_session(cost_center)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn items_are_sorted_by_name_filterable_by_category_with_live_images() {
    let db = setup_db().await;
    let (service, _rx) = inventory_service(db.clone());
    let org = Uuid::new_v4();

    let produce = create_category(&db, org, "Produce").await;
    let dairy = create_category(&db, org, "Dairy").await;

    create_product(
        &db,
        org,
        ProductSpec {
            name: "Zucchini",
            category_id: Some(produce.id),
            ..Default::default()
        },
    )
    .await;
    let apple = create_product(
        &db,
        org,
        ProductSpec {
            name: "Apple",
            category_id: Some(produce.id),
            ..Default::default()
        },
    )
    .await;
    create_product(
        &db,
        org,
        ProductSpec {
            name: "Milk",
            unit: "l",
            category_id: Some(dairy.id),
            ..Default::default()
        },
    )
    .await;

    let session = service
        .start_session(Uuid::new_v4(), org, Uuid::new_v4(), None)
        .await
        .unwrap();

    // Image is attached after the snapshot; the listing reads the catalog
    let mut live: product::ActiveModel = apple.into();
    live.image_url = Set(Some("https://cdn.example.com/apple.png".into()));
    live.update(db.as_ref()).await.unwrap();

    let all = service.list_items(session.id, None).await.unwrap();
    let names: Vec<&str> = all.iter().map(|i| i.product.name.as_str()).collect();
    assert_eq!(names, vec!["Apple", "Milk", "Zucchini"]);
    assert_eq!(
        all[0].product.image_url.as_deref(),
        Some("https://cdn.example.com/apple.png")
    );

    let produce_only = service
        .list_items(session.id, Some(produce.id))
        .await
        .unwrap();
    let names: Vec<&str> = produce_only
        .iter()
        .map(|i| i.product.name.as_str())
        .collect();
    assert_eq!(names, vec!["Apple", "Zucchini"]);
}

#[tokio::test]
async fn history_returns_completed_sessions_newest_first() {
    let db = setup_db().await;
    let (service, _rx) = inventory_service(db.clone());
    let org = Uuid::new_v4();
    let cost_center = Uuid::new_v4();
    let user = Uuid::new_v4();

    let mut finished = Vec::new();
    for _ in 0..3 {
        let session = service
            .start_session(cost_center, org, user, None)
            .await
            .unwrap();
        service.finish_session(session.id, user).await.unwrap();
        finished.push(session.id);
    }
    // An open session elsewhere must not leak into this history
    service
        .start_session(Uuid::new_v4(), org, user, None)
        .await
        .unwrap();

    let history = service.history(cost_center).await.unwrap();
    assert_eq!(history.len(), 3);
    assert!(history.iter().all(|s| s.status == "completed"));
    assert_eq!(history[0].id, *finished.last().unwrap());
    let ended: Vec<_> = history.iter().map(|s| s.ended_at).collect();
    let mut sorted = ended.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(ended, sorted);
}

#[tokio::test]
async fn history_is_capped_at_the_twenty_most_recent() {
    let db = setup_db().await;
    let (service, _rx) = inventory_service(db.clone());
    let org = Uuid::new_v4();
    let cost_center = Uuid::new_v4();
    let user = Uuid::new_v4();

    let mut finished = Vec::new();
    for _ in 0..21 {
        let session = service
            .start_session(cost_center, org, user, None)
            .await
            .unwrap();
        service.finish_session(session.id, user).await.unwrap();
        finished.push(session.id);
    }

    let history = service.history(cost_center).await.unwrap();
    assert_eq!(history.len(), 20);
    assert_eq!(history[0].id, *finished.last().unwrap());
    // Only the oldest completion falls off the end
    let returned: Vec<Uuid> = history.iter().map(|s| s.id).collect();
    assert!(!returned.contains(&finished[0]));
    assert!(finished[1..].iter().all(|id| returned.contains(id)));
}
