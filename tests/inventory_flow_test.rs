mod common;

use assert_matches::assert_matches;
use common::{create_product, inventory_service, setup_db, ProductSpec};
use prato_api::{
    entities::{
        inventory_session::Entity as InventorySession,
        product::Entity as Product,
        stock_movement::{self, Entity as StockMovement},
    },
    errors::ServiceError,
    services::inventory::SessionItemView,
};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use std::time::Duration;
use uuid::Uuid;

fn item_by_name<'a>(items: &'a [SessionItemView], name: &str) -> &'a SessionItemView {
    items
        .iter()
        .find(|i| i.product.name == name)
        .unwrap_or_else(|| panic!("item {name} not found"))
}

#[tokio::test]
async fn reconciliation_applies_corrections_only_beyond_tolerance() {
    // Stocks 10, 5, 0; count p1 exactly, p2 one short, p3 not at all
    let db = setup_db().await;
    let (service, _rx) = inventory_service(db.clone());
    let org = Uuid::new_v4();
    let cost_center = Uuid::new_v4();
    let user = Uuid::new_v4();

    let p1 = create_product(
        &db,
        org,
        ProductSpec {
            name: "Flour",
            current_stock: dec!(10),
            avg_cost: Some(dec!(2.50)),
            ..Default::default()
        },
    )
    .await;
    let p2 = create_product(
        &db,
        org,
        ProductSpec {
            name: "Olive oil",
            unit: "l",
            current_stock: dec!(5),
            avg_cost: Some(dec!(30)),
            ..Default::default()
        },
    )
    .await;
    let p3 = create_product(
        &db,
        org,
        ProductSpec {
            name: "Salt",
            current_stock: dec!(0),
            ..Default::default()
        },
    )
    .await;

    let session = service
        .start_session(cost_center, org, user, None)
        .await
        .expect("start should succeed");

    let items = service.list_items(session.id, None).await.unwrap();
    assert_eq!(items.len(), 3);

    service
        .update_item_count(item_by_name(&items, "Flour").id, dec!(10))
        .await
        .unwrap();
    service
        .update_item_count(item_by_name(&items, "Olive oil").id, dec!(4))
        .await
        .unwrap();

    let summary = service.finish_session(session.id, user).await.unwrap();

    // counted: p1 and p2; correct: p1 only
    assert_eq!(summary.items_count, 2);
    assert_eq!(summary.items_correct, 1);
    assert_eq!(summary.precision, 50.0);
    assert_eq!(summary.adjustments, 1);

    // Only the discrepancy produced a movement
    let movements = StockMovement::find().all(db.as_ref()).await.unwrap();
    assert_eq!(movements.len(), 1);
    let movement = &movements[0];
    assert_eq!(movement.product_id, p2.id);
    assert_eq!(movement.movement_type, "adjustment");
    assert_eq!(movement.quantity, dec!(1));
    assert_eq!(movement.stock_before, dec!(5));
    assert_eq!(movement.stock_after, dec!(4));
    assert_eq!(movement.total_cost, dec!(30));
    assert_eq!(movement.reference_type.as_deref(), Some("inventory"));
    assert_eq!(movement.reference_id, Some(session.id));
    assert!(movement
        .notes
        .as_deref()
        .unwrap_or_default()
        .contains("-1"));

    // The count wins for p2; untouched products keep their stock
    let p1_after = Product::find_by_id(p1.id).one(db.as_ref()).await.unwrap().unwrap();
    let p2_after = Product::find_by_id(p2.id).one(db.as_ref()).await.unwrap().unwrap();
    let p3_after = Product::find_by_id(p3.id).one(db.as_ref()).await.unwrap().unwrap();
    assert_eq!(p1_after.current_stock, dec!(10));
    assert_eq!(p2_after.current_stock, dec!(4));
    assert_eq!(p3_after.current_stock, dec!(0));
}

#[tokio::test]
async fn finishing_without_counts_completes_with_zero_precision() {
    let db = setup_db().await;
    let (service, _rx) = inventory_service(db.clone());
    let org = Uuid::new_v4();
    let cost_center = Uuid::new_v4();
    let user = Uuid::new_v4();

    create_product(
        &db,
        org,
        ProductSpec {
            name: "Butter",
            current_stock: dec!(3),
            ..Default::default()
        },
    )
    .await;

    let session = service
        .start_session(cost_center, org, user, None)
        .await
        .unwrap();
    let summary = service.finish_session(session.id, user).await.unwrap();

    assert_eq!(summary.precision, 0.0);
    assert_eq!(summary.items_count, 0);
    assert_eq!(summary.adjustments, 0);

    let movements = StockMovement::find().all(db.as_ref()).await.unwrap();
    assert!(movements.is_empty());

    let completed = service.history(cost_center).await.unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].status, "completed");
    assert!(completed[0].ended_at.is_some());
}

#[tokio::test]
async fn difference_of_exactly_the_tolerance_is_incorrect_but_unadjusted() {
    // Boundary: |difference| == 0.001 fails the correctness check (strict <)
    // yet does not cross the movement threshold (strict >)
    let db = setup_db().await;
    let (service, _rx) = inventory_service(db.clone());
    let org = Uuid::new_v4();
    let user = Uuid::new_v4();

    let product = create_product(
        &db,
        org,
        ProductSpec {
            name: "Saffron",
            unit: "g",
            current_stock: dec!(10),
            ..Default::default()
        },
    )
    .await;

    let session = service
        .start_session(Uuid::new_v4(), org, user, None)
        .await
        .unwrap();
    let items = service.list_items(session.id, None).await.unwrap();

    let updated = service
        .update_item_count(items[0].id, dec!(10.001))
        .await
        .unwrap();
    assert_eq!(updated.difference, dec!(0.001));
    assert!(!updated.is_correct);

    let summary = service.finish_session(session.id, user).await.unwrap();
    assert_eq!(summary.precision, 0.0);
    assert_eq!(summary.adjustments, 0);

    let movements = StockMovement::find()
        .filter(stock_movement::Column::ProductId.eq(product.id))
        .all(db.as_ref())
        .await
        .unwrap();
    assert!(movements.is_empty());

    let after = Product::find_by_id(product.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after.current_stock, dec!(10));
}

#[tokio::test]
async fn repeated_counts_are_last_write_wins() {
    let db = setup_db().await;
    let (service, _rx) = inventory_service(db.clone());
    let org = Uuid::new_v4();
    let user = Uuid::new_v4();

    create_product(
        &db,
        org,
        ProductSpec {
            name: "Rice",
            current_stock: dec!(20),
            ..Default::default()
        },
    )
    .await;

    let session = service
        .start_session(Uuid::new_v4(), org, user, None)
        .await
        .unwrap();
    let items = service.list_items(session.id, None).await.unwrap();

    service.update_item_count(items[0].id, dec!(18)).await.unwrap();
    let second = service.update_item_count(items[0].id, dec!(20)).await.unwrap();

    assert_eq!(second.counted_quantity, Some(dec!(20)));
    assert_eq!(second.difference, dec!(0));
    assert!(second.is_correct);
}

#[tokio::test]
async fn negative_counts_are_rejected() {
    let db = setup_db().await;
    let (service, _rx) = inventory_service(db.clone());
    let org = Uuid::new_v4();
    let user = Uuid::new_v4();

    create_product(
        &db,
        org,
        ProductSpec {
            name: "Sugar",
            current_stock: dec!(5),
            ..Default::default()
        },
    )
    .await;

    let session = service
        .start_session(Uuid::new_v4(), org, user, None)
        .await
        .unwrap();
    let items = service.list_items(session.id, None).await.unwrap();

    let err = service
        .update_item_count(items[0].id, dec!(-1))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn counting_a_missing_item_is_not_found() {
    let db = setup_db().await;
    let (service, _rx) = inventory_service(db.clone());

    let err = service
        .update_item_count(Uuid::new_v4(), dec!(1))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn items_become_read_only_after_completion() {
    let db = setup_db().await;
    let (service, _rx) = inventory_service(db.clone());
    let org = Uuid::new_v4();
    let user = Uuid::new_v4();

    create_product(
        &db,
        org,
        ProductSpec {
            name: "Basil",
            current_stock: dec!(2),
            ..Default::default()
        },
    )
    .await;

    let session = service
        .start_session(Uuid::new_v4(), org, user, None)
        .await
        .unwrap();
    let items = service.list_items(session.id, None).await.unwrap();
    service.finish_session(session.id, user).await.unwrap();

    let err = service
        .update_item_count(items[0].id, dec!(2))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));
}

#[tokio::test]
async fn finish_budget_overrun_rolls_back_and_leaves_the_session_open() {
    let db = setup_db().await;
    let (service, _rx) = inventory_service(db.clone());
    let org = Uuid::new_v4();
    let cost_center = Uuid::new_v4();
    let user = Uuid::new_v4();

    let product = create_product(
        &db,
        org,
        ProductSpec {
            name: "Honey",
            current_stock: dec!(6),
            avg_cost: Some(dec!(12)),
            ..Default::default()
        },
    )
    .await;

    let session = service
        .start_session(cost_center, org, user, None)
        .await
        .unwrap();
    let items = service.list_items(session.id, None).await.unwrap();
    service.update_item_count(items[0].id, dec!(4)).await.unwrap();

    // A zero execution budget cannot fit any transaction
    let strict = service.clone().with_finish_timeout(Duration::ZERO);
    let err = strict.finish_session(session.id, user).await.unwrap_err();
    assert_matches!(err, ServiceError::InternalError(_));

    // Nothing committed: session still open, count retained, stock untouched
    let reloaded = InventorySession::find_by_id(session.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.status, "open");
    assert!(reloaded.ended_at.is_none());

    let items = service.list_items(session.id, None).await.unwrap();
    assert_eq!(items[0].counted_quantity, Some(dec!(4)));

    let movements = StockMovement::find().all(db.as_ref()).await.unwrap();
    assert!(movements.is_empty());
    let live = Product::find_by_id(product.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(live.current_stock, dec!(6));

    // With a normal budget the same session reconciles cleanly
    let summary = service.finish_session(session.id, user).await.unwrap();
    assert_eq!(summary.adjustments, 1);
    let live = Product::find_by_id(product.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(live.current_stock, dec!(4));
}

#[tokio::test]
async fn committed_finish_survives_a_dead_event_listener() {
    let db = setup_db().await;
    let (service, rx) = inventory_service(db.clone());
    let org = Uuid::new_v4();
    let cost_center = Uuid::new_v4();
    let user = Uuid::new_v4();

    create_product(
        &db,
        org,
        ProductSpec {
            name: "Cinnamon",
            current_stock: dec!(1),
            ..Default::default()
        },
    )
    .await;

    let session = service
        .start_session(cost_center, org, user, None)
        .await
        .unwrap();
    let items = service.list_items(session.id, None).await.unwrap();
    service.update_item_count(items[0].id, dec!(1)).await.unwrap();

    // Listener goes away after the counts are in; the reconciliation is
    // durable once committed and must not surface as an error
    drop(rx);

    let summary = service.finish_session(session.id, user).await.unwrap();
    assert_eq!(summary.precision, 100.0);

    let reloaded = InventorySession::find_by_id(session.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.status, "completed");
}

#[tokio::test]
async fn finishing_twice_is_an_invalid_state() {
    let db = setup_db().await;
    let (service, _rx) = inventory_service(db.clone());
    let org = Uuid::new_v4();
    let cost_center = Uuid::new_v4();
    let user = Uuid::new_v4();

    let session = service
        .start_session(cost_center, org, user, None)
        .await
        .unwrap();
    service.finish_session(session.id, user).await.unwrap();

    let err = service.finish_session(session.id, user).await.unwrap_err();
    assert_matches!(err, ServiceError::InvalidState(_));
}

#[tokio::test]
async fn finishing_a_missing_session_is_not_found() {
    let db = setup_db().await;
    let (service, _rx) = inventory_service(db.clone());

    let err = service
        .finish_session(Uuid::new_v4(), Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}
