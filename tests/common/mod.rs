#![allow(dead_code)]

use chrono::Utc;
use prato_api::{
    db::{establish_connection_with_config, run_migrations, DbConfig, DbPool},
    entities::{product, product_category},
    events::{Event, EventSender},
    services::inventory::InventoryService,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Private in-memory SQLite with a single pooled connection, migrated
pub async fn setup_db() -> Arc<DbPool> {
    let config = DbConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        ..Default::default()
    };
    let db = establish_connection_with_config(&config)
        .await
        .expect("Failed to create DB pool");
    run_migrations(&db).await.expect("Failed to run migrations");
    Arc::new(db)
}

/// Inventory service wired to a drained-on-demand event channel. Keep the
/// receiver alive for the duration of the test or sends will fail.
pub fn inventory_service(db: Arc<DbPool>) -> (InventoryService, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(256);
    (InventoryService::new(db, EventSender::new(tx)), rx)
}

pub async fn create_category(
    db: &DbPool,
    organization_id: Uuid,
    name: &str,
) -> product_category::Model {
    let category = product_category::ActiveModel {
        id: Set(Uuid::new_v4()),
        organization_id: Set(organization_id),
        name: Set(name.to_string()),
    };
    category
        .insert(db)
        .await
        .expect("Failed to create category")
}

pub struct ProductSpec<'a> {
    pub name: &'a str,
    pub unit: &'a str,
    pub current_stock: Decimal,
    pub avg_cost: Option<Decimal>,
    pub category_id: Option<Uuid>,
    pub is_active: bool,
}

impl Default for ProductSpec<'_> {
    fn default() -> Self {
        Self {
            name: "Tomato",
            unit: "kg",
            current_stock: Decimal::ZERO,
            avg_cost: None,
            category_id: None,
            is_active: true,
        }
    }
}

pub async fn create_product(
    db: &DbPool,
    organization_id: Uuid,
    spec: ProductSpec<'_>,
) -> product::Model {
    let now = Utc::now();
    let model = product::ActiveModel {
        id: Set(Uuid::new_v4()),
        organization_id: Set(organization_id),
        name: Set(spec.name.to_string()),
        category_id: Set(spec.category_id),
        base_unit: Set(spec.unit.to_string()),
        avg_cost: Set(spec.avg_cost),
        current_stock: Set(spec.current_stock),
        image_url: Set(None),
        is_active: Set(spec.is_active),
        created_at: Set(now),
        updated_at: Set(now),
    };
    model.insert(db).await.expect("Failed to create product")
}
