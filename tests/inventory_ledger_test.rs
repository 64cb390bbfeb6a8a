mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use storekeep_api::{
    entities::inventory_adjustment::AdjustmentType,
    errors::ServiceError,
    services::inventory_ledger::{AdjustQuantity, StockVariantInput, UpdateInventorySettings},
};
use uuid::Uuid;

fn change(delta: i32, kind: AdjustmentType) -> AdjustQuantity {
    AdjustQuantity {
        delta,
        adjustment_type: kind,
        user_id: None,
        reason: None,
        notes: None,
        unit_cost: None,
    }
}

async fn stocked(app: &TestApp, quantity: i32) -> storekeep_api::entities::inventory::Model {
    let (row, _) = app
        .state
        .services
        .inventory
        .stock_variant(
            app.store_id,
            app.user_id,
            StockVariantInput {
                product_variant_id: app.variant_id,
                warehouse_id: app.warehouse_id,
                quantity,
                unit_cost: None,
                reorder_point: Some(2),
                bin_location: Some("A-1".to_string()),
            },
        )
        .await
        .expect("stock variant");
    row
}

#[tokio::test]
async fn opening_stock_is_booked_as_initial_adjustment() {
    let app = TestApp::new().await;
    let (row, adjustment) = app
        .state
        .services
        .inventory
        .stock_variant(
            app.store_id,
            app.user_id,
            StockVariantInput {
                product_variant_id: app.variant_id,
                warehouse_id: app.warehouse_id,
                quantity: 12,
                unit_cost: None,
                reorder_point: None,
                bin_location: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(row.quantity, 12);
    assert_eq!(row.unit_cost, dec!(20));
    let adjustment = adjustment.expect("opening adjustment");
    assert_eq!(adjustment.adjustment_type, AdjustmentType::Initial);
    assert_eq!(adjustment.quantity_before, 0);
    assert_eq!(adjustment.quantity_after, 12);
    assert_eq!(adjustment.reference_number, "ADJ-000001");
}

#[tokio::test]
async fn stocking_the_same_variant_twice_conflicts() {
    let app = TestApp::new().await;
    stocked(&app, 1).await;

    let err = app
        .state
        .services
        .inventory
        .stock_variant(
            app.store_id,
            app.user_id,
            StockVariantInput {
                product_variant_id: app.variant_id,
                warehouse_id: app.warehouse_id,
                quantity: 0,
                unit_cost: None,
                reorder_point: None,
                bin_location: None,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));
}

#[tokio::test]
async fn adjustments_chain_and_audit_reconciles() {
    let app = TestApp::new().await;
    let row = stocked(&app, 10).await;
    let ledger = &app.state.services.inventory;

    let sale = ledger
        .adjust_quantity(app.store_id, row.id, change(-3, AdjustmentType::Sale))
        .await
        .unwrap();
    assert_eq!((sale.quantity_before, sale.quantity_after), (10, 7));
    assert_eq!(sale.total_cost_impact, dec!(-60));

    let correction = ledger
        .adjust_quantity(app.store_id, row.id, change(5, AdjustmentType::Correction))
        .await
        .unwrap();
    assert_eq!((correction.quantity_before, correction.quantity_after), (7, 12));

    let history = ledger.list_adjustments(app.store_id, row.id).await.unwrap();
    let references: Vec<_> = history.iter().map(|a| a.reference_number.as_str()).collect();
    assert_eq!(references, vec!["ADJ-000001", "ADJ-000002", "ADJ-000003"]);

    let audit = ledger.audit(app.store_id, row.id).await.unwrap();
    assert!(audit.is_consistent());
    assert_eq!(audit.entries, 3);
    assert_eq!(audit.total_change, 12);
    assert_eq!(audit.current_quantity, 12);
}

#[tokio::test]
async fn removal_below_zero_is_refused() {
    let app = TestApp::new().await;
    let row = stocked(&app, 2).await;
    let ledger = &app.state.services.inventory;

    let err = ledger
        .adjust_quantity(app.store_id, row.id, change(-5, AdjustmentType::Damaged))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));

    let after = ledger.get(app.store_id, row.id).await.unwrap();
    assert_eq!(after.quantity, 2);
    assert_eq!(ledger.list_adjustments(app.store_id, row.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn direction_must_match_adjustment_type() {
    let app = TestApp::new().await;
    let row = stocked(&app, 4).await;
    let ledger = &app.state.services.inventory;

    let err = ledger
        .adjust_quantity(app.store_id, row.id, change(2, AdjustmentType::Sale))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let err = ledger
        .adjust_quantity(app.store_id, row.id, change(0, AdjustmentType::Correction))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn low_stock_uses_reorder_point() {
    let app = TestApp::new().await;
    let row = stocked(&app, 5).await;
    let ledger = &app.state.services.inventory;
    assert!(ledger.low_stock(app.store_id).await.unwrap().is_empty());

    ledger
        .update_settings(
            app.store_id,
            row.id,
            UpdateInventorySettings {
                reorder_point: Some(5),
                bin_location: None,
            },
        )
        .await
        .unwrap();
    let low = ledger.low_stock(app.store_id).await.unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].bin_location.as_deref(), Some("A-1"));
}

#[tokio::test]
async fn other_stores_cannot_see_the_row() {
    let app = TestApp::new().await;
    let row = stocked(&app, 1).await;

    let err = app
        .state
        .services
        .inventory
        .get(Uuid::new_v4(), row.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}
