use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        inventory::{self, Entity as Inventory},
        inventory_adjustment::{self, AdjustmentType, Entity as InventoryAdjustment},
        product::{self, Entity as Product},
        product_variant::Entity as ProductVariant,
        warehouse::{self, Entity as Warehouse},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::sequences::{next_reference, SequenceScope},
};

/// Request to start tracking a variant in a warehouse.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct StockVariantInput {
    pub product_variant_id: Uuid,
    pub warehouse_id: Uuid,
    #[validate(range(min = 0))]
    pub quantity: i32,
    /// Defaults to the variant's cost
    pub unit_cost: Option<Decimal>,
    #[validate(range(min = 0))]
    pub reorder_point: Option<i32>,
    pub bin_location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdjustQuantity {
    pub delta: i32,
    pub adjustment_type: AdjustmentType,
    pub user_id: Option<Uuid>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    /// Defaults to the inventory's current unit cost
    pub unit_cost: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateInventorySettings {
    #[validate(range(min = 0))]
    pub reorder_point: Option<i32>,
    pub bin_location: Option<String>,
}

/// Document an adjustment came from.
#[derive(Debug, Clone)]
pub struct AdjustmentSource {
    pub reference_type: String,
    pub reference_id: Uuid,
}

/// Result of replaying an inventory row's ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LedgerAudit {
    pub inventory_id: Uuid,
    pub current_quantity: i32,
    pub entries: usize,
    /// Sum of every `quantity_change`
    pub total_change: i64,
    /// Each row continues from the previous one and is internally consistent
    pub chain_intact: bool,
    /// Final `quantity_after` equals the current quantity
    pub matches_current: bool,
    /// First adjustment where the chain breaks
    pub first_break: Option<String>,
}

impl LedgerAudit {
    pub fn is_consistent(&self) -> bool {
        self.chain_intact && self.matches_current
    }
}

/// Replays `adjustments` (oldest first) from zero.
pub fn audit_chain(
    inventory_id: Uuid,
    current_quantity: i32,
    adjustments: &[inventory_adjustment::Model],
) -> LedgerAudit {
    let mut expected_before = 0i32;
    let mut total_change = 0i64;
    let mut first_break = None;

    for adj in adjustments {
        total_change += i64::from(adj.quantity_change);
        let consistent = adj.quantity_before == expected_before
            && adj.quantity_after == adj.quantity_before + adj.quantity_change;
        if !consistent && first_break.is_none() {
            first_break = Some(adj.reference_number.clone());
        }
        expected_before = adj.quantity_after;
    }

    LedgerAudit {
        inventory_id,
        current_quantity,
        entries: adjustments.len(),
        total_change,
        chain_intact: first_break.is_none(),
        matches_current: expected_before == current_quantity,
        first_break,
    }
}

/// `(q·c + qty·u) / (q + qty)` rounded to 4 dp. When there was no stock on
/// hand the incoming cost replaces the old one.
pub fn weighted_average_cost(
    prior_quantity: i32,
    prior_cost: Decimal,
    received: i32,
    received_cost: Decimal,
) -> Decimal {
    if prior_quantity <= 0 {
        return received_cost.round_dp(4);
    }
    let prior_q = Decimal::from(prior_quantity);
    let recv_q = Decimal::from(received);
    ((prior_q * prior_cost + recv_q * received_cost) / (prior_q + recv_q)).round_dp(4)
}

/// Stock ledger: every quantity change goes through here and leaves an
/// adjustment row behind.
#[derive(Clone)]
pub struct InventoryLedgerService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: EventSender,
    allow_negative_stock: bool,
}

impl InventoryLedgerService {
    pub fn new(
        db_pool: Arc<DatabaseConnection>,
        event_sender: EventSender,
        allow_negative_stock: bool,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            allow_negative_stock,
        }
    }

    #[instrument(skip(self, input))]
    pub async fn stock_variant(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        input: StockVariantInput,
    ) -> Result<(inventory::Model, Option<inventory_adjustment::Model>), ServiceError> {
        input.validate()?;
        let db = self.db_pool.as_ref();

        let variant = ProductVariant::find_by_id(input.product_variant_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| not_found_variant(input.product_variant_id))?;
        Product::find_by_id(variant.product_id)
            .filter(product::Column::StoreId.eq(store_id))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| not_found_variant(input.product_variant_id))?;
        Warehouse::find_by_id(input.warehouse_id)
            .filter(warehouse::Column::StoreId.eq(store_id))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Warehouse {} not found", input.warehouse_id))
            })?;

        let unit_cost = input.unit_cost.unwrap_or(variant.cost);
        let allow_negative = self.allow_negative_stock;

        let (row, adjustment) = db
            .transaction::<_, (inventory::Model, Option<inventory_adjustment::Model>), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let duplicate = Inventory::find()
                            .filter(inventory::Column::ProductVariantId.eq(input.product_variant_id))
                            .filter(inventory::Column::WarehouseId.eq(input.warehouse_id))
                            .one(txn)
                            .await
                            .map_err(ServiceError::db_error)?;
                        if duplicate.is_some() {
                            return Err(ServiceError::Conflict(
                                "Variant is already stocked in this warehouse".to_string(),
                            ));
                        }

                        let now = Utc::now();
                        let row = inventory::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            store_id: Set(store_id),
                            product_variant_id: Set(input.product_variant_id),
                            warehouse_id: Set(input.warehouse_id),
                            quantity: Set(0),
                            reserved_quantity: Set(0),
                            unit_cost: Set(unit_cost),
                            reorder_point: Set(input.reorder_point.unwrap_or(0)),
                            bin_location: Set(input.bin_location.clone()),
                            last_counted_at: Set(None),
                            created_at: Set(now),
                            updated_at: Set(now),
                        }
                        .insert(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                        if input.quantity == 0 {
                            return Ok((row, None));
                        }

                        let change = AdjustQuantity {
                            delta: input.quantity,
                            adjustment_type: AdjustmentType::Initial,
                            user_id: Some(user_id),
                            reason: Some("Initial stock".to_string()),
                            notes: None,
                            unit_cost: Some(unit_cost),
                        };
                        let (row, adj) =
                            apply_adjustment(txn, row, change, allow_negative, None).await?;
                        Ok((row, Some(adj)))
                    })
                },
            )
            .await
            .map_err(ServiceError::from_transaction)?;

        info!(inventory_id = %row.id, quantity = row.quantity, "variant stocked");
        if let Some(adj) = &adjustment {
            self.announce(&row, adj).await;
        }
        Ok((row, adjustment))
    }

    /// Inventory row for the variant in the warehouse, created empty if the
    /// pair is not stocked yet.
    pub async fn find_or_create<C>(
        &self,
        conn: &C,
        store_id: Uuid,
        product_variant_id: Uuid,
        warehouse_id: Uuid,
    ) -> Result<inventory::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        let existing = Inventory::find()
            .filter(inventory::Column::StoreId.eq(store_id))
            .filter(inventory::Column::ProductVariantId.eq(product_variant_id))
            .filter(inventory::Column::WarehouseId.eq(warehouse_id))
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?;
        if let Some(row) = existing {
            return Ok(row);
        }

        let now = Utc::now();
        inventory::ActiveModel {
            id: Set(Uuid::new_v4()),
            store_id: Set(store_id),
            product_variant_id: Set(product_variant_id),
            warehouse_id: Set(warehouse_id),
            quantity: Set(0),
            reserved_quantity: Set(0),
            unit_cost: Set(Decimal::ZERO),
            reorder_point: Set(0),
            bin_location: Set(None),
            last_counted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await
        .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self, change), fields(delta = change.delta, kind = %change.adjustment_type))]
    pub async fn adjust_quantity(
        &self,
        store_id: Uuid,
        inventory_id: Uuid,
        change: AdjustQuantity,
    ) -> Result<inventory_adjustment::Model, ServiceError> {
        let allow_negative = self.allow_negative_stock;

        let (row, adjustment) = self
            .db_pool
            .transaction::<_, (inventory::Model, inventory_adjustment::Model), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let row = find_scoped(txn, store_id, inventory_id).await?;
                        apply_adjustment(txn, row, change, allow_negative, None).await
                    })
                },
            )
            .await
            .map_err(ServiceError::from_transaction)?;

        self.announce(&row, &adjustment).await;
        Ok(adjustment)
    }

    /// Books `quantity` received units at `unit_cost` on an open connection
    /// and moves the weighted average cost. Purchase order receiving calls
    /// this inside its own transaction.
    pub async fn receive<C>(
        &self,
        conn: &C,
        row: inventory::Model,
        quantity: i32,
        unit_cost: Decimal,
        user_id: Uuid,
        reason: Option<String>,
        source: Option<AdjustmentSource>,
    ) -> Result<(inventory::Model, inventory_adjustment::Model), ServiceError>
    where
        C: ConnectionTrait,
    {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Received quantity must be greater than zero".to_string(),
            ));
        }

        let new_cost = weighted_average_cost(row.quantity, row.unit_cost, quantity, unit_cost);
        let change = AdjustQuantity {
            delta: quantity,
            adjustment_type: AdjustmentType::PurchaseOrder,
            user_id: Some(user_id),
            reason,
            notes: None,
            unit_cost: Some(unit_cost),
        };
        let (row, adjustment) =
            apply_adjustment(conn, row, change, self.allow_negative_stock, source).await?;

        let mut active: inventory::ActiveModel = row.into();
        active.unit_cost = Set(new_cost);
        let row = active.update(conn).await.map_err(ServiceError::db_error)?;

        Ok((row, adjustment))
    }

    pub async fn get(
        &self,
        store_id: Uuid,
        inventory_id: Uuid,
    ) -> Result<inventory::Model, ServiceError> {
        find_scoped(self.db_pool.as_ref(), store_id, inventory_id).await
    }

    /// Adjustments for a row, oldest first.
    pub async fn list_adjustments(
        &self,
        store_id: Uuid,
        inventory_id: Uuid,
    ) -> Result<Vec<inventory_adjustment::Model>, ServiceError> {
        let db = self.db_pool.as_ref();
        find_scoped(db, store_id, inventory_id).await?;

        InventoryAdjustment::find()
            .filter(inventory_adjustment::Column::StoreId.eq(store_id))
            .filter(inventory_adjustment::Column::InventoryId.eq(inventory_id))
            .order_by_asc(inventory_adjustment::Column::CreatedAt)
            .order_by_asc(inventory_adjustment::Column::ReferenceNumber)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn audit(
        &self,
        store_id: Uuid,
        inventory_id: Uuid,
    ) -> Result<LedgerAudit, ServiceError> {
        let row = self.get(store_id, inventory_id).await?;
        let adjustments = self.list_adjustments(store_id, inventory_id).await?;
        let audit = audit_chain(row.id, row.quantity, &adjustments);
        if !audit.is_consistent() {
            warn!(
                inventory_id = %row.id,
                first_break = ?audit.first_break,
                "inventory ledger does not reconcile"
            );
        }
        Ok(audit)
    }

    pub async fn low_stock(&self, store_id: Uuid) -> Result<Vec<inventory::Model>, ServiceError> {
        let rows = Inventory::find()
            .filter(inventory::Column::StoreId.eq(store_id))
            .order_by_asc(inventory::Column::CreatedAt)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;
        Ok(rows.into_iter().filter(|row| row.is_low_stock()).collect())
    }

    /// Reorder point and bin location. Quantity is left alone.
    pub async fn update_settings(
        &self,
        store_id: Uuid,
        inventory_id: Uuid,
        input: UpdateInventorySettings,
    ) -> Result<inventory::Model, ServiceError> {
        input.validate()?;
        let db = self.db_pool.as_ref();
        let row = find_scoped(db, store_id, inventory_id).await?;

        let mut active: inventory::ActiveModel = row.into();
        if let Some(reorder_point) = input.reorder_point {
            active.reorder_point = Set(reorder_point);
        }
        if let Some(bin_location) = input.bin_location {
            active.bin_location = Set(Some(bin_location).filter(|b| !b.is_empty()));
        }
        active.updated_at = Set(Utc::now());
        active.update(db).await.map_err(ServiceError::db_error)
    }

    pub(crate) async fn announce(
        &self,
        row: &inventory::Model,
        adjustment: &inventory_adjustment::Model,
    ) {
        counter!("storekeep_inventory.adjustments", 1);
        self.event_sender
            .send_or_log(Event::InventoryAdjusted {
                store_id: row.store_id,
                inventory_id: row.id,
                adjustment_id: adjustment.id,
                reference_number: adjustment.reference_number.clone(),
                quantity_before: adjustment.quantity_before,
                quantity_after: adjustment.quantity_after,
                adjustment_type: adjustment.adjustment_type.to_string(),
            })
            .await;
        if row.is_low_stock() {
            self.event_sender
                .send_or_log(Event::LowStock {
                    store_id: row.store_id,
                    inventory_id: row.id,
                    available: row.available_quantity(),
                    reorder_point: row.reorder_point,
                })
                .await;
        }
    }
}

fn not_found_variant(id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("Product variant {} not found", id))
}

async fn find_scoped<C>(
    conn: &C,
    store_id: Uuid,
    inventory_id: Uuid,
) -> Result<inventory::Model, ServiceError>
where
    C: ConnectionTrait,
{
    Inventory::find_by_id(inventory_id)
        .filter(inventory::Column::StoreId.eq(store_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Inventory {} not found", inventory_id)))
}

/// Writes the new quantity and its ledger row. The quantity update is
/// conditional on the value that was read, so a concurrent writer surfaces
/// as `ConcurrentModification` instead of a lost update.
async fn apply_adjustment<C>(
    conn: &C,
    row: inventory::Model,
    change: AdjustQuantity,
    allow_negative: bool,
    source: Option<AdjustmentSource>,
) -> Result<(inventory::Model, inventory_adjustment::Model), ServiceError>
where
    C: ConnectionTrait,
{
    if change.delta == 0 {
        return Err(ServiceError::ValidationError(
            "Adjustment quantity cannot be zero".to_string(),
        ));
    }
    if !change.adjustment_type.accepts_delta(change.delta) {
        let direction = if change.adjustment_type.is_removal() {
            "remove"
        } else {
            "add"
        };
        return Err(ServiceError::ValidationError(format!(
            "A {} adjustment can only {} stock",
            change.adjustment_type, direction
        )));
    }

    let before = row.quantity;
    let after = before
        .checked_add(change.delta)
        .ok_or_else(|| ServiceError::ValidationError("Quantity out of range".to_string()))?;
    if change.delta < 0 && after < 0 && !allow_negative {
        return Err(ServiceError::InsufficientStock(format!(
            "Only {} on hand, cannot remove {}",
            before, -change.delta
        )));
    }

    let now = Utc::now();
    let updated = Inventory::update_many()
        .col_expr(inventory::Column::Quantity, Expr::value(after))
        .col_expr(inventory::Column::UpdatedAt, Expr::value(now))
        .filter(inventory::Column::Id.eq(row.id))
        .filter(inventory::Column::Quantity.eq(before))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;
    if updated.rows_affected == 0 {
        return Err(ServiceError::ConcurrentModification(row.id));
    }

    let unit_cost = change.unit_cost.unwrap_or(row.unit_cost);
    let reference_number = next_reference(conn, row.store_id, SequenceScope::Adjustment).await?;
    let (reference_type, reference_id) = match source {
        Some(src) => (Some(src.reference_type), Some(src.reference_id)),
        None => (None, None),
    };

    let adjustment = inventory_adjustment::ActiveModel {
        id: Set(Uuid::new_v4()),
        store_id: Set(row.store_id),
        inventory_id: Set(row.id),
        user_id: Set(change.user_id),
        reference_number: Set(reference_number),
        adjustment_type: Set(change.adjustment_type),
        quantity_before: Set(before),
        quantity_change: Set(change.delta),
        quantity_after: Set(after),
        unit_cost: Set(unit_cost),
        total_cost_impact: Set(Decimal::from(change.delta) * unit_cost),
        reason: Set(change.reason),
        notes: Set(change.notes),
        reference_type: Set(reference_type),
        reference_id: Set(reference_id),
        created_at: Set(now),
    }
    .insert(conn)
    .await
    .map_err(ServiceError::db_error)?;

    info!(
        inventory_id = %row.id,
        reference = %adjustment.reference_number,
        before,
        after,
        "inventory adjusted"
    );

    let row = inventory::Model {
        quantity: after,
        updated_at: now,
        ..row
    };
    Ok((row, adjustment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn adj(reference: &str, before: i32, change: i32, after: i32) -> inventory_adjustment::Model {
        inventory_adjustment::Model {
            id: Uuid::new_v4(),
            store_id: Uuid::nil(),
            inventory_id: Uuid::nil(),
            user_id: None,
            reference_number: reference.to_string(),
            adjustment_type: AdjustmentType::Correction,
            quantity_before: before,
            quantity_change: change,
            quantity_after: after,
            unit_cost: Decimal::ZERO,
            total_cost_impact: Decimal::ZERO,
            reason: None,
            notes: None,
            reference_type: None,
            reference_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn weighted_cost_blends_old_and_new_stock() {
        assert_eq!(weighted_average_cost(10, dec!(10), 10, dec!(20)), dec!(15));
        assert_eq!(weighted_average_cost(2, dec!(1), 1, dec!(2)), dec!(1.3333));
    }

    #[test]
    fn weighted_cost_resets_when_nothing_on_hand() {
        assert_eq!(weighted_average_cost(0, dec!(99), 5, dec!(4.5)), dec!(4.5));
        assert_eq!(weighted_average_cost(-3, dec!(99), 5, dec!(4.5)), dec!(4.5));
    }

    #[test]
    fn intact_chain_reconciles() {
        let rows = vec![adj("ADJ-000001", 0, 10, 10), adj("ADJ-000002", 10, -3, 7)];
        let audit = audit_chain(Uuid::nil(), 7, &rows);
        assert!(audit.is_consistent());
        assert_eq!(audit.total_change, 7);
        assert_eq!(audit.entries, 2);
    }

    #[test]
    fn gap_in_chain_is_reported() {
        let rows = vec![adj("ADJ-000001", 0, 10, 10), adj("ADJ-000002", 12, -2, 10)];
        let audit = audit_chain(Uuid::nil(), 10, &rows);
        assert!(!audit.chain_intact);
        assert!(audit.matches_current);
        assert_eq!(audit.first_break.as_deref(), Some("ADJ-000002"));
    }

    #[test]
    fn drift_from_current_quantity_is_reported() {
        let rows = vec![adj("ADJ-000001", 0, 4, 4)];
        let audit = audit_chain(Uuid::nil(), 5, &rows);
        assert!(audit.chain_intact);
        assert!(!audit.matches_current);
    }
}
