use chrono::{NaiveDate, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    entities::{
        inventory, inventory_adjustment,
        product::{self, Entity as Product},
        product_variant::Entity as ProductVariant,
        purchase_order::{self, Entity as PurchaseOrder, PurchaseOrderAction, PurchaseOrderStatus},
        purchase_order_item::{self, Entity as PurchaseOrderItem},
        purchase_order_receipt::{self, Entity as PurchaseOrderReceipt},
        purchase_order_receipt_item::{self, Entity as PurchaseOrderReceiptItem},
        vendor::{self, Entity as Vendor},
        warehouse::{self, Entity as Warehouse},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        activity::ActivityEntry,
        inventory_ledger::{AdjustmentSource, InventoryLedgerService},
        sequences::{next_reference, SequenceScope},
    },
};

const SUBJECT: &str = "purchase_order";

fn validate_percent(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO || *value > Decimal::ONE_HUNDRED {
        return Err(ValidationError::new("percent_out_of_range"));
    }
    Ok(())
}

fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("negative_amount"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct PurchaseOrderLineInput {
    pub product_variant_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity_ordered: i32,
    #[validate(custom = "validate_non_negative")]
    pub unit_cost: Decimal,
    /// Percent, 0 to 100
    #[validate(custom = "validate_percent")]
    pub discount_percent: Option<Decimal>,
    /// Percent
    #[validate(custom = "validate_non_negative")]
    pub tax_rate: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreatePurchaseOrder {
    pub vendor_id: Uuid,
    pub warehouse_id: Uuid,
    pub expected_date: Option<NaiveDate>,
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<PurchaseOrderLineInput>,
}

/// Draft edits. `items`, when present, replaces every line.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdatePurchaseOrder {
    pub vendor_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub expected_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub items: Option<Vec<PurchaseOrderLineInput>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReceiveLine {
    pub purchase_order_item_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReceiveInput {
    pub lines: Vec<ReceiveLine>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PurchaseOrderDetail {
    pub purchase_order: purchase_order::Model,
    pub items: Vec<purchase_order_item::Model>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReceiptDetail {
    pub receipt: purchase_order_receipt::Model,
    pub items: Vec<purchase_order_receipt_item::Model>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReceiveOutcome {
    pub purchase_order: purchase_order::Model,
    pub receipt: ReceiptDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PurchaseOrderProgress {
    pub ordered: i64,
    pub received: i64,
    pub remaining: i64,
    /// Received share of ordered units, 0 to 100
    pub percent: Decimal,
}

/// Money breakdown of one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmounts {
    pub gross: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// `qty × cost × (1 - discount%) × (1 + tax%)`; the total is rounded to 2 dp.
pub fn line_amounts(
    quantity: i32,
    unit_cost: Decimal,
    discount_percent: Decimal,
    tax_rate: Decimal,
) -> LineAmounts {
    let gross = Decimal::from(quantity) * unit_cost;
    let discount = gross * discount_percent / Decimal::ONE_HUNDRED;
    let net = gross - discount;
    let tax = net * tax_rate / Decimal::ONE_HUNDRED;
    LineAmounts {
        gross: gross.round_dp(2),
        discount: discount.round_dp(2),
        tax: tax.round_dp(2),
        total: (net + tax).round_dp(2),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderTotals {
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
}

pub fn header_totals<'a>(lines: impl IntoIterator<Item = &'a LineAmounts>) -> HeaderTotals {
    lines.into_iter().fold(HeaderTotals::default(), |acc, l| HeaderTotals {
        subtotal: acc.subtotal + l.gross,
        discount_total: acc.discount_total + l.discount,
        tax_total: acc.tax_total + l.tax,
        total: acc.total + l.total,
    })
}

/// Quantities actually received per item: each request is clamped to what
/// is still outstanding and non-positive results are dropped.
pub fn plan_receipt(
    items: &[purchase_order_item::Model],
    lines: &[ReceiveLine],
) -> Result<Vec<(purchase_order_item::Model, i32)>, ServiceError> {
    let mut remaining: HashMap<Uuid, i32> =
        items.iter().map(|item| (item.id, item.remaining())).collect();
    let mut plan = Vec::new();

    for line in lines {
        let item = items
            .iter()
            .find(|item| item.id == line.purchase_order_item_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Purchase order item {} not found",
                    line.purchase_order_item_id
                ))
            })?;
        let left = remaining.entry(item.id).or_insert(0);
        let quantity = line.quantity.min(*left);
        if quantity <= 0 {
            continue;
        }
        *left -= quantity;
        plan.push((item.clone(), quantity));
    }

    if plan.is_empty() {
        return Err(ServiceError::ValidationError(
            "Nothing to receive: every line is already fully received or has no quantity"
                .to_string(),
        ));
    }
    Ok(plan)
}

/// Status after a receipt, derived from the items.
pub fn status_after_receipt(items: &[purchase_order_item::Model]) -> PurchaseOrderStatus {
    if items.iter().all(|item| item.is_fully_received()) {
        PurchaseOrderStatus::Received
    } else if items.iter().any(|item| item.quantity_received > 0) {
        PurchaseOrderStatus::PartiallyReceived
    } else {
        PurchaseOrderStatus::Approved
    }
}

type ReceiptCommit = (
    ReceiveOutcome,
    Vec<(inventory::Model, inventory_adjustment::Model)>,
    PurchaseOrderStatus,
);

#[derive(Clone)]
pub struct PurchaseOrderService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: EventSender,
    ledger: InventoryLedgerService,
}

impl PurchaseOrderService {
    pub fn new(
        db_pool: Arc<DatabaseConnection>,
        event_sender: EventSender,
        ledger: InventoryLedgerService,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            ledger,
        }
    }

    #[instrument(skip(self, input))]
    pub async fn create(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        input: CreatePurchaseOrder,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        input.validate()?;
        for line in &input.items {
            line.validate()?;
        }

        let detail = self
            .db_pool
            .transaction::<_, PurchaseOrderDetail, ServiceError>(move |txn| {
                Box::pin(async move {
                    ensure_vendor(txn, store_id, input.vendor_id).await?;
                    ensure_warehouse(txn, store_id, input.warehouse_id).await?;
                    for line in &input.items {
                        ensure_variant(txn, store_id, line.product_variant_id).await?;
                    }

                    let now = Utc::now();
                    let po_number =
                        next_reference(txn, store_id, SequenceScope::PurchaseOrder).await?;
                    let header = purchase_order::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        store_id: Set(store_id),
                        vendor_id: Set(input.vendor_id),
                        warehouse_id: Set(input.warehouse_id),
                        po_number: Set(po_number),
                        status: Set(PurchaseOrderStatus::Draft),
                        expected_date: Set(input.expected_date),
                        subtotal: Set(Decimal::ZERO),
                        discount_total: Set(Decimal::ZERO),
                        tax_total: Set(Decimal::ZERO),
                        total: Set(Decimal::ZERO),
                        notes: Set(input.notes),
                        cancel_reason: Set(None),
                        created_by: Set(user_id),
                        approved_by: Set(None),
                        submitted_at: Set(None),
                        approved_at: Set(None),
                        cancelled_at: Set(None),
                        closed_at: Set(None),
                        version: Set(1),
                        created_at: Set(now),
                        updated_at: Set(now),
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                    let (items, totals) = replace_items(txn, header.id, input.items).await?;
                    let mut active: purchase_order::ActiveModel = header.into();
                    apply_totals(&mut active, totals);
                    let purchase_order = active.update(txn).await.map_err(ServiceError::db_error)?;

                    Ok(PurchaseOrderDetail {
                        purchase_order,
                        items,
                    })
                })
            })
            .await
            .map_err(ServiceError::from_transaction)?;

        info!(
            purchase_order_id = %detail.purchase_order.id,
            number = %detail.purchase_order.po_number,
            "purchase order created"
        );
        self.event_sender
            .send_or_log(Event::PurchaseOrderCreated {
                store_id,
                purchase_order_id: detail.purchase_order.id,
            })
            .await;
        Ok(detail)
    }

    pub async fn update(
        &self,
        store_id: Uuid,
        id: Uuid,
        input: UpdatePurchaseOrder,
    ) -> Result<PurchaseOrderDetail, ServiceError> {
        if let Some(lines) = &input.items {
            for line in lines {
                line.validate()?;
            }
        }

        self.db_pool
            .transaction::<_, PurchaseOrderDetail, ServiceError>(move |txn| {
                Box::pin(async move {
                    let current = find_scoped(txn, store_id, id).await?;
                    ensure_permits(&current, PurchaseOrderAction::Edit)?;

                    let mut active = purchase_order::ActiveModel {
                        updated_at: Set(Utc::now()),
                        ..Default::default()
                    };
                    if let Some(vendor_id) = input.vendor_id {
                        ensure_vendor(txn, store_id, vendor_id).await?;
                        active.vendor_id = Set(vendor_id);
                    }
                    if let Some(warehouse_id) = input.warehouse_id {
                        ensure_warehouse(txn, store_id, warehouse_id).await?;
                        active.warehouse_id = Set(warehouse_id);
                    }
                    if input.expected_date.is_some() {
                        active.expected_date = Set(input.expected_date);
                    }
                    if input.notes.is_some() {
                        active.notes = Set(input.notes);
                    }
                    if let Some(lines) = input.items {
                        for line in &lines {
                            ensure_variant(txn, store_id, line.product_variant_id).await?;
                        }
                        PurchaseOrderItem::delete_many()
                            .filter(purchase_order_item::Column::PurchaseOrderId.eq(current.id))
                            .exec(txn)
                            .await
                            .map_err(ServiceError::db_error)?;
                        let (_, totals) = replace_items(txn, current.id, lines).await?;
                        apply_totals(&mut active, totals);
                    }

                    let purchase_order = update_versioned(txn, &current, active).await?;
                    let items = items_of(txn, purchase_order.id).await?;
                    Ok(PurchaseOrderDetail {
                        purchase_order,
                        items,
                    })
                })
            })
            .await
            .map_err(ServiceError::from_transaction)
    }

    pub async fn delete(&self, store_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        self.db_pool
            .transaction::<_, (), ServiceError>(move |txn| {
                Box::pin(async move {
                    let current = find_scoped(txn, store_id, id).await?;
                    ensure_permits(&current, PurchaseOrderAction::Delete)?;
                    PurchaseOrderItem::delete_many()
                        .filter(purchase_order_item::Column::PurchaseOrderId.eq(current.id))
                        .exec(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                    current.delete(txn).await.map_err(ServiceError::db_error)?;
                    Ok(())
                })
            })
            .await
            .map_err(ServiceError::from_transaction)?;
        info!(purchase_order_id = %id, "draft purchase order deleted");
        Ok(())
    }

    pub async fn submit(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<purchase_order::Model, ServiceError> {
        self.header_transition(
            store_id,
            user_id,
            id,
            PurchaseOrderAction::Submit,
            None,
            |active, now| active.submitted_at = Set(Some(now)),
        )
        .await
    }

    pub async fn approve(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<purchase_order::Model, ServiceError> {
        self.header_transition(
            store_id,
            user_id,
            id,
            PurchaseOrderAction::Approve,
            None,
            move |active, now| {
                active.approved_by = Set(Some(user_id));
                active.approved_at = Set(Some(now));
            },
        )
        .await
    }

    pub async fn cancel(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<purchase_order::Model, ServiceError> {
        let stored_reason = reason.clone();
        self.header_transition(
            store_id,
            user_id,
            id,
            PurchaseOrderAction::Cancel,
            reason,
            move |active, now| {
                active.cancel_reason = Set(stored_reason);
                active.cancelled_at = Set(Some(now));
            },
        )
        .await
    }

    pub async fn close(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<purchase_order::Model, ServiceError> {
        self.header_transition(
            store_id,
            user_id,
            id,
            PurchaseOrderAction::Close,
            None,
            |active, now| active.closed_at = Set(Some(now)),
        )
        .await
    }

    /// Receives goods against an approved order. All lines land in one
    /// database transaction; any failure leaves nothing behind.
    #[instrument(skip(self, input), fields(lines = input.lines.len()))]
    pub async fn receive(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
        input: ReceiveInput,
    ) -> Result<ReceiveOutcome, ServiceError> {
        let ledger = self.ledger.clone();

        let (outcome, adjustments, previous_status) = self
            .db_pool
            .transaction::<_, ReceiptCommit, ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let current = find_scoped(txn, store_id, id).await?;
                        ensure_permits(&current, PurchaseOrderAction::Receive)?;

                        let items = items_of(txn, current.id).await?;
                        let plan = plan_receipt(&items, &input.lines)?;

                        let now = Utc::now();
                        let receipt_number =
                            next_reference(txn, store_id, SequenceScope::Receipt).await?;
                        let receipt = purchase_order_receipt::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            store_id: Set(store_id),
                            purchase_order_id: Set(current.id),
                            receipt_number: Set(receipt_number),
                            received_by: Set(user_id),
                            notes: Set(input.notes),
                            received_at: Set(now),
                        }
                        .insert(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                        // Running totals: one receipt may carry several lines for an item.
                        let mut received: HashMap<Uuid, i32> = items
                            .iter()
                            .map(|item| (item.id, item.quantity_received))
                            .collect();
                        let mut receipt_items = Vec::with_capacity(plan.len());
                        let mut adjustments = Vec::with_capacity(plan.len());
                        for (item, quantity) in plan {
                            let received_total = {
                                let total =
                                    received.entry(item.id).or_insert(item.quantity_received);
                                *total += quantity;
                                *total
                            };
                            let mut active_item: purchase_order_item::ActiveModel =
                                item.clone().into();
                            active_item.quantity_received = Set(received_total);
                            active_item.update(txn).await.map_err(ServiceError::db_error)?;

                            let stock = ledger
                                .find_or_create(
                                    txn,
                                    store_id,
                                    item.product_variant_id,
                                    current.warehouse_id,
                                )
                                .await?;
                            let (stock, adjustment) = ledger
                                .receive(
                                    txn,
                                    stock,
                                    quantity,
                                    item.unit_cost,
                                    user_id,
                                    Some(format!("Received on {}", current.po_number)),
                                    Some(AdjustmentSource {
                                        reference_type: SUBJECT.to_string(),
                                        reference_id: current.id,
                                    }),
                                )
                                .await?;

                            let receipt_item = purchase_order_receipt_item::ActiveModel {
                                id: Set(Uuid::new_v4()),
                                receipt_id: Set(receipt.id),
                                purchase_order_item_id: Set(item.id),
                                inventory_adjustment_id: Set(adjustment.id),
                                quantity_received: Set(quantity),
                                unit_cost: Set(item.unit_cost),
                            }
                            .insert(txn)
                            .await
                            .map_err(ServiceError::db_error)?;

                            receipt_items.push(receipt_item);
                            adjustments.push((stock, adjustment));
                        }

                        let items = items_of(txn, current.id).await?;
                        let next = status_after_receipt(&items);
                        let purchase_order = update_versioned(
                            txn,
                            &current,
                            purchase_order::ActiveModel {
                                status: Set(next),
                                updated_at: Set(now),
                                ..Default::default()
                            },
                        )
                        .await?;

                        let units: i32 = receipt_items.iter().map(|r| r.quantity_received).sum();
                        ActivityEntry::new(store_id, SUBJECT, current.id, "receive")
                            .status_change(current.status, next)
                            .by(user_id)
                            .describe(Some(format!(
                                "{}: {} units",
                                receipt.receipt_number, units
                            )))
                            .record(txn)
                            .await?;

                        Ok((
                            ReceiveOutcome {
                                purchase_order,
                                receipt: ReceiptDetail {
                                    receipt,
                                    items: receipt_items,
                                },
                            },
                            adjustments,
                            current.status,
                        ))
                    })
                },
            )
            .await
            .map_err(ServiceError::from_transaction)?;

        let units: i32 = outcome
            .receipt
            .items
            .iter()
            .map(|r| r.quantity_received)
            .sum();
        counter!("storekeep_purchase_orders.receipts", 1);
        info!(
            purchase_order_id = %outcome.purchase_order.id,
            receipt = %outcome.receipt.receipt.receipt_number,
            units,
            status = %outcome.purchase_order.status,
            "purchase order received"
        );

        for (stock, adjustment) in &adjustments {
            self.ledger.announce(stock, adjustment).await;
        }
        self.event_sender
            .send_or_log(Event::PurchaseOrderReceived {
                store_id,
                purchase_order_id: outcome.purchase_order.id,
                receipt_id: outcome.receipt.receipt.id,
                units,
            })
            .await;
        if previous_status != outcome.purchase_order.status {
            self.event_sender
                .send_or_log(Event::PurchaseOrderStatusChanged {
                    store_id,
                    purchase_order_id: outcome.purchase_order.id,
                    from: previous_status,
                    to: outcome.purchase_order.status,
                })
                .await;
        }
        Ok(outcome)
    }

    pub async fn progress(
        &self,
        store_id: Uuid,
        id: Uuid,
    ) -> Result<PurchaseOrderProgress, ServiceError> {
        let detail = self.get(store_id, id).await?;
        Ok(progress_of(&detail.items))
    }

    pub async fn get(&self, store_id: Uuid, id: Uuid) -> Result<PurchaseOrderDetail, ServiceError> {
        let db = self.db_pool.as_ref();
        let purchase_order = find_scoped(db, store_id, id).await?;
        let items = items_of(db, purchase_order.id).await?;
        Ok(PurchaseOrderDetail {
            purchase_order,
            items,
        })
    }

    pub async fn list(
        &self,
        store_id: Uuid,
        status: Option<PurchaseOrderStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<purchase_order::Model>, u64), ServiceError> {
        let mut query =
            PurchaseOrder::find().filter(purchase_order::Column::StoreId.eq(store_id));
        if let Some(status) = status {
            query = query.filter(purchase_order::Column::Status.eq(status));
        }
        let paginator = query
            .order_by_desc(purchase_order::Column::CreatedAt)
            .paginate(self.db_pool.as_ref(), per_page);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let rows = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;
        Ok((rows, total))
    }

    pub async fn receipts(
        &self,
        store_id: Uuid,
        id: Uuid,
    ) -> Result<Vec<ReceiptDetail>, ServiceError> {
        let db = self.db_pool.as_ref();
        let purchase_order = find_scoped(db, store_id, id).await?;
        let receipts = PurchaseOrderReceipt::find()
            .filter(purchase_order_receipt::Column::PurchaseOrderId.eq(purchase_order.id))
            .order_by_asc(purchase_order_receipt::Column::ReceivedAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut out = Vec::with_capacity(receipts.len());
        for receipt in receipts {
            let items = PurchaseOrderReceiptItem::find()
                .filter(purchase_order_receipt_item::Column::ReceiptId.eq(receipt.id))
                .all(db)
                .await
                .map_err(ServiceError::db_error)?;
            out.push(ReceiptDetail { receipt, items });
        }
        Ok(out)
    }

    async fn header_transition<F>(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
        action: PurchaseOrderAction,
        description: Option<String>,
        stamp: F,
    ) -> Result<purchase_order::Model, ServiceError>
    where
        F: FnOnce(&mut purchase_order::ActiveModel, chrono::DateTime<Utc>) + Send + 'static,
    {
        let (before, after) = self
            .db_pool
            .transaction::<_, (purchase_order::Model, purchase_order::Model), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let current = find_scoped(txn, store_id, id).await?;
                        let next = current.status.next(action).ok_or_else(|| {
                            ServiceError::InvalidOperation(current.status.refusal(action))
                        })?;

                        if action == PurchaseOrderAction::Submit
                            && items_of(txn, current.id).await?.is_empty()
                        {
                            return Err(ServiceError::ValidationError(
                                "A purchase order needs at least one item before it is submitted"
                                    .to_string(),
                            ));
                        }

                        let now = Utc::now();
                        let mut active = purchase_order::ActiveModel {
                            status: Set(next),
                            updated_at: Set(now),
                            ..Default::default()
                        };
                        stamp(&mut active, now);
                        let updated = update_versioned(txn, &current, active).await?;

                        ActivityEntry::new(store_id, SUBJECT, id, action.to_string())
                            .status_change(current.status, next)
                            .by(user_id)
                            .describe(description)
                            .record(txn)
                            .await?;
                        Ok((current, updated))
                    })
                },
            )
            .await
            .map_err(ServiceError::from_transaction)?;

        info!(
            purchase_order_id = %after.id,
            %action,
            from = %before.status,
            to = %after.status,
            "purchase order status changed"
        );
        self.event_sender
            .send_or_log(Event::PurchaseOrderStatusChanged {
                store_id,
                purchase_order_id: after.id,
                from: before.status,
                to: after.status,
            })
            .await;
        Ok(after)
    }
}

pub fn progress_of(items: &[purchase_order_item::Model]) -> PurchaseOrderProgress {
    let ordered: i64 = items.iter().map(|i| i64::from(i.quantity_ordered)).sum();
    let received: i64 = items.iter().map(|i| i64::from(i.quantity_received)).sum();
    let percent = if ordered == 0 {
        Decimal::ZERO
    } else {
        (Decimal::from(received) * Decimal::ONE_HUNDRED / Decimal::from(ordered)).round_dp(2)
    };
    PurchaseOrderProgress {
        ordered,
        received,
        remaining: ordered - received,
        percent,
    }
}

fn ensure_permits(
    current: &purchase_order::Model,
    action: PurchaseOrderAction,
) -> Result<(), ServiceError> {
    if current.status.permits(action) {
        Ok(())
    } else {
        Err(ServiceError::InvalidOperation(current.status.refusal(action)))
    }
}

fn apply_totals(active: &mut purchase_order::ActiveModel, totals: HeaderTotals) {
    active.subtotal = Set(totals.subtotal);
    active.discount_total = Set(totals.discount_total);
    active.tax_total = Set(totals.tax_total);
    active.total = Set(totals.total);
}

async fn replace_items<C>(
    conn: &C,
    purchase_order_id: Uuid,
    lines: Vec<PurchaseOrderLineInput>,
) -> Result<(Vec<purchase_order_item::Model>, HeaderTotals), ServiceError>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let mut items = Vec::with_capacity(lines.len());
    let mut amounts = Vec::with_capacity(lines.len());

    for line in lines {
        let discount = line.discount_percent.unwrap_or(Decimal::ZERO);
        let tax = line.tax_rate.unwrap_or(Decimal::ZERO);
        let amount = line_amounts(line.quantity_ordered, line.unit_cost, discount, tax);

        let item = purchase_order_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            purchase_order_id: Set(purchase_order_id),
            product_variant_id: Set(line.product_variant_id),
            quantity_ordered: Set(line.quantity_ordered),
            quantity_received: Set(0),
            unit_cost: Set(line.unit_cost),
            discount_percent: Set(discount),
            tax_rate: Set(tax),
            line_total: Set(amount.total),
            created_at: Set(now),
        }
        .insert(conn)
        .await
        .map_err(ServiceError::db_error)?;

        items.push(item);
        amounts.push(amount);
    }

    Ok((items, header_totals(&amounts)))
}

async fn items_of<C>(
    conn: &C,
    purchase_order_id: Uuid,
) -> Result<Vec<purchase_order_item::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    PurchaseOrderItem::find()
        .filter(purchase_order_item::Column::PurchaseOrderId.eq(purchase_order_id))
        .order_by_asc(purchase_order_item::Column::CreatedAt)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)
}

async fn find_scoped<C>(
    conn: &C,
    store_id: Uuid,
    id: Uuid,
) -> Result<purchase_order::Model, ServiceError>
where
    C: ConnectionTrait,
{
    PurchaseOrder::find_by_id(id)
        .filter(purchase_order::Column::StoreId.eq(store_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Purchase order {} not found", id)))
}

async fn ensure_vendor<C>(conn: &C, store_id: Uuid, vendor_id: Uuid) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    Vendor::find_by_id(vendor_id)
        .filter(vendor::Column::StoreId.eq(store_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .map(|_| ())
        .ok_or_else(|| ServiceError::NotFound(format!("Vendor {} not found", vendor_id)))
}

async fn ensure_warehouse<C>(
    conn: &C,
    store_id: Uuid,
    warehouse_id: Uuid,
) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    Warehouse::find_by_id(warehouse_id)
        .filter(warehouse::Column::StoreId.eq(store_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .map(|_| ())
        .ok_or_else(|| ServiceError::NotFound(format!("Warehouse {} not found", warehouse_id)))
}

async fn ensure_variant<C>(conn: &C, store_id: Uuid, variant_id: Uuid) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let not_found = || ServiceError::NotFound(format!("Product variant {} not found", variant_id));
    let variant = ProductVariant::find_by_id(variant_id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(not_found)?;
    Product::find_by_id(variant.product_id)
        .filter(product::Column::StoreId.eq(store_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .map(|_| ())
        .ok_or_else(not_found)
}

async fn update_versioned<C>(
    conn: &C,
    current: &purchase_order::Model,
    mut changes: purchase_order::ActiveModel,
) -> Result<purchase_order::Model, ServiceError>
where
    C: ConnectionTrait,
{
    changes.version = Set(current.version + 1);
    let result = PurchaseOrder::update_many()
        .set(changes)
        .filter(purchase_order::Column::Id.eq(current.id))
        .filter(purchase_order::Column::Version.eq(current.version))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;
    if result.rows_affected == 0 {
        return Err(ServiceError::ConcurrentModification(current.id));
    }
    find_scoped(conn, current.store_id, current.id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn item(ordered: i32, received: i32) -> purchase_order_item::Model {
        purchase_order_item::Model {
            id: Uuid::new_v4(),
            purchase_order_id: Uuid::nil(),
            product_variant_id: Uuid::new_v4(),
            quantity_ordered: ordered,
            quantity_received: received,
            unit_cost: dec!(2.5),
            discount_percent: Decimal::ZERO,
            tax_rate: Decimal::ZERO,
            line_total: Decimal::ZERO,
            created_at: Utc::now(),
        }
    }

    fn request(item: &purchase_order_item::Model, quantity: i32) -> ReceiveLine {
        ReceiveLine {
            purchase_order_item_id: item.id,
            quantity,
        }
    }

    #[test]
    fn line_total_applies_discount_then_tax() {
        let amounts = line_amounts(10, dec!(20), dec!(10), dec!(8));
        assert_eq!(amounts.gross, dec!(200));
        assert_eq!(amounts.discount, dec!(20));
        assert_eq!(amounts.tax, dec!(14.4));
        assert_eq!(amounts.total, dec!(194.4));
    }

    #[test]
    fn line_total_rounds_to_cents() {
        let amounts = line_amounts(3, dec!(0.333), Decimal::ZERO, Decimal::ZERO);
        assert_eq!(amounts.total, dec!(1.00));
    }

    #[test]
    fn header_sums_lines() {
        let a = line_amounts(1, dec!(10), Decimal::ZERO, dec!(10));
        let b = line_amounts(2, dec!(5), dec!(50), Decimal::ZERO);
        let totals = header_totals(&[a, b]);
        assert_eq!(totals.subtotal, dec!(20));
        assert_eq!(totals.discount_total, dec!(5));
        assert_eq!(totals.tax_total, dec!(1));
        assert_eq!(totals.total, dec!(16));
    }

    #[test]
    fn over_receipt_is_clamped_to_outstanding() {
        let line = item(10, 0);
        let plan = plan_receipt(&[line.clone()], &[request(&line, 15)]).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].1, 10);
    }

    #[test]
    fn repeated_lines_share_the_outstanding_quantity() {
        let line = item(10, 4);
        let plan = plan_receipt(&[line.clone()], &[request(&line, 5), request(&line, 5)]).unwrap();
        let quantities: Vec<i32> = plan.iter().map(|(_, q)| *q).collect();
        assert_eq!(quantities, vec![5, 1]);
    }

    #[test]
    fn nothing_to_receive_is_rejected() {
        let done = item(5, 5);
        let open = item(5, 0);
        let err = plan_receipt(
            &[done.clone(), open.clone()],
            &[request(&done, 3), request(&open, 0)],
        )
        .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }

    #[test]
    fn unknown_item_is_not_found() {
        let line = item(5, 0);
        let stray = item(5, 0);
        let err = plan_receipt(&[line], &[request(&stray, 1)]).unwrap_err();
        assert_matches!(err, ServiceError::NotFound(_));
    }

    #[test]
    fn status_follows_item_progress() {
        assert_eq!(
            status_after_receipt(&[item(5, 5), item(3, 3)]),
            PurchaseOrderStatus::Received
        );
        assert_eq!(
            status_after_receipt(&[item(5, 5), item(3, 0)]),
            PurchaseOrderStatus::PartiallyReceived
        );
    }

    #[test]
    fn progress_percent() {
        let progress = progress_of(&[item(10, 5), item(10, 0)]);
        assert_eq!(progress.ordered, 20);
        assert_eq!(progress.received, 5);
        assert_eq!(progress.remaining, 15);
        assert_eq!(progress.percent, dec!(25));
    }
}
