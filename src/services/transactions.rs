use chrono::Utc;
use futures::future::BoxFuture;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        activity_log,
        transaction::{self, Entity as Transaction},
        transaction_item::{self, Entity as TransactionItem},
        transaction_offer::{self, Entity as TransactionOffer, OfferStatus},
        transaction_payment::{self, Entity as TransactionPayment, PaymentMethod},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        activity::{self, ActivityEntry},
        collaborators::{
            Collaborators, LabelKind, LabelOptions, LabelRequest, NotificationChannel,
            PayoutRequest, ProviderError, ShippingLabel,
        },
        sequences::{next_reference, SequenceScope},
        transaction_workflow::{
            action_reaching, allowed_actions, attempt_transition, initial_status,
            TransactionAction, TransactionSource, TransactionStatus, TransactionType,
        },
    },
};

const SUBJECT: &str = "transaction";

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewItem {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub category_id: Option<Uuid>,
    pub metal_type: Option<String>,
    pub karat: Option<String>,
    pub weight_grams: Option<Decimal>,
    pub condition: Option<String>,
    pub price: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateTransaction {
    pub transaction_type: TransactionType,
    /// Defaults to `online` for mail-in and `in_store` for in-house
    pub source: Option<TransactionSource>,
    #[validate(length(max = 255))]
    pub customer_name: Option<String>,
    #[validate(email)]
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<NewItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReviewItem {
    pub buy_price: Decimal,
    pub condition: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentLine {
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TransactionFilter {
    pub status: Option<TransactionStatus>,
    pub transaction_type: Option<TransactionType>,
}

/// A transaction with its children and the actions currently open to it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionDetail {
    pub transaction: transaction::Model,
    pub items: Vec<transaction_item::Model>,
    pub offers: Vec<transaction_offer::Model>,
    pub payments: Vec<transaction_payment::Model>,
    pub allowed_actions: Vec<TransactionAction>,
}

/// Sum of `lines` is within `tolerance` of `offer`.
pub fn payments_cover_offer(lines: &[PaymentLine], offer: Decimal, tolerance: Decimal) -> bool {
    let total: Decimal = lines.iter().map(|l| l.amount).sum();
    (total - offer).abs() <= tolerance
}

/// Side effects a transition applies on top of the status change. Runs
/// inside the transition's database transaction.
type Apply = Box<
    dyn for<'c> FnOnce(
            &'c DatabaseTransaction,
            transaction::Model,
            transaction::ActiveModel,
        ) -> BoxFuture<'c, Result<transaction::ActiveModel, ServiceError>>
        + Send,
>;

fn side_effects<F>(f: F) -> Apply
where
    F: for<'c> FnOnce(
            &'c DatabaseTransaction,
            transaction::Model,
            transaction::ActiveModel,
        ) -> BoxFuture<'c, Result<transaction::ActiveModel, ServiceError>>
        + Send
        + 'static,
{
    Box::new(f)
}

fn no_side_effects() -> Apply {
    side_effects(|_, _, active| Box::pin(async move { Ok(active) }))
}

fn with_status_reason(reason: Option<String>) -> Apply {
    side_effects(move |_, _, mut active| {
        Box::pin(async move {
            if reason.is_some() {
                active.status_reason = Set(reason);
            }
            Ok(active)
        })
    })
}

/// Buy transaction workflow. Every status change goes through
/// [`attempt_transition`], is written with a version check and leaves an
/// activity row.
#[derive(Clone)]
pub struct TransactionService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: EventSender,
    collaborators: Collaborators,
    payment_tolerance: Decimal,
}

impl TransactionService {
    pub fn new(
        db_pool: Arc<DatabaseConnection>,
        event_sender: EventSender,
        collaborators: Collaborators,
        payment_tolerance: Decimal,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            collaborators,
            payment_tolerance,
        }
    }

    #[instrument(skip(self, input), fields(kind = %input.transaction_type))]
    pub async fn create(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        input: CreateTransaction,
    ) -> Result<transaction::Model, ServiceError> {
        input.validate()?;
        for item in &input.items {
            item.validate()?;
        }

        let created = self
            .db_pool
            .transaction::<_, transaction::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let kind = input.transaction_type;
                    let source = input.source.unwrap_or(match kind {
                        TransactionType::MailIn => TransactionSource::Online,
                        TransactionType::InHouse => TransactionSource::InStore,
                    });
                    let number = next_reference(txn, store_id, SequenceScope::Transaction).await?;
                    let now = Utc::now();

                    let model = transaction::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        store_id: Set(store_id),
                        transaction_number: Set(number),
                        transaction_type: Set(kind),
                        source: Set(source),
                        status: Set(initial_status(kind)),
                        customer_name: Set(input.customer_name),
                        customer_email: Set(input.customer_email),
                        customer_phone: Set(input.customer_phone),
                        final_offer: Set(None),
                        payment_method: Set(None),
                        status_reason: Set(None),
                        notes: Set(input.notes),
                        tracking_number: Set(None),
                        carrier: Set(None),
                        return_tracking_number: Set(None),
                        return_carrier: Set(None),
                        kit_request_confirmed_at: Set(None),
                        kit_sent_at: Set(None),
                        kit_delivered_at: Set(None),
                        items_received_at: Set(None),
                        items_reviewed_at: Set(None),
                        offer_given_at: Set(None),
                        offer_accepted_at: Set(None),
                        payment_processed_at: Set(None),
                        return_requested_at: Set(None),
                        return_shipped_at: Set(None),
                        items_returned_at: Set(None),
                        cancelled_at: Set(None),
                        created_by: Set(user_id),
                        version: Set(1),
                        created_at: Set(now),
                        updated_at: Set(now),
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                    for item in input.items {
                        insert_item(txn, model.id, item).await?;
                    }

                    ActivityEntry::new(store_id, SUBJECT, model.id, "create")
                        .by(user_id)
                        .describe(Some(format!("Created {} transaction", kind)))
                        .record(txn)
                        .await?;

                    Ok(model)
                })
            })
            .await
            .map_err(ServiceError::from_transaction)?;

        info!(transaction_id = %created.id, number = %created.transaction_number, "transaction created");
        self.event_sender
            .send_or_log(Event::TransactionCreated {
                store_id,
                transaction_id: created.id,
            })
            .await;
        Ok(created)
    }

    pub async fn get(&self, store_id: Uuid, id: Uuid) -> Result<TransactionDetail, ServiceError> {
        let db = self.db_pool.as_ref();
        let transaction = find_scoped(db, store_id, id).await?;

        let items = transaction
            .find_related(TransactionItem)
            .order_by_asc(transaction_item::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let offers = transaction
            .find_related(TransactionOffer)
            .order_by_asc(transaction_offer::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let payments = transaction
            .find_related(TransactionPayment)
            .order_by_asc(transaction_payment::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        let allowed_actions = allowed_actions(transaction.transaction_type, transaction.status);

        Ok(TransactionDetail {
            transaction,
            items,
            offers,
            payments,
            allowed_actions,
        })
    }

    pub async fn list(
        &self,
        store_id: Uuid,
        filter: TransactionFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<transaction::Model>, u64), ServiceError> {
        let mut query = Transaction::find().filter(transaction::Column::StoreId.eq(store_id));
        if let Some(status) = filter.status {
            query = query.filter(transaction::Column::Status.eq(status));
        }
        if let Some(kind) = filter.transaction_type {
            query = query.filter(transaction::Column::TransactionType.eq(kind));
        }

        let paginator = query
            .order_by_desc(transaction::Column::CreatedAt)
            .paginate(self.db_pool.as_ref(), per_page);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let rows = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;
        Ok((rows, total))
    }

    pub async fn activity(
        &self,
        store_id: Uuid,
        id: Uuid,
    ) -> Result<Vec<activity_log::Model>, ServiceError> {
        let db = self.db_pool.as_ref();
        find_scoped(db, store_id, id).await?;
        activity::history(db, store_id, SUBJECT, id).await
    }

    pub async fn add_item(
        &self,
        store_id: Uuid,
        id: Uuid,
        input: NewItem,
    ) -> Result<transaction_item::Model, ServiceError> {
        input.validate()?;
        let db = self.db_pool.as_ref();
        let transaction = find_scoped(db, store_id, id).await?;
        ensure_items_editable(&transaction)?;
        insert_item(db, transaction.id, input).await
    }

    pub async fn review_item(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
        item_id: Uuid,
        input: ReviewItem,
    ) -> Result<transaction_item::Model, ServiceError> {
        if input.buy_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Buy price cannot be negative".to_string(),
            ));
        }
        let db = self.db_pool.as_ref();
        let transaction = find_scoped(db, store_id, id).await?;
        ensure_items_editable(&transaction)?;

        let item = TransactionItem::find_by_id(item_id)
            .filter(transaction_item::Column::TransactionId.eq(transaction.id))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", item_id)))?;

        let mut active: transaction_item::ActiveModel = item.into();
        active.buy_price = Set(Some(input.buy_price));
        if input.condition.is_some() {
            active.condition = Set(input.condition);
        }
        if input.notes.is_some() {
            active.notes = Set(input.notes);
        }
        active.reviewed_at = Set(Some(Utc::now()));
        active.reviewed_by = Set(Some(user_id));
        active.update(db).await.map_err(ServiceError::db_error)
    }

    pub async fn confirm_kit_request(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<transaction::Model, ServiceError> {
        self.run_transition(
            store_id,
            user_id,
            id,
            TransactionAction::ConfirmKitRequest,
            None,
            no_side_effects(),
        )
        .await
    }

    pub async fn reject_kit_request(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<transaction::Model, ServiceError> {
        self.run_transition(
            store_id,
            user_id,
            id,
            TransactionAction::RejectKitRequest,
            reason.clone(),
            with_status_reason(reason),
        )
        .await
    }

    pub async fn hold_kit_request(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<transaction::Model, ServiceError> {
        self.run_transition(
            store_id,
            user_id,
            id,
            TransactionAction::HoldKitRequest,
            reason.clone(),
            with_status_reason(reason),
        )
        .await
    }

    pub async fn mark_kit_sent(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
        tracking_number: String,
        carrier: String,
    ) -> Result<transaction::Model, ServiceError> {
        let (tracking_number, carrier) = require_tracking(tracking_number, carrier)?;
        self.run_transition(
            store_id,
            user_id,
            id,
            TransactionAction::MarkKitSent,
            Some(format!("{} {}", carrier, tracking_number)),
            side_effects(move |_, _, mut active| {
                Box::pin(async move {
                    active.tracking_number = Set(Some(tracking_number));
                    active.carrier = Set(Some(carrier));
                    Ok(active)
                })
            }),
        )
        .await
    }

    pub async fn mark_kit_delivered(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<transaction::Model, ServiceError> {
        self.run_transition(
            store_id,
            user_id,
            id,
            TransactionAction::MarkKitDelivered,
            None,
            no_side_effects(),
        )
        .await
    }

    pub async fn mark_items_received(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<transaction::Model, ServiceError> {
        self.run_transition(
            store_id,
            user_id,
            id,
            TransactionAction::MarkItemsReceived,
            None,
            no_side_effects(),
        )
        .await
    }

    /// Requires at least one item, all of them reviewed.
    pub async fn mark_items_reviewed(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<transaction::Model, ServiceError> {
        self.run_transition(
            store_id,
            user_id,
            id,
            TransactionAction::MarkItemsReviewed,
            None,
            side_effects(|txn, current, active| {
                Box::pin(async move {
                    let items = current
                        .find_related(TransactionItem)
                        .all(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                    if items.is_empty() {
                        return Err(ServiceError::ValidationError(
                            "At least one item is required before review is complete".to_string(),
                        ));
                    }
                    if items.iter().any(|item| !item.is_reviewed()) {
                        return Err(ServiceError::ValidationError(
                            "All items must be reviewed before review is complete".to_string(),
                        ));
                    }
                    Ok(active)
                })
            }),
        )
        .await
    }

    /// Only one offer may be pending at a time.
    pub async fn submit_offer(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
        amount: Decimal,
        notes: Option<String>,
    ) -> Result<transaction::Model, ServiceError> {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Offer amount must be greater than zero".to_string(),
            ));
        }
        self.run_transition(
            store_id,
            user_id,
            id,
            TransactionAction::SubmitOffer,
            Some(format!("Offered {}", amount)),
            side_effects(move |txn, current, active| {
                Box::pin(async move {
                    if pending_offer(txn, current.id).await?.is_some() {
                        return Err(ServiceError::InvalidOperation(
                            "A pending offer already exists".to_string(),
                        ));
                    }
                    transaction_offer::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        transaction_id: Set(current.id),
                        amount: Set(amount),
                        status: Set(OfferStatus::Pending),
                        notes: Set(notes),
                        decline_reason: Set(None),
                        offered_by: Set(user_id),
                        responded_at: Set(None),
                        created_at: Set(Utc::now()),
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::db_error)?;
                    Ok(active)
                })
            }),
        )
        .await
    }

    pub async fn accept_offer(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<transaction::Model, ServiceError> {
        self.run_transition(
            store_id,
            user_id,
            id,
            TransactionAction::AcceptOffer,
            None,
            side_effects(|txn, current, mut active| {
                Box::pin(async move {
                    let offer = resolve_pending_offer(txn, current.id, OfferStatus::Accepted, None)
                        .await?;
                    active.final_offer = Set(Some(offer.amount));
                    Ok(active)
                })
            }),
        )
        .await
    }

    pub async fn decline_offer(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<transaction::Model, ServiceError> {
        self.run_transition(
            store_id,
            user_id,
            id,
            TransactionAction::DeclineOffer,
            reason.clone(),
            side_effects(move |txn, current, active| {
                Box::pin(async move {
                    resolve_pending_offer(txn, current.id, OfferStatus::Declined, reason).await?;
                    Ok(active)
                })
            }),
        )
        .await
    }

    /// Puts the most recently resolved offer back to pending.
    pub async fn reopen_offer(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<transaction::Model, ServiceError> {
        self.run_transition(
            store_id,
            user_id,
            id,
            TransactionAction::ReopenOffer,
            None,
            side_effects(|txn, current, mut active| {
                Box::pin(async move {
                    let offer = TransactionOffer::find()
                        .filter(transaction_offer::Column::TransactionId.eq(current.id))
                        .filter(transaction_offer::Column::Status.ne(OfferStatus::Pending))
                        .order_by_desc(transaction_offer::Column::CreatedAt)
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::InvalidOperation("There is no offer to reopen".to_string())
                        })?;

                    let mut offer: transaction_offer::ActiveModel = offer.into();
                    offer.status = Set(OfferStatus::Pending);
                    offer.responded_at = Set(None);
                    offer.decline_reason = Set(None);
                    offer.update(txn).await.map_err(ServiceError::db_error)?;

                    active.final_offer = Set(None);
                    active.offer_accepted_at = Set(None);
                    Ok(active)
                })
            }),
        )
        .await
    }

    /// Discards `offer_id` and returns the transaction to review. Only the
    /// latest offer can be discarded, so no pending offer outlives the reset.
    pub async fn reset_to_items_reviewed(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
        offer_id: Uuid,
    ) -> Result<transaction::Model, ServiceError> {
        self.run_transition(
            store_id,
            user_id,
            id,
            TransactionAction::ResetToItemsReviewed,
            Some(format!("Removed offer {}", offer_id)),
            side_effects(move |txn, current, mut active| {
                Box::pin(async move {
                    let offer = TransactionOffer::find_by_id(offer_id)
                        .filter(transaction_offer::Column::TransactionId.eq(current.id))
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Offer {} not found", offer_id))
                        })?;
                    let latest = TransactionOffer::find()
                        .filter(transaction_offer::Column::TransactionId.eq(current.id))
                        .order_by_desc(transaction_offer::Column::CreatedAt)
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?;
                    if latest.map(|l| l.id) != Some(offer.id) {
                        return Err(ServiceError::InvalidOperation(
                            "Only the latest offer can be reset".to_string(),
                        ));
                    }
                    offer.delete(txn).await.map_err(ServiceError::db_error)?;

                    active.final_offer = Set(None);
                    active.offer_given_at = Set(None);
                    active.offer_accepted_at = Set(None);
                    Ok(active)
                })
            }),
        )
        .await
    }

    pub async fn request_payment(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<transaction::Model, ServiceError> {
        self.run_transition(
            store_id,
            user_id,
            id,
            TransactionAction::RequestPayment,
            None,
            no_side_effects(),
        )
        .await
    }

    pub async fn process_payment(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
        line: PaymentLine,
    ) -> Result<transaction::Model, ServiceError> {
        self.process_multiple_payments(store_id, user_id, id, vec![line])
            .await
    }

    /// Pays out the accepted offer, possibly split across methods. PayPal
    /// lines are sent to the payout provider before anything is written.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn process_multiple_payments(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
        lines: Vec<PaymentLine>,
    ) -> Result<transaction::Model, ServiceError> {
        if lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "At least one payment is required".to_string(),
            ));
        }
        if lines.iter().any(|l| l.amount <= Decimal::ZERO) {
            return Err(ServiceError::ValidationError(
                "Payment amounts must be greater than zero".to_string(),
            ));
        }

        let current = find_scoped(self.db_pool.as_ref(), store_id, id).await?;
        guard(&current, TransactionAction::ProcessPayment)?;
        let offer = current.final_offer.ok_or_else(|| {
            ServiceError::InvalidOperation("Transaction has no accepted offer".to_string())
        })?;
        if !payments_cover_offer(&lines, offer, self.payment_tolerance) {
            return Err(ServiceError::ValidationError(
                "Total payments must equal the offer amount.".to_string(),
            ));
        }

        let mut payout_ids = Vec::with_capacity(lines.len());
        for line in &lines {
            if line.method != PaymentMethod::Paypal {
                payout_ids.push(None);
                continue;
            }
            let payouts = &self.collaborators.payouts;
            if !payouts.is_configured() {
                return Err(ProviderError::NotConfigured("PayPal payouts".into()).into());
            }
            let receipt = payouts
                .send_transaction_payout(PayoutRequest {
                    store_id,
                    transaction_id: current.id,
                    recipient_email: current.customer_email.clone(),
                    amount: line.amount,
                    note: Some(format!("Payment for {}", current.transaction_number)),
                })
                .await
                .map_err(|e| {
                    warn!(transaction_id = %current.id, error = %e, "payout failed");
                    ServiceError::from(e)
                })?;
            payout_ids.push(Some(receipt.payout_id));
        }

        let total: Decimal = lines.iter().map(|l| l.amount).sum();
        let method_summary = summarize_methods(&lines);
        let sent_payouts: Vec<String> = payout_ids.iter().flatten().cloned().collect();

        let paid = self
            .run_transition(
                store_id,
                user_id,
                id,
                TransactionAction::ProcessPayment,
                Some(format!("Paid {} by {}", total, method_summary)),
                side_effects(move |txn, current, mut active| {
                    Box::pin(async move {
                        let now = Utc::now();
                        for (line, payout_id) in lines.into_iter().zip(payout_ids) {
                            transaction_payment::ActiveModel {
                                id: Set(Uuid::new_v4()),
                                transaction_id: Set(current.id),
                                method: Set(line.method),
                                amount: Set(line.amount),
                                reference: Set(line.reference),
                                payout_id: Set(payout_id),
                                processed_by: Set(user_id),
                                created_at: Set(now),
                            }
                            .insert(txn)
                            .await
                            .map_err(ServiceError::db_error)?;
                        }
                        active.payment_method = Set(Some(method_summary));
                        Ok(active)
                    })
                }),
            )
            .await
            .map_err(|e| {
                if !sent_payouts.is_empty() {
                    error!(
                        transaction_id = %id,
                        payouts = ?sent_payouts,
                        error = %e,
                        "payouts were sent but the payment could not be recorded"
                    );
                }
                e
            })?;

        self.event_sender
            .send_or_log(Event::TransactionPaid {
                store_id,
                transaction_id: paid.id,
                amount: total,
            })
            .await;
        Ok(paid)
    }

    pub async fn request_return(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<transaction::Model, ServiceError> {
        self.run_transition(
            store_id,
            user_id,
            id,
            TransactionAction::RequestReturn,
            reason.clone(),
            with_status_reason(reason),
        )
        .await
    }

    pub async fn mark_return_shipped(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
        tracking_number: String,
        carrier: String,
    ) -> Result<transaction::Model, ServiceError> {
        let (tracking_number, carrier) = require_tracking(tracking_number, carrier)?;
        self.run_transition(
            store_id,
            user_id,
            id,
            TransactionAction::MarkReturnShipped,
            Some(format!("{} {}", carrier, tracking_number)),
            side_effects(move |_, _, mut active| {
                Box::pin(async move {
                    active.return_tracking_number = Set(Some(tracking_number));
                    active.return_carrier = Set(Some(carrier));
                    Ok(active)
                })
            }),
        )
        .await
    }

    pub async fn mark_items_returned(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
    ) -> Result<transaction::Model, ServiceError> {
        self.run_transition(
            store_id,
            user_id,
            id,
            TransactionAction::MarkItemsReturned,
            None,
            no_side_effects(),
        )
        .await
    }

    pub async fn cancel(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<transaction::Model, ServiceError> {
        self.run_transition(
            store_id,
            user_id,
            id,
            TransactionAction::Cancel,
            reason.clone(),
            with_status_reason(reason),
        )
        .await
    }

    /// Moves to `target` through the single action that reaches it, with
    /// that action's guards. Actions that need extra input (tracking
    /// details, an amount, payment lines or an offer) are refused here.
    pub async fn change_status(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
        target: TransactionStatus,
        reason: Option<String>,
    ) -> Result<transaction::Model, ServiceError> {
        let current = find_scoped(self.db_pool.as_ref(), store_id, id).await?;
        let action = action_reaching(current.transaction_type, current.status, target)
            .ok_or_else(|| {
                counter!("storekeep_transactions.rejected_transitions", 1);
                ServiceError::InvalidOperation(format!(
                    "Cannot change status from {} to {}",
                    current.status, target
                ))
            })?;

        use TransactionAction as A;
        match action {
            A::ConfirmKitRequest => self.confirm_kit_request(store_id, user_id, id).await,
            A::RejectKitRequest => self.reject_kit_request(store_id, user_id, id, reason).await,
            A::HoldKitRequest => self.hold_kit_request(store_id, user_id, id, reason).await,
            A::MarkKitDelivered => self.mark_kit_delivered(store_id, user_id, id).await,
            A::MarkItemsReceived => self.mark_items_received(store_id, user_id, id).await,
            A::MarkItemsReviewed => self.mark_items_reviewed(store_id, user_id, id).await,
            A::AcceptOffer => self.accept_offer(store_id, user_id, id).await,
            A::DeclineOffer => self.decline_offer(store_id, user_id, id, reason).await,
            A::ReopenOffer => self.reopen_offer(store_id, user_id, id).await,
            A::RequestPayment => self.request_payment(store_id, user_id, id).await,
            A::RequestReturn => self.request_return(store_id, user_id, id, reason).await,
            A::MarkItemsReturned => self.mark_items_returned(store_id, user_id, id).await,
            A::Cancel => self.cancel(store_id, user_id, id, reason).await,
            A::MarkKitSent
            | A::MarkReturnShipped
            | A::SubmitOffer
            | A::ProcessPayment
            | A::ResetToItemsReviewed => Err(ServiceError::ValidationError(format!(
                "Moving to {} requires the {} action",
                target, action
            ))),
        }
    }

    /// Buys a carrier label and stores its tracking number. The status is
    /// left alone.
    #[instrument(skip(self, options))]
    pub async fn create_shipping_label(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
        kind: LabelKind,
        options: LabelOptions,
    ) -> Result<transaction::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        let current = find_scoped(db, store_id, id).await?;

        if current.transaction_type != TransactionType::MailIn {
            return Err(ServiceError::InvalidOperation(
                "Shipping labels are only available for mail-in transactions".to_string(),
            ));
        }
        let required = match kind {
            LabelKind::Outbound => TransactionStatus::KitRequestConfirmed,
            LabelKind::Return => TransactionStatus::ReturnRequested,
        };
        if current.status != required {
            return Err(ServiceError::InvalidOperation(format!(
                "A {} label can only be created in {} status",
                kind, required
            )));
        }

        let shipping = &self.collaborators.shipping;
        if !shipping.is_configured() {
            return Err(ProviderError::NotConfigured("Shipping provider".into()).into());
        }
        let request = LabelRequest {
            store_id,
            transaction_id: current.id,
            transaction_number: current.transaction_number.clone(),
            customer_name: current.customer_name.clone(),
            options,
        };
        let label: ShippingLabel = match kind {
            LabelKind::Outbound => shipping.create_outbound_label(request).await,
            LabelKind::Return => shipping.create_return_label(request).await,
        }
        .map_err(|e| {
            warn!(transaction_id = %current.id, error = %e, "label creation failed");
            ServiceError::from(e)
        })?;

        let mut active = transaction::ActiveModel {
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        match kind {
            LabelKind::Outbound => {
                active.tracking_number = Set(Some(label.tracking_number.clone()));
                active.carrier = Set(Some(label.carrier.clone()));
            }
            LabelKind::Return => {
                active.return_tracking_number = Set(Some(label.tracking_number.clone()));
                active.return_carrier = Set(Some(label.carrier.clone()));
            }
        }

        let tracking = label.tracking_number.clone();
        let updated = db
            .transaction::<_, transaction::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let updated = update_versioned(txn, &current, active).await?;
                    record_label_activity(txn, &updated, user_id, kind, &label).await?;
                    Ok(updated)
                })
            })
            .await
            .map_err(ServiceError::from_transaction)?;

        self.event_sender
            .send_or_log(Event::ShippingLabelCreated {
                store_id,
                transaction_id: updated.id,
                tracking_number: tracking,
            })
            .await;
        Ok(updated)
    }

    /// PDF of the stored label of `kind`.
    pub async fn label_pdf(
        &self,
        store_id: Uuid,
        id: Uuid,
        kind: LabelKind,
    ) -> Result<Vec<u8>, ServiceError> {
        let current = find_scoped(self.db_pool.as_ref(), store_id, id).await?;
        let tracking = match kind {
            LabelKind::Outbound => current.tracking_number,
            LabelKind::Return => current.return_tracking_number,
        }
        .ok_or_else(|| ServiceError::NotFound(format!("No {} label for transaction", kind)))?;

        Ok(self.collaborators.shipping.label_pdf(tracking).await?)
    }

    /// Shared transition path: guard, apply side effects, versioned write,
    /// activity row, commit, then event and customer notification.
    async fn run_transition(
        &self,
        store_id: Uuid,
        user_id: Uuid,
        id: Uuid,
        action: TransactionAction,
        description: Option<String>,
        apply: Apply,
    ) -> Result<transaction::Model, ServiceError> {
        let outcome = self
            .db_pool
            .transaction::<_, (transaction::Model, transaction::Model), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        let current = find_scoped(txn, store_id, id).await?;
                        let next = guard(&current, action)?;

                        let now = Utc::now();
                        let mut active = transaction::ActiveModel {
                            status: Set(next),
                            updated_at: Set(now),
                            ..Default::default()
                        };
                        if !action.is_rollback() {
                            stamp_milestone(&mut active, next, now);
                        }
                        let active = apply(txn, current.clone(), active).await?;
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
            .map_err(ServiceError::from_transaction);

        let (before, after) = match outcome {
            Ok(pair) => pair,
            Err(err) => {
                if matches!(
                    err,
                    ServiceError::InvalidTransition(_) | ServiceError::ConcurrentModification(_)
                ) {
                    counter!("storekeep_transactions.rejected_transitions", 1);
                }
                return Err(err);
            }
        };

        counter!("storekeep_transactions.transitions", 1);
        info!(
            transaction_id = %after.id,
            %action,
            from = %before.status,
            to = %after.status,
            "transaction status changed"
        );

        self.event_sender
            .send_or_log(Event::TransactionStatusChanged {
                store_id,
                transaction_id: after.id,
                action,
                from: before.status,
                to: after.status,
            })
            .await;
        self.notify_customer(&after).await;

        Ok(after)
    }

    async fn notify_customer(&self, transaction: &transaction::Model) {
        let (Some(email), Some(message)) = (
            transaction.customer_email.as_ref(),
            customer_message(transaction.status),
        ) else {
            return;
        };

        let context = serde_json::json!({
            "transaction_id": transaction.id,
            "transaction_number": transaction.transaction_number,
            "status": transaction.status,
            "final_offer": transaction.final_offer,
            "tracking_number": transaction.tracking_number,
        });
        if let Err(e) = self
            .collaborators
            .notifier
            .send(
                NotificationChannel::Email,
                email.clone(),
                format!("{}: {}", transaction.transaction_number, message),
                context,
            )
            .await
        {
            warn!(transaction_id = %transaction.id, error = %e, "customer notification failed");
        }
    }
}

async fn record_label_activity(
    txn: &DatabaseTransaction,
    transaction: &transaction::Model,
    user_id: Uuid,
    kind: LabelKind,
    label: &ShippingLabel,
) -> Result<(), ServiceError> {
    ActivityEntry::new(
        transaction.store_id,
        SUBJECT,
        transaction.id,
        format!("create_{}_label", kind),
    )
    .by(user_id)
    .describe(Some(format!("{} {}", label.carrier, label.tracking_number)))
    .record(txn)
    .await?;
    Ok(())
}

fn customer_message(status: TransactionStatus) -> Option<&'static str> {
    use TransactionStatus as S;
    match status {
        S::KitRequestConfirmed => Some("Your kit request has been confirmed."),
        S::KitRequestRejected => Some("Your kit request could not be accepted."),
        S::KitSent => Some("Your shipping kit is on its way."),
        S::ItemsReceived => Some("We have received your items."),
        S::OfferGiven => Some("We have made an offer for your items."),
        S::PaymentProcessed => Some("Your payment has been sent."),
        S::ReturnShipped => Some("Your items are on their way back to you."),
        S::Cancelled => Some("Your transaction has been cancelled."),
        _ => None,
    }
}

fn guard(
    current: &transaction::Model,
    action: TransactionAction,
) -> Result<TransactionStatus, ServiceError> {
    attempt_transition(current.transaction_type, current.status, action).map_err(|e| {
        warn!(transaction_id = %current.id, error = %e, "transition refused");
        ServiceError::from(e)
    })
}

fn stamp_milestone(
    active: &mut transaction::ActiveModel,
    next: TransactionStatus,
    now: chrono::DateTime<Utc>,
) {
    use TransactionStatus as S;
    let at = Set(Some(now));
    match next {
        S::KitRequestConfirmed => active.kit_request_confirmed_at = at,
        S::KitSent => active.kit_sent_at = at,
        S::KitDelivered => active.kit_delivered_at = at,
        S::ItemsReceived => active.items_received_at = at,
        S::ItemsReviewed => active.items_reviewed_at = at,
        S::OfferGiven => active.offer_given_at = at,
        S::OfferAccepted => active.offer_accepted_at = at,
        S::PaymentProcessed => active.payment_processed_at = at,
        S::ReturnRequested => active.return_requested_at = at,
        S::ReturnShipped => active.return_shipped_at = at,
        S::ItemsReturned => active.items_returned_at = at,
        S::Cancelled => active.cancelled_at = at,
        S::Pending
        | S::PendingKitRequest
        | S::KitRequestOnHold
        | S::KitRequestRejected
        | S::OfferDeclined
        | S::PaymentPending => {}
    }
}

fn summarize_methods(lines: &[PaymentLine]) -> String {
    match lines.split_first() {
        Some((first, rest)) if rest.iter().all(|l| l.method == first.method) => {
            first.method.to_string()
        }
        _ => "split".to_string(),
    }
}

fn require_tracking(tracking_number: String, carrier: String) -> Result<(String, String), ServiceError> {
    let tracking_number = tracking_number.trim().to_string();
    let carrier = carrier.trim().to_string();
    let mut errors = Vec::new();
    if tracking_number.is_empty() {
        errors.push("tracking_number is required".to_string());
    }
    if carrier.is_empty() {
        errors.push("carrier is required".to_string());
    }
    if errors.is_empty() {
        Ok((tracking_number, carrier))
    } else {
        Err(ServiceError::ValidationErrors(errors))
    }
}

fn ensure_items_editable(transaction: &transaction::Model) -> Result<(), ServiceError> {
    if transaction.status.items_editable() {
        Ok(())
    } else {
        Err(ServiceError::InvalidOperation(format!(
            "Items cannot be changed in {} status",
            transaction.status
        )))
    }
}

async fn find_scoped<C>(conn: &C, store_id: Uuid, id: Uuid) -> Result<transaction::Model, ServiceError>
where
    C: ConnectionTrait,
{
    Transaction::find_by_id(id)
        .filter(transaction::Column::StoreId.eq(store_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Transaction {} not found", id)))
}

async fn insert_item<C>(
    conn: &C,
    transaction_id: Uuid,
    item: NewItem,
) -> Result<transaction_item::Model, ServiceError>
where
    C: ConnectionTrait,
{
    transaction_item::ActiveModel {
        id: Set(Uuid::new_v4()),
        transaction_id: Set(transaction_id),
        title: Set(item.title),
        category_id: Set(item.category_id),
        metal_type: Set(item.metal_type),
        karat: Set(item.karat),
        weight_grams: Set(item.weight_grams),
        condition: Set(item.condition),
        price: Set(item.price),
        buy_price: Set(None),
        notes: Set(item.notes),
        reviewed_at: Set(None),
        reviewed_by: Set(None),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await
    .map_err(ServiceError::db_error)
}

async fn pending_offer<C>(
    conn: &C,
    transaction_id: Uuid,
) -> Result<Option<transaction_offer::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    TransactionOffer::find()
        .filter(transaction_offer::Column::TransactionId.eq(transaction_id))
        .filter(transaction_offer::Column::Status.eq(OfferStatus::Pending))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)
}

async fn resolve_pending_offer<C>(
    conn: &C,
    transaction_id: Uuid,
    outcome: OfferStatus,
    decline_reason: Option<String>,
) -> Result<transaction_offer::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let offer = pending_offer(conn, transaction_id)
        .await?
        .ok_or_else(|| ServiceError::InvalidOperation("There is no pending offer".to_string()))?;

    let mut active: transaction_offer::ActiveModel = offer.into();
    active.status = Set(outcome);
    active.responded_at = Set(Some(Utc::now()));
    active.decline_reason = Set(decline_reason);
    active.update(conn).await.map_err(ServiceError::db_error)
}

/// Writes `changes` only if the row still carries `current.version`, and
/// bumps the version.
pub async fn update_versioned<C>(
    conn: &C,
    current: &transaction::Model,
    mut changes: transaction::ActiveModel,
) -> Result<transaction::Model, ServiceError>
where
    C: ConnectionTrait,
{
    changes.version = Set(current.version + 1);
    let result = Transaction::update_many()
        .set(changes)
        .filter(transaction::Column::Id.eq(current.id))
        .filter(transaction::Column::Version.eq(current.version))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;
    if result.rows_affected == 0 {
        return Err(ServiceError::ConcurrentModification(current.id));
    }

    Transaction::find_by_id(current.id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Transaction {} not found", current.id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(method: PaymentMethod, amount: Decimal) -> PaymentLine {
        PaymentLine {
            method,
            amount,
            reference: None,
        }
    }

    #[test]
    fn split_payments_must_cover_the_offer() {
        let ok = [line(PaymentMethod::Cash, dec!(40)), line(PaymentMethod::Paypal, dec!(60))];
        assert!(payments_cover_offer(&ok, dec!(100), dec!(0.01)));

        let short = [line(PaymentMethod::Cash, dec!(40)), line(PaymentMethod::Paypal, dec!(50))];
        assert!(!payments_cover_offer(&short, dec!(100), dec!(0.01)));
    }

    #[test]
    fn rounding_differences_inside_tolerance_are_accepted() {
        let lines = [line(PaymentMethod::Cash, dec!(33.33)), line(PaymentMethod::Cash, dec!(66.66))];
        assert!(payments_cover_offer(&lines, dec!(100), dec!(0.01)));
        assert!(!payments_cover_offer(&lines, dec!(100), dec!(0.005)));
    }

    #[test]
    fn method_summary() {
        let same = [line(PaymentMethod::Cash, dec!(1)), line(PaymentMethod::Cash, dec!(2))];
        assert_eq!(summarize_methods(&same), "cash");
        let mixed = [line(PaymentMethod::Cash, dec!(1)), line(PaymentMethod::Check, dec!(2))];
        assert_eq!(summarize_methods(&mixed), "split");
    }

    #[test]
    fn tracking_details_are_required() {
        assert!(require_tracking(" 1Z999 ".into(), "UPS".into()).is_ok());
        match require_tracking(String::new(), " ".into()) {
            Err(ServiceError::ValidationErrors(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn rollbacks_do_not_restamp_milestones() {
        let mut active = <transaction::ActiveModel as sea_orm::ActiveModelTrait>::default();
        stamp_milestone(&mut active, TransactionStatus::OfferDeclined, Utc::now());
        assert!(active.offer_given_at.is_not_set());
        stamp_milestone(&mut active, TransactionStatus::OfferGiven, Utc::now());
        assert!(active.offer_given_at.is_set());
    }
}
