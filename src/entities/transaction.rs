use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::services::transaction_workflow::{TransactionSource, TransactionStatus, TransactionType};

/// A buy (pawn or mail-in) transaction.
///
/// Milestone timestamps are written by the transition that reaches the
/// matching status and cleared again only by the offer rollbacks.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "transactions")]
#[schema(as = Transaction)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub store_id: Uuid,
    pub transaction_number: String,
    pub transaction_type: TransactionType,
    pub source: TransactionSource,
    pub status: TransactionStatus,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub final_offer: Option<Decimal>,
    pub payment_method: Option<String>,
    /// Reason given for the last hold, rejection, return or cancellation
    pub status_reason: Option<String>,
    pub notes: Option<String>,

    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub return_tracking_number: Option<String>,
    pub return_carrier: Option<String>,

    pub kit_request_confirmed_at: Option<DateTime<Utc>>,
    pub kit_sent_at: Option<DateTime<Utc>>,
    pub kit_delivered_at: Option<DateTime<Utc>>,
    pub items_received_at: Option<DateTime<Utc>>,
    pub items_reviewed_at: Option<DateTime<Utc>>,
    pub offer_given_at: Option<DateTime<Utc>>,
    pub offer_accepted_at: Option<DateTime<Utc>>,
    pub payment_processed_at: Option<DateTime<Utc>>,
    pub return_requested_at: Option<DateTime<Utc>>,
    pub return_shipped_at: Option<DateTime<Utc>>,
    pub items_returned_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,

    pub created_by: Uuid,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transaction_item::Entity")]
    Items,
    #[sea_orm(has_many = "super::transaction_offer::Entity")]
    Offers,
    #[sea_orm(has_many = "super::transaction_payment::Entity")]
    Payments,
}

impl Related<super::transaction_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::transaction_offer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Offers.def()
    }
}

impl Related<super::transaction_payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
