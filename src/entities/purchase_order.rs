use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PurchaseOrderStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "submitted")]
    Submitted,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "partially_received")]
    PartiallyReceived,
    #[sea_orm(string_value = "received")]
    Received,
    #[sea_orm(string_value = "closed")]
    Closed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// Guarded operations on a purchase order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum PurchaseOrderAction {
    Edit,
    Delete,
    Submit,
    Approve,
    Cancel,
    Close,
    Receive,
}

impl PurchaseOrderStatus {
    pub fn is_draft(self) -> bool {
        self == Self::Draft
    }

    pub fn is_receivable(self) -> bool {
        matches!(self, Self::Approved | Self::PartiallyReceived)
    }

    /// Whether `action` is permitted in this status. Receiving moves the
    /// status to a derived value computed from the items, so it is not
    /// covered by [`Self::next`].
    pub fn permits(self, action: PurchaseOrderAction) -> bool {
        use PurchaseOrderAction as A;
        match action {
            A::Edit | A::Delete | A::Submit => self.is_draft(),
            A::Approve => self == Self::Submitted,
            A::Cancel => matches!(self, Self::Draft | Self::Submitted | Self::Approved),
            A::Close => matches!(
                self,
                Self::Approved | Self::PartiallyReceived | Self::Received
            ),
            A::Receive => self.is_receivable(),
        }
    }

    /// Status after a header transition, if legal.
    pub fn next(self, action: PurchaseOrderAction) -> Option<Self> {
        use PurchaseOrderAction as A;
        if !self.permits(action) {
            return None;
        }
        match action {
            A::Submit => Some(Self::Submitted),
            A::Approve => Some(Self::Approved),
            A::Cancel => Some(Self::Cancelled),
            A::Close => Some(Self::Closed),
            A::Edit | A::Delete | A::Receive => Some(self),
        }
    }

    /// Message used when `action` is refused.
    pub fn refusal(self, action: PurchaseOrderAction) -> String {
        format!("Cannot {} a purchase order in {} status", action, self)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "purchase_orders")]
#[schema(as = PurchaseOrder)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub store_id: Uuid,
    pub vendor_id: Uuid,
    pub warehouse_id: Uuid,
    pub po_number: String,
    pub status: PurchaseOrderStatus,
    pub expected_date: Option<NaiveDate>,
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
    pub cancel_reason: Option<String>,
    pub created_by: Uuid,
    pub approved_by: Option<Uuid>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::purchase_order_item::Entity")]
    Items,
    #[sea_orm(has_many = "super::purchase_order_receipt::Entity")]
    Receipts,
    #[sea_orm(
        belongs_to = "super::vendor::Entity",
        from = "Column::VendorId",
        to = "super::vendor::Column::Id"
    )]
    Vendor,
}

impl Related<super::purchase_order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::purchase_order_receipt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Receipts.def()
    }
}

impl Related<super::vendor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vendor.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use super::PurchaseOrderAction as A;
    use super::PurchaseOrderStatus as S;

    #[test]
    fn header_transitions() {
        assert_eq!(S::Draft.next(A::Submit), Some(S::Submitted));
        assert_eq!(S::Submitted.next(A::Approve), Some(S::Approved));
        assert_eq!(S::Approved.next(A::Cancel), Some(S::Cancelled));
        assert_eq!(S::PartiallyReceived.next(A::Close), Some(S::Closed));
        assert_eq!(S::PartiallyReceived.next(A::Cancel), None);
        assert_eq!(S::Closed.next(A::Close), None);
        assert_eq!(S::Draft.next(A::Approve), None);
    }

    #[test]
    fn only_drafts_are_editable() {
        assert!(S::Draft.permits(A::Edit));
        assert!(!S::Submitted.permits(A::Edit));
        assert!(!S::Approved.permits(A::Delete));
    }

    #[test]
    fn refusal_names_action_and_status() {
        assert_eq!(
            S::PartiallyReceived.refusal(A::Cancel),
            "Cannot cancel a purchase order in partially_received status"
        );
    }
}
