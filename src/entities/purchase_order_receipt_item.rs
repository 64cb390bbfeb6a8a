use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A received line, linked to the ledger adjustment it produced.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "purchase_order_receipt_items")]
#[schema(as = PurchaseOrderReceiptItem)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub receipt_id: Uuid,
    pub purchase_order_item_id: Uuid,
    pub inventory_adjustment_id: Uuid,
    pub quantity_received: i32,
    pub unit_cost: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::purchase_order_receipt::Entity",
        from = "Column::ReceiptId",
        to = "super::purchase_order_receipt::Column::Id"
    )]
    Receipt,
}

impl Related<super::purchase_order_receipt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Receipt.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
