use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Why stock moved.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
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
pub enum AdjustmentType {
    #[sea_orm(string_value = "initial")]
    Initial,
    #[sea_orm(string_value = "correction")]
    Correction,
    #[sea_orm(string_value = "purchase_order")]
    PurchaseOrder,
    #[sea_orm(string_value = "sale")]
    Sale,
    #[sea_orm(string_value = "return")]
    Return,
    #[sea_orm(string_value = "damaged")]
    Damaged,
    #[sea_orm(string_value = "lost")]
    Lost,
    #[sea_orm(string_value = "transfer_in")]
    TransferIn,
    #[sea_orm(string_value = "transfer_out")]
    TransferOut,
}

impl AdjustmentType {
    /// Types that can only take stock away.
    pub fn is_removal(self) -> bool {
        matches!(
            self,
            Self::Sale | Self::Damaged | Self::Lost | Self::TransferOut
        )
    }

    /// Types that can only add stock.
    pub fn is_addition(self) -> bool {
        matches!(self, Self::Return | Self::TransferIn | Self::PurchaseOrder)
    }

    /// Whether a change of `delta` units is consistent with this type.
    /// `initial` and `correction` go either way.
    pub fn accepts_delta(self, delta: i32) -> bool {
        if self.is_removal() {
            delta < 0
        } else if self.is_addition() {
            delta > 0
        } else {
            true
        }
    }
}

/// Immutable ledger row: one per change to an inventory quantity.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "inventory_adjustments")]
#[schema(as = InventoryAdjustment)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub store_id: Uuid,
    pub inventory_id: Uuid,
    pub user_id: Option<Uuid>,
    pub reference_number: String,
    pub adjustment_type: AdjustmentType,
    pub quantity_before: i32,
    pub quantity_change: i32,
    pub quantity_after: i32,
    pub unit_cost: Decimal,
    pub total_cost_impact: Decimal,
    pub reason: Option<String>,
    pub notes: Option<String>,
    /// Originating document, e.g. `purchase_order`
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::inventory::Entity",
        from = "Column::InventoryId",
        to = "super::inventory::Column::Id"
    )]
    Inventory,
}

impl Related<super::inventory::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Inventory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_rules() {
        assert!(AdjustmentType::Sale.accepts_delta(-1));
        assert!(!AdjustmentType::Sale.accepts_delta(1));
        assert!(AdjustmentType::Return.accepts_delta(2));
        assert!(!AdjustmentType::TransferIn.accepts_delta(-2));
        assert!(AdjustmentType::Correction.accepts_delta(-5));
        assert!(AdjustmentType::Correction.accepts_delta(5));
    }
}
