use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// On-hand stock of one variant in one warehouse.
///
/// `quantity` only changes through the ledger, which writes an
/// [`inventory_adjustment`](super::inventory_adjustment) row for every change.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "inventory")]
#[schema(as = Inventory)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub store_id: Uuid,
    pub product_variant_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: i32,
    pub reserved_quantity: i32,
    /// Weighted average cost per unit
    pub unit_cost: Decimal,
    pub reorder_point: i32,
    pub bin_location: Option<String>,
    pub last_counted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn available_quantity(&self) -> i32 {
        self.quantity - self.reserved_quantity
    }

    pub fn is_low_stock(&self) -> bool {
        self.available_quantity() <= self.reorder_point
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::inventory_adjustment::Entity")]
    Adjustments,
    #[sea_orm(
        belongs_to = "super::product_variant::Entity",
        from = "Column::ProductVariantId",
        to = "super::product_variant::Column::Id"
    )]
    ProductVariant,
    #[sea_orm(
        belongs_to = "super::warehouse::Entity",
        from = "Column::WarehouseId",
        to = "super::warehouse::Column::Id"
    )]
    Warehouse,
}

impl Related<super::inventory_adjustment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Adjustments.def()
    }
}

impl Related<super::product_variant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductVariant.def()
    }
}

impl Related<super::warehouse::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Warehouse.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(quantity: i32, reserved: i32, reorder_point: i32) -> Model {
        let now = Utc::now();
        Model {
            id: Uuid::new_v4(),
            store_id: Uuid::new_v4(),
            product_variant_id: Uuid::new_v4(),
            warehouse_id: Uuid::new_v4(),
            quantity,
            reserved_quantity: reserved,
            unit_cost: dec!(1),
            reorder_point,
            bin_location: None,
            last_counted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn available_excludes_reserved() {
        assert_eq!(row(10, 3, 0).available_quantity(), 7);
    }

    #[test]
    fn low_stock_is_inclusive() {
        assert!(row(10, 5, 5).is_low_stock());
        assert!(!row(10, 4, 5).is_low_stock());
    }
}
