use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Node of a store's category tree.
///
/// Every setting column is nullable: `None` means "inherit from the parent".
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "categories")]
#[schema(as = Category)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub store_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    /// Depth in the tree, roots are 0
    pub level: i32,
    pub sort_order: i32,
    pub sku_format: Option<String>,
    pub sku_prefix: Option<String>,
    pub title_format: Option<String>,
    pub default_template_id: Option<Uuid>,
    pub label_template_id: Option<Uuid>,
    pub charge_taxes: Option<bool>,
    /// JSON array of attribute names
    pub barcode_attributes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn barcode_attribute_list(&self) -> Option<Vec<String>> {
        self.barcode_attributes
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }

    /// True when any setting is stored on this row rather than inherited.
    pub fn has_direct_settings(&self) -> bool {
        self.sku_format.is_some()
            || self.sku_prefix.is_some()
            || self.title_format.is_some()
            || self.default_template_id.is_some()
            || self.label_template_id.is_some()
            || self.charge_taxes.is_some()
            || self.barcode_attributes.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(belongs_to = "Entity", from = "Column::ParentId", to = "Column::Id")]
    Parent,
}

impl ActiveModelBehavior for ActiveModel {}
