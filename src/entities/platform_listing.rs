use chrono::{DateTime, Utc};
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
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Platform {
    #[sea_orm(string_value = "ebay")]
    Ebay,
    #[sea_orm(string_value = "etsy")]
    Etsy,
    #[sea_orm(string_value = "shopify")]
    Shopify,
    #[sea_orm(string_value = "amazon")]
    Amazon,
    /// In-store sales channel
    #[sea_orm(string_value = "local")]
    Local,
}

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
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ListingStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "paused")]
    Paused,
    #[sea_orm(string_value = "ended")]
    Ended,
    #[sea_orm(string_value = "error")]
    Error,
    #[sea_orm(string_value = "sold")]
    Sold,
}

impl ListingStatus {
    pub fn can_transition_to(self, target: ListingStatus) -> bool {
        use ListingStatus::*;
        matches!(
            (self, target),
            (Draft, Pending | Active | Error)
                | (Pending, Active | Error | Draft)
                | (Active, Paused | Ended | Sold | Error)
                | (Paused, Active | Ended | Error)
                | (Error, Pending | Draft | Active | Ended)
                | (Ended, Pending | Active)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == ListingStatus::Sold
    }

    pub fn is_live(self) -> bool {
        matches!(self, ListingStatus::Active | ListingStatus::Paused)
    }
}

/// A product's presence on one sales channel.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "platform_listings")]
#[schema(as = PlatformListing)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub store_id: Uuid,
    pub product_id: Uuid,
    pub platform: Platform,
    pub status: ListingStatus,
    pub should_list: bool,
    pub price_override: Option<Decimal>,
    pub quantity_override: Option<i32>,
    pub external_id: Option<String>,
    pub external_url: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
