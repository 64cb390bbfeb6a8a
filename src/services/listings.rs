use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    entities::{
        inventory::{self, Entity as Inventory},
        platform_listing::{self, Entity as PlatformListing, ListingStatus, Platform},
        product::{self, Entity as Product},
        product_variant::{self, Entity as ProductVariant},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::collaborators::ProviderError,
};

/// What a marketplace needs to list a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingPayload {
    pub listing_id: Uuid,
    pub product_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
    pub external_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteListing {
    pub external_id: String,
    pub external_url: Option<String>,
}

/// Client for one sales channel.
#[async_trait]
pub trait PlatformDriver: Send + Sync {
    fn platform(&self) -> Platform;

    async fn push_product(&self, payload: ListingPayload) -> Result<RemoteListing, ProviderError>;

    async fn update_listing(&self, payload: ListingPayload)
        -> Result<RemoteListing, ProviderError>;

    async fn delete_listing(&self, external_id: String) -> Result<(), ProviderError>;

    async fn relist_listing(&self, payload: ListingPayload)
        -> Result<RemoteListing, ProviderError>;

    async fn unlist_listing(&self, external_id: String) -> Result<(), ProviderError>;
}

/// The in-store channel. Nothing leaves the process.
#[derive(Debug, Default, Clone)]
pub struct LocalChannelDriver;

impl LocalChannelDriver {
    fn remote(payload: &ListingPayload) -> RemoteListing {
        RemoteListing {
            external_id: payload
                .external_id
                .clone()
                .unwrap_or_else(|| format!("local-{}", payload.listing_id.simple())),
            external_url: None,
        }
    }
}

#[async_trait]
impl PlatformDriver for LocalChannelDriver {
    fn platform(&self) -> Platform {
        Platform::Local
    }

    async fn push_product(&self, payload: ListingPayload) -> Result<RemoteListing, ProviderError> {
        Ok(Self::remote(&payload))
    }

    async fn update_listing(
        &self,
        payload: ListingPayload,
    ) -> Result<RemoteListing, ProviderError> {
        Ok(Self::remote(&payload))
    }

    async fn delete_listing(&self, _external_id: String) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn relist_listing(
        &self,
        payload: ListingPayload,
    ) -> Result<RemoteListing, ProviderError> {
        Ok(Self::remote(&payload))
    }

    async fn unlist_listing(&self, _external_id: String) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Drivers by platform.
#[derive(Clone)]
pub struct PlatformRegistry {
    drivers: HashMap<Platform, Arc<dyn PlatformDriver>>,
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformRegistry {
    /// Registry with only the local channel available.
    pub fn new() -> Self {
        let mut registry = Self {
            drivers: HashMap::new(),
        };
        registry.register(Arc::new(LocalChannelDriver));
        registry
    }

    pub fn register(&mut self, driver: Arc<dyn PlatformDriver>) {
        self.drivers.insert(driver.platform(), driver);
    }

    pub fn driver(&self, platform: Platform) -> Result<Arc<dyn PlatformDriver>, ServiceError> {
        self.drivers
            .get(&platform)
            .cloned()
            .ok_or_else(|| ProviderError::NotConfigured(format!("{} integration", platform)).into())
    }
}

fn validate_non_negative(value: &Decimal) -> Result<(), validator::ValidationError> {
    if *value < Decimal::ZERO {
        return Err(validator::ValidationError::new("negative_amount"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateListing {
    pub product_id: Uuid,
    pub platform: Platform,
    pub should_list: Option<bool>,
    #[validate(custom = "validate_non_negative")]
    pub price_override: Option<Decimal>,
    #[validate(range(min = 0))]
    pub quantity_override: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateListing {
    pub should_list: Option<bool>,
    #[validate(custom = "validate_non_negative")]
    pub price_override: Option<Decimal>,
    #[validate(range(min = 0))]
    pub quantity_override: Option<i32>,
    /// Drops both overrides before applying the fields above
    #[serde(default)]
    pub clear_overrides: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BulkStatusOutcome {
    pub updated: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct BulkPublishOutcome {
    pub published: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema)]
pub struct ListingFilter {
    pub product_id: Option<Uuid>,
    pub platform: Option<Platform>,
    pub status: Option<ListingStatus>,
}

fn refusal(from: ListingStatus, to: ListingStatus) -> ServiceError {
    ServiceError::InvalidOperation(format!(
        "Cannot change listing status from {} to {}",
        from, to
    ))
}

#[derive(Clone)]
pub struct ListingService {
    db_pool: Arc<DatabaseConnection>,
    event_sender: EventSender,
    registry: Arc<PlatformRegistry>,
}

impl ListingService {
    pub fn new(
        db_pool: Arc<DatabaseConnection>,
        event_sender: EventSender,
        registry: Arc<PlatformRegistry>,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            registry,
        }
    }

    #[instrument(skip(self, input), fields(platform = %input.platform))]
    pub async fn create(
        &self,
        store_id: Uuid,
        input: CreateListing,
    ) -> Result<platform_listing::Model, ServiceError> {
        input.validate()?;
        let db = self.db_pool.as_ref();
        find_product(db, store_id, input.product_id).await?;

        let existing = PlatformListing::find()
            .filter(platform_listing::Column::ProductId.eq(input.product_id))
            .filter(platform_listing::Column::Platform.eq(input.platform))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Product {} already has a {} listing",
                input.product_id, input.platform
            )));
        }

        let now = Utc::now();
        let listing = platform_listing::ActiveModel {
            id: Set(Uuid::new_v4()),
            store_id: Set(store_id),
            product_id: Set(input.product_id),
            platform: Set(input.platform),
            status: Set(ListingStatus::Draft),
            should_list: Set(input.should_list.unwrap_or(true)),
            price_override: Set(input.price_override),
            quantity_override: Set(input.quantity_override),
            external_id: Set(None),
            external_url: Set(None),
            last_synced_at: Set(None),
            last_error: Set(None),
            published_at: Set(None),
            ended_at: Set(None),
            version: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)?;

        info!(listing_id = %listing.id, "listing created");
        Ok(listing)
    }

    pub async fn get(
        &self,
        store_id: Uuid,
        id: Uuid,
    ) -> Result<platform_listing::Model, ServiceError> {
        find_scoped(self.db_pool.as_ref(), store_id, id).await
    }

    pub async fn list(
        &self,
        store_id: Uuid,
        filter: ListingFilter,
    ) -> Result<Vec<platform_listing::Model>, ServiceError> {
        let mut query =
            PlatformListing::find().filter(platform_listing::Column::StoreId.eq(store_id));
        if let Some(product_id) = filter.product_id {
            query = query.filter(platform_listing::Column::ProductId.eq(product_id));
        }
        if let Some(platform) = filter.platform {
            query = query.filter(platform_listing::Column::Platform.eq(platform));
        }
        if let Some(status) = filter.status {
            query = query.filter(platform_listing::Column::Status.eq(status));
        }
        query
            .order_by_desc(platform_listing::Column::UpdatedAt)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    pub async fn update(
        &self,
        store_id: Uuid,
        id: Uuid,
        input: UpdateListing,
    ) -> Result<platform_listing::Model, ServiceError> {
        input.validate()?;
        let db = self.db_pool.as_ref();
        let current = find_scoped(db, store_id, id).await?;

        let mut changes = platform_listing::ActiveModel {
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        if input.clear_overrides {
            changes.price_override = Set(None);
            changes.quantity_override = Set(None);
        }
        if let Some(should_list) = input.should_list {
            changes.should_list = Set(should_list);
        }
        if input.price_override.is_some() {
            changes.price_override = Set(input.price_override);
        }
        if input.quantity_override.is_some() {
            changes.quantity_override = Set(input.quantity_override);
        }
        update_versioned(db, &current, changes).await
    }

    /// Local status change; nothing is sent to the platform.
    pub async fn transition_to(
        &self,
        store_id: Uuid,
        id: Uuid,
        target: ListingStatus,
    ) -> Result<platform_listing::Model, ServiceError> {
        let current = self.get(store_id, id).await?;
        if !current.status.can_transition_to(target) {
            return Err(refusal(current.status, target));
        }
        let mut changes = <platform_listing::ActiveModel as sea_orm::ActiveModelTrait>::default();
        stamp_status(&mut changes, &current, target);
        let updated = update_versioned(self.db_pool.as_ref(), &current, changes).await?;
        self.status_changed(&current, &updated).await;
        Ok(updated)
    }

    /// Applies `target` to each listing, carrying on past failures.
    pub async fn bulk_update_status(
        &self,
        store_id: Uuid,
        ids: Vec<Uuid>,
        target: ListingStatus,
    ) -> BulkStatusOutcome {
        let mut outcome = BulkStatusOutcome::default();
        for id in ids {
            match self.transition_to(store_id, id, target).await {
                Ok(_) => outcome.updated += 1,
                Err(e) => outcome.errors.push(format!("Listing {}: {}", id, e)),
            }
        }
        info!(
            updated = outcome.updated,
            failed = outcome.errors.len(),
            %target,
            "bulk listing status update"
        );
        outcome
    }

    /// Pushes the listing to its platform, or refreshes it when already live.
    #[instrument(skip(self))]
    pub async fn publish(
        &self,
        store_id: Uuid,
        id: Uuid,
    ) -> Result<platform_listing::Model, ServiceError> {
        let current = self.get(store_id, id).await?;
        let refresh = current.status == ListingStatus::Active && current.external_id.is_some();
        if !refresh && !current.status.can_transition_to(ListingStatus::Active) {
            return Err(refusal(current.status, ListingStatus::Active));
        }

        let driver = self.registry.driver(current.platform)?;
        let payload = self.payload(&current).await?;
        let result = if refresh {
            driver.update_listing(payload).await
        } else {
            driver.push_product(payload).await
        };
        match result {
            Ok(remote) => {
                self.record_success(current, ListingStatus::Active, Some(remote))
                    .await
            }
            Err(e) => Err(self.record_failure(current, e).await),
        }
    }

    /// Takes a live listing down on its platform.
    #[instrument(skip(self))]
    pub async fn unlist(
        &self,
        store_id: Uuid,
        id: Uuid,
    ) -> Result<platform_listing::Model, ServiceError> {
        let current = self.get(store_id, id).await?;
        if !current.status.is_live() {
            return Err(refusal(current.status, ListingStatus::Ended));
        }
        let external_id = published_id(&current)?;

        let driver = self.registry.driver(current.platform)?;
        match driver.unlist_listing(external_id).await {
            Ok(()) => self.record_success(current, ListingStatus::Ended, None).await,
            Err(e) => Err(self.record_failure(current, e).await),
        }
    }

    #[instrument(skip(self))]
    pub async fn relist(
        &self,
        store_id: Uuid,
        id: Uuid,
    ) -> Result<platform_listing::Model, ServiceError> {
        let current = self.get(store_id, id).await?;
        if current.status != ListingStatus::Ended {
            return Err(ServiceError::InvalidOperation(format!(
                "Only ended listings can be relisted, this one is {}",
                current.status
            )));
        }

        let driver = self.registry.driver(current.platform)?;
        let payload = self.payload(&current).await?;
        match driver.relist_listing(payload).await {
            Ok(remote) => {
                self.record_success(current, ListingStatus::Active, Some(remote))
                    .await
            }
            Err(e) => Err(self.record_failure(current, e).await),
        }
    }

    /// Removes the listing from its platform, then deletes the local row.
    #[instrument(skip(self))]
    pub async fn delete_remote(&self, store_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
        let current = self.get(store_id, id).await?;

        if let Some(external_id) = current.external_id.clone() {
            let driver = self.registry.driver(current.platform)?;
            if let Err(e) = driver.delete_listing(external_id).await {
                return Err(self.record_failure(current, e).await);
            }
        }

        PlatformListing::delete_many()
            .filter(platform_listing::Column::Id.eq(current.id))
            .filter(platform_listing::Column::Version.eq(current.version))
            .exec(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
            .and_then(|result| {
                if result.rows_affected == 0 {
                    Err(ServiceError::ConcurrentModification(current.id))
                } else {
                    Ok(())
                }
            })?;
        info!(listing_id = %current.id, platform = %current.platform, "listing deleted");
        Ok(())
    }

    pub async fn bulk_publish(&self, store_id: Uuid, ids: Vec<Uuid>) -> BulkPublishOutcome {
        let mut outcome = BulkPublishOutcome::default();
        for id in ids {
            match self.publish(store_id, id).await {
                Ok(_) => outcome.published += 1,
                Err(e) => outcome.errors.push(format!("Listing {}: {}", id, e)),
            }
        }
        info!(
            published = outcome.published,
            failed = outcome.errors.len(),
            "bulk publish"
        );
        outcome
    }

    async fn payload(
        &self,
        listing: &platform_listing::Model,
    ) -> Result<ListingPayload, ServiceError> {
        let db = self.db_pool.as_ref();
        let product = find_product(db, listing.store_id, listing.product_id).await?;

        let quantity = match listing.quantity_override {
            Some(quantity) => quantity,
            None => available_units(db, listing.store_id, product.id).await?,
        };
        Ok(ListingPayload {
            listing_id: listing.id,
            product_id: product.id,
            title: product.title,
            description: product.description,
            price: listing.price_override.unwrap_or(product.price),
            quantity,
            external_id: listing.external_id.clone(),
        })
    }

    async fn record_success(
        &self,
        current: platform_listing::Model,
        next: ListingStatus,
        remote: Option<RemoteListing>,
    ) -> Result<platform_listing::Model, ServiceError> {
        let mut changes = platform_listing::ActiveModel {
            last_synced_at: Set(Some(Utc::now())),
            last_error: Set(None),
            ..Default::default()
        };
        if let Some(remote) = remote {
            changes.external_id = Set(Some(remote.external_id));
            changes.external_url = Set(remote.external_url);
        }
        stamp_status(&mut changes, &current, next);

        let updated = update_versioned(self.db_pool.as_ref(), &current, changes).await?;
        counter!("storekeep_listings.synced", 1);
        info!(listing_id = %updated.id, platform = %updated.platform, status = %updated.status, "listing synced");
        self.status_changed(&current, &updated).await;
        Ok(updated)
    }

    /// Stores the failure on the listing and returns the error to surface.
    async fn record_failure(
        &self,
        current: platform_listing::Model,
        err: ProviderError,
    ) -> ServiceError {
        if let ProviderError::NotConfigured(_) = err {
            return err.into();
        }

        let message = err.to_string();
        counter!("storekeep_listings.sync_failures", 1);
        error!(listing_id = %current.id, platform = %current.platform, error = %message, "listing sync failed");

        let mut changes = platform_listing::ActiveModel {
            last_error: Set(Some(message.clone())),
            ..Default::default()
        };
        if current.status.can_transition_to(ListingStatus::Error) {
            stamp_status(&mut changes, &current, ListingStatus::Error);
        } else {
            changes.updated_at = Set(Utc::now());
        }
        match update_versioned(self.db_pool.as_ref(), &current, changes).await {
            Ok(updated) => self.status_changed(&current, &updated).await,
            Err(e) => warn!(listing_id = %current.id, error = %e, "could not record sync failure"),
        }

        self.event_sender
            .send_or_log(Event::ListingSyncFailed {
                store_id: current.store_id,
                listing_id: current.id,
                error: message,
            })
            .await;
        err.into()
    }

    async fn status_changed(
        &self,
        before: &platform_listing::Model,
        after: &platform_listing::Model,
    ) {
        if before.status == after.status {
            return;
        }
        info!(listing_id = %after.id, from = %before.status, to = %after.status, "listing status changed");
        self.event_sender
            .send_or_log(Event::ListingStatusChanged {
                store_id: after.store_id,
                listing_id: after.id,
                from: before.status,
                to: after.status,
            })
            .await;
    }
}

fn stamp_status(
    changes: &mut platform_listing::ActiveModel,
    current: &platform_listing::Model,
    next: ListingStatus,
) {
    let now = Utc::now();
    changes.status = Set(next);
    changes.updated_at = Set(now);
    match next {
        ListingStatus::Active => {
            if current.published_at.is_none() || current.status == ListingStatus::Ended {
                changes.published_at = Set(Some(now));
            }
            changes.ended_at = Set(None);
        }
        ListingStatus::Ended | ListingStatus::Sold => changes.ended_at = Set(Some(now)),
        _ => {}
    }
}

fn published_id(listing: &platform_listing::Model) -> Result<String, ServiceError> {
    listing.external_id.clone().ok_or_else(|| {
        ServiceError::InvalidOperation(format!(
            "Listing {} has not been published to {}",
            listing.id, listing.platform
        ))
    })
}

async fn find_scoped<C>(
    conn: &C,
    store_id: Uuid,
    id: Uuid,
) -> Result<platform_listing::Model, ServiceError>
where
    C: ConnectionTrait,
{
    PlatformListing::find_by_id(id)
        .filter(platform_listing::Column::StoreId.eq(store_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Listing {} not found", id)))
}

async fn find_product<C>(
    conn: &C,
    store_id: Uuid,
    product_id: Uuid,
) -> Result<product::Model, ServiceError>
where
    C: ConnectionTrait,
{
    Product::find_by_id(product_id)
        .filter(product::Column::StoreId.eq(store_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
}

/// Units available to sell across every variant and warehouse.
async fn available_units<C>(conn: &C, store_id: Uuid, product_id: Uuid) -> Result<i32, ServiceError>
where
    C: ConnectionTrait,
{
    let variant_ids: Vec<Uuid> = ProductVariant::find()
        .filter(product_variant::Column::ProductId.eq(product_id))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?
        .into_iter()
        .map(|v| v.id)
        .collect();
    if variant_ids.is_empty() {
        return Ok(0);
    }
    let rows = Inventory::find()
        .filter(inventory::Column::StoreId.eq(store_id))
        .filter(inventory::Column::ProductVariantId.is_in(variant_ids))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(sellable_units(rows.iter().map(|row| row.available_quantity())))
}

/// Sums positive stock, saturating at `i32::MAX`.
fn sellable_units(available: impl Iterator<Item = i32>) -> i32 {
    let total: i64 = available.map(|units| i64::from(units.max(0))).sum();
    i32::try_from(total).unwrap_or(i32::MAX)
}

async fn update_versioned<C>(
    conn: &C,
    current: &platform_listing::Model,
    mut changes: platform_listing::ActiveModel,
) -> Result<platform_listing::Model, ServiceError>
where
    C: ConnectionTrait,
{
    changes.version = Set(current.version + 1);
    let result = PlatformListing::update_many()
        .set(changes)
        .filter(platform_listing::Column::Id.eq(current.id))
        .filter(platform_listing::Column::Version.eq(current.version))
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

    fn listing(status: ListingStatus) -> platform_listing::Model {
        let now = Utc::now();
        platform_listing::Model {
            id: Uuid::new_v4(),
            store_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            platform: Platform::Ebay,
            status,
            should_list: true,
            price_override: None,
            quantity_override: None,
            external_id: None,
            external_url: None,
            last_synced_at: None,
            last_error: None,
            published_at: None,
            ended_at: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn local_driver_assigns_stable_ids() {
        let driver = LocalChannelDriver;
        let payload = ListingPayload {
            listing_id: Uuid::from_u128(7),
            product_id: Uuid::nil(),
            title: "Ring".into(),
            description: None,
            price: Decimal::TEN,
            quantity: 1,
            external_id: None,
        };
        let first = driver.push_product(payload.clone()).await.unwrap();
        let again = driver
            .update_listing(ListingPayload {
                external_id: Some(first.external_id.clone()),
                ..payload
            })
            .await
            .unwrap();
        assert_eq!(first, again);
        assert!(first.external_id.starts_with("local-"));
    }

    #[test]
    fn registry_only_knows_local_by_default() {
        let registry = PlatformRegistry::new();
        assert!(registry.driver(Platform::Local).is_ok());
        let err = registry.driver(Platform::Etsy).err().unwrap();
        assert_matches!(err, ServiceError::InvalidOperation(msg) if msg.contains("etsy"));
    }

    #[test]
    fn activation_stamps_published_at() {
        let current = listing(ListingStatus::Draft);
        let mut changes = <platform_listing::ActiveModel as sea_orm::ActiveModelTrait>::default();
        stamp_status(&mut changes, &current, ListingStatus::Active);
        assert_matches!(changes.published_at, sea_orm::ActiveValue::Set(Some(_)));
        assert_matches!(changes.ended_at, sea_orm::ActiveValue::Set(None));
    }

    #[test]
    fn ending_stamps_ended_at() {
        let current = listing(ListingStatus::Active);
        let mut changes = <platform_listing::ActiveModel as sea_orm::ActiveModelTrait>::default();
        stamp_status(&mut changes, &current, ListingStatus::Sold);
        assert_matches!(changes.ended_at, sea_orm::ActiveValue::Set(Some(_)));
        assert_matches!(changes.published_at, sea_orm::ActiveValue::NotSet);
    }

    #[test]
    fn unpublished_listings_have_no_remote_id() {
        let err = published_id(&listing(ListingStatus::Active)).unwrap_err();
        assert_matches!(err, ServiceError::InvalidOperation(_));
    }

    #[test]
    fn sellable_units_ignore_backorders_and_saturate() {
        assert_eq!(sellable_units([3, -2, 4].into_iter()), 7);
        assert_eq!(sellable_units([i32::MAX, i32::MAX].into_iter()), i32::MAX);
        assert_eq!(sellable_units(std::iter::empty()), 0);
    }
}
