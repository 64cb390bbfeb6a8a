mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use common::TestApp;
use mockall::mock;
use rust_decimal_macros::dec;
use storekeep_api::{
    entities::platform_listing::{self, ListingStatus, Platform},
    errors::ServiceError,
    services::{
        collaborators::ProviderError,
        inventory_ledger::StockVariantInput,
        listings::{CreateListing, ListingPayload, PlatformDriver, PlatformRegistry, RemoteListing},
    },
};
use uuid::Uuid;

mock! {
    Marketplace {}

    #[async_trait]
    impl PlatformDriver for Marketplace {
        fn platform(&self) -> Platform;
        async fn push_product(&self, payload: ListingPayload) -> Result<RemoteListing, ProviderError>;
        async fn update_listing(&self, payload: ListingPayload) -> Result<RemoteListing, ProviderError>;
        async fn delete_listing(&self, external_id: String) -> Result<(), ProviderError>;
        async fn relist_listing(&self, payload: ListingPayload) -> Result<RemoteListing, ProviderError>;
        async fn unlist_listing(&self, external_id: String) -> Result<(), ProviderError>;
    }
}

fn ebay(driver: MockMarketplace) -> PlatformRegistry {
    let mut registry = PlatformRegistry::new();
    registry.register(Arc::new(driver));
    registry
}

async fn listing(app: &TestApp, product_id: Uuid, platform: Platform) -> platform_listing::Model {
    app.state
        .services
        .listings
        .create(
            app.store_id,
            CreateListing {
                product_id,
                platform,
                should_list: None,
                price_override: None,
                quantity_override: None,
            },
        )
        .await
        .expect("create listing")
}

#[tokio::test]
async fn one_listing_per_product_and_platform() {
    let app = TestApp::new().await;
    let first = listing(&app, app.product_id, Platform::Local).await;
    assert_eq!(first.status, ListingStatus::Draft);
    assert!(first.should_list);

    let err = app
        .state
        .services
        .listings
        .create(
            app.store_id,
            CreateListing {
                product_id: app.product_id,
                platform: Platform::Local,
                should_list: None,
                price_override: None,
                quantity_override: None,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));
}

#[tokio::test]
async fn bulk_status_reports_each_failure() {
    let app = TestApp::new().await;
    let second_product = Uuid::new_v4();
    app.add_product("Silver bracelet", second_product, Uuid::new_v4())
        .await;
    let a = listing(&app, app.product_id, Platform::Local).await;
    let b = listing(&app, second_product, Platform::Local).await;
    let missing = Uuid::new_v4();

    let outcome = app
        .state
        .services
        .listings
        .bulk_update_status(app.store_id, vec![a.id, missing, b.id], ListingStatus::Pending)
        .await;

    assert_eq!(outcome.updated, 2);
    assert_eq!(outcome.errors.len(), 1);
    assert!(outcome.errors[0].contains(&missing.to_string()));
}

#[tokio::test]
async fn sold_is_not_reachable_from_draft() {
    let app = TestApp::new().await;
    let draft = listing(&app, app.product_id, Platform::Local).await;

    let err = app
        .state
        .services
        .listings
        .transition_to(app.store_id, draft.id, ListingStatus::Sold)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));
}

#[tokio::test]
async fn local_publish_lists_available_stock() {
    let app = TestApp::new().await;
    app.state
        .services
        .inventory
        .stock_variant(
            app.store_id,
            app.user_id,
            StockVariantInput {
                product_variant_id: app.variant_id,
                warehouse_id: app.warehouse_id,
                quantity: 4,
                unit_cost: None,
                reorder_point: None,
                bin_location: None,
            },
        )
        .await
        .unwrap();
    let draft = listing(&app, app.product_id, Platform::Local).await;
    let service = &app.state.services.listings;

    let live = service.publish(app.store_id, draft.id).await.unwrap();
    assert_eq!(live.status, ListingStatus::Active);
    assert_eq!(
        live.external_id,
        Some(format!("local-{}", draft.id.simple()))
    );
    assert!(live.published_at.is_some());

    let ended = service.unlist(app.store_id, draft.id).await.unwrap();
    assert_eq!(ended.status, ListingStatus::Ended);
    assert!(ended.ended_at.is_some());

    let relisted = service.relist(app.store_id, draft.id).await.unwrap();
    assert_eq!(relisted.status, ListingStatus::Active);
    assert!(relisted.ended_at.is_none());
}

#[tokio::test]
async fn payload_carries_overrides_and_stock() {
    let mut driver = MockMarketplace::new();
    driver.expect_platform().return_const(Platform::Ebay);
    driver
        .expect_push_product()
        .withf(|payload| payload.price == dec!(199.99) && payload.quantity == 0)
        .times(1)
        .returning(|payload| {
            Ok(RemoteListing {
                external_id: "EB-1".to_string(),
                external_url: Some(format!("https://ebay.test/itm/{}", payload.listing_id)),
            })
        });
    let app = TestApp::with_platforms(ebay(driver)).await;
    let created = app
        .state
        .services
        .listings
        .create(
            app.store_id,
            CreateListing {
                product_id: app.product_id,
                platform: Platform::Ebay,
                should_list: Some(true),
                price_override: Some(dec!(199.99)),
                quantity_override: None,
            },
        )
        .await
        .unwrap();

    let live = app
        .state
        .services
        .listings
        .publish(app.store_id, created.id)
        .await
        .unwrap();
    assert_eq!(live.external_id.as_deref(), Some("EB-1"));
    assert!(live.external_url.is_some());
    assert!(live.last_error.is_none());
}

#[tokio::test]
async fn platform_failure_is_a_bad_gateway_and_recorded() {
    let mut driver = MockMarketplace::new();
    driver.expect_platform().return_const(Platform::Ebay);
    driver
        .expect_push_product()
        .returning(|_| Err(ProviderError::Failed("ebay rejected the category".to_string())));
    let app = TestApp::with_platforms(ebay(driver)).await;
    let draft = listing(&app, app.product_id, Platform::Ebay).await;

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/listings/{}/publish", draft.id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["message"], "ebay rejected the category");

    let after = app
        .state
        .services
        .listings
        .get(app.store_id, draft.id)
        .await
        .unwrap();
    assert_eq!(after.status, ListingStatus::Error);
    assert_eq!(after.last_error.as_deref(), Some("ebay rejected the category"));
}

#[tokio::test]
async fn unregistered_platform_is_not_configured() {
    let app = TestApp::new().await;
    let draft = listing(&app, app.product_id, Platform::Etsy).await;

    let err = app
        .state
        .services
        .listings
        .publish(app.store_id, draft.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(ref msg) if msg.contains("not configured"));

    let untouched = app
        .state
        .services
        .listings
        .get(app.store_id, draft.id)
        .await
        .unwrap();
    assert_eq!(untouched.status, ListingStatus::Draft);
    assert!(untouched.last_error.is_none());
}

#[tokio::test]
async fn delete_removes_remote_then_local() {
    let mut driver = MockMarketplace::new();
    driver.expect_platform().return_const(Platform::Ebay);
    driver.expect_push_product().returning(|_| {
        Ok(RemoteListing {
            external_id: "EB-9".to_string(),
            external_url: None,
        })
    });
    driver
        .expect_delete_listing()
        .withf(|external_id| external_id == "EB-9")
        .times(1)
        .returning(|_| Ok(()));
    let app = TestApp::with_platforms(ebay(driver)).await;
    let draft = listing(&app, app.product_id, Platform::Ebay).await;
    let service = &app.state.services.listings;
    service.publish(app.store_id, draft.id).await.unwrap();

    service.delete_remote(app.store_id, draft.id).await.unwrap();
    let err = service.get(app.store_id, draft.id).await.unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}
