mod common;

use assert_matches::assert_matches;
use common::TestApp;
use storekeep_api::{
    entities::category,
    errors::ServiceError,
    services::categories::{
        CategorySettings, CreateCategory, ReorderEntry, UpdateCategory, DEFAULT_SKU_FORMAT,
    },
    services::sku::MAX_SEQUENCE_VALUE,
};
use uuid::Uuid;

async fn create(
    app: &TestApp,
    name: &str,
    parent_id: Option<Uuid>,
    settings: CategorySettings,
) -> category::Model {
    app.state
        .services
        .categories
        .create(
            app.store_id,
            CreateCategory {
                name: name.to_string(),
                parent_id,
                sort_order: None,
                settings,
            },
        )
        .await
        .expect("create category")
}

#[tokio::test]
async fn children_inherit_the_nearest_setting() {
    let app = TestApp::new().await;
    let jewelry = create(
        &app,
        "Jewelry",
        None,
        CategorySettings {
            sku_prefix: Some("JWL".to_string()),
            charge_taxes: Some(false),
            barcode_attributes: Some(vec!["karat".to_string(), "weight".to_string()]),
            ..Default::default()
        },
    )
    .await;
    let rings = create(&app, "Rings", Some(jewelry.id), CategorySettings::default()).await;
    let gold = create(
        &app,
        "Gold rings",
        Some(rings.id),
        CategorySettings {
            sku_format: Some("{prefix}-{category_code}-{sequence:4}".to_string()),
            ..Default::default()
        },
    )
    .await;
    assert_eq!(gold.level, 2);

    let categories = &app.state.services.categories;
    let effective = categories.effective_settings(app.store_id, gold.id).await.unwrap();
    assert_eq!(effective.sku_prefix, "JWL");
    assert_eq!(effective.sku_format, "{prefix}-{category_code}-{sequence:4}");
    assert!(!effective.charge_taxes);
    assert_eq!(effective.barcode_attributes, vec!["karat", "weight"]);

    let rings_settings = categories.effective_settings(app.store_id, rings.id).await.unwrap();
    assert_eq!(rings_settings.sku_format, DEFAULT_SKU_FORMAT);

    assert!(categories.is_descendant(app.store_id, jewelry.id, gold.id).await.unwrap());
    assert!(!categories.is_descendant(app.store_id, gold.id, jewelry.id).await.unwrap());
}

#[tokio::test]
async fn settings_on_a_parent_are_refused() {
    let app = TestApp::new().await;
    let parent = create(&app, "Electronics", None, CategorySettings::default()).await;
    create(&app, "Phones", Some(parent.id), CategorySettings::default()).await;

    let err = app
        .state
        .services
        .categories
        .update(
            app.store_id,
            parent.id,
            UpdateCategory {
                settings: CategorySettings {
                    sku_prefix: Some("ELE".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn moving_under_a_descendant_is_a_cycle() {
    let app = TestApp::new().await;
    let root = create(&app, "Tools", None, CategorySettings::default()).await;
    let child = create(&app, "Power tools", Some(root.id), CategorySettings::default()).await;
    let grandchild = create(&app, "Drills", Some(child.id), CategorySettings::default()).await;

    let err = app
        .state
        .services
        .categories
        .update(
            app.store_id,
            root.id,
            UpdateCategory {
                parent_id: Some(Some(grandchild.id)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let unchanged = app.state.services.categories.get(app.store_id, root.id).await.unwrap();
    assert_eq!(unchanged.parent_id, None);
}

#[tokio::test]
async fn reorder_recomputes_levels_of_the_moved_subtree() {
    let app = TestApp::new().await;
    let music = create(&app, "Music", None, CategorySettings::default()).await;
    let guitars = create(&app, "Guitars", None, CategorySettings::default()).await;
    let acoustic = create(&app, "Acoustic", Some(guitars.id), CategorySettings::default()).await;

    let tree = app
        .state
        .services
        .categories
        .reorder(
            app.store_id,
            vec![ReorderEntry {
                id: guitars.id,
                parent_id: Some(music.id),
                sort_order: 0,
            }],
        )
        .await
        .unwrap();

    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].category.id, music.id);
    assert_eq!(tree[0].children[0].category.id, guitars.id);

    let moved = app
        .state
        .services
        .categories
        .get(app.store_id, acoustic.id)
        .await
        .unwrap();
    assert_eq!(moved.level, 2);
}

#[tokio::test]
async fn delete_refuses_parents() {
    let app = TestApp::new().await;
    let parent = create(&app, "Coins", None, CategorySettings::default()).await;
    let child = create(&app, "Silver coins", Some(parent.id), CategorySettings::default()).await;
    let categories = &app.state.services.categories;

    let err = categories.delete(app.store_id, parent.id).await.unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));

    categories.delete(app.store_id, child.id).await.unwrap();
    categories.delete(app.store_id, parent.id).await.unwrap();
    assert!(categories.tree(app.store_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn preview_does_not_consume_the_sequence() {
    let app = TestApp::new().await;
    let watches = create(
        &app,
        "Watches",
        None,
        CategorySettings {
            sku_prefix: Some("WAT".to_string()),
            ..Default::default()
        },
    )
    .await;
    let sku = &app.state.services.sku;

    let first = sku.preview(app.store_id, watches.id).await.unwrap();
    let second = sku.preview(app.store_id, watches.id).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.sku, "WAT-00001");
    assert_eq!(first.next_value, 1);

    assert_eq!(sku.generate(app.store_id, watches.id).await.unwrap(), "WAT-00001");
    assert_eq!(sku.generate(app.store_id, watches.id).await.unwrap(), "WAT-00002");
    assert_eq!(sku.preview(app.store_id, watches.id).await.unwrap().next_value, 3);
}

#[tokio::test]
async fn reset_sets_the_next_number() {
    let app = TestApp::new().await;
    let cameras = create(
        &app,
        "Cameras",
        None,
        CategorySettings {
            sku_format: Some("{category_code}{sequence:3}".to_string()),
            ..Default::default()
        },
    )
    .await;
    let sku = &app.state.services.sku;
    sku.generate(app.store_id, cameras.id).await.unwrap();

    let preview = sku.reset_to(app.store_id, cameras.id, 500).await.unwrap();
    assert_eq!(preview.sku, "CAM500");
    assert_eq!(sku.generate(app.store_id, cameras.id).await.unwrap(), "CAM500");

    let err = sku.reset_to(app.store_id, cameras.id, 0).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
    let err = sku.reset_to(app.store_id, cameras.id, i64::MAX).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn exhausted_sequence_stops_generating() {
    let app = TestApp::new().await;
    let lenses = create(
        &app,
        "Lenses",
        None,
        CategorySettings {
            sku_format: Some("{category_code}{sequence:3}".to_string()),
            ..Default::default()
        },
    )
    .await;
    let sku = &app.state.services.sku;

    sku.reset_to(app.store_id, lenses.id, MAX_SEQUENCE_VALUE).await.unwrap();
    assert_eq!(
        sku.generate(app.store_id, lenses.id).await.unwrap(),
        format!("LEN{}", MAX_SEQUENCE_VALUE)
    );

    let err = sku.generate(app.store_id, lenses.id).await.unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(ref msg) if msg.contains("exhausted"));
}

#[tokio::test]
async fn skus_are_only_generated_for_leaves() {
    let app = TestApp::new().await;
    let parent = create(&app, "Games", None, CategorySettings::default()).await;
    create(&app, "Consoles", Some(parent.id), CategorySettings::default()).await;

    let err = app
        .state
        .services
        .sku
        .generate(app.store_id, parent.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));
}

#[tokio::test]
async fn invalid_format_is_rejected_on_create() {
    let app = TestApp::new().await;
    let err = app
        .state
        .services
        .categories
        .create(
            app.store_id,
            CreateCategory {
                name: "Bad".to_string(),
                parent_id: None,
                sort_order: None,
                settings: CategorySettings {
                    sku_format: Some("{prefix}-{serial}".to_string()),
                    ..Default::default()
                },
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(ref msg) if msg.contains("Unknown token"));
}
