use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

use crate::handlers::{categories, inventory, listings, purchase_orders, sku, transactions};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storekeep API",
        version = "0.1.0",
        description = r#"
# Storekeep API

Back office for independent retail and pawn stores.

- **Inventory**: per-warehouse stock with an append-only adjustment ledger
- **Purchase orders**: vendor orders with partial receiving into inventory
- **Buy transactions**: mail-in and in-house buys, from kit request to payout
- **Categories**: store category tree with inherited SKU and label settings
- **SKU sequencing**: per-category formats and counters
- **Listings**: marketplace listings and their sync state

## Tenancy

Every call under `/api/v1` carries two headers:

```
x-store-id: <store uuid>
x-user-id: <acting user uuid>
```

A missing or unknown store is rejected with 401.

## Responses

Successful calls return `{"success": true, "data": ..., "meta": {...}}`.
Failures return `{"success": false, "error": "...", "message": "..."}` with
the matching HTTP status.
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers((url = "http://localhost:8080", description = "Local development")),
    tags(
        (name = "inventory", description = "Stock levels and the adjustment ledger"),
        (name = "purchase-orders", description = "Vendor purchasing and receiving"),
        (name = "transactions", description = "Buy transactions and payouts"),
        (name = "categories", description = "Category hierarchy"),
        (name = "sku", description = "SKU formats and sequences"),
        (name = "listings", description = "Marketplace listings")
    ),
    paths(
        inventory::stock_variant,
        inventory::low_stock,
        inventory::get_inventory,
        inventory::update_inventory,
        inventory::adjust_inventory,
        inventory::list_adjustments,
        inventory::audit_inventory,

        purchase_orders::create_purchase_order,
        purchase_orders::list_purchase_orders,
        purchase_orders::get_purchase_order,
        purchase_orders::update_purchase_order,
        purchase_orders::delete_purchase_order,
        purchase_orders::submit_purchase_order,
        purchase_orders::approve_purchase_order,
        purchase_orders::cancel_purchase_order,
        purchase_orders::close_purchase_order,
        purchase_orders::receive_purchase_order,
        purchase_orders::list_receipts,
        purchase_orders::purchase_order_progress,

        transactions::create_transaction,
        transactions::list_transactions,
        transactions::get_transaction,
        transactions::add_item,
        transactions::review_item,
        transactions::confirm_kit_request,
        transactions::reject_kit_request,
        transactions::hold_kit_request,
        transactions::mark_kit_sent,
        transactions::mark_kit_delivered,
        transactions::mark_items_received,
        transactions::mark_items_reviewed,
        transactions::submit_offer,
        transactions::accept_offer,
        transactions::decline_offer,
        transactions::reopen_offer,
        transactions::reset_offer,
        transactions::request_payment,
        transactions::process_payments,
        transactions::request_return,
        transactions::mark_return_shipped,
        transactions::mark_items_returned,
        transactions::cancel_transaction,
        transactions::change_status,
        transactions::create_shipping_label,
        transactions::download_label,
        transactions::transaction_activity,

        categories::category_tree,
        categories::create_category,
        categories::get_category,
        categories::update_category,
        categories::delete_category,
        categories::reorder_categories,
        categories::effective_settings,
        categories::is_descendant,
        categories::preview_sku,
        categories::generate_sku,
        categories::reset_sku_sequence,
        sku::validate_format,

        listings::create_listing,
        listings::list_listings,
        listings::get_listing,
        listings::update_listing,
        listings::delete_listing,
        listings::change_listing_status,
        listings::publish_listing,
        listings::unlist_listing,
        listings::relist_listing,
        listings::bulk_update_status,
        listings::bulk_publish,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,
            crate::PaginatedResponse<serde_json::Value>,
            crate::errors::ErrorResponse,
            crate::handlers::common::ReasonRequest,
            transactions::TrackingRequest,
            transactions::OfferRequest,
            transactions::PaymentsRequest,
            transactions::StatusChangeRequest,
            transactions::ShippingLabelRequest,
            categories::ReorderRequest,
            categories::ResetSequenceRequest,
            sku::FormatRequest,
            listings::ListingStatusRequest,
            listings::BulkStatusRequest,
            listings::BulkPublishRequest,
        )
    )
)]
pub struct ApiDocV1;

/// Serves the generated document at `/api-docs/openapi.json`.
pub fn openapi_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDocV1::openapi()) }),
    )
}
