// Tenancy and catalog
pub mod product;
pub mod product_variant;
pub mod store;
pub mod store_sequence;
pub mod vendor;
pub mod warehouse;

// Inventory ledger
pub mod inventory;
pub mod inventory_adjustment;

// Buy transactions
pub mod activity_log;
pub mod transaction;
pub mod transaction_item;
pub mod transaction_offer;
pub mod transaction_payment;

// Procurement
pub mod purchase_order;
pub mod purchase_order_item;
pub mod purchase_order_receipt;
pub mod purchase_order_receipt_item;

// Catalog organisation
pub mod category;
pub mod sku_sequence;

// Marketplaces
pub mod platform_listing;
