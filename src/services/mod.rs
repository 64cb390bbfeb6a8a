// Shared plumbing
pub mod activity;
pub mod collaborators;
pub mod sequences;

// Stock
pub mod inventory_ledger;
pub mod purchase_orders;

// Buy workflow
pub mod transaction_workflow;
pub mod transactions;

// Catalog organisation
pub mod categories;
pub mod sku;

// Marketplaces
pub mod listings;
