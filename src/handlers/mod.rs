pub mod categories;
pub mod common;
pub mod inventory;
pub mod listings;
pub mod purchase_orders;
pub mod sku;
pub mod transactions;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    services::{
        categories::CategoryService,
        collaborators::Collaborators,
        inventory_ledger::InventoryLedgerService,
        listings::{ListingService, PlatformRegistry},
        purchase_orders::PurchaseOrderService,
        sku::SkuGeneratorService,
        transactions::TransactionService,
    },
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub inventory: Arc<InventoryLedgerService>,
    pub purchase_orders: Arc<PurchaseOrderService>,
    pub transactions: Arc<TransactionService>,
    pub categories: Arc<CategoryService>,
    pub sku: Arc<SkuGeneratorService>,
    pub listings: Arc<ListingService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: EventSender,
        config: &AppConfig,
        collaborators: Collaborators,
        platforms: Arc<PlatformRegistry>,
    ) -> Self {
        let ledger = InventoryLedgerService::new(
            db_pool.clone(),
            event_sender.clone(),
            config.allow_negative_stock,
        );

        Self {
            purchase_orders: Arc::new(PurchaseOrderService::new(
                db_pool.clone(),
                event_sender.clone(),
                ledger.clone(),
            )),
            inventory: Arc::new(ledger),
            transactions: Arc::new(TransactionService::new(
                db_pool.clone(),
                event_sender.clone(),
                collaborators,
                config.payment_tolerance,
            )),
            categories: Arc::new(CategoryService::new(db_pool.clone(), event_sender.clone())),
            sku: Arc::new(SkuGeneratorService::new(db_pool.clone(), event_sender.clone())),
            listings: Arc::new(ListingService::new(db_pool, event_sender, platforms)),
        }
    }
}
