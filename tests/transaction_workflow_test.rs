mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use common::TestApp;
use mockall::mock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use storekeep_api::{
    entities::{
        transaction, transaction_offer::OfferStatus, transaction_payment::PaymentMethod,
    },
    errors::ServiceError,
    services::{
        collaborators::{
            Collaborators, PayoutProvider, PayoutReceipt, PayoutRequest, ProviderError,
        },
        transaction_workflow::{
            TransactionAction, TransactionStatus, TransactionType, TransitionError,
        },
        transactions::{CreateTransaction, NewItem, PaymentLine, ReviewItem},
    },
};
use uuid::Uuid;

mock! {
    Payouts {}

    #[async_trait]
    impl PayoutProvider for Payouts {
        fn is_configured(&self) -> bool;
        async fn send_transaction_payout(
            &self,
            request: PayoutRequest,
        ) -> Result<PayoutReceipt, ProviderError>;
    }
}

fn ring() -> NewItem {
    NewItem {
        title: "14k gold ring".to_string(),
        category_id: None,
        metal_type: Some("gold".to_string()),
        karat: Some("14k".to_string()),
        weight_grams: Some(dec!(3.2)),
        condition: Some("used".to_string()),
        price: None,
        notes: None,
    }
}

fn payment(method: PaymentMethod, amount: Decimal) -> PaymentLine {
    PaymentLine {
        method,
        amount,
        reference: None,
    }
}

async fn in_house(app: &TestApp) -> transaction::Model {
    app.state
        .services
        .transactions
        .create(
            app.store_id,
            app.user_id,
            CreateTransaction {
                transaction_type: TransactionType::InHouse,
                source: None,
                customer_name: Some("Dana Reyes".to_string()),
                customer_email: Some("dana@example.test".to_string()),
                customer_phone: None,
                notes: None,
                items: vec![ring()],
            },
        )
        .await
        .expect("create transaction")
}

/// Walks an in-house transaction to OfferAccepted with an offer of `amount`.
async fn accepted_offer(app: &TestApp, amount: Decimal) -> Uuid {
    let service = &app.state.services.transactions;
    let created = in_house(app).await;
    let detail = service.get(app.store_id, created.id).await.unwrap();
    service
        .review_item(
            app.store_id,
            app.user_id,
            created.id,
            detail.items[0].id,
            ReviewItem {
                buy_price: amount,
                condition: None,
                notes: None,
            },
        )
        .await
        .unwrap();
    service
        .mark_items_reviewed(app.store_id, app.user_id, created.id)
        .await
        .unwrap();
    service
        .submit_offer(app.store_id, app.user_id, created.id, amount, None)
        .await
        .unwrap();
    let accepted = service
        .accept_offer(app.store_id, app.user_id, created.id)
        .await
        .unwrap();
    assert_eq!(accepted.status, TransactionStatus::OfferAccepted);
    assert_eq!(accepted.final_offer, Some(amount));
    created.id
}

#[tokio::test]
async fn new_in_house_transaction_starts_pending() {
    let app = TestApp::new().await;
    let created = in_house(&app).await;

    assert_eq!(created.status, TransactionStatus::Pending);
    assert_eq!(created.transaction_number, "TXN-000001");
    assert_eq!(created.version, 1);

    let detail = app
        .state
        .services
        .transactions
        .get(app.store_id, created.id)
        .await
        .unwrap();
    assert_eq!(detail.items.len(), 1);
    assert!(detail.allowed_actions.contains(&TransactionAction::MarkItemsReviewed));
    assert!(!detail.allowed_actions.contains(&TransactionAction::ConfirmKitRequest));
}

#[tokio::test]
async fn review_cannot_complete_with_unreviewed_items() {
    let app = TestApp::new().await;
    let created = in_house(&app).await;

    let err = app
        .state
        .services
        .transactions
        .mark_items_reviewed(app.store_id, app.user_id, created.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let unchanged = app
        .state
        .services
        .transactions
        .get(app.store_id, created.id)
        .await
        .unwrap();
    assert_eq!(unchanged.transaction.status, TransactionStatus::Pending);
    assert_eq!(unchanged.transaction.version, 1);
}

#[tokio::test]
async fn split_payment_settles_the_offer() {
    let app = TestApp::new().await;
    let id = accepted_offer(&app, dec!(100)).await;
    let service = &app.state.services.transactions;

    let paid = service
        .process_multiple_payments(
            app.store_id,
            app.user_id,
            id,
            vec![
                payment(PaymentMethod::Cash, dec!(40)),
                payment(PaymentMethod::Check, dec!(60)),
            ],
        )
        .await
        .unwrap();
    assert_eq!(paid.status, TransactionStatus::PaymentProcessed);
    assert_eq!(paid.payment_method.as_deref(), Some("split"));
    assert!(paid.payment_processed_at.is_some());

    let detail = service.get(app.store_id, id).await.unwrap();
    assert_eq!(detail.payments.len(), 2);
    assert!(detail.allowed_actions.is_empty());
}

#[tokio::test]
async fn short_payment_is_rejected_without_writes() {
    let app = TestApp::new().await;
    let id = accepted_offer(&app, dec!(100)).await;
    let service = &app.state.services.transactions;

    let err = service
        .process_multiple_payments(
            app.store_id,
            app.user_id,
            id,
            vec![
                payment(PaymentMethod::Cash, dec!(40)),
                payment(PaymentMethod::Check, dec!(50)),
            ],
        )
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::ValidationError(ref msg) if msg == "Total payments must equal the offer amount."
    );

    let detail = service.get(app.store_id, id).await.unwrap();
    assert_eq!(detail.transaction.status, TransactionStatus::OfferAccepted);
    assert!(detail.payments.is_empty());
}

#[tokio::test]
async fn paypal_without_a_provider_is_refused() {
    let app = TestApp::new().await;
    let id = accepted_offer(&app, dec!(25)).await;

    let err = app
        .state
        .services
        .transactions
        .process_payment(
            app.store_id,
            app.user_id,
            id,
            payment(PaymentMethod::Paypal, dec!(25)),
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(ref msg) if msg.contains("not configured"));
}

#[tokio::test]
async fn paypal_payout_id_is_stored_on_the_payment() {
    let mut payouts = MockPayouts::new();
    payouts.expect_is_configured().return_const(true);
    payouts
        .expect_send_transaction_payout()
        .withf(|request| request.amount == dec!(25))
        .times(1)
        .returning(|_| {
            Ok(PayoutReceipt {
                payout_id: "PAYOUT-77".to_string(),
            })
        });
    let app = TestApp::with_collaborators(Collaborators {
        payouts: Arc::new(payouts),
        ..Collaborators::default()
    })
    .await;
    let id = accepted_offer(&app, dec!(25)).await;
    let service = &app.state.services.transactions;

    let paid = service
        .process_payment(
            app.store_id,
            app.user_id,
            id,
            payment(PaymentMethod::Paypal, dec!(25)),
        )
        .await
        .unwrap();
    assert_eq!(paid.payment_method.as_deref(), Some("paypal"));

    let detail = service.get(app.store_id, id).await.unwrap();
    assert_eq!(detail.payments[0].payout_id.as_deref(), Some("PAYOUT-77"));
}

#[tokio::test]
async fn failed_payout_leaves_the_offer_accepted() {
    let mut payouts = MockPayouts::new();
    payouts.expect_is_configured().return_const(true);
    payouts
        .expect_send_transaction_payout()
        .returning(|_| Err(ProviderError::Failed("payee unknown".to_string())));
    let app = TestApp::with_collaborators(Collaborators {
        payouts: Arc::new(payouts),
        ..Collaborators::default()
    })
    .await;
    let id = accepted_offer(&app, dec!(10)).await;

    let err = app
        .state
        .services
        .transactions
        .process_payment(
            app.store_id,
            app.user_id,
            id,
            payment(PaymentMethod::Paypal, dec!(10)),
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ExternalServiceError(_));

    let detail = app
        .state
        .services
        .transactions
        .get(app.store_id, id)
        .await
        .unwrap();
    assert_eq!(detail.transaction.status, TransactionStatus::OfferAccepted);
}

#[tokio::test]
async fn mail_in_actions_do_not_apply_to_in_house() {
    let app = TestApp::new().await;
    let created = in_house(&app).await;

    let err = app
        .state
        .services
        .transactions
        .confirm_kit_request(app.store_id, app.user_id, created.id)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::InvalidTransition(TransitionError::NotApplicable {
            action: TransactionAction::ConfirmKitRequest,
            kind: TransactionType::InHouse,
        })
    );
}

#[tokio::test]
async fn declined_offer_can_be_reopened_and_reset() {
    let app = TestApp::new().await;
    let service = &app.state.services.transactions;
    let created = in_house(&app).await;
    let detail = service.get(app.store_id, created.id).await.unwrap();
    service
        .review_item(
            app.store_id,
            app.user_id,
            created.id,
            detail.items[0].id,
            ReviewItem {
                buy_price: dec!(80),
                condition: Some("scratched".to_string()),
                notes: None,
            },
        )
        .await
        .unwrap();
    service
        .mark_items_reviewed(app.store_id, app.user_id, created.id)
        .await
        .unwrap();
    service
        .submit_offer(app.store_id, app.user_id, created.id, dec!(80), None)
        .await
        .unwrap();

    let declined = service
        .decline_offer(app.store_id, app.user_id, created.id, Some("too low".into()))
        .await
        .unwrap();
    assert_eq!(declined.status, TransactionStatus::OfferDeclined);

    let reopened = service
        .reopen_offer(app.store_id, app.user_id, created.id)
        .await
        .unwrap();
    assert_eq!(reopened.status, TransactionStatus::OfferGiven);

    let offers = service.get(app.store_id, created.id).await.unwrap().offers;
    assert_eq!(offers.len(), 1);
    let reset = service
        .reset_to_items_reviewed(app.store_id, app.user_id, created.id, offers[0].id)
        .await
        .unwrap();
    assert_eq!(reset.status, TransactionStatus::ItemsReviewed);
    assert!(reset.offer_given_at.is_none());
    assert!(service
        .get(app.store_id, created.id)
        .await
        .unwrap()
        .offers
        .is_empty());
}

#[tokio::test]
async fn only_one_offer_is_pending_at_a_time() {
    let app = TestApp::new().await;
    let id = accepted_offer(&app, dec!(100)).await;
    let service = &app.state.services.transactions;

    service.reopen_offer(app.store_id, app.user_id, id).await.unwrap();
    let err = service
        .submit_offer(app.store_id, app.user_id, id, dec!(110), None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidTransition(_));

    let offers = service.get(app.store_id, id).await.unwrap().offers;
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].status, OfferStatus::Pending);
    assert_eq!(offers[0].amount, dec!(100));
}

#[tokio::test]
async fn reset_only_discards_the_latest_offer() {
    let app = TestApp::new().await;
    let id = accepted_offer(&app, dec!(100)).await;
    let service = &app.state.services.transactions;

    service.reopen_offer(app.store_id, app.user_id, id).await.unwrap();
    service
        .decline_offer(app.store_id, app.user_id, id, None)
        .await
        .unwrap();
    service
        .submit_offer(app.store_id, app.user_id, id, dec!(120), None)
        .await
        .unwrap();

    let offers = service.get(app.store_id, id).await.unwrap().offers;
    let first = offers.iter().find(|o| o.amount == dec!(100)).expect("first offer");
    let counter = offers.iter().find(|o| o.amount == dec!(120)).expect("counter offer");
    assert_eq!(counter.status, OfferStatus::Pending);

    let err = service
        .reset_to_items_reviewed(app.store_id, app.user_id, id, first.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));
    let unchanged = service.get(app.store_id, id).await.unwrap();
    assert_eq!(unchanged.transaction.status, TransactionStatus::OfferGiven);
    assert_eq!(unchanged.offers.len(), 2);

    let reset = service
        .reset_to_items_reviewed(app.store_id, app.user_id, id, counter.id)
        .await
        .unwrap();
    assert_eq!(reset.status, TransactionStatus::ItemsReviewed);
    let remaining = service.get(app.store_id, id).await.unwrap();
    assert_eq!(remaining.offers.len(), 1);
    assert_eq!(remaining.offers[0].status, OfferStatus::Declined);
    assert!(remaining
        .allowed_actions
        .contains(&TransactionAction::SubmitOffer));

    let again = service
        .submit_offer(app.store_id, app.user_id, id, dec!(90), None)
        .await
        .unwrap();
    assert_eq!(again.status, TransactionStatus::OfferGiven);
}

#[tokio::test]
async fn change_status_follows_the_single_reaching_action() {
    let app = TestApp::new().await;
    let created = in_house(&app).await;
    let service = &app.state.services.transactions;

    let cancelled = service
        .change_status(
            app.store_id,
            app.user_id,
            created.id,
            TransactionStatus::Cancelled,
            Some("customer left".into()),
        )
        .await
        .unwrap();
    assert_eq!(cancelled.status, TransactionStatus::Cancelled);
    assert_eq!(cancelled.status_reason.as_deref(), Some("customer left"));

    let err = service
        .change_status(
            app.store_id,
            app.user_id,
            created.id,
            TransactionStatus::Pending,
            None,
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidOperation(_));
}

#[tokio::test]
async fn activity_records_each_step() {
    let app = TestApp::new().await;
    let id = accepted_offer(&app, dec!(50)).await;

    let activity = app
        .state
        .services
        .transactions
        .activity(app.store_id, id)
        .await
        .unwrap();
    let actions: Vec<&str> = activity.iter().map(|a| a.action.as_str()).collect();
    assert_eq!(actions.len(), 4);
    for expected in ["create", "mark_items_reviewed", "submit_offer", "accept_offer"] {
        assert!(actions.contains(&expected), "missing {expected}");
    }
    let accept = activity
        .iter()
        .find(|a| a.action == "accept_offer")
        .expect("accept row");
    assert_eq!(accept.from_status.as_deref(), Some("offer_given"));
    assert_eq!(accept.to_status.as_deref(), Some("offer_accepted"));
}
