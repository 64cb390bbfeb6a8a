//! Buy-transaction state machine.
//!
//! Every forward step and every rollback of a transaction is a
//! [`TransactionAction`]. [`attempt_transition`] is the only place the legal
//! moves are listed; the other helpers here are derived from it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use thiserror::Error;
use utoipa::ToSchema;

/// Workflow status of a buy transaction.
///
/// `Pending` belongs to in-house intake only; the kit and return states belong
/// to mail-in intake only. The offer and payment states are shared.
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
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "pending_kit_request")]
    PendingKitRequest,
    #[sea_orm(string_value = "kit_request_confirmed")]
    KitRequestConfirmed,
    #[sea_orm(string_value = "kit_request_on_hold")]
    KitRequestOnHold,
    #[sea_orm(string_value = "kit_request_rejected")]
    KitRequestRejected,
    #[sea_orm(string_value = "kit_sent")]
    KitSent,
    #[sea_orm(string_value = "kit_delivered")]
    KitDelivered,
    #[sea_orm(string_value = "items_received")]
    ItemsReceived,
    #[sea_orm(string_value = "items_reviewed")]
    ItemsReviewed,
    #[sea_orm(string_value = "offer_given")]
    OfferGiven,
    #[sea_orm(string_value = "offer_accepted")]
    OfferAccepted,
    #[sea_orm(string_value = "offer_declined")]
    OfferDeclined,
    #[sea_orm(string_value = "payment_pending")]
    PaymentPending,
    #[sea_orm(string_value = "payment_processed")]
    PaymentProcessed,
    #[sea_orm(string_value = "return_requested")]
    ReturnRequested,
    #[sea_orm(string_value = "return_shipped")]
    ReturnShipped,
    #[sea_orm(string_value = "items_returned")]
    ItemsReturned,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl TransactionStatus {
    /// No action leaves a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::KitRequestRejected | Self::PaymentProcessed | Self::ItemsReturned | Self::Cancelled
        )
    }

    /// Whether a transaction of `kind` can ever be in this status.
    pub fn belongs_to(self, kind: TransactionType) -> bool {
        match kind {
            TransactionType::MailIn => self != Self::Pending,
            TransactionType::InHouse => matches!(
                self,
                Self::Pending
                    | Self::ItemsReviewed
                    | Self::OfferGiven
                    | Self::OfferAccepted
                    | Self::OfferDeclined
                    | Self::PaymentPending
                    | Self::PaymentProcessed
                    | Self::Cancelled
            ),
        }
    }

    /// Items may be added or re-reviewed until an offer goes out.
    pub fn items_editable(self) -> bool {
        matches!(
            self,
            Self::Pending | Self::KitDelivered | Self::ItemsReceived | Self::ItemsReviewed
        )
    }
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
pub enum TransactionType {
    #[sea_orm(string_value = "in_house")]
    InHouse,
    #[sea_orm(string_value = "mail_in")]
    MailIn,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
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
pub enum TransactionSource {
    #[sea_orm(string_value = "online")]
    Online,
    #[sea_orm(string_value = "in_store")]
    InStore,
}

/// A step a user can take on a transaction, forward or reverse.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionAction {
    ConfirmKitRequest,
    RejectKitRequest,
    HoldKitRequest,
    MarkKitSent,
    MarkKitDelivered,
    MarkItemsReceived,
    MarkItemsReviewed,
    SubmitOffer,
    AcceptOffer,
    DeclineOffer,
    ReopenOffer,
    ResetToItemsReviewed,
    RequestPayment,
    ProcessPayment,
    RequestReturn,
    MarkReturnShipped,
    MarkItemsReturned,
    Cancel,
}

impl TransactionAction {
    /// Kit handling and returns only exist for mail-in intake.
    pub fn is_mail_in_only(self) -> bool {
        matches!(
            self,
            Self::ConfirmKitRequest
                | Self::RejectKitRequest
                | Self::HoldKitRequest
                | Self::MarkKitSent
                | Self::MarkKitDelivered
                | Self::MarkItemsReceived
                | Self::RequestReturn
                | Self::MarkReturnShipped
                | Self::MarkItemsReturned
        )
    }

    /// Reverse transitions undo offer decisions rather than advance the workflow.
    pub fn is_rollback(self) -> bool {
        matches!(self, Self::ReopenOffer | Self::ResetToItemsReviewed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot {action} from {from}")]
    NotAllowed {
        action: TransactionAction,
        from: TransactionStatus,
    },
    #[error("{action} does not apply to {kind} transactions")]
    NotApplicable {
        action: TransactionAction,
        kind: TransactionType,
    },
}

/// Status a new transaction of `kind` starts in.
pub fn initial_status(kind: TransactionType) -> TransactionStatus {
    match kind {
        TransactionType::InHouse => TransactionStatus::Pending,
        TransactionType::MailIn => TransactionStatus::PendingKitRequest,
    }
}

/// Applies `action` to a transaction of `kind` currently in `current`.
pub fn attempt_transition(
    kind: TransactionType,
    current: TransactionStatus,
    action: TransactionAction,
) -> Result<TransactionStatus, TransitionError> {
    use TransactionAction as A;
    use TransactionStatus as S;

    if kind == TransactionType::InHouse && action.is_mail_in_only() {
        return Err(TransitionError::NotApplicable { action, kind });
    }

    let not_allowed = TransitionError::NotAllowed {
        action,
        from: current,
    };
    if !current.belongs_to(kind) {
        return Err(not_allowed);
    }

    let next = match (current, action) {
        // Kit request
        (S::PendingKitRequest | S::KitRequestOnHold, A::ConfirmKitRequest) => {
            S::KitRequestConfirmed
        }
        (S::PendingKitRequest | S::KitRequestOnHold, A::RejectKitRequest) => {
            S::KitRequestRejected
        }
        (S::PendingKitRequest, A::HoldKitRequest) => S::KitRequestOnHold,

        // Kit logistics and intake
        (S::KitRequestConfirmed, A::MarkKitSent) => S::KitSent,
        (S::KitSent, A::MarkKitDelivered) => S::KitDelivered,
        (S::KitDelivered, A::MarkItemsReceived) => S::ItemsReceived,
        (S::ItemsReceived | S::Pending, A::MarkItemsReviewed) => S::ItemsReviewed,

        // Offers
        (S::ItemsReviewed | S::OfferDeclined, A::SubmitOffer) => S::OfferGiven,
        (S::OfferGiven, A::AcceptOffer) => S::OfferAccepted,
        (S::OfferGiven, A::DeclineOffer) => S::OfferDeclined,
        (S::OfferAccepted | S::OfferDeclined, A::ReopenOffer) => S::OfferGiven,
        (S::OfferGiven | S::OfferAccepted | S::OfferDeclined, A::ResetToItemsReviewed) => {
            S::ItemsReviewed
        }

        // Payment
        (S::OfferAccepted, A::RequestPayment) => S::PaymentPending,
        (S::OfferAccepted | S::PaymentPending, A::ProcessPayment) => S::PaymentProcessed,

        // Returns
        (
            S::KitDelivered | S::ItemsReceived | S::ItemsReviewed | S::OfferGiven | S::OfferDeclined,
            A::RequestReturn,
        ) => S::ReturnRequested,
        (S::ReturnRequested, A::MarkReturnShipped) => S::ReturnShipped,
        (S::ReturnShipped, A::MarkItemsReturned) => S::ItemsReturned,

        // Cancellation
        (
            S::Pending
            | S::PendingKitRequest
            | S::KitRequestConfirmed
            | S::KitRequestOnHold
            | S::KitSent
            | S::KitDelivered
            | S::ItemsReceived
            | S::ItemsReviewed
            | S::OfferGiven
            | S::OfferDeclined
            | S::ReturnRequested,
            A::Cancel,
        ) => S::Cancelled,

        _ => return Err(not_allowed),
    };

    Ok(next)
}

/// Every action that is legal from `current`.
pub fn allowed_actions(kind: TransactionType, current: TransactionStatus) -> Vec<TransactionAction> {
    TransactionAction::iter()
        .filter(|action| attempt_transition(kind, current, *action).is_ok())
        .collect()
}

/// Whether some single legal action moves `current` to `target`.
pub fn can_change_status_to(
    kind: TransactionType,
    current: TransactionStatus,
    target: TransactionStatus,
) -> bool {
    action_reaching(kind, current, target).is_some()
}

/// The first action that moves `current` to `target`, preferring forward moves.
pub fn action_reaching(
    kind: TransactionType,
    current: TransactionStatus,
    target: TransactionStatus,
) -> Option<TransactionAction> {
    let mut candidates: Vec<TransactionAction> = TransactionAction::iter()
        .filter(|action| attempt_transition(kind, current, *action) == Ok(target))
        .collect();
    candidates.sort_by_key(|action| action.is_rollback());
    candidates.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use super::TransactionAction as A;
    use super::TransactionStatus as S;
    use super::TransactionType::{InHouse, MailIn};

    #[rstest]
    #[case(S::PendingKitRequest, A::ConfirmKitRequest, S::KitRequestConfirmed)]
    #[case(S::PendingKitRequest, A::HoldKitRequest, S::KitRequestOnHold)]
    #[case(S::KitRequestOnHold, A::ConfirmKitRequest, S::KitRequestConfirmed)]
    #[case(S::KitRequestOnHold, A::RejectKitRequest, S::KitRequestRejected)]
    #[case(S::KitRequestConfirmed, A::MarkKitSent, S::KitSent)]
    #[case(S::KitSent, A::MarkKitDelivered, S::KitDelivered)]
    #[case(S::KitDelivered, A::MarkItemsReceived, S::ItemsReceived)]
    #[case(S::ItemsReceived, A::MarkItemsReviewed, S::ItemsReviewed)]
    #[case(S::ItemsReviewed, A::SubmitOffer, S::OfferGiven)]
    #[case(S::OfferDeclined, A::SubmitOffer, S::OfferGiven)]
    #[case(S::OfferGiven, A::AcceptOffer, S::OfferAccepted)]
    #[case(S::OfferGiven, A::DeclineOffer, S::OfferDeclined)]
    #[case(S::OfferAccepted, A::ReopenOffer, S::OfferGiven)]
    #[case(S::OfferAccepted, A::ResetToItemsReviewed, S::ItemsReviewed)]
    #[case(S::OfferAccepted, A::RequestPayment, S::PaymentPending)]
    #[case(S::PaymentPending, A::ProcessPayment, S::PaymentProcessed)]
    #[case(S::KitDelivered, A::RequestReturn, S::ReturnRequested)]
    #[case(S::ReturnRequested, A::MarkReturnShipped, S::ReturnShipped)]
    #[case(S::ReturnShipped, A::MarkItemsReturned, S::ItemsReturned)]
    #[case(S::KitSent, A::Cancel, S::Cancelled)]
    fn mail_in_transitions(
        #[case] from: TransactionStatus,
        #[case] action: TransactionAction,
        #[case] to: TransactionStatus,
    ) {
        assert_eq!(attempt_transition(MailIn, from, action), Ok(to));
    }

    #[rstest]
    #[case(S::ItemsReviewed, A::ProcessPayment)]
    #[case(S::ItemsReviewed, A::AcceptOffer)]
    #[case(S::KitSent, A::MarkItemsReviewed)]
    #[case(S::OfferGiven, A::SubmitOffer)]
    #[case(S::OfferAccepted, A::Cancel)]
    #[case(S::PaymentProcessed, A::RequestReturn)]
    #[case(S::Cancelled, A::ConfirmKitRequest)]
    fn illegal_mail_in_transitions(
        #[case] from: TransactionStatus,
        #[case] action: TransactionAction,
    ) {
        assert_eq!(
            attempt_transition(MailIn, from, action),
            Err(TransitionError::NotAllowed { action, from })
        );
    }

    #[test]
    fn in_house_skips_kit_handling() {
        assert_eq!(initial_status(InHouse), S::Pending);
        assert_eq!(
            attempt_transition(InHouse, S::Pending, A::MarkItemsReviewed),
            Ok(S::ItemsReviewed)
        );
        assert_matches!(
            attempt_transition(InHouse, S::Pending, A::MarkKitSent),
            Err(TransitionError::NotApplicable { .. })
        );
        assert_matches!(
            attempt_transition(InHouse, S::OfferGiven, A::RequestReturn),
            Err(TransitionError::NotApplicable { .. })
        );
    }

    #[test]
    fn mail_in_never_uses_in_house_pending() {
        assert_eq!(initial_status(MailIn), S::PendingKitRequest);
        assert_matches!(
            attempt_transition(MailIn, S::Pending, A::MarkItemsReviewed),
            Err(TransitionError::NotAllowed { .. })
        );
    }

    #[test]
    fn terminal_statuses_have_no_actions() {
        for status in TransactionStatus::iter().filter(|s| s.is_terminal()) {
            assert!(allowed_actions(MailIn, status).is_empty(), "{status}");
            assert!(allowed_actions(InHouse, status).is_empty(), "{status}");
        }
    }

    #[test]
    fn change_status_never_skips_review_to_payment() {
        assert!(!can_change_status_to(MailIn, S::ItemsReviewed, S::PaymentProcessed));
        assert!(can_change_status_to(MailIn, S::ItemsReviewed, S::OfferGiven));
        assert!(can_change_status_to(InHouse, S::OfferAccepted, S::PaymentProcessed));
    }

    #[test]
    fn forward_action_is_preferred_when_reaching_offer_given() {
        assert_eq!(
            action_reaching(MailIn, S::OfferDeclined, S::OfferGiven),
            Some(A::SubmitOffer)
        );
        assert_eq!(
            action_reaching(MailIn, S::OfferAccepted, S::OfferGiven),
            Some(A::ReopenOffer)
        );
    }

    #[test]
    fn error_messages_use_wire_names() {
        let err = TransitionError::NotAllowed {
            action: A::AcceptOffer,
            from: S::ItemsReviewed,
        };
        assert_eq!(err.to_string(), "cannot accept_offer from items_reviewed");
        let err = TransitionError::NotApplicable {
            action: A::MarkKitSent,
            kind: InHouse,
        };
        assert_eq!(err.to_string(), "mark_kit_sent does not apply to in_house transactions");
    }
}
