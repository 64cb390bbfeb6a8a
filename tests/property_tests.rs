//! Property-based tests for the pure parts of the ledger, purchasing, SKU
//! and buy-workflow code.

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use storekeep_api::{
    entities::{
        inventory_adjustment::{self, AdjustmentType},
        purchase_order_item,
        transaction_payment::PaymentMethod,
    },
    services::{
        inventory_ledger::{audit_chain, weighted_average_cost},
        purchase_orders::{header_totals, line_amounts, plan_receipt, ReceiveLine},
        sku::{parse_format, render, SkuContext},
        transaction_workflow::{
            action_reaching, allowed_actions, attempt_transition, TransactionAction,
            TransactionStatus, TransactionType,
        },
        transactions::{payments_cover_offer, PaymentLine},
    },
};
use uuid::Uuid;

const STATUSES: [TransactionStatus; 18] = [
    TransactionStatus::Pending,
    TransactionStatus::PendingKitRequest,
    TransactionStatus::KitRequestConfirmed,
    TransactionStatus::KitRequestOnHold,
    TransactionStatus::KitRequestRejected,
    TransactionStatus::KitSent,
    TransactionStatus::KitDelivered,
    TransactionStatus::ItemsReceived,
    TransactionStatus::ItemsReviewed,
    TransactionStatus::OfferGiven,
    TransactionStatus::OfferAccepted,
    TransactionStatus::OfferDeclined,
    TransactionStatus::PaymentPending,
    TransactionStatus::PaymentProcessed,
    TransactionStatus::ReturnRequested,
    TransactionStatus::ReturnShipped,
    TransactionStatus::ItemsReturned,
    TransactionStatus::Cancelled,
];

const ACTIONS: [TransactionAction; 18] = [
    TransactionAction::ConfirmKitRequest,
    TransactionAction::RejectKitRequest,
    TransactionAction::HoldKitRequest,
    TransactionAction::MarkKitSent,
    TransactionAction::MarkKitDelivered,
    TransactionAction::MarkItemsReceived,
    TransactionAction::MarkItemsReviewed,
    TransactionAction::SubmitOffer,
    TransactionAction::AcceptOffer,
    TransactionAction::DeclineOffer,
    TransactionAction::ReopenOffer,
    TransactionAction::ResetToItemsReviewed,
    TransactionAction::RequestPayment,
    TransactionAction::ProcessPayment,
    TransactionAction::RequestReturn,
    TransactionAction::MarkReturnShipped,
    TransactionAction::MarkItemsReturned,
    TransactionAction::Cancel,
];

fn kind_strategy() -> impl Strategy<Value = TransactionType> {
    prop_oneof![Just(TransactionType::InHouse), Just(TransactionType::MailIn)]
}

fn status_strategy() -> impl Strategy<Value = TransactionStatus> {
    prop::sample::select(STATUSES.to_vec())
}

fn action_strategy() -> impl Strategy<Value = TransactionAction> {
    prop::sample::select(ACTIONS.to_vec())
}

/// Money with two decimal places, up to 10,000.00.
fn money_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn percent_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=10_000).prop_map(|basis| Decimal::new(basis, 2))
}

fn item(ordered: i32, received: i32) -> purchase_order_item::Model {
    purchase_order_item::Model {
        id: Uuid::new_v4(),
        purchase_order_id: Uuid::nil(),
        product_variant_id: Uuid::new_v4(),
        quantity_ordered: ordered,
        quantity_received: received,
        unit_cost: Decimal::ONE,
        discount_percent: Decimal::ZERO,
        tax_rate: Decimal::ZERO,
        line_total: Decimal::from(ordered),
        created_at: Utc::now(),
    }
}

fn adjustment(n: usize, before: i32, change: i32) -> inventory_adjustment::Model {
    inventory_adjustment::Model {
        id: Uuid::new_v4(),
        store_id: Uuid::nil(),
        inventory_id: Uuid::nil(),
        user_id: None,
        reference_number: format!("ADJ-{:06}", n + 1),
        adjustment_type: AdjustmentType::Correction,
        quantity_before: before,
        quantity_change: change,
        quantity_after: before + change,
        unit_cost: Decimal::ONE,
        total_cost_impact: Decimal::from(change),
        reason: None,
        notes: None,
        reference_type: None,
        reference_id: None,
        created_at: Utc::now(),
    }
}

fn chain(changes: &[i32]) -> Vec<inventory_adjustment::Model> {
    let mut before = 0;
    changes
        .iter()
        .enumerate()
        .map(|(n, change)| {
            let row = adjustment(n, before, *change);
            before = row.quantity_after;
            row
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn line_total_is_net_plus_tax(
        quantity in 1i32..1_000,
        unit_cost in money_strategy(),
        discount in percent_strategy(),
        tax in percent_strategy(),
    ) {
        let amounts = line_amounts(quantity, unit_cost, discount, tax);
        prop_assert!(amounts.discount <= amounts.gross);
        prop_assert!(amounts.total >= Decimal::ZERO);
        let recomposed = amounts.gross - amounts.discount + amounts.tax;
        prop_assert!((recomposed - amounts.total).abs() <= Decimal::new(2, 2));
    }

    #[test]
    fn line_without_discount_or_tax_is_gross(quantity in 1i32..1_000, unit_cost in money_strategy()) {
        let amounts = line_amounts(quantity, unit_cost, Decimal::ZERO, Decimal::ZERO);
        prop_assert_eq!(amounts.total, Decimal::from(quantity) * unit_cost);
    }

    #[test]
    fn header_totals_sum_the_lines(
        lines in prop::collection::vec((1i32..100, money_strategy(), percent_strategy()), 0..8),
    ) {
        let amounts: Vec<_> = lines
            .iter()
            .map(|(q, cost, pct)| line_amounts(*q, *cost, *pct, *pct))
            .collect();
        let totals = header_totals(&amounts);
        prop_assert_eq!(totals.subtotal, amounts.iter().map(|a| a.gross).sum::<Decimal>());
        prop_assert_eq!(totals.total, amounts.iter().map(|a| a.total).sum::<Decimal>());
    }

    #[test]
    fn receipt_plan_never_exceeds_what_is_outstanding(
        ordered in prop::collection::vec((1i32..50, 0i32..50), 1..5),
        requests in prop::collection::vec((0usize..5, -5i32..80), 1..10),
    ) {
        let items: Vec<_> = ordered
            .iter()
            .map(|(o, r)| item(*o, (*r).min(*o)))
            .collect();
        let lines: Vec<ReceiveLine> = requests
            .iter()
            .map(|(idx, quantity)| ReceiveLine {
                purchase_order_item_id: items[idx % items.len()].id,
                quantity: *quantity,
            })
            .collect();

        match plan_receipt(&items, &lines) {
            Ok(plan) => {
                prop_assert!(!plan.is_empty());
                for it in &items {
                    let planned: i32 = plan
                        .iter()
                        .filter(|(p, _)| p.id == it.id)
                        .map(|(_, q)| *q)
                        .sum();
                    prop_assert!(planned <= it.remaining());
                }
                prop_assert!(plan.iter().all(|(_, q)| *q > 0));
            }
            Err(_) => {
                let receivable = lines.iter().any(|line| {
                    line.quantity > 0
                        && items
                            .iter()
                            .any(|it| it.id == line.purchase_order_item_id && it.remaining() > 0)
                });
                prop_assert!(!receivable);
            }
        }
    }

    #[test]
    fn padded_sequence_keeps_its_width(
        prefix in "[A-Z]{1,6}",
        width in 1usize..=12,
        sequence in 1i64..1_000_000,
    ) {
        let tokens = parse_format(&format!("{{prefix}}-{{sequence:{}}}", width))
            .map_err(|e| TestCaseError::fail(e.join("; ")))?;
        let sku = render(
            &tokens,
            &SkuContext {
                prefix: &prefix,
                category_name: "Anything",
                category_id: Uuid::nil(),
                sequence,
                date: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap_or_default(),
            },
        );
        let (head, digits) = sku.split_once('-').expect("separator");
        prop_assert_eq!(head, prefix.as_str());
        prop_assert!(digits.len() >= width);
        prop_assert_eq!(digits.parse::<i64>().ok(), Some(sequence));
    }

    #[test]
    fn literal_formats_render_verbatim(format in "[A-Za-z0-9_./-]{1,40}") {
        let tokens = parse_format(&format).map_err(|e| TestCaseError::fail(e.join("; ")))?;
        let sku = render(
            &tokens,
            &SkuContext {
                prefix: "X",
                category_name: "Y",
                category_id: Uuid::nil(),
                sequence: 1,
                date: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap_or_default(),
            },
        );
        prop_assert_eq!(sku, format);
    }

    #[test]
    fn formats_with_spaces_are_rejected(head in "[a-z]{1,5}", tail in "[a-z]{1,5}") {
        let spaced = format!("{} {}", head, tail);
        prop_assert!(parse_format(&spaced).is_err());
    }

    #[test]
    fn any_split_of_the_offer_covers_it(parts in prop::collection::vec(1i64..100_000, 1..5)) {
        let lines: Vec<PaymentLine> = parts
            .iter()
            .map(|cents| PaymentLine {
                method: PaymentMethod::Cash,
                amount: Decimal::new(*cents, 2),
                reference: None,
            })
            .collect();
        let offer: Decimal = lines.iter().map(|l| l.amount).sum();
        prop_assert!(payments_cover_offer(&lines, offer, Decimal::ZERO));
        prop_assert!(!payments_cover_offer(&lines, offer + Decimal::new(1, 2), Decimal::ZERO));
        prop_assert!(payments_cover_offer(&lines, offer + Decimal::new(1, 2), Decimal::new(1, 2)));
    }

    #[test]
    fn replayed_chain_is_consistent(changes in prop::collection::vec(-20i32..40, 0..30)) {
        let rows = chain(&changes);
        let current = rows.last().map(|r| r.quantity_after).unwrap_or(0);
        let audit = audit_chain(Uuid::nil(), current, &rows);
        prop_assert!(audit.is_consistent());
        prop_assert_eq!(audit.entries, changes.len());
        prop_assert_eq!(audit.total_change, changes.iter().map(|c| i64::from(*c)).sum::<i64>());
    }

    #[test]
    fn tampered_row_breaks_the_chain(
        changes in prop::collection::vec(1i32..40, 2..20),
        pick in any::<prop::sample::Index>(),
        skew in 1i32..5,
    ) {
        let mut rows = chain(&changes);
        let n = pick.index(rows.len());
        rows[n].quantity_after += skew;
        let current = rows.last().map(|r| r.quantity_after).unwrap_or(0);
        let audit = audit_chain(Uuid::nil(), current, &rows);
        prop_assert!(!audit.chain_intact);
        prop_assert_eq!(audit.first_break, Some(rows[n].reference_number.clone()));
    }

    #[test]
    fn average_cost_stays_between_inputs(
        on_hand in 1i32..1_000,
        old_cost in money_strategy(),
        received in 1i32..1_000,
        new_cost in money_strategy(),
    ) {
        let cost = weighted_average_cost(on_hand, old_cost, received, new_cost);
        let low = old_cost.min(new_cost);
        let high = old_cost.max(new_cost);
        let slack = Decimal::new(1, 4);
        prop_assert!(cost >= low - slack && cost <= high + slack);
    }

    #[test]
    fn transitions_stay_within_the_kind(
        kind in kind_strategy(),
        status in status_strategy(),
        action in action_strategy(),
    ) {
        if let Ok(next) = attempt_transition(kind, status, action) {
            prop_assert!(status.belongs_to(kind));
            prop_assert!(next.belongs_to(kind));
            prop_assert!(!status.is_terminal());
            prop_assert!(allowed_actions(kind, status).contains(&action));
            prop_assert!(action_reaching(kind, status, next).is_some());
        }
    }

    #[test]
    fn in_house_never_runs_mail_in_steps(status in status_strategy(), action in action_strategy()) {
        if action.is_mail_in_only() {
            prop_assert!(attempt_transition(TransactionType::InHouse, status, action).is_err());
        }
    }
}
