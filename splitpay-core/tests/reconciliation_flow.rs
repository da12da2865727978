mod common;

use common::{Fixture, outcome};
use kanau::processor::Processor;
use rust_decimal_macros::dec;
use splitpay_core::entities::{BookingStatus, SplitStatus};
use splitpay_core::events::DomainEvent;
use splitpay_core::reconciliation::{ReconcileError, ReconciliationResult};
use splitpay_sdk::objects::OutcomeSource;
use splitpay_sdk::objects::notification::{
    BOOKING_CONFIRMED_INITIATOR_TEMPLATE, BOOKING_CONFIRMED_PARTICIPANT_TEMPLATE,
    BOOKING_CONFIRMED_VENUE_TEMPLATE, SPLIT_PAYMENT_RECEIPT_TEMPLATE,
};

#[tokio::test]
async fn test_two_participants_confirm_booking() {
    let mut fx = Fixture::new(1);
    let (booking, requests) = fx.split_booking(dec!(300)).await;
    assert_eq!(requests[0].amount, dec!(150));
    assert_eq!(requests[1].amount, dec!(150));
    fx.gateway.settle("pay-a", requests[0].id, dec!(150), "NGN");
    fx.gateway.settle("pay-b", requests[1].id, dec!(150), "NGN");

    // Initiator pays through the browser redirect.
    let first = fx
        .engine
        .handle_payment_outcome(outcome(&requests[0], "pay-a", OutcomeSource::ClientCallback))
        .await
        .unwrap();
    assert!(matches!(first, ReconciliationResult::Applied { booking_confirmed: false, .. }));
    assert_eq!(
        fx.engine.bookings().get(booking.id).await.unwrap().status,
        BookingStatus::Pending
    );
    for event in fx.drain_events() {
        fx.dispatcher.process(event).await.unwrap();
    }
    let receipts = fx.notifier.sent_with_template(SPLIT_PAYMENT_RECEIPT_TEMPLATE);
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].address, common::Party::address(fx.party.initiator));

    // The guest's payment arrives by webhook and completes the booking.
    let second = fx
        .engine
        .handle_payment_outcome(outcome(&requests[1], "pay-b", OutcomeSource::Webhook))
        .await
        .unwrap();
    assert!(second.booking_confirmed());
    let events = fx.drain_events();
    assert_eq!(events, vec![DomainEvent::BookingConfirmed { booking_id: booking.id }]);
    for event in events {
        fx.dispatcher.process(event).await.unwrap();
    }

    let confirmed = fx.engine.bookings().get(booking.id).await.unwrap();
    assert_eq!(confirmed.status, BookingStatus::Confirmed);
    assert!(confirmed.confirmed_at.is_some());
    assert_eq!(fx.notifier.sent_with_template(BOOKING_CONFIRMED_INITIATOR_TEMPLATE).len(), 1);
    assert_eq!(fx.notifier.sent_with_template(BOOKING_CONFIRMED_PARTICIPANT_TEMPLATE).len(), 1);
    assert_eq!(fx.notifier.sent_with_template(BOOKING_CONFIRMED_VENUE_TEMPLATE).len(), 1);
    // The final payment confirms the booking; it does not also send a receipt.
    assert_eq!(fx.notifier.sent_with_template(SPLIT_PAYMENT_RECEIPT_TEMPLATE).len(), 1);

    // A late callback for the same payment changes nothing.
    let late = fx
        .engine
        .handle_payment_outcome(outcome(&requests[1], "pay-b", OutcomeSource::ClientCallback))
        .await
        .unwrap();
    assert!(matches!(late, ReconciliationResult::AlreadyTerminal { booking_confirmed: true, .. }));
    assert!(fx.drain_events().is_empty());
}

#[tokio::test]
async fn test_sequential_duplicates_are_idempotent() {
    let mut fx = Fixture::new(2);
    let (_, requests) = fx.split_booking(dec!(100)).await;
    fx.gateway.settle("pay", requests[0].id, dec!(33), "NGN");

    let mut applied = 0;
    for source in [OutcomeSource::ClientCallback, OutcomeSource::Webhook, OutcomeSource::Webhook] {
        match fx
            .engine
            .handle_payment_outcome(outcome(&requests[0], "pay", source))
            .await
            .unwrap()
        {
            ReconciliationResult::Applied { .. } => applied += 1,
            ReconciliationResult::AlreadyTerminal { request, .. } => {
                assert_eq!(request.status, SplitStatus::Paid);
                assert_eq!(request.payment_reference.as_deref(), Some("pay"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
    assert_eq!(applied, 1);
    assert_eq!(fx.drain_events().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicates_confirm_once() {
    let mut fx = Fixture::new(1);
    let (booking, requests) = fx.split_booking(dec!(300)).await;
    fx.gateway.settle("pay-a", requests[0].id, dec!(150), "NGN");
    fx.gateway.settle("pay-b", requests[1].id, dec!(150), "NGN");
    fx.engine
        .handle_payment_outcome(outcome(&requests[0], "pay-a", OutcomeSource::ClientCallback))
        .await
        .unwrap();
    fx.drain_events();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = fx.engine.clone();
            let source = if i % 2 == 0 {
                OutcomeSource::ClientCallback
            } else {
                OutcomeSource::Webhook
            };
            let outcome = outcome(&requests[1], "pay-b", source);
            tokio::spawn(async move { engine.handle_payment_outcome(outcome).await })
        })
        .collect();

    let mut applied = 0;
    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert!(result.booking_confirmed());
        if matches!(result, ReconciliationResult::Applied { .. }) {
            applied += 1;
        }
    }

    assert_eq!(applied, 1);
    assert_eq!(
        fx.drain_events(),
        vec![DomainEvent::BookingConfirmed { booking_id: booking.id }]
    );
    let request = fx.engine.ledger().get_request(requests[1].id).await.unwrap();
    assert_eq!(request.status, SplitStatus::Paid);
}

#[tokio::test]
async fn test_all_but_one_paid_stays_pending() {
    let mut fx = Fixture::new(3);
    let (booking, requests) = fx.split_booking(dec!(1000)).await;
    assert_eq!(
        requests.iter().map(|r| r.amount).collect::<Vec<_>>(),
        vec![dec!(250), dec!(250), dec!(250), dec!(250)]
    );

    for (i, request) in requests[..3].iter().enumerate() {
        let reference = format!("pay-{i}");
        fx.gateway.settle(&reference, request.id, request.amount, "NGN");
        let result = fx
            .engine
            .handle_payment_outcome(outcome(request, &reference, OutcomeSource::Webhook))
            .await
            .unwrap();
        assert!(!result.booking_confirmed());
    }
    assert_eq!(
        fx.engine.bookings().get(booking.id).await.unwrap().status,
        BookingStatus::Pending
    );
    assert!(
        fx.drain_events()
            .iter()
            .all(|e| matches!(e, DomainEvent::PartialPaymentReceived { .. }))
    );

    // The last share lapses; its late payment must not confirm anything.
    fx.engine.expire_request(requests[3].id).await.unwrap();
    fx.gateway.settle("pay-3", requests[3].id, dec!(250), "NGN");
    let err = fx
        .engine
        .handle_payment_outcome(outcome(&requests[3], "pay-3", OutcomeSource::ClientCallback))
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::RequestExpired(_)));
    assert_eq!(
        fx.engine.ledger().get_request(requests[3].id).await.unwrap().status,
        SplitStatus::Expired
    );
    assert_eq!(
        fx.engine.bookings().get(booking.id).await.unwrap().status,
        BookingStatus::Pending
    );
    assert!(fx.drain_events().is_empty());
}

#[tokio::test]
async fn test_one_payment_cannot_settle_two_shares() {
    let mut fx = Fixture::new(1);
    let (booking, requests) = fx.split_booking(dec!(300)).await;
    fx.gateway.settle("pay-a", requests[0].id, dec!(150), "NGN");
    fx.engine
        .handle_payment_outcome(outcome(&requests[0], "pay-a", OutcomeSource::ClientCallback))
        .await
        .unwrap();
    fx.drain_events();

    // The same charge replayed against the guest's equal share.
    for source in [OutcomeSource::ClientCallback, OutcomeSource::Webhook] {
        let err = fx
            .engine
            .handle_payment_outcome(outcome(&requests[1], "pay-a", source))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::VerificationFailed(_)));
    }

    let guest_share = fx.engine.ledger().get_request(requests[1].id).await.unwrap();
    assert_eq!(guest_share.status, SplitStatus::Pending);
    assert!(guest_share.payment_reference.is_none());
    assert_eq!(
        fx.engine.bookings().get(booking.id).await.unwrap().status,
        BookingStatus::Pending
    );
    assert!(fx.drain_events().is_empty());
}

#[tokio::test]
async fn test_rejected_verification_leaves_state_unchanged() {
    let mut fx = Fixture::new(1);
    let (booking, requests) = fx.split_booking(dec!(300)).await;
    fx.gateway.settle("underpaid", requests[0].id, dec!(100), "NGN");

    let err = fx
        .engine
        .handle_payment_outcome(outcome(&requests[0], "underpaid", OutcomeSource::Webhook))
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::VerificationFailed(_)));
    assert_eq!(
        fx.engine.ledger().requests_for_booking(booking.id).await.unwrap(),
        requests
    );
    assert_eq!(
        fx.engine.bookings().get(booking.id).await.unwrap().status,
        BookingStatus::Pending
    );
    assert!(fx.drain_events().is_empty());
}

#[tokio::test]
async fn test_declined_outcome_skips_gateway() {
    let fx = Fixture::new(1);
    let (_, requests) = fx.split_booking(dec!(300)).await;
    let mut declined = outcome(&requests[0], "pay", OutcomeSource::ClientCallback);
    declined.succeeded = false;

    let result = fx.engine.handle_payment_outcome(declined).await.unwrap();

    assert!(matches!(result, ReconciliationResult::Declined { .. }));
    assert_eq!(fx.gateway.verify_calls(), 0);
}

#[tokio::test]
async fn test_cancel_expires_outstanding_requests() {
    let fx = Fixture::new(2);
    let (booking, requests) = fx.split_booking(dec!(90)).await;
    fx.gateway.settle("pay", requests[0].id, dec!(30), "NGN");
    fx.engine
        .handle_payment_outcome(outcome(&requests[0], "pay", OutcomeSource::Webhook))
        .await
        .unwrap();

    let cancelled = fx.engine.cancel_booking(booking.id).await.unwrap();

    assert!(cancelled.cancelled);
    assert_eq!(cancelled.expired_requests, vec![requests[1].id, requests[2].id]);
    assert!(matches!(
        fx.engine.ledger().create_split(booking.id, fx.party.initiator, 2).await,
        Err(splitpay_core::ledger::LedgerError::BookingNotPending(_))
            | Err(splitpay_core::ledger::LedgerError::SplitAlreadyExists(_))
    ));
}
