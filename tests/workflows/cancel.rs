//! cancel_booking: ownership, refunds, rollback of optimistic status.

use lab_booking_sync::booking::BookingStatus;
use lab_booking_sync::keys::booking_keys;
use lab_booking_sync::ports::NotificationLevel;
use lab_booking_sync::workflows::{cancel_booking, CancelBookingRequest, Channel};
use serde_json::json;

use crate::support::{owned_booking, Harness, LAB, OWNER};

fn request(key: &str, caller: &str) -> CancelBookingRequest {
    CancelBookingRequest {
        reservation_key: key.to_string(),
        caller_address: Some(caller.to_string()),
        channel: Channel::Wallet,
        booking: None,
    }
}

#[tokio::test]
async fn owner_cancels_with_full_refund() {
    let h = Harness::new();
    h.seed(&[owned_booking("res-1", 48, BookingStatus::Booked)]);

    let outcome = cancel_booking(&h.ports(), &h.config, request("res-1", "0xa11ce"))
        .await
        .unwrap();

    assert_eq!(outcome.results[1]["refundPercentage"], json!(100.0));
    let calls = h.contract.calls_to(&h.config.contract.cancel_booking);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].args, vec![json!("res-1")]);

    for view in [booking_keys::all(), booking_keys::by_user(OWNER)] {
        let list = h.list(&view).unwrap();
        assert_eq!(list[0].booking_status(), Some(BookingStatus::Cancelled));
        assert!(!list[0].is_pending);
        assert!(list[0].tx_hash.is_some());
    }

    let messages: Vec<String> = h.notifier.received().into_iter().map(|n| n.message).collect();
    assert!(messages.contains(&"Cancellation submitted, refund 100%".to_string()));
    assert_eq!(h.last_notification().level, NotificationLevel::Success);
}

#[tokio::test]
async fn pending_request_uses_the_request_cancellation() {
    let h = Harness::new();
    h.seed(&[owned_booking("res-2", 48, BookingStatus::Pending)]);

    cancel_booking(&h.ports(), &h.config, request("res-2", OWNER))
        .await
        .unwrap();

    assert_eq!(h.contract.calls_to(&h.config.contract.cancel_reservation_request).len(), 1);
    assert!(h.contract.calls_to(&h.config.contract.cancel_booking).is_empty());
}

#[tokio::test]
async fn strangers_cannot_cancel() {
    let h = Harness::new();
    h.seed(&[owned_booking("res-1", 48, BookingStatus::Booked)]);

    let err = cancel_booking(&h.ports(), &h.config, request("res-1", "0xB0B"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("only cancel your own bookings"));
    assert_eq!(err.step, "validate-cancellation");
    assert!(err.rollback_results.is_empty());
    assert!(h.contract.calls().is_empty());
    assert_eq!(h.last_notification().level, NotificationLevel::Error);
}

#[tokio::test]
async fn revert_restores_every_patched_view() {
    let h = Harness::new();
    let booking = owned_booking("res-1", 12, BookingStatus::Booked);
    h.seed(&[booking.clone()]);
    h.contract.set(
        &h.config.contract.cancel_booking,
        Err(lab_booking_sync::ports::ContractError::Reverted("not owner".into())),
    );

    let err = cancel_booking(&h.ports(), &h.config, request("res-1", OWNER))
        .await
        .unwrap_err();

    assert_eq!(err.step, "blockchain-cancel");
    assert_eq!(err.to_string(), "not owner");
    assert_eq!(err.rollback_results.len(), 3);
    assert!(err.rolled_back_cleanly());
    for view in [booking_keys::all(), booking_keys::by_user(OWNER), booking_keys::by_lab(LAB)] {
        assert_eq!(h.list(&view).unwrap(), vec![booking.clone()], "view {view}");
    }
}

#[tokio::test]
async fn started_bookings_are_not_refundable() {
    let h = Harness::new();
    let mut started = owned_booking("res-1", 0, BookingStatus::Booked);
    started.start = started.start.map(|s| s - 600);
    h.seed(&[started]);

    let err = cancel_booking(&h.ports(), &h.config, request("res-1", OWNER))
        .await
        .unwrap_err();
    assert_eq!(err.step, "calculate-refund");
    assert_eq!(err.to_string(), "Bookings that have already started cannot be cancelled");
}

#[tokio::test]
async fn sso_cancellation_goes_through_the_backend() {
    let h = Harness::new();
    let mut booking = owned_booking("res-9", 30, BookingStatus::Booked);
    booking.user_address = None;
    h.api.set(&h.config.paths.sso_cancellation, Ok(json!({ "txHash": "0xsso" })));

    let outcome = cancel_booking(
        &h.ports(),
        &h.config,
        CancelBookingRequest {
            reservation_key: "res-9".into(),
            caller_address: None,
            channel: Channel::Sso,
            booking: Some(booking),
        },
    )
    .await
    .unwrap();

    assert!(outcome.success);
    assert!(h.contract.calls().is_empty());
    assert_eq!(h.api.calls_to(&h.config.paths.sso_cancellation).len(), 1);
    assert_eq!(outcome.results[3]["txHash"], json!("0xsso"));
}
