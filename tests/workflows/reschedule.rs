//! reschedule_booking: new slot first, old slot second.

use lab_booking_sync::booking::BookingStatus;
use lab_booking_sync::ports::{ContractError, TxReceipt};
use lab_booking_sync::workflows::{reschedule_booking, Channel, RescheduleBookingRequest};
use serde_json::json;

use crate::support::{now, owned_booking, Harness, HOUR, OWNER};

fn request(key: &str, new_start: i64) -> RescheduleBookingRequest {
    RescheduleBookingRequest {
        reservation_key: key.to_string(),
        caller_address: Some(OWNER.to_string()),
        channel: Channel::Wallet,
        booking: None,
        new_start,
        new_end: new_start + HOUR,
    }
}

fn new_reservation(h: &Harness, key: &str) {
    h.contract.set(
        &h.config.contract.reservation_request,
        Ok(TxReceipt {
            tx_hash: "0xnew".into(),
            reservation_key: Some(key.into()),
            ..Default::default()
        }),
    );
}

#[tokio::test]
async fn moves_the_booking_to_the_new_slot() {
    let h = Harness::new();
    h.seed(&[owned_booking("res-1", 48, BookingStatus::Booked)]);
    new_reservation(&h, "res-2");

    let outcome = reschedule_booking(&h.ports(), &h.config, request("res-1", now() + 72 * HOUR))
        .await
        .unwrap();
    assert!(outcome.success);

    let all = h.all_bookings();
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|b| !b.is_temp()));
    let new = all.iter().find(|b| b.matches_key("res-2")).unwrap();
    assert_eq!(new.booking_status(), Some(BookingStatus::Pending));
    let old = all.iter().find(|b| b.matches_key("res-1")).unwrap();
    assert_eq!(old.booking_status(), Some(BookingStatus::Cancelled));

    assert_eq!(h.contract.calls_to(&h.config.contract.cancel_booking)[0].args, vec![json!("res-1")]);
}

#[tokio::test]
async fn failed_old_cancellation_cancels_the_new_reservation() {
    let h = Harness::new();
    let old = owned_booking("res-1", 48, BookingStatus::Booked);
    h.seed(&[old.clone()]);
    new_reservation(&h, "res-2");
    h.contract.set(
        &h.config.contract.cancel_booking,
        Err(ContractError::Reverted("cancel failed".into())),
    );

    let err = reschedule_booking(&h.ports(), &h.config, request("res-1", now() + 72 * HOUR))
        .await
        .unwrap_err();

    assert_eq!(err.step, "cancel-old-reservation");
    assert_eq!(err.to_string(), "cancel failed");
    let unwound: Vec<&str> = err.rollback_results.iter().map(|r| r.step.as_str()).collect();
    assert_eq!(unwound, ["create-reservation", "create-reservation", "optimistic-insert"]);
    assert!(err.rolled_back_cleanly());

    let undo = h.contract.calls_to(&h.config.contract.cancel_reservation_request);
    assert_eq!(undo.len(), 1);
    assert_eq!(undo[0].args, vec![json!("res-2")]);
    assert_eq!(h.all_bookings(), vec![old]);
}

#[tokio::test]
async fn same_slot_is_rejected() {
    let h = Harness::new();
    let booking = owned_booking("res-1", 48, BookingStatus::Booked);
    h.seed(&[booking.clone()]);

    let err = reschedule_booking(&h.ports(), &h.config, request("res-1", booking.start.unwrap()))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "The booking already uses this time slot");
    assert!(h.contract.calls().is_empty());
}

#[tokio::test]
async fn past_slots_are_rejected() {
    let h = Harness::new();
    h.seed(&[owned_booking("res-1", 48, BookingStatus::Booked)]);

    let err = reschedule_booking(&h.ports(), &h.config, request("res-1", now() - HOUR))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "The new slot must start in the future");
}
