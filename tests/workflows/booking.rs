//! create_booking end to end.

use lab_booking_sync::booking::{Booking, BookingStatus};
use lab_booking_sync::cache::{QueryCache, QueryCacheExt};
use lab_booking_sync::keys::booking_keys;
use lab_booking_sync::ports::{NotificationLevel, TxReceipt};
use lab_booking_sync::workflows::{create_booking, Channel, CreateBookingRequest};
use serde_json::json;

use crate::support::{now, owned_booking, Harness, HOUR, LAB, OWNER};

fn request(start: i64) -> CreateBookingRequest {
    CreateBookingRequest {
        lab_id: LAB.to_string(),
        user_address: Some(OWNER.to_string()),
        start,
        end: start + HOUR,
        channel: Channel::Wallet,
        balance: 1_000,
        cost: 250,
    }
}

#[tokio::test]
async fn confirmed_reservation_replaces_the_optimistic_record() {
    let h = Harness::new();
    h.contract.set(
        &h.config.contract.reservation_request,
        Ok(TxReceipt {
            tx_hash: "0xfeed".into(),
            reservation_key: Some("res-1".into()),
            ..Default::default()
        }),
    );

    let outcome = create_booking(&h.ports(), &h.config, request(now() + 2 * HOUR))
        .await
        .unwrap();
    assert!(outcome.success);
    let steps: Vec<&str> = outcome.completed_steps.iter().map(|s| s.step.as_str()).collect();
    assert_eq!(
        steps,
        [
            "validate-funds",
            "check-availability",
            "optimistic-insert",
            "blockchain-write",
            "send-notifications",
            "invalidate-caches"
        ]
    );

    for view in [booking_keys::all(), booking_keys::by_user(OWNER), booking_keys::by_lab(LAB)] {
        let list = h.list(&view).unwrap();
        assert_eq!(list.len(), 1, "view {view}");
        assert_eq!(list[0].reservation_key.as_deref(), Some("res-1"));
        assert!(!list[0].is_temp());
        assert!(!list[0].is_optimistic);
        assert_eq!(list[0].tx_hash.as_deref(), Some("0xfeed"));
    }
    let confirmed: Booking = h.cache.get_typed(&booking_keys::by_reservation_key("res-1")).unwrap().unwrap();
    assert_eq!(confirmed.booking_status(), Some(BookingStatus::Pending));
    assert!(h.cache.is_stale(&booking_keys::by_lab(LAB)).unwrap());

    let received = h.notifier.received();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].level, NotificationLevel::Info);
    assert!(received[0].message.contains("0xfeed"));
    assert_eq!(received[1].level, NotificationLevel::Success);

    let writes = h.contract.calls_to(&h.config.contract.reservation_request);
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].args[0], json!(LAB));
}

#[tokio::test]
async fn unavailable_slot_stops_before_any_write() {
    let h = Harness::new();
    h.api.set(&h.config.paths.check_availability, Ok(json!({ "available": false })));

    let err = create_booking(&h.ports(), &h.config, request(now() + 2 * HOUR))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Lab is not available for the selected time slot");
    assert_eq!(err.step, "check-availability");
    assert!(err.cause.is_validation());
    assert!(err.rollback_results.is_empty());
    assert!(h.contract.calls().is_empty());
    assert!(h.all_bookings().is_empty());

    let last = h.last_notification();
    assert_eq!(last.level, NotificationLevel::Error);
    assert_eq!(last.message, "Lab is not available for the selected time slot");
}

#[tokio::test]
async fn cached_overlap_is_rejected_without_asking_the_server() {
    let h = Harness::new();
    let existing = owned_booking("res-0", 3, BookingStatus::Booked);
    h.seed(&[existing.clone()]);

    let start = existing.start.unwrap() + HOUR / 2;
    let err = create_booking(&h.ports(), &h.config, request(start))
        .await
        .unwrap_err();

    assert_eq!(err.step, "check-availability");
    assert!(h.api.calls_to(&h.config.paths.check_availability).is_empty());
    assert_eq!(h.all_bookings(), vec![existing]);
}

#[tokio::test]
async fn insufficient_funds() {
    let h = Harness::new();
    let mut req = request(now() + 2 * HOUR);
    req.balance = 10;

    let err = create_booking(&h.ports(), &h.config, req).await.unwrap_err();
    assert_eq!(err.to_string(), "Insufficient funds");
    assert_eq!(err.step, "validate-funds");
    assert!(h.api.calls().is_empty());
}

#[tokio::test]
async fn reverted_write_removes_the_optimistic_record() {
    let h = Harness::new();
    h.contract.set(
        &h.config.contract.reservation_request,
        Err(lab_booking_sync::ports::ContractError::Rejected("user denied".into())),
    );

    let err = create_booking(&h.ports(), &h.config, request(now() + 2 * HOUR))
        .await
        .unwrap_err();

    assert_eq!(err.step, "blockchain-write");
    assert_eq!(err.rollback_results.len(), 1);
    assert_eq!(err.rollback_results[0].step, "optimistic-insert");
    assert!(err.rolled_back_cleanly());
    for view in [booking_keys::all(), booking_keys::by_user(OWNER), booking_keys::by_lab(LAB)] {
        assert!(h.list(&view).unwrap_or_default().iter().all(|b| !b.is_temp()));
    }
}

#[tokio::test]
async fn sso_booking_skips_the_funds_check() {
    let h = Harness::new();
    h.api.set(
        &h.config.paths.sso_reservation,
        Ok(json!({ "txHash": "0xsso", "reservationKey": "res-sso" })),
    );
    let mut req = request(now() + 2 * HOUR);
    req.channel = Channel::Sso;
    req.balance = 0;

    let outcome = create_booking(&h.ports(), &h.config, req).await.unwrap();
    assert_eq!(outcome.results[0], json!({ "skipped": true }));
    assert!(h.contract.calls().is_empty());
    let all = h.all_bookings();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].reservation_key.as_deref(), Some("res-sso"));
}
