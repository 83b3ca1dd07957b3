mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use futures::future::join_all;

use appointment_cell::{AppointmentError, AppointmentListQuery, AppointmentStatus};
use common::World;
use shared_models::auth::ActorRole;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn exactly_one_concurrent_booking_wins_a_slot() {
    let w = Arc::new(World::new().await);

    let attempts = (0..16).map(|i| {
        let w = w.clone();
        tokio::spawn(async move {
            let key = if i % 2 == 0 { "m1" } else { "09:00 - 09:10" };
            w.ledger.book(&format!("patient-{}", i), w.request(key)).await
        })
    });

    let results: Vec<_> = join_all(attempts).await.into_iter().map(|r| r.unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert_matches!(result, Err(AppointmentError::SlotAlreadyBooked));
    }

    let held = w
        .ledger
        .list_for_doctor("DOC-001", &AppointmentListQuery::default())
        .await
        .unwrap();
    assert_eq!(held.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_emergencies_respect_the_quota() {
    let w = Arc::new(World::new().await);

    let attempts = (0..8).map(|i| {
        let w = w.clone();
        tokio::spawn(async move { w.ledger.book(&format!("patient-{}", i), w.emergency("e1")).await })
    });

    let results: Vec<_> = join_all(attempts).await.into_iter().map(|r| r.unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 2);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, AppointmentError::EmergencyCapacityReached { max: 2 })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_decisions_apply_exactly_once() {
    let w = Arc::new(World::new().await);
    let booked = w.ledger.book("patient-1", w.request("m1")).await.unwrap();

    let hospital = w.hospital.owner_user_id.clone();
    let doctor = w.doctor.owner_user_id.clone();
    let (reject, cancel) = tokio::join!(
        {
            let w = w.clone();
            async move {
                w.ledger
                    .transition(booked.id, &hospital, ActorRole::Hospital, AppointmentStatus::Rejected)
                    .await
            }
        },
        {
            let w = w.clone();
            async move {
                w.ledger
                    .transition(booked.id, &doctor, ActorRole::Doctor, AppointmentStatus::Cancelled)
                    .await
            }
        }
    );

    let winners = [&reject, &cancel].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for loser in [reject, cancel].into_iter().filter_map(Result::err) {
        assert_matches!(
            loser,
            AppointmentError::ConcurrentModification | AppointmentError::InvalidStatusTransition { .. }
        );
    }
}
