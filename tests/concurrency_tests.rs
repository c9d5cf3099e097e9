mod common;

use mentorpay::error::PayoutError;
use rust_decimal_macros::dec;
use std::sync::Arc;

/// Two aggregation calls over overlapping date ranges race for the same
/// approved sessions. Exactly one may claim them; the loser must surface
/// either a version conflict or an empty eligible set, never a second
/// receipt over the same sessions.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_generation_claims_each_session_once() {
    for _ in 0..20 {
        let engine = Arc::new(common::engine());
        let (mentor, admin) = (common::mentor(), common::admin());

        common::approved_session(&engine, &mentor, &admin, 10, 60, dec!(500)).await;
        common::approved_session(&engine, &mentor, &admin, 12, 60, dec!(500)).await;

        let a = {
            let engine = engine.clone();
            let mentor_id = mentor.id;
            let admin = admin;
            tokio::spawn(async move {
                engine
                    .generate_receipt(&admin, mentor_id, common::day(1), common::day(31), None)
                    .await
            })
        };
        let b = {
            let engine = engine.clone();
            let mentor_id = mentor.id;
            let admin = admin;
            tokio::spawn(async move {
                engine
                    .generate_receipt(&admin, mentor_id, common::day(1), common::day(31), None)
                    .await
            })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let winners: Vec<_> = results.iter().filter(|r| r.is_ok()).collect();
        assert_eq!(winners.len(), 1, "exactly one call may claim the sessions");

        for result in &results {
            if let Err(e) = result {
                assert!(
                    matches!(
                        e,
                        PayoutError::Conflict(_) | PayoutError::NoEligibleSessions { .. }
                    ),
                    "unexpected loser error: {e}"
                );
            }
        }

        // The surviving receipt holds both sessions.
        let receipts = engine
            .list_receipts(&admin, Default::default())
            .await
            .unwrap();
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].sessions.len(), 2);
    }
}

/// Two concurrent approvals of one pending session: a single winner flips
/// it to approved, the other observes a conflict or a non-pending state.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_approval_is_linearized() {
    for _ in 0..20 {
        let engine = Arc::new(common::engine());
        let (mentor, admin) = (common::mentor(), common::admin());

        let session = engine
            .create_session(&mentor, common::new_session(&mentor, 10, 60, dec!(500)))
            .await
            .unwrap();

        let a = {
            let engine = engine.clone();
            let admin = admin;
            let id = session.id;
            tokio::spawn(async move { engine.approve_session(&admin, id).await })
        };
        let b = {
            let engine = engine.clone();
            let admin = admin;
            let id = session.id;
            tokio::spawn(async move { engine.approve_session(&admin, id).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "exactly one approval may win");

        for result in &results {
            if let Err(e) = result {
                assert!(
                    matches!(
                        e,
                        PayoutError::Conflict(_) | PayoutError::InvalidTransition(_)
                    ),
                    "unexpected loser error: {e}"
                );
            }
        }

        // Exactly one approval audit entry exists either way.
        use mentorpay::domain::audit::{AuditAction, EntityKind};
        let trail = engine
            .audit_trail(&admin, EntityKind::Session, session.id)
            .await
            .unwrap();
        let approvals = trail
            .iter()
            .filter(|e| e.action == AuditAction::Approved)
            .count();
        assert_eq!(approvals, 1);
    }
}
