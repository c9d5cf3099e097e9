mod common;

use mentorpay::domain::audit::{AuditAction, EntityKind};
use mentorpay::domain::money::{Currency, Money};
use mentorpay::domain::session::{SessionPatch, SessionStatus};
use mentorpay::error::PayoutError;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_approval_locks_in_breakdown() {
    let engine = common::engine();
    let (mentor, admin) = (common::mentor(), common::admin());

    let session = common::approved_session(&engine, &mentor, &admin, 10, 90, dec!(1000)).await;

    assert_eq!(session.status, SessionStatus::Approved);
    assert_eq!(session.approved_by, Some(admin.id));
    assert!(session.approved_at.is_some());

    let payout = session.payout.expect("approval must store a breakdown");
    assert_eq!(payout.base_payout, Money::new(dec!(1500), Currency::Usd));
    assert_eq!(payout.platform_fee, Money::new(dec!(150), Currency::Usd));
    assert_eq!(payout.taxes, Money::new(dec!(270), Currency::Usd));
    assert_eq!(payout.final_payout, Money::new(dec!(1080), Currency::Usd));
}

#[tokio::test]
async fn test_approval_uses_adjusted_rate_when_present() {
    let engine = common::engine();
    let (mentor, admin) = (common::mentor(), common::admin());

    let mut new = common::new_session(&mentor, 10, 60, dec!(1000));
    new.adjusted_rate = Some(dec!(1200));
    let session = engine.create_session(&mentor, new).await.unwrap();
    let session = engine.approve_session(&admin, session.id).await.unwrap();

    let payout = session.payout.unwrap();
    assert_eq!(payout.base_payout, Money::new(dec!(1200), Currency::Usd));
}

#[tokio::test]
async fn test_approve_requires_pending() {
    let engine = common::engine();
    let (mentor, admin) = (common::mentor(), common::admin());

    let session = common::approved_session(&engine, &mentor, &admin, 10, 60, dec!(500)).await;
    assert!(matches!(
        engine.approve_session(&admin, session.id).await,
        Err(PayoutError::InvalidTransition(_))
    ));
}

#[tokio::test]
async fn test_reject_requires_reason_and_is_terminal() {
    let engine = common::engine();
    let (mentor, admin) = (common::mentor(), common::admin());

    let session = engine
        .create_session(&mentor, common::new_session(&mentor, 10, 60, dec!(500)))
        .await
        .unwrap();

    assert!(matches!(
        engine.reject_session(&admin, session.id, "  ").await,
        Err(PayoutError::InvalidInput(_))
    ));

    let session = engine
        .reject_session(&admin, session.id, "no recording attached")
        .await
        .unwrap();
    assert_eq!(session.status, SessionStatus::Rejected);
    assert_eq!(
        session.rejection_reason.as_deref(),
        Some("no recording attached")
    );

    // Rejection is terminal: no approval, no second rejection.
    assert!(matches!(
        engine.approve_session(&admin, session.id).await,
        Err(PayoutError::InvalidTransition(_))
    ));
    assert!(matches!(
        engine.reject_session(&admin, session.id, "again").await,
        Err(PayoutError::InvalidTransition(_))
    ));
}

#[tokio::test]
async fn test_approval_and_rejection_require_admin() {
    let engine = common::engine();
    let mentor = common::mentor();

    let session = engine
        .create_session(&mentor, common::new_session(&mentor, 10, 60, dec!(500)))
        .await
        .unwrap();

    assert!(matches!(
        engine.approve_session(&mentor, session.id).await,
        Err(PayoutError::Unauthorized(_))
    ));
    assert!(matches!(
        engine.reject_session(&mentor, session.id, "reason").await,
        Err(PayoutError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn test_mentor_cannot_log_for_another_mentor() {
    let engine = common::engine();
    let (mentor, other) = (common::mentor(), common::mentor());

    let result = engine
        .create_session(&other, common::new_session(&mentor, 10, 60, dec!(500)))
        .await;
    assert!(matches!(result, Err(PayoutError::Unauthorized(_))));
}

#[tokio::test]
async fn test_update_recomputes_duration_while_pending() {
    let engine = common::engine();
    let mentor = common::mentor();

    let session = engine
        .create_session(&mentor, common::new_session(&mentor, 10, 60, dec!(500)))
        .await
        .unwrap();

    let new_end = session.start_time + chrono::Duration::minutes(45);
    let session = engine
        .update_session(
            &mentor,
            session.id,
            SessionPatch {
                end_time: Some(new_end),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(session.duration_minutes, 45);
}

#[tokio::test]
async fn test_update_and_delete_frozen_after_approval() {
    let engine = common::engine();
    let (mentor, admin) = (common::mentor(), common::admin());

    let session = common::approved_session(&engine, &mentor, &admin, 10, 60, dec!(500)).await;

    let result = engine
        .update_session(
            &mentor,
            session.id,
            SessionPatch {
                notes: Some("late edit".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(PayoutError::InvalidState(_))));

    assert!(matches!(
        engine.delete_session(&mentor, session.id).await,
        Err(PayoutError::InvalidState(_))
    ));
}

#[tokio::test]
async fn test_mentors_only_see_their_own_sessions() {
    let engine = common::engine();
    let (ada, linus, admin) = (common::mentor(), common::mentor(), common::admin());

    common::approved_session(&engine, &ada, &admin, 10, 60, dec!(500)).await;
    common::approved_session(&engine, &linus, &admin, 11, 60, dec!(500)).await;

    let mine = engine
        .list_sessions(&ada, Default::default())
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].mentor, ada.id);

    let all = engine
        .list_sessions(&admin, Default::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let ada_session = &mine[0];
    assert!(matches!(
        engine.session(&linus, ada_session.id).await,
        Err(PayoutError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn test_every_mutation_carries_an_audit_entry() {
    let engine = common::engine();
    let (mentor, admin) = (common::mentor(), common::admin());

    let session = engine
        .create_session(&mentor, common::new_session(&mentor, 10, 60, dec!(500)))
        .await
        .unwrap();
    engine
        .update_session(
            &mentor,
            session.id,
            SessionPatch {
                notes: Some("ran long".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    engine.approve_session(&admin, session.id).await.unwrap();

    let trail = engine
        .audit_trail(&admin, EntityKind::Session, session.id)
        .await
        .unwrap();
    assert_eq!(trail.len(), 3);
    assert_eq!(trail[0].action, AuditAction::Created);
    assert_eq!(trail[0].actor, mentor.id);
    assert_eq!(trail[1].action, AuditAction::Updated);
    assert_eq!(trail[1].changes.len(), 1);
    assert_eq!(trail[1].changes[0].field, "notes");
    assert_eq!(trail[2].action, AuditAction::Approved);
    assert_eq!(trail[2].actor, admin.id);

    // The owning mentor may read the trail; others may not.
    assert!(engine
        .audit_trail(&mentor, EntityKind::Session, session.id)
        .await
        .is_ok());
    let stranger = common::mentor();
    assert!(matches!(
        engine
            .audit_trail(&stranger, EntityKind::Session, session.id)
            .await,
        Err(PayoutError::Unauthorized(_))
    ));
}
