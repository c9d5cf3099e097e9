#![cfg(feature = "storage-rocksdb")]

mod common;

use mentorpay::application::engine::{PayoutConfig, PayoutEngine};
use mentorpay::domain::audit::{AuditAction, EntityKind};
use mentorpay::domain::receipt::ReceiptStatus;
use mentorpay::domain::session::SessionStatus;
use mentorpay::infrastructure::rocksdb::RocksDbStore;
use rust_decimal_macros::dec;
use tempfile::tempdir;

fn engine_at(path: &std::path::Path) -> PayoutEngine {
    let store = RocksDbStore::open(path).expect("Failed to open RocksDB");
    PayoutEngine::new(Box::new(store), PayoutConfig::default())
}

#[tokio::test]
async fn test_full_lifecycle_survives_restarts() {
    let dir = tempdir().unwrap();
    let (mentor, admin) = (common::mentor(), common::admin());

    // Log and approve, then drop the handle.
    let session_id = {
        let engine = engine_at(dir.path());
        let session =
            common::approved_session(&engine, &mentor, &admin, 10, 90, dec!(1000)).await;
        session.id
    };

    // Reopen: the approved session and its locked breakdown are still there.
    let receipt_id = {
        let engine = engine_at(dir.path());
        let session = engine.session(&admin, session_id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Approved);
        assert!(session.payout.is_some());

        let receipt = engine
            .generate_receipt(&admin, mentor.id, common::day(1), common::day(31), None)
            .await
            .unwrap();
        assert!(receipt.number.as_str().ends_with("-0001"));
        engine.send_receipt(&admin, receipt.id).await.unwrap();
        receipt.id
    };

    // Reopen again: pay and verify the cascade plus the audit history.
    let engine = engine_at(dir.path());
    engine
        .mark_receipt_paid(&admin, receipt_id, "UTR-31", common::day(31))
        .await
        .unwrap();

    let receipt = engine.receipt(&admin, receipt_id).await.unwrap();
    assert_eq!(receipt.status, ReceiptStatus::Paid);
    let session = engine.session(&admin, session_id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Paid);

    let trail = engine
        .audit_trail(&admin, EntityKind::Receipt, receipt_id)
        .await
        .unwrap();
    let actions: Vec<AuditAction> = trail.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::ReceiptCreated,
            AuditAction::Sent,
            AuditAction::Paid
        ]
    );
}

#[tokio::test]
async fn test_sequence_counter_survives_restart() {
    let dir = tempdir().unwrap();
    let (mentor, admin) = (common::mentor(), common::admin());

    {
        let engine = engine_at(dir.path());
        common::approved_session(&engine, &mentor, &admin, 10, 60, dec!(500)).await;
        let receipt = engine
            .generate_receipt(&admin, mentor.id, common::day(1), common::day(31), None)
            .await
            .unwrap();
        assert!(receipt.number.as_str().ends_with("-0001"));
    }

    // A fresh process must continue the stream, not restart it.
    let engine = engine_at(dir.path());
    common::approved_session(&engine, &mentor, &admin, 20, 60, dec!(500)).await;
    let receipt = engine
        .generate_receipt(&admin, mentor.id, common::day(15), common::day(31), None)
        .await
        .unwrap();
    assert!(receipt.number.as_str().ends_with("-0002"));
}
