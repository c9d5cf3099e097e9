use chrono::{TimeZone, Utc};
use mentorpay::domain::ports::PayoutStore;
use mentorpay::domain::sequence::{PeriodKey, SequenceNumber, SequencePrefix};
use mentorpay::infrastructure::in_memory::InMemoryPayoutStore;
use std::collections::HashSet;
use std::sync::Arc;

fn may_2025() -> PeriodKey {
    PeriodKey::from_datetime(Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_allocation_never_duplicates() {
    let store = Arc::new(InMemoryPayoutStore::new());
    let period = may_2025();

    let mut handles = Vec::new();
    for _ in 0..1000 {
        let store = store.clone();
        let period = period.clone();
        handles.push(tokio::spawn(async move {
            store
                .next_sequence(SequencePrefix::Receipt, &period)
                .await
                .unwrap()
        }));
    }

    let mut allocated = HashSet::new();
    for handle in handles {
        let value = handle.await.unwrap();
        assert!(allocated.insert(value), "duplicate sequence value {value}");
    }

    // 1000 concurrent callers, exactly the dense range 1..=1000.
    assert_eq!(allocated.len(), 1000);
    assert_eq!(allocated.iter().min(), Some(&1));
    assert_eq!(allocated.iter().max(), Some(&1000));
}

#[tokio::test]
async fn test_streams_are_independent_per_prefix_and_period() {
    let store = InMemoryPayoutStore::new();
    let may = may_2025();
    let june = PeriodKey::from_datetime(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());

    for expected in 1..=3 {
        assert_eq!(
            store
                .next_sequence(SequencePrefix::Receipt, &may)
                .await
                .unwrap(),
            expected
        );
    }
    assert_eq!(
        store
            .next_sequence(SequencePrefix::Payout, &may)
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        store
            .next_sequence(SequencePrefix::Receipt, &june)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_formatting_matches_persisted_shape() {
    let period = may_2025();
    assert_eq!(
        SequenceNumber::format(SequencePrefix::Receipt, &period, 1).as_str(),
        "RCP-25-05-0001"
    );
    assert_eq!(
        SequenceNumber::format(SequencePrefix::Payout, &period, 427).as_str(),
        "PAY-25-05-0427"
    );

    let parsed: SequenceNumber = "RCP-25-05-0001".parse().unwrap();
    assert_eq!(parsed.as_str(), "RCP-25-05-0001");
}
