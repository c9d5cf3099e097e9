#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use mentorpay::application::engine::{NewSession, PayoutConfig, PayoutEngine};
use mentorpay::domain::actor::Actor;
use mentorpay::domain::session::{Session, SessionKind};
use mentorpay::infrastructure::in_memory::InMemoryPayoutStore;
use rust_decimal::Decimal;
use uuid::Uuid;

pub fn engine() -> PayoutEngine {
    PayoutEngine::new(
        Box::new(InMemoryPayoutStore::new()),
        PayoutConfig::default(),
    )
}

pub fn admin() -> Actor {
    Actor::admin(Uuid::new_v4())
}

pub fn mentor() -> Actor {
    Actor::mentor(Uuid::new_v4())
}

/// 9:00 UTC on the given day of May 2025.
pub fn day(day_of_month: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, day_of_month, 9, 0, 0).unwrap()
}

pub fn new_session(mentor: &Actor, day_of_month: u32, minutes: i64, rate: Decimal) -> NewSession {
    let start = day(day_of_month);
    NewSession {
        mentor: mentor.id,
        kind: SessionKind::Live,
        start_time: start,
        end_time: start + Duration::minutes(minutes),
        hourly_rate: rate,
        adjusted_rate: None,
        notes: None,
    }
}

pub async fn approved_session(
    engine: &PayoutEngine,
    mentor: &Actor,
    admin: &Actor,
    day_of_month: u32,
    minutes: i64,
    rate: Decimal,
) -> Session {
    let session = engine
        .create_session(mentor, new_session(mentor, day_of_month, minutes, rate))
        .await
        .expect("Failed to create session");
    engine
        .approve_session(admin, session.id)
        .await
        .expect("Failed to approve session")
}
