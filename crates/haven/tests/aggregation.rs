//! End-to-end fold scenarios: synthetic ordered streams through the aggregator.

mod common;

use common::{addr, claimed, emergency, initialized, rate_updated, staked, u, withdrawn, Stream};
use haven::{day_bucket, user_id, Aggregator, AggregatorError, StreamPosition};

#[test]
fn first_stake_time_is_write_once() {
    let mut s = Stream::new();
    let mut agg = Aggregator::new();
    let a = addr(0xaa);
    agg.apply(&s.at(10, staked(a, 100, 100, 5))).unwrap();
    agg.apply(&s.at(500, staked(a, 50, 150, 5))).unwrap();
    agg.apply(&s.at(90_000, staked(a, 25, 175, 5))).unwrap();

    let user = agg.ledger().user(&user_id(&a)).unwrap();
    assert_eq!(user.first_stake_time, Some(10));
    assert_eq!(user.total_staked, u(175));
    assert_eq!(user.last_activity_time, 90_000);
}

#[test]
fn total_users_counts_first_ever_stakes_only() {
    let mut s = Stream::new();
    let mut agg = Aggregator::new();
    let a = addr(0x01);
    let b = addr(0x02);
    let c = addr(0x03);

    agg.apply(&s.at(10, staked(a, 100, 100, 5))).unwrap();
    agg.apply(&s.at(20, staked(b, 200, 300, 5))).unwrap();
    agg.apply(&s.at(30, staked(a, 10, 310, 5))).unwrap();
    // c never stakes; a withdrawal still creates its User row lazily.
    agg.apply(&s.at(40, withdrawn(c, 5, 305, 5, 0))).unwrap();

    let stats = agg.ledger().protocol_stats().unwrap();
    assert_eq!(stats.total_users, 2);
    assert_eq!(stats.total_staking_positions, 3);
    assert_eq!(stats.total_withdrawals, 1);

    let ghost = agg.ledger().user(&user_id(&c)).unwrap();
    assert_eq!(ghost.first_stake_time, None);
    assert!(!ghost.is_active);
}

#[test]
fn emergency_withdraw_always_empties_the_position() {
    let mut s = Stream::new();
    let mut agg = Aggregator::new();
    let a = addr(0xaa);
    agg.apply(&s.at(10, staked(a, 100, 100, 5))).unwrap();
    // amount reported by the event is unrelated to the tracked balance on
    // purpose; the position must still end at exactly zero.
    agg.apply(&s.at(20, emergency(a, 70, 3, 0))).unwrap();

    let user = agg.ledger().user(&user_id(&a)).unwrap();
    assert_eq!(user.total_staked, u(0));
    assert!(!user.is_active);
    assert_eq!(user.total_emergency_withdrawn, u(70));

    // Re-staking re-activates but does not re-count the user.
    agg.apply(&s.at(30, staked(a, 10, 10, 5))).unwrap();
    let user = agg.ledger().user(&user_id(&a)).unwrap();
    assert!(user.is_active);
    assert_eq!(user.first_stake_time, Some(10));
    assert_eq!(agg.ledger().protocol_stats().unwrap().total_users, 1);
}

#[test]
fn emergency_withdraw_skips_user_day_bucket() {
    let mut s = Stream::new();
    let mut agg = Aggregator::new();
    let a = addr(0xaa);
    agg.apply(&s.at(10, staked(a, 100, 100, 5))).unwrap();
    agg.apply(&s.at(20, emergency(a, 100, 5, 0))).unwrap();

    let uid = user_id(&a);
    let day = day_bucket(20);
    // Protocol-level bucket sees the emergency flow...
    let snap = agg.ledger().daily_snapshot(day).unwrap();
    assert_eq!(snap.daily_emergency_withdrawals, u(100));
    assert_eq!(snap.total_staked, u(0));
    // ...but the user-day bucket still reflects only the stake.
    let user_snap = agg.ledger().user_daily_snapshot(&uid, day).unwrap();
    assert_eq!(user_snap.total_staked, u(100));
    assert_eq!(user_snap.daily_staked, u(100));
}

#[test]
fn worked_single_day_scenario() {
    let mut s = Stream::new();
    let mut agg = Aggregator::new();
    let a = addr(0xaa);

    agg.apply(&s.at(10, staked(a, 100, 100, 5))).unwrap();
    {
        let user = agg.ledger().user(&user_id(&a)).unwrap();
        assert_eq!(user.total_staked, u(100));
        assert_eq!(user.first_stake_time, Some(10));
        let stats = agg.ledger().protocol_stats().unwrap();
        assert_eq!(stats.total_users, 1);
        assert_eq!(stats.total_staking_positions, 1);
    }

    agg.apply(&s.at(20, withdrawn(a, 40, 60, 5, 5))).unwrap();
    {
        let user = agg.ledger().user(&user_id(&a)).unwrap();
        assert_eq!(user.total_staked, u(60));
        assert!(user.is_active);
        let stats = agg.ledger().protocol_stats().unwrap();
        assert_eq!(stats.total_staked, u(60));
        assert_eq!(stats.total_withdrawals, 1);
    }

    agg.apply(&s.at(30, claimed(a, 5, 0, 60))).unwrap();
    {
        let user = agg.ledger().user(&user_id(&a)).unwrap();
        assert_eq!(user.total_claimed, u(5));
        let stats = agg.ledger().protocol_stats().unwrap();
        assert_eq!(stats.total_rewards_claimed, u(5));
        // Claiming does not move staked principal.
        assert_eq!(stats.total_staked, u(60));
    }

    agg.apply(&s.at(40, emergency(a, 60, 3, 0))).unwrap();
    {
        let user = agg.ledger().user(&user_id(&a)).unwrap();
        assert_eq!(user.total_staked, u(0));
        assert_eq!(user.total_emergency_withdrawn, u(60));
        assert!(!user.is_active);
        let stats = agg.ledger().protocol_stats().unwrap();
        assert_eq!(stats.total_staked, u(0));
        assert_eq!(stats.total_emergency_withdrawals, 1);
        assert_eq!(stats.last_updated, 40);
    }

    // All four events land in the same day bucket.
    let snap = agg.ledger().daily_snapshot(day_bucket(10)).unwrap();
    assert_eq!(snap.daily_staked, u(100));
    assert_eq!(snap.daily_withdrawn, u(40));
    assert_eq!(snap.daily_rewards_claimed, u(5));
    assert_eq!(snap.daily_emergency_withdrawals, u(60));
    assert_eq!(snap.new_users_count, 1);
    assert_eq!(snap.total_staked, u(0));
}

#[test]
fn day_buckets_split_on_the_86400_boundary() {
    let mut s = Stream::new();
    let mut agg = Aggregator::new();
    let a = addr(0xaa);

    agg.apply(&s.at(100, staked(a, 10, 10, 5))).unwrap();
    agg.apply(&s.at(86_399, staked(a, 10, 20, 5))).unwrap();
    agg.apply(&s.at(86_400, staked(a, 10, 30, 5))).unwrap();

    let first_day = agg.ledger().daily_snapshot(0).unwrap();
    assert_eq!(first_day.daily_staked, u(20));
    assert_eq!(first_day.new_users_count, 1);
    let second_day = agg.ledger().daily_snapshot(86_400).unwrap();
    assert_eq!(second_day.daily_staked, u(10));
    assert_eq!(second_day.new_users_count, 0);
    // Point-in-time totals carried into the new bucket.
    assert_eq!(second_day.total_staked, u(30));
    assert_eq!(second_day.total_users, 1);

    let uid = user_id(&a);
    let first_user_day = agg.ledger().user_daily_snapshot(&uid, 0).unwrap();
    assert_eq!(first_user_day.daily_staked, u(20));
    assert_eq!(first_user_day.total_staked, u(20));
    let second_user_day = agg.ledger().user_daily_snapshot(&uid, 86_400).unwrap();
    assert_eq!(second_user_day.daily_staked, u(10));
    assert_eq!(second_user_day.total_staked, u(30));
}

#[test]
fn rate_update_between_stakes() {
    let mut s = Stream::new();
    let mut agg = Aggregator::new();
    let a = addr(0xaa);

    agg.apply(&s.at(10, staked(a, 100, 100, 10))).unwrap();
    agg.apply(&s.at(20, rate_updated(10, 8, 100))).unwrap();
    {
        let stats = agg.ledger().protocol_stats().unwrap();
        assert_eq!(stats.current_reward_rate, u(8));
        // Rate changes do not touch daily sums.
        let snap = agg.ledger().daily_snapshot(0).unwrap();
        assert_eq!(snap.daily_staked, u(100));
        assert_eq!(snap.current_reward_rate, u(10));
    }
    agg.apply(&s.at(30, staked(a, 50, 150, 8))).unwrap();
    let snap = agg.ledger().daily_snapshot(0).unwrap();
    assert_eq!(snap.current_reward_rate, u(8));

    let updates = agg.ledger().recent_rate_updates(10);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].old_rate, u(10));
    assert_eq!(updates[0].new_rate, u(8));
    assert_eq!(updates[0].total_staked, u(100));
}

#[test]
fn initialized_is_a_seed_not_a_reset() {
    let mut s = Stream::new();
    let mut agg = Aggregator::new();
    let a = addr(0xaa);

    agg.apply(&s.at(5, initialized(7))).unwrap();
    assert_eq!(
        agg.ledger().protocol_stats().unwrap().current_reward_rate,
        u(7)
    );

    // Prior activity survives a late (re-)initialization event.
    agg.apply(&s.at(10, staked(a, 100, 100, 7))).unwrap();
    agg.apply(&s.at(20, initialized(7))).unwrap();
    let stats = agg.ledger().protocol_stats().unwrap();
    assert_eq!(stats.total_staked, u(100));
    assert_eq!(stats.total_users, 1);
}

#[test]
fn same_block_events_get_distinct_record_ids() {
    let mut s = Stream::new();
    let mut agg = Aggregator::new();
    let a = addr(0xaa);
    let b = addr(0xbb);

    agg.apply(&s.at(10, staked(a, 100, 100, 5))).unwrap();
    agg.apply(&s.at_same_block(10, staked(b, 50, 150, 5)))
        .unwrap();

    let a_positions = agg.ledger().positions_for_user(&user_id(&a));
    let b_positions = agg.ledger().positions_for_user(&user_id(&b));
    assert_eq!(a_positions.len(), 1);
    assert_eq!(b_positions.len(), 1);
    assert_ne!(a_positions[0].id, b_positions[0].id);
    assert_eq!(a_positions[0].transaction_hash, b_positions[0].transaction_hash);
}

#[test]
fn out_of_order_event_is_fatal() {
    let mut s = Stream::new();
    let mut agg = Aggregator::new();
    let a = addr(0xaa);

    let first = s.at(10, staked(a, 100, 100, 5));
    let second = s.at(20, staked(a, 50, 150, 5));
    agg.apply(&first).unwrap();
    agg.apply(&second).unwrap();

    // Redelivery of an already-applied position is rejected without mutating.
    let err = agg.apply(&second).unwrap_err();
    assert!(matches!(err, AggregatorError::OutOfOrder { .. }));
    assert_eq!(
        agg.ledger().user(&user_id(&a)).unwrap().total_staked,
        u(150)
    );
    assert_eq!(agg.last_applied(), Some(StreamPosition::new(2, 0)));
}

#[test]
fn user_history_queries_order_newest_first() {
    let mut s = Stream::new();
    let mut agg = Aggregator::new();
    let a = addr(0xaa);

    agg.apply(&s.at(10, staked(a, 100, 100, 5))).unwrap();
    agg.apply(&s.at(20, staked(a, 50, 150, 5))).unwrap();
    agg.apply(&s.at(30, withdrawn(a, 25, 125, 5, 1))).unwrap();
    agg.apply(&s.at(40, claimed(a, 2, 0, 125))).unwrap();

    let uid = user_id(&a);
    let positions = agg.ledger().positions_for_user(&uid);
    assert_eq!(positions.len(), 2);
    assert_eq!(positions[0].timestamp, 20);
    assert_eq!(positions[1].timestamp, 10);
    assert_eq!(agg.ledger().withdrawals_for_user(&uid).len(), 1);
    assert_eq!(agg.ledger().claims_for_user(&uid).len(), 1);
    assert!(agg.ledger().emergency_withdrawals_for_user(&uid).is_empty());
}

#[test]
fn top_stakers_reflect_current_balances() {
    let mut s = Stream::new();
    let mut agg = Aggregator::new();
    let a = addr(0x01);
    let b = addr(0x02);
    let c = addr(0x03);

    agg.apply(&s.at(10, staked(a, 100, 100, 5))).unwrap();
    agg.apply(&s.at(20, staked(b, 300, 400, 5))).unwrap();
    agg.apply(&s.at(30, staked(c, 200, 600, 5))).unwrap();
    agg.apply(&s.at(40, emergency(b, 300, 10, 300))).unwrap();

    let top = agg.ledger().top_stakers(2);
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].id, user_id(&c));
    assert_eq!(top[1].id, user_id(&a));
}

#[test]
fn multi_day_snapshot_listing() {
    let mut s = Stream::new();
    let mut agg = Aggregator::new();
    let a = addr(0xaa);

    for day in 0u64..5 {
        let ts = day * 86_400 + 100;
        let total = (day + 1) * 10;
        agg.apply(&s.at(ts, staked(a, 10, total, 5))).unwrap();
    }
    let recent = agg.ledger().recent_daily_snapshots(3);
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0].date, 4 * 86_400);
    assert_eq!(recent[2].date, 2 * 86_400);

    let uid = user_id(&a);
    let user_recent = agg.ledger().recent_user_daily_snapshots(&uid, 2);
    assert_eq!(user_recent.len(), 2);
    assert_eq!(user_recent[0].date, 4 * 86_400);
    assert_eq!(user_recent[0].total_staked, u(50));
}
