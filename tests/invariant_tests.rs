//! Ledger invariants under concurrent replay
//!
//! Replays a contended workload (two buyers racing for every deal, admin
//! cancellations, withdrawals processed and rejected) with the async strategy
//! at several batch sizes. Every batch size must settle exactly like the sync
//! strategy, and every outcome must satisfy:
//!
//! - no balance is negative
//! - every balance equals the sum of that user's journal entries
//! - money is conserved: granted = balances + escrowed + withdrawn
//! - a deal's journal entries match its final status

#[cfg(test)]
mod tests {
    use escrow_engine::cli::StrategyType;
    use escrow_engine::config::EscrowConfig;
    use escrow_engine::io::load_snapshot;
    use escrow_engine::strategy::{create_strategy, BatchConfig, ServiceOptions};
    use escrow_engine::types::{DealStatus, EntryCause, WithdrawalStatus};
    use escrow_engine::StateSnapshot;
    use rstest::rstest;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::fmt::Write as _;
    use std::fs;
    use tempfile::TempDir;

    const ADMIN: i64 = 100;
    const SELLERS: std::ops::RangeInclusive<i64> = 1..=10;
    const DEALS_PER_SELLER: i64 = 5;

    fn buyer(n: i64) -> i64 {
        1001 + n.rem_euclid(10)
    }

    fn workload() -> String {
        let mut rows = String::from("command,user,deal,amount,target,currency,text\n");

        for n in 0..10 {
            writeln!(rows, "grant,{},,5000,{}", ADMIN, buyer(n)).unwrap();
        }
        for seller in SELLERS {
            for k in 0..DEALS_PER_SELLER {
                let amount = 100 + 10 * k;
                writeln!(rows, "create,{0},s{0}_{1},{2},,RUB,Gift {1}", seller, k, amount).unwrap();
            }
        }
        for k in 0..DEALS_PER_SELLER {
            for seller in SELLERS {
                writeln!(rows, "pay,{},s{}_{}", buyer(seller + k), seller, k).unwrap();
                writeln!(rows, "pay,{},s{}_{}", buyer(seller + k + 3), seller, k).unwrap();
            }
        }
        for seller in SELLERS.filter(|s| s % 2 == 0) {
            writeln!(rows, "cancel,{},s{}_4", ADMIN, seller).unwrap();
        }
        for k in 0..DEALS_PER_SELLER {
            for seller in SELLERS {
                writeln!(rows, "confirm_delivery,{},s{}_{}", seller, seller, k).unwrap();
                writeln!(rows, "confirm_receipt,{},s{}_{}", buyer(seller + k), seller, k).unwrap();
                writeln!(rows, "confirm_receipt,{},s{}_{}", buyer(seller + k + 3), seller, k)
                    .unwrap();
            }
        }
        for n in 0..10 {
            writeln!(rows, "withdraw,{},,50,,,card {}", buyer(n), n).unwrap();
        }
        for seller in SELLERS {
            writeln!(rows, "withdraw,{},,25,,,card s{}", seller, seller).unwrap();
        }
        for id in 1..=10 {
            writeln!(rows, "process_withdrawal,{},,,{}", ADMIN, id).unwrap();
        }
        for id in 11..=20 {
            writeln!(rows, "reject_withdrawal,{},,,{}", ADMIN, id).unwrap();
        }
        rows
    }

    fn replay(strategy_type: StrategyType, batch: BatchConfig) -> StateSnapshot {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("workload.csv");
        fs::write(&input, workload()).unwrap();
        let state_dir = dir.path().join("state");
        let config = EscrowConfig {
            admin_ids: vec![ADMIN],
            min_withdrawal: Decimal::ONE,
            ..EscrowConfig::default()
        };

        let strategy = create_strategy(
            strategy_type,
            ServiceOptions::new(config, Some(state_dir.clone())),
            Some(batch),
        );
        let mut output = Vec::new();
        strategy.process(&input, &mut output).unwrap();

        load_snapshot(&state_dir).unwrap()
    }

    /// What the users report shows, plus how many deals ended in each status
    fn settlement(snapshot: &StateSnapshot) -> (Vec<(i64, Decimal, u32, bool)>, [usize; 4]) {
        let users = snapshot
            .users
            .iter()
            .map(|user| (user.user_id, user.balance, user.successful_deals, user.is_banned))
            .collect();
        let mut statuses = [0; 4];
        for deal in &snapshot.deals {
            let slot = match deal.status {
                DealStatus::Active => 0,
                DealStatus::Paid => 1,
                DealStatus::Completed => 2,
                DealStatus::Cancelled => 3,
            };
            statuses[slot] += 1;
        }
        (users, statuses)
    }

    fn assert_invariants(snapshot: &StateSnapshot) {
        let mut journal_totals: HashMap<i64, Decimal> = HashMap::new();
        for entry in &snapshot.journal {
            *journal_totals.entry(entry.user_id).or_default() += entry.delta;
        }

        for user in &snapshot.users {
            assert!(user.balance >= Decimal::ZERO, "negative balance: {:?}", user);
            assert_eq!(
                journal_totals.get(&user.user_id).copied().unwrap_or_default(),
                user.balance,
                "journal disagrees with balance of user {}",
                user.user_id
            );
        }

        let granted: Decimal = snapshot
            .journal
            .iter()
            .filter(|entry| entry.cause == EntryCause::AdminGrant)
            .map(|entry| entry.delta)
            .sum();
        let balances: Decimal = snapshot.users.iter().map(|user| user.balance).sum();
        let escrowed: Decimal = snapshot
            .deals
            .iter()
            .filter(|deal| deal.status == DealStatus::Paid)
            .map(|deal| deal.amount)
            .sum();
        let withdrawn: Decimal = snapshot
            .withdrawals
            .iter()
            .filter(|request| request.status != WithdrawalStatus::Rejected)
            .map(|request| request.requested_amount)
            .sum();
        assert_eq!(granted, balances + escrowed + withdrawn);

        for deal in &snapshot.deals {
            let count = |cause: EntryCause| {
                snapshot
                    .journal
                    .iter()
                    .filter(|entry| entry.cause == cause && entry.reference == deal.deal_id)
                    .count()
            };
            let (payments, payouts, refunds) = (
                count(EntryCause::DealPayment),
                count(EntryCause::DealPayout),
                count(EntryCause::DealRefund),
            );
            match deal.status {
                DealStatus::Active => assert_eq!((payments, payouts, refunds), (0, 0, 0)),
                DealStatus::Paid => assert_eq!((payments, payouts, refunds), (1, 0, 0)),
                DealStatus::Completed => {
                    assert_eq!((payments, payouts, refunds), (1, 1, 0));
                    assert!(deal.seller_confirmed && deal.buyer_confirmed);
                }
                DealStatus::Cancelled => {
                    assert_eq!(payouts, 0);
                    assert_eq!(payments, refunds);
                }
            }
        }

        for user in &snapshot.users {
            let completed = snapshot
                .deals
                .iter()
                .filter(|deal| {
                    deal.seller_id == user.user_id && deal.status == DealStatus::Completed
                })
                .count() as u64;
            assert_eq!(u64::from(user.successful_deals), completed);
        }
    }

    #[rstest]
    #[case::single(BatchConfig::new(1, 2))]
    #[case::small(BatchConfig::new(16, 4))]
    #[case::whole_file(BatchConfig::new(10_000, 8))]
    fn test_async_replay_preserves_invariants(#[case] batch: BatchConfig) {
        let snapshot = replay(StrategyType::Async, batch);

        assert_eq!(snapshot.deals.len(), 50);
        assert_invariants(&snapshot);
        assert_eq!(
            settlement(&snapshot),
            settlement(&replay(StrategyType::Sync, BatchConfig::default()))
        );
    }

    #[test]
    fn test_sync_replay_is_fully_settled() {
        let snapshot = replay(StrategyType::Sync, BatchConfig::default());

        assert_invariants(&snapshot);
        // In file order every uncancelled deal is paid, delivered and received
        let completed = snapshot
            .deals
            .iter()
            .filter(|deal| deal.status == DealStatus::Completed)
            .count();
        assert_eq!(completed, 45);
    }
}
