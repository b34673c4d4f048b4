//! End-to-end integration tests
//!
//! These tests validate the complete command replay pipeline using predefined
//! CSV fixtures. Each test:
//! 1. Reads input.csv from a fixture directory
//! 2. Replays all commands through the escrow service
//! 3. Generates the users report
//! 4. Compares actual output with expected.csv
//!
//! Fixtures live in tests/fixtures/ and cover the deal lifecycle, rejected
//! payments and confirmations, withdrawals, admin operations, cancellation
//! refunds and malformed input. User 100 is the admin in every fixture.
//!
//! Each fixture runs with the sync strategy, with the async strategy at batch
//! size 1 and with the async strategy at its default batch size, where a whole
//! fixture fits in one batch and is split into parallel groups.

#[cfg(test)]
mod tests {
    use escrow_engine::cli::StrategyType;
    use escrow_engine::config::EscrowConfig;
    use escrow_engine::strategy::{create_strategy, BatchConfig, ServiceOptions};
    use rstest::rstest;
    use std::fs;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use tempfile::{NamedTempFile, TempDir};

    const ADMIN: i64 = 100;

    fn options(state_dir: Option<PathBuf>) -> ServiceOptions {
        let config = EscrowConfig {
            admin_ids: vec![ADMIN],
            ..EscrowConfig::default()
        };
        ServiceOptions::new(config, state_dir)
    }

    fn run(
        input: &Path,
        strategy_type: StrategyType,
        batch: BatchConfig,
        options: ServiceOptions,
    ) -> String {
        let strategy = create_strategy(strategy_type, options, Some(batch));
        let mut temp_output = NamedTempFile::new().expect("Failed to create temp file");

        strategy
            .process(input, &mut temp_output)
            .unwrap_or_else(|e| panic!("Failed to process commands: {}", e));
        temp_output.flush().expect("Failed to flush temp file");

        fs::read_to_string(temp_output.path())
            .unwrap_or_else(|e| panic!("Failed to read temp output file: {}", e))
    }

    /// Run a fixture and compare its report with expected.csv
    ///
    /// # Panics
    ///
    /// Panics if the fixture files cannot be read or the output differs.
    fn run_test_fixture(fixture_name: &str, strategy_type: StrategyType, batch: BatchConfig) {
        let fixture_dir = format!("tests/fixtures/{}", fixture_name);
        let input_path = format!("{}/input.csv", fixture_dir);
        let expected_path = format!("{}/expected.csv", fixture_dir);

        assert!(
            Path::new(&input_path).exists(),
            "Input file not found: {}",
            input_path
        );

        let actual_output = run(
            Path::new(&input_path),
            strategy_type.clone(),
            batch.clone(),
            options(None),
        );
        let expected_output = fs::read_to_string(&expected_path)
            .unwrap_or_else(|e| panic!("Failed to read expected file {}: {}", expected_path, e));

        assert_eq!(
            actual_output, expected_output,
            "\n\nOutput mismatch for fixture: {} (strategy: {:?}, {:?})\n\nActual output:\n{}\n\nExpected output:\n{}\n",
            fixture_name, strategy_type, batch, actual_output, expected_output
        );
    }

    #[rstest]
    #[case("happy_path")]
    #[case("insufficient_funds")]
    #[case("self_deal")]
    #[case("double_pay")]
    #[case("confirmation_order")]
    #[case("withdrawals")]
    #[case("admin_ban_grant")]
    #[case("cancel_refund")]
    #[case("malformed_data")]
    fn test_fixtures(
        #[case] fixture: &str,
        #[values(
            (StrategyType::Sync, BatchConfig::default()),
            (StrategyType::Async, BatchConfig::new(1, 2)),
            (StrategyType::Async, BatchConfig::default())
        )]
        setup: (StrategyType, BatchConfig),
    ) {
        let (strategy, batch) = setup;
        run_test_fixture(fixture, strategy, batch);
    }

    /// A deal paid in one run can be completed in the next
    #[rstest]
    fn test_state_dir_carries_deals_between_runs(
        #[values(StrategyType::Sync, StrategyType::Async)] strategy: StrategyType,
    ) {
        let dir = TempDir::new().unwrap();
        let state_dir = dir.path().join("state");

        let first = dir.path().join("first.csv");
        fs::write(
            &first,
            "command,user,deal,amount,target,currency,text\n\
             grant,100,,1500,2\n\
             create,1,d1,1000,,RUB,Gift\n",
        )
        .unwrap();
        let report = run(
            &first,
            strategy.clone(),
            BatchConfig::default(),
            options(Some(state_dir.clone())),
        );
        assert_eq!(
            report,
            "user,balance,successful_deals,banned\n1,0.00,0,false\n2,1500.00,0,false\n"
        );

        // Aliases are per run, so the second run needs the generated id
        let deals = fs::read_to_string(state_dir.join("deals.csv")).unwrap();
        let deal_id = deals
            .lines()
            .nth(1)
            .and_then(|row| row.split(',').next())
            .unwrap()
            .to_string();

        let second = dir.path().join("second.csv");
        fs::write(
            &second,
            format!(
                "command,user,deal,amount,target,currency,text\n\
                 pay,2,{id}\n\
                 confirm_delivery,1,{id}\n\
                 confirm_receipt,2,{id}\n",
                id = deal_id
            ),
        )
        .unwrap();
        let report = run(
            &second,
            strategy,
            BatchConfig::default(),
            options(Some(state_dir.clone())),
        );

        assert_eq!(
            report,
            "user,balance,successful_deals,banned\n1,1000.00,1,false\n2,500.00,0,false\n"
        );
        assert!(state_dir.join("ledger.csv").exists());
    }
}
