//! CSV format handling for command records and the users report
//!
//! This module centralizes all CSV format concerns, providing:
//! - CommandCsvRecord structure for deserialization
//! - Conversion from CSV records to [`Command`]s
//! - Users report serialization
//!
//! All functions are pure (no I/O) for easy testing.
//!
//! # Input columns
//!
//! `command,user,deal,amount,target,currency,text`
//!
//! | command              | uses                                        |
//! |----------------------|---------------------------------------------|
//! | `register`           | `text` (username, optional)                 |
//! | `requisites`         | `text`                                      |
//! | `create`             | `deal` (alias), `amount`, `currency`, `text`|
//! | `join`, `pay`, `confirm_delivery`, `confirm_receipt`, `cancel` | `deal` |
//! | `withdraw`           | `amount`, `text` (destination, optional)    |
//! | `process_withdrawal`, `reject_withdrawal` | `target` (request id)  |
//! | `grant`              | `target`, `amount`                          |
//! | `grant_unlimited`, `ban`, `unban` | `target`                       |

use crate::types::{Command, Currency, User, UserId, WithdrawalId};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// CSV record structure for deserialization
///
/// Every column but `command` and `user` is optional; which ones a command
/// needs depends on the command.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct CommandCsvRecord {
    pub command: String,
    pub user: UserId,
    #[serde(default)]
    pub deal: Option<String>,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Convert a CommandCsvRecord to a Command
///
/// # Returns
///
/// Result containing either:
/// - Ok(Command) - Successfully converted record
/// - Err(String) - Error message describing the conversion failure
pub fn convert_csv_record(record: CommandCsvRecord) -> Result<Command, String> {
    let user = record.user;
    let name = record.command.trim().to_lowercase();

    let command = match name.as_str() {
        "register" => Command::Register {
            user,
            username: non_empty(record.text),
        },
        "requisites" => Command::SetRequisites {
            user,
            requisites: non_empty(record.text)
                .ok_or_else(|| format!("requisites for user {} requires text", user))?,
        },
        "create" => Command::CreateDeal {
            user,
            alias: non_empty(record.deal),
            product_info: non_empty(record.text).unwrap_or_default(),
            currency: match non_empty(record.currency) {
                Some(currency) => Currency::from_str(&currency)?,
                None => Currency::default(),
            },
            amount: require_amount(&name, user, record.amount)?,
        },
        "join" | "pay" | "confirm_delivery" | "confirm_receipt" | "cancel" => {
            let deal = non_empty(record.deal)
                .ok_or_else(|| format!("{} for user {} requires a deal", name, user))?;
            match name.as_str() {
                "join" => Command::JoinDeal { user, deal },
                "pay" => Command::Pay { user, deal },
                "confirm_delivery" => Command::ConfirmDelivery { user, deal },
                "confirm_receipt" => Command::ConfirmReceipt { user, deal },
                _ => Command::CancelDeal { user, deal },
            }
        }
        "withdraw" => Command::Withdraw {
            user,
            amount: require_amount(&name, user, record.amount)?,
            destination: non_empty(record.text),
        },
        "process_withdrawal" => Command::ProcessWithdrawal {
            user,
            id: require_target::<WithdrawalId>(&name, user, record.target)?,
        },
        "reject_withdrawal" => Command::RejectWithdrawal {
            user,
            id: require_target::<WithdrawalId>(&name, user, record.target)?,
        },
        "grant" => Command::GrantBalance {
            user,
            target: require_target(&name, user, record.target)?,
            amount: require_amount(&name, user, record.amount)?,
        },
        "grant_unlimited" => Command::GrantUnlimited {
            user,
            target: require_target(&name, user, record.target)?,
        },
        "ban" => Command::Ban {
            user,
            target: require_target(&name, user, record.target)?,
        },
        "unban" => Command::Unban {
            user,
            target: require_target(&name, user, record.target)?,
        },
        _ => {
            return Err(format!(
                "Invalid command: '{}' for user {}",
                record.command, user
            ))
        }
    };

    Ok(command)
}

fn non_empty(field: Option<String>) -> Option<String> {
    field
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn require_amount(
    command: &str,
    user: UserId,
    amount: Option<String>,
) -> Result<Decimal, String> {
    let amount = non_empty(amount)
        .ok_or_else(|| format!("{} for user {} requires an amount", command, user))?;
    Decimal::from_str(&amount)
        .map_err(|_| format!("Invalid amount '{}' for user {}", amount, user))
}

fn require_target<T: FromStr>(
    command: &str,
    user: UserId,
    target: Option<String>,
) -> Result<T, String> {
    let target = non_empty(target)
        .ok_or_else(|| format!("{} for user {} requires a target", command, user))?;
    target
        .parse()
        .map_err(|_| format!("Invalid target '{}' for user {}", target, user))
}

/// Write user states to CSV format
///
/// Columns: user, balance, successful_deals, banned. Users are sorted by id
/// and balances printed with two decimal places.
pub fn write_users_csv(users: &[User], output: &mut dyn Write) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["user", "balance", "successful_deals", "banned"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted_users = users.to_vec();
    sorted_users.sort_by_key(|user| user.user_id);

    for user in sorted_users {
        writer
            .write_record(&[
                user.user_id.to_string(),
                format!("{:.2}", user.balance),
                user.successful_deals.to_string(),
                user.is_banned.to_string(),
            ])
            .map_err(|e| format!("Failed to write user record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn record(command: &str) -> CommandCsvRecord {
        CommandCsvRecord {
            command: command.to_string(),
            user: 1,
            ..CommandCsvRecord::default()
        }
    }

    #[test]
    fn test_convert_create_with_all_fields() {
        let csv_record = CommandCsvRecord {
            deal: Some("d1".into()),
            amount: Some(" 1000.50 ".into()),
            currency: Some("usdt".into()),
            text: Some("Telegram gift".into()),
            ..record("create")
        };

        let command = convert_csv_record(csv_record).unwrap();

        assert_eq!(
            command,
            Command::CreateDeal {
                user: 1,
                alias: Some("d1".into()),
                product_info: "Telegram gift".into(),
                currency: Currency::Usdt,
                amount: Decimal::new(100050, 2),
            }
        );
    }

    #[test]
    fn test_convert_create_defaults_currency() {
        let csv_record = CommandCsvRecord {
            amount: Some("10".into()),
            ..record("CREATE")
        };

        match convert_csv_record(csv_record).unwrap() {
            Command::CreateDeal {
                currency, alias, ..
            } => {
                assert_eq!(currency, Currency::Rub);
                assert_eq!(alias, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[rstest]
    #[case("join", "join")]
    #[case("pay", "pay")]
    #[case("confirm_delivery", "confirm_delivery")]
    #[case("confirm_receipt", "confirm_receipt")]
    #[case("cancel", "cancel")]
    fn test_convert_deal_commands(#[case] input: &str, #[case] expected_name: &str) {
        let csv_record = CommandCsvRecord {
            deal: Some("d1".into()),
            ..record(input)
        };

        let command = convert_csv_record(csv_record).unwrap();

        assert_eq!(command.name(), expected_name);
        assert_eq!(command.user(), 1);
    }

    #[rstest]
    #[case::invalid_command(record("refund"), "Invalid command")]
    #[case::pay_without_deal(record("pay"), "requires a deal")]
    #[case::create_without_amount(record("create"), "requires an amount")]
    #[case::withdraw_bad_amount(
        CommandCsvRecord { amount: Some("lots".into()), ..record("withdraw") },
        "Invalid amount"
    )]
    #[case::grant_without_target(
        CommandCsvRecord { amount: Some("5".into()), ..record("grant") },
        "requires a target"
    )]
    #[case::ban_bad_target(
        CommandCsvRecord { target: Some("x".into()), ..record("ban") },
        "Invalid target"
    )]
    #[case::unknown_currency(
        CommandCsvRecord { amount: Some("5".into()), currency: Some("EUR".into()), ..record("create") },
        "Unknown currency"
    )]
    #[case::requisites_without_text(record("requisites"), "requires text")]
    fn test_convert_csv_record_errors(
        #[case] csv_record: CommandCsvRecord,
        #[case] expected_error: &str,
    ) {
        let result = convert_csv_record(csv_record);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains(expected_error));
    }

    #[test]
    fn test_convert_withdraw_and_processing() {
        let withdraw = CommandCsvRecord {
            amount: Some("10000".into()),
            text: Some("card 4242".into()),
            ..record("withdraw")
        };
        let reject = CommandCsvRecord {
            target: Some("3".into()),
            ..record("reject_withdrawal")
        };

        assert_eq!(
            convert_csv_record(withdraw).unwrap(),
            Command::Withdraw {
                user: 1,
                amount: Decimal::new(10000, 0),
                destination: Some("card 4242".into()),
            }
        );
        assert_eq!(
            convert_csv_record(reject).unwrap(),
            Command::RejectWithdrawal { user: 1, id: 3 }
        );
    }

    #[rstest]
    #[case::single_user(
        vec![User { balance: Decimal::new(1500, 0), ..User::new(1) }],
        "user,balance,successful_deals,banned\n1,1500.00,0,false\n"
    )]
    #[case::sorted_by_user_id(
        vec![
            User { successful_deals: 2, ..User::new(3) },
            User { is_banned: true, ..User::new(1) },
        ],
        "user,balance,successful_deals,banned\n1,0.00,0,true\n3,0.00,2,false\n"
    )]
    #[case::two_decimal_precision(
        vec![User { balance: Decimal::new(1001234, 4), ..User::new(1) }],
        "user,balance,successful_deals,banned\n1,100.12,0,false\n"
    )]
    #[case::empty_users(vec![], "user,balance,successful_deals,banned\n")]
    fn test_write_users_csv(#[case] users: Vec<User>, #[case] expected_output: &str) {
        let mut output = Vec::new();
        let result = write_users_csv(&users, &mut output);
        assert!(result.is_ok());

        let output_str = String::from_utf8(output).unwrap();
        assert_eq!(output_str, expected_output);
    }
}
