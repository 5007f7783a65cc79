use std::path::PathBuf;

use alloy_primitives::address;
use assert2::assert;
use batch_ledger::Amount;
use clap::Parser;
use rstest::rstest;

use super::*;

#[test]
fn verify_cli() {
    use clap::CommandFactory;
    CliConfig::command().debug_assert()
}

#[test]
fn write_command_is_parsed_with_global_options() {
    let config = CliConfig::try_parse_from([
        "snx-ops",
        "distribute-rewards",
        "--network",
        "kovan",
        "--use-ovm",
        "--total-rewards",
        "100",
        "--gas-price",
        "1.5",
        "--dry-run",
        "--data-file",
        "scores.json",
    ])
    .unwrap();

    assert!(config.network == Network::Kovan);
    assert!(config.use_ovm);
    assert!(config.data_file() == Some(PathBuf::from("scores.json")));
    let Command::DistributeRewards(cmd) = config.command else {
        panic!("expected distribute-rewards");
    };
    assert!(cmd.total_rewards == Amount::from_ether("100").unwrap());
    assert!(cmd.weight == "escrowed");
    assert!(cmd.write.dry_run);
    assert!(cmd.write.gas_price_wei().unwrap() == Some(1_500_000_000));
    assert!(cmd.write.confirmation_timeout().as_secs() == 300);
}

#[test]
fn debts_ledger_is_named_after_the_deployment_block() {
    let config = CliConfig::try_parse_from(["snx-ops", "debts"]).unwrap();

    assert!(config.data_file() == Some(PathBuf::from("data/14169250-users-debts.json")));
    let Command::Debts(cmd) = config.command else {
        panic!("expected debts");
    };
    assert!(cmd.address == address!("89FCb32F29e509cc42d0C8b6f058C993013A843F"));
    assert!(cmd.concurrency == 15);
}

#[test]
fn list_jobs_default_to_the_original_field_names() {
    let transfers =
        CliConfig::try_parse_from(["snx-ops", "transfer-list", "--list-file", "payouts.json"])
            .unwrap();
    let migration =
        CliConfig::try_parse_from(["snx-ops", "escrow-migration", "--account-json", "a.json"])
            .unwrap();

    assert!(transfers.data_file() == Some(PathBuf::from("data/l2-snx-airdrop.json")));
    let Command::TransferList(cmd) = transfers.command else {
        panic!("expected transfer-list");
    };
    assert!(cmd.address_field == "Wallet address");
    assert!(cmd.amount_field == "SNX to pay");
    assert!(cmd.action == "transfer");
    let Command::EscrowMigration(cmd) = migration.command else {
        panic!("expected escrow-migration");
    };
    assert!(cmd.address_field == "address");
    assert!(cmd.batch_size == 500);
    assert!(cmd.vesting_batch_size == 200);
}

#[test]
fn revert_reason_keeps_no_ledger() {
    let config = CliConfig::try_parse_from([
        "snx-ops",
        "revert-reason",
        "--tx-hash",
        "0x1111111111111111111111111111111111111111111111111111111111111111",
    ])
    .unwrap();

    assert!(config.data_file().is_none());
}

#[rstest]
#[case::negative("-1")]
#[case::comma("0,05")]
#[case::not_a_number("lots")]
fn invalid_amounts_are_rejected(#[case] amount: &str) {
    let result = CliConfig::try_parse_from([
        "snx-ops",
        "airdrop",
        "--token",
        "0x4200000000000000000000000000000000000006",
        "--amount-to-drop",
        amount,
    ]);

    assert!(result.is_err());
}

#[test]
fn unknown_network_is_rejected() {
    assert!(CliConfig::try_parse_from(["snx-ops", "--network", "ropsten", "debts"]).is_err());
}

#[test]
fn provider_url_resolution() {
    let template = Some("https://network.infura.io/v3/key".to_string());

    // CLI wins over the environment.
    assert!(
        resolve_provider_url(
            Some("http://node:8545".into()),
            template.clone(),
            Network::Mainnet,
            false
        )
        .unwrap()
            == "http://node:8545"
    );
    // The environment template is expanded.
    assert!(
        resolve_provider_url(None, template, Network::Kovan, false).unwrap()
            == "https://kovan.infura.io/v3/key"
    );
    // Defaults exist only for public L2 endpoints and the local node.
    assert!(
        resolve_provider_url(None, None, Network::Mainnet, true).unwrap()
            == "https://mainnet.optimism.io"
    );
    assert!(
        resolve_provider_url(None, None, Network::Local, false).unwrap() == "http://localhost:8545"
    );
    assert!(resolve_provider_url(None, None, Network::Mainnet, false).is_err());
    assert!(resolve_provider_url(None, None, Network::Goerli, true).is_err());
}

#[test]
fn value_resolution_order() {
    const ENV: &str = "SNX_OPS_TEST_LOGGING_FORMAT";
    std::env::remove_var(ENV);

    assert!(
        resolve_value(Some(LoggingFormat::Json), ENV, Some(LoggingFormat::Text)).unwrap()
            == LoggingFormat::Json
    );
    assert!(resolve_value(None, ENV, Some(LoggingFormat::Text)).unwrap() == LoggingFormat::Text);
    assert!(resolve_value::<LoggingFormat>(None, ENV, None).is_err());

    std::env::set_var(ENV, "JSON");
    assert!(resolve_value(None, ENV, Some(LoggingFormat::Text)).unwrap() == LoggingFormat::Json);

    std::env::set_var(ENV, "yaml");
    assert!(resolve_value(None, ENV, Some(LoggingFormat::Text)).is_err());
    std::env::remove_var(ENV);
}
