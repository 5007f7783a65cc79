use alloy_primitives::{address, Address, U256};
use assert2::assert;
use batch_ledger::{
    enumerator::{
        collect_candidates, scan_events, transfer_participants, EventSource, EventTarget,
    },
    BatchError,
};
use snx_contract::{LegacyBridgeToOptimism, SynthetixBridgeToOptimism, ERC20};

use crate::utils::{tx, MockChain, ALICE, BOB, CAROL};

mod utils;

const LEGACY_BRIDGE: Address = address!("0101010101010101010101010101010101010101");
const CURRENT_BRIDGE: Address = address!("0202020202020202020202020202020202020202");
const TOKEN: Address = address!("0303030303030303030303030303030303030303");

fn legacy_bridge() -> EventSource {
    EventSource::new(LEGACY_BRIDGE, 10)
        .with_event(EventTarget::primary::<LegacyBridgeToOptimism::Deposit>(
            |deposit| deposit.account,
        ))
        .with_event(EventTarget::secondary::<
            LegacyBridgeToOptimism::ExportedVestingEntries,
        >(|export| export.account))
}

fn current_bridge() -> EventSource {
    EventSource::new(CURRENT_BRIDGE, 50)
        .with_event(EventTarget::primary::<
            SynthetixBridgeToOptimism::DepositInitiated,
        >(|deposit| deposit._to))
        .with_event(EventTarget::secondary::<
            SynthetixBridgeToOptimism::ExportedVestingEntries,
        >(|export| export.account))
}

fn legacy_deposit(account: Address) -> LegacyBridgeToOptimism::Deposit {
    LegacyBridgeToOptimism::Deposit {
        account,
        amount: U256::from(1),
    }
}

fn legacy_export(account: Address) -> LegacyBridgeToOptimism::ExportedVestingEntries {
    LegacyBridgeToOptimism::ExportedVestingEntries {
        account,
        escrowedAccountBalance: U256::from(1),
        vestingEntries: vec![],
    }
}

fn current_deposit(from: Address, to: Address) -> SynthetixBridgeToOptimism::DepositInitiated {
    SynthetixBridgeToOptimism::DepositInitiated {
        _from: from,
        _to: to,
        _amount: U256::from(1),
    }
}

#[tokio::test]
async fn candidates_are_the_union_over_every_deployment() {
    let chain = MockChain::new(100);
    chain.push_event(LEGACY_BRIDGE, &legacy_deposit(ALICE), 11, tx(1));
    // Deposit with escrow migration: the export shares the deposit's transaction.
    chain.push_event(LEGACY_BRIDGE, &legacy_deposit(BOB), 12, tx(2));
    chain.push_event(LEGACY_BRIDGE, &legacy_export(BOB), 12, tx(2));
    // The new bridge deposits on behalf of another account.
    chain.push_event(CURRENT_BRIDGE, &current_deposit(ALICE, CAROL), 60, tx(3));
    chain.push_event(CURRENT_BRIDGE, &current_deposit(BOB, ALICE), 61, tx(4));

    let candidates = collect_candidates(&chain, &[legacy_bridge(), current_bridge()], 1000)
        .await
        .unwrap();

    assert!(candidates.addresses() == [ALICE, BOB, CAROL]);
}

#[tokio::test]
async fn secondary_event_in_the_same_transaction_is_dropped() {
    let chain = MockChain::new(100);
    let stranger = Address::repeat_byte(0x99);
    chain.push_event(LEGACY_BRIDGE, &legacy_deposit(ALICE), 11, tx(1));
    chain.push_event(LEGACY_BRIDGE, &legacy_export(stranger), 11, tx(1));
    chain.push_event(LEGACY_BRIDGE, &legacy_export(BOB), 13, tx(2));

    let candidates = collect_candidates(&chain, &[legacy_bridge()], 1000)
        .await
        .unwrap();

    assert!(candidates.addresses() == [ALICE, BOB]);
}

#[tokio::test]
async fn logs_outside_the_source_range_or_address_are_ignored() {
    let chain = MockChain::new(100);
    chain.push_event(LEGACY_BRIDGE, &legacy_deposit(ALICE), 9, tx(1));
    chain.push_event(LEGACY_BRIDGE, &legacy_deposit(BOB), 20, tx(2));
    chain.push_event(CURRENT_BRIDGE, &legacy_deposit(CAROL), 20, tx(3));

    let candidates = collect_candidates(&chain, &[legacy_bridge().up_to(30)], 1000)
        .await
        .unwrap();

    assert!(candidates.addresses() == [BOB]);
}

#[tokio::test]
async fn scan_is_paged_up_to_the_head() {
    let chain = MockChain::new(250);
    chain.push_event(LEGACY_BRIDGE, &legacy_deposit(ALICE), 10, tx(1));
    chain.push_event(LEGACY_BRIDGE, &legacy_deposit(BOB), 150, tx(2));
    chain.push_event(LEGACY_BRIDGE, &legacy_deposit(CAROL), 250, tx(3));
    let source = legacy_bridge();

    let mut scan = scan_events(&chain, &source, 100).await.unwrap();
    let mut pages = vec![];
    while let Some(page) = scan.next_page().await {
        pages.push(page.unwrap().len());
    }

    // [10, 109], [110, 209], [210, 250]
    assert!(pages == vec![1, 1, 1]);
    assert!(chain.get_logs_calls() == 3);
    assert!(scan.next_page().await.is_none());
}

#[tokio::test]
async fn parsed_events_carry_their_origin() {
    let chain = MockChain::new(100);
    chain.push_event(LEGACY_BRIDGE, &legacy_deposit(ALICE), 11, tx(7));
    let source = legacy_bridge();

    let events = scan_events(&chain, &source, 1000)
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();

    assert!(events.len() == 1);
    assert!(events[0].source == LEGACY_BRIDGE);
    assert!(events[0].event == "Deposit(address,uint256)");
    assert!(events[0].targets == vec![ALICE]);
    assert!(events[0].tx_hash == tx(7));
    assert!(events[0].block_number == 11);
}

#[tokio::test]
async fn empty_page_size_is_rejected() {
    let chain = MockChain::new(100);
    let source = legacy_bridge();

    assert!(let Err(BatchError::InvalidInput(_)) = scan_events(&chain, &source, 0).await);
}

#[tokio::test]
async fn transfer_participants_exclude_the_zero_address() {
    let chain = MockChain::new(100);
    let transfer = |from, to| ERC20::Transfer {
        from,
        to,
        value: U256::from(1),
    };
    chain.push_event(TOKEN, &transfer(Address::ZERO, ALICE), 1, tx(1));
    chain.push_event(TOKEN, &transfer(ALICE, BOB), 2, tx(2));
    chain.push_event(TOKEN, &transfer(BOB, Address::ZERO), 3, tx(3));
    let source = EventSource::new(TOKEN, 0).with_event(transfer_participants());

    let candidates = collect_candidates(&chain, &[source], 1000).await.unwrap();

    assert!(candidates.addresses() == [ALICE, BOB]);
}
