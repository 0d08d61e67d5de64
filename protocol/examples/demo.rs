//! Interactive CLI demo of the full Coffer vault lifecycle.
//!
//! Walks through vault creation, collateral registration, NAV-priced
//! deposits, off-line withdrawal authorization, and manager-executed
//! settlement — single and batch. The output uses ANSI escape codes for
//! colored, storytelling-style terminal rendering.
//!
//! Run with:
//!   cargo run --example demo --release

use coffer_protocol::config::NETWORK_ID_DEVNET;
use coffer_protocol::crypto::keys::CofferKeypair;
use coffer_protocol::ledger::asset::{AssetToken, LedgerToken};
use coffer_protocol::ledger::Address;
use coffer_protocol::vault::{
    SignedWithdrawal, StaticReporter, Vault, VaultConfig, WithdrawalRequest,
};

// ---------------------------------------------------------------------------
// ANSI color constants
// ---------------------------------------------------------------------------

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

const BG_BLUE: &str = "\x1b[44m";

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

fn banner() {
    println!();
    println!("{BG_BLUE}{BOLD}{WHITE}                                                        {RESET}");
    println!("{BG_BLUE}{BOLD}{WHITE}    COFFER PROTOCOL  --  Vault Lifecycle Demo           {RESET}");
    println!("{BG_BLUE}{BOLD}{WHITE}    BTC-denominated shares | Ed25519 authorization      {RESET}");
    println!("{BG_BLUE}{BOLD}{WHITE}                                                        {RESET}");
    println!();
}

fn section(num: u32, title: &str) {
    println!();
    println!("{BOLD}{CYAN}===[{YELLOW} Step {num} {CYAN}]== {title} {RESET}");
}

fn line(label: &str, value: impl std::fmt::Display) {
    println!("  {DIM}{label:<28}{RESET}{value}");
}

fn btc(sats: u128) -> String {
    format!("{}.{:08} BTC", sats / 100_000_000, sats % 100_000_000)
}

fn shares(units: u128) -> String {
    format!(
        "{}.{:018} cfBTC",
        units / 1_000_000_000_000_000_000,
        units % 1_000_000_000_000_000_000
    )
}

fn main() {
    banner();

    // -----------------------------------------------------------------------
    section(1, "Create the vault");
    // -----------------------------------------------------------------------

    let manager_kp = CofferKeypair::generate();
    let manager = Address::from_public_key(&manager_kp.public_key());
    let vault_address = Address::from_public_key(&CofferKeypair::generate().public_key());

    let mut wbtc = LedgerToken::new("Wrapped Bitcoin", "wBTC", 8);
    let mut vault = Vault::new(
        VaultConfig {
            network_id: NETWORK_ID_DEVNET,
            address: vault_address,
            manager,
        },
        &wbtc,
        Box::new(StaticReporter::balance(0)),
    )
    .expect("vault construction");

    line("vault", vault.address());
    line("manager", manager.short());
    line("settlement asset", wbtc.symbol());

    let mut tbtc = LedgerToken::new("Threshold Bitcoin", "tBTC", 8);
    vault
        .add_collateral(&manager, &tbtc)
        .expect("register tBTC");
    line("registered collateral", "wBTC, tBTC");

    // -----------------------------------------------------------------------
    section(2, "Bootstrap deposit at 1:1");
    // -----------------------------------------------------------------------

    let alice_kp = CofferKeypair::generate();
    let alice = Address::from_public_key(&alice_kp.public_key());
    wbtc.mint(&alice, 10_000_000).expect("fund alice");

    let minted = vault
        .deposit_collateral(&mut wbtc, &alice, 10_000_000, &alice)
        .expect("alice deposit");
    line("alice deposits", btc(10_000_000));
    line("alice receives", shares(minted));

    // -----------------------------------------------------------------------
    section(3, "NAV drifts to 1.05 -- later depositors pay more");
    // -----------------------------------------------------------------------

    vault
        .set_reporter(&manager, Box::new(StaticReporter::balance(10_500_000)))
        .expect("reporter update");
    line("reported valuation", btc(10_500_000));

    let bob_kp = CofferKeypair::generate();
    let bob = Address::from_public_key(&bob_kp.public_key());
    tbtc.mint(&bob, 10_000_000).expect("fund bob");

    let bob_minted = vault
        .deposit_collateral(&mut tbtc, &bob, 10_000_000, &bob)
        .expect("bob deposit");
    line("bob deposits", format!("{} (tBTC)", btc(10_000_000)));
    line("bob receives", shares(bob_minted));
    line(
        "",
        format!("{DIM}(~95.2% of alice's mint -- NAV-aware pricing){RESET}"),
    );

    // -----------------------------------------------------------------------
    section(4, "Alice signs a withdrawal, offline");
    // -----------------------------------------------------------------------

    let request = WithdrawalRequest {
        owner: alice,
        destination: alice,
        shares: 50_000_000_000_000_000,
        nonce: 1,
        expires_at: 4_000_000_000,
        max_round: 10,
    };
    let signed = SignedWithdrawal::sign(request, &alice_kp, &vault.domain());
    line("authorized shares", shares(signed.request.shares));
    line("request id", &signed.request.id(&vault.domain())[..16]);
    line("wire size", format!("{} bytes", signed.to_bytes().len()));

    // -----------------------------------------------------------------------
    section(5, "Manager settles the withdrawal");
    // -----------------------------------------------------------------------

    // The vault now holds 0.1 wBTC + 0.1 tBTC; the reporter values the
    // whole book.
    vault
        .set_reporter(&manager, Box::new(StaticReporter::balance(20_500_000)))
        .expect("reporter update");

    let result = vault
        .process_withdrawal(&manager, &mut wbtc, &signed)
        .expect("settlement");
    line("shares burned", shares(result.shares));
    line("assets paid", btc(result.assets));
    line("round after", result.round);
    line(
        "replay attempt",
        match vault.process_withdrawal(&manager, &mut wbtc, &signed) {
            Err(e) => format!("{GREEN}rejected{RESET} ({e})"),
            Ok(_) => "accepted (this is a bug)".to_string(),
        },
    );

    // -----------------------------------------------------------------------
    section(6, "Batch settlement");
    // -----------------------------------------------------------------------

    vault.approve(&alice, &manager, u128::MAX);
    vault.approve(&bob, &manager, u128::MAX);

    let destinations = [alice, bob];
    let owners = [alice, bob];
    let amounts = [10_000_000_000_000_000u128, 20_000_000_000_000_000];
    let result = vault
        .batch_redeem(
            &manager,
            &mut wbtc,
            &amounts,
            &destinations,
            &owners,
            &[0, 0],
        )
        .expect("batch settlement");

    line("items settled", result.items.len());
    line("custody debit (once)", btc(result.total_assets));
    let paid: u128 = result.items.iter().map(|item| item.assets).sum();
    line(
        "conservation",
        format!(
            "sum(items) == debit: {}{}{RESET}",
            GREEN,
            paid == result.total_assets
        ),
    );
    line("round after", result.round);

    // -----------------------------------------------------------------------
    section(7, "Final books");
    // -----------------------------------------------------------------------

    line("total supply", shares(vault.total_supply()));
    line("alice shares", shares(vault.balance_of(&alice)));
    line("bob shares", shares(vault.balance_of(&bob)));
    line("wBTC liquidity", btc(vault.settlement_liquidity()));
    line("events emitted", vault.take_events().len());

    println!();
    println!("{BOLD}{GREEN}Lifecycle complete.{RESET}");
    println!();
}
