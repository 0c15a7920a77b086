#![forbid(unsafe_code)]
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use trinity_admission::coins::Coins;
use trinity_admission::config::{load_config, AdmissionConfig};
use trinity_admission::crypto::{address_from_string, address_to_hex, Address, KeyPair};
use trinity_admission::keepers::{AccountKeeper, BondStatus, Validator, ValidatorSnapshot};
use trinity_admission::memstore::{
    InMemoryAccounts, InMemoryBank, InMemoryFeegrant, InMemoryGlobalFeeParams,
    InMemoryRelayStore, StaticValidatorSet,
};
use trinity_admission::signing::{sign_tx, DefaultSignModeHandler, SignerKey};
use trinity_admission::telemetry::init_tracing;
use trinity_admission::transaction::{Fee, Msg, SignMode, Tx, VoteOption};
use trinity_admission::{ExecMode, ExecutionContext, HandlerOptions, Pipeline};

#[derive(Parser)]
#[command(author, version, about = "Run transactions through the admission pipeline", long_about = None)]
struct Cli {
    /// Path to the TOML configuration (defaults apply when absent)
    #[arg(long, default_value = "admission.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Admits every transaction of a JSON fixture in order
    Run {
        /// Fixture with accounts, validators and transactions
        fixture: PathBuf,
        /// Dry-run: report gas without moving fees or sequences
        #[arg(long)]
        simulate: bool,
        /// Block height the transactions are checked at
        #[arg(long, default_value_t = 1)]
        height: u64,
        #[arg(long, value_enum, default_value_t = Mode::Check)]
        mode: Mode,
    },
    /// Prints the effective parameters
    Params,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Check,
    Recheck,
    Deliver,
}

impl From<Mode> for ExecMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Check => ExecMode::Check,
            Mode::Recheck => ExecMode::ReCheck,
            Mode::Deliver => ExecMode::Deliver,
        }
    }
}

#[derive(Deserialize)]
struct Fixture {
    accounts: Vec<FixtureAccount>,
    #[serde(default)]
    validators: Vec<FixtureValidator>,
    transactions: Vec<FixtureTx>,
}

#[derive(Deserialize)]
struct FixtureAccount {
    name: String,
    #[serde(default)]
    balance: String,
}

#[derive(Deserialize)]
struct FixtureValidator {
    name: String,
    tokens: u128,
}

#[derive(Deserialize)]
struct FixtureTx {
    signers: Vec<String>,
    messages: Vec<FixtureMsg>,
    #[serde(default)]
    fee: String,
    gas: u64,
    #[serde(default)]
    memo: String,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum FixtureMsg {
    Send {
        from: String,
        to: String,
        amount: String,
    },
    Vote {
        voter: String,
        proposal_id: u64,
        option: VoteOption,
    },
    Deposit {
        depositor: String,
        proposal_id: u64,
        amount: String,
    },
}

/// Deterministic key per fixture name.
fn keypair_for(name: &str) -> Result<KeyPair, Box<dyn std::error::Error>> {
    let secret = Sha256::digest(format!("admission-check:{}", name).as_bytes());
    Ok(KeyPair::from_secret_bytes(&secret)?)
}

struct Keyring {
    keys: HashMap<String, KeyPair>,
}

impl Keyring {
    fn address(&self, name: &str) -> Address {
        self.keys
            .get(name)
            .map(KeyPair::address)
            .unwrap_or_else(|| address_from_string(name))
    }

    fn to_msg(&self, msg: &FixtureMsg) -> Result<Msg, Box<dyn std::error::Error>> {
        Ok(match msg {
            FixtureMsg::Send { from, to, amount } => Msg::Send {
                from_address: self.address(from),
                to_address: self.address(to),
                amount: amount.parse()?,
            },
            FixtureMsg::Vote {
                voter,
                proposal_id,
                option,
            } => Msg::Vote {
                proposal_id: *proposal_id,
                voter: self.address(voter),
                option: *option,
            },
            FixtureMsg::Deposit {
                depositor,
                proposal_id,
                amount,
            } => Msg::Deposit {
                proposal_id: *proposal_id,
                depositor: self.address(depositor),
                amount: amount.parse()?,
            },
        })
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    init_tracing(&config.log.level);

    match cli.command {
        Commands::Run {
            fixture,
            simulate,
            height,
            mode,
        } => run(&config, &fixture, simulate, height, mode.into()),
        Commands::Params => {
            print_params(&config)?;
            Ok(())
        }
    }
}

fn print_params(config: &AdmissionConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "Admission parameters".bright_cyan().bold());
    println!("  chain id:           {}", config.chain.chain_id.bright_yellow());
    println!("  auth:               {:?}", config.auth_params());
    println!("  node min gas price: {}", config.fees.min_gas_prices);
    match config.global_fee_params()? {
        Some(params) => println!("  global fee floor:   {:?}", params),
        None => println!("  global fee floor:   {}", "none".dimmed()),
    }
    println!("  floor activation:   {:?}", config.floor_activation());
    println!("  vote policy:        {:?}", config.governance.vote_policy);
    Ok(())
}

fn run(
    config: &AdmissionConfig,
    fixture_path: &Path,
    simulate: bool,
    height: u64,
    mode: ExecMode,
) -> Result<(), Box<dyn std::error::Error>> {
    let fixture: Fixture = serde_json::from_str(&fs::read_to_string(fixture_path)?)?;

    let accounts = Arc::new(InMemoryAccounts::with_params(config.auth_params()));
    let bank = Arc::new(InMemoryBank::new());
    let mut keys = HashMap::new();
    for account in &fixture.accounts {
        let kp = keypair_for(&account.name)?;
        accounts.create_account(kp.address());
        bank.set_balance(kp.address(), account.balance.parse::<Coins>()?);
        keys.insert(account.name.clone(), kp);
    }
    let keyring = Keyring { keys };

    let snapshot = ValidatorSnapshot::new(fixture.validators.iter().map(|v| Validator {
        operator: keyring.address(&v.name),
        tokens: v.tokens,
        status: BondStatus::Bonded,
    }));

    let pipeline = Pipeline::build(HandlerOptions {
        account_keeper: Some(accounts.clone()),
        bank_keeper: Some(bank),
        sign_mode_handler: Some(Arc::new(DefaultSignModeHandler)),
        relay_keeper: Some(Arc::new(InMemoryRelayStore::new())),
        feegrant_keeper: Some(Arc::new(InMemoryFeegrant::new())),
        global_fee_params: Some(Arc::new(InMemoryGlobalFeeParams::new(
            "globalfee",
            config.global_fee_params()?,
        ))),
        validator_set: Some(Arc::new(StaticValidatorSet::new(snapshot))),
        vote_policy: config.governance.vote_policy,
        floor_activation: config.floor_activation(),
        ..HandlerOptions::default()
    })?;
    info!(transactions = fixture.transactions.len(), simulate, "running fixture");

    let min_gas_prices = config.node_min_gas_prices()?;
    let mut accepted = 0usize;
    for (i, ftx) in fixture.transactions.iter().enumerate() {
        let messages = ftx
            .messages
            .iter()
            .map(|m| keyring.to_msg(m))
            .collect::<Result<Vec<_>, _>>()?;
        let mut tx = Tx::new(
            messages,
            Fee {
                amount: ftx.fee.parse()?,
                gas_limit: ftx.gas,
                ..Fee::default()
            },
        )
        .with_memo(&ftx.memo);

        let mut signer_keys = Vec::new();
        for name in &ftx.signers {
            let kp = keyring
                .keys
                .get(name)
                .ok_or_else(|| format!("unknown signer {}", name))?;
            let account = accounts
                .account(&kp.address())
                .ok_or_else(|| format!("no account for {}", name))?;
            signer_keys.push(SignerKey {
                keypair: kp,
                account_number: account.account_number,
                sequence: account.sequence,
            });
        }
        sign_tx(
            &mut tx,
            &signer_keys,
            &config.chain.chain_id,
            SignMode::Direct,
            &DefaultSignModeHandler,
        )?;

        let mut ctx = ExecutionContext::new(&config.chain.chain_id, height)
            .with_mode(mode)
            .with_min_gas_prices(min_gas_prices.clone());
        if let Some(max) = config.chain.max_block_gas {
            ctx = ctx.with_max_block_gas(max);
        }

        let hash = tx.hash_str();
        let admission = pipeline.run(ctx, &tx, simulate);
        match &admission.result {
            Ok(()) => {
                accepted += 1;
                println!(
                    "{} tx {} {} gas {}/{} priority {}",
                    "✓".bright_green(),
                    i,
                    hash.get(..12).unwrap_or_default().dimmed(),
                    admission.gas_used(),
                    admission.gas_wanted(),
                    admission.priority().unwrap_or_default()
                );
                for event in admission.events() {
                    if event.kind == "validator_vote" {
                        println!(
                            "    {} validator vote by {}",
                            "tagged".yellow(),
                            event.get("voter").and_then(|v| v.get(..12)).unwrap_or("?")
                        );
                    }
                }
            }
            Err(e) => println!(
                "{} tx {} rejected (code {}): {} [gas used {}]",
                "✗".bright_red(),
                i,
                e.code(),
                e.to_string().red(),
                admission.gas_used()
            ),
        }
    }

    println!(
        "\n{} {}/{} accepted{}",
        "Summary:".bold(),
        accepted,
        fixture.transactions.len(),
        if simulate { " (simulated)" } else { "" }
    );
    for (name, kp) in &keyring.keys {
        if let Some(acc) = accounts.account(&kp.address()) {
            println!(
                "  {} {} sequence {}",
                name.bright_yellow(),
                address_to_hex(&acc.address)[..12].dimmed(),
                acc.sequence
            );
        }
    }
    Ok(())
}
