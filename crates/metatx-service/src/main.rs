//! Main entry point for the meta-transaction relay CLI.
//!
//! Builds a relayer from the configuration file and runs one command:
//! relaying a `storeText` call on behalf of a user, computing a request
//! digest offline, or inspecting forwarder and storage state.

use clap::{Parser, Subcommand};
use metatx_account::implementations::local::LocalWallet;
use metatx_config::Config;
use metatx_core::{MetaTransactionRequestBuilder, RelayOutcome, Relayer};
use metatx_types::contracts::encode_store_text;
use metatx_types::utils::{parse_address, parse_hex_bytes, parse_u256};
use metatx_types::{format_ether, Address, Bytes, DigestEncoding, SecretString, U256};
use std::path::PathBuf;

mod factory_registry;

/// Command-line arguments for the relay CLI.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Relay `storeText(text)` signed by a user through the forwarder
	Relay {
		#[arg(long)]
		text: String,
		/// User private key; a fresh random wallet is used when omitted
		#[arg(long, env = "USER_PRIVATE_KEY")]
		user_key: Option<String>,
		/// Fund the user wallet with `relay.funding_wei` first
		#[arg(long)]
		fund: bool,
	},
	/// Compute a forward request digest without touching the network
	Digest {
		#[arg(long, value_parser = parse_address)]
		from: Address,
		#[arg(long, value_parser = parse_address)]
		to: Address,
		#[arg(long, value_parser = parse_u256, default_value = "0")]
		value: U256,
		#[arg(long, value_parser = parse_u256, default_value = "1000000")]
		gas: U256,
		#[arg(long, value_parser = parse_u256)]
		nonce: U256,
		/// Raw calldata as hex
		#[arg(long, value_parser = parse_hex_bytes, conflicts_with = "text")]
		data: Option<Bytes>,
		/// Encode `storeText(text)` as calldata
		#[arg(long)]
		text: Option<String>,
		/// Overrides `relay.encoding`
		#[arg(long)]
		encoding: Option<DigestEncoding>,
	},
	/// Print the forwarder nonce of an address
	Nonce {
		#[arg(long, value_parser = parse_address)]
		address: Address,
	},
	/// Send native value from the relayer wallet
	Fund {
		#[arg(long, value_parser = parse_address)]
		address: Address,
		/// Amount in wei; defaults to `relay.funding_wei`
		#[arg(long, value_parser = parse_u256)]
		amount: Option<U256>,
	},
	/// Read `texts(owner, index)` from the text storage contract
	Read {
		#[arg(long, value_parser = parse_address)]
		owner: Address,
		#[arg(long, value_parser = parse_u256, default_value = "0")]
		index: U256,
	},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	let config_path = args
		.config
		.to_str()
		.ok_or("Configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!(
		network_id = config.relay.network_id,
		"Loaded configuration [{}]",
		config_path
	);

	match args.command {
		Command::Digest {
			from,
			to,
			value,
			gas,
			nonce,
			data,
			text,
			encoding,
		} => {
			let data = match (data, text) {
				(Some(data), _) => data,
				(None, Some(text)) => encode_store_text(&text),
				(None, None) => Bytes::new(),
			};
			let builder = MetaTransactionRequestBuilder::new(config.forwarder_domain()?)
				.with_encoding(encoding.unwrap_or(config.relay.encoding));
			let request = builder.build_request(from, to, value, gas, data, nonce);
			println!("{}", builder.compute_digest(&request));
		},
		Command::Relay {
			text,
			user_key,
			fund,
		} => {
			let funding = config.funding_amount()?;
			let relayer = factory_registry::build_relayer_from_config(config).await?;
			let user = match user_key {
				Some(key) => LocalWallet::new(&SecretString::from(key))?,
				None => LocalWallet::random(),
			};
			relay_text(&relayer, &user, &text, fund.then_some(funding)).await?;
		},
		Command::Nonce { address } => {
			let relayer = factory_registry::build_relayer_from_config(config).await?;
			println!("{}", relayer.fetch_nonce(address).await?);
		},
		Command::Fund { address, amount } => {
			let amount = match amount {
				Some(amount) => amount,
				None => config.funding_amount()?,
			};
			let relayer = factory_registry::build_relayer_from_config(config).await?;
			let receipt = relayer.fund(address, amount).await?;
			println!("{}", receipt.hash);
			println!(
				"balance: {} ETH",
				format_ether(relayer.balance(address).await?)
			);
		},
		Command::Read { owner, index } => {
			let relayer = factory_registry::build_relayer_from_config(config).await?;
			println!("{}", relayer.stored_text(owner, index).await?);
		},
	}

	Ok(())
}

/// Runs the full flow for one user: optional funding, relay, event report.
async fn relay_text(
	relayer: &Relayer,
	user: &LocalWallet,
	text: &str,
	funding: Option<U256>,
) -> Result<(), Box<dyn std::error::Error>> {
	let from = user.address();
	tracing::info!(user = %from, relayer = %relayer.relayer_address().await?, "Relaying as user");

	if let Some(amount) = funding {
		relayer.fund(from, amount).await?;
	}

	let report = relayer.store_text(user, text).await?;
	println!("digest: {}", report.signed.digest());
	println!("signature: {}", report.signed.signature_bytes());

	match &report.outcome {
		RelayOutcome::Confirmed { receipt, events } => {
			println!("confirmed: {} (block {})", receipt.hash, receipt.block_number);
			for event in events {
				println!("TextStored({}, {:?})", event.user, event.text);
			}
			if events.is_empty() {
				return Err(format!("no TextStored event in transaction {}", receipt.hash).into());
			}
		},
		RelayOutcome::Reverted { receipt } => {
			return Err(format!("execute reverted in transaction {}", receipt.hash).into());
		},
	}

	Ok(())
}
