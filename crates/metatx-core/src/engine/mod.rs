//! Relay orchestration.
//!
//! The [`Relayer`] performs the full meta-transaction round trip: read the
//! signer's forwarder nonce, build and sign the request, submit it through
//! `execute` from the relayer wallet, wait for the receipt and decode the
//! `TextStored` events it carries. It also funds wallets and reads stored
//! text, which the end-to-end flow needs around the relay itself.

use crate::request::{MetaTransactionRequestBuilder, SignedRequest};
use crate::state::{RelayAttempt, RelayState};
use crate::ForwarderError;
use metatx_account::{AccountInterface, AccountService};
use metatx_delivery::DeliveryService;
use metatx_types::contracts::{decode_text_stored, encode_store_text};
use metatx_types::{
	truncate_hex, Address, Bytes, TextStoredEvent, TransactionReceipt, U256,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::instrument;

/// Final on-chain result of a submitted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
	/// `execute` was mined successfully.
	Confirmed {
		receipt: TransactionReceipt,
		/// `TextStored` events emitted by the configured storage contract.
		events: Vec<TextStoredEvent>,
	},
	/// `execute` was mined but reverted.
	Reverted { receipt: TransactionReceipt },
}

impl RelayOutcome {
	pub fn receipt(&self) -> &TransactionReceipt {
		match self {
			RelayOutcome::Confirmed { receipt, .. } | RelayOutcome::Reverted { receipt } => receipt,
		}
	}

	pub fn is_confirmed(&self) -> bool {
		matches!(self, RelayOutcome::Confirmed { .. })
	}
}

/// Everything known about a finished relay.
#[derive(Debug, Clone)]
pub struct RelayReport {
	pub signed: SignedRequest,
	pub attempt: RelayAttempt,
	pub outcome: RelayOutcome,
}

/// Submits signed forward requests through one forwarder.
pub struct Relayer {
	builder: MetaTransactionRequestBuilder,
	delivery: Arc<DeliveryService>,
	account: Arc<AccountService>,
	text_storage: Address,
	gas: U256,
	remote_verify: bool,
	/// One lock per signer so nonce reads and submissions do not interleave.
	/// Entries are dropped once no relay holds or waits on them.
	signer_locks: Mutex<HashMap<Address, Arc<Mutex<()>>>>,
}

impl Relayer {
	/// `account` is the relayer wallet; `text_storage` the contract whose
	/// events are decoded from receipts.
	pub fn new(
		builder: MetaTransactionRequestBuilder,
		delivery: Arc<DeliveryService>,
		account: Arc<AccountService>,
		text_storage: Address,
	) -> Self {
		Self {
			builder,
			delivery,
			account,
			text_storage,
			gas: U256::from(1_000_000u64),
			remote_verify: false,
			signer_locks: Mutex::new(HashMap::new()),
		}
	}

	/// Gas limit used by [`store_text`](Self::store_text).
	pub fn with_gas(mut self, gas: U256) -> Self {
		self.gas = gas;
		self
	}

	/// Calls the forwarder's `verify` view before every `execute`.
	pub fn with_remote_verify(mut self, enabled: bool) -> Self {
		self.remote_verify = enabled;
		self
	}

	pub fn verifies_remotely(&self) -> bool {
		self.remote_verify
	}

	pub fn builder(&self) -> &MetaTransactionRequestBuilder {
		&self.builder
	}

	pub fn chain_id(&self) -> u64 {
		self.builder.domain().chain_id
	}

	pub fn forwarder(&self) -> Address {
		self.builder.domain().verifying_contract
	}

	pub fn text_storage(&self) -> Address {
		self.text_storage
	}

	/// Address of the wallet paying for gas.
	pub async fn relayer_address(&self) -> Result<Address, ForwarderError> {
		Ok(self.account.get_address().await?)
	}

	/// Reads the forwarder nonce for `from`.
	pub async fn fetch_nonce(&self, from: Address) -> Result<U256, ForwarderError> {
		Ok(self
			.delivery
			.get_forwarder_nonce(self.chain_id(), self.forwarder(), from)
			.await?)
	}

	/// Builds, digests, signs and (when enabled) self-verifies a request at
	/// the signer's current nonce.
	///
	/// Nothing is sent. Two prepared requests for the same signer carry the
	/// same nonce until one of them is executed.
	#[instrument(skip_all, fields(to = %to))]
	pub async fn prepare(
		&self,
		signer: &dyn AccountInterface,
		to: Address,
		value: U256,
		gas: U256,
		data: Bytes,
	) -> Result<(SignedRequest, RelayAttempt), ForwarderError> {
		let from = signer.address().await?;
		let nonce = self.fetch_nonce(from).await?;

		let request = self
			.builder
			.build_request(from, to, value, gas, data, nonce);
		let mut attempt = RelayAttempt::new(from, nonce);

		let digested = self.builder.digest(request);
		attempt.transition(RelayState::Digested)?;

		let signed = self.builder.sign_digested(digested, signer).await?;
		attempt.transition(RelayState::Signed)?;

		if self.builder.verifies_locally() {
			self.builder.self_verify(&signed)?;
			attempt.transition(RelayState::SelfVerified)?;
		}

		tracing::info!(
			from = %from,
			nonce = %nonce,
			digest = %truncate_hex(&signed.digest().to_string()),
			"Prepared forward request"
		);
		Ok((signed, attempt))
	}

	/// Sends `execute` and waits for the configured confirmations.
	///
	/// A refusal before inclusion surfaces as
	/// [`ForwarderError::RemoteRejection`] and is never retried. With remote
	/// verification enabled, a request the forwarder's `verify` refuses is
	/// rejected the same way without sending anything.
	#[instrument(skip_all, fields(from = %signed.request().from, nonce = %signed.request().nonce))]
	pub async fn submit(
		&self,
		signed: &SignedRequest,
		attempt: &mut RelayAttempt,
	) -> Result<RelayOutcome, ForwarderError> {
		if self.remote_verify {
			let accepted = self
				.delivery
				.verify_forward_request(
					self.chain_id(),
					self.forwarder(),
					signed.request(),
					&signed.signature_bytes(),
				)
				.await?;
			if !accepted {
				tracing::warn!("Forwarder verify refused request");
				return Err(ForwarderError::RemoteRejection {
					message: "forwarder verify returned false".to_string(),
					data: None,
				});
			}
		}

		let hash = self
			.delivery
			.execute(
				self.chain_id(),
				self.forwarder(),
				signed.request(),
				&signed.signature_bytes(),
			)
			.await
			.map_err(|e| {
				let err = ForwarderError::from(e);
				if let ForwarderError::RemoteRejection { message, .. } = &err {
					tracing::warn!(reason = %message, "Forwarder rejected request");
				}
				err
			})?;
		attempt.mark_submitted(hash)?;

		let receipt = self
			.delivery
			.confirm_with_default(self.chain_id(), &hash)
			.await?;

		if !receipt.success {
			attempt.transition(RelayState::Reverted)?;
			tracing::warn!(tx_hash = %hash, block = receipt.block_number, "Forwarded call reverted");
			return Ok(RelayOutcome::Reverted { receipt });
		}

		attempt.transition(RelayState::Confirmed)?;
		let events: Vec<TextStoredEvent> = receipt
			.logs
			.iter()
			.filter(|log| log.address == self.text_storage)
			.filter_map(decode_text_stored)
			.collect();

		for event in &events {
			tracing::info!(user = %event.user, text = %event.text, "TextStored");
		}
		tracing::info!(tx_hash = %hash, block = receipt.block_number, "Forwarded call confirmed");

		Ok(RelayOutcome::Confirmed { receipt, events })
	}

	/// Prepares and submits while holding the signer's lock.
	pub async fn relay(
		&self,
		signer: &dyn AccountInterface,
		to: Address,
		value: U256,
		gas: U256,
		data: Bytes,
	) -> Result<RelayReport, ForwarderError> {
		let from = signer.address().await?;
		let lock = self
			.signer_locks
			.lock()
			.await
			.entry(from)
			.or_default()
			.clone();

		let result = {
			let _guard = lock.lock().await;
			self.relay_locked(signer, to, value, gas, data).await
		};
		self.release_signer_lock(from, lock).await;
		result
	}

	async fn relay_locked(
		&self,
		signer: &dyn AccountInterface,
		to: Address,
		value: U256,
		gas: U256,
		data: Bytes,
	) -> Result<RelayReport, ForwarderError> {
		let (signed, mut attempt) = self.prepare(signer, to, value, gas, data).await?;
		let outcome = self.submit(&signed, &mut attempt).await?;

		Ok(RelayReport {
			signed,
			attempt,
			outcome,
		})
	}

	/// Drops the signer's entry when the map and `lock` are its only holders.
	///
	/// `lock` is released while the map is held so two finishing relays
	/// cannot both observe each other's handle.
	async fn release_signer_lock(&self, from: Address, lock: Arc<Mutex<()>>) {
		let mut locks = self.signer_locks.lock().await;
		let idle = locks
			.get(&from)
			.is_some_and(|entry| Arc::ptr_eq(entry, &lock) && Arc::strong_count(&lock) == 2);
		drop(lock);
		if idle {
			locks.remove(&from);
		}
	}

	/// Relays `storeText(text)` to the text storage contract.
	pub async fn store_text(
		&self,
		signer: &dyn AccountInterface,
		text: &str,
	) -> Result<RelayReport, ForwarderError> {
		self.relay(
			signer,
			self.text_storage,
			U256::ZERO,
			self.gas,
			encode_store_text(text),
		)
		.await
	}

	/// Sends `amount` wei from the relayer wallet to `to` and waits for it.
	#[instrument(skip(self))]
	pub async fn fund(
		&self,
		to: Address,
		amount: U256,
	) -> Result<TransactionReceipt, ForwarderError> {
		let hash = self.delivery.transfer(self.chain_id(), to, amount).await?;
		let receipt = self
			.delivery
			.confirm_with_default(self.chain_id(), &hash)
			.await?;

		if !receipt.success {
			return Err(ForwarderError::Delivery(format!(
				"Funding transaction {} reverted",
				hash
			)));
		}
		tracing::info!(tx_hash = %hash, "Funded wallet");
		Ok(receipt)
	}

	/// Native balance of `address`.
	pub async fn balance(&self, address: Address) -> Result<U256, ForwarderError> {
		Ok(self.delivery.get_balance(self.chain_id(), address).await?)
	}

	/// Reads `texts(owner, index)` from the text storage contract.
	pub async fn stored_text(&self, owner: Address, index: U256) -> Result<String, ForwarderError> {
		Ok(self
			.delivery
			.get_stored_text(self.chain_id(), self.text_storage, owner, index)
			.await?)
	}
}
