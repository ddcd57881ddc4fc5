//! [`Chain`] implementation over a Starknet JSON-RPC endpoint.

use std::sync::Arc;

use starknet::{
    accounts::{Account, AccountError, ConnectedAccount, ExecutionEncoding, SingleOwnerAccount},
    contract::ContractFactory,
    core::{
        types::{
            BlockId, BlockTag, Call, ExecutionResult, Felt, StarknetError,
            contract::{CompiledClass, SierraClass},
        },
        utils::get_selector_from_name,
    },
    providers::{JsonRpcClient, Provider, ProviderError, jsonrpc::HttpTransport},
    signers::{LocalWallet, SigningKey},
};
use url::Url;

use crate::{
    artifacts::ContractArtifact,
    chain::{Chain, DeploySubmission, TxHandle, TxStatus},
    error::ChainError,
};

/// Public Sepolia endpoint used when nothing else is configured.
pub const DEFAULT_RPC_URL: &str = "https://api.cartridge.gg/x/starknet/sepolia";

pub type StarknetAccount = SingleOwnerAccount<JsonRpcClient<HttpTransport>, LocalWallet>;

/// Reads are made against the `latest` block: `pending` state lags behind
/// and is not a reliable source of nonces or declared classes.
const BLOCK: BlockId = BlockId::Tag(BlockTag::Latest);

pub struct StarknetChain {
    account: StarknetAccount,
}

impl StarknetChain {
    /// Connect to `rpc_url` and sign with `private_key` for account `address`.
    pub async fn connect(
        rpc_url: &str,
        address: Felt,
        private_key: Felt,
    ) -> Result<Self, ChainError> {
        let url = Url::parse(rpc_url)
            .map_err(|e| ChainError::Transport(format!("invalid RPC URL {rpc_url}: {e}")))?;
        let provider = JsonRpcClient::new(HttpTransport::new(url));

        let chain_id = provider.chain_id().await.map_err(ChainError::transport)?;

        let signer = LocalWallet::from(SigningKey::from_secret_scalar(private_key));
        let mut account =
            SingleOwnerAccount::new(provider, signer, address, chain_id, ExecutionEncoding::New);
        account.set_block_id(BLOCK);

        tracing::info!(
            rpc_url,
            account = %format!("{:#x}", address),
            chain_id = %format!("{:#x}", chain_id),
            "Account connected"
        );

        Ok(Self { account })
    }
}

impl Chain for StarknetChain {
    fn account_address(&self) -> Felt {
        self.account.address()
    }

    async fn class_exists(&self, class_hash: Felt) -> Result<bool, ChainError> {
        match self.account.provider().get_class(BLOCK, class_hash).await {
            Ok(_) => Ok(true),
            Err(ProviderError::StarknetError(StarknetError::ClassHashNotFound)) => Ok(false),
            Err(e) => Err(ChainError::transport(e)),
        }
    }

    async fn account_nonce(&self) -> Result<u64, ChainError> {
        let nonce = self
            .account
            .provider()
            .get_nonce(BLOCK, self.account.address())
            .await
            .map_err(ChainError::transport)?;

        nonce_from_felt(nonce)
    }

    async fn submit_declare(
        &self,
        artifact: &ContractArtifact,
        nonce: u64,
    ) -> Result<TxHandle, ChainError> {
        let invalid = |what: &str, e: &dyn std::fmt::Display| {
            ChainError::Rejected(format!("invalid {what} class of {}: {e}", artifact.contract))
        };

        let sierra: SierraClass = serde_json::from_value(artifact.sierra.clone())
            .map_err(|e| invalid("Sierra", &e))?;
        let flattened = sierra.flatten().map_err(|e| invalid("Sierra", &e))?;

        let casm: CompiledClass =
            serde_json::from_value(artifact.casm.clone()).map_err(|e| invalid("CASM", &e))?;
        let compiled_class_hash = casm.class_hash().map_err(|e| invalid("CASM", &e))?;

        let result = self
            .account
            .declare_v3(Arc::new(flattened), compiled_class_hash)
            .nonce(Felt::from(nonce))
            .send()
            .await
            .map_err(account_error)?;

        tracing::debug!(
            contract = %artifact.contract,
            class_hash = %format!("{:#x}", result.class_hash),
            "Declare transaction accepted"
        );

        Ok(TxHandle {
            tx_hash: result.transaction_hash,
        })
    }

    async fn submit_deploy(
        &self,
        class_hash: Felt,
        constructor_args: &[Felt],
        salt: Felt,
        nonce: u64,
    ) -> Result<DeploySubmission, ChainError> {
        let factory = ContractFactory::new(class_hash, &self.account);
        let deployment = factory
            .deploy_v3(constructor_args.to_vec(), salt, true)
            .nonce(Felt::from(nonce));
        let address = deployment.deployed_address();

        let result = deployment.send().await.map_err(account_error)?;

        Ok(DeploySubmission {
            tx: TxHandle {
                tx_hash: result.transaction_hash,
            },
            address,
        })
    }

    async fn submit_call(
        &self,
        target: Felt,
        entrypoint: &str,
        args: &[Felt],
        nonce: u64,
    ) -> Result<TxHandle, ChainError> {
        let selector = get_selector_from_name(entrypoint)
            .map_err(|e| ChainError::Rejected(format!("invalid entrypoint {entrypoint}: {e}")))?;
        let call = Call {
            to: target,
            selector,
            calldata: args.to_vec(),
        };

        let result = self
            .account
            .execute_v3(vec![call])
            .nonce(Felt::from(nonce))
            .send()
            .await
            .map_err(account_error)?;

        Ok(TxHandle {
            tx_hash: result.transaction_hash,
        })
    }

    async fn transaction_status(&self, tx: &TxHandle) -> Result<TxStatus, ChainError> {
        match self
            .account
            .provider()
            .get_transaction_receipt(tx.tx_hash)
            .await
        {
            Ok(receipt) => Ok(match receipt.receipt.execution_result() {
                ExecutionResult::Succeeded => TxStatus::Confirmed,
                ExecutionResult::Reverted { reason } => TxStatus::Rejected(reason.clone()),
            }),
            Err(ProviderError::StarknetError(StarknetError::TransactionHashNotFound)) => {
                Ok(TxStatus::Pending)
            }
            Err(e) => Err(ChainError::transport(e)),
        }
    }
}

/// Node-side refusals are rejections, the rest is transport.
fn account_error<S: std::error::Error>(err: AccountError<S>) -> ChainError {
    match err {
        AccountError::Provider(ProviderError::StarknetError(e)) => ChainError::Rejected(e.to_string()),
        AccountError::Provider(e) => ChainError::transport(e),
        other => ChainError::Rejected(other.to_string()),
    }
}

fn nonce_from_felt(nonce: Felt) -> Result<u64, ChainError> {
    u64::try_from(nonce)
        .map_err(|_| ChainError::Transport(format!("nonce {nonce:#x} does not fit in u64")))
}
