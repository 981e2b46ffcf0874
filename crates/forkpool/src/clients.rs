//! RPC client bundles bound to a fork endpoint.

use crate::chain::ChainDescriptor;
use alloy_network::EthereumWallet;
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_signer_local::PrivateKeySigner;
use thiserror::Error;
use url::Url;

/// Errors raised while building a client bundle.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The descriptor's endpoint is not a usable URL.
    #[error("invalid RPC endpoint `{url}`")]
    InvalidEndpoint {
        /// The offending endpoint.
        url: String,
        /// The parse failure.
        #[source]
        source: url::ParseError,
    },
}

/// Independent RPC handles bound to one fork.
///
/// The three handles share no mutable state. The test client targets the
/// fork's test-control surface (impersonation, mining, balance overrides) via
/// [`alloy_provider::ext::AnvilApi`]; the public client is for reads and the
/// wallet client for writes, pre-loaded with the instance's dev-account
/// signers when the node announced them.
#[derive(Clone, Debug)]
pub struct ClientBundle {
    /// Test-control handle.
    pub test: DynProvider,
    /// Read-only handle.
    pub public: DynProvider,
    /// Write handle.
    pub wallet: DynProvider,
}

/// Builds the three clients for `descriptor` over plain HTTP transport.
pub fn client_bundle(
    descriptor: &ChainDescriptor,
    signers: &[PrivateKeySigner],
) -> Result<ClientBundle, ClientError> {
    let url: Url = descriptor.http_url().parse().map_err(|source| ClientError::InvalidEndpoint {
        url: descriptor.http_url().to_string(),
        source,
    })?;

    let test = ProviderBuilder::new().on_http(url.clone()).erased();
    let public = ProviderBuilder::new().on_http(url.clone()).erased();
    let wallet = match signers.split_first() {
        Some((first, rest)) => {
            let mut wallet = EthereumWallet::new(first.clone());
            for signer in rest {
                wallet.register_signer(signer.clone());
            }
            ProviderBuilder::new().wallet(wallet).on_http(url).erased()
        }
        None => ProviderBuilder::new().on_http(url).erased(),
    };

    Ok(ClientBundle { test, public, wallet })
}
