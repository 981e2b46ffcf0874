//! Resolving chain names and ids to upstream RPC endpoints.

use alloy_chains::NamedChain;
use thiserror::Error;

/// Errors raised while resolving a network to a preset endpoint.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    /// The name does not match any chain in the registry.
    #[error("unknown network `{0}`")]
    UnknownNetwork(String),
    /// The id does not match any chain in the registry.
    #[error("no chain with id {0} in the registry")]
    UnknownId(u64),
    /// The chain is known but no public endpoint is on file for it.
    #[error("no public RPC preset for `{0}`")]
    NoPreset(NamedChain),
}

/// A resolved preset: the canonical chain plus a public HTTP endpoint for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Preset {
    /// Canonical chain the lookup resolved to.
    pub chain: NamedChain,
    /// Public HTTP endpoint to fork from.
    pub http: String,
}

/// Resolves chain names and ids to upstream RPC endpoints.
///
/// The production implementation is [`PublicPresets`]; tests substitute their
/// own.
pub trait NetworkDirectory {
    /// Resolves a chain name.
    fn by_name(&self, name: &str) -> Result<Preset, LookupError>;

    /// Resolves a chain id.
    fn by_id(&self, id: u64) -> Result<Preset, LookupError>;
}

/// Public endpoints for the networks commonly forked in tests.
const PRESETS: &[(NamedChain, &str)] = &[
    (NamedChain::Mainnet, "https://reth-ethereum.ithaca.xyz/rpc"),
    (NamedChain::Sepolia, "https://ethereum-sepolia-rpc.publicnode.com"),
    (NamedChain::Holesky, "https://ethereum-holesky-rpc.publicnode.com"),
    (NamedChain::Optimism, "https://mainnet.optimism.io"),
    (NamedChain::Arbitrum, "https://arb1.arbitrum.io/rpc"),
    (NamedChain::Base, "https://mainnet.base.org"),
    (NamedChain::Polygon, "https://polygon-rpc.com"),
    (NamedChain::BinanceSmartChain, "https://bsc-dataseed1.bnbchain.org"),
    (NamedChain::Gnosis, "https://rpc.gnosischain.com"),
];

/// Directory backed by the built-in table of well-known public endpoints.
#[derive(Clone, Copy, Debug, Default)]
pub struct PublicPresets;

impl PublicPresets {
    fn find(chain: NamedChain) -> Result<Preset, LookupError> {
        PRESETS
            .iter()
            .find(|(known, _)| *known == chain)
            .map(|(chain, http)| Preset { chain: *chain, http: (*http).to_string() })
            .ok_or(LookupError::NoPreset(chain))
    }
}

impl NetworkDirectory for PublicPresets {
    fn by_name(&self, name: &str) -> Result<Preset, LookupError> {
        let chain = name
            .parse::<NamedChain>()
            .map_err(|_| LookupError::UnknownNetwork(name.to_string()))?;
        Self::find(chain)
    }

    fn by_id(&self, id: u64) -> Result<Preset, LookupError> {
        let chain = NamedChain::try_from(id).map_err(|_| LookupError::UnknownId(id))?;
        Self::find(chain)
    }
}
