//! Chain metadata synthesized for launched forks.

use serde::{Deserialize, Serialize};

/// Token metadata carried by a [`ChainDescriptor`].
///
/// Defaults to the placeholder token reported for forks whose request did not
/// configure one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    /// Number of decimals the token uses.
    pub decimals: u8,
    /// Human readable token name.
    pub name: String,
    /// Ticker symbol.
    pub symbol: String,
}

impl Default for NativeCurrency {
    fn default() -> Self {
        Self { decimals: 18, name: "Anvil".to_string(), symbol: "ANV".to_string() }
    }
}

/// The RPC endpoints of a launched fork.
///
/// Both are derived from the host and port the instance reported at startup
/// and serve as the fork's default and public endpoint set alike.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcUrls {
    /// `http://host:port`
    pub http: String,
    /// `ws://host:port`
    pub ws: String,
}

/// Synthesized metadata describing a fork's identity and connection endpoints.
///
/// Immutable after creation: the id is what the live fork reported over RPC,
/// the name is derived from the chain-id registry, and the endpoints point at
/// the local instance rather than the upstream network it was forked from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDescriptor {
    /// Chain id reported by the fork.
    pub id: u64,
    /// Registry name for [`Self::id`], or `"unknown"`.
    pub name: String,
    /// Token metadata, defaulted when the request did not supply any.
    pub native_currency: NativeCurrency,
    /// Endpoints of the local instance.
    pub rpc_urls: RpcUrls,
}

impl ChainDescriptor {
    /// The HTTP endpoint clients should connect to.
    pub fn http_url(&self) -> &str {
        &self.rpc_urls.http
    }

    /// The websocket endpoint of the fork.
    pub fn ws_url(&self) -> &str {
        &self.rpc_urls.ws
    }
}
