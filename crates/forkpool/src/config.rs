//! Fork request configuration.

use crate::chain::NativeCurrency;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration for a single named fork.
///
/// Everything is optional; an empty request launches a fresh (non-forked)
/// instance with the tool's defaults. When `fork_url` is unset the session
/// resolves one from the network directory using the request's key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForkRequest {
    /// Upstream RPC endpoint to fork state from.
    pub fork_url: Option<String>,
    /// Pins the fork to this block number.
    pub fork_block_number: Option<u64>,
    /// Chain id the launched instance should report.
    pub chain_id: Option<u64>,
    /// Interval mining block time, in seconds.
    pub block_time: Option<f64>,
    /// Explicit port for the instance's RPC server. Assigned by the pool when
    /// unset.
    pub port: Option<u16>,
    /// Token metadata echoed into the synthesized descriptor. The tool itself
    /// does not understand this field and never sees it.
    pub native_currency: Option<NativeCurrency>,
    /// Additional command line arguments passed through verbatim.
    pub args: Vec<String>,
}

impl ForkRequest {
    /// Creates a request forking from `url`.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self { fork_url: Some(url.into()), ..Default::default() }
    }

    /// Builds the options forwarded to a pool slot, with the fork source URL
    /// already resolved.
    ///
    /// `native_currency` stays behind: it only feeds the descriptor.
    pub(crate) fn start_options(&self, fork_url: String) -> StartOptions {
        StartOptions {
            fork_url: Some(fork_url),
            fork_block_number: self.fork_block_number,
            chain_id: self.chain_id,
            block_time: self.block_time,
            port: self.port,
            args: self.args.clone(),
        }
    }
}

/// Options handed to a pool slot when launching an instance.
///
/// This is the exact option surface the external tool accepts;
/// descriptor-only request fields do not appear here.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StartOptions {
    /// Upstream RPC endpoint to fork state from.
    pub fork_url: Option<String>,
    /// Pins the fork to this block number.
    pub fork_block_number: Option<u64>,
    /// Chain id the instance should report.
    pub chain_id: Option<u64>,
    /// Interval mining block time, in seconds.
    pub block_time: Option<f64>,
    /// Port for the instance's RPC server.
    pub port: Option<u16>,
    /// Additional command line arguments.
    pub args: Vec<String>,
}

/// How a caller addresses the networks to fork.
///
/// Decided once at the session boundary; the session never re-inspects the
/// shape of its input after this.
#[derive(Clone, Debug, PartialEq)]
pub enum ForkSpec {
    /// Full per-name configuration.
    ByConfig(BTreeMap<String, ForkRequest>),
    /// Comma separated chain names and/or decimal chain ids, resolved through
    /// the network directory.
    ByIdentifier(String),
}

impl From<BTreeMap<String, ForkRequest>> for ForkSpec {
    fn from(requests: BTreeMap<String, ForkRequest>) -> Self {
        Self::ByConfig(requests)
    }
}

impl From<&str> for ForkSpec {
    fn from(identifier: &str) -> Self {
        Self::ByIdentifier(identifier.to_string())
    }
}
