//! The fork session: provision the tool, start forks, wire clients, stop.

use crate::{
    chain::{ChainDescriptor, RpcUrls},
    clients::{self, ClientBundle},
    config::{ForkRequest, ForkSpec},
    error::{Error, ForkFailure, Result, StopTarget},
    install::{Foundryup, Installer},
    networks::{NetworkDirectory, PublicPresets},
    node::{AnvilLauncher, Launch, Node},
    pool::{Pool, PoolError},
};
use alloy_chains::NamedChain;
use alloy_provider::{Provider, ProviderBuilder};
use alloy_signer_local::PrivateKeySigner;
use std::collections::BTreeMap;
use url::Url;

/// A launched fork: pool handle plus synthesized chain metadata.
#[derive(Clone, Debug)]
pub struct ForkedChain {
    /// Slot the fork runs in; assigned in request enumeration order.
    pub pool_id: usize,
    /// The synthesized descriptor.
    pub chain: ChainDescriptor,
    /// Dev-account signers the instance announced at startup.
    pub signers: Vec<PrivateKeySigner>,
}

/// Everything a successful session start produced.
#[derive(Clone, Debug)]
pub struct ForkedNetworks {
    /// Fork handle and descriptor per request key.
    pub chains: BTreeMap<String, ForkedChain>,
    /// RPC client bundle per request key.
    pub clients: BTreeMap<String, ClientBundle>,
}

/// Orchestrates a pool of forks and the clients bound to them.
///
/// The launcher, network directory and installer are injected collaborators;
/// the defaults target real anvil processes, the built-in public endpoint
/// presets and a `foundryup` install. Requests are processed strictly one at
/// a time, in the request map's iteration order (sorted by key).
#[derive(Debug, Default)]
pub struct ForkSession<L: Launch = AnvilLauncher, D = PublicPresets, I = Foundryup> {
    pool: Pool<L>,
    directory: D,
    installer: I,
    install_commit: Option<String>,
}

impl ForkSession {
    /// Creates a session with the production collaborators.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<L, D, I> ForkSession<L, D, I>
where
    L: Launch,
    D: NetworkDirectory,
    I: Installer,
{
    /// Creates a session from explicit collaborators.
    pub fn with_parts(pool: Pool<L>, directory: D, installer: I) -> Self {
        Self { pool, directory, installer, install_commit: None }
    }

    /// Pins the toolchain revision installed when the binary is missing.
    pub fn install_commit(mut self, commit: impl Into<String>) -> Self {
        self.install_commit = Some(commit.into());
        self
    }

    /// The underlying pool.
    pub fn pool(&self) -> &Pool<L> {
        &self.pool
    }

    /// The underlying pool, mutably.
    pub fn pool_mut(&mut self) -> &mut Pool<L> {
        &mut self.pool
    }

    /// Provisions the tool, starts every requested fork and builds the
    /// client bundles.
    pub async fn fork_chains(&mut self, spec: ForkSpec) -> Result<ForkedNetworks> {
        self.ensure_tool_installed()?;

        let requests = match spec {
            ForkSpec::ByConfig(requests) => requests,
            ForkSpec::ByIdentifier(identifiers) => self.resolve_identifiers(&identifiers)?,
        };

        let chains = self.start_forks(requests).await?;

        let mut bundles = BTreeMap::new();
        for (name, forked) in &chains {
            debug!(target: "forkpool", chain = name.as_str(), "building clients");
            let bundle = clients::client_bundle(&forked.chain, &forked.signers)
                .map_err(|source| Error::ClientConstruction { chain: name.clone(), source })?;
            bundles.insert(name.clone(), bundle);
        }

        Ok(ForkedNetworks { chains, clients: bundles })
    }

    /// Probes for the anvil binary, installing the pinned toolchain revision
    /// on a miss.
    pub fn ensure_tool_installed(&self) -> Result<()> {
        self.installer
            .ensure_installed(self.install_commit.as_deref())
            .map(drop)
            .map_err(Error::Setup)
    }

    /// Starts one fork per request, in the map's iteration order.
    ///
    /// All-or-nothing: when any request fails, the slots already started for
    /// this batch are stopped (best-effort) before the error surfaces.
    pub async fn start_forks(
        &mut self,
        requests: BTreeMap<String, ForkRequest>,
    ) -> Result<BTreeMap<String, ForkedChain>> {
        let mut chains = BTreeMap::new();

        for (pool_id, (name, request)) in requests.into_iter().enumerate() {
            match self.start_one(pool_id, &name, &request).await {
                Ok(forked) => {
                    chains.insert(name, forked);
                }
                Err(err) => {
                    let mut slots: Vec<usize> =
                        chains.values().map(|chain| chain.pool_id).collect();
                    // a failure after the start call leaves the entry's own slot running
                    if matches!(
                        &err,
                        Error::PoolStart {
                            source: ForkFailure::Endpoint { .. } | ForkFailure::ChainId(_),
                            ..
                        }
                    ) {
                        slots.push(pool_id);
                    }
                    self.roll_back(slots);
                    return Err(err);
                }
            }
        }

        Ok(chains)
    }

    /// Stops the fork in `slot`, freeing it for reuse.
    pub fn stop_slot(&mut self, slot: usize) -> Result<()> {
        self.pool
            .stop(slot)
            .map_err(|source| Error::Stop { target: StopTarget::Slot(slot), source })
    }

    /// Stops every fork in the pool.
    pub fn stop_all(&mut self) -> Result<()> {
        self.pool
            .empty()
            .map_err(|source| Error::Stop { target: StopTarget::Pool, source })
    }

    async fn start_one(
        &mut self,
        pool_id: usize,
        name: &str,
        request: &ForkRequest,
    ) -> Result<ForkedChain> {
        debug!(target: "forkpool", chain = name, pool_id, "setting up fork");
        let fork_err =
            |source: ForkFailure| Error::PoolStart { chain: name.to_string(), source };

        // an explicit URL wins; otherwise the directory decides
        let fork_url = match &request.fork_url {
            Some(url) => url.clone(),
            None => self.directory.by_name(name).map_err(|err| fork_err(err.into()))?.http,
        };

        let options = request.start_options(fork_url);
        let node = self.pool.start(pool_id, options).map_err(|err| fork_err(err.into()))?;
        let endpoint = node.http_endpoint();
        let ws = node.ws_endpoint();
        let signers = node.signers().to_vec();

        // ask the live fork who it claims to be
        let url: Url = endpoint.parse().map_err(|source| {
            fork_err(ForkFailure::Endpoint { url: endpoint.clone(), source })
        })?;
        let provider = ProviderBuilder::new().on_http(url);
        let chain_id = provider
            .get_chain_id()
            .await
            .map_err(|err| fork_err(ForkFailure::ChainId(err)))?;
        let chain_name = NamedChain::try_from(chain_id)
            .map(|chain| chain.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        Ok(ForkedChain {
            pool_id,
            signers,
            chain: ChainDescriptor {
                id: chain_id,
                name: chain_name,
                native_currency: request.native_currency.clone().unwrap_or_default(),
                rpc_urls: RpcUrls { http: endpoint, ws },
            },
        })
    }

    /// Resolves identifier shorthand into requests keyed by canonical chain
    /// name. Any unknown item fails the whole call.
    fn resolve_identifiers(&self, identifiers: &str) -> Result<BTreeMap<String, ForkRequest>> {
        let mut requests = BTreeMap::new();
        for item in identifiers.split(',').map(str::trim).filter(|item| !item.is_empty()) {
            let preset = match item.parse::<u64>() {
                Ok(id) => self.directory.by_id(id),
                Err(_) => self.directory.by_name(item),
            }
            .map_err(|source| Error::PoolStart {
                chain: item.to_string(),
                source: ForkFailure::Lookup(source),
            })?;
            requests.insert(preset.chain.to_string(), ForkRequest::from_url(preset.http));
        }
        Ok(requests)
    }

    /// Best-effort stop of the given slots; failures are logged, not
    /// surfaced.
    fn roll_back(&mut self, slots: impl IntoIterator<Item = usize>) {
        for slot in slots {
            match self.pool.stop(slot) {
                Ok(()) => debug!(target: "forkpool", slot, "rolled back fork"),
                Err(PoolError::VacantSlot(_)) => {}
                Err(err) => {
                    warn!(target: "forkpool", slot, %err, "failed to roll back fork");
                }
            }
        }
    }
}

/// Stops a single instance directly.
///
/// Stopping an instance that is not running is an error, not a silent
/// success.
pub fn stop_instance<N: Node>(node: &mut N) -> Result<()> {
    node.stop()
        .map_err(|source| Error::Stop { target: StopTarget::Instance, source: source.into() })
}
