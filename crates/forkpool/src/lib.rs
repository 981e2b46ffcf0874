//! Pools of forked anvil networks with ready-made RPC clients.
//!
//! forkpool shells out to [anvil](https://github.com/foundry-rs/foundry) to
//! start one forked network per named configuration, waits for each instance
//! to become ready, synthesizes chain metadata from what the live fork
//! reports, and hands back a bundle of test/read/write RPC clients per
//! network. It is test infrastructure: the intended caller is an end-to-end
//! test suite that needs a handful of deterministic forks and a way to tear
//! them down again.
//!
//! # Examples
//!
//! ```no_run
//! use forkpool::{ForkRequest, ForkSession, ForkSpec};
//! use std::collections::BTreeMap;
//!
//! # async fn run() -> Result<(), forkpool::Error> {
//! let mut session = ForkSession::new();
//!
//! let mut requests = BTreeMap::new();
//! requests.insert("mainnet".to_string(), ForkRequest::from_url("http://localhost:9000"));
//! let networks = session.fork_chains(ForkSpec::ByConfig(requests)).await?;
//!
//! let fork = &networks.chains["mainnet"];
//! println!("chain {} listening on {}", fork.chain.id, fork.chain.rpc_urls.http);
//!
//! session.stop_all()?;
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate tracing;

pub mod chain;
pub mod clients;
pub mod config;
mod error;
pub mod install;
pub mod networks;
pub mod node;
pub mod pool;
pub mod session;

pub use chain::{ChainDescriptor, NativeCurrency, RpcUrls};
pub use clients::{ClientBundle, client_bundle};
pub use config::{ForkRequest, ForkSpec, StartOptions};
pub use error::{Error, ForkFailure, Result, StopTarget};
pub use pool::{Pool, PoolConfig};
pub use session::{ForkSession, ForkedChain, ForkedNetworks, stop_instance};
