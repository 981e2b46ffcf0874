//! Launching and supervising a single fork process.

use crate::config::StartOptions;
use alloy_primitives::hex;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use std::{
    io::{self, BufRead, BufReader},
    net::SocketAddr,
    path::{Path, PathBuf},
    process::{Child, Command, Stdio},
    str::FromStr,
    time::{Duration, Instant},
};
use thiserror::Error;

/// How long to wait for a node to report readiness.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised while launching or stopping a node process.
#[derive(Debug, Error)]
pub enum NodeError {
    /// The process could not be spawned.
    #[error("could not spawn `{binary}`")]
    Spawn {
        /// Binary the launcher tried to run.
        binary: String,
        /// The underlying launch failure.
        #[source]
        source: io::Error,
    },
    /// The spawned process exposed no stdout handle.
    #[error("no stdout handle on the spawned node")]
    NoStdout,
    /// Reading the node's startup output failed.
    #[error("could not read node output")]
    ReadOutput(#[source] io::Error),
    /// The node exited before announcing its listen address.
    #[error("node exited before reporting readiness")]
    StartupExited,
    /// The node did not become ready in time.
    #[error("node did not report readiness within {STARTUP_TIMEOUT:?}")]
    Timeout,
    /// A stop was requested for a node that is not running.
    #[error("node is not running")]
    NotRunning,
    /// Killing the process failed.
    #[error("could not terminate the node process")]
    Kill(#[source] io::Error),
}

/// A fork process held by a pool slot.
pub trait Node: std::fmt::Debug {
    /// Host the RPC server listens on.
    fn host(&self) -> &str;

    /// Port the RPC server listens on.
    fn port(&self) -> u16;

    /// Dev-account signers the node announced at startup.
    fn signers(&self) -> &[PrivateKeySigner] {
        &[]
    }

    /// Whether the process is still alive.
    fn is_running(&mut self) -> bool;

    /// Terminates the process. Stopping a node that is not running is an
    /// error, not a silent success.
    fn stop(&mut self) -> Result<(), NodeError>;

    /// The node's HTTP endpoint.
    fn http_endpoint(&self) -> String {
        format!("http://{}:{}", self.host(), self.port())
    }

    /// The node's websocket endpoint.
    fn ws_endpoint(&self) -> String {
        format!("ws://{}:{}", self.host(), self.port())
    }
}

/// Launches node processes for pool slots.
///
/// Injected into the pool so tests can substitute a canned implementation;
/// [`AnvilLauncher`] is the production one.
pub trait Launch {
    /// The node type this launcher produces.
    type Node: Node;

    /// Launches a node with the given options and waits until it is ready.
    fn launch(&self, options: &StartOptions) -> Result<Self::Node, NodeError>;
}

/// Launches real `anvil` processes.
#[derive(Clone, Debug, Default)]
pub struct AnvilLauncher {
    /// Path to the binary; `anvil` from `$PATH` when unset.
    pub binary: Option<PathBuf>,
    /// Overrides the default readiness deadline.
    pub startup_timeout: Option<Duration>,
}

impl AnvilLauncher {
    fn binary_path(&self) -> PathBuf {
        self.binary.clone().unwrap_or_else(|| PathBuf::from("anvil"))
    }
}

impl Launch for AnvilLauncher {
    type Node = AnvilNode;

    fn launch(&self, options: &StartOptions) -> Result<AnvilNode, NodeError> {
        let binary = self.binary_path();
        let mut cmd = command(&binary, options);
        debug!(target: "forkpool", binary = %binary.display(), "launching anvil");

        let mut child = cmd.spawn().map_err(|source| NodeError::Spawn {
            binary: binary.display().to_string(),
            source,
        })?;
        let stdout = child.stdout.take().ok_or(NodeError::NoStdout)?;

        let deadline = Instant::now() + self.startup_timeout.unwrap_or(STARTUP_TIMEOUT);
        match wait_for_ready(BufReader::new(stdout), deadline) {
            Ok(startup) => {
                let Startup { host, port, chain_id, mut signers } = startup;
                for signer in &mut signers {
                    signer.set_chain_id(options.chain_id.or(chain_id));
                }
                Ok(AnvilNode {
                    child,
                    host,
                    port,
                    chain_id: options.chain_id.or(chain_id),
                    signers,
                    stopped: false,
                })
            }
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(err)
            }
        }
    }
}

/// Assembles the command line for one instance.
fn command(binary: &Path, options: &StartOptions) -> Command {
    let mut cmd = Command::new(binary);
    cmd.stdout(Stdio::piped()).stderr(Stdio::inherit());

    cmd.arg("--port").arg(options.port.unwrap_or(0).to_string());
    if let Some(url) = &options.fork_url {
        cmd.arg("--fork-url").arg(url);
    }
    if let Some(block) = options.fork_block_number {
        cmd.arg("--fork-block-number").arg(block.to_string());
    }
    if let Some(chain_id) = options.chain_id {
        cmd.arg("--chain-id").arg(chain_id.to_string());
    }
    if let Some(block_time) = options.block_time {
        cmd.arg("--block-time").arg(block_time.to_string());
    }
    cmd.args(&options.args);
    cmd
}

/// What the node printed before it became ready.
struct Startup {
    host: String,
    port: u16,
    chain_id: Option<u64>,
    signers: Vec<PrivateKeySigner>,
}

/// Consumes startup output until the node announces its listen address.
fn wait_for_ready(mut reader: impl BufRead, deadline: Instant) -> Result<Startup, NodeError> {
    let mut chain_id = None;
    let mut signers = Vec::new();
    let mut in_private_keys = false;

    loop {
        if Instant::now() > deadline {
            return Err(NodeError::Timeout);
        }

        let mut line = String::new();
        if reader.read_line(&mut line).map_err(NodeError::ReadOutput)? == 0 {
            return Err(NodeError::StartupExited);
        }
        trace!(target: "forkpool", line = line.trim_end());

        if let Some(addr) = parse_listen_addr(&line) {
            return Ok(Startup {
                host: addr.ip().to_string(),
                port: addr.port(),
                chain_id,
                signers,
            });
        }
        if line.starts_with("Private Keys") {
            in_private_keys = true;
            continue;
        }
        if in_private_keys && let Some(signer) = parse_private_key(&line) {
            signers.push(signer);
        }
        if let Some(id) = parse_chain_id(&line) {
            chain_id = Some(id);
        }
    }
}

/// Parses the `Listening on 127.0.0.1:8545` readiness line.
fn parse_listen_addr(line: &str) -> Option<SocketAddr> {
    let rest = line.strip_prefix("Listening on")?;
    SocketAddr::from_str(rest.trim()).ok()
}

/// Parses a `Chain ID: 31337` line.
fn parse_chain_id(line: &str) -> Option<u64> {
    let idx = line.find("Chain ID:")?;
    let rest = &line[idx + "Chain ID:".len()..];
    rest.split_whitespace().next()?.parse().ok()
}

/// Parses one `(0) 0xac09...` dev-account key line.
fn parse_private_key(line: &str) -> Option<PrivateKeySigner> {
    if !line.trim_start().starts_with('(') {
        return None;
    }
    let key = line.split("0x").next_back()?.trim();
    let bytes = hex::decode(key).ok()?;
    PrivateKeySigner::from_slice(&bytes).ok()
}

/// A running anvil process.
///
/// The process is killed on drop if it was never stopped explicitly.
#[derive(Debug)]
pub struct AnvilNode {
    child: Child,
    host: String,
    port: u16,
    chain_id: Option<u64>,
    signers: Vec<PrivateKeySigner>,
    stopped: bool,
}

impl AnvilNode {
    /// Chain id the node announced at startup, if any.
    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }
}

impl Node for AnvilNode {
    fn host(&self) -> &str {
        &self.host
    }

    fn port(&self) -> u16 {
        self.port
    }

    fn signers(&self) -> &[PrivateKeySigner] {
        &self.signers
    }

    fn is_running(&mut self) -> bool {
        !self.stopped && matches!(self.child.try_wait(), Ok(None))
    }

    fn stop(&mut self) -> Result<(), NodeError> {
        if !self.is_running() {
            return Err(NodeError::NotRunning);
        }
        self.child.kill().map_err(NodeError::Kill)?;
        let _ = self.child.wait();
        self.stopped = true;
        Ok(())
    }
}

impl Drop for AnvilNode {
    fn drop(&mut self) {
        if !self.stopped {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
