//! A pool of fork processes addressed by integer slot id.

use crate::{
    config::StartOptions,
    node::{AnvilLauncher, Launch, Node, NodeError},
};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised by pool slot management.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The slot already holds a running fork.
    #[error("slot {0} already holds a running fork")]
    SlotTaken(usize),
    /// The slot holds nothing to act on.
    #[error("no fork in slot {0}")]
    VacantSlot(usize),
    /// The slot's node failed.
    #[error(transparent)]
    Node(#[from] NodeError),
}

/// Pool-wide settings.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Port assigned to slot 0 when a request carries no explicit port; slot
    /// `n` defaults to `base_port + n`.
    pub base_port: u16,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { base_port: 8545 }
    }
}

/// Manages concurrently running fork processes, addressed by slot id.
///
/// Slot ids are chosen by the caller; the session assigns them in request
/// enumeration order.
#[derive(Debug, Default)]
pub struct Pool<L: Launch = AnvilLauncher> {
    launcher: L,
    config: PoolConfig,
    slots: BTreeMap<usize, L::Node>,
}

impl Pool {
    /// Creates a pool launching real anvil processes with default settings.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<L: Launch> Pool<L> {
    /// Creates a pool with an explicit launcher and settings.
    pub fn with_launcher(launcher: L, config: PoolConfig) -> Self {
        Self { launcher, config, slots: BTreeMap::new() }
    }

    /// Launches a fork in `slot`.
    ///
    /// When the options carry no port, the slot's default
    /// (`base_port + slot`) is used.
    pub fn start(&mut self, slot: usize, mut options: StartOptions) -> Result<&L::Node, PoolError> {
        if self.slots.contains_key(&slot) {
            return Err(PoolError::SlotTaken(slot));
        }
        if options.port.is_none() {
            options.port = Some(self.config.base_port.saturating_add(slot as u16));
        }
        let node = self.launcher.launch(&options)?;
        debug!(target: "forkpool", slot, port = node.port(), "fork started");
        Ok(self.slots.entry(slot).or_insert(node))
    }

    /// Returns the fork in `slot`.
    pub fn get(&self, slot: usize) -> Option<&L::Node> {
        self.slots.get(&slot)
    }

    /// Returns the fork in `slot`, mutably.
    pub fn get_mut(&mut self, slot: usize) -> Option<&mut L::Node> {
        self.slots.get_mut(&slot)
    }

    /// Occupied slot count.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Stops the fork in `slot` and frees the slot.
    pub fn stop(&mut self, slot: usize) -> Result<(), PoolError> {
        let mut node = self.slots.remove(&slot).ok_or(PoolError::VacantSlot(slot))?;
        node.stop()?;
        debug!(target: "forkpool", slot, "fork stopped");
        Ok(())
    }

    /// Stops every fork and clears the pool.
    ///
    /// All slots are drained even when some stops fail; the first failure is
    /// reported after the drain completes.
    pub fn empty(&mut self) -> Result<(), PoolError> {
        let mut first_err = None;
        while let Some((slot, mut node)) = self.slots.pop_first() {
            if let Err(err) = node.stop() {
                warn!(target: "forkpool", slot, %err, "failed to stop fork");
                first_err.get_or_insert(PoolError::Node(err));
            }
        }
        match first_err {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}
