//! Locating and installing the anvil binary.

use std::{
    io,
    path::PathBuf,
    process::{Command, ExitStatus, Stdio},
};
use thiserror::Error;

/// Toolchain revision installed when the caller does not pin one.
pub const DEFAULT_COMMIT: &str = "200b3f48a1fccdd93d579233df740f8727da5bcd";

/// Errors raised while provisioning the anvil binary.
#[derive(Debug, Error)]
pub enum InstallError {
    /// The probe command could not be launched at all.
    #[error("could not probe for `{binary}`")]
    Probe {
        /// Binary the probe looked for.
        binary: String,
        /// Launch failure, typically "not found".
        #[source]
        source: io::Error,
    },
    /// The binary resolved but its version check failed.
    #[error("`{binary}` exited with {status} during the version probe")]
    ProbeStatus {
        /// Binary the probe ran.
        binary: String,
        /// Its exit status.
        status: ExitStatus,
    },
    /// The installer command could not be launched.
    #[error("could not launch `foundryup`")]
    Launch(#[source] io::Error),
    /// The installer ran but reported failure.
    #[error("`foundryup` exited with {status}")]
    Failed {
        /// The installer's exit status.
        status: ExitStatus,
    },
}

/// Provisions the external tool.
///
/// Injected into the session so tests can substitute a canned implementation;
/// [`Foundryup`] is the production one.
pub trait Installer {
    /// Checks whether a working binary resolves, returning its command path.
    fn probe(&self) -> Result<PathBuf, InstallError>;

    /// Installs the toolchain at `commit`.
    fn install(&self, commit: &str) -> Result<(), InstallError>;

    /// Probes for the binary, installing the toolchain on a miss and probing
    /// again.
    fn ensure_installed(&self, commit: Option<&str>) -> Result<PathBuf, InstallError> {
        match self.probe() {
            Ok(binary) => Ok(binary),
            Err(err) => {
                debug!(target: "forkpool", %err, "anvil probe failed, installing toolchain");
                self.install(commit.unwrap_or(DEFAULT_COMMIT))?;
                self.probe()
            }
        }
    }
}

/// Installs the foundry toolchain through the `foundryup` script on `$PATH`.
#[derive(Clone, Debug, Default)]
pub struct Foundryup {
    binary: Option<PathBuf>,
}

impl Foundryup {
    /// Creates an installer probing for `anvil` on `$PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Probes for `binary` instead of `anvil`.
    pub fn binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    fn binary_path(&self) -> PathBuf {
        self.binary.clone().unwrap_or_else(|| PathBuf::from("anvil"))
    }
}

impl Installer for Foundryup {
    fn probe(&self) -> Result<PathBuf, InstallError> {
        let binary = self.binary_path();
        let status = Command::new(&binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|source| InstallError::Probe {
                binary: binary.display().to_string(),
                source,
            })?;
        if status.success() {
            Ok(binary)
        } else {
            Err(InstallError::ProbeStatus { binary: binary.display().to_string(), status })
        }
    }

    fn install(&self, commit: &str) -> Result<(), InstallError> {
        info!(target: "forkpool", commit, "installing foundry toolchain");
        let status = Command::new("foundryup")
            .arg("--commit")
            .arg(commit)
            .status()
            .map_err(InstallError::Launch)?;
        if status.success() { Ok(()) } else { Err(InstallError::Failed { status }) }
    }
}
