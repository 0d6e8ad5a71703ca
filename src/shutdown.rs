//! The privileged power-off call.
//!
//! The controller invokes the agent exactly once and never retries; a failure
//! is reported and the daemon still exits.

use std::io;
use std::process::{Command, ExitStatus};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ShutdownError {
    #[error("no power-off command configured")]
    NoCommand,

    #[error("could not run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Usually missing privileges (no NOPASSWD sudoers entry)
    #[error("{program} was rejected ({status})")]
    Rejected { program: String, status: ExitStatus },
}

pub trait ShutdownAgent {
    fn power_off(&mut self) -> Result<(), ShutdownError>;
}

/// Runs the configured command, e.g. `sudo /sbin/shutdown -h now`.
#[derive(Debug, Clone)]
pub struct CommandShutdown {
    argv: Vec<String>,
}

impl CommandShutdown {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

impl ShutdownAgent for CommandShutdown {
    fn power_off(&mut self) -> Result<(), ShutdownError> {
        let (program, args) = self.argv.split_first().ok_or(ShutdownError::NoCommand)?;
        info!(command = %self.argv.join(" "), "requesting power-off");

        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|source| ShutdownError::Spawn {
                program: program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            warn!(%status, "power-off command failed");
            Err(ShutdownError::Rejected {
                program: program.clone(),
                status,
            })
        }
    }
}

/// Development agent: logs instead of powering off.
#[derive(Debug, Default)]
pub struct DryRunShutdown;

impl ShutdownAgent for DryRunShutdown {
    fn power_off(&mut self) -> Result<(), ShutdownError> {
        info!("dry run: the board would power off now");
        Ok(())
    }
}
