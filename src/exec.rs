use crate::{Error, Result};
use itertools::Itertools;
use std::{process::Command, sync::Arc};
use tracing::{debug, trace};

/// Runs an external program to completion and hands back its stdout.
///
/// A non-zero exit is an error; implementations never retry.
pub trait CommandExecutor {
    fn run(&self, program: &str, args: &[&str]) -> Result<String>;
}

impl<T: CommandExecutor + ?Sized> CommandExecutor for &T {
    fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        (**self).run(program, args)
    }
}

impl<T: CommandExecutor + ?Sized> CommandExecutor for Arc<T> {
    fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        (**self).run(program, args)
    }
}

pub fn command_line(program: &str, args: &[&str]) -> String {
    std::iter::once(program).chain(args.iter().copied()).join(" ")
}

/// Spawns real processes. Output is forced to the C locale so that labels
/// such as `Number` and `Free Space` are not translated.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl CommandExecutor for SystemExecutor {
    fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        let command = command_line(program, args);
        debug!(%command, "running");

        let output = Command::new(program)
            .args(args)
            .env("LC_ALL", "C")
            .output()
            .map_err(|source| Error::Launch {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(Error::Exit {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        trace!(%command, %stdout, "finished");
        Ok(stdout)
    }
}
