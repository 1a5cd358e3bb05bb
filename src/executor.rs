//! Running commands on the routers of a deployed lab.

use std::process::Command;
use std::time::Duration;

use log::{debug, warn};

use crate::convergence::Clock;
use crate::error::{Error, Result};

/// Placeholder of the router name in a command template.
pub const ROUTER_PLACEHOLDER: &str = "{router}";

/// Something that can run a command on a lab router and hand back its standard output.
pub trait RouterExecutor {
    fn execute(&mut self, router: &str, argv: &[&str]) -> Result<Vec<u8>>;
}

/// Runs commands through a local process, e.g. `docker exec {router} <argv>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandExecutor {
    template: Vec<String>,
}

impl CommandExecutor {
    pub fn new(template: Vec<String>) -> Result<Self> {
        if template.is_empty() {
            return Err(Error::InvalidConfig("executor command is empty".to_string()));
        }
        Ok(CommandExecutor { template })
    }

    /// Full argument vector for `argv` on `router`.
    pub fn command_line(&self, router: &str, argv: &[&str]) -> Vec<String> {
        self.template
            .iter()
            .map(|part| part.replace(ROUTER_PLACEHOLDER, router))
            .chain(argv.iter().map(|arg| arg.to_string()))
            .collect()
    }
}

impl RouterExecutor for CommandExecutor {
    fn execute(&mut self, router: &str, argv: &[&str]) -> Result<Vec<u8>> {
        let command_line = self.command_line(router, argv);
        debug!("{}: {:?}", router, command_line);
        let (program, args) = command_line
            .split_first()
            .ok_or_else(|| Error::InvalidConfig("executor command is empty".to_string()))?;

        let output = Command::new(program).args(args).output()?;
        if !output.status.success() {
            return Err(Error::RouterQuery {
                router: router.to_string(),
                reason: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(output.stdout)
    }
}

/// How often and how patiently a failed query is repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    /// Pause before the first retry, doubled for every further one.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, backoff: Duration) -> Self {
        RetryPolicy { retries, backoff }
    }

    pub fn none() -> Self {
        RetryPolicy::new(0, Duration::ZERO)
    }

    /// Run `argv` on `router`, retrying failures; the last error is returned.
    pub fn execute<E, C>(
        &self,
        executor: &mut E,
        clock: &mut C,
        router: &str,
        argv: &[&str],
    ) -> Result<Vec<u8>>
    where
        E: RouterExecutor + ?Sized,
        C: Clock + ?Sized,
    {
        let mut pause = self.backoff;
        let mut attempt = 0;
        loop {
            match executor.execute(router, argv) {
                Ok(output) => return Ok(output),
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    warn!(
                        "Query on {} failed ({}), retry {}/{}",
                        router, e, attempt, self.retries
                    );
                    clock.sleep(pause);
                    pause = pause.saturating_mul(2);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_substitutes_router() {
        let executor = CommandExecutor::new(vec![
            "docker".to_string(),
            "exec".to_string(),
            "lab_{router}".to_string(),
        ])
        .unwrap();
        assert_eq!(
            executor.command_line("router7", &["vtysh", "-c", "show ip bgp"]),
            vec!["docker", "exec", "lab_router7", "vtysh", "-c", "show ip bgp"]
        );
    }

    #[test]
    fn test_empty_template_rejected() {
        assert!(CommandExecutor::new(Vec::new()).is_err());
    }
}
