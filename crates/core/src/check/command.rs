use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{ReachabilityCheck, split_command};
use crate::exec::CommandRunner;

/// Available when a local command exits with status 0.
#[derive(Debug)]
pub struct LocalCommand {
    command: Option<String>,
    runner: CommandRunner,
}

impl LocalCommand {
    pub fn new(command: Option<String>, timeout: Duration) -> Self {
        Self {
            command,
            runner: CommandRunner::new(timeout),
        }
    }
}

#[async_trait]
impl ReachabilityCheck for LocalCommand {
    async fn is_available(&self) -> bool {
        debug!(command = ?self.command, "Checking status");

        let Some(argv) = self.command.as_deref().and_then(split_command) else {
            return false;
        };
        self.runner.execute(&argv).await
    }
}
