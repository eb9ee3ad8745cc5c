//! Direct process execution: one fresh process per request.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::execution::process::{EnvPolicy, ProcessHandle, ProcessTemplate};
use crate::execution::{run_to_exit, ExecError, ExecMode, Executer, ExecutionConfig, Platform};

/// Spawns the route's executable with its arguments taken verbatim.
#[derive(Debug, Clone, Default)]
pub struct DirectProcessExecuter {
    policy: EnvPolicy,
}

impl DirectProcessExecuter {
    pub fn new(policy: EnvPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Executer for DirectProcessExecuter {
    fn mode(&self) -> ExecMode {
        ExecMode::Proc
    }

    fn available_on(_platform: Platform) -> bool {
        true
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        config: ExecutionConfig,
    ) -> Result<(ProcessHandle, i32), ExecError> {
        if cancel.is_cancelled() {
            return Err(ExecError::Cancelled);
        }

        let template = ProcessTemplate {
            program: config.command.clone(),
            args: config.args,
            open_stdin: config.stdin.is_some(),
            policy: self.policy.clone(),
        };

        let mut handle =
            ProcessHandle::spawn(&template, &config.env).map_err(|source| ExecError::Spawn {
                command: config.command.clone(),
                source,
            })?;

        tracing::debug!(command = %config.command, pid = ?handle.id(), "Process started");

        let input: Vec<&[u8]> = config.stdin.as_deref().into_iter().collect();
        let code = run_to_exit(&mut handle, cancel, &input).await?;
        Ok((handle, code))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::params::EnvMap;
    use axum::body::Bytes;
    use std::time::{Duration, Instant};

    fn executer() -> DirectProcessExecuter {
        DirectProcessExecuter::new(EnvPolicy::new(false, vec!["PATH".to_string()]))
    }

    fn sh(script: &str) -> ExecutionConfig {
        ExecutionConfig {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_args_and_env_are_passed() {
        let mut config = sh("echo \"$0 $WC_NAME\"");
        config.args.push("first".to_string());
        config.env = EnvMap::from([("WC_NAME".to_string(), "webcmd".to_string())]);

        let (handle, code) = executer()
            .execute(&CancellationToken::new(), config)
            .await
            .unwrap();

        assert_eq!(code, 0);
        assert_eq!(handle.stdout(), "first webcmd\n");
    }

    #[tokio::test]
    async fn test_body_becomes_stdin() {
        let mut config = sh("tr a-z A-Z");
        config.stdin = Some(Bytes::from("shout"));

        let (handle, code) = executer()
            .execute(&CancellationToken::new(), config)
            .await
            .unwrap();

        assert_eq!(code, 0);
        assert_eq!(handle.stdout(), "SHOUT");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_returned() {
        let (handle, code) = executer()
            .execute(&CancellationToken::new(), sh("echo nope >&2; exit 3"))
            .await
            .unwrap();

        assert_eq!(code, 3);
        assert_eq!(handle.stderr(), "nope\n");
    }

    #[tokio::test]
    async fn test_spawn_failure_is_an_error() {
        let config = ExecutionConfig {
            command: "/no/such/executable".to_string(),
            ..Default::default()
        };
        let err = executer()
            .execute(&CancellationToken::new(), config)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_cancellation_kills_process() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        let err = executer().execute(&cancel, sh("sleep 10")).await.unwrap_err();

        assert!(matches!(err, ExecError::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
