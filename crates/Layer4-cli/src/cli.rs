//! Command handlers

use crate::style;
use anyhow::Context;
use boxctl_exec::{
    exec_cancellable, CancellationToken, DockerBackend, ExecBackend, LocalBackend, MachineStatus,
    MachineTarget, Payload, ProcessRunner, StatusProber, VagrantRunner,
};
use boxctl_foundation::BoxConfig;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Print the VM state of the current app
pub async fn status(config: &BoxConfig) -> anyhow::Result<()> {
    let target = MachineTarget::from_config(config)?;
    let prober = StatusProber::from_config(config);

    let status = prober
        .probe(&target)
        .await
        .with_context(|| format!("failed to probe status of {}", target.app_name))?;

    match status {
        MachineStatus::Unknown => print!(
            "{}",
            style::bullet(&format!("no vm found for '{}'", target.app_name))
        ),
        known => print!(
            "{}",
            style::bullet(&format!("'{}' is {}", target.app_name, known))
        ),
    }
    Ok(())
}

/// Run a vagrant command from the app directory with live, indented output
pub async fn vagrant(config: &BoxConfig, args: &[String]) -> anyhow::Result<()> {
    let runner = VagrantRunner::from_config(config)?;
    let mut stdout = tokio::io::stdout();

    let banner = style::bullet(&format!("running '{}'", runner.command_line(args)));
    stdout.write_all(banner.as_bytes()).await?;

    match runner.run(args, &mut stdout).await {
        Ok(()) => {
            stdout.write_all(style::process_end().as_bytes()).await?;
            stdout.flush().await?;
            Ok(())
        }
        Err(e) => {
            stdout.flush().await?;
            Err(e.into())
        }
    }
}

/// Run a hook inside a container and print its output
pub async fn exec_hook(
    config: &BoxConfig,
    container: &str,
    hook: &str,
    payload: Option<String>,
) -> anyhow::Result<()> {
    let docker = DockerBackend::connect(&config.docker)
        .await
        .context("failed to connect to docker")?;
    if !docker.is_available() {
        warn!("Docker daemon is not answering; the exec will likely fail");
    }

    let runner = ProcessRunner::from_config(config, Arc::new(LocalBackend::new()))
        .with_remote(Arc::new(docker));
    let payload = hook_payload(payload);
    debug!("exec {} in {} with {}", hook, container, payload);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    eprint!("{}", style::process_start(&format!("running hook '{}'", hook)));
    let output = exec_cancellable(
        &runner,
        container,
        hook,
        payload,
        tokio::io::stderr(),
        cancel,
    )
    .await?;
    eprint!("{}", style::process_end());

    print!("{}", output);
    Ok(())
}

/// Hooks always receive exactly one argument, empty when none was given
fn hook_payload(payload: Option<String>) -> Payload {
    Payload::Single(payload.unwrap_or_default())
}

/// Where `boxctl config --save` writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTarget {
    Project,
    Global,
}

/// Print the merged configuration, optionally persisting it
pub fn show_config(config: &BoxConfig, save: Option<SaveTarget>) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);

    let path = match save {
        None => return Ok(()),
        Some(SaveTarget::Project) => config.save_project(),
        Some(SaveTarget::Global) => config.save_global(),
    }
    .context("failed to save config")?;
    print!("{}", style::bullet(&format!("saved to {}", path.display())));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxctl_exec::CommandSpec;
    use boxctl_foundation::DEFAULT_HOOK_ROOT;

    #[test]
    fn test_missing_payload_is_one_empty_argument() {
        let request = CommandSpec::remote("c0ffee", "configure", hook_payload(None))
            .invocation(DEFAULT_HOOK_ROOT);
        assert_eq!(request.argv, vec!["/opt/nanobox/hooks/configure", ""]);
    }

    #[test]
    fn test_payload_passed_verbatim() {
        let payload = hook_payload(Some("{\"a\":1}".to_string()));
        let request =
            CommandSpec::remote("c0ffee", "configure", payload).invocation(DEFAULT_HOOK_ROOT);
        assert_eq!(request.argv, vec!["/opt/nanobox/hooks/configure", "{\"a\":1}"]);
    }
}
