//! Subprocess invocation: setup commands, module commands and signal hooks.
//!
//! Every process gets `WIZSHELL_CALLBACK` pointing at the active callback
//! socket, so scripts do not have to repeat the path.

// Rust guideline compliant 2026-02

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as Process;
use tokio::sync::mpsc;

use crate::args::FieldSignal;
use crate::tree::{Command, Module};

/// Environment variable carrying the callback socket path.
pub const CALLBACK_ENV: &str = "WIZSHELL_CALLBACK";

/// Returns `true` if `path` is a regular file with an execute bit set.
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

fn describe(program: &Path, args: &[String]) -> String {
    if args.is_empty() {
        program.display().to_string()
    } else {
        format!("{} {}", program.display(), args.join(" "))
    }
}

/// Runs the module's setup command, if any.
///
/// Returns `Ok(false)` when there is nothing to run, including a setup
/// executable that is missing or not executable.
///
/// # Errors
///
/// Fails if the setup process cannot be spawned or exits unsuccessfully;
/// the error carries its combined output.
pub async fn run_setup(module: &Module, callback: &Path) -> Result<bool> {
    let Some(program) = module.setup_command() else {
        return Ok(false);
    };
    let program = PathBuf::from(program);
    if !is_executable(&program) {
        log::info!(
            "[Launcher] Skipping setup of \"{}\": {} is not executable",
            module.title(),
            program.display()
        );
        return Ok(false);
    }

    let cmdline = describe(&program, module.setup_args());
    log::info!("[Launcher] Setup: {cmdline}");
    let output = Process::new(&program)
        .args(module.setup_args())
        .current_dir(module.module_path())
        .env(CALLBACK_ENV, callback)
        .output()
        .await
        .with_context(|| format!("Failed to start setup command: {cmdline}"))?;

    if !output.status.success() {
        bail!(
            "Failure while loading form from setup command \"{cmdline}\" ({}):\n{}{}",
            output.status,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(true)
}

/// Runs a module command, feeding every stdout/stderr line to `on_line`.
///
/// # Errors
///
/// Fails if the process cannot be spawned or exits unsuccessfully.
pub async fn run_command<F>(
    command: &Command,
    args: &[String],
    callback: &Path,
    mut on_line: F,
) -> Result<ExitStatus>
where
    F: FnMut(&str),
{
    let program = command.path();
    let cmdline = describe(program, args);
    log::info!("[Launcher] Running: {cmdline}");

    let mut child = Process::new(program)
        .args(args)
        .current_dir(program.parent().unwrap_or_else(|| Path::new("/")))
        .env(CALLBACK_ENV, callback)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to start command: {cmdline}"))?;

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let mut pumps = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        pumps.push(tokio::spawn(pump_lines(BufReader::new(stdout), tx.clone())));
    }
    if let Some(stderr) = child.stderr.take() {
        pumps.push(tokio::spawn(pump_lines(BufReader::new(stderr), tx.clone())));
    }
    drop(tx);

    while let Some(line) = rx.recv().await {
        on_line(&line);
    }
    for pump in pumps {
        if let Err(e) = pump.await {
            log::debug!("[Launcher] Output pump failed: {e}");
        }
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("Failed to wait for command: {cmdline}"))?;
    if !status.success() {
        bail!("Error: command \"{cmdline}\" quit as {status}");
    }
    Ok(status)
}

async fn pump_lines<R>(reader: BufReader<R>, tx: mpsc::UnboundedSender<String>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tx.send(line).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                log::debug!("[Launcher] Output read error: {e}");
                break;
            }
        }
    }
}

/// Fires the hook attached to a toggled field. No-op actions do nothing.
///
/// The hook executable is resolved next to the command it belongs to.
///
/// # Errors
///
/// Fails if the hook cannot be spawned or exits unsuccessfully.
pub async fn fire_signal(command: &Command, signal: &FieldSignal, callback: &Path) -> Result<()> {
    if signal.action.is_noop() {
        return Ok(());
    }

    let dir = command.path().parent().unwrap_or_else(|| Path::new("/"));
    let program = dir.join(signal.action.name());
    let cmdline = describe(&program, signal.action.args());
    log::debug!(
        "[Launcher] Signal {} on {}: {cmdline}",
        signal.event,
        signal.argument
    );

    let status = Process::new(&program)
        .args(signal.action.args())
        .current_dir(dir)
        .env(CALLBACK_ENV, callback)
        .status()
        .await
        .with_context(|| format!("Failed to start signal hook: {cmdline}"))?;
    if !status.success() {
        bail!("Signal hook \"{cmdline}\" quit as {status}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_is_executable() {
        let tmp = tempfile::TempDir::new().unwrap();
        let exe = script(tmp.path(), "a.sh", "true");
        let plain = tmp.path().join("b.txt");
        std::fs::write(&plain, "x").unwrap();

        assert!(is_executable(&exe));
        assert!(!is_executable(&plain));
        assert!(!is_executable(tmp.path()));
        assert!(!is_executable(&tmp.path().join("missing")));
    }

    #[tokio::test]
    async fn test_fire_signal_runs_hook_next_to_command() {
        let tmp = tempfile::TempDir::new().unwrap();
        let marker = tmp.path().join("marker");
        script(tmp.path(), "hook.sh", "echo \"$1 $WIZSHELL_CALLBACK\" > \"$2\"");
        let command = Command::from_value(&serde_json::json!({
            "path": tmp.path().join("run.sh").to_string_lossy(),
            "title": "Run",
        }))
        .unwrap();
        let signal = FieldSignal {
            argument: "--force".into(),
            event: "selected",
            action: crate::tree::SignalAction::parse(&format!("hook.sh on {}", marker.display())).unwrap(),
        };

        fire_signal(&command, &signal, Path::new("/tmp/cb.sock")).await.unwrap();
        assert_eq!(std::fs::read_to_string(&marker).unwrap(), "on /tmp/cb.sock\n");

        let noop = FieldSignal {
            action: crate::tree::SignalAction::default(),
            ..signal
        };
        fire_signal(&command, &noop, Path::new("/tmp/cb.sock")).await.unwrap();
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(Path::new("/bin/x"), &[]), "/bin/x");
        assert_eq!(
            describe(Path::new("/bin/x"), &["-a".into(), "b=c".into()]),
            "/bin/x -a b=c"
        );
    }
}
