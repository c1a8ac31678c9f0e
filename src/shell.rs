//! The shell context: module tree, callback channel and session, created
//! once at startup and passed around explicitly.
//!
//! # Running a module
//!
//! ```text
//! conditions ─► start channel ─► setup command ─► user edits ─► module command
//!                  │  local handlers: loader, form, session      │
//!                  │                  + landing page ◄───────────┘
//!                  └─ stopped (local handlers dropped) on every exit path
//! ```

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;

use crate::args::{FieldSignal, FormState};
use crate::channel::{ActionRegistry, CallbackChannel};
use crate::config::AppConfig;
use crate::landing::{self, LoaderState};
use crate::launcher;
use crate::protocol::ApiCall;
use crate::session::RuntimeSession;
use crate::tree::{self, Command, ConfigTree, Module};

/// What to run and which edits to apply to its form first.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Module title.
    pub module: String,
    /// Command title; the module's first command when `None`.
    pub command: Option<String>,
    /// Argument edits as (name or label, value).
    pub set: Vec<(String, String)>,
    /// Extra flags.
    pub flags: Vec<String>,
}

/// Outcome of a module run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Argument vector the command received.
    pub argv: Vec<String>,
    /// Final landing page summary.
    pub landing: String,
}

/// Application context.
#[derive(Debug)]
pub struct Shell {
    config: AppConfig,
    tree: ConfigTree,
    registry: ActionRegistry,
    channel: CallbackChannel,
    session: RuntimeSession,
}

impl Shell {
    /// Discovers the module tree and prepares an idle callback channel.
    ///
    /// # Errors
    ///
    /// Fails if discovery fails; the shell never starts on a partial tree.
    pub fn new(config: AppConfig) -> Result<Self> {
        let tree = tree::discover(&config.content, &config.callback)
            .with_context(|| format!("Unable to load modules from {}", config.content.display()))?;

        let registry = ActionRegistry::new();
        registry.add_global(|call: &ApiCall| -> Option<String> {
            match call.route() {
                Some(route) => log::trace!("[Shell] {:?} call {}", route.scope(), call.class()),
                None => log::debug!("[Shell] Unknown call class \"{}\": {}", call.class(), call.raw()),
            }
            None
        });

        let channel = CallbackChannel::new(registry.clone()).with_read_timeout(config.read_timeout());

        Ok(Self {
            config,
            tree,
            registry,
            channel,
            session: RuntimeSession::new(),
        })
    }

    /// Discovered module tree.
    pub fn tree(&self) -> &ConfigTree {
        &self.tree
    }

    /// Active configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Session shared by all modules.
    pub fn session(&self) -> &RuntimeSession {
        &self.session
    }

    /// Returns `true` while a module activation holds the channel.
    pub fn is_listening(&self) -> bool {
        self.channel.is_running()
    }

    /// Runs a module end to end.
    ///
    /// `on_line` receives every output line of the module command.
    ///
    /// # Errors
    ///
    /// Fails if the module is unknown or unavailable, the channel cannot be
    /// started, the setup command fails, an edit addresses no argument, or
    /// the command fails.
    pub async fn run<F>(&mut self, request: &RunRequest, mut on_line: F) -> Result<RunReport>
    where
        F: FnMut(&str),
    {
        let module = self
            .tree
            .find_module(&request.module)
            .with_context(|| format!("No such module: {}", request.module))?;
        if !module.conditions().satisfied() {
            bail!(
                "Module \"{}\" is not available: {}",
                module.title(),
                module.conditions().message()
            );
        }
        let command = pick_command(module, request.command.as_deref())?.clone();
        let module_id = module.id();
        let callback = module.callback_path().to_path_buf();

        // Form, loader and session handlers are local to this activation.
        let form = Arc::new(Mutex::new(FormState::new(module_id.clone(), &command)));
        let loader = landing::shared(Box::new(LoaderState::new()));
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        self.registry.add_local(form_handler(&form, signal_tx));
        self.registry.add_local(landing::handler(&loader));
        self.registry.add_local(self.session.handler(&module_id));

        let mut channel = scopeguard::guard(&mut self.channel, |c| {
            if let Err(e) = c.stop() {
                log::warn!("[Shell] {e}");
            }
        });
        channel
            .start(&callback)
            .with_context(|| format!("Unable to start callback listener for \"{}\"", module.title()))?;

        let signals = tokio::spawn(fire_signals(command.clone(), callback.clone(), signal_rx));

        if launcher::run_setup(module, &callback).await? {
            let loader = loader.lock().unwrap_or_else(PoisonError::into_inner);
            log::info!("[Shell] Setup done: {}", loader.summary());
        }

        let argv = {
            let mut form = form.lock().unwrap_or_else(PoisonError::into_inner);
            apply_edits(&mut form, request)?;
            form.state().serialize()
        };

        let page = landing::shared(landing::for_page(module.landing()));
        self.registry.add_local(landing::handler(&page));

        let result = launcher::run_command(&command, &argv, &callback, |line| {
            page.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .observe_line(line);
            on_line(line);
        })
        .await;

        drop(channel);
        signals.abort();
        result?;

        let summary = page.lock().unwrap_or_else(PoisonError::into_inner).summary();
        Ok(RunReport {
            argv,
            landing: summary,
        })
    }
}

/// Picks a command by title, or the first one.
fn pick_command<'a>(module: &'a Module, title: Option<&str>) -> Result<&'a Command> {
    match title {
        Some(t) => module
            .command(t)
            .with_context(|| format!("Module \"{}\" has no command \"{t}\"", module.title())),
        None => module
            .commands()
            .first()
            .with_context(|| format!("Module \"{}\" declares no commands", module.title())),
    }
}

/// Applies user edits: `--set` by argument name or label, then extra flags.
fn apply_edits(form: &mut FormState, request: &RunRequest) -> Result<()> {
    for (key, value) in &request.set {
        let name = form
            .command()
            .argument_by_name(key)
            .or_else(|| form.command().argument_by_label(key))
            .map(|a| a.name().to_string())
            .with_context(|| format!("No argument named \"{key}\""))?;
        form.state_mut().add_argument(&name, value);
    }
    for flag in &request.flags {
        form.state_mut().add_flag(flag);
    }
    Ok(())
}

/// Applies `field.*` calls to the form and forwards resulting signals.
fn form_handler(
    form: &Arc<Mutex<FormState>>,
    signals: mpsc::UnboundedSender<FieldSignal>,
) -> impl Fn(&ApiCall) -> Option<String> + Send + Sync {
    let form = Arc::clone(form);
    move |call: &ApiCall| -> Option<String> {
        let signal = form
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(call);
        if let Some(signal) = signal {
            if let Err(e) = signals.send(signal) {
                log::debug!("[Shell] Signal for {} dropped: no hook runner", e.0.argument);
            }
        }
        None
    }
}

async fn fire_signals(
    command: Command,
    callback: PathBuf,
    mut rx: mpsc::UnboundedReceiver<FieldSignal>,
) {
    while let Some(signal) = rx.recv().await {
        if let Err(e) = launcher::fire_signal(&command, &signal, &callback).await {
            log::warn!("[Shell] {e:#}");
        }
    }
}

/// Availability line of a module for headless listings.
pub fn availability(module: &Module) -> String {
    if module.conditions().satisfied() {
        "available".to_string()
    } else {
        format!("unavailable: {}", module.conditions().message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn command() -> Command {
        Command::from_value(&json!({
            "path": "/opt/run.sh",
            "title": "Run",
            "args": [
                {"type": "text", "label": "Target dir", "name": "--target", "options": ["/mnt"]},
            ],
        }))
        .unwrap()
    }

    #[test]
    fn test_apply_edits_by_name_and_label() {
        let mut form = FormState::new("m", &command());
        let request = RunRequest {
            set: vec![("Target dir".into(), "/data".into())],
            flags: vec!["-v".into()],
            ..RunRequest::default()
        };
        apply_edits(&mut form, &request).unwrap();
        assert_eq!(form.state().serialize(), vec!["-v", "--target=/data"]);

        let bad = RunRequest {
            set: vec![("--nope".into(), "x".into())],
            ..RunRequest::default()
        };
        assert!(apply_edits(&mut form, &bad).is_err());
    }

    #[test]
    fn test_form_handler_survives_closed_signal_queue() {
        let toggle = Command::from_value(&json!({
            "path": "/opt/run.sh",
            "title": "Run",
            "args": [
                {"type": "toggle", "label": "Force", "name": "--force",
                 "options": [["", "bool", "false"]],
                 "signals": {"selected": "on.sh"}},
            ],
        }))
        .unwrap();
        let form = Arc::new(Mutex::new(FormState::new("m", &toggle)));
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let handler = form_handler(&form, tx);
        let reply = handler(&ApiCall::decode(b"field.set.by-label:bool:{Force}yes"));
        assert!(reply.is_none());
        assert!(form.lock().unwrap().state().serialize().contains(&"--force".to_string()));
    }

    #[tokio::test]
    async fn test_failed_start_leaves_no_local_handlers() {
        let tmp = tempfile::TempDir::new().unwrap();
        let content = tmp.path().join("content");
        let module = content.join("mod");
        std::fs::create_dir_all(&module).unwrap();
        std::fs::write(content.join("init.conf"), "title: T\n").unwrap();
        std::fs::write(
            module.join("init.conf"),
            "title: M\ncommands:\n  - path: /bin/true\n    title: Go\n",
        )
        .unwrap();

        let config = AppConfig {
            content,
            callback: PathBuf::from(format!("/tmp/{}.sock", "a".repeat(130))),
            read_timeout: 5,
        };
        let mut shell = Shell::new(config).unwrap();
        let request = RunRequest {
            module: "M".into(),
            ..RunRequest::default()
        };

        for _ in 0..2 {
            assert!(shell.run(&request, |_| {}).await.is_err());
            assert_eq!(shell.registry.counts(), (1, 0));
            assert!(!shell.is_listening());
        }
    }
}
