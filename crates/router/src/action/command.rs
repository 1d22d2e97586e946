use std::io;
use std::process::{Output, Stdio};
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{ActionEnv, fields, timeout_from_secs};
use crate::context::Context;
use crate::error::{ActionError, ConfigError};

const fn default_timeout() -> f64 {
    5.0
}

#[derive(Deserialize)]
struct CommandFields {
    #[serde(default)]
    shell: bool,
    args: Value,
    stdin: Option<String>,
    #[serde(default = "default_timeout")]
    timeout: f64,
}

/// How a command is started.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Invocation {
    /// A script handed to the system shell.
    Shell(String),

    /// A program and its arguments, passed to the OS without any shell.
    Exec {
        /// Program to run.
        program: String,
        /// Arguments, each rendered on its own.
        args: Vec<String>,
    },
}

/// Runs a local process.
#[derive(Clone, Debug)]
pub struct CommandAction {
    invocation: Invocation,
    stdin: Option<String>,
    timeout: Duration,
}

impl CommandAction {
    pub(crate) fn from_config(config: Value) -> Result<Self, ConfigError> {
        let fields: CommandFields = fields("command", config)?;

        let invocation = match (fields.shell, fields.args) {
            (true, Value::String(script)) => Invocation::Shell(script),
            (true, _) => return Err(ConfigError::ShellArgsNotString),
            (false, Value::Array(items)) => {
                let mut args = items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(arg) => Ok(arg),
                        _ => Err(ConfigError::ExecArgsNotList),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if args.is_empty() {
                    return Err(ConfigError::EmptyArgs);
                }
                let program = args.remove(0);
                Invocation::Exec { program, args }
            }
            (false, _) => return Err(ConfigError::ExecArgsNotList),
        };

        Ok(Self {
            invocation,
            stdin: fields.stdin,
            timeout: timeout_from_secs(fields.timeout)?,
        })
    }

    /// How the process is started.
    #[must_use]
    pub const fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub(crate) async fn execute(&self, context: &Context, env: &ActionEnv) -> Result<(), ActionError> {
        let (program, output) = self.run(context, env).await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!(%program, stdout = %stdout.trim_end(), "command output");
        }

        if output.status.success() {
            debug!(%program, "command finished");
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                %program,
                status = %output.status,
                stderr = %stderr.trim_end(),
                "command exited unsuccessfully"
            );
        }
        Ok(())
    }

    /// Renders and runs the process, returning the program label and its
    /// collected output.
    async fn run(&self, context: &Context, env: &ActionEnv) -> Result<(String, Output), ActionError> {
        let (mut command, program) = self.command(context, env)?;
        let input = self
            .stdin
            .as_deref()
            .map(|stdin| env.render("stdin", stdin, context))
            .transpose()?;

        command
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(%program, "spawning command");
        let mut child = command.spawn().map_err(|source| ActionError::Spawn {
            program: program.clone(),
            source,
        })?;

        let pipe = child.stdin.take();
        let write = async move {
            let (Some(input), Some(mut pipe)) = (input, pipe) else {
                return Ok(());
            };
            match pipe.write_all(input.as_bytes()).await {
                // The process is free not to read its input.
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                Err(e) => Err(e),
                Ok(()) => pipe.shutdown().await,
            }
        };
        let completion = async {
            let (written, output) = tokio::join!(write, child.wait_with_output());
            written?;
            output
        };

        match tokio::time::timeout(self.timeout, completion).await {
            Ok(Ok(output)) => Ok((program, output)),
            Ok(Err(source)) => Err(ActionError::Io { program, source }),
            // Dropping the child on timeout kills it.
            Err(_) => Err(ActionError::Timeout {
                program,
                timeout: self.timeout,
            }),
        }
    }

    fn command(&self, context: &Context, env: &ActionEnv) -> Result<(Command, String), ActionError> {
        match &self.invocation {
            Invocation::Shell(script) => {
                let script = env.render("args", script, context)?;
                let mut command = shell();
                command.arg(&script);
                Ok((command, script))
            }
            Invocation::Exec { program, args } => {
                let program = env.render("args[0]", program, context)?;
                let mut command = Command::new(&program);
                for (index, arg) in args.iter().enumerate() {
                    command.arg(env.render(&format!("args[{}]", index + 1), arg, context)?);
                }
                Ok((command, program))
            }
        }
    }
}

#[cfg(not(windows))]
fn shell() -> Command {
    let mut command = Command::new("sh");
    command.arg("-c");
    command
}

#[cfg(windows)]
fn shell() -> Command {
    let mut command = Command::new("cmd");
    command.arg("/C");
    command
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    use std::sync::Arc;

    use mqtt_cmd_messaging::{Message, QoS};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tracing_test::traced_test;

    use crate::action::TemplateLibrary;
    use crate::render::Renderer;

    fn env() -> ActionEnv {
        ActionEnv::new(
            Renderer::new(),
            reqwest::Client::new(),
            Arc::new(TemplateLibrary::default()),
        )
    }

    fn context(topic: &str, payload: &str) -> Context {
        let message = Message::new(topic, payload.to_string(), QoS::AtMostOnce);
        Context::for_message(&message, "router", json!(payload))
    }

    fn stdout(output: &Output) -> String {
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    #[test]
    fn test_shell_args_pairing() {
        assert!(matches!(
            CommandAction::from_config(json!({"shell": true, "args": ["echo", "hi"]})),
            Err(ConfigError::ShellArgsNotString)
        ));
        assert!(matches!(
            CommandAction::from_config(json!({"args": "echo hi"})),
            Err(ConfigError::ExecArgsNotList)
        ));
        assert!(matches!(
            CommandAction::from_config(json!({"args": ["echo", 1]})),
            Err(ConfigError::ExecArgsNotList)
        ));
        assert!(matches!(
            CommandAction::from_config(json!({"args": []})),
            Err(ConfigError::EmptyArgs)
        ));
        assert!(matches!(
            CommandAction::from_config(json!({"shell": false})),
            Err(ConfigError::InvalidAction { kind: "command", .. })
        ));
    }

    #[test]
    fn test_exec_invocation() {
        let action = CommandAction::from_config(json!({"args": ["echo", "{{ topic }}"]})).unwrap();

        assert_eq!(
            action.invocation(),
            &Invocation::Exec {
                program: "echo".to_string(),
                args: vec!["{{ topic }}".to_string()],
            }
        );
        assert_eq!(action.timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_exec_args_are_not_shell_interpreted() {
        let action = CommandAction::from_config(json!({"args": ["echo", "{{ topic }}"]})).unwrap();
        let topic = "a/$(whoami);b|c";

        let (program, output) = action.run(&context(topic, "x"), &env()).await.unwrap();

        assert_eq!(program, "echo");
        assert_eq!(stdout(&output), format!("{topic}\n"));
    }

    #[tokio::test]
    async fn test_shell_script() {
        let action = CommandAction::from_config(json!({
            "shell": true,
            "args": "printf '%s-%s' {{ payload }} $((1 + 1))",
        }))
        .unwrap();

        let (_, output) = action.run(&context("a/b", "on"), &env()).await.unwrap();

        assert_eq!(stdout(&output), "on-2");
    }

    #[tokio::test]
    async fn test_stdin_is_rendered_and_closed() {
        let action = CommandAction::from_config(json!({
            "args": ["cat"],
            "stdin": "{{ topic }}={{ payload }}",
        }))
        .unwrap();

        let (_, output) = action.run(&context("a/b", "on"), &env()).await.unwrap();

        assert_eq!(stdout(&output), "a/b=on");
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let action = CommandAction::from_config(json!({"args": ["sleep", "5"], "timeout": 0.2})).unwrap();

        let started = std::time::Instant::now();
        let error = action.run(&context("a/b", "x"), &env()).await.unwrap_err();

        assert!(matches!(error, ActionError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let action = CommandAction::from_config(json!({"args": ["/nonexistent/mqtt-cmd-test"]})).unwrap();

        assert!(matches!(
            action.run(&context("a/b", "x"), &env()).await,
            Err(ActionError::Spawn { .. })
        ));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_non_zero_exit_is_logged_not_failed() {
        let action = CommandAction::from_config(json!({"shell": true, "args": "echo oops >&2; exit 3"})).unwrap();

        action.execute(&context("a/b", "x"), &env()).await.unwrap();

        assert!(logs_contain("command exited unsuccessfully"));
        assert!(logs_contain("oops"));
    }
}
