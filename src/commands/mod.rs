use clap::Args;
use std::io::Read;
use std::path::Path;

use dockhand::defaults::{self, Defaults};
use dockhand::provision::Session;
use dockhand::run_log::{self, RunLog};
use dockhand::ssh::SshClient;
use dockhand::target::{DeploymentConfig, ProxyTopology, Runtime, TargetInput};

pub type CmdResult<T> = dockhand::Result<(T, i32)>;

/// Where to deploy and what. Every field can also come from `--json`; flags win.
#[derive(Args, Default, Debug)]
pub struct TargetArgs {
    /// JSON target spec (inline, @file, or - for stdin)
    #[arg(long, value_name = "JSON")]
    pub json: Option<String>,

    /// HTTPS clone URL of the application repository
    #[arg(long = "repo", value_name = "URL")]
    pub repo_url: Option<String>,

    /// Access token for private repositories
    #[arg(long, env = "DOCKHAND_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Branch to deploy (default: main)
    #[arg(long)]
    pub branch: Option<String>,

    /// SSH username on the host
    #[arg(long = "user")]
    pub ssh_user: Option<String>,

    /// Host name or IP address
    #[arg(long = "host")]
    pub server_address: Option<String>,

    /// Path to the SSH private key
    #[arg(long = "key", value_name = "PATH")]
    pub ssh_key_path: Option<String>,

    /// Port the application listens on
    #[arg(long = "port")]
    pub app_port: Option<u16>,

    /// Application directory on the host (default: /home/<user>/app)
    #[arg(long)]
    pub app_dir: Option<String>,

    #[arg(long)]
    pub container_name: Option<String>,

    /// Compose project name (default: the container name)
    #[arg(long)]
    pub project_name: Option<String>,

    /// Where Nginx runs: host or container
    #[arg(long)]
    pub proxy: Option<ProxyTopology>,

    /// How the app is started: compose or docker-run
    #[arg(long)]
    pub runtime: Option<Runtime>,

    #[arg(long)]
    pub compose_command: Option<String>,

    /// Omit the X-Forwarded-Proto header
    #[arg(long)]
    pub no_forward_proto: bool,

    /// Keep the application directory and pull instead of re-cloning
    #[arg(long)]
    pub keep_directory: bool,

    #[arg(long)]
    pub ssh_port: Option<u16>,

    /// Never prompt; missing required values are an error
    #[arg(long)]
    pub no_input: bool,
}

impl TargetArgs {
    fn to_input(&self) -> TargetInput {
        TargetInput {
            repo_url: self.repo_url.clone(),
            auth_token: self.token.clone(),
            branch: self.branch.clone(),
            ssh_user: self.ssh_user.clone(),
            server_address: self.server_address.clone(),
            ssh_key_path: self.ssh_key_path.clone(),
            app_port: self.app_port,
            app_dir: self.app_dir.clone(),
            container_name: self.container_name.clone(),
            project_name: self.project_name.clone(),
            proxy: self.proxy,
            runtime: self.runtime,
            compose_command: self.compose_command.clone(),
            forward_proto: self.no_forward_proto.then_some(false),
            reset_directory: self.keep_directory.then_some(false),
            ssh_port: self.ssh_port,
        }
    }
}

/// Arguments shared by commands that open a session on the host.
#[derive(Args, Default, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Directory for the per-run log file
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<String>,
}

// ============================================================================
// JSON Input Parsing (CLI layer)
// ============================================================================

/// Read JSON spec from string, file (@path), or stdin (-).
fn read_json_spec_to_string(spec: &str) -> dockhand::Result<String> {
    use std::io::IsTerminal;

    if spec.trim() == "-" {
        let mut buf = String::new();
        let mut stdin = std::io::stdin();
        if stdin.is_terminal() {
            return Err(dockhand::Error::validation_invalid_argument(
                "json",
                "Cannot read JSON from stdin when stdin is a TTY",
                None,
            ));
        }
        stdin.read_to_string(&mut buf).map_err(|e| {
            dockhand::Error::internal_io(e.to_string(), Some("read stdin".to_string()))
        })?;
        return Ok(buf);
    }

    if let Some(path) = spec.strip_prefix('@') {
        if path.trim().is_empty() {
            return Err(dockhand::Error::validation_invalid_argument(
                "json",
                "Invalid JSON spec '@' (missing file path)",
                None,
            ));
        }
        return std::fs::read_to_string(Path::new(path)).map_err(|e| {
            dockhand::Error::internal_io(e.to_string(), Some(format!("read {}", path)))
        });
    }

    Ok(spec.to_string())
}

/// Layer `--json` and flags into one input, flags last.
pub(crate) fn collect_input(args: &TargetArgs) -> dockhand::Result<TargetInput> {
    let mut input = TargetInput::default();
    if let Some(spec) = args.json.as_deref() {
        input = input.overlay(TargetInput::from_json(&read_json_spec_to_string(spec)?)?);
    }
    Ok(input.overlay(args.to_input()))
}

/// Ask the operator for whatever is still unset, when a terminal is attached.
fn prompt_missing(input: &mut TargetInput, args: &TargetArgs) -> dockhand::Result<()> {
    if args.no_input || !crate::tty::is_stdin_tty() {
        return Ok(());
    }

    fill_prompts(input, |label, hidden| {
        if hidden {
            crate::tty::prompt_secret(label)
        } else {
            crate::tty::prompt(label)
        }
    })
}

/// Fill pending prompts from `ask(label, hidden)`; secret prompts are asked hidden.
fn fill_prompts(
    input: &mut TargetInput,
    mut ask: impl FnMut(&str, bool) -> dockhand::Result<String>,
) -> dockhand::Result<()> {
    for prompt in input.pending_prompts() {
        let answer = ask(prompt.label, prompt.secret)?;
        if answer.is_empty() && !prompt.required {
            if prompt.secret {
                input.set(prompt.key, answer)?;
            }
            continue;
        }
        input.set(prompt.key, answer)?;
    }

    Ok(())
}

/// Full configuration for a command that talks to the host.
pub(crate) fn resolve_config(args: &TargetArgs) -> dockhand::Result<(DeploymentConfig, Defaults)> {
    let defaults = defaults::load_defaults()?;
    let mut input = collect_input(args)?;
    prompt_missing(&mut input, args)?;
    let config = input.resolve(&defaults)?;
    Ok((config, defaults))
}

/// Connect to the host and open the run log for `action`.
pub(crate) fn open_session(
    config: &DeploymentConfig,
    defaults: &Defaults,
    log_dir: Option<&str>,
    action: &str,
) -> dockhand::Result<Session<SshClient>> {
    let client = SshClient::from_config(config)?;
    let dir = run_log::resolve_dir(log_dir, defaults)?;
    let mut log = RunLog::create(&dir, action)?;
    log.redact(&config.target.auth_token);
    log.line(&format!(
        "{} {}@{}:{} ({})",
        action,
        config.target.ssh_user,
        config.target.server_address,
        config.settings.app_dir,
        config.target.branch
    ));

    Ok(Session::new(client, log))
}

pub mod deploy;
pub mod inspect;
pub mod render;
pub mod teardown;

macro_rules! dispatch {
    ($args:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
) -> (dockhand::Result<serde_json::Value>, i32) {
    match command {
        crate::Commands::Deploy(args) => dispatch!(args, deploy),
        crate::Commands::Teardown(args) => dispatch!(args, teardown),
        crate::Commands::Render(args) => dispatch!(args, render),
        crate::Commands::Inspect(args) => dispatch!(args, inspect),
    }
}

pub(crate) fn run_raw(command: crate::Commands) -> CmdResult<String> {
    match command {
        crate::Commands::Render(args) => render::run_raw(args),
        _ => Err(dockhand::Error::validation_invalid_argument(
            "output_mode",
            "Only render supports raw output",
            None,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_json_spec() {
        let args = TargetArgs {
            json: Some(r#"{"appPort": 3000, "branch": "develop", "sshUser": "deploy"}"#.to_string()),
            app_port: Some(8080),
            ..Default::default()
        };

        let input = collect_input(&args).unwrap();
        assert_eq!(input.app_port, Some(8080));
        assert_eq!(input.branch.as_deref(), Some("develop"));
        assert_eq!(input.ssh_user.as_deref(), Some("deploy"));
    }

    #[test]
    fn negative_flags_only_set_when_given() {
        let input = TargetArgs::default().to_input();
        assert_eq!(input.forward_proto, None);
        assert_eq!(input.reset_directory, None);

        let args = TargetArgs {
            no_forward_proto: true,
            keep_directory: true,
            ..Default::default()
        };
        let input = args.to_input();
        assert_eq!(input.forward_proto, Some(false));
        assert_eq!(input.reset_directory, Some(false));
    }

    #[test]
    fn json_spec_reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("target.json");
        std::fs::write(&path, r#"{"serverAddress": "203.0.113.10"}"#).unwrap();

        let args = TargetArgs {
            json: Some(format!("@{}", path.display())),
            ..Default::default()
        };
        let input = collect_input(&args).unwrap();
        assert_eq!(input.server_address.as_deref(), Some("203.0.113.10"));
    }

    #[test]
    fn token_is_asked_hidden_and_the_rest_visible() {
        let mut input = TargetInput::default();
        let mut asked = Vec::new();

        fill_prompts(&mut input, |label, hidden| {
            asked.push((label.to_string(), hidden));
            Ok(match label {
                l if l.starts_with("Access token") => "ghp_s3cret".to_string(),
                l if l.starts_with("Application port") => "8080".to_string(),
                l if l.starts_with("Branch") => String::new(),
                _ => "value".to_string(),
            })
        })
        .unwrap();

        let hidden: Vec<&str> = asked
            .iter()
            .filter(|(_, hidden)| *hidden)
            .map(|(label, _)| label.as_str())
            .collect();
        assert_eq!(hidden, vec!["Access token (empty for public repos)"]);
        assert_eq!(asked.len(), 7);
        assert_eq!(input.auth_token.as_deref(), Some("ghp_s3cret"));
        assert_eq!(input.app_port, Some(8080));
        assert_eq!(input.branch, None);
    }

    #[test]
    fn empty_file_reference_is_rejected() {
        let err = read_json_spec_to_string("@").unwrap_err();
        assert_eq!(err.code, dockhand::ErrorCode::ValidationInvalidArgument);
    }
}
