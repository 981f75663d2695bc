use clap::Args;
use serde::Serialize;

use dockhand::provision::{self, DeploymentOutcome};

use super::teardown::{self, TeardownOutput};
use super::{CmdResult, RunArgs};

#[derive(Args)]
pub struct DeployArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Tear the deployment down instead of deploying
    #[arg(long)]
    pub teardown: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployResult {
    pub command: String,
    #[serde(flatten)]
    pub outcome: DeploymentOutcome,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum DeployOutput {
    Deployed(DeployResult),
    TornDown(TeardownOutput),
}

pub fn run(args: DeployArgs) -> CmdResult<DeployOutput> {
    if args.teardown {
        let (output, exit_code) = teardown::run(teardown::TeardownArgs { run: args.run })?;
        return Ok((DeployOutput::TornDown(output), exit_code));
    }

    let (config, defaults) = super::resolve_config(&args.run.target)?;
    let mut session = super::open_session(&config, &defaults, args.run.log_dir.as_deref(), "deploy")?;

    let outcome = provision::deploy(&config, &mut session)?;

    crate::tty::status(&format!(
        "Deployed {} ({}) to {}",
        config.target.repo_url, outcome.branch, outcome.host
    ));
    if let Some(path) = outcome.log_path.as_deref() {
        crate::tty::status(&format!("Run log: {}", path));
    }
    if !outcome.validation.responded() {
        crate::tty::status("Warning: the proxy did not answer the post-deploy probe");
    }

    Ok((
        DeployOutput::Deployed(DeployResult {
            command: "deploy.run".to_string(),
            outcome,
        }),
        0,
    ))
}
