use clap::Args;
use serde::Serialize;

use dockhand::provision::{self, TeardownOutcome};

use super::{CmdResult, RunArgs};

#[derive(Args)]
pub struct TeardownArgs {
    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeardownOutput {
    pub command: String,
    #[serde(flatten)]
    pub outcome: TeardownOutcome,
}

pub fn run(args: TeardownArgs) -> CmdResult<TeardownOutput> {
    let (config, defaults) = super::resolve_config(&args.run.target)?;
    let mut session =
        super::open_session(&config, &defaults, args.run.log_dir.as_deref(), "teardown")?;

    let outcome = provision::teardown(&config, &mut session)?;

    crate::tty::status(&format!("Tore down {} on {}", config.settings.app_dir, outcome.host));
    if let Some(path) = outcome.log_path.as_deref() {
        crate::tty::status(&format!("Run log: {}", path));
    }

    Ok((
        TeardownOutput {
            command: "teardown.run".to_string(),
            outcome,
        },
        0,
    ))
}
