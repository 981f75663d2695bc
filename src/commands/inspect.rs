use clap::Args;
use serde::Serialize;

use dockhand::inspect::{self, InspectReport};

use super::{CmdResult, RunArgs};

#[derive(Args)]
pub struct InspectArgs {
    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectOutput {
    pub command: String,
    #[serde(flatten)]
    pub report: InspectReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<String>,
}

pub fn run(args: InspectArgs) -> CmdResult<InspectOutput> {
    let (config, defaults) = super::resolve_config(&args.run.target)?;
    let mut session =
        super::open_session(&config, &defaults, args.run.log_dir.as_deref(), "inspect")?;

    let report = inspect::inspect(&mut session, &config)?;

    Ok((
        InspectOutput {
            command: "inspect".to_string(),
            report,
            log_path: session.log_path(),
        },
        0,
    ))
}
