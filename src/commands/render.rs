use clap::Args;
use serde::Serialize;

use dockhand::defaults;
use dockhand::render::{self, RenderParams};
use dockhand::target::ProxyTopology;

use super::{CmdResult, TargetArgs};

#[derive(Args)]
pub struct RenderArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Print the descriptors as plain text instead of JSON
    #[arg(long)]
    pub raw: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOutput {
    pub command: String,
    pub app_port: u16,
    pub proxy: ProxyTopology,
    pub compose: String,
    pub nginx: String,
    pub digest: String,
}

fn params(args: &TargetArgs) -> dockhand::Result<RenderParams> {
    let defaults = defaults::load_defaults()?;
    super::collect_input(args)?.render_params(&defaults)
}

pub fn run(args: RenderArgs) -> CmdResult<RenderOutput> {
    let params = params(&args.target)?;
    let rendered = render::render(&params)?;
    let digest = rendered.digest();

    Ok((
        RenderOutput {
            command: "render".to_string(),
            app_port: params.app_port,
            proxy: params.proxy,
            compose: rendered.compose,
            nginx: rendered.proxy,
            digest,
        },
        0,
    ))
}

pub fn run_raw(args: RenderArgs) -> CmdResult<String> {
    let params = params(&args.target)?;
    let rendered = render::render(&params)?;

    let content = format!(
        "# docker-compose.yml\n{}\n# nginx.conf\n{}\n# sha256 {}\n",
        rendered.compose,
        rendered.proxy,
        rendered.digest()
    );
    Ok((content, 0))
}
