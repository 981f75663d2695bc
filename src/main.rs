use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Copy)]
enum ResponseMode {
    Json,
    Raw,
}

mod commands;
mod output;
mod tty;

use commands::{deploy, inspect, render, teardown};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "dockhand")]
#[command(version = VERSION)]
#[command(about = "Provision a remote host and run a git-hosted app behind Nginx")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clone or update the app, start its containers and activate the proxy
    Deploy(deploy::DeployArgs),
    /// Stop containers and remove the app directory and proxy site
    Teardown(teardown::TeardownArgs),
    /// Print the rendered compose and Nginx descriptors without touching a host
    Render(render::RenderArgs),
    /// Report the repository and container state on the host
    Inspect(inspect::InspectArgs),
}

fn response_mode(command: &Commands) -> ResponseMode {
    match command {
        Commands::Render(args) if args.raw => ResponseMode::Raw,
        _ => ResponseMode::Json,
    }
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    if let ResponseMode::Raw = response_mode(&cli.command) {
        let raw_result = commands::run_raw(cli.command);

        return match raw_result {
            Ok((content, exit_code)) => {
                print!("{}", content);
                std::process::ExitCode::from(exit_code_to_u8(exit_code))
            }
            Err(err) => {
                let exit_code = output::exit_code_for_error(err.code);
                output::print_json_result(Err(err));
                std::process::ExitCode::from(exit_code_to_u8(exit_code))
            }
        };
    }

    let (json_result, exit_code) = commands::run_json(cli.command);
    output::print_json_result(json_result);

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
