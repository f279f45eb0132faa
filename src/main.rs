use clap::{Parser, Subcommand};

mod commands;
mod output;
mod tty;

use commands::{build, info, log, run, schedule, upload};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "flowctl")]
#[command(version = VERSION)]
#[command(about = "Client for remote workflow-execution servers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack a job directory into an uploadable archive
    Build(build::BuildArgs),
    /// Upload a project archive to the server
    Upload(upload::UploadArgs),
    /// Start a flow execution
    Run(run::RunArgs),
    /// Register a cron schedule for a flow
    Schedule(schedule::ScheduleArgs),
    /// Show flow jobs or execution status
    Info(info::InfoArgs),
    /// Stream execution logs to stdout
    Log(log::LogArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        // Raw line streaming; everything else prints the JSON envelope.
        Commands::Log(args) => match log::run(args) {
            Ok(code) => code,
            Err(err) => {
                output::print_result::<serde_json::Value>(Err(err));
                1
            }
        },
        command => {
            let (json_result, exit_code) = run_json(command);
            output::print_json_result(json_result);
            exit_code
        }
    };

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn run_json(command: Commands) -> (flowctl::Result<serde_json::Value>, i32) {
    match command {
        Commands::Build(args) => output::map_cmd_result_to_json(build::run(args)),
        Commands::Upload(args) => output::map_cmd_result_to_json(upload::run(args)),
        Commands::Run(args) => output::map_cmd_result_to_json(run::run(args)),
        Commands::Schedule(args) => output::map_cmd_result_to_json(schedule::run(args)),
        Commands::Info(args) => output::map_cmd_result_to_json(info::run(args)),
        Commands::Log(_) => unreachable!("log streams raw output"),
    }
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
