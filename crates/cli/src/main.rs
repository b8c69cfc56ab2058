mod cmd;
mod outputs;
mod util;

use argp::FromArgs;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

#[derive(FromArgs, PartialEq, Debug)]
/// Summarize failed tasks from a moon run report and publish them to the
/// pull request.
struct TopLevel {
    #[argp(subcommand)]
    command: SubCommand,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argp(subcommand)]
enum SubCommand {
    Publish(cmd::publish::Args),
    Render(cmd::render::Args),
}

#[tokio::main]
async fn main() {
    let env_filter = EnvFilter::builder()
        // Default to info level
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    // stdout carries the log groups and report
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(|| util::CountingStderr)
        .init();

    let args: TopLevel = argp::parse_args_or_exit(argp::DEFAULT);
    let result = match args.command {
        SubCommand::Publish(args) => cmd::publish::run(args).await,
        SubCommand::Render(args) => cmd::render::run(args).await,
    };
    if let Err(e) = result {
        tracing::error!("{:?}", e);
        std::process::exit(1);
    }
}
