use clap::Parser;

use imbatch::Opts;
use imbatch::cli::SubCommandExtend;
use imbatch::config::SubCommand;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();
    match &opts.subcmd {
        SubCommand::Dispatch(config) => config.run(&opts).await,
        SubCommand::Sweep(config) => config.run(&opts).await,
        SubCommand::Vectorize(config) => config.run(&opts).await,
    }
}
