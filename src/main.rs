use clap::Parser;
use gravokit::cli::{self, Cli};
use gravokit::init_logging_with;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging_with(cli.log_level())?;
    tracing::debug!(version = gravokit::VERSION, built = gravokit::BUILD_DATE, "gravokit starting");

    let reply = cli::run(&cli).await?;
    println!("{}", reply);
    Ok(())
}
