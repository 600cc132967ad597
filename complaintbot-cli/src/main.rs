use clap::Parser;
use complaintbot_cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env must be loaded before parsing so COMPLAINTBOT_* defaults apply
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    complaintbot_telemetry::init_telemetry(&cli.global.telemetry_config())?;

    complaintbot_cli::run(cli).await
}
