use anyhow::Result;
use clap::Parser;
use subdao_installer::config::Network;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "subdao-installer")]
#[command(
    version,
    about = "Install the SubDAO plugin into a child DAO through a governance proposal"
)]
pub struct Cli {
    /// The child DAO address or ENS name
    #[arg(short = 'c', long)]
    pub child_dao_address: String,

    /// The parent DAO address or ENS name
    #[arg(short = 'p', long)]
    pub parent_dao_address: String,

    /// One of: mainnet, goerli, polygon, mumbai, base, baseGoerli, local
    #[arg(short = 'n', long)]
    pub network: Network,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    cmd::cmd_install(&cli).await
}
