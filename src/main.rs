use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    catalog_sync_lib::run(catalog_sync_lib::Cli::parse()).await
}
