//! tether: forward every request to one upstream.

mod cli;
mod telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();
    cli::run().await
}
