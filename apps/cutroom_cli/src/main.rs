#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cutroom_cli::run().await
}
