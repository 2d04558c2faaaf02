use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    locator_cli::main_entry().await
}
