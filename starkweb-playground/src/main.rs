use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    starkweb_playground::run().await?;
    Ok(())
}
