#[tokio::main]
async fn main() -> anyhow::Result<()> {
    memento_server::start().await
}
