#[tokio::main]
async fn main() -> Result<(), kagami::provider::StartupError> {
    kagami::provider::main().await
}
