#[tokio::main]
async fn main() {
    crypto_analyst::cli::run().await;
}
