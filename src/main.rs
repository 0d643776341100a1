#[tokio::main]
async fn main() {
    tavola::start_server().await;
}
