#[tokio::main]
async fn main() -> anyhow::Result<()> {
    variant_matrix::run_server().await
}
