#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = quizzo_rust::run().await {
        eprintln!("quizzo fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
