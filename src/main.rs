#[tokio::main]
async fn main() {
    if let Err(e) = sokrates::run().await {
        eprintln!("sokrates: {e}");
        std::process::exit(1);
    }
}
