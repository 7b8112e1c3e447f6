#[tokio::main]
async fn main() {
    if let Err(e) = contacts_import_lib::run().await {
        log::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
