use eventqueue::app::startup::startup;

#[tokio::main]
async fn main() {
    let code = startup().await;
    std::process::exit(code);
}
