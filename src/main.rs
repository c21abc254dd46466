#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    jurisdoc_server::run().await
}
