use sitecraft::cli::SitecraftCLI;
use sitecraft::BoxError;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    SitecraftCLI::run().await
}
