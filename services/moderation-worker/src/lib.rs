mod cli;
mod infra;
mod inspect;
mod routes;
mod server;
mod sweeper;

use listing_moderation::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
