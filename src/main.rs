use anyhow::Result;

mod cli;
mod config;
mod parser;
mod password;
mod query_builder;
mod request_builder;
mod url_builder;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run(std::env::args()).await
}
