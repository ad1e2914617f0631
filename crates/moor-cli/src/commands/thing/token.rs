//! Access token command implementation.

use anyhow::Result;
use clap::Args;

use super::{authenticated_session, ConnectionArgs};

#[derive(Args, Debug)]
pub struct TokenArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Requested scope; repeat for multiple scopes
    #[arg(long = "scope")]
    pub scopes: Vec<String>,
}

pub async fn run(args: TokenArgs) -> Result<()> {
    let session = authenticated_session(&args.connection).await?;
    let token = session.access_token(&args.scopes).await?;
    println!("{}", serde_json::to_string_pretty(&token)?);
    Ok(())
}
