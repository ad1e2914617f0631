//! Authenticate command implementation.

use anyhow::Result;
use clap::Args;

use super::{authenticated_session, ConnectionArgs};

#[derive(Args, Debug)]
pub struct AuthenticateArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

pub async fn run(args: AuthenticateArgs) -> Result<()> {
    let session = authenticated_session(&args.connection).await?;
    println!(
        "authenticated {} against tree {}",
        session.identity().name(),
        args.connection.tree
    );
    Ok(())
}
