//! Attributes command implementation.

use anyhow::Result;
use clap::Args;

use super::{authenticated_session, ConnectionArgs};

#[derive(Args, Debug)]
pub struct AttributesArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Attribute name filter; repeat for multiple names, omit for all
    #[arg(long = "name-filter")]
    pub names: Vec<String>,
}

pub async fn run(args: AttributesArgs) -> Result<()> {
    let session = authenticated_session(&args.connection).await?;
    let attrs = session.attributes(&args.names).await?;
    println!("{}", serde_json::to_string_pretty(&attrs)?);
    Ok(())
}
