//! Thing subcommand implementations.

mod attributes;
mod authenticate;
mod token;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use moor::{AmClient, AmUrl, Realm, SigningAlg, SigningKey, ThingIdentity, ThingSession};

#[derive(Args, Debug)]
pub struct ThingCommand {
    #[command(subcommand)]
    pub command: ThingSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum ThingSubcommand {
    /// Authenticate a thing against AM
    Authenticate(authenticate::AuthenticateArgs),

    /// Authenticate and request an access token
    Token(token::TokenArgs),

    /// Authenticate and fetch identity attributes
    Attributes(attributes::AttributesArgs),
}

pub async fn handle(cmd: ThingCommand) -> Result<()> {
    match cmd.command {
        ThingSubcommand::Authenticate(args) => authenticate::run(args).await,
        ThingSubcommand::Token(args) => token::run(args).await,
        ThingSubcommand::Attributes(args) => attributes::run(args).await,
    }
}

/// Connection and identity arguments shared by every thing subcommand.
#[derive(Args, Debug)]
pub struct ConnectionArgs {
    /// AM base URL
    #[arg(long)]
    pub am_url: String,

    /// AM realm path
    #[arg(long, default_value = "/")]
    pub realm: String,

    /// Authentication tree to walk
    #[arg(long)]
    pub tree: String,

    /// Thing name
    #[arg(long)]
    pub name: String,

    /// Thing secret, for password-collecting trees
    #[arg(long)]
    pub secret: Option<String>,

    /// Path to a PEM-encoded private key, for proof-of-possession trees
    #[arg(long)]
    pub key_file: Option<std::path::PathBuf>,

    /// Key identifier sent in proof-of-possession token headers
    #[arg(long, default_value = "pop.cnf")]
    pub key_id: String,

    /// Signing algorithm (ES256, ES384, RS256, RS384, RS512, PS256,
    /// PS384, PS512, EdDSA)
    #[arg(long, default_value = "ES256")]
    pub alg: String,
}

/// Build an authenticated session from the shared arguments.
pub async fn authenticated_session(args: &ConnectionArgs) -> Result<ThingSession> {
    let base = AmUrl::new(&args.am_url).context("Invalid AM URL")?;
    let realm = Realm::new(args.realm.clone()).context("Invalid realm")?;

    let client = Arc::new(AmClient::new(base, realm.clone()));
    client
        .initialise()
        .await
        .context("Failed to initialise AM client")?;

    let mut identity = ThingIdentity::new(&args.name, realm);
    if let Some(secret) = &args.secret {
        identity = identity.with_secret(secret);
    }
    if let Some(key_file) = &args.key_file {
        let pem = std::fs::read(key_file)
            .with_context(|| format!("Failed to read key file {}", key_file.display()))?;
        let alg = parse_alg(&args.alg)?;
        let key = SigningKey::from_pem(alg, &args.key_id, &pem).context("Invalid signing key")?;
        identity = identity.with_key(key);
    }

    let session = ThingSession::new(identity, client, &args.tree);
    session
        .authenticate()
        .await
        .context("Authentication failed")?;
    Ok(session)
}

fn parse_alg(name: &str) -> Result<SigningAlg> {
    let alg = match name.to_ascii_uppercase().as_str() {
        "ES256" => SigningAlg::Es256,
        "ES384" => SigningAlg::Es384,
        "RS256" => SigningAlg::Rs256,
        "RS384" => SigningAlg::Rs384,
        "RS512" => SigningAlg::Rs512,
        "PS256" => SigningAlg::Ps256,
        "PS384" => SigningAlg::Ps384,
        "PS512" => SigningAlg::Ps512,
        "EDDSA" => SigningAlg::EdDsa,
        other => anyhow::bail!("unsupported signing algorithm '{other}'"),
    };
    Ok(alg)
}
