use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use daga_server::bootstrap::{read_json, ClientDescriptor, ContextDescriptor};
use daga_server::client::{verify_challenge_signatures, verify_tag_signatures};
use daga_server::coordinator::{
    AuthenticateRequest, AuthenticationResult, ChallengeGrant, ErrorBody,
};
use daga_server::SecureRng;
use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Parser)]
#[command(name = "daga-client")]
#[command(about = "DAGA anonymous authentication client", long_about = None)]
struct Cli {
    /// Public authentication context descriptor
    auth_context: PathBuf,

    /// This client's private descriptor
    private_data: PathBuf,

    /// Base URL of the server leading the round
    #[arg(short, long, default_value = "http://127.0.0.1:12345")]
    server: String,

    /// Payload the servers bind to the linkage tag
    #[arg(short, long, default_value = "")]
    bind: String,
}

async fn post<B: Serialize, T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    body: &B,
) -> Result<T, Box<dyn std::error::Error>> {
    let response = client.post(url).json(body).send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    match response.json::<ErrorBody>().await {
        Ok(error) => Err(format!("{status} {}: {}", error.error, error.message).into()),
        Err(_) => Err(format!("Server answered {status}").into()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let context = read_json::<ContextDescriptor>(&cli.auth_context)?.to_context()?;
    let secret = read_json::<ClientDescriptor>(&cli.private_data)?.into_secret(&context)?;
    let base = cli.server.trim_end_matches('/');
    let http = reqwest::Client::new();

    println!(
        "Authenticating to group {} ({} servers) via {base}...",
        context.group_id(),
        context.server_count()
    );
    let start = Instant::now();

    let pending = secret.begin(&context, &mut SecureRng::new())?;
    let grant: ChallengeGrant = post(
        &http,
        &format!("{base}/request_challenge"),
        pending.client_data(),
    )
    .await?;
    verify_challenge_signatures(
        &context,
        grant.auth_id.as_str(),
        &grant.challenge,
        &grant.sigs,
    )?;
    println!(
        "Challenge {} accepted (auth id {})",
        hex::encode(grant.challenge.to_bytes()),
        grant.auth_id
    );

    let request = AuthenticateRequest {
        auth_id: grant.auth_id,
        response: pending.respond(&grant.challenge),
        bind: cli.bind.clone(),
    };
    let result: AuthenticationResult =
        post(&http, &format!("{base}/authenticate"), &request).await?;
    verify_tag_signatures(
        &context,
        &result.tag,
        &cli.bind,
        &result.tag_sigs,
        &result.binding_sigs,
    )?;

    println!("Authenticated in {:?}", start.elapsed());
    println!("Linkage tag: {}", result.tag);
    Ok(())
}
