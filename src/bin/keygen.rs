use std::fs;
use std::path::PathBuf;

use clap::Parser;
use daga_server::bootstrap::{generate_group, write_json};
use daga_server::SecureRng;

#[derive(Parser)]
#[command(name = "daga-keygen")]
#[command(about = "Generates descriptors for a DAGA authentication group", long_about = None)]
struct Cli {
    /// Number of clients in the group
    #[arg(short, long, default_value = "4")]
    clients: usize,

    /// Number of servers in the group
    #[arg(short, long, default_value = "3")]
    servers: usize,

    /// Directory the descriptors are written to
    #[arg(short, long, default_value = "group")]
    out: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let group = generate_group(cli.clients, cli.servers, &mut SecureRng::new())?;
    fs::create_dir_all(&cli.out)?;

    write_json(cli.out.join("context.json"), &group.context)?;
    for server in &group.servers {
        write_json(cli.out.join(format!("server-{}.json", server.n)), server)?;
    }
    for client in &group.clients {
        write_json(cli.out.join(format!("client-{}.json", client.index)), client)?;
    }

    println!(
        "Group {} written to {} ({} clients, {} servers)",
        group.context.uuid,
        cli.out.display(),
        cli.clients,
        cli.servers
    );
    Ok(())
}
