//! Keyward CLI Client
//!
//! Command-line interface for interacting with a Keyward daemon.

use clap::{Parser, Subcommand};
use keyward::network::{send_control, Client};
use keyward::protocol::{transport_decode, transport_encode, ControlCommand, Request, Response};
use keyward::KeyId;

/// Keyward CLI
#[derive(Parser, Debug)]
#[command(name = "keyward-cli")]
#[command(about = "CLI for the Keyward key-management daemon")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:10600")]
    server: String,

    /// Control socket path
    #[arg(short, long, default_value = "/tmp/keyward.sock")]
    control: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt data under a key; prints base64 ciphertext
    Encrypt {
        /// Key identifier, e.g. file:/etc/keyward/kek.bin
        key_id: String,

        /// Plaintext to encrypt
        data: String,
    },

    /// Decrypt base64 ciphertext under a key
    Decrypt {
        /// Key identifier
        key_id: String,

        /// Base64 ciphertext
        data: String,
    },

    /// Load a key into the daemon's cache
    Load {
        key_id: String,
    },

    /// Remove a key from the daemon's cache
    Remove {
        key_id: String,
    },

    /// Remove every key from the daemon's cache
    RemoveAll,

    /// Stop the daemon
    Exit,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> keyward::Result<()> {
    let control = match args.command {
        Commands::Encrypt { key_id, data } => {
            let request = Request::encrypt(key_id.as_str(), data.as_bytes());
            return print_response(Client::connect(&args.server)?.request(&request)?, true);
        }
        Commands::Decrypt { key_id, data } => {
            let ciphertext = transport_decode(&data)?;
            let request = Request::decrypt(key_id.as_str(), ciphertext.as_bytes());
            return print_response(Client::connect(&args.server)?.request(&request)?, false);
        }
        Commands::Load { key_id } => ControlCommand::Load(KeyId::from(key_id)),
        Commands::Remove { key_id } => ControlCommand::Remove(KeyId::from(key_id)),
        Commands::RemoveAll => ControlCommand::RemoveAll,
        Commands::Exit => ControlCommand::Exit,
    };

    println!("{}", send_control(&args.control, &control)?);
    Ok(())
}

fn print_response(response: Response, as_base64: bool) -> keyward::Result<()> {
    match response {
        Response::Success { data, .. } if as_base64 => println!("{}", transport_encode(data.as_bytes())),
        Response::Success { data, .. } => println!("{}", String::from_utf8_lossy(data.as_bytes())),
        Response::Error(e) => {
            eprintln!("server error: {}", e);
            std::process::exit(2);
        }
    }
    Ok(())
}
