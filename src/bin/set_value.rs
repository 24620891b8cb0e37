//! stackstore SET utility
//!
//! Logs in and writes one table entry.

use clap::Parser;
use stackstore::Client;

/// Write a value into a stackstore table
#[derive(Parser, Debug)]
#[command(name = "stackstore-set")]
#[command(about = "Write one value to a stackstore server")]
struct Args {
    /// Server address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:5000")]
    server: String,

    /// Username to log in as
    username: String,

    /// Table to write to
    table: String,

    /// Key to write
    key: String,

    /// Value to store
    value: String,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> stackstore::Result<()> {
    let mut client = Client::connect(&args.server)?;

    client.login(&args.username)?;
    client.push(&args.value)?;
    client.set(&args.table, &args.key)?;
    client.bye()?;

    Ok(())
}
