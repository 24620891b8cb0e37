//! stackstore GET utility
//!
//! Logs in, reads one table entry, and prints its value.

use clap::Parser;
use stackstore::Client;

/// Look up a value in a stackstore table
#[derive(Parser, Debug)]
#[command(name = "stackstore-get")]
#[command(about = "Read one value from a stackstore server")]
struct Args {
    /// Server address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:5000")]
    server: String,

    /// Username to log in as
    username: String,

    /// Table to read from
    table: String,

    /// Key to look up
    key: String,
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
    client.get(&args.table, &args.key)?;
    let value = client.top()?;
    client.bye()?;

    println!("{}", value);
    Ok(())
}
