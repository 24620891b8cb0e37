//! stackstore increment utility
//!
//! Logs in, reads an integer table entry, adds one, and writes it back.
//! With `--transaction` the read-modify-write runs atomically inside
//! BEGIN/COMMIT; otherwise a concurrent writer can interleave between the
//! read and the write.

use clap::Parser;
use stackstore::Client;

/// Increment an integer value in a stackstore table
#[derive(Parser, Debug)]
#[command(name = "stackstore-incr")]
#[command(about = "Increment one value on a stackstore server")]
struct Args {
    /// Server address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:5000")]
    server: String,

    /// Run the read-modify-write inside a transaction
    #[arg(short = 't', long)]
    transaction: bool,

    /// Username to log in as
    username: String,

    /// Table holding the value
    table: String,

    /// Key to increment
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

    if args.transaction {
        client.begin()?;
    }

    client.get(&args.table, &args.key)?;
    client.push("1")?;
    client.add()?;
    client.set(&args.table, &args.key)?;

    if args.transaction {
        client.commit()?;
    }

    client.bye()?;
    Ok(())
}
