//! stakesync CLI — inspect engine defaults and version info.
//!
//! Usage:
//! ```bash
//! stakesync info
//! stakesync defaults --operator 0xabc
//! stakesync version
//! ```

use std::env;
use std::process;

use stakesync_engine::EngineBuilder;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    match args[1].as_str() {
        "info" => cmd_info(),
        "defaults" => cmd_defaults(&args[2..])?,
        "version" | "--version" | "-V" => {
            println!("stakesync {}", env!("CARGO_PKG_VERSION"));
        }
        "help" | "--help" | "-h" => print_usage(),
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    }
    Ok(())
}

fn print_usage() {
    println!("stakesync {}", env!("CARGO_PKG_VERSION"));
    println!("Stake-tracking reconciliation engine for stream sponsorships\n");
    println!("USAGE:");
    println!("    stakesync <COMMAND>\n");
    println!("COMMANDS:");
    println!("    info      Show StakeSync configuration info");
    println!("    defaults  Print the default engine config as JSON (--operator <addr>)");
    println!("    version   Print version");
    println!("    help      Print this help");
}

fn cmd_info() {
    println!("StakeSync v{}", env!("CARGO_PKG_VERSION"));
    println!("  Default backfill page size: 1000 edges/page");
    println!("  Default drift threshold: 0.1% of total approximate value");
    println!("  Default resubscribe backoff: 2000 ms");
    println!("  Durable state: none (all state lives in chain collaborators)");
}

fn cmd_defaults(args: &[String]) -> anyhow::Result<()> {
    let builder = match args {
        [flag, addr] if flag == "--operator" => EngineBuilder::new().operator(addr.clone()),
        [] => EngineBuilder::new(),
        _ => {
            eprintln!("Usage: stakesync defaults [--operator <addr>]");
            process::exit(1);
        }
    };
    let config = builder.build_config();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
