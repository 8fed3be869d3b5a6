//! Binary entry point: resolve configuration, start logging, open the store,
//! then run whichever command was asked for.
use anyhow::Result;
use clap::Parser;
use tracing::info;

use bdo_chronicle::cli::{Cli, Commands};
use bdo_chronicle::config::Config;
use bdo_chronicle::{logging, open_database, run_app, table_counts, App};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_cli(&cli)?;
    logging::init(&config)?;

    let command = cli.command();
    info!(?command, db = %config.db_path.display(), "starting");
    let conn = open_database(&config.db_path)?;

    match command {
        Commands::Browse => {
            let mut app = App::new(conn)?;
            run_app(&mut app)
        }
        Commands::Migrate => {
            println!("Schema ready at {}", config.db_path.display());
            Ok(())
        }
        Commands::Summary => {
            for (table, count) in table_counts(&conn)? {
                println!("{table:<20} {count}");
            }
            Ok(())
        }
    }
}
