mod config;
mod contact;
mod db;
mod logging;
mod search;
mod ui;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use config::Config;
use contact::{contacts_to_strings, headers_to_text, Contact};
use db::Database;
use logging::LogTarget;

#[derive(Parser, Debug)]
#[command(name = "cardbox", about = "Keep a small address book in SQLite")]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Contacts database, overriding `db_path` from the config
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print contacts as tab-separated rows
    List(ListArgs),
    /// Add a contact and print its id
    Add(AddArgs),
    /// Change fields of an existing contact
    Edit(EditArgs),
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Only print contacts whose fields contain TEXT (case-insensitive)
    #[arg(long, value_name = "TEXT")]
    search: Option<String>,

    /// Print a JSON array instead of tab-separated rows
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args, Debug)]
struct AddArgs {
    #[arg(long)]
    first: String,

    #[arg(long)]
    last: String,

    #[arg(long, default_value = "")]
    comment: String,
}

#[derive(Args, Debug)]
struct EditArgs {
    id: i64,

    #[arg(long)]
    first: Option<String>,

    #[arg(long)]
    last: Option<String>,

    #[arg(long)]
    comment: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    // the terminal UI owns the screen, so its logs go to a file
    let log_path;
    let target = match cli.command {
        Some(_) => LogTarget::Stderr,
        None => {
            log_path = config::default_log_path()?;
            LogTarget::File(&log_path)
        }
    };
    logging::init(target, &config.log_level)?;

    for key in &config.unknown_keys {
        warn!(config = %config.config_path.display(), "unknown configuration key `{}`", key);
    }

    let db_path = cli.db.clone().unwrap_or_else(|| config.db_path.clone());
    let mut db = Database::open(&db_path)?;

    match cli.command {
        Some(Command::List(args)) => handle_list(&db, args),
        Some(Command::Add(args)) => handle_add(&mut db, args),
        Some(Command::Edit(args)) => handle_edit(&mut db, args),
        None => run_ui(&mut db, &config),
    }
}

fn run_ui(db: &mut Database, config: &Config) -> Result<()> {
    info!(config = %config.config_path.display(), "starting interactive session");
    let mut app = ui::app::App::new(db, config)?;
    app.run()
}

fn handle_list(db: &Database, args: ListArgs) -> Result<()> {
    let (headers, contacts) = db.list()?;
    let contacts = match args.search.as_deref() {
        Some(search) => search::filter_contacts(&contacts, search),
        None => contacts,
    };

    if args.json {
        let json =
            serde_json::to_string_pretty(&contacts).context("failed to serialize contacts")?;
        println!("{}", json);
        return Ok(());
    }

    println!("{}", headers_to_text(&headers, false).join("\t"));
    for row in contacts_to_strings(&contacts) {
        println!("{}", row.join("\t"));
    }
    Ok(())
}

fn handle_add(db: &mut Database, args: AddArgs) -> Result<()> {
    let contact = Contact::new(args.first, args.last, args.comment);
    let id = db.save(&contact)?;
    info!(id, "added contact");
    println!("{}", id);
    Ok(())
}

fn handle_edit(db: &mut Database, args: EditArgs) -> Result<()> {
    let Some(mut contact) = db.get(args.id)? else {
        bail!("no contact with id {}", args.id);
    };

    if let Some(first) = args.first {
        contact.first_name = first;
    }
    if let Some(last) = args.last {
        contact.last_name = last;
    }
    if let Some(comment) = args.comment {
        contact.comment = comment;
    }

    let id = db.save(&contact)?;
    info!(id, "updated contact");
    println!("{}", id);
    Ok(())
}
