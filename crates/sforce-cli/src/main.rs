//! sforce CLI - query and describe a Salesforce org from the shell

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sforce::prelude::*;
use std::io::{self, Write};

#[derive(Parser)]
#[command(name = "sforce")]
#[command(author, version, about = "Salesforce partner API client")]
struct Cli {
    /// Log protocol activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Login endpoint
    #[arg(long, env = "SF_SERVER_URL", global = true)]
    server_url: Option<String>,

    #[arg(short, long, env = "SF_USERNAME", global = true)]
    username: Option<String>,

    #[arg(short, long, env = "SF_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Appended to the password
    #[arg(long, env = "SF_SECTOKEN", hide_env_values = true, global = true)]
    security_token: Option<String>,

    /// Send and accept uncompressed bodies
    #[arg(long, global = true)]
    no_gzip: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a SOQL query and print the records
    Query {
        soql: String,

        /// Follow the query locator until every batch is fetched
        #[arg(short, long)]
        all: bool,
    },

    /// Describe one or more sObject types
    Describe {
        #[arg(required = true)]
        types: Vec<String>,
    },

    /// Print the server time
    Timestamp,

    /// Show the logged-in user
    Whoami,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut client = connect(&cli)?;
    match &cli.command {
        Commands::Query { soql, all } => query(&mut client, soql, *all),
        Commands::Describe { types } => describe(&client, types),
        Commands::Timestamp => {
            let timestamp = client.get_server_timestamp().context("getServerTimestamp failed")?;
            print_json(&timestamp)
        }
        Commands::Whoami => {
            let info = client.get_user_info().context("getUserInfo failed")?;
            print_json(&info)
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(io::stderr)
        .init();
}

fn connect(cli: &Cli) -> Result<SforceClient> {
    let mut config = ClientConfig::from_env();
    if let Some(url) = &cli.server_url {
        config = config.with_server_url(url.as_str());
    }
    if cli.no_gzip {
        config = config.with_gzip(false);
    }

    let username = cli
        .username
        .as_deref()
        .context("No username given (use --username or SF_USERNAME)")?;
    let mut password = cli
        .password
        .clone()
        .context("No password given (use --password or SF_PASSWORD)")?;
    if let Some(token) = &cli.security_token {
        password.push_str(token);
    }

    let mut client = SforceClient::new(config).context("Failed to create HTTP client")?;
    let login = client
        .login(username, &password)
        .with_context(|| format!("Login failed for '{username}'"))?;
    if login.password_expired {
        eprintln!("Warning: password for '{username}' has expired");
    }
    tracing::info!("Logged in to {}", login.server_url);
    Ok(client)
}

fn query(client: &mut SforceClient, soql: &str, all: bool) -> Result<()> {
    let mut set = client.query(soql).context("Query failed")?;

    while all && !set.done {
        let Some(locator) = set.query_locator.clone() else {
            break;
        };
        let next = client
            .query_more(&locator)
            .with_context(|| format!("queryMore failed at '{locator}'"))?;
        set.records.extend(next.records);
        set.done = next.done;
        set.query_locator = next.query_locator;
    }

    eprintln!("{} of {} record(s)", set.len(), set.size);
    print_json(&set)
}

fn describe(client: &SforceClient, types: &[String]) -> Result<()> {
    let names: Vec<&str> = types.iter().map(String::as_str).collect();
    let descriptions = client
        .describe_sobjects(&names)
        .with_context(|| format!("Failed to describe {}", names.join(", ")))?;
    print_json(&descriptions)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value).context("Failed to write JSON")?;
    writeln!(out)?;
    Ok(())
}
