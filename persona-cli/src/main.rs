mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "persona-idp")]
#[command(about = "Persona (BrowserID) identity provider tools")]
#[command(version)]
pub struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the support document served at /.well-known/browserid
    SupportDocument {
        /// Configuration file (TOML, or JSON with a .json extension)
        #[arg(short, long, default_value = "persona.toml")]
        config: PathBuf,
    },
    /// Issue an identity certificate
    Issue {
        /// Configuration file
        #[arg(short, long, default_value = "persona.toml")]
        config: PathBuf,

        /// Email address to certify
        #[arg(short, long)]
        email: String,

        /// User agent public key as a JSON object, or @path to read it from a file
        #[arg(short, long)]
        public_key: String,

        /// Requested validity in seconds
        #[arg(short, long, default_value_t = persona_auth::CERTIFICATE_MAX_DURATION)]
        duration: i64,

        /// Refuse to issue unless the email has a live session
        #[arg(long)]
        require_session: bool,
    },
    /// Record a session for an authenticated user
    CreateSession {
        /// Configuration file
        #[arg(short, long, default_value = "persona.toml")]
        config: PathBuf,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Session validity in seconds
        #[arg(short, long, default_value_t = persona_auth::SESSION_MAX_DURATION)]
        duration: i64,
    },
    /// Check whether an email has a live session
    CheckSession {
        /// Configuration file
        #[arg(short, long, default_value = "persona.toml")]
        config: PathBuf,

        /// Email address
        #[arg(short, long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::SupportDocument { config } => {
            let document = commands::execute_support_document(&config).await?;
            println!("{}", document);
            Ok(())
        }
        Commands::Issue {
            config,
            email,
            public_key,
            duration,
            require_session,
        } => {
            let token =
                commands::execute_issue(&config, email, &public_key, duration, require_session)
                    .await?;
            println!("{}", token);
            Ok(())
        }
        Commands::CreateSession {
            config,
            email,
            duration,
        } => commands::execute_create_session(&config, &email, duration).await,
        Commands::CheckSession { config, email } => {
            let live = commands::execute_check_session(&config, email).await?;
            if live {
                println!("live");
                Ok(())
            } else {
                println!("no live session");
                std::process::exit(1);
            }
        }
    }
}

/// Logs go to stderr so stdout carries only command output
fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
