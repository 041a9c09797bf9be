//! namesync-ctl: control CLI for the namesync daemon.
//!
//! Plays the part of game clients against the reference host: register
//! accounts, start and end sessions, run the confirm command and read back
//! the messages each session was sent.

mod daemon_client;
mod logging;
mod output;

use clap::{Parser, Subcommand};
use daemon_client::{ClientError, DaemonClient};
use namesync_protocol::{
    AccountCreated, CommandParams, Method, PendingEntry, RegisterAccountParams, SessionParams,
    SessionReply, SessionStartParams,
};
use serde::Serialize;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "namesync-ctl")]
#[command(about = "Drive a namesync daemon from the command line")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show daemon health
    Health,

    /// Create an account
    Register {
        name: String,
        password: String,
    },

    /// Connect a session (fires the session-start hooks)
    Start {
        #[arg(value_name = "SESSION")]
        session_id: String,

        #[arg(value_name = "DISPLAY_NAME")]
        display_name: String,

        /// Account the session is logged in as; omit for a guest
        #[arg(long)]
        account: Option<String>,

        /// Grant only these permissions (repeatable); all are granted by default
        #[arg(long = "permission")]
        permissions: Vec<String>,
    },

    /// Disconnect a session
    End {
        #[arg(value_name = "SESSION")]
        session_id: String,
    },

    /// Run the confirm command for a session
    Confirm {
        #[arg(value_name = "SESSION")]
        session_id: String,

        /// Usually just the account password
        #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,

        /// Command name registered by the daemon
        #[arg(long, default_value = "confirmname")]
        command: String,
    },

    /// Print messages queued for a session
    Poll {
        #[arg(value_name = "SESSION")]
        session_id: String,
    },

    /// List pending reconciliations
    Pending,
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    if let Err(err) = run(cli.command) {
        tracing::error!(error = %err, "namesync-ctl failed");
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), ClientError> {
    let client = DaemonClient::from_env()?;

    match command {
        Commands::Health => {
            let health: Value = client.call(Method::GetHealth, None)?;
            let pretty = serde_json::to_string_pretty(&health)
                .map_err(|err| ClientError::Transport(err.to_string()))?;
            println!("{}", pretty);
        }
        Commands::Register { name, password } => {
            let created: AccountCreated = client.call(
                Method::RegisterAccount,
                params(RegisterAccountParams { name, password })?,
            )?;
            println!(
                "Registered account {} (id {})",
                created.name, created.account_id
            );
        }
        Commands::Start {
            session_id,
            display_name,
            account,
            permissions,
        } => {
            let permissions = (!permissions.is_empty()).then_some(permissions);
            let reply: SessionReply = client.call(
                Method::SessionStart,
                params(SessionStartParams {
                    session_id,
                    display_name,
                    account_name: account,
                    permissions,
                })?,
            )?;
            print_reply(&reply);
        }
        Commands::End { session_id } => {
            let reply: SessionReply =
                client.call(Method::SessionEnd, params(SessionParams { session_id })?)?;
            print_reply(&reply);
        }
        Commands::Confirm {
            session_id,
            args,
            command,
        } => {
            let reply: SessionReply = client.call(
                Method::Command,
                params(CommandParams {
                    session_id,
                    name: command,
                    args,
                })?,
            )?;
            print_reply(&reply);
        }
        Commands::Poll { session_id } => {
            let reply: SessionReply =
                client.call(Method::DrainMessages, params(SessionParams { session_id })?)?;
            print_reply(&reply);
        }
        Commands::Pending => {
            let pending: Vec<PendingEntry> = client.call(Method::GetPending, None)?;
            if pending.is_empty() {
                println!("No pending name changes");
            }
            for entry in &pending {
                println!("{}", output::format_pending(entry));
            }
        }
    }

    Ok(())
}

fn params<P: Serialize>(params: P) -> Result<Option<Value>, ClientError> {
    serde_json::to_value(params)
        .map(Some)
        .map_err(|err| ClientError::Transport(format!("Failed to encode params: {}", err)))
}

fn print_reply(reply: &SessionReply) {
    for message in &reply.messages {
        println!("{}", output::format_message(message));
    }
}
