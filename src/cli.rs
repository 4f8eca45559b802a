use clap::{Parser, Subcommand};

use crate::admin::AdminGate;
use crate::error::AppError;

#[derive(Debug, Parser)]
#[command(name = "access-gate", version, about = "Single-session access code gate")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Issue a new access code
    Issue {
        /// Active code that introduced the new one
        #[arg(long)]
        referrer: Option<String>,
        /// Display name; derived from the code when omitted
        #[arg(long)]
        name: Option<String>,
    },
    /// Deactivate an access code and revoke its current session
    Deactivate { code: String },
}

fn prompt_secret() -> Result<String, AppError> {
    rpassword::prompt_password("Admin secret: ")
        .map_err(|e| AppError::Internal(format!("Failed to read admin secret: {e}")))
}

pub async fn issue(
    admin: &AdminGate,
    referrer: Option<&str>,
    name: Option<&str>,
) -> Result<(), AppError> {
    let secret = prompt_secret()?;
    let code = admin.issue_code(Some(&secret), referrer, name).await?;
    println!("{code}");
    Ok(())
}

pub async fn deactivate(admin: &AdminGate, code: &str) -> Result<(), AppError> {
    let secret = prompt_secret()?;
    admin.deactivate_code(Some(&secret), code).await?;
    println!("Deactivated {code}");
    Ok(())
}
