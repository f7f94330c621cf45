use anyhow::Context;
use chrono::{Duration, Utc};
use clap::Subcommand;
use serde_json::json;

use crate::auth::{Claims, TokenIssuer};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::middleware::TokenVerifier;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Sign a bearer token with JWT_SECRET")]
    Issue {
        #[arg(long, help = "Subject (user id)")]
        sub: String,
        #[arg(long, help = "Email claim")]
        email: String,
        #[arg(long, help = "Lifetime in hours (defaults to JWT_EXPIRY_HOURS)")]
        hours: Option<u64>,
    },

    #[command(about = "Verify a token and print its claims")]
    Inspect {
        #[arg(help = "Token, with or without the 'Bearer ' prefix")]
        token: String,
    },
}

pub async fn handle(cmd: TokenCommands, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let secret = &config.security.jwt_secret;

    match cmd {
        TokenCommands::Issue { sub, email, hours } => {
            let hours = hours.unwrap_or(config.security.jwt_expiry_hours);
            let issuer = TokenIssuer::new(secret, hours).context("cannot sign tokens")?;
            let claims = Claims::new(sub, email, hours);
            let token = issuer.sign(&claims)?;

            match output_format {
                OutputFormat::Text => println!("{}", token),
                OutputFormat::Json => {
                    let expires_at = Utc::now() + Duration::hours(hours as i64);
                    output_success(
                        &output_format,
                        "Token issued",
                        Some(json!({"token": token, "sub": claims.sub, "expiresAt": expires_at})),
                    )?;
                }
            }
            Ok(())
        }
        TokenCommands::Inspect { token } => {
            let header = if token.starts_with("Bearer ") {
                token
            } else {
                format!("Bearer {}", token)
            };
            let identity = TokenVerifier::new(secret)
                .verify(Some(header.as_str()))
                .context("token rejected")?;

            match output_format {
                OutputFormat::Text => {
                    println!("subject:    {}", identity.subject_id);
                    println!("email:      {}", identity.email);
                    println!("issued at:  {}", identity.issued_at.to_rfc3339());
                    println!("expires at: {}", identity.expires_at.to_rfc3339());
                }
                OutputFormat::Json => {
                    output_success(&output_format, "Token valid", Some(json!({"identity": identity})))?;
                }
            }
            Ok(())
        }
    }
}
