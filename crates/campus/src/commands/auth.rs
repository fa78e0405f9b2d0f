//! Auth command - sign in, sign out and session inspection.

use std::io::Write;

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use serde_json::json;

use super::Context;

/// Arguments for the auth command.
#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Sign in with email and password
    Login {
        /// Account email (prompted when omitted)
        #[arg(short, long)]
        email: Option<String>,

        /// Account password (prompted without echo when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// End the session and forget the saved tokens
    Logout,

    /// Show the saved session without contacting the server
    Status,

    /// Ask the server who the session belongs to
    Whoami,
}

/// Run the auth command.
pub async fn run(args: AuthArgs, ctx: &Context) -> Result<()> {
    match args.command {
        AuthCommand::Login { email, password } => cmd_login(email, password, ctx).await,
        AuthCommand::Logout => cmd_logout(ctx).await,
        AuthCommand::Status => cmd_status(ctx),
        AuthCommand::Whoami => cmd_whoami(ctx).await,
    }
}

async fn cmd_login(email: Option<String>, password: Option<String>, ctx: &Context) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    if email.is_empty() {
        bail!("No email provided");
    }
    let password = match password {
        Some(password) => password,
        None => rpassword::prompt_password("Password: ")?,
    };

    let client = ctx.client()?;
    let auth = client.auth().login(&email, &password).await?;

    if ctx.json_output {
        return ctx.print_json(&json!({ "authenticated": true, "user": auth.user }));
    }

    let name = auth
        .user
        .as_ref()
        .map(|u| u.display_name())
        .unwrap_or(email);
    println!("Signed in as {name}");
    if auth.refresh_token.is_none() {
        println!("(no refresh token issued: you will need to sign in again when it expires)");
    }
    Ok(())
}

async fn cmd_logout(ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    if client.session().snapshot().is_empty() {
        println!("Not signed in.");
        return Ok(());
    }

    client.auth().logout().await?;
    println!("Signed out.");
    Ok(())
}

fn cmd_status(ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    let session = client.session().snapshot();
    let session_file = ctx.session_file()?;

    if ctx.json_output {
        return ctx.print_json(&json!({
            "server": ctx.config.server_url(),
            "session_file": session_file,
            "authenticated": session.access_token.is_some(),
            "can_renew": session.refresh_token.is_some(),
            "user": session.user,
        }));
    }

    println!("Authentication Status");
    println!("---------------------");
    println!("Server:  {}", ctx.config.server_url());
    println!("Session: {}", session_file.display());

    if session.access_token.is_none() {
        println!("State:   not signed in");
        println!("  Run 'campus auth login' to sign in");
        return Ok(());
    }

    println!("State:   signed in");
    if let Some(user) = &session.user {
        println!("  User:   {} <{}>", user.display_name(), user.email);
        if let Some(role) = &user.role {
            println!("  Role:   {role}");
        }
        if let Some(school) = &user.school_id {
            println!("  School: {school}");
        }
    }
    if session.refresh_token.is_none() {
        println!("  No refresh token: the session ends when the access token expires");
    }
    Ok(())
}

async fn cmd_whoami(ctx: &Context) -> Result<()> {
    let client = ctx.client()?;
    let user = client.auth().me().await?;
    if ctx.json_output {
        return ctx.print_json(&user);
    }

    println!("{} <{}>", user.display_name(), user.email);
    if ctx.verbose {
        println!("  id:     {}", user.id);
        println!("  role:   {}", user.role.as_deref().unwrap_or("-"));
        println!("  school: {}", user.school_id.as_deref().unwrap_or("-"));
    }
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
