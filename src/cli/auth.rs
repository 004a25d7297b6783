use crate::api::ApiClient;
use crate::core::credentials::{Credentials, MemoryCredentialStore, Session};
use crate::core::settings::Settings;
use anyhow::{Context, Result};
use clap::Args;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

#[derive(Args)]
pub struct LoginArgs {
    /// Account username
    pub username: String,

    /// Password (prompted on stdin when omitted)
    #[arg(long, env = "INVCTL_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Store the credentials without checking them against the service
    #[arg(long)]
    pub no_verify: bool,
}

pub async fn login(settings: &Settings, args: LoginArgs) -> Result<()> {
    let password = match args.password {
        Some(password) => password,
        None => {
            eprint!("Password for {}: ", args.username);
            io::stderr().flush()?;
            read_password(io::stdin().lock())?
        }
    };

    let credentials = Credentials::new(args.username, password)?;

    if !args.no_verify {
        verify(settings, &credentials).await?;
    }

    Session::from_default_store()?.login(credentials.clone())?;
    println!("Logged in as {} ({})", credentials.username, settings.api.base_url);
    Ok(())
}

async fn verify(settings: &Settings, credentials: &Credentials) -> Result<()> {
    let session = Session::new(Arc::new(MemoryCredentialStore::with_credentials(
        credentials.clone(),
    )));
    let client = ApiClient::new(&settings.api, session)?;

    match client.list_providers(Some(1)).await {
        Ok(_) => Ok(()),
        Err(e) if e.is_unauthorized() => anyhow::bail!("Invalid username or password"),
        Err(e) => Err(e).context("Failed to verify credentials"),
    }
}

fn read_password(mut reader: impl BufRead) -> Result<String> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .context("Failed to read password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

pub fn logout() -> Result<()> {
    Session::from_default_store()?.logout()?;
    println!("Logged out");
    Ok(())
}

pub fn whoami(settings: &Settings) -> Result<()> {
    match Session::from_default_store()?.credentials()? {
        Some(credentials) => {
            println!("{} @ {}", credentials.username, settings.api.base_url)
        }
        None => println!("Not logged in"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::testing::{serve, Canned};

    #[test]
    fn test_read_password_strips_line_ending() {
        let password = read_password("s3cret pass\r\n".as_bytes()).unwrap();
        assert_eq!(password, "s3cret pass");
    }

    #[tokio::test]
    async fn test_verify_rejects_bad_credentials() {
        let (base, _server) = serve(|_| {
            vec![Canned::json("401 Unauthorized", r#"{"detail":"Invalid"}"#)]
        })
        .await;

        let mut settings = Settings::default();
        settings.api.base_url = base;
        let credentials = Credentials::new("admin", "wrong").unwrap();

        let err = verify(&settings, &credentials).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid username or password");
    }

    #[tokio::test]
    async fn test_verify_sends_basic_auth() {
        let (base, server) = serve(|_| {
            vec![Canned::json(
                "200 OK",
                r#"{"count":0,"next":null,"previous":null,"results":[]}"#,
            )]
        })
        .await;

        let mut settings = Settings::default();
        settings.api.base_url = base;
        let credentials = Credentials::new("admin", "secret").unwrap();

        verify(&settings, &credentials).await.unwrap();

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("GET /api/v1/providers/?page=1"));
        assert!(requests[0]
            .to_lowercase()
            .contains("authorization: basic ywrtaw46c2vjcmv0"));
    }
}
