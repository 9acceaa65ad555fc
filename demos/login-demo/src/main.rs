//! Runs an Emberlink server, or a client that logs in and answers pushes.
//!
//! ```text
//! login-demo server [--addr ADDR]
//! login-demo client [--addr ADDR] [--account ACCOUNT]
//! ```
//!
//! `ADDR` defaults to `127.0.0.1:8763`, `ACCOUNT` to `overing`.

use clap::{Parser, Subcommand};
use emberlink::DEFAULT_BIND_ADDR;
use emberlink::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "login-demo", version, about = "Emberlink login and heartbeat demo")]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Mode {
    /// Accept connections and push heartbeats to logged-in clients.
    Server {
        #[arg(long, env = "EMBERLINK_ADDR", default_value = DEFAULT_BIND_ADDR)]
        addr: String,
    },
    /// Log in and answer every heartbeat push until ctrl-c.
    Client {
        #[arg(long, env = "EMBERLINK_ADDR", default_value = DEFAULT_BIND_ADDR)]
        addr: String,
        #[arg(long, default_value = "overing")]
        account: String,
    },
}

/// Prints the outcome of the login.
struct PrintLogin;

impl ProtocolHandler<S2CClientLogin> for PrintLogin {
    async fn handle(
        &self,
        _session: &SessionHandle,
        message: S2CClientLogin,
    ) -> Result<(), HandlerError> {
        if message.is_accepted() {
            tracing::info!(name = %message.name, "logged in");
        } else {
            tracing::warn!(error = ?message.error, "login rejected");
        }
        Ok(())
    }
}

async fn serve(addr: &str) -> Result<(), EmberlinkError> {
    let server = EmberlinkServerBuilder::new()
        .bind(addr)
        .build(StaticAccounts::reference())
        .await?;

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}

async fn connect(addr: &str, account: &str) -> Result<(), EmberlinkError> {
    let dispatcher = Dispatcher::builder()
        .on::<S2CClientLogin, _>(PrintLogin)
        .on::<S2CHeartbeat, _>(HeartbeatResponder)
        .build()?;

    let client = EmberlinkClient::connect(&format!("ws://{addr}"), dispatcher).await?;
    client
        .send(&C2SClientLogin {
            account: account.to_string(),
        })
        .await?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!(error = %e, "could not wait for ctrl-c");
            }
            client.close().await?;
            Ok(())
        }
        // Only reached once the server goes away.
        () = wait_closed(&client) => Ok(()),
    }
}

async fn wait_closed(client: &EmberlinkClient) {
    while client.is_open() {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }
    tracing::info!("server closed the connection");
}

#[tokio::main]
async fn main() -> Result<(), EmberlinkError> {
    init_tracing();

    match Cli::parse().mode {
        Mode::Server { addr } => serve(&addr).await,
        Mode::Client { addr, account } => connect(&addr, &account).await,
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_client_defaults() {
        let cli = Cli::try_parse_from(["login-demo", "client"]).unwrap();
        assert_eq!(
            cli.mode,
            Mode::Client {
                addr: DEFAULT_BIND_ADDR.to_string(),
                account: "overing".to_string(),
            }
        );
    }

    #[test]
    fn test_server_address_override() {
        let cli = Cli::try_parse_from(["login-demo", "server", "--addr", "0.0.0.0:9000"]).unwrap();
        assert_eq!(
            cli.mode,
            Mode::Server {
                addr: "0.0.0.0:9000".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        assert!(Cli::try_parse_from(["login-demo", "observer"]).is_err());
    }
}
