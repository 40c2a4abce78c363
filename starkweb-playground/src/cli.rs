use clap::{Parser, Subcommand};

/// Drives a starkweb session from the terminal. The session survives between
/// invocations in the configured database.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the playground configuration TOML file.
    /// If not provided, default values will be used.
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Print the session snapshot and the active account.
    Status,
    /// List configured chains.
    Chains,
    /// List registered wallets.
    Wallets,
    /// Connect a wallet by id.
    Connect {
        wallet: String,
        /// Chain to connect on.
        #[arg(long)]
        chain: Option<String>,
    },
    /// Disconnect a wallet, or the active one.
    Disconnect { wallet: Option<String> },
    /// Silently restore connections from the previous run.
    Reconnect,
    /// Send a JSON-RPC request through the chain client.
    Request {
        method: String,
        #[arg(long)]
        chain: Option<String>,
    },
}
