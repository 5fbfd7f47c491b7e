pub mod apply;
pub mod auth;
pub mod destroy;
pub mod id;
pub mod import;
pub mod plan;
pub mod read;
pub mod refresh;
pub mod sandbox;
pub mod state;
pub mod types;

use colored::Colorize;

/// Resolves on Ctrl-C. Never resolves when no signal handler can be installed.
pub async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    eprintln!();
    eprintln!("{}", "Interrupted, removing resources created so far...".yellow());
}
