//! runvault - stash round-trip entry point
//!
//! Opens a session, stashes every path given on the command line, reads each
//! entry back and prints `handle<TAB>bytes<TAB>path`. The session tree is
//! removed before exit.

use runvault::{config::Config, stash::EntryKind, Session};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "runvault=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        anyhow::bail!("usage: runvault <path>...");
    }

    // Load configuration
    let config = Config::from_env()?;
    info!("Session root: {}", config.session_root.display());

    Session::run(&config, |session| async move {
        for path in &paths {
            let handle = session.save(path).await?;
            let record = session
                .stash()
                .records()
                .await?
                .into_iter()
                .find(|record| record.handle == handle);
            let size = match record {
                Some(record) if record.kind == EntryKind::Directory => None,
                _ => Some(session.load(&handle.to_string()).await?.len()),
            };
            match size {
                Some(size) => println!("{}\t{}\t{}", handle, size, path),
                None => println!("{}\t-\t{}", handle, path),
            }
        }
        Ok::<_, anyhow::Error>(())
    })
    .await
}
