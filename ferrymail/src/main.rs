//! Ferrymail delivery daemon.
//!
//! Watches the outbound queue and delivers each message to the configured
//! smarthosts through per-protocol helper programs.
//!
//! # Usage
//!
//! ```bash
//! # Run against the default installation layout
//! ferrymail-send
//!
//! # Point at a scratch installation
//! ferrymail-send --queue-root /tmp/ferrymail \
//!     --config-dir ./etc --protocol-dir ./helpers
//!
//! # One sweep and exit: set pausetime to 0 in the config directory
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use ferrymail_send::Sender;

#[cfg(not(unix))]
compile_error!("the delivery daemon requires a unix platform");

/// Delivery daemon of the ferrymail relay-only MTA.
#[derive(Parser, Debug)]
#[command(name = "ferrymail-send", version, about)]
struct Args {
    /// Queue root holding queue/, failed/ and the trigger FIFO
    #[arg(
        long,
        env = "FERRYMAIL_QUEUE_ROOT",
        default_value = "/var/spool/ferrymail"
    )]
    queue_root: PathBuf,

    /// Directory of key-per-file configuration
    #[arg(long, env = "FERRYMAIL_CONFIG_DIR", default_value = "/etc/ferrymail")]
    config_dir: PathBuf,

    /// Directory holding one helper executable per protocol
    #[arg(
        long,
        env = "FERRYMAIL_PROTOCOL_DIR",
        default_value = "/usr/libexec/ferrymail"
    )]
    protocol_dir: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    ferrymail_common::logging::init();
    let args = Args::parse();

    ferrymail_common::internal!(level = INFO, "ferrymail-send starting up");
    let mut sender = Sender::start(args.config_dir, args.queue_root, args.protocol_dir)
        .await
        .context("delivery daemon startup failed")?;
    sender.run().await;
    Ok(())
}
