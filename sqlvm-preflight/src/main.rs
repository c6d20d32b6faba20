// src/main.rs

//! Preflight-validate the arguments of a SQL VM command: expand bare names to
//! full resource IDs, enforce the cross-field rules, and (when requested)
//! check that the VM's managed identity is set up for Azure AD
//! authentication. All log output is written to a file whose location is
//! chosen by `get_or_create_log_dir()`; the terminal only sees the normalized
//! arguments or the failure.

use std::{
    env,
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
    time::Instant,
};

use clap::Parser;
use eyre::Result;
use log::{debug, info};
use sqlvm_preflight::{run, ArgumentNamespace, Cli, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // ───────────── setup file logging ─────────────
    let log_dir = get_or_create_log_dir();
    let log_file_path = log_dir.join("sqlvm-preflight.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)?;
    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let ts = buf.timestamp_millis();
            writeln!(
                buf,
                "{} {:<5} [{}] {}",
                ts,
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter_level(log::LevelFilter::Trace)
        .init();

    info!("Logging to {}", log_file_path.display());

    let overall_start = Instant::now();
    let cli = Cli::parse();
    debug!("CLI options parsed: {:?}", cli);

    let mut ns = ArgumentNamespace::from(&cli);
    let config = Config::try_from(&cli)?;
    debug!(
        "Validating in subscription {} (cloud {})",
        config.subscription_id, config.cloud.name
    );

    run(&config, &mut ns).await?;
    print_normalized(&ns);

    info!("Total runtime: {:.2?}", overall_start.elapsed());
    Ok(())
}

/// Echo the normalized argument values, one per line.
fn print_normalized(ns: &ArgumentNamespace) {
    if let Some(v) = &ns.sql_virtual_machine_group_resource_id {
        println!("sql-vm-group\t{v}");
    }
    for v in &ns.sql_virtual_machine_instances {
        println!("sql-vm\t{v}");
    }
    if let Some(v) = &ns.load_balancer_resource_id {
        println!("load-balancer\t{v}");
    }
    if let Some(v) = &ns.public_ip_address_resource_id {
        println!("public-ip-address\t{v}");
    }
    if let Some(v) = &ns.subnet_resource_id {
        println!("subnet\t{v}");
    }
    if let Some(v) = &ns.expand_query {
        println!("expand\t{v}");
    }
    println!("preflight OK");
}

/// Return an OS‑appropriate log directory, creating it if necessary.
pub fn get_or_create_log_dir() -> PathBuf {
    let dir = {
        #[cfg(target_os = "macos")]
        {
            let home = env::var("HOME").unwrap_or_else(|_| ".".to_owned());
            PathBuf::from(home)
                .join("Library")
                .join("Logs")
                .join("sqlvm-preflight")
        }
        #[cfg(not(target_os = "macos"))]
        {
            if let Ok(xdg_state) = env::var("XDG_STATE_HOME") {
                PathBuf::from(xdg_state).join("sqlvm-preflight")
            } else if let Ok(home) = env::var("HOME") {
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("sqlvm-preflight")
            } else {
                PathBuf::from("sqlvm_preflight_logs")
            }
        }
    };

    if let Err(e) = fs::create_dir_all(&dir) {
        eprintln!("Failed to create log directory {}: {}", dir.display(), e);
    }
    dir
}
