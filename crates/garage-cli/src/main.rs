//! # garage-opener
//!
//! Runs the garage door opener accessory against simulated hardware and
//! drives it from the terminal.
//!
//! ## Responsibilities
//! - Load configuration (`garage.toml` plus environment overrides)
//! - Initialise logging
//! - Build the simulated door, lock and identify indicator
//! - Start the accessory server and a console controller session
//! - Shut down cleanly on `quit`, end of input or Ctrl-C

mod config;
mod console;

use anyhow::Context;
use config::Config;
use console::{Command, Console, Flow, HELP};
use garage_core::CharacteristicId;
use garage_hardware::mock::{MockDoor, MockIndicator, MockLock};
use garage_server::{AccessoryServer, ChannelSession, ControllerSession, IndicatorIdentify};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Hardware
    let (door, door_handle) = MockDoor::with_travel(config.simulation.door_travel());
    let (lock, lock_handle) = MockLock::with_actuation(config.simulation.lock_actuation());
    let (indicator, _indicator_handle) = MockIndicator::new();
    let (identify, identify_task) = IndicatorIdentify::spawn(indicator);

    // Accessory
    let server = AccessoryServer::start(config.accessory, door, lock, Arc::new(identify))
        .context("starting accessory server")?;

    // Console controller, subscribed to every characteristic that supports events
    let (session, mut notifications) = ChannelSession::new();
    let session_id = session.id();
    let session: Arc<dyn ControllerSession> = Arc::new(session);
    for id in notifiable(&server) {
        server.subscribe(id, session.clone())?;
    }
    let printer = tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            println!("event {} = {}", notification.characteristic, notification.value);
        }
    });

    println!("{HELP}");
    let console = Console::new(&server, door_handle, lock_handle, session_id);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("reading stdin")?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                None
            }
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        match console.execute(command).await {
            Ok((flow, output)) => {
                println!("{output}");
                if flow == Flow::Quit {
                    break;
                }
            }
            Err(err) => println!("error: {err:#}"),
        }
    }

    drop(console);
    server.unsubscribe_all(session_id);
    drop(session);
    server.shutdown().await;
    if let Err(err) = printer.await {
        warn!(error = %err, "Notification printer failed");
    }
    if let Err(err) = identify_task.await {
        warn!(error = %err, "Identify task failed");
    }
    Ok(())
}

fn notifiable(server: &AccessoryServer) -> Vec<CharacteristicId> {
    server
        .list_accessories()
        .accessories
        .into_iter()
        .flat_map(|accessory| {
            let aid = accessory.aid;
            accessory
                .services
                .into_iter()
                .flat_map(|service| service.characteristics)
                .filter(|characteristic| characteristic.perms.notifiable())
                .map(move |characteristic| CharacteristicId::new(aid, characteristic.iid))
        })
        .collect()
}
