// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command line front end: one-shot device operations and the long-running
//! MQTT and IFTTT bridges.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use indego_lib::bridge::{CommandReceiver, IftttSink, MqttSink};
use indego_lib::{
    AdapterConfig, ClientConfig, CommandMailbox, DeviceCommand, Error, IndegoClient,
    PollingEngine, StatusTable,
};

#[derive(Debug, Parser)]
#[command(name = "indego", version, about = "Control a Bosch Indego mower and bridge it to MQTT or IFTTT")]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Args)]
struct Account {
    /// API endpoint.
    #[arg(long, default_value = ClientConfig::DEFAULT_BASE_URL)]
    base_url: String,
    #[arg(long, env = "INDEGO_USERNAME")]
    username: String,
    #[arg(long, env = "INDEGO_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the current device state.
    State(#[command(flatten)] Account),
    /// Print the mowing calendar.
    Calendar(#[command(flatten)] Account),
    /// Download the lawn map as SVG.
    Map {
        #[command(flatten)]
        account: Account,
        /// Output file.
        file: PathBuf,
    },
    /// Send MOW, PAUSE or RETURN.
    Command {
        #[command(flatten)]
        account: Account,
        command: DeviceCommand,
    },
    /// Mirror the device to an MQTT broker until interrupted.
    Mqtt {
        #[arg(long, short)]
        config: PathBuf,
    },
    /// Forward device changes to IFTTT until interrupted.
    Ifttt {
        #[arg(long, short)]
        config: PathBuf,
    },
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if matches!(e, Error::Configuration(_)) {
                tracing::error!(error = %e, "Invalid configuration");
            } else {
                tracing::error!(error = %e, "Failed");
            }
            ExitCode::from(exit_status(&e))
        }
    }
}

/// Exit status for a failed run: 1 for configuration errors, 2 otherwise.
fn exit_status(error: &Error) -> u8 {
    match error {
        Error::Configuration(_) => 1,
        _ => 2,
    }
}

async fn run(command: Command) -> indego_lib::Result<()> {
    match command {
        Command::State(account) => {
            with_client(account, |client| async move {
                let state = client.get_state().await?;
                let status = StatusTable::new().describe(state.status_code);
                println!("status:   {} ({})", status.message(), status.code());
                println!("error:    {}", state.error_code);
                println!("mowed:    {}%", state.mowed_percent);
                println!(
                    "runtime:  {} min operating, {} min charging",
                    state.runtime.total.operate, state.runtime.total.charge
                );
                Ok(())
            })
            .await
        }
        Command::Calendar(account) => {
            with_client(account, |client| async move {
                let calendar = client.get_calendar().await?;
                for entry in &calendar.entries {
                    let marker = if entry.number == calendar.selected_entry { "*" } else { " " };
                    println!("{marker} calendar {}", entry.number);
                    for day in &entry.days {
                        for slot in day.slots.iter().filter(|s| s.enabled) {
                            println!(
                                "    day {} {:02}:{:02}-{:02}:{:02}",
                                day.number, slot.start_hour, slot.start_minute, slot.end_hour, slot.end_minute
                            );
                        }
                    }
                }
                Ok(())
            })
            .await
        }
        Command::Map { account, file } => {
            with_client(account, |client| async move {
                let svg = client.get_map_svg().await?;
                std::fs::write(&file, svg)?;
                println!("Wrote map to {}", file.display());
                Ok(())
            })
            .await
        }
        Command::Command { account, command } => {
            with_client(account, |client| async move { client.send_command(command).await }).await
        }
        Command::Mqtt { config } => run_mqtt(AdapterConfig::load(config)?).await,
        Command::Ifttt { config } => run_ifttt(AdapterConfig::load(config)?).await,
    }
}

async fn with_client<F, Fut>(account: Account, op: F) -> indego_lib::Result<()>
where
    F: FnOnce(Arc<IndegoClient>) -> Fut,
    Fut: Future<Output = indego_lib::Result<()>>,
{
    let config = ClientConfig::new(account.username, account.password).with_base_url(account.base_url);
    let client = Arc::new(IndegoClient::new(config));
    client.connect().await?;
    let result = op(client.clone()).await;
    client.disconnect().await;
    result
}

async fn run_mqtt(config: AdapterConfig) -> indego_lib::Result<()> {
    let Some(mqtt) = config.mqtt_config()? else {
        return Err(indego_lib::ConfigError::Invalid {
            field: "mqtt".to_string(),
            reason: "section is required".to_string(),
        }
        .into());
    };

    let mailbox = CommandMailbox::new();
    let sink = Arc::new(MqttSink::connect(mqtt, mailbox.clone()).await?);
    let mut engine = PollingEngine::new(config.client_config(), config.engine_config(), sink.clone(), mailbox);

    engine.startup()?;
    wait_for_interrupt().await;
    engine.shutdown().await?;
    sink.disconnect().await;
    Ok(())
}

async fn run_ifttt(config: AdapterConfig) -> indego_lib::Result<()> {
    let (Some(ifttt), Some(section)) = (config.ifttt_config(), config.ifttt.as_ref()) else {
        return Err(indego_lib::ConfigError::Invalid {
            field: "ifttt".to_string(),
            reason: "section is required".to_string(),
        }
        .into());
    };

    let mailbox = CommandMailbox::new();
    let receiver = match (section.receiver_port, section.receiver_secret.as_deref()) {
        (0, _) | (_, None) => None,
        (port, Some(secret)) => Some(CommandReceiver::start(port, secret, mailbox.clone())?),
    };

    let sink = Arc::new(IftttSink::new(ifttt)?);
    let mut engine = PollingEngine::new(config.client_config(), config.engine_config(), sink, mailbox);

    engine.startup()?;
    wait_for_interrupt().await;
    engine.shutdown().await?;
    if let Some(receiver) = receiver {
        receiver.shutdown().await;
    }
    Ok(())
}

async fn wait_for_interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
    }
    tracing::info!("Interrupted, shutting down");
}
