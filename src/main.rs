use anyhow::{bail, Context, Result};
use forwarder_config::config::{load_config, PublisherConfig};
use forwarder_config::ConfigPublisher;
use tracing::info;

const USAGE: &str = "usage: forwarder-config <add|remove> <PV>... | forwarder-config exit";

#[derive(Debug, PartialEq)]
enum Command<'a> {
    Add(&'a [String]),
    Remove(&'a [String]),
    Exit,
}

/// Parse the arguments after the program name; nothing is sent on error.
fn parse_command(args: &[String]) -> Result<Command<'_>> {
    let Some((command, identifiers)) = args.split_first() else {
        bail!(USAGE);
    };

    match command.as_str() {
        "add" | "remove" if identifiers.is_empty() => {
            bail!("{} needs at least one PV\n{}", command, USAGE)
        }
        "add" => Ok(Command::Add(identifiers)),
        "remove" => Ok(Command::Remove(identifiers)),
        "exit" if identifiers.is_empty() => Ok(Command::Exit),
        "exit" => bail!("exit takes no arguments\n{}", USAGE),
        other => bail!("unknown command '{}'\n{}", other, USAGE),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forwarder_config=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_command(&args)?;

    let config = match std::env::var("FORWARDER_CONFIG_FILE") {
        Ok(path) => load_config(&path)?,
        Err(_) => PublisherConfig::default(),
    };

    info!(
        server = %config.nats.url,
        config_topic = %config.topics.config_topic,
        data_topic = %config.topics.data_topic,
        "Configuration loaded"
    );

    // Fatal broker errors end the process here with a non-zero exit.
    let publisher = ConfigPublisher::from_config(&config)
        .await
        .context("Failed to set up config publisher")?;

    match command {
        Command::Add(identifiers) => publisher.announce_add(identifiers).await?,
        Command::Remove(identifiers) => publisher.announce_remove(identifiers).await?,
        Command::Exit => publisher.announce_exit().await?,
    }

    publisher.close().await.context("Failed to flush config publisher")?;
    Ok(())
}
