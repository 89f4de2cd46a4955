use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use popform::browser::SystemRunner;
use popform::{
    ActiveSession, MultiSelection, OptionItem, SelectInput, ServerConfig, SingleSelection,
};

/// Ask a question in a popup browser form and print the answer as JSON.
#[derive(Debug, Parser)]
#[command(name = "popform", version, about)]
struct Cli {
    /// An option to offer; pass at least twice.
    #[arg(short, long = "option", value_name = "LABEL", required = true)]
    options: Vec<String>,

    /// Heading shown above the options.
    #[arg(short, long)]
    title: Option<String>,

    /// Longer explanation shown under the title.
    #[arg(short, long)]
    description: Option<String>,

    /// Allow picking several options instead of exactly one.
    #[arg(short, long)]
    multiple: bool,

    /// Offer a free-text "Other" choice.
    #[arg(long)]
    allow_other: bool,

    /// Label for the free-text choice; implies --allow-other.
    #[arg(long, value_name = "LABEL")]
    other_label: Option<String>,

    /// Print the form URL instead of opening a browser.
    #[arg(long)]
    no_open: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ServerConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let input = SelectInput {
        options: cli.options.iter().map(|label| OptionItem::from(label.as_str())).collect(),
        title: cli.title,
        description: cli.description,
        allow_other: cli.allow_other || cli.other_label.is_some(),
        other_label: cli.other_label,
    };

    let form = if cli.multiple {
        popform::tools::multi_select_config(&input)?
    } else {
        popform::tools::single_select_config(&input)?
    };

    let session = ActiveSession::bind(form, &config).await?;
    if cli.no_open {
        println!("{}", session.url());
    } else {
        session.launch_browser(Arc::new(SystemRunner));
    }

    let closer = session.closer();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted; closing the form session");
            closer.force_close();
        }
    });

    let response = session.await_response().await?;
    let rendered = if cli.multiple {
        serde_json::to_string_pretty(&MultiSelection::from(response))
    } else {
        serde_json::to_string_pretty(&SingleSelection::from(response))
    }
    .context("failed to encode the response")?;
    println!("{rendered}");
    Ok(())
}
