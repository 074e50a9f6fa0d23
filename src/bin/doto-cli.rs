use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use doto::http::EventForm;

/// Creates or removes scheduled notifications on a running doto service.
#[derive(Debug, Parser)]
#[command(name = "doto-cli", version)]
struct Args {
    /// Base URL of the service API.
    #[arg(long, default_value = "http://localhost:5000")]
    url: String,

    /// Telegram chat id to notify.
    #[arg(long)]
    chat: String,

    /// When to send the message, RFC 3339 (2030-01-02T09:00:00+02:00).
    #[arg(long, value_parser = parse_date)]
    date: DateTime<Utc>,

    /// Message to send.
    #[arg(long, default_value = "")]
    msg: String,

    #[arg(long, default_value = "")]
    title: String,

    /// Remove the existing event for this chat and date instead of creating one.
    #[arg(long)]
    rm: bool,
}

fn parse_date(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|date| date.with_timezone(&Utc))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::formatted_builder()
        .parse_filters(&std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_owned()))
        .init();

    let args = Args::parse();

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    let form = EventForm {
        chat_id: args.chat,
        timestamp: args.date,
        title: args.title,
        description: args.msg,
    };

    let endpoint = format!("{}/event", args.url.trim_end_matches('/'));
    let request = if args.rm {
        client.delete(&endpoint)
    } else {
        client.post(&endpoint)
    };

    log::debug!("Send command to ({}): {:?}", form.chat_id, form);

    let response = request
        .json(&form)
        .send()
        .await
        .with_context(|| format!("Request to {endpoint} failed"))?;

    let status = response.status();
    let body = response.text().await?;
    log::debug!("Response for request: {body}");

    anyhow::ensure!(status.is_success(), "Response code is not ok: {status}, {body}");

    log::info!("Command executed successfully");
    Ok(())
}
