use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use client_core::{
    config::load_settings, normalize, DispatchError, DispatchSession, ModeRegistry,
    NoCredentialBackend, SessionGate, SubmitReport,
};
use shared::domain::{FieldName, Mode};
use tracing_subscriber::EnvFilter;

mod render;

#[derive(Parser, Debug)]
#[command(about = "Send a request to one of the assistant endpoints")]
struct Args {
    /// Overrides `base_url` from dispatcher.toml and the environment.
    #[arg(long, global = true)]
    base_url: Option<String>,
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the supported modes.
    Modes,
    /// Run one submit cycle and print the result.
    Submit(SubmitArgs),
}

#[derive(ClapArgs, Debug)]
struct SubmitArgs {
    #[arg(long)]
    mode: String,
    #[arg(long)]
    sender: Option<String>,
    #[arg(long)]
    subject: Option<String>,
    #[arg(long)]
    body: Option<String>,
    #[arg(long)]
    query: Option<String>,
    /// Print the normalized record as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    match args.command {
        Command::Modes => {
            print!("{}", render::render_catalog(&ModeRegistry::builtin()));
            Ok(())
        }
        Command::Submit(submit) => {
            let mut settings = load_settings();
            if let Some(base_url) = args.base_url {
                settings.base_url = base_url;
            }
            if let Some(timeout_secs) = args.timeout_secs {
                settings.request_timeout_secs = timeout_secs;
            }
            run_submit(submit, &settings).await
        }
    }
}

async fn run_submit(args: SubmitArgs, settings: &client_core::config::Settings) -> Result<()> {
    let mode: Mode = args.mode.parse()?;
    let identity = SessionGate::new(NoCredentialBackend).continue_as_guest();
    let session = DispatchSession::new(identity, settings)?;
    tracing::debug!(%mode, base_url = %settings.base_url, "opened guest session");

    session.select_mode(mode).await;
    for (field, value) in [
        (FieldName::Sender, args.sender),
        (FieldName::Subject, args.subject),
        (FieldName::Body, args.body),
        (FieldName::UserQuery, args.query),
    ] {
        let Some(value) = value else {
            continue;
        };
        match session.edit_field(field, value).await {
            Ok(()) => {}
            Err(DispatchError::FieldNotInMode { .. }) => {
                bail!("--{} is not used by {mode}", cli_flag(field));
            }
            Err(err) => return Err(err.into()),
        }
    }

    let report = match session.submit().await {
        Ok(report) => report,
        Err(err @ DispatchError::Validation { .. }) => {
            for field in err.missing_fields() {
                eprintln!("--{}: required for {mode}", cli_flag(*field));
            }
            bail!(err);
        }
        Err(err) => return Err(err.into()),
    };

    let SubmitReport::Applied(resolution) = report else {
        bail!("request was superseded before it resolved");
    };

    if args.json {
        let record = normalize(&resolution.result);
        let output = serde_json::json!({
            "succeeded": resolution.succeeded,
            "notice": resolution.notice,
            "record": record,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("failed to encode record")?
        );
    } else {
        print!("{}", render::render_resolution(&resolution));
    }
    Ok(())
}

fn cli_flag(field: FieldName) -> &'static str {
    match field {
        FieldName::Sender => "sender",
        FieldName::Subject => "subject",
        FieldName::Body => "body",
        FieldName::UserQuery => "query",
    }
}
