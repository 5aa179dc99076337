use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use paperfetch_core::config_file;
use paperfetch_core::{
    Config, Credentials, DriverEvent, HttpPdfSource, LikedPapers, RunOptions, Session,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod output;

use output::ColorMode;

/// Download the papers you liked in Confer from the published proceedings
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Confer user name (will prompt if missing)
    #[arg(short = 'u', long = "user")]
    user: Option<String>,

    /// Confer password (will prompt if missing)
    #[arg(short = 'p', long)]
    password: Option<String>,

    /// Directory where to put papers [default: ./papers]
    #[arg(short = 'd', long)]
    directory: Option<PathBuf>,

    /// Extra TOML config file, applied over the default config locations
    #[arg(long)]
    config: Option<PathBuf>,

    /// Match liked papers against the proceedings without downloading
    #[arg(long)]
    dry_run: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing();

    // Resolve configuration: CLI flags > env vars > config files > defaults
    let file = match &cli.config {
        Some(path) => {
            let extra = config_file::load_from_path(path)
                .with_context(|| format!("Could not read config file {}", path.display()))?;
            config_file::merge(config_file::load_config(), extra)
        }
        None => config_file::load_config(),
    };
    let mut config = Config::from_file(&file)?;
    if let Some(dir) = cli.directory {
        config.download_dir = dir;
    }
    tracing::debug!(?config, "resolved configuration");

    let user = match cli
        .user
        .or_else(|| std::env::var("CONFER_USER").ok())
        .or_else(|| config.user.clone())
    {
        Some(user) => user,
        None => dialoguer::Input::<String>::new()
            .with_prompt("User")
            .interact_text()?,
    };
    let password = match cli
        .password
        .or_else(|| std::env::var("CONFER_PASSWORD").ok())
    {
        Some(password) => password,
        None => dialoguer::Password::new()
            .with_prompt("Password")
            .interact()?,
    };
    let credentials = Credentials { user, password };

    let color = ColorMode(!cli.no_color);
    run(config, credentials, cli.dry_run, color).await
}

async fn run(
    config: Config,
    credentials: Credentials,
    dry_run: bool,
    color: ColorMode,
) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();

    let session = Session::login(&config, &credentials)
        .await
        .context("Login failed")?;

    let catalog = paperfetch_core::load_catalog(&session, &config.proceedings_url)
        .await
        .with_context(|| format!("Could not read proceedings from {}", config.proceedings_url))?;
    let likes = paperfetch_core::likes::fetch_likes(&session)
        .await
        .context("Could not read liked papers")?;
    let papers = paperfetch_core::likes::fetch_papers(&session)
        .await
        .context("Could not read conference papers")?;
    let liked = LikedPapers { likes, papers };

    output::print_run_header(
        &mut stdout,
        &config.proceedings_url,
        catalog.len(),
        liked.likes.len(),
        &config.download_dir,
        dry_run,
        color,
    )?;

    let bar = ProgressBar::new(liked.likes.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:40.cyan/dim}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    let progress_cb = {
        let bar = bar.clone();
        move |event: DriverEvent| {
            bar.suspend(|| {
                let mut out = std::io::stdout().lock();
                let _ = output::print_event(&mut out, &event, color);
                let _ = out.flush();
            });
            match &event {
                DriverEvent::Skipped { .. } | DriverEvent::Fetched { .. } => bar.inc(1),
                DriverEvent::Resolved { resolution, .. } => {
                    bar.set_message(resolution.best_entry.title.clone());
                    // No fetch follows in a dry run
                    if dry_run {
                        bar.inc(1);
                    }
                }
            }
        }
    };

    let cancel = CancellationToken::new();

    // Set up Ctrl+C handler
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_clone.cancel();
        }
    });

    let source = HttpPdfSource::new(&session);
    let options = RunOptions::new(&config, dry_run);
    let summary = paperfetch_core::download_liked_papers(
        &liked,
        &catalog,
        &source,
        &options,
        progress_cb,
        &cancel,
    )
    .await?;
    bar.finish_and_clear();

    writeln!(stdout)?;
    output::print_failures(&mut stdout, &summary, color)?;
    output::print_summary(&mut stdout, &summary, dry_run, color)?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
