use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use autoupdater::{Config, UpdateEvent, UpdateOrchestrator, UpdateOutcome, UpdateState};

#[derive(Parser, Debug)]
#[command(name = "autoupdater")]
#[command(about = "Check for a newer release and install it", long_about = None)]
struct Cli {
    /// Only report whether an update is available
    #[arg(long)]
    check: bool,

    /// Config file (defaults to <config dir>/autoupdater/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Release feed URL
    #[arg(long)]
    feed_url: Option<String>,

    /// Installation directory
    #[arg(long, value_name = "DIR")]
    install_dir: Option<PathBuf>,

    /// Name of the application process to stop before installing
    #[arg(long)]
    process_name: Option<String>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.no_color {
        colored::control::set_override(false);
    }

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        // already rendered as a status line and logged with its cause
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{} {:#}", "✗".red(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(url) = &cli.feed_url {
        config.feed_url = url.clone();
    }
    if let Some(dir) = &cli.install_dir {
        config.install_dir = dir.clone();
    }
    if let Some(name) = &cli.process_name {
        config.process_name = name.clone();
    }
    Ok(config)
}

/// `Ok(false)` means the update run itself failed
fn run(cli: Cli) -> Result<bool> {
    let config = load_config(&cli)?;
    let orchestrator =
        UpdateOrchestrator::from_config(&config).context("Failed to set up updater")?;

    if cli.check {
        run_check(&orchestrator).map(|_| true)
    } else {
        run_update(orchestrator)
    }
}

fn run_check(orchestrator: &UpdateOrchestrator) -> Result<()> {
    println!("{}", UpdateState::CheckingForUpdates.label().cyan());
    let plan = orchestrator.check()?;

    if plan.needs_update {
        println!(
            "{} New version available: {} → {}",
            "↑".yellow(),
            plan.installed_version.dimmed(),
            plan.target_version.green()
        );
        if let Some(asset) = &plan.chosen_asset {
            println!("  {}", asset.name.dimmed());
        }
    } else {
        println!(
            "{} Already up to date ({})",
            "✓".green(),
            plan.installed_version
        );
    }
    Ok(())
}

/// Run the update on a worker thread and render its events here
fn run_update(orchestrator: UpdateOrchestrator) -> Result<bool> {
    let (tx, rx) = mpsc::channel::<UpdateEvent>();
    let worker = thread::spawn(move || orchestrator.run(&tx));

    let mut bar: Option<ProgressBar> = None;
    for event in rx {
        match event {
            UpdateEvent::State(state) => {
                if let Some(pb) = bar.take() {
                    pb.finish_and_clear();
                }
                render_state(state);
            }
            UpdateEvent::DownloadProgress { downloaded, total } => {
                let pb = bar.get_or_insert_with(|| new_progress_bar(total));
                pb.set_position(downloaded);
            }
        }
    }
    if let Some(pb) = bar {
        pb.finish_and_clear();
    }

    let outcome = match worker
        .join()
        .map_err(|_| anyhow!("update worker panicked"))?
    {
        Ok(outcome) => outcome,
        Err(_) => return Ok(false),
    };

    match outcome {
        UpdateOutcome::Updated { from, to } => {
            println!("  {} → {}", from.dimmed(), to.green());
        }
        UpdateOutcome::UpToDate { version } => {
            println!("  {}", version.dimmed());
        }
    }
    Ok(true)
}

fn render_state(state: UpdateState) {
    let label = state.label();
    if !state.is_terminal() {
        println!("{}", label.cyan());
    } else if state == UpdateState::Failed {
        println!("{} {}", "✗".red(), label.red());
    } else {
        println!("{} {}", "✓".green(), label.green());
    }
}

fn new_progress_bar(total: Option<u64>) -> ProgressBar {
    match total {
        Some(len) => {
            let pb = ProgressBar::new(len);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {bytes}") {
                pb.set_style(style);
            }
            pb
        }
    }
}
