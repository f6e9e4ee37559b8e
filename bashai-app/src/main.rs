use anyhow::{Context, Result};
use bashai_app::config::AppConfig;
use bashai_app::{render, repl, Session};
use bashai_core::ControllerState;
use bashai_memory::HistoryStore;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Translate natural-language requests into shell commands, run them, and
/// retry with the error output when they fail.
#[derive(Parser)]
#[command(name = "bashai", author, version, about, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Request to run; starts interactive mode when omitted
    #[arg(trailing_var_arg = true, value_name = "REQUEST")]
    request: Vec<String>,

    /// Run commands that need confirmation without asking
    #[arg(short, long)]
    yes: bool,

    /// Skip the safety classifier for this run
    #[arg(long)]
    no_safe_mode: bool,

    /// Override the retry budget for this run
    #[arg(long, value_name = "N")]
    max_retries: Option<u32>,

    /// Offer to open the search fallback in a browser
    #[arg(long)]
    open_search: bool,

    /// Print session counters before exiting
    #[arg(long)]
    stats: bool,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect or change the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show recent requests and the commands they ran
    History {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
        /// Delete the stored history
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Show,
    Set { key: String, value: String },
    Reset,
    Path,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("BASHAI_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = AppConfig::default_path()?;
    let mut config = AppConfig::load_from(&config_path);

    match cli.command {
        Some(Commands::Config { action }) => return handle_config(action, config, &config_path),
        Some(Commands::History { limit, clear }) => {
            let store = HistoryStore::new(AppConfig::history_path()?, config.max_history);
            if clear {
                store.clear().await?;
                println!("{}", render::ui_success("History cleared."));
            } else {
                print!("{}", render::render_history(&store.recent(limit).await?));
            }
            return Ok(());
        }
        None => {}
    }

    config.apply_env();
    if cli.yes {
        config.auto_execute = true;
    }
    if cli.no_safe_mode {
        config.safe_mode = false;
    }
    if let Some(max_retries) = cli.max_retries {
        config.max_retries = max_retries;
    }
    if let Err(e) = config.validate() {
        eprintln!("{} {:#}", render::ui_danger("❌ Invalid configuration:"), e);
        eprintln!("💡 Tip: Run 'bashai config reset' to restore defaults");
        return Err(e);
    }
    if !config.safe_mode {
        eprintln!("{}", render::ui_warn("⚠️  Safe mode is off: commands run without safety checks"));
    }

    let history = HistoryStore::new(AppConfig::history_path()?, config.max_history);
    let session = Session::build(&config, history, cli.open_search)
        .await
        .context("Failed to start session")?;

    let outcome = if cli.request.is_empty() {
        repl::run(&session).await.map(|_| true)
    } else {
        let report = session.handle(&cli.request.join(" ")).await;
        Ok(report.state == ControllerState::Succeeded)
    };

    if cli.stats {
        print!("{}", render::render_stats(&session.metrics().snapshot()));
    }

    if !outcome? {
        std::process::exit(1);
    }
    Ok(())
}

fn handle_config(action: ConfigAction, mut config: AppConfig, path: &std::path::Path) -> Result<()> {
    match action {
        ConfigAction::Show => println!("{}", config.display_json()?),
        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            config.save_to(path)?;
            println!("{} {} updated", render::ui_success("✓"), key);
        }
        ConfigAction::Reset => {
            AppConfig::default().save_to(path)?;
            println!("{} Configuration reset to defaults", render::ui_success("✓"));
        }
        ConfigAction::Path => println!("{}", path.display()),
    }
    Ok(())
}
