//! `think-tank`: unattended idea generation against a local model server.
//!
//! Runs a generator/reviewer loop until the idea quota, runtime budget or
//! saturation stops it. State lives in `.loop_state.json` so an interrupted
//! run picks up where it left off.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use thinktank::core::types::StopReason;
use thinktank::cycle::CycleEvent;
use thinktank::error::ConfigError;
use thinktank::exit_codes;
use thinktank::io::completion::{OpenAiClient, list_models, resolve_model};
use thinktank::io::config::{
    ConfigOverrides, DEFAULT_CONFIG_FILE, ThinkTankConfig, load_config, write_config,
};
use thinktank::io::idea_store::IdeaDir;
use thinktank::io::index_store::{IndexStore, MarkdownIndex};
use thinktank::io::interrupt::Interrupt;
use thinktank::io::loop_state::load_loop_state;
use thinktank::io::task::{TASK_TEMPLATE, format_task, read_task, write_task};
use thinktank::looping::{LoopConfig, LoopEvent, LoopOutcome, run_loop};
use thinktank::report::{format_elapsed, render_status};
use thinktank::start::prepare_stores;

#[derive(Parser)]
#[command(
    name = "think-tank",
    version,
    about = "Unattended divergent idea generation with a generator and a reviewer"
)]
struct Cli {
    /// Config file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run (or resume) the idea loop.
    Run(RunArgs),
    /// Write a default `think-tank.toml` and a task template.
    Init {
        /// Overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },
    /// Turn a plain description into a structured task file.
    FormatTask {
        /// Description text, or `-` to read stdin.
        text: String,
        /// Where to write the task (defaults to the configured task file).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Overwrite an existing task file.
        #[arg(short, long)]
        force: bool,
    },
    /// Print the persisted loop state.
    Status,
    /// List accepted ideas in acceptance order.
    Ideas,
    /// List model ids served by the backend.
    Models {
        #[arg(long)]
        base_url: Option<String>,
    },
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Task description file.
    task_file: Option<PathBuf>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    max_ideas: Option<u32>,
    #[arg(long = "max-hours")]
    max_hours: Option<f64>,
    /// Attempts per cycle.
    #[arg(long)]
    max_retries: Option<u32>,
    /// Exhausted cycles in a row before stopping as saturated.
    #[arg(long = "max-failures")]
    max_failures: Option<u32>,
    #[arg(long)]
    ideas_dir: Option<PathBuf>,
}

impl RunArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            task_file: self.task_file.clone(),
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            max_ideas: self.max_ideas,
            max_runtime_hours: self.max_hours,
            max_retries: self.max_retries,
            max_consecutive_failures: self.max_failures,
            ideas_dir: self.ideas_dir.clone(),
        }
    }
}

fn main() {
    thinktank::logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(exit_code_for(&err));
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<ConfigError>().is_some() {
        exit_codes::CONFIG
    } else {
        exit_codes::ERROR
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => cmd_run(&cli.config, &args),
        Command::Init { force } => cmd_init(&cli.config, force).map(|()| exit_codes::OK),
        Command::FormatTask { text, output, force } => {
            cmd_format_task(&cli.config, &text, output, force).map(|()| exit_codes::OK)
        }
        Command::Status => cmd_status(&cli.config).map(|()| exit_codes::OK),
        Command::Ideas => cmd_ideas(&cli.config).map(|()| exit_codes::OK),
        Command::Models { base_url } => cmd_models(&cli.config, base_url).map(|()| exit_codes::OK),
    }
}

/// Load the config file, apply overrides and anchor relative paths at the cwd.
fn resolved_config(config_path: &Path, overrides: &ConfigOverrides) -> Result<ThinkTankConfig> {
    let cwd = std::env::current_dir().context("resolve working directory")?;
    let cfg = load_config(config_path)?.with_overrides(overrides)?;
    Ok(cfg.resolve_paths(&cwd))
}

fn cmd_run(config_path: &Path, args: &RunArgs) -> Result<i32> {
    let cfg = resolved_config(config_path, &args.overrides())?;
    let task = read_task(&cfg.paths.task_file)?;
    let model = resolve_model(&cfg.backend)?;
    let client = OpenAiClient::new(&cfg.backend, model)?;

    let index = MarkdownIndex::new(&cfg.paths.index_file);
    let ideas = IdeaDir::new(&cfg.paths.ideas_dir);
    prepare_stores(&index, &ideas)?;

    let interrupt = Interrupt::new();
    interrupt.install_ctrl_c();

    let limits = cfg.limits();
    println!("think-tank");
    println!("  model      : {}", client.model());
    println!("  task       : {}", cfg.paths.task_file.display());
    println!(
        "  limits     : {} ideas, {}h, {} retries, {} failures",
        limits.max_ideas,
        limits.max_runtime_hours,
        limits.max_retries,
        limits.max_consecutive_failures
    );

    let loop_config = LoopConfig {
        task,
        limits,
        generator: cfg.generator_role(),
        reviewer: cfg.reviewer_role(),
        state_path: cfg.paths.state_file.clone(),
    };
    let outcome = run_loop(
        &loop_config,
        &client,
        &index,
        &ideas,
        &interrupt,
        print_event,
    )
    .context("idea loop failed")?;

    print_summary(&outcome, &cfg);
    Ok(match outcome.stop {
        StopReason::IdeaSpaceSaturated => exit_codes::SATURATED,
        _ => exit_codes::OK,
    })
}

fn print_event(event: LoopEvent) {
    match event {
        LoopEvent::Resumed { deployed, cycles } => {
            println!("resuming: {deployed} ideas deployed over {cycles} cycles");
        }
        LoopEvent::CycleStarted { cycle } => println!("\ncycle {cycle}"),
        LoopEvent::Cycle { event, .. } => match event {
            CycleEvent::Phase { attempt, phase } => {
                println!("  [{}] attempt {attempt}", phase.as_str());
            }
            CycleEvent::Candidate { title, .. } => println!("  candidate: {title}"),
            CycleEvent::Misfire { attempt, reason } => {
                println!("  [MISFIRE] attempt {attempt}: {reason}");
            }
            CycleEvent::Deployed { slug, summary } => {
                println!("  [DEPLOYED] {slug}: {summary}");
            }
            CycleEvent::Exhausted { attempts } => {
                println!("  [EXHAUSTED] no idea accepted after {attempts} attempts");
            }
        },
        LoopEvent::Sleeping {
            seconds,
            consecutive_failures,
        } => {
            println!("sleeping {seconds}s ({consecutive_failures} consecutive failures)");
        }
        LoopEvent::Stopped { reason } => println!("\nstopped: {reason}"),
    }
}

fn print_summary(outcome: &LoopOutcome, cfg: &ThinkTankConfig) {
    let state = &outcome.state;
    println!("\nsummary");
    println!("  deployed   : {}", state.deployed_count);
    println!("  misfires   : {}", state.misfire_count);
    println!("  cycles     : {} ({} this session)", state.cycle_count, outcome.cycles_run);
    println!("  runtime    : {}", format_elapsed(state.started_at, state.last_updated));
    println!("  ideas dir  : {}", cfg.paths.ideas_dir.display());
    println!("  index      : {}", cfg.paths.index_file.display());
    println!("  stop reason: {}", outcome.stop);
}

fn cmd_init(config_path: &Path, force: bool) -> Result<()> {
    let cfg = ThinkTankConfig::default();
    if force || !config_path.exists() {
        write_config(config_path, &cfg)
            .with_context(|| format!("write {}", config_path.display()))?;
        println!("wrote {}", config_path.display());
    } else {
        println!("{} exists; keeping it", config_path.display());
    }
    let task_path = &cfg.paths.task_file;
    if force || !task_path.exists() {
        write_task(task_path, TASK_TEMPLATE, true)?;
        println!("wrote {}", task_path.display());
    } else {
        println!("{} exists; keeping it", task_path.display());
    }
    Ok(())
}

fn cmd_format_task(
    config_path: &Path,
    text: &str,
    output: Option<PathBuf>,
    force: bool,
) -> Result<()> {
    let cfg = resolved_config(config_path, &ConfigOverrides::default())?;
    let description = if text == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read description from stdin")?;
        buf
    } else {
        text.to_string()
    };
    if description.trim().is_empty() {
        return Err(ConfigError::Invalid("task description is empty".to_string()).into());
    }
    let output = output.unwrap_or_else(|| cfg.paths.task_file.clone());
    if !force && output.exists() {
        anyhow::bail!("{} already exists (pass --force to overwrite)", output.display());
    }

    let model = resolve_model(&cfg.backend)?;
    let client = OpenAiClient::new(&cfg.backend, model)?;
    let task = format_task(&client, &description).context("format task description")?;
    write_task(&output, &task, force)?;
    println!("wrote {}", output.display());
    Ok(())
}

fn cmd_status(config_path: &Path) -> Result<()> {
    let cfg = resolved_config(config_path, &ConfigOverrides::default())?;
    match load_loop_state(&cfg.paths.state_file)? {
        Some(state) => println!("{}", render_status(&state, &cfg.limits(), Utc::now())),
        None => println!("no run yet ({} not found)", cfg.paths.state_file.display()),
    }
    Ok(())
}

fn cmd_ideas(config_path: &Path) -> Result<()> {
    let cfg = resolved_config(config_path, &ConfigOverrides::default())?;
    let entries = MarkdownIndex::new(&cfg.paths.index_file).read_all()?;
    if entries.is_empty() {
        println!("no ideas yet");
    }
    for (position, entry) in entries.iter().enumerate() {
        println!("{:>3}. {}", position + 1, entry.to_line().trim_start_matches("- "));
    }
    Ok(())
}

fn cmd_models(config_path: &Path, base_url: Option<String>) -> Result<()> {
    let overrides = ConfigOverrides {
        base_url,
        ..ConfigOverrides::default()
    };
    let cfg = resolved_config(config_path, &overrides)?;
    let timeout = Duration::from_secs(cfg.backend.request_timeout_secs);
    let models = list_models(&cfg.backend.base_url, timeout)
        .with_context(|| format!("list models at {}", cfg.backend.base_url))?;
    if models.is_empty() {
        println!("no models loaded");
    }
    for model in models {
        println!("{model}");
    }
    Ok(())
}
