//! `debounced` - CLI for the debounced value primitive
//!
//! This binary debounces stdin lines in real time, replays timed scripts on
//! a virtual clock, and inspects configuration.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;

use debounced::cli::{Cli, Command, ConfigCommand, SimulateCommand, WatchCommand};
use debounced::input::{self, LineOptions};
use debounced::simulate::{self, Script, SimulationOptions};
use debounced::{init_logging, Config, Delay, EqualityMode, Scheduler, TokioScheduler};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    match cli.command {
        Command::Watch(watch_cmd) => handle_watch(&config, &watch_cmd),
        Command::Simulate(simulate_cmd) => handle_simulate(&config, &simulate_cmd),
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

fn handle_watch(config: &Config, cmd: &WatchCommand) -> anyhow::Result<()> {
    let delay = match cmd.delay_ms {
        Some(millis) => Delay::try_from(millis)?,
        None => config.delay()?,
    };
    let equality = cmd
        .equality
        .map_or(config.debounce.equality, EqualityMode::from);
    let options = LineOptions::from_config(delay, equality, &config.input);
    let json = cmd.json;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting runtime")?;

    let summary = runtime.block_on(async {
        let mut scheduler = TokioScheduler::current()?;
        if let Some(limit) = config.scheduler.max_pending_timers {
            scheduler = scheduler.with_max_pending(limit);
        }
        let scheduler: Arc<dyn Scheduler> = Arc::new(scheduler);

        tracing::info!(%delay, %equality, "Watching stdin");
        let stdout = std::io::stdout();
        input::debounce_lines(
            BufReader::new(tokio::io::stdin()),
            options,
            scheduler,
            |settled| {
                let mut out = stdout.lock();
                if json {
                    serde_json::to_writer(&mut out, settled)?;
                    writeln!(out)?;
                } else {
                    writeln!(out, "{}", settled.value)?;
                }
                out.flush()?;
                Ok(())
            },
        )
        .await
    })?;

    tracing::info!(
        lines = summary.lines,
        skipped = summary.skipped,
        settled = summary.settled,
        "Input finished"
    );
    Ok(())
}

fn handle_simulate(config: &Config, cmd: &SimulateCommand) -> anyhow::Result<()> {
    let script: Script = cmd.script.parse()?;
    let options = SimulationOptions {
        delay_ms: cmd.delay_ms.unwrap_or(config.debounce.delay_ms),
        equality: cmd
            .equality
            .map_or(config.debounce.equality, EqualityMode::from),
        until: cmd.until.map(Duration::from_millis),
        max_pending: config.scheduler.max_pending_timers,
    };

    let events = simulate::run(&script, &options)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&events)?);
    } else {
        for event in &events {
            println!("{event}");
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Debounce]");
                println!("  Delay (ms):         {}", config.debounce.delay_ms);
                println!("  Equality:           {}", config.debounce.equality);
                println!();
                println!("[Scheduler]");
                match config.scheduler.max_pending_timers {
                    Some(limit) => println!("  Max pending timers: {limit}"),
                    None => println!("  Max pending timers: unlimited"),
                }
                println!();
                println!("[Input]");
                println!("  Trim lines:         {}", config.input.trim);
                println!("  Skip empty lines:   {}", config.input.skip_empty);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
