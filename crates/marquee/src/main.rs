use std::io::{IsTerminal, Write};
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use marquee_core::show::ShowManager;
use marquee_core::{
    discover_outputs, ConfigManager, ScheduleRunner, SchedulerCommand, SchedulerEvent,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Runs lighting playlists to a schedule across E1.31, Art-Net and serial
/// outputs.
#[derive(Parser, Debug)]
#[command(name = "marquee")]
#[command(about = "Marquee show scheduler")]
struct Args {
    /// Show directory holding networks.json and schedule.json
    #[arg(long)]
    show_dir: Option<PathBuf>,

    /// Settings file (default: config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Start with output to the lights turned off
    #[arg(long)]
    no_output: bool,

    /// Log filter such as "debug" or "marquee_core=trace"
    #[arg(long)]
    log_level: Option<String>,

    /// Look for Art-Net and E1.31 controllers and add them to the output list
    #[arg(long)]
    discover: bool,

    /// Exit if any output fails to open instead of asking
    #[arg(long)]
    require_all_outputs: bool,
}

fn init_logging(level: Option<&str>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = level {
        builder.parse_filters(level);
    }
    builder.init();
}

/// Read commands from stdin, one per line:
/// `Command name|parameters`, `?QueryName|parameters`, `integrity` or `quit`
fn parse_line(line: &str) -> Option<SchedulerCommand> {
    let line = line.trim();
    match line {
        "" => None,
        "quit" | "exit" => Some(SchedulerCommand::Shutdown),
        "integrity" => Some(SchedulerCommand::CheckIntegrity),
        _ => {
            let (name, parameters) = line.split_once('|').unwrap_or((line, ""));
            match name.strip_prefix('?') {
                Some(query) => Some(SchedulerCommand::Query {
                    query: query.trim().to_string(),
                    parameters: parameters.to_string(),
                    ip: "127.0.0.1".to_string(),
                }),
                None => Some(SchedulerCommand::action(name.trim(), parameters)),
            }
        }
    }
}

/// Ask whether to carry on when some outputs did not open
fn confirm_continue(failed: &[(String, String)]) -> anyhow::Result<bool> {
    for (output, reason) in failed {
        println!("Output {} failed to open: {}", output, reason);
    }
    print!("Continue without them? [Y/n] ");
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(accepts(&answer))
}

fn accepts(answer: &str) -> bool {
    !matches!(answer.trim().to_lowercase().as_str(), "n" | "no")
}

fn print_event(event: &SchedulerEvent) {
    match event {
        SchedulerEvent::Started {
            outputs,
            channels,
            outputting,
        } => println!(
            "Scheduler running: {} outputs, {} channels, output to lights {}",
            outputs,
            channels,
            if *outputting { "on" } else { "off" }
        ),
        SchedulerEvent::ActionCompleted { command, result } => {
            if result.success {
                println!("{}: ok", command);
            } else {
                println!("{}: {}", command, result.message);
            }
        }
        SchedulerEvent::QueryAnswered { query, result } => {
            if result.success {
                println!("{}: {}", query, result.data);
            } else {
                println!("{}: {}", query, result.message);
            }
        }
        SchedulerEvent::Integrity { report } => {
            for line in &report.lines {
                println!("{}", line);
            }
            println!("{} errors, {} warnings", report.errors, report.warnings);
        }
        SchedulerEvent::OutputsFailed { failed } => {
            for (output, reason) in failed {
                println!("Output {} failed to open: {}", output, reason);
            }
        }
        SchedulerEvent::Error { message } => println!("Error: {}", message),
        SchedulerEvent::ShutdownComplete => println!("Scheduler stopped"),
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    init_logging(args.log_level.as_deref());

    let mut config = ConfigManager::new(args.config.clone());
    let mut settings = config
        .load()
        .with_context(|| format!("Failed to load {}", config.config_path().display()))?;
    if let Some(show_dir) = args.show_dir {
        settings.show_dir = show_dir;
    }
    if args.no_output {
        settings.output_on_start = false;
    }

    if args.discover {
        let show = ShowManager::new(&settings.show_dir);
        let outputs = show.load_outputs();
        let added = discover_outputs(&outputs, &settings);
        println!("Discovery added {} outputs", added);
        if added > 0 {
            outputs.save(&show.networks_path())?;
        }
    }

    let mut runner = ScheduleRunner::open(settings.clone())?;

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    if settings.output_on_start {
        let report = runner.start_output();
        if !report.failed.is_empty() {
            if args.require_all_outputs {
                bail!("{} outputs failed to open", report.failed.len());
            }
            if std::io::stdin().is_terminal() {
                if !confirm_continue(&report.failed)? {
                    bail!("Stopped at start with {} outputs failed", report.failed.len());
                }
            } else {
                let _ = event_tx.send(SchedulerEvent::OutputsFailed {
                    failed: report.failed,
                });
            }
        }
    }

    let report = runner.manager().check_schedule_integrity();
    if report.errors > 0 {
        log::warn!(
            "Show has {} integrity errors, send 'integrity' for details",
            report.errors
        );
    }

    let (command_tx, command_rx) = mpsc::unbounded_channel();

    let stdin_tx = command_tx.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let Some(command) = parse_line(&line) else {
                continue;
            };
            let shutdown = command == SchedulerCommand::Shutdown;
            if stdin_tx.send(command).is_err() || shutdown {
                break;
            }
        }
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupted");
            let _ = command_tx.send(SchedulerCommand::Shutdown);
        }
    });

    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            print_event(&event);
            if event == SchedulerEvent::ShutdownComplete {
                break;
            }
        }
    });

    runner.run(command_rx, event_tx).await?;
    let _ = printer.await;
    Ok(())
}
