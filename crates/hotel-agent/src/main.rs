//! Asks the hotel concierge questions from the terminal, one per line.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::pin::pin;
use std::process::ExitCode;
use std::time::Duration;

use hotel_agent::ConciergeBuilder;
use hotel_agent::config::Config;
use hotel_agent::core::AgentEvent;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::time::sleep;

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    debug!("loaded config: {config:?}");

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let concierge = ConciergeBuilder::from_config(&config)
        .on_event(move |event| {
            event_tx.send(event.clone()).ok();
        })
        .build();

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    let mut lines = io::BufReader::new(io::stdin()).lines();
    'outer: loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let line = select! {
            line = lines.next_line() => line,
            _ = signal::ctrl_c() => break,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                error!("error reading input: {err}");
                break;
            }
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit")
            || question.eq_ignore_ascii_case("quit")
        {
            break;
        }

        let progress_bar = ProgressBar::new_spinner();
        progress_bar.set_style(progress_style.clone());
        progress_bar.set_message("🤔 Thinking...");

        let mut ask = pin!(concierge.ask(question));
        let outcome = loop {
            progress_bar.inc(1);
            select! {
                outcome = &mut ask => break outcome,
                Some(event) = event_rx.recv() => {
                    progress_bar.suspend(|| print_event(&event));
                    if let AgentEvent::ToolCallStarted { name, .. } = &event {
                        progress_bar.set_message(format!("🔧 Running {name}..."));
                    }
                }
                _ = signal::ctrl_c() => {
                    progress_bar.finish_and_clear();
                    break 'outer;
                }
                _ = sleep(Duration::from_millis(100)) => {}
            }
        };
        progress_bar.finish_and_clear();

        // Events sent right before the session ended.
        while let Ok(event) = event_rx.try_recv() {
            print_event(&event);
        }

        let reply = outcome.reply();
        match &outcome.result {
            Ok(_) => println!("{}🏨 {}", BAR_CHAR.bright_cyan(), reply.bright_white()),
            Err(err) => {
                error!("session failed: {err}");
                println!("{}{}", BAR_CHAR.bright_red(), reply.red());
            }
        }
        println!();
    }
    ExitCode::SUCCESS
}

fn print_event(event: &AgentEvent) {
    match event {
        AgentEvent::ModelRequested { .. } => {}
        AgentEvent::ToolCallStarted { name, arguments } => {
            println!(
                "{}🔧 {} {}",
                BAR_CHAR.bright_yellow(),
                name.bright_white().bold(),
                arguments.dimmed()
            );
        }
        AgentEvent::ToolCallFinished { name, succeeded } => {
            if !*succeeded {
                println!("{}⚠️  {name} failed", BAR_CHAR.bright_yellow());
            }
        }
    }
}
