use std::process::ExitCode;

use dotenvy::dotenv;
use ids_console::{Config, ConnectionState, MonitorSession, ReconnectPolicy};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{sleep_until, Instant};
use tracing::{error, info, warn};

const DEFAULT_LIST_ROWS: usize = 20;

const HELP: &str = "\
commands:
  list [n]          most recent events (default 20)
  select <index>    inspect an event from the list
  detail            show the selected event
  clear             drop the selection
  start [interval]  start the attack simulator (seconds between events)
  stop              stop the attack simulator
  send <text>       send a text frame to the feed
  status            connection state and history size
  quit";

#[derive(Debug, PartialEq)]
enum Command {
    List(usize),
    Select(usize),
    Detail,
    Clear,
    Start(Option<f64>),
    Stop,
    Send(String),
    Status,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let number = |what: &str| -> Result<usize, String> {
        rest.parse()
            .map_err(|_| format!("{what} expects a number, got '{rest}'"))
    };
    match word {
        "list" | "ls" if rest.is_empty() => Ok(Command::List(DEFAULT_LIST_ROWS)),
        "list" | "ls" => number("list").map(Command::List),
        "select" | "sel" => number("select").map(Command::Select),
        "detail" | "show" => Ok(Command::Detail),
        "clear" => Ok(Command::Clear),
        "start" if rest.is_empty() => Ok(Command::Start(None)),
        "start" => rest
            .parse()
            .map(|interval| Command::Start(Some(interval)))
            .map_err(|_| format!("start expects seconds, got '{rest}'")),
        "stop" => Ok(Command::Stop),
        "send" if !rest.is_empty() => Ok(Command::Send(rest.to_string())),
        "send" => Err("send expects some text".to_string()),
        "status" => Ok(Command::Status),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        other => Err(format!("unknown command '{other}', try 'help'")),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    // Config aus ENV
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let mut session = match MonitorSession::new(&config) {
        Ok(session) => session,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("IDS console → feed {} / control {}", config.feed_url, config.control_url);
    println!("{HELP}");

    let policy = ReconnectPolicy::from_config(&config);
    let mut attempt: u32 = 0;
    let mut reconnect_at: Option<Instant> = None;
    let mut state_rx = session.subscribe_state();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if let Err(e) = session.connect().await {
        warn!("Initial connect failed: {}", e);
        if config.reconnect {
            reconnect_at = Some(Instant::now() + policy.delay(attempt));
        }
    }

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match parse_command(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => run_command(&session, &config, command).await,
                    Err(msg) => println!("{msg}"),
                },
                Ok(None) => break,
                Err(e) => {
                    error!("stdin: {}", e);
                    break;
                }
            },
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *state_rx.borrow_and_update();
                match state {
                    ConnectionState::Connected => attempt = 0,
                    ConnectionState::Disconnected if config.reconnect && reconnect_at.is_none() => {
                        let delay = policy.delay(attempt);
                        info!("Reconnecting in {:?}", delay);
                        reconnect_at = Some(Instant::now() + delay);
                    }
                    _ => {}
                }
            }
            _ = sleep_until(reconnect_at.unwrap_or_else(Instant::now)), if reconnect_at.is_some() => {
                reconnect_at = None;
                if let Err(e) = session.connect().await {
                    attempt = attempt.saturating_add(1);
                    let delay = policy.delay(attempt);
                    warn!("Reconnect failed ({}), next try in {:?}", e, delay);
                    reconnect_at = Some(Instant::now() + delay);
                }
            }
        }
    }

    session.shutdown().await;
    ExitCode::SUCCESS
}

async fn run_command(session: &MonitorSession, config: &Config, command: Command) {
    match command {
        Command::List(rows) => {
            let snapshot = session.snapshot();
            if snapshot.is_empty() {
                println!("no events yet");
            }
            for (index, event) in snapshot.iter().take(rows).enumerate() {
                println!("{:>3}  {}", index, event.summary_line());
            }
        }
        Command::Select(index) => match session.select_index(index) {
            Some(event) => println!("{}", event.to_pretty_json()),
            None => println!("no event at index {index}"),
        },
        Command::Detail => match session.selected() {
            Some(event) => println!("{}", event.to_pretty_json()),
            None => println!("Select an event"),
        },
        Command::Clear => session.clear_selection(),
        // Simulator-Befehle laufen im Hintergrund, der Feed wird nicht blockiert
        Command::Start(interval) => {
            let interval = interval.unwrap_or(config.default_interval);
            let simulator = session.simulator();
            tokio::spawn(async move {
                match simulator.start(interval).await {
                    Ok(_) => println!("simulator started ({interval}s)"),
                    Err(e) => println!("start failed: {e}"),
                }
            });
        }
        Command::Stop => {
            let simulator = session.simulator();
            tokio::spawn(async move {
                match simulator.stop().await {
                    Ok(_) => println!("simulator stopped"),
                    Err(e) => println!("stop failed: {e}"),
                }
            });
        }
        Command::Send(text) => {
            if let Err(e) = session.send_text(&text).await {
                println!("send failed: {e}");
            }
        }
        Command::Status => {
            let selected = session
                .selected()
                .map(|event| event.summary_line())
                .unwrap_or_else(|| "none".to_string());
            println!(
                "state: {:?}, events: {}, selected: {}",
                session.state(),
                session.history().len(),
                selected
            );
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
}
