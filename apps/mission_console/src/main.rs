use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{info, warn};

use console_core::{
    transport, CommandError, ConnectionState, ConsoleSession, LogDirection, LogEntry,
    SessionEvent, SystemStatus,
};
use shared::domain::SystemMode;

mod settings;
use settings::Settings;

#[derive(Parser, Debug)]
#[command(
    name = "mission_console",
    about = "Operator console for the autonomous forklift backend"
)]
struct Args {
    /// Backend base URL, e.g. http://192.168.0.42:5000
    #[arg(long)]
    server_url: Option<String>,
    /// Client identifier reported in ping messages.
    #[arg(long)]
    client_id: Option<String>,
    /// Settings file path.
    #[arg(long, default_value = "console.toml")]
    config: String,
    /// Skip the REST reachability probe at startup.
    #[arg(long)]
    no_probe: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let mut settings = settings::load_settings(&args.config);
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    if let Some(client_id) = args.client_id {
        settings.client_id = client_id;
    }

    if !args.no_probe {
        probe_backend(&settings.server_url).await;
    }

    let session = ConsoleSession::new();
    let endpoint = transport::socket_endpoint(&settings.server_url)?;
    let policy = transport::ReconnectPolicy {
        initial_delay: Duration::from_millis(settings.reconnect_initial_ms),
        max_delay: Duration::from_millis(settings.reconnect_max_ms),
    };
    let link = transport::spawn(session.clone(), endpoint, policy);
    let sink = tokio::spawn(render_events(session.subscribe_events()));

    print_help();
    run_input_loop(&session, &settings).await?;

    link.abort();
    sink.abort();
    Ok(())
}

/// One-shot probe of the backend REST status endpoint. Failures are reported
/// and otherwise ignored; the socket transport keeps retrying on its own.
async fn probe_backend(server_url: &str) {
    let url = format!("{}/api/status", server_url.trim_end_matches('/'));
    let request = reqwest::Client::new()
        .get(&url)
        .timeout(Duration::from_secs(3));
    match request.send().await {
        Ok(response) if response.status().is_success() => {
            info!("backend reachable at {url}");
        }
        Ok(response) => warn!("backend probe {url} answered {}", response.status()),
        Err(err) => warn!("backend probe {url} failed: {err}"),
    }
}

/// Stdout rendering of session events. Full status reports arrive at the
/// backend's publish rate, so only mode or viewer-count transitions get a
/// line; everything else would drown the prompt.
async fn render_events(mut events: broadcast::Receiver<SessionEvent>) {
    let mut last_mode: Option<SystemMode> = None;
    let mut last_clients: Option<u32> = None;
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("console renderer lagged, skipped {skipped} events");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        match event {
            SessionEvent::ConnectionChanged(ConnectionState::Connected) => {
                println!("* backend connected");
            }
            SessionEvent::ConnectionChanged(ConnectionState::Disconnected) => {
                println!("* backend disconnected");
            }
            SessionEvent::StatusChanged(status) => {
                if last_mode != Some(status.mode) || last_clients != Some(status.connected_clients)
                {
                    println!("* {}", render_status(&status));
                    last_mode = Some(status.mode);
                    last_clients = Some(status.connected_clients);
                }
            }
            SessionEvent::ForkHeightChanged(height) => {
                println!("* fork height now {height:.1} cm");
            }
            SessionEvent::LogAppended(entry) => println!("{}", render_log_entry(&entry)),
            SessionEvent::LogCleared => println!("* activity log cleared (no events)"),
            SessionEvent::TeleopInputsReset => println!("* teleop inputs reset to zero"),
        }
    }
}

fn render_status(status: &SystemStatus) -> String {
    let updated = status
        .last_update
        .map(|stamp| stamp.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--".to_string());
    format!(
        "mode={} pose=({:.1}, {:.1}, {:.1} deg) fork={:.1} cm viewers={} updated={}",
        status.mode.as_str(),
        status.robot_pose.x,
        status.robot_pose.y,
        status.robot_pose.theta,
        status.fork_height_cm,
        status.connected_clients,
        updated
    )
}

fn render_log_entry(entry: &LogEntry) -> String {
    let tag = match entry.direction {
        LogDirection::Sent => "sent",
        LogDirection::Received => "recv",
    };
    format!(
        "[{}] {tag} {}",
        entry.timestamp.with_timezone(&Local).format("%H:%M:%S"),
        entry.text
    )
}

#[derive(Debug, PartialEq)]
enum ConsoleInput {
    Ping,
    Teleop { linear: f64, angular: f64 },
    Fork { height_cm: f64 },
    Stop,
    Video,
    ShowStatus,
    ShowLog,
    ClearLog,
    Help,
    Quit,
}

/// Parses one prompt line. Drive and fork values are clamped to the
/// configured input ranges here, before they ever reach the session.
fn parse_input(line: &str, settings: &Settings) -> Result<ConsoleInput, String> {
    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or_default();
    match command {
        "ping" => Ok(ConsoleInput::Ping),
        "teleop" => {
            let linear = parse_value(parts.next(), "linear")?;
            let angular = parse_value(parts.next(), "angular")?;
            Ok(ConsoleInput::Teleop {
                linear: linear.clamp(
                    -settings.max_linear_speed_cm_s,
                    settings.max_linear_speed_cm_s,
                ),
                angular: angular.clamp(
                    -settings.max_angular_speed_deg_s,
                    settings.max_angular_speed_deg_s,
                ),
            })
        }
        "fork" => {
            let height_cm = parse_value(parts.next(), "height")?;
            Ok(ConsoleInput::Fork {
                height_cm: height_cm.clamp(0.0, settings.max_fork_height_cm),
            })
        }
        "stop" => Ok(ConsoleInput::Stop),
        "video" => Ok(ConsoleInput::Video),
        "status" => Ok(ConsoleInput::ShowStatus),
        "log" => Ok(ConsoleInput::ShowLog),
        "clear" => Ok(ConsoleInput::ClearLog),
        "help" => Ok(ConsoleInput::Help),
        "quit" | "exit" => Ok(ConsoleInput::Quit),
        other => Err(format!("unknown command '{other}', try 'help'")),
    }
}

fn parse_value(raw: Option<&str>, name: &str) -> Result<f64, String> {
    let raw = raw.ok_or_else(|| format!("missing {name} value"))?;
    raw.parse::<f64>()
        .map_err(|_| format!("invalid {name} value '{raw}'"))
}

fn print_help() {
    println!("commands:");
    println!("  ping                 liveness check against the backend");
    println!("  teleop <lin> <ang>   drive command, cm/s and deg/s");
    println!("  fork <height_cm>     move the fork mast to an absolute height");
    println!("  stop                 emergency stop, resets teleop inputs");
    println!("  video                request the video feed");
    println!("  status               print the latest vehicle status");
    println!("  log                  print the activity log");
    println!("  clear                clear the activity log");
    println!("  quit                 leave the console");
}

async fn run_input_loop(session: &ConsoleSession, settings: &Settings) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let input = match parse_input(line, settings) {
            Ok(input) => input,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };
        match input {
            ConsoleInput::Quit => break,
            ConsoleInput::Help => print_help(),
            ConsoleInput::ShowStatus => println!("{}", render_status(&session.status().await)),
            ConsoleInput::ShowLog => {
                let log = session.activity_log().await;
                if log.is_empty() {
                    println!("no events");
                }
                for entry in log {
                    println!("{}", render_log_entry(&entry));
                }
            }
            ConsoleInput::ClearLog => session.clear_log().await,
            ConsoleInput::Ping => report(session.send_ping(&settings.client_id).await),
            ConsoleInput::Teleop { linear, angular } => {
                report(session.send_teleop(linear, angular).await)
            }
            ConsoleInput::Fork { height_cm } => report(session.send_fork_height(height_cm).await),
            ConsoleInput::Stop => report(session.send_stop().await),
            ConsoleInput::Video => report(session.request_video_stream().await),
        }
    }
    Ok(())
}

fn report(result: Result<(), CommandError>) {
    if let Err(err) = result {
        println!("command failed: {err}");
    }
}

#[cfg(test)]
mod tests {
    use std::{
        env, fs,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    #[test]
    fn teleop_values_are_clamped_to_configured_bounds() {
        let settings = Settings::default();
        let input = parse_input("teleop 300 -999", &settings).expect("parse");
        assert_eq!(
            input,
            ConsoleInput::Teleop {
                linear: 20.0,
                angular: -40.0
            }
        );
    }

    #[test]
    fn fork_height_is_clamped_to_mast_range() {
        let settings = Settings::default();
        let input = parse_input("fork 4000", &settings).expect("parse");
        assert_eq!(input, ConsoleInput::Fork { height_cm: 300.0 });
        let input = parse_input("fork -3", &settings).expect("parse");
        assert_eq!(input, ConsoleInput::Fork { height_cm: 0.0 });
    }

    #[test]
    fn missing_and_malformed_values_are_reported() {
        let settings = Settings::default();
        assert!(parse_input("teleop 5", &settings).is_err());
        assert!(parse_input("fork tall", &settings).is_err());
        assert!(parse_input("warp 9", &settings).is_err());
    }

    #[test]
    fn quit_has_an_exit_alias() {
        let settings = Settings::default();
        assert_eq!(parse_input("quit", &settings), Ok(ConsoleInput::Quit));
        assert_eq!(parse_input("exit", &settings), Ok(ConsoleInput::Quit));
    }

    #[test]
    fn commands_survive_nonsense_configured_bounds() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("mission_console_typo_{suffix}.toml"));
        fs::write(
            &path,
            "max_fork_height_cm = -5\nmax_linear_speed_cm_s = \"nan\"\n",
        )
        .expect("write settings file");

        // the loader replaces nonsense bounds with defaults before clamp sees them
        let settings = settings::load_settings(path.to_str().expect("utf8 path"));
        assert_eq!(
            parse_input("fork 10", &settings),
            Ok(ConsoleInput::Fork { height_cm: 10.0 })
        );
        assert_eq!(
            parse_input("teleop 3 0", &settings),
            Ok(ConsoleInput::Teleop {
                linear: 3.0,
                angular: 0.0
            })
        );

        fs::remove_file(path).expect("cleanup");
    }
}
