//! lisa-bridge - terminal front end for the interaction controller
//!
//! Lines typed on stdin are chat, except for the commands
//! `/connect`, `/disconnect`, `/mute` and `/quit`. Hand landmarks come
//! from a JSON-lines replay file, one video frame per line:
//!
//! ```text
//! {"t_ms": 0, "hands": [[{"x": 0.5, "y": 0.5}, ... 21 points]]}
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use lisa_core::{SessionClock, Timestamp};
use lisa_gesture::{EmissionGate, HandsFrame, LandmarkFrame};
use lisa_runtime::{
    init_logging, run, speaking_label, ui_channel, BridgeConfig, Controller, ControllerHandle,
    UiEvent,
};
use lisa_transport::{TokenClient, UdpRoomTransport};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "lisa-bridge", version, about = "Gesture and chat bridge to a remote agent")]
struct Cli {
    /// Config file (default: ./lisa.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Room to join
    #[arg(long)]
    room: Option<String>,

    /// Participant name sent to the token server
    #[arg(long)]
    participant: Option<String>,

    /// Room URL, e.g. udp://127.0.0.1:7880
    #[arg(long)]
    server_url: Option<String>,

    /// JSON-lines landmark replay file
    #[arg(long)]
    landmarks: Option<PathBuf>,

    /// Connect immediately instead of waiting for /connect
    #[arg(long)]
    connect: bool,
}

impl Cli {
    fn apply(&self, config: &mut BridgeConfig) {
        if let Some(room) = &self.room {
            config.room.room_name = room.clone();
        }
        if let Some(participant) = &self.participant {
            config.room.participant_name = participant.clone();
        }
        if let Some(url) = &self.server_url {
            config.room.server_url = url.clone();
        }
    }
}

/// One line of stdin
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Connect,
    Disconnect,
    Mute,
    Quit,
    Chat(String),
}

fn parse_input(line: &str) -> Input {
    match line.trim() {
        "/connect" => Input::Connect,
        "/disconnect" => Input::Disconnect,
        "/mute" => Input::Mute,
        "/quit" => Input::Quit,
        _ => Input::Chat(line.to_string()),
    }
}

/// One frame of landmark replay. Records without `t_ms` are fed
/// immediately and stamped on arrival.
#[derive(Debug, Deserialize)]
struct ReplayRecord {
    #[serde(default)]
    t_ms: Option<i64>,
    #[serde(default)]
    hands: Vec<LandmarkFrame>,
}

fn render(event: &UiEvent) -> String {
    match event {
        UiEvent::Log { kind, text } => format!("[{}] {}", kind, text),
        UiEvent::GestureResult(symbol) => format!("[gesture] {}", symbol),
        UiEvent::SessionChanged(snapshot) => format!(
            "[status] {} (mic {}) | {} | {}",
            snapshot.state,
            if snapshot.mic_enabled { "on" } else { "off" },
            snapshot.connect_label(),
            snapshot.mic_label()
        ),
        UiEvent::Speaking(speaking) => format!("[status] {}", speaking_label(*speaking)),
    }
}

/// Feed replay frames at their recorded pace
async fn replay_landmarks(path: PathBuf, handle: ControllerHandle) -> Result<()> {
    let file = tokio::fs::File::open(&path)
        .await
        .with_context(|| format!("opening {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();
    let start = Instant::now();
    let clock = SessionClock::new();
    let mut frames = 0u64;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let record: ReplayRecord = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "skipping malformed landmark record");
                continue;
            }
        };

        let at = match record.t_ms {
            Some(t_ms) => {
                let offset = Duration::from_millis(t_ms.max(0) as u64);
                tokio::time::sleep_until(start + offset).await;
                Timestamp::from_millis(t_ms)
            }
            None => clock.now(),
        };
        if !handle.submit_frame(HandsFrame::new(record.hands), at) {
            break;
        }
        frames += 1;
    }

    info!(frames, path = %path.display(), "landmark replay finished");
    Ok(())
}

async fn read_commands(handle: &ControllerHandle) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let delivered = match parse_input(&line) {
            Input::Quit => break,
            Input::Connect => handle.connect(),
            Input::Disconnect => handle.disconnect(),
            Input::Mute => handle.toggle_mic(),
            Input::Chat(text) => handle.chat(text),
        };
        if !delivered {
            break;
        }
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<BridgeConfig> {
    let path: Option<&Path> = cli.config.as_deref();
    let mut config = BridgeConfig::load(path).context("loading configuration")?;
    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(&config.logging)?;

    let (handle, events) = ControllerHandle::channel();
    let transport = UdpRoomTransport::bind(
        config.transport.bind_addr,
        config.udp_options(),
        handle.transport_sink(),
    )
    .await
    .context("binding room transport")?;
    info!(local = %transport.local_addr(), room = %config.room.server_url, "transport ready");

    let tokens = TokenClient::new(&config.room.token_url, config.token_timeout())?;
    let (ui_tx, mut ui_rx) = ui_channel();
    let controller = Controller::new(
        Arc::new(transport),
        Arc::new(tokens),
        config.session_settings(),
        EmissionGate::with_interval(config.gesture.min_interval_ms),
        ui_tx,
        handle.clone(),
    );

    let runtime = tokio::spawn(run(controller, events));
    let printer = tokio::spawn(async move {
        while let Some(event) = ui_rx.recv().await {
            println!("{}", render(&event));
        }
    });

    if let Some(path) = cli.landmarks.clone() {
        let handle = handle.clone();
        tokio::spawn(async move {
            if let Err(e) = replay_landmarks(path, handle).await {
                warn!(error = %e, "landmark replay stopped");
            }
        });
    }

    if cli.connect {
        handle.connect();
    }

    read_commands(&handle).await?;
    handle.shutdown();

    let stats = runtime.await.context("controller task failed")?;
    printer.await.context("printer task failed")?;
    info!(?stats, "bridge stopped");
    Ok(())
}
