//! Huddle CLI tools: token gateway queries, config inspection, layout
//! simulation.

#![forbid(unsafe_code)]

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use huddle_client::chat::mock::MockChatConnector;
use huddle_client::gateway::mock::StaticTokens;
use huddle_client::sdk::mock::MockRtcEngine;
use huddle_client::{
    ClientConfig, Conference, MediaKind, RemoteParticipant, SessionEvent, TokenGateway,
    TracingDisplay, Uid,
};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "huddle")]
#[command(about = "Huddle CLI tools")]
struct Args {
    /// Token gateway base URL
    #[arg(long, env = "HUDDLE_GATEWAY_URL", global = true)]
    gateway_url: Option<String>,

    /// RTC application id
    #[arg(long, env = "HUDDLE_APP_ID", global = true)]
    app_id: Option<String>,

    /// Channel to join
    #[arg(long, env = "HUDDLE_CHANNEL", global = true)]
    channel: Option<String>,

    /// Number of participant slots in the layout
    #[arg(long, env = "HUDDLE_SLOT_CAPACITY", global = true)]
    slots: Option<usize>,

    /// Gateway request timeout in milliseconds
    #[arg(long, env = "HUDDLE_HTTP_TIMEOUT_MS", global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the chat application token
    AppToken,

    /// Fetch an RTC token for joining a channel
    ChannelToken {
        /// Uid to request the token for
        #[arg(short, long)]
        uid: String,
    },

    /// Fetch a chat user token
    UserToken {
        /// Chat user name
        name: String,
    },

    /// Print the effective client configuration as JSON
    Config,

    /// Replay remote participants against a headless layout
    Simulate {
        /// Remote participants publishing audio and video
        #[arg(short, long, default_value_t = 6)]
        participants: u32,
    },

    /// Show version information
    Version,
}

impl Args {
    fn config(&self) -> Result<ClientConfig> {
        let mut config = ClientConfig::from_env()?;
        if let Some(url) = &self.gateway_url {
            config.gateway_url = url.clone();
        }
        if let Some(app_id) = &self.app_id {
            config.app_id = app_id.clone();
        }
        if let Some(channel) = &self.channel {
            config.channel = channel.clone();
        }
        if let Some(slots) = self.slots {
            config.slot_capacity = slots;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.http_timeout_ms = timeout_ms;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    huddle_common::init_tracing();

    let args = Args::parse();
    let config = args.config()?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match args.command {
        Command::AppToken => {
            let gateway = TokenGateway::from_config(&config)?;
            let resp = rt.block_on(gateway.app_token())?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
        Command::ChannelToken { uid } => {
            let gateway = TokenGateway::from_config(&config)?;
            let uid = parse_uid(&uid);
            let resp = rt.block_on(gateway.channel_token_response(&uid, &config.channel))?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
        Command::UserToken { name } => {
            let gateway = TokenGateway::from_config(&config)?;
            let resp = rt.block_on(gateway.user_token_response(&name))?;
            println!("{}", serde_json::to_string_pretty(&resp)?);
        }
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Command::Simulate { participants } => {
            rt.block_on(simulate(config, participants))?;
        }
        Command::Version => {
            println!("huddle {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn parse_uid(raw: &str) -> Uid {
    raw.parse::<u32>()
        .map(Uid::Number)
        .unwrap_or_else(|_| Uid::Name(raw.to_string()))
}

/// Joins a simulated channel, lets `participants` remote users publish and
/// prints where each one landed.
async fn simulate(mut config: ClientConfig, participants: u32) -> Result<()> {
    if config.app_id.is_empty() {
        config.app_id = "simulated".into();
    }
    let engine = MockRtcEngine::new();
    let display = TracingDisplay::from_config(&config);
    let (mut conference, mut events) = Conference::new(
        config,
        engine.clone(),
        MockChatConnector::new(),
        Arc::new(StaticTokens::new()),
        display,
    )?;

    let uid = conference.join().await?;
    info!(%uid, channel = conference.session().channel(), "joined simulated channel");

    let client = engine
        .client(0)
        .ok_or_else(|| anyhow!("simulated engine created no client"))?;
    for n in 0..participants {
        let mut participant = RemoteParticipant::new(1000 + n);
        participant.has_audio = true;
        participant.has_video = true;
        for kind in [MediaKind::Audio, MediaKind::Video] {
            client.emit(SessionEvent::Published {
                participant: participant.clone(),
                kind,
            });
        }
    }
    while let Ok(event) = events.try_recv() {
        conference.handle_event(event).await;
    }

    let reconciler = conference.reconciler();
    for (index, slot) in reconciler.slots().iter().enumerate() {
        match slot {
            Some(key) => println!("slot {index}: {key}"),
            None => println!("slot {index}: empty"),
        }
    }
    for key in reconciler.overflow() {
        println!("overflow: {key}");
    }

    conference.leave().await?;
    Ok(())
}
