//! Dealer Player - headless composition root.
//!
//! Joins the lobby, opens the authenticated socket and reads table commands
//! from stdin.

use std::sync::Arc;

use anyhow::Context;
use dealer_domain::Card;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dealer_player::config::{load_dotenv, ClientConfig};
use dealer_player::ports::outbound::GameApiPort;
use dealer_player::{ConnectionManager, GameSession, GameView, HttpGameApi, TungsteniteConnector};

#[derive(Debug, PartialEq)]
enum Command {
    Bid(i32),
    Play(Card),
    Start,
    Status,
    Quit,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default().to_ascii_lowercase();
    let arg = words.next();

    match (verb.as_str(), arg) {
        ("bid", Some(n)) => n
            .parse()
            .map(Command::Bid)
            .map_err(|_| format!("not a bid: {n}")),
        ("play", Some(card)) => card
            .parse()
            .map(Command::Play)
            .map_err(|e| format!("not a card: {e}")),
        ("start", None) => Ok(Command::Start),
        ("status", None) => Ok(Command::Status),
        ("quit" | "exit", None) => Ok(Command::Quit),
        _ => Err(format!("unknown command: {line}")),
    }
}

fn log_view(view: &GameView) {
    let Some(snapshot) = &view.snapshot else {
        tracing::info!(
            connection = %view.connection,
            lobby = ?view.lobby.players,
            ready = view.lobby.is_full(),
            "Waiting in lobby"
        );
        return;
    };

    let hand = view
        .local_player
        .as_deref()
        .and_then(|id| snapshot.player(id))
        .map(|p| p.hand.iter().map(Card::identifier).collect::<Vec<_>>().join(" "))
        .unwrap_or_default();
    let table: Vec<String> = view
        .trick
        .plays()
        .map(|(player, card)| format!("{player}:{card}"))
        .collect();

    tracing::info!(
        connection = %view.connection,
        game_id = %snapshot.game_id,
        turn = %snapshot.turn,
        hand = %hand,
        table = ?table,
        bidding_complete = view.bidding_complete,
        winner = ?view.trick_winner.as_ref().map(|w| &w.player_id),
        "Table"
    );
}

/// Announcement for a finished game, `None` while it is still running.
fn game_result(view: &GameView) -> Option<String> {
    let over = view.game_over.as_ref()?;
    Some(match (&over.player_id, view.local_player.as_deref()) {
        (Some(winner), Some(me)) if winner == me => "Game over: you won".to_string(),
        (Some(winner), _) => format!("Game over: {winner} won"),
        (None, _) => "Game over".to_string(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dealer_player=debug,dealer_shared=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Dealer Player");

    let config = ClientConfig::from_env();

    // HTTP
    let api = Arc::new(
        HttpGameApi::new(&config.api_url, config.http_timeout)
            .context("failed to build HTTP client")?,
    );
    let joined = api
        .join_lobby(config.player_name.clone())
        .await
        .context("failed to join the lobby")?;
    tracing::info!(player = %joined.player_name, "Joined lobby");

    // WebSocket
    let (connection, events) =
        ConnectionManager::spawn(config.connection(), Arc::new(TungsteniteConnector));
    connection.connect(joined.token.clone())?;

    let session = GameSession::start(
        Arc::new(connection.clone()),
        events,
        api,
        Some(joined.player_name.clone()),
    );

    let mut views = session.subscribe();
    tokio::spawn(async move {
        while views.changed().await.is_ok() {
            let view = Arc::clone(&views.borrow_and_update());
            log_view(&view);
        }
    });

    let mut ended = session.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            finished = ended.wait_for(|view| view.game_over.is_some()) => {
                if let Ok(view) = finished {
                    if let Some(result) = game_result(&view) {
                        tracing::info!("{result}");
                    }
                }
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Ok(Command::Bid(bid)) => {
                if let Err(e) = session.submit_bid(&joined.player_name, bid).await {
                    tracing::warn!(error = %e, "Bid not sent");
                }
            }
            Ok(Command::Play(card)) => {
                session.play_card(card, &joined.player_name);
            }
            Ok(Command::Start) => {
                if let Err(e) = session.start_game(&joined.player_name, &joined.token).await {
                    tracing::warn!(error = %e, "Start game failed");
                }
            }
            Ok(Command::Status) => log_view(&session.view()),
            Ok(Command::Quit) => break,
            Err(e) => tracing::warn!("{e}"),
        }
    }

    session.stop();
    connection.shutdown().await?;
    tracing::info!("Dealer Player stopped");
    Ok(())
}
