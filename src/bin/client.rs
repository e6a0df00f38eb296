use anyhow::Result;
use async_std::channel::Sender;
use async_std::io::{stdin, BufReader, Stdin};
use async_std::task;
use async_std::task::{block_on, JoinHandle};
use futures::{AsyncBufReadExt, StreamExt};
use log::{error, info, warn, LevelFilter};
use std::env;
use std::str::FromStr;
use thaler::{
    command_channel, open_identity, run, Cell, ClientCommand, ClientConfig, Color, GamePhase,
    Piece, Session, SessionState, UserIntent, BOARD_SIDE,
};

fn main() {
    env_logger::builder()
        .filter_module("thaler", LevelFilter::Info)
        .parse_default_env()
        .init();
    if let Err(e) = block_on(run_client()) {
        error!("client stopped on error {}", e);
    }
}

async fn run_client() -> Result<()> {
    let config = ClientConfig::from_args(env::args().skip(1))?;
    let identity = open_identity(&config.identity_path);
    let (sender, receiver) = command_channel();
    let input = accept_input(stdin(), sender);
    print_help();
    let session = run(&config, identity, receiver, print_session).await?;
    if session.state() == SessionState::RoomFull {
        println!("the room is full, try again later");
    }
    input.cancel().await;
    Ok(())
}

fn accept_input(input: Stdin, sender: Sender<ClientCommand>) -> JoinHandle<()> {
    task::spawn(async move {
        let reader = BufReader::new(input);
        let mut lines = reader.lines();
        while let Some(line) = lines.next().await {
            match line {
                Ok(line) => {
                    if let Some(cmd) = string_to_command(&line) {
                        let exit = cmd == ClientCommand::Exit;
                        if sender.send(cmd).await.is_err() {
                            info!("session ended");
                            break;
                        }
                        if exit {
                            break;
                        }
                    }
                }
                Err(e) => {
                    warn!("read line error: {}", e);
                }
            }
        }
    })
}

fn string_to_command(line: &str) -> Option<ClientCommand> {
    let line = line.trim().to_lowercase();
    let cmd: Vec<&str> = line.split_whitespace().collect();
    match cmd.as_slice() {
        ["color", letter] => match Color::from_str(letter) {
            Ok(color) => Some(ClientCommand::Intent(UserIntent::ChooseColor(color))),
            Err(e) => {
                println!("{}", e);
                None
            }
        },
        ["guess", letter] => match Color::from_str(letter) {
            Ok(color) => Some(ClientCommand::Intent(UserIntent::Guess(color))),
            Err(e) => {
                println!("{}", e);
                None
            }
        },
        ["click", index] => match u8::from_str(index).ok().and_then(Cell::new) {
            Some(cell) => Some(ClientCommand::Intent(UserIntent::ClickCell(cell))),
            None => {
                println!("cell must be 0..48");
                None
            }
        },
        ["click", row, col] => match (u8::from_str(row), u8::from_str(col)) {
            (Ok(row), Ok(col)) => match Cell::from_row_col(row, col) {
                Some(cell) => Some(ClientCommand::Intent(UserIntent::ClickCell(cell))),
                None => {
                    println!("row and col must be 0..6");
                    None
                }
            },
            _ => {
                print_help();
                None
            }
        },
        ["cancel"] => Some(ClientCommand::Intent(UserIntent::CancelSelection)),
        ["reconnect"] => Some(ClientCommand::Reconnect),
        ["board"] => Some(ClientCommand::Render),
        ["exit"] => Some(ClientCommand::Exit),
        [] => None,
        _ => {
            print_help();
            None
        }
    }
}

fn print_help() {
    println!(
        "commands:\n\
        - color 'R|O|Y|G|B|P|U'\n\
        - click 'cell'\n\
        - click 'row' 'col'\n\
        - cancel\n\
        - guess 'opponent color letter'\n\
        - reconnect\n\
        - board\n\
        - exit"
    );
}

fn print_session(session: &Session) {
    println!("{}", session_to_string(session));
}

fn session_to_string(session: &Session) -> String {
    let board = session.board();
    let mut out = String::new();
    out.push_str("   ");
    for col in 0..BOARD_SIDE {
        out.push_str(&format!(" {}", col));
    }
    out.push('\n');
    for row in 0..BOARD_SIDE {
        out.push_str(&format!("{:>2} ", row));
        for col in 0..BOARD_SIDE {
            let symbol = match Cell::from_row_col(row, col) {
                Some(cell) => match board.piece_at(cell) {
                    Some(Piece::Thaler) => 'T',
                    Some(Piece::Peg(color)) => color.letter(),
                    None if board.is_highlighted(cell) => '*',
                    None => '.',
                },
                None => '?',
            };
            out.push(' ');
            out.push(symbol);
        }
        out.push('\n');
    }
    let status = session.status();
    out.push_str(&format!("state: {}\n", state_to_string(session.state())));
    if let Some(label) = &status.player_label {
        out.push_str(&format!("you are {}", label));
        if let Some(color) = status.own_color {
            out.push_str(&format!(", playing {}", color.display_name()));
        }
        out.push('\n');
    }
    if let Some(phase) = status.phase {
        let phase = match phase {
            GamePhase::WaitingForStart => "waiting for both players".to_string(),
            GamePhase::Selecting => "players are choosing colors".to_string(),
            GamePhase::Turn(slot) => format!("{} to move", slot),
            GamePhase::Ended => "game over".to_string(),
        };
        out.push_str(&format!("{}\n", phase));
    }
    if let Some(color) = session.pending_selection() {
        out.push_str(&format!("selected {}\n", color.display_name()));
    }
    if let Some(subtitle) = &status.subtitle {
        out.push_str(&format!("{}\n", subtitle));
    }
    if let Some(e) = &status.last_error {
        out.push_str(&format!("server says: {}\n", e));
    }
    out
}

fn state_to_string(state: SessionState) -> String {
    match state {
        SessionState::Disconnected => "disconnected (type `reconnect`)".to_string(),
        SessionState::Connecting => "resuming previous seat".to_string(),
        SessionState::AwaitingSeat(slot) => format!("asking for {}", slot),
        SessionState::Seated(slot) => format!("seated as {}, pick a color", slot),
        SessionState::AwaitingColorConfirm(_, color) => {
            format!("waiting for {} to be confirmed", color.display_name())
        }
        SessionState::InGame => "in game".to_string(),
        SessionState::RoomFull => "room full".to_string(),
    }
}
