//! Wire messages.
//!
//! Every message is a JSON array `[tag, payload]`, except the game state
//! broadcast, which is a JSON object tagged by `"__magic__": "game_state"`.
use crate::game::{Cell, Color};
use crate::identity::ClientIdentity;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

const GAME_STATE_MAGIC: &str = "game_state";

/// Seat of a player in the room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "i64")]
pub struct PlayerSlot(u8);

impl PlayerSlot {
    pub const FIRST: PlayerSlot = PlayerSlot(1);
    pub const LAST: PlayerSlot = PlayerSlot(2);

    pub fn new(slot: u8) -> Option<Self> {
        if (Self::FIRST.0..=Self::LAST.0).contains(&slot) {
            Some(PlayerSlot(slot))
        } else {
            None
        }
    }

    pub fn number(&self) -> u8 {
        self.0
    }

    /// `None` once every seat has been tried.
    pub fn next(&self) -> Option<Self> {
        PlayerSlot::new(self.0 + 1)
    }
}

impl TryFrom<i64> for PlayerSlot {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .and_then(PlayerSlot::new)
            .ok_or_else(|| format!("no player slot {}", value))
    }
}

impl Display for PlayerSlot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Player {}", self.0)
    }
}

/// Phase reported along with game state broadcasts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GamePhase {
    WaitingForStart,
    Selecting,
    Turn(PlayerSlot),
    Ended,
}

impl GamePhase {
    fn parse(phase: &str) -> Option<Self> {
        match phase {
            "Waiting for start" => Some(GamePhase::WaitingForStart),
            "Selecting" => Some(GamePhase::Selecting),
            "P1 Turn" => Some(GamePhase::Turn(PlayerSlot::FIRST)),
            "P2 Turn" => Some(GamePhase::Turn(PlayerSlot::LAST)),
            "Game ended" => Some(GamePhase::Ended),
            _ => None,
        }
    }
}

/// Authoritative board state.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub pegs: BTreeMap<Color, Cell>,
    pub thaler: Option<Cell>,
    pub phase: Option<GamePhase>,
}

/// Messages sent to the server.
#[derive(Clone, PartialEq, Debug)]
pub enum Messages {
    /// claim a seat
    Hello {
        player: PlayerSlot,
        identity: ClientIdentity,
    },
    /// resume the seat bound to `identity`
    Reconnect { identity: ClientIdentity },
    /// claim a color for the seat
    MakePlayerChoice {
        player: PlayerSlot,
        color: Color,
        identity: ClientIdentity,
    },
    /// ask for legal destinations of the peg of `color`
    RequestMoves {
        color: Color,
        identity: ClientIdentity,
    },
    /// move the peg of `color` to `dst`
    MakePlayerMove {
        color: Color,
        dst: Cell,
        identity: ClientIdentity,
    },
    /// name the opponent's color, ends the game either way
    MakePlayerGuess {
        color: Color,
        identity: ClientIdentity,
    },
}

/// Messages received from the server.
#[derive(Clone, PartialEq, Debug)]
pub enum Responses {
    /// seat granted
    HelloOkay { you_are: PlayerSlot },
    /// seat refused (taken, or identity unknown on reconnect)
    TryAgain(Option<String>),
    /// a color choice was recorded for `player`
    ColorConfirmed { player: u8 },
    /// legal destinations for the last `RequestMoves`
    ValidMoves { moves: Vec<Cell> },
    /// `error` and `invalid_action`
    Error { message: String },
    /// resumed session state
    ReconnectSuccess {
        snapshot: Snapshot,
        subtitle: Option<String>,
        selected_color: Option<Color>,
    },
    /// broadcast after every change of the board
    GameState(Snapshot),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// not JSON at all
    Json(String),
    /// neither `[tag, payload]` nor a game state object
    UnexpectedShape,
    UnknownTag(String),
    BadPayload { tag: String, reason: String },
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Json(e) => write!(f, "invalid json: {}", e),
            DecodeError::UnexpectedShape => f.write_str("unexpected message shape"),
            DecodeError::UnknownTag(tag) => write!(f, "unknown message tag `{}`", tag),
            DecodeError::BadPayload { tag, reason } => {
                write!(f, "bad `{}` payload: {}", tag, reason)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

impl Messages {
    pub fn tag(&self) -> &'static str {
        match self {
            Messages::Hello { .. } => "hello",
            Messages::Reconnect { .. } => "reconnect",
            Messages::MakePlayerChoice { .. } => "make_player_choice",
            Messages::RequestMoves { .. } => "request_moves",
            Messages::MakePlayerMove { .. } => "make_player_move",
            Messages::MakePlayerGuess { .. } => "make_player_guess",
        }
    }

    pub fn to_json(&self) -> Value {
        let payload = match self {
            Messages::Hello { player, identity } => {
                json!({ "player": player.number(), "playerId": identity.as_str() })
            }
            Messages::Reconnect { identity } => json!({ "playerId": identity.as_str() }),
            Messages::MakePlayerChoice {
                player,
                color,
                identity,
            } => json!({
                "player": player.number(),
                "color": color,
                "playerId": identity.as_str(),
            }),
            Messages::RequestMoves { color, identity }
            | Messages::MakePlayerGuess { color, identity } => {
                json!({ "color": color, "playerId": identity.as_str() })
            }
            Messages::MakePlayerMove {
                color,
                dst,
                identity,
            } => json!({
                "color": color,
                "dst": dst.index(),
                "playerId": identity.as_str(),
            }),
        };
        json!([self.tag(), payload])
    }
}

impl From<Messages> for String {
    fn from(msg: Messages) -> Self {
        msg.to_json().to_string()
    }
}

#[derive(Deserialize)]
struct HelloOkay {
    you_are: PlayerSlot,
}

#[derive(Deserialize)]
struct ColorConfirmed {
    player: u8,
}

#[derive(Deserialize)]
struct ValidMoves {
    moves: Vec<Cell>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ThalerWire {
    Index(Cell),
    Coords { int_repr: Cell },
}

impl From<ThalerWire> for Cell {
    fn from(thaler: ThalerWire) -> Self {
        match thaler {
            ThalerWire::Index(cell) => cell,
            ThalerWire::Coords { int_repr } => int_repr,
        }
    }
}

#[derive(Deserialize)]
struct GameStateWire {
    pegs: BTreeMap<Color, Cell>,
    #[serde(default)]
    thaler_pos: Option<ThalerWire>,
    #[serde(default)]
    current_phase: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReconnectSuccessWire {
    pegs: BTreeMap<Color, Cell>,
    #[serde(default)]
    thaler: Option<ThalerWire>,
    #[serde(default)]
    subtitle: Option<String>,
    #[serde(default)]
    selected_color: Option<Color>,
}

fn payload<T>(tag: &str, payload: Value) -> Result<T, DecodeError>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_value(payload).map_err(|e| DecodeError::BadPayload {
        tag: tag.to_string(),
        reason: e.to_string(),
    })
}

/// `error` carries either `{message}` or a bare string.
fn error_message(payload: Value) -> String {
    match payload {
        Value::String(message) => message,
        Value::Object(mut obj) => match obj.remove("message") {
            Some(Value::String(message)) => message,
            Some(other) => other.to_string(),
            None => Value::Object(obj).to_string(),
        },
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl Responses {
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| DecodeError::Json(e.to_string()))?;
        if value.get("__magic__").and_then(Value::as_str) == Some(GAME_STATE_MAGIC) {
            let state: GameStateWire = payload(GAME_STATE_MAGIC, value)?;
            return Ok(Responses::GameState(Snapshot {
                pegs: state.pegs,
                thaler: state.thaler_pos.map(Cell::from),
                phase: state.current_phase.as_deref().and_then(GamePhase::parse),
            }));
        }
        match value {
            Value::Array(mut items) if !items.is_empty() => {
                let body = if items.len() > 1 {
                    items.swap_remove(1)
                } else {
                    Value::Null
                };
                let tag = match &items[0] {
                    Value::String(tag) => tag.clone(),
                    _ => return Err(DecodeError::UnexpectedShape),
                };
                Self::decode_tagged(&tag, body)
            }
            _ => Err(DecodeError::UnexpectedShape),
        }
    }

    fn decode_tagged(tag: &str, body: Value) -> Result<Self, DecodeError> {
        match tag {
            "hello_okay" => {
                let HelloOkay { you_are } = payload(tag, body)?;
                Ok(Responses::HelloOkay { you_are })
            }
            "try_again" => Ok(Responses::TryAgain(match body {
                Value::String(reason) => Some(reason),
                _ => None,
            })),
            "color_confirmed" => {
                let ColorConfirmed { player } = payload(tag, body)?;
                Ok(Responses::ColorConfirmed { player })
            }
            "valid_moves" => {
                let ValidMoves { moves } = payload(tag, body)?;
                Ok(Responses::ValidMoves { moves })
            }
            "error" | "invalid_action" => Ok(Responses::Error {
                message: error_message(body),
            }),
            "reconnect_success" => {
                let wire: ReconnectSuccessWire = payload(tag, body)?;
                Ok(Responses::ReconnectSuccess {
                    snapshot: Snapshot {
                        pegs: wire.pegs,
                        thaler: wire.thaler.map(Cell::from),
                        phase: None,
                    },
                    subtitle: wire.subtitle,
                    selected_color: wire.selected_color,
                })
            }
            _ => Err(DecodeError::UnknownTag(tag.to_string())),
        }
    }
}

impl TryFrom<String> for Responses {
    type Error = DecodeError;

    fn try_from(value: String) -> Result<Self, DecodeError> {
        Responses::decode(&value)
    }
}

#[cfg(test)]
mod test_encode_decode {
    use super::*;

    fn cell(i: u8) -> Cell {
        Cell::new(i).unwrap()
    }

    fn identity() -> ClientIdentity {
        ClientIdentity::from_token("p-abc")
    }

    fn assert_encoded(msg: Messages, expected: Value) {
        let text: String = msg.into();
        let encoded: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(encoded, expected);
    }

    #[test]
    fn test_messages() {
        assert_encoded(
            Messages::Hello {
                player: PlayerSlot::FIRST,
                identity: identity(),
            },
            json!(["hello", { "player": 1, "playerId": "p-abc" }]),
        );
        assert_encoded(
            Messages::Reconnect {
                identity: ClientIdentity::from_token("p-xyz"),
            },
            json!(["reconnect", { "playerId": "p-xyz" }]),
        );
        assert_encoded(
            Messages::MakePlayerChoice {
                player: PlayerSlot::LAST,
                color: Color::Purple,
                identity: identity(),
            },
            json!(["make_player_choice", { "player": 2, "color": "U", "playerId": "p-abc" }]),
        );
        assert_encoded(
            Messages::RequestMoves {
                color: Color::Red,
                identity: identity(),
            },
            json!(["request_moves", { "color": "R", "playerId": "p-abc" }]),
        );
        assert_encoded(
            Messages::MakePlayerMove {
                color: Color::Red,
                dst: cell(6),
                identity: identity(),
            },
            json!(["make_player_move", { "color": "R", "dst": 6, "playerId": "p-abc" }]),
        );
        assert_encoded(
            Messages::MakePlayerGuess {
                color: Color::Yellow,
                identity: identity(),
            },
            json!(["make_player_guess", { "color": "Y", "playerId": "p-abc" }]),
        );
    }

    #[test]
    fn test_tagged_responses() {
        assert_eq!(
            Responses::decode(r#"["hello_okay", {"you_are": 2}]"#),
            Ok(Responses::HelloOkay {
                you_are: PlayerSlot::LAST
            })
        );
        assert_eq!(
            Responses::decode(r#"["try_again", {}]"#),
            Ok(Responses::TryAgain(None))
        );
        assert_eq!(
            Responses::decode(r#"["try_again", "Already taken"]"#),
            Ok(Responses::TryAgain(Some("Already taken".to_string())))
        );
        assert_eq!(
            Responses::decode(r#"["color_confirmed", {"player": 1}]"#),
            Ok(Responses::ColorConfirmed { player: 1 })
        );
        assert_eq!(
            Responses::decode(r#"["valid_moves", {"moves": [6, 12]}]"#),
            Ok(Responses::ValidMoves {
                moves: vec![cell(6), cell(12)]
            })
        );
        assert_eq!(
            Responses::decode(r#"["error", {"message": "not your turn"}]"#),
            Ok(Responses::Error {
                message: "not your turn".to_string()
            })
        );
        assert_eq!(
            Responses::decode(r#"["invalid_action", "no dst"]"#),
            Ok(Responses::Error {
                message: "no dst".to_string()
            })
        );
    }

    #[test]
    fn test_game_state() {
        let text = r#"{"__magic__": "game_state", "pegs": {"R": 5, "G": 3},
            "thaler_pos": {"int_repr": 10}, "current_phase": "P2 Turn"}"#;
        assert_eq!(
            Responses::decode(text),
            Ok(Responses::GameState(Snapshot {
                pegs: BTreeMap::from([(Color::Red, cell(5)), (Color::Green, cell(3))]),
                thaler: Some(cell(10)),
                phase: Some(GamePhase::Turn(PlayerSlot::LAST)),
            }))
        );
        let no_phase = r#"{"__magic__": "game_state", "pegs": {}, "thaler_pos": {"int_repr": 0}}"#;
        assert_eq!(
            Responses::decode(no_phase),
            Ok(Responses::GameState(Snapshot {
                pegs: BTreeMap::new(),
                thaler: Some(cell(0)),
                phase: None,
            }))
        );
    }

    #[test]
    fn test_game_phases() {
        let phases = [
            ("Waiting for start", GamePhase::WaitingForStart),
            ("Selecting", GamePhase::Selecting),
            ("P1 Turn", GamePhase::Turn(PlayerSlot::FIRST)),
            ("P2 Turn", GamePhase::Turn(PlayerSlot::LAST)),
            ("Game ended", GamePhase::Ended),
        ];
        for (wire, phase) in phases {
            let text = json!({
                "__magic__": "game_state",
                "pegs": {"R": 5},
                "thaler_pos": {"int_repr": 10},
                "current_phase": wire,
            })
            .to_string();
            match Responses::decode(&text) {
                Ok(Responses::GameState(snapshot)) => assert_eq!(snapshot.phase, Some(phase)),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_reconnect_success() {
        let text = r#"["reconnect_success", {"pegs": {"G": 3}, "thaler": 9, "subtitle": "Your turn"}]"#;
        assert_eq!(
            Responses::decode(text),
            Ok(Responses::ReconnectSuccess {
                snapshot: Snapshot {
                    pegs: BTreeMap::from([(Color::Green, cell(3))]),
                    thaler: Some(cell(9)),
                    phase: None,
                },
                subtitle: Some("Your turn".to_string()),
                selected_color: None,
            })
        );
        let text = r#"["reconnect_success", {"pegs": {}, "thaler": {"int_repr": 4}, "selectedColor": "B"}]"#;
        match Responses::decode(text) {
            Ok(Responses::ReconnectSuccess {
                snapshot,
                subtitle,
                selected_color,
            }) => {
                assert_eq!(snapshot.thaler, Some(cell(4)));
                assert_eq!(subtitle, None);
                assert_eq!(selected_color, Some(Color::Blue));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_from_frame_text() {
        let rsp = Responses::try_from(r#"["error", "bad move"]"#.to_string());
        assert_eq!(
            rsp,
            Ok(Responses::Error {
                message: "bad move".to_string()
            })
        );
        let rsp: Result<Responses, DecodeError> = "{}".to_string().try_into();
        assert_eq!(rsp, Err(DecodeError::UnexpectedShape));
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(Responses::decode("not json"), Err(DecodeError::Json(_))));
        assert_eq!(Responses::decode("42"), Err(DecodeError::UnexpectedShape));
        assert_eq!(Responses::decode("[]"), Err(DecodeError::UnexpectedShape));
        assert_eq!(
            Responses::decode(r#"["surprise", {}]"#),
            Err(DecodeError::UnknownTag("surprise".to_string()))
        );
        assert!(matches!(
            Responses::decode(r#"["hello_okay", {"you_are": 3}]"#),
            Err(DecodeError::BadPayload { .. })
        ));
        assert!(matches!(
            Responses::decode(r#"["valid_moves", {"moves": [49]}]"#),
            Err(DecodeError::BadPayload { .. })
        ));
        assert!(matches!(
            Responses::decode(r#"{"__magic__": "game_state", "pegs": {"W": 1}, "thaler_pos": {"int_repr": 0}}"#),
            Err(DecodeError::BadPayload { .. })
        ));
        // peg keys follow the same strict letters as every other color field
        assert!(matches!(
            Responses::decode(r#"["reconnect_success", {"pegs": {"r": 1}, "thaler": 0}]"#),
            Err(DecodeError::BadPayload { .. })
        ));
    }
}
