use crate::game::{BoardViewModel, Cell, Color, Piece};
use crate::identity::{ClientIdentity, Identity};
use crate::network::{Channel, ChannelEvent};
use crate::session::messages::{GamePhase, Messages, PlayerSlot, Responses, Snapshot};
use log::{debug, info, warn};
#[cfg(debug_assertions)]
use log::trace;

pub type GameChannel = Channel<Messages, Responses>;

pub const WAITING_SUBTITLE: &str = "Waiting for other player...";
pub const ROOM_FULL_SUBTITLE: &str = "Room full";

/// Protocol progress. Exactly one holds at any time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    /// `reconnect` sent, waiting to learn whether the seat is still ours
    Connecting,
    /// `hello` sent for this slot
    AwaitingSeat(PlayerSlot),
    Seated(PlayerSlot),
    AwaitingColorConfirm(PlayerSlot, Color),
    InGame,
    /// every slot refused, terminal
    RoomFull,
}

/// What the player did on the rendering surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserIntent {
    ChooseColor(Color),
    ClickCell(Cell),
    CancelSelection,
    /// name the opponent's color
    Guess(Color),
}

#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    ChannelOpened,
    ChannelClosed,
    Message(Responses),
    Intent(UserIntent),
}

impl SessionEvent {
    /// Channel errors are transport noise: the channel also reports
    /// `Closed` if the connection is gone.
    pub fn from_channel(event: ChannelEvent<Responses>) -> Option<Self> {
        match event {
            ChannelEvent::Opened => Some(SessionEvent::ChannelOpened),
            ChannelEvent::Message(rsp) => Some(SessionEvent::Message(rsp)),
            ChannelEvent::Closed => Some(SessionEvent::ChannelClosed),
            ChannelEvent::Errored(_) => None,
        }
    }
}

/// Text shown around the board.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Status {
    /// "Player 1" or "Player 2"
    pub player_label: Option<String>,
    pub subtitle: Option<String>,
    pub own_color: Option<Color>,
    pub last_error: Option<String>,
    pub phase: Option<GamePhase>,
}

/// Client side of the game protocol.
///
/// Every event is handled to completion before the next one, and every
/// outbound message goes through the channel handed to `handle`. The
/// protocol has no request ids, so at most one `request_moves` is
/// outstanding at a time and a `valid_moves` with nothing outstanding is
/// dropped.
pub struct Session {
    identity: ClientIdentity,
    /// open with `reconnect` instead of `hello`
    resume: bool,
    state: SessionState,
    /// slot granted by `hello_okay`, kept while resuming in this process
    seat: Option<PlayerSlot>,
    pending_selection: Option<Color>,
    awaiting_moves: bool,
    board: BoardViewModel,
    status: Status,
}

impl Session {
    pub fn new(identity: Identity) -> Self {
        Session {
            resume: identity.is_restored(),
            identity: identity.token,
            state: SessionState::Disconnected,
            seat: None,
            pending_selection: None,
            awaiting_moves: false,
            board: BoardViewModel::new(),
            status: Status::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    pub fn board(&self) -> &BoardViewModel {
        &self.board
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn pending_selection(&self) -> Option<Color> {
        self.pending_selection
    }

    /// Slot held in this session, if known.
    pub fn slot(&self) -> Option<PlayerSlot> {
        self.seat
    }

    pub fn is_terminal(&self) -> bool {
        self.state == SessionState::RoomFull
    }

    pub fn handle(&mut self, event: SessionEvent, channel: &GameChannel) {
        #[cfg(debug_assertions)]
        trace!("session event {:?} in state {:?}", event, self.state);
        if self.is_terminal() {
            debug!("room full, ignoring {:?}", event);
            return;
        }
        match event {
            SessionEvent::ChannelOpened => self.on_opened(channel),
            SessionEvent::ChannelClosed => self.on_closed(),
            SessionEvent::Message(rsp) => self.on_response(rsp, channel),
            SessionEvent::Intent(intent) => self.on_intent(intent, channel),
        }
    }

    fn send(&self, channel: &GameChannel, msg: Messages) -> bool {
        let tag = msg.tag();
        match channel.send(msg) {
            Ok(()) => true,
            Err(e) => {
                warn!("cannot send `{}`: {}", tag, e);
                false
            }
        }
    }

    fn hello(&self, player: PlayerSlot) -> Messages {
        Messages::Hello {
            player,
            identity: self.identity.clone(),
        }
    }

    fn on_opened(&mut self, channel: &GameChannel) {
        if self.state != SessionState::Disconnected {
            warn!("channel opened again in state {:?}", self.state);
        }
        self.reset();
        if self.resume {
            info!("resuming session of {}", self.identity);
            self.send(
                channel,
                Messages::Reconnect {
                    identity: self.identity.clone(),
                },
            );
            self.state = SessionState::Connecting;
        } else {
            self.send(channel, self.hello(PlayerSlot::FIRST));
            self.state = SessionState::AwaitingSeat(PlayerSlot::FIRST);
        }
    }

    fn on_closed(&mut self) {
        info!("session closed in state {:?}", self.state);
        self.reset();
        self.state = SessionState::Disconnected;
    }

    /// Drop everything tied to the current connection.
    /// Board and status stay on screen until the server says otherwise.
    fn reset(&mut self) {
        self.pending_selection = None;
        self.awaiting_moves = false;
        self.board.clear_highlights();
    }

    fn on_response(&mut self, rsp: Responses, channel: &GameChannel) {
        match rsp {
            Responses::HelloOkay { you_are } => self.on_hello_okay(you_are),
            Responses::TryAgain(reason) => self.on_try_again(reason, channel),
            Responses::ColorConfirmed { player } => self.on_color_confirmed(player),
            Responses::ValidMoves { moves } => self.on_valid_moves(moves),
            Responses::Error { message } => {
                warn!("protocol error: {}", message);
                self.status.last_error = Some(message);
            }
            Responses::ReconnectSuccess {
                snapshot,
                subtitle,
                selected_color,
            } => self.on_reconnect_success(snapshot, subtitle, selected_color, channel),
            Responses::GameState(snapshot) => self.on_game_state(snapshot),
        }
    }

    fn on_hello_okay(&mut self, slot: PlayerSlot) {
        match self.state {
            SessionState::Connecting | SessionState::AwaitingSeat(_) => {
                info!("seated as {}", slot);
                self.state = SessionState::Seated(slot);
                self.seat = Some(slot);
                self.resume = true;
                self.status.player_label = Some(slot.to_string());
            }
            state => warn!("unexpected hello_okay in state {:?}", state),
        }
    }

    fn on_try_again(&mut self, reason: Option<String>, channel: &GameChannel) {
        let reason = reason.unwrap_or_default();
        match self.state {
            SessionState::Connecting => {
                info!("reconnect refused ({}), asking for a seat", reason);
                self.seat = None;
                self.status.player_label = None;
                self.status.own_color = None;
                self.send(channel, self.hello(PlayerSlot::FIRST));
                self.state = SessionState::AwaitingSeat(PlayerSlot::FIRST);
            }
            SessionState::AwaitingSeat(slot) => match slot.next() {
                Some(next) => {
                    debug!("{} refused ({}), trying {}", slot, reason, next);
                    self.send(channel, self.hello(next));
                    self.state = SessionState::AwaitingSeat(next);
                }
                None => {
                    warn!("room full :(");
                    self.state = SessionState::RoomFull;
                    self.status.subtitle = Some(ROOM_FULL_SUBTITLE.to_string());
                }
            },
            state => warn!("unexpected try_again in state {:?}", state),
        }
    }

    fn on_color_confirmed(&mut self, player: u8) {
        match self.state {
            SessionState::AwaitingColorConfirm(slot, color) if slot.number() == player => {
                info!("color {} confirmed", color.display_name());
                self.state = SessionState::InGame;
                self.status.own_color = Some(color);
            }
            _ => debug!("color_confirmed for player {} ignored", player),
        }
    }

    fn on_valid_moves(&mut self, moves: Vec<Cell>) {
        if self.state != SessionState::InGame || !self.awaiting_moves {
            warn!("stale valid_moves dropped");
            return;
        }
        self.awaiting_moves = false;
        if self.pending_selection.is_none() {
            debug!("valid_moves after cancel dropped");
        } else if moves.is_empty() {
            info!("no legal move for {:?}", self.pending_selection);
            self.pending_selection = None;
            self.board.clear_highlights();
        } else {
            self.board.set_highlights(moves);
        }
    }

    fn on_reconnect_success(
        &mut self,
        snapshot: Snapshot,
        subtitle: Option<String>,
        selected_color: Option<Color>,
        channel: &GameChannel,
    ) {
        if self.state != SessionState::Connecting {
            warn!("unexpected reconnect_success in state {:?}", self.state);
            return;
        }
        info!("session of {} resumed", self.identity);
        self.board.apply_snapshot(snapshot.pegs, snapshot.thaler);
        self.status.subtitle = subtitle;
        self.status.phase = snapshot.phase;
        self.state = SessionState::InGame;
        self.resume = true;
        self.pending_selection = None;
        self.awaiting_moves = false;
        if let Some(color) = selected_color {
            if self.board.peg_of(color).is_some() {
                self.request_moves(color, channel);
            }
        }
    }

    fn on_game_state(&mut self, snapshot: Snapshot) {
        if self.state == SessionState::Disconnected {
            return;
        }
        self.board.apply_snapshot(snapshot.pegs, snapshot.thaler);
        self.status.phase = snapshot.phase;
        self.pending_selection = None;
        self.awaiting_moves = false;
    }

    fn on_intent(&mut self, intent: UserIntent, channel: &GameChannel) {
        match intent {
            UserIntent::ChooseColor(color) => self.choose_color(color, channel),
            UserIntent::ClickCell(cell) => self.click(cell, channel),
            UserIntent::CancelSelection => {
                // an outstanding request stays outstanding, its reply is dropped
                self.pending_selection = None;
                self.board.clear_highlights();
            }
            UserIntent::Guess(color) => self.guess(color, channel),
        }
    }

    fn guess(&mut self, color: Color, channel: &GameChannel) {
        if self.state != SessionState::InGame {
            debug!("guess ignored in state {:?}", self.state);
            return;
        }
        if self.status.phase == Some(GamePhase::Ended) {
            warn!("game is over, guess ignored");
            return;
        }
        let guess = Messages::MakePlayerGuess {
            color,
            identity: self.identity.clone(),
        };
        if self.send(channel, guess) {
            info!("guessed {}", color.display_name());
            self.pending_selection = None;
            self.board.clear_highlights();
        }
    }

    fn choose_color(&mut self, color: Color, channel: &GameChannel) {
        match self.state {
            SessionState::Seated(slot) => {
                let choice = Messages::MakePlayerChoice {
                    player: slot,
                    color,
                    identity: self.identity.clone(),
                };
                if self.send(channel, choice) {
                    self.state = SessionState::AwaitingColorConfirm(slot, color);
                    self.status.subtitle = Some(WAITING_SUBTITLE.to_string());
                }
            }
            SessionState::AwaitingColorConfirm(..) | SessionState::InGame => {
                warn!("you've already picked a color!")
            }
            state => debug!("color pick ignored in state {:?}", state),
        }
    }

    fn click(&mut self, cell: Cell, channel: &GameChannel) {
        if self.state != SessionState::InGame || !channel.is_open() {
            debug!("click on {} ignored in state {:?}", cell, self.state);
            return;
        }
        if self.awaiting_moves {
            debug!("click on {} ignored, moves still outstanding", cell);
            return;
        }
        match (self.pending_selection, self.board.piece_at(cell)) {
            (None, Some(Piece::Peg(color))) => self.request_moves(color, channel),
            (Some(color), None) if self.board.is_highlighted(cell) => {
                let mv = Messages::MakePlayerMove {
                    color,
                    dst: cell,
                    identity: self.identity.clone(),
                };
                if self.send(channel, mv) {
                    self.board.clear_highlights();
                    self.pending_selection = None;
                }
            }
            _ => debug!("click on {} ignored", cell),
        }
    }

    fn request_moves(&mut self, color: Color, channel: &GameChannel) {
        let request = Messages::RequestMoves {
            color,
            identity: self.identity.clone(),
        };
        if self.send(channel, request) {
            self.board.clear_highlights();
            self.pending_selection = Some(color);
            self.awaiting_moves = true;
        }
    }
}
