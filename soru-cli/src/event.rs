use crossterm::event::Event as TermEvent;
use soru::{AuthError, GeminiError, SessionState, Solution};

/// Unified event type for the main loop.
pub enum AppEvent {
    Terminal(TermEvent),
    /// The session gate published a new state.
    Session(SessionState),
    /// A solve task finished. `epoch` is the ticket's stamp.
    Solved {
        epoch: u64,
        result: Result<Solution, GeminiError>,
        elapsed_ms: u64,
    },
    /// A chat task finished.
    ChatReply {
        epoch: u64,
        result: Result<String, GeminiError>,
    },
    /// Sign-in or sign-up finished. Success needs no payload: the new
    /// identity arrives through `Session`.
    Account(Result<(), AuthError>),
    Tick,
    Quit,
}
