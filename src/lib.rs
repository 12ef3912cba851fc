//! Step by step conversion between regular expressions, NFAs and DFAs.
//!
//! Every rewrite of an [`Automaton`] is expressed as a [`Command`] that can be
//! undone, redone and replayed through a [`CommandHistory`].

pub mod automaton;
pub mod breakdown;
pub mod command;
pub mod dfa;
pub mod elimination;
pub mod error;
pub mod history;
pub mod optimise;
pub mod regex;

pub use automaton::{Automaton, State, StateId, Transition, TransitionId};
pub use command::{Command, CompositeCommand, CompositeKind};
pub use error::{Error, ParseError, Result};
pub use history::{CommandHistory, HistoryConfig, HistoryEvent};
pub use regex::Regex;
