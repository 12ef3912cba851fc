//! Error type for the crate.

use thiserror::Error;

use crate::automaton::{StateId, TransitionId};

pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a regular expression fails to parse. These are recoverable, the
/// automaton is never touched by a failed parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
	#[error("unmatched '(' at position {0}")]
	UnmatchedOpen(usize),
	#[error("unexpected ')' at position {0}")]
	StrayClose(usize),
	#[error("'{op}' at position {pos} has no operand to apply to")]
	MissingOperand { op: char, pos: usize },
	#[error("empty alternative next to '|' at position {0}")]
	EmptyAlternative(usize),
	#[error("empty parentheses at position {0}")]
	EmptyGroup(usize),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
	/// The expression could not be parsed.
	#[error("invalid regular expression: {0}")]
	InvalidRegexp(#[from] ParseError),

	// Structural violations. These are bugs in the caller.
	#[error("state {0} does not exist in this automaton")]
	StateNotFound(StateId),
	#[error("transition {0} does not exist in this automaton")]
	TransitionNotFound(TransitionId),
	#[error("state {0} already exists in this automaton")]
	DuplicateState(StateId),
	#[error("transition {0} already exists in this automaton")]
	DuplicateTransition(TransitionId),
	#[error("the start state cannot be removed")]
	RemoveStartState,
	#[error("handle {0} belongs to a different automaton")]
	ForeignHandle(String),
	#[error("state {0} still has incoming transitions from other states")]
	DanglingTransitions(StateId),
	#[error("transition {transition} does not originate from state {state}")]
	MisplacedTransition { transition: TransitionId, state: StateId },

	// Precondition violations on algorithmic commands.
	#[error("isolation level {requested} is weaker than the required {required}")]
	InsufficientIsolation { requested: String, required: String },
	#[error("expected a {expected} expression, got '{found}'")]
	WrongOperator { expected: &'static str, found: String },
	#[error("state {0} has a self-loop, remove it first")]
	SelfLoopPresent(StateId),
	#[error("transition {0} is not a self-loop")]
	NotALoop(TransitionId),
	#[error("state {0} has more than one self-loop, conjoin them first")]
	MultipleLoops(StateId),
	#[error("no parallel transitions from {from} to {to}")]
	NoParallelTransitions { from: StateId, to: StateId },
	#[error("transition {0} carries a compound label")]
	CompoundLabel(TransitionId),

	// History misuse.
	#[error("cannot execute a new command while not at the end of the history")]
	HistoryNotAtEnd,
	#[error("history index {idx} is out of range 0..={len}")]
	SeekOutOfRange { idx: usize, len: usize },
}
