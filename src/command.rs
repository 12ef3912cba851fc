//! Reversible edits of an [`Automaton`].
//!
//! Every algorithm in the crate expresses its result as a [`Command`]: a tree
//! of atomic edits that can be applied with [`Command::redo`] and reverted
//! with [`Command::undo`]. Atomic commands always re-commit the same state or
//! transition object, so ids stay stable across any number of undo/redo
//! cycles.

use std::fmt;

use log::{debug, warn};

use crate::automaton::{Automaton, State, StateId, Transition, TransitionId};
use crate::breakdown::IsolationLevel;
use crate::error::Result;

/// What a composite command was built to do, used for step listings.
#[derive(Clone,Debug,PartialEq,Eq)]
pub enum CompositeKind {
	BreakdownChoice(TransitionId),
	BreakdownSequence(TransitionId),
	BreakdownOption(TransitionId),
	BreakdownIteration(TransitionId, IsolationLevel),
	RemoveEpsilonTransitions(StateId),
	RemoveEquivalentStates(StateId),
	RemoveNonDeterminism(StateId, char),
	RemoveStateCleanly(StateId),
	IsolateFinalState,
	IsolateInitialState,
	RemoveLoopTransition(TransitionId),
	ConjoinParallelTransitions(StateId, StateId),
	SequenceStateTransitions(StateId),
}

impl fmt::Display for CompositeKind {
	fn fmt(&self, f:&mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CompositeKind::BreakdownChoice(t) => write!(f, "break down choice on transition {}", t),
			CompositeKind::BreakdownSequence(t) => write!(f, "break down sequence on transition {}", t),
			CompositeKind::BreakdownOption(t) => write!(f, "break down option on transition {}", t),
			CompositeKind::BreakdownIteration(t, level) => {
				write!(f, "break down iteration on transition {} ({})", t, level)
			},
			CompositeKind::RemoveEpsilonTransitions(s) => write!(f, "remove ε transitions from state {}", s),
			CompositeKind::RemoveEquivalentStates(s) => write!(f, "merge states equivalent to {}", s),
			CompositeKind::RemoveNonDeterminism(s, c) => write!(f, "remove non-determinism on '{}' from state {}", c, s),
			CompositeKind::RemoveStateCleanly(s) => write!(f, "remove state {} and its incoming transitions", s),
			CompositeKind::IsolateFinalState => write!(f, "isolate the final state"),
			CompositeKind::IsolateInitialState => write!(f, "isolate the initial state"),
			CompositeKind::RemoveLoopTransition(t) => write!(f, "remove loop transition {}", t),
			CompositeKind::ConjoinParallelTransitions(from, to) => {
				write!(f, "conjoin transitions from {} to {}", from, to)
			},
			CompositeKind::SequenceStateTransitions(s) => write!(f, "bypass state {}", s),
		}
	}
}

#[derive(Clone,Debug)]
pub struct CompositeCommand {
	kind:CompositeKind,
	commands:Vec<Command>,
}

impl CompositeCommand {
	pub fn kind(&self) -> &CompositeKind {
		&self.kind
	}

	pub fn commands(&self) -> &[Command] {
		&self.commands
	}
}

#[derive(Clone,Debug)]
pub enum Command {
	AddState { state:State },
	/// The state and its outgoing transitions are captured when applied.
	RemoveState { state:StateId, removed:Option<(State, Vec<Transition>)> },
	AddTransition { transition:Transition },
	RemoveTransition { transition:Transition },
	/// The previous flag is captured when applied.
	SetAccepting { state:StateId, accepting:bool, previous:Option<bool> },
	Composite(CompositeCommand),
}

impl Command {
	pub fn add_state(state:State) -> Command {
		Command::AddState { state }
	}

	pub fn remove_state(state:StateId) -> Command {
		Command::RemoveState { state, removed: None }
	}

	pub fn add_transition(transition:Transition) -> Command {
		Command::AddTransition { transition }
	}

	pub fn remove_transition(transition:Transition) -> Command {
		Command::RemoveTransition { transition }
	}

	pub fn set_accepting(state:StateId, accepting:bool) -> Command {
		Command::SetAccepting { state, accepting, previous: None }
	}

	pub fn composite(kind:CompositeKind, commands:Vec<Command>) -> Command {
		debug!("built '{}' with {} steps", kind, commands.len());
		Command::Composite(CompositeCommand { kind, commands })
	}

	/// Removes every transition into `state` from other states, then `state`.
	pub fn remove_state_cleanly(a:&Automaton, state:StateId) -> Result<Command> {
		let mut commands:Vec<Command> = a.incoming(state)?
			.into_iter()
			.filter(|t| t.from() != state)
			.map(Command::remove_transition)
			.collect();
		commands.push(Command::remove_state(state));
		Ok(Command::composite(CompositeKind::RemoveStateCleanly(state), commands))
	}

	/// Applies the command. A composite that fails part way reverts the steps
	/// it already applied before returning the error.
	pub fn redo(&mut self, a:&mut Automaton) -> Result<()> {
		match self {
			Command::AddState { state } => a.add_state(state.clone(), Vec::new()),
			Command::RemoveState { state, removed } => {
				*removed = Some(a.remove_state(*state)?);
				Ok(())
			},
			Command::AddTransition { transition } => a.add_transition(transition.clone()),
			Command::RemoveTransition { transition } => a.remove_transition(transition.from(), transition.id()).map(|_| ()),
			Command::SetAccepting { state, accepting, previous } => {
				*previous = Some(a.set_accepting(*state, *accepting)?);
				Ok(())
			},
			Command::Composite(c) => {
				for i in 0..c.commands.len() {
					if let Err(e) = c.commands[i].redo(a) {
						for done in c.commands[..i].iter_mut().rev() {
							if let Err(rollback) = done.undo(a) {
								warn!("rollback of '{}' failed: {}", done, rollback);
							}
						}
						return Err(e);
					}
				}
				Ok(())
			},
		}
	}

	/// Reverts the command. Sub-commands of a composite are reverted last to
	/// first.
	pub fn undo(&mut self, a:&mut Automaton) -> Result<()> {
		match self {
			Command::AddState { state } => a.remove_state(state.id()).map(|_| ()),
			Command::RemoveState { removed, .. } => {
				match removed.take() {
					Some((s, transitions)) => a.add_state(s, transitions),
					None => Ok(()),
				}
			},
			Command::AddTransition { transition } => a.remove_transition(transition.from(), transition.id()).map(|_| ()),
			Command::RemoveTransition { transition } => a.add_transition(transition.clone()),
			Command::SetAccepting { state, previous, .. } => {
				if let Some(p) = previous.take() {
					a.set_accepting(*state, p)?;
				}
				Ok(())
			},
			Command::Composite(c) => {
				let n = c.commands.len();
				for i in (0..n).rev() {
					if let Err(e) = c.commands[i].undo(a) {
						for done in c.commands[i + 1..].iter_mut() {
							if let Err(rollback) = done.redo(a) {
								warn!("rollback of '{}' failed: {}", done, rollback);
							}
						}
						return Err(e);
					}
				}
				Ok(())
			},
		}
	}

	pub fn as_composite(&self) -> Option<&CompositeCommand> {
		match self {
			Command::Composite(c) => Some(c),
			_ => None,
		}
	}
}

impl fmt::Display for Command {
	fn fmt(&self, f:&mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Command::AddState { state } => write!(f, "add state {}", state.id()),
			Command::RemoveState { state, .. } => write!(f, "remove state {}", state),
			Command::AddTransition { transition } => write!(f, "add transition {}", transition),
			Command::RemoveTransition { transition } => write!(f, "remove transition {}", transition),
			Command::SetAccepting { state, accepting: true, .. } => write!(f, "make state {} accepting", state),
			Command::SetAccepting { state, accepting: false, .. } => write!(f, "make state {} non-accepting", state),
			Command::Composite(c) => write!(f, "{}", c.kind),
		}
	}
}
