//! NFA to regular expression conversion by state elimination.
//!
//! After the start and final states are isolated, every other state is
//! removed in turn: its parallel transitions are conjoined into one choice,
//! its self-loop is folded into the transitions leaving it, and it is then
//! bypassed by sequencing each incoming label with each outgoing one. What is
//! left is a single transition from the start state to the final state.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::automaton::{Automaton, StateId, Transition, TransitionId};
use crate::command::{Command, CompositeKind};
use crate::dfa::remove_unreachable_states;
use crate::error::{Error, Result};
use crate::history::{self, CommandHistory};
use crate::regex::Regex;

/// How deep new labels are optimised while eliminating. Enough to fold
/// `ε*` and `εr`, without paying for a full pass on every step.
pub const LIGHT_OPTIMISATION_DEPTH: usize = 2;

/// Makes sure there is exactly one accepting state, that it has no outgoing
/// transitions, and that it is not the start state. `None` when that already
/// holds or when nothing is accepting.
pub fn isolate_final_state(a:&mut Automaton) -> Result<Option<Command>> {
	let finals:Vec<StateId> = a.states().filter(|s| s.is_accepting()).map(|s| s.id()).collect();
	let needed = match finals.as_slice() {
		[] => false,
		[only] => a.has_outgoing(*only)? || a.is_start(*only),
		_ => true,
	};
	if !needed {
		return Ok(None);
	}

	let new = a.create_state();
	let new_id = new.id();
	let mut commands = vec![Command::add_state(new), Command::set_accepting(new_id, true)];
	for f in finals {
		commands.push(Command::set_accepting(f, false));
		let e = a.create_transition(f, new_id, Regex::epsilon());
		commands.push(Command::add_transition(e));
	}
	Ok(Some(Command::composite(CompositeKind::IsolateFinalState, commands)))
}

/// Moves everything touching the start state onto a copy of it joined to the
/// start by ε, so the start state has no incoming transitions. `None` when
/// it has none already.
pub fn isolate_initial_state(a:&mut Automaton) -> Result<Option<Command>> {
	let start = a.start_state();
	if !a.has_incoming(start)? {
		return Ok(None);
	}

	let mut moved:Vec<Transition> = a.outgoing(start)?.iter().filter(|t| !t.is_loop()).cloned().collect();
	moved.extend(a.incoming(start)?);

	let mut commands:Vec<Command> = moved.iter().cloned().map(Command::remove_transition).collect();
	let copy = a.create_state();
	let copy_id = copy.id();
	commands.push(Command::add_state(copy));
	if a.is_accepting(start)? {
		commands.push(Command::set_accepting(copy_id, true));
	}
	let e = a.create_transition(start, copy_id, Regex::epsilon());
	commands.push(Command::add_transition(e));

	for t in moved {
		let from = if t.from() == start { copy_id } else { t.from() };
		let to = if t.to() == start { copy_id } else { t.to() };
		let new = a.create_transition(from, to, t.label().clone());
		commands.push(Command::add_transition(new));
	}
	Ok(Some(Command::composite(CompositeKind::IsolateInitialState, commands)))
}

/// The self-loop on `s`, if it has one.
pub fn single_loop(a:&Automaton, s:StateId) -> Result<Option<TransitionId>> {
	let loops:Vec<TransitionId> = a.outgoing(s)?.iter().filter(|t| t.is_loop()).map(|t| t.id()).collect();
	match loops.as_slice() {
		[] => Ok(None),
		[only] => Ok(Some(*only)),
		_ => Err(Error::MultipleLoops(s)),
	}
}

pub fn has_parallel_transitions(a:&Automaton, from:StateId, to:StateId) -> Result<bool> {
	Ok(a.outgoing(from)?.iter().filter(|t| t.to() == to).count() > 1)
}

/// Folds the self-loop `id` on `q`, labelled `r`, into every other
/// transition `q -s-> x`, which becomes `q -r*s-> x`.
pub fn remove_loop_transition(a:&mut Automaton, id:TransitionId) -> Result<Command> {
	let t = a.transition(id)?.clone();
	if !t.is_loop() {
		return Err(Error::NotALoop(id));
	}
	let q = t.from();
	single_loop(a, q)?;

	let repeat = Regex::star(t.label().clone());
	let others:Vec<Transition> = a.outgoing(q)?.iter().filter(|o| o.id() != id).cloned().collect();
	let mut commands = vec![Command::remove_transition(t)];
	for other in others {
		let label = Regex::concat(vec![repeat.clone(), other.label().clone()]).optimise_to_depth(LIGHT_OPTIMISATION_DEPTH);
		let new = a.create_transition(q, other.to(), label);
		commands.push(Command::remove_transition(other));
		commands.push(Command::add_transition(new));
	}
	Ok(Command::composite(CompositeKind::RemoveLoopTransition(id), commands))
}

/// Replaces all transitions from `from` to `to` by one labelled with the
/// choice of their labels.
pub fn conjoin_parallel_transitions(a:&mut Automaton, from:StateId, to:StateId) -> Result<Command> {
	let parallel:Vec<Transition> = a.outgoing(from)?.iter().filter(|t| t.to() == to).cloned().collect();
	if parallel.len() < 2 {
		return Err(Error::NoParallelTransitions { from, to });
	}

	let label = Regex::or(parallel.iter().map(|t| t.label().clone()).collect()).optimise_to_depth(LIGHT_OPTIMISATION_DEPTH);
	let mut commands:Vec<Command> = parallel.into_iter().map(Command::remove_transition).collect();
	let new = a.create_transition(from, to, label);
	commands.push(Command::add_transition(new));
	Ok(Command::composite(CompositeKind::ConjoinParallelTransitions(from, to), commands))
}

/// Removes `q` after adding, for every incoming `p` and outgoing `r`, a
/// transition labelled `pr` that bypasses it. `q` must not have a self-loop.
pub fn sequence_state_transitions(a:&mut Automaton, q:StateId) -> Result<Command> {
	if a.is_start(q) {
		return Err(Error::RemoveStartState);
	}
	if a.outgoing(q)?.iter().any(|t| t.is_loop()) {
		return Err(Error::SelfLoopPresent(q));
	}

	let incoming = a.incoming(q)?;
	let outgoing = a.outgoing(q)?.to_vec();
	let mut commands = Vec::with_capacity(incoming.len() * outgoing.len() + incoming.len() + outgoing.len() + 1);
	for t1 in &incoming {
		for t2 in &outgoing {
			let label = Regex::concat(vec![t1.label().clone(), t2.label().clone()]).optimise_to_depth(LIGHT_OPTIMISATION_DEPTH);
			let bypass = a.create_transition(t1.from(), t2.to(), label);
			commands.push(Command::add_transition(bypass));
		}
	}
	commands.extend(incoming.into_iter().map(Command::remove_transition));
	commands.extend(outgoing.into_iter().map(Command::remove_transition));
	commands.push(Command::remove_state(q));
	Ok(Command::composite(CompositeKind::SequenceStateTransitions(q), commands))
}

// (from, to) pairs joined by more than one transition, among those touching q
fn parallel_pairs(a:&Automaton, q:StateId) -> Result<BTreeSet<(StateId, StateId)>> {
	let mut counts:BTreeMap<(StateId, StateId), usize> = BTreeMap::new();
	for t in a.outgoing(q)? {
		*counts.entry((t.from(), t.to())).or_insert(0) += 1;
	}
	for t in a.incoming(q)? {
		if !t.is_loop() {
			*counts.entry((t.from(), t.to())).or_insert(0) += 1;
		}
	}
	Ok(counts.into_iter().filter(|(_, n)| *n > 1).map(|(pair, _)| pair).collect())
}

/// Eliminates every state but the start and final ones and returns the
/// label left between them, fully optimised. `None` when the automaton
/// accepts nothing.
pub fn nfa_to_regex(a:&mut Automaton, mut history:Option<&mut CommandHistory>) -> Result<Option<Regex>> {
	remove_unreachable_states(a, history.as_deref_mut())?;
	if !a.has_accepting_state() {
		return Ok(None);
	}

	if let Some(cmd) = isolate_final_state(a)? {
		history::execute(a, history.as_deref_mut(), cmd)?;
	}
	if let Some(cmd) = isolate_initial_state(a)? {
		history::execute(a, history.as_deref_mut(), cmd)?;
	}

	let start = a.start_state();
	let fin = match a.states().find(|s| s.is_accepting()) {
		Some(s) => s.id(),
		None => return Ok(None),
	};

	for q in a.state_ids() {
		if q == start || q == fin {
			continue;
		}
		for (from, to) in parallel_pairs(a, q)? {
			let cmd = conjoin_parallel_transitions(a, from, to)?;
			history::execute(a, history.as_deref_mut(), cmd)?;
		}
		if let Some(lp) = single_loop(a, q)? {
			let cmd = remove_loop_transition(a, lp)?;
			history::execute(a, history.as_deref_mut(), cmd)?;
		}
		let cmd = sequence_state_transitions(a, q)?;
		history::execute(a, history.as_deref_mut(), cmd)?;
	}

	if has_parallel_transitions(a, start, fin)? {
		let cmd = conjoin_parallel_transitions(a, start, fin)?;
		history::execute(a, history.as_deref_mut(), cmd)?;
	}

	let result = a.outgoing(start)?.iter().find(|t| t.to() == fin).map(|t| t.label().optimise());
	match &result {
		Some(re) => debug!("eliminated down to {}", re),
		None => debug!("final state is unreachable"),
	}
	Ok(result)
}
