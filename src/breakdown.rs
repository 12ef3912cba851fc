//! Expansion of compound transition labels into simpler transitions.
//!
//! Each breakdown replaces one transition by transitions whose labels are
//! the operands of the old label, so repeating it turns a transition
//! labelled with any expression into an NFA over single symbols and ε.

use std::fmt;

use log::{debug, trace};

use crate::automaton::{Automaton, StateId, Transition, TransitionId};
use crate::command::{Command, CompositeKind};
use crate::error::{Error, Result};
use crate::history::{self, CommandHistory};
use crate::regex::{Operator, Regex};

/// How much an iteration breakdown separates the loop from the rest of the
/// graph. Without enough separation a walk could enter the loop through one
/// shared endpoint and leave it through the other after a partial pass.
#[derive(Clone,Copy,Debug,PartialEq,Eq,Hash)]
pub enum IsolationLevel {
	None,
	StartIsolate,
	EndIsolate,
	FullyIsolate,
}

impl IsolationLevel {
	pub fn isolates_start(self) -> bool {
		matches!(self, IsolationLevel::StartIsolate | IsolationLevel::FullyIsolate)
	}

	pub fn isolates_end(self) -> bool {
		matches!(self, IsolationLevel::EndIsolate | IsolationLevel::FullyIsolate)
	}

	/// Whether this level isolates at least everything `min` does.
	pub fn covers(self, min:IsolationLevel) -> bool {
		(self.isolates_start() || !min.isolates_start()) && (self.isolates_end() || !min.isolates_end())
	}

	fn from_flags(start:bool, end:bool) -> IsolationLevel {
		match (start, end) {
			(false, false) => IsolationLevel::None,
			(true, false) => IsolationLevel::StartIsolate,
			(false, true) => IsolationLevel::EndIsolate,
			(true, true) => IsolationLevel::FullyIsolate,
		}
	}
}

impl fmt::Display for IsolationLevel {
	fn fmt(&self, f:&mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			IsolationLevel::None => "no isolation",
			IsolationLevel::StartIsolate => "start isolated",
			IsolationLevel::EndIsolate => "end isolated",
			IsolationLevel::FullyIsolate => "fully isolated",
		};
		write!(f, "{}", name)
	}
}

/// The weakest isolation an iteration breakdown of `t` may use. The start
/// needs isolating when a walk could leave the loop at the source: it has
/// other outgoing transitions or is accepting. The end needs isolating when
/// a walk could enter the loop at the destination: it has other incoming
/// transitions or is the start state.
pub fn calc_isolation_level(a:&Automaton, t:&Transition) -> Result<IsolationLevel> {
	let start = a.outgoing(t.from())?.iter().any(|o| o.id() != t.id()) || a.is_accepting(t.from())?;
	let end = a.incoming(t.to())?.iter().any(|i| i.id() != t.id()) || a.is_start(t.to());
	Ok(IsolationLevel::from_flags(start, end))
}

fn checked_transition(a:&Automaton, id:TransitionId, expected:&'static str, ops:&[Operator]) -> Result<Transition> {
	let t = a.transition(id)?.clone();
	if !ops.contains(&t.label().operator()) {
		return Err(Error::WrongOperator { expected, found: t.label().to_string() });
	}
	Ok(t)
}

fn epsilon_exists(a:&Automaton, from:StateId, to:StateId) -> Result<bool> {
	Ok(a.outgoing(from)?.iter().any(|t| t.to() == to && t.is_epsilon()))
}

/// Replaces a choice transition by one parallel transition per alternative.
pub fn breakdown_choice(a:&mut Automaton, id:TransitionId) -> Result<Command> {
	let t = checked_transition(a, id, "choice", &[Operator::Or])?;

	let mut commands = vec![Command::remove_transition(t.clone())];
	for operand in t.label().operands() {
		let new = a.create_transition(t.from(), t.to(), operand.clone());
		commands.push(Command::add_transition(new));
	}
	Ok(Command::composite(CompositeKind::BreakdownChoice(id), commands))
}

/// Replaces a sequence transition by a chain through new intermediate states.
pub fn breakdown_sequence(a:&mut Automaton, id:TransitionId) -> Result<Command> {
	let t = checked_transition(a, id, "sequence", &[Operator::Concat])?;
	let operands = t.label().operands();

	let mut commands = vec![Command::remove_transition(t.clone())];
	let mut links = Vec::with_capacity(operands.len());
	let mut prev = t.from();
	for (i, operand) in operands.iter().enumerate() {
		let next = if i + 1 == operands.len() {
			t.to()
		} else {
			let s = a.create_state();
			let sid = s.id();
			commands.push(Command::add_state(s));
			sid
		};
		links.push(a.create_transition(prev, next, operand.clone()));
		prev = next;
	}
	commands.extend(links.into_iter().map(Command::add_transition));
	Ok(Command::composite(CompositeKind::BreakdownSequence(id), commands))
}

/// Replaces `r?` by a transition labelled `r` and an ε transition, unless
/// the endpoints are already joined by ε.
pub fn breakdown_option(a:&mut Automaton, id:TransitionId) -> Result<Command> {
	let t = checked_transition(a, id, "option", &[Operator::QMark])?;

	let mut commands = vec![Command::remove_transition(t.clone())];
	if !epsilon_exists(a, t.from(), t.to())? {
		let skip = a.create_transition(t.from(), t.to(), Regex::epsilon());
		commands.push(Command::add_transition(skip));
	}
	let body = a.create_transition(t.from(), t.to(), t.label().operands()[0].clone());
	commands.push(Command::add_transition(body));
	Ok(Command::composite(CompositeKind::BreakdownOption(id), commands))
}

/// Replaces `r*` or `r+` by a loop over `r` joined to the endpoints with ε
/// transitions. `level` must cover [`calc_isolation_level`].
pub fn breakdown_iteration(a:&mut Automaton, id:TransitionId, level:IsolationLevel) -> Result<Command> {
	let t = checked_transition(a, id, "star or plus", &[Operator::KleeneStar, Operator::KleenePlus])?;
	let min = calc_isolation_level(a, &t)?;
	if !level.covers(min) {
		return Err(Error::InsufficientIsolation { requested: level.to_string(), required: min.to_string() });
	}

	let star = t.label().operator() == Operator::KleeneStar;
	let operand = t.label().operands()[0].clone();
	let (x, y) = (t.from(), t.to());
	let mut commands = vec![Command::remove_transition(t.clone())];

	if level == IsolationLevel::None {
		if star {
			if !epsilon_exists(a, x, y)? {
				let skip = a.create_transition(x, y, Regex::epsilon());
				commands.push(Command::add_transition(skip));
			}
			let back = a.create_transition(y, x, operand);
			commands.push(Command::add_transition(back));
		} else {
			let body = a.create_transition(x, y, operand);
			let back = a.create_transition(y, x, Regex::epsilon());
			commands.push(Command::add_transition(body));
			commands.push(Command::add_transition(back));
		}
		return Ok(Command::composite(CompositeKind::BreakdownIteration(id, level), commands));
	}

	let loop_start = if level.isolates_start() {
		let s = a.create_state();
		let sid = s.id();
		commands.push(Command::add_state(s));
		sid
	} else {
		x
	};
	let loop_end = if level.isolates_end() {
		let s = a.create_state();
		let sid = s.id();
		commands.push(Command::add_state(s));
		sid
	} else {
		y
	};

	let mut epsilons:Vec<(StateId, StateId)> = Vec::new();
	if loop_start != x {
		epsilons.push((x, loop_start));
	}
	if loop_end != y {
		epsilons.push((loop_end, y));
	}
	epsilons.push((loop_end, loop_start));
	if star && !epsilon_exists(a, x, y)? {
		epsilons.push((x, y));
	}

	let mut planned:Vec<(StateId, StateId)> = Vec::new();
	for (from, to) in epsilons {
		if planned.contains(&(from, to)) {
			trace!("skipping duplicate ε {} -> {}", from, to);
			continue;
		}
		planned.push((from, to));
		let e = a.create_transition(from, to, Regex::epsilon());
		commands.push(Command::add_transition(e));
	}
	let body = a.create_transition(loop_start, loop_end, operand);
	commands.push(Command::add_transition(body));
	Ok(Command::composite(CompositeKind::BreakdownIteration(id, level), commands))
}

/// Builds the breakdown matching the label's operator, iterations using the
/// weakest isolation that keeps the language. `None` for single symbols.
pub fn breakdown(a:&mut Automaton, id:TransitionId) -> Result<Option<Command>> {
	let t = a.transition(id)?.clone();
	let cmd = match t.label().operator() {
		Operator::Single => return Ok(None),
		Operator::Or => breakdown_choice(a, id)?,
		Operator::Concat => breakdown_sequence(a, id)?,
		Operator::QMark => breakdown_option(a, id)?,
		Operator::KleeneStar | Operator::KleenePlus => {
			let level = calc_isolation_level(a, &t)?;
			breakdown_iteration(a, id, level)?
		},
	};
	Ok(Some(cmd))
}

/// Transitions whose label is not yet a single symbol or ε.
pub fn transitions_to_breakdown(a:&Automaton) -> Vec<TransitionId> {
	a.transitions().filter(|t| !t.label().is_single_char()).map(|t| t.id()).collect()
}

/// Breaks transitions down one at a time until every label is a single
/// symbol or ε.
pub fn breakdown_to_completion(a:&mut Automaton, mut history:Option<&mut CommandHistory>) -> Result<()> {
	let mut steps = 0;
	while let Some(id) = transitions_to_breakdown(a).first().copied() {
		if let Some(cmd) = breakdown(a, id)? {
			history::execute(a, history.as_deref_mut(), cmd)?;
			steps += 1;
		}
	}
	debug!("breakdown finished after {} steps", steps);
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn re(s:&str) -> Regex {
		Regex::parse(s).unwrap().unwrap()
	}

	fn single_transition(a:&Automaton) -> TransitionId {
		a.transitions().next().unwrap().id()
	}

	#[test]
	fn choice_becomes_parallel_transitions() {
		let mut a = Automaton::from_regex(&re("a|bc|d"));
		let id = single_transition(&a);
		breakdown_choice(&mut a, id).unwrap().redo(&mut a).unwrap();
		let labels:Vec<String> = a.transitions().map(|t| t.label().to_string()).collect();
		assert_eq!(labels, vec!["a", "bc", "d"]);
		assert_eq!(a.num_states(), 2);
	}

	#[test]
	fn sequence_becomes_a_chain() {
		let mut a = Automaton::from_regex(&re("ab(c|d)"));
		let id = single_transition(&a);
		let mut cmd = breakdown_sequence(&mut a, id).unwrap();
		cmd.redo(&mut a).unwrap();
		assert_eq!(a.num_states(), 4);
		assert_eq!(a.num_transitions(), 3);

		cmd.undo(&mut a).unwrap();
		assert_eq!(a.num_states(), 2);
		assert_eq!(a.transition(id).unwrap().label().to_string(), "ab(c|d)");
	}

	#[test]
	fn option_adds_epsilon_once() {
		let mut a = Automaton::from_regex(&re("a?"));
		let id = single_transition(&a);
		breakdown_option(&mut a, id).unwrap().redo(&mut a).unwrap();
		assert_eq!(a.num_transitions(), 2);
		assert!(a.accepts("").unwrap());
		assert!(a.accepts("a").unwrap());

		let mut a = Automaton::from_regex(&re("a?"));
		let (start, end) = {
			let t = a.transitions().next().unwrap();
			(t.from(), t.to())
		};
		let e = a.create_transition(start, end, Regex::epsilon());
		a.add_transition(e).unwrap();
		let id = transitions_to_breakdown(&a)[0];
		breakdown_option(&mut a, id).unwrap().redo(&mut a).unwrap();
		assert_eq!(a.num_transitions(), 2);
	}

	#[test]
	fn wrong_operator_is_rejected() {
		let mut a = Automaton::from_regex(&re("ab"));
		let id = single_transition(&a);
		assert_eq!(
			breakdown_choice(&mut a, id).unwrap_err(),
			Error::WrongOperator { expected: "choice", found: "ab".to_string() }
		);
		assert!(breakdown_iteration(&mut a, id, IsolationLevel::FullyIsolate).is_err());
	}

	#[test]
	fn unshared_star_needs_no_isolation() {
		let mut a = Automaton::from_regex(&re("a*"));
		let id = single_transition(&a);
		let t = a.transition(id).unwrap().clone();
		assert_eq!(calc_isolation_level(&a, &t).unwrap(), IsolationLevel::None);

		breakdown_iteration(&mut a, id, IsolationLevel::None).unwrap().redo(&mut a).unwrap();
		assert_eq!(a.num_states(), 2);
		assert_eq!(a.num_transitions(), 2);
		assert_eq!(a.transitions().filter(|t| t.is_epsilon()).count(), 1);
		for w in ["", "a", "aaa"] {
			assert!(a.accepts(w).unwrap());
		}
		assert!(!a.accepts("b").unwrap());
	}

	#[test]
	fn shared_start_needs_start_isolation() {
		let mut a = Automaton::from_regex(&re("a*"));
		let id = single_transition(&a);
		let (start, end) = (a.start_state(), a.transition(id).unwrap().to());
		let other = a.create_state();
		let oid = other.id();
		a.add_state(other, vec![]).unwrap();
		let b = a.create_transition(start, oid, re("b"));
		a.add_transition(b).unwrap();

		let t = a.transition(id).unwrap().clone();
		assert_eq!(calc_isolation_level(&a, &t).unwrap(), IsolationLevel::StartIsolate);
		assert_eq!(
			breakdown_iteration(&mut a, id, IsolationLevel::None).unwrap_err(),
			Error::InsufficientIsolation { requested: "no isolation".to_string(), required: "start isolated".to_string() }
		);
		assert!(breakdown_iteration(&mut a, id, IsolationLevel::EndIsolate).is_err());

		let states_before = a.num_states();
		breakdown_iteration(&mut a, id, IsolationLevel::StartIsolate).unwrap().redo(&mut a).unwrap();
		assert_eq!(a.num_states(), states_before + 1);
		assert!(a.accepts("").unwrap());
		assert!(a.accepts("aa").unwrap());
		assert!(!a.accepts("ab").unwrap());
		assert!(!a.is_accepting(oid).unwrap());
		assert!(a.is_accepting(end).unwrap());
	}

	#[test]
	fn plus_without_isolation_needs_one_pass() {
		let mut a = Automaton::from_regex(&re("(ab)+"));
		breakdown_to_completion(&mut a, None).unwrap();
		assert!(!a.accepts("").unwrap());
		assert!(a.accepts("ab").unwrap());
		assert!(a.accepts("ababab").unwrap());
		assert!(!a.accepts("aba").unwrap());
	}

	#[test]
	fn accepting_source_needs_start_isolation() {
		// the inner a* runs from the accepting state back towards the start
		let mut a = Automaton::from_regex(&re("(a*b)*"));
		breakdown_to_completion(&mut a, None).unwrap();
		assert!(a.accepts("").unwrap());
		assert!(a.accepts("ab").unwrap());
		assert!(a.accepts("baab").unwrap());
		assert!(!a.accepts("a").unwrap());
		assert!(!a.accepts("aba").unwrap());
	}

	#[test]
	fn start_destination_needs_end_isolation() {
		let mut a = Automaton::new();
		let start = a.start_state();
		let s = a.create_state();
		let sid = s.id();
		a.add_state(s, vec![]).unwrap();
		a.set_accepting(start, true).unwrap();
		let back = a.create_transition(sid, start, re("a*"));
		let t = back.clone();
		a.add_transition(back).unwrap();

		assert_eq!(calc_isolation_level(&a, &t).unwrap(), IsolationLevel::EndIsolate);
		breakdown_to_completion(&mut a, None).unwrap();
		assert!(a.accepts("").unwrap());
		assert!(!a.accepts("a").unwrap());
	}

	#[test]
	fn full_isolation_keeps_the_language() {
		let mut a = Automaton::from_regex(&re("a+"));
		let id = single_transition(&a);
		breakdown_iteration(&mut a, id, IsolationLevel::FullyIsolate).unwrap().redo(&mut a).unwrap();
		assert_eq!(a.num_states(), 4);
		assert!(!a.accepts("").unwrap());
		assert!(a.accepts("a").unwrap());
		assert!(a.accepts("aaaa").unwrap());
	}

	#[test]
	fn completion_reaches_single_symbols() {
		let mut a = Automaton::from_regex(&re("(01|10)*1111"));
		let mut h = CommandHistory::new();
		breakdown_to_completion(&mut a, Some(&mut h)).unwrap();
		assert!(transitions_to_breakdown(&a).is_empty());
		assert!(h.len() > 0);
		assert!(a.accepts("1111").unwrap());
		assert!(a.accepts("01101111").unwrap());
		assert!(!a.accepts("0011111").unwrap());
		assert!(!a.accepts("111").unwrap());

		let built = a.to_string();
		h.seek_idx(&mut a, 0).unwrap();
		assert_eq!(a.num_transitions(), 1);
		h.seek_idx(&mut a, h.len()).unwrap();
		assert_eq!(a.to_string(), built);
	}
}
