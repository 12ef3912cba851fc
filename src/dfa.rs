//! NFA to DFA conversion as a series of recorded rewrites.
//!
//! The conversion happens in three passes: ε transitions are removed state
//! by state, states that shared an ε-closure are merged, and finally every
//! state with several transitions on one symbol gets them replaced by a
//! single transition into a state standing for the set of destinations.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, trace};

use crate::automaton::{Automaton, State, StateId, Transition};
use crate::command::{Command, CompositeKind};
use crate::error::{Error, Result};
use crate::history::{self, CommandHistory};
use crate::regex::Regex;

/// Removes the ε transitions leaving `s`. Every non-ε transition leaving a
/// state of the ε-closure of `s` is copied onto `s`, skipping copies of
/// transitions `s` already has, and `s` becomes accepting if the closure
/// reaches an accepting state.
pub fn remove_epsilon_transitions(a:&mut Automaton, s:StateId) -> Result<Command> {
	let closure = a.epsilon_closure(s)?;
	let mut commands = Vec::new();

	if !a.is_accepting(s)? {
		for r in &closure {
			if a.is_accepting(*r)? {
				commands.push(Command::set_accepting(s, true));
				break;
			}
		}
	}

	for t in a.outgoing(s)? {
		if t.is_epsilon() {
			commands.push(Command::remove_transition(t.clone()));
		}
	}

	let mut found:Vec<Transition> = Vec::new();
	for r in &closure {
		found.extend(a.outgoing(*r)?.iter().filter(|t| !t.is_epsilon()).cloned());
	}
	// transitions already leaving s sort first among equals, so they are the
	// ones kept
	found.sort_by(|t1, t2| {
		t1.to().cmp(&t2.to())
			.then_with(|| t1.label().cmp(t2.label()))
			.then_with(|| (t1.from() != s).cmp(&(t2.from() != s)))
	});
	found.dedup_by(|later, kept| later.to() == kept.to() && later.label() == kept.label());

	for t in found.into_iter().filter(|t| t.from() != s) {
		let copy = a.create_transition(s, t.to(), t.label().clone());
		commands.push(Command::add_transition(copy));
	}
	Ok(Command::composite(CompositeKind::RemoveEpsilonTransitions(s), commands))
}

/// ε-closures of every state, taken before any ε transition is removed, and
/// the partition of states into classes with identical closures.
#[derive(Clone,Debug,Default)]
pub struct EpsilonClosureContext {
	closures:BTreeMap<StateId, BTreeSet<StateId>>,
	classes:Vec<BTreeSet<StateId>>,
}

impl EpsilonClosureContext {
	pub fn new(a:&Automaton) -> Result<EpsilonClosureContext> {
		let mut closures = BTreeMap::new();
		for id in a.state_ids() {
			closures.insert(id, a.epsilon_closure(id)?);
		}

		let mut classes = Vec::new();
		let mut todo:Vec<StateId> = closures.keys().copied().collect();
		while let Some(&first) = todo.first() {
			let closure = &closures[&first];
			let (class, rest):(Vec<StateId>, Vec<StateId>) = todo.into_iter().partition(|s| closures[s] == *closure);
			classes.push(class.into_iter().collect());
			todo = rest;
		}
		Ok(EpsilonClosureContext { closures, classes })
	}

	pub fn closure(&self, s:StateId) -> Option<&BTreeSet<StateId>> {
		self.closures.get(&s)
	}

	/// The class of `s`, `s` included.
	pub fn equivalent_states(&self, s:StateId) -> Option<&BTreeSet<StateId>> {
		self.classes.iter().find(|c| c.contains(&s))
	}

	/// Whether another state of the class of `s` is still in `a`.
	pub fn equivalent_states_exist_for(&self, a:&Automaton, s:StateId) -> bool {
		match self.equivalent_states(s) {
			Some(class) => class.iter().any(|o| *o != s && a.state_exists(*o)),
			None => false,
		}
	}

	/// Whether any class still has two or more states in `a`.
	pub fn equivalent_states_exist(&self, a:&Automaton) -> bool {
		self.classes.iter().any(|c| c.iter().filter(|s| a.state_exists(**s)).count() > 1)
	}

	pub fn are_equivalent(&self, x:StateId, y:StateId) -> bool {
		match self.equivalent_states(x) {
			Some(class) => class.contains(&y),
			None => false,
		}
	}

	/// Forgets states that are no longer in `a`.
	pub fn retain_existing(&mut self, a:&Automaton) {
		self.closures.retain(|s, _| a.state_exists(*s));
		for class in self.classes.iter_mut() {
			class.retain(|s| a.state_exists(*s));
		}
		self.classes.retain(|c| !c.is_empty());
	}
}

/// Merges into `s` every state of its class. Transitions into the merged
/// states are redirected to `s` unless `s` already has one from the same
/// source with the same label. Only valid once the class has no ε
/// transitions left, at which point its states have the same outgoing
/// transitions.
pub fn remove_equivalent_states(a:&mut Automaton, ctx:&EpsilonClosureContext, s:StateId) -> Result<Command> {
	a.state(s)?;
	let class:BTreeSet<StateId> = match ctx.equivalent_states(s) {
		Some(c) => c.iter().copied().filter(|o| a.state_exists(*o)).collect(),
		None => BTreeSet::new(),
	};
	let removed:BTreeSet<StateId> = class.iter().copied().filter(|o| *o != s).collect();

	let mut incoming:Vec<Transition> = a.transitions().filter(|t| class.contains(&t.to())).cloned().collect();
	incoming.sort_by(|t1, t2| {
		t1.from().cmp(&t2.from())
			.then_with(|| t1.label().cmp(t2.label()))
			.then_with(|| (t1.to() != s).cmp(&(t2.to() != s)))
	});

	let mut commands = Vec::new();
	for t in &incoming {
		if removed.contains(&t.to()) {
			commands.push(Command::remove_transition(t.clone()));
		}
	}
	for r in &removed {
		for t in a.outgoing(*r)? {
			if !removed.contains(&t.to()) {
				commands.push(Command::remove_transition(t.clone()));
			}
		}
	}
	for r in &removed {
		commands.push(Command::remove_state(*r));
	}

	incoming.retain(|t| !removed.contains(&t.from()));
	incoming.dedup_by(|later, kept| later.from() == kept.from() && later.label() == kept.label());
	for t in incoming.into_iter().filter(|t| t.to() != s) {
		let redirected = a.create_transition(t.from(), s, t.label().clone());
		commands.push(Command::add_transition(redirected));
	}
	Ok(Command::composite(CompositeKind::RemoveEquivalentStates(s), commands))
}

/// Which set of NFA states each state created by
/// [`remove_non_determinism`] stands for.
#[derive(Clone,Debug,Default)]
pub struct SubsetContext {
	bindings:BTreeMap<StateId, (State, BTreeSet<StateId>)>,
}

impl SubsetContext {
	pub fn new() -> SubsetContext {
		SubsetContext::default()
	}

	pub fn find_state_from_set(&self, set:&BTreeSet<StateId>) -> Option<&State> {
		self.bindings.values().find(|(_, bound)| bound == set).map(|(state, _)| state)
	}

	pub fn binding(&self, s:StateId) -> Option<&BTreeSet<StateId>> {
		self.bindings.get(&s).map(|(_, set)| set)
	}

	/// Replaces every bound state of `reachable` by the states it stands for.
	pub fn reachable_to_set(&self, reachable:&BTreeSet<StateId>) -> BTreeSet<StateId> {
		let mut set = BTreeSet::new();
		for s in reachable {
			match self.binding(*s) {
				Some(bound) => set.extend(bound.iter().copied()),
				None => {
					set.insert(*s);
				},
			}
		}
		set
	}

	pub fn bind(&mut self, state:State, set:BTreeSet<StateId>) {
		self.bindings.insert(state.id(), (state, set));
	}

	pub fn unbind(&mut self, s:StateId) -> Option<BTreeSet<StateId>> {
		self.bindings.remove(&s).map(|(_, set)| set)
	}

	/// Drops bindings to sets that include a state no longer in `a`.
	pub fn retain_existing(&mut self, a:&Automaton) {
		self.bindings.retain(|_, (_, set)| set.iter().all(|s| a.state_exists(*s)));
	}

	pub fn len(&self) -> usize {
		self.bindings.len()
	}

	pub fn is_empty(&self) -> bool {
		self.bindings.is_empty()
	}
}

/// Replaces the transitions on `c` leaving `s` by one transition into the
/// state standing for the set of their destinations. That state is reused
/// when the set was seen before, and created otherwise with the outgoing
/// transitions of every destination.
pub fn remove_non_determinism(a:&mut Automaton, ctx:&mut SubsetContext, s:StateId, c:char) -> Result<Command> {
	let old:Vec<Transition> = a.outgoing(s)?.iter().filter(|t| t.label().symbol() == Some(c)).cloned().collect();
	let reachable:BTreeSet<StateId> = old.iter().map(|t| t.to()).collect();
	let mut commands:Vec<Command> = old.into_iter().map(Command::remove_transition).collect();

	let set = ctx.reachable_to_set(&reachable);
	let (target, fresh) = match ctx.find_state_from_set(&set) {
		Some(state) => (state.clone(), !a.state_exists(state.id())),
		None => {
			let state = a.create_state();
			trace!("state {} stands for {:?}", state.id(), set.iter().map(|s| s.index()).collect::<Vec<_>>());
			ctx.bind(state.clone(), set.clone());
			(state, true)
		},
	};

	if fresh {
		commands.push(Command::add_state(target.clone()));
		if set.iter().any(|o| a.state(*o).map(|st| st.is_accepting()).unwrap_or(false)) {
			commands.push(Command::set_accepting(target.id(), true));
		}
	}
	let link = a.create_transition(s, target.id(), Regex::single(c));
	commands.push(Command::add_transition(link));

	if fresh {
		let mut outgoing:Vec<Transition> = Vec::new();
		for r in &reachable {
			outgoing.extend(a.outgoing(*r)?.iter().cloned());
		}
		outgoing.sort_by(|t1, t2| t1.to().cmp(&t2.to()).then_with(|| t1.label().cmp(t2.label())));
		outgoing.dedup_by(|later, kept| later.to() == kept.to() && later.label() == kept.label());
		for t in outgoing {
			let copy = a.create_transition(target.id(), t.to(), t.label().clone());
			commands.push(Command::add_transition(copy));
		}
	}
	Ok(Command::composite(CompositeKind::RemoveNonDeterminism(s, c), commands))
}

/// Symbols that label more than one transition leaving `s`.
pub fn non_deterministic_symbols(a:&Automaton, s:StateId) -> Result<Vec<char>> {
	let mut counts:BTreeMap<char, usize> = BTreeMap::new();
	for t in a.outgoing(s)? {
		if let Some(c) = t.label().symbol() {
			if !t.is_epsilon() {
				*counts.entry(c).or_insert(0) += 1;
			}
		}
	}
	Ok(counts.into_iter().filter(|(_, n)| *n > 1).map(|(c, _)| c).collect())
}

pub fn has_non_determinism(a:&Automaton) -> Result<bool> {
	for s in a.state_ids() {
		if !non_deterministic_symbols(a, s)?.is_empty() {
			return Ok(true);
		}
	}
	Ok(false)
}

/// Removes every state the start state cannot reach.
pub fn remove_unreachable_states(a:&mut Automaton, mut history:Option<&mut CommandHistory>) -> Result<()> {
	for s in a.unreachable_states()? {
		if !a.state_exists(s) {
			continue;
		}
		let cmd = Command::remove_state_cleanly(a, s)?;
		history::execute(a, history.as_deref_mut(), cmd)?;
	}
	Ok(())
}

/// Turns an automaton whose labels are single symbols or ε into a DFA with
/// the same language. The result may be partial: a missing transition
/// rejects.
pub fn nfa_to_dfa(a:&mut Automaton, mut history:Option<&mut CommandHistory>) -> Result<()> {
	if let Some(t) = a.transitions().find(|t| !t.label().is_single_char()) {
		return Err(Error::CompoundLabel(t.id()));
	}

	let mut closures = EpsilonClosureContext::new(a)?;
	for s in a.state_ids() {
		if a.state_has_epsilon_transitions(s)? {
			let cmd = remove_epsilon_transitions(a, s)?;
			history::execute(a, history.as_deref_mut(), cmd)?;
		}
	}

	let mut order = a.state_ids();
	order.sort_by_key(|s| !a.is_start(*s));
	for s in order {
		if a.state_exists(s) && closures.equivalent_states_exist_for(a, s) {
			let cmd = remove_equivalent_states(a, &closures, s)?;
			history::execute(a, history.as_deref_mut(), cmd)?;
		}
	}
	remove_unreachable_states(a, history.as_deref_mut())?;
	closures.retain_existing(a);

	let mut subsets = SubsetContext::new();
	loop {
		let mut todo = None;
		for s in a.reachable_states(a.start_state(), |_| true)? {
			if let Some(c) = non_deterministic_symbols(a, s)?.first() {
				todo = Some((s, *c));
				break;
			}
		}
		let (s, c) = match todo {
			Some(next) => next,
			None => break,
		};
		let cmd = remove_non_determinism(a, &mut subsets, s, c)?;
		history::execute(a, history.as_deref_mut(), cmd)?;
	}
	remove_unreachable_states(a, history.as_deref_mut())?;
	subsets.retain_existing(a);

	debug!("dfa has {} states, {} subset states", a.num_states(), subsets.len());
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::breakdown::breakdown_to_completion;

	fn add_state(a:&mut Automaton, accepting:bool) -> StateId {
		let s = a.create_state();
		let id = s.id();
		a.add_state(s, vec![]).unwrap();
		if accepting {
			a.set_accepting(id, true).unwrap();
		}
		id
	}

	fn link(a:&mut Automaton, from:StateId, to:StateId, label:char) {
		let re = if label == 'e' { Regex::epsilon() } else { Regex::single(label) };
		let t = a.create_transition(from, to, re);
		a.add_transition(t).unwrap();
	}

	fn is_deterministic(a:&Automaton) -> bool {
		!a.has_epsilon_transitions() && !has_non_determinism(a).unwrap()
	}

	#[test]
	fn epsilon_removal_copies_closure_transitions() {
		let mut a = Automaton::new();
		let s0 = a.start_state();
		let s1 = add_state(&mut a, false);
		let s2 = add_state(&mut a, true);
		link(&mut a, s0, s1, 'e');
		link(&mut a, s1, s2, 'a');
		link(&mut a, s0, s2, 'a');
		link(&mut a, s1, s1, 'b');

		let mut cmd = remove_epsilon_transitions(&mut a, s0).unwrap();
		cmd.redo(&mut a).unwrap();
		assert!(!a.state_has_epsilon_transitions(s0).unwrap());
		// s0 -a-> s2 already existed, only the b loop is copied
		let labels:Vec<(String, StateId)> = a.outgoing(s0).unwrap().iter()
			.map(|t| (t.label().to_string(), t.to()))
			.collect();
		assert_eq!(labels, vec![("a".to_string(), s2), ("b".to_string(), s1)]);
		assert!(!a.is_accepting(s0).unwrap());

		cmd.undo(&mut a).unwrap();
		assert!(a.state_has_epsilon_transitions(s0).unwrap());
	}

	#[test]
	fn epsilon_removal_marks_accepting() {
		let mut a = Automaton::new();
		let s0 = a.start_state();
		let s1 = add_state(&mut a, true);
		link(&mut a, s0, s1, 'e');
		remove_epsilon_transitions(&mut a, s0).unwrap().redo(&mut a).unwrap();
		assert!(a.is_accepting(s0).unwrap());
		assert_eq!(a.num_transitions(), 0);
	}

	#[test]
	fn closure_classes() {
		let mut a = Automaton::new();
		let s0 = a.start_state();
		let s1 = add_state(&mut a, false);
		let s2 = add_state(&mut a, false);
		link(&mut a, s0, s1, 'e');
		link(&mut a, s1, s0, 'e');
		link(&mut a, s1, s2, 'a');

		let ctx = EpsilonClosureContext::new(&a).unwrap();
		assert!(ctx.are_equivalent(s0, s1));
		assert!(!ctx.are_equivalent(s0, s2));
		assert!(ctx.equivalent_states_exist(&a));
		assert!(ctx.equivalent_states_exist_for(&a, s1));
		assert!(!ctx.equivalent_states_exist_for(&a, s2));
		assert_eq!(ctx.closure(s2).unwrap().len(), 1);
	}

	#[test]
	fn equivalent_states_merge_into_one() {
		let mut a = Automaton::new();
		let s0 = a.start_state();
		let s1 = add_state(&mut a, false);
		let s2 = add_state(&mut a, true);
		link(&mut a, s0, s1, 'e');
		link(&mut a, s1, s0, 'e');
		link(&mut a, s1, s2, 'a');
		link(&mut a, s2, s1, 'b');

		let mut ctx = EpsilonClosureContext::new(&a).unwrap();
		for s in [s0, s1] {
			remove_epsilon_transitions(&mut a, s).unwrap().redo(&mut a).unwrap();
		}
		let mut cmd = remove_equivalent_states(&mut a, &ctx, s0).unwrap();
		cmd.redo(&mut a).unwrap();
		assert!(!a.state_exists(s1));
		assert_eq!(a.num_states(), 2);
		ctx.retain_existing(&a);
		assert!(!ctx.equivalent_states_exist(&a));

		for w in ["a", "aba", "ababa"] {
			assert!(a.accepts(w).unwrap(), "{}", w);
		}
		assert!(!a.accepts("ab").unwrap());

		cmd.undo(&mut a).unwrap();
		assert!(a.state_exists(s1));
	}

	#[test]
	fn subset_context_bindings() {
		let mut a = Automaton::new();
		let s0 = a.start_state();
		let s1 = add_state(&mut a, false);
		let synthetic = a.create_state();
		let sid = synthetic.id();

		let mut ctx = SubsetContext::new();
		let set:BTreeSet<StateId> = [s0, s1].into_iter().collect();
		ctx.bind(synthetic, set.clone());
		assert_eq!(ctx.find_state_from_set(&set).map(|s| s.id()), Some(sid));
		assert_eq!(ctx.binding(sid), Some(&set));

		let reachable:BTreeSet<StateId> = [sid].into_iter().collect();
		assert_eq!(ctx.reachable_to_set(&reachable), set);

		a.remove_state(s1).unwrap();
		ctx.retain_existing(&a);
		assert!(ctx.is_empty());
		assert_eq!(ctx.unbind(sid), None);
	}

	#[test]
	fn non_determinism_is_replaced_by_a_subset_state() {
		let mut a = Automaton::new();
		let s0 = a.start_state();
		let s1 = add_state(&mut a, false);
		let s2 = add_state(&mut a, true);
		link(&mut a, s0, s1, 'a');
		link(&mut a, s0, s2, 'a');
		link(&mut a, s1, s2, 'b');

		assert_eq!(non_deterministic_symbols(&a, s0).unwrap(), vec!['a']);
		let mut ctx = SubsetContext::new();
		let mut cmd = remove_non_determinism(&mut a, &mut ctx, s0, 'a').unwrap();
		cmd.redo(&mut a).unwrap();
		assert!(!has_non_determinism(&a).unwrap());
		assert_eq!(ctx.len(), 1);
		let target = a.outgoing(s0).unwrap()[0].to();
		assert!(a.is_accepting(target).unwrap());
		assert!(a.accepts("a").unwrap());
		assert!(a.accepts("ab").unwrap());

		// undoing removes the subset state, redoing the same set re-adds it
		cmd.undo(&mut a).unwrap();
		assert!(!a.state_exists(target));
		let mut again = remove_non_determinism(&mut a, &mut ctx, s0, 'a').unwrap();
		again.redo(&mut a).unwrap();
		assert_eq!(a.outgoing(s0).unwrap()[0].to(), target);
		assert_eq!(ctx.len(), 1);
	}

	#[test]
	fn nfa_to_dfa_keeps_the_language() {
		let mut a = Automaton::from_regex(&Regex::parse("(a|b)*abb").unwrap().unwrap());
		breakdown_to_completion(&mut a, None).unwrap();
		let mut h = CommandHistory::new();
		nfa_to_dfa(&mut a, Some(&mut h)).unwrap();
		assert!(is_deterministic(&a));
		assert!(a.unreachable_states().unwrap().is_empty());

		for w in ["abb", "aabb", "babb", "ababb", "bbabb"] {
			assert!(a.accepts(w).unwrap(), "{}", w);
		}
		for w in ["", "ab", "abba", "bbb", "abab"] {
			assert!(!a.accepts(w).unwrap(), "{}", w);
		}

		let dfa = a.to_string();
		h.seek_idx(&mut a, 0).unwrap();
		assert!(!is_deterministic(&a));
		h.seek_idx(&mut a, h.len()).unwrap();
		assert_eq!(a.to_string(), dfa);
	}

	#[test]
	fn nfa_to_dfa_requires_broken_down_labels() {
		let mut a = Automaton::from_regex(&Regex::parse("ab").unwrap().unwrap());
		assert!(matches!(nfa_to_dfa(&mut a, None), Err(Error::CompoundLabel(_))));
	}
}
