use std::fmt;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};

use log::trace;

use crate::error::{Error, Result};
use crate::regex::Regex;

static NEXT_OWNER: AtomicU32 = AtomicU32::new(0);

/// Handle to a state. Only meaningful for the automaton that created it.
#[derive(Clone,Copy,Debug,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub struct StateId {
	owner:u32,
	index:u32,
}

impl StateId {
	pub fn index(self) -> u32 {
		self.index
	}
}

impl fmt::Display for StateId {
	fn fmt(&self, f:&mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.index)
	}
}

/// Handle to a transition. Only meaningful for the automaton that created it.
#[derive(Clone,Copy,Debug,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub struct TransitionId {
	owner:u32,
	index:u32,
}

impl TransitionId {
	pub fn index(self) -> u32 {
		self.index
	}
}

impl fmt::Display for TransitionId {
	fn fmt(&self, f:&mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.index)
	}
}

#[derive(Clone,Debug,PartialEq,Eq)]
pub struct State {
	id:StateId,
	accepting:bool,
}

impl State {
	pub fn id(&self) -> StateId {
		self.id
	}

	pub fn is_accepting(&self) -> bool {
		self.accepting
	}
}

#[derive(Clone,Debug,PartialEq,Eq)]
pub struct Transition {
	id:TransitionId,
	from:StateId,
	to:StateId,
	label:Regex,
}

impl Transition {
	pub fn id(&self) -> TransitionId {
		self.id
	}

	pub fn from(&self) -> StateId {
		self.from
	}

	pub fn to(&self) -> StateId {
		self.to
	}

	pub fn label(&self) -> &Regex {
		&self.label
	}

	pub fn is_epsilon(&self) -> bool {
		self.label.is_epsilon()
	}

	pub fn is_loop(&self) -> bool {
		self.from == self.to
	}
}

impl fmt::Display for Transition {
	fn fmt(&self, f:&mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} -{}-> {}", self.from, self.label, self.to)
	}
}

#[derive(Clone,Debug)]
struct StateEntry {
	state:State,
	// kept sorted by transition id
	transitions:Vec<Transition>,
}

/// The graph of states and labelled transitions every conversion edits.
///
/// States and transitions are created with [`Automaton::create_state`] and
/// [`Automaton::create_transition`], which only allocate an id, and are then
/// committed with [`Automaton::add_state`] and [`Automaton::add_transition`].
/// Ids come from monotonic counters and are never handed out twice, so a
/// handle to something that was removed can never alias something new.
#[derive(Debug)]
pub struct Automaton {
	owner:u32,
	start:StateId,
	state_counter:u32,
	transition_counter:u32,
	graph:BTreeMap<StateId, StateEntry>,
}

impl Automaton {
	pub fn new() -> Automaton {
		let owner = NEXT_OWNER.fetch_add(1, Ordering::Relaxed);
		let start = StateId { owner, index: 0 };
		let mut a = Automaton {
			owner,
			start,
			state_counter: 0,
			transition_counter: 0,
			graph: BTreeMap::new(),
		};
		a.reset_start();
		return a;
	}

	/// A start state joined to a single accepting state by one transition
	/// labelled `re`.
	pub fn from_regex(re:&Regex) -> Automaton {
		let mut a = Automaton::new();
		let mut end = a.create_state();
		end.accepting = true;
		let end_id = end.id;
		a.graph.insert(end_id, StateEntry { state: end, transitions: Vec::new() });
		let t = a.create_transition(a.start, end_id, re.clone());
		let start = a.start;
		if let Some(entry) = a.graph.get_mut(&start) {
			entry.transitions.push(t);
		}
		return a;
	}

	/// Drops every state and transition and creates a fresh start state.
	/// Id counters keep counting.
	pub fn clear(&mut self) {
		self.graph.clear();
		self.reset_start();
	}

	fn reset_start(&mut self) {
		let start = self.create_state();
		self.start = start.id;
		self.graph.insert(start.id, StateEntry { state: start, transitions: Vec::new() });
	}

	pub fn start_state(&self) -> StateId {
		self.start
	}

	/// Allocates a new non-accepting state. It is not part of the graph until
	/// passed to [`Automaton::add_state`].
	pub fn create_state(&mut self) -> State {
		let id = StateId { owner: self.owner, index: self.state_counter };
		self.state_counter += 1;
		State { id, accepting: false }
	}

	/// Allocates a new transition. It is not part of the graph until passed
	/// to [`Automaton::add_transition`].
	pub fn create_transition(&mut self, from:StateId, to:StateId, label:Regex) -> Transition {
		let id = TransitionId { owner: self.owner, index: self.transition_counter };
		self.transition_counter += 1;
		Transition { id, from, to, label }
	}

	fn check_state_owner(&self, id:StateId) -> Result<()> {
		if id.owner != self.owner {
			return Err(Error::ForeignHandle(format!("state {}", id)));
		}
		Ok(())
	}

	fn check_transition_owner(&self, id:TransitionId) -> Result<()> {
		if id.owner != self.owner {
			return Err(Error::ForeignHandle(format!("transition {}", id)));
		}
		Ok(())
	}

	fn entry(&self, id:StateId) -> Result<&StateEntry> {
		self.check_state_owner(id)?;
		self.graph.get(&id).ok_or(Error::StateNotFound(id))
	}

	/// Commits `state` together with its outgoing `transitions`. Self-loops are
	/// allowed, every other destination must already exist.
	pub fn add_state(&mut self, state:State, transitions:Vec<Transition>) -> Result<()> {
		self.check_state_owner(state.id)?;
		if self.graph.contains_key(&state.id) {
			return Err(Error::DuplicateState(state.id));
		}
		let mut transitions = transitions;
		transitions.sort_by_key(|t| t.id);
		for t in &transitions {
			self.check_transition_owner(t.id)?;
			self.check_state_owner(t.to)?;
			if t.from != state.id {
				return Err(Error::MisplacedTransition { transition: t.id, state: state.id });
			}
			if t.to != state.id && !self.graph.contains_key(&t.to) {
				return Err(Error::StateNotFound(t.to));
			}
		}
		// the state is new, so only the list itself can repeat an id
		if let Some(pair) = transitions.windows(2).find(|pair| pair[0].id == pair[1].id) {
			return Err(Error::DuplicateTransition(pair[0].id));
		}

		trace!("add state {}", state.id);
		self.graph.insert(state.id, StateEntry { state, transitions });
		Ok(())
	}

	/// Removes a state and returns it with its outgoing transitions. The start
	/// state cannot be removed, and neither can a state that other states
	/// still have transitions into.
	pub fn remove_state(&mut self, id:StateId) -> Result<(State, Vec<Transition>)> {
		self.check_state_owner(id)?;
		if id == self.start {
			return Err(Error::RemoveStartState);
		}
		if !self.graph.contains_key(&id) {
			return Err(Error::StateNotFound(id));
		}
		if self.incoming(id)?.iter().any(|t| t.from != id) {
			return Err(Error::DanglingTransitions(id));
		}

		trace!("remove state {}", id);
		match self.graph.remove(&id) {
			Some(entry) => Ok((entry.state, entry.transitions)),
			None => Err(Error::StateNotFound(id)),
		}
	}

	pub fn add_transition(&mut self, t:Transition) -> Result<()> {
		self.check_transition_owner(t.id)?;
		self.check_state_owner(t.from)?;
		self.check_state_owner(t.to)?;
		if !self.graph.contains_key(&t.to) {
			return Err(Error::StateNotFound(t.to));
		}

		let entry = self.graph.get_mut(&t.from).ok_or(Error::StateNotFound(t.from))?;
		match entry.transitions.binary_search_by_key(&t.id, |o| o.id) {
			Ok(_) => Err(Error::DuplicateTransition(t.id)),
			Err(pos) => {
				trace!("add transition {} ({})", t.id, t);
				entry.transitions.insert(pos, t);
				Ok(())
			},
		}
	}

	/// Removes the transition `id` leaving `from`.
	pub fn remove_transition(&mut self, from:StateId, id:TransitionId) -> Result<Transition> {
		self.check_transition_owner(id)?;
		self.check_state_owner(from)?;
		let entry = self.graph.get_mut(&from).ok_or(Error::TransitionNotFound(id))?;
		match entry.transitions.binary_search_by_key(&id, |t| t.id) {
			Ok(pos) => {
				trace!("remove transition {}", id);
				Ok(entry.transitions.remove(pos))
			},
			Err(_) => Err(Error::TransitionNotFound(id)),
		}
	}

	/// Sets the accepting flag of a state, returning the previous value.
	pub fn set_accepting(&mut self, id:StateId, accepting:bool) -> Result<bool> {
		self.check_state_owner(id)?;
		let entry = self.graph.get_mut(&id).ok_or(Error::StateNotFound(id))?;
		let previous = entry.state.accepting;
		entry.state.accepting = accepting;
		Ok(previous)
	}

	fn find_transition(&self, id:TransitionId) -> Option<&Transition> {
		self.graph.values().flat_map(|e| e.transitions.iter()).find(|t| t.id == id)
	}

	pub fn state(&self, id:StateId) -> Result<&State> {
		Ok(&self.entry(id)?.state)
	}

	/// Looks a state up by the number shown in dumps and step lists.
	pub fn state_by_index(&self, index:u32) -> Option<StateId> {
		let id = StateId { owner: self.owner, index };
		if self.graph.contains_key(&id) {
			Some(id)
		} else {
			None
		}
	}

	pub fn transition(&self, id:TransitionId) -> Result<&Transition> {
		self.check_transition_owner(id)?;
		self.find_transition(id).ok_or(Error::TransitionNotFound(id))
	}

	/// States in id order.
	pub fn states(&self) -> impl Iterator<Item = &State> + '_ {
		self.graph.values().map(|e| &e.state)
	}

	pub fn state_ids(&self) -> Vec<StateId> {
		self.graph.keys().copied().collect()
	}

	/// Every transition, grouped by source state in id order.
	pub fn transitions(&self) -> impl Iterator<Item = &Transition> + '_ {
		self.graph.values().flat_map(|e| e.transitions.iter())
	}

	pub fn outgoing(&self, id:StateId) -> Result<&[Transition]> {
		Ok(&self.entry(id)?.transitions)
	}

	/// Transitions ending at `id`, self-loops included.
	pub fn incoming(&self, id:StateId) -> Result<Vec<Transition>> {
		self.entry(id)?;
		Ok(self.transitions().filter(|t| t.to == id).cloned().collect())
	}

	pub fn has_outgoing(&self, id:StateId) -> Result<bool> {
		Ok(!self.outgoing(id)?.is_empty())
	}

	pub fn has_incoming(&self, id:StateId) -> Result<bool> {
		self.entry(id)?;
		Ok(self.transitions().any(|t| t.to == id))
	}

	pub fn state_exists(&self, id:StateId) -> bool {
		id.owner == self.owner && self.graph.contains_key(&id)
	}

	pub fn is_accepting(&self, id:StateId) -> Result<bool> {
		Ok(self.state(id)?.accepting)
	}

	pub fn is_start(&self, id:StateId) -> bool {
		id == self.start
	}

	pub fn num_states(&self) -> usize {
		self.graph.len()
	}

	pub fn num_transitions(&self) -> usize {
		self.graph.values().map(|e| e.transitions.len()).sum()
	}

	pub fn has_accepting_state(&self) -> bool {
		self.states().any(|s| s.accepting)
	}

	pub fn has_epsilon_transitions(&self) -> bool {
		self.transitions().any(|t| t.is_epsilon())
	}

	pub fn state_has_epsilon_transitions(&self, id:StateId) -> Result<bool> {
		Ok(self.outgoing(id)?.iter().any(|t| t.is_epsilon()))
	}

	/// States reachable from `from` (itself included) following only the
	/// transitions `follow` accepts.
	pub fn reachable_states<F>(&self, from:StateId, follow:F) -> Result<BTreeSet<StateId>>
	where F: Fn(&Transition) -> bool
	{
		self.entry(from)?;
		let mut seen = BTreeSet::new();
		let mut queue = VecDeque::new();
		seen.insert(from);
		queue.push_back(from);
		while let Some(s) = queue.pop_front() {
			for t in self.outgoing(s)? {
				if follow(t) && seen.insert(t.to) {
					queue.push_back(t.to);
				}
			}
		}
		Ok(seen)
	}

	/// States reachable from `id` through ε transitions alone, `id` included.
	pub fn epsilon_closure(&self, id:StateId) -> Result<BTreeSet<StateId>> {
		self.reachable_states(id, |t| t.is_epsilon())
	}

	/// States that no path from the start state reaches, in id order.
	pub fn unreachable_states(&self) -> Result<Vec<StateId>> {
		let reachable = self.reachable_states(self.start, |_| true)?;
		Ok(self.graph.keys().filter(|id| !reachable.contains(id)).copied().collect())
	}

	/// Runs `word` through the automaton. Every label must be a single symbol
	/// or ε, so this is only usable before a breakdown starts or after it
	/// finished.
	pub fn accepts(&self, word:&str) -> Result<bool> {
		if let Some(t) = self.transitions().find(|t| !t.label.is_single_char()) {
			return Err(Error::CompoundLabel(t.id));
		}

		let mut current = self.epsilon_closure(self.start)?;
		for c in word.chars() {
			let mut next = BTreeSet::new();
			for s in &current {
				for t in self.outgoing(*s)? {
					if t.label.symbol() == Some(c) && !t.is_epsilon() {
						next.extend(self.epsilon_closure(t.to)?);
					}
				}
			}
			if next.is_empty() {
				return Ok(false);
			}
			current = next;
		}

		for s in &current {
			if self.is_accepting(*s)? {
				return Ok(true);
			}
		}
		return Ok(false);
	}
}

/// The clone is a separate automaton with its own owner id, so handles of
/// one are foreign to the other. Indexes are kept: use
/// [`Automaton::state_by_index`] to find a state again in the clone.
impl Clone for Automaton {
	fn clone(&self) -> Automaton {
		let owner = NEXT_OWNER.fetch_add(1, Ordering::Relaxed);
		let rehome = |id:StateId| StateId { owner, index: id.index };

		let mut graph = BTreeMap::new();
		for entry in self.graph.values() {
			let state = State { id: rehome(entry.state.id), accepting: entry.state.accepting };
			let transitions = entry.transitions.iter().map(|t| Transition {
				id: TransitionId { owner, index: t.id.index },
				from: rehome(t.from),
				to: rehome(t.to),
				label: t.label.clone(),
			}).collect();
			graph.insert(state.id, StateEntry { state, transitions });
		}

		Automaton {
			owner,
			start: rehome(self.start),
			state_counter: self.state_counter,
			transition_counter: self.transition_counter,
			graph,
		}
	}
}

impl Default for Automaton {
	fn default() -> Self {
		Automaton::new()
	}
}

impl fmt::Display for Automaton {
	fn fmt(&self, f:&mut fmt::Formatter<'_>) -> fmt::Result {
		let mut output = String::new();
		output.push_str("start ");
		output.push_str(&self.start.to_string());
		for entry in self.graph.values() {
			output.push('\n');
			output.push_str(&entry.state.id.to_string());
			output.push_str(": ");
			for t in &entry.transitions {
				output.push_str(&t.label.to_string());
				output.push(':');
				output.push_str(&t.to.to_string());
				output.push(',');
			}
			output.push_str(&entry.state.accepting.to_string());
		}
		write!(f, "{}", output)
	}
}
