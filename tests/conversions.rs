use automata_steps::breakdown::breakdown_to_completion;
use automata_steps::dfa::{has_non_determinism, nfa_to_dfa};
use automata_steps::elimination::nfa_to_regex;
use automata_steps::{Automaton, CommandHistory, Regex};

fn init() {
	let _ = env_logger::builder().is_test(true).try_init();
}

fn parse(s:&str) -> Regex {
	Regex::parse(s).unwrap().unwrap()
}

fn nfa(re:&Regex) -> Automaton {
	let mut a = Automaton::from_regex(re);
	breakdown_to_completion(&mut a, None).unwrap();
	a
}

// every word over {a, b} up to length 5
fn words() -> Vec<String> {
	let mut all = vec![String::new()];
	let mut last = vec![String::new()];
	for _ in 0..5 {
		let mut next = Vec::new();
		for w in &last {
			for c in ['a', 'b'] {
				next.push(format!("{}{}", w, c));
			}
		}
		all.extend(next.iter().cloned());
		last = next;
	}
	all
}

fn language(a:&Automaton) -> Vec<bool> {
	words().iter().map(|w| a.accepts(w).unwrap()).collect()
}

const SAMPLES:[&str; 10] = [
	"a",
	"ab",
	"a|b",
	"(a|b)*abb",
	"a*b*",
	"(ab|ba)+",
	"a?b?a",
	"((a|b)(a|b))*",
	"(a*b)*a",
	"b(aε)?|a+",
];

#[test]
fn regex_to_nfa_to_regex_keeps_the_language() {
	init();
	for s in SAMPLES {
		let re = parse(s);
		let expected = language(&nfa(&re));

		let mut a = nfa(&re);
		let back = nfa_to_regex(&mut a, None).unwrap().unwrap();
		assert_eq!(language(&nfa(&back)), expected, "{} came back as {}", s, back);
	}
}

#[test]
fn dfa_keeps_the_language() {
	init();
	for s in SAMPLES {
		let re = parse(s);
		let mut a = nfa(&re);
		let expected = language(&a);

		nfa_to_dfa(&mut a, None).unwrap();
		assert!(!a.has_epsilon_transitions(), "{}", s);
		assert!(!has_non_determinism(&a).unwrap(), "{}", s);
		assert_eq!(language(&a), expected, "{}", s);
	}
}

#[test]
fn dfa_then_regex() {
	init();
	let re = parse("(a|b)*abb");
	let mut a = nfa(&re);
	let expected = language(&a);
	nfa_to_dfa(&mut a, None).unwrap();

	let back = nfa_to_regex(&mut a, None).unwrap().unwrap();
	assert_eq!(language(&nfa(&back)), expected);
}

#[test]
fn every_step_replays_to_the_same_automaton() {
	init();
	let mut a = Automaton::from_regex(&parse("(ab|b)*a?"));
	let initial = a.to_string();
	let mut h = CommandHistory::new();

	breakdown_to_completion(&mut a, Some(&mut h)).unwrap();
	let broken_down = h.len();
	let nfa_dump = a.to_string();
	nfa_to_dfa(&mut a, Some(&mut h)).unwrap();
	let dfa_dump = a.to_string();
	assert!(h.len() > broken_down);

	h.seek_idx(&mut a, 0).unwrap();
	assert_eq!(a.to_string(), initial);
	h.seek_idx(&mut a, broken_down).unwrap();
	assert_eq!(a.to_string(), nfa_dump);
	h.seek_idx(&mut a, h.len()).unwrap();
	assert_eq!(a.to_string(), dfa_dump);

	// undo and redo one step at a time
	for _ in 0..h.len() {
		h.prev(&mut a).unwrap();
	}
	assert_eq!(a.to_string(), initial);
	for _ in 0..h.len() {
		h.next(&mut a).unwrap();
	}
	assert_eq!(a.to_string(), dfa_dump);
}

#[test]
fn empty_language_has_no_regex() {
	init();
	let mut a = Automaton::new();
	let s = a.create_state();
	let id = s.id();
	a.add_state(s, Vec::new()).unwrap();
	a.set_accepting(id, true).unwrap();
	assert_eq!(nfa_to_regex(&mut a, None).unwrap(), None);
}
