//! Algebraic simplification of expressions.
//!
//! The rewrite is bottom-up: children are simplified first, then the rules
//! for the parent's operator are applied. Rules only ever shrink the tree, so
//! the helpers below may call each other on their results without looping.

use std::collections::BTreeSet;

use crate::regex::{Operator, Regex};

impl Regex {
	/// Simplifies the whole tree. `x.optimise().optimise() == x.optimise()`.
	pub fn optimise(&self) -> Regex {
		self.optimise_to_depth(usize::MAX)
	}

	/// Simplifies only the top `depth` levels of the tree, deeper subtrees are
	/// taken as they are. A depth of zero returns the expression unchanged.
	pub fn optimise_to_depth(&self, depth:usize) -> Regex {
		if depth == 0 {
			return self.clone();
		}
		let child = |r:&Regex| r.optimise_to_depth(depth - 1);

		match self {
			Regex::Single(_) => self.clone(),
			Regex::KleeneStar(r) => optimise_star(child(r)),
			Regex::KleenePlus(r) => optimise_plus(child(r)),
			Regex::QMark(r) => optimise_option(child(r)),
			Regex::Concat(ops) => optimise_sequence(ops.iter().map(child).collect()),
			Regex::Or(ops) => optimise_choice(ops.iter().map(child).collect()),
		}
	}
}

fn optimise_star(r:Regex) -> Regex {
	if r.is_epsilon() {
		return r;
	}
	match &r {
		// (r*)*, (r+)*, (r?)* are all r*
		Regex::KleeneStar(inner) | Regex::KleenePlus(inner) | Regex::QMark(inner) => {
			optimise_star(inner.as_ref().clone())
		},
		Regex::Concat(ops) if r.is_nullable() => star_of_choice(ops),
		Regex::Or(ops) if ops.iter().any(|o| o.operator().is_unary() || o.is_epsilon()) => {
			star_of_choice(ops)
		},
		_ => Regex::star(r.clone()),
	}
}

fn optimise_plus(r:Regex) -> Regex {
	if r.is_epsilon() {
		return r;
	}
	match &r {
		Regex::KleeneStar(inner) | Regex::QMark(inner) => optimise_star(inner.as_ref().clone()),
		Regex::KleenePlus(_) => r.clone(),
		_ => Regex::plus(r.clone()),
	}
}

fn optimise_option(r:Regex) -> Regex {
	if r.is_nullable() {
		return r;
	}
	match &r {
		Regex::KleenePlus(inner) => optimise_star(inner.as_ref().clone()),
		_ => Regex::option(r.clone()),
	}
}

// (a*b*)* and (a*|b)* both become (a|b)*
fn star_of_choice(ops:&[Regex]) -> Regex {
	let stripped:Vec<Regex> = ops.iter()
		.filter(|r| !r.is_epsilon())
		.map(strip_iteration)
		.collect();
	if stripped.is_empty() {
		return Regex::epsilon();
	}
	optimise_star(optimise_choice(stripped))
}

fn strip_iteration(r:&Regex) -> Regex {
	let mut r = r;
	while r.operator().is_unary() {
		r = &r.operands()[0];
	}
	r.clone()
}

fn optimise_sequence(ops:Vec<Regex>) -> Regex {
	let mut flat:Vec<Regex> = Vec::with_capacity(ops.len());
	for r in ops {
		match r {
			Regex::Concat(inner) => flat.extend(inner.iter().filter(|r| !r.is_epsilon()).cloned()),
			r if r.is_epsilon() => (),
			r => flat.push(r),
		}
	}
	if flat.is_empty() {
		return Regex::epsilon();
	}

	let forward = merge_neighbours(flat);
	let mut backward = merge_neighbours(forward.into_iter().rev().collect());
	backward.reverse();
	Regex::concat(backward)
}

// Single pass that keeps merging the newest element into its left neighbour
// for as long as the pair collapses.
fn merge_neighbours(ops:Vec<Regex>) -> Vec<Regex> {
	let mut out:Vec<Regex> = Vec::with_capacity(ops.len());
	for r in ops {
		let mut cur = r;
		while let Some(merged) = out.last().and_then(|last| merge_pair(last, &cur)) {
			out.pop();
			cur = merged;
		}
		out.push(cur);
	}
	out
}

fn merge_pair(x:&Regex, y:&Regex) -> Option<Regex> {
	use Operator::*;

	let (xo, yo) = (x.operator(), y.operator());
	if xo.is_unary() && yo.is_unary() {
		let c = &x.operands()[0];
		if *c != y.operands()[0] {
			return None;
		}
		return match (xo, yo) {
			(KleeneStar, KleeneStar) | (KleeneStar, QMark) | (QMark, KleeneStar) => Some(Regex::star(c.clone())),
			(KleeneStar, KleenePlus) | (KleenePlus, KleeneStar)
				| (KleenePlus, QMark) | (QMark, KleenePlus) => Some(Regex::plus(c.clone())),
			_ => None,
		};
	}

	// r*r and rr* are r+
	if xo == KleeneStar && x.operands()[0] == *y {
		return Some(Regex::plus(y.clone()));
	}
	if yo == KleeneStar && y.operands()[0] == *x {
		return Some(Regex::plus(x.clone()));
	}
	None
}

fn optimise_choice(ops:Vec<Regex>) -> Regex {
	let mut flat:Vec<Regex> = Vec::with_capacity(ops.len());
	for r in ops {
		match r {
			Regex::Or(inner) => flat.extend(inner.iter().cloned()),
			r => flat.push(r),
		}
	}

	let mut seen = BTreeSet::new();
	let unique:Vec<Regex> = flat.into_iter().filter(|r| seen.insert(r.clone())).collect();
	Regex::or(unique)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn opt(s:&str) -> String {
		Regex::parse(s).unwrap().unwrap().optimise().to_string()
	}

	#[test]
	fn nested_iterations_collapse() {
		assert_eq!(opt("a**"), "a*");
		assert_eq!(opt("(a*)+"), "a*");
		assert_eq!(opt("(a?)*"), "a*");
		assert_eq!(opt("(a+)+"), "a+");
		assert_eq!(opt("(a+)*"), "a*");
		assert_eq!(opt("(a+)?"), "a*");
		assert_eq!(opt("(a?)+"), "a*");
		assert_eq!(opt("(a?)?"), "a?");
		assert_eq!(opt("(a*)?"), "a*");
		assert_eq!(opt("(ab)***"), "(ab)*");
	}

	#[test]
	fn option_of_nullable_is_dropped() {
		assert_eq!(opt("(a*b?)?"), "a*b?");
		assert_eq!(opt("(a|ε)?"), "a|ε");
	}

	#[test]
	fn sequence_neighbours_merge() {
		assert_eq!(opt("a*a?"), "a*");
		assert_eq!(opt("a+a*"), "a+");
		assert_eq!(opt("a*a*a*"), "a*");
		assert_eq!(opt("a*a"), "a+");
		assert_eq!(opt("aa*"), "a+");
		assert_eq!(opt("a?aa*"), "a+");
		assert_eq!(opt("ba*a?c"), "ba*c");
		assert_eq!(opt("a?a?"), "a?a?");
		assert_eq!(opt("a+a+"), "a+a+");
	}

	#[test]
	fn epsilon_is_dropped_from_sequences() {
		assert_eq!(opt("εaε"), "a");
		assert_eq!(opt("εε"), "ε");
		assert_eq!(opt("ε*"), "ε");
	}

	#[test]
	fn choice_keeps_first_occurrence() {
		assert_eq!(opt("b|a|a"), "b|a");
		assert_eq!(opt("a|a"), "a");
		assert_eq!(opt("c|(a|c)|b|a"), "c|a|b");
	}

	#[test]
	fn star_of_nullable_sequence_becomes_choice() {
		assert_eq!(opt("(a*b*)*"), "(a|b)*");
		assert_eq!(opt("(a*|b)*"), "(a|b)*");
		assert_eq!(opt("(a?b*c*)*"), "(a|b|c)*");
		assert_eq!(opt("(a|ε)*"), "a*");
		assert_eq!(opt("((ab)*a*)*"), "(ab|a)*");
		assert_eq!(opt("(a*a?)*"), "a*");
		assert_eq!(opt("(ab*)*"), "(ab*)*");
	}

	#[test]
	fn optimise_is_idempotent_on_samples() {
		for s in ["(a*b*)*c", "(a|b|a)*(a|b)", "((a?)+b*)*|c", "a*a?a+a*", "(ε|a*)(b+)?", "((a|b)*c?)+"] {
			let once = Regex::parse(s).unwrap().unwrap().optimise();
			assert_eq!(once.optimise(), once, "not idempotent for {}", s);
		}
	}

	#[test]
	fn depth_limit_leaves_deep_subtrees() {
		let re = Regex::parse("a(b**)").unwrap().unwrap();
		assert_eq!(re.optimise_to_depth(0), re);
		assert_eq!(re.optimise_to_depth(1).to_string(), "ab**");
		assert_eq!(re.optimise_to_depth(2).to_string(), "ab*");
	}
}
