use std::fmt;
use std::rc::Rc;

use crate::error::ParseError;

/// Symbol used for the empty word, both in labels and in parsed text.
pub const EPSILON: char = 'ε';

/// Top level operator of an expression node.
#[derive(Clone,Copy,Debug,PartialEq,Eq,Hash)]
pub enum Operator {
	Single,
	KleeneStar,
	KleenePlus,
	QMark,
	Concat,
	Or,
}

impl Operator {
	/// Binding strength, higher binds tighter.
	pub fn precedence(self) -> u8 {
		match self {
			Operator::Single => 3,
			Operator::KleeneStar | Operator::KleenePlus | Operator::QMark => 2,
			Operator::Concat => 1,
			Operator::Or => 0,
		}
	}

	pub fn is_unary(self) -> bool {
		self.precedence() == 2
	}

	pub fn name(self) -> &'static str {
		match self {
			Operator::Single => "single symbol",
			Operator::KleeneStar => "star",
			Operator::KleenePlus => "plus",
			Operator::QMark => "option",
			Operator::Concat => "sequence",
			Operator::Or => "choice",
		}
	}
}

/// An immutable regular expression tree. Subtrees are shared through `Rc`, so
/// cloning is cheap.
///
/// `Concat` and `Or` always hold at least two operands and never directly hold
/// an operand of their own kind; build them with [`Regex::concat`] and
/// [`Regex::or`] to keep that true.
///
/// The derived ordering is the total order used for deduplication: variant
/// rank first, then the symbol or the operands compared lexicographically.
#[derive(Clone,Debug,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub enum Regex {
	Single(char),
	KleeneStar(Rc<Regex>),
	KleenePlus(Rc<Regex>),
	QMark(Rc<Regex>),
	Concat(Rc<[Regex]>),
	Or(Rc<[Regex]>),
}

impl Regex {
	pub fn single(c:char) -> Regex {
		Regex::Single(c)
	}

	pub fn epsilon() -> Regex {
		Regex::Single(EPSILON)
	}

	pub fn star(r:Regex) -> Regex {
		Regex::KleeneStar(Rc::new(r))
	}

	pub fn plus(r:Regex) -> Regex {
		Regex::KleenePlus(Rc::new(r))
	}

	pub fn option(r:Regex) -> Regex {
		Regex::QMark(Rc::new(r))
	}

	/// Sequence of the operands, flattening nested sequences. A single operand
	/// is returned as is.
	///
	/// # Panics
	///
	/// Panics if `operands` is empty.
	pub fn concat(operands:Vec<Regex>) -> Regex {
		Regex::nary(Operator::Concat, operands)
	}

	/// Choice between the operands, flattening nested choices. A single operand
	/// is returned as is.
	///
	/// # Panics
	///
	/// Panics if `operands` is empty.
	pub fn or(operands:Vec<Regex>) -> Regex {
		Regex::nary(Operator::Or, operands)
	}

	fn nary(op:Operator, operands:Vec<Regex>) -> Regex {
		assert!(!operands.is_empty(), "a {} needs at least one operand", op.name());

		let mut flat:Vec<Regex> = Vec::with_capacity(operands.len());
		for r in operands {
			match (op, r) {
				(Operator::Concat, Regex::Concat(inner)) => flat.extend(inner.iter().cloned()),
				(Operator::Or, Regex::Or(inner)) => flat.extend(inner.iter().cloned()),
				(_, other) => flat.push(other),
			}
		}

		if flat.len() == 1 {
			if let Some(only) = flat.pop() {
				return only;
			}
		}
		match op {
			Operator::Concat => Regex::Concat(flat.into()),
			_ => Regex::Or(flat.into()),
		}
	}

	pub fn operator(&self) -> Operator {
		match self {
			Regex::Single(_) => Operator::Single,
			Regex::KleeneStar(_) => Operator::KleeneStar,
			Regex::KleenePlus(_) => Operator::KleenePlus,
			Regex::QMark(_) => Operator::QMark,
			Regex::Concat(_) => Operator::Concat,
			Regex::Or(_) => Operator::Or,
		}
	}

	/// Children of this node, empty for a single symbol.
	pub fn operands(&self) -> &[Regex] {
		match self {
			Regex::Single(_) => &[],
			Regex::KleeneStar(r) | Regex::KleenePlus(r) | Regex::QMark(r) => std::slice::from_ref(r.as_ref()),
			Regex::Concat(ops) | Regex::Or(ops) => ops,
		}
	}

	pub fn is_single_char(&self) -> bool {
		matches!(self, Regex::Single(_))
	}

	/// The symbol of a single symbol node.
	pub fn symbol(&self) -> Option<char> {
		match self {
			Regex::Single(c) => Some(*c),
			_ => None,
		}
	}

	pub fn is_epsilon(&self) -> bool {
		*self == Regex::Single(EPSILON)
	}

	/// Whether the empty word is in the language of this expression.
	pub fn is_nullable(&self) -> bool {
		match self {
			Regex::Single(c) => *c == EPSILON,
			Regex::KleeneStar(_) | Regex::QMark(_) => true,
			Regex::KleenePlus(r) => r.is_nullable(),
			Regex::Concat(ops) => ops.iter().all(|r| r.is_nullable()),
			Regex::Or(ops) => ops.iter().any(|r| r.is_nullable()),
		}
	}

	/// Height of the operator tree, a single symbol has depth 0.
	pub fn depth(&self) -> usize {
		self.operands().iter().map(|r| r.depth() + 1).max().unwrap_or(0)
	}

	/// Parses `text`. Whitespace is ignored and every other character that is
	/// not one of `()|*+?` is a symbol. Empty input parses to `None`.
	pub fn parse(text:&str) -> Result<Option<Regex>, ParseError> {
		let chars:Vec<char> = text.chars().collect();
		return parse_range(&chars, 0, chars.len());
	}

	fn write_operand(&self, f:&mut fmt::Formatter<'_>, child:&Regex) -> fmt::Result {
		if child.operator().precedence() < self.operator().precedence() {
			write!(f, "({})", child)
		} else {
			write!(f, "{}", child)
		}
	}
}

fn parse_range(chars:&[char], start:usize, end:usize) -> Result<Option<Regex>, ParseError> {
	let mut sequence:Vec<Regex> = Vec::new();
	let mut choice:Vec<Regex> = Vec::new();
	let mut last_bar:Option<usize> = None;

	let mut i = start;
	while i < end {
		let c = chars[i];
		match c {
			'(' => {
				let close = matching_paren(chars, i, end)?;
				match parse_range(chars, i + 1, close)? {
					Some(group) => sequence.push(group),
					None => return Err(ParseError::EmptyGroup(i)),
				}
				i = close;
			},
			')' => return Err(ParseError::StrayClose(i)),
			'*' | '+' | '?' => {
				let operand = match sequence.pop() {
					Some(r) => r,
					None => return Err(ParseError::MissingOperand { op: c, pos: i }),
				};
				sequence.push(match c {
					'*' => Regex::star(operand),
					'+' => Regex::plus(operand),
					_ => Regex::option(operand),
				});
			},
			'|' => {
				if sequence.is_empty() {
					return Err(ParseError::EmptyAlternative(i));
				}
				choice.push(Regex::concat(std::mem::take(&mut sequence)));
				last_bar = Some(i);
			},
			c if c.is_whitespace() => (),
			c => sequence.push(Regex::single(c)),
		}
		i += 1;
	}

	if sequence.is_empty() {
		if let Some(pos) = last_bar {
			return Err(ParseError::EmptyAlternative(pos));
		}
		return Ok(None);
	}

	let last = Regex::concat(sequence);
	if choice.is_empty() {
		return Ok(Some(last));
	}
	choice.push(last);
	Ok(Some(Regex::or(choice)))
}

// index of the ')' closing the '(' at `open`
fn matching_paren(chars:&[char], open:usize, end:usize) -> Result<usize, ParseError> {
	let mut depth = 0;
	for i in open..end {
		match chars[i] {
			'(' => depth += 1,
			')' => {
				depth -= 1;
				if depth == 0 {
					return Ok(i);
				}
			},
			_ => (),
		}
	}
	Err(ParseError::UnmatchedOpen(open))
}

impl fmt::Display for Regex {
	fn fmt(&self, f:&mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Regex::Single(c) => write!(f, "{}", c),
			Regex::KleeneStar(r) => {
				self.write_operand(f, r)?;
				write!(f, "*")
			},
			Regex::KleenePlus(r) => {
				self.write_operand(f, r)?;
				write!(f, "+")
			},
			Regex::QMark(r) => {
				self.write_operand(f, r)?;
				write!(f, "?")
			},
			Regex::Concat(ops) => {
				for r in ops.iter() {
					self.write_operand(f, r)?;
				}
				Ok(())
			},
			Regex::Or(ops) => {
				for (i, r) in ops.iter().enumerate() {
					if i > 0 {
						write!(f, "|")?;
					}
					self.write_operand(f, r)?;
				}
				Ok(())
			},
		}
	}
}
