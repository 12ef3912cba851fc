use std::process;

use clap::{Parser, ValueEnum};

use automata_steps::breakdown::breakdown_to_completion;
use automata_steps::dfa::nfa_to_dfa;
use automata_steps::elimination::nfa_to_regex;
use automata_steps::{Automaton, CommandHistory, HistoryConfig, Regex, Result};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
	/// Regular expression to be converted
	#[arg(short, long)]
	regex: String,

	/// What the expression is converted into
	#[arg(short, long, value_enum, default_value_t = Target::Nfa)]
	target: Target,

	/// The word to be analysed
	#[arg(short, long)]
	word: Option<String>,

	/// List every step of the conversion
	#[arg(long)]
	steps: bool,

	/// Let new steps overwrite undone ones instead of failing
	#[arg(long)]
	clobber: bool,
}

#[derive(Clone,Copy,Debug,PartialEq,Eq,ValueEnum)]
enum Target {
	Nfa,
	Dfa,
	Regex,
}

fn main() {
	env_logger::init();
	let cli = Cli::parse();

	if let Err(e) = run(&cli) {
		eprintln!("{}", e);
		process::exit(1);
	}
}

fn run(cli:&Cli) -> Result<()> {
	let re = match Regex::parse(&cli.regex)? {
		Some(re) => re,
		None => {
			println!("No regular expression provided.");
			return Ok(());
		},
	};

	let mut a = Automaton::from_regex(&re);
	let mut history = CommandHistory::with_config(HistoryConfig { clobber: cli.clobber });
	breakdown_to_completion(&mut a, Some(&mut history))?;

	let verdict = match cli.target {
		Target::Nfa => {
			println!("{}", a);
			check_word(&a, cli.word.as_deref())?
		},
		Target::Dfa => {
			nfa_to_dfa(&mut a, Some(&mut history))?;
			println!("{}", a);
			check_word(&a, cli.word.as_deref())?
		},
		Target::Regex => {
			// labels stop being single symbols once elimination starts
			let verdict = check_word(&a, cli.word.as_deref())?;
			match nfa_to_regex(&mut a, Some(&mut history))? {
				Some(result) => println!("{}", result),
				None => println!("The expression accepts no word."),
			}
			verdict
		},
	};

	if cli.steps {
		for (i, cmd) in history.commands().iter().enumerate() {
			println!("{:>4} {}", i + 1, cmd);
		}
	}

	if let Some(accepted) = verdict {
		println!("{}", if accepted { "ACCEPT" } else { "REJECT" });
	}
	return Ok(());
}

fn check_word(a:&Automaton, word:Option<&str>) -> Result<Option<bool>> {
	match word {
		Some(w) => Ok(Some(a.accepts(w)?)),
		None => Ok(None),
	}
}
