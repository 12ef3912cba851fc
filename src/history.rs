//! Linear undo/redo log of executed commands.

use log::debug;

use crate::automaton::Automaton;
use crate::command::Command;
use crate::error::{Error, Result};

/// Sent to observers after every change of the history.
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
pub enum HistoryEvent {
	/// The cursor moved to this position.
	Cursor(usize),
	/// One entry past the cursor was discarded to make room for a new command.
	Clobbered,
	/// The log was emptied.
	Cleared,
}

#[derive(Clone,Copy,Debug,Default,PartialEq,Eq)]
pub struct HistoryConfig {
	/// Discard the entries past the cursor when a new command is executed,
	/// instead of failing.
	pub clobber:bool,
}

type Observer = Box<dyn FnMut(HistoryEvent)>;

/// Commands executed so far, plus a cursor. Entries before the cursor are
/// applied to the automaton, entries at and after it are undone.
pub struct CommandHistory {
	commands:Vec<Command>,
	cursor:usize,
	config:HistoryConfig,
	observers:Vec<Observer>,
}

impl CommandHistory {
	pub fn new() -> CommandHistory {
		CommandHistory::with_config(HistoryConfig::default())
	}

	pub fn with_config(config:HistoryConfig) -> CommandHistory {
		CommandHistory { commands: Vec::new(), cursor: 0, config, observers: Vec::new() }
	}

	pub fn subscribe<F>(&mut self, observer:F)
	where F: FnMut(HistoryEvent) + 'static
	{
		self.observers.push(Box::new(observer));
	}

	fn notify(&mut self, event:HistoryEvent) {
		for observer in self.observers.iter_mut() {
			observer(event);
		}
	}

	/// Applies `cmd` and appends it to the log.
	pub fn execute_new_command(&mut self, a:&mut Automaton, mut cmd:Command) -> Result<()> {
		if self.cursor != self.commands.len() && !self.config.clobber {
			return Err(Error::HistoryNotAtEnd);
		}
		cmd.redo(a)?;

		while self.commands.len() > self.cursor {
			self.commands.pop();
			self.notify(HistoryEvent::Clobbered);
		}
		debug!("step {}: {}", self.cursor, cmd);
		self.commands.push(cmd);
		self.cursor += 1;
		self.notify(HistoryEvent::Cursor(self.cursor));
		Ok(())
	}

	/// Undoes one step. Does nothing at the beginning of the log.
	pub fn prev(&mut self, a:&mut Automaton) -> Result<()> {
		if self.cursor == 0 {
			return Ok(());
		}
		self.commands[self.cursor - 1].undo(a)?;
		self.cursor -= 1;
		self.notify(HistoryEvent::Cursor(self.cursor));
		Ok(())
	}

	/// Redoes one step. Does nothing at the end of the log.
	pub fn next(&mut self, a:&mut Automaton) -> Result<()> {
		if self.cursor == self.commands.len() {
			return Ok(());
		}
		self.commands[self.cursor].redo(a)?;
		self.cursor += 1;
		self.notify(HistoryEvent::Cursor(self.cursor));
		Ok(())
	}

	/// Steps backwards or forwards, one command at a time, until the cursor
	/// is at `idx`.
	pub fn seek_idx(&mut self, a:&mut Automaton, idx:usize) -> Result<()> {
		if idx > self.commands.len() {
			return Err(Error::SeekOutOfRange { idx, len: self.commands.len() });
		}
		while self.cursor > idx {
			self.prev(a)?;
		}
		while self.cursor < idx {
			self.next(a)?;
		}
		Ok(())
	}

	/// Forgets every command. The automaton is left as it is.
	pub fn clear(&mut self) {
		self.commands.clear();
		self.cursor = 0;
		self.notify(HistoryEvent::Cleared);
	}

	pub fn len(&self) -> usize {
		self.commands.len()
	}

	pub fn is_empty(&self) -> bool {
		self.commands.is_empty()
	}

	pub fn cursor(&self) -> usize {
		self.cursor
	}

	pub fn commands(&self) -> &[Command] {
		&self.commands
	}

	pub fn config(&self) -> HistoryConfig {
		self.config
	}

	pub fn set_clobber(&mut self, clobber:bool) {
		self.config.clobber = clobber;
	}
}

impl Default for CommandHistory {
	fn default() -> Self {
		CommandHistory::new()
	}
}

/// Applies `cmd`, recording it when a history is given and applying it
/// silently otherwise.
pub fn execute(a:&mut Automaton, history:Option<&mut CommandHistory>, cmd:Command) -> Result<()> {
	match history {
		Some(h) => h.execute_new_command(a, cmd),
		None => {
			let mut cmd = cmd;
			cmd.redo(a)
		},
	}
}
