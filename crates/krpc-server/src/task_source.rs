//! Where the task-listing handler gets its tasks from.
//!
//! [`ProcfsTasks`] reads the host's process table from a procfs mount.
//! [`StaticTasks`] serves a fixed list, for demos and tests.

use std::fs;
use std::io;
use std::path::PathBuf;

/// Scheduler state values as the kernel stores them.
pub mod state {
    pub const RUNNING: u32 = 0x0000;
    pub const INTERRUPTIBLE: u32 = 0x0001;
    pub const UNINTERRUPTIBLE: u32 = 0x0002;
    pub const STOPPED: u32 = 0x0004;
    pub const TRACED: u32 = 0x0008;
    pub const DEAD: u32 = 0x0010;
    pub const ZOMBIE: u32 = 0x0020;
    pub const PARKED: u32 = 0x0040;
    pub const IDLE: u32 = 0x0402;
    /// State letter not recognised.
    pub const UNKNOWN: u32 = u32::MAX;
}

/// One task as reported by a source, before it is shaped into a wire record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub name: Vec<u8>,
    pub pid: i32,
    pub state: u32,
    pub flags: u32,
}

impl TaskInfo {
    pub fn new(name: &str, pid: i32, state: u32, flags: u32) -> Self {
        Self {
            name: name.as_bytes().to_vec(),
            pid,
            state,
            flags,
        }
    }
}

/// An enumerable set of tasks.
///
/// Sources may yield any number of tasks; consumers take as many as they can
/// carry.
pub trait TaskSource: Send + Sync + 'static {
    fn tasks(&self) -> io::Result<Box<dyn Iterator<Item = TaskInfo> + '_>>;
}

/// A fixed task list.
#[derive(Debug, Clone, Default)]
pub struct StaticTasks {
    tasks: Vec<TaskInfo>,
}

impl StaticTasks {
    pub fn new(tasks: Vec<TaskInfo>) -> Self {
        Self { tasks }
    }

    /// Three well-known tasks: `init`, `kworker` and `bash`.
    pub fn demo() -> Self {
        Self::new(vec![
            TaskInfo::new("init", 1, state::RUNNING, 0),
            TaskInfo::new("kworker", 2, state::INTERRUPTIBLE, 0),
            TaskInfo::new("bash", 42, state::RUNNING, 0),
        ])
    }
}

impl TaskSource for StaticTasks {
    fn tasks(&self) -> io::Result<Box<dyn Iterator<Item = TaskInfo> + '_>> {
        Ok(Box::new(self.tasks.iter().cloned()))
    }
}

/// Tasks read from `<root>/<pid>/stat`, in ascending pid order.
///
/// Processes that exit between listing the directory and reading their stat
/// file are skipped.
#[derive(Debug, Clone)]
pub struct ProcfsTasks {
    root: PathBuf,
}

impl Default for ProcfsTasks {
    fn default() -> Self {
        Self::with_root("/proc")
    }
}

impl ProcfsTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn pids(&self) -> io::Result<Vec<i32>> {
        let mut pids: Vec<i32> = fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str()?.parse().ok())
            .collect();
        pids.sort_unstable();
        Ok(pids)
    }

    fn read_task(&self, pid: i32) -> Option<TaskInfo> {
        let contents = fs::read(self.root.join(pid.to_string()).join("stat")).ok()?;
        match parse_stat(&contents) {
            Some((name, state, flags)) => Some(TaskInfo {
                name: name.to_vec(),
                pid,
                state,
                flags,
            }),
            None => {
                tracing::debug!(pid, "Skipping unparsable stat file");
                None
            }
        }
    }
}

impl TaskSource for ProcfsTasks {
    fn tasks(&self) -> io::Result<Box<dyn Iterator<Item = TaskInfo> + '_>> {
        let pids = self.pids()?;
        Ok(Box::new(
            pids.into_iter().filter_map(move |pid| self.read_task(pid)),
        ))
    }
}

/// Maps a procfs state letter to the kernel state value.
pub fn state_from_letter(letter: u8) -> u32 {
    match letter {
        b'R' => state::RUNNING,
        b'S' => state::INTERRUPTIBLE,
        b'D' => state::UNINTERRUPTIBLE,
        b'T' => state::STOPPED,
        b't' => state::TRACED,
        b'X' => state::DEAD,
        b'Z' => state::ZOMBIE,
        b'P' => state::PARKED,
        b'I' => state::IDLE,
        _ => state::UNKNOWN,
    }
}

/// Parses a `stat` line into `(comm, state, flags)`.
///
/// The command name sits between the first `(` and the last `)`, since it may
/// itself contain spaces and parentheses.
pub fn parse_stat(contents: &[u8]) -> Option<(&[u8], u32, u32)> {
    let open = contents.iter().position(|&b| b == b'(')?;
    let close = contents.iter().rposition(|&b| b == b')')?;
    if close < open {
        return None;
    }
    let name = &contents[open + 1..close];

    let rest = std::str::from_utf8(contents.get(close + 1..)?).ok()?;
    let mut fields = rest.split_ascii_whitespace();
    let letter = *fields.next()?.as_bytes().first()?;
    // state ppid pgrp session tty_nr tpgid flags
    let flags = fields.nth(5)?.parse().ok()?;

    Some((name, state_from_letter(letter), flags))
}
