//! The example task-listing program.
//!
//! One program, one version (`INITIAL`), two procedures: `NULL` (ping) and
//! `GET_TASKS`, which returns up to [`MAX_TASKS`] task records.

use crate::protocol::Procedure;
use crate::xdr::{BoundedBytes, BoundedVec};

/// Longest task name carried on the wire, in bytes.
pub const NAME_LEN: usize = 16;

/// Most task records a single reply may carry.
pub const MAX_TASKS: usize = 64;

pub const EXAMPLE_PROGRAM: u32 = 0x2000_0001;
pub const EXAMPLE_PROGRAM_NAME: &str = "example";
pub const INITIAL_VERSION: u32 = 1;

pub type TaskName = BoundedBytes<NAME_LEN>;

crate::xdr_record! {
    /// One task record.
    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct Task {
        pub name: TaskName,
        pub pid: i32,
        pub state: u32,
        pub flags: u32,
    }
}

impl Task {
    pub fn new(name: &str, pid: i32, state: u32, flags: u32) -> Self {
        Self {
            name: TaskName::from(name),
            pid,
            state,
            flags,
        }
    }
}

/// Reply of `GET_TASKS`.
pub type Tasks = BoundedVec<Task, MAX_TASKS>;

/// Procedure 0: takes nothing, returns nothing.
pub struct Null;

impl Procedure for Null {
    const NUMBER: u32 = 0;
    const NAME: &'static str = "null";
    type Args = ();
    type Reply = ();
}

/// Procedure 1: lists tasks on the serving host.
pub struct GetTasks;

impl Procedure for GetTasks {
    const NUMBER: u32 = 1;
    const NAME: &'static str = "get_tasks";
    type Args = ();
    type Reply = Tasks;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::KrpcError;
    use crate::xdr::{Release, XdrCodec, XdrDecoder, XdrEncoder};

    fn sample() -> Tasks {
        Tasks::from_vec(vec![
            Task::new("init", 1, 0, 0),
            Task::new("kworker", 2, 1, 0),
            Task::new("bash", 42, 0, 0),
        ])
    }

    fn encode(tasks: &Tasks) -> Vec<u8> {
        let mut enc = XdrEncoder::new();
        tasks.encode(&mut enc).unwrap();
        enc.into_inner()
    }

    #[test]
    fn test_record_field_order() {
        let mut enc = XdrEncoder::new();
        Task::new("sh", -1, 2, 0x40).encode(&mut enc).unwrap();
        assert_eq!(
            enc.as_bytes(),
            &[
                0, 0, 0, 2, b's', b'h', 0, 0, // name
                0xFF, 0xFF, 0xFF, 0xFF, // pid
                0, 0, 0, 2, // state
                0, 0, 0, 0x40, // flags
            ]
        );
    }

    #[test]
    fn test_tasks_round_trip() {
        let tasks = sample();
        let bytes = encode(&tasks);
        let decoded = Tasks::decode(&mut XdrDecoder::new(&bytes)).unwrap();
        assert_eq!(decoded, tasks);
    }

    #[test]
    fn test_full_array_round_trip() {
        let tasks = Tasks::from_vec(
            (0..MAX_TASKS as i32)
                .map(|pid| Task::new("abcdefghijklmnop", pid, pid as u32, 0))
                .collect(),
        );
        let bytes = encode(&tasks);
        assert_eq!(bytes.len(), Tasks::MAX_ENCODED_LEN);

        let decoded = Tasks::decode(&mut XdrDecoder::new(&bytes)).unwrap();
        assert_eq!(decoded.len(), MAX_TASKS);
        assert_eq!(decoded, tasks);
    }

    #[test]
    fn test_zero_count_is_prefix_only() {
        let bytes = encode(&Tasks::new());
        assert_eq!(bytes, vec![0, 0, 0, 0]);

        let decoded = Tasks::decode(&mut XdrDecoder::new(&bytes)).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(decoded.capacity(), 0);
    }

    #[test]
    fn test_declared_count_over_bound() {
        let bytes = ((MAX_TASKS + 1) as u32).to_be_bytes();
        let err = Tasks::decode(&mut XdrDecoder::new(&bytes)).unwrap_err();
        assert!(matches!(
            err,
            KrpcError::DecodeBoundsExceeded { declared, max }
                if declared == MAX_TASKS + 1 && max == MAX_TASKS
        ));
    }

    #[test]
    fn test_name_over_bound_in_second_record() {
        let mut enc = XdrEncoder::new();
        enc.put_u32(2).unwrap();
        Task::new("init", 1, 0, 0).encode(&mut enc).unwrap();
        enc.put_u32(NAME_LEN as u32 + 1).unwrap();

        let err = Tasks::decode(&mut XdrDecoder::new(enc.as_bytes())).unwrap_err();
        assert!(matches!(err, KrpcError::DecodeBoundsExceeded { max: NAME_LEN, .. }));
    }

    #[test]
    fn test_oversized_name_fails_encode() {
        let tasks = Tasks::from_vec(vec![Task::new("a-name-longer-than-sixteen", 7, 0, 0)]);
        let err = tasks.encode(&mut XdrEncoder::new()).unwrap_err();
        assert!(matches!(err, KrpcError::EncodeInconsistency(_)));
    }

    #[test]
    fn test_release_clears_names_and_array() {
        let mut tasks = sample();
        tasks.release();
        assert!(tasks.is_empty());
        assert_eq!(tasks.capacity(), 0);

        let mut task = Task::new("bash", 42, 0, 0);
        task.release();
        assert!(task.name.is_empty());
        assert_eq!(task.pid, 42);
    }

    #[test]
    fn test_descriptor_sizes() {
        assert_eq!(Task::MAX_ENCODED_LEN, 4 + 16 + 12);
        let info = GetTasks::info();
        assert_eq!(info.number, 1);
        assert_eq!(info.arg_size, 0);
        assert_eq!(info.reply_size, 4 + MAX_TASKS * 32);
        assert_eq!(Null::info().reply_size, 0);
    }
}
