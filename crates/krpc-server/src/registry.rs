//! Program, version and procedure tables.
//!
//! A [`Program`] owns its versions, each [`Version`] owns a table of
//! procedures indexed directly by procedure number. Tables are immutable
//! once built; only the per-procedure call counters change at runtime.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use krpc_common::protocol::{CallHeader, KrpcError, Procedure, ProcedureInfo, Result};
use krpc_common::xdr::{XdrDecoder, XdrEncoder};

use crate::dispatch::{dispatch, DispatchOutcome};
use crate::handler::{FnHandler, HandlerError, Outcome, ProcedureHandler};

/// A registered procedure with its types erased.
pub trait ServerProcedure: Send + Sync {
    fn info(&self) -> ProcedureInfo;

    fn dispatch(&self, args: &mut XdrDecoder<'_>, results: &mut XdrEncoder) -> DispatchOutcome;
}

struct Registered<P, H> {
    handler: H,
    _procedure: PhantomData<fn() -> P>,
}

impl<P, H> ServerProcedure for Registered<P, H>
where
    P: Procedure,
    H: ProcedureHandler<P>,
{
    fn info(&self) -> ProcedureInfo {
        P::info()
    }

    fn dispatch(&self, args: &mut XdrDecoder<'_>, results: &mut XdrEncoder) -> DispatchOutcome {
        dispatch::<P, H>(&self.handler, args, results)
    }
}

struct Entry {
    procedure: Arc<dyn ServerProcedure>,
    calls: AtomicU64,
}

/// One version of a program.
pub struct Version {
    number: u32,
    procedures: Vec<Option<Entry>>,
    max_arg_size: usize,
    max_reply_size: usize,
}

impl Version {
    pub fn builder(number: u32) -> VersionBuilder {
        VersionBuilder {
            number,
            procedures: Vec::new(),
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// Size of the procedure table, i.e. one past the highest procedure
    /// number.
    pub fn procedure_count(&self) -> usize {
        self.procedures.len()
    }

    pub fn procedure(&self, number: u32) -> Option<&dyn ServerProcedure> {
        self.entry(number).map(|entry| entry.procedure.as_ref())
    }

    /// Descriptors of every registered procedure, in procedure order.
    pub fn infos(&self) -> Vec<ProcedureInfo> {
        self.procedures
            .iter()
            .flatten()
            .map(|entry| entry.procedure.info())
            .collect()
    }

    /// Largest argument body any procedure of this version accepts.
    pub fn max_arg_size(&self) -> usize {
        self.max_arg_size
    }

    /// Largest reply body any procedure of this version produces.
    pub fn max_reply_size(&self) -> usize {
        self.max_reply_size
    }

    /// Calls dispatched to `number` so far.
    pub fn call_count(&self, number: u32) -> u64 {
        self.entry(number)
            .map(|entry| entry.calls.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Dispatches one call. Returns `None` if no procedure has `number`.
    pub fn dispatch(
        &self,
        number: u32,
        args: &mut XdrDecoder<'_>,
        results: &mut XdrEncoder,
    ) -> Option<DispatchOutcome> {
        let entry = self.entry(number)?;
        entry.calls.fetch_add(1, Ordering::Relaxed);
        Some(entry.procedure.dispatch(args, results))
    }

    fn entry(&self, number: u32) -> Option<&Entry> {
        self.procedures.get(number as usize)?.as_ref()
    }
}

pub struct VersionBuilder {
    number: u32,
    procedures: Vec<(u32, Arc<dyn ServerProcedure>)>,
}

impl VersionBuilder {
    /// Registers `handler` as the implementation of procedure `P`.
    pub fn procedure<P, H>(mut self, handler: H) -> Self
    where
        P: Procedure,
        H: ProcedureHandler<P>,
    {
        self.procedures.push((
            P::NUMBER,
            Arc::new(Registered::<P, H> {
                handler,
                _procedure: PhantomData,
            }),
        ));
        self
    }

    /// Registers a closure as the implementation of procedure `P`.
    pub fn procedure_fn<P, F>(self, f: F) -> Self
    where
        P: Procedure,
        F: Fn(&P::Args, &mut P::Reply) -> std::result::Result<Outcome, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        self.procedure::<P, _>(FnHandler::<P, F>::new(f))
    }

    /// Builds the procedure table.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if two procedures share a number.
    pub fn build(self) -> Result<Version> {
        let len = self
            .procedures
            .iter()
            .map(|(number, _)| *number as usize + 1)
            .max()
            .unwrap_or(0);

        let mut procedures: Vec<Option<Entry>> = (0..len).map(|_| None).collect();
        let mut max_arg_size = 0;
        let mut max_reply_size = 0;

        for (number, procedure) in self.procedures {
            let slot = &mut procedures[number as usize];
            if slot.is_some() {
                return Err(KrpcError::Config(format!(
                    "procedure {} registered twice in version {}",
                    number, self.number
                )));
            }
            let info = procedure.info();
            max_arg_size = max_arg_size.max(info.arg_size);
            max_reply_size = max_reply_size.max(info.reply_size);
            *slot = Some(Entry {
                procedure,
                calls: AtomicU64::new(0),
            });
        }

        Ok(Version {
            number: self.number,
            procedures,
            max_arg_size,
            max_reply_size,
        })
    }
}

/// Widest range of version numbers a single program may span.
pub const MAX_VERSION_SPAN: u32 = 256;

/// A program: a number, a name and one or more versions.
///
/// Versions live in a table indexed by `number - lowest_version()`; numbers
/// inside the range that were not registered leave an empty slot.
pub struct Program {
    number: u32,
    name: String,
    lowest: u32,
    versions: Vec<Option<Version>>,
}

impl Program {
    pub fn builder(number: u32, name: impl Into<String>) -> ProgramBuilder {
        ProgramBuilder {
            number,
            name: name.into(),
            versions: Vec::new(),
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self, number: u32) -> Option<&Version> {
        let index = number.checked_sub(self.lowest)? as usize;
        self.versions.get(index)?.as_ref()
    }

    /// Registered versions, lowest first.
    pub fn versions(&self) -> impl Iterator<Item = &Version> {
        self.versions.iter().flatten()
    }

    /// Lowest supported version number.
    pub fn lowest_version(&self) -> u32 {
        self.lowest
    }

    /// Highest supported version number.
    pub fn highest_version(&self) -> u32 {
        self.lowest + self.versions.len().saturating_sub(1) as u32
    }

    /// Largest call record the transport needs to accept for this program.
    pub fn max_request_size(&self) -> usize {
        let args = self
            .versions()
            .map(Version::max_arg_size)
            .max()
            .unwrap_or(0);
        CallHeader::MAX_LEN + args
    }
}

pub struct ProgramBuilder {
    number: u32,
    name: String,
    versions: Vec<Version>,
}

impl ProgramBuilder {
    pub fn version(mut self, version: Version) -> Self {
        self.versions.push(version);
        self
    }

    /// # Errors
    ///
    /// Returns a `Config` error if the program has no versions, two versions
    /// share a number, or the version numbers span more than
    /// [`MAX_VERSION_SPAN`].
    pub fn build(mut self) -> Result<Program> {
        self.versions.sort_by_key(|v| v.number);
        let (Some(lowest), Some(highest)) = (
            self.versions.first().map(|v| v.number),
            self.versions.last().map(|v| v.number),
        ) else {
            return Err(KrpcError::Config(format!(
                "program {} has no versions",
                self.name
            )));
        };

        if highest - lowest >= MAX_VERSION_SPAN {
            return Err(KrpcError::Config(format!(
                "versions {}..={} of program {} span more than {} numbers",
                lowest, highest, self.name, MAX_VERSION_SPAN
            )));
        }

        let mut table: Vec<Option<Version>> = (lowest..=highest).map(|_| None).collect();
        for version in self.versions {
            let slot = &mut table[(version.number - lowest) as usize];
            if slot.is_some() {
                return Err(KrpcError::Config(format!(
                    "version {} of program {} registered twice",
                    version.number, self.name
                )));
            }
            *slot = Some(version);
        }

        Ok(Program {
            number: self.number,
            name: self.name,
            lowest,
            versions: table,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use krpc_common::protocol::AcceptStat;
    use krpc_common::tasks::{GetTasks, Null, Task, Tasks, MAX_TASKS};

    fn version(number: u32) -> Version {
        Version::builder(number)
            .procedure_fn::<Null, _>(|_, _| Ok(Outcome::Reply))
            .procedure_fn::<GetTasks, _>(|_, reply: &mut Tasks| {
                *reply = Tasks::from_vec(vec![Task::new("init", 1, 0, 0)]);
                Ok(Outcome::Reply)
            })
            .build()
            .unwrap()
    }

    #[test]
    fn test_version_table() {
        let version = version(1);
        assert_eq!(version.procedure_count(), 2);
        assert_eq!(version.procedure(0).unwrap().info().name, "null");
        assert_eq!(version.procedure(1).unwrap().info().name, "get_tasks");
        assert!(version.procedure(2).is_none());
        assert_eq!(version.max_arg_size(), 0);
        assert_eq!(version.max_reply_size(), 4 + MAX_TASKS * 32);
        assert_eq!(version.infos().len(), 2);
    }

    #[test]
    fn test_sparse_procedure_numbers() {
        struct Late;
        impl Procedure for Late {
            const NUMBER: u32 = 3;
            const NAME: &'static str = "late";
            type Args = ();
            type Reply = ();
        }

        let version = Version::builder(1)
            .procedure_fn::<Late, _>(|_, _| Ok(Outcome::Reply))
            .build()
            .unwrap();
        assert_eq!(version.procedure_count(), 4);
        assert!(version.procedure(0).is_none());
        assert!(version.procedure(3).is_some());
    }

    #[test]
    fn test_duplicate_procedure_rejected() {
        let result = Version::builder(1)
            .procedure_fn::<Null, _>(|_, _| Ok(Outcome::Reply))
            .procedure_fn::<Null, _>(|_, _| Ok(Outcome::Drop))
            .build();
        assert!(matches!(result, Err(KrpcError::Config(_))));
    }

    #[test]
    fn test_dispatch_counts_calls() {
        let version = version(1);
        let mut results = XdrEncoder::new();

        let outcome = version.dispatch(1, &mut XdrDecoder::new(&[]), &mut results);
        assert_eq!(outcome, Some(DispatchOutcome::Reply));
        let outcome = version.dispatch(0, &mut XdrDecoder::new(&[]), &mut results);
        assert_eq!(outcome, Some(DispatchOutcome::Reply));
        assert!(version.dispatch(9, &mut XdrDecoder::new(&[]), &mut results).is_none());

        assert_eq!(version.call_count(0), 1);
        assert_eq!(version.call_count(1), 1);
        assert_eq!(version.call_count(9), 0);
    }

    #[test]
    fn test_handler_failure_is_system_err() {
        let version = Version::builder(1)
            .procedure_fn::<Null, _>(|_, _| Err(HandlerError::Failed("boom".to_string())))
            .build()
            .unwrap();
        let outcome = version.dispatch(0, &mut XdrDecoder::new(&[]), &mut XdrEncoder::new());
        assert_eq!(outcome, Some(DispatchOutcome::Failed(AcceptStat::SystemErr)));
    }

    #[test]
    fn test_program_versions() {
        let program = Program::builder(0x2000_0001, "example")
            .version(version(3))
            .version(version(1))
            .build()
            .unwrap();
        assert_eq!(program.lowest_version(), 1);
        assert_eq!(program.highest_version(), 3);
        assert!(program.version(0).is_none());
        assert!(program.version(2).is_none());
        assert!(program.version(4).is_none());
        assert_eq!(program.version(3).unwrap().number(), 3);
        let numbers: Vec<u32> = program.versions().map(Version::number).collect();
        assert_eq!(numbers, vec![1, 3]);
        assert_eq!(program.max_request_size(), CallHeader::MAX_LEN);
    }

    #[test]
    fn test_program_version_span_rejected() {
        let result = Program::builder(1, "sparse")
            .version(version(1))
            .version(version(1 + MAX_VERSION_SPAN))
            .build();
        assert!(matches!(result, Err(KrpcError::Config(_))));

        let program = Program::builder(1, "wide")
            .version(version(1))
            .version(version(MAX_VERSION_SPAN))
            .build()
            .unwrap();
        assert_eq!(program.highest_version(), MAX_VERSION_SPAN);
    }

    #[test]
    fn test_program_without_versions_rejected() {
        let result = Program::builder(1, "empty").build();
        assert!(matches!(result, Err(KrpcError::Config(_))));

        let result = Program::builder(1, "twice")
            .version(version(1))
            .version(version(1))
            .build();
        assert!(matches!(result, Err(KrpcError::Config(_))));
    }
}
