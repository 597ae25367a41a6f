//! The interpreter state: the wire environment, the sharing bookkeeping
//! and the conversion cache.
use hashbrown::HashMap;
use tinyvec::TinyVec;

use crate::{
    builder::{CircuitBuilder, Recipient, Role, Sharing, WireHandle},
    program::ProgramSource,
    InterpreterError,
};

/// The handles a wire name is bound to. Scalars stay inline; aggregates
/// introduced by array-valued operations spill.
pub type WireSeq = TinyVec<[WireHandle; 2]>;

/// One pending declassification.
#[derive(Debug, Clone, Copy)]
pub struct OutputEntry {
    pub handle: WireHandle,
    pub to: Recipient,
}

/// The interpreter over one program.
///
/// Holds every process-wide map of a run: all of them are created at
/// driver entry, grow monotonically while bytecode is processed, and are
/// dropped together at driver exit. Recursive calls share this state;
/// there is no nested scope.
pub struct Interpreter<B, P> {
    pub(crate) builder: B,
    pub(crate) program: P,
    pub(crate) role: Role,
    /// Wire name → sharing, fixed by the upstream compiler pass.
    pub(crate) share_map: HashMap<String, Sharing>,
    /// Parameter name → cleartext test value.
    pub(crate) params: HashMap<String, u32>,
    /// Wire name → bound handles. Rebinding replaces the sequence.
    env: HashMap<String, WireSeq>,
    /// Handle → sharing, written once at handle creation.
    sharings: HashMap<WireHandle, Sharing>,
    /// Per-target-sharing conversion results, keyed by source handle.
    conv_cache: [HashMap<WireHandle, WireHandle>; 3],
    /// Wire name → literal, filled by the constants preamble.
    pub(crate) consts: HashMap<String, u32>,
    outputs: Vec<OutputEntry>,
}

impl<B, P> Interpreter<B, P>
where
    B: CircuitBuilder,
    P: ProgramSource,
{
    pub fn new(
        builder: B,
        program: P,
        share_map: HashMap<String, Sharing>,
        params: HashMap<String, u32>,
        role: Role,
    ) -> Self {
        Self {
            builder,
            program,
            role,
            share_map,
            params,
            env: HashMap::new(),
            sharings: HashMap::new(),
            conv_cache: [HashMap::new(), HashMap::new(), HashMap::new()],
            consts: HashMap::new(),
            outputs: Vec::new(),
        }
    }

    /// Binds a name, replacing any previous binding. Old handles stay
    /// valid; only the name moves.
    pub(crate) fn bind<I>(&mut self, name: &str, handles: I)
    where
        I: IntoIterator<Item = WireHandle>,
    {
        self.env.insert(name.to_string(), handles.into_iter().collect());
    }

    /// The handle sequence bound to a name.
    pub(crate) fn lookup(&self, name: &str) -> Result<&WireSeq, InterpreterError> {
        self.env
            .get(name)
            .ok_or_else(|| InterpreterError::UnboundWire(name.to_string()))
    }

    /// The single handle of a scalar binding.
    pub(crate) fn scalar(&self, name: &str) -> Result<WireHandle, InterpreterError> {
        let seq = self.lookup(name)?;
        seq.first()
            .copied()
            .ok_or_else(|| InterpreterError::UnboundWire(name.to_string()))
    }

    /// Records the sharing of a freshly created handle.
    pub(crate) fn created(&mut self, handle: WireHandle, sharing: Sharing) -> WireHandle {
        self.sharings.entry(handle).or_insert(sharing);
        handle
    }

    /// The sharing a handle was created in.
    pub(crate) fn sharing_of(
        &self,
        handle: WireHandle,
        context: &'static str,
    ) -> Result<Sharing, InterpreterError> {
        self.sharings
            .get(&handle)
            .copied()
            .ok_or(InterpreterError::UnknownHandle(context))
    }

    /// Returns `handle` re-represented in `target`.
    ///
    /// Identity if the handle already lives there; otherwise the cached
    /// conversion result, or a freshly emitted conversion gate that is
    /// cached for the rest of the run. At most one conversion gate ever
    /// exists per (source handle, target sharing) pair.
    pub(crate) fn convert(
        &mut self,
        handle: WireHandle,
        target: Sharing,
    ) -> Result<WireHandle, InterpreterError> {
        let from = self.sharing_of(handle, "a conversion")?;
        if from == target {
            return Ok(handle);
        }
        if let Some(&cached) = self.conv_cache[target.index()].get(&handle) {
            return Ok(cached);
        }
        let converted = self.builder.convert(handle, from, target);
        log::trace!("conversion {} -> {} for {}", from, target, handle);
        self.sharings.insert(converted, target);
        self.conv_cache[target.index()].insert(handle, converted);
        Ok(converted)
    }

    /// Resolves a scalar name straight into the target sharing.
    pub(crate) fn resolve(
        &mut self,
        name: &str,
        target: Sharing,
    ) -> Result<WireHandle, InterpreterError> {
        let handle = self.scalar(name)?;
        self.convert(handle, target)
    }

    /// Queues a declassified handle for printing after execution.
    pub(crate) fn enqueue_output(&mut self, handle: WireHandle, to: Recipient) {
        self.outputs.push(OutputEntry { handle, to });
    }

    /// Runs the protocol over the circuit built so far.
    pub fn execute(&mut self) -> Result<(), InterpreterError> {
        self.builder.execute().map_err(InterpreterError::Execution)
    }

    /// Clear values of every queued output this role may see, in the
    /// order the OUT instructions were reached.
    pub fn declassified(&self) -> Vec<u32> {
        self.outputs
            .iter()
            .filter(|entry| entry.to.includes(self.role))
            .map(|entry| self.builder.clear_value(entry.handle))
            .collect()
    }

    /// Read access for structural assertions in tests and benches.
    pub fn builder(&self) -> &B {
        &self.builder
    }
}
