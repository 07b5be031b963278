//! Per-traversal state shared by the value codec and the bean state
//! writers and readers.
//!
//! Bean bodies are not written where the bean is first met. The codec writes
//! the bean header and queues the body; [`WriteContext::write_root`] drains
//! the queue in first-met order and [`ReadContext::read_root`] fills the beans
//! in the same order. Stack depth therefore does not grow with graph depth.

use std::collections::VecDeque;
use std::rc::Rc;

use cc_serialize::{
    CodecError, CodecResult, Decoder, Encoder, ProblemKind, ProblemsListener, PropertyProblem, PropertyTrace,
    ReadIdentities, WriteIdentities,
};

use crate::beans::{
    BeanRef, BeanStateCache, BeanStateReader, BeanValue, InstantiationScheme, TypeRegistry, ValueCodec,
};

const GRAPH_ROOT: &str = "graph";

pub struct WriteContext<'a> {
    encoder: &'a mut dyn Encoder,
    codec: Rc<dyn ValueCodec>,
    beans: &'a mut BeanStateCache,
    identities: WriteIdentities,
    problems: &'a mut dyn ProblemsListener,
    trace: PropertyTrace,
    pending: VecDeque<(BeanRef, PropertyTrace)>,
}

impl<'a> WriteContext<'a> {
    pub fn new(
        encoder: &'a mut dyn Encoder,
        codec: Rc<dyn ValueCodec>,
        beans: &'a mut BeanStateCache,
        problems: &'a mut dyn ProblemsListener,
    ) -> Self {
        Self {
            encoder,
            codec,
            beans,
            identities: WriteIdentities::new(),
            problems,
            trace: PropertyTrace::root(GRAPH_ROOT),
            pending: VecDeque::new(),
        }
    }

    /// Writes `root`, then the state of every bean reachable from it.
    pub fn write_root(&mut self, root: &BeanValue) -> CodecResult<()> {
        self.write_value(root)?;
        while let Some((bean, trace)) = self.pending.pop_front() {
            let state = bean
                .try_borrow()
                .map_err(|_| CodecError::Format("bean is mutably borrowed while being written".to_string()))?;
            let writer = self.beans().writer_for(state.bean_type());
            self.with_trace(trace, |ctx| writer.write_state(ctx, &**state))?;
        }
        Ok(())
    }

    /// Queues the state of a bean whose header was just written.
    pub fn defer_state(&mut self, bean: &BeanRef, trace: PropertyTrace) {
        self.pending.push_back((BeanRef::clone(bean), trace));
    }

    pub fn write_value(&mut self, value: &BeanValue) -> CodecResult<()> {
        let codec = Rc::clone(&self.codec);
        codec.write(self, value)
    }

    pub fn codec(&self) -> Rc<dyn ValueCodec> {
        Rc::clone(&self.codec)
    }

    pub fn beans(&mut self) -> &mut BeanStateCache {
        &mut *self.beans
    }

    pub(crate) fn identities(&mut self) -> &mut WriteIdentities {
        &mut self.identities
    }

    pub fn trace(&self) -> &PropertyTrace {
        &self.trace
    }

    /// Runs `f` with `trace` as the current trace, restoring the previous one
    /// afterwards.
    pub fn with_trace<T>(&mut self, trace: PropertyTrace, f: impl FnOnce(&mut Self) -> T) -> T {
        let previous = std::mem::replace(&mut self.trace, trace);
        let result = f(self);
        self.trace = previous;
        result
    }

    /// Reports a problem at the current trace.
    pub fn report(&mut self, kind: ProblemKind, message: impl Into<String>) {
        self.problems.on_problem(PropertyProblem {
            kind,
            trace: self.trace.clone(),
            message: message.into(),
        });
    }
}

impl Encoder for WriteContext<'_> {
    fn write_byte(&mut self, value: u8) -> CodecResult<()> {
        self.encoder.write_byte(value)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> CodecResult<()> {
        self.encoder.write_bytes(bytes)
    }
}

pub struct ReadContext<'a> {
    decoder: &'a mut dyn Decoder,
    registry: &'a TypeRegistry,
    codec: Rc<dyn ValueCodec>,
    beans: &'a mut BeanStateCache,
    identities: ReadIdentities<BeanRef>,
    next_id: u32,
    scheme: Option<&'a dyn InstantiationScheme>,
    problems: &'a mut dyn ProblemsListener,
    trace: PropertyTrace,
    pending: VecDeque<PendingState>,
}

/// A bean created from its header whose state is still to be read.
struct PendingState {
    bean: BeanRef,
    reader: Rc<dyn BeanStateReader>,
    trace: PropertyTrace,
}

impl<'a> ReadContext<'a> {
    pub fn new(
        decoder: &'a mut dyn Decoder,
        registry: &'a TypeRegistry,
        codec: Rc<dyn ValueCodec>,
        beans: &'a mut BeanStateCache,
        problems: &'a mut dyn ProblemsListener,
    ) -> Self {
        Self {
            decoder,
            registry,
            codec,
            beans,
            identities: ReadIdentities::new(),
            next_id: 0,
            scheme: None,
            problems,
            trace: PropertyTrace::root(GRAPH_ROOT),
            pending: VecDeque::new(),
        }
    }

    /// Reads the root value, then the state of every bean it reaches.
    pub fn read_root(&mut self) -> CodecResult<BeanValue> {
        let root = self.read_value()?;
        while let Some(PendingState { bean, reader, trace }) = self.pending.pop_front() {
            self.with_trace(trace, |ctx| reader.read_state(ctx, &bean))?;
        }
        Ok(root)
    }

    /// Queues `bean` to be filled by `reader` once the current value is read.
    pub fn defer_state(&mut self, bean: &BeanRef, reader: Rc<dyn BeanStateReader>, trace: PropertyTrace) {
        self.pending.push_back(PendingState {
            bean: BeanRef::clone(bean),
            reader,
            trace,
        });
    }

    pub fn with_scheme(mut self, scheme: Option<&'a dyn InstantiationScheme>) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn read_value(&mut self) -> CodecResult<BeanValue> {
        let codec = Rc::clone(&self.codec);
        codec.read(self)
    }

    pub fn registry(&self) -> &'a TypeRegistry {
        self.registry
    }

    pub fn scheme(&self) -> Option<&'a dyn InstantiationScheme> {
        self.scheme
    }

    pub fn beans(&mut self) -> &mut BeanStateCache {
        &mut *self.beans
    }

    /// Gives `bean` the next id. Must happen before its state is read so
    /// references back to it resolve.
    pub(crate) fn register_bean(&mut self, bean: &BeanRef) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.identities.put_instance(id, BeanRef::clone(bean));
        id
    }

    pub(crate) fn bean_by_id(&self, id: u32) -> Option<BeanRef> {
        self.identities.get_instance(id)
    }

    pub fn trace(&self) -> &PropertyTrace {
        &self.trace
    }

    pub fn with_trace<T>(&mut self, trace: PropertyTrace, f: impl FnOnce(&mut Self) -> T) -> T {
        let previous = std::mem::replace(&mut self.trace, trace);
        let result = f(self);
        self.trace = previous;
        result
    }

    pub fn report(&mut self, kind: ProblemKind, message: impl Into<String>) {
        self.problems.on_problem(PropertyProblem {
            kind,
            trace: self.trace.clone(),
            message: message.into(),
        });
    }
}

impl Decoder for ReadContext<'_> {
    fn read_byte(&mut self) -> CodecResult<u8> {
        self.decoder.read_byte()
    }

    fn read_exact_bytes(&mut self, buf: &mut [u8]) -> CodecResult<()> {
        self.decoder.read_exact_bytes(buf)
    }
}
