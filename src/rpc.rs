//! RPC endpoint: message-id lifecycle, pending-call matching and request dispatch.
//!
//! One [`Endpoint`] exists per connection. A client endpoint calls methods and serves
//! signals; a server endpoint serves methods and emits signals. Both directions use the
//! same machinery:
//!
//! - outgoing calls get a message id from the endpoint's [`PendingCalls`] registry, unless
//!   the function is fire-and-forget, in which case the id slot is `nil` and nothing is
//!   registered;
//! - each role allocates from its own half of the 32-bit id space: client ids have bit 31
//!   clear, server ids have it set ([`SERVER_MESSAGE_ID_BIT`]). An incoming message whose
//!   first element is an id of this endpoint's half is a response and resolves the matching
//!   [`CallHandle`]; everything else is routed as a request through a dense handler table
//!   indexed by function id. A signal emitted by the server therefore never collides with a
//!   method call the client still has pending;
//! - closing (or dropping) the endpoint fails every call still pending.
//!
//! The endpoint never owns a transport: frames are written to any [`io::Write`] and
//! received bytes are handed to [`Endpoint::receive`].

use crate::ast::FunctionKind;
use crate::codec::{kind_name, to_bytes, Codec, CodecError, DecodeError};
use crate::frame::{decode_frame, FrameError};
use crate::model::{FunctionDef, Model};
use crate::value::Value;
use parking_lot::Mutex;
use rmpv::Value as Wire;
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Set in every message id a server allocates, clear in every client id.
pub const SERVER_MESSAGE_ID_BIT: u64 = 1 << 31;

const COUNTER_MASK: u32 = (1 << 31) - 1;

/// Which side of the connection an endpoint is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    /// Namespace of the functions this side invokes.
    pub fn outgoing(self) -> FunctionKind {
        match self {
            Role::Client => FunctionKind::Method,
            Role::Server => FunctionKind::Signal,
        }
    }

    /// Namespace of the functions this side serves.
    pub fn incoming(self) -> FunctionKind {
        match self {
            Role::Client => FunctionKind::Signal,
            Role::Server => FunctionKind::Method,
        }
    }

    /// Whether this side allocates `message_id`.
    pub fn owns_message_id(self, message_id: u64) -> bool {
        message_id <= u32::MAX as u64 && message_id & SERVER_MESSAGE_ID_BIT == self.id_bit()
    }

    fn id_bit(self) -> u64 {
        match self {
            Role::Client => 0,
            Role::Server => SERVER_MESSAGE_ID_BIT,
        }
    }
}

/// Observable lifecycle of one call.
///
/// A [`CallHandle`] exists once its frame has been written, so the created and sent
/// stages of a call are passed inside [`Endpoint::call`]; a failure there is returned as
/// the error instead of a handle. Fire-and-forget handles start out `Resolved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    AwaitingResponse,
    Resolved,
    Failed,
}

/// Why a call did not produce a value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CallError {
    #[error("connection closed before a response arrived")]
    ConnectionClosed,
    #[error("malformed response: {0}")]
    Decode(#[from] DecodeError),
}

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("unknown {kind} `{name}`")]
    UnknownFunction { kind: &'static str, name: String },
    #[error("no handler bound for {kind} `{name}`")]
    NoHandler { kind: &'static str, name: String },
    #[error("response for message id {0} matches no pending call")]
    UnmatchedResponse(u64),
    #[error("endpoint is closed")]
    Closed,
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("transport: {0}")]
    Transport(#[from] io::Error),
}

type Outcome = Result<Value, CallError>;

struct PendingCall {
    function: u32,
    tx: oneshot::Sender<Outcome>,
}

struct PendingState {
    /// Low 31 bits of the next id.
    next_id: u32,
    calls: HashMap<u64, PendingCall>,
    closed: bool,
}

/// Registry of calls awaiting a response, keyed by message id.
///
/// Insertion happens on the sending side and removal on the receiving side, which may
/// run on different threads. Ids wrap within the half of the id space owned by the role.
pub struct PendingCalls {
    id_bit: u64,
    state: Mutex<PendingState>,
}

impl PendingCalls {
    /// Allocation starts at the low 31 bits of `first_id`, in the half `role` owns.
    pub fn new(role: Role, first_id: u32) -> Self {
        PendingCalls {
            id_bit: role.id_bit(),
            state: Mutex::new(PendingState {
                next_id: first_id & COUNTER_MASK,
                calls: HashMap::new(),
                closed: false,
            }),
        }
    }

    /// Allocate an id that is not pending and register the call under it.
    fn register(&self, function: u32) -> Result<(u64, oneshot::Receiver<Outcome>), RpcError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(RpcError::Closed);
        }
        let mut counter = state.next_id;
        while state.calls.contains_key(&(self.id_bit | counter as u64)) {
            counter = counter.wrapping_add(1) & COUNTER_MASK;
        }
        state.next_id = counter.wrapping_add(1) & COUNTER_MASK;
        let id = self.id_bit | counter as u64;
        let (tx, rx) = oneshot::channel();
        state.calls.insert(id, PendingCall { function, tx });
        Ok((id, rx))
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn take(&self, id: u64) -> Option<PendingCall> {
        self.state.lock().calls.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.state.lock().calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Refuse new calls and fail every pending one. Returns how many were failed.
    fn close(&self) -> usize {
        let drained: Vec<PendingCall> = {
            let mut state = self.state.lock();
            state.closed = true;
            state.calls.drain().map(|(_, c)| c).collect()
        };
        let n = drained.len();
        for call in drained {
            let _ = call.tx.send(Err(CallError::ConnectionClosed));
        }
        n
    }
}

/// Handle on one outgoing call.
#[derive(Debug)]
pub struct CallHandle {
    message_id: Option<u64>,
    rx: Option<oneshot::Receiver<Outcome>>,
    outcome: Option<Outcome>,
}

impl CallHandle {
    fn fire_and_forget() -> Self {
        CallHandle {
            message_id: None,
            rx: None,
            outcome: Some(Ok(Value::Nil)),
        }
    }

    /// `None` for fire-and-forget calls.
    pub fn message_id(&self) -> Option<u64> {
        self.message_id
    }

    pub fn state(&mut self) -> CallState {
        self.poll();
        match &self.outcome {
            None => CallState::AwaitingResponse,
            Some(Ok(_)) => CallState::Resolved,
            Some(Err(_)) => CallState::Failed,
        }
    }

    /// The outcome if it has arrived, without waiting.
    pub fn try_result(&mut self) -> Option<&Outcome> {
        self.poll();
        self.outcome.as_ref()
    }

    /// Wait for the response. Fire-and-forget calls resolve to `nil` immediately.
    pub async fn response(self) -> Outcome {
        if let Some(outcome) = self.outcome {
            return outcome;
        }
        match self.rx {
            Some(rx) => rx.await.unwrap_or(Err(CallError::ConnectionClosed)),
            None => Err(CallError::ConnectionClosed),
        }
    }

    fn poll(&mut self) {
        if self.outcome.is_some() {
            return;
        }
        if let Some(rx) = self.rx.as_mut() {
            match rx.try_recv() {
                Ok(outcome) => self.outcome = Some(outcome),
                Err(oneshot::error::TryRecvError::Empty) => return,
                Err(oneshot::error::TryRecvError::Closed) => {
                    self.outcome = Some(Err(CallError::ConnectionClosed))
                }
            }
            self.rx = None;
        }
    }
}

/// What one incoming message turned out to be.
#[derive(Debug, PartialEq)]
pub enum Incoming {
    /// A response that resolved the pending call with this message id.
    Response { message_id: u64 },
    /// A request that was dispatched to its handler. `reply` is `None` for
    /// fire-and-forget functions.
    Request { name: String, reply: Option<Wire> },
}

/// Summary of [`Endpoint::receive`].
#[derive(Debug, Default)]
pub struct Received {
    /// Every message that was routed. A reply that could not be written is still listed
    /// here, next to the transport error in `rejected`.
    pub handled: Vec<Incoming>,
    /// Messages that were rejected and write failures; the rest of the buffer was still
    /// processed.
    pub rejected: Vec<RpcError>,
    /// Bytes of a trailing partial message to prepend to the next read.
    pub incomplete: usize,
}

type Handler = Box<dyn Fn(&[Value]) -> Value + Send + Sync>;

pub struct Endpoint {
    model: Arc<Model>,
    role: Role,
    pending: PendingCalls,
    /// Indexed by incoming function id.
    handlers: Vec<Option<Handler>>,
}

impl Endpoint {
    pub fn new(model: Arc<Model>, role: Role) -> Self {
        let handlers = model.functions(role.incoming()).iter().map(|_| None).collect();
        Endpoint {
            model,
            role,
            pending: PendingCalls::new(role, 0),
            handlers,
        }
    }

    /// Start message id allocation at `first_id` instead of 0. Only the low 31 bits are
    /// used; bit 31 always follows the role.
    pub fn with_first_message_id(mut self, first_id: u32) -> Self {
        self.pending = PendingCalls::new(self.role, first_id);
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn pending(&self) -> &PendingCalls {
        &self.pending
    }

    /// Bind the handler for an incoming method (server) or signal (client).
    pub fn bind<F>(&mut self, name: &str, handler: F) -> Result<(), RpcError>
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        let id = self.lookup(self.role.incoming(), name)?.id as usize;
        self.handlers[id] = Some(Box::new(handler));
        Ok(())
    }

    fn lookup(&self, kind: FunctionKind, name: &str) -> Result<&FunctionDef, RpcError> {
        let found = match kind {
            FunctionKind::Method => self.model.method(name),
            FunctionKind::Signal => self.model.signal(name),
        };
        found.ok_or_else(|| RpcError::UnknownFunction {
            kind: kind_name(kind),
            name: name.to_string(),
        })
    }

    /// Encode a call to `name`, register it unless fire-and-forget, and write it to `out`.
    pub fn call<W: Write>(&self, out: &mut W, name: &str, args: &[Value]) -> Result<CallHandle, RpcError> {
        let function = self.lookup(self.role.outgoing(), name)?;
        if self.pending.is_closed() {
            return Err(RpcError::Closed);
        }
        let codec = Codec::new(&self.model);

        let (message_id, rx) = if function.is_fire_and_forget() {
            (None, None)
        } else {
            let (id, rx) = self.pending.register(function.id)?;
            (Some(id), Some(rx))
        };
        let encoded = codec
            .encode_call(function, message_id, args)
            .map_err(RpcError::from)
            .and_then(|wire| Ok(to_bytes(&wire)?));
        let sent = encoded.and_then(|bytes| {
            out.write_all(&bytes)?;
            out.flush()?;
            Ok(())
        });
        if let Err(e) = sent {
            if let Some(id) = message_id {
                self.pending.take(id);
            }
            tracing::debug!(function = %function.name, error = %e, "call failed before sending");
            return Err(e);
        }
        tracing::trace!(function = %function.name, ?message_id, "call sent");

        Ok(match rx {
            Some(rx) => CallHandle {
                message_id,
                rx: Some(rx),
                outcome: None,
            },
            None => CallHandle::fire_and_forget(),
        })
    }

    /// Process every complete message in `bytes`, writing replies to `out`.
    ///
    /// After the first write error no further replies are written, but the remaining
    /// messages are still routed so that responses in the buffer resolve their calls.
    pub fn receive<W: Write>(&self, bytes: &[u8], out: &mut W) -> Result<Received, RpcError> {
        let frame = decode_frame(bytes)?;
        let mut received = Received {
            incomplete: frame.incomplete,
            ..Received::default()
        };
        for removed in frame.removed {
            received.rejected.push(RpcError::Decode(DecodeError::Malformed(removed.reason)));
        }
        let mut writable = true;
        for message in frame.messages {
            match self.handle_message(&message.value) {
                Ok(incoming) => {
                    if let Incoming::Request { reply: Some(reply), .. } = &incoming {
                        if writable {
                            if let Err(e) = write_reply(out, reply) {
                                tracing::warn!(error = %e, "reply not written");
                                writable = !matches!(e, RpcError::Transport(_));
                                received.rejected.push(e);
                            }
                        }
                    }
                    received.handled.push(incoming);
                }
                Err(e) => received.rejected.push(e),
            }
        }
        if writable {
            if let Err(e) = out.flush() {
                received.rejected.push(e.into());
            }
        }
        Ok(received)
    }

    /// Route one decoded message: response to a pending call, or request for a handler.
    pub fn handle_message(&self, message: &Wire) -> Result<Incoming, RpcError> {
        let head = match message {
            Wire::Array(items) => items.first().and_then(Wire::as_u64),
            _ => None,
        };
        if let Some(id) = head {
            if self.role.owns_message_id(id) {
                return self.resolve(id, message);
            }
        }

        let codec = Codec::new(&self.model);
        let call = codec.decode_call(self.role.incoming(), message)?;
        let function = &self.model.functions(call.kind)[call.id as usize];
        let handler = self.handlers[call.id as usize]
            .as_ref()
            .ok_or_else(|| RpcError::NoHandler {
                kind: kind_name(call.kind),
                name: function.name.clone(),
            })?;
        tracing::trace!(function = %function.name, message_id = ?call.message_id, "dispatching request");
        let result = handler(&call.args);
        let reply = match call.message_id {
            Some(id) if !function.is_fire_and_forget() => {
                Some(codec.encode_response(function, id, &result)?)
            }
            _ => None,
        };
        Ok(Incoming::Request {
            name: function.name.clone(),
            reply,
        })
    }

    fn resolve(&self, id: u64, message: &Wire) -> Result<Incoming, RpcError> {
        let Some(call) = self.pending.take(id) else {
            tracing::warn!(message_id = id, "response matches no pending call");
            return Err(RpcError::UnmatchedResponse(id));
        };
        let function = &self.model.functions(self.role.outgoing())[call.function as usize];
        let outcome = Codec::new(&self.model)
            .decode_response(function, message)
            .map_err(CallError::from);
        if let Err(e) = &outcome {
            tracing::warn!(message_id = id, function = %function.name, error = %e, "call failed");
        }
        // The caller may have dropped its handle; the response is still consumed.
        let _ = call.tx.send(outcome);
        Ok(Incoming::Response { message_id: id })
    }

    /// Fail every pending call with [`CallError::ConnectionClosed`] and refuse new ones.
    pub fn close(&self) {
        let failed = self.pending.close();
        if failed > 0 {
            tracing::debug!(failed, "closed endpoint with pending calls");
        }
    }
}

fn write_reply<W: Write>(out: &mut W, reply: &Wire) -> Result<(), RpcError> {
    out.write_all(&to_bytes(reply)?)?;
    Ok(())
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.close();
    }
}
