//! # vixrpcgen: IDL compiler for MessagePack array RPC
//!
//! A small interface definition language for remote procedure calls whose messages are
//! MessagePack arrays of primitives and nested arrays, with a PEST grammar, a resolver
//! and validator, code generators, and a runtime that implements the same wire rules.
//!
//! ## IDL structure
//!
//! - **Constants**: `const NAME = 42`
//! - **Enums**: named integers, encoded as the integer
//! - **Structs**: ordered fields, encoded as a positional array
//! - **Unions**: one of several member types, encoded as `[tag, value]`
//! - **Methods** (`fn`) are called by the client; **signals** are emitted by the server
//!
//! ## Types
//!
//! - Base: `u8`, `u16`, `u32`, `u64`, `i8`, `i16`, `i32`, `i64`, `f32`, `f64`, `float`,
//!   `bool`, `str`, `bin`, `array`, `nil`
//! - `[T]` lists and `(T, U)` tuples
//! - `fireandforget` as a return type: the call carries no message id and gets no response
//!
//! ## Example IDL
//!
//! ```text
//! enum Errno:
//!     ENOENT = 16
//!
//! struct Stat:
//!     inode: u64
//!     size: u64
//!
//! union StatResult = Errno | Stat
//!
//! fn stat(path: str) -> StatResult
//! fn log(line: str) -> fireandforget
//! signal changed(path: str) -> nil
//! ```
//!
//! ## Messages
//!
//! Calls and signals are `[messageid | nil, id, args...]`; responses are
//! `[messageid, returnValue...]`. Both sides of a connection allocate message ids, so the
//! 32-bit id space is split: clients use ids with bit 31 clear and servers ids with it set
//! ([`rpc::SERVER_MESSAGE_ID_BIT`]). An endpoint takes a message headed by one of its own
//! ids for a response and anything else for a request.
//!
//! ## Usage
//!
//! [`compile`] runs parse, resolve and validate; [`generate`] emits target source from the
//! resulting [`Model`]; [`Codec`] and [`Endpoint`] exercise the protocol at runtime. See
//! `tests/integration.rs` for full examples.

pub mod ast;
pub mod codec;
pub mod frame;
pub mod generator;
pub mod model;
pub mod parser;
pub mod resolve;
pub mod rpc;
pub mod validate;
pub mod value;
pub mod wire;

use std::fmt;

pub use ast::{FunctionKind, Protocol, Span};
pub use codec::{Codec, CodecError, DecodeError, DecodedCall};
pub use frame::{decode_frame, encode_frame, FrameDecodeResult};
pub use generator::{generate, GeneratedSource, GenerationError, GeneratorConfig, Target};
pub use model::{FunctionDef, Model, Type};
pub use parser::{parse, SyntaxError};
pub use resolve::{resolve, ResolutionError};
pub use rpc::{CallError, CallHandle, CallState, Endpoint, Role, RpcError};
pub use validate::{validate, ValidationError, ValidationRule};
pub use value::Value;

/// One error from the compile pipeline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// All errors of the stage that failed. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileErrors(pub Vec<CompileError>);

impl CompileErrors {
    pub fn errors(&self) -> &[CompileError] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", e)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileErrors {}

impl<E: Into<CompileError>> From<Vec<E>> for CompileErrors {
    fn from(errors: Vec<E>) -> Self {
        CompileErrors(errors.into_iter().map(Into::into).collect())
    }
}

/// Parse, resolve and validate IDL source into a model ready for generation.
pub fn compile(source: &str) -> Result<Model, CompileErrors> {
    let protocol = parse(source).map_err(|e| CompileErrors::from(vec![e]))?;
    let model = resolve(&protocol).map_err(CompileErrors::from)?;
    let violations = validate(&model);
    if !violations.is_empty() {
        return Err(violations.into());
    }
    tracing::debug!(
        enums = model.enums.len(),
        structs = model.structs.len(),
        unions = model.unions.len(),
        methods = model.methods.len(),
        signals = model.signals.len(),
        "compiled protocol"
    );
    Ok(model)
}
