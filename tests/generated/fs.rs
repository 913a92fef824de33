// Generated by vixrpcgen from protocol `fs`. Do not edit.

#![allow(dead_code, unused_imports, unused_variables, non_camel_case_types, non_snake_case, non_upper_case_globals, clippy::all)]

use vixrpcgen::wire;
use vixrpcgen::wire::Wire as _;

pub const PROTOCOL_VERSION: i64 = 1;

pub const SERVICE: &str = "fs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum Errno {
    EPERM = 1,
    ENOENT = 16,
    EIO = 5,
}

impl Errno {
    pub fn value(self) -> u64 {
        self as u64
    }
}

impl TryFrom<u64> for Errno {
    type Error = wire::DecodeError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Errno::EPERM),
            16 => Ok(Errno::ENOENT),
            5 => Ok(Errno::EIO),
            other => Err(wire::unknown_enum_value("Errno", other)),
        }
    }
}

impl wire::Wire for Errno {
    fn to_wire(&self) -> wire::Value {
        wire::Value::from(self.value())
    }

    fn from_wire(value: &wire::Value) -> Result<Self, wire::DecodeError> {
        Self::try_from(wire::enum_value(value, "Errno")?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stat {
    pub inode: u64,
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub atimesec: i64,
    pub atimens: u32,
    pub mtimesec: i64,
    pub mtimens: u32,
    pub ctimesec: i64,
    pub ctimens: u32,
    pub size: u64,
    pub blocks: u64,
    pub blocksize: u32,
}

impl wire::Wire for Stat {
    fn to_wire(&self) -> wire::Value {
        wire::Value::Array(vec![self.inode.to_wire(), self.mode.to_wire(), self.nlink.to_wire(), self.uid.to_wire(), self.gid.to_wire(), self.atimesec.to_wire(), self.atimens.to_wire(), self.mtimesec.to_wire(), self.mtimens.to_wire(), self.ctimesec.to_wire(), self.ctimens.to_wire(), self.size.to_wire(), self.blocks.to_wire(), self.blocksize.to_wire()])
    }

    fn from_wire(value: &wire::Value) -> Result<Self, wire::DecodeError> {
        let items = wire::expect_array(value, 14, "Stat")?;
        Ok(Stat {
            inode: wire::field(items, 0, "inode")?,
            mode: wire::field(items, 1, "mode")?,
            nlink: wire::field(items, 2, "nlink")?,
            uid: wire::field(items, 3, "uid")?,
            gid: wire::field(items, 4, "gid")?,
            atimesec: wire::field(items, 5, "atimesec")?,
            atimens: wire::field(items, 6, "atimens")?,
            mtimesec: wire::field(items, 7, "mtimesec")?,
            mtimens: wire::field(items, 8, "mtimens")?,
            ctimesec: wire::field(items, 9, "ctimesec")?,
            ctimens: wire::field(items, 10, "ctimens")?,
            size: wire::field(items, 11, "size")?,
            blocks: wire::field(items, 12, "blocks")?,
            blocksize: wire::field(items, 13, "blocksize")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatResult {
    Errno(Errno),
    Stat(Stat),
}

impl wire::Wire for StatResult {
    fn to_wire(&self) -> wire::Value {
        let (tag, value) = match self {
            StatResult::Errno(v) => (0u64, v.to_wire()),
            StatResult::Stat(v) => (1u64, v.to_wire()),
        };
        wire::Value::Array(vec![wire::Value::from(tag), value])
    }

    fn from_wire(value: &wire::Value) -> Result<Self, wire::DecodeError> {
        let (tag, inner) = wire::union_parts(value, "StatResult", 2)?;
        let context = |e: wire::DecodeError| e.in_field(format!("StatResult[{}]", tag));
        Ok(match tag {
            0 => StatResult::Errno(wire::Wire::from_wire(inner).map_err(context)?),
            _ => StatResult::Stat(wire::Wire::from_wire(inner).map_err(context)?),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirEntry {
    pub name: String,
    pub inode: u64,
}

impl wire::Wire for DirEntry {
    fn to_wire(&self) -> wire::Value {
        wire::Value::Array(vec![self.name.to_wire(), self.inode.to_wire()])
    }

    fn from_wire(value: &wire::Value) -> Result<Self, wire::DecodeError> {
        let items = wire::expect_array(value, 2, "DirEntry")?;
        Ok(DirEntry {
            name: wire::field(items, 0, "name")?,
            inode: wire::field(items, 1, "inode")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReaddirResult {
    Errno(Errno),
    DirEntryList(Vec<DirEntry>),
}

impl wire::Wire for ReaddirResult {
    fn to_wire(&self) -> wire::Value {
        let (tag, value) = match self {
            ReaddirResult::Errno(v) => (0u64, v.to_wire()),
            ReaddirResult::DirEntryList(v) => (1u64, v.to_wire()),
        };
        wire::Value::Array(vec![wire::Value::from(tag), value])
    }

    fn from_wire(value: &wire::Value) -> Result<Self, wire::DecodeError> {
        let (tag, inner) = wire::union_parts(value, "ReaddirResult", 2)?;
        let context = |e: wire::DecodeError| e.in_field(format!("ReaddirResult[{}]", tag));
        Ok(match tag {
            0 => ReaddirResult::Errno(wire::Wire::from_wire(inner).map_err(context)?),
            _ => ReaddirResult::DirEntryList(wire::Wire::from_wire(inner).map_err(context)?),
        })
    }
}

pub const METHOD_AUTH: u32 = 0;
pub const METHOD_UNIT: u32 = 1;
pub const METHOD_STAT: u32 = 2;
pub const METHOD_READDIR: u32 = 3;
pub const METHOD_READ: u32 = 4;

/// Decoded arguments of an incoming method.
#[derive(Debug, Clone, PartialEq)]
pub enum Method {
    Auth { version: u32, username: String, password: String },
    Unit,
    Stat { path: String },
    Readdir { path: String },
    Read { path: String, offset: u64, size: u32 },
}

impl Method {
    /// Decode `[messageid | nil, methodid, args...]`.
    pub fn decode(message: &wire::Value) -> Result<(Option<u64>, Method), wire::DecodeError> {
        let (message_id, id, args) = wire::call_parts(message)?;
        let call = match id {
            0 => {
                wire::require_message_id(message_id, "auth")?;
                let args = wire::expect_args(args, 3)?;
                Method::Auth {
                    version: wire::field(args, 0, "version")?,
                    username: wire::field(args, 1, "username")?,
                    password: wire::field(args, 2, "password")?,
                }
            }
            1 => {
                wire::forbid_message_id(message_id, "unit")?;
                wire::expect_args(args, 0)?;
                Method::Unit
            }
            2 => {
                wire::require_message_id(message_id, "stat")?;
                let args = wire::expect_args(args, 1)?;
                Method::Stat {
                    path: wire::field(args, 0, "path")?,
                }
            }
            3 => {
                wire::require_message_id(message_id, "readdir")?;
                let args = wire::expect_args(args, 1)?;
                Method::Readdir {
                    path: wire::field(args, 0, "path")?,
                }
            }
            4 => {
                wire::require_message_id(message_id, "read")?;
                let args = wire::expect_args(args, 3)?;
                Method::Read {
                    path: wire::field(args, 0, "path")?,
                    offset: wire::field(args, 1, "offset")?,
                    size: wire::field(args, 2, "size")?,
                }
            }
            other => return Err(wire::DecodeError::UnknownFunction { kind: "method", id: other }),
        };
        Ok((message_id, call))
    }

    pub fn id(&self) -> u32 {
        match *self {
            Method::Auth { .. } => METHOD_AUTH,
            Method::Unit => METHOD_UNIT,
            Method::Stat { .. } => METHOD_STAT,
            Method::Readdir { .. } => METHOD_READDIR,
            Method::Read { .. } => METHOD_READ,
        }
    }
}

pub fn encode_auth_call(message_id: u64, version: &u32, username: &String, password: &String) -> wire::Value {
    wire::call_message(Some(message_id), self::METHOD_AUTH, vec![version.to_wire(), username.to_wire(), password.to_wire()])
}

pub fn decode_auth_response(message: &wire::Value) -> Result<(u64, bool), wire::DecodeError> {
    let (message_id, values) = wire::response_parts(message, 1)?;
    Ok((message_id, wire::field(values, 0, "auth response")?))
}

pub fn encode_unit_call() -> wire::Value {
    wire::call_message(None, self::METHOD_UNIT, vec![])
}

pub fn encode_stat_call(message_id: u64, path: &String) -> wire::Value {
    wire::call_message(Some(message_id), self::METHOD_STAT, vec![path.to_wire()])
}

pub fn decode_stat_response(message: &wire::Value) -> Result<(u64, StatResult), wire::DecodeError> {
    let (message_id, values) = wire::response_parts(message, 1)?;
    Ok((message_id, wire::field(values, 0, "stat response")?))
}

pub fn encode_readdir_call(message_id: u64, path: &String) -> wire::Value {
    wire::call_message(Some(message_id), self::METHOD_READDIR, vec![path.to_wire()])
}

pub fn decode_readdir_response(message: &wire::Value) -> Result<(u64, ReaddirResult), wire::DecodeError> {
    let (message_id, values) = wire::response_parts(message, 1)?;
    Ok((message_id, wire::field(values, 0, "readdir response")?))
}

pub fn encode_read_call(message_id: u64, path: &String, offset: &u64, size: &u32) -> wire::Value {
    wire::call_message(Some(message_id), self::METHOD_READ, vec![path.to_wire(), offset.to_wire(), size.to_wire()])
}

pub fn decode_read_response(message: &wire::Value) -> Result<(u64, (wire::Bin, bool)), wire::DecodeError> {
    let (message_id, values) = wire::response_parts(message, 2)?;
    Ok((message_id, (wire::field(values, 0, ".0")?, wire::field(values, 1, ".1")?)))
}

pub trait MethodHandler {
    fn auth(&mut self, version: u32, username: String, password: String) -> bool;
    fn unit(&mut self);
    fn stat(&mut self, path: String) -> StatResult;
    fn readdir(&mut self, path: String) -> ReaddirResult;
    fn read(&mut self, path: String, offset: u64, size: u32) -> (wire::Bin, bool);
}

/// Decode an incoming method, run it on `handler` and build the response.
/// Fire-and-forget functions produce no response.
pub fn dispatch_method<H: MethodHandler + ?Sized>(
    handler: &mut H,
    message: &wire::Value,
) -> Result<Option<wire::Value>, wire::DecodeError> {
    let (message_id, call) = Method::decode(message)?;
    match call {
        Method::Auth { version: a0, username: a1, password: a2 } => {
            let result = handler.auth(a0, a1, a2);
            let message_id = wire::require_message_id(message_id, "auth")?;
            Ok(Some(wire::response_message(message_id, vec![result.to_wire()])))
        }
        Method::Unit => {
            handler.unit();
            Ok(None)
        }
        Method::Stat { path: a0 } => {
            let result = handler.stat(a0);
            let message_id = wire::require_message_id(message_id, "stat")?;
            Ok(Some(wire::response_message(message_id, vec![result.to_wire()])))
        }
        Method::Readdir { path: a0 } => {
            let result = handler.readdir(a0);
            let message_id = wire::require_message_id(message_id, "readdir")?;
            Ok(Some(wire::response_message(message_id, vec![result.to_wire()])))
        }
        Method::Read { path: a0, offset: a1, size: a2 } => {
            let result = handler.read(a0, a1, a2);
            let message_id = wire::require_message_id(message_id, "read")?;
            Ok(Some(wire::response_message(message_id, vec![result.0.to_wire(), result.1.to_wire()])))
        }
    }
}

pub const SIGNAL_CHANGED: u32 = 0;
pub const SIGNAL_LOG: u32 = 1;

/// Decoded arguments of an incoming signal.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Changed { path: String },
    Log { line: String },
}

impl Signal {
    /// Decode `[messageid | nil, signalid, args...]`.
    pub fn decode(message: &wire::Value) -> Result<(Option<u64>, Signal), wire::DecodeError> {
        let (message_id, id, args) = wire::call_parts(message)?;
        let call = match id {
            0 => {
                wire::require_message_id(message_id, "changed")?;
                let args = wire::expect_args(args, 1)?;
                Signal::Changed {
                    path: wire::field(args, 0, "path")?,
                }
            }
            1 => {
                wire::forbid_message_id(message_id, "log")?;
                let args = wire::expect_args(args, 1)?;
                Signal::Log {
                    line: wire::field(args, 0, "line")?,
                }
            }
            other => return Err(wire::DecodeError::UnknownFunction { kind: "signal", id: other }),
        };
        Ok((message_id, call))
    }

    pub fn id(&self) -> u32 {
        match *self {
            Signal::Changed { .. } => SIGNAL_CHANGED,
            Signal::Log { .. } => SIGNAL_LOG,
        }
    }
}

pub fn encode_changed_signal(message_id: u64, path: &String) -> wire::Value {
    wire::call_message(Some(message_id), self::SIGNAL_CHANGED, vec![path.to_wire()])
}

pub fn decode_changed_signal_response(message: &wire::Value) -> Result<(u64, ()), wire::DecodeError> {
    let (message_id, values) = wire::response_parts(message, 1)?;
    Ok((message_id, wire::field(values, 0, "changed response")?))
}

pub fn encode_log_signal(line: &String) -> wire::Value {
    wire::call_message(None, self::SIGNAL_LOG, vec![line.to_wire()])
}

pub trait SignalHandler {
    fn changed(&mut self, path: String);
    fn log(&mut self, line: String);
}

/// Decode an incoming signal, run it on `handler` and build the response.
/// Fire-and-forget functions produce no response.
pub fn dispatch_signal<H: SignalHandler + ?Sized>(
    handler: &mut H,
    message: &wire::Value,
) -> Result<Option<wire::Value>, wire::DecodeError> {
    let (message_id, call) = Signal::decode(message)?;
    match call {
        Signal::Changed { path: a0 } => {
            let result = handler.changed(a0);
            let message_id = wire::require_message_id(message_id, "changed")?;
            Ok(Some(wire::response_message(message_id, vec![result.to_wire()])))
        }
        Signal::Log { line: a0 } => {
            handler.log(a0);
            Ok(None)
        }
    }
}

