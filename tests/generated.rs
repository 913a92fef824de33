//! The Rust module generated for `data/fs.vixrpc`, compiled and exercised.
//!
//! `generated/fs.rs` is checked in; `checked_in_module_is_current` fails when the
//! generator output drifts from it. Regenerate with
//! `vixrpcgen tests/data/fs.vixrpc --name fs --out-dir tests/generated`.

#[path = "generated/fs.rs"]
mod fs;

use fs::*;
use vixrpcgen::wire::{self, Bin, DecodeError, Value, Wire};
use vixrpcgen::{compile, generate, GeneratorConfig, Target};

const FS: &str = include_str!("data/fs.vixrpc");
const GENERATED: &str = include_str!("generated/fs.rs");

fn sample_stat() -> Stat {
    Stat {
        inode: 2,
        mode: 0o755,
        nlink: 1,
        uid: 1000,
        gid: 1000,
        atimesec: -1,
        atimens: 0,
        mtimesec: 1_700_000_000,
        mtimens: 5,
        ctimesec: 0,
        ctimens: 0,
        size: 4096,
        blocks: 8,
        blocksize: 512,
    }
}

#[derive(Default)]
struct Server {
    calls: Vec<String>,
}

impl MethodHandler for Server {
    fn auth(&mut self, version: u32, username: String, password: String) -> bool {
        self.calls.push(format!("auth {} {}", version, username));
        version == PROTOCOL_VERSION as u32 && password == "secret"
    }

    fn unit(&mut self) {
        self.calls.push("unit".to_string());
    }

    fn stat(&mut self, path: String) -> StatResult {
        self.calls.push(format!("stat {}", path));
        if path == "/" {
            StatResult::Stat(sample_stat())
        } else {
            StatResult::Errno(Errno::ENOENT)
        }
    }

    fn readdir(&mut self, path: String) -> ReaddirResult {
        self.calls.push(format!("readdir {}", path));
        ReaddirResult::DirEntryList(vec![DirEntry {
            name: "etc".to_string(),
            inode: 3,
        }])
    }

    fn read(&mut self, path: String, offset: u64, size: u32) -> (Bin, bool) {
        self.calls.push(format!("read {} {} {}", path, offset, size));
        (Bin(vec![0xde, 0xad]), true)
    }
}

#[derive(Default)]
struct Watcher {
    changed: Vec<String>,
    lines: Vec<String>,
}

impl SignalHandler for Watcher {
    fn changed(&mut self, path: String) {
        self.changed.push(path);
    }

    fn log(&mut self, line: String) {
        self.lines.push(line);
    }
}

#[test]
fn checked_in_module_is_current() {
    let model = compile(FS).expect("compile");
    let out = generate(&model, Target::Rust, &GeneratorConfig::new("fs")).expect("generate");
    assert_eq!(out.file("fs.rs"), Some(GENERATED));
}

#[test]
fn enums_convert_from_their_values() {
    assert_eq!(Errno::try_from(16u64), Ok(Errno::ENOENT));
    assert_eq!(Errno::EIO.value(), 5);
    assert_eq!(Errno::from_wire(&Value::from(1u64)), Ok(Errno::EPERM));
    assert!(matches!(
        Errno::from_wire(&Value::from(2u64)),
        Err(DecodeError::UnknownEnumValue { value: 2, .. })
    ));
}

#[test]
fn structs_are_positional_arrays() {
    let stat = sample_stat();
    let wire = stat.to_wire();
    match &wire {
        Value::Array(items) => {
            assert_eq!(items.len(), 14);
            assert_eq!(items[0], Value::from(2u64));
            assert_eq!(items[5], Value::from(-1i64));
        }
        other => panic!("expected array, got {:?}", other),
    }
    assert_eq!(Stat::from_wire(&wire), Ok(stat));

    let short = Value::Array(vec![Value::from(1u64); 13]);
    assert_eq!(
        Stat::from_wire(&short),
        Err(DecodeError::Length { expected: 14, found: 13 })
    );
}

#[test]
fn unions_carry_their_tag() {
    let ok = StatResult::Stat(sample_stat());
    let wire = ok.to_wire();
    assert!(matches!(&wire, Value::Array(items) if items[0] == Value::from(1u64)));
    assert_eq!(StatResult::from_wire(&wire), Ok(ok));

    let err = StatResult::Errno(Errno::EPERM);
    assert_eq!(
        err.to_wire(),
        Value::Array(vec![Value::from(0u64), Value::from(1u64)])
    );

    let bad = Value::Array(vec![Value::from(2u64), Value::Nil]);
    assert!(matches!(
        StatResult::from_wire(&bad),
        Err(DecodeError::UnionTag { tag: 2, members: 2, .. })
    ));

    let wrong_member = Value::Array(vec![Value::from(0u64), Value::from(99u64)]);
    let err = StatResult::from_wire(&wrong_member).unwrap_err();
    assert!(matches!(err.root(), DecodeError::UnknownEnumValue { value: 99, .. }));
    assert!(err.to_string().starts_with("StatResult[0]"));

    let listing = ReaddirResult::DirEntryList(vec![DirEntry {
        name: "a".to_string(),
        inode: 1,
    }]);
    assert_eq!(ReaddirResult::from_wire(&listing.to_wire()), Ok(listing));
}

#[test]
fn call_stubs_build_message_arrays() {
    let call = encode_auth_call(7, &1, &"root".to_string(), &"secret".to_string());
    assert_eq!(
        call,
        Value::Array(vec![
            Value::from(7u64),
            Value::from(METHOD_AUTH as u64),
            Value::from(1u64),
            Value::from("root"),
            Value::from("secret"),
        ])
    );
    assert_eq!(
        encode_unit_call(),
        Value::Array(vec![Value::Nil, Value::from(METHOD_UNIT as u64)])
    );
    assert_eq!(
        encode_log_signal(&"hi".to_string()),
        Value::Array(vec![Value::Nil, Value::from(SIGNAL_LOG as u64), Value::from("hi")])
    );
}

#[test]
fn decode_recovers_the_call() {
    let call = encode_read_call(3, &"/f".to_string(), &10, &4);
    let (message_id, decoded) = Method::decode(&call).expect("decode");
    assert_eq!(message_id, Some(3));
    assert_eq!(
        decoded,
        Method::Read {
            path: "/f".to_string(),
            offset: 10,
            size: 4,
        }
    );
    assert_eq!(decoded.id(), METHOD_READ);

    let unknown = wire::call_message(Some(1), 9, vec![]);
    assert!(matches!(
        Method::decode(&unknown),
        Err(DecodeError::UnknownFunction { kind: "method", id: 9 })
    ));
}

#[test]
fn dispatch_runs_the_handler_and_builds_responses() {
    let mut server = Server::default();

    let call = encode_auth_call(7, &1, &"root".to_string(), &"secret".to_string());
    let response = dispatch_method(&mut server, &call).expect("dispatch").expect("response");
    assert_eq!(decode_auth_response(&response), Ok((7, true)));

    let call = encode_stat_call(8, &"/".to_string());
    let response = dispatch_method(&mut server, &call).expect("dispatch").expect("response");
    assert_eq!(decode_stat_response(&response), Ok((8, StatResult::Stat(sample_stat()))));

    let call = encode_read_call(9, &"/f".to_string(), &0, &2);
    let response = dispatch_method(&mut server, &call).expect("dispatch").expect("response");
    assert_eq!(
        response,
        Value::Array(vec![Value::from(9u64), Value::Binary(vec![0xde, 0xad]), Value::Boolean(true)])
    );
    assert_eq!(decode_read_response(&response), Ok((9, (Bin(vec![0xde, 0xad]), true))));

    let response = dispatch_method(&mut server, &encode_unit_call()).expect("dispatch");
    assert_eq!(response, None);

    assert_eq!(server.calls, vec!["auth 1 root", "stat /", "read /f 0 2", "unit"]);
}

#[test]
fn dispatch_checks_the_message_id() {
    let mut server = Server::default();
    let unit_with_id = wire::call_message(Some(4), METHOD_UNIT, vec![]);
    assert!(matches!(
        dispatch_method(&mut server, &unit_with_id),
        Err(DecodeError::UnexpectedMessageId { id: 4, .. })
    ));
    let stat_without_id = wire::call_message(None, METHOD_STAT, vec![Value::from("/")]);
    assert!(matches!(
        dispatch_method(&mut server, &stat_without_id),
        Err(DecodeError::MissingMessageId { .. })
    ));
    let short = wire::call_message(Some(1), METHOD_READ, vec![Value::from("/f")]);
    assert_eq!(
        dispatch_method(&mut server, &short),
        Err(DecodeError::Length { expected: 5, found: 3 })
    );
    assert!(server.calls.is_empty());
}

#[test]
fn signals_dispatch_to_their_own_handler() {
    let mut watcher = Watcher::default();

    let call = encode_changed_signal(1 << 31, &"/tmp".to_string());
    let response = dispatch_signal(&mut watcher, &call).expect("dispatch").expect("response");
    assert_eq!(decode_changed_signal_response(&response), Ok((1 << 31, ())));

    let response = dispatch_signal(&mut watcher, &encode_log_signal(&"up".to_string())).expect("dispatch");
    assert_eq!(response, None);

    assert_eq!(watcher.changed, vec!["/tmp"]);
    assert_eq!(watcher.lines, vec!["up"]);
}
