//! Compiler fuzz target: feed arbitrary text through parse, resolve and validate.
//! No stage may panic; each returns a model or a batch of errors.
//! Build with: cargo fuzz run parser_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let s = match std::str::from_utf8(data) {
        Ok(x) => x,
        Err(_) => return,
    };
    if let Ok(model) = vixrpcgen::compile(s) {
        let config = vixrpcgen::GeneratorConfig::new("fuzz");
        let _ = vixrpcgen::generate(&model, vixrpcgen::Target::Rust, &config);
        let _ = vixrpcgen::generate(&model, vixrpcgen::Target::C, &config);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run parser_fuzz");
}
