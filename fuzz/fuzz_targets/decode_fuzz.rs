//! Decode fuzz target: arbitrary YAML against a recursive schema covering every kind.
//! Decoding must not panic or overflow the stack; anything it accepts must encode.
//! Build with: cargo fuzz run decode_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
const SCHEMA: &str = r#"
enum Color { RED = 0; GREEN = 1; }
message Node {
  double d = 1; float f = 2; int32 i = 3; int64 l = 4; uint32 u = 5; uint64 ul = 6;
  bool b = 7; string s = 8; bytes raw = 9; Color color = 10;
  Node child = 11;
  repeated Node children = 12;
  map<string, Node> named = 13;
  repeated string tags = 14;
}
"#;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let s = match std::str::from_utf8(data) {
        Ok(x) => x,
        Err(_) => return,
    };
    let desc = match protoyaml::Schema::parse(SCHEMA).ok().and_then(|schema| schema.message("Node")) {
        Some(d) => d,
        None => return,
    };
    let mut record = protoyaml::DynamicRecord::new(desc);
    if protoyaml::decode(&mut record, s).is_ok() {
        protoyaml::encode(&record).expect("decoded record must encode");
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run decode_fuzz");
}
