//! Integration tests: decode YAML into records, encode records back, and the error taxonomy.

use protoyaml::{
    Codec, CodecError, DynamicRecord, ErrorKind, MessageDescriptor, Reflect, Schema, Value,
};
use serde_yaml::Value as Node;

const SAMPLE_SCHEMA: &str = r#"
syntax = "proto3";

message Metadata {
  map<string, string> info = 1;
}

message Source {
  string name = 1;
  repeated string processors = 2;
}

message Module {
  enum ModuleType {
    scaler = 0;
    h264 = 1;
    resampler = 2;
    aac = 3;
    pcm = 4;
  }
  ModuleType type = 1;
  int32 width = 2;
  int32 height = 3;
  int32 bitrate = 4;
  int32 key_frame_interval = 5;
  int32 sample_rate = 6;
  int32 channel_num = 7;
}

message Processor {
  enum ProcessMediaType {
    video = 0;
    audio = 1;
  }
  string name = 1;
  ProcessMediaType type = 2;
  repeated Module modules = 3;
}

message Drain {
  enum DrainType {
    mp4 = 0;
  }
  string name = 1;
  DrainType type = 2;
  repeated string processors = 3;
}

message Sample {
  string name = 1;
  Metadata metadata = 2;
  repeated Source sources = 3;
  repeated Processor processors = 4;
  repeated Drain drains = 5;
}
"#;

const SAMPLE_YAML: &str = r#"
name: recorder_sample
metadata:
  info:
    my_key: my_value
sources:
  - name: default_source
    processors:
      - audio_mixer_for_wav
      - audio_mixer_for_mp4
      - video_mixer_for_mp4
processors:
  - name: video_mixer_for_mp4
    type: video
    modules:
      - type: scaler
        width: 640
        height: 640
      - type: h264
        bitrate: 1000000
        key_frame_interval: 60
  - name: audio_mixer_for_mp4
    type: audio
    modules:
      - type: resampler
        sample_rate: 16000
        channel_num: 1
      - type: aac
  - name: audio_mixer_for_wav
    type: audio
    modules:
      - type: resampler
        sample_rate: 8000
        channel_num: 1
      - type: pcm
drains:
  - name: dedicated_recording_mp4
    type: mp4
    processors:
      - audio_mixer_for_mp4
      - video_mixer_for_mp4
  - name: dedicated_recording_wav
    type: mp4
    processors:
      - audio_mixer_for_wav
  - name: ondemand_recording_mp4
    type: mp4
    processors:
      - audio_mixer_for_mp4
      - video_mixer_for_mp4
"#;

const KINDS_SCHEMA: &str = r#"
package kinds;

enum Mode {
  IDLE = 0;
  ACTIVE = 1;
}

message Inner {
  string label = 1;
}

message AllKinds {
  double d = 1;
  float f = 2;
  int32 i32 = 3;
  int64 i64 = 4;
  uint32 u32 = 5;
  uint64 u64 = 6;
  bool flag = 7;
  string text = 8;
  bytes raw = 9;
  Mode mode = 10;
  Inner inner = 11;
  repeated int32 numbers = 12;
  repeated Inner items = 13;
  map<string, Inner> by_name = 14;
  map<string, bytes> blobs = 15;
  repeated Mode modes = 16;
  map<int32, string> by_id = 17;
  oneof choice {
    string word = 18;
    Inner detail = 19;
  }
  extensions 100 to 199;
}

extend AllKinds {
  string note = 100;
  repeated Inner extras = 101;
}
"#;

fn sample() -> MessageDescriptor {
    Schema::parse(SAMPLE_SCHEMA)
        .expect("schema")
        .message("Sample")
        .expect("Sample")
}

fn all_kinds() -> MessageDescriptor {
    Schema::parse(KINDS_SCHEMA)
        .expect("schema")
        .message("kinds.AllKinds")
        .expect("AllKinds")
}

fn decode_kinds(yaml: &str) -> (DynamicRecord, Result<(), CodecError>) {
    let mut record = DynamicRecord::new(all_kinds());
    let result = protoyaml::decode(&mut record, yaml);
    (record, result)
}

fn field(desc: &MessageDescriptor, name: &str) -> protoyaml::FieldDescriptor {
    desc.field_by_name(name)
        .or_else(|| desc.extension_by_name(name))
        .expect(name)
}

// ==================== Sample document ====================

#[test]
fn decode_recorder_sample() {
    let desc = sample();
    let mut record = DynamicRecord::new(desc.clone());
    protoyaml::decode(&mut record, SAMPLE_YAML).expect("decode");

    assert_eq!(record.get_by_name("name"), Some(&Value::from("recorder_sample")));
    let metadata = record.message_by_name("metadata").expect("metadata");
    let info = field(metadata.descriptor(), "info");
    assert_eq!(metadata.field_len(&info), 1);
    assert_eq!(
        metadata.map_get(&info, &Value::from("my_key")),
        Some(&Value::from("my_value"))
    );

    let sources = record.messages_by_name("sources");
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].get_by_name("name"), Some(&Value::from("default_source")));
    assert_eq!(sources[0].values_by_name("processors").len(), 3);

    let processors = record.messages_by_name("processors");
    assert_eq!(processors.len(), 3);
    assert_eq!(processors[1].get_by_name("type"), Some(&Value::EnumNumber(1)));
    let modules = processors[0].messages_by_name("modules");
    assert_eq!(modules.len(), 2);
    assert_eq!(modules[0].get_by_name("width"), Some(&Value::I32(640)));
    assert_eq!(modules[1].get_by_name("type"), Some(&Value::EnumNumber(1)));
    assert_eq!(modules[1].get_by_name("bitrate"), Some(&Value::I32(1_000_000)));

    assert_eq!(record.messages_by_name("drains").len(), 3);
}

#[test]
fn encode_recorder_sample_matches_document() {
    let mut record = DynamicRecord::new(sample());
    protoyaml::decode(&mut record, SAMPLE_YAML).expect("decode");
    let encoded = Codec::default().encode_value(&record).expect("encode");
    let expected: Node = serde_yaml::from_str(SAMPLE_YAML).expect("yaml");
    assert_eq!(encoded, expected);

    let text = protoyaml::encode(&record).expect("encode");
    let mut again = DynamicRecord::new(sample());
    protoyaml::decode(&mut again, &text).expect("decode again");
    assert_eq!(again, record);
}

#[test]
fn encode_built_record() -> anyhow::Result<()> {
    let desc = sample();
    let drain_desc = field(&desc, "drains").message_type().expect("Drain");
    let name = field(&drain_desc, "name");
    let kind = field(&drain_desc, "type");
    let processors = field(&drain_desc, "processors");

    let mut record = DynamicRecord::new(desc.clone());
    record.set(&field(&desc, "name"), "recorder_sample".into());
    let drain = record.add_message(&field(&desc, "drains")).expect("drain");
    drain.set(&name, "dedicated_recording_wav".into());
    drain.set(&kind, Value::EnumNumber(0));
    drain.add(&processors, "audio_mixer_for_wav".into());

    let encoded = Codec::default().encode_value(&record)?;
    let expected: Node = serde_yaml::from_str(
        r#"
name: recorder_sample
drains:
  - name: dedicated_recording_wav
    type: mp4
    processors: [audio_mixer_for_wav]
"#,
    )?;
    assert_eq!(encoded, expected);
    Ok(())
}

// ==================== Round trip ====================

#[test]
fn round_trip_all_kinds() -> anyhow::Result<()> {
    let desc = all_kinds();
    let inner_desc = field(&desc, "inner").message_type().expect("Inner");
    let label = field(&inner_desc, "label");

    let mut record = DynamicRecord::new(desc.clone());
    record.set(&field(&desc, "d"), Value::F64(0.1));
    record.set(&field(&desc, "f"), Value::F32(-2.5));
    record.set(&field(&desc, "i32"), Value::I32(i32::MIN));
    record.set(&field(&desc, "i64"), Value::I64(i64::MIN));
    record.set(&field(&desc, "u32"), Value::U32(u32::MAX));
    record.set(&field(&desc, "u64"), Value::U64(u64::MAX));
    record.set(&field(&desc, "flag"), Value::Bool(true));
    record.set(&field(&desc, "text"), "123".into());
    record.set(&field(&desc, "raw"), Value::Bytes(vec![0, 1, 2, 255]));
    record.set(&field(&desc, "mode"), Value::EnumNumber(1));
    record
        .mutable_message(&field(&desc, "inner"))
        .expect("inner")
        .set(&label, "héllo: world".into());
    for n in [3, -1, 0] {
        record.add(&field(&desc, "numbers"), Value::I32(n));
    }
    for text in ["a", "b"] {
        record
            .add_message(&field(&desc, "items"))
            .expect("item")
            .set(&label, text.into());
    }
    let by_name = field(&desc, "by_name");
    let value = by_name.message_type().and_then(|e| e.map_value()).expect("value");
    record
        .map_entry_mut(&by_name, "first".into())
        .expect("entry")
        .mutable_message(&value)
        .expect("value")
        .set(&label, "one".into());
    let blobs = field(&desc, "blobs");
    let blob_value = blobs.message_type().and_then(|e| e.map_value()).expect("value");
    record
        .map_entry_mut(&blobs, "empty".into())
        .expect("entry")
        .set(&blob_value, Value::Bytes(Vec::new()));
    record.add(&field(&desc, "modes"), Value::EnumNumber(0));
    record.add(&field(&desc, "modes"), Value::EnumNumber(1));
    record.set(&field(&desc, "word"), "chosen".into());
    record.set(&field(&desc, "kinds.note"), "extension".into());
    record
        .add_message(&field(&desc, "kinds.extras"))
        .expect("extra")
        .set(&label, "x".into());

    let text = protoyaml::encode(&record)?;
    let mut decoded = DynamicRecord::new(desc);
    protoyaml::decode(&mut decoded, &text)?;
    assert_eq!(decoded, record);
    Ok(())
}

#[test]
fn empty_record_round_trips() {
    let record = DynamicRecord::new(all_kinds());
    let text = protoyaml::encode(&record).expect("encode");
    let (decoded, result) = decode_kinds(&text);
    result.expect("decode");
    assert!(decoded.is_empty());
}

#[test]
fn extensions_use_full_name() {
    let (record, result) = decode_kinds("kinds.note: hi\nkinds.extras:\n  - label: e\n");
    result.expect("decode");
    let desc = all_kinds();
    assert_eq!(record.get(&field(&desc, "kinds.note")), Some(&Value::from("hi")));
    assert_eq!(record.field_len(&field(&desc, "kinds.extras")), 1);

    let encoded = Codec::default().encode_value(&record).expect("encode");
    let map = encoded.as_mapping().expect("mapping");
    assert!(map.contains_key("kinds.note"));
    assert!(!map.contains_key("note"));
}

// ==================== Error taxonomy ====================

#[test]
fn unknown_field_rejected() {
    let (_, result) = decode_kinds("bogus: 1\n");
    let err = result.unwrap_err();
    assert!(matches!(err, CodecError::UnknownField { ref name, .. } if name == "bogus"));
    assert_eq!(err.path(), Some("<root>"));

    let (_, result) = decode_kinds("inner:\n  nope: 1\n");
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownField);
    assert_eq!(err.path(), Some("inner"));

    // Extensions are only reachable by full name.
    let (_, result) = decode_kinds("note: hi\n");
    assert_eq!(result.unwrap_err().kind(), ErrorKind::UnknownField);
}

#[test]
fn cardinality_mismatch() {
    let (_, result) = decode_kinds("numbers: 5\n");
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert!(err.to_string().contains("invalid array"));

    let (_, result) = decode_kinds("by_name: [a, b]\n");
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert!(err.to_string().contains("invalid map"));

    let (_, result) = decode_kinds("inner: 5\n");
    assert_eq!(result.unwrap_err().kind(), ErrorKind::TypeMismatch);

    let (_, result) = decode_kinds("inner:\n");
    assert_eq!(result.unwrap_err().kind(), ErrorKind::TypeMismatch);

    let (_, result) = decode_kinds("items: [1]\n");
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert_eq!(err.path(), Some("items[0]"));
}

#[test]
fn enum_dual_resolution() {
    let desc = all_kinds();
    let mode = field(&desc, "mode");
    let (by_code, result) = decode_kinds("mode: 1\n");
    result.expect("code");
    let (by_name, result) = decode_kinds("mode: ACTIVE\n");
    result.expect("name");
    assert_eq!(by_code.get(&mode), Some(&Value::EnumNumber(1)));
    assert_eq!(by_code, by_name);

    let (_, result) = decode_kinds("mode: 7\n");
    assert!(matches!(result, Err(CodecError::InvalidEnumValue { ref value, .. }) if value == "7"));
    let (_, result) = decode_kinds("mode: SIDEWAYS\n");
    assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidEnumValue);
    let (_, result) = decode_kinds("modes: [IDLE, 1, MAYBE]\n");
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidEnumValue);
    assert_eq!(err.path(), Some("modes[2]"));
}

#[test]
fn invalid_bytes() {
    let (_, result) = decode_kinds("raw: '***'\n");
    let err = result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidByteEncoding);
    assert_eq!(err.path(), Some("raw"));
}

#[test]
fn error_paths_point_at_the_node() {
    let (_, result) = decode_kinds("items:\n  - label: a\n  - label: [x]\n");
    assert_eq!(result.unwrap_err().path(), Some("items[1].label"));

    let (_, result) = decode_kinds("by_name:\n  k:\n    label: {}\n");
    assert_eq!(result.unwrap_err().path(), Some("by_name[\"k\"].label"));

    let (_, result) = decode_kinds("blobs:\n  k: '!!'\n");
    assert_eq!(result.unwrap_err().path(), Some("blobs[\"k\"]"));
}

#[test]
fn invalid_root_and_parse_errors() {
    for text in ["- a\n- b\n", "just text\n", "42\n"] {
        let (_, result) = decode_kinds(text);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::InvalidRoot, "{:?}", text);
    }
    let (_, result) = decode_kinds("a: [1, 2\n");
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Parse);
}

#[test]
fn decode_is_not_transactional() {
    let (record, result) = decode_kinds("text: kept\nnumbers: oops\nflag: true\n");
    assert_eq!(result.unwrap_err().kind(), ErrorKind::TypeMismatch);
    assert_eq!(record.get_by_name("text"), Some(&Value::from("kept")));
    assert_eq!(record.get_by_name("flag"), None);
}

#[test]
fn repeated_fields_append_and_singular_fields_overwrite() {
    let mut record = DynamicRecord::new(all_kinds());
    protoyaml::decode(&mut record, "numbers: [1, 2]\ntext: a\n").expect("first");
    protoyaml::decode(&mut record, "numbers: [3]\ntext: b\n").expect("second");
    assert_eq!(
        record.values_by_name("numbers"),
        &[Value::I32(1), Value::I32(2), Value::I32(3)]
    );
    assert_eq!(record.get_by_name("text"), Some(&Value::from("b")));
}

#[test]
fn non_string_map_keys_decode_but_do_not_encode() {
    let (record, result) = decode_kinds("by_id:\n  1: one\n  '2': two\n");
    result.expect("decode");
    let by_id = field(&all_kinds(), "by_id");
    assert_eq!(record.map_get(&by_id, &Value::I32(1)), Some(&Value::from("one")));
    assert_eq!(record.map_get(&by_id, &Value::I32(2)), Some(&Value::from("two")));

    let err = protoyaml::encode(&record).unwrap_err();
    assert!(matches!(
        err,
        CodecError::UnsupportedMapKeyType {
            kind: protoyaml::Kind::Int32,
            ..
        }
    ));
    assert_eq!(err.path(), Some("by_id"));
}

#[test]
fn map_entries_missing_parts_encode_as_defaults() {
    let desc = all_kinds();
    let by_name = field(&desc, "by_name");
    let blobs = field(&desc, "blobs");
    let mut record = DynamicRecord::new(desc);
    record.map_entry_mut(&by_name, "bare".into()).expect("entry");
    record.add_message(&blobs).expect("entry");

    let encoded = Codec::default().encode_value(&record).expect("encode");
    let expected: Node = serde_yaml::from_str("by_name:\n  bare: {}\nblobs:\n  '': ''\n").expect("yaml");
    assert_eq!(encoded, expected);
}

#[test]
fn duplicate_map_keys_later_entry_wins() {
    let desc = all_kinds();
    let blobs = field(&desc, "blobs");
    let value = blobs.message_type().and_then(|e| e.map_value()).expect("value");
    let mut record = DynamicRecord::new(desc);
    record
        .map_entry_mut(&blobs, "k".into())
        .expect("entry")
        .set(&value, Value::Bytes(b"old".to_vec()));
    record
        .map_entry_mut(&blobs, "k".into())
        .expect("entry")
        .set(&value, Value::Bytes(b"new".to_vec()));
    let encoded = Codec::default().encode_value(&record).expect("encode");
    let expected: Node = serde_yaml::from_str("blobs:\n  k: bmV3\n").expect("yaml");
    assert_eq!(encoded, expected);
}

#[test]
fn stored_value_of_wrong_kind_fails_encode() {
    let desc = all_kinds();
    let mut record = DynamicRecord::new(desc.clone());
    record.set(&field(&desc, "i32"), "not a number".into());
    let err = protoyaml::encode(&record).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFieldKind);
    assert_eq!(err.path(), Some("i32"));

    let mut record = DynamicRecord::new(desc.clone());
    record.set(&field(&desc, "mode"), Value::EnumNumber(42));
    assert_eq!(
        protoyaml::encode(&record).unwrap_err().kind(),
        ErrorKind::UnsupportedFieldKind
    );
}

#[test]
fn oneof_last_member_wins_on_decode() {
    let (record, result) = decode_kinds("word: first\ndetail:\n  label: second\n");
    result.expect("decode");
    assert_eq!(record.get_by_name("word"), None);
    assert!(record.message_by_name("detail").is_some());
}

#[test]
fn string_fields_keep_scalar_text() {
    for text in ["1.10", "0x1F", "True", "1e3", "12345678901234567890123", "007"] {
        let (record, result) = decode_kinds(&format!("text: {}\n", text));
        result.expect(text);
        assert_eq!(record.get_by_name("text"), Some(&Value::from(text)), "{}", text);
    }
}

#[test]
fn string_map_keys_keep_scalar_text() {
    let desc = sample();
    let mut record = DynamicRecord::new(desc.clone());
    protoyaml::decode(&mut record, "metadata:\n  info:\n    1.10: v\n    0x10: w\n    yes: y\n")
        .expect("decode");
    let metadata = record.message_by_name("metadata").expect("metadata");
    let info = field(metadata.descriptor(), "info");
    assert_eq!(metadata.map_get(&info, &Value::from("1.10")), Some(&Value::from("v")));
    assert_eq!(metadata.map_get(&info, &Value::from("0x10")), Some(&Value::from("w")));
    assert_eq!(metadata.map_get(&info, &Value::from("yes")), Some(&Value::from("y")));

    let text = protoyaml::encode(&record).expect("encode");
    let mut again = DynamicRecord::new(desc);
    protoyaml::decode(&mut again, &text).expect("decode again");
    assert_eq!(again, record);
}

#[test]
fn scalar_text_coercions() {
    let (record, result) = decode_kinds(
        "i32: '0x10'\nu64: '42'\nflag: 'yes'\ntext: 3.5\nd: '.inf'\nf: 2\n",
    );
    result.expect("decode");
    assert_eq!(record.get_by_name("i32"), Some(&Value::I32(16)));
    assert_eq!(record.get_by_name("u64"), Some(&Value::U64(42)));
    assert_eq!(record.get_by_name("flag"), Some(&Value::Bool(true)));
    assert_eq!(record.get_by_name("text"), Some(&Value::from("3.5")));
    assert_eq!(record.get_by_name("d"), Some(&Value::F64(f64::INFINITY)));
    assert_eq!(record.get_by_name("f"), Some(&Value::F32(2.0)));
}
