//! Simple dumper for files of concatenated BSON documents, or a single
//! OP_REPLY / OP_COMPRESSED frame.

use std::fs;

use bson_wire::protocol::{decompress_message, MessageHeader, OpCode, ReplyMessage};
use bson_wire::{BsonReader, DecodeOptions, Document, Value};

fn format_value(v: &Value, indent: usize) -> String {
    match v {
        Value::String(s) => {
            let preview: String = s.chars().take(80).collect();
            if s.chars().count() > 80 {
                format!("\"{}...\"", preview)
            } else {
                format!("\"{}\"", preview)
            }
        }
        Value::Double(d) => format!("{}", d),
        Value::Int32(i) => format!("{}", i),
        Value::Int64(i) => format!("NumberLong({})", i),
        Value::Boolean(b) => format!("{}", b),
        Value::DateTime(ms) => format!("Date({})", ms),
        Value::Null => "null".to_string(),
        Value::ObjectId(id) => format!("ObjectId({})", id),
        Value::Binary(b) => format!("BinData({}, {} bytes)", b.subtype.as_u8(), b.bytes.len()),
        Value::Regex { pattern, options } => format!("/{}/{}", pattern, options),
        Value::Symbol(s) => format!("Symbol({:?})", s),
        Value::Code(code) => format!("Code({:?})", code),
        Value::CodeWithScope { code, scope } => {
            format!("Code({:?}, {})", code, format_document(scope, indent))
        }
        Value::Timestamp { increment, time } => format!("Timestamp({}, {})", time, increment),
        Value::MinKey => "MinKey".to_string(),
        Value::MaxKey => "MaxKey".to_string(),
        Value::Document(doc) => format_document(doc, indent),
        Value::Array(items) => {
            let items: Vec<String> = items.values().map(|v| format_value(v, indent)).collect();
            format!("[{}]", items.join(", "))
        }
    }
}

fn format_document(doc: &Document, indent: usize) -> String {
    if doc.is_empty() {
        return "{}".to_string();
    }
    let pad = "  ".repeat(indent + 1);
    let mut out = String::from("{\n");
    for (key, value) in doc.iter() {
        out.push_str(&format!("{}{}: {}\n", pad, key, format_value(value, indent + 1)));
    }
    out.push_str(&"  ".repeat(indent));
    out.push('}');
    out
}

fn print_reply(frame: &[u8], options: DecodeOptions) {
    let reply = ReplyMessage::decode(frame, options).expect("Failed to decode reply");
    println!("\n=== Reply ===");
    println!("Request ID: {}", reply.header.request_id);
    println!("Response to: {}", reply.header.response_to);
    println!("Flags: {:#x}", reply.response_flags.bits());
    println!("Cursor: {}", reply.cursor_id);
    println!("Starting from: {}", reply.starting_from);
    println!("\n=== Documents ({}) ===", reply.documents.len());
    for (i, doc) in reply.documents.iter().enumerate() {
        println!("[{}] {}", i, format_document(doc, 0));
    }
}

fn main() {
    let path = std::env::args()
        .nth(1)
        .expect("usage: inspect_bson <file>");

    println!("Reading: {}", path);

    let data = fs::read(&path).expect("Failed to read file");
    println!("File size: {} bytes", data.len());

    let options = DecodeOptions::default();

    // A wire frame starts with a header whose length matches the file.
    let header = MessageHeader::read_from(&mut data.as_slice()).ok();
    match header {
        Some(h) if h.message_length as usize == data.len() && h.op_code == OpCode::Reply => {
            print_reply(&data, options);
            return;
        }
        Some(h) if h.message_length as usize == data.len() && h.op_code == OpCode::Compressed => {
            let restored = decompress_message(&data, options).expect("Failed to decompress");
            println!("Decompressed to {} bytes", restored.len());
            print_reply(&restored, options);
            return;
        }
        _ => {}
    }

    let reader = BsonReader::new(options);
    let mut source = data.as_slice();
    let mut count = 0;
    while !source.is_empty() {
        let doc = reader
            .read_document_from(&mut source)
            .expect("Failed to decode document");
        println!("[{}] {}", count, format_document(&doc, 0));
        count += 1;
    }
    println!("\n{} documents", count);
}
