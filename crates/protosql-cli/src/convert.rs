//! Message conversion commands.

use anyhow::{anyhow, Context, Result};
use clap::Args;
use protosql_descriptor::{DescriptorIndex, MessageDescriptor};
use protosql_runtime::api::{message_to_wire_json, wire_json_to_message};
use protosql_runtime::{
    decode, encode, from_proto_json, to_proto_json, DecodeOptions, JsonParseOptions,
    JsonPrintOptions,
};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::io::{read_text, read_wire, write_text, write_wire, IoArgs};

#[derive(Args, Debug, Clone)]
pub struct SchemaArgs {
    /// Descriptor set: binary `FileDescriptorSet`, or its JSON form when the
    /// file name ends in `.json`.
    #[arg(short = 'd', long)]
    pub descriptor_set: PathBuf,
    /// Fully-qualified message type, e.g. `acme.v1.Order`.
    #[arg(short = 't', long = "type")]
    pub type_name: String,
}

pub fn load_index(path: &Path) -> Result<DescriptorIndex> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let index = if is_json {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        DescriptorIndex::from_json(&text)
    } else {
        let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        DescriptorIndex::decode(&bytes)
    }
    .with_context(|| format!("failed to index {}", path.display()))?;
    debug!(
        path = %path.display(),
        files = index.files().len(),
        messages = index.messages().len(),
        "loaded descriptor set"
    );
    Ok(index)
}

fn message<'i>(index: &'i DescriptorIndex, type_name: &str) -> Result<&'i MessageDescriptor> {
    let name = type_name.strip_prefix('.').unwrap_or(type_name);
    index
        .message(name)
        .ok_or_else(|| anyhow!("message type `{name}` is not in the descriptor set"))
}

fn parse_json(text: &str) -> Result<Value> {
    serde_json::from_str(text).context("input is not valid JSON")
}

fn pretty(value: &Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn cmd_decode(schema: &SchemaArgs, io: &IoArgs, number_json: bool, emit_defaults: bool) -> Result<()> {
    let index = load_index(&schema.descriptor_set)?;
    let message = message(&index, &schema.type_name)?;
    let wire = read_wire(io)?;

    let options = if number_json {
        DecodeOptions::round_trip()
    } else {
        DecodeOptions::default()
    };
    let doc = decode(&index, message, &wire, &options).context("decode failed")?;
    let out = if number_json {
        doc
    } else {
        let options = JsonPrintOptions {
            emit_default_values: emit_defaults,
        };
        to_proto_json(&index, message, &doc, &options).context("ProtoJSON printing failed")?
    };
    write_text(io.out.as_deref(), &pretty(&out)?)
}

pub fn cmd_encode(schema: &SchemaArgs, io: &IoArgs, number_json: bool, strict: bool) -> Result<()> {
    let index = load_index(&schema.descriptor_set)?;
    let message = message(&index, &schema.type_name)?;
    let input = parse_json(&read_text(io.input.as_deref())?)?;

    let doc = if number_json {
        input
    } else {
        let options = if strict {
            JsonParseOptions::strict()
        } else {
            JsonParseOptions::default()
        };
        from_proto_json(&index, message, &input, &options).context("ProtoJSON parsing failed")?
    };
    let wire = encode(&index, message, &doc).context("encode failed")?;
    write_wire(io, &wire)
}

pub fn cmd_wire_json(io: &IoArgs, reverse: bool) -> Result<()> {
    if reverse {
        let input = parse_json(&read_text(io.input.as_deref())?)?;
        let wire = wire_json_to_message(&input).context("invalid WireJSON")?;
        return write_wire(io, &wire);
    }
    let wire = read_wire(io)?;
    let json = message_to_wire_json(&wire).context("invalid wire bytes")?;
    write_text(io.out.as_deref(), &pretty(&json)?)
}

pub fn cmd_number_json(
    schema: &SchemaArgs,
    input: Option<&Path>,
    reverse: bool,
    emit_defaults: bool,
) -> Result<()> {
    let index = load_index(&schema.descriptor_set)?;
    let message = message(&index, &schema.type_name)?;
    let json = parse_json(&read_text(input)?)?;

    let out = if reverse {
        let options = JsonPrintOptions {
            emit_default_values: emit_defaults,
        };
        to_proto_json(&index, message, &json, &options)?
    } else {
        from_proto_json(&index, message, &json, &JsonParseOptions::default())?
    };
    write_text(None, &pretty(&out)?)
}
