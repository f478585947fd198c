use std::io::{IsTerminal, Write};

use base64::Engine;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value as JsonValue;
use typedwire::types::{Metadata, TypeDescriptor, Value};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct EncodedOutput<'a> {
    metadata: &'a Metadata,
    payload_size: usize,
    message_size: usize,
    message: String,
}

#[derive(Serialize)]
struct DecodedOutput<'a> {
    value: JsonValue,
    metadata: &'a Metadata,
}

#[derive(Serialize)]
struct TypeOutput<'a> {
    name: &'a str,
    class: String,
    specificity: i32,
    description: &'a str,
    definition_properties: &'a [String],
    metadata_properties: &'a [String],
}

/// Print the result of framing a value.
pub fn print_encoded(metadata: &Metadata, payload_size: usize, message: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = EncodedOutput {
                metadata,
                payload_size,
                message_size: message.len(),
                message: base64::engine::general_purpose::STANDARD.encode(message),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = metadata_table(metadata);
            table.add_row(vec!["(message size)".to_string(), message.len().to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "type={} size={} message={} id={}",
                metadata.type_name().unwrap_or("?"),
                payload_size,
                message.len(),
                metadata.id().unwrap_or("-")
            );
        }
        OutputFormat::Raw => print_raw(message),
    }
}

/// Print a decoded value with its metadata.
pub fn print_decoded(value: &Value, metadata: &Metadata, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&DecodedOutput {
            value: value.to_json(),
            metadata,
        }),
        OutputFormat::Table => {
            let mut table = metadata_table(metadata);
            table.add_row(vec!["(value)".to_string(), value.to_json().to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "type={} size={} incomplete={} value={}",
                metadata.type_name().unwrap_or("?"),
                metadata.size().unwrap_or(0),
                metadata.incomplete(),
                value.to_json()
            );
        }
        OutputFormat::Raw => match value {
            Value::Bytes(bytes) => print_raw(bytes),
            other => println!("{}", other.to_json()),
        },
    }
}

/// Print the registered types, most specific first.
pub fn print_types<'a>(descriptors: impl Iterator<Item = &'a TypeDescriptor>, format: OutputFormat) {
    let rows: Vec<TypeOutput<'_>> = descriptors
        .map(|d| TypeOutput {
            name: d.name(),
            class: d.class().to_string(),
            specificity: d.specificity(),
            description: d.description(),
            definition_properties: d.definition_properties(),
            metadata_properties: d.metadata_properties(),
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TYPE", "CLASS", "SPECIFICITY", "METADATA"]);
            for row in &rows {
                table.add_row(vec![
                    row.name.to_string(),
                    row.class.clone(),
                    row.specificity.to_string(),
                    row.metadata_properties.join(", "),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for row in &rows {
                println!("{} ({}): {}", row.name, row.class, row.description);
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json(value: &impl Serialize) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn metadata_table(metadata: &Metadata) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["KEY", "VALUE"]);
    for (key, value) in metadata.iter() {
        let cell = match value {
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        };
        table.add_row(vec![key.clone(), cell]);
    }
    table
}
