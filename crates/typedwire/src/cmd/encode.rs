use std::fs;

use serde_json::Value as JsonValue;
use tracing::debug;
use typedwire::frame::{split_message, Serializer};
use typedwire::types::{Codec, Value};

use crate::cmd::{parse_header, parse_typedef, EncodeArgs};
use crate::exit::{frame_error, io_error, usage, CliResult, SUCCESS};
use crate::output::{print_encoded, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let value = Value::from_json(&read_value(&args)?);
    let header = args.header.as_deref().map(parse_header).transpose()?;
    let serializer = match args.typedef.as_deref() {
        Some(arg) => Serializer::with_typedef(Codec::global(), parse_typedef(arg)?),
        None => Serializer::new(Codec::global()),
    };

    let message = serializer
        .serialize(&value, header.as_ref())
        .map_err(|err| frame_error("encode failed", err))?;
    let (metadata, payload) = split_message(&message)
        .map_err(|err| frame_error("encode failed", err))?
        .unwrap_or_default();
    debug!(size = message.len(), "encoded message");

    if let Some(path) = &args.output {
        fs::write(path, &message)
            .map_err(|err| io_error(&format!("failed writing {}", path.display()), err))?;
        if matches!(format, OutputFormat::Raw) {
            return Ok(SUCCESS);
        }
    }
    print_encoded(&metadata, payload.len(), &message, format);
    Ok(SUCCESS)
}

fn read_value(args: &EncodeArgs) -> CliResult<JsonValue> {
    let text = match (&args.value, &args.file) {
        (Some(value), _) => value.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?,
        (None, None) => return Err(usage("a value or --file is required")),
    };
    serde_json::from_str(&text).map_err(|err| usage(format!("value is not valid JSON: {err}")))
}
