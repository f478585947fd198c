use std::fs;
use std::io::Read;

use typedwire::frame::Serializer;
use typedwire::types::{Codec, Value};

use crate::cmd::{parse_typedef, DecodeArgs};
use crate::exit::{frame_error, io_error, CliResult, SUCCESS};
use crate::output::{print_decoded, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let message = read_input(&args)?;
    let serializer = match args.typedef.as_deref() {
        Some(arg) => Serializer::with_typedef(Codec::global(), parse_typedef(arg)?),
        None => Serializer::new(Codec::global()),
    };

    let (value, metadata) = if args.no_decode {
        let (payload, metadata) = serializer
            .deserialize_raw(&message, None)
            .map_err(|err| frame_error("decode failed", err))?;
        (Value::Bytes(payload), metadata)
    } else {
        serializer
            .deserialize(&message, None)
            .map_err(|err| frame_error("decode failed", err))?
    };

    print_decoded(&value, &metadata, format);
    Ok(SUCCESS)
}

fn read_input(args: &DecodeArgs) -> CliResult<Vec<u8>> {
    match &args.input {
        Some(path) if path.as_os_str() != "-" => fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err)),
        _ => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .map_err(|err| io_error("failed reading stdin", err))?;
            Ok(buf)
        }
    }
}
