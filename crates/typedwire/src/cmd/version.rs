use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("typedwire {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: typedwire");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("features: comm={}, cli=true", cfg!(feature = "comm"));
    println!(
        "default_max_chunk: {}",
        typedwire::frame::DEFAULT_MAX_CHUNK
    );

    Ok(SUCCESS)
}
