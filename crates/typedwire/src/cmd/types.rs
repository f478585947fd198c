use std::sync::Arc;

use typedwire::types::TypeRegistry;

use crate::cmd::TypesArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_types, OutputFormat};

pub fn run(_args: TypesArgs, format: OutputFormat) -> CliResult<i32> {
    let registry = TypeRegistry::global();
    print_types(registry.descriptors().map(Arc::as_ref), format);
    Ok(SUCCESS)
}
