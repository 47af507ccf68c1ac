use snapcam_frame::decode_response;

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, CliError, CliResult, SUCCESS};
use crate::output::{parse_hex, print_value, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let subframes = args
        .subframes
        .iter()
        .map(|hex| parse_hex(hex))
        .collect::<Result<Vec<_>, _>>()
        .map_err(CliError::usage)?;

    let value = decode_response(&subframes).map_err(|err| frame_error("decode failed", err))?;
    print_value(&value, format);
    Ok(SUCCESS)
}
