use snapcam_frame::{encode_command, FrameConfig};

use crate::cmd::{build_command, EncodeArgs};
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_frames, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let command = build_command(args.opcode, args.args.as_deref())?;
    let config = FrameConfig {
        max_frame_size: args.frame_size,
    };
    let frames =
        encode_command(&command, &config).map_err(|err| frame_error("encode failed", err))?;

    print_frames(args.opcode, &command.to_value(), &frames, format);
    Ok(SUCCESS)
}
