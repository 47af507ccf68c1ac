use serde_json::Value;
use snapcam_frame::{expects_response, opcode_name, ACK_FRAME};
use snapcam_session::{Session, SessionConfig, SimulatedCamera, SimulatorConfig};
use snapcam_transport::NotificationQueue;
use tracing::info;

use crate::cmd::{build_command, parse_duration, SimulateArgs};
use crate::exit::{session_error, CliError, CliResult, SUCCESS};
use crate::output::{print_simulation, OutputFormat, SimulationOutput};

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let command = build_command(args.opcode, args.args.as_deref())?;
    let response_timeout = parse_duration(&args.timeout)?;
    if args.chunk_size == 0 {
        return Err(CliError::usage("--chunk-size must be greater than zero"));
    }
    let expect_response = args.response || expects_response(args.opcode);

    let queue = NotificationQueue::new();
    let mut camera = SimulatedCamera::with_config(
        queue.sender(),
        SimulatorConfig {
            chunk_size: args.chunk_size,
            drop_acks: args.drop_acks,
        },
    );
    if let Some(reply) = &args.reply {
        let reply: Value = serde_json::from_str(reply)
            .map_err(|err| CliError::usage(format!("--reply is not valid JSON: {err}")))?;
        camera = camera.with_response(args.opcode, reply);
    }

    let config = SessionConfig {
        response_timeout,
        max_send_attempts: args.attempts,
        ..SessionConfig::default()
    };
    let mut session = Session::with_queue(camera, queue, config);
    session.on_connected();

    let result = session
        .send_command(&command, expect_response)
        .map_err(|err| session_error("simulate failed", err))?;

    let camera = session.into_inner();
    let acks_written = camera
        .writes()
        .iter()
        .filter(|frame| frame.as_ref() == ACK_FRAME)
        .count();
    let frames_written = camera.writes().len() - acks_written;
    info!(
        opcode = args.opcode,
        frames_written, acks_written, "simulated command completed"
    );

    print_simulation(
        &SimulationOutput {
            opcode: args.opcode,
            command: opcode_name(args.opcode),
            expect_response,
            result: &result,
            frames_written,
            acks_written,
        },
        format,
    );
    Ok(SUCCESS)
}
