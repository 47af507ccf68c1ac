use snapcam_session::{Camera, Session, SessionConfig, SimulatedCamera};
use snapcam_transport::NotificationQueue;

use crate::cmd::{parse_duration, InfoArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_report, CameraReport, OutputFormat};

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let response_timeout = parse_duration(&args.timeout)?;

    let queue = NotificationQueue::new();
    let simulated = SimulatedCamera::new(queue.sender()).drop_acks(args.drop_acks);
    let config = SessionConfig {
        response_timeout,
        ..SessionConfig::default()
    };
    let session = Session::with_queue(simulated, queue, config);
    session.on_connected();
    let mut camera = Camera::new(session);

    let device = camera
        .device_info()
        .map_err(|err| session_error("device info failed", err))?;
    let wifi = camera
        .wifi_ap_info()
        .map_err(|err| session_error("wifi info failed", err))?;
    let ip_address = camera
        .ip_address()
        .map_err(|err| session_error("ip query failed", err))?;
    let clock = if args.sync_clock {
        let sent = camera
            .sync_clock()
            .map_err(|err| session_error("clock sync failed", err))?;
        Some(sent.to_string())
    } else {
        None
    };

    print_report(
        &CameraReport {
            device,
            wifi,
            ip_address,
            capture_state: camera.capture_state(),
            clock,
        },
        format,
    );
    Ok(SUCCESS)
}
