use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("snapcam {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: snapcam");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("SNAPCAM_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "features: session={}, cli=true",
        cfg!(feature = "session")
    );
    println!(
        "protocol: max_frame={}B response_timeout={}ms attempts={}",
        snapcam_frame::DEFAULT_MAX_FRAME_SIZE,
        snapcam_session::DEFAULT_RESPONSE_TIMEOUT.as_millis(),
        snapcam_session::MAX_SEND_RETRY
    );

    Ok(SUCCESS)
}
