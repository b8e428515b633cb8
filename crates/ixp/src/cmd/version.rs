use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("ixp {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: ixp");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "build_target: {}",
        option_env!("IXP_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "features: async={}, cli=true",
        cfg!(feature = "async")
    );
    println!("frame_header: {} bytes", ixp::frame::HEADER_SIZE);
    println!(
        "max_tags: default={} ceiling={}",
        ixp::mux::Multiplexer::DEFAULT_MAX_TAGS,
        ixp::mux::Multiplexer::MAX_TAGS
    );

    Ok(SUCCESS)
}
