use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("drbwire {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: drbwire");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "marshal_format: {}.{}",
        drbwire_marshal::VERSION[0],
        drbwire_marshal::VERSION[1]
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "rustc: {}",
        option_env!("RUSTC_VERSION").unwrap_or("unknown")
    );
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "features: session={}, cli=true, unix_sockets={}",
        cfg!(feature = "session"),
        cfg!(unix)
    );

    Ok(SUCCESS)
}
