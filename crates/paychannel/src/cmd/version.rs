use paychannel_frame::{CONTROL_TAG, DEFAULT_BUFFER_CAPACITY, MAX_PAYLOAD_LEN, PAYLOAD_TAG};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("paychannel {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    for (key, value) in extended_info() {
        println!("{key}: {value}");
    }
    Ok(SUCCESS)
}

/// Build target plus the wire constants a peer has to agree on.
fn extended_info() -> Vec<(&'static str, String)> {
    vec![
        ("name", "paychannel".to_string()),
        ("version", env!("CARGO_PKG_VERSION").to_string()),
        (
            "target",
            option_env!("PAYCHANNEL_BUILD_TARGET")
                .unwrap_or("unknown")
                .to_string(),
        ),
        ("features", format!("async={}", cfg!(feature = "async"))),
        ("framing", "netstring".to_string()),
        ("control_tag", char::from(CONTROL_TAG).to_string()),
        ("payload_tag", char::from(PAYLOAD_TAG).to_string()),
        ("max_payload", MAX_PAYLOAD_LEN.to_string()),
        ("read_buffer", DEFAULT_BUFFER_CAPACITY.to_string()),
    ]
}
