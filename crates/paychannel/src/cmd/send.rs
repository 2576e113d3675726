use std::fs;

use paychannel_channel::Sender;
use paychannel_frame::FrameConfig;
use serde_json::{Map, Value};

use crate::cmd::{adopt_fd, SendArgs};
use crate::exit::{channel_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS};

pub fn run(args: SendArgs) -> CliResult<i32> {
    let header = build_header(&args)?;
    let payload = resolve_payload(&args)?;

    let stream = adopt_fd(args.producer_fd, "producer")?;
    let mut sender = Sender::new(stream, &FrameConfig::default())
        .map_err(|err| channel_error("cannot open producer", err))?;
    sender
        .send(&header, &payload)
        .map_err(|err| channel_error("send failed", err))?;
    sender.close();

    Ok(SUCCESS)
}

fn build_header(args: &SendArgs) -> CliResult<Value> {
    let mut header = Map::new();
    header.insert("event".to_string(), Value::String(args.event.clone()));
    if let Some(text) = &args.internal {
        header.insert("internal".to_string(), parse_object("--internal", text)?);
    }
    if let Some(text) = &args.data {
        header.insert("data".to_string(), parse_object("--data", text)?);
    }
    Ok(Value::Object(header))
}

fn parse_object(flag: &str, text: &str) -> CliResult<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(CliError::new(
            DATA_INVALID,
            format!("{flag} must be a JSON object"),
        )),
        Err(err) => Err(CliError::new(
            DATA_INVALID,
            format!("{flag} is not valid JSON: {err}"),
        )),
    }
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(text) = &args.payload {
        return Ok(text.as_bytes().to_vec());
    }
    if let Some(path) = &args.payload_file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}
