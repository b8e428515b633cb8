use std::fs;

use ixp::mux::{Dispatch, Multiplexer, MuxConfig};
use ixp::Exchange;
use tracing::{debug, warn};

use crate::cmd::SendArgs;
use crate::exit::{call_error, io_error, mux_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_response, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let body = resolve_body(&args)?;
    let config = MuxConfig::default().with_max_frame_size(args.max_frame_size);
    let mux = Multiplexer::connect(&args.address, config)
        .map_err(|err| mux_error("connect failed", &err))?;

    let exchange = match args.expect {
        Some(response_type) => Exchange::new(args.request_type, response_type),
        None => Exchange::paired(args.request_type),
    };
    let dispatch = if args.sequential {
        Dispatch::Sequential
    } else {
        Dispatch::Tagged
    };
    debug!(
        address = %args.address,
        request_type = exchange.request_type,
        size = body.len(),
        "sending request"
    );

    let result = exchange.call(&mux, body, dispatch);
    if let Err(err) = mux.shutdown() {
        warn!(error = %err, "shutdown failed");
    }
    let reply = result.map_err(|err| call_error("request failed", &err))?;

    print_response(&args.address, &exchange, dispatch, &reply, format);
    Ok(SUCCESS)
}

fn resolve_body(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(hex) = &args.hex {
        return parse_hex(hex);
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), &err));
    }
    Ok(Vec::new())
}

fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: Vec<u8> = input
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "--hex needs an even number of digits"));
    }
    digits
        .chunks(2)
        .map(|pair| match (nibble(pair[0]), nibble(pair[1])) {
            (Some(high), Some(low)) => Ok(high << 4 | low),
            _ => Err(CliError::new(USAGE, format!("--hex is not valid hex: {input}"))),
        })
        .collect()
}

fn nibble(digit: u8) -> Option<u8> {
    char::from(digit).to_digit(16).map(|d| d as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_accepts_spaced_digits() {
        assert_eq!(
            parse_hex("00 20 00 00 06 00").unwrap(),
            vec![0x00, 0x20, 0x00, 0x00, 0x06, 0x00]
        );
        assert_eq!(parse_hex("FFff").unwrap(), vec![0xff, 0xff]);
        assert!(parse_hex("").unwrap().is_empty());
    }

    #[test]
    fn parse_hex_rejects_bad_input() {
        assert_eq!(parse_hex("abc").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("zz").unwrap_err().code, USAGE);
        assert_eq!(parse_hex("+1").unwrap_err().code, USAGE);
    }
}
