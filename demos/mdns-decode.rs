//! Decodes hex-encoded DNS messages and prints their contents.
//!
//! Each argument is one message. Without arguments, every non-empty line of stdin is decoded.

use std::{env, io};

use log::LevelFilter;
use mdns_query::packet::decoder::MessageDecoder;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::new()
        .filter_module("mdns_query", LevelFilter::Trace)
        .parse_default_env()
        .init();

    let mut messages = env::args().skip(1).collect::<Vec<_>>();
    if messages.is_empty() {
        messages = io::stdin()
            .lines()
            .collect::<io::Result<Vec<_>>>()?
            .into_iter()
            .filter(|line| !line.trim().is_empty())
            .collect();
    }

    for message in &messages {
        let bytes = match parse_hex(message) {
            Some(bytes) => bytes,
            None => {
                eprintln!("not valid hex: {}", message);
                continue;
            }
        };
        if let Err(e) = dump(&bytes) {
            println!("error: {}", e);
        }
        println!();
    }

    Ok(())
}

fn dump(msg: &[u8]) -> Result<(), mdns_query::Error> {
    let mut dec = MessageDecoder::new(msg)?;
    println!("{:?}", dec.header());
    for q in dec.questions() {
        println!("QUES: {}", q?);
    }
    for res in dec.records()? {
        let (section, rr) = res?;
        println!("{}: {}", section, rr);
    }
    Ok(())
}

fn parse_hex(s: &str) -> Option<Vec<u8>> {
    let digits = s.bytes().filter(|b| !b.is_ascii_whitespace()).collect::<Vec<_>>();
    if digits.len() % 2 != 0 {
        return None;
    }
    digits
        .chunks(2)
        .map(|pair| u8::from_str_radix(std::str::from_utf8(pair).ok()?, 16).ok())
        .collect()
}
