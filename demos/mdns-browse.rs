//! Browses the local network for instances of a service type.
//!
//! Usage: `mdns-browse <service> [timeout-ms]`, for example `mdns-browse _http._tcp`.

use std::{env, process, time::Duration};

use log::LevelFilter;
use mdns_query::{Domain, Query, Service};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::new()
        .filter_module("mdns_query", LevelFilter::Debug)
        .filter_module(env!("CARGO_CRATE_NAME"), LevelFilter::Trace)
        .parse_default_env()
        .init();

    let mut args = env::args().skip(1);
    let Some(service) = args.next() else {
        eprintln!("usage: mdns-browse <service> [timeout-ms]");
        process::exit(1);
    };
    let service: Service = service.parse()?;
    let timeout = match args.next() {
        Some(ms) => Duration::from_millis(ms.parse()?),
        None => Query::DEFAULT_TIMEOUT,
    };

    let instances = Query::with_timeout(service.clone(), Domain::Local, timeout).run_once()?;

    println!();
    println!("Discovered {} instance(s) of {}", instances.len(), service);
    let mut instances = instances.into_iter().collect::<Vec<_>>();
    instances.sort_by(|a, b| a.name().cmp(b.name()));
    for instance in &instances {
        println!("- {}", instance.name());
        println!("  {}:{}", instance.host(), instance.port());
        for addr in instance.socket_addrs() {
            println!("  {}", addr);
        }
        if !instance.text().is_empty() {
            println!("  {}", instance.text());
        }
    }

    Ok(())
}
