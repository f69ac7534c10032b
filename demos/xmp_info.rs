// This application accepts a file path, opens the file read-only and
// prints what the session found: the container format, the handler that
// served it and every property in the embedded packet.
//
// Run with RUST_LOG=debug to see the open/select/close transitions.

use std::env;
use xmpfiles::core::namespace::default_prefix;
use xmpfiles::{ErrorKind, XmpFiles, XmpOptions, XmpResult};

fn print_info(path: &str) -> XmpResult<()> {
    // Prefer a format-specific handler; retry with default selection when the
    // format has none or forbids the flag.
    let mut file = XmpFiles::new();
    file.open(path, XmpOptions::default().use_smart_handler())
        .or_else(|err| match err.kind() {
            ErrorKind::IllegalOptionCombination => {
                eprintln!("{}. Opening with default handler selection.", err);
                file.open(path, XmpOptions::default())
            }
            _ => Err(err),
        })?;

    println!("{:#}", file);
    println!("format:  {}", file.format()?);
    println!("handler: {}", file.handler_choice()?);

    let meta = file.get_metadata()?;
    if meta.is_empty() {
        println!("no XMP packet");
    }
    for (key, value) in meta.properties() {
        let prefix = meta
            .prefix_for(&key.namespace)
            .or_else(|| default_prefix(&key.namespace))
            .unwrap_or(key.namespace.as_str());
        println!("{}:{} = {}", prefix, key.name, value);
    }

    file.close();
    Ok(())
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let path = match args.len() {
        2 => &args[1],
        n => {
            eprintln!("expected 1 argument (file name), got {} arguments", n - 1);
            std::process::exit(1);
        }
    };

    if let Err(err) = print_info(path) {
        eprintln!("{}: {}", path, err);
        std::process::exit(1);
    }
}
