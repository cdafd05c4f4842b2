#![forbid(unsafe_code)]

use std::path::PathBuf;

use tq_service::{
    LiteralOperationSource, MemoryOperationCache, QueryService, ServiceConfig, Upload,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut csv_paths = Vec::<PathBuf>::new();
    let mut operation: Option<String> = None;
    let mut export_dir: Option<PathBuf> = None;
    let mut pretty = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--csv" => {
                let value = args.next().ok_or("--csv requires a file path")?;
                csv_paths.push(PathBuf::from(value));
            }
            "--op" => {
                let value = args
                    .next()
                    .ok_or("--op requires a JSON operation (e.g. '{\"type\":\"distinct\",\"field\":\"city\"}')")?;
                operation = Some(value);
            }
            "--op-file" => {
                let value = args.next().ok_or("--op-file requires a file path")?;
                operation = Some(std::fs::read_to_string(value)?);
            }
            "--export-dir" => {
                let value = args.next().ok_or("--export-dir requires a directory")?;
                export_dir = Some(PathBuf::from(value));
            }
            "--pretty" => {
                pretty = true;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => {
                return Err(format!("unknown argument: {other}").into());
            }
        }
    }

    let operation = operation.ok_or("one of --op or --op-file is required")?;
    if csv_paths.is_empty() {
        return Err("at least one --csv file is required".into());
    }

    let mut uploads = Vec::with_capacity(csv_paths.len());
    for path in &csv_paths {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| format!("not a file path: {}", path.display()))?;
        uploads.push(Upload::new(filename, std::fs::read(path)?));
    }

    let mut config = ServiceConfig::default_paths();
    if let Some(dir) = export_dir {
        config = config.with_output_dir(dir);
    }

    let mut service = QueryService::new(config, LiteralOperationSource)
        .with_cache(MemoryOperationCache::new());
    let response = service.handle_query(operation.trim(), &uploads)?;

    let rendered = if pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{rendered}");

    Ok(())
}

fn print_help() {
    println!(
        "tq-cli\n\
         Usage:\n\
         \ttq-cli --csv <file> [--csv <file> ...] (--op <json> | --op-file <file>) [--export-dir <dir>] [--pretty]\n\
         Options:\n\
         \t--csv <file>         Upload a CSV file; the first one is queried\n\
         \t--op <json>          Operation description, e.g. {{\"type\":\"topK\",\"field\":\"amt\",\"value\":3}}\n\
         \t--op-file <file>     Read the operation description from a file\n\
         \t--export-dir <dir>   Where result CSVs are written (default ./output)\n\
         \t--pretty             Pretty-print the JSON response\n\
         \t-h, --help           Show this help\n\
         Logging is controlled with RUST_LOG (e.g. RUST_LOG=tq_service=info)."
    );
}
