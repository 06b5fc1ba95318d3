use log::LevelFilter;
use std::fs::OpenOptions;

#[derive(Debug, Default)]
struct CliArgs {
    serve: bool,
    app: bool,
    addr: Option<String>,
    catalog: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1).collect())?;
    let addr = args
        .addr
        .clone()
        .unwrap_or_else(|| String::from(stopify::server::DEFAULT_ADDR));
    let tui = !args.serve || args.app;
    init_logging(tui);

    if args.serve {
        let mut provider = stopify::catalog::provider_for(args.catalog.as_deref());
        let songs = provider.fetch()?;
        if !args.app {
            return stopify::server::run_catalog_server_forever(&addr, songs);
        }
        let _server = stopify::server::start_catalog_server(&addr, songs)?;
        return stopify::app::run(stopify::app::AppOptions {
            catalog: args.catalog,
        });
    }

    stopify::app::run(stopify::app::AppOptions {
        catalog: args.catalog,
    })
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--serve" => out.serve = true,
            "--app" => out.app = true,
            "--addr" => {
                index += 1;
                out.addr = Some(required_value(&args, index, "--addr", "host:port")?);
            }
            "--catalog" => {
                index += 1;
                out.catalog = Some(required_value(&args, index, "--catalog", "path or url")?);
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument {other}"),
        }
        index += 1;
    }
    Ok(out)
}

fn required_value(args: &[String], index: usize, flag: &str, what: &str) -> anyhow::Result<String> {
    let Some(value) = args.get(index) else {
        anyhow::bail!("{flag} requires a {what} value");
    };
    if value.trim().is_empty() {
        anyhow::bail!("{flag} cannot be empty");
    }
    Ok(value.trim().to_string())
}

fn print_help() {
    println!("Stopify");
    println!("  --serve                 Serve the catalog at /api/music");
    println!("  --app                   With --serve, also run the player");
    println!("  --addr host:port        Catalog server bind address (default 127.0.0.1:3000)");
    println!("  --catalog <path|url>    Load songs from a JSON file or catalog URL");
}

/// Terminal mode logs to a file so records do not tear the alternate screen.
fn init_logging(to_file: bool) {
    let level = std::env::var("STOPIFY_LOG")
        .ok()
        .and_then(|value| value.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);

    let mut builder = colog::default_builder();
    builder.filter(None, level);
    if to_file {
        let file = stopify::config::ensure_config_dir()
            .and_then(|_| stopify::config::log_path())
            .and_then(|path| {
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .map_err(anyhow::Error::from)
            });
        match file {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
                builder.write_style(env_logger::WriteStyle::Never);
            }
            Err(_) => {
                builder.filter(None, LevelFilter::Off);
            }
        }
    }
    builder.init();

    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
        default_hook(panic_info);
    }));
}
