use std::fmt::Display;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use partexport_core::config::{self, Settings, MAX_WORKERS};
use partexport_core::dispatch::ExecutionMode;
use partexport_core::export::{dry_run, run_export};
use partexport_core::paths;
use partexport_core::render::ShellRenderer;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const USAGE: &str = "\
usage: partexport [options] <score.mscz>

options:
  --config <path>       use this config file instead of ~/.config/partexport/config.toml
  --renderer <command>  renderer command line prefix
  --export-dir <dir>    where rendered files go
  --work-dir <dir>      where temporary copies go
  --workers <n>         run up to n renders at once
  --serial              run renders one after another, in order
  --dry-run             print the planned tasks as JSON and exit
  -v, --verbose         debug logging
  -h, --help            show this help";

#[derive(Debug, Default, PartialEq)]
struct Args {
    input: Option<PathBuf>,
    config: Option<PathBuf>,
    renderer: Option<String>,
    export_dir: Option<PathBuf>,
    work_dir: Option<PathBuf>,
    workers: Option<usize>,
    serial: bool,
    dry_run: bool,
    verbose: bool,
    help: bool,
}

impl Args {
    /// Command-line values win over the config file.
    fn apply(&self, settings: &mut Settings) {
        if let Some(renderer) = &self.renderer {
            settings.renderer = renderer.clone();
        }
        if let Some(dir) = &self.export_dir {
            settings.export_dir = dir.clone();
        }
        if let Some(dir) = &self.work_dir {
            settings.work_dir = dir.clone();
        }
        if let Some(workers) = self.workers {
            settings.mode = ExecutionMode::Pooled {
                max_workers: workers.clamp(1, MAX_WORKERS),
            };
        }
        if self.serial {
            settings.mode = ExecutionMode::Serial;
        }
    }
}

fn parse_args(argv: &[String]) -> Result<Args, String> {
    let mut args = Args::default();
    let mut iter = argv.iter();

    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{} needs a value", flag))
        };
        match arg.as_str() {
            "--config" => args.config = Some(PathBuf::from(value(arg)?)),
            "--renderer" => args.renderer = Some(value(arg)?),
            "--export-dir" => args.export_dir = Some(PathBuf::from(value(arg)?)),
            "--work-dir" => args.work_dir = Some(PathBuf::from(value(arg)?)),
            "--workers" => {
                let raw = value(arg)?;
                let n = raw
                    .parse::<usize>()
                    .map_err(|_| format!("--workers expects a number, got {:?}", raw))?;
                args.workers = Some(n);
            }
            "--serial" => args.serial = true,
            "--dry-run" => args.dry_run = true,
            "--verbose" | "-v" => args.verbose = true,
            "--help" | "-h" => args.help = true,
            other if other.starts_with('-') => return Err(format!("unknown option {}", other)),
            other => {
                if args.input.is_some() {
                    return Err(format!("unexpected argument {}", other));
                }
                args.input = Some(PathBuf::from(other));
            }
        }
    }

    Ok(args)
}

fn init_logging(verbose: bool) {
    use simplelog::*;

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    let log_path = paths::log_file_path();
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match File::create(&log_path) {
        Ok(file) => loggers.push(WriteLogger::new(LevelFilter::Debug, Config::default(), file)),
        Err(e) => eprintln!("cannot create log file {}: {}", log_path.display(), e),
    }

    if CombinedLogger::init(loggers).is_err() {
        eprintln!("logger already initialized");
    }

    log::debug!("partexport {} starting (log level: {:?})", VERSION, log_level);
}

fn halt(msg: impl Display) -> ! {
    log::error!("halted: {}", msg);
    eprintln!("halted: {}", msg);
    std::process::exit(1);
}

fn main() {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&argv) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };
    if args.help {
        println!("partexport {}\n\n{}", VERSION, USAGE);
        return;
    }

    init_logging(args.verbose);

    let config = config::Config::load(args.config.as_deref());
    let mut settings = config.settings();
    args.apply(&mut settings);

    let Some(input) = args.input.as_deref() else {
        halt("missing name of score file");
    };

    if args.dry_run {
        let tasks = dry_run(input, &settings).unwrap_or_else(|e| halt(e));
        for task in &tasks {
            match serde_json::to_string(task) {
                Ok(line) => println!("{}", line),
                Err(e) => halt(e),
            }
        }
        return;
    }

    let report = run_export(input, &settings, Arc::new(ShellRenderer)).unwrap_or_else(|e| halt(e));
    println!(
        "[ready] {} exports, total time: {}s",
        report.completions.len(),
        report.total.as_secs()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_flags_and_input() {
        let args = parse_args(&argv(&["--workers", "6", "-v", "Hymn.mscz", "--dry-run"])).unwrap();
        assert_eq!(args.input, Some(PathBuf::from("Hymn.mscz")));
        assert_eq!(args.workers, Some(6));
        assert!(args.verbose);
        assert!(args.dry_run);
        assert!(!args.serial);
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse_args(&argv(&["--workers"])).is_err());
        assert!(parse_args(&argv(&["--workers", "lots"])).is_err());
        assert!(parse_args(&argv(&["--frobnicate"])).is_err());
        assert!(parse_args(&argv(&["a.mscz", "b.mscz"])).is_err());
    }

    #[test]
    fn command_line_overrides_settings() {
        let mut settings = config::Config::embedded().settings();
        let args = parse_args(&argv(&[
            "--renderer",
            "/usr/bin/mscore4",
            "--export-dir",
            "/srv/out",
            "--workers",
            "500",
        ]))
        .unwrap();
        args.apply(&mut settings);
        assert_eq!(settings.renderer, "/usr/bin/mscore4");
        assert_eq!(settings.export_dir, PathBuf::from("/srv/out"));
        assert_eq!(settings.mode, ExecutionMode::Pooled { max_workers: MAX_WORKERS });

        let serial = parse_args(&argv(&["--workers", "3", "--serial"])).unwrap();
        serial.apply(&mut settings);
        assert_eq!(settings.mode, ExecutionMode::Serial);
    }
}
