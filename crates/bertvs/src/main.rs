//! CLI entry point for the BER fixture replay tool.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use ber_engine::{plan, verdicts, FixtureConfig, SignalMap};
use bertvs::report::{failsafe_lines, layout_lines, progress_line, verdict_line};
use bertvs::{load_config, load_dump, load_signal_map, replay};
use log::LevelFilter;
use serde as _;
use serde_json as _;
#[cfg(test)]
use tempfile as _;
use thiserror as _;

const USAGE_TEXT: &str = "\
Usage: bertvs <command> [options]

Commands:
  plan <capability>                            Print the test-register layout
  failsafe <dump> [--pin-map <file>]           Scan the failsafe status bank
  check <dump> --pin-map <file> [--config <file>] [--verbose]
                                               Replay a dump and judge every signal

Options:
  -p, --pin-map <file>  Pin map naming each tested signal
  -c, --config <file>   Fixture register map (JSON)
  -v, --verbose         Debug logging to stderr
  -h, --help            Show this help message

Examples:
  bertvs plan 0x00010201
  bertvs failsafe capture.json --pin-map fixture_pins.txt
  bertvs check capture.json --pin-map fixture_pins.txt
";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Plan(u32),
    Failsafe(DumpArgs),
    Check(DumpArgs),
}

#[derive(Debug, PartialEq, Eq, Default)]
struct DumpArgs {
    dump: PathBuf,
    pin_map: Option<PathBuf>,
    config: Option<PathBuf>,
    verbose: bool,
}

#[derive(Debug)]
enum ParseResult {
    Command(Command),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command_str = first.to_string_lossy().to_string();

    match command_str.as_str() {
        "plan" => parse_plan_args(args)
            .map(Command::Plan)
            .map(ParseResult::Command),
        "failsafe" => {
            let args = parse_dump_args(args)?;
            if args.config.is_some() {
                return Err("failsafe does not take --config".to_string());
            }
            Ok(ParseResult::Command(Command::Failsafe(args)))
        }
        "check" => {
            let args = parse_dump_args(args)?;
            if args.pin_map.is_none() {
                return Err("check requires --pin-map".to_string());
            }
            Ok(ParseResult::Command(Command::Check(args)))
        }
        other => Err(format!("unknown command: {other}")),
    }
}

fn parse_capability(text: &str) -> Result<u32, String> {
    text.strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .map_or_else(|| text.parse(), |hex| u32::from_str_radix(hex, 16))
        .map_err(|_| format!("invalid capability word: {text}"))
}

fn parse_plan_args(args: impl Iterator<Item = OsString>) -> Result<u32, String> {
    let mut word: Option<u32> = None;

    for arg in args {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        let text = arg.to_string_lossy();
        if text.starts_with('-') {
            return Err(format!("unknown option: {text}"));
        }

        if word.is_some() {
            return Err("multiple capability words provided".to_string());
        }
        word = Some(parse_capability(&text)?);
    }

    word.ok_or_else(|| "missing capability word".to_string())
}

#[allow(clippy::while_let_on_iterator)]
fn parse_dump_args(mut args: impl Iterator<Item = OsString>) -> Result<DumpArgs, String> {
    let mut dump: Option<PathBuf> = None;
    let mut parsed = DumpArgs::default();

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "--verbose" || arg == "-v" {
            parsed.verbose = true;
            continue;
        }

        if arg == "-p" || arg == "--pin-map" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for --pin-map".to_string())?;
            parsed.pin_map = Some(PathBuf::from(value));
            continue;
        }

        if arg == "-c" || arg == "--config" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for --config".to_string())?;
            parsed.config = Some(PathBuf::from(value));
            continue;
        }

        if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }

        if dump.is_some() {
            return Err("multiple dump paths provided".to_string());
        }
        dump = Some(PathBuf::from(arg));
    }

    parsed.dump = dump.ok_or_else(|| "missing dump path".to_string())?;
    Ok(parsed)
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn run_plan(word: u32) {
    for line in layout_lines(&plan(word)) {
        println!("{line}");
    }
}

struct Inputs {
    dump: bertvs::RegisterDump,
    map: Option<SignalMap>,
    config: FixtureConfig,
}

fn load_inputs(args: &DumpArgs) -> Result<Inputs, i32> {
    let report = |e: bertvs::LoadError| {
        eprintln!("error: {e}");
        1
    };

    let dump = load_dump(&args.dump).map_err(report)?;
    let map = args
        .pin_map
        .as_deref()
        .map(load_signal_map)
        .transpose()
        .map_err(report)?;
    let config = match &args.config {
        Some(path) => load_config(path).map_err(report)?,
        None => FixtureConfig::default(),
    };

    Ok(Inputs { dump, map, config })
}

fn run_failsafe(args: &DumpArgs) -> Result<(), i32> {
    let inputs = load_inputs(args)?;
    let report = ber_engine::FailsafeReport::from_status(&inputs.dump.failsafe);

    if report.is_clear() {
        println!("Failsafe bank fully asserted");
        return Ok(());
    }

    for line in failsafe_lines(&report, inputs.map.as_ref()) {
        println!("{line}");
    }
    Err(1)
}

fn run_check(args: &DumpArgs) -> Result<(), i32> {
    let inputs = load_inputs(args)?;
    let Some(map) = inputs.map else {
        eprintln!("error: check requires --pin-map");
        return Err(1);
    };

    let result = match replay(&inputs.dump, &map, inputs.config) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return Err(1);
        }
    };

    for line in failsafe_lines(&result.failsafe, Some(&map)) {
        eprintln!("warning: {line}");
    }

    println!("Firmware version 0x{:08x}", result.version);
    println!();
    for (connector, progress) in &result.aggregation.connectors {
        println!("{}", progress_line(connector, progress));
    }

    let judged = match verdicts(&result.measurements, &map, &result.aggregation) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("error: {e}");
            return Err(1);
        }
    };
    println!();
    for verdict in &judged {
        println!("{}", verdict_line(verdict));
    }

    println!();
    println!(
        "Check {}: {}/{} signals successful",
        if result.aggregation.passed {
            "PASSED"
        } else {
            "FAILED"
        },
        result.aggregation.successful(),
        result.aggregation.total()
    );

    if result.aggregation.passed {
        Ok(())
    } else {
        Err(1)
    }
}

fn main() {
    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(Command::Plan(word))) => {
            init_logging(false);
            run_plan(word);
            0
        }
        Ok(ParseResult::Command(Command::Failsafe(args))) => {
            init_logging(args.verbose);
            match run_failsafe(&args) {
                Ok(()) => 0,
                Err(code) => code,
            }
        }
        Ok(ParseResult::Command(Command::Check(args))) => {
            init_logging(args.verbose);
            match run_check(&args) {
                Ok(()) => 0,
                Err(code) => code,
            }
        }
        Err(error) => {
            if error.starts_with("Usage:") {
                println!("{error}");
            } else {
                eprintln!("error: {error}");
                eprintln!("{USAGE_TEXT}");
            }
            1
        }
    };

    std::process::exit(exit_code);
}
