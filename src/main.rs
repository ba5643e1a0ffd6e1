//! Autotap command line
//!
//! Compiles a MIDI file into a chord schedule and prints it, optionally
//! playing it through the logging actuator.
//!
//! Usage:
//!   autotap <song.mid> [OPTIONS]
//!
//! Options:
//!   --config <path>     Config file (default: user config dir)
//!   --keymap <path>     Key map file, overrides the config
//!   --from-ms <N>       Skip notes starting before N ms
//!   --to-ms <N>         Skip notes starting after N ms
//!   --json              Print the schedule as JSON
//!   --play              Dry-run playback, logging every gesture
//!   --verbose           Extra debug output

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use autotap_lib::config::{self, Config};
use autotap_lib::playback::{LogActuator, PlaybackOutcome, Player};
use autotap_lib::song::{self, CompiledSong};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let verbose = args.iter().any(|a| a == "--verbose");
    let log_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level)
    ).init();

    if let Err(e) = run(&args) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> anyhow::Result<()> {
    let song_path = match positional(args) {
        Some(path) => PathBuf::from(path),
        None => bail!("usage: autotap <song.mid> [--config <path>] [--keymap <path>] [--json] [--play] [--from-ms N] [--to-ms N] [--verbose]"),
    };

    let config_path = option_value(args, "--config")
        .map(PathBuf::from)
        .unwrap_or_else(config::default_config_path);
    let mut config = Config::load_or_default(&config_path);
    log::debug!("Using config from {}", config_path.display());

    if let Some(path) = option_value(args, "--keymap") {
        config.keymap_path = Some(PathBuf::from(path));
    }
    if let Some(value) = option_value(args, "--from-ms") {
        config.transform.from_ms = Some(value.parse().context("--from-ms expects milliseconds")?);
    }
    if let Some(value) = option_value(args, "--to-ms") {
        config.transform.to_ms = Some(value.parse().context("--to-ms expects milliseconds")?);
    }

    let keymap = config.load_keymap()?;
    let locator = keymap.locator(config.screen)?;
    if locator.is_empty() {
        bail!("key map '{}' has no keys", keymap.name);
    }

    let compiled = song::load_song(&song_path, &config.song_options(), &locator)?;
    if let Some(ref reason) = compiled.parse_failure {
        log::warn!("{} could not be parsed: {}", song_path.display(), reason);
    }

    if args.iter().any(|a| a == "--json") {
        println!("{}", serde_json::to_string_pretty(&compiled.schedule)?);
    } else {
        print_summary(&song_path, &compiled, locator.len());
    }

    if args.iter().any(|a| a == "--play") {
        let actuator = Arc::new(LogActuator::new());
        let player = Player::new(actuator, Arc::new(locator));
        let report = player.start(compiled.schedule)?.wait()?;
        if report.outcome != PlaybackOutcome::Completed {
            bail!("playback ended early: {:?}", report.outcome);
        }
        println!(
            "Played {} chords ({} skipped, {} failed)",
            report.chords_dispatched, report.chords_skipped, report.chords_failed
        );
    }

    Ok(())
}

fn print_summary(path: &std::path::Path, compiled: &CompiledSong, keys: usize) {
    let schedule = &compiled.schedule;
    println!("\n=== {} ===\n", path.display());
    println!("  Keys:         {}", keys);
    println!("  PPQ:          {}", compiled.ppq);
    println!("  File length:  {}ms", compiled.file_length_ms);
    println!("  Chord gap:    {}ms", compiled.preferred_gap_ms);
    println!("  Notes:        {}", schedule.note_count());
    println!("  Chords:       {}", schedule.len());
    println!("  Duration:     {}ms\n", schedule.total_duration_ms());

    for (i, chord) in schedule.iter().enumerate() {
        println!(
            "  [{:>4}] {:>8}ms  +{:<6} {:?}",
            i + 1,
            chord.start_ms,
            chord.duration_ms,
            chord.pitches()
        );
    }
}

const VALUE_OPTIONS: [&str; 4] = ["--config", "--keymap", "--from-ms", "--to-ms"];

fn option_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// First argument that is neither a flag nor a flag's value
fn positional(args: &[String]) -> Option<&str> {
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        if VALUE_OPTIONS.contains(&arg.as_str()) {
            iter.next();
        } else if !arg.starts_with("--") {
            return Some(arg);
        }
    }
    None
}
