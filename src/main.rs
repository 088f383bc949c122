use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};

use peakprint::{
    AnalysisParams, DuplicateHashPolicy, Fingerprinter, MatchOptions, Matcher, Result, db,
    library, load_stereo_wav, visualize,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fingerprint every .wav file in a folder and write the index
    Build {
        /// Folder of stereo reference recordings
        #[arg(short, long)]
        input: PathBuf,

        /// Index file to write
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Identify a clip against an index
    Identify {
        /// Index file written by `build`
        #[arg(short, long)]
        database: PathBuf,

        /// Stereo clip to identify
        #[arg(short, long)]
        input: PathBuf,

        /// Let every occurrence of a repeated query hash vote
        #[arg(long)]
        retain_duplicates: bool,

        /// Give up matching after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Render one channel's spectrogram and peaks to a PNG
    Inspect {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(long, value_enum, default_value_t = Channel::Left)]
        channel: Channel,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Channel {
    Left,
    Right,
}

fn main() -> ExitCode {
    let args = Args::parse();
    peakprint::logging::init_logging(args.verbose);

    let outcome = match args.command {
        Command::Build { input, output } => build(input, output),
        Command::Identify {
            database,
            input,
            retain_duplicates,
            timeout_ms,
        } => identify(database, input, retain_duplicates, timeout_ms),
        Command::Inspect {
            input,
            output,
            channel,
        } => inspect(input, output, channel),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn build(input: PathBuf, output: PathBuf) -> Result<()> {
    let start = Instant::now();
    info!(input = %input.display(), output = %output.display(), "building database");

    let index = library::build_index(&input, AnalysisParams::default())?;
    db::save_index(&output, &index)?;

    println!(
        "database with {} tracks and {} fingerprints written to {}",
        index.tracks().len(),
        index.entry_count(),
        output.display()
    );
    println!(
        "database creation completed in {:.2} seconds.",
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn identify(
    database: PathBuf,
    input: PathBuf,
    retain_duplicates: bool,
    timeout_ms: Option<u64>,
) -> Result<()> {
    let start = Instant::now();
    let params = AnalysisParams::default();

    let index = db::load_index(&database, &params)?;
    info!(
        tracks = index.tracks().len(),
        hashes = index.hash_count(),
        "database loaded"
    );

    let audio = load_stereo_wav(&input)?;

    let options = MatchOptions {
        duplicates: if retain_duplicates {
            DuplicateHashPolicy::RetainAll
        } else {
            DuplicateHashPolicy::LastWins
        },
        deadline: timeout_ms.map(|ms| start + Duration::from_millis(ms)),
    };
    let matcher = Matcher::new(&index, Fingerprinter::new(params)?, options)?;
    let result = matcher.identify(&audio)?;

    println!("possible hash matches: {}", result.candidates);
    match (&result.best_track, result.offset) {
        (Some(track), Some(offset)) => {
            println!("best match: {} with {} matches", track, result.votes);
            println!("aligned at {:.2} seconds into the track", offset);
        }
        _ => println!("no match"),
    }
    println!(
        "recognition time: {:.2} seconds",
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn inspect(input: PathBuf, output: PathBuf, channel: Channel) -> Result<()> {
    let audio = load_stereo_wav(&input)?;
    let fingerprinter = Fingerprinter::new(AnalysisParams::default())?;

    let samples = match channel {
        Channel::Left => &audio.left,
        Channel::Right => &audio.right,
    };
    let spectrogram = fingerprinter.spectrogram(samples);
    let peaks = peakprint::peaks::extract_peaks(
        &spectrogram,
        fingerprinter.params().peak_block_size,
    );

    visualize::render_spectrogram(&spectrogram, &peaks, &output)?;
    println!(
        "{} frames, {} peaks, written to {}",
        spectrogram.times.len(),
        peaks.len(),
        output.display()
    );
    Ok(())
}
