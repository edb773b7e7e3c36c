use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use byline::{
    annotate_transcript, apply_labels, default_annotated_path, default_labeled_path,
    extract_tokens, format_identifications, load_mapping, parse_utterances, read_transcript,
    run_prompt, run_table, write_mapping_skeleton, write_text, IdentificationReport,
    IdentificationSession, KeyMap, SessionError, TerminalKeys, MIN_SUBSTANTIAL_LEN,
};

#[derive(Parser)]
#[command(name = "byline")]
#[command(author, version, about = "Interactive speaker identification for diarized transcripts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactively resolve CHUNK_N_X speaker tokens to names
    Identify {
        /// Input transcript file
        #[arg(short, long)]
        input: PathBuf,

        /// Comma-separated speaker names (prompted for when omitted)
        #[arg(short, long)]
        names: Option<String>,

        /// Meeting context shown with the name prompt
        #[arg(long)]
        context: Option<String>,

        /// Use the full-screen table interface
        #[arg(long)]
        tui: bool,

        /// Output path for the annotated transcript
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Optional JSON report of the session outcome
        #[arg(long)]
        report: Option<PathBuf>,

        /// Minimum utterance length for the guided walk
        #[arg(long, default_value_t = MIN_SUBSTANTIAL_LEN)]
        min_snippet_len: usize,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Replace speaker tokens using a mapping file and merge same-speaker blocks
    Apply {
        /// Input transcript file
        #[arg(short, long)]
        input: PathBuf,

        /// TOML mapping file: Name = ["CHUNK_0_A", ...]
        #[arg(short, long)]
        mapping: PathBuf,

        /// Output path (defaults to <input>.labeled.txt)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// List distinct speaker tokens in a transcript
    Speakers {
        /// Input transcript file
        #[arg(short, long)]
        input: PathBuf,

        /// Write a commented mapping-file skeleton to this path
        #[arg(long)]
        init: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Identify {
            input,
            names,
            context,
            tui,
            output,
            report,
            min_snippet_len,
            verbose,
        } => {
            setup_logging(verbose);
            identify(
                input,
                names,
                context,
                tui,
                output,
                report,
                min_snippet_len,
            )
        }
        Commands::Apply {
            input,
            mapping,
            output,
            verbose,
        } => {
            setup_logging(verbose);
            apply(input, mapping, output)
        }
        Commands::Speakers {
            input,
            init,
            verbose,
        } => {
            setup_logging(verbose);
            speakers(input, init)
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn identify(
    input: PathBuf,
    names: Option<String>,
    context: Option<String>,
    tui: bool,
    output: Option<PathBuf>,
    report: Option<PathBuf>,
    min_snippet_len: usize,
) -> Result<()> {
    let transcript = read_transcript(&input)?;
    let utterances = parse_utterances(&transcript);

    let names = match names {
        Some(names) => split_names(&names),
        None => prompt_for_names(context.as_deref())?,
    };
    if names.is_empty() {
        bail!("At least one speaker name is required");
    }

    let keymap = KeyMap::derive(&names);
    let session = IdentificationSession::new(&utterances, min_snippet_len);

    let result = if tui {
        run_table(session, keymap)
    } else {
        let mut session = session;
        run_prompt(&mut session, &keymap, TerminalKeys, std::io::stdout())
    };

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(SessionError::Aborted) => bail!("Identification aborted - nothing written"),
        Err(err) => return Err(err.into()),
    };

    println!("{}\n", format_identifications(&utterances, &outcome));

    if outcome.assignments.is_empty() && outcome.uncertain_tokens.is_empty() {
        info!("No identifications recorded; skipping annotated output");
        return Ok(());
    }

    let annotated = annotate_transcript(&transcript, &outcome.assignments, &outcome.uncertain_tokens);
    let out_path = output.unwrap_or_else(|| default_annotated_path(&input));
    write_text(&out_path, &annotated)?;

    if let Some(report_path) = report {
        IdentificationReport::build(&utterances, &outcome).write_json(&report_path)?;
    }

    Ok(())
}

fn apply(input: PathBuf, mapping: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let transcript = read_transcript(&input)?;
    let mapping = load_mapping(&mapping)?;

    let labeled = apply_labels(&transcript, &mapping);

    let out_path = output.unwrap_or_else(|| default_labeled_path(&input));
    write_text(&out_path, &labeled)?;
    Ok(())
}

fn speakers(input: PathBuf, init: Option<PathBuf>) -> Result<()> {
    let transcript = read_transcript(&input)?;
    let tokens = extract_tokens(&transcript);

    if tokens.is_empty() {
        println!("No CHUNK_N_X speaker tokens found in transcript - nothing to identify.");
        return Ok(());
    }

    println!("Found {} distinct speaker tokens:", tokens.len());
    for token in &tokens {
        println!("  {token}");
    }

    if let Some(path) = init {
        write_mapping_skeleton(&path, &tokens)?;
    }

    Ok(())
}

fn split_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn prompt_for_names(context: Option<&str>) -> Result<Vec<String>> {
    if let Some(hint) = context {
        println!("\nMeeting context:\n  {hint}\n");
    }
    print!("Speaker names (comma-separated): ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read speaker names from stdin")?;
    Ok(split_names(&line))
}
