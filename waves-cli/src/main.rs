use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use waves_cli::{config, convert, InputFormat};

#[derive(Parser)]
#[command(name = "waves")]
#[command(about = "Convert course waveforms between the text format and VCD")]
struct Cli {
    /// TOML configuration file (defaults to ./waves.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a text-format waves file to VCD
    Text2vcd { input: PathBuf, output: PathBuf },
    /// Convert a VCD file to the text format
    Vcd2text { input: PathBuf, output: PathBuf },
    /// Print the signal table, sample count and time span of a file
    Inspect {
        input: PathBuf,

        /// Input format, inferred from the extension when omitted
        #[arg(long, value_enum)]
        format: Option<InputFormat>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn run(cli: Cli) -> Result<()> {
    let config = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Text2vcd { input, output } => convert::text_to_vcd(&input, &output, &config),
        Commands::Vcd2text { input, output } => convert::vcd_to_text(&input, &output, &config),
        Commands::Inspect { input, format, json } => {
            let inspection = convert::inspect(&input, format, &config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&inspection)?);
            } else {
                println!("{}", inspection.render());
            }
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
