use clap::{Parser, Subcommand};
use form_intake_lib::commands::{self, AppState, ExportFormat};
use form_intake_lib::config::{Config, DEFAULT_LOG_LEVEL};
use form_intake_lib::db::DEFAULT_SESSION;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "form-intake")]
#[command(about = "OCR forms, classify them, and ask questions about what was read")]
#[command(version)]
struct Cli {
    /// Session to work in
    #[arg(long, global = true, default_value = DEFAULT_SESSION)]
    session: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// OCR an image (jpg, jpeg, png, pdf), classify and analyze it
    Process { file: PathBuf },
    /// Ask a question about the processed documents
    Chat { question: String },
    /// Suggested questions for the current documents
    Suggest,
    /// List processed documents
    List,
    /// Show one document (1-based; latest by default)
    Show { index: Option<usize> },
    /// Document statistics
    Stats,
    /// Plain-text summary report
    Report,
    /// Export the session
    Export {
        #[arg(long, value_enum, default_value = "json")]
        format: ExportFormat,
        /// Output path; defaults to a timestamped file in Downloads
        #[arg(long)]
        out: Option<String>,
    },
    /// Read a JSON export and print its statistics
    Import {
        file: PathBuf,
        /// Also add its documents and chat to the session
        #[arg(long)]
        restore: bool,
    },
    /// Remove all documents and chat from the session
    Clear,
    /// Remove the chat history only
    ClearChat,
    /// List stored sessions
    Sessions,
    /// Show API key configuration
    Status,
    /// Print (or open) the data folder
    DataDir {
        #[arg(long)]
        open: bool,
    },
}

/// Built from the loaded config so a log level set in `.env` takes effect.
fn log_filter(config: &Config) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_LEVEL))
}

fn init_logging(config: &Config) {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(config))
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli, config: Config) -> Result<String, String> {
    let state = || AppState::open(config.clone(), &cli.session);

    match cli.command {
        Commands::Process { file } => commands::process_file(&state()?, &file),
        Commands::Chat { question } => commands::chat(&state()?, &question),
        Commands::Suggest => commands::suggest(&state()?),
        Commands::List => commands::list(&state()?),
        Commands::Show { index } => commands::show(&state()?, index),
        Commands::Stats => commands::stats(&state()?),
        Commands::Report => commands::report(&state()?),
        Commands::Export { format, out } => commands::export(&state()?, format, out.as_deref()),
        Commands::Import { file, restore } => commands::import(&state()?, &file, restore),
        Commands::Clear => commands::clear(&state()?),
        Commands::ClearChat => commands::clear_chat(&state()?),
        Commands::Sessions => commands::sessions(&state()?),
        Commands::Status => Ok(commands::status(&config)),
        Commands::DataDir { open } => {
            if open {
                commands::open_app_data_folder(&config)?;
            }
            commands::get_app_data_path(&config)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let config = Config::from_env();
    init_logging(&config);
    match run(cli, config) {
        Ok(out) => println!("{}", out),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
