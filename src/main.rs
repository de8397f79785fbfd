use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use mathdrill::voice::{
    ConsoleVoice, ListeningSession, RecognitionEvent, SpeechInput, SpeechToText, TextToSpeech,
};
use mathdrill::{
    Config, Difficulty, Factor, Language, Operation, SessionController, SessionHandle, Summary,
    config::parse_operation, lang, tasks,
};

/// Voice-interactive mental arithmetic trainer
#[derive(Parser)]
#[command(name = "mathdrill", version, about)]
struct Cli {
    /// Path to a config file (defaults to standard locations)
    #[arg(long, env = "MATHDRILL_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

/// Drill settings; unset flags fall back to the config file, then to
/// difficulty defaults
#[derive(Args, Clone)]
struct DrillArgs {
    /// Comma-separated operations: add, sub, mul, div
    #[arg(short, long, value_delimiter = ',')]
    operations: Vec<String>,

    /// Difficulty level
    #[arg(short, long, value_enum)]
    difficulty: Option<Difficulty>,

    /// Number of questions (5-50)
    #[arg(short, long)]
    tasks: Option<usize>,

    /// Seconds per question (5-60)
    #[arg(long)]
    time_limit: Option<u64>,

    /// Drill language: ru or en
    #[arg(short, long)]
    language: Option<Language>,

    /// Times table factor (2-9), or 0 for random factors
    #[arg(short, long)]
    multiplier: Option<u8>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a drill session in the terminal
    ///
    /// Questions are printed (and spoken, with a voice backend); type the
    /// answer, or "repeat", "skip", "quit".
    Run {
        #[command(flatten)]
        drill: DrillArgs,

        /// Print the final summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print sample questions for a configuration
    Sample {
        #[command(flatten)]
        drill: DrillArgs,

        /// Number of samples
        #[arg(short, long, default_value = "5")]
        count: usize,
    },
    /// Synthesize question audio to a file
    TestTts {
        /// Text to synthesize
        #[arg(default_value = "7 times 8")]
        text: String,

        /// Output file (MP3)
        #[arg(short, long, default_value = "question.mp3")]
        out: PathBuf,

        /// Synthesis provider: openai or elevenlabs
        #[arg(short, long, default_value = "openai")]
        provider: String,
    },
    /// Transcribe an audio file and extract the spoken number
    TestStt {
        /// WAV file to transcribe
        file: PathBuf,

        /// Recognition language: ru or en
        #[arg(short, long, default_value = "ru")]
        language: Language,

        /// Transcription provider: whisper or deepgram
        #[arg(short, long, default_value = "whisper")]
        provider: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,mathdrill=warn",
        1 => "info,mathdrill=info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command.unwrap_or(Command::Run {
        drill: DrillArgs {
            operations: Vec::new(),
            difficulty: None,
            tasks: None,
            time_limit: None,
            language: None,
            multiplier: None,
        },
        json: false,
    }) {
        Command::Run { drill, json } => run_drill(config, &drill, json).await,
        Command::Sample { drill, count } => sample(config, &drill, count),
        Command::TestTts { text, out, provider } => test_tts(&config, &text, &out, &provider).await,
        Command::TestStt { file, language, provider } => {
            test_stt(&config, &file, language, &provider).await
        }
    }
}

/// Overlay CLI flags onto the loaded configuration
fn apply_drill_args(config: &mut Config, args: &DrillArgs) -> anyhow::Result<()> {
    let factor = match args.multiplier {
        Some(0) => Some(Factor::Random),
        Some(n) => Some(Factor::Fixed(n)),
        None => None,
    };

    if let Some(factor) = factor {
        for op in &mut config.drill.operations {
            if let Operation::Multiplication(f) = op {
                *f = factor;
            }
        }
    }

    if !args.operations.is_empty() {
        let factor = factor.unwrap_or(Factor::Random);
        config.drill.operations = args
            .operations
            .iter()
            .map(|name| parse_operation(name, factor))
            .collect::<mathdrill::Result<_>>()?;
    }

    if let Some(difficulty) = args.difficulty {
        config.drill.difficulty = difficulty;
        config.drill.tasks_count = difficulty.default_task_count();
        config.drill.time_limit = difficulty.default_time_limit();
    }
    if let Some(tasks) = args.tasks {
        config.drill.tasks_count = tasks;
    }
    if let Some(secs) = args.time_limit {
        config.drill.time_limit = Duration::from_secs(secs);
    }
    if let Some(language) = args.language {
        config.drill.language = language;
    }

    config.drill.validate()?;
    Ok(())
}

/// Run a full drill session over the terminal backend
async fn run_drill(mut config: Config, args: &DrillArgs, json: bool) -> anyhow::Result<()> {
    apply_drill_args(&mut config, args)?;

    let console = Arc::new(ConsoleVoice::new());
    let input = Arc::new(CommandFilter::new(Arc::clone(&console)));
    let filter_handle = Arc::clone(&input.handle);

    let mut controller = SessionController::new(console, input);
    controller.start(config.drill.clone())?;
    let _ = filter_handle.set(controller.handle());

    // Ctrl-C ends the session and prints whatever was accumulated
    let interrupt = controller.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.end();
        }
    });

    // Feedback printer: relay status changes to the terminal
    let mut snapshots = controller.subscribe();
    tokio::spawn(async move {
        let mut last = String::new();
        while snapshots.changed().await.is_ok() {
            let (status, score) = {
                let snap = snapshots.borrow();
                (snap.status.clone(), format!("{}/{}", snap.correct, snap.answered))
            };
            if !status.is_empty() && status != last {
                println!("  {status}  [{score}]");
                last = status;
            }
        }
    });

    println!(
        "Starting: {} questions, {:?}, answer within {:?}. Type the answer, or repeat/skip/quit.",
        config.drill.tasks_count, config.drill.difficulty, config.drill.time_limit
    );

    let summary = controller.run().await?;
    print_summary(&summary, json)?;
    Ok(())
}

fn print_summary(summary: &Summary, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("\n{}", summary.message);
    if let Some(average) = summary.average_response {
        println!("Average response: {average:.1?}");
    }
    for result in &summary.results {
        let answer = result
            .answer
            .map_or_else(|| "-".to_string(), |a| a.to_string());
        println!(
            "  {:<16} heard: {:<20} answer: {:<6} {:?}",
            result.task.display_text(),
            result.heard,
            answer,
            result.outcome
        );
    }
    Ok(())
}

/// Print sample questions without starting a session
fn sample(mut config: Config, args: &DrillArgs, count: usize) -> anyhow::Result<()> {
    apply_drill_args(&mut config, args)?;

    let samples = tasks::generate_session(
        &config.drill.operations,
        config.drill.difficulty,
        count,
        &mut rand::thread_rng(),
    )?;

    for task in samples {
        println!(
            "{:<16} spoken: \"{}\"",
            task.display_text(),
            task.spoken_text(config.drill.language)
        );
    }
    Ok(())
}

/// Synthesize text to an audio file
async fn test_tts(config: &Config, text: &str, out: &Path, provider: &str) -> anyhow::Result<()> {
    let tts = match provider {
        "openai" => TextToSpeech::new_openai(
            config.api_keys.openai.clone().unwrap_or_default(),
            config.voice.tts_voice.clone(),
            config.voice.tts_speed,
            config.voice.tts_model.clone(),
        )?,
        "elevenlabs" => TextToSpeech::new_elevenlabs(
            config.api_keys.elevenlabs.clone().unwrap_or_default(),
            config.voice.tts_voice.clone(),
            config.voice.tts_model.clone(),
        )?,
        other => anyhow::bail!("unknown TTS provider: {other}"),
    };

    println!("Synthesizing: \"{text}\"");
    let audio = tts.synthesize(text).await?;
    tokio::fs::write(out, &audio).await?;
    println!("Wrote {} bytes to {}", audio.len(), out.display());
    Ok(())
}

/// Transcribe an audio file and run number extraction on the transcript
async fn test_stt(
    config: &Config,
    file: &Path,
    language: Language,
    provider: &str,
) -> anyhow::Result<()> {
    let stt = match provider {
        "whisper" => SpeechToText::new_whisper(
            config.api_keys.openai.clone().unwrap_or_default(),
            config.voice.stt_model.clone(),
        )?,
        "deepgram" => SpeechToText::new_deepgram(
            config.api_keys.deepgram.clone().unwrap_or_default(),
            config.voice.stt_model.clone(),
        )?,
        other => anyhow::bail!("unknown STT provider: {other}"),
    };

    let audio = tokio::fs::read(file).await?;
    let transcript = stt.transcribe(&audio, language).await?;
    println!("Transcript: \"{transcript}\"");

    match lang::extract_number(&transcript, language) {
        Some(number) => println!("Extracted number: {number}"),
        None => println!("No number recognized"),
    }
    Ok(())
}

/// Presentation-layer input adapter: intercepts the command words
/// "repeat", "skip" and "quit" before transcripts reach the controller.
struct CommandFilter {
    inner: Arc<ConsoleVoice>,
    handle: Arc<OnceLock<SessionHandle>>,
}

impl CommandFilter {
    fn new(inner: Arc<ConsoleVoice>) -> Self {
        Self { inner, handle: Arc::new(OnceLock::new()) }
    }
}

impl SpeechInput for CommandFilter {
    fn start_listening(&self, language: Language) -> mathdrill::Result<ListeningSession> {
        let (mut transcripts, cancel) = self.inner.start_listening(language)?.into_parts();
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Arc::clone(&self.handle);

        tokio::spawn(async move {
            while let Some(event) = transcripts.recv().await {
                if let (RecognitionEvent::Final(text), Some(session)) = (&event, handle.get()) {
                    let intercepted = match text.trim().to_lowercase().as_str() {
                        "repeat" | "r" => {
                            session.repeat();
                            true
                        }
                        "skip" | "s" => {
                            session.skip();
                            true
                        }
                        "quit" | "q" | "end" => {
                            session.end();
                            true
                        }
                        _ => false,
                    };
                    if intercepted {
                        continue;
                    }
                }
                if tx.send(event).is_err() {
                    break;
                }
            }
        });

        Ok(ListeningSession::new(rx, cancel))
    }
}
