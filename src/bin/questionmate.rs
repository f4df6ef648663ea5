use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use questionmate::auth::{AuthContext, FileTokenStorage};
use questionmate::clients::HttpBackend;
use questionmate::config::ClientConfig;
use questionmate::core::{Credentials, QuizBackend, Upload, SUPPORTED_EXTENSIONS};
use questionmate::error::{BackendError, QuizError};
use questionmate::export::PdfExporter;
use questionmate::quiz::{
    Advance, FetchApplied, FetchOutcome, FetchRequest, FinishReason, Navigator, QuizRunner,
    QuizState,
};
use questionmate::report;
use questionmate::terminal::{self, Key, KeyReader};
use tracing_subscriber::EnvFilter;

/// `println!` that stays readable while the key reader holds raw mode.
macro_rules! say {
    () => {
        terminal::write_lines(" ")?
    };
    ($($arg:tt)*) => {
        terminal::write_lines(&format!($($arg)*))?
    };
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "QuestionMate: quizzes generated from your study material",
    long_about = None
)]
#[command(after_help = "ENVIRONMENT VARIABLES:
    QUESTIONMATE_API_URL        Backend base URL [default: http://127.0.0.1:8000]
    QUESTIONMATE_TIMEOUT_SECS   Per-request timeout in seconds [default: 120]
    QUESTIONMATE_FETCH_RETRIES  Retries when fetching more questions fails [default: 1]
    QUESTIONMATE_TOKEN_PATH     Where the login token is stored
    RUST_LOG                    Log filter, e.g. questionmate=debug

EXAMPLES:
    questionmate signup --username ana
    questionmate login --username ana
    questionmate quiz notes.pdf --out ./exports")]
struct Args {
    /// Backend base URL (overrides QUESTIONMATE_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Request timeout in seconds (overrides QUESTIONMATE_TIMEOUT_SECS)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account
    Signup {
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Log in and remember the session token
    Login {
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Forget the stored session token
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Generate a quiz from a document and take it
    Quiz {
        /// Study document (pdf, docx, png, jpg, jpeg)
        file: PathBuf,
        /// Directory the exported quiz.pdf is written to
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let args = Args::parse();

    let mut config = ClientConfig::from_env();
    if let Some(url) = args.api_url {
        config = config.with_base_url(url);
    }
    if let Some(secs) = args.timeout {
        config = config.with_timeout(Duration::from_secs(secs.max(1)));
    }

    let token_path = config.resolve_token_path()?;
    let mut auth = AuthContext::initialize(Box::new(FileTokenStorage::new(token_path)));

    match args.command {
        Command::Signup { username } => signup(&config, username).await,
        Command::Login { username } => login(&config, &mut auth, username).await,
        Command::Logout => {
            auth.clear();
            println!("Logged out.");
            Ok(())
        }
        Command::Whoami => {
            match auth.username() {
                Some(name) => println!("Welcome, {}!", name),
                None => {
                    println!("Not logged in. Run `questionmate login` or `questionmate signup`.")
                }
            }
            Ok(())
        }
        Command::Quiz { file, out } => {
            if !auth.is_logged_in() {
                bail!(QuizError::NotLoggedIn);
            }
            let config = config.with_output_dir(out);
            let backend = HttpBackend::new(config.clone())?
                .with_bearer(auth.token().map(str::to_string));
            run_quiz(Box::new(backend), &config, file).await
        }
    }
}

fn read_credentials(username: Option<String>) -> anyhow::Result<Credentials> {
    let username = match username {
        Some(name) => name,
        None => terminal::prompt_line("Username: ")?,
    };
    let password = terminal::prompt_password("Password: ")?;
    if username.is_empty() || password.is_empty() {
        bail!("Username and password are required.");
    }
    Ok(Credentials::new(username, password))
}

async fn signup(config: &ClientConfig, username: Option<String>) -> anyhow::Result<()> {
    let credentials = read_credentials(username)?;
    let backend = HttpBackend::new(config.clone())?;
    match backend.signup(&credentials).await {
        Ok(()) => {
            println!(
                "Account created. Log in with `questionmate login --username {}`.",
                credentials.username
            );
            Ok(())
        }
        Err(e) => bail!(e.user_message()),
    }
}

async fn login(
    config: &ClientConfig,
    auth: &mut AuthContext,
    username: Option<String>,
) -> anyhow::Result<()> {
    let credentials = read_credentials(username)?;
    let backend = HttpBackend::new(config.clone())?;
    let token = match backend.login(&credentials).await {
        Ok(token) => token,
        Err(BackendError::Api { detail, .. }) => bail!(detail),
        Err(e) => bail!(e.user_message()),
    };
    if !auth.set(&token) {
        bail!("Login failed: the server issued a token without a username.");
    }
    println!("Welcome, {}!", auth.username().unwrap_or(credentials.username.as_str()));
    Ok(())
}

enum AfterResults {
    Restart,
    Quit,
}

async fn run_quiz(
    backend: Box<dyn QuizBackend>,
    config: &ClientConfig,
    first_file: PathBuf,
) -> anyhow::Result<()> {
    let mut runner = QuizRunner::new(backend.clone(), config.fetch_retries);
    let exporter = PdfExporter::new(backend, config.output_dir.clone());
    let mut file = Some(first_file);

    while let Some(path) = file.take() {
        println!("Generating quiz from {} ...", path.display());
        let started = match Upload::from_path(&path).await {
            Ok(upload) => runner.start(upload).await,
            Err(e) => Err(e),
        };
        if let Err(e) = started {
            eprintln!("{}", e);
            file = ask_for_file()?;
            continue;
        }

        // The reader owns the terminal until the results screen is left.
        let after = {
            let mut keys = KeyReader::spawn().context("could not read the keyboard")?;
            take_quiz(&mut runner, &mut keys).await?;
            show_results(&runner, &exporter, &mut keys).await?
        };

        match after {
            AfterResults::Restart => {
                runner.navigator_mut().restart();
                file = ask_for_file()?;
            }
            AfterResults::Quit => break,
        }
    }
    Ok(())
}

fn ask_for_file() -> anyhow::Result<Option<PathBuf>> {
    let answer = terminal::prompt_line(&format!(
        "Another document ({}), or leave empty to quit: ",
        SUPPORTED_EXTENSIONS.join(", ")
    ))?;
    Ok((!answer.is_empty()).then(|| PathBuf::from(answer)))
}

fn draw_question(navigator: &Navigator) -> anyhow::Result<()> {
    let (Some(session), QuizState::Answering { cursor, .. }) =
        (navigator.session(), navigator.state())
    else {
        return Ok(());
    };
    let Some(question) = navigator.current_question() else {
        return Ok(());
    };

    say!();
    say!("Question {} of {}", cursor + 1, session.len());
    if question.prompt.trim().is_empty() {
        say!("Question text is missing.");
    } else {
        say!("{}", question.prompt);
    }
    say!();
    if question.is_broken() {
        say!("  Options for this question are missing or invalid.");
    } else {
        for (label, text) in question.options.iter() {
            let marker = if navigator.highlighted() == Some(label) { ">" } else { " " };
            say!("{} {}: {}", marker, label, text);
        }
    }
    say!();
    let advance = if navigator.can_advance() { "[Enter]" } else { "[Enter, select first]" };
    say!("{} {}   [Esc] Finish Quiz", advance, navigator.advance_label());
    Ok(())
}

async fn take_quiz(runner: &mut QuizRunner, keys: &mut KeyReader) -> anyhow::Result<()> {
    let mut redraw = true;
    while !runner.navigator().is_finished() {
        if redraw {
            draw_question(runner.navigator())?;
        }
        redraw = true;

        match keys.next().await? {
            Key::Escape | Key::Interrupt => runner.navigator_mut().finish(),
            Key::Enter => match runner.navigator_mut().advance() {
                Advance::Fetch(request) => fetch_with_interrupt(runner, keys, request).await?,
                Advance::Moved { .. } => {}
                Advance::Blocked => {
                    say!("Select an option first.");
                    redraw = false;
                }
            },
            Key::Char(c) => {
                let label = c.to_ascii_uppercase().to_string();
                if !runner.navigator_mut().select(&label) {
                    redraw = false;
                }
            }
        }
    }
    Ok(())
}

/// Await a fetch while still letting the user finish the quiz.
async fn fetch_with_interrupt(
    runner: &mut QuizRunner,
    keys: &mut KeyReader,
    mut request: FetchRequest,
) -> anyhow::Result<()> {
    say!("{} (Esc to finish now)", runner.navigator().advance_label());
    loop {
        let fetcher = runner.fetcher().clone();
        let pending = request.clone();
        let mut task =
            tokio::spawn(async move { fetcher.fetch(&pending.session_id, &pending.asked).await });

        // Other keys pressed while loading are read and dropped here.
        let outcome = loop {
            tokio::select! {
                joined = &mut task => {
                    break joined.unwrap_or_else(|e| {
                        FetchOutcome::TransientError(BackendError::Http(e.to_string()))
                    });
                }
                key = keys.next() => {
                    if matches!(key?, Key::Escape | Key::Interrupt) {
                        // The request completes on its own; its ticket is stale now.
                        runner.navigator_mut().finish();
                        return Ok(());
                    }
                }
            }
        };

        match runner.navigator_mut().apply_fetch(&request.ticket, outcome) {
            FetchApplied::Retry(next) => {
                say!("Could not load more questions, retrying...");
                request = next;
            }
            _ => return Ok(()),
        }
    }
}

async fn show_results(
    runner: &QuizRunner,
    exporter: &PdfExporter,
    keys: &mut KeyReader,
) -> anyhow::Result<AfterResults> {
    let navigator = runner.navigator();
    let questions = navigator.session().map(|s| s.questions().to_vec()).unwrap_or_default();
    let Some(score) = navigator.report() else {
        return Ok(AfterResults::Quit);
    };

    say!();
    if let Some(session) = navigator.session() {
        let started = session.started_at().format("%Y-%m-%d %H:%M UTC");
        say!("Session {} (started {})", session.id(), started);
    }
    terminal::write_lines(&report::render(&questions, &score))?;
    if let QuizState::Finished { reason: FinishReason::BackendFailure } = navigator.state() {
        say!();
        say!("Note: the quiz ended early because more questions could not be loaded.");
    }

    loop {
        say!();
        say!("[g] Generate Another Quiz   [e] Export as PDF   [q] Quit");
        match keys.next().await? {
            Key::Char('g') | Key::Char('G') => return Ok(AfterResults::Restart),
            Key::Char('e') | Key::Char('E') => match exporter.export(&questions).await {
                Ok(path) => say!("Saved {}", path.display()),
                Err(_) => say!("Failed to export PDF."),
            },
            Key::Char('q') | Key::Char('Q') | Key::Escape | Key::Interrupt => {
                return Ok(AfterResults::Quit)
            }
            _ => {}
        }
    }
}
