//! Keyboard input helpers for the interactive front end.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tokio::sync::mpsc;
use tracing::debug;

/// How often the reader thread checks whether it should stop.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Raw mode for as long as the guard lives.
struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// A key the quiz screens care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Escape,
    Interrupt,
}

fn translate(key: KeyEvent) -> Option<Key> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Key::Interrupt),
        KeyCode::Char(c) => Some(Key::Char(c)),
        KeyCode::Enter => Some(Key::Enter),
        KeyCode::Esc => Some(Key::Escape),
        _ => None,
    }
}

/// Wait up to `timeout` for a single keystroke. Raw mode must already be on.
fn poll_event(timeout: Duration) -> io::Result<Option<Key>> {
    if event::poll(timeout)? {
        if let Event::Key(key) = event::read()? {
            return Ok(translate(key));
        }
    }
    Ok(None)
}

/// Keystrokes delivered by one background thread.
///
/// The thread is the only reader of the terminal while the `KeyReader` lives,
/// so keys pressed while nobody is awaiting [`KeyReader::next`] are queued
/// rather than lost. Dropping the reader stops the thread and waits for it,
/// which also releases raw mode before the drop returns.
pub struct KeyReader {
    keys: mpsc::UnboundedReceiver<io::Result<Key>>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl KeyReader {
    /// Put the terminal in raw mode and start reading keys from it.
    ///
    /// Output written while the reader is alive should go through
    /// [`write_lines`], since raw mode turns off newline translation.
    pub fn spawn() -> io::Result<Self> {
        let raw = RawMode::enable()?;
        Self::with_source(move |timeout| {
            let _held = &raw;
            poll_event(timeout)
        })
    }

    /// Read keys from `source`, which is polled with a short timeout until the
    /// reader is dropped or the source fails.
    pub fn with_source<F>(mut source: F) -> io::Result<Self>
    where
        F: FnMut(Duration) -> io::Result<Option<Key>> + Send + 'static,
    {
        let (tx, keys) = mpsc::unbounded_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let stopped = stop.clone();
        let thread = std::thread::Builder::new()
            .name("key-reader".to_string())
            .spawn(move || {
                while !stopped.load(Ordering::Relaxed) {
                    match source(POLL_INTERVAL) {
                        Ok(None) => {}
                        Ok(Some(key)) => {
                            if tx.send(Ok(key)).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            let _ = tx.send(Err(e));
                            break;
                        }
                    }
                }
                debug!("Key reader stopped");
            })?;
        Ok(Self {
            keys,
            stop,
            thread: Some(thread),
        })
    }

    /// The next keystroke. Cancel-safe: a key is never consumed by a wait
    /// that is abandoned, e.g. the losing branch of `tokio::select!`.
    pub async fn next(&mut self) -> io::Result<Key> {
        match self.keys.recv().await {
            Some(key) => key,
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "keyboard reader stopped")),
        }
    }
}

impl Drop for KeyReader {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Print `text` one line at a time with explicit carriage returns, so it
/// renders the same in raw and cooked mode.
pub fn write_lines(text: &str) -> io::Result<()> {
    let mut out = io::stdout().lock();
    for line in text.lines() {
        write!(out, "{}\r\n", line)?;
    }
    out.flush()
}

/// Print `label` and read one line of input.
pub fn prompt_line(label: &str) -> io::Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Read a line without echoing it.
pub fn prompt_password(label: &str) -> io::Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut secret = String::new();
    {
        let _raw = RawMode::enable()?;
        loop {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind == KeyEventKind::Release {
                continue;
            }
            match key.code {
                KeyCode::Enter => break,
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Err(io::Error::new(io::ErrorKind::Interrupted, "input cancelled"));
                }
                KeyCode::Backspace => {
                    secret.pop();
                }
                KeyCode::Char(c) => secret.push(c),
                _ => {}
            }
        }
    }
    println!();
    Ok(secret)
}
