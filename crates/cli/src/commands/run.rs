//! Run command — drive a gated session from the terminal
//!
//! Stdin lines stand in for UI events:
//! `focus`, `visible`, `route <path>`, `get <path>`, `post <path>`, `quit`.

use accessgate_core::{EngineEvent, HttpRequest, Navigator};
use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use std::io::BufRead;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use super::{build_engine, load_config, print_state, CliEngine};

/// Longest the loop sleeps before re-checking Ctrl-C.
const MAX_SLICE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Event(EngineEvent),
    Get(String),
    Post(String),
    Quit,
}

/// Parses one stdin line. Blank and unrecognised lines yield `None`.
pub fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim();
    let (cmd, arg) = match line.split_once(char::is_whitespace) {
        Some((c, a)) => (c, a.trim()),
        None => (line, ""),
    };

    match (cmd.to_lowercase().as_str(), arg) {
        ("focus", _) => Some(Input::Event(EngineEvent::Focus)),
        ("visible", _) => Some(Input::Event(EngineEvent::VisibilityRegained)),
        ("route", path) if !path.is_empty() => {
            Some(Input::Event(EngineEvent::RouteChanged(path.to_string())))
        }
        ("get", path) if !path.is_empty() => Some(Input::Get(path.to_string())),
        ("post", path) if !path.is_empty() => Some(Input::Post(path.to_string())),
        ("quit" | "exit", _) => Some(Input::Quit),
        _ => None,
    }
}

/// How long to wait for input before the next tick.
pub fn wait_for(next_wakeup: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
    match next_wakeup {
        Some(at) => (at - now).to_std().unwrap_or(Duration::ZERO).min(MAX_SLICE),
        None => MAX_SLICE,
    }
}

pub fn run(config_path: Option<&Path>, checkout_session: Option<&str>, open: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let mut engine = build_engine(config, open)?;

    eprintln!(
        "{}",
        format!("  accessgate v{} — session", accessgate_core::VERSION).bold()
    );
    eprintln!(
        "  {}: {} ({})",
        "User".bold(),
        engine.identity().user_id,
        engine.identity().role.cyan()
    );
    if engine.state() == accessgate_core::AccessState::Suspended {
        eprintln!("  {}", "Restored suspended state from last session".dimmed());
    }
    print_state(engine.state());
    eprintln!();

    // ── Ctrl-C handler ─────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    // ── Stdin reader ───────────────────────────────────────────
    let (tx, rx) = mpsc::channel::<String>();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    let changes = engine.subscribe();
    engine.start(checkout_session);
    for state in changes.try_iter() {
        print_state(state);
    }
    eprintln!();
    eprintln!(
        "  {}",
        "Commands: focus, visible, route <path>, get <path>, post <path>, quit (Ctrl-C to stop)"
            .dimmed()
    );

    // ── Event loop ─────────────────────────────────────────────
    let mut stdin_open = true;
    while running.load(Ordering::SeqCst) {
        let wait = wait_for(engine.next_wakeup(), Utc::now());

        let line = if stdin_open {
            match rx.recv_timeout(wait) {
                Ok(line) => Some(line),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => {
                    // Stdin closed; keep gating on timers alone.
                    stdin_open = false;
                    None
                }
            }
        } else {
            std::thread::sleep(wait);
            None
        };

        if let Some(line) = line {
            match parse_input(&line) {
                Some(Input::Quit) => break,
                Some(input) => apply(&mut engine, input),
                None if line.trim().is_empty() => {}
                None => eprintln!("  {}: {}", "unknown command".yellow(), line.trim()),
            }
        }

        engine.tick();
        for state in changes.try_iter() {
            print_state(state);
        }
    }

    engine.stop();
    eprintln!();
    eprintln!("  {}", "Session stopped.".bold());
    Ok(())
}

fn apply(engine: &mut CliEngine, input: Input) {
    match input {
        Input::Event(EngineEvent::RouteChanged(path)) => {
            engine.navigator_mut().visit(&path);
            engine.handle(EngineEvent::RouteChanged(path));
        }
        Input::Event(event) => engine.handle(event),
        Input::Get(path) => {
            let url = engine.config().api.url_for(&path);
            send(engine, HttpRequest::get(url));
        }
        Input::Post(path) => {
            let url = engine.config().api.url_for(&path);
            send(engine, HttpRequest::post(url, None));
        }
        Input::Quit => {}
    }
}

fn send(engine: &mut CliEngine, request: HttpRequest) {
    match engine.request(&request) {
        Ok(resp) if resp.synthesized => {
            eprintln!(
                "  {} {} {}",
                request.method,
                request.url,
                "suppressed (access not active)".yellow()
            );
        }
        Ok(resp) => {
            let status = if resp.is_success() {
                resp.status.to_string().green()
            } else {
                resp.status.to_string().red()
            };
            eprintln!("  {} {} {}", request.method, request.url, status);
        }
        Err(e) => {
            eprintln!("  {} {} {}: {}", request.method, request.url, "failed".red(), e);
        }
    }
    eprintln!(
        "  {}: {}",
        "Surface".bold(),
        engine.navigator().current_surface().dimmed()
    );
}
