//! Push-to-talk coaching session on the terminal.
//!
//! Press Enter to start speaking, Enter again to stop; the model's feedback
//! is printed (and optionally spoken) before the next round.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use talkcoach::audio::MicCapture;
use talkcoach::config::{AppConfig, AppPaths};
use talkcoach::session::{Feedback, SessionController, SessionEvent};
use talkcoach::transport::{StreamTransport, WsConnector};
use talkcoach::tts::SpeechSynthesizer;

/// How long to wait for the model before giving the turn up.
const FEEDBACK_WAIT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config = AppConfig::load().context("loading configuration")?;
    if config.transport.api_key.is_none() {
        config.transport.api_key = std::env::var("GEMINI_API_KEY").ok();
    }
    if config.tts.api_key.is_none() {
        config.tts.api_key = std::env::var("ELEVENLABS_API_KEY").ok();
    }

    let transport =
        StreamTransport::new(config.transport.clone(), Arc::new(WsConnector::new()));
    let session =
        SessionController::new(transport, Arc::new(MicCapture::new()), config.audio.clone());
    let tts = SpeechSynthesizer::new(config.tts.clone());
    let audio_out = AppPaths::new().audio_out_dir;

    let mut events = session.subscribe().await;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("Press Enter to speak, Enter again to finish. Type q to quit.");

    loop {
        print!("> ");
        use std::io::Write as _;
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if line.trim() == "q" {
            break;
        }

        let id = session.start().await.context("starting the session")?;
        log::debug!("session {id}");
        println!("Recording... press Enter to finish.");
        lines.next_line().await?;
        if let Err(e) = session.stop().await {
            // Hit the length limit (or the device went away) before Enter.
            log::debug!("capture already ended: {e}");
        }

        match tokio::time::timeout(FEEDBACK_WAIT, events.recv()).await {
            Ok(Some(SessionEvent::Feedback(feedback))) => {
                print_feedback(&feedback);
                speak_feedback(&tts, &feedback, &audio_out).await;
            }
            Ok(Some(SessionEvent::Aborted(e))) => {
                eprintln!("Session lost: {e}. Press Enter to try again.");
            }
            Ok(None) => break,
            Err(_) => eprintln!("No feedback arrived within {}s.", FEEDBACK_WAIT.as_secs()),
        }
    }

    session.close().await;
    Ok(())
}

fn print_feedback(feedback: &Feedback) {
    let sections = [
        ("Heard", &feedback.recognition),
        ("Grammar", &feedback.grammar),
        ("Pronunciation", &feedback.pronunciation),
        ("Suggestions", &feedback.suggestions),
        ("Try next", &feedback.practice),
    ];
    println!();
    for (label, text) in sections {
        if !text.is_empty() {
            println!("{label}: {text}");
        }
    }
    println!();
}

async fn speak_feedback(tts: &SpeechSynthesizer, feedback: &Feedback, dir: &std::path::Path) {
    if !tts.is_enabled() {
        return;
    }
    let text = if feedback.suggestions.is_empty() {
        &feedback.grammar
    } else {
        &feedback.suggestions
    };
    if text.is_empty() {
        return;
    }
    match tts.synthesize_to_file(text, dir).await {
        Ok(path) => println!("(spoken feedback saved to {})", path.display()),
        Err(e) => log::warn!("speech synthesis failed: {e}"),
    }
}
