use anyhow::{anyhow, Context, Result};
use colored::*;
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, error, info};
use tutor_core::vision::mime_type_for_extension;
use tutor_core::{Conversation, Level, Subject, Tutor, TutorError, VisionClient};

use crate::commands::Command;
use crate::output::{
    print_answer, print_error, print_history, print_interactive_help, print_transcription, spinner,
};

/// Solves one question and prints the resolution
pub async fn run_single_query(tutor: &Tutor, question: &str) -> Result<()> {
    info!(question_len = question.len(), "Running single query");
    let mut conversation = Conversation::new();

    let progress = spinner("Solving question...");
    let result = tutor.submit(&mut conversation, question).await;
    progress.finish_and_clear();

    match result {
        Ok(answer) => {
            print_answer(&answer);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Failed to solve question");
            print_error(&describe(&e));
            Err(e.into())
        }
    }
}

/// Transcribes a screenshot, shows the text, then solves it
pub async fn run_image_query(tutor: &Tutor, vision: &VisionClient, path: &Path) -> Result<()> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    let mime_type = mime_type_for_extension(extension)
        .ok_or_else(|| anyhow!("Unsupported image type: {}", path.display()))?;
    let image = std::fs::read(path)
        .with_context(|| format!("Failed to read image {}", path.display()))?;

    debug!(bytes = image.len(), mime_type, model = vision.model_name(), "Transcribing image");
    let progress = spinner("Reading the question...");
    let transcription = vision.transcribe(&image, mime_type, None).await;
    progress.finish_and_clear();

    let question = match transcription {
        Ok(text) => text,
        Err(e) => {
            error!(error = %e, "Transcription failed");
            print_error(&e.user_message());
            return Err(e.into());
        }
    };
    print_transcription(&question);

    run_single_query(tutor, &question).await
}

/// Prints a study plan
pub async fn run_study_plan(
    tutor: &Tutor,
    subject: Subject,
    level: Level,
    performance: Option<&str>,
) -> Result<()> {
    let progress = spinner("Building study plan...");
    let result = tutor.study_plan(subject, level, performance).await;
    progress.finish_and_clear();

    match result {
        Ok(plan) => {
            print_answer(&plan);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Failed to build study plan");
            print_error(&describe(&e));
            Err(e.into())
        }
    }
}

/// Runs an interactive session. The first question is solved, later lines are follow-ups.
pub async fn run_interactive_chat(tutor: &Tutor) -> Result<()> {
    println!("{}", "Exam tutor interactive session.".bold());
    print_interactive_help();

    let mut conversation = Conversation::new();

    loop {
        let label = if conversation.is_active() {
            "Follow-up"
        } else {
            "Question"
        };
        print!("{}: ", label.green().bold());
        io::stdout().flush().context("Failed to flush stdout")?;

        let mut input = String::new();
        let read = io::stdin()
            .read_line(&mut input)
            .context("Failed to read input")?;
        if read == 0 {
            break;
        }

        let command = match Command::parse(&input) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                print_error(&e.to_string());
                continue;
            }
        };

        match command {
            Command::Exit => {
                println!("Exiting session.");
                break;
            }
            Command::Reset => {
                conversation.reset();
                println!("{}", "Session cleared. Send a new question.".yellow());
            }
            Command::History => print_history(conversation.history()),
            Command::Help => print_interactive_help(),
            Command::Plan { subject, level } => {
                // Failures are already printed; the session goes on
                let _ = run_study_plan(tutor, subject, level, None).await;
            }
            Command::Text(text) => handle_text(tutor, &mut conversation, &text).await,
        }

        println!();
    }

    Ok(())
}

async fn handle_text(tutor: &Tutor, conversation: &mut Conversation, text: &str) {
    if conversation.is_active() {
        let progress = spinner("Thinking...");
        let result = tutor.ask(conversation, text).await;
        progress.finish_and_clear();

        match result {
            Ok(reply) if reply.failure.is_some() => print_error(&reply.text),
            Ok(reply) => print_answer(&reply.text),
            Err(e) => print_error(&describe(&e)),
        }
    } else {
        let progress = spinner("Solving question...");
        let result = tutor.submit(conversation, text).await;
        progress.finish_and_clear();

        match result {
            Ok(answer) => print_answer(&answer),
            Err(e) => {
                error!(error = %e, "Failed to solve question");
                print_error(&describe(&e));
            }
        }
    }
}

/// Call failures get their user-facing text; everything else its display form
fn describe(error: &TutorError) -> String {
    match error {
        TutorError::Call(e) => e.user_message(),
        other => other.to_string(),
    }
}
