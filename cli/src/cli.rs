use clap::Parser;
use std::path::PathBuf;
use tutor_core::{Level, Subject, TutorConfig};

/// Exam tutor: solves multiple-choice questions and answers follow-ups
#[derive(Parser, Debug)]
#[command(name = "exam-tutor", author, version, about, long_about = None)]
pub struct Args {
    /// The question to solve
    #[arg(index = 1)]
    pub question: Option<String>,

    /// Screenshot of a question to transcribe and solve
    #[arg(long, value_name = "PATH", conflicts_with_all = ["question", "interactive"])]
    pub image: Option<PathBuf>,

    /// Enter interactive chat mode
    #[arg(short, long, conflicts_with = "question")]
    pub interactive: bool,

    /// Generate a study plan instead of solving a question
    #[arg(
        long,
        requires_all = ["subject", "level"],
        conflicts_with_all = ["question", "image", "interactive"]
    )]
    pub study_plan: bool,

    /// Subject for the study plan
    #[arg(long)]
    pub subject: Option<Subject>,

    /// Level for the study plan
    #[arg(long)]
    pub level: Option<Level>,

    /// Free-text description of past results, used by the study plan
    #[arg(long)]
    pub performance: Option<String>,

    /// Path to the config file
    #[arg(short, long, env = "TUTOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Completion model to use
    #[arg(short, long)]
    pub model: Option<String>,

    /// Disable memoization of identical requests
    #[arg(long, default_value_t = false)]
    pub no_cache: bool,

    /// Enable verbose output
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Args {
    /// Command-line flags are the top configuration layer
    pub fn apply_to(&self, config: &mut TutorConfig) {
        if let Some(model) = &self.model {
            config.model_name = Some(model.clone());
        }
        if self.no_cache {
            config.cache_capacity = Some(0);
        }
        if self.verbose {
            config.log_level = Some("debug".to_string());
        }
    }
}
