use anyhow::Result;
use clap::Parser;
use colored::*;
use tracing::{error, info};
use tutor_core::config::get_default_config_file;
use tutor_core::{Tutor, TutorConfig, VisionClient};

mod app;
mod cli;
mod commands;
mod logging;
mod output;

use crate::cli::Args;
use crate::output::print_usage_instructions;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => get_default_config_file("exam-tutor")?,
    };
    let mut config = TutorConfig::load_layered(&config_path)?;
    args.apply_to(&mut config);

    logging::init(config.log_level());
    info!(config = %config_path.display(), model = config.model_name(), "Configuration loaded");

    if let Err(e) = config.require_api_key() {
        error!(error = %e, "Missing credentials");
        eprintln!("{}", format!("{}. Set it in .env or {}", e, config_path.display()).red());
        return Err(e.into());
    }

    let tutor = Tutor::from_config(&config)?;

    if args.study_plan {
        if let (Some(subject), Some(level)) = (args.subject, args.level) {
            return app::run_study_plan(&tutor, subject, level, args.performance.as_deref()).await;
        }
    }

    if let Some(path) = &args.image {
        let vision = VisionClient::new(&config)?;
        return app::run_image_query(&tutor, &vision, path).await;
    }

    if args.interactive {
        app::run_interactive_chat(&tutor).await
    } else if let Some(question) = &args.question {
        app::run_single_query(&tutor, question).await
    } else {
        print_usage_instructions();
        Ok(())
    }
}
