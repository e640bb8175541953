use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use lazy_static::lazy_static;
use pulldown_cmark::{Event as MdEvent, HeadingLevel, Options, Parser as MdParser, Tag};
use regex::Regex;
use std::time::Duration;
use tutor_core::{Role, Turn};

lazy_static! {
    // `$$..$$` may span lines, `$..$` stays on one
    static ref MATH_RE: Regex = Regex::new(r"(?s)\$\$.+?\$\$|\$[^$\n]+?\$").unwrap();
}

/// Private-use code points, left alone by the Markdown parser
fn math_placeholder(index: usize) -> String {
    format!("\u{E000}{}\u{E001}", index)
}

/// Spinner shown while a model call is pending
pub fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner} {msg}")
    {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

/// Print a tutor answer rendered for the terminal
pub fn print_answer(answer: &str) {
    println!("{}: {}", "Tutor".blue().bold(), render_markdown(answer));
}

pub fn print_transcription(text: &str) {
    println!("{}", "Transcribed question:".cyan().bold());
    println!("{}", text.dimmed());
    println!();
}

/// Call failures are shown in place of the answer
pub fn print_error(message: &str) {
    eprintln!("{} {}", "Error:".red().bold(), message);
}

pub fn print_history(history: &[Turn]) {
    if history.is_empty() {
        println!("{}", "No question submitted yet.".yellow());
        return;
    }
    for turn in history {
        match turn.role {
            Role::User => println!("{}: {}", "You".green().bold(), turn.text),
            Role::Assistant => println!("{}: {}", "Tutor".blue().bold(), render_markdown(&turn.text)),
        }
    }
}

pub fn print_interactive_help() {
    println!("Type a question to have it solved, then ask follow-ups about the answer.");
    println!("  {}                 start over with a new question", "/reset".cyan());
    println!("  {}               show the conversation so far", "/history".cyan());
    println!("  {} build a study plan", "/plan <subject> <level>".cyan());
    println!("  {}           leave the session", "exit | quit".cyan());
    println!();
}

/// Show usage instructions when no question or action is provided
pub fn print_usage_instructions() {
    println!("{}", "Usage:".yellow().bold());
    println!("  {}", "exam-tutor \"your question\"".green().bold());
    println!("    Solve a single multiple-choice question");
    println!();
    println!("  {}", "exam-tutor --image question.png".green().bold());
    println!("    Transcribe a screenshot and solve it");
    println!();
    println!("  {}", "exam-tutor -i".green().bold());
    println!("    Start an interactive session with follow-up questions");
    println!();
    println!(
        "  {}",
        "exam-tutor --study-plan --subject physics --level basic".green().bold()
    );
    println!("    Generate a study plan");
    println!();
    println!("{}", "Options:".cyan());
    println!("  --config <PATH>  Use a specific config file");
    println!("  --model <NAME>   Override the completion model");
    println!("  --no-cache       Disable memoization of repeated requests");
    println!("  --help           Show this help message");
    println!();
}

/// Render markdown in the terminal. Math spans are set aside before parsing
/// and put back verbatim afterwards.
pub fn render_markdown(markdown: &str) -> String {
    let mut spans = Vec::new();
    let prose = MATH_RE.replace_all(markdown, |caps: &regex::Captures| {
        spans.push(caps[0].to_string());
        math_placeholder(spans.len() - 1)
    });

    let mut rendered = render_prose(&prose);
    for (index, span) in spans.iter().enumerate() {
        rendered = rendered.replace(&math_placeholder(index), span);
    }
    rendered
}

fn render_prose(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut output = String::new();
    let mut in_code_block = false;

    for event in MdParser::new_ext(markdown, options) {
        match event {
            MdEvent::Start(Tag::Heading(level, ..)) => {
                output.push('\n');
                if level == HeadingLevel::H1 || level == HeadingLevel::H2 {
                    output.push_str(&format!("{} ", "#".bright_cyan().bold()));
                }
            }
            MdEvent::End(Tag::Heading(..)) => output.push('\n'),
            MdEvent::Start(Tag::Paragraph) => {
                if !output.is_empty() && !output.ends_with('\n') {
                    output.push_str("\n\n");
                }
            }
            MdEvent::End(Tag::Paragraph) => output.push('\n'),
            MdEvent::Start(Tag::CodeBlock(_)) => {
                in_code_block = true;
                output.push('\n');
            }
            MdEvent::End(Tag::CodeBlock(_)) => {
                in_code_block = false;
                output.push('\n');
            }
            MdEvent::Start(Tag::List(_)) | MdEvent::End(Tag::List(_)) => output.push('\n'),
            MdEvent::Start(Tag::Item) => output.push_str(&format!("{}  ", "•".yellow())),
            MdEvent::End(Tag::Item) => output.push('\n'),
            MdEvent::Start(Tag::TableRow) | MdEvent::Start(Tag::TableHead) => {}
            MdEvent::End(Tag::TableRow) | MdEvent::End(Tag::TableHead) => output.push('\n'),
            MdEvent::End(Tag::TableCell) => output.push_str(" | "),
            MdEvent::Code(code) => output.push_str(&format!("`{}`", code.on_bright_black().white())),
            MdEvent::Text(text) => {
                if in_code_block {
                    output.push_str(&text.dimmed().to_string());
                } else {
                    output.push_str(&text);
                }
            }
            MdEvent::Html(html) => output.push_str(&html),
            MdEvent::SoftBreak => output.push(' '),
            MdEvent::HardBreak => output.push('\n'),
            _ => {}
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_keeps_text_and_math() {
        colored::control::set_override(false);

        let rendered = render_markdown("**Resposta:** letra B\n\n$$x^2 = 4$$");
        assert!(rendered.contains("Resposta:"));
        assert!(rendered.contains("letra B"));
        assert!(rendered.contains("$$x^2 = 4$$"));
        assert!(!rendered.contains("**"));
    }

    #[test]
    fn test_render_leaves_latex_alone() {
        colored::control::set_override(false);

        for math in [
            r"$$\{x \mid x > 0\}$$",
            r"$$a \\ b$$",
            "$$2*3*4$$",
            r"$x \, y$",
            "$$\n\\frac{a_1}{b_2}\n$$",
        ] {
            let rendered = render_markdown(&format!("Temos *isto*: {} e fim", math));
            assert!(rendered.contains(math), "{:?} lost in {:?}", math, rendered);
            assert!(!rendered.contains("*isto*"));
        }
    }

    #[test]
    fn test_render_without_math_is_unchanged_by_placeholders() {
        colored::control::set_override(false);

        let rendered = render_markdown("Custa R$ 5 e mais nada");
        assert!(rendered.contains("Custa R$ 5 e mais nada"));
        assert!(!rendered.contains('\u{E000}'));
    }

    #[test]
    fn test_render_list_items() {
        colored::control::set_override(false);

        let rendered = render_markdown("- Semana 1\n- Semana 2\n");
        assert!(rendered.contains("•  Semana 1"));
        assert!(rendered.contains("•  Semana 2"));
    }
}
