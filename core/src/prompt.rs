use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::conversation::{Role, Turn};
use crate::errors::ValidationError;

/// The closed set of templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    SolveQuestion,
    StudyPlan,
    FollowUp,
}

/// Exam subjects a study plan can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Mathematics,
    Physics,
    Chemistry,
    Biology,
    History,
    Geography,
    Portuguese,
    Literature,
    English,
    Essay,
}

impl Subject {
    pub const ALL: [Subject; 10] = [
        Subject::Mathematics,
        Subject::Physics,
        Subject::Chemistry,
        Subject::Biology,
        Subject::History,
        Subject::Geography,
        Subject::Portuguese,
        Subject::Literature,
        Subject::English,
        Subject::Essay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::Mathematics => "mathematics",
            Subject::Physics => "physics",
            Subject::Chemistry => "chemistry",
            Subject::Biology => "biology",
            Subject::History => "history",
            Subject::Geography => "geography",
            Subject::Portuguese => "portuguese",
            Subject::Literature => "literature",
            Subject::English => "english",
            Subject::Essay => "essay",
        }
    }

    /// Name used inside the prompt text
    pub fn display_name(&self) -> &'static str {
        match self {
            Subject::Mathematics => "Matemática",
            Subject::Physics => "Física",
            Subject::Chemistry => "Química",
            Subject::Biology => "Biologia",
            Subject::History => "História",
            Subject::Geography => "Geografia",
            Subject::Portuguese => "Língua Portuguesa",
            Subject::Literature => "Literatura",
            Subject::English => "Inglês",
            Subject::Essay => "Redação",
        }
    }
}

impl FromStr for Subject {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Subject::ALL
            .into_iter()
            .find(|subject| {
                subject.as_str() == wanted || subject.display_name().to_lowercase() == wanted
            })
            .ok_or_else(|| ValidationError::UnknownVariant {
                kind: "subject",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target level of a study plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Basic,
    Intermediate,
    Advanced,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Basic => "basic",
            Level::Intermediate => "intermediate",
            Level::Advanced => "advanced",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Level::Basic => "básico",
            Level::Intermediate => "intermediário",
            Level::Advanced => "avançado",
        }
    }
}

impl FromStr for Level {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" | "básico" | "basico" => Ok(Level::Basic),
            "intermediate" | "intermediário" | "intermediario" => Ok(Level::Intermediate),
            "advanced" | "avançado" | "avancado" => Ok(Level::Advanced),
            _ => Err(ValidationError::UnknownVariant {
                kind: "level",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rendered prompt, ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A template kind together with the fields it needs
#[derive(Debug, Clone, Copy)]
pub enum PromptRequest<'a> {
    SolveQuestion {
        question_text: &'a str,
    },
    StudyPlan {
        subject: Subject,
        level: Level,
        prior_performance: Option<&'a str>,
    },
    FollowUp {
        base_resolution: &'a str,
        history: &'a [Turn],
        new_question: &'a str,
    },
}

impl PromptRequest<'_> {
    pub fn kind(&self) -> PromptKind {
        match self {
            PromptRequest::SolveQuestion { .. } => PromptKind::SolveQuestion,
            PromptRequest::StudyPlan { .. } => PromptKind::StudyPlan,
            PromptRequest::FollowUp { .. } => PromptKind::FollowUp,
        }
    }

    /// Renders the template. Context fields are used as given; callers truncate them.
    pub fn build(&self) -> Result<Prompt, ValidationError> {
        let text = match *self {
            PromptRequest::SolveQuestion { question_text } => {
                let question_text = require("question_text", question_text)?;
                solve_template(question_text)
            }
            PromptRequest::StudyPlan {
                subject,
                level,
                prior_performance,
            } => study_plan_template(
                subject,
                level,
                prior_performance.map(str::trim).filter(|p| !p.is_empty()),
            ),
            PromptRequest::FollowUp {
                base_resolution,
                history,
                new_question,
            } => {
                let new_question = require("new_question", new_question)?;
                follow_up_template(base_resolution, history, new_question)
            }
        };
        Ok(Prompt(text))
    }
}

fn require<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::EmptyField(field))
    } else {
        Ok(value)
    }
}

fn solve_template(question_text: &str) -> String {
    format!(
        "Você é um professor experiente em preparação para vestibulares e para o ENEM.\n\
         Resolva a questão abaixo passo a passo, explicando o raciocínio de forma clara \
         e didática para um estudante do ensino médio.\n\
         Use notação LaTeX para expressões matemáticas.\n\
         Se a questão tiver alternativas, analise cada uma delas e termine a resposta \
         com uma linha no formato \"GABARITO: <letra>\".\n\n\
         QUESTÃO:\n{question_text}"
    )
}

fn study_plan_template(subject: Subject, level: Level, prior_performance: Option<&str>) -> String {
    let mut prompt = format!(
        "Você é um orientador de estudos para vestibulares e para o ENEM.\n\
         Monte um plano de estudos de 4 semanas para a disciplina de {subject} \
         para um estudante de nível {level}.\n\
         Para cada semana, liste os tópicos prioritários, exercícios recomendados \
         e uma meta de revisão.",
        subject = subject.display_name(),
        level = level.display_name(),
    );
    if let Some(performance) = prior_performance {
        prompt.push_str(
            "\nLeve em conta o desempenho anterior do estudante, descrito abaixo, \
             e reforce os pontos fracos:\n",
        );
        prompt.push_str(performance);
    }
    prompt
}

fn follow_up_template(base_resolution: &str, history: &[Turn], new_question: &str) -> String {
    let mut prompt = String::from(
        "Você é um professor que já resolveu a questão abaixo para um estudante.\n\
         Responda à nova dúvida do estudante de forma clara e objetiva, sem contradizer \
         a resolução original, a menos que encontre um erro nela.\n\n\
         RESOLUÇÃO ORIGINAL:\n",
    );
    prompt.push_str(base_resolution);

    if !history.is_empty() {
        prompt.push_str("\n\nCONVERSA ATÉ AGORA:\n");
        for turn in history {
            let speaker = match turn.role {
                Role::User => "Estudante",
                Role::Assistant => "Professor",
            };
            prompt.push_str(&format!("{}: {}\n", speaker, turn.text));
        }
    }

    prompt.push_str("\n\nNOVA DÚVIDA DO ESTUDANTE:\n");
    prompt.push_str(new_question);
    prompt
}

/// Keeps at most `max_chars` characters, never splitting a UTF-8 sequence
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
