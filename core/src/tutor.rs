use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::MemoizedBackend;
use crate::client::{CompletionBackend, CompletionClient, CompletionOptions};
use crate::config::TutorConfig;
use crate::conversation::Conversation;
use crate::errors::{CallError, TutorError, TutorResult};
use crate::markup;
use crate::prompt::{truncate_chars, Level, PromptKind, PromptRequest, Subject};

/// Answer to a follow-up question. A failed call still yields text to show.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub failure: Option<CallError>,
}

/// Drives conversations: builds prompts, calls the backend, records turns
#[derive(Clone)]
pub struct Tutor {
    backend: Arc<dyn CompletionBackend>,
    solve_options: CompletionOptions,
    follow_up_options: CompletionOptions,
    study_plan_options: CompletionOptions,
    max_context_chars: usize,
    normalize_markup: bool,
}

impl Tutor {
    /// HTTP client from the config, memoized unless `cache_capacity` is 0
    pub fn from_config(config: &TutorConfig) -> TutorResult<Self> {
        let client = CompletionClient::new(config)?;
        let backend: Arc<dyn CompletionBackend> = match NonZeroUsize::new(config.cache_capacity()) {
            Some(capacity) => Arc::new(MemoizedBackend::new(client, capacity)),
            None => Arc::new(client),
        };
        Self::with_backend(backend, config)
    }

    pub fn with_backend(
        backend: Arc<dyn CompletionBackend>,
        config: &TutorConfig,
    ) -> TutorResult<Self> {
        info!(
            provider = backend.provider_name(),
            model = %backend.model_name(),
            "Tutor ready"
        );
        Ok(Self {
            backend,
            solve_options: config.completion_options(PromptKind::SolveQuestion)?,
            follow_up_options: config.completion_options(PromptKind::FollowUp)?,
            study_plan_options: config.completion_options(PromptKind::StudyPlan)?,
            max_context_chars: config.max_context_chars(),
            normalize_markup: config.normalize_markup(),
        })
    }

    fn finish(&self, text: String) -> String {
        if self.normalize_markup {
            markup::normalize(&text)
        } else {
            text
        }
    }

    /// `Empty -> Active`. On failure the conversation stays empty and the error is returned.
    pub async fn submit(
        &self,
        conversation: &mut Conversation,
        question: &str,
    ) -> TutorResult<String> {
        if conversation.is_active() {
            return Err(TutorError::InvalidState(
                "a question was already solved in this session; reset first".to_string(),
            ));
        }

        let prompt = PromptRequest::SolveQuestion {
            question_text: question,
        }
        .build()?;

        debug!(prompt_len = prompt.as_str().len(), "Submitting question");
        let answer = self
            .backend
            .complete(prompt.as_str(), &self.solve_options)
            .await
            .and_then(non_blank)
            .map_err(|e| {
                warn!(error = %e, "Question could not be solved");
                e
            })?;

        let answer = self.finish(answer);
        conversation.begin(answer.clone());
        Ok(answer)
    }

    /// `Active -> Active`. Call failures become an inline assistant turn.
    pub async fn ask(&self, conversation: &mut Conversation, follow_up: &str) -> TutorResult<Reply> {
        let base_resolution = conversation.base_resolution().ok_or_else(|| {
            TutorError::InvalidState("no base resolution yet; submit a question first".to_string())
        })?;

        let prompt = PromptRequest::FollowUp {
            base_resolution: truncate_chars(base_resolution, self.max_context_chars),
            history: conversation.follow_ups(),
            new_question: follow_up,
        }
        .build()?;

        debug!(
            prompt_len = prompt.as_str().len(),
            turns = conversation.history().len(),
            "Asking follow-up"
        );
        let reply = match self
            .backend
            .complete(prompt.as_str(), &self.follow_up_options)
            .await
            .and_then(non_blank)
        {
            Ok(text) => Reply {
                text: self.finish(text),
                failure: None,
            },
            Err(e) => {
                warn!(error = %e, "Follow-up call failed, answering inline");
                Reply {
                    text: e.user_message(),
                    failure: Some(e),
                }
            }
        };

        conversation.push_exchange(follow_up.to_string(), reply.text.clone());
        Ok(reply)
    }

    /// Stateless study plan generation
    pub async fn study_plan(
        &self,
        subject: Subject,
        level: Level,
        prior_performance: Option<&str>,
    ) -> TutorResult<String> {
        let prompt = PromptRequest::StudyPlan {
            subject,
            level,
            prior_performance: prior_performance
                .map(|text| truncate_chars(text, self.max_context_chars)),
        }
        .build()?;

        debug!(%subject, %level, "Building study plan");
        let plan = self
            .backend
            .complete(prompt.as_str(), &self.study_plan_options)
            .await
            .and_then(non_blank)?;
        Ok(self.finish(plan))
    }
}

/// A blank answer cannot serve as a resolution
fn non_blank(text: String) -> Result<String, CallError> {
    if text.trim().is_empty() {
        Err(CallError::InvalidResponse("model returned an empty answer".to_string()))
    } else {
        Ok(text)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::conversation::{ConversationState, Turn};
    use crate::errors::ValidationError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Replays queued results in order and records every prompt it receives
    #[derive(Default)]
    pub(crate) struct ScriptedBackend {
        results: Mutex<VecDeque<Result<String, CallError>>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        pub fn new(results: Vec<Result<String, CallError>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().len()
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(
            &self,
            prompt: &str,
            _options: &CompletionOptions,
        ) -> Result<String, CallError> {
            self.prompts.lock().push(prompt.to_string());
            self.results
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(CallError::TransportError("script exhausted".into())))
        }

        fn provider_name(&self) -> &'static str {
            "scripted"
        }

        fn model_name(&self) -> String {
            "scripted".to_string()
        }
    }

    fn server_error() -> CallError {
        CallError::ServerError {
            status: 500,
            body: "x".to_string(),
        }
    }

    fn tutor_with(results: Vec<Result<String, CallError>>) -> (Tutor, Arc<ScriptedBackend>) {
        tutor_with_config(results, &TutorConfig::default())
    }

    fn tutor_with_config(
        results: Vec<Result<String, CallError>>,
        config: &TutorConfig,
    ) -> (Tutor, Arc<ScriptedBackend>) {
        let backend = Arc::new(ScriptedBackend::new(results));
        let tutor = Tutor::with_backend(backend.clone(), config).unwrap();
        (tutor, backend)
    }

    #[tokio::test]
    async fn test_submit_activates_conversation() {
        let (tutor, _) = tutor_with(vec![Ok("GABARITO: B".to_string())]);
        let mut conversation = Conversation::new();

        let answer = tutor.submit(&mut conversation, "2+2=?").await.unwrap();

        assert_eq!(answer, "GABARITO: B");
        assert_eq!(conversation.state(), ConversationState::Active);
        assert_eq!(conversation.history(), &[Turn::assistant("GABARITO: B")]);
        assert_eq!(conversation.base_resolution(), Some("GABARITO: B"));
    }

    #[tokio::test]
    async fn test_submit_failure_keeps_conversation_empty() {
        let (tutor, _) = tutor_with(vec![Err(server_error())]);
        let mut conversation = Conversation::new();

        let result = tutor.submit(&mut conversation, "2+2=?").await;

        assert!(matches!(
            result,
            Err(TutorError::Call(CallError::ServerError { status: 500, .. }))
        ));
        assert_eq!(conversation.state(), ConversationState::Empty);
        assert!(conversation.history().is_empty());
    }

    #[tokio::test]
    async fn test_submit_empty_question_makes_no_call() {
        let (tutor, backend) = tutor_with(vec![]);
        let mut conversation = Conversation::new();

        let result = tutor.submit(&mut conversation, "   ").await;

        assert!(matches!(
            result,
            Err(TutorError::Validation(ValidationError::EmptyField(
                "question_text"
            )))
        ));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_submit_twice_is_invalid_state() {
        let (tutor, backend) = tutor_with(vec![Ok("base".to_string())]);
        let mut conversation = Conversation::new();
        tutor.submit(&mut conversation, "q").await.unwrap();

        let result = tutor.submit(&mut conversation, "q2").await;
        assert!(matches!(result, Err(TutorError::InvalidState(_))));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_ask_appends_user_and_assistant_turns() {
        let (tutor, backend) = tutor_with(vec![
            Ok("GABARITO: B".to_string()),
            Ok("because...".to_string()),
        ]);
        let mut conversation = Conversation::new();
        tutor.submit(&mut conversation, "2+2=?").await.unwrap();

        let reply = tutor.ask(&mut conversation, "why B?").await.unwrap();

        assert_eq!(
            reply,
            Reply {
                text: "because...".to_string(),
                failure: None
            }
        );
        assert_eq!(
            conversation.history(),
            &[
                Turn::assistant("GABARITO: B"),
                Turn::user("why B?"),
                Turn::assistant("because..."),
            ]
        );
        let follow_up_prompt = backend.prompts.lock()[1].clone();
        assert!(follow_up_prompt.contains("GABARITO: B"));
        assert!(follow_up_prompt.contains("why B?"));
    }

    #[tokio::test]
    async fn test_ask_failure_is_shown_inline() {
        let (tutor, _) = tutor_with(vec![Ok("base".to_string()), Err(server_error())]);
        let mut conversation = Conversation::new();
        tutor.submit(&mut conversation, "q").await.unwrap();

        let reply = tutor.ask(&mut conversation, "why?").await.unwrap();

        assert_eq!(reply.failure, Some(server_error()));
        assert_eq!(conversation.history().len(), 3);
        assert_eq!(conversation.history()[1], Turn::user("why?"));
        assert_eq!(conversation.history()[2].text, reply.text);
        assert!(reply.text.contains("500"));

        conversation.reset();
        assert_eq!(conversation.state(), ConversationState::Empty);
        assert_eq!(conversation.base_resolution(), None);
    }

    #[tokio::test]
    async fn test_ask_on_empty_is_invalid_state() {
        let (tutor, backend) = tutor_with(vec![]);
        let mut conversation = Conversation::new();

        let result = tutor.ask(&mut conversation, "why?").await;
        assert!(matches!(result, Err(TutorError::InvalidState(_))));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_ask_empty_follow_up_rejected() {
        let (tutor, backend) = tutor_with(vec![Ok("base".to_string())]);
        let mut conversation = Conversation::new();
        tutor.submit(&mut conversation, "q").await.unwrap();

        let result = tutor.ask(&mut conversation, "").await;
        assert!(matches!(result, Err(TutorError::Validation(_))));
        assert_eq!(conversation.history().len(), 1);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_follow_up_history_carries_forward() {
        let (tutor, backend) = tutor_with(vec![
            Ok("base".to_string()),
            Ok("first answer".to_string()),
            Ok("second answer".to_string()),
        ]);
        let mut conversation = Conversation::new();
        tutor.submit(&mut conversation, "q").await.unwrap();
        tutor.ask(&mut conversation, "first?").await.unwrap();
        tutor.ask(&mut conversation, "second?").await.unwrap();

        let last_prompt = backend.prompts.lock()[2].clone();
        assert!(last_prompt.contains("first?"));
        assert!(last_prompt.contains("first answer"));
        assert!(last_prompt.contains("second?"));
        assert_eq!(conversation.history().len(), 5);
    }

    #[tokio::test]
    async fn test_base_resolution_truncated_in_follow_up() {
        let config = TutorConfig {
            max_context_chars: Some(10),
            ..Default::default()
        };
        let long_answer = format!("{}{}", "a".repeat(10), "TAIL");
        let (tutor, backend) =
            tutor_with_config(vec![Ok(long_answer.clone()), Ok("ok".to_string())], &config);
        let mut conversation = Conversation::new();
        tutor.submit(&mut conversation, "q").await.unwrap();
        tutor.ask(&mut conversation, "why?").await.unwrap();

        assert_eq!(conversation.base_resolution(), Some(long_answer.as_str()));
        let follow_up_prompt = backend.prompts.lock()[1].clone();
        assert!(follow_up_prompt.contains(&"a".repeat(10)));
        assert!(!follow_up_prompt.contains("TAIL"));
    }

    #[tokio::test]
    async fn test_blank_answer_keeps_conversation_empty() {
        let (tutor, backend) = tutor_with(vec![
            Ok("  ".to_string()),
            Ok("GABARITO: B".to_string()),
            Ok("because".to_string()),
        ]);
        let mut conversation = Conversation::new();

        let result = tutor.submit(&mut conversation, "2+2=?").await;
        assert!(matches!(
            result,
            Err(TutorError::Call(CallError::InvalidResponse(_)))
        ));
        assert_eq!(conversation.state(), ConversationState::Empty);

        tutor.submit(&mut conversation, "2+2=?").await.unwrap();
        let reply = tutor.ask(&mut conversation, "why B?").await.unwrap();
        assert_eq!(reply.text, "because");
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn test_blank_follow_up_answer_is_shown_inline() {
        let (tutor, _) = tutor_with(vec![Ok("base".to_string()), Ok(String::new())]);
        let mut conversation = Conversation::new();
        tutor.submit(&mut conversation, "q").await.unwrap();

        let reply = tutor.ask(&mut conversation, "why?").await.unwrap();
        assert!(matches!(reply.failure, Some(CallError::InvalidResponse(_))));
        assert_eq!(conversation.history().len(), 3);
    }

    #[tokio::test]
    async fn test_zero_context_cap_still_answers_follow_ups() {
        let config = TutorConfig {
            max_context_chars: Some(0),
            ..Default::default()
        };
        let (tutor, _) = tutor_with_config(
            vec![Ok("GABARITO: B".to_string()), Ok("because".to_string())],
            &config,
        );
        let mut conversation = Conversation::new();
        tutor.submit(&mut conversation, "2+2=?").await.unwrap();

        let reply = tutor.ask(&mut conversation, "why B?").await.unwrap();
        assert_eq!(reply.failure, None);
        assert_eq!(reply.text, "because");
    }

    #[tokio::test]
    async fn test_answers_are_normalized() {
        let (tutor, _) = tutor_with(vec![Ok(r"x = \( 2 \)".to_string())]);
        let mut conversation = Conversation::new();
        let answer = tutor.submit(&mut conversation, "q").await.unwrap();
        assert_eq!(answer, "x = $2$");

        let config = TutorConfig {
            normalize_markup: Some(false),
            ..Default::default()
        };
        let (raw_tutor, _) = tutor_with_config(vec![Ok(r"x = \( 2 \)".to_string())], &config);
        let mut conversation = Conversation::new();
        let answer = raw_tutor.submit(&mut conversation, "q").await.unwrap();
        assert_eq!(answer, r"x = \( 2 \)");
    }

    #[tokio::test]
    async fn test_study_plan() {
        let (tutor, backend) = tutor_with(vec![Ok("Semana 1: cinemática".to_string())]);

        let plan = tutor
            .study_plan(Subject::Physics, Level::Basic, Some("fui mal em vetores"))
            .await
            .unwrap();

        assert_eq!(plan, "Semana 1: cinemática");
        let prompt = backend.prompts.lock()[0].clone();
        assert!(prompt.contains("Física"));
        assert!(prompt.contains("fui mal em vetores"));
    }

    #[tokio::test]
    async fn test_study_plan_error_propagates() {
        let (tutor, _) = tutor_with(vec![Err(CallError::RateLimited("slow".into()))]);
        let result = tutor.study_plan(Subject::Essay, Level::Advanced, None).await;
        assert!(matches!(
            result,
            Err(TutorError::Call(CallError::RateLimited(_)))
        ));
    }

    #[tokio::test]
    async fn test_from_config_with_cache_and_missing_key() {
        let config = TutorConfig::default();
        let tutor = Tutor::from_config(&config).unwrap();
        let mut conversation = Conversation::new();

        let result = tutor.submit(&mut conversation, "q").await;
        assert!(matches!(
            result,
            Err(TutorError::Call(CallError::Unconfigured))
        ));
        assert_eq!(conversation.state(), ConversationState::Empty);
    }
}
