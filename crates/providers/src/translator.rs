use crate::prompt::PromptBuilder;
use crate::reply::parse_reply;
use crate::traits::{LLMProvider, ProviderError};
use async_trait::async_trait;
use bashai_protocol::{CommandCandidate, Request, Transcript};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TranslationError {
    #[error("translation endpoint unreachable: {0}")]
    Unreachable(String),
    #[error("translation timed out: {0}")]
    Timeout(String),
    #[error("malformed model response: {0}")]
    MalformedResponse(String),
}

impl TranslationError {
    /// Network-level failures that are worth re-sending unchanged.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Timeout(_))
    }
}

impl From<ProviderError> for TranslationError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Http(msg) | ProviderError::Api(msg) => Self::Unreachable(msg),
            ProviderError::Timeout(msg) => Self::Timeout(msg),
            ProviderError::Parse(msg) => Self::MalformedResponse(msg),
        }
    }
}

/// Turns a request plus the attempts so far into the next candidate.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        request: &Request,
        transcript: &Transcript,
    ) -> Result<CommandCandidate, TranslationError>;
}

/// Translator backed by a text-generation provider.
pub struct ModelTranslator {
    provider: Arc<dyn LLMProvider>,
    prompt: PromptBuilder,
    request_timeout: Duration,
}

impl ModelTranslator {
    pub fn new(provider: Arc<dyn LLMProvider>, request_timeout: Duration) -> Self {
        Self {
            provider,
            prompt: PromptBuilder::default(),
            request_timeout,
        }
    }

    pub fn with_prompt(mut self, prompt: PromptBuilder) -> Self {
        self.prompt = prompt;
        self
    }
}

#[async_trait]
impl Translator for ModelTranslator {
    async fn translate(
        &self,
        request: &Request,
        transcript: &Transcript,
    ) -> Result<CommandCandidate, TranslationError> {
        let attempt = transcript.next_attempt_number();
        let messages = self.prompt.build(request, transcript);
        info!(
            "Translating attempt {} via {} ({} prior attempts)",
            attempt,
            self.provider.name(),
            transcript.len()
        );

        let reply = tokio::time::timeout(self.request_timeout, self.provider.generate(&messages))
            .await
            .map_err(|_| {
                warn!("Provider did not answer within {:?}", self.request_timeout);
                TranslationError::Timeout(format!("no reply after {:?}", self.request_timeout))
            })??;

        debug!("Raw reply: {}", reply);
        parse_reply(&reply, attempt).map_err(|e| {
            warn!("Could not parse reply: {}", e);
            TranslationError::MalformedResponse(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{Message, Role};
    use bashai_protocol::{CandidateKind, OsProfile, SafetyVerdict};
    use std::sync::Mutex;

    struct ScriptedProvider {
        reply: Result<String, fn() -> ProviderError>,
        delay: Duration,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedProvider {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                delay: Duration::ZERO,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(err: fn() -> ProviderError) -> Self {
            Self {
                reply: Err(err),
                delay: Duration::ZERO,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn generate(&self, messages: &[Message]) -> Result<String, ProviderError> {
            self.seen.lock().unwrap().push(messages.to_vec());
            tokio::time::sleep(self.delay).await;
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(make) => Err(make()),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn request() -> Request {
        Request::new("list python files", OsProfile::generic_posix("/tmp"))
    }

    #[tokio::test]
    async fn test_translate_first_attempt() {
        let provider = Arc::new(ScriptedProvider::replying("```bash\nfind . -name \"*.py\"\n```"));
        let translator = ModelTranslator::new(provider.clone(), Duration::from_secs(5));

        let candidate = translator.translate(&request(), &Transcript::new()).await.unwrap();
        assert_eq!(candidate.text, "find . -name \"*.py\"");
        assert_eq!(candidate.kind, CandidateKind::Shell);
        assert_eq!(candidate.origin_attempt, 1);

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0][0].role, Role::System);
    }

    #[tokio::test]
    async fn test_origin_attempt_follows_transcript() {
        let provider = Arc::new(ScriptedProvider::replying("sudo ls /root"));
        let translator = ModelTranslator::new(provider.clone(), Duration::from_secs(5));

        let mut transcript = Transcript::new();
        transcript.record(CommandCandidate::shell("ls /root", 1), SafetyVerdict::Allow, None);

        let candidate = translator.translate(&request(), &transcript).await.unwrap();
        assert_eq!(candidate.origin_attempt, 2);
        let seen = provider.seen.lock().unwrap();
        assert!(seen[0][1].content.contains("Command: ls /root"));
    }

    #[tokio::test]
    async fn test_provider_errors_are_mapped() {
        let cases: Vec<(fn() -> ProviderError, fn(&TranslationError) -> bool)> = vec![
            (
                || ProviderError::Http("refused".into()),
                |e| matches!(e, TranslationError::Unreachable(_)),
            ),
            (
                || ProviderError::Api("500".into()),
                |e| matches!(e, TranslationError::Unreachable(_)),
            ),
            (
                || ProviderError::Timeout("slow".into()),
                |e| matches!(e, TranslationError::Timeout(_)),
            ),
            (
                || ProviderError::Parse("bad json".into()),
                |e| matches!(e, TranslationError::MalformedResponse(_)),
            ),
        ];

        for (make, check) in cases {
            let translator =
                ModelTranslator::new(Arc::new(ScriptedProvider::failing(make)), Duration::from_secs(5));
            let err = translator.translate(&request(), &Transcript::new()).await.unwrap_err();
            assert!(check(&err), "unexpected mapping: {err:?}");
        }
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_malformed() {
        let translator = ModelTranslator::new(
            Arc::new(ScriptedProvider::replying("```bash\nls")),
            Duration::from_secs(5),
        );
        let err = translator.translate(&request(), &Transcript::new()).await.unwrap_err();
        assert!(matches!(err, TranslationError::MalformedResponse(_)));
        assert!(!err.is_transport());
    }

    #[tokio::test]
    async fn test_request_timeout_bounds_slow_provider() {
        let mut provider = ScriptedProvider::replying("ls");
        provider.delay = Duration::from_secs(30);
        let translator = ModelTranslator::new(Arc::new(provider), Duration::from_millis(50));

        let err = translator.translate(&request(), &Transcript::new()).await.unwrap_err();
        assert!(matches!(err, TranslationError::Timeout(_)));
        assert!(err.is_transport());
    }
}
