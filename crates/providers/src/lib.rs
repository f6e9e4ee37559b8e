pub mod http_provider;
pub mod prompt;
pub mod reply;
pub mod traits;
pub mod translator;

pub use http_provider::HttpProvider;
pub use prompt::{PromptBuilder, PromptLimits};
pub use reply::{parse_reply, ReplyError};
pub use traits::{LLMProvider, Message, ProviderError, Role};
pub use translator::{ModelTranslator, TranslationError, Translator};
