use async_trait::async_trait;

/// Yes/no decision source for commands that need explicit approval.
#[async_trait]
pub trait Confirmer: Send + Sync {
    /// Callers may drop the future to cancel. A dropped question has no
    /// answer; input typed afterwards belongs to the next reader.
    async fn ask(&self, question: &str) -> bool;
}

/// Line-oriented user interaction.
#[async_trait]
pub trait Interface: Send + Sync {
    /// `None` on end of input.
    async fn receive_input(&self) -> Option<String>;
    async fn send_output(&self, message: &str);
    async fn show_status(&self, status: &str);
}

/// Answers every question the same way without prompting.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm {
    answer: bool,
}

impl AutoConfirm {
    pub fn yes() -> Self {
        Self { answer: true }
    }

    pub fn no() -> Self {
        Self { answer: false }
    }
}

#[async_trait]
impl Confirmer for AutoConfirm {
    async fn ask(&self, question: &str) -> bool {
        tracing::debug!("Auto-answering '{}' with {}", question, self.answer);
        self.answer
    }
}
