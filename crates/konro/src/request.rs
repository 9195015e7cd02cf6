//! Generation requests and prompt rendering.
//!
//! A [`GenerationRequest`] carries one conversation snapshot: the system
//! prompt plus the turns accumulated so far. It is produced by the caller,
//! consumed once per `generate` invocation, and not retained afterward.

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    fn tag(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One prior exchange in the conversation.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        ConversationTurn {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        ConversationTurn {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Input to one `generate` call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// System prompt. Its fingerprint drives the KV-cache reuse heuristic:
    /// an unchanged system prompt between consecutive calls skips the
    /// pre-feed context clear.
    pub system_prompt: String,

    /// Conversation history, oldest first. The last turn is expected to be
    /// the user message being answered.
    pub turns: Vec<ConversationTurn>,
}

impl GenerationRequest {
    pub fn new(system_prompt: impl Into<String>, turns: Vec<ConversationTurn>) -> Self {
        GenerationRequest {
            system_prompt: system_prompt.into(),
            turns,
        }
    }

    /// Renders the flat prompt string fed to the engine: the system prompt
    /// first, then each turn tagged with its speaker, ending with an
    /// assistant cue for the reply being generated.
    pub fn render_prompt(&self) -> String {
        let mut prompt = String::new();
        if !self.system_prompt.is_empty() {
            prompt.push_str(&self.system_prompt);
            prompt.push_str("\n\n");
        }
        for turn in &self.turns {
            prompt.push_str(turn.role.tag());
            prompt.push_str(": ");
            prompt.push_str(&turn.text);
            prompt.push('\n');
        }
        prompt.push_str("Assistant:");
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_orders_system_then_turns() {
        let request = GenerationRequest::new(
            "Be terse.",
            vec![
                ConversationTurn::user("hi"),
                ConversationTurn::assistant("hello"),
                ConversationTurn::user("how are you?"),
            ],
        );

        let prompt = request.render_prompt();
        assert_eq!(
            prompt,
            "Be terse.\n\nUser: hi\nAssistant: hello\nUser: how are you?\nAssistant:"
        );
    }

    #[test]
    fn test_render_empty_system_prompt_omitted() {
        let request = GenerationRequest::new("", vec![ConversationTurn::user("hi")]);
        assert_eq!(request.render_prompt(), "User: hi\nAssistant:");
    }

    #[test]
    fn test_render_ends_with_assistant_cue() {
        let request = GenerationRequest::new("sys", vec![]);
        assert!(request.render_prompt().ends_with("Assistant:"));
    }
}
