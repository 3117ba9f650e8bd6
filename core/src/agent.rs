//! The reasoning loop.
//!
//! One turn runs PROMPTING → PARSED → (ACTING)? → FINALIZING → DONE:
//! assemble the prompt from the system instructions, the bounded history
//! and the question; complete; parse; dispatch the action if one was
//! extracted; re-prompt with the observation for a grounded final answer;
//! then record the turn. Any failure inside a turn becomes that turn's
//! textual answer; nothing escapes to crash the session.

use crate::dispatch::{Dispatcher, Grounding};
use crate::index::DocumentIndex;
use crate::llm::{complete_with_retry, CompletionService, UNRESPONSIVE_MESSAGE};
use crate::parser::parse_response;
use crate::search::{Citation, SemanticSearch};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Maximum number of prior turns kept in the prompt context.
pub const HISTORY_LIMIT: usize = 3;

/// Answer used when even the Answer marker is missing from model output.
const MISSING_ANSWER: &str = "?";

const SYSTEM_PROMPT: &str = "\
You run in a process of Question, Thought, Action, Observation.

Use Thought to describe your thoughts about the question you have been asked.
For Action, choose exactly one of:

- lookup: terms
- weather: location

Observation will be the result of running those actions.
Finally at the end, state the Answer.

Here are some sample sessions.

Question: How is the weather in Berlin?
Thought: This is about weather, I need to check it with a tool.
Action: weather: Berlin
Observation: The current weather in Berlin: overcast clouds. Temperature: 17 \u{b0}C (63 \u{b0}F).
Answer: The weather in Berlin is overcast at about 17 \u{b0}C.

Question: Who painted Mona Lisa?
Thought: This is about general knowledge, I need to look it up.
Action: lookup: painter of Mona Lisa
Observation: Mona Lisa was painted by Leonardo da Vinci.
Answer: Leonardo da Vinci painted Mona Lisa.";

/// Configuration for the reasoning loop.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub system_prompt: String,
    /// Stop sequences passed to the completion service
    pub stop: Vec<String>,
    pub history_limit: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: SYSTEM_PROMPT.to_string(),
            stop: vec!["Question:".to_string()],
            history_limit: HISTORY_LIMIT,
        }
    }
}

/// One completed question/answer exchange.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub question: String,
    pub thought: String,
    pub action: String,
    pub observation: String,
    pub answer: String,
    pub timestamp_ms: i64,
}

/// Conversational state for one session: the bounded history plus the
/// citation of the most recent grounded turn. Mutated only at the end of
/// a turn.
#[derive(Debug, Default)]
pub struct AgentState {
    history: VecDeque<ConversationTurn>,
    last_source: String,
    last_reference: String,
}

impl AgentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &VecDeque<ConversationTurn> {
        &self.history
    }

    pub fn last_source(&self) -> &str {
        &self.last_source
    }

    pub fn last_reference(&self) -> &str {
        &self.last_reference
    }

    /// Append a turn, evicting the oldest while over `limit` (FIFO).
    pub fn push_turn(&mut self, turn: ConversationTurn, limit: usize) {
        while self.history.len() >= limit.max(1) {
            self.history.pop_front();
        }
        self.history.push_back(turn);
    }

    pub fn set_citation(&mut self, citation: &Citation) {
        self.last_source = citation.source.clone();
        self.last_reference = citation.reference.clone();
    }

    /// Clear the conversation history. Citation state is kept; it refers
    /// to the last grounded answer, not to the context window.
    pub fn reset(&mut self) {
        self.history.clear();
    }
}

/// Everything a finished turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub thought: String,
    pub action: String,
    pub observation: String,
    pub answer: String,
    pub source: String,
    pub reference: String,
}

/// The reasoning agent: completion service, dispatcher, corpus and state.
pub struct Agent {
    llm: Arc<dyn CompletionService>,
    search: SemanticSearch,
    dispatcher: Dispatcher,
    corpus: Arc<DocumentIndex>,
    state: Mutex<AgentState>,
    config: AgentConfig,
}

/// Intermediate result of a turn before state is updated.
struct TurnDraft {
    thought: String,
    action: String,
    observation: String,
    answer: String,
    /// None leaves the stored citation untouched (degraded turns)
    citation: Option<Citation>,
}

impl Agent {
    pub fn new(
        llm: Arc<dyn CompletionService>,
        search: SemanticSearch,
        dispatcher: Dispatcher,
        corpus: Arc<DocumentIndex>,
        config: AgentConfig,
    ) -> Self {
        Self {
            llm,
            search,
            dispatcher,
            corpus,
            state: Mutex::new(AgentState::new()),
            config,
        }
    }

    /// Run one turn. Never fails: errors inside the turn become the
    /// turn's answer text.
    pub async fn run_turn(&self, question: &str) -> TurnOutcome {
        info!(target: "reasoning", question = %question, "Turn started");

        let draft = match self.try_turn(question).await {
            Ok(draft) => draft,
            Err(e) => {
                error!(target: "reasoning", error = %e, "Turn failed");
                TurnDraft {
                    thought: String::new(),
                    action: String::new(),
                    observation: String::new(),
                    answer: e.to_string(),
                    citation: None,
                }
            }
        };

        // DONE: the single mutation point for conversational state.
        let mut state = self.state.lock().await;
        if let Some(ref citation) = draft.citation {
            state.set_citation(citation);
        }
        state.push_turn(
            ConversationTurn {
                question: question.to_string(),
                thought: draft.thought.clone(),
                action: draft.action.clone(),
                observation: draft.observation.clone(),
                answer: draft.answer.clone(),
                timestamp_ms: chrono::Utc::now().timestamp_millis(),
            },
            self.config.history_limit,
        );

        info!(target: "reasoning", answer = %draft.answer, "Turn complete");

        TurnOutcome {
            thought: draft.thought,
            action: draft.action,
            observation: draft.observation,
            answer: draft.answer,
            source: state.last_source().to_string(),
            reference: state.last_reference().to_string(),
        }
    }

    async fn try_turn(&self, question: &str) -> crate::Result<TurnDraft> {
        // PROMPTING
        let prompt = {
            let state = self.state.lock().await;
            self.build_prompt(&state, question)
        };
        let response = complete_with_retry(&*self.llm, &prompt, &self.config.stop).await;
        if response == UNRESPONSIVE_MESSAGE {
            return Ok(TurnDraft {
                thought: String::new(),
                action: String::new(),
                observation: String::new(),
                answer: response,
                citation: None,
            });
        }

        // PARSED: the prompt is included so the last-occurrence anchor
        // still works when the model echoes parts of it.
        let parsed = parse_response(&format!("{prompt}{response}"));
        let thought = parsed.thought.clone().unwrap_or_default();

        let Some(action) = parsed.action.clone() else {
            // Direct answer from model memory; no tool ran.
            debug!(target: "reasoning", "No action extracted, answering directly");
            return Ok(TurnDraft {
                thought,
                action: String::new(),
                observation: parsed.observation.unwrap_or_default(),
                answer: parsed
                    .answer
                    .filter(|a| !a.is_empty())
                    .unwrap_or_else(|| MISSING_ANSWER.to_string()),
                citation: Some(Citation::from_memory()),
            });
        };

        // ACTING
        let hint = parsed.observation.clone().unwrap_or_default();
        let outcome = self
            .dispatcher
            .dispatch(
                &action,
                question,
                &hint,
                parsed.answer.as_deref(),
                self.corpus.entries(),
            )
            .await?;

        // FINALIZING: continue the same prompt with the real observation
        // and an Answer cue.
        let continuation = format!(
            "{prompt}Thought: {thought}\nAction: {action}\nObservation: {}\nAnswer:",
            outcome.note
        );
        let response = complete_with_retry(&*self.llm, &continuation, &self.config.stop).await;
        if response == UNRESPONSIVE_MESSAGE {
            // Citing the sentinel would clobber the stored citation with
            // a meaningless page match.
            return Ok(TurnDraft {
                thought,
                action,
                observation: outcome.note,
                answer: response,
                citation: None,
            });
        }
        let answer = parse_response(&format!("{continuation} {response}"))
            .answer
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| MISSING_ANSWER.to_string());

        let citation = match outcome.grounding {
            Grounding::Static(citation) => citation,
            Grounding::Passages { indices } => {
                self.search
                    .cite(&answer, self.corpus.entries(), &indices)
                    .await?
            }
        };

        Ok(TurnDraft {
            thought,
            action,
            observation: outcome.note,
            answer,
            citation: Some(citation),
        })
    }

    fn build_prompt(&self, state: &AgentState, question: &str) -> String {
        let mut prompt = String::with_capacity(self.config.system_prompt.len() + 512);
        prompt.push_str(&self.config.system_prompt);
        prompt.push_str("\n\n");
        for turn in state.history() {
            prompt.push_str(&format!(
                "Question: {}\nAnswer: {}\n\n",
                turn.question, turn.answer
            ));
        }
        prompt.push_str(&format!("Question: {question}\n"));
        prompt
    }

    /// `!reset`: clear the conversation history without running a turn.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.reset();
        info!(target: "reasoning", "History cleared");
    }

    /// `!source`: citation source of the last grounded turn.
    pub async fn last_source(&self) -> String {
        self.state.lock().await.last_source().to_string()
    }

    /// `!reference`: reference text of the last grounded turn.
    pub async fn last_reference(&self) -> String {
        self.state.lock().await.last_reference().to_string()
    }

    pub async fn history_len(&self) -> usize {
        self.state.lock().await.history().len()
    }
}
