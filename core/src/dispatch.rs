//! Action dispatch.
//!
//! A parsed `Action` field has the grammar `name: argument`. The set of
//! actions is closed; anything the model invents that is not in it falls
//! back to a synthesized lookup of the original question, so a turn always
//! makes forward progress.

use crate::index::IndexEntry;
use crate::search::{Citation, Retrieval, SemanticSearch};
use crate::tools::WeatherTool;
use crate::Result;
use tracing::{debug, warn};

/// The closed set of actions the model may request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Retrieval over the indexed document
    Lookup(String),
    /// Current weather for a location
    Weather(String),
    /// Malformed or unknown; dispatched as a lookup of the question
    Unrecognized,
}

impl Action {
    /// Parse `name: argument`, splitting on the first colon. The name is
    /// case-insensitive; a missing colon or unknown name is
    /// [`Action::Unrecognized`], never an error.
    pub fn parse(text: &str) -> Self {
        let Some((name, argument)) = text.split_once(':') else {
            return Action::Unrecognized;
        };
        let argument = argument.trim().to_string();
        match name.trim().to_lowercase().as_str() {
            "lookup" => Action::Lookup(argument),
            "weather" => Action::Weather(argument),
            _ => Action::Unrecognized,
        }
    }
}

/// How a dispatched action grounds the final answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Grounding {
    /// Retrieved passages; the citation is resolved against the final
    /// answer once it exists
    Passages { indices: Vec<usize> },
    /// Citation is already fixed (weather tag or memory fallback)
    Static(Citation),
}

/// Result of dispatching one action.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchOutcome {
    /// Human-readable observation fed back to the model
    pub note: String,
    pub grounding: Grounding,
}

/// Interprets parsed actions and invokes the matching tool.
pub struct Dispatcher {
    search: SemanticSearch,
    weather: WeatherTool,
}

impl Dispatcher {
    pub fn new(search: SemanticSearch, weather: WeatherTool) -> Self {
        Self { search, weather }
    }

    /// Dispatch a raw action string.
    ///
    /// `hint` is the model's own observation from the first pass and
    /// `draft` its draft answer, both used by the lookup memory fallback.
    /// Weather configuration errors propagate; an unrecognized action is
    /// re-dispatched as `lookup: <question>`.
    pub async fn dispatch(
        &self,
        raw_action: &str,
        question: &str,
        hint: &str,
        draft: Option<&str>,
        corpus: &[IndexEntry],
    ) -> Result<DispatchOutcome> {
        match Action::parse(raw_action) {
            Action::Weather(location) => self.weather_report(&location).await,
            Action::Lookup(_) => self.lookup(question, hint, draft, corpus).await,
            Action::Unrecognized => {
                warn!(
                    target: "dispatch",
                    action = %raw_action,
                    "Unrecognized action, falling back to lookup"
                );
                self.lookup(question, hint, draft, corpus).await
            }
        }
    }

    /// The lookup tool retrieves with the question itself, not the action
    /// argument; the argument is the model's phrasing and the hint already
    /// carries its guess.
    async fn lookup(
        &self,
        question: &str,
        hint: &str,
        draft: Option<&str>,
        corpus: &[IndexEntry],
    ) -> Result<DispatchOutcome> {
        match self.search.retrieve(question, hint, corpus).await? {
            Retrieval::Grounded { passage, indices } => {
                debug!(target: "dispatch", passages = indices.len(), "Lookup grounded");
                Ok(DispatchOutcome {
                    note: passage,
                    grounding: Grounding::Passages { indices },
                })
            }
            Retrieval::FromMemory => {
                // Nothing in the corpus grounds this; reuse the model's
                // draft answer, or failing that its own observation.
                let note = draft
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or(hint)
                    .to_string();
                Ok(DispatchOutcome {
                    note,
                    grounding: Grounding::Static(Citation::from_memory()),
                })
            }
        }
    }

    async fn weather_report(&self, location: &str) -> Result<DispatchOutcome> {
        let reading = self.weather.current(location).await?;

        let celsius = reading.temperature_celsius.round() as i64;
        let fahrenheit = (reading.temperature_celsius * 9.0 / 5.0 + 32.0).round() as i64;
        let note = format!(
            "The current weather in {}: {}.\nPressure: {} hPa.\nTemperature: {} °C ({} °F).\nHumidity: {}%.",
            reading.name, reading.description, reading.pressure, celsius, fahrenheit, reading.humidity
        );

        // Machine-readable tag so the citation commands can surface the
        // raw reading later.
        let tag = format!("weather: {}", serde_json::to_string(&reading)?);

        Ok(DispatchOutcome {
            note,
            grounding: Grounding::Static(Citation {
                source: tag.clone(),
                reference: tag,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lookup() {
        assert_eq!(
            Action::parse("lookup: capital of France"),
            Action::Lookup("capital of France".to_string())
        );
    }

    #[test]
    fn parses_weather() {
        assert_eq!(
            Action::parse("weather: Berlin"),
            Action::Weather("Berlin".to_string())
        );
    }

    #[test]
    fn name_is_case_insensitive_and_trimmed() {
        assert_eq!(
            Action::parse("  Weather : Berlin"),
            Action::Weather("Berlin".to_string())
        );
        assert_eq!(
            Action::parse("LOOKUP:x"),
            Action::Lookup("x".to_string())
        );
    }

    #[test]
    fn missing_colon_is_unrecognized() {
        assert_eq!(Action::parse("lookup capital"), Action::Unrecognized);
        assert_eq!(Action::parse(""), Action::Unrecognized);
    }

    #[test]
    fn unknown_name_is_unrecognized() {
        assert_eq!(Action::parse("bogus: foo"), Action::Unrecognized);
    }

    #[test]
    fn argument_keeps_inner_colons() {
        assert_eq!(
            Action::parse("lookup: time: 12:30"),
            Action::Lookup("time: 12:30".to_string())
        );
    }
}
