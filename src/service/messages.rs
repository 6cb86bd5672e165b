use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single interview question as served by `next-question`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    /// Question text (the service entity calls this field `question`)
    #[serde(alias = "question")]
    pub text: String,

    /// Difficulty level, e.g. "EASY", "Medium", "Hard"
    #[serde(default)]
    pub level: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Decoded `next-question` response
#[derive(Debug, Clone, PartialEq)]
pub enum NextQuestion {
    Question(Question),
    /// The service has no more questions for this session
    Completed,
}

impl NextQuestion {
    /// Decode the `next-question` body: `{status: "COMPLETED"}` or a question payload
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        if value.get("status").and_then(Value::as_str) == Some("COMPLETED") {
            return Ok(Self::Completed);
        }

        serde_json::from_value(value).map(Self::Question)
    }
}

/// Raw `answer` response body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResponse {
    #[serde(default)]
    pub status: String,
    pub feedback_audio_url: Option<String>,
    pub feedback_text: Option<String>,
    pub audio_url: Option<String>,
    pub text: Option<String>,
}

/// The service's verdict on a submitted answer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TurnOutcome {
    /// Proceed to the next question, optionally after spoken feedback
    Advance {
        feedback_audio_url: Option<String>,
        feedback_text: Option<String>,
    },
    /// Ask the same question again, optionally rephrased
    Repeat {
        audio_url: Option<String>,
        text: Option<String>,
    },
    Skip,
    /// Any status value outside the known set
    Unknown(String),
}

impl From<AnswerResponse> for TurnOutcome {
    fn from(response: AnswerResponse) -> Self {
        match response.status.as_str() {
            "NEXT" => TurnOutcome::Advance {
                feedback_audio_url: non_empty(response.feedback_audio_url),
                feedback_text: non_empty(response.feedback_text),
            },
            "REPEAT" => TurnOutcome::Repeat {
                audio_url: non_empty(response.audio_url),
                text: non_empty(response.text),
            },
            "SKIPPED" => TurnOutcome::Skip,
            _ => TurnOutcome::Unknown(response.status),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Final summary for a finished session
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    pub total_score: Option<f64>,
    pub candidate_name: Option<String>,
    pub candidate_email: Option<String>,
    pub status: Option<String>,
    pub final_feedback: Option<String>,

    /// Remaining fields, echoed untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
