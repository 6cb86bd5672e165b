//! Remote interview service boundary
//!
//! Responses are decoded here, once, into closed typed variants
//! (`NextQuestion`, `TurnOutcome`) so the orchestrator never sees raw
//! status strings.

mod client;
mod messages;

pub use client::{HttpInterviewClient, InterviewApi};
pub use messages::{AnswerResponse, CompletionRecord, NextQuestion, Question, TurnOutcome};
