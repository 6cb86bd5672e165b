// Integration tests for the interview service client
//
// A wiremock server stands in for the interview service.

use anyhow::Result;
use loqa_interview::audio::AnswerRecording;
use loqa_interview::{
    HttpInterviewClient, InterviewApi, InterviewError, NextQuestion, SessionId, TurnOutcome,
};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup() -> Result<(MockServer, HttpInterviewClient, SessionId)> {
    let server = MockServer::start().await;
    let client = HttpInterviewClient::new(&format!("{}/api", server.uri()), None)?;
    Ok((server, client, SessionId::new("abc-123")))
}

fn answer() -> AnswerRecording {
    AnswerRecording::wav(b"RIFF....WAVEfmt ".to_vec(), 2300)
}

#[tokio::test]
async fn test_next_question() -> Result<()> {
    let (server, client, session) = setup().await?;

    Mock::given(method("GET"))
        .and(path("/api/interview/abc-123/next-question"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 12,
            "question": "What does the borrow checker guarantee?",
            "level": "Medium",
            "category": "rust"
        })))
        .expect(1)
        .mount(&server)
        .await;

    match client.next_question(&session).await? {
        NextQuestion::Question(question) => {
            assert_eq!(question.id, 12);
            assert_eq!(question.text, "What does the borrow checker guarantee?");
            assert_eq!(question.level, "Medium");
            assert_eq!(question.category.as_deref(), Some("rust"));
        }
        NextQuestion::Completed => panic!("expected a question"),
    }

    Ok(())
}

#[tokio::test]
async fn test_next_question_completed() -> Result<()> {
    let (server, client, session) = setup().await?;

    Mock::given(method("GET"))
        .and(path("/api/interview/abc-123/next-question"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "COMPLETED" })))
        .mount(&server)
        .await;

    assert_eq!(client.next_question(&session).await?, NextQuestion::Completed);

    Ok(())
}

#[tokio::test]
async fn test_next_question_server_error() -> Result<()> {
    let (server, client, session) = setup().await?;

    Mock::given(method("GET"))
        .and(path("/api/interview/abc-123/next-question"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client.next_question(&session).await.unwrap_err();
    assert!(matches!(
        err,
        InterviewError::Network { operation: "next-question", .. }
    ));

    Ok(())
}

#[tokio::test]
async fn test_next_question_malformed_body() -> Result<()> {
    let (server, client, session) = setup().await?;

    Mock::given(method("GET"))
        .and(path("/api/interview/abc-123/next-question"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unexpected": true })))
        .mount(&server)
        .await;

    let err = client.next_question(&session).await.unwrap_err();
    assert!(matches!(err, InterviewError::Protocol { .. }));

    Ok(())
}

#[tokio::test]
async fn test_submit_answer_uploads_multipart_audio() -> Result<()> {
    let (server, client, session) = setup().await?;

    Mock::given(method("POST"))
        .and(path("/api/interview/abc-123/answer"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .and(body_string_contains("name=\"audio\""))
        .and(body_string_contains("filename=\"answer.wav\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "NEXT",
            "feedbackAudioUrl": "/audio/feedback-12.mp3",
            "feedbackText": "Clear and concise."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client.submit_answer(&session, answer()).await?;

    assert_eq!(
        outcome,
        TurnOutcome::Advance {
            feedback_audio_url: Some("/audio/feedback-12.mp3".to_string()),
            feedback_text: Some("Clear and concise.".to_string()),
        }
    );

    Ok(())
}

#[tokio::test]
async fn test_submit_answer_outcomes() -> Result<()> {
    let cases = [
        (
            json!({ "status": "REPEAT", "audioUrl": "/audio/rephrase.mp3", "text": "Put differently..." }),
            TurnOutcome::Repeat {
                audio_url: Some("/audio/rephrase.mp3".to_string()),
                text: Some("Put differently...".to_string()),
            },
        ),
        (
            json!({ "status": "REPEAT", "audioUrl": "" }),
            TurnOutcome::Repeat {
                audio_url: None,
                text: None,
            },
        ),
        (json!({ "status": "SKIPPED" }), TurnOutcome::Skip),
        (
            json!({ "status": "NEXT", "feedbackAudioUrl": null }),
            TurnOutcome::Advance {
                feedback_audio_url: None,
                feedback_text: None,
            },
        ),
        (
            json!({ "status": "EVALUATING" }),
            TurnOutcome::Unknown("EVALUATING".to_string()),
        ),
    ];

    for (body, expected) in cases {
        let (server, client, session) = setup().await?;

        Mock::given(method("POST"))
            .and(path("/api/interview/abc-123/answer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        assert_eq!(client.submit_answer(&session, answer()).await?, expected);
    }

    Ok(())
}

#[tokio::test]
async fn test_submit_answer_rejected() -> Result<()> {
    let (server, client, session) = setup().await?;

    Mock::given(method("POST"))
        .and(path("/api/interview/abc-123/answer"))
        .respond_with(ResponseTemplate::new(413))
        .mount(&server)
        .await;

    let err = client.submit_answer(&session, answer()).await.unwrap_err();
    assert!(matches!(err, InterviewError::Network { operation: "answer", .. }));

    Ok(())
}

#[tokio::test]
async fn test_end_session() -> Result<()> {
    let (server, client, session) = setup().await?;

    Mock::given(method("POST"))
        .and(path("/api/interview/abc-123/end"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client.end_session(&session).await?;

    Ok(())
}

#[tokio::test]
async fn test_end_session_failure() -> Result<()> {
    let (server, client, session) = setup().await?;

    Mock::given(method("POST"))
        .and(path("/api/interview/abc-123/end"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    assert!(client.end_session(&session).await.is_err());

    Ok(())
}

#[tokio::test]
async fn test_fetch_result_keeps_unknown_fields() -> Result<()> {
    let (server, client, session) = setup().await?;

    Mock::given(method("GET"))
        .and(path("/api/interview/abc-123/result"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalScore": 8.25,
            "candidateName": "Sam Lee",
            "candidateEmail": "sam@example.com",
            "status": "COMPLETED",
            "finalFeedback": "Strong fundamentals.",
            "questionsAnswered": 6
        })))
        .mount(&server)
        .await;

    let record = client.fetch_result(&session).await?;

    assert_eq!(record.total_score, Some(8.25));
    assert_eq!(record.candidate_name.as_deref(), Some("Sam Lee"));
    assert_eq!(record.candidate_email.as_deref(), Some("sam@example.com"));
    assert_eq!(record.status.as_deref(), Some("COMPLETED"));
    assert_eq!(record.final_feedback.as_deref(), Some("Strong fundamentals."));
    assert_eq!(record.extra.get("questionsAnswered"), Some(&json!(6)));

    Ok(())
}

#[tokio::test]
async fn test_question_audio_url_defeats_caching() -> Result<()> {
    let client = HttpInterviewClient::new("http://localhost:8080/api", None)?;
    let session = SessionId::new("abc-123");

    let url = client.question_audio_url(&session);

    assert!(url.starts_with("http://localhost:8080/api/interview/abc-123/question-audio?nocache="));
    let stamp = url.rsplit('=').next().unwrap_or_default();
    assert!(stamp.parse::<i64>().is_ok(), "nocache should be a timestamp: {}", url);

    Ok(())
}

#[tokio::test]
async fn test_session_id_is_percent_encoded() -> Result<()> {
    let (server, client, _) = setup().await?;
    let session = SessionId::new("cohort/7?x#y");

    Mock::given(method("GET"))
        .and(path("/api/interview/cohort%2F7%3Fx%23y/next-question"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "COMPLETED" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/interview/cohort%2F7%3Fx%23y/end"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(client.next_question(&session).await?, NextQuestion::Completed);
    client.end_session(&session).await?;

    let audio = client.question_audio_url(&session);
    assert!(
        audio.contains("/api/interview/cohort%2F7%3Fx%23y/question-audio?nocache="),
        "unexpected audio url: {}",
        audio
    );

    Ok(())
}

#[tokio::test]
async fn test_endpoint_from_bare_host() -> Result<()> {
    let client = HttpInterviewClient::new("http://localhost:8080", None)?;

    let url = client.question_audio_url(&SessionId::new("abc-123"));

    assert!(url.starts_with("http://localhost:8080/interview/abc-123/question-audio?nocache="));
    assert!(HttpInterviewClient::new("mailto:ops@example.com", None).is_err());

    Ok(())
}

#[tokio::test]
async fn test_resolve_audio_url() -> Result<()> {
    let client = HttpInterviewClient::new("http://localhost:8080/api/", None)?;

    assert_eq!(
        client.resolve_audio_url("/audio/feedback-3.mp3"),
        "http://localhost:8080/audio/feedback-3.mp3"
    );
    assert_eq!(
        client.resolve_audio_url("https://cdn.example.com/q/3.mp3"),
        "https://cdn.example.com/q/3.mp3"
    );

    Ok(())
}
