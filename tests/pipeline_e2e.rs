use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rubric_harness::evaluate::{self, EvaluationRecord};
use rubric_harness::filter::{self, FilterOutcome};
use rubric_harness::gateway::{OpenAiAdapter, ProviderGateway};
use rubric_harness::{execute, generate, metadata, tally};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn sse_response(content: &str) -> ResponseTemplate {
    let body = format!(
        "data: {}\n\ndata: {}\n\ndata: [DONE]\n\n",
        json!({"choices": [{"delta": {"content": content}}]}),
        json!({"choices": [{"delta": {}, "finish_reason": "stop"}]}),
    );
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

/// Replays a fixed sequence of responses, one per call.
#[derive(Clone)]
struct ScriptedResponder {
    calls: Arc<AtomicUsize>,
    responses: Arc<Vec<ResponseTemplate>>,
}

impl ScriptedResponder {
    fn new(responses: Vec<ResponseTemplate>) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            responses: Arc::new(responses),
        }
    }
}

impl Respond for ScriptedResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses[n.min(self.responses.len() - 1)].clone()
    }
}

fn gateway(server: &MockServer) -> ProviderGateway<OpenAiAdapter> {
    let adapter =
        OpenAiAdapter::with_config("sk-test", server.uri(), Duration::from_secs(5)).unwrap();
    ProviderGateway::new(adapter)
}

#[tokio::test]
async fn pipeline_runs_end_to_end() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let topics_path = dir.path().join("topics.txt");
    let prompts_path = dir.path().join("prompts.json");
    let filtered_path = dir.path().join("prompts_filtered.json");
    let metadata_path = dir.path().join("metadata.csv");
    let transcript_path = dir.path().join("transcript.txt");
    let evaluation_path = dir.path().join("evaluation.json");
    let scores_path = dir.path().join("scores.csv");

    std::fs::write(&topics_path, "naloxone distribution\n").unwrap();
    std::fs::write(
        &metadata_path,
        "newMeasureID,measureName\nOD-7,Naloxone kits distributed\n",
    )
    .unwrap();

    let generation_reply = concat!(
        "<think>brainstorming</think>\n",
        "```json\n",
        r#"{"prompt_1": "Which measures track naloxone distribution?", "#,
        r#""prompt_2": "Is naloxone data broken down by county?", "#,
        r#""prompt_3": "How current is the naloxone data?"}"#,
        "\n```",
    );
    let filter_reply = concat!(
        "```json\n",
        r#"[{"topic": "naloxone distribution", "prompt": "Which measures track naloxone distribution?"}]"#,
        "\n```",
    );
    let assistant_reply =
        "<think>scanning the catalog</think>\nMeasure OD-7 tracks naloxone kits distributed.";
    let judge_items = json!([
        {"question": "1", "answer": "yes", "justification": ""},
        {"question": "2", "answer": "yes", "justification": ""},
        {"question": "3", "answer": "no", "justification": "cites no measure ID"},
        {"question": "4", "answer": "yes", "justification": ""},
    ]);
    let judge_reply = format!("<think>judging</think>\n```json\n{judge_items}\n```");

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ScriptedResponder::new(vec![
            sse_response(generation_reply),
            sse_response(filter_reply),
            sse_response(assistant_reply),
            sse_response(&judge_reply),
        ]))
        .mount(&server)
        .await;

    let gateway = gateway(&server);
    let model = "DeepSeek-R1";

    let records = generate::generate_prompts(&gateway, model, &topics_path, &prompts_path)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].is_failed());

    let outcome = filter::filter_prompts(&gateway, model, &prompts_path, &filtered_path)
        .await
        .unwrap();
    assert_eq!(outcome, FilterOutcome::Written { records: 1 });

    let metadata_json = metadata::load_metadata_json(&metadata_path).unwrap();
    assert!(metadata_json.contains("OD-7"));

    let entries = execute::run_prompts(
        &gateway,
        model,
        &filtered_path,
        &transcript_path,
        &metadata_json,
    )
    .await
    .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].prompt, "Which measures track naloxone distribution?");
    assert_eq!(
        entries[0].response,
        "Measure OD-7 tracks naloxone kits distributed."
    );

    let transcript = std::fs::read_to_string(&transcript_path).unwrap();
    assert!(transcript.starts_with("PROMPT:\n"));
    assert!(transcript.contains("RESPONSE:\n"));
    assert!(transcript.contains(&"=".repeat(40)));

    let evaluations = evaluate::evaluate_prompts(
        &gateway,
        model,
        &transcript_path,
        &evaluation_path,
        &metadata_json,
    )
    .await
    .unwrap();
    assert_eq!(evaluations.len(), 1);
    match &evaluations[0] {
        EvaluationRecord::Evaluated { evaluation, .. } => {
            assert_eq!(evaluation.len(), 4);
            assert_eq!(evaluation[2].answer, "no");
        }
        other => panic!("expected Evaluated, got {other:?}"),
    }

    let summary = tally::tally_results(&evaluation_path, Some(&scores_path)).unwrap();
    assert_eq!(summary.scores, [1.0, 1.0, 0.0, 1.0]);

    let scores = std::fs::read_to_string(&scores_path).unwrap();
    assert!(scores.starts_with("prompt,q1,q2,q3,q4"));

    // Each stage made exactly one call, all with the metadata attached
    // where it should be.
    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 4);
    let assistant_body: serde_json::Value = serde_json::from_slice(&received[2].body).unwrap();
    let user_content = assistant_body["messages"][1]["content"].as_str().unwrap();
    assert!(user_content.contains("[file content begin]"));
    assert!(user_content.contains("OD-7"));
}

#[tokio::test]
async fn unusable_filter_reply_leaves_output_untouched() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let prompts_path = dir.path().join("prompts.json");
    let filtered_path = dir.path().join("prompts_filtered.json");
    std::fs::write(
        &prompts_path,
        r#"[{"topic": "EMS", "prompt_1": "a", "prompt_2": "b", "prompt_3": "c"}]"#,
    )
    .unwrap();

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(sse_response("I would rather not produce a fenced array."))
        .mount(&server)
        .await;

    let outcome = filter::filter_prompts(&gateway(&server), "DeepSeek-R1", &prompts_path, &filtered_path)
        .await
        .unwrap();
    assert_eq!(outcome, FilterOutcome::LeftUntouched);
    assert!(!filtered_path.exists());
}

#[tokio::test]
async fn failed_assistant_call_stores_error_message_in_transcript() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let filtered_path = dir.path().join("prompts_filtered.json");
    let transcript_path = dir.path().join("transcript.txt");
    std::fs::write(
        &filtered_path,
        r#"[{"topic": "EMS", "prompt": "EMS data?"}]"#,
    )
    .unwrap();

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "message": "upstream unavailable", "code": "internal" }
        })))
        .mount(&server)
        .await;

    let entries = execute::run_prompts(
        &gateway(&server),
        "DeepSeek-R1",
        &filtered_path,
        &transcript_path,
        "{}",
    )
    .await
    .unwrap();

    assert_eq!(entries.len(), 1);
    assert!(entries[0].response.contains("upstream unavailable"));

    let transcript = std::fs::read_to_string(&transcript_path).unwrap();
    assert!(transcript.contains("upstream unavailable"));
}
