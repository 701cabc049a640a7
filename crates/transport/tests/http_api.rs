//! REST client tests against a mocked platform.

use std::time::Duration;

use agora_core::model::TaskStatus;
use agora_core::topic::{InnovationDraft, NewTask};
use agora_core::{AgentProfile, RegistrationError, TransportError};
use agora_transport::PlatformClient;
use mockito::{Matcher, Server};
use serde_json::json;

fn client(server: &Server) -> PlatformClient {
    PlatformClient::new(server.url(), Duration::from_secs(5)).unwrap()
}

// ── Agents ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_posts_profile_and_returns_agent() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/agents/register")
        .match_body(Matcher::PartialJson(json!({
            "name": "A",
            "capabilities": ["x"]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":1,"name":"A","capabilities":["x"],"status":"online"}"#)
        .create_async()
        .await;

    let agent = client(&server)
        .register_agent(&AgentProfile::new("A").with_capabilities(["x"]))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(agent.id, 1);
    assert_eq!(agent.capabilities, vec!["x"]);
}

#[tokio::test]
async fn register_rejection_is_typed() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/agents/register")
        .with_status(400)
        .with_body(r#"{"error":"Agent name is required"}"#)
        .create_async()
        .await;

    let err = client(&server)
        .register_agent(&AgentProfile::new(""))
        .await
        .unwrap_err();

    match err {
        RegistrationError::Rejected { status_code, body } => {
            assert_eq!(status_code, 400);
            assert!(body.contains("name is required"));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn list_online_agents_uses_online_path() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/agents/online")
        .with_status(200)
        .with_body(r#"[{"id":1,"name":"A","capabilities":null},{"id":2,"name":"B"}]"#)
        .create_async()
        .await;

    let agents = client(&server).list_online_agents().await.unwrap();

    mock.assert_async().await;
    assert_eq!(agents.len(), 2);
    assert!(agents[0].capabilities.is_empty());
}

// ── Tasks ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_task_sends_camel_case_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/tasks")
        .match_body(Matcher::Json(json!({
            "title": "Analyze logs",
            "description": "find errors",
            "creatorAgentId": 1,
            "priority": 3
        })))
        .with_status(201)
        .with_body(
            r#"{"id":42,"title":"Analyze logs","description":"find errors",
                "creator_agent_id":1,"priority":3,"status":"pending"}"#,
        )
        .create_async()
        .await;

    let task = client(&server)
        .create_task(&NewTask {
            title: "Analyze logs".into(),
            description: "find errors".into(),
            creator_agent_id: Some(1),
            priority: 3,
        })
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(task.id, 42);
    assert_eq!(task.status, TaskStatus::Pending);
}

#[tokio::test]
async fn list_tasks_reads_every_status() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/tasks")
        .with_status(200)
        .with_body(
            r#"[{"id":1,"title":"a","status":"pending"},
                {"id":2,"title":"b","status":"in_progress","assigned_agent_id":3},
                {"id":3,"title":"c","status":"cancelled","created_at":"2024-05-01T10:00:00Z"}]"#,
        )
        .create_async()
        .await;

    let tasks = client(&server).list_tasks().await.unwrap();

    mock.assert_async().await;
    let statuses: Vec<_> = tasks.iter().map(|t| t.status).collect();
    assert_eq!(
        statuses,
        vec![TaskStatus::Pending, TaskStatus::Claimed, TaskStatus::Cancelled]
    );
    assert_eq!(tasks[1].assigned_agent_id, Some(3));
    assert!(tasks[2].created_at.is_some());
}

#[tokio::test]
async fn assign_conflict_surfaces_request_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/tasks/42/assign")
        .match_body(Matcher::Json(json!({"agentId": 2})))
        .with_status(400)
        .with_body(r#"{"error":"Task is not available for assignment"}"#)
        .create_async()
        .await;

    let err = client(&server).assign_task(42, 2).await.unwrap_err();

    assert_eq!(err.status_code(), Some(400));
    assert!(err.to_string().contains("not available"));
}

#[tokio::test]
async fn assign_reads_in_progress_as_claimed() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/tasks/42/assign")
        .with_status(200)
        .with_body(r#"{"id":42,"title":"t","status":"in_progress","assigned_agent_id":1}"#)
        .create_async()
        .await;

    let task = client(&server).assign_task(42, 1).await.unwrap();
    assert_eq!(task.status, TaskStatus::Claimed);
    assert_eq!(task.assigned_agent_id, Some(1));
}

#[tokio::test]
async fn complete_task_posts_result() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/tasks/42/complete")
        .match_body(Matcher::Json(json!({"result": "done"})))
        .with_status(200)
        .with_body(r#"{"id":42,"title":"t","status":"completed","result":"done"}"#)
        .create_async()
        .await;

    let task = client(&server).complete_task(42, Some("done")).await.unwrap();

    mock.assert_async().await;
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.result.as_deref(), Some("done"));
}

#[tokio::test]
async fn malformed_body_is_decode_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/tasks/pending")
        .with_status(200)
        .with_body("not json")
        .create_async()
        .await;

    let err = client(&server).list_pending_tasks().await.unwrap_err();
    assert!(matches!(err, TransportError::Decode(_)));
}

// ── Discussions and innovations ─────────────────────────────────────────

#[tokio::test]
async fn list_discussions_reads_topics() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/discussions")
        .with_status(200)
        .with_body(r#"[{"id":4,"topic":"Roadmap","status":"active","message_count":12}]"#)
        .create_async()
        .await;

    let discussions = client(&server).list_discussions().await.unwrap();

    mock.assert_async().await;
    assert_eq!(discussions.len(), 1);
    assert_eq!(discussions[0].topic, "Roadmap");
    assert_eq!(discussions[0].message_count, Some(12));
}

#[tokio::test]
async fn list_innovations_keeps_score_and_output() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/innovations")
        .with_status(200)
        .with_body(
            r#"[{"id":7,"title":"Planner","description":null,"agents_involved":[1,2],
                 "output_data":{"speedup":3},"wow_score":88,"creator_name":"A"}]"#,
        )
        .create_async()
        .await;

    let innovations = client(&server).list_innovations().await.unwrap();

    mock.assert_async().await;
    let planner = &innovations[0];
    assert_eq!(planner.agents_involved, vec![1, 2]);
    assert_eq!(planner.output_data["speedup"], 3);
    assert_eq!(planner.wow_score, 88);
    assert!(planner.description.is_empty());
}

#[tokio::test]
async fn list_failure_surfaces_status() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/innovations")
        .with_status(503)
        .with_body("maintenance")
        .create_async()
        .await;

    let err = client(&server).list_innovations().await.unwrap_err();

    assert!(matches!(
        err,
        TransportError::Request { status_code: 503, ref body } if body == "maintenance"
    ));
}

#[tokio::test]
async fn list_messages_passes_limit() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/discussions/5/messages")
        .match_query(Matcher::UrlEncoded("limit".into(), "10".into()))
        .with_status(200)
        .with_body(
            r#"[{"id":1,"discussion_id":5,"agent_id":2,"agent_name":"B","content":"hi"}]"#,
        )
        .create_async()
        .await;

    let messages = client(&server).list_messages(5, 10).await.unwrap();

    mock.assert_async().await;
    assert_eq!(messages[0].agent_name, "B");
}

#[tokio::test]
async fn post_message_sends_agent_and_content() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/discussions/5/messages")
        .match_body(Matcher::Json(json!({"agentId": 1, "content": "hello"})))
        .with_status(201)
        .with_body(r#"{"id":9,"discussion_id":5,"agent_id":1,"content":"hello"}"#)
        .create_async()
        .await;

    let message = client(&server).post_message(5, 1, "hello").await.unwrap();

    mock.assert_async().await;
    assert_eq!(message.id, Some(9));
}

#[tokio::test]
async fn upvote_uses_put() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("PUT", "/api/innovations/3/vote")
        .with_status(200)
        .with_body(
            r#"{"id":3,"title":"Idea","agents_involved":[1,2],"output_data":{"k":"v"},"wow_score":4}"#,
        )
        .create_async()
        .await;

    let innovation = client(&server).upvote_innovation(3).await.unwrap();

    mock.assert_async().await;
    assert_eq!(innovation.wow_score, 4);
    assert_eq!(innovation.agents_involved, vec![1, 2]);
}

#[tokio::test]
async fn create_innovation_sends_draft() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/innovations")
        .match_body(Matcher::PartialJson(json!({
            "title": "Idea",
            "agentsInvolved": [1],
            "outputData": {"score": 7}
        })))
        .with_status(201)
        .with_body(r#"{"id":3,"title":"Idea","agents_involved":[1],"output_data":{"score":7}}"#)
        .create_async()
        .await;

    let mut draft = InnovationDraft {
        title: "Idea".into(),
        agents_involved: vec![1],
        ..Default::default()
    };
    draft.output_data.insert("score".into(), json!(7));

    let innovation = client(&server).create_innovation(&draft).await.unwrap();

    mock.assert_async().await;
    assert_eq!(innovation.id, 3);
}
