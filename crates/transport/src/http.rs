//! Request/response calls against the platform's REST API.
//!
//! Each method maps one-to-one to an endpoint under `/api`. Non-success
//! responses surface as [`TransportError::Request`] with the status code and
//! raw body; nothing here retries.

use std::time::Duration;

use agora_core::model::{Agent, Discussion, EntityId, Innovation, Message, Task};
use agora_core::topic::{
    AssignRequest, CompleteRequest, InnovationDraft, NewDiscussion, NewMessage, NewTask,
};
use agora_core::{AgentProfile, RegistrationError, TransportError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// REST client for one platform instance.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    api_url: String,
    client: reqwest::Client,
}

impl PlatformClient {
    /// Create a client for the platform at `base_url` (e.g. `http://localhost:3000`).
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            api_url: format!("{}/api", base_url.as_ref().trim_end_matches('/')),
            client,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, TransportError> {
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Platform returned error");
            return Err(TransportError::Request {
                status_code: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, TransportError> {
        debug!(path, "GET");
        self.send(self.client.get(self.url(path))).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, TransportError> {
        debug!(path, "POST");
        self.send(self.client.post(self.url(path)).json(body)).await
    }

    // --- Agents ---

    pub async fn register_agent(&self, profile: &AgentProfile) -> Result<Agent, RegistrationError> {
        self.post("/agents/register", &profile.join_payload())
            .await
            .map_err(RegistrationError::from)
    }

    pub async fn list_agents(&self) -> Result<Vec<Agent>, TransportError> {
        self.get("/agents").await
    }

    pub async fn list_online_agents(&self) -> Result<Vec<Agent>, TransportError> {
        self.get("/agents/online").await
    }

    // --- Tasks ---

    pub async fn create_task(&self, task: &NewTask) -> Result<Task, TransportError> {
        self.post("/tasks", task).await
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>, TransportError> {
        self.get("/tasks").await
    }

    /// Pending tasks, highest priority first (platform ordering).
    pub async fn list_pending_tasks(&self) -> Result<Vec<Task>, TransportError> {
        self.get("/tasks/pending").await
    }

    pub async fn get_task(&self, task_id: EntityId) -> Result<Task, TransportError> {
        self.get(&format!("/tasks/{task_id}")).await
    }

    pub async fn assign_task(
        &self,
        task_id: EntityId,
        agent_id: EntityId,
    ) -> Result<Task, TransportError> {
        self.post(&format!("/tasks/{task_id}/assign"), &AssignRequest { agent_id })
            .await
    }

    pub async fn complete_task(
        &self,
        task_id: EntityId,
        result: Option<&str>,
    ) -> Result<Task, TransportError> {
        let body = CompleteRequest {
            result: result.map(String::from),
        };
        self.post(&format!("/tasks/{task_id}/complete"), &body).await
    }

    // --- Discussions ---

    pub async fn create_discussion(&self, topic: &str) -> Result<Discussion, TransportError> {
        let body = NewDiscussion {
            topic: topic.to_string(),
        };
        self.post("/discussions", &body).await
    }

    pub async fn list_discussions(&self) -> Result<Vec<Discussion>, TransportError> {
        self.get("/discussions").await
    }

    pub async fn post_message(
        &self,
        discussion_id: EntityId,
        agent_id: EntityId,
        content: &str,
    ) -> Result<Message, TransportError> {
        let body = NewMessage {
            agent_id,
            content: content.to_string(),
        };
        self.post(&format!("/discussions/{discussion_id}/messages"), &body)
            .await
    }

    /// The most recent `limit` messages, oldest first.
    pub async fn list_messages(
        &self,
        discussion_id: EntityId,
        limit: usize,
    ) -> Result<Vec<Message>, TransportError> {
        let url = self.url(&format!("/discussions/{discussion_id}/messages"));
        self.send(self.client.get(url).query(&[("limit", limit)]))
            .await
    }

    // --- Innovations ---

    pub async fn create_innovation(
        &self,
        draft: &InnovationDraft,
    ) -> Result<Innovation, TransportError> {
        self.post("/innovations", draft).await
    }

    pub async fn list_innovations(&self) -> Result<Vec<Innovation>, TransportError> {
        self.get("/innovations").await
    }

    pub async fn upvote_innovation(
        &self,
        innovation_id: EntityId,
    ) -> Result<Innovation, TransportError> {
        let url = self.url(&format!("/innovations/{innovation_id}/vote"));
        self.send(self.client.put(url)).await
    }
}
