//! Agent listing and run endpoints

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ApiError, AppState};
use crate::agents::{available_agents, AgentOptions, AgentType};
use crate::model::ModelId;

pub const NO_RESPONSE: &str = "No response generated";

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub message: String,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub model: ModelId,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct RunResponseBody {
    content: String,
}

async fn list_agents() -> Json<Vec<&'static str>> {
    Json(available_agents())
}

async fn run_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    payload: Result<Json<RunRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let agent_type: AgentType = agent_id.parse()?;
    let Json(request) = payload?;
    debug!("RunRequest: {:?}", request);

    if request.message.trim().is_empty() {
        return Err(ApiError::InvalidRequest("message must not be empty".to_string()));
    }

    let options = AgentOptions {
        model_id: Some(request.model.as_str().to_string()),
        user_id: request.user_id,
        session_id: request.session_id,
        debug_mode: None,
    };
    let agent = agent_type.build(state.agents(), options).await?;
    info!(
        "Running {} (model {}, session {}, stream {})",
        agent.agent_id(),
        agent.model_id(),
        agent.session_id(),
        request.stream
    );

    if request.stream {
        let chunks = agent.run_stream(request.message);
        return Ok((
            [(header::CONTENT_TYPE, "text/event-stream")],
            Body::from_stream(chunks),
        )
            .into_response());
    }

    let response = agent.run(&request.message).await?;
    let content = if response.content.is_empty() {
        NO_RESPONSE.to_string()
    } else {
        response.content
    };
    Ok(Json(RunResponseBody { content }).into_response())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/agents", get(list_agents))
        .route("/agents/{agent_id}/runs", post(run_agent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_context;
    use crate::api::router as api_router;
    use crate::model::{ModelTurn, ToolCall};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app(script: Vec<ModelTurn>) -> axum::Router {
        let (context, _) = test_context(script);
        api_router(AppState::new(context))
    }

    fn text(text: &str) -> ModelTurn {
        ModelTurn {
            text: text.to_string(),
            tool_calls: Vec::new(),
        }
    }

    fn post_run(agent_id: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/agents/{}/runs", agent_id))
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json(response: Response) -> Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn list_agents_returns_catalogue() {
        let response = app(Vec::new())
            .oneshot(Request::builder().uri("/agents").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await, json!(["sage", "test_sage"]));
    }

    #[tokio::test]
    async fn health_reports_version() {
        let response = app(Vec::new())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json(response).await;
        assert_eq!(payload["status"], "healthy");
        assert_eq!(payload["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn unknown_agent_is_not_found() {
        let response = app(Vec::new())
            .oneshot(post_run("nonexistent", json!({ "message": "hi" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let payload = read_json(response).await;
        assert!(payload["detail"].as_str().unwrap().contains("Agent not found"));
    }

    #[tokio::test]
    async fn run_returns_agent_content() {
        let response = app(vec![text("TestSage is working")])
            .oneshot(post_run("test_sage", json!({ "message": "Hello!" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            read_json(response).await,
            json!({ "content": "TestSage is working" })
        );
    }

    #[tokio::test]
    async fn empty_content_gets_placeholder() {
        let response = app(Vec::new())
            .oneshot(post_run("sage", json!({ "message": "Hello!" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await["content"], NO_RESPONSE);
    }

    #[tokio::test]
    async fn stream_concatenates_to_buffered_content() {
        let script = vec![
            ModelTurn {
                text: "Checking the news. ".to_string(),
                tool_calls: vec![ToolCall {
                    id: "call-1".to_string(),
                    name: "missing_tool".to_string(),
                    args: json!({}),
                }],
            },
            text("Paris is hosting a summit today."),
        ];

        let buffered = app(script.clone())
            .oneshot(post_run(
                "test_sage",
                json!({ "message": "What's happening in France?" }),
            ))
            .await
            .unwrap();
        let expected = read_json(buffered).await["content"].as_str().unwrap().to_string();

        let streamed = app(script)
            .oneshot(post_run(
                "test_sage",
                json!({ "message": "What's happening in France?", "stream": true }),
            ))
            .await
            .unwrap();

        assert_eq!(streamed.status(), StatusCode::OK);
        assert_eq!(streamed.headers()[header::CONTENT_TYPE], "text/event-stream");
        let body = to_bytes(streamed.into_body(), usize::MAX).await.unwrap();
        assert_eq!(String::from_utf8(body.to_vec()).unwrap(), expected);
        assert_eq!(expected, "Checking the news. Paris is hosting a summit today.");
    }

    #[tokio::test]
    async fn unknown_model_is_rejected() {
        let response = app(Vec::new())
            .oneshot(post_run("sage", json!({ "message": "hi", "model": "claude-2" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(read_json(response).await["detail"].is_string());
    }

    #[tokio::test]
    async fn blank_or_missing_message_is_rejected() {
        let blank = app(Vec::new())
            .oneshot(post_run("sage", json!({ "message": "   " })))
            .await
            .unwrap();
        assert_eq!(blank.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let missing = app(Vec::new())
            .oneshot(post_run("sage", json!({ "stream": true })))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
