//! Axum router assembly.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// Mounts the thing surface under `/things` plus a `/health` probe, and
/// wraps everything in a [`TraceLayer`] that logs each HTTP
/// request/response at the `DEBUG` level using the `tracing` ecosystem.
pub fn build(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/things", crate::api::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use wothub_app::bus::NotificationBus;
    use wothub_app::registry::ThingRegistry;
    use wothub_app::thing::{ActionContext, ActionTemplate, Thing};
    use wothub_domain::error::HandlerError;
    use wothub_domain::schema::DataSchema;

    use super::*;

    fn test_state() -> AppState {
        let bus = Arc::new(NotificationBus::new());
        let registry = Arc::new(ThingRegistry::new(bus));
        let lamp = Thing::builder("lamp", "Demo Lamp")
            .property("on", DataSchema::boolean(), json!(false))
            .property(
                "brightness",
                DataSchema::integer().minimum(0.0).maximum(100.0),
                json!(50),
            )
            .property("temperature", DataSchema::number().read_only(), json!(21.0))
            .action(
                "fade",
                ActionTemplate::new(|context: ActionContext| async move {
                    let target = context
                        .input()
                        .and_then(|input| input.get("brightness"))
                        .cloned()
                        .ok_or_else(|| HandlerError::failed("missing brightness"))?;
                    context
                        .thing()
                        .sync_property("brightness", target)
                        .map_err(|error| HandlerError::failed(error.detail()))?;
                    Ok(())
                })
                .input(
                    DataSchema::object()
                        .required("brightness")
                        .property(
                            "brightness",
                            DataSchema::integer().minimum(0.0).maximum(100.0),
                        )
                        .property("duration", DataSchema::integer()),
                ),
            )
            .event("overheated", DataSchema::number())
            .build(Arc::clone(registry.bus()))
            .unwrap();
        registry.add(lamp).unwrap();
        AppState::new(registry)
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = match body {
            Some(json) => Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        };
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn should_return_ok_when_health_check_called() {
        let app = build(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn should_list_thing_descriptions() {
        let app = build(test_state());

        let (status, body) = send(app, "GET", "/things", None).await;

        assert_eq!(status, StatusCode::OK);
        let things = body.as_array().unwrap();
        assert_eq!(things.len(), 1);
        assert_eq!(things[0]["id"], "lamp");
        assert!(things[0]["properties"]["brightness"].is_object());
        assert!(things[0]["actions"]["fade"].is_object());
        assert!(things[0]["events"]["overheated"].is_object());
    }

    #[tokio::test]
    async fn should_return_description_or_not_found() {
        let app = build(test_state());

        let (status, body) = send(app.clone(), "GET", "/things/lamp", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Demo Lamp");
        assert_eq!(
            body["properties"]["brightness"]["links"][0]["href"],
            "/things/lamp/properties/brightness"
        );

        let (status, body) = send(app, "GET", "/things/ghost", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "thing `ghost` not found");
    }

    #[tokio::test]
    async fn should_write_and_read_back_property() {
        let app = build(test_state());

        let (status, body) = send(
            app.clone(),
            "PUT",
            "/things/lamp/properties/brightness",
            Some(json!({"brightness": 25})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"brightness": 25}));

        let (status, body) =
            send(app, "GET", "/things/lamp/properties/brightness", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"brightness": 25}));
    }

    #[tokio::test]
    async fn should_reject_invalid_write_and_keep_stored_value() {
        let app = build(test_state());

        let (status, _) = send(
            app.clone(),
            "PUT",
            "/things/lamp/properties/brightness",
            Some(json!({"brightness": 250})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send(app, "GET", "/things/lamp/properties/brightness", None).await;
        assert_eq!(body, json!({"brightness": 50}));
    }

    #[tokio::test]
    async fn should_reject_write_to_read_only_property() {
        let app = build(test_state());

        let (status, body) = send(
            app,
            "PUT",
            "/things/lamp/properties/temperature",
            Some(json!({"temperature": 30})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "property `temperature` is read-only");
    }

    #[tokio::test]
    async fn should_reject_write_missing_the_addressed_property() {
        let app = build(test_state());

        let (status, _) = send(
            app,
            "PUT",
            "/things/lamp/properties/brightness",
            Some(json!({"on": true})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn should_return_not_found_for_unknown_property() {
        let app = build(test_state());

        let (status, _) = send(app.clone(), "GET", "/things/lamp/properties/ghost", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            app,
            "PUT",
            "/things/lamp/properties/ghost",
            Some(json!({"ghost": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn should_list_all_property_values() {
        let app = build(test_state());

        let (status, body) = send(app, "GET", "/things/lamp/properties", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"brightness": 50, "on": false, "temperature": 21.0})
        );
    }

    async fn wait_for_status(app: &Router, uri: &str, wanted: &str) -> Value {
        for _ in 0..100 {
            let (_, body) = send(app.clone(), "GET", uri, None).await;
            if body["fade"]["status"] == wanted {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("action never reached status {wanted}");
    }

    #[tokio::test]
    async fn should_run_action_lifecycle_over_http() {
        let app = build(test_state());

        let (status, body) = send(
            app.clone(),
            "POST",
            "/things/lamp/actions",
            Some(json!({"fade": {"input": {"brightness": 75, "duration": 100}}})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["fade"]["status"], "created");
        let href = body["fade"]["href"].as_str().unwrap().to_string();

        let completed = wait_for_status(&app, &href, "completed").await;
        assert!(completed["fade"]["timeCompleted"].is_string());

        let (_, body) = send(app.clone(), "GET", "/things/lamp/properties/brightness", None).await;
        assert_eq!(body, json!({"brightness": 75}));

        let (status, _) = send(app.clone(), "DELETE", &href, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(app, "DELETE", &href, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn should_request_action_through_named_endpoint() {
        let app = build(test_state());

        let (status, body) = send(
            app.clone(),
            "POST",
            "/things/lamp/actions/fade",
            Some(json!({"fade": {"input": {"brightness": 10}}})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["fade"]["href"].as_str().unwrap().starts_with("/things/lamp/actions/fade/"));

        let (status, body) = send(app, "GET", "/things/lamp/actions/fade", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_reject_multi_member_action_request() {
        let app = build(test_state());

        let (status, body) = send(
            app,
            "POST",
            "/things/lamp/actions",
            Some(json!({"fade": {}, "blink": {}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "request must contain exactly one member");
    }

    #[tokio::test]
    async fn should_reject_action_request_missing_mandatory_input() {
        let app = build(test_state());

        let (status, _) = send(
            app,
            "POST",
            "/things/lamp/actions",
            Some(json!({"fade": {}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn should_return_not_found_for_unknown_action() {
        let app = build(test_state());

        let (status, _) = send(
            app.clone(),
            "POST",
            "/things/lamp/actions",
            Some(json!({"warp": {}})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            app,
            "GET",
            "/things/lamp/actions/fade/not-a-uuid",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn should_list_event_records() {
        let state = test_state();
        let lamp = state
            .registry
            .get(&wothub_domain::id::ThingId::from("lamp"))
            .unwrap();
        lamp.add_event("overheated", Some(json!(104.5))).unwrap();
        let app = build(state);

        let (status, body) = send(app.clone(), "GET", "/things/lamp/events", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["overheated"]["data"], json!(104.5));
        assert!(body[0]["overheated"]["timestamp"].is_string());

        let (status, body) = send(app.clone(), "GET", "/things/lamp/events/overheated", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, _) = send(app, "GET", "/things/lamp/events/ghost", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
