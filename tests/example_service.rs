//! A small prediction service wired through the registration table, driven
//! from every transport.

use std::sync::Arc;

use async_trait::async_trait;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use infer_adapters::transport::{HttpRequest, LambdaEvent};
use infer_adapters::{
    BatchPolicy, DataframeInput, HandlerError, InferenceService, InferenceTask, InputAdapter,
    PredictHandler, StructuredBatch,
};

/// Scores rows with a fixed linear model.
struct LinearModel {
    weights: Vec<(String, f64)>,
}

#[async_trait]
impl PredictHandler for LinearModel {
    async fn predict(&self, batch: StructuredBatch) -> Result<Vec<Value>, HandlerError> {
        batch
            .rows()
            .iter()
            .map(|row| {
                let mut score = 0.0;
                for (column, weight) in &self.weights {
                    let value = row
                        .get(column)
                        .and_then(Value::as_f64)
                        .ok_or_else(|| HandlerError::new(format!("'{column}' is not numeric")))?;
                    score += value * weight;
                }
                Ok(json!(score))
            })
            .collect()
    }
}

fn service() -> InferenceService {
    let adapter = DataframeInput::builder()
        .columns(["sepal", "petal"])
        .dtype([("sepal", "float32"), ("petal", "float32")].into_iter().collect())
        .build()
        .unwrap();
    let model = LinearModel {
        weights: vec![("sepal".to_string(), 1.0), ("petal".to_string(), 10.0)],
    };
    InferenceService::builder("iris")
        .endpoint_with_policy(
            "predict",
            adapter,
            model,
            BatchPolicy::default().with_max_batch_size(3).with_max_latency_ms(50),
            Some("Scores flowers".to_string()),
        )
        .build()
        .unwrap()
}

#[tokio::test]
async fn batched_requests_get_their_own_outputs() {
    let service = service();
    let tasks = vec![
        InferenceTask::from_json(r#"[{"sepal": 1, "petal": 0.5}, {"sepal": 2, "petal": 0}]"#),
        InferenceTask::from_csv("petal,sepal\n1,3\n"),
        InferenceTask::from_json(r#"[{"sepal": 1}]"#),
        InferenceTask::from_json(r#"{"sepal": {"r": 4}, "petal": {"r": 0.1}}"#),
    ];
    let ids: Vec<String> = tasks.iter().map(|t| t.id().to_string()).collect();

    let responses = service.handle_batch("predict", tasks).await.unwrap();

    assert_eq!(
        responses.iter().map(|r| r.task_id.clone()).collect::<Vec<_>>(),
        ids
    );
    assert_eq!(responses[0].body, json!([6.0, 2.0]));
    assert_eq!(responses[1].body, json!([13.0]));
    assert_eq!(responses[2].status, 400);
    assert_eq!(responses[3].status, 200);
    assert_eq!(responses[3].body.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn one_failed_group_does_not_affect_the_next() {
    let service = service();
    let mut tasks: Vec<InferenceTask> = (0..3).map(|_| InferenceTask::from_json("oops")).collect();
    tasks.push(InferenceTask::from_json(r#"[{"sepal": 1, "petal": 1}]"#));

    let responses = service.handle_batch("predict", tasks).await.unwrap();

    assert!(responses[..3].iter().all(|r| r.status == 400));
    assert_eq!(responses[3].body, json!([11.0]));
}

#[tokio::test]
async fn transports_reach_the_model() {
    let service = service();

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/csv"));
    let response = service
        .handle_http("predict", HttpRequest::new(headers, "sepal,petal\n0,1\n"))
        .await
        .unwrap();
    assert_eq!(response.body, json!([10.0]));

    let event: LambdaEvent = serde_json::from_value(json!({
        "headers": {"Content-Type": "text/csv"},
        "body": "sepal,petal\n1,1\n",
    }))
    .unwrap();
    let response = service.handle_lambda("predict", event).await.unwrap();
    assert_eq!(response.body, json!([11.0]));

    let args = vec![
        "--input".to_string(),
        r#"[{"sepal": 2, "petal": 2}]"#.to_string(),
        "not json".to_string(),
    ];
    let responses = service.handle_cli("predict", &args).await.unwrap();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0].body, json!([22.0]));
    assert_eq!(responses[1].status, 400);
}

#[tokio::test]
async fn shared_adapter_serves_concurrent_groups() {
    let adapter: Arc<dyn InputAdapter> = Arc::new(DataframeInput::builder().build().unwrap());
    let model: Arc<dyn PredictHandler> = Arc::new(LinearModel {
        weights: vec![("x".to_string(), 2.0)],
    });
    let service = Arc::new(
        InferenceService::builder("shared")
            .endpoint_arc("a", adapter.clone(), model.clone(), BatchPolicy::default(), None)
            .endpoint_arc("b", adapter, model, BatchPolicy::default(), None)
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                let endpoint = if i % 2 == 0 { "a" } else { "b" };
                let task = InferenceTask::from_json(format!(r#"[{{"x": {i}}}]"#));
                service.handle_batch(endpoint, vec![task]).await
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let responses = handle.await.unwrap().unwrap();
        assert_eq!(responses[0].body, json!([2.0 * i as f64]));
    }
}

#[test]
fn metadata_describes_endpoints() {
    let meta = service().metadata();
    let endpoint = &meta["endpoints"][0];
    assert_eq!(endpoint["name"], "predict");
    assert_eq!(endpoint["mb_max_batch_size"], 3);
    assert_eq!(endpoint["mb_max_latency"], 50);
    assert_eq!(
        endpoint["request_schema"]["application/json"]["schema"]["properties"]["petal"]["items"]
            ["type"],
        "number"
    );
}
