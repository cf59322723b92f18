use crate::workflow::config::{InferenceSettings, PLACEHOLDER_API_KEY, PLACEHOLDER_MODEL};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use doorcore::interface::{BoundingBox, InferenceEngine, ProcessedImage, RawDetection};
use doorcore::prelude::InferenceError;
use log::{debug, info};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Deserialize)]
struct HostedPrediction {
    class: String,
    confidence: f32,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    width: f32,
    #[serde(default)]
    height: f32,
}

#[derive(Debug, Deserialize)]
struct HostedResponse {
    #[serde(default)]
    predictions: Vec<HostedPrediction>,
}

/// Decodes a hosted-model response body into detections, in response order.
pub fn parse_predictions(body: &str) -> Result<Vec<RawDetection>, InferenceError> {
    let response: HostedResponse = serde_json::from_str(body)
        .map_err(|err| InferenceError::Failed(format!("malformed response: {}", err)))?;
    Ok(response
        .predictions
        .into_iter()
        .map(|p| {
            RawDetection::new(p.class, p.confidence).with_bbox(BoundingBox {
                x: p.x,
                y: p.y,
                width: p.width,
                height: p.height,
            })
        })
        .collect())
}

fn percent(fraction: f32) -> u32 {
    (fraction.clamp(0.0, 1.0) * 100.0).round() as u32
}

/// Object-detection client for a hosted model endpoint.
///
/// Each call posts the base64 JPEG to `{api_url}/{model}/{version}`.
pub struct HostedDetector {
    client: reqwest::Client,
    settings: InferenceSettings,
    ready: AtomicBool,
}

impl HostedDetector {
    pub fn new(settings: InferenceSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
            ready: AtomicBool::new(false),
        }
    }

    fn model_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.settings.api_url.trim_end_matches('/'),
            self.settings.model,
            self.settings.version
        )
    }

    fn check_configured(&self) -> Result<(), InferenceError> {
        let key = self.settings.api_key.trim();
        if key.is_empty() || key == PLACEHOLDER_API_KEY {
            return Err(InferenceError::NotConfigured("API key".into()));
        }
        let model = self.settings.model.trim();
        if model.is_empty() || model == PLACEHOLDER_MODEL {
            return Err(InferenceError::NotConfigured("model name".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl InferenceEngine for HostedDetector {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn load(&self) -> Result<(), InferenceError> {
        self.ready.store(false, Ordering::SeqCst);
        self.check_configured()?;
        info!(
            "using hosted model {} v{}",
            self.settings.model, self.settings.version
        );
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn detect(&self, image: &ProcessedImage) -> Result<Vec<RawDetection>, InferenceError> {
        if !self.is_ready() {
            return Err(InferenceError::ModelNotReady);
        }
        let body = STANDARD.encode(image.bytes());
        let response = self
            .client
            .post(self.model_url())
            .query(&[
                ("api_key", self.settings.api_key.clone()),
                ("confidence", percent(self.settings.confidence_threshold).to_string()),
                ("overlap", percent(self.settings.overlap_threshold).to_string()),
                ("max_detections", self.settings.max_objects.to_string()),
            ])
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|err| InferenceError::Failed(err.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| InferenceError::Failed(err.to_string()))?;
        if !status.is_success() {
            return Err(InferenceError::Failed(format!("HTTP {}", status.as_u16())));
        }
        let detections = parse_predictions(&text)?;
        debug!("hosted model returned {} detections", detections.len());
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use warp::Filter;

    fn configured(api_url: String) -> InferenceSettings {
        InferenceSettings {
            api_url,
            api_key: "abc123".into(),
            model: "door-detector".into(),
            version: 3,
            ..Default::default()
        }
    }

    #[test]
    fn predictions_parse_in_order() {
        let body = r#"{"time":0.1,"predictions":[
            {"x":10.0,"y":20.0,"width":30.0,"height":40.0,"confidence":0.91,"class":"door_open"},
            {"x":1.0,"y":2.0,"width":3.0,"height":4.0,"confidence":0.42,"class":"person"}
        ]}"#;
        let detections = parse_predictions(body).unwrap();
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].label, "door_open");
        assert_eq!(detections[0].bbox.unwrap().height, 40.0);
        assert_eq!(detections[1].confidence, 0.42);
    }

    #[test]
    fn missing_predictions_means_no_detections() {
        assert!(parse_predictions("{}").unwrap().is_empty());
        assert!(matches!(
            parse_predictions("not json"),
            Err(InferenceError::Failed(_))
        ));
    }

    #[tokio::test]
    async fn placeholder_credentials_refuse_to_load() {
        let detector = HostedDetector::new(InferenceSettings::default());
        assert_eq!(
            detector.load().await,
            Err(InferenceError::NotConfigured("API key".into()))
        );
        assert!(!detector.is_ready());

        let image = ProcessedImage::new(vec![1, 2, 3], 1, 1, 90);
        assert_eq!(
            detector.detect(&image).await,
            Err(InferenceError::ModelNotReady)
        );
    }

    #[tokio::test]
    async fn detect_posts_base64_image() {
        let route = warp::path!("door-detector" / "3")
            .and(warp::post())
            .and(warp::query::<std::collections::HashMap<String, String>>())
            .and(warp::body::bytes())
            .map(|query: std::collections::HashMap<String, String>, body: warp::hyper::body::Bytes| {
                let ok = query.get("api_key").map(String::as_str) == Some("abc123")
                    && query.get("confidence").map(String::as_str) == Some("50")
                    && body.as_ref() == b"AQID";
                let class = if ok { "door_closed" } else { "unexpected" };
                warp::reply::json(&serde_json::json!({
                    "predictions": [{"class": class, "confidence": 0.8}]
                }))
            });
        let (addr, server) = warp::serve(route).bind_ephemeral(SocketAddr::from(([127, 0, 0, 1], 0)));
        tokio::spawn(server);

        let detector = HostedDetector::new(configured(format!("http://{}", addr)));
        detector.load().await.unwrap();
        let image = ProcessedImage::new(vec![1, 2, 3], 1, 1, 90);
        let detections = detector.detect(&image).await.unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label, "door_closed");
    }
}
