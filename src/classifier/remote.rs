//! Remote language models and the policy that combines them.
//!
//! A [`RemoteTier`] asks a Darija-specialized model first and only consults the
//! general model when the Darija model is not confident. When the two disagree,
//! the Darija model wins unless the general model is very sure the text is
//! Standard Arabic.
//!
//! Transport is pluggable: anything implementing [`GeneralClassifier`] can be a
//! remote model. [`HttpRemoteModel`] (feature `http`) speaks the JSON contract
//! `POST {"text": ...}` → `{"language": ..., "confidence": ...}`.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use super::{ClassifierVerdict, GeneralClassifier};
use crate::config::RemoteConfig;
use crate::error::{ClassifierError, ClassifierResult};
use crate::language::Language;

/// Wire request sent to a remote model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteRequest {
    pub text: String,
}

/// Wire response expected from a remote model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteResponse {
    pub language: String,
    pub confidence: f32,
}

impl RemoteResponse {
    /// Convert to a verdict, rejecting out-of-range confidences.
    pub fn into_verdict(self, model: &str) -> ClassifierResult<ClassifierVerdict> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(ClassifierError::MalformedResponse {
                model: model.to_string(),
                message: format!("confidence {} outside [0, 1]", self.confidence),
            });
        }
        Ok(ClassifierVerdict::new(
            Language::from_code(&self.language),
            self.confidence,
            format!("remote:{model}"),
        ))
    }
}

/// Darija-first combination of two remote models.
pub struct RemoteTier {
    darija: Option<Arc<dyn GeneralClassifier>>,
    general: Option<Arc<dyn GeneralClassifier>>,
    darija_override_confidence: f32,
    general_arabic_veto: f32,
}

impl RemoteTier {
    pub fn new(
        darija: Option<Arc<dyn GeneralClassifier>>,
        general: Option<Arc<dyn GeneralClassifier>>,
        config: &RemoteConfig,
    ) -> Self {
        Self {
            darija,
            general,
            darija_override_confidence: config.darija_override_confidence,
            general_arabic_veto: config.general_arabic_veto,
        }
    }

    /// Build HTTP models from the configured endpoints.
    #[cfg(feature = "http")]
    pub fn from_config(config: &RemoteConfig) -> Self {
        let darija = config
            .darija_endpoint
            .as_ref()
            .map(|url| Arc::new(HttpRemoteModel::new("darija", url)) as Arc<dyn GeneralClassifier>);
        let general = config
            .general_endpoint
            .as_ref()
            .map(|url| Arc::new(HttpRemoteModel::new("general", url)) as Arc<dyn GeneralClassifier>);
        Self::new(darija, general, config)
    }

    pub fn is_empty(&self) -> bool {
        self.darija.is_none() && self.general.is_none()
    }

    async fn run(&self, text: &str) -> ClassifierResult<ClassifierVerdict> {
        let darija = match &self.darija {
            Some(model) => Some(model.classify(text).await),
            None => None,
        };

        if let Some(Ok(verdict)) = &darija {
            if verdict.confidence >= self.darija_override_confidence {
                tracing::debug!(
                    language = %verdict.language,
                    confidence = verdict.confidence,
                    "darija model verdict accepted without general model"
                );
                return Ok(verdict.clone());
            }
        }

        let general = match &self.general {
            Some(model) => Some(model.classify(text).await),
            None => None,
        };

        match (darija, general) {
            (Some(Ok(d)), Some(Ok(g))) => Ok(self.reconcile(d, g)),
            (Some(Ok(d)), _) => Ok(d),
            (_, Some(Ok(g))) => Ok(g),
            (Some(Err(e)), None) | (_, Some(Err(e))) => Err(e),
            (None, None) => Err(ClassifierError::Remote {
                model: "remote-tier".into(),
                message: "no remote models configured".into(),
            }),
        }
    }

    /// Both models answered and the Darija model was not decisive.
    fn reconcile(&self, darija: ClassifierVerdict, general: ClassifierVerdict) -> ClassifierVerdict {
        if darija.language == general.language {
            return if darija.confidence >= general.confidence {
                darija
            } else {
                general
            };
        }
        let general_sure_of_arabic =
            general.language == Language::Arabic && general.confidence >= self.general_arabic_veto;
        if general_sure_of_arabic { general } else { darija }
    }
}

impl GeneralClassifier for RemoteTier {
    fn name(&self) -> &str {
        "remote-tier"
    }

    fn classify<'a>(&'a self, text: &'a str) -> BoxFuture<'a, ClassifierResult<ClassifierVerdict>> {
        Box::pin(self.run(text))
    }
}

/// A remote model reached over HTTP.
#[cfg(feature = "http")]
pub struct HttpRemoteModel {
    name: String,
    endpoint: String,
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpRemoteModel {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn call(&self, text: &str) -> ClassifierResult<ClassifierVerdict> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&RemoteRequest {
                text: text.to_string(),
            })
            .send()
            .await
            .map_err(|e| ClassifierError::Remote {
                model: self.name.clone(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ClassifierError::Remote {
                model: self.name.clone(),
                message: format!("HTTP {}", response.status()),
            });
        }

        let body: RemoteResponse =
            response
                .json()
                .await
                .map_err(|e| ClassifierError::MalformedResponse {
                    model: self.name.clone(),
                    message: e.to_string(),
                })?;
        body.into_verdict(&self.name)
    }
}

#[cfg(feature = "http")]
impl GeneralClassifier for HttpRemoteModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn classify<'a>(&'a self, text: &'a str) -> BoxFuture<'a, ClassifierResult<ClassifierVerdict>> {
        Box::pin(self.call(text))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Answers a fixed verdict (or error) and counts calls.
    struct FixedModel {
        answer: Result<(Language, f32), String>,
        calls: AtomicUsize,
    }

    impl FixedModel {
        fn ok(language: Language, confidence: f32) -> Arc<Self> {
            Arc::new(Self {
                answer: Ok((language, confidence)),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                answer: Err("unreachable".into()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl GeneralClassifier for FixedModel {
        fn name(&self) -> &str {
            "fixed"
        }

        fn classify<'a>(
            &'a self,
            _text: &'a str,
        ) -> BoxFuture<'a, ClassifierResult<ClassifierVerdict>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = match &self.answer {
                Ok((lang, conf)) => Ok(ClassifierVerdict::new(*lang, *conf, "remote:fixed")),
                Err(msg) => Err(ClassifierError::Remote {
                    model: "fixed".into(),
                    message: msg.clone(),
                }),
            };
            Box::pin(async move { result })
        }
    }

    fn tier(darija: Arc<FixedModel>, general: Arc<FixedModel>) -> RemoteTier {
        RemoteTier::new(
            Some(darija as Arc<dyn GeneralClassifier>),
            Some(general as Arc<dyn GeneralClassifier>),
            &RemoteConfig::default(),
        )
    }

    #[tokio::test]
    async fn confident_darija_model_skips_general_model() {
        let darija = FixedModel::ok(Language::Darija, 0.9);
        let general = FixedModel::ok(Language::Arabic, 0.99);
        let t = tier(darija.clone(), general.clone());

        let v = t.classify("wach").await.unwrap();
        assert_eq!(v.language, Language::Darija);
        assert_eq!(general.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn disagreement_prefers_darija_model() {
        let t = tier(
            FixedModel::ok(Language::Darija, 0.6),
            FixedModel::ok(Language::Arabic, 0.9),
        );
        let v = t.classify("text").await.unwrap();
        assert_eq!(v.language, Language::Darija);
    }

    #[tokio::test]
    async fn very_confident_general_arabic_wins_disagreement() {
        let t = tier(
            FixedModel::ok(Language::Darija, 0.6),
            FixedModel::ok(Language::Arabic, 0.97),
        );
        let v = t.classify("text").await.unwrap();
        assert_eq!(v.language, Language::Arabic);
    }

    #[tokio::test]
    async fn agreement_keeps_higher_confidence() {
        let t = tier(
            FixedModel::ok(Language::French, 0.5),
            FixedModel::ok(Language::French, 0.8),
        );
        let v = t.classify("text").await.unwrap();
        assert_eq!(v.confidence, 0.8);
    }

    #[tokio::test]
    async fn failing_darija_model_falls_through_to_general() {
        let t = tier(FixedModel::failing(), FixedModel::ok(Language::French, 0.9));
        let v = t.classify("text").await.unwrap();
        assert_eq!(v.language, Language::French);
    }

    #[tokio::test]
    async fn both_failing_is_an_error() {
        let t = tier(FixedModel::failing(), FixedModel::failing());
        assert!(t.classify("text").await.is_err());
    }

    #[tokio::test]
    async fn empty_tier_is_an_error() {
        let t = RemoteTier::new(None, None, &RemoteConfig::default());
        assert!(t.is_empty());
        assert!(t.classify("text").await.is_err());
    }

    #[test]
    fn response_parsing_maps_codes_and_rejects_bad_confidence() {
        let ok: RemoteResponse =
            serde_json::from_str(r#"{"language": "ary", "confidence": 0.91}"#).unwrap();
        let v = ok.into_verdict("darija").unwrap();
        assert_eq!(v.language, Language::Darija);
        assert_eq!(v.provenance, "remote:darija");

        let bad = RemoteResponse {
            language: "fr".into(),
            confidence: 3.0,
        };
        assert!(matches!(
            bad.into_verdict("general"),
            Err(ClassifierError::MalformedResponse { .. })
        ));
    }
}
