//! Text-to-speech integration tests
//!
//! Catalog, token and synthesis endpoints are served locally; no audio device
//! is opened.

use std::sync::Arc;

use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use speechdesk::config::TtsConfig;
use speechdesk::tts::{
    AudioDestination, AzureSynthesizer, CatalogClient, PlaybackState, SpeechSynthesizer,
    SsmlSelection, SynthesisAuth, SynthesisController, TtsForm, build_ssml,
};
use speechdesk::voice::SpeakerDestination;

mod common;
use common::{RequestLog, serve};

fn voice_list() -> serde_json::Value {
    json!([
        {
            "Name": "Microsoft Server Speech Text to Speech Voice (en-US, GuyNeural)",
            "DisplayName": "Guy", "LocalName": "Guy", "ShortName": "en-US-GuyNeural",
            "Gender": "Male", "Locale": "en-US", "LocaleName": "English (United States)",
            "VoiceType": "Neural", "Status": "GA"
        },
        {
            "Name": "Microsoft Server Speech Text to Speech Voice (zh-CN, XiaomoNeural)",
            "DisplayName": "Xiaomo", "LocalName": "晓墨", "ShortName": "zh-CN-XiaomoNeural",
            "Gender": "Female", "Locale": "zh-CN", "LocaleName": "Chinese (Mandarin, Simplified)",
            "VoiceType": "Neural", "Status": "GA",
            "StyleList": ["calm", "customerservice"],
            "RolePlayList": ["YoungAdultFemale", "OlderAdultMale"],
            "SecondaryLocaleList": ["en-US"]
        },
        {
            "Name": "Microsoft Server Speech Text to Speech Voice (en-US, OldVoice)",
            "DisplayName": "Old", "LocalName": "Old", "ShortName": "en-US-Old",
            "Gender": "Male", "Locale": "en-US", "VoiceType": "Standard", "Status": "Deprecated"
        },
        {
            "Name": "Microsoft Server Speech Text to Speech Voice (en-US, AvaNeural)",
            "DisplayName": "Ava", "LocalName": "Ava", "ShortName": "en-US-AvaNeural",
            "Gender": "Female", "Locale": "en-US", "VoiceType": "Neural", "Status": "Preview"
        }
    ])
}

/// Speech service stand-in: token, voice list and synthesis endpoints
async fn speech_server(log: RequestLog) -> String {
    let synthesis_log = log.clone();
    let router = Router::new()
        .route(
            "/{region}/sts/v1.0/issueToken",
            post(|headers: HeaderMap| async move {
                match headers.get("ocp-apim-subscription-key") {
                    Some(key) if key == "good-key" => (StatusCode::OK, "issued-token".to_string()),
                    _ => (StatusCode::UNAUTHORIZED, String::new()),
                }
            }),
        )
        .route(
            "/{region}/voices/list",
            get(|Path(region): Path<String>, headers: HeaderMap| async move {
                let authorized = headers
                    .get("authorization")
                    .is_some_and(|v| v == "Bearer issued-token");
                if region == "eastasia" && authorized {
                    (StatusCode::OK, Json(voice_list()))
                } else {
                    (StatusCode::UNAUTHORIZED, Json(json!([])))
                }
            }),
        )
        .route(
            "/{region}/cognitiveservices/v1",
            post(move |headers: HeaderMap, body: String| {
                let log = synthesis_log.clone();
                async move {
                    log.push(&headers, body);
                    (StatusCode::OK, b"not an mp3 stream".to_vec())
                }
            }),
        );
    serve(router).await
}

fn tts_config(base: &str) -> TtsConfig {
    TtsConfig {
        voices_endpoint: format!("{base}/{{region}}/voices/list"),
        token_endpoint: format!("{base}/{{region}}/sts/v1.0/issueToken"),
        synthesis_endpoint: format!("{base}/{{region}}/cognitiveservices/v1"),
        ..TtsConfig::default()
    }
}

#[tokio::test]
async fn test_catalog_load() {
    let base = speech_server(RequestLog::default()).await;
    let config = tts_config(&base);
    let client = CatalogClient::new(&config.voices_endpoint, &config.token_endpoint);

    let token = client
        .issue_token("eastasia", &SecretString::from("good-key"))
        .await
        .unwrap();
    assert_eq!(token.expose_secret(), "issued-token");

    let (catalog, error) = client.load("eastasia", &token, "Preview").await;
    assert!(error.is_none());

    let en: Vec<_> = catalog
        .voices_for("en-US")
        .iter()
        .map(|v| v.label.as_str())
        .collect();
    assert_eq!(en, ["Guy (Neural)", "Ava (Neural) - Preview"]);
    assert_eq!(
        catalog.voices_for("zh-CN")[0].label,
        "Xiaomo (Neural) - 晓墨"
    );
}

#[tokio::test]
async fn test_catalog_failure_leaves_empty_catalog() {
    let base = speech_server(RequestLog::default()).await;
    let config = tts_config(&base);
    let client = CatalogClient::new(&config.voices_endpoint, &config.token_endpoint);

    let (catalog, error) = client
        .load("eastasia", &SecretString::from("wrong-token"), "Preview")
        .await;

    assert!(catalog.is_empty());
    assert!(error.is_some());
    assert!(client
        .issue_token("eastasia", &SecretString::from("bad-key"))
        .await
        .is_err());
}

#[tokio::test]
async fn test_form_over_fetched_catalog() {
    let base = speech_server(RequestLog::default()).await;
    let config = tts_config(&base);
    let client = CatalogClient::new(&config.voices_endpoint, &config.token_endpoint);
    let (catalog, _) = client
        .load("eastasia", &SecretString::from("issued-token"), "Preview")
        .await;

    let mut form = TtsForm::new(catalog, config.default_texts.clone());
    assert_eq!(form.voice_name(), Some("en-US-GuyNeural"));
    assert!(!form.ssml().contains("express-as"));

    form.select_language("zh-CN").unwrap();
    assert_eq!(form.styles()[2].label, "Customer Service");
    form.select_style(1).unwrap();
    form.select_role_play(2).unwrap();
    assert!(form
        .ssml()
        .contains(r#"<mstts:express-as style="calm" role="OlderAdultMale">"#));

    form.select_secondary_locale(1).unwrap();
    assert!(!form.prosody_enabled());
    assert!(form.ssml().contains(r#"<lang xml:lang="en-US">"#));
    assert_eq!(form.ssml().matches("<mstts:express-as").count(), 1);
}

#[tokio::test]
async fn test_synthesis_request() {
    let log = RequestLog::default();
    let base = speech_server(log.clone()).await;
    let config = tts_config(&base);
    let synthesizer = AzureSynthesizer::new(
        &config,
        "eastasia",
        SynthesisAuth::Token(SecretString::from("issued-token")),
    );

    let ssml = build_ssml(&SsmlSelection {
        voice: "en-US-GuyNeural".to_string(),
        text: "Fish & chips".to_string(),
        ..SsmlSelection::default()
    });
    let audio = synthesizer.speak_ssml(&ssml).await.unwrap();

    assert_eq!(audio, b"not an mp3 stream");
    let sent = log.last().unwrap();
    assert_eq!(sent.authorization.as_deref(), Some("Bearer issued-token"));
    assert_eq!(sent.content_type.as_deref(), Some("application/ssml+xml"));
    assert!(sent.body.contains("Fish &amp; chips"));
}

#[tokio::test]
async fn test_undecodable_audio_returns_to_idle() {
    let base = speech_server(RequestLog::default()).await;
    let config = tts_config(&base);
    let synthesizer = Arc::new(AzureSynthesizer::new(
        &config,
        "eastasia",
        SynthesisAuth::SubscriptionKey(SecretString::from("good-key")),
    ));
    let destination: Arc<dyn AudioDestination> = Arc::new(SpeakerDestination::new());
    let mut controller =
        SynthesisController::new(synthesizer, destination, config.retry_message.clone());

    // The fake endpoint does not return a playable MP3 stream
    assert!(controller.play("<speak/>").await.is_err());
    assert_eq!(controller.state(), PlaybackState::Idle);
    assert!(controller.status().starts_with(&config.retry_message));
    assert!(controller.play_visible());
}
