use std::path::PathBuf;
use tablecall_types::voice::VoiceSettings;
use tablecall_voice::{
    DisabledSynthesizer, PiperConfig, PiperSynthesizer, RecordingFetcher, SynthesisConfig,
    Synthesizer, TranscriptionConfig, VoiceError, WhisperCppConfig, WhisperCppTranscriber,
};

fn piper(binary: impl Into<PathBuf>, model_path: impl Into<PathBuf>) -> PiperSynthesizer {
    PiperSynthesizer::new(PiperConfig {
        binary: binary.into(),
        model_path: model_path.into(),
        config_path: None,
        speaker_id: None,
        sample_rate: 16_000,
    })
}

#[tokio::test]
async fn test_disabled_synthesizer_always_fails() {
    let result = DisabledSynthesizer
        .synthesize("Hello", &VoiceSettings::default())
        .await;
    assert!(matches!(result, Err(VoiceError::Synthesis(_))));
}

#[tokio::test]
async fn test_tts_missing_model_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let synth = piper("piper", temp_dir.path().join("missing.onnx"));

    let result = synth.synthesize("Hello", &VoiceSettings::default()).await;
    match result {
        Err(VoiceError::Synthesis(msg)) => assert!(msg.contains("Model file not found")),
        _ => panic!("Expected Synthesis error about missing model, got {:?}", result),
    }
}

#[tokio::test]
async fn test_tts_rejects_empty_text() {
    let synth = piper("piper", "missing.onnx");
    let result = synth.synthesize("   ", &VoiceSettings::default()).await;
    assert!(matches!(result, Err(VoiceError::Synthesis(_))));
}

#[tokio::test]
async fn test_tts_invalid_speed() {
    let temp_dir = tempfile::tempdir().unwrap();
    let model_path = temp_dir.path().join("test.onnx");
    std::fs::File::create(&model_path).unwrap();
    let synth = piper("piper", &model_path);

    for speed in [0.0, 0.001, 100.0] {
        let voice = VoiceSettings {
            speed,
            ..VoiceSettings::default()
        };
        let result = synth.synthesize("Hello", &voice).await;
        match result {
            Err(VoiceError::Config(msg)) => {
                assert!(msg.contains("between 0.1 and 10.0"), "got: {}", msg)
            }
            _ => panic!("Expected Config error about speed, got {:?}", result),
        }
    }
}

/// Runs both local engines against stand-in shell scripts. Kept in a single
/// test so no other test forks while a script is open for writing.
#[cfg(unix)]
#[tokio::test]
async fn test_local_engines_with_stub_binaries() {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    fn write_script(path: &std::path::Path, body: &str) {
        {
            let mut file = std::fs::File::create(path).unwrap();
            writeln!(file, "#!/bin/sh").unwrap();
            writeln!(file, "{}", body).unwrap();
            file.sync_all().unwrap();
        }
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    let dir = tempfile::tempdir().unwrap();
    let model = dir.path().join("model.bin");
    std::fs::File::create(&model).unwrap();

    let whisper_bin = dir.path().join("whisper");
    write_script(&whisper_bin, "cat > /dev/null\necho '  two pizzas please  '");
    let piper_bin = dir.path().join("piper");
    write_script(&piper_bin, "cat > /dev/null\nprintf 'abcd'");
    let failing_bin = dir.path().join("failing");
    write_script(&failing_bin, "cat > /dev/null\necho boom >&2\nexit 3");

    let transcriber = WhisperCppTranscriber::new(
        RecordingFetcher::new(reqwest::Client::new(), None),
        WhisperCppConfig {
            binary: whisper_bin,
            model_path: model.clone(),
        },
    );
    let text = transcriber.transcribe_audio(b"RIFF-fake").await.unwrap();
    assert_eq!(text, "two pizzas please");

    let clip = piper(&piper_bin, &model)
        .synthesize("Hello", &VoiceSettings::default())
        .await
        .unwrap();
    assert_eq!(clip.content_type, "audio/wav");
    assert_eq!(clip.bytes.len(), 48);
    assert_eq!(&clip.bytes[44..], b"abcd");

    let failing = WhisperCppTranscriber::new(
        RecordingFetcher::new(reqwest::Client::new(), None),
        WhisperCppConfig {
            binary: failing_bin,
            model_path: model,
        },
    );
    match failing.transcribe_audio(b"RIFF-fake").await {
        Err(VoiceError::Transcription(msg)) => assert!(msg.contains("boom"), "got: {}", msg),
        other => panic!("Expected Transcription error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_stt_missing_binary() {
    let transcriber = WhisperCppTranscriber::new(
        RecordingFetcher::new(reqwest::Client::new(), None),
        WhisperCppConfig {
            binary: PathBuf::from("/nonexistent/whisper-cli"),
            model_path: PathBuf::from("model.bin"),
        },
    );
    let result = transcriber.transcribe_audio(b"RIFF").await;
    assert!(matches!(result, Err(VoiceError::Transcription(_))));
}

#[derive(serde::Deserialize)]
struct Sections {
    synthesis: SynthesisConfig,
    transcription: TranscriptionConfig,
}

#[test]
fn test_engine_config_parses_from_toml() {
    let parsed: Sections = toml::from_str(
        r#"
        [synthesis]
        provider = "elevenlabs"
        voice_id = "rachel"
        api_key = "xi-secret"

        [transcription]
        provider = "whisper_cpp"
        binary = "/usr/local/bin/whisper-cli"
        model_path = "models/ggml-base.en.bin"
        "#,
    )
    .unwrap();

    match parsed.synthesis {
        SynthesisConfig::Elevenlabs(cfg) => {
            assert_eq!(cfg.voice_id, "rachel");
            assert_eq!(cfg.base_url, "https://api.elevenlabs.io/v1");
            assert!(!format!("{:?}", cfg).contains("xi-secret"));
        }
        other => panic!("unexpected synthesis config: {:?}", other),
    }
    assert!(matches!(
        parsed.transcription,
        TranscriptionConfig::WhisperCpp(_)
    ));
}
