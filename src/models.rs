use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =============================================================================
// API Request/Response Models
// - 入力: {"audio_b64": "<base64エンコードされた16kHzモノラルPCM WAV>"}
// - 出力: {"text": "<文字起こし結果>"} + 処理メタデータ
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub audio_b64: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InvocationResponse {
    pub text: String,
    pub duration_ms: Option<u64>,
    pub processing_time_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model_loaded: bool,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub details: Option<String>,
}

// =============================================================================
// Checkpoint Catalog
// - 既知のGGMLチェックポイント定義（ファイル名/取得URL/サイズ）
// - アーティファクト準備時に設定の checkpoint 名を解決するために使う
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointCatalog {
    pub checkpoints: HashMap<String, CheckpointDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointDefinition {
    pub name: String,
    pub file_name: String,
    pub download_url: String,
    pub size_mb: u64,
    pub description: String,
}

impl CheckpointCatalog {
    pub fn get(&self, key: &str) -> Option<&CheckpointDefinition> {
        self.checkpoints.get(key)
    }

    pub fn known_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.checkpoints.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Default for CheckpointCatalog {
    fn default() -> Self {
        let mut checkpoints = HashMap::new();

        checkpoints.insert(
            "tiny".to_string(),
            CheckpointDefinition {
                name: "Whisper Tiny".to_string(),
                file_name: "ggml-tiny.bin".to_string(),
                download_url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-tiny.bin".to_string(),
                size_mb: 39,
                description: "最小モデル（39MB）- 動作確認向け".to_string(),
            },
        );

        checkpoints.insert(
            "base".to_string(),
            CheckpointDefinition {
                name: "Whisper Base".to_string(),
                file_name: "ggml-base.bin".to_string(),
                download_url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-base.bin".to_string(),
                size_mb: 142,
                description: "基本モデル（142MB）- バランスの取れた速度と精度".to_string(),
            },
        );

        checkpoints.insert(
            "small".to_string(),
            CheckpointDefinition {
                name: "Whisper Small".to_string(),
                file_name: "ggml-small.bin".to_string(),
                download_url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-small.bin".to_string(),
                size_mb: 244,
                description: "小型モデル（244MB）- 良好な精度と実用的な速度".to_string(),
            },
        );

        checkpoints.insert(
            "large-v3-turbo-q5_0".to_string(),
            CheckpointDefinition {
                name: "Whisper Large V3 Turbo Q5_0".to_string(),
                file_name: "ggml-large-v3-turbo-q5_0.bin".to_string(),
                download_url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-large-v3-turbo-q5_0.bin".to_string(),
                size_mb: 809,
                description: "大型モデル（809MB）- 最高精度、量子化により高速化".to_string(),
            },
        );

        Self { checkpoints }
    }
}

// =============================================================================
// Server State and Statistics
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStats {
    pub total_requests: u64,
    pub successful_transcriptions: u64,
    pub failed_transcriptions: u64,
    pub total_processing_time_ms: u64,
    pub average_processing_time_ms: f64,
    pub active_requests: usize,
    pub uptime_seconds: u64,
}

impl Default for ServerStats {
    fn default() -> Self {
        Self {
            total_requests: 0,
            successful_transcriptions: 0,
            failed_transcriptions: 0,
            total_processing_time_ms: 0,
            average_processing_time_ms: 0.0,
            active_requests: 0,
            uptime_seconds: 0,
        }
    }
}

impl ServerStats {
    pub fn record_request(&mut self) {
        self.total_requests += 1;
        self.active_requests += 1;
    }

    pub fn record_success(&mut self, processing_time_ms: u64) {
        self.successful_transcriptions += 1;
        self.active_requests = self.active_requests.saturating_sub(1);
        self.total_processing_time_ms += processing_time_ms;

        if self.successful_transcriptions > 0 {
            self.average_processing_time_ms =
                self.total_processing_time_ms as f64 / self.successful_transcriptions as f64;
        }
    }

    pub fn record_failure(&mut self) {
        self.failed_transcriptions += 1;
        self.active_requests = self.active_requests.saturating_sub(1);
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.successful_transcriptions as f64 / self.total_requests as f64 * 100.0
        }
    }
}

// =============================================================================
// Error Types
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ApiErrorCode {
    InvalidInput,
    PayloadTooLarge,
    UnsupportedFormat,
    ProcessingFailed,
    ModelNotLoaded,
    InternalError,
}

impl ApiErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiErrorCode::InvalidInput => "INVALID_INPUT",
            ApiErrorCode::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ApiErrorCode::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            ApiErrorCode::ProcessingFailed => "PROCESSING_FAILED",
            ApiErrorCode::ModelNotLoaded => "MODEL_NOT_LOADED",
            ApiErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}
