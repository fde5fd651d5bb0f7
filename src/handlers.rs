use crate::audio::{self, format_file_size};
use crate::config::Config;
use crate::models::*;
use crate::whisper::{preprocess_audio, WhisperEngine};
use axum::{extract::State, http::StatusCode, response::IntoResponse, response::Json};
use std::sync::{Arc, Mutex};
use std::time::Instant;

// =============================================================================
// Application State
// - ハンドラ間で共有する情報を集約（設定、Whisper エンジン、統計、起動時刻）
// - `Arc<Mutex<..>>` を用いてスレッドセーフに共有
// =============================================================================

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub whisper_engine: Arc<Mutex<Option<WhisperEngine>>>,
    pub stats: Arc<Mutex<ServerStats>>,
    pub start_time: Arc<Instant>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            whisper_engine: Arc::new(Mutex::new(None)),
            stats: Arc::new(Mutex::new(ServerStats::default())),
            start_time: Arc::new(Instant::now()),
        }
    }

    pub fn with_whisper_engine(self, engine: WhisperEngine) -> Self {
        // 起動後に Whisper エンジンを差し込む（初期化に失敗してもサーバーは起動できる設計）
        *self.whisper_engine.lock().unwrap() = Some(engine);
        self
    }
}

// =============================================================================
// Error Handling
// - 型安全な API エラーを定義し、`IntoResponse` で JSON へ変換
// =============================================================================

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::new(ApiErrorCode::InternalError, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status_code = match self.code {
            ApiErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ApiErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiErrorCode::UnsupportedFormat => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiErrorCode::ProcessingFailed => StatusCode::INTERNAL_SERVER_ERROR,
            ApiErrorCode::ModelNotLoaded => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let response = ErrorResponse {
            error: self.message,
            code: self.code.as_str().to_string(),
            details: self.details,
        };

        (status_code, Json(response)).into_response()
    }
}

// =============================================================================
// Request Handlers
// =============================================================================

/// 推論エンドポイント（SageMaker の /invocations 契約）
/// - 入力: {"audio_b64": "<base64 WAV 16kHz mono PCM>"}
/// - 出力: {"text": "<文字起こし結果>"}
pub async fn invocations(
    State(state): State<AppState>,
    Json(request): Json<InvocationRequest>,
) -> ApiResult<Json<InvocationResponse>> {
    // 統計情報を更新
    // - 受信直後にリクエスト数/アクティブ数を更新
    {
        let mut stats = state.stats.lock().unwrap();
        stats.record_request();
    }

    let start_time = Instant::now();

    let result = process_invocation(state.clone(), request, start_time).await;

    // 統計情報を更新
    // - 成功: 平均処理時間の算出に用いる
    // - 失敗: 失敗カウントを加算
    match &result {
        Ok(response) => {
            let mut stats = state.stats.lock().unwrap();
            stats.record_success(response.processing_time_ms);
        }
        Err(_) => {
            let mut stats = state.stats.lock().unwrap();
            stats.record_failure();
        }
    }

    result
}

/// 推論処理の本体
async fn process_invocation(
    state: AppState,
    request: InvocationRequest,
    start_time: Instant,
) -> ApiResult<Json<InvocationResponse>> {
    // base64デコード（厳密）
    let wav_bytes = audio::decode_base64_audio(&request.audio_b64)
        .map_err(|e| ApiError::new(ApiErrorCode::InvalidInput, e.to_string()))?;

    // ペイロードサイズの検証
    let max_size = state.config.max_payload_size_bytes();
    if wav_bytes.len() > max_size {
        return Err(ApiError::new(
            ApiErrorCode::PayloadTooLarge,
            format!(
                "ペイロードサイズが制限を超えています: {} > {}",
                format_file_size(wav_bytes.len() as u64),
                format_file_size(max_size as u64)
            ),
        ));
    }

    // WAVコンテナの確認
    // - base64 の中身が WAV 以外（mp3 等）の場合はここで弾く
    if !audio::is_wav_container(&wav_bytes) {
        return Err(ApiError::new(
            ApiErrorCode::UnsupportedFormat,
            "WAV形式のデータが必要です",
        ));
    }

    // CPU集約的な処理をブロッキングスレッドで実行
    // - デコード/Whisper 推論は重いので `spawn_blocking`
    let config = Arc::clone(&state.config);
    let whisper_engine = Arc::clone(&state.whisper_engine);

    let (text, duration_ms) = tokio::task::spawn_blocking(
        move || -> Result<(String, u64), ApiError> {
            // 厳密デコード（16kHz モノラル PCM 以外はエラー）
            let decoded = audio::decode_wav_strict(wav_bytes, &config)
                .map_err(|e| ApiError::new(ApiErrorCode::InvalidInput, e.to_string()))?;

            // 音声の長さを検証
            audio::validate_audio_duration(decoded.duration_ms, &config)
                .map_err(|e| ApiError::new(ApiErrorCode::InvalidInput, e.to_string()))?;

            // Whisperエンジンを取得
            // - 起動時にロードできなかった場合は None → 503
            let engine = {
                let engine_guard = whisper_engine.lock().unwrap();
                engine_guard.as_ref().cloned()
            }
            .ok_or_else(|| {
                ApiError::new(
                    ApiErrorCode::ModelNotLoaded,
                    "Whisperエンジンが初期化されていません",
                )
            })?;

            // 音声データの前処理（正規化）→ 文字起こし実行
            let mut samples = decoded.samples;
            preprocess_audio(&mut samples);

            let text = engine
                .transcribe(&samples)
                .map_err(|e| ApiError::new(ApiErrorCode::ProcessingFailed, e.to_string()))?;

            Ok((text, decoded.duration_ms))
        },
    )
    .await
    .map_err(|e| ApiError::new(ApiErrorCode::InternalError, format!("処理スレッドエラー: {}", e)))??;

    let processing_time_ms = start_time.elapsed().as_millis() as u64;

    Ok(Json(InvocationResponse {
        text,
        duration_ms: Some(duration_ms),
        processing_time_ms,
    }))
}

/// ヘルスチェックエンドポイント（SageMaker の /ping 契約）
/// - モデルがロード済みのときのみ 200 を返す
pub async fn ping(State(state): State<AppState>) -> axum::response::Response {
    let uptime_seconds = state.start_time.elapsed().as_secs();

    let model_loaded = {
        let engine_guard = state.whisper_engine.lock().unwrap();
        engine_guard.is_some()
    };

    let health = HealthResponse {
        status: if model_loaded { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_loaded,
        uptime_seconds,
    };

    let status_code = if model_loaded {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health)).into_response()
}

/// サーバー統計情報を取得
pub async fn get_stats(State(state): State<AppState>) -> Json<ServerStats> {
    let mut stats = state.stats.lock().unwrap().clone();
    stats.uptime_seconds = state.start_time.elapsed().as_secs();
    Json(stats)
}
