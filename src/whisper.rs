use crate::config::Config;
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

/// Whisperエンジンのラッパー（スレッドセーフ）
/// - whisper-rs の `WhisperContext` を `Arc` で共有
/// - 各推論は独立した `state` を生成して実行する安全な使い方
pub struct WhisperEngine {
    context: Arc<WhisperContext>,
    language: Option<String>,
    whisper_threads: i32,
    enable_gpu: bool,
}

impl WhisperEngine {
    /// 新しいWhisperEngineを作成
    /// - モデルファイルの存在確認 → WhisperContext 初期化
    /// - Config からスレッド数/言語/GPU 設定を反映
    pub fn new(model_path: &str, config: &Config) -> Result<Self> {
        // モデルファイルの存在確認
        // - コンテナ内では SageMaker が model.tar.gz を /opt/ml/model に展開する
        if !Path::new(model_path).exists() {
            return Err(anyhow::anyhow!(
                "モデルファイルが見つかりません: {}\n\
                 アーティファクトがモデルディレクトリに展開されているか確認してください",
                model_path
            ));
        }

        // Whisperコンテキストの初期化
        let mut ctx_params = WhisperContextParameters::default();

        // GPU使用の設定（whisper-rs/whisper.cpp 側が対応していれば有効化）
        // - 実際にGPUコードが使われるかはビルド時のバックエンド有効化に依存します
        ctx_params.use_gpu = config.whisper.enable_gpu;

        // コンテキスト作成（GPU有効時に失敗した場合はCPUでフォールバック）
        let context = match WhisperContext::new_with_params(model_path, ctx_params) {
            Ok(ctx) => ctx,
            Err(e) => {
                if config.whisper.enable_gpu {
                    eprintln!("GPU初期化に失敗しました。CPUで再試行します: {}", e);
                    let mut cpu_params = WhisperContextParameters::default();
                    cpu_params.use_gpu = false;
                    WhisperContext::new_with_params(model_path, cpu_params)
                        .map_err(|e| anyhow::anyhow!("Whisperコンテキストの初期化に失敗: {}", e))?
                } else {
                    return Err(anyhow::anyhow!(
                        "Whisperコンテキストの初期化に失敗: {}",
                        e
                    ));
                }
            }
        };

        let language = match config.whisper.language.trim() {
            "" => None,
            lang if lang.eq_ignore_ascii_case("auto") => None,
            lang => Some(lang.to_string()),
        };

        println!(
            "Whisperモデルを読み込みました: {} (GPU: {})",
            model_path,
            if config.whisper.enable_gpu { "enabled" } else { "disabled" }
        );

        Ok(Self {
            context: Arc::new(context),
            language,
            whisper_threads: config.whisper.threads as i32,
            enable_gpu: config.whisper.enable_gpu,
        })
    }

    /// 文字起こしを実行してテキストを返す
    /// - whisper-rs の `state.full` を用いる標準フロー
    pub fn transcribe(&self, audio_data: &[f32]) -> Result<String> {
        // 音声データの検証
        if audio_data.is_empty() {
            return Err(anyhow::anyhow!("音声データが空です"));
        }

        // Whisperの状態を作成（各リクエストごとに新しい状態）
        let mut state = self
            .context
            .create_state()
            .map_err(|e| anyhow::anyhow!("Whisper状態の作成に失敗: {}", e))?;

        let params = self.make_params();

        // 文字起こし実行
        state
            .full(params, audio_data)
            .map_err(|e| anyhow::anyhow!("文字起こしに失敗: {}", e))?;

        // セグメントごとのテキストを結合
        let segment_count = state
            .full_n_segments()
            .map_err(|e| anyhow::anyhow!("セグメント数の取得に失敗: {}", e))?;

        let mut text_parts = Vec::new();

        for i in 0..segment_count {
            let segment_text = state
                .full_get_segment_text(i)
                .map_err(|e| anyhow::anyhow!("セグメント{}のテキスト取得に失敗: {}", i, e))?;

            text_parts.push(segment_text.trim().to_string());
        }

        let full_text = text_parts.join(" ").trim().to_string();

        if full_text.is_empty() {
            Ok("(音声を認識できませんでした)".to_string())
        } else {
            Ok(full_text)
        }
    }

    /// Whisperパラメータを作成
    /// - Greedy デコード（best_of=1）
    /// - 進捗ログ等はサーバーコンソールを汚さないよう無効化
    fn make_params(&self) -> FullParams<'_, 'static> {
        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        if let Some(language) = self.language.as_deref() {
            params.set_language(Some(language));
        }

        params.set_n_threads(self.whisper_threads);

        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        params
    }

    /// モデル情報を取得
    pub fn get_model_info(&self) -> ModelInfo {
        ModelInfo {
            is_loaded: true,
            language: self.language.clone(),
            threads: self.whisper_threads,
            enable_gpu: self.enable_gpu,
        }
    }
}

// スレッドセーフなクローンを実装
impl Clone for WhisperEngine {
    fn clone(&self) -> Self {
        Self {
            context: Arc::clone(&self.context),
            language: self.language.clone(),
            whisper_threads: self.whisper_threads,
            enable_gpu: self.enable_gpu,
        }
    }
}

/// モデル情報
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelInfo {
    pub is_loaded: bool,
    pub language: Option<String>,
    pub threads: i32,
    pub enable_gpu: bool,
}

// =============================================================================
// Utility Functions
// =============================================================================

/// 音声データの前処理（ノイズ除去等）
/// - まずは振幅の基本正規化のみ。
pub fn preprocess_audio(audio_data: &mut [f32]) {
    normalize_audio(audio_data);
}

/// 音声データの正規化
/// - 振幅の最大絶対値を 0.95 に収まるようスケーリング
fn normalize_audio(audio_data: &mut [f32]) {
    if audio_data.is_empty() {
        return;
    }

    // 最大絶対値を見つける
    let max_abs = audio_data.iter().map(|&x| x.abs()).fold(0.0f32, f32::max);

    if max_abs > 0.0 {
        // 正規化係数を計算（最大値を0.95に制限）
        let normalize_factor = 0.95 / max_abs;

        for sample in audio_data.iter_mut() {
            *sample *= normalize_factor;
        }
    }
}
