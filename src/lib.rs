// WhisperEndpointAPI ライブラリ
// テストおよび deploy/invoke バイナリから各モジュールにアクセスできるようにするため

pub mod artifact;
pub mod audio;
pub mod config;
pub mod deploy;
pub mod handlers;
pub mod models;

// whisper関連のモジュールは条件コンパイル
#[cfg(feature = "whisper")]
pub mod whisper;

#[cfg(not(feature = "whisper"))]
pub mod whisper {
    // whisper機能が無効の場合のモック実装
    use crate::config::Config;
    use anyhow::Result;

    /// モデル情報
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct ModelInfo {
        pub is_loaded: bool,
        pub language: Option<String>,
        pub threads: i32,
        pub enable_gpu: bool,
    }

    pub struct WhisperEngine;

    impl WhisperEngine {
        pub fn new(_model_path: &str, _config: &Config) -> Result<Self> {
            Err(anyhow::anyhow!(
                "Whisper engine not available (feature disabled)"
            ))
        }

        pub fn transcribe(&self, _audio_data: &[f32]) -> Result<String> {
            Err(anyhow::anyhow!(
                "Whisper engine not available (feature disabled)"
            ))
        }

        pub fn get_model_info(&self) -> ModelInfo {
            ModelInfo {
                is_loaded: false,
                language: None,
                threads: 1,
                enable_gpu: false,
            }
        }
    }

    impl Clone for WhisperEngine {
        fn clone(&self) -> Self {
            Self
        }
    }

    /// 音声データの前処理（ノイズ除去等）
    pub fn preprocess_audio(audio_data: &mut [f32]) {
        normalize_audio(audio_data);
    }

    /// 音声データの正規化
    fn normalize_audio(audio_data: &mut [f32]) {
        if audio_data.is_empty() {
            return;
        }

        let max_abs = audio_data.iter().map(|&x| x.abs()).fold(0.0f32, f32::max);

        if max_abs > 0.0 {
            let normalize_factor = 0.95 / max_abs;

            for sample in audio_data.iter_mut() {
                *sample *= normalize_factor;
            }
        }
    }
}
