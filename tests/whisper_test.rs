use WhisperEndpointAPI::config::Config;
use WhisperEndpointAPI::whisper::*;

#[cfg(test)]
mod whisper_tests {
    use super::*;

    /// 存在しないモデルパスではエンジン作成に失敗する
    #[test]
    fn test_engine_new_missing_model() {
        let config = Config::default();

        let result = WhisperEngine::new("/nonexistent/path/model.bin", &config);
        assert!(result.is_err());
    }

    /// preprocess_audioはピークを0.95に正規化する
    #[test]
    fn test_preprocess_audio_normalizes_peak() {
        let mut samples = vec![0.1f32, -0.5, 0.25, -0.05];

        preprocess_audio(&mut samples);

        let max_abs = samples.iter().map(|&x| x.abs()).fold(0.0f32, f32::max);
        assert!((max_abs - 0.95).abs() < 1e-6);

        // 相対的な大小関係は保たれる
        assert!(samples[1] < 0.0);
        assert!(samples[0] > 0.0);
    }

    /// 空の音声データは何もしない
    #[test]
    fn test_preprocess_audio_empty() {
        let mut samples: Vec<f32> = Vec::new();
        preprocess_audio(&mut samples);
        assert!(samples.is_empty());
    }

    /// 無音（全ゼロ）は変化しない
    #[test]
    fn test_preprocess_audio_silence() {
        let mut samples = vec![0.0f32; 100];
        preprocess_audio(&mut samples);
        assert!(samples.iter().all(|&x| x == 0.0));
    }

    /// 既にピークが大きい音声は縮小される
    #[test]
    fn test_preprocess_audio_scales_down() {
        let mut samples = vec![2.0f32, -2.0, 1.0];

        preprocess_audio(&mut samples);

        let max_abs = samples.iter().map(|&x| x.abs()).fold(0.0f32, f32::max);
        assert!((max_abs - 0.95).abs() < 1e-6);
    }
}
