use WhisperEndpointAPI::deploy::*;

#[cfg(test)]
mod deploy_tests {
    use super::*;

    /// S3キーの組み立てテスト
    #[test]
    fn test_artifact_key() {
        assert_eq!(
            artifact_key("whisper-endpoint", "model.tar.gz"),
            "whisper-endpoint/model.tar.gz"
        );

        // 前後のスラッシュは正規化される
        assert_eq!(
            artifact_key("/whisper-endpoint/", "model.tar.gz"),
            "whisper-endpoint/model.tar.gz"
        );

        // プレフィックスなし
        assert_eq!(artifact_key("", "model.tar.gz"), "model.tar.gz");
    }

    /// モデルデータURLの組み立てテスト
    #[test]
    fn test_model_data_url() {
        assert_eq!(
            model_data_url("my-bucket", "whisper-endpoint/model.tar.gz"),
            "s3://my-bucket/whisper-endpoint/model.tar.gz"
        );
    }

    /// リソース名の組み立てテスト
    #[test]
    fn test_resource_names() {
        let (model_name, config_name) = resource_names("whisper-endpoint-demo", "20250101120000");

        assert_eq!(model_name, "whisper-endpoint-demo-model-20250101120000");
        assert_eq!(config_name, "whisper-endpoint-demo-config-20250101120000");
    }

    /// タイムスタンプの形式テスト（YYYYMMDDhhmmss）
    #[test]
    fn test_deployment_timestamp_format() {
        let timestamp = deployment_timestamp();

        assert_eq!(timestamp.len(), 14);
        assert!(timestamp.chars().all(|c| c.is_ascii_digit()));
    }

    /// 連続デプロイでリソース名が衝突しないことの確認
    #[test]
    fn test_resource_names_unique_per_timestamp() {
        let (model_a, config_a) = resource_names("ep", "20250101120000");
        let (model_b, config_b) = resource_names("ep", "20250101120001");

        assert_ne!(model_a, model_b);
        assert_ne!(config_a, config_b);
    }

    /// 信頼ポリシーのテスト
    #[test]
    fn test_trust_policy_document() {
        let policy = trust_policy_document();

        // 有効なJSONであること
        let parsed: serde_json::Value = serde_json::from_str(&policy).unwrap();

        assert_eq!(parsed["Version"], "2012-10-17");
        assert_eq!(
            parsed["Statement"][0]["Principal"]["Service"],
            "sagemaker.amazonaws.com"
        );
        assert_eq!(parsed["Statement"][0]["Action"], "sts:AssumeRole");
        assert_eq!(parsed["Statement"][0]["Effect"], "Allow");
    }
}
