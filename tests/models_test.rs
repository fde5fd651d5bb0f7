use serde_json::json;
use WhisperEndpointAPI::models::*;

#[cfg(test)]
mod models_tests {
    use super::*;

    /// チェックポイントカタログのテスト
    mod catalog_tests {
        use super::*;

        /// 既定エントリの存在確認
        #[test]
        fn test_catalog_default_entries() {
            let catalog = CheckpointCatalog::default();

            for key in ["tiny", "base", "small", "large-v3-turbo-q5_0"] {
                let def = catalog.get(key).unwrap_or_else(|| {
                    panic!("カタログにエントリがありません: {}", key)
                });

                assert!(!def.name.is_empty());
                assert!(def.download_url.starts_with("https://"));
                assert!(def.download_url.ends_with(&def.file_name));
                assert!(def.file_name.starts_with("ggml-"));
                assert!(def.file_name.ends_with(".bin"));
                assert!(def.size_mb > 0);
            }
        }

        /// 未知のキーはNone
        #[test]
        fn test_catalog_unknown_key() {
            let catalog = CheckpointCatalog::default();
            assert!(catalog.get("no-such-model").is_none());
        }

        /// known_keysはソート済み
        #[test]
        fn test_catalog_known_keys_sorted() {
            let catalog = CheckpointCatalog::default();
            let keys = catalog.known_keys();

            assert_eq!(keys.len(), 4);
            let mut sorted = keys.clone();
            sorted.sort();
            assert_eq!(keys, sorted);
        }
    }

    /// リクエスト/レスポンス型のテスト
    mod api_model_tests {
        use super::*;

        /// InvocationRequestのデシリアライズ
        #[test]
        fn test_invocation_request_deserialize() {
            let request: InvocationRequest =
                serde_json::from_value(json!({ "audio_b64": "UklGRg==" })).unwrap();

            assert_eq!(request.audio_b64, "UklGRg==");
        }

        /// audio_b64フィールドの欠落はエラー
        #[test]
        fn test_invocation_request_missing_field() {
            let result: Result<InvocationRequest, _> = serde_json::from_value(json!({}));
            assert!(result.is_err());
        }

        /// InvocationResponseのシリアライズ
        #[test]
        fn test_invocation_response_serialize() {
            let response = InvocationResponse {
                text: "こんにちは".to_string(),
                duration_ms: Some(1000),
                processing_time_ms: 250,
            };

            let value = serde_json::to_value(&response).unwrap();
            assert_eq!(value["text"], "こんにちは");
            assert_eq!(value["duration_ms"], 1000);
            assert_eq!(value["processing_time_ms"], 250);
        }

        /// クライアント側は未知のフィールドを無視して text を読める
        #[test]
        fn test_invocation_response_tolerates_unknown_fields() {
            let response: InvocationResponse = serde_json::from_value(json!({
                "text": "hello",
                "duration_ms": 500,
                "processing_time_ms": 100,
                "extra_field": "ignored"
            }))
            .unwrap();

            assert_eq!(response.text, "hello");
        }

        /// ErrorResponseのシリアライズ
        #[test]
        fn test_error_response_serialize() {
            let response = ErrorResponse {
                error: "テストエラー".to_string(),
                code: "INVALID_INPUT".to_string(),
                details: None,
            };

            let value = serde_json::to_value(&response).unwrap();
            assert_eq!(value["error"], "テストエラー");
            assert_eq!(value["code"], "INVALID_INPUT");
        }

        /// HealthResponseのシリアライズ
        #[test]
        fn test_health_response_serialize() {
            let response = HealthResponse {
                status: "healthy".to_string(),
                version: "0.1.0".to_string(),
                model_loaded: true,
                uptime_seconds: 42,
            };

            let value = serde_json::to_value(&response).unwrap();
            assert_eq!(value["status"], "healthy");
            assert_eq!(value["model_loaded"], true);
            assert_eq!(value["uptime_seconds"], 42);
        }
    }

    /// サーバー統計のテスト
    mod stats_tests {
        use super::*;

        /// 初期値のテスト
        #[test]
        fn test_stats_default() {
            let stats = ServerStats::default();

            assert_eq!(stats.total_requests, 0);
            assert_eq!(stats.successful_transcriptions, 0);
            assert_eq!(stats.failed_transcriptions, 0);
            assert_eq!(stats.active_requests, 0);
            assert_eq!(stats.success_rate(), 0.0);
        }

        /// リクエスト記録のテスト
        #[test]
        fn test_stats_record_request() {
            let mut stats = ServerStats::default();

            stats.record_request();
            stats.record_request();

            assert_eq!(stats.total_requests, 2);
            assert_eq!(stats.active_requests, 2);
        }

        /// 成功記録と平均処理時間のテスト
        #[test]
        fn test_stats_record_success() {
            let mut stats = ServerStats::default();

            stats.record_request();
            stats.record_success(100);
            stats.record_request();
            stats.record_success(300);

            assert_eq!(stats.successful_transcriptions, 2);
            assert_eq!(stats.total_processing_time_ms, 400);
            assert_eq!(stats.average_processing_time_ms, 200.0);
            assert_eq!(stats.active_requests, 0);
        }

        /// 失敗記録のテスト
        #[test]
        fn test_stats_record_failure() {
            let mut stats = ServerStats::default();

            stats.record_request();
            stats.record_failure();

            assert_eq!(stats.failed_transcriptions, 1);
            assert_eq!(stats.active_requests, 0);

            // アクティブ数は0未満にならない
            stats.record_failure();
            assert_eq!(stats.active_requests, 0);
        }

        /// 成功率のテスト
        #[test]
        fn test_stats_success_rate() {
            let mut stats = ServerStats::default();

            stats.record_request();
            stats.record_success(100);
            stats.record_request();
            stats.record_failure();

            assert_eq!(stats.success_rate(), 50.0);
        }
    }

    /// APIエラーコードのテスト
    mod error_code_tests {
        use super::*;

        /// エラーコードの文字列表現
        #[test]
        fn test_api_error_code_as_str() {
            assert_eq!(ApiErrorCode::InvalidInput.as_str(), "INVALID_INPUT");
            assert_eq!(ApiErrorCode::PayloadTooLarge.as_str(), "PAYLOAD_TOO_LARGE");
            assert_eq!(ApiErrorCode::UnsupportedFormat.as_str(), "UNSUPPORTED_FORMAT");
            assert_eq!(ApiErrorCode::ProcessingFailed.as_str(), "PROCESSING_FAILED");
            assert_eq!(ApiErrorCode::ModelNotLoaded.as_str(), "MODEL_NOT_LOADED");
            assert_eq!(ApiErrorCode::InternalError.as_str(), "INTERNAL_ERROR");
        }
    }
}
