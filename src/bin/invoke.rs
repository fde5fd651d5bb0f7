// invoke — デプロイ済みエンドポイントの動作確認クライアント
//
// 実行内容:
//   1. サンプル音声ファイル（16kHzモノラルPCM WAV）を読み込み、base64エンコード
//   2. JSONペイロード {"audio_b64": "<base64>"} を組み立て
//   3. SageMakerランタイム経由でエンドポイントを呼び出し
//   4. レスポンスの transcript を表示
//
// 契約:
//   - 入力  (application/json): {"audio_b64": "<b64 WAV 16kHz mono PCM>"}
//   - 出力 (application/json): {"text": "<transcript>"}

use anyhow::Result;
use aws_sdk_sagemakerruntime::error::DisplayErrorContext;
use aws_sdk_sagemakerruntime::primitives::Blob;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::fs;
use WhisperEndpointAPI::config::Config;
use WhisperEndpointAPI::deploy;

#[tokio::main]
async fn main() -> Result<()> {
    // ログの初期化（未指定時はinfoレベル）
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 設定ファイルの読み込み
    let config = Config::load_or_create_default("config.toml")?;
    config.validate()?;

    // サンプル音声の読み込みとbase64エンコード
    let wav_path = &config.client.sample_wav;
    log::info!("音声ファイルをエンコードします: {}", wav_path);

    let wav_bytes = fs::read(wav_path).map_err(|e| {
        anyhow::anyhow!(
            "サンプル音声が読めません: {} - {}\n\
             16kHzモノラルPCMのWAVファイルを配置するか、config.toml の\n\
             [client] sample_wav を変更してください",
            wav_path,
            e
        )
    })?;

    let payload = serde_json::json!({ "audio_b64": BASE64.encode(&wav_bytes) });

    // エンドポイントの呼び出し
    let aws_config = deploy::load_aws_config(&config).await;
    let runtime = aws_sdk_sagemakerruntime::Client::new(&aws_config);

    log::info!(
        "エンドポイントを呼び出します: {}",
        config.endpoint.endpoint_name
    );

    let response = runtime
        .invoke_endpoint()
        .endpoint_name(&config.endpoint.endpoint_name)
        .content_type("application/json")
        .accept("application/json")
        .body(Blob::new(serde_json::to_vec(&payload)?))
        .send()
        .await
        .map_err(|e| {
            anyhow::anyhow!("エンドポイントの呼び出しに失敗: {}", DisplayErrorContext(e))
        })?;

    // レスポンスの解析
    let body = response
        .body()
        .ok_or_else(|| anyhow::anyhow!("レスポンスボディが空です"))?;

    let output: serde_json::Value = serde_json::from_slice(body.as_ref())
        .map_err(|e| anyhow::anyhow!("レスポンスのJSON解析に失敗: {}", e))?;

    // transcript フィールドの確認
    let text = output
        .get("text")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("予期しないレスポンス形式: {}", output))?;

    log::info!("文字起こし結果を受信しました");
    println!("Transcript: {}", text);

    Ok(())
}
