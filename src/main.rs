use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use WhisperEndpointAPI::config::Config;
use WhisperEndpointAPI::handlers::{self, AppState};
use WhisperEndpointAPI::whisper::WhisperEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ログの初期化
    env_logger::init();

    println!("WhisperEndpointAPI serve を起動中...");

    // 設定ファイルの読み込み
    let config = Config::load_or_create_default("config.toml")?;

    // 設定の検証
    config.validate()?;

    println!("設定ファイルを読み込みました");
    println!("サーバーアドレス: {}", config.server_address());
    println!("モデルパス: {}", config.whisper.model_path);

    // アプリケーション状態の初期化
    let mut app_state = AppState::new(config.clone());

    // Whisperエンジンの初期化
    // - 失敗してもサーバーは起動する。/ping が unhealthy を返し続けるため、
    //   ホスティング側のヘルスチェックがコンテナを異常とみなす
    match WhisperEngine::new(&config.whisper.model_path, &config) {
        Ok(engine) => {
            println!("Whisperエンジンを初期化しました");
            app_state = app_state.with_whisper_engine(engine);
        }
        Err(e) => {
            eprintln!("Whisperエンジンの初期化に失敗しました: {}", e);
            eprintln!("サーバーは起動しますが、推論リクエストは受け付けられません");
        }
    }

    // ルーターの構築
    // - /ping と /invocations は SageMaker 推論コンテナの契約
    let app = Router::new()
        .route("/invocations", post(handlers::invocations))
        .route("/ping", get(handlers::ping))
        .route("/stats", get(handlers::get_stats))
        // ミドルウェアの追加
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        // base64化されたWAVを受け取るためボディ上限を設定値まで引き上げる
        .layer(DefaultBodyLimit::max(config.server.max_request_size))
        // アプリケーション状態の共有
        .with_state(app_state);

    // サーバーアドレスの解析
    let addr: SocketAddr = config
        .server_address()
        .parse()
        .map_err(|e| anyhow::anyhow!("無効なサーバーアドレス: {}", e))?;

    println!("サーバーを起動します: http://{}", addr);
    println!("API エンドポイント:");
    println!("  POST /invocations - 文字起こし (JSON: {{\"audio_b64\": ...}})");
    println!("  GET  /ping - ヘルスチェック");
    println!("  GET  /stats - サーバー統計情報");
    println!();
    println!("使用例:");
    println!(
        "  curl -H 'Content-Type: application/json' \\\n       -d '{{\"audio_b64\": \"'$(base64 -w0 audio.wav)'\"}}' \\\n       http://{}/invocations",
        addr
    );

    // サーバーの起動
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("サーバーの起動に失敗: {}", e))?;

    Ok(())
}
