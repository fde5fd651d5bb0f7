// deploy — Whisper ASRモデルをSageMakerエンドポイントへデプロイするスクリプト
//
// 実行内容:
//   1. モデルアーティファクトの準備（ダウンロード → パッケージ → tar.gz）
//   2. AWSリソースの設定（セッション、実行ロール）
//   3. アーティファクトのS3アップロード
//   4. SageMakerモデル定義の作成
//   5. エンドポイント設定の作成
//   6. エンドポイントのデプロイ（新規作成または更新）と待機
//
// いずれかのステップが失敗した時点で終了する（リトライしない）

use anyhow::Result;
use std::time::Duration;
use WhisperEndpointAPI::artifact;
use WhisperEndpointAPI::config::Config;
use WhisperEndpointAPI::deploy;

#[tokio::main]
async fn main() -> Result<()> {
    // ログの初期化（未指定時はinfoレベルで各ステップを表示）
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 設定ファイルの読み込みと検証
    let config = Config::load_or_create_default("config.toml")?;
    config.validate()?;
    config.validate_for_deploy()?;

    // Step 1: モデルアーティファクトの準備
    log::info!("Step 1: モデルアーティファクトを準備します...");
    let config_for_artifact = config.clone();
    let tar_path =
        tokio::task::spawn_blocking(move || artifact::prepare_model_artifact(&config_for_artifact))
            .await??;
    log::info!("モデルアーティファクト: {}", tar_path.display());

    // Step 2: AWSセッションと実行ロールの設定
    log::info!("Step 2: AWSリソースを設定します...");
    let aws_config = deploy::load_aws_config(&config).await;
    let s3 = aws_sdk_s3::Client::new(&aws_config);
    let sm = aws_sdk_sagemaker::Client::new(&aws_config);

    let role_arn = match &config.aws.execution_role_arn {
        Some(arn) => {
            log::info!("設定済みの実行ロールを使用します");
            arn.clone()
        }
        None => {
            let iam = aws_sdk_iam::Client::new(&aws_config);
            deploy::ensure_execution_role(&iam, &config.aws.role_name).await?
        }
    };
    log::info!("使用するIAMロール: {}", role_arn);
    log::info!("使用するS3バケット: {}", config.aws.bucket);

    // Step 3: モデルアーティファクトをS3へアップロード
    log::info!("Step 3: モデルアーティファクトをS3へアップロードします...");
    deploy::ensure_bucket(&s3, &config.aws.bucket, &config.aws.region).await?;
    let key = deploy::artifact_key(&config.aws.s3_prefix, "model.tar.gz");
    let model_s3_url = deploy::upload_artifact(&s3, &config.aws.bucket, &key, &tar_path).await?;
    log::info!("アップロード完了: {}", model_s3_url);

    // Step 4: SageMakerモデル定義の作成
    let timestamp = deploy::deployment_timestamp();
    let (model_name, endpoint_config_name) =
        deploy::resource_names(&config.endpoint.endpoint_name, &timestamp);

    log::info!("Step 4: SageMakerモデルを登録します: {}", model_name);
    deploy::register_model(
        &sm,
        &model_name,
        &config.endpoint.container_image,
        &model_s3_url,
        &role_arn,
    )
    .await?;

    // Step 5: エンドポイント設定の作成
    log::info!(
        "Step 5: エンドポイント設定を作成します: {} ({} x {})",
        endpoint_config_name,
        config.endpoint.instance_type,
        config.endpoint.initial_instance_count
    );
    deploy::create_endpoint_config(
        &sm,
        &endpoint_config_name,
        &model_name,
        &config.endpoint.instance_type,
        config.endpoint.initial_instance_count,
    )
    .await?;

    // Step 6: エンドポイントのデプロイ
    log::info!(
        "Step 6: エンドポイントをデプロイします: {}",
        config.endpoint.endpoint_name
    );
    let created =
        deploy::deploy_endpoint(&sm, &config.endpoint.endpoint_name, &endpoint_config_name).await?;

    if config.endpoint.wait_for_in_service {
        deploy::wait_until_in_service(
            &sm,
            &config.endpoint.endpoint_name,
            Duration::from_secs(config.endpoint.poll_interval_seconds),
            Duration::from_secs(config.endpoint.max_wait_minutes * 60),
        )
        .await?;
    }

    log::info!(
        "エンドポイントを{}しました: {}",
        if created { "作成" } else { "更新" },
        config.endpoint.endpoint_name
    );

    Ok(())
}
