use crate::config::Config;
use anyhow::Result;
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_sagemaker::error::DisplayErrorContext;
use aws_sdk_sagemaker::types::{
    ContainerDefinition, EndpointStatus, ProductionVariant, ProductionVariantInstanceType,
};
use chrono::Utc;
use std::path::Path;
use std::time::{Duration, Instant};

/// SageMakerがこのロールを引き受けるための信頼ポリシー
pub fn trust_policy_document() -> String {
    serde_json::json!({
        "Version": "2012-10-17",
        "Statement": [
            {
                "Effect": "Allow",
                "Principal": {"Service": "sagemaker.amazonaws.com"},
                "Action": "sts:AssumeRole"
            }
        ]
    })
    .to_string()
}

/// 共有のAWS設定をロード（認証情報は環境の既定チェーンに従う）
pub async fn load_aws_config(config: &Config) -> aws_config::SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(aws_config::Region::new(config.aws.region.clone()))
        .load()
        .await
}

/// SageMaker実行ロールを用意する
/// - 無ければ作成して AmazonSageMakerFullAccess をアタッチ
/// - 既に存在する場合はそのARNを返す
pub async fn ensure_execution_role(iam: &aws_sdk_iam::Client, role_name: &str) -> Result<String> {
    log::info!("IAMロールを作成します: {}", role_name);

    match iam
        .create_role()
        .role_name(role_name)
        .assume_role_policy_document(trust_policy_document())
        .description("SageMaker execution role for the whisper endpoint")
        .send()
        .await
    {
        Ok(output) => {
            iam.attach_role_policy()
                .role_name(role_name)
                .policy_arn("arn:aws:iam::aws:policy/AmazonSageMakerFullAccess")
                .send()
                .await
                .map_err(|e| {
                    anyhow::anyhow!("ポリシーのアタッチに失敗: {}", DisplayErrorContext(e))
                })?;

            let role_arn = output
                .role()
                .map(|role| role.arn().to_string())
                .ok_or_else(|| anyhow::anyhow!("作成したロールの情報が返されませんでした"))?;

            log::info!("ロールを作成しました: {}", role_arn);
            Ok(role_arn)
        }
        Err(err) => {
            let service_err = err.into_service_error();
            if service_err.is_entity_already_exists_exception() {
                // ロールが既に存在する場合はARNを取得して返す
                let output = iam
                    .get_role()
                    .role_name(role_name)
                    .send()
                    .await
                    .map_err(|e| {
                        anyhow::anyhow!("既存ロールの取得に失敗: {}", DisplayErrorContext(e))
                    })?;

                let role_arn = output
                    .role()
                    .map(|role| role.arn().to_string())
                    .ok_or_else(|| anyhow::anyhow!("既存ロールの情報が返されませんでした"))?;

                log::info!("ロールは既に存在します: {}", role_arn);
                Ok(role_arn)
            } else {
                Err(anyhow::anyhow!(
                    "ロール '{}' の作成に失敗: {}",
                    role_name,
                    DisplayErrorContext(service_err)
                ))
            }
        }
    }
}

/// アーティファクト用のS3バケットを用意する（無ければ作成）
pub async fn ensure_bucket(s3: &aws_sdk_s3::Client, bucket: &str, region: &str) -> Result<()> {
    match s3.head_bucket().bucket(bucket).send().await {
        Ok(_) => {
            log::info!("S3バケットを使用します: {}", bucket);
            Ok(())
        }
        Err(err) => {
            let service_err = err.into_service_error();
            if service_err.is_not_found() {
                log::info!("S3バケットを作成します: {}", bucket);

                let mut request = s3.create_bucket().bucket(bucket);

                // us-east-1 以外では LocationConstraint の指定が必要
                if region != "us-east-1" {
                    request = request.create_bucket_configuration(
                        CreateBucketConfiguration::builder()
                            .location_constraint(BucketLocationConstraint::from(region))
                            .build(),
                    );
                }

                request.send().await.map_err(|e| {
                    anyhow::anyhow!("バケットの作成に失敗: {} - {}", bucket, DisplayErrorContext(e))
                })?;

                Ok(())
            } else {
                Err(anyhow::anyhow!(
                    "バケットの確認に失敗: {} - {}",
                    bucket,
                    DisplayErrorContext(service_err)
                ))
            }
        }
    }
}

/// アーティファクトのS3キーを組み立て
pub fn artifact_key(prefix: &str, file_name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", prefix, file_name)
    }
}

/// S3上のモデルデータURL
pub fn model_data_url(bucket: &str, key: &str) -> String {
    format!("s3://{}/{}", bucket, key)
}

/// モデルアーティファクトをS3へアップロードし、s3:// URLを返す
pub async fn upload_artifact(
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    path: &Path,
) -> Result<String> {
    let body = ByteStream::from_path(path).await.map_err(|e| {
        anyhow::anyhow!("アーティファクトが読めません: {} - {}", path.display(), e)
    })?;

    s3.put_object()
        .bucket(bucket)
        .key(key)
        .body(body)
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("アップロードに失敗: {}", DisplayErrorContext(e)))?;

    Ok(model_data_url(bucket, key))
}

/// デプロイごとのタイムスタンプ（UTC）
pub fn deployment_timestamp() -> String {
    Utc::now().format("%Y%m%d%H%M%S").to_string()
}

/// モデル名とエンドポイント設定名を組み立て
/// - 再デプロイ時の衝突を避けるためタイムスタンプを付与する
pub fn resource_names(endpoint_name: &str, timestamp: &str) -> (String, String) {
    (
        format!("{}-model-{}", endpoint_name, timestamp),
        format!("{}-config-{}", endpoint_name, timestamp),
    )
}

/// SageMakerモデルリソースを登録する
pub async fn register_model(
    sm: &aws_sdk_sagemaker::Client,
    model_name: &str,
    container_image: &str,
    model_data_url: &str,
    role_arn: &str,
) -> Result<()> {
    let container = ContainerDefinition::builder()
        .image(container_image)
        .model_data_url(model_data_url)
        .build();

    sm.create_model()
        .model_name(model_name)
        .primary_container(container)
        .execution_role_arn(role_arn)
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("モデルの登録に失敗: {}", DisplayErrorContext(e)))?;

    Ok(())
}

/// エンドポイント設定を作成する（固定のインスタンス構成）
pub async fn create_endpoint_config(
    sm: &aws_sdk_sagemaker::Client,
    endpoint_config_name: &str,
    model_name: &str,
    instance_type: &str,
    initial_instance_count: i32,
) -> Result<()> {
    let variant = ProductionVariant::builder()
        .variant_name("AllTraffic")
        .model_name(model_name)
        .initial_instance_count(initial_instance_count)
        .instance_type(ProductionVariantInstanceType::from(instance_type))
        .build();

    sm.create_endpoint_config()
        .endpoint_config_name(endpoint_config_name)
        .production_variants(variant)
        .send()
        .await
        .map_err(|e| {
            anyhow::anyhow!("エンドポイント設定の作成に失敗: {}", DisplayErrorContext(e))
        })?;

    Ok(())
}

/// エンドポイントが存在するか確認
async fn endpoint_exists(sm: &aws_sdk_sagemaker::Client, endpoint_name: &str) -> Result<bool> {
    match sm
        .describe_endpoint()
        .endpoint_name(endpoint_name)
        .send()
        .await
    {
        Ok(_) => Ok(true),
        Err(err) => {
            // 存在しないエンドポイントは ValidationException（"Could not find endpoint ..."）になる
            let message = format!("{}", DisplayErrorContext(&err));
            if message.contains("Could not find endpoint") {
                Ok(false)
            } else {
                Err(anyhow::anyhow!(
                    "エンドポイントの確認に失敗: {}",
                    message
                ))
            }
        }
    }
}

/// エンドポイントを作成、または既存のエンドポイントを新しい設定に更新する
/// - 戻り値: 新規作成なら true、更新なら false
pub async fn deploy_endpoint(
    sm: &aws_sdk_sagemaker::Client,
    endpoint_name: &str,
    endpoint_config_name: &str,
) -> Result<bool> {
    if endpoint_exists(sm, endpoint_name).await? {
        log::info!("既存のエンドポイントを更新します: {}", endpoint_name);
        sm.update_endpoint()
            .endpoint_name(endpoint_name)
            .endpoint_config_name(endpoint_config_name)
            .send()
            .await
            .map_err(|e| {
                anyhow::anyhow!("エンドポイントの更新に失敗: {}", DisplayErrorContext(e))
            })?;
        Ok(false)
    } else {
        log::info!("新しいエンドポイントを作成します: {}", endpoint_name);
        sm.create_endpoint()
            .endpoint_name(endpoint_name)
            .endpoint_config_name(endpoint_config_name)
            .send()
            .await
            .map_err(|e| {
                anyhow::anyhow!("エンドポイントの作成に失敗: {}", DisplayErrorContext(e))
            })?;
        Ok(true)
    }
}

/// エンドポイントが InService になるまでポーリングする
pub async fn wait_until_in_service(
    sm: &aws_sdk_sagemaker::Client,
    endpoint_name: &str,
    poll_interval: Duration,
    max_wait: Duration,
) -> Result<()> {
    let started = Instant::now();

    loop {
        let output = sm
            .describe_endpoint()
            .endpoint_name(endpoint_name)
            .send()
            .await
            .map_err(|e| {
                anyhow::anyhow!("エンドポイントの状態取得に失敗: {}", DisplayErrorContext(e))
            })?;

        let status = output
            .endpoint_status()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("エンドポイントの状態が取得できません"))?;

        match status {
            EndpointStatus::InService => {
                log::info!("エンドポイントが利用可能になりました: {}", endpoint_name);
                return Ok(());
            }
            EndpointStatus::Failed => {
                let reason = output.failure_reason().unwrap_or("不明");
                return Err(anyhow::anyhow!(
                    "エンドポイントのデプロイに失敗しました: {}",
                    reason
                ));
            }
            other => {
                log::info!("エンドポイントの状態: {} (待機中...)", other.as_str());
            }
        }

        if started.elapsed() > max_wait {
            return Err(anyhow::anyhow!(
                "エンドポイントの待機時間を超過しました ({}分)",
                max_wait.as_secs() / 60
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}
