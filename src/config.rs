use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub whisper: WhisperConfig,
    pub audio: AudioConfig,
    pub aws: AwsConfig,
    pub endpoint: EndpointConfig,
    pub client: ClientConfig,
    pub paths: PathsConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_request_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperConfig {
    pub model_path: String,
    pub checkpoint: String,
    pub language: String,
    pub enable_gpu: bool,
    pub threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    pub region: String,
    pub bucket: String,
    pub s3_prefix: String,
    pub role_name: String,
    /// 既存の実行ロールARN。指定されている場合はIAMへの問い合わせを省略する
    pub execution_role_arn: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub endpoint_name: String,
    pub container_image: String,
    pub instance_type: String,
    pub initial_instance_count: i32,
    pub wait_for_in_service: bool,
    pub poll_interval_seconds: u64,
    pub max_wait_minutes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub sample_wav: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub artifacts_dir: String,
    pub temp_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_payload_size_mb: usize,
    pub max_audio_duration_minutes: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                // SageMaker 推論コンテナの規約ポート
                port: 8080,
                max_request_size: 8 * 1024 * 1024, // 8MB
            },
            whisper: WhisperConfig {
                // SageMaker がアーティファクトを展開するモデルディレクトリ
                model_path: "/opt/ml/model/model.bin".to_string(),
                checkpoint: "large-v3-turbo-q5_0".to_string(),
                language: "auto".to_string(),
                enable_gpu: true,
                threads: 4,
            },
            audio: AudioConfig {
                sample_rate: 16000,
                channels: 1,
            },
            aws: AwsConfig {
                region: "ap-northeast-1".to_string(),
                bucket: "whisper-endpoint-artifacts".to_string(),
                s3_prefix: "whisper-endpoint".to_string(),
                role_name: "WhisperEndpointExecutionRole".to_string(),
                execution_role_arn: None,
            },
            endpoint: EndpointConfig {
                endpoint_name: "whisper-endpoint-demo".to_string(),
                container_image: String::new(),
                instance_type: "ml.g5.xlarge".to_string(),
                initial_instance_count: 1,
                wait_for_in_service: true,
                poll_interval_seconds: 15,
                max_wait_minutes: 30,
            },
            client: ClientConfig {
                sample_wav: "samples/speech-16k-mono.wav".to_string(),
            },
            paths: PathsConfig {
                artifacts_dir: "artifacts".to_string(),
                temp_dir: "temp".to_string(),
            },
            limits: LimitsConfig {
                // リアルタイムエンドポイントのペイロード上限に合わせる
                max_payload_size_mb: 6,
                max_audio_duration_minutes: 10,
            },
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn load_or_create_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            match Self::load_from_file(&path) {
                Ok(config) => Ok(config),
                Err(e) => {
                    eprintln!("設定ファイルの読み込みに失敗しました: {}. デフォルト設定を使用します。", e);
                    let config = Self::default();
                    config.save_to_file(&path)?;
                    Ok(config)
                }
            }
        } else {
            let config = Self::default();
            config.save_to_file(&path)?;
            println!("デフォルト設定ファイルを作成しました: {}", path.as_ref().display());
            Ok(config)
        }
    }

    /// 全バイナリ共通の構造チェック
    pub fn validate(&self) -> Result<()> {
        // ポート番号の検証
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("無効なポート番号: {}", self.server.port));
        }

        // 入力契約の検証
        // - エンドポイントは 16kHz モノラル PCM のみ受け付ける（リサンプリングしない）
        if self.audio.sample_rate != crate::audio::REQUIRED_SAMPLE_RATE {
            return Err(anyhow::anyhow!(
                "サンプリングレートは16000Hz固定です: {}",
                self.audio.sample_rate
            ));
        }
        if self.audio.channels != 1 {
            return Err(anyhow::anyhow!(
                "チャンネル数は1（モノラル）固定です: {}",
                self.audio.channels
            ));
        }

        if self.whisper.threads == 0 {
            return Err(anyhow::anyhow!("Whisperスレッド数は1以上である必要があります"));
        }

        if self.endpoint.endpoint_name.trim().is_empty() {
            return Err(anyhow::anyhow!("エンドポイント名が設定されていません"));
        }

        if self.endpoint.initial_instance_count < 1 {
            return Err(anyhow::anyhow!("インスタンス数は1以上である必要があります"));
        }

        if self.endpoint.poll_interval_seconds == 0 {
            return Err(anyhow::anyhow!("ポーリング間隔は1秒以上である必要があります"));
        }

        if self.limits.max_payload_size_mb == 0 {
            return Err(anyhow::anyhow!("最大ペイロードサイズは1MB以上である必要があります"));
        }

        if self.limits.max_audio_duration_minutes == 0 {
            return Err(anyhow::anyhow!("最大音声時間は1分以上である必要があります"));
        }

        // 作業ディレクトリの存在確認と作成
        for dir in &[&self.paths.artifacts_dir, &self.paths.temp_dir] {
            if !Path::new(dir).exists() {
                fs::create_dir_all(dir)
                    .map_err(|e| anyhow::anyhow!("ディレクトリの作成に失敗: {} - {}", dir, e))?;
            }
        }

        Ok(())
    }

    /// デプロイ時にのみ必要となる設定のチェック
    pub fn validate_for_deploy(&self) -> Result<()> {
        if self.aws.region.trim().is_empty() {
            return Err(anyhow::anyhow!("AWSリージョンが設定されていません"));
        }

        if self.aws.bucket.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "アーティファクト用のS3バケット名が設定されていません"
            ));
        }

        if self.endpoint.container_image.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "推論コンテナイメージ（ECR URI）が設定されていません。\n\
                 config.toml の [endpoint] container_image に serve バイナリを含む\n\
                 イメージの URI を指定してください"
            ));
        }

        Ok(())
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn max_payload_size_bytes(&self) -> usize {
        self.limits.max_payload_size_mb * 1024 * 1024
    }

    /// パッケージ済みアーティファクトの出力先
    pub fn artifact_path(&self) -> PathBuf {
        Path::new(&self.paths.artifacts_dir).join("model.tar.gz")
    }
}
