use crate::config::Config;
use crate::models::CheckpointCatalog;
use anyhow::Result;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tar::{Archive, Builder, EntryType, Header};

/// アーカイブ直下に配置するモデルファイル名
/// - SageMaker はアーカイブを /opt/ml/model に展開するため、
///   推論側の model_path（/opt/ml/model/model.bin）と対応している
pub const MODEL_FILE_NAME: &str = "model.bin";

/// モデルアーティファクト（model.tar.gz）を準備する
/// - チェックポイントが無ければダウンロード
/// - 有効なアーカイブが既にあればパッケージングをスキップ
/// - パッケージング後に検証を行い、壊れたアーカイブは即座にエラーにする
pub fn prepare_model_artifact(config: &Config) -> Result<PathBuf> {
    let out_tar = config.artifact_path();

    // 既存アーカイブの検証付きスキップ
    // - 存在するだけでなく、model.bin を含む読めるアーカイブであること
    if archive_contains_model(&out_tar) {
        log::info!(
            "モデルアーティファクトが既に存在します: {} (パッケージングをスキップ)",
            out_tar.display()
        );
        return Ok(out_tar);
    }

    let checkpoint = ensure_checkpoint(config)?;

    log::info!(
        "チェックポイントをパッケージングします: {} → {}",
        checkpoint.display(),
        out_tar.display()
    );
    package_checkpoint(&checkpoint, &out_tar)?;

    // パッケージング直後の検証
    if !archive_contains_model(&out_tar) {
        return Err(anyhow::anyhow!(
            "検証に失敗しました: {} は有効なモデルアーカイブではありません",
            out_tar.display()
        ));
    }

    log::info!("モデルアーティファクトを作成しました: {}", out_tar.display());
    Ok(out_tar)
}

/// 設定されたチェックポイントのローカルパスを返す（無ければダウンロード）
pub fn ensure_checkpoint(config: &Config) -> Result<PathBuf> {
    let catalog = CheckpointCatalog::default();
    let def = catalog.get(&config.whisper.checkpoint).ok_or_else(|| {
        anyhow::anyhow!(
            "未知のチェックポイント: {}\n利用可能なチェックポイント: {}",
            config.whisper.checkpoint,
            catalog.known_keys().join(", ")
        )
    })?;

    let path = Path::new(&config.paths.artifacts_dir).join(&def.file_name);

    if !path.exists() {
        log::info!(
            "チェックポイントをダウンロードします: {} → {}",
            def.download_url,
            path.display()
        );
        download_to_file(&def.download_url, &path)?;
        log::info!("チェックポイントを保存しました: {}", path.display());
    }

    let metadata = fs::metadata(&path)
        .map_err(|e| anyhow::anyhow!("チェックポイントの確認に失敗: {} - {}", path.display(), e))?;
    if metadata.len() == 0 {
        return Err(anyhow::anyhow!(
            "チェックポイントが空です: {}",
            path.display()
        ));
    }

    Ok(path)
}

/// URLからファイルへダウンロード（ブロッキング）
fn download_to_file(url: &str, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let client = reqwest::blocking::Client::builder().build()?;
    let mut response = client.get(url).send()?;

    if !response.status().is_success() {
        return Err(anyhow::anyhow!(
            "ダウンロードに失敗しました: HTTP {} - {}",
            response.status(),
            url
        ));
    }

    let mut file = File::create(dest)?;
    io::copy(&mut response, &mut file)?;

    Ok(())
}

/// チェックポイントを model.bin としてアーカイブ直下に配置した tar.gz を作成
/// - メタデータ（uid/gid/mode/mtime）を正規化し、同じ入力から同じアーカイブを生成する
pub fn package_checkpoint(checkpoint: &Path, out_tar: &Path) -> Result<()> {
    let size = fs::metadata(checkpoint)
        .map_err(|e| anyhow::anyhow!("チェックポイントが読めません: {} - {}", checkpoint.display(), e))?
        .len();
    if size == 0 {
        return Err(anyhow::anyhow!(
            "チェックポイントが空です: {}",
            checkpoint.display()
        ));
    }

    if let Some(parent) = out_tar.parent() {
        fs::create_dir_all(parent)?;
    }

    let tar_gz = File::create(out_tar)
        .map_err(|e| anyhow::anyhow!("アーカイブの作成に失敗: {} - {}", out_tar.display(), e))?;
    let encoder = GzEncoder::new(tar_gz, Compression::default());
    let mut builder = Builder::new(encoder);

    // メタデータの正規化
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_size(size);
    header.set_mode(0o644);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(0);

    let mut src = File::open(checkpoint)?;
    builder
        .append_data(&mut header, MODEL_FILE_NAME, &mut src)
        .map_err(|e| anyhow::anyhow!("tarへの追加に失敗: {}", e))?;

    let encoder = builder
        .into_inner()
        .map_err(|e| anyhow::anyhow!("tarの書き込みに失敗: {}", e))?;
    encoder
        .finish()
        .map_err(|e| anyhow::anyhow!("gzipの書き込みに失敗: {}", e))?;

    Ok(())
}

/// 有効なモデルアーカイブかどうかを判定
/// - 読める tar.gz であり、直下に空でない通常ファイル model.bin を含むこと
pub fn archive_contains_model(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }

    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return false,
    };

    let mut archive = Archive::new(GzDecoder::new(file));
    let entries = match archive.entries() {
        Ok(entries) => entries,
        Err(_) => return false,
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(_) => return false,
        };

        let is_model = entry
            .path()
            .map(|p| p.as_ref() == Path::new(MODEL_FILE_NAME))
            .unwrap_or(false);

        if is_model
            && entry.header().entry_type().is_file()
            && entry.header().size().unwrap_or(0) > 0
        {
            return true;
        }
    }

    false
}

/// アーカイブから model.bin を展開して、そのパスを返す
/// - 往復（パッケージ→展開）の検証とテストで使用
pub fn unpack_model(tar_path: &Path, dest_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dest_dir)?;

    let file = File::open(tar_path)
        .map_err(|e| anyhow::anyhow!("アーカイブが開けません: {} - {}", tar_path.display(), e))?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive
        .unpack(dest_dir)
        .map_err(|e| anyhow::anyhow!("アーカイブの展開に失敗: {}", e))?;

    let model_path = dest_dir.join(MODEL_FILE_NAME);
    if !model_path.exists() {
        return Err(anyhow::anyhow!(
            "アーカイブに {} が含まれていません: {}",
            MODEL_FILE_NAME,
            tar_path.display()
        ));
    }

    Ok(model_path)
}
