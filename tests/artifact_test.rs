use std::fs;
use tempfile::TempDir;
use WhisperEndpointAPI::artifact::*;
use WhisperEndpointAPI::config::Config;

#[cfg(test)]
mod artifact_tests {
    use super::*;

    /// テスト用のダミーチェックポイントを作成
    fn create_dummy_checkpoint(temp_dir: &TempDir, name: &str, size: usize) -> std::path::PathBuf {
        let path = temp_dir.path().join(name);
        let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &data).unwrap();
        path
    }

    /// model.bin 以外のファイルを含む tar.gz を作成
    fn create_wrong_layout_archive(temp_dir: &TempDir) -> std::path::PathBuf {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let content = b"not a model";
        let out_path = temp_dir.path().join("wrong.tar.gz");

        let tar_gz = fs::File::create(&out_path).unwrap();
        let encoder = GzEncoder::new(tar_gz, Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);

        builder
            .append_data(&mut header, "other.bin", &content[..])
            .unwrap();
        let encoder = builder.into_inner().unwrap();
        encoder.finish().unwrap();

        out_path
    }

    /// パッケージ→展開の往復でチェックポイントがビット単位で一致する
    #[test]
    fn test_package_unpack_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let checkpoint = create_dummy_checkpoint(&temp_dir, "checkpoint.bin", 10_000);
        let out_tar = temp_dir.path().join("model.tar.gz");

        package_checkpoint(&checkpoint, &out_tar).unwrap();
        assert!(out_tar.exists());
        assert!(archive_contains_model(&out_tar));

        let dest_dir = temp_dir.path().join("unpacked");
        let model_path = unpack_model(&out_tar, &dest_dir).unwrap();

        // 元のチェックポイントと展開後のファイルを比較
        let original = fs::read(&checkpoint).unwrap();
        let unpacked = fs::read(&model_path).unwrap();
        assert_eq!(original, unpacked);
    }

    /// 同じ入力からは同一のアーカイブが生成される（再現可能なパッケージング）
    #[test]
    fn test_package_deterministic() {
        let temp_dir = TempDir::new().unwrap();
        let checkpoint = create_dummy_checkpoint(&temp_dir, "checkpoint.bin", 10_000);

        let tar_a = temp_dir.path().join("a.tar.gz");
        let tar_b = temp_dir.path().join("b.tar.gz");

        package_checkpoint(&checkpoint, &tar_a).unwrap();
        package_checkpoint(&checkpoint, &tar_b).unwrap();

        let bytes_a = fs::read(&tar_a).unwrap();
        let bytes_b = fs::read(&tar_b).unwrap();
        assert_eq!(bytes_a, bytes_b);
    }

    /// 空のチェックポイントはパッケージングに失敗する
    #[test]
    fn test_package_empty_checkpoint_fails() {
        let temp_dir = TempDir::new().unwrap();
        let checkpoint = create_dummy_checkpoint(&temp_dir, "empty.bin", 0);
        let out_tar = temp_dir.path().join("model.tar.gz");

        let result = package_checkpoint(&checkpoint, &out_tar);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("チェックポイントが空です"));
    }

    /// 存在しないパスは有効なアーカイブではない
    #[test]
    fn test_archive_contains_model_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nonexistent.tar.gz");

        assert!(!archive_contains_model(&missing));
    }

    /// 壊れたファイルは有効なアーカイブではない
    #[test]
    fn test_archive_contains_model_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let corrupt = temp_dir.path().join("corrupt.tar.gz");
        fs::write(&corrupt, b"this is definitely not a tar.gz archive").unwrap();

        assert!(!archive_contains_model(&corrupt));
    }

    /// model.bin を含まないアーカイブは無効
    #[test]
    fn test_archive_contains_model_wrong_layout() {
        let temp_dir = TempDir::new().unwrap();
        let wrong = create_wrong_layout_archive(&temp_dir);

        assert!(!archive_contains_model(&wrong));
    }

    /// model.bin を含まないアーカイブの展開はエラー
    #[test]
    fn test_unpack_model_wrong_layout() {
        let temp_dir = TempDir::new().unwrap();
        let wrong = create_wrong_layout_archive(&temp_dir);
        let dest_dir = temp_dir.path().join("unpacked");

        let result = unpack_model(&wrong, &dest_dir);
        assert!(result.is_err());
    }

    /// 有効なアーカイブが既にある場合はパッケージングをスキップする
    #[test]
    fn test_prepare_skips_existing_archive() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.whisper.checkpoint = "tiny".to_string();
        config.paths.artifacts_dir = temp_dir.path().to_string_lossy().to_string();

        // チェックポイントを配置してからパッケージング
        create_dummy_checkpoint(&temp_dir, "ggml-tiny.bin", 5_000);
        let first = prepare_model_artifact(&config).unwrap();
        let first_bytes = fs::read(&first).unwrap();

        // チェックポイントを書き換えても、有効なアーカイブがあればスキップされる
        create_dummy_checkpoint(&temp_dir, "ggml-tiny.bin", 6_000);
        let second = prepare_model_artifact(&config).unwrap();
        let second_bytes = fs::read(&second).unwrap();

        assert_eq!(first, second);
        assert_eq!(first_bytes, second_bytes);
    }

    /// ローカルにチェックポイントがあればダウンロードせずにパッケージングする
    #[test]
    fn test_prepare_with_local_checkpoint() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.whisper.checkpoint = "tiny".to_string();
        config.paths.artifacts_dir = temp_dir.path().to_string_lossy().to_string();

        let checkpoint = create_dummy_checkpoint(&temp_dir, "ggml-tiny.bin", 5_000);

        let tar_path = prepare_model_artifact(&config).unwrap();
        assert!(archive_contains_model(&tar_path));

        // 往復でチェックポイントが一致する
        let dest_dir = temp_dir.path().join("unpacked");
        let model_path = unpack_model(&tar_path, &dest_dir).unwrap();
        assert_eq!(fs::read(&checkpoint).unwrap(), fs::read(&model_path).unwrap());
    }

    /// 未知のチェックポイント名はエラー
    #[test]
    fn test_prepare_unknown_checkpoint() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.whisper.checkpoint = "no-such-checkpoint".to_string();
        config.paths.artifacts_dir = temp_dir.path().to_string_lossy().to_string();

        let result = prepare_model_artifact(&config);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("未知のチェックポイント"));
    }
}
