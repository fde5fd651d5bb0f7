use crate::config::Config;
use anyhow::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::io::Cursor;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// エンドポイントが受け付けるサンプリングレート（Hz）
pub const REQUIRED_SAMPLE_RATE: u32 = 16_000;

/// デコード済み音声
/// - 入力契約（16kHzモノラルPCM）を満たした波形のみがこの型になる
#[derive(Debug)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub duration_ms: u64,
}

/// base64文字列を厳密にデコード
/// - パディング不正や不正文字はそのままエラーにする（自動補正しない）
pub fn decode_base64_audio(audio_b64: &str) -> Result<Vec<u8>> {
    if audio_b64.is_empty() {
        return Err(anyhow::anyhow!("audio_b64 が空です"));
    }

    BASE64
        .decode(audio_b64)
        .map_err(|e| anyhow::anyhow!("audio_b64 のbase64デコードに失敗: {}", e))
}

/// WAVコンテナかどうかを先頭バイトで判定
pub fn is_wav_container(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

/// WAVバイト列を厳密にデコードしてf32サンプル列へ変換
/// - 16kHz・モノラル以外はエラー（リサンプリングやチャンネルミックスは行わない）
pub fn decode_wav_strict(wav_bytes: Vec<u8>, config: &Config) -> Result<DecodedAudio> {
    if wav_bytes.is_empty() {
        return Err(anyhow::anyhow!("音声データが空です"));
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(wav_bytes)), Default::default());

    let mut hint = Hint::new();
    hint.with_extension("wav");

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .map_err(|e| anyhow::anyhow!("WAVの解析に失敗: {}", e))?;
    let mut format = probed.format;

    let (track_id, codec_params) = {
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| anyhow::anyhow!("音声トラックが見つかりません"))?;

        (track.id, track.codec_params.clone())
    };

    // 入力契約の検証
    // - デコード前にヘッダー情報で弾く
    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| anyhow::anyhow!("サンプリングレートが取得できません"))?;

    if sample_rate != config.audio.sample_rate {
        return Err(anyhow::anyhow!(
            "期待するサンプリングレートは{}Hzですが、{}Hzを受信しました",
            config.audio.sample_rate,
            sample_rate
        ));
    }

    let channels = codec_params
        .channels
        .map(|ch| ch.count() as u16)
        .ok_or_else(|| anyhow::anyhow!("チャンネル情報が取得できません"))?;

    if channels != config.audio.channels {
        return Err(anyhow::anyhow!(
            "モノラル（1チャンネル）のWAVが必要ですが、{}チャンネルを受信しました",
            channels
        ));
    }

    let dec_opts: DecoderOptions = Default::default();
    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &dec_opts)
        .map_err(|e| anyhow::anyhow!("デコーダの作成に失敗: {}", e))?;

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::ResetRequired) => break,
            Err(symphonia::core::errors::Error::IoError(ref err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(err) => return Err(anyhow::anyhow!("パケット読み込みエラー: {}", err)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(audio_buf) => {
                extract_mono_samples(&audio_buf, &mut samples)?;
            }
            Err(symphonia::core::errors::Error::IoError(ref err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(err) => return Err(anyhow::anyhow!("デコードエラー: {}", err)),
        }
    }

    if samples.is_empty() {
        return Err(anyhow::anyhow!("音声データが空です"));
    }

    let duration_ms = (samples.len() as f64 / sample_rate as f64 * 1000.0) as u64;

    Ok(DecodedAudio {
        samples,
        sample_rate,
        duration_ms,
    })
}

/// 音声の長さ制限をチェック
pub fn validate_audio_duration(duration_ms: u64, config: &Config) -> Result<()> {
    let max_duration_ms = config.limits.max_audio_duration_minutes as u64 * 60 * 1000;

    if duration_ms > max_duration_ms {
        return Err(anyhow::anyhow!(
            "音声が長すぎます: {:.1}分 > {:.1}分",
            duration_ms as f64 / 60_000.0,
            max_duration_ms as f64 / 60_000.0
        ));
    }
    Ok(())
}

/// モノラル前提のサンプル抽出
/// - チャンネル数は呼び出し前に検証済み
fn extract_mono_samples(audio_buf: &AudioBufferRef, samples: &mut Vec<f32>) -> Result<()> {
    match audio_buf {
        AudioBufferRef::F32(buf) => {
            samples.extend_from_slice(buf.chan(0));
        }
        AudioBufferRef::S32(buf) => {
            let frames = buf.frames();
            for i in 0..frames {
                samples.push(buf.chan(0)[i] as f32 / i32::MAX as f32);
            }
        }
        AudioBufferRef::S16(buf) => {
            let frames = buf.frames();
            for i in 0..frames {
                samples.push(buf.chan(0)[i] as f32 / i16::MAX as f32);
            }
        }
        _ => return Err(anyhow::anyhow!("サポートされていない音声フォーマットです")),
    }
    Ok(())
}

// =============================================================================
// Utility Functions
// =============================================================================

/// ファイルサイズを人間が読みやすい形式で表示
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size as u64, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}
