use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image {label}: {source}")]
    Decode {
        label: String,
        #[source]
        source: image::ImageError,
    },
    #[error("invalid data URI: {0}")]
    DataUri(String),
    #[error("cubemap face {face} is {width}x{height}, expected {expected}x{expected}")]
    CubeFace {
        face: String,
        width: u32,
        height: u32,
        expected: u32,
    },
}

pub(crate) fn load_binary(path: &Path) -> Result<Vec<u8>, AssetError> {
    std::fs::read(path).map_err(|source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Decodes a base64 `data:` URI into its payload bytes.
pub(crate) fn decode_data_uri(uri: &str) -> Result<Vec<u8>, AssetError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| AssetError::DataUri("missing data: prefix".into()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| AssetError::DataUri("missing payload separator".into()))?;
    if !header.ends_with(";base64") {
        return Err(AssetError::DataUri(format!(
            "unsupported encoding {header:?}"
        )));
    }
    base64::decode(payload).map_err(|e| AssetError::DataUri(e.to_string()))
}

/// Resolves a relative URI found inside an asset file against the asset's
/// directory, undoing percent-encoding (`%20` and friends).
pub(crate) fn resolve_relative(directory: &Path, uri: &str) -> PathBuf {
    directory.join(percent_decode(uri))
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(value) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(value);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_payload_is_decoded() {
        let bytes = decode_data_uri("data:application/octet-stream;base64,AAECAw==").unwrap();
        assert_eq!(bytes, vec![0, 1, 2, 3]);
    }

    #[test]
    fn non_base64_data_uri_is_rejected() {
        assert!(matches!(
            decode_data_uri("data:text/plain,hello"),
            Err(AssetError::DataUri(_))
        ));
        assert!(decode_data_uri("file.bin").is_err());
    }

    #[test]
    fn relative_uris_are_percent_decoded() {
        let path = resolve_relative(Path::new("models/keep"), "textures/Base%20Color.png");
        assert_eq!(path, Path::new("models/keep/textures/Base Color.png"));
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("a%zzb"), "a%zzb");
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_binary(Path::new("does/not/exist.bin")).unwrap_err();
        assert!(err.to_string().contains("exist.bin"));
    }
}
