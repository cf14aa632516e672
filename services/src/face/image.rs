use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::FaceError;

/// Decodes a base64 image, with or without a `data:<mime>;base64,` prefix.
pub fn decode_base64_image(payload: &str) -> Result<Vec<u8>, FaceError> {
    let trimmed = payload.trim();
    let encoded = match trimmed.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| FaceError::InvalidImage("Malformed data URL".into()))?,
        None => trimmed,
    };

    if encoded.is_empty() {
        return Err(FaceError::InvalidImage("Image payload is empty".into()));
    }

    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| FaceError::InvalidImage(format!("Invalid base64 image: {e}")))?;

    if bytes.is_empty() {
        return Err(FaceError::InvalidImage("Image payload is empty".into()));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_data_url_payloads() {
        let encoded = STANDARD.encode(b"jpeg-bytes");
        assert_eq!(decode_base64_image(&encoded).unwrap(), b"jpeg-bytes");
        let data_url = format!("data:image/jpeg;base64,{encoded}");
        assert_eq!(decode_base64_image(&data_url).unwrap(), b"jpeg-bytes");
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert!(matches!(decode_base64_image("  "), Err(FaceError::InvalidImage(_))));
        assert!(matches!(decode_base64_image("data:image/png;base64,"), Err(FaceError::InvalidImage(_))));
        assert!(matches!(decode_base64_image("not base64!"), Err(FaceError::InvalidImage(_))));
        assert!(matches!(decode_base64_image("data:image/png"), Err(FaceError::InvalidImage(_))));
    }
}
