use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub fn encode(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Splits a base64 data URL into its mime type and decoded bytes.
pub fn decode(url: &str) -> Option<(String, Vec<u8>)> {
    let rest = url.trim_start().strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header.strip_suffix(";base64")?;
    let bytes = STANDARD.decode(payload.trim()).ok()?;
    Some((mime.to_string(), bytes))
}

pub fn is_data_url(url: &str) -> bool {
    url.trim_start().starts_with("data:")
}

pub fn mime_type(url: &str) -> Option<&str> {
    let rest = url.trim_start().strip_prefix("data:")?;
    let end = rest.find([';', ','])?;
    Some(&rest[..end])
}
