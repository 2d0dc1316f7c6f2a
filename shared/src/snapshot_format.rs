use bincode::{Decode, Encode};

use crate::{Dimensions, PlacedImage, Stroke};

pub const SNAPSHOT_MAGIC: [u8; 4] = *b"PABS";
pub const SNAPSHOT_VERSION: u32 = 1;
const SNAPSHOT_HEADER_LEN: usize = SNAPSHOT_MAGIC.len() + std::mem::size_of::<u32>();

/// Vector state of the canvas at one point in its edit history.
#[derive(Clone, Debug, Default, PartialEq, Encode, Decode, serde::Serialize, serde::Deserialize)]
pub struct CanvasScene {
    pub dimensions: Option<Dimensions>,
    pub strokes: Vec<Stroke>,
    pub images: Vec<PlacedImage>,
}

impl CanvasScene {
    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty() && self.images.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotDecodeError {
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
    #[error("invalid snapshot data")]
    InvalidData,
}

#[derive(Debug, thiserror::Error)]
#[error("failed to encode snapshot: {0}")]
pub struct SnapshotEncodeError(#[from] pub bincode::error::EncodeError);

pub fn encode_snapshot(scene: &CanvasScene) -> Result<Vec<u8>, SnapshotEncodeError> {
    let body = bincode::encode_to_vec(scene, bincode::config::standard())?;
    let mut payload = Vec::with_capacity(SNAPSHOT_HEADER_LEN + body.len());
    payload.extend_from_slice(&SNAPSHOT_MAGIC);
    payload.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
    payload.extend_from_slice(&body);
    Ok(payload)
}

pub fn decode_snapshot(payload: &[u8]) -> Result<CanvasScene, SnapshotDecodeError> {
    if !(payload.len() >= SNAPSHOT_HEADER_LEN && payload.starts_with(&SNAPSHOT_MAGIC)) {
        return Err(SnapshotDecodeError::InvalidData);
    }
    let version = u32::from_le_bytes(
        payload[SNAPSHOT_MAGIC.len()..SNAPSHOT_HEADER_LEN]
            .try_into()
            .map_err(|_| SnapshotDecodeError::InvalidData)?,
    );
    let body = &payload[SNAPSHOT_HEADER_LEN..];
    match version {
        1 => bincode::decode_from_slice(body, bincode::config::standard())
            .map(|(scene, _)| scene)
            .map_err(|_| SnapshotDecodeError::InvalidData),
        _ => Err(SnapshotDecodeError::UnsupportedVersion(version)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Point, Tool};

    fn scene() -> CanvasScene {
        CanvasScene {
            dimensions: Some(Dimensions::new(864, 1184)),
            strokes: vec![Stroke {
                id: "s1".into(),
                tool: Tool::Brush,
                color: "#000000".into(),
                size: 5.0,
                points: vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)],
            }],
            images: vec![PlacedImage {
                id: "i1".into(),
                source: "data:image/png;base64,AAAA".into(),
                x: 50.0,
                y: 50.0,
                width: 200.0,
                height: 100.0,
            }],
        }
    }

    #[test]
    fn snapshot_restores_the_encoded_scene() {
        let payload = encode_snapshot(&scene()).unwrap();
        assert!(payload.starts_with(&SNAPSHOT_MAGIC));
        assert_eq!(decode_snapshot(&payload).unwrap(), scene());
    }

    #[test]
    fn errors_describe_themselves() {
        assert_eq!(
            SnapshotDecodeError::UnsupportedVersion(3).to_string(),
            "unsupported snapshot version 3"
        );
        assert_eq!(SnapshotDecodeError::InvalidData.to_string(), "invalid snapshot data");
    }

    #[test]
    fn rejects_foreign_payloads() {
        assert!(matches!(
            decode_snapshot(b"PNG"),
            Err(SnapshotDecodeError::InvalidData)
        ));
        let mut payload = encode_snapshot(&scene()).unwrap();
        payload[4..8].copy_from_slice(&7u32.to_le_bytes());
        assert!(matches!(
            decode_snapshot(&payload),
            Err(SnapshotDecodeError::UnsupportedVersion(7))
        ));
    }
}
