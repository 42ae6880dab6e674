//! Payload encoding for records and adjacency sets, using FlexBuffers.
//!
//! Every payload carries a two byte magic prefix so that a key holding
//! foreign or truncated bytes is reported as a codec error rather than being
//! decoded into garbage.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Magic byte prefix for FlexBuffers payloads (not valid UTF-8).
const FLEXBUF_MAGIC: &[u8] = b"\xFB\x00";

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut serializer = flexbuffers::FlexbufferSerializer::new();
    value
        .serialize(&mut serializer)
        .map_err(|e| Error::Codec(format!("flexbuffers serialization failed: {e}")))?;

    let mut result = Vec::with_capacity(FLEXBUF_MAGIC.len() + serializer.view().len());
    result.extend_from_slice(FLEXBUF_MAGIC);
    result.extend_from_slice(serializer.view());
    Ok(result)
}

pub fn decode<'a, T: Deserialize<'a>>(data: &'a [u8]) -> Result<T> {
    if data.len() < FLEXBUF_MAGIC.len() || &data[..FLEXBUF_MAGIC.len()] != FLEXBUF_MAGIC {
        return Err(Error::Codec(
            "invalid payload: missing FlexBuffers magic".to_string(),
        ));
    }

    let reader = flexbuffers::Reader::get_root(&data[FLEXBUF_MAGIC.len()..])
        .map_err(|e| Error::Codec(format!("flexbuffers deserialization failed: {e}")))?;
    T::deserialize(reader).map_err(|e| Error::Codec(format!("flexbuffers type conversion failed: {e}")))
}
