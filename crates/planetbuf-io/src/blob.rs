//! Blob Container Framing
//!
//! A block-framed file is a sequence of blobs, each framed as:
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │ BlobHeader length (u32, big-endian)        │
//! ├────────────────────────────────────────────┤
//! │ BlobHeader protobuf message                │
//! │ - type (string, tag 1): block kind         │
//! │ - indexdata (bytes, tag 2): optional       │
//! │ - datasize (int32, tag 3): payload length  │
//! ├────────────────────────────────────────────┤
//! │ Blob payload (datasize bytes, opaque here) │
//! └────────────────────────────────────────────┘
//! ```
//!
//! The payload encoding (compression, body format) is the decoder's concern;
//! this crate only frames and indexes blocks.

/// Largest BlobHeader accepted while scanning. Real headers are far smaller;
/// the cap lets the index scan read a small fixed amount per block.
pub const MAX_BLOB_HEADER_SIZE: u32 = 64;

/// Largest accepted blob payload.
pub const MAX_BLOCK_SIZE: u64 = 20 * 1024 * 1024;

/// Block kind of the mandatory first block.
pub const FILE_HEADER_TYPE: &str = "OSMHeader";

/// Block kind of every block after the first.
pub const DATA_BLOCK_TYPE: &str = "OSMData";

/// Framing header preceding every blob.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BlobHeader {
    #[prost(string, required, tag = "1")]
    pub r#type: ::prost::alloc::string::String,

    #[prost(bytes = "vec", optional, tag = "2")]
    pub indexdata: ::core::option::Option<::prost::alloc::vec::Vec<u8>>,

    #[prost(int32, required, tag = "3")]
    pub datasize: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_blob_header_roundtrip() {
        let header = BlobHeader {
            r#type: DATA_BLOCK_TYPE.to_string(),
            indexdata: None,
            datasize: 4096,
        };
        let encoded = header.encode_to_vec();
        assert!(encoded.len() <= MAX_BLOB_HEADER_SIZE as usize);

        let decoded = BlobHeader::decode(&encoded[..]).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_blob_header_rejects_missing_required_fields() {
        // An empty message is missing both required fields
        assert!(BlobHeader::decode(&[][..]).is_err());
    }
}
