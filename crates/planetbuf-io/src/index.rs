//! Block Index Table for Random Access into Blob-Framed Files
//!
//! ## The Problem
//!
//! A blob-framed file can only be read front to back: each block's position
//! is known only after the previous block's header has been parsed. Jumping
//! to "the block containing entity X" would require scanning the whole file.
//!
//! ## The Solution
//!
//! `BlockIndexTable::open` makes one pass over the *headers only*, skipping
//! every payload, and records where each data block's payload starts:
//!
//! ```text
//! Vec<BlockStart>
//!   [0] file_offset: 119     datasize: 65_536
//!   [1] file_offset: 65_672  datasize: 65_536
//!   [2] file_offset: 131_225 datasize: 12_004
//! ```
//!
//! The scan cost is proportional to the block count, not the file size.
//! Blocks are then decoded on demand through the table's [`BlockDecoder`];
//! the first decode of a block memoizes the id and type of its first entity,
//! so repeated searches over the table get cheaper as it warms up.
//!
//! ## Concurrency
//!
//! Decoding mutates the table (file cursor, memoized entries), so
//! `get_parsed_block` takes `&mut self`. Sharing a table across threads
//! without external synchronization is a compile error, not a data race.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use planetbuf_core::{Arena, EntityBits, ItemType, ObjectId};
use prost::Message;

use crate::blob::{
    BlobHeader, DATA_BLOCK_TYPE, FILE_HEADER_TYPE, MAX_BLOB_HEADER_SIZE, MAX_BLOCK_SIZE,
};
use crate::decoder::{BlockDecoder, ReadMeta};
use crate::error::{Error, Result};

/// Location of one data block, plus memoized facts about its first entity.
#[derive(Debug, Clone, Copy)]
pub struct BlockStart {
    /// Offset of the blob payload within the file.
    pub file_offset: u64,
    /// Payload length in bytes.
    pub datasize: u32,
    first_item_id: ObjectId,
    first_item_type: ItemType,
}

impl BlockStart {
    fn new(file_offset: u64, datasize: u32) -> Self {
        Self {
            file_offset,
            datasize,
            first_item_id: 0,
            first_item_type: ItemType::Undefined,
        }
    }

    /// Id of the block's first entity, if the block has been decoded before.
    pub fn first_item_id(&self) -> Option<ObjectId> {
        self.first_item_type().map(|_| self.first_item_id)
    }

    /// Type of the block's first entity, if the block has been decoded
    /// before.
    pub fn first_item_type(&self) -> Option<ItemType> {
        if self.first_item_type == ItemType::Undefined {
            None
        } else {
            Some(self.first_item_type)
        }
    }
}

/// Random-access table over the data blocks of one blob-framed file.
pub struct BlockIndexTable {
    file: File,
    block_starts: Vec<BlockStart>,
    decoder: Box<dyn BlockDecoder>,
}

impl BlockIndexTable {
    /// Open a file and build the block index by scanning headers only.
    ///
    /// The first block must be a file header block; every following block
    /// must be a data block. The file handle is released on every failure
    /// path.
    pub fn open(path: impl AsRef<Path>, decoder: Box<dyn BlockDecoder>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        let mut block_starts = Vec::new();
        let mut offset = 0u64;
        let mut block_count = 0usize;
        while offset < file_size {
            let (header, data_offset) = read_blob_header(&mut file, offset)?;

            if header.datasize <= 0 {
                return Err(Error::Format(format!(
                    "block {block_count} has no data (datasize {})",
                    header.datasize
                )));
            }
            let datasize = header.datasize as u64;
            if datasize > MAX_BLOCK_SIZE {
                return Err(Error::Format(format!(
                    "block {block_count} is too large ({datasize} > {MAX_BLOCK_SIZE})"
                )));
            }
            let end = data_offset + datasize;
            if end > file_size {
                return Err(Error::Format(format!(
                    "block {block_count} extends past the end of the file"
                )));
            }

            if block_count == 0 {
                if header.r#type != FILE_HEADER_TYPE {
                    return Err(Error::Format(format!(
                        "first block has type {:?}, expected {FILE_HEADER_TYPE:?}",
                        header.r#type
                    )));
                }
            } else if header.r#type != DATA_BLOCK_TYPE {
                return Err(Error::Format(format!(
                    "block {block_count} has type {:?}, expected {DATA_BLOCK_TYPE:?}",
                    header.r#type
                )));
            } else {
                block_starts.push(BlockStart::new(data_offset, header.datasize as u32));
            }

            offset = end;
            block_count += 1;
        }

        if block_count == 0 {
            return Err(Error::Format("file has no header block".to_string()));
        }

        tracing::debug!(
            path = %path.display(),
            file_size,
            data_blocks = block_starts.len(),
            "built block index"
        );

        Ok(Self {
            file,
            block_starts,
            decoder,
        })
    }

    /// The indexed data blocks, in file order.
    pub fn block_starts(&self) -> &[BlockStart] {
        &self.block_starts
    }

    /// Read and decode one data block.
    ///
    /// All entity kinds are decoded. The first successful decode of a block
    /// memoizes its first entity's id and type on the [`BlockStart`].
    pub fn get_parsed_block(&mut self, index: usize, read_meta: ReadMeta) -> Result<Arena> {
        let start = *self
            .block_starts
            .get(index)
            .ok_or(Error::BlockIndexOutOfRange(index))?;

        self.file.seek(SeekFrom::Start(start.file_offset))?;
        let mut data = vec![0u8; start.datasize as usize];
        read_exactly(&mut self.file, &mut data)?;

        let arena = self.decoder.decode(data, EntityBits::ALL, read_meta)?;

        if start.first_item_type().is_none() {
            if let Some((id, item_type)) = first_entity(&arena) {
                let memo = &mut self.block_starts[index];
                memo.first_item_id = id;
                memo.first_item_type = item_type;
                tracing::debug!(
                    block = index,
                    first_id = id,
                    first_type = ?item_type,
                    "memoized first entity of block"
                );
            }
        }

        Ok(arena)
    }
}

/// Id and type of the first entity in a decoded block.
fn first_entity(arena: &Arena) -> Option<(ObjectId, ItemType)> {
    let item = arena.items().next()?;
    if let Some(object) = item.as_object() {
        return Some((object.id(), object.item_type()));
    }
    if let Some(changeset) = item.as_changeset() {
        return Some((changeset.id() as ObjectId, ItemType::Changeset));
    }
    None
}

/// Read the length prefix and BlobHeader at `offset`, returning the header
/// and the offset of the payload that follows it.
fn read_blob_header(file: &mut File, offset: u64) -> Result<(BlobHeader, u64)> {
    file.seek(SeekFrom::Start(offset))?;

    let mut prefix = [0u8; 4];
    read_exactly(file, &mut prefix)?;
    let header_size = u32::from_be_bytes(prefix);
    if header_size > MAX_BLOB_HEADER_SIZE {
        return Err(Error::Format(format!(
            "blob header is too large ({header_size} > {MAX_BLOB_HEADER_SIZE})"
        )));
    }

    let mut buf = vec![0u8; header_size as usize];
    read_exactly(file, &mut buf)?;
    let header = BlobHeader::decode(&buf[..])
        .map_err(|err| Error::Format(format!("bad blob header: {err}")))?;

    Ok((header, offset + 4 + u64::from(header_size)))
}

/// `read_exact` with truncation reported as a format error instead of i/o.
fn read_exactly(file: &mut File, buf: &mut [u8]) -> Result<()> {
    file.read_exact(buf).map_err(|err| {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Format("unexpected end of file".to_string())
        } else {
            Error::Io(err)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use planetbuf_core::NodeBuilder;
    use tempfile::NamedTempFile;

    /// Test decoder: the payload is a flat run of little-endian node ids.
    struct PlainNodeDecoder;

    impl BlockDecoder for PlainNodeDecoder {
        fn decode(
            &self,
            data: Vec<u8>,
            entities: EntityBits,
            _read_meta: ReadMeta,
        ) -> Result<Arena> {
            let mut arena = Arena::new();
            if !entities.contains(ItemType::Node) {
                return Ok(arena);
            }
            for chunk in data.chunks_exact(8) {
                let id = i64::from_le_bytes(chunk.try_into().unwrap());
                let mut node = NodeBuilder::new(&mut arena);
                node.set_id(id);
                node.finish();
            }
            Ok(arena)
        }
    }

    fn encode_ids(ids: &[i64]) -> Vec<u8> {
        ids.iter().flat_map(|id| id.to_le_bytes()).collect()
    }

    fn write_blob(out: &mut Vec<u8>, block_type: &str, payload: &[u8]) {
        write_blob_claiming(out, block_type, payload, payload.len() as i32);
    }

    /// Like `write_blob` but with an arbitrary claimed datasize, for
    /// truncation and size-violation tests.
    fn write_blob_claiming(out: &mut Vec<u8>, block_type: &str, payload: &[u8], datasize: i32) {
        let header = BlobHeader {
            r#type: block_type.to_string(),
            indexdata: None,
            datasize,
        };
        let header_bytes = header.encode_to_vec();
        out.extend_from_slice(&(header_bytes.len() as u32).to_be_bytes());
        out.extend_from_slice(&header_bytes);
        out.extend_from_slice(payload);
    }

    fn write_file(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    fn sample_file(blocks: &[&[i64]]) -> NamedTempFile {
        let mut bytes = Vec::new();
        write_blob(&mut bytes, FILE_HEADER_TYPE, &[0xaa; 16]);
        for ids in blocks {
            write_blob(&mut bytes, DATA_BLOCK_TYPE, &encode_ids(ids));
        }
        write_file(&bytes)
    }

    fn format_error(result: Result<BlockIndexTable>) -> String {
        match result {
            Err(Error::Format(msg)) => msg,
            Err(other) => panic!("expected format error, got {other:?}"),
            Ok(_) => panic!("expected format error, got an index"),
        }
    }

    // ---- index construction ----

    #[test]
    fn test_index_covers_all_data_blocks() {
        let file = sample_file(&[&[1, 2, 3], &[10, 11], &[100]]);
        let table = BlockIndexTable::open(file.path(), Box::new(PlainNodeDecoder)).unwrap();

        let starts = table.block_starts();
        assert_eq!(starts.len(), 3);
        assert_eq!(starts[0].datasize, 24);
        assert_eq!(starts[1].datasize, 16);
        assert_eq!(starts[2].datasize, 8);

        // Payloads are contiguous apart from the framing between them
        assert!(starts[0].file_offset > 0);
        for pair in starts.windows(2) {
            assert!(pair[1].file_offset > pair[0].file_offset + u64::from(pair[0].datasize));
        }

        // Nothing decoded yet
        assert!(starts.iter().all(|s| s.first_item_type().is_none()));
    }

    #[test]
    fn test_header_only_file_has_empty_index() {
        let file = sample_file(&[]);
        let table = BlockIndexTable::open(file.path(), Box::new(PlainNodeDecoder)).unwrap();
        assert!(table.block_starts().is_empty());
    }

    // ---- decoding and memoization ----

    #[test]
    fn test_get_parsed_block_decodes_entities() {
        let file = sample_file(&[&[1, 2, 3], &[10, 11]]);
        let mut table = BlockIndexTable::open(file.path(), Box::new(PlainNodeDecoder)).unwrap();

        let arena = table.get_parsed_block(1, ReadMeta::No).unwrap();
        let ids: Vec<_> = arena.objects().map(|o| o.id()).collect();
        assert_eq!(ids, vec![10, 11]);
    }

    #[test]
    fn test_first_entity_memoized_on_first_decode() {
        let file = sample_file(&[&[7, 8], &[42]]);
        let mut table = BlockIndexTable::open(file.path(), Box::new(PlainNodeDecoder)).unwrap();

        assert!(table.block_starts()[1].first_item_id().is_none());
        table.get_parsed_block(1, ReadMeta::No).unwrap();
        assert_eq!(table.block_starts()[1].first_item_id(), Some(42));
        assert_eq!(
            table.block_starts()[1].first_item_type(),
            Some(ItemType::Node)
        );
        // Other blocks stay cold
        assert!(table.block_starts()[0].first_item_id().is_none());
    }

    #[test]
    fn test_repeated_decode_is_identical() {
        let file = sample_file(&[&[5, 6, 7]]);
        let mut table = BlockIndexTable::open(file.path(), Box::new(PlainNodeDecoder)).unwrap();

        let first = table.get_parsed_block(0, ReadMeta::No).unwrap();
        let second = table.get_parsed_block(0, ReadMeta::No).unwrap();
        assert_eq!(first.bytes(), second.bytes());
    }

    #[test]
    fn test_block_index_out_of_range() {
        let file = sample_file(&[&[1]]);
        let mut table = BlockIndexTable::open(file.path(), Box::new(PlainNodeDecoder)).unwrap();
        assert!(matches!(
            table.get_parsed_block(1, ReadMeta::No),
            Err(Error::BlockIndexOutOfRange(1))
        ));
    }

    // ---- malformed files ----

    #[test]
    fn test_empty_file_rejected() {
        let file = write_file(&[]);
        let msg = format_error(BlockIndexTable::open(file.path(), Box::new(PlainNodeDecoder)));
        assert!(msg.contains("no header block"), "{msg}");
    }

    #[test]
    fn test_wrong_first_block_type_rejected() {
        let mut bytes = Vec::new();
        write_blob(&mut bytes, DATA_BLOCK_TYPE, &encode_ids(&[1]));
        let file = write_file(&bytes);
        let msg = format_error(BlockIndexTable::open(file.path(), Box::new(PlainNodeDecoder)));
        assert!(msg.contains("first block"), "{msg}");
    }

    #[test]
    fn test_unknown_later_block_type_rejected() {
        let mut bytes = Vec::new();
        write_blob(&mut bytes, FILE_HEADER_TYPE, &[0xaa; 16]);
        write_blob(&mut bytes, "SomethingElse", &[0; 8]);
        let file = write_file(&bytes);
        let msg = format_error(BlockIndexTable::open(file.path(), Box::new(PlainNodeDecoder)));
        assert!(msg.contains("SomethingElse"), "{msg}");
    }

    #[test]
    fn test_zero_datasize_rejected() {
        let mut bytes = Vec::new();
        write_blob(&mut bytes, FILE_HEADER_TYPE, &[0xaa; 16]);
        write_blob_claiming(&mut bytes, DATA_BLOCK_TYPE, &[], 0);
        let file = write_file(&bytes);
        let msg = format_error(BlockIndexTable::open(file.path(), Box::new(PlainNodeDecoder)));
        assert!(msg.contains("no data"), "{msg}");
    }

    #[test]
    fn test_oversized_datasize_rejected() {
        let mut bytes = Vec::new();
        write_blob(&mut bytes, FILE_HEADER_TYPE, &[0xaa; 16]);
        write_blob_claiming(&mut bytes, DATA_BLOCK_TYPE, &[], MAX_BLOCK_SIZE as i32 + 1);
        let file = write_file(&bytes);
        let msg = format_error(BlockIndexTable::open(file.path(), Box::new(PlainNodeDecoder)));
        assert!(msg.contains("too large"), "{msg}");
    }

    #[test]
    fn test_truncated_body_rejected() {
        let mut bytes = Vec::new();
        write_blob(&mut bytes, FILE_HEADER_TYPE, &[0xaa; 16]);
        // Claims 32 bytes of payload but only carries 8
        write_blob_claiming(&mut bytes, DATA_BLOCK_TYPE, &encode_ids(&[1]), 32);
        let file = write_file(&bytes);
        let msg = format_error(BlockIndexTable::open(file.path(), Box::new(PlainNodeDecoder)));
        assert!(msg.contains("past the end"), "{msg}");
    }

    #[test]
    fn test_truncated_length_prefix_rejected() {
        let mut bytes = Vec::new();
        write_blob(&mut bytes, FILE_HEADER_TYPE, &[0xaa; 16]);
        bytes.extend_from_slice(&[0, 0]); // half a length prefix
        let file = write_file(&bytes);
        let msg = format_error(BlockIndexTable::open(file.path(), Box::new(PlainNodeDecoder)));
        assert!(msg.contains("end of file"), "{msg}");
    }

    #[test]
    fn test_oversized_blob_header_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(MAX_BLOB_HEADER_SIZE + 1).to_be_bytes());
        bytes.extend_from_slice(&vec![0u8; MAX_BLOB_HEADER_SIZE as usize + 1]);
        let file = write_file(&bytes);
        let msg = format_error(BlockIndexTable::open(file.path(), Box::new(PlainNodeDecoder)));
        assert!(msg.contains("header is too large"), "{msg}");
    }

    #[test]
    fn test_garbage_blob_header_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&8u32.to_be_bytes());
        bytes.extend_from_slice(&[0xff; 8]);
        let file = write_file(&bytes);
        let msg = format_error(BlockIndexTable::open(file.path(), Box::new(PlainNodeDecoder)));
        assert!(msg.contains("bad blob header"), "{msg}");
    }
}
