//! .pfp binary file format for fingerprint stores.

use std::io::{Read, Write};
use std::path::Path;

use crate::types::{FingerprintError, FingerprintRecord, FingerprintResult, FingerprintStore};

/// Magic bytes: "PFPS"
const PFP_MAGIC: u32 = 0x50465053;

const FORMAT_VERSION: u16 = 1;

const HEADER_SIZE: usize = 64;

/// Writer for .pfp files.
pub struct PfpWriter;

/// Reader for .pfp files.
pub struct PfpReader;

impl PfpWriter {
    /// Write a store to a file, creating parent directories.
    pub fn write_to_file(store: &FingerprintStore, path: &Path) -> FingerprintResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = std::fs::File::create(path)?;
        Self::write_to(store, &mut file)
    }

    /// Write a store to any writer.
    pub fn write_to<W: Write>(store: &FingerprintStore, writer: &mut W) -> FingerprintResult<()> {
        let payload = serde_json::to_vec(&store.records)
            .map_err(|e| FingerprintError::Storage(format!("Serialization failed: {e}")))?;

        let mut header = [0u8; HEADER_SIZE];
        write_u32(&mut header[0..4], PFP_MAGIC);
        write_u16(&mut header[4..6], FORMAT_VERSION);
        write_u16(&mut header[6..8], 0); // flags
        write_u64(&mut header[8..16], store.records.len() as u64);
        write_u64(&mut header[16..24], store.next_id);
        write_u64(&mut header[24..32], store.created_at);
        write_u64(&mut header[32..40], store.updated_at);
        write_u64(&mut header[40..48], payload.len() as u64);

        writer.write_all(&header)?;
        writer.write_all(&payload)?;
        Ok(())
    }
}

impl PfpReader {
    pub fn read_from_file(path: &Path) -> FingerprintResult<FingerprintStore> {
        let mut file = std::fs::File::open(path)?;
        Self::read_from(&mut file)
    }

    /// Read a store from any reader.
    pub fn read_from<R: Read>(reader: &mut R) -> FingerprintResult<FingerprintStore> {
        let mut header = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header)?;

        let magic = read_u32(&header[0..4]);
        if magic != PFP_MAGIC {
            return Err(FingerprintError::Storage(format!(
                "Invalid magic: expected 0x{PFP_MAGIC:08X}, got 0x{magic:08X}"
            )));
        }

        let version = read_u16(&header[4..6]);
        if version != FORMAT_VERSION {
            return Err(FingerprintError::Storage(format!(
                "Unsupported version: {version}"
            )));
        }

        let record_count = read_u64(&header[8..16]);
        let next_id = read_u64(&header[16..24]);
        let created_at = read_u64(&header[24..32]);
        let updated_at = read_u64(&header[32..40]);
        let payload_len = read_u64(&header[40..48]);

        let mut payload = Vec::new();
        reader.by_ref().take(payload_len).read_to_end(&mut payload)?;
        if payload.len() as u64 != payload_len {
            return Err(FingerprintError::Storage(format!(
                "Truncated payload: header claims {payload_len} bytes, found {}",
                payload.len()
            )));
        }

        let records: Vec<FingerprintRecord> = serde_json::from_slice(&payload)
            .map_err(|e| FingerprintError::Storage(format!("Deserialization failed: {e}")))?;

        if records.len() as u64 != record_count {
            return Err(FingerprintError::Storage(format!(
                "Header claims {record_count} records, payload has {}",
                records.len()
            )));
        }

        Ok(FingerprintStore {
            records,
            next_id,
            created_at,
            updated_at,
        })
    }
}

/// Load the store at `path`, or start an empty one if the file does not exist.
pub fn open_or_create(path: &Path) -> FingerprintResult<FingerprintStore> {
    if path.exists() {
        tracing::info!("Opening fingerprint store: {}", path.display());
        PfpReader::read_from_file(path)
    } else {
        tracing::info!("Creating fingerprint store: {}", path.display());
        Ok(FingerprintStore::new())
    }
}

// Little-endian byte helpers
fn write_u16(buf: &mut [u8], val: u16) {
    buf[..2].copy_from_slice(&val.to_le_bytes());
}
fn write_u32(buf: &mut [u8], val: u32) {
    buf[..4].copy_from_slice(&val.to_le_bytes());
}
fn write_u64(buf: &mut [u8], val: u64) {
    buf[..8].copy_from_slice(&val.to_le_bytes());
}
fn read_u16(buf: &[u8]) -> u16 {
    u16::from_le_bytes([buf[0], buf[1]])
}
fn read_u32(buf: &[u8]) -> u32 {
    u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])
}
fn read_u64(buf: &[u8]) -> u64 {
    u64::from_le_bytes([buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7]])
}
