//! Binary layouts for `vector_index.bin` and `embeddings.bin`.
//!
//! Each file is a 4-byte magic, a `bincode` header, then raw `f32` rows in
//! native byte order:
//!
//! ```text
//! vector_index.bin  "PSGI" | IndexHeader   | ivf centroids | rows
//! embeddings.bin    "PSGV" | VectorsHeader | rows
//! ```
//!
//! The index header records the metadata fingerprint and the encoder stamp,
//! so a loaded index can be checked against both its metadata table and the
//! encoder that will query it.

use crate::error::{RagError, Result};
use crate::index::{FlatIndex, IvfIndex, Metric, VectorIndex};
use crate::retrieval::snapshot::EncoderStamp;
use bincode::config::{Config, standard};
use bincode::{Decode, Encode};

pub const INDEX_MAGIC: [u8; 4] = *b"PSGI";
pub const VECTORS_MAGIC: [u8; 4] = *b"PSGV";
pub const FORMAT_VERSION: u32 = 2;

/// Upper bound on a decoded header, so a corrupt length prefix cannot
/// trigger a huge allocation.
const HEADER_LIMIT: usize = 1 << 30;

pub type Fingerprint = [u8; 32];

/// What an index file says about the data it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStamp {
    pub fingerprint: Fingerprint,
    pub encoder: EncoderStamp,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
struct IndexHeader {
    version: u32,
    fingerprint: Fingerprint,
    model: String,
    normalized: bool,
    metric: u8,
    dimension: u32,
    rows: u64,
    layout: Layout,
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
enum Layout {
    Flat,
    Ivf {
        nprobe: u32,
        nlist: u32,
        lists: Vec<Vec<u64>>,
    },
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
struct VectorsHeader {
    version: u32,
    rows: u64,
    dimension: u32,
}

fn config() -> impl Config {
    standard().with_limit::<HEADER_LIMIT>()
}

fn write_header<H: Encode>(magic: [u8; 4], header: &H) -> Result<Vec<u8>> {
    let mut buf = magic.to_vec();
    buf.extend(bincode::encode_to_vec(header, config())?);
    Ok(buf)
}

/// Checks the magic and decodes the header, returning it with the payload
/// that follows.
fn read_header<'a, H: Decode<()>>(
    bytes: &'a [u8],
    magic: [u8; 4],
    what: &str,
) -> Result<(H, &'a [u8])> {
    let rest = bytes
        .strip_prefix(&magic[..])
        .ok_or_else(|| RagError::corrupt(format!("{what} has a bad magic number")))?;
    let (header, consumed) = bincode::decode_from_slice(rest, config())
        .map_err(|e| RagError::corrupt(format!("{what} header is unreadable: {e}")))?;
    Ok((header, &rest[consumed..]))
}

fn check_version(version: u32, what: &str) -> Result<()> {
    if version != FORMAT_VERSION {
        return Err(RagError::corrupt(format!(
            "{what} has unsupported format version {version}"
        )));
    }
    Ok(())
}

fn count(value: u64, what: &str) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| RagError::corrupt(format!("{what} holds an oversized count")))
}

fn rows_len(rows: usize, dimension: usize) -> Result<usize> {
    rows.checked_mul(dimension)
        .ok_or_else(|| RagError::corrupt("row count overflows"))
}

/// The float section after a header, consumed front to back.
struct Payload<'a> {
    bytes: &'a [u8],
    what: &'a str,
}

impl<'a> Payload<'a> {
    fn floats(&mut self, count: usize) -> Result<Vec<f32>> {
        let len = count
            .checked_mul(size_of::<f32>())
            .filter(|len| *len <= self.bytes.len())
            .ok_or_else(|| RagError::corrupt(format!("{} is truncated", self.what)))?;
        let (head, rest) = self.bytes.split_at(len);
        self.bytes = rest;
        // Not f32-aligned after a variable-length header.
        Ok(bytemuck::allocation::pod_collect_to_vec(head))
    }

    fn finish(self) -> Result<()> {
        if !self.bytes.is_empty() {
            return Err(RagError::corrupt(format!(
                "{} has {} trailing bytes",
                self.what,
                self.bytes.len()
            )));
        }
        Ok(())
    }
}

pub fn encode_index(index: &VectorIndex, stamp: &IndexStamp) -> Result<Vec<u8>> {
    let layout = match index {
        VectorIndex::Flat(_) => Layout::Flat,
        VectorIndex::Ivf(ivf) => Layout::Ivf {
            nprobe: ivf.nprobe() as u32,
            nlist: ivf.nlist() as u32,
            lists: ivf
                .lists()
                .iter()
                .map(|list| list.iter().map(|&p| p as u64).collect())
                .collect(),
        },
    };
    let header = IndexHeader {
        version: FORMAT_VERSION,
        fingerprint: stamp.fingerprint,
        model: stamp.encoder.model.clone(),
        normalized: stamp.encoder.normalized,
        metric: index.metric().to_tag(),
        dimension: index.dimension() as u32,
        rows: index.len() as u64,
        layout,
    };

    let mut buf = write_header(INDEX_MAGIC, &header)?;
    match index {
        VectorIndex::Flat(flat) => buf.extend_from_slice(bytemuck::cast_slice(flat.raw())),
        VectorIndex::Ivf(ivf) => {
            for centroid in ivf.centroids() {
                buf.extend_from_slice(bytemuck::cast_slice(centroid));
            }
            buf.extend_from_slice(bytemuck::cast_slice(ivf.raw()));
        }
    }
    Ok(buf)
}

/// Decodes an index file, returning the index and the stamp it carries.
pub fn decode_index(bytes: &[u8]) -> Result<(VectorIndex, IndexStamp)> {
    let what = "index file";
    let (header, payload) = read_header::<IndexHeader>(bytes, INDEX_MAGIC, what)?;
    check_version(header.version, what)?;
    let metric = Metric::from_tag(header.metric)?;
    let dimension = header.dimension as usize;
    let rows = count(header.rows, what)?;
    if dimension == 0 && (rows > 0 || matches!(header.layout, Layout::Ivf { .. })) {
        return Err(RagError::corrupt("index file has rows of dimension 0"));
    }

    let mut payload = Payload {
        bytes: payload,
        what,
    };
    let index = match header.layout {
        Layout::Flat => {
            let data = payload.floats(rows_len(rows, dimension)?)?;
            VectorIndex::Flat(FlatIndex::from_raw(dimension, metric, data))
        }
        Layout::Ivf {
            nprobe,
            nlist,
            lists,
        } => {
            let centroids = payload
                .floats(rows_len(nlist as usize, dimension)?)?
                .chunks_exact(dimension)
                .map(<[f32]>::to_vec)
                .collect();
            let lists = lists
                .into_iter()
                .map(|list| {
                    list.into_iter()
                        .map(|p| count(p, what))
                        .collect::<Result<Vec<usize>>>()
                })
                .collect::<Result<Vec<Vec<usize>>>>()?;
            let data = payload.floats(rows_len(rows, dimension)?)?;
            VectorIndex::Ivf(IvfIndex::from_parts(
                dimension,
                metric,
                nprobe as usize,
                centroids,
                lists,
                data,
            )?)
        }
    };
    payload.finish()?;

    let stamp = IndexStamp {
        fingerprint: header.fingerprint,
        encoder: EncoderStamp {
            model: header.model,
            normalized: header.normalized,
        },
    };
    Ok((index, stamp))
}

pub fn encode_vectors(vectors: &[Vec<f32>]) -> Result<Vec<u8>> {
    let header = VectorsHeader {
        version: FORMAT_VERSION,
        rows: vectors.len() as u64,
        dimension: vectors.first().map(Vec::len).unwrap_or(0) as u32,
    };
    let mut buf = write_header(VECTORS_MAGIC, &header)?;
    for vector in vectors {
        buf.extend_from_slice(bytemuck::cast_slice(vector));
    }
    Ok(buf)
}

pub fn decode_vectors(bytes: &[u8]) -> Result<Vec<Vec<f32>>> {
    let what = "vector cache";
    let (header, payload) = read_header::<VectorsHeader>(bytes, VECTORS_MAGIC, what)?;
    check_version(header.version, what)?;
    let rows = count(header.rows, what)?;
    let dimension = header.dimension as usize;
    if dimension == 0 && rows > 0 {
        return Err(RagError::corrupt("vector cache has rows of dimension 0"));
    }

    let mut payload = Payload {
        bytes: payload,
        what,
    };
    let data = payload.floats(rows_len(rows, dimension)?)?;
    payload.finish()?;
    if dimension == 0 {
        return Ok(Vec::new());
    }
    Ok(data.chunks_exact(dimension).map(<[f32]>::to_vec).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::index::IndexTopology;

    fn vectors() -> Vec<Vec<f32>> {
        (0..12)
            .map(|i| vec![(i % 3) as f32, (i / 3) as f32, 1.0])
            .collect()
    }

    fn stamp() -> IndexStamp {
        IndexStamp {
            fingerprint: [7; 32],
            encoder: EncoderStamp {
                model: "feature-hash-3".into(),
                normalized: false,
            },
        }
    }

    fn ivf_index() -> VectorIndex {
        VectorIndex::build(
            IndexTopology::Ivf { nlist: 3, nprobe: 2 },
            Metric::L2,
            &vectors(),
            &IndexConfig::default(),
        )
        .unwrap()
    }

    /// Re-encodes an IVF index file with a different stored nprobe.
    fn with_nprobe(bytes: &[u8], nprobe: u32) -> Vec<u8> {
        let (mut header, payload) =
            read_header::<IndexHeader>(bytes, INDEX_MAGIC, "index file").unwrap();
        match &mut header.layout {
            Layout::Ivf { nprobe: stored, .. } => *stored = nprobe,
            Layout::Flat => panic!("expected an IVF header"),
        }
        let mut tampered = write_header(INDEX_MAGIC, &header).unwrap();
        tampered.extend_from_slice(payload);
        tampered
    }

    #[test]
    fn test_ivf_index_survives_encoding() {
        let vectors = vectors();
        let index = ivf_index();
        let bytes = encode_index(&index, &stamp()).unwrap();
        let (decoded, decoded_stamp) = decode_index(&bytes).unwrap();

        assert_eq!(decoded_stamp, stamp());
        assert_eq!(decoded.topology(), index.topology());
        assert_eq!(decoded.len(), 12);
        assert_eq!(
            decoded.search(&vectors[4], 3),
            index.search(&vectors[4], 3)
        );
    }

    #[test]
    fn test_tampered_nprobe_is_corrupt() {
        let bytes = encode_index(&ivf_index(), &stamp()).unwrap();
        assert!(decode_index(&with_nprobe(&bytes, 2)).is_ok());

        for nprobe in [0, 4] {
            let err = decode_index(&with_nprobe(&bytes, nprobe)).unwrap_err();
            assert!(
                matches!(err, RagError::IndexCorrupt(_)),
                "nprobe {nprobe}: {err}"
            );
        }
    }

    #[test]
    fn test_truncated_index_is_corrupt() {
        let index = VectorIndex::build(
            IndexTopology::Flat,
            Metric::InnerProduct,
            &vectors(),
            &IndexConfig::default(),
        )
        .unwrap();
        let bytes = encode_index(&index, &stamp()).unwrap();
        for cut in [3, 40, bytes.len() - 1] {
            let err = decode_index(&bytes[..cut]).unwrap_err();
            assert!(matches!(err, RagError::IndexCorrupt(_)), "cut at {cut}");
        }
    }

    #[test]
    fn test_unknown_version_is_corrupt() {
        let header = VectorsHeader {
            version: FORMAT_VERSION + 1,
            rows: 0,
            dimension: 0,
        };
        let bytes = write_header(VECTORS_MAGIC, &header).unwrap();
        let err = decode_vectors(&bytes).unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_bad_magic_and_trailing_bytes() {
        let mut bytes = encode_vectors(&vectors()).unwrap();
        bytes[0] = b'X';
        assert!(decode_vectors(&bytes).unwrap_err().to_string().contains("magic"));

        let mut bytes = encode_vectors(&vectors()).unwrap();
        bytes.push(0);
        assert!(decode_vectors(&bytes).unwrap_err().to_string().contains("trailing"));
    }

    #[test]
    fn test_vector_cache_keeps_rows() {
        let vectors = vectors();
        let bytes = encode_vectors(&vectors).unwrap();
        assert_eq!(decode_vectors(&bytes).unwrap(), vectors);
    }
}
