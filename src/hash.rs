use std::fmt::{Display, Formatter};
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::str::FromStr;
use sha2::Digest;
use crate::error::{Result, SandboxError};

pub const DEFAULT_BLOCK_SIZE: usize = 65536;

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    const ALL: [Self; 3] = [Self::Md5, Self::Sha1, Self::Sha256];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }

    const fn hex_len(self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha1 => 40,
            Self::Sha256 => 64,
        }
    }
}

impl Display for HashAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = SandboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|algorithm| algorithm.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| SandboxError::InvalidAlgorithm(s.to_owned()))
    }
}

/// Tells which algorithm produced `hash` by looking at its length. Only bare hex strings qualify.
pub fn classify(hash: &str) -> Result<HashAlgorithm> {
    let is_hex = hash.bytes().all(|b| b.is_ascii_hexdigit());

    HashAlgorithm::ALL
        .into_iter()
        .find(|algorithm| is_hex && algorithm.hex_len() == hash.len())
        .ok_or_else(|| SandboxError::InvalidHash(hash.to_owned()))
}

enum StreamingHasher {
    Md5(md5::Context),
    Sha1(sha1_smol::Sha1),
    Sha256(sha2::Sha256),
}

impl StreamingHasher {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Md5 => Self::Md5(md5::Context::new()),
            HashAlgorithm::Sha1 => Self::Sha1(sha1_smol::Sha1::new()),
            HashAlgorithm::Sha256 => Self::Sha256(sha2::Sha256::new()),
        }
    }

    fn update(&mut self, block: &[u8]) {
        match self {
            Self::Md5(context) => context.consume(block),
            Self::Sha1(hasher) => hasher.update(block),
            Self::Sha256(hasher) => hasher.update(block),
        }
    }

    fn hex(self) -> String {
        match self {
            Self::Md5(context) => format!("{:x}", context.compute()),
            Self::Sha1(hasher) => hasher.digest().to_string(),
            Self::Sha256(hasher) => hex::encode(hasher.finalize()),
        }
    }
}

/// Hashes the whole stream and rewinds it, so the caller can read it again afterwards.
pub fn digest<R: Read + Seek>(stream: &mut R, algorithm: &str, block_size: usize) -> Result<String> {
    digest_with(stream, algorithm.parse()?, block_size)
}

pub fn digest_with<R: Read + Seek>(stream: &mut R, algorithm: HashAlgorithm, block_size: usize) -> Result<String> {
    let mut hasher = StreamingHasher::new(algorithm);
    let mut block = vec![0; block_size.max(1)];

    stream.seek(SeekFrom::Start(0))?;
    loop {
        let read = match stream.read(&mut block) {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&block[..read]);
    }
    stream.seek(SeekFrom::Start(0))?;

    Ok(hasher.hex())
}

pub fn sha256_bytes(bytes: &[u8]) -> String {
    hex::encode(sha2::Sha256::digest(bytes))
}
