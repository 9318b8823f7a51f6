//! The registry mapping hash-type identifiers to digest computations.
//!
//! The engine never inspects a primitive's internals: every hash function,
//! built-in or externally registered, is an opaque callable from
//! `(candidate, options)` to a digest encoding. Callables may be
//! synchronous or asynchronous; the scheduler awaits both uniformly.

use std::{
    collections::HashMap,
    future::Future,
    pin::Pin,
    sync::{Arc, RwLock},
};

use digest::{Digest, DynDigest};
use md4::Md4;
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use sha3::{Sha3_224, Sha3_256, Sha3_384, Sha3_512};

use crate::{
    error::{WordbreakError, WordbreakResult},
    ntlm::ntlm,
};

/// Per-job parameters forwarded to every hash computation.
///
/// Built-in digests honor `salt` and `iterations`; `username` and `domain`
/// are carried for externally registered primitives that need them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashOptions {
    /// Salt appended to the candidate before hashing.
    pub salt: Option<String>,
    /// Number of digest passes, 1 if unset.
    pub iterations: Option<u32>,
    pub username: Option<String>,
    pub domain: Option<String>,
}

/// A boxed future produced by an asynchronous hash function.
pub type HashFuture = Pin<Box<dyn Future<Output = WordbreakResult<String>> + Send>>;

type SyncHashFn = Arc<dyn Fn(&str, &HashOptions) -> WordbreakResult<String> + Send + Sync>;
type AsyncHashFn = Arc<dyn Fn(String, HashOptions) -> HashFuture + Send + Sync>;

/// The computation behind a hash descriptor.
#[derive(Clone)]
enum HashCompute {
    Sync(SyncHashFn),
    Async(AsyncHashFn),
}

/// A registered hash function: an identifier and its computation.
#[derive(Clone)]
pub struct HashDescriptor {
    id: String,
    function: HashCompute,
}

impl HashDescriptor {
    /// Creates a descriptor over a synchronous hash function.
    pub fn sync<F>(id: &str, function: F) -> Self
    where
        F: Fn(&str, &HashOptions) -> WordbreakResult<String> + Send + Sync + 'static,
    {
        Self {
            id: id.to_lowercase(),
            function: HashCompute::Sync(Arc::new(function)),
        }
    }

    /// Creates a descriptor over an asynchronous hash function.
    pub fn asynchronous<F>(id: &str, function: F) -> Self
    where
        F: Fn(String, HashOptions) -> HashFuture + Send + Sync + 'static,
    {
        Self {
            id: id.to_lowercase(),
            function: HashCompute::Async(Arc::new(function)),
        }
    }

    /// The normalized (lowercase) identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_async(&self) -> bool {
        matches!(self.function, HashCompute::Async(_))
    }

    /// Computes the digest encoding of `candidate`.
    pub async fn compute(&self, candidate: &str, options: &HashOptions) -> WordbreakResult<String> {
        match &self.function {
            HashCompute::Sync(function) => function(candidate, options),
            HashCompute::Async(function) => function(candidate.to_owned(), options.clone()).await,
        }
    }
}

impl std::fmt::Debug for HashDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashDescriptor")
            .field("id", &self.id)
            .field("is_async", &self.is_async())
            .finish()
    }
}

/// Returns the digest implementation behind a built-in identifier.
fn builtin_digest(id: &str) -> Option<Box<dyn DynDigest>> {
    let hasher: Box<dyn DynDigest> = match id {
        "md4" => Box::new(Md4::new()),
        "md5" => Box::new(Md5::new()),
        "sha1" => Box::new(Sha1::new()),
        "sha224" => Box::new(Sha224::new()),
        "sha256" => Box::new(Sha256::new()),
        "sha384" => Box::new(Sha384::new()),
        "sha512" => Box::new(Sha512::new()),
        "sha3-224" => Box::new(Sha3_224::new()),
        "sha3-256" => Box::new(Sha3_256::new()),
        "sha3-384" => Box::new(Sha3_384::new()),
        "sha3-512" => Box::new(Sha3_512::new()),
        _ => return None,
    };

    Some(hasher)
}

/// Hex digest of `candidate` under a built-in algorithm, honoring the salt
/// and iteration count of the options.
fn digest_hex(id: &str, candidate: &str, options: &HashOptions) -> WordbreakResult<String> {
    let mut hasher = builtin_digest(id)
        .ok_or_else(|| WordbreakError::UnsupportedHashType(id.to_owned()))?;

    hasher.update(candidate.as_bytes());
    if let Some(salt) = &options.salt {
        hasher.update(salt.as_bytes());
    }
    let mut digest = <dyn DynDigest>::finalize_reset(&mut *hasher);

    for _ in 1..options.iterations.unwrap_or(1) {
        hasher.update(&digest);
        digest = <dyn DynDigest>::finalize_reset(&mut *hasher);
    }

    Ok(hex::encode(digest))
}

/// Maps hash-type identifiers to their computations.
///
/// Lookup is case-insensitive. Registering under an existing identifier
/// replaces the previous descriptor.
pub struct HashFunctionRegistry {
    descriptors: RwLock<HashMap<String, Arc<HashDescriptor>>>,
}

impl HashFunctionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            descriptors: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a registry with every built-in hash function registered.
    pub fn with_builtins() -> Self {
        let registry = Self::new();

        for id in [
            "md4", "md5", "sha1", "sha224", "sha256", "sha384", "sha512", "sha3-224", "sha3-256",
            "sha3-384", "sha3-512",
        ] {
            registry.register(HashDescriptor::sync(id, move |candidate, options| {
                digest_hex(id, candidate, options)
            }));
        }

        // NTLM is MD4 over UTF-16LE, unsalted
        registry.register(HashDescriptor::sync("ntlm", |candidate, _options| {
            Ok(hex::encode(ntlm(candidate)))
        }));

        registry
    }

    /// Registers a descriptor under its (lowercased) identifier.
    pub fn register(&self, descriptor: HashDescriptor) {
        let mut descriptors = self.descriptors.write().expect("hash registry poisoned");
        descriptors.insert(descriptor.id().to_owned(), Arc::new(descriptor));
    }

    /// Resolves an identifier, ignoring case.
    pub fn resolve(&self, id: &str) -> WordbreakResult<Arc<HashDescriptor>> {
        let descriptors = self.descriptors.read().expect("hash registry poisoned");

        descriptors
            .get(&id.to_lowercase())
            .cloned()
            .ok_or_else(|| WordbreakError::UnsupportedHashType(id.to_owned()))
    }

    /// Returns every registered identifier, sorted.
    pub fn ids(&self) -> Vec<String> {
        let descriptors = self.descriptors.read().expect("hash registry poisoned");
        let mut ids: Vec<String> = descriptors.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for HashFunctionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
