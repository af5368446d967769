use parking_lot::RwLock;
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display};

/// Default number of virtual replicas registered per bucket.
pub const DEFAULT_REPLICAS: usize = 16;

/// Hashes the bytes of a bucket key or an item to a ring position.
pub type HashFunction = fn(&[u8]) -> u64;

/// Default hash function: bytes 8..16 of the SHA-256 digest, read big-endian.
pub fn stable_hash(data: &[u8]) -> u64 {
    let digest = Sha256::digest(data);
    let mut position = [0u8; 8];
    position.copy_from_slice(&digest[8..16]);
    u64::from_be_bytes(position)
}

#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// Virtual replicas per bucket, `0` means [`DEFAULT_REPLICAS`]
    pub replicas: usize,
    pub hash_function: HashFunction,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            replicas: DEFAULT_REPLICAS,
            hash_function: stable_hash,
        }
    }
}

/// One virtual position of a bucket on the ring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashedBucket {
    pub hashcode: u64,
    pub bucket: String,
    pub replica: usize,
}

#[derive(Debug, Default)]
struct RingState {
    buckets: BTreeSet<String>,
    /// Sorted ascending by hashcode. Equal hashcodes keep insertion order.
    hashring: Vec<HashedBucket>,
}

/// Maps items to buckets through a sorted ring of virtual bucket replicas.
///
/// The replica count and the hash function are fixed at construction: every
/// node must build its ring with the same parameters to agree on ownership,
/// so there is no way to change them once buckets exist.
///
/// All methods take `&self`. Reads share a read lock and writes (adding or
/// removing buckets) hold the write lock for the whole operation, so a
/// reader never observes a half-inserted bucket.
#[derive(Debug)]
pub struct ConsistentHash {
    replicas: usize,
    hash_function: HashFunction,
    state: RwLock<RingState>,
}

impl Default for ConsistentHash {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsistentHash {
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        let replicas = if options.replicas == 0 {
            DEFAULT_REPLICAS
        } else {
            options.replicas
        };

        Self {
            replicas,
            hash_function: options.hash_function,
            state: RwLock::new(RingState::default()),
        }
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }

    /// Adds buckets to the ring, returning whether _any_ bucket was new.
    ///
    /// Buckets already on the ring are skipped. Each new bucket is inserted
    /// `replicas` times, keeping the ring sorted.
    pub fn add_buckets<I, S>(&self, buckets: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.write();
        let mut added = false;

        for bucket in buckets {
            let bucket = bucket.into();
            if state.buckets.contains(&bucket) {
                continue;
            }

            for replica in 0..self.replicas {
                let entry = HashedBucket {
                    hashcode: self.hashcode(&bucket_hash_key(&bucket, replica)),
                    bucket: bucket.clone(),
                    replica,
                };
                insertion_sort(&mut state.hashring, entry);
            }

            state.buckets.insert(bucket);
            added = true;
        }

        added
    }

    /// Removes a bucket and all of its replicas, returning whether it was known.
    ///
    /// Entries are matched by their owning bucket, never by recomputed hash,
    /// so a colliding hashcode of another bucket is left in place.
    pub fn remove_bucket(&self, bucket: &str) -> bool {
        let mut state = self.state.write();

        if !state.buckets.remove(bucket) {
            return false;
        }

        state.hashring.retain(|entry| entry.bucket != bucket);

        true
    }

    /// Sorted names of the buckets on the ring.
    pub fn buckets(&self) -> Vec<String> {
        self.state.read().buckets.iter().cloned().collect()
    }

    /// Returns the bucket owning `item`, or `None` when the ring is empty.
    pub fn assignment(&self, item: &str) -> Option<String> {
        let state = self.state.read();

        self.assignment_locked(&state, item).map(str::to_owned)
    }

    pub fn is_assigned(&self, bucket: &str, item: &str) -> bool {
        let state = self.state.read();

        self.assignment_locked(&state, item) == Some(bucket)
    }

    /// Groups items by their owning bucket.
    ///
    /// Items keep their input order within each group. An empty ring yields
    /// an empty map.
    pub fn assignments<I, S>(&self, items: I) -> BTreeMap<String, Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let state = self.state.read();
        let mut output: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for item in items {
            let item = item.into();
            if let Some(bucket) = self.assignment_locked(&state, &item) {
                output.entry(bucket.to_owned()).or_default().push(item);
            }
        }

        output
    }

    /// Snapshot of the ring entries in ring order, for debugging.
    pub fn entries(&self) -> Vec<HashedBucket> {
        self.state.read().hashring.clone()
    }

    fn assignment_locked<'a>(&self, state: &'a RingState, item: &str) -> Option<&'a str> {
        if state.hashring.is_empty() {
            return None;
        }

        let mut index = search(&state.hashring, self.hashcode(item));
        if index >= state.hashring.len() {
            // wrap around the ring
            index = 0;
        }

        Some(&state.hashring[index].bucket)
    }

    fn hashcode(&self, key: &str) -> u64 {
        (self.hash_function)(key.as_bytes())
    }
}

/// Rendered as `hashcode:bucket-replica` entries in ring order, so two nodes
/// can compare their rings in logs.
impl Display for ConsistentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();

        for (i, entry) in state.hashring.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}:{}-{:02}", entry.hashcode, entry.bucket, entry.replica)?;
        }

        Ok(())
    }
}

/// Serializes the ring entries only. There is no way back: the hash function
/// cannot travel with the data, so this is for diagnostics.
impl Serialize for ConsistentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.state.read().hashring.serialize(serializer)
    }
}

fn bucket_hash_key(bucket: &str, replica: usize) -> String {
    format!("{bucket}|{replica:02}")
}

/// Index of the first entry whose hashcode is >= `hashcode`.
fn search(hashring: &[HashedBucket], hashcode: u64) -> usize {
    hashring.partition_point(|entry| entry.hashcode < hashcode)
}

fn insertion_sort(hashring: &mut Vec<HashedBucket>, entry: HashedBucket) {
    let index = search(hashring, entry.hashcode);
    hashring.insert(index, entry);
}
