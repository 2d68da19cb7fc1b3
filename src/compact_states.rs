//! Bit-packed state-vector store for explicit enumeration.
//!
//! Each inserted state is encoded under an 8-bit header choosing one of
//! three payload shapes (sparse / run-length / full) plus a place-width and
//! token-width bucket, exactly the way the original `states::CompactStates`
//! tries all three shapes and keeps the narrowest. The diagram core
//! ([`crate::forest::Forest`]) never touches this store directly; it only
//! ever sees the minterms `BuilderFront` produces from it.

use std::fmt;

/// Handle returned by [`CompactStates::insert`]: either the bit-offset the
/// record starts at (non-indexed store) or a dense index into an internal
/// offset table (indexed store), depending on which scheme the constructor
/// picked.
pub type StateHandle = u64;

const HEADER_BITS: u32 = 8;
const PLACE_BUCKETS: [u32; 5] = [4, 8, 16, 24, 32];
const TOKEN_BUCKETS: [u32; 7] = [1, 2, 4, 8, 16, 24, 32];

/// Which of the three payload shapes a state was encoded under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Sparse,
    RunLength,
    Full,
}

impl Encoding {
    fn tag(self) -> u8 {
        match self {
            Encoding::Sparse => 0b01,
            Encoding::RunLength => 0b10,
            Encoding::Full => 0b11,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0b01 => Some(Encoding::Sparse),
            0b10 => Some(Encoding::RunLength),
            0b11 => Some(Encoding::Full),
            _ => None,
        }
    }
}

/// Per-encoding insertion counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EncodingStats {
    pub sparse: u64,
    pub run_length: u64,
    pub full: u64,
}

impl EncodingStats {
    fn bump(&mut self, enc: Encoding) {
        match enc {
            Encoding::Sparse => self.sparse += 1,
            Encoding::RunLength => self.run_length += 1,
            Encoding::Full => self.full += 1,
        }
    }
}

/// Smallest bucket width that can hold `value`, picking from `buckets` in
/// ascending order. `buckets` must be sorted and its last entry must be 32.
fn bucket_for(buckets: &[u32], value: u64) -> (u8, u32) {
    for (idx, &w) in buckets.iter().enumerate() {
        let fits = if w >= 32 { true } else { value < (1u64 << w) };
        if fits {
            return (idx as u8, w);
        }
    }
    unreachable!("last bucket must be wide enough for any u32-range value")
}

/// MSB-first bit sink: bits are packed high-to-low within each byte, and
/// fields may cross byte boundaries.
#[derive(Debug, Default)]
struct BitWriter {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl BitWriter {
    fn push_bits(&mut self, value: u64, width: u32) {
        for i in (0..width).rev() {
            let bit = (value >> i) & 1;
            self.push_bit(bit as u8);
        }
    }

    fn push_bit(&mut self, bit: u8) {
        let byte_idx = self.bit_len / 8;
        if byte_idx == self.bytes.len() {
            self.bytes.push(0);
        }
        if bit != 0 {
            let shift = 7 - (self.bit_len % 8);
            self.bytes[byte_idx] |= 1 << shift;
        }
        self.bit_len += 1;
    }
}

/// MSB-first bit source over a shared byte buffer, used both for decoding
/// and for [`CompactStates::next_handle`]'s header walk.
struct BitReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn at(bytes: &'a [u8], bit_offset: usize) -> Self {
        BitReader { bytes, pos: bit_offset }
    }

    fn read_bits(&mut self, width: u32) -> u64 {
        let mut value = 0u64;
        for _ in 0..width {
            let byte_idx = self.pos / 8;
            let shift = 7 - (self.pos % 8);
            let bit = (self.bytes[byte_idx] >> shift) & 1;
            value = (value << 1) | bit as u64;
            self.pos += 1;
        }
        value
    }

    fn bits_consumed_since(&self, start: usize) -> usize {
        self.pos - start
    }
}

/// One candidate encoding of a state, along with its exact bit cost so the
/// caller can pick the narrowest.
struct Candidate {
    encoding: Encoding,
    place_bucket: u8,
    place_width: u32,
    token_bucket: u8,
    token_width: u32,
    bits: u64,
}

fn full_candidate(state: &[u32]) -> Candidate {
    let size = state.len() as u64;
    let max_value = state.iter().copied().max().unwrap_or(0) as u64;
    let (place_bucket, place_width) = bucket_for(&PLACE_BUCKETS, size.saturating_sub(1));
    let (token_bucket, token_width) = bucket_for(&TOKEN_BUCKETS, max_value);
    let bits = place_width as u64 + size * token_width as u64;
    Candidate {
        encoding: Encoding::Full,
        place_bucket,
        place_width,
        token_bucket,
        token_width,
        bits,
    }
}

fn sparse_candidate(state: &[u32]) -> Candidate {
    let size = state.len() as u64;
    let nonzero: Vec<(u32, u32)> = state
        .iter()
        .enumerate()
        .filter(|(_, &v)| v != 0)
        .map(|(i, &v)| (i as u32, v))
        .collect();
    let max_index = nonzero.iter().map(|(i, _)| *i as u64).max().unwrap_or(0);
    let max_value = nonzero.iter().map(|(_, v)| *v as u64).max().unwrap_or(0);
    let (place_bucket, place_width) = bucket_for(&PLACE_BUCKETS, size.max(max_index));
    let (token_bucket, token_width) = bucket_for(&TOKEN_BUCKETS, max_value);
    let bits = place_width as u64 + nonzero.len() as u64 * (place_width as u64 + token_width as u64);
    Candidate {
        encoding: Encoding::Sparse,
        place_bucket,
        place_width,
        token_bucket,
        token_width,
        bits,
    }
}

/// Maximal runs of equal consecutive values. A run of length 1 is tagged as
/// a LIST segment, length >= 2 as a RUN segment — a lone differing value is
/// a one-element LIST, a repeated stretch is a RUN; both segment shapes
/// carry the same `(length, value)` fields.
fn runs_of(state: &[u32]) -> Vec<(bool, u32, u32)> {
    let mut runs = Vec::new();
    let mut i = 0;
    while i < state.len() {
        let value = state[i];
        let mut j = i + 1;
        while j < state.len() && state[j] == value {
            j += 1;
        }
        let len = (j - i) as u32;
        runs.push((len >= 2, len, value));
        i = j;
    }
    runs
}

fn run_length_candidate(state: &[u32]) -> Candidate {
    let runs = runs_of(state);
    let max_len = runs.iter().map(|(_, l, _)| *l as u64).max().unwrap_or(0);
    let max_value = runs.iter().map(|(_, _, v)| *v as u64).max().unwrap_or(0);
    let (token_bucket, token_width) = bucket_for(&TOKEN_BUCKETS, max_value);
    let count = runs.len() as u64;

    if token_width == 1 {
        // Binary case: every segment's value is implied by alternation from
        // a starting value, so neither the marker nor the value field is
        // written per segment. The one starting bit spec §6 calls for rides
        // in the low bit of the leading count field, which has spare room
        // (its bucket is sized for the largest run length anyway).
        let start = runs.first().map(|(_, _, v)| *v as u64).unwrap_or(0);
        let header = count * 2 + start;
        let (place_bucket, place_width) = bucket_for(&PLACE_BUCKETS, header.max(max_len));
        let bits = place_width as u64 + count * place_width as u64;
        Candidate {
            encoding: Encoding::RunLength,
            place_bucket,
            place_width,
            token_bucket,
            token_width,
            bits,
        }
    } else {
        let (place_bucket, place_width) = bucket_for(&PLACE_BUCKETS, count.max(max_len));
        // 1-bit LIST/RUN marker per segment, plus a length and a value field.
        let bits = place_width as u64 + count * (1 + place_width as u64 + token_width as u64);
        Candidate {
            encoding: Encoding::RunLength,
            place_bucket,
            place_width,
            token_bucket,
            token_width,
            bits,
        }
    }
}

/// Picks the narrowest candidate; ties broken full > sparse > run-length
/// for deterministic behaviour.
fn choose_candidate(state: &[u32]) -> Candidate {
    let full = full_candidate(state);
    let sparse = sparse_candidate(state);
    let rle = run_length_candidate(state);
    let mut best = full;
    for candidate in [sparse, rle] {
        if candidate.bits < best.bits {
            best = candidate;
        }
    }
    best
}

fn encode(state: &[u32], writer: &mut BitWriter) -> (Encoding, u64) {
    let candidate = choose_candidate(state);
    let start = writer.bit_len as u64;
    writer.push_bits(candidate.encoding.tag() as u64, 2);
    writer.push_bits(candidate.place_bucket as u64, 3);
    writer.push_bits(candidate.token_bucket as u64, 3);
    let p = candidate.place_width;
    let t = candidate.token_width;
    match candidate.encoding {
        Encoding::Full => {
            writer.push_bits((state.len() as u64).saturating_sub(1), p);
            for &v in state {
                writer.push_bits(v as u64, t);
            }
        }
        Encoding::Sparse => {
            let nonzero: Vec<(u32, u32)> = state
                .iter()
                .enumerate()
                .filter(|(_, &v)| v != 0)
                .map(|(i, &v)| (i as u32, v))
                .collect();
            writer.push_bits(state.len() as u64, p);
            writer.push_bits(nonzero.len() as u64, p);
            for (i, v) in nonzero {
                writer.push_bits(i as u64, p);
                writer.push_bits(v as u64, t);
            }
        }
        Encoding::RunLength => {
            let runs = runs_of(state);
            if t == 1 {
                // Binary case: no per-segment marker or value, just the
                // segment count plus a starting bit packed into the header,
                // and a length per segment.
                let start_value = runs.first().map(|(_, _, v)| *v as u64).unwrap_or(0);
                writer.push_bits(runs.len() as u64 * 2 + start_value, p);
                for (_, len, _) in &runs {
                    writer.push_bits(*len as u64, p);
                }
            } else {
                writer.push_bits(runs.len() as u64, p);
                for (is_run, len, value) in runs {
                    writer.push_bits(is_run as u64, 1);
                    writer.push_bits(len as u64, p);
                    writer.push_bits(value as u64, t);
                }
            }
        }
    }
    (candidate.encoding, start)
}

/// Decodes one record starting at `bit_offset`, appending its values to
/// `out`. Returns the number of bits the record occupied, so callers can
/// advance a sequential cursor by walking the header of each record in turn.
fn decode_into(bytes: &[u8], bit_offset: usize, out: &mut Vec<u32>) -> usize {
    let mut reader = BitReader::at(bytes, bit_offset);
    let tag = reader.read_bits(2) as u8;
    let encoding = Encoding::from_tag(tag).expect("corrupt compact-state header");
    let place_bucket = reader.read_bits(3) as usize;
    let token_bucket = reader.read_bits(3) as usize;
    let p = PLACE_BUCKETS[place_bucket];
    let t = TOKEN_BUCKETS[token_bucket];

    match encoding {
        Encoding::Full => {
            let size = reader.read_bits(p) + 1;
            for _ in 0..size {
                out.push(reader.read_bits(t) as u32);
            }
        }
        Encoding::Sparse => {
            let size = reader.read_bits(p) as usize;
            let nnz = reader.read_bits(p);
            out.resize(size, 0);
            for _ in 0..nnz {
                let idx = reader.read_bits(p) as usize;
                let value = reader.read_bits(t) as u32;
                out[idx] = value;
            }
        }
        Encoding::RunLength if t == 1 => {
            let header = reader.read_bits(p);
            let segments = header >> 1;
            let mut value = (header & 1) as u32;
            for _ in 0..segments {
                let len = reader.read_bits(p);
                for _ in 0..len {
                    out.push(value);
                }
                value = 1 - value;
            }
        }
        Encoding::RunLength => {
            let segments = reader.read_bits(p);
            for _ in 0..segments {
                let is_run = reader.read_bits(1) != 0;
                let len = reader.read_bits(p);
                let value = reader.read_bits(t) as u32;
                debug_assert!(is_run || len >= 1, "LIST segment must have at least one repeat");
                for _ in 0..len {
                    out.push(value);
                }
            }
        }
    }
    reader.bits_consumed_since(bit_offset)
}

/// Bit-packed store for arbitrary-length integer state vectors. Encoding
/// is chosen per insertion to minimise byte count; decoding is bit-exact —
/// `get(insert(s)) == s` for every `s`.
pub struct CompactStates {
    buffer: BitWriter,
    indexed: bool,
    offsets: Vec<usize>,
    stats: EncodingStats,
}

impl CompactStates {
    /// Creates an empty store. `indexed` selects the handle scheme:
    /// `true` hands back a dense index into an internal
    /// offset table (needed for "indexed access"), `false` hands back the
    /// record's own bit offset and supports sequential [`next_handle`]
    /// iteration without extra storage.
    ///
    /// [`next_handle`]: CompactStates::next_handle
    pub fn new(indexed: bool) -> Self {
        CompactStates {
            buffer: BitWriter::default(),
            indexed,
            offsets: Vec::new(),
            stats: EncodingStats::default(),
        }
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    /// Encodes and appends `state`, returning its handle.
    pub fn insert(&mut self, state: &[u32]) -> StateHandle {
        let (encoding, bit_offset) = encode(state, &mut self.buffer);
        self.stats.bump(encoding);
        if self.indexed {
            self.offsets.push(bit_offset as usize);
            (self.offsets.len() - 1) as StateHandle
        } else {
            bit_offset
        }
    }

    /// Decodes `handle` into `out`, clearing it first so it can be reused
    /// as a caller-supplied scratch buffer across many calls.
    pub fn get_into(&self, handle: StateHandle, out: &mut Vec<u32>) {
        out.clear();
        let bit_offset = self.resolve(handle);
        decode_into(&self.buffer.bytes, bit_offset, out);
    }

    /// Convenience wrapper over [`CompactStates::get_into`] for callers that
    /// don't already own a reusable buffer.
    pub fn get(&self, handle: StateHandle) -> Vec<u32> {
        let mut out = Vec::new();
        self.get_into(handle, &mut out);
        out
    }

    fn resolve(&self, handle: StateHandle) -> usize {
        if self.indexed {
            self.offsets[handle as usize]
        } else {
            handle as usize
        }
    }

    /// Resets the write cursor; every previously issued handle becomes
    /// invalid.
    pub fn clear(&mut self) {
        self.buffer = BitWriter::default();
        self.offsets.clear();
        self.stats = EncodingStats::default();
    }

    pub fn stats(&self) -> EncodingStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        if self.indexed {
            self.offsets.len()
        } else {
            // Sequential count requires a walk; cheap stores call `iter().count()`
            // instead. Exposed mainly for the indexed case, where it's O(1).
            self.iter().count()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.bit_len == 0
    }

    /// Next sequential handle after `handle`, or `None` past the end. Walks
    /// the header to determine the current record's length rather than
    /// maintaining a side index. Only meaningful for a non-indexed store;
    /// an indexed store's handles are plain array indices and the caller
    /// should just increment them up to `len()`.
    pub fn next_handle(&self, handle: StateHandle) -> Option<StateHandle> {
        if self.indexed {
            let next = handle + 1;
            return if (next as usize) < self.offsets.len() {
                Some(next)
            } else {
                None
            };
        }
        let bit_offset = handle as usize;
        let mut scratch = Vec::new();
        let consumed = decode_into(&self.buffer.bytes, bit_offset, &mut scratch);
        let next = bit_offset + consumed;
        if next < self.buffer.bit_len {
            Some(next as StateHandle)
        } else {
            None
        }
    }

    /// Iterates every stored state in insertion order, yielding `(handle,
    /// state)` pairs.
    pub fn iter(&self) -> CompactStatesIter<'_> {
        CompactStatesIter {
            store: self,
            next: if self.is_empty() { None } else { Some(0) },
            indexed_pos: 0,
        }
    }
}

impl fmt::Debug for CompactStates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompactStates")
            .field("indexed", &self.indexed)
            .field("bit_len", &self.buffer.bit_len)
            .field("stats", &self.stats)
            .finish()
    }
}

/// Sequential iterator over a [`CompactStates`] store, produced by
/// [`CompactStates::iter`].
pub struct CompactStatesIter<'a> {
    store: &'a CompactStates,
    next: Option<usize>,
    indexed_pos: usize,
}

impl<'a> Iterator for CompactStatesIter<'a> {
    type Item = (StateHandle, Vec<u32>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.store.indexed {
            if self.indexed_pos >= self.store.offsets.len() {
                return None;
            }
            let handle = self.indexed_pos as StateHandle;
            self.indexed_pos += 1;
            Some((handle, self.store.get(handle)))
        } else {
            let bit_offset = self.next?;
            let handle = bit_offset as StateHandle;
            let state = self.store.get(handle);
            self.next = self.store.next_handle(handle);
            Some((handle, state))
        }
    }
}
