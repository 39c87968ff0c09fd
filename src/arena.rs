//! Bump allocator of 256 KiB slabs with an oversized-block side list.
//!
//! Grounded on `arena.c`'s `ca_arena_alloc`/`ca_arena_reset`. The C API
//! hands back raw pointers valid for the arena's lifetime; this crate
//! instead hands back an opaque [`ArenaHandle`] that must be redeemed
//! through the owning [`Arena`], which sidesteps self-referential
//! lifetimes while keeping the same bump/spill/oversize structure.

const SLAB_SIZE: usize = 256 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlabRef {
    Normal(usize),
    Oversize(usize),
}

/// A handle to a previously allocated region. Only valid against the
/// [`Arena`] that produced it.
#[derive(Clone, Copy, Debug)]
pub struct ArenaHandle {
    slab: SlabRef,
    offset: usize,
    len: usize,
}

impl ArenaHandle {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

pub struct Arena {
    slabs: Vec<Vec<u8>>,
    oversize: Vec<Vec<u8>>,
}

fn round_up_4(n: usize) -> usize {
    (n + 3) & !3
}

impl Arena {
    pub fn new() -> Self {
        Arena {
            slabs: vec![Vec::with_capacity(SLAB_SIZE)],
            oversize: Vec::new(),
        }
    }

    /// Allocates `n` zero-initialized bytes, rounded up to a multiple of
    /// four. Blocks larger than 256 KiB get a dedicated allocation
    /// appended to the oversize list; everything else bump-allocates
    /// from the current slab, spilling into a fresh slab when the
    /// remaining space is insufficient.
    pub fn alloc(&mut self, n: usize) -> ArenaHandle {
        let n = round_up_4(n);

        if n > SLAB_SIZE {
            let idx = self.oversize.len();
            self.oversize.push(vec![0u8; n]);
            return ArenaHandle {
                slab: SlabRef::Oversize(idx),
                offset: 0,
                len: n,
            };
        }

        let needs_new_slab = {
            let last = self.slabs.last().unwrap();
            last.capacity() - last.len() < n
        };
        if needs_new_slab {
            self.slabs.push(Vec::with_capacity(SLAB_SIZE));
        }

        let slab_idx = self.slabs.len() - 1;
        let slab = &mut self.slabs[slab_idx];
        let offset = slab.len();
        slab.resize(offset + n, 0);

        ArenaHandle {
            slab: SlabRef::Normal(slab_idx),
            offset,
            len: n,
        }
    }

    /// Identical to [`Arena::alloc`] — every region the arena hands out
    /// is already zeroed, matching `ca_arena_calloc`'s behavior on top
    /// of `ca_arena_alloc`.
    pub fn calloc(&mut self, n: usize) -> ArenaHandle {
        self.alloc(n)
    }

    /// Copies `s` into a fresh allocation with a trailing NUL byte.
    pub fn strdup(&mut self, s: &[u8]) -> ArenaHandle {
        let handle = self.alloc(s.len() + 1);
        let dst = self.get_mut(&handle);
        dst[..s.len()].copy_from_slice(s);
        dst[s.len()] = 0;
        handle
    }

    /// Like [`Arena::strdup`] but copies at most `max_len` bytes of `s`.
    pub fn strndup(&mut self, s: &[u8], max_len: usize) -> ArenaHandle {
        let truncated = &s[..s.len().min(max_len)];
        self.strdup(truncated)
    }

    pub fn get(&self, handle: &ArenaHandle) -> &[u8] {
        match handle.slab {
            SlabRef::Normal(idx) => &self.slabs[idx][handle.offset..handle.offset + handle.len],
            SlabRef::Oversize(idx) => &self.oversize[idx][..],
        }
    }

    pub fn get_mut(&mut self, handle: &ArenaHandle) -> &mut [u8] {
        match handle.slab {
            SlabRef::Normal(idx) => &mut self.slabs[idx][handle.offset..handle.offset + handle.len],
            SlabRef::Oversize(idx) => &mut self.oversize[idx][..],
        }
    }

    /// Releases every slab but the first and drops all oversize blocks.
    pub fn reset(&mut self) {
        self.slabs.truncate(1);
        self.slabs[0].clear();
        self.oversize.clear();
    }
}

impl Default for Arena {
    fn default() -> Self {
        Arena::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_rounds_up_to_multiple_of_four() {
        let mut arena = Arena::new();
        let h = arena.alloc(5);
        assert_eq!(h.len(), 8);
    }

    #[test]
    fn alloc_returns_zeroed_memory() {
        let mut arena = Arena::new();
        let h = arena.alloc(16);
        assert!(arena.get(&h).iter().all(|&b| b == 0));
    }

    #[test]
    fn oversize_block_gets_dedicated_allocation() {
        let mut arena = Arena::new();
        let h = arena.alloc(SLAB_SIZE + 1);
        assert_eq!(h.len(), round_up_4(SLAB_SIZE + 1));
        assert_eq!(arena.slabs.len(), 1);
        assert_eq!(arena.oversize.len(), 1);
    }

    #[test]
    fn spills_into_a_new_slab_when_full() {
        let mut arena = Arena::new();
        arena.alloc(SLAB_SIZE - 4);
        assert_eq!(arena.slabs.len(), 1);
        arena.alloc(8);
        assert_eq!(arena.slabs.len(), 2);
    }

    #[test]
    fn strdup_nul_terminates() {
        let mut arena = Arena::new();
        let h = arena.strdup(b"hello");
        assert_eq!(arena.get(&h), b"hello\0");
    }

    #[test]
    fn strndup_truncates() {
        let mut arena = Arena::new();
        let h = arena.strndup(b"hello world", 5);
        assert_eq!(arena.get(&h), b"hello\0");
    }

    #[test]
    fn reset_drops_extra_slabs_and_oversize_blocks() {
        let mut arena = Arena::new();
        arena.alloc(SLAB_SIZE);
        arena.alloc(8);
        arena.alloc(SLAB_SIZE + 1);
        assert!(arena.slabs.len() > 1);
        assert_eq!(arena.oversize.len(), 1);

        arena.reset();
        assert_eq!(arena.slabs.len(), 1);
        assert_eq!(arena.slabs[0].len(), 0);
        assert!(arena.oversize.is_empty());
    }
}
