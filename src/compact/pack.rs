//! Greedy largest-first packing of files into size-capped containers.
//!
//! This is next-fit decreasing, an approximation: it may use more containers
//! than an optimal packing (bounded by roughly twice the optimum), which is
//! acceptable for archive bundles.

use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackEntry {
    /// Path relative to the directory being packed.
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Container {
    pub entries: Vec<PackEntry>,
    pub size: u64,
    /// Set when a single file larger than the cap fills this container alone.
    pub cap_exceeded: bool,
}

impl Container {
    fn push(&mut self, entry: PackEntry) {
        self.size += entry.size;
        self.entries.push(entry);
    }
}

/// Packs `files` into containers of at most `cap` bytes.
///
/// Files are taken largest first (ties by path). A container is closed when
/// it already holds something and the next file would push it past `cap`. A
/// file bigger than `cap` therefore always ends up alone.
pub fn pack(mut files: Vec<PackEntry>, cap: u64) -> Vec<Container> {
    files.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.path.cmp(&b.path)));

    let mut out = Vec::new();
    let mut current = Container::default();

    for entry in files {
        if !current.entries.is_empty() && current.size + entry.size > cap {
            out.push(finish(current, cap));
            current = Container::default();
        }
        current.push(entry);
    }

    if !current.entries.is_empty() {
        out.push(finish(current, cap));
    }
    out
}

fn finish(mut c: Container, cap: u64) -> Container {
    c.cap_exceeded = c.size > cap;
    c
}
