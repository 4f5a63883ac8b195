/// DrawList - the per-view, per-frame list of culled batches.
///
/// Batches are bucketed by blend category and sorted once culling is done:
/// opaque and alpha-tested batches by material sort key then front-to-back,
/// alpha-blended batches strictly back-to-front.

use rdst::{RadixKey, RadixSort};
use super::draw_batch::{BlendCategory, DrawBatch};

/// Packed sort key with the insertion index as the low 32 bits.
///
/// Keys are unique, so the unstable radix sort is deterministic and equal
/// primary keys keep their insertion order.
#[derive(Debug, Clone, Copy)]
struct SortEntry {
    key: u64,
    index: u32,
}

impl RadixKey for SortEntry {
    const LEVELS: usize = 12;

    #[inline]
    fn get_level(&self, level: usize) -> u8 {
        if level < 4 {
            (self.index >> (level * 8)) as u8
        } else {
            (self.key >> ((level - 4) * 8)) as u8
        }
    }
}

/// Map an f32 to a u32 with the same ordering (negative values included).
#[inline]
fn ordered_f32_bits(value: f32) -> u32 {
    let bits = value.to_bits();
    if bits & 0x8000_0000 != 0 {
        !bits
    } else {
        bits | 0x8000_0000
    }
}

fn front_to_back_key(batch: &DrawBatch) -> u64 {
    ((batch.material.sort_key as u64) << 32) | ordered_f32_bits(batch.distance) as u64
}

fn back_to_front_key(batch: &DrawBatch) -> u64 {
    (!ordered_f32_bits(batch.distance)) as u64
}

fn sort_by_key(batches: &mut Vec<DrawBatch>, key_fn: fn(&DrawBatch) -> u64) {
    if batches.len() < 2 {
        return;
    }
    let mut entries: Vec<SortEntry> = batches
        .iter()
        .enumerate()
        .map(|(index, batch)| SortEntry { key: key_fn(batch), index: index as u32 })
        .collect();
    entries.radix_sort_unstable();

    let mut slots: Vec<Option<DrawBatch>> = batches.drain(..).map(Some).collect();
    batches.extend(entries.iter().filter_map(|entry| slots[entry.index as usize].take()));
}

#[derive(Clone, Default)]
pub struct DrawList {
    opaque: Vec<DrawBatch>,
    alpha_test: Vec<DrawBatch>,
    alpha_blend: Vec<DrawBatch>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch to the bucket of its material's blend category.
    pub fn push(&mut self, batch: DrawBatch) {
        match batch.blend() {
            BlendCategory::Opaque => self.opaque.push(batch),
            BlendCategory::AlphaTest => self.alpha_test.push(batch),
            BlendCategory::AlphaBlend => self.alpha_blend.push(batch),
        }
    }

    /// Sort every bucket into its draw order.
    pub fn sort(&mut self) {
        sort_by_key(&mut self.opaque, front_to_back_key);
        sort_by_key(&mut self.alpha_test, front_to_back_key);
        sort_by_key(&mut self.alpha_blend, back_to_front_key);
    }

    pub fn category(&self, blend: BlendCategory) -> &[DrawBatch] {
        match blend {
            BlendCategory::Opaque => &self.opaque,
            BlendCategory::AlphaTest => &self.alpha_test,
            BlendCategory::AlphaBlend => &self.alpha_blend,
        }
    }

    pub fn opaque(&self) -> &[DrawBatch] {
        &self.opaque
    }

    pub fn alpha_test(&self) -> &[DrawBatch] {
        &self.alpha_test
    }

    pub fn alpha_blend(&self) -> &[DrawBatch] {
        &self.alpha_blend
    }

    pub fn len(&self) -> usize {
        self.opaque.len() + self.alpha_test.len() + self.alpha_blend.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all batches, keeping the allocations for the next frame.
    pub fn clear(&mut self) {
        self.opaque.clear();
        self.alpha_test.clear();
        self.alpha_blend.clear();
    }
}

#[cfg(test)]
#[path = "draw_list_tests.rs"]
mod tests;
