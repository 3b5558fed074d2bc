//! Logical-to-physical extent arithmetic.
//!
//! Every function here is a pure computation over a `Vec<VolumeExtent>`;
//! none of them perform I/O or hold locks. The inode's map is mutated
//! under the inode cache's per-inode serialization (spec §4.3, §5);
//! this module only guarantees that each call, given a list already
//! satisfying the disjoint-sorted-nonzero invariant, returns one that
//! still does.

use crate::error::FsError;
use crate::model::{AllocInfo, Allocated, PExtent, VolumeExtent};

/// Round `len` up to the next multiple of `grain` (`grain` must be > 0).
fn round_up(len: u64, grain: u64) -> u64 {
    len.div_ceil(grain) * grain
}

/// Scan `[off, off+size)` and return one [`AllocInfo`] per maximal
/// sub-range not already covered by `list`. Lengths are rounded up to
/// `min_alloc_size`, but never past the start of the next already-mapped
/// entry in `list` (mapped entries can lie beyond `off+size` too, when a
/// later write filled in ahead of an earlier one); `hint_prev_physical`
/// carries the physical end of the extent immediately preceding a gap
/// when it abuts that gap.
pub fn get_to_alloc_extents(
    list: &[VolumeExtent],
    off: u64,
    size: u64,
    min_alloc_size: u64,
) -> Vec<AllocInfo> {
    if size == 0 {
        return Vec::new();
    }
    let end = off + size;
    let mut result = Vec::new();
    let mut cursor = off;
    // (fs_end, volume_end) of the nearest extent seen so far that ends
    // at or before `cursor`.
    let mut prev_end: Option<(u64, u64)> = None;
    let mut i = 0;

    while cursor < end {
        while i < list.len() && list[i].fs_end() <= cursor {
            prev_end = Some((list[i].fs_end(), list[i].volume_end()));
            i += 1;
        }
        match list.get(i) {
            Some(e) if e.fs_offset <= cursor => {
                // `cursor` falls inside an already-mapped entry; skip past it.
                cursor = e.fs_end();
                prev_end = Some((e.fs_end(), e.volume_end()));
                i += 1;
            }
            Some(e) => {
                // Gap up to the next mapped entry, which bounds how far a
                // rounded-up allocation may extend regardless of `end`.
                let hint = match prev_end {
                    Some((fe, ve)) if fe == cursor => ve,
                    _ => 0,
                };
                let wanted = round_up(end.min(e.fs_offset) - cursor, min_alloc_size);
                let length = wanted.min(e.fs_offset - cursor);
                result.push(AllocInfo {
                    logical_offset: cursor,
                    hint_prev_physical: hint,
                    length,
                });
                cursor += length;
            }
            None => {
                let hint = match prev_end {
                    Some((fe, ve)) if fe == cursor => ve,
                    _ => 0,
                };
                let length = round_up(end - cursor, min_alloc_size);
                result.push(AllocInfo {
                    logical_offset: cursor,
                    hint_prev_physical: hint,
                    length,
                });
                cursor += length;
            }
        }
    }
    result
}

/// Insert `allocated[i]` at `to_alloc[i].logical_offset` into `list` for
/// every `i`, splitting/merging adjacent entries as needed.
///
/// Fails with `FsError::Internal` when the two slices have different
/// lengths or when a pair's lengths disagree; the caller must then
/// return `allocated` to the space allocator via `DeAllocExtents`.
pub fn merge_alloced_extents(
    to_alloc: &[AllocInfo],
    allocated: &[Allocated],
    list: &mut Vec<VolumeExtent>,
) -> Result<(), FsError> {
    if to_alloc.len() != allocated.len() {
        return Err(FsError::Internal(format!(
            "alloc plan has {} entries but allocator returned {}",
            to_alloc.len(),
            allocated.len()
        )));
    }
    for (plan, alloc) in to_alloc.iter().zip(allocated.iter()) {
        if alloc.length != plan.length {
            return Err(FsError::Internal(format!(
                "allocator returned length {} for plan length {} at offset {}",
                alloc.length, plan.length, plan.logical_offset
            )));
        }
        insert_extent(
            list,
            VolumeExtent {
                fs_offset: plan.logical_offset,
                volume_offset: alloc.offset,
                length: alloc.length,
                is_written: false,
            },
        );
    }
    Ok(())
}

fn insert_extent(list: &mut Vec<VolumeExtent>, new_extent: VolumeExtent) {
    let pos = list.partition_point(|e| e.fs_offset < new_extent.fs_offset);
    list.insert(pos, new_extent);
    coalesce_all(list);
}

/// Merge adjacent entries that share `is_written` and are contiguous on
/// both the logical and physical axes. Not required by the invariant,
/// but keeps lists from growing without bound under repeated small
/// writes to the same region.
fn coalesce_all(list: &mut Vec<VolumeExtent>) {
    let mut i = 0;
    while i + 1 < list.len() {
        let a = list[i];
        let b = list[i + 1];
        if a.is_written == b.is_written && a.fs_end() == b.fs_offset && a.volume_end() == b.volume_offset
        {
            list[i].length += b.length;
            list.remove(i + 1);
        } else {
            i += 1;
        }
    }
}

/// Walk `list ∩ [off, off+size)` and emit one [`PExtent`] per covered
/// sub-range and one per hole, in logical order. The emitted ranges
/// exactly cover `[off, off+size)`.
pub fn divide_extents(list: &[VolumeExtent], off: u64, size: u64) -> Vec<PExtent> {
    if size == 0 {
        return Vec::new();
    }
    let end = off + size;
    let mut result = Vec::new();
    let mut cursor = off;

    for e in list {
        if e.fs_end() <= cursor {
            continue;
        }
        if e.fs_offset >= end {
            break;
        }
        if e.fs_offset > cursor {
            let hole_end = e.fs_offset.min(end);
            result.push(PExtent {
                p_offset: 0,
                len: hole_end - cursor,
                un_written: true,
            });
            cursor = hole_end;
        }
        let seg_end = e.fs_end().min(end);
        if seg_end > cursor {
            result.push(PExtent {
                p_offset: e.volume_offset + (cursor - e.fs_offset),
                len: seg_end - cursor,
                un_written: !e.is_written,
            });
            cursor = seg_end;
        }
        if cursor >= end {
            break;
        }
    }
    if cursor < end {
        result.push(PExtent {
            p_offset: 0,
            len: end - cursor,
            un_written: true,
        });
    }
    result
}

/// Split boundary entries so `[off, off+size)` aligns exactly with entry
/// boundaries, then mark every entry fully inside that range written.
pub fn mark_extents_written(list: &mut Vec<VolumeExtent>, off: u64, size: u64) {
    if size == 0 {
        return;
    }
    let end = off + size;
    split_at(list, off);
    split_at(list, end);
    for e in list.iter_mut() {
        if e.fs_offset >= off && e.fs_end() <= end {
            e.is_written = true;
        }
    }
    coalesce_all(list);
}

/// If an entry straddles `point`, split it into two entries at `point`.
/// No-op if `point` already falls on a boundary (or outside the list).
fn split_at(list: &mut Vec<VolumeExtent>, point: u64) {
    if let Some(idx) = list
        .iter()
        .position(|e| e.fs_offset < point && e.fs_end() > point)
    {
        let e = list[idx];
        let left_len = point - e.fs_offset;
        let left = VolumeExtent {
            fs_offset: e.fs_offset,
            volume_offset: e.volume_offset,
            length: left_len,
            is_written: e.is_written,
        };
        let right = VolumeExtent {
            fs_offset: point,
            volume_offset: e.volume_offset + left_len,
            length: e.length - left_len,
            is_written: e.is_written,
        };
        list.splice(idx..=idx, [left, right]);
    }
}

/// Check the disjoint-sorted-nonzero invariant. Used by tests and by
/// debug assertions at call sites that mutate a cached inode's map.
pub fn check_invariants(list: &[VolumeExtent]) -> bool {
    let mut prev_end: Option<u64> = None;
    for e in list {
        if e.length == 0 {
            return false;
        }
        if let Some(pe) = prev_end {
            if e.fs_offset < pe {
                return false;
            }
        }
        prev_end = Some(e.fs_end());
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ext(fs_offset: u64, volume_offset: u64, length: u64, is_written: bool) -> VolumeExtent {
        VolumeExtent {
            fs_offset,
            volume_offset,
            length,
            is_written,
        }
    }

    // Property 1: plan -> alloc -> merge covers [off, off+size) and keeps
    // the invariant.
    #[test]
    fn property_merge_covers_requested_range_on_empty_list() {
        let mut list = Vec::new();
        let plan = get_to_alloc_extents(&list, 0, 4, 4096);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].length, 4096);
        let allocated = vec![Allocated {
            offset: 0,
            length: 4096,
        }];
        merge_alloced_extents(&plan, &allocated, &mut list).unwrap();
        assert!(check_invariants(&list));
        let divided = divide_extents(&list, 0, 4);
        let total: u64 = divided.iter().map(|p| p.len).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn property_merge_fills_gap_between_two_existing_extents() {
        let mut list = vec![ext(0, 0, 4096, true), ext(8192, 8192, 4096, true)];
        let plan = get_to_alloc_extents(&list, 4096, 4096, 4096);
        assert_eq!(plan, vec![AllocInfo {
            logical_offset: 4096,
            hint_prev_physical: 4096,
            length: 4096,
        }]);
        let allocated = vec![Allocated {
            offset: 4096,
            length: 4096,
        }];
        merge_alloced_extents(&plan, &allocated, &mut list).unwrap();
        assert!(check_invariants(&list));
        // Contiguous on both axes and both unwritten-vs-written differ
        // (existing entries are written, new one is not), so no coalescing
        // happens yet, but the list covers the whole byte range.
        assert_eq!(list.len(), 3);
        let divided = divide_extents(&list, 0, 12288);
        let total: u64 = divided.iter().map(|p| p.len).sum();
        assert_eq!(total, 12288);
    }

    #[test]
    fn get_to_alloc_extents_skips_fully_covered_range() {
        let list = vec![ext(0, 0, 4096, true)];
        let plan = get_to_alloc_extents(&list, 0, 4096, 4096);
        assert!(plan.is_empty());
    }

    #[test]
    fn get_to_alloc_extents_rounds_length_up() {
        let list = Vec::new();
        let plan = get_to_alloc_extents(&list, 0, 100, 4096);
        assert_eq!(plan[0].length, 4096);
    }

    // A rounded-up allocation must never be extended past the start of an
    // already-mapped entry, even when that entry lies beyond the requested
    // range. Three ordinary writes (off=0/len=1, off=4200/len=5,
    // off=4100/len=10) used to round the third write's gap straight through
    // the second write's extent.
    #[test]
    fn property_alloc_plan_never_overlaps_an_existing_entry() {
        let mut list = Vec::new();
        let mut next_offset = 0u64;
        let mut alloc = |list: &mut Vec<VolumeExtent>, off: u64, size: u64| {
            let plan = get_to_alloc_extents(list, off, size, 4096);
            let allocated: Vec<Allocated> = plan
                .iter()
                .map(|p| {
                    let a = Allocated {
                        offset: next_offset,
                        length: p.length,
                    };
                    next_offset += p.length;
                    a
                })
                .collect();
            merge_alloced_extents(&plan, &allocated, list).unwrap();
            assert!(check_invariants(list));
        };
        alloc(&mut list, 0, 1);
        alloc(&mut list, 4200, 5);
        alloc(&mut list, 4100, 10);
        assert!(check_invariants(&list));
        let divided = divide_extents(&list, 0, 4210);
        let total: u64 = divided.iter().map(|p| p.len).sum();
        assert_eq!(total, 4210);
    }

    #[test]
    fn merge_mismatched_lengths_is_internal_error() {
        let mut list = Vec::new();
        let plan = vec![AllocInfo {
            logical_offset: 0,
            hint_prev_physical: 0,
            length: 4096,
        }];
        let allocated = vec![Allocated {
            offset: 0,
            length: 2048,
        }];
        let err = merge_alloced_extents(&plan, &allocated, &mut list).unwrap_err();
        assert!(matches!(err, FsError::Internal(_)));
        assert!(list.is_empty());
    }

    #[test]
    fn merge_mismatched_counts_is_internal_error() {
        let mut list = Vec::new();
        let plan = vec![
            AllocInfo {
                logical_offset: 0,
                hint_prev_physical: 0,
                length: 4096,
            },
            AllocInfo {
                logical_offset: 8192,
                hint_prev_physical: 0,
                length: 4096,
            },
        ];
        let allocated = vec![Allocated {
            offset: 0,
            length: 4096,
        }];
        assert!(merge_alloced_extents(&plan, &allocated, &mut list).is_err());
    }

    // Property 2: divide coverage.
    #[test]
    fn divide_extents_covers_holes_and_data_exactly() {
        let list = vec![
            ext(0, 0, 4, true),
            ext(4, 4, 4092, false),
        ];
        let divided = divide_extents(&list, 0, 4096);
        let total: u64 = divided.iter().map(|p| p.len).sum();
        assert_eq!(total, 4096);
        assert_eq!(divided[0], PExtent { p_offset: 0, len: 4, un_written: false });
        assert_eq!(divided[1], PExtent { p_offset: 4, len: 4092, un_written: true });
    }

    #[test]
    fn divide_extents_over_empty_list_is_one_hole() {
        let divided = divide_extents(&[], 10, 90);
        assert_eq!(divided, vec![PExtent { p_offset: 0, len: 90, un_written: true }]);
    }

    #[test]
    fn divide_extents_with_hole_before_and_after_mapped_region() {
        let list = vec![ext(100, 200, 50, true)];
        let divided = divide_extents(&list, 0, 200);
        let total: u64 = divided.iter().map(|p| p.len).sum();
        assert_eq!(total, 200);
        assert_eq!(divided[0], PExtent { p_offset: 0, len: 100, un_written: true });
        assert_eq!(divided[1], PExtent { p_offset: 200, len: 50, un_written: false });
        assert_eq!(divided[2], PExtent { p_offset: 0, len: 50, un_written: true });
    }

    #[test]
    fn mark_extents_written_splits_boundaries() {
        let mut list = vec![ext(0, 0, 4096, false)];
        mark_extents_written(&mut list, 0, 4);
        assert!(check_invariants(&list));
        assert_eq!(list[0], ext(0, 0, 4, true));
        assert_eq!(list[1], ext(4, 4, 4092, false));
    }

    #[test]
    fn mark_extents_written_coalesces_fully_written_neighbors() {
        let mut list = vec![ext(0, 0, 4, true), ext(4, 4, 4092, false)];
        mark_extents_written(&mut list, 4, 4092);
        assert!(check_invariants(&list));
        assert_eq!(list.len(), 1);
        assert_eq!(list[0], ext(0, 0, 4096, true));
    }

    #[test]
    fn check_invariants_rejects_zero_length() {
        assert!(!check_invariants(&[ext(0, 0, 0, true)]));
    }

    #[test]
    fn check_invariants_rejects_overlap() {
        assert!(!check_invariants(&[ext(0, 0, 10, true), ext(5, 5, 10, true)]));
    }
}
