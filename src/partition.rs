//!
//! Work Partitioner, flattens per instance bone counts into one index space.
//!

use crate::base::BONES_PER_FLAG_WORD;

/// Prefix sums over the bone counts (and channel flag words) of many rig instances.
///
/// Instance `i` owns bones `bone_offsets[i]..bone_offsets[i + 1]` of the flat output, and flag
/// words `flag_word_offsets[i]..flag_word_offsets[i + 1]`. Both arrays carry a trailing sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkPartition {
    bone_offsets: Vec<usize>,
    flag_word_offsets: Vec<usize>,
}

impl Default for WorkPartition {
    fn default() -> WorkPartition {
        return WorkPartition {
            bone_offsets: vec![0],
            flag_word_offsets: vec![0],
        };
    }
}

impl WorkPartition {
    /// Computes the offsets from the bone count of each instance.
    pub fn new(bone_counts: impl IntoIterator<Item = usize>) -> WorkPartition {
        let mut partition = WorkPartition::default();
        partition.rebuild(bone_counts);
        return partition;
    }

    /// Recomputes the offsets, reusing allocations.
    pub fn rebuild(&mut self, bone_counts: impl IntoIterator<Item = usize>) {
        self.bone_offsets.clear();
        self.flag_word_offsets.clear();
        self.bone_offsets.push(0);
        self.flag_word_offsets.push(0);

        let mut bones = 0;
        let mut words = 0;
        for count in bone_counts {
            bones += count;
            words += flag_words(count);
            self.bone_offsets.push(bones);
            self.flag_word_offsets.push(words);
        }
        log::trace!(
            "work partition: {} instances, {} bones, {} flag words",
            self.num_instances(),
            bones,
            words
        );
    }

    #[inline]
    pub fn num_instances(&self) -> usize {
        return self.bone_offsets.len() - 1;
    }

    #[inline]
    pub fn total_bones(&self) -> usize {
        return self.bone_offsets[self.bone_offsets.len() - 1];
    }

    #[inline]
    pub fn total_flag_words(&self) -> usize {
        return self.flag_word_offsets[self.flag_word_offsets.len() - 1];
    }

    #[inline]
    pub fn bone_offsets(&self) -> &[usize] {
        return &self.bone_offsets;
    }

    #[inline]
    pub fn flag_word_offsets(&self) -> &[usize] {
        return &self.flag_word_offsets;
    }

    /// Gets the flat bone range of an instance.
    #[inline]
    pub fn bone_range(&self, instance: usize) -> std::ops::Range<usize> {
        return self.bone_offsets[instance]..self.bone_offsets[instance + 1];
    }

    /// Gets the flag word range of an instance.
    #[inline]
    pub fn flag_word_range(&self, instance: usize) -> std::ops::Range<usize> {
        return self.flag_word_offsets[instance]..self.flag_word_offsets[instance + 1];
    }

    /// Resolves a flat bone index to `(instance, bone)`.
    ///
    /// Instances without bones are skipped. Returns `None` past the last bone.
    pub fn locate(&self, flat: usize) -> Option<(usize, usize)> {
        if flat >= self.total_bones() {
            return None;
        }
        // last offset <= flat, so that empty instances sharing the offset are skipped
        let instance = self.bone_offsets.partition_point(|offset| *offset <= flat) - 1;
        return Some((instance, flat - self.bone_offsets[instance]));
    }
}

/// Number of `u64` words holding the channel flags of `num_bones` bones.
#[inline]
pub fn flag_words(num_bones: usize) -> usize {
    return num_bones.div_ceil(BONES_PER_FLAG_WORD);
}
