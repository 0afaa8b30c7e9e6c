//! The fixed geometric operation set.

use std::str::FromStr;

use crate::error::OpError;

/// A geometric operation the dispatcher knows how to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Expand each geometry outward by a metric distance
    Buffer,

    /// Restrict the first collection to the extent of the second
    Clip,

    /// Subtract the dissolved second collection from the first
    Difference,

    /// Union the dissolved collections into a single feature
    Union,

    /// Pairwise overlay of the two collections
    Intersect,

    /// Concatenate both collections' rows without geometric change
    Merge,

    /// Merge all geometries of one collection into one feature
    Dissolve,
}

impl Operation {
    /// Every operation in the fixed set.
    pub const ALL: [Operation; 7] = [
        Operation::Buffer,
        Operation::Clip,
        Operation::Difference,
        Operation::Union,
        Operation::Intersect,
        Operation::Merge,
        Operation::Dissolve,
    ];

    /// The wire name of the operation, as used in the `operation` form field.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Buffer => "buffer",
            Operation::Clip => "clip",
            Operation::Difference => "difference",
            Operation::Union => "union",
            Operation::Intersect => "intersect",
            Operation::Merge => "merge",
            Operation::Dissolve => "dissolve",
        }
    }

    /// Whether the operation consumes a second collection.
    pub fn requires_second_input(&self) -> bool {
        matches!(
            self,
            Operation::Clip
                | Operation::Difference
                | Operation::Union
                | Operation::Intersect
                | Operation::Merge
        )
    }
}

impl FromStr for Operation {
    type Err = OpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .iter()
            .find(|op| op.name() == s)
            .copied()
            .ok_or_else(|| OpError::UnsupportedOperation(s.to_string()))
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Tests
// =============================================================================
