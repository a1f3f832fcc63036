//! Query planner types exchanged through `xBestIndex`.

use sqlbridge_error::{BridgeError, Result};

/// Comparison operator for an index constraint.
///
/// Mirrors the engine's `SQLITE_INDEX_CONSTRAINT_*` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintOp {
    Eq,
    Gt,
    Le,
    Lt,
    Ge,
    Match,
    Like,
    Glob,
    Regexp,
    Ne,
    IsNot,
    IsNotNull,
    IsNull,
    Is,
    Limit,
    Offset,
    /// An overloaded function (`>= 150`) returned by a function override.
    Function(u8),
    /// A value this crate does not know about.
    Other(u8),
}

impl ConstraintOp {
    /// Decode the engine's raw operator byte.
    #[must_use]
    pub const fn from_raw(op: u8) -> Self {
        match op {
            2 => Self::Eq,
            4 => Self::Gt,
            8 => Self::Le,
            16 => Self::Lt,
            32 => Self::Ge,
            64 => Self::Match,
            65 => Self::Like,
            66 => Self::Glob,
            67 => Self::Regexp,
            68 => Self::Ne,
            69 => Self::IsNot,
            70 => Self::IsNotNull,
            71 => Self::IsNull,
            72 => Self::Is,
            73 => Self::Limit,
            74 => Self::Offset,
            150..=255 => Self::Function(op),
            other => Self::Other(other),
        }
    }

    /// The engine's raw operator byte.
    #[must_use]
    pub const fn to_raw(self) -> u8 {
        match self {
            Self::Eq => 2,
            Self::Gt => 4,
            Self::Le => 8,
            Self::Lt => 16,
            Self::Ge => 32,
            Self::Match => 64,
            Self::Like => 65,
            Self::Glob => 66,
            Self::Regexp => 67,
            Self::Ne => 68,
            Self::IsNot => 69,
            Self::IsNotNull => 70,
            Self::IsNull => 71,
            Self::Is => 72,
            Self::Limit => 73,
            Self::Offset => 74,
            Self::Function(op) | Self::Other(op) => op,
        }
    }
}

/// A single constraint from the WHERE clause that the planner is considering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConstraint {
    /// Column index (0-based; `-1` for rowid).
    pub column: i32,
    /// The comparison operator.
    pub op: ConstraintOp,
    /// Whether the planner considers this constraint usable.
    pub usable: bool,
}

/// A single ORDER BY term from the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOrderBy {
    /// Column index (0-based).
    pub column: i32,
    /// `true` if descending, `false` if ascending.
    pub desc: bool,
}

/// Per-constraint usage information set by `best_index`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexConstraintUsage {
    /// 1-based index into the `args` array passed to `filter`.
    /// 0 means this constraint is not consumed by the vtab.
    pub argv_index: i32,
    /// If `true`, the vtab guarantees this constraint is satisfied and
    /// the core need not double-check it.
    pub omit: bool,
}

/// Information exchanged between the query planner and virtual table
/// during index selection.
///
/// The planner fills `constraints`, `order_by` and `columns_used`. The vtab
/// fills `constraint_usage`, `idx_num`, `idx_str`, `order_by_consumed`,
/// `estimated_cost`, `estimated_rows` and `unique_scan`. Constraint order and
/// positions are the engine's own: usage is written back by position, so
/// `constraints` and `order_by` must come back exactly as proposed.
#[derive(Debug, Clone)]
pub struct IndexInfo {
    /// WHERE clause constraints the planner is considering.
    pub constraints: Vec<IndexConstraint>,
    /// ORDER BY terms from the query.
    pub order_by: Vec<IndexOrderBy>,
    /// How each constraint maps to filter arguments (vtab fills this).
    pub constraint_usage: Vec<IndexConstraintUsage>,
    /// Integer identifier for the chosen index strategy.
    pub idx_num: i32,
    /// Optional string identifier for the chosen index strategy.
    pub idx_str: Option<String>,
    /// Whether the vtab guarantees the output is already sorted.
    pub order_by_consumed: bool,
    /// Estimated cost of the scan (lower is better).
    pub estimated_cost: f64,
    /// Estimated number of rows returned.
    pub estimated_rows: i64,
    /// The scan visits at most one row.
    pub unique_scan: bool,
    /// Bit `i` set if column `i` is used (bit 63 covers columns >= 63).
    pub columns_used: u64,
    proposed_constraints: Vec<IndexConstraint>,
    proposed_order_by: Vec<IndexOrderBy>,
}

impl IndexInfo {
    /// Create a new `IndexInfo` with the given constraints and order-by terms.
    #[must_use]
    pub fn new(constraints: Vec<IndexConstraint>, order_by: Vec<IndexOrderBy>) -> Self {
        let usage_len = constraints.len();
        Self {
            proposed_constraints: constraints.clone(),
            proposed_order_by: order_by.clone(),
            constraints,
            order_by,
            constraint_usage: vec![IndexConstraintUsage::default(); usage_len],
            idx_num: 0,
            idx_str: None,
            order_by_consumed: false,
            estimated_cost: 1_000_000.0,
            estimated_rows: 1_000_000,
            unique_scan: false,
            columns_used: u64::MAX,
        }
    }

    /// Check an answer before it is written back to the planner.
    ///
    /// The constraints and order-by terms must be the ones proposed, the
    /// usage vector must still line up with them, consumed constraints must
    /// have been proposed as usable, and the non-zero `argv_index` values
    /// must be exactly `1..=k` for some `k`.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Misuse`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.constraints != self.proposed_constraints {
            return Err(BridgeError::misuse(
                "best_index must not reorder or modify the proposed constraints",
            ));
        }
        if self.order_by != self.proposed_order_by {
            return Err(BridgeError::misuse(
                "best_index must not reorder or modify the proposed order-by terms",
            ));
        }
        let n = self.proposed_constraints.len();
        if self.constraint_usage.len() != n {
            return Err(BridgeError::misuse(format!(
                "best_index changed the constraint usage length from {n} to {}",
                self.constraint_usage.len()
            )));
        }

        let mut taken = vec![false; n];
        let mut highest = 0usize;
        for (i, (constraint, usage)) in self
            .proposed_constraints
            .iter()
            .zip(&self.constraint_usage)
            .enumerate()
        {
            let Ok(argv) = usize::try_from(usage.argv_index) else {
                return Err(BridgeError::misuse(format!(
                    "constraint {i}: negative argv_index {}",
                    usage.argv_index
                )));
            };
            if argv == 0 {
                continue;
            }
            if argv > n {
                return Err(BridgeError::misuse(format!(
                    "constraint {i}: argv_index {argv} exceeds constraint count {n}"
                )));
            }
            if !constraint.usable {
                return Err(BridgeError::misuse(format!(
                    "constraint {i} is not usable but was assigned argv_index {argv}"
                )));
            }
            if taken[argv - 1] {
                return Err(BridgeError::misuse(format!(
                    "constraint {i}: argv_index {argv} assigned twice"
                )));
            }
            taken[argv - 1] = true;
            highest = highest.max(argv);
        }
        if taken[..highest].iter().any(|t| !t) {
            return Err(BridgeError::misuse(
                "argv_index values must be contiguous from 1",
            ));
        }
        Ok(())
    }

    /// Number of arguments `filter` will receive for this answer.
    #[must_use]
    pub fn argument_count(&self) -> usize {
        self.constraint_usage
            .iter()
            .filter(|u| u.argv_index > 0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usable(column: i32, op: ConstraintOp) -> IndexConstraint {
        IndexConstraint {
            column,
            op,
            usable: true,
        }
    }

    #[test]
    fn test_index_info_new() {
        let info = IndexInfo::new(
            vec![usable(0, ConstraintOp::Eq), IndexConstraint {
                column: 1,
                op: ConstraintOp::Gt,
                usable: false,
            }],
            vec![IndexOrderBy {
                column: 0,
                desc: false,
            }],
        );

        assert_eq!(info.constraints.len(), 2);
        assert_eq!(info.order_by.len(), 1);
        assert_eq!(info.constraint_usage.len(), 2);
        assert_eq!(info.idx_num, 0);
        assert!(info.idx_str.is_none());
        assert!(!info.order_by_consumed);
        info.validate().unwrap();
        assert_eq!(info.argument_count(), 0);
    }

    #[test]
    fn raw_operator_bytes() {
        for op in [
            ConstraintOp::Eq,
            ConstraintOp::Le,
            ConstraintOp::Like,
            ConstraintOp::IsNull,
            ConstraintOp::Limit,
            ConstraintOp::Offset,
        ] {
            assert_eq!(ConstraintOp::from_raw(op.to_raw()), op);
        }
        assert_eq!(ConstraintOp::from_raw(2), ConstraintOp::Eq);
        assert_eq!(ConstraintOp::from_raw(151), ConstraintOp::Function(151));
        assert_eq!(ConstraintOp::from_raw(3), ConstraintOp::Other(3));
    }

    #[test]
    fn contiguous_answer_is_accepted() {
        let mut info = IndexInfo::new(
            vec![usable(0, ConstraintOp::Ge), usable(0, ConstraintOp::Le), usable(1, ConstraintOp::Eq)],
            vec![],
        );
        info.constraint_usage[2].argv_index = 1;
        info.constraint_usage[0].argv_index = 2;
        info.validate().unwrap();
        assert_eq!(info.argument_count(), 2);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let mut info = IndexInfo::new(vec![usable(0, ConstraintOp::Eq)], vec![]);
        info.constraint_usage[0].argv_index = 2;
        let err = info.validate().unwrap_err();
        assert!(err.to_string().contains("exceeds constraint count"));

        info.constraint_usage[0].argv_index = -1;
        assert!(info.validate().is_err());
    }

    #[test]
    fn duplicate_index_is_rejected() {
        let mut info = IndexInfo::new(
            vec![usable(0, ConstraintOp::Eq), usable(1, ConstraintOp::Eq)],
            vec![],
        );
        info.constraint_usage[0].argv_index = 1;
        info.constraint_usage[1].argv_index = 1;
        let err = info.validate().unwrap_err();
        assert!(err.to_string().contains("assigned twice"));
    }

    #[test]
    fn gap_in_indices_is_rejected() {
        let mut info = IndexInfo::new(
            vec![usable(0, ConstraintOp::Eq), usable(1, ConstraintOp::Eq)],
            vec![],
        );
        info.constraint_usage[1].argv_index = 2;
        let err = info.validate().unwrap_err();
        assert!(err.to_string().contains("contiguous"));
    }

    #[test]
    fn unusable_constraint_cannot_be_consumed() {
        let mut info = IndexInfo::new(
            vec![IndexConstraint {
                column: 0,
                op: ConstraintOp::Eq,
                usable: false,
            }],
            vec![],
        );
        info.constraint_usage[0].argv_index = 1;
        let err = info.validate().unwrap_err();
        assert!(matches!(err, BridgeError::Misuse { .. }));
    }

    #[test]
    fn reordered_constraints_are_rejected() {
        let mut info = IndexInfo::new(
            vec![usable(0, ConstraintOp::Ge), usable(0, ConstraintOp::Le)],
            vec![],
        );
        info.constraints.sort_by_key(|c| c.op != ConstraintOp::Le);
        info.constraint_usage[0].argv_index = 1;
        info.constraint_usage[0].omit = true;
        let err = info.validate().unwrap_err();
        assert!(err.to_string().contains("proposed constraints"), "{err}");
    }

    #[test]
    fn usable_flag_cannot_be_forged() {
        let mut info = IndexInfo::new(
            vec![IndexConstraint {
                column: 0,
                op: ConstraintOp::Eq,
                usable: false,
            }],
            vec![],
        );
        info.constraints[0].usable = true;
        info.constraint_usage[0].argv_index = 1;
        assert!(matches!(info.validate(), Err(BridgeError::Misuse { .. })));
    }

    #[test]
    fn modified_order_by_is_rejected() {
        let mut info = IndexInfo::new(
            vec![],
            vec![IndexOrderBy {
                column: 0,
                desc: false,
            }],
        );
        info.order_by.clear();
        let err = info.validate().unwrap_err();
        assert!(err.to_string().contains("order-by"), "{err}");
    }

    #[test]
    fn resized_usage_is_rejected() {
        let mut info = IndexInfo::new(vec![usable(0, ConstraintOp::Eq)], vec![]);
        info.constraint_usage.push(IndexConstraintUsage::default());
        assert!(info.validate().is_err());
    }
}
