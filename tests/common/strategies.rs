#![allow(dead_code)]

use proptest::prelude::*;

/// Concurrency limits that disable the gate
pub fn unlimited_concurrency_strategy() -> impl Strategy<Value = i32> {
    prop_oneof![Just(0), -100i32..0]
}

/// Number of tasks already IN_PROGRESS for a definition
pub fn in_progress_count_strategy() -> impl Strategy<Value = usize> {
    0usize..20
}

/// (limit, window seconds) pairs with both positive
pub fn rate_limit_strategy() -> impl Strategy<Value = (i32, i32)> {
    (1i32..6, 1i32..300)
}

pub fn task_def_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{2,20}"
}
