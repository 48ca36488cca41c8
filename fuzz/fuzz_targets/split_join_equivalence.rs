#![no_main]
use libfuzzer_sys::fuzz_target;

use edit_tree::model::{run_split_join_equivalence, SplitJoinInput};

fuzz_target!(|input: SplitJoinInput| {
    run_split_join_equivalence(input.text, input.cuts)
});
