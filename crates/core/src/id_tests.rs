// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

crate::define_id! {
    /// Test-only ID type.
    pub struct TestId;
}

#[test]
fn uuid_gen_produces_unique_ids() {
    let generator = UuidIdGen;
    let a = generator.next();
    let b = generator.next();
    assert_ne!(a, b);
    assert_eq!(a.len(), 36);
}

#[test]
fn sequential_gen_counts_up() {
    let generator = SequentialIdGen::new("exec");
    assert_eq!(generator.next(), "exec-1");
    assert_eq!(generator.next(), "exec-2");
    assert_eq!(generator.next(), "exec-3");
}

#[test]
fn sequential_gen_clones_share_counter() {
    let generator = SequentialIdGen::new("job");
    let clone = generator.clone();
    assert_eq!(generator.next(), "job-1");
    assert_eq!(clone.next(), "job-2");
}

#[test]
fn short_truncates_long_ids() {
    let id = TestId::new("abcdefghij");
    assert_eq!(id.short(4), "abcd");
    assert_eq!(id.short(20), "abcdefghij");
}

#[test]
fn short_id_trait_on_str() {
    assert_eq!("abcdef".short(3), "abc");
    assert_eq!("ab".short(3), "ab");
}

#[test]
fn id_equality_with_str() {
    let id = TestId::new("abc");
    assert_eq!(id, "abc");
    assert_eq!(id, *"abc");
    assert_eq!(id.as_str(), "abc");
}

#[test]
fn id_display_roundtrip() {
    let id = TestId::from("xyz".to_string());
    assert_eq!(format!("{}", id), "xyz");
}
