//! A reproducibility test for the "simple" demo
use regression::run_reproducibility_test;

#[test]
fn test_reproducibility_simple() {
    run_reproducibility_test("simple");
}
