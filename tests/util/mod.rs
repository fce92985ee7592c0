//! Test automation.

use std::thread;

/// Spawn a second thread running `func`, run it here as well, and `join`.
fn spawn_double<F: Fn() + Sync>(func: F) {
    thread::scope(|s| {
        s.spawn(|| func());
        func();
    });
}

/// "Multiply" a closure, by running it in multiple threads at the same time.
///
/// This will test for memory leaks, as well as acid wrapping.
#[allow(dead_code)]
pub fn multiply<F: Fn() + Sync + Send + 'static>(func: F) {
    spawn_double(|| spawn_double(|| acid(|| func())));
}

/// Wrap a block in acid tests.
///
/// This performs a number of temporary allocations to try to detect
/// inconsistency.
///
/// The basic idea is that if the allocator is broken, it might allocate the
/// same memory twice, or corrupt when allocating. Thus, we allocate some
/// temporary segment and override it. This way we might be able to detect
/// memory corruption through asserting memory consistency after the closure is
/// completed.
#[allow(dead_code)]
pub fn acid<F: FnOnce()>(func: F) {
    let mut vec = vec!["something", "yep", "yup"];
    let mut _v = vec![Box::new(2), Box::new(5)];
    let mut bx = Box::new(2389);
    let abc = Box::new("abc");

    vec.shrink_to_fit();
    vec.extend(["lol", "lulz"].iter());
    vec.shrink_to_fit();
    vec.extend(["we", "are"].iter());

    func();

    *bx = 500;
    vec.push("heyaya");
    *bx = 55;

    assert_eq!(
        vec,
        [
            "something",
            "yep",
            "yup",
            "lol",
            "lulz",
            "we",
            "are",
            "heyaya"
        ]
    );
    assert_eq!(*bx, 55);
    assert_eq!(*abc, "abc");
}

/// A tiny xorshift generator, for reproducible random sizes.
#[allow(dead_code)]
pub struct XorShift(pub u64);

#[allow(dead_code)]
impl XorShift {
    /// The next number.
    pub fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    /// The next number in `1..=max`.
    pub fn size(&mut self, max: usize) -> usize {
        (self.next() % max as u64) as usize + 1
    }
}
