use std::{ffi::CString, os::fd::AsRawFd};

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fdshim::{fcntl_int, open_int};

pub fn fcntl_benchmark(c: &mut Criterion) {
    let file = tempfile::tempfile().unwrap();
    let fd = file.as_raw_fd();

    c.bench_function("fcntl_native", |b| {
        b.iter(|| unsafe { libc::fcntl(black_box(fd), libc::F_GETFD) })
    });
    c.bench_function("fcntl_shim", |b| {
        b.iter(|| unsafe { fcntl_int(black_box(fd), libc::F_GETFD) })
    });
}

pub fn open_benchmark(c: &mut Criterion) {
    let path = CString::new("/nonexistent/fdshim/bench").unwrap();

    c.bench_function("open_missing_native", |b| {
        b.iter(|| unsafe { libc::open(black_box(path.as_ptr()), libc::O_RDONLY) })
    });
    c.bench_function("open_missing_shim", |b| {
        b.iter(|| unsafe { open_int(black_box(path.as_ptr()), libc::O_RDONLY) })
    });
}

criterion_group!(benches, fcntl_benchmark, open_benchmark);
criterion_main!(benches);
