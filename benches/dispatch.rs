use criterion::{black_box, criterion_group, criterion_main, Criterion};

use shellffi_runtime::interp::{FunctionRef, Interpreter, InvokeError};
use shellffi_runtime::{callback, codec, install};

struct NullHost;

impl Interpreter for NullHost {
    fn resolve(&mut self, _name: &str) -> Option<FunctionRef> {
        Some(FunctionRef(0))
    }
    fn invoke(&mut self, _func: FunctionRef, words: &[String]) -> Result<(), InvokeError> {
        black_box(words);
        Ok(())
    }
    fn bind_variable(&mut self, _name: &str, _value: &str) {}
}

fn bench_generation(c: &mut Criterion) {
    c.bench_function("create_destroy_int_int", |b| {
        b.iter(|| {
            let addr = callback::create("bench_fn", "int", &["int", "int"]).unwrap();
            callback::destroy(black_box(addr)).unwrap();
        });
    });
}

fn bench_dispatch(c: &mut Criterion) {
    let addr = callback::create("bench_fn", "int", &["int", "int"]).unwrap();
    let f: extern "C" fn(i32, i32) -> i32 = unsafe { std::mem::transmute(addr) };

    c.bench_function("dispatch_int_int", |b| {
        let mut host = NullHost;
        install(&mut host, || {
            b.iter(|| {
                black_box(f(black_box(3), black_box(4)));
            });
        });
    });

    callback::destroy(addr).unwrap();
}

fn bench_codec(c: &mut Criterion) {
    c.bench_function("encode_int_token", |b| {
        b.iter(|| {
            black_box(codec::encode(black_box("int:123456")).unwrap());
        });
    });
}

criterion_group!(benches, bench_generation, bench_dispatch, bench_codec);
criterion_main!(benches);
