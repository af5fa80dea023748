use criterion::{Criterion, black_box, criterion_group, criterion_main};
use spyglass::{Interpreter, read_str};

const FIB: &str = "
(def (fib n)
  (cond ((< n 2) n)
        (else (+ (fib (- n 1)) (fib (- n 2))))))
(fib 15)
";

const VECTOR_FILL: &str = "
(def (fill v n)
  (cond ((= n 0) v)
        (else (fill (vec-push v n) (- n 1)))))
(len (fill [] 256))
";

const MAP_FILL: &str = "
(def (fill m n)
  (cond ((= n 0) m)
        (else (fill (assoc m n n) (- n 1)))))
(len (fill {} 64))
";

fn bench_read(c: &mut Criterion) {
    c.bench_function("read nested form", |b| {
        b.iter(|| read_str("bench", black_box("(a [1 2.5 :k] {:x \"s\"} `(b ~c))")))
    });
}

fn bench_fib(c: &mut Criterion) {
    c.bench_function("eval fib 15", |b| {
        b.iter(|| {
            let mut interp = Interpreter::new();
            interp.eval_str("bench", black_box(FIB))
        })
    });
}

fn bench_vector_fill(c: &mut Criterion) {
    c.bench_function("vector fill 256", |b| {
        b.iter(|| {
            let mut interp = Interpreter::new();
            interp.eval_str("bench", black_box(VECTOR_FILL))
        })
    });
}

fn bench_map_fill(c: &mut Criterion) {
    c.bench_function("map fill 64", |b| {
        b.iter(|| {
            let mut interp = Interpreter::new();
            interp.eval_str("bench", black_box(MAP_FILL))
        })
    });
}

criterion_group!(benches, bench_read, bench_fib, bench_vector_fill, bench_map_fill);
criterion_main!(benches);
