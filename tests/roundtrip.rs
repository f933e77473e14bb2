//! 端到端：写入 → Metadata 持久化 → 重建 reader → 读回

use std::fs::File;
use std::io::{Read, Write};
use std::sync::Arc;

use columnar_vector::{
    ColumnarError, ColumnarReader, ColumnarWriter, Field, Metadata, PrimitiveType, ReadAt,
    ReaderConfig, Type, Value, WriterConfig,
};

/// 固定种子的线性同余发生器，保证数据可复现
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: u64) -> u64 { self.next() % n }
}

fn order_type() -> Type {
    Type::record(vec![
        Field::new("id",    PrimitiveType::Uint64.into()),
        Field::new("price", PrimitiveType::Float64.into()),
        Field::new("items", Type::array(Type::record(vec![
            Field::new("sku", PrimitiveType::String.into()),
            Field::new("qty", PrimitiveType::Int16.into()),
        ]))),
        Field::new("attrs", Type::map(PrimitiveType::String.into(), PrimitiveType::Bytes.into())),
        Field::new("note",  Type::union(vec![
            PrimitiveType::String.into(),
            PrimitiveType::Int64.into(),
            Type::array(PrimitiveType::Bool.into()),
        ])),
    ])
}

fn maybe(rng: &mut Lcg, v: Value) -> Value {
    if rng.below(6) == 0 { Value::Null } else { v }
}

fn orders(n: usize, seed: u64) -> Vec<Value> {
    let mut rng = Lcg(seed);
    (0..n)
        .map(|i| {
            if rng.below(20) == 0 {
                return Value::Null;
            }
            let items = (0..rng.below(4))
                .map(|j| {
                    let sku = Value::String(format!("sku-{j}-{}", rng.below(1000)));
                    let qty = Value::Int(rng.below(200) as i64 - 100);
                    maybe(&mut rng, Value::Record(vec![sku, qty]))
                })
                .collect();
            let attrs = (0..rng.below(3))
                .map(|k| (Value::String(format!("k{k}")), Value::Bytes(vec![k as u8; k as usize])))
                .collect();
            let note = match rng.below(4) {
                0 => Value::union(0, Value::String(format!("order {i}"))),
                1 => Value::union(1, Value::Int(rng.next() as i64)),
                2 => Value::union(2, Value::Array(vec![Value::Bool(true), Value::Null])),
                _ => Value::Null,
            };
            let price = Value::Float(rng.below(100_000) as f64 / 4.0);
            Value::Record(vec![
                Value::Uint(i as u64),
                maybe(&mut rng, price),
                maybe(&mut rng, Value::Array(items)),
                maybe(&mut rng, Value::Map(attrs)),
                note,
            ])
        })
        .collect()
}

fn write_all(typ: &Type, vals: &[Value], cfg: WriterConfig) -> (Vec<u8>, Metadata) {
    let mut w = ColumnarWriter::new(typ.clone(), Vec::new(), cfg).unwrap();
    for v in vals {
        w.write_value(v).unwrap();
    }
    w.finish().unwrap()
}

fn read_all(typ: &Type, meta: &Metadata, src: Arc<dyn ReadAt>) -> Vec<Value> {
    let mut r = ColumnarReader::new(typ, meta, src).unwrap();
    let mut out = Vec::new();
    while let Some(v) = r.next_value().unwrap() {
        out.push(v);
    }
    out
}

#[test]
fn nested_values_survive_any_segment_size() {
    let typ  = order_type();
    let vals = orders(300, 7);
    for thresh in [1, 7, 64, 4096, 1 << 20] {
        let (data, meta) = write_all(&typ, &vals, WriterConfig::default().with_segment_threshold(thresh));
        assert_eq!(meta.data_size(), data.len() as u64, "threshold {thresh}");
        assert!(meta.segments().iter().all(|s| s.length as usize <= thresh));
        assert_eq!(read_all(&typ, &meta, Arc::new(data)), vals, "threshold {thresh}");
    }
}

#[test]
fn buffering_stays_under_memory_threshold() {
    let typ = order_type();
    let cfg = WriterConfig::default()
        .with_segment_threshold(1 << 20)
        .with_memory_threshold(1024);
    let mut w = ColumnarWriter::new(typ.clone(), Vec::new(), cfg).unwrap();
    let vals = orders(500, 11);
    for v in &vals {
        w.write_value(v).unwrap();
        assert!(w.buffered() <= 1024);
    }
    assert!(w.spills() > 0);
    let (data, meta) = w.finish().unwrap();
    assert_eq!(read_all(&typ, &meta, Arc::new(data)), vals);
}

#[test]
fn persisted_metadata_reopens_the_column() {
    let typ  = order_type();
    let vals = orders(120, 3);
    let (data, meta) = write_all(&typ, &vals, WriterConfig::default().with_segment_threshold(32));

    let from_blob = Metadata::decode(&meta.encode()).unwrap();
    assert_eq!(from_blob, meta);
    assert_eq!(read_all(&typ, &from_blob, Arc::new(data.clone())), vals);

    let from_json = Metadata::from_json(&meta.to_json().unwrap()).unwrap();
    assert_eq!(from_json, meta);
    assert_eq!(read_all(&typ, &from_json, Arc::new(data)), vals);
}

#[test]
fn file_backed_source() {
    let dir  = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("orders.col");
    let meta_path = dir.path().join("orders.meta");
    let typ  = order_type();
    let vals = orders(200, 42);

    let file = File::create(&data_path).unwrap();
    let mut w = ColumnarWriter::new(typ.clone(), file, WriterConfig::default().with_segment_threshold(100)).unwrap();
    for v in &vals {
        w.write_value(v).unwrap();
    }
    let (file, meta) = w.finish().unwrap();
    file.sync_all().unwrap();
    drop(file);
    File::create(&meta_path).unwrap().write_all(&meta.encode()).unwrap();

    let mut blob = Vec::new();
    File::open(&meta_path).unwrap().read_to_end(&mut blob).unwrap();
    let meta = Metadata::decode(&blob).unwrap();
    let src: Arc<dyn ReadAt> = Arc::new(File::open(&data_path).unwrap());
    assert_eq!(read_all(&typ, &meta, src), vals);
}

#[test]
fn independent_readers_share_one_source() {
    let typ  = order_type();
    let vals = orders(80, 5);
    let (data, meta) = write_all(&typ, &vals, WriterConfig::default().with_segment_threshold(16));
    let src: Arc<dyn ReadAt> = Arc::new(data);

    let mut a = ColumnarReader::new(&typ, &meta, Arc::clone(&src)).unwrap();
    let mut b = ColumnarReader::new(&typ, &meta, Arc::clone(&src)).unwrap();
    // 一个读者先读一半，另一个从头开始，互不影响
    for v in &vals[..40] {
        assert_eq!(a.next_value().unwrap().as_ref(), Some(v));
    }
    for (i, v) in vals.iter().enumerate() {
        assert_eq!(b.next_value().unwrap().as_ref(), Some(v));
        if i + 40 < vals.len() {
            assert_eq!(a.next_value().unwrap().as_ref(), Some(&vals[i + 40]));
        }
    }
    assert_eq!(a.next_value().unwrap(), None);
    assert_eq!(b.next_value().unwrap(), None);
}

#[test]
fn readers_run_on_other_threads() {
    let typ  = order_type();
    let vals = orders(60, 9);
    let (data, meta) = write_all(&typ, &vals, WriterConfig::default().with_segment_threshold(24));
    let src: Arc<dyn ReadAt> = Arc::new(data);

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let (typ, meta, src) = (typ.clone(), meta.clone(), Arc::clone(&src));
            std::thread::spawn(move || read_all(&typ, &meta, src))
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), vals);
    }
}

#[test]
fn checksums_can_be_turned_off() {
    let typ  = Type::array(PrimitiveType::Int32.into());
    let vals = vec![Value::Array((0..50).map(Value::Int).collect()), Value::Null];
    let (data, meta) = write_all(&typ, &vals, WriterConfig::default().with_checksums(false));
    assert!(meta.segments().iter().all(|s| s.checksum.is_none()));

    let cfg = ReaderConfig::default().with_verify_checksums(true);
    let mut r = ColumnarReader::with_config(&typ, &meta, Arc::new(data), cfg).unwrap();
    assert_eq!(r.next_value().unwrap().as_ref(), Some(&vals[0]));
}

#[test]
fn truncated_data_is_not_mistaken_for_a_clean_end() {
    let typ  = Type::Primitive(PrimitiveType::String);
    let vals = vec![Value::string("first"), Value::string("second value")];
    let (data, meta) = write_all(&typ, &vals, WriterConfig::default().with_segment_threshold(4));
    // 丢掉最后一个 segment：第二个字符串读到一半流就断了
    let mut short = meta.clone();
    if let Metadata::Primitive(m) = &mut short {
        m.values.pop();
    }
    let mut r = ColumnarReader::new(&typ, &short, Arc::new(data)).unwrap();
    assert_eq!(r.next_value().unwrap(), Some(vals[0].clone()));
    assert!(matches!(r.next_value().unwrap_err(), ColumnarError::Corruption(_)));
}
