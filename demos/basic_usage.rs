//! # columnar-vector 使用案例
//!
//! 1. 定义一个带嵌套与 union 的类型
//! 2. 以小 segment 阈值写入一批值（ColumnarWriter）
//! 3. 查看 Metadata 树（JSON / 二进制）
//! 4. 从二进制 Metadata 重建 reader 并读回全部值
//! 5. 用错误的类型打开，演示 Metadata 校验

use std::sync::Arc;

use columnar_vector::{
    ColumnarReader, ColumnarWriter, Field, Metadata, PrimitiveType, Type, Value, WriterConfig,
};

fn main() -> columnar_vector::Result<()> {
    println!("═══════════════════════════════════════════════════════════");
    println!("   columnar-vector 演示                                    ");
    println!("═══════════════════════════════════════════════════════════\n");

    // =========================================================================
    // 1. 类型
    // =========================================================================
    println!("【1】定义类型 ...");
    // 日志事件：时间戳、级别、可选的标签集合，以及 int64 / string 二选一的载荷
    let typ = Type::record(vec![
        Field::new("ts",      PrimitiveType::Time.into()),
        Field::new("level",   PrimitiveType::String.into()),
        Field::new("labels",  Type::set(PrimitiveType::String.into())),
        Field::new("payload", Type::union(vec![
            PrimitiveType::Int64.into(),
            PrimitiveType::String.into(),
        ])),
    ]);
    println!("    type = {typ}\n");

    // =========================================================================
    // 2. 写入
    // =========================================================================
    println!("【2】写入 1000 个值 ...");
    let levels = ["debug", "info", "warn", "error"];
    let events: Vec<Value> = (0i64..1000)
        .map(|i| {
            if i % 97 == 0 {
                return Value::Null;
            }
            let labels = if i % 5 == 0 {
                Value::Null
            } else {
                Value::Set(vec![Value::string("svc"), Value::string(levels[i as usize % 4])])
            };
            let payload = match i % 3 {
                0 => Value::union(0, Value::Int(i * i)),
                1 => Value::union(1, Value::String(format!("request #{i}"))),
                _ => Value::Null,
            };
            Value::Record(vec![
                Value::Int(1_700_000_000_000_000_000 + i * 1_000_000),
                Value::string(levels[i as usize % 4]),
                labels,
                payload,
            ])
        })
        .collect();

    let cfg = WriterConfig::default()
        .with_segment_threshold(512)
        .with_memory_threshold(4 * 1024);
    let mut writer = ColumnarWriter::new(typ.clone(), Vec::new(), cfg)?;
    for ev in &events {
        writer.write_value(ev)?;
    }
    println!("    ✓ 写入值个数   = {}", writer.count());
    println!("    ✓ 中途 spill   = {} 次", writer.spills());
    let (data, meta) = writer.finish()?;
    println!("    ✓ 数据大小     = {} bytes ({:.1} KB)", data.len(), data.len() as f64 / 1024.0);
    println!("    ✓ segment 个数 = {}\n", meta.segments().len());

    // =========================================================================
    // 3. Metadata
    // =========================================================================
    println!("【3】Metadata 树 ...");
    let json = meta.to_json()?;
    println!("    JSON 前 5 行：");
    for line in json.lines().take(5) {
        println!("      {line}");
    }
    let blob = meta.encode();
    println!("    二进制编码 = {} bytes\n", blob.len());

    // =========================================================================
    // 4. 读取
    // =========================================================================
    println!("【4】从二进制 Metadata 重建 reader ...");
    let meta = Metadata::decode(&blob)?;
    let mut reader = ColumnarReader::new(&typ, &meta, Arc::new(data.clone()))?;
    let mut back = Vec::with_capacity(events.len());
    while let Some(v) = reader.next_value()? {
        back.push(v);
    }
    println!("    读回值个数 = {}", back.len());
    println!("    前 2 个值：");
    for v in back.iter().take(2) {
        println!("      {v}");
    }
    // set 在编码时排序去重，逐个比对前先做同样的规范化
    let same = back.len() == events.len()
        && back.iter().zip(&events).all(|(a, b)| {
            a.to_body(&typ).ok() == b.to_body(&typ).ok()
        });
    println!("    与写入一致 = {same}\n");

    // =========================================================================
    // 5. 校验
    // =========================================================================
    println!("【5】用错误的类型打开 ...");
    let wrong = Type::record(vec![Field::new("ts", PrimitiveType::Time.into())]);
    match ColumnarReader::new(&wrong, &meta, Arc::new(data)) {
        Ok(_)  => println!("    未检测到不一致（不应发生）"),
        Err(e) => println!("    ✓ 拒绝打开: {e}"),
    }

    println!("\n═══════════════════════════════════════════════════════════");
    println!("   全部演示完成 ✓");
    println!("═══════════════════════════════════════════════════════════");
    Ok(())
}
