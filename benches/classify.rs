use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use upx_tools::engine::OutputClassifier;

const SUCCESS: &str = "操作成功完成\n\n输出: C:/Games/app.exe\n大小: 12.40 MB → 4.91 MB\n压缩率: 39.6%\n\nUPX 输出:\n        File size         Ratio      Format      Name\n   --------------------   ------   -----------   -----------\n  13002752 ->   5148672   39.60%    win64/pe     app.exe";

const FAILURE: &str = "[错误] 文件已经被 UPX 加壳过了\n\n解决方案:\n- 如需重新压缩，请先使用\"脱壳解压\"功能\n- 或者在高级选项中勾选\"强制压缩\"";

fn bench_classify(c: &mut Criterion) {
    let classifier = OutputClassifier::new();

    c.bench_function("classify_success_report", |b| {
        b.iter(|| classifier.classify(black_box(SUCCESS), false))
    });

    c.bench_function("classify_failure_report", |b| {
        b.iter(|| classifier.classify(black_box(FAILURE), true))
    });

    let batch_log = SUCCESS.repeat(64);
    c.bench_function("classify_64_reports", |b| {
        b.iter(|| classifier.classify(black_box(&batch_log), false))
    });
}

criterion_group!(benches, bench_classify);
criterion_main!(benches);
