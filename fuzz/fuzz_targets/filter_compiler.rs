#![no_main]

use libfuzzer_sys::fuzz_target;

use loggrabber_core::types::RecordKind;
use loggrabber_log_pipeline::FilterCompiler;

fuzz_target!(|data: &[u8]| {
    let Ok(rule) = std::str::from_utf8(data) else {
        return;
    };

    for kind in [RecordKind::Traffic, RecordKind::Audit] {
        // 실패는 허용, 크래시는 안 됨
        let Ok(tree) = FilterCompiler::compile(&[rule], kind) else {
            continue;
        };

        // 정규형은 같은 규칙베이스로 다시 컴파일되어야 함
        let canonical = tree.to_filter_strings();
        if canonical.len() == tree.len() {
            let again = FilterCompiler::compile(&canonical, kind)
                .expect("canonical form must compile");
            assert_eq!(again, tree);
        }
    }
});
