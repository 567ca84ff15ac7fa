#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(source) = std::str::from_utf8(data) {
        if let Ok(repo) = ew_ir::parse(source) {
            for method in repo.iter_methods() {
                if let Some(code) = method.code() {
                    let _ = ew_ir::controlflow::Cfg::build(code);
                }
            }
        }
    }
});
