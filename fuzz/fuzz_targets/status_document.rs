#![no_main]

use libfuzzer_sys::fuzz_target;

use loggrabber_log_pipeline::checkpoint::StatusDocument;

fuzz_target!(|data: &[u8]| {
    if let Ok(body) = std::str::from_utf8(data) {
        let doc = StatusDocument::parse(body);
        let _ = doc.get_non_empty("last_rec_pos");
        let _ = doc.get("is_connected");
    }
});
