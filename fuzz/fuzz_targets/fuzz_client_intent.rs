#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Intents normally only travel client → engine, but a hostile engine
    // echoing them back must not be able to panic the parser.
    let _ = serde_json::from_slice::<housie_client::protocol::ClientIntent>(data);

    // Anything that parses must re-serialize without panicking.
    if let Ok(intent) = serde_json::from_slice::<housie_client::protocol::ClientIntent>(data) {
        let _ = serde_json::to_string(&intent);
    }
});
