//! Fuzz target: `ResponsePrinter` tag validation and line staging
//!
//! Splits the input into tags and values and asserts that every line is
//! closed, whatever the tags contain and however long the values are.
//!
//! cargo fuzz run fuzz_response_tags

#![no_main]

use iostream_uart::NullStream;
use iostream_uart::iostream::response::{Field, ResponsePrinter};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    let parts: Vec<&str> = text.split('\u{0}').collect();
    let fields: Vec<Field<'_>> = parts
        .chunks(2)
        .map(|pair| Field::new(pair[0], pair.get(1).unwrap_or(&"")))
        .collect();

    let printer = ResponsePrinter::new(&NullStream);
    let _ = printer.response(Some("fuzz"), &fields);
    let _ = printer.header(Some("fuzz"), &parts);
    let _ = printer.start(None);
    let _ = printer.continue_with(&fields);
    let _ = printer.end(&fields);
});
