#![no_main]

use std::str::FromStr;
use sterling_core::prelude::Stylesheet;

libfuzzer_sys::fuzz_target!(|data: String| {
    if let Ok(sheet) = Stylesheet::from_str(&data) {
        // anything that parses must print back to an equal sheet
        let text = sheet.to_string();
        let reparsed = Stylesheet::from_str(&text).unwrap_or_else(|err| panic!("{err} while reparsing:\n{text}"));
        assert_eq!(sheet, reparsed, "printed as:\n{text}");
    }
});
