#![no_main]

use std::{str::FromStr, sync::Arc};

use arbitrary::Arbitrary;
use sterling_core::prelude::*;

#[derive(Arbitrary, Debug)]
struct Input {
    css: String,
    chain: Vec<(String, Option<String>, Vec<String>)>,
}

libfuzzer_sys::fuzz_target!(|input: Input| {
    let Ok(sheet) = Stylesheet::from_str(&input.css) else {
        return;
    };

    let mut ancestor: Option<Arc<Identity>> = None;
    for (type_name, id, classes) in &input.chain {
        let identity = Identity::new(type_name).with_id(id.as_deref()).with_classes(classes.iter().map(String::as_str)).with_ancestor(ancestor);
        let result = sheet.attach_identity(Arc::new(identity));
        let _ = result.properties();
        ancestor = Some(Arc::clone(result.identity()));
    }
});
