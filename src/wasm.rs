//! Browser bindings. Build with `--features wasm --target wasm32-unknown-unknown`.

use wasm_bindgen::prelude::*;

use crate::annotate::FeedbackFragment;
use crate::palette;
use crate::sanitize;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    fn log(s: &str);
}

/// Escape raw textarea content for the overlay.
#[wasm_bindgen]
pub fn escape(text: &str) -> String {
    sanitize::escape(text)
}

/// Annotate `text` with fragments given as a JS array of strings; the array
/// position is the fragment index. Non-string entries are skipped but keep
/// their index.
#[wasm_bindgen]
pub fn annotate(text: &str, fragments: &js_sys::Array) -> String {
    let fragments: Vec<FeedbackFragment> = fragments
        .iter()
        .enumerate()
        .filter_map(|(i, value)| {
            let fragment = value.as_string();
            if fragment.is_none() {
                log(&format!("annotate: fragment {i} is not a string"));
            }
            fragment.map(|t| FeedbackFragment::new(i, t, ""))
        })
        .collect();
    crate::annotate::annotate(text, &fragments)
}

#[wasm_bindgen]
pub fn color_for_index(index: u32) -> String {
    palette::color_for_index(index as usize).to_hex()
}

/// CSS `rgb(..)` for a completeness score.
#[wasm_bindgen]
pub fn color_for_score(score: f64) -> String {
    palette::color_for_score(score).to_string()
}
