use log::debug;
use rand::Rng;

use crate::config::*;

/// Produces the options of a question in a random display order.
///
/// Only the populated responses are returned. The display labels follow the
/// positions on screen, so the letter shown never gives away the canonical
/// label.
pub fn shuffle_options<R: Rng + ?Sized>(record: &QuestionRecord, rng: &mut R) -> Vec<DisplayOption> {
    let mut order: Vec<(Label, &String)> = record
        .responses
        .iter()
        .map(|(label, content)| (*label, content))
        .collect();
    fisher_yates(&mut order, rng);
    debug!(
        "shuffle_options: order {:?}",
        order.iter().map(|p| p.0).collect::<Vec<_>>()
    );
    order
        .into_iter()
        .zip(Label::ALL.iter())
        .map(|((canonical_label, content), display_label)| DisplayOption {
            display_label: *display_label,
            content: content.clone(),
            canonical_label,
        })
        .collect()
}

// For i from the last index down to 1, swap with a uniform index in [0, i].
fn fisher_yates<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

/// The successive percentages of the loading bar shown when a session starts.
///
/// Each step adds a random amount below 15; the last step is always 100.
pub fn loading_steps<R: Rng + ?Sized>(rng: &mut R) -> Vec<u8> {
    let mut steps: Vec<u8> = Vec::new();
    let mut progress: f64 = 0.0;
    while progress < 100.0 {
        progress = (progress + rng.random_range(0.0..15.0)).min(100.0);
        let pct = progress.floor() as u8;
        if steps.last() != Some(&pct) {
            steps.push(pct);
        }
    }
    steps
}
