use std::cmp::Ordering;

use recon_model::ProbeObservation;

/// Whether `candidate` should replace `current` as the best observation for a
/// hostname. Each rule only applies when every earlier rule ties:
///
/// 1. `https` beats anything else.
/// 2. A 2xx status beats a non-2xx one.
/// 3. A non-blank title beats a blank one.
/// 4. A non-zero status beats a zero or missing one.
/// 5. More detected technologies beats fewer.
///
/// A full tie keeps `current`. The relation is pairwise only; it is not
/// assumed to be transitive.
pub fn is_better(candidate: &ProbeObservation, current: &ProbeObservation) -> bool {
    let rules: [fn(&ProbeObservation, &ProbeObservation) -> Ordering; 5] = [
        |a, b| a.is_https().cmp(&b.is_https()),
        |a, b| a.has_success_status().cmp(&b.has_success_status()),
        |a, b| a.has_title().cmp(&b.has_title()),
        |a, b| a.has_status().cmp(&b.has_status()),
        |a, b| a.tech_count().cmp(&b.tech_count()),
    ];

    for rule in rules {
        match rule(candidate, current) {
            Ordering::Greater => return true,
            Ordering::Less => return false,
            Ordering::Equal => continue,
        }
    }
    false
}

/// Left fold over `observations` with [`is_better`]. Returns `None` only for
/// an empty slice; on ties the earliest observation wins.
pub fn pick_best(observations: &[ProbeObservation]) -> Option<&ProbeObservation> {
    observations.iter().fold(None, |best, observation| match best {
        Some(current) if !is_better(observation, current) => Some(current),
        _ => Some(observation),
    })
}
