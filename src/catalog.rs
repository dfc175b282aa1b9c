//! The fixed, ordered catalog of predefined analysis prompts. Order matters:
//! it drives both display and the iteration order of batch generation.

/// Framing prefix prepended to every catalog prompt before submission.
pub const TASK_PREFIX: &str = "Analyze the dataset and return this insight:";

pub const INSIGHT_CATALOG: [(&str, &str); 11] = [
    (
        "1. Employees with 2 or more completions",
        "Number of employees who have completed 2 or more courses.",
    ),
    (
        "2. Employees with 1 completion",
        "Number of employees who have completed exactly 1 course.",
    ),
    (
        "3. Top 3 organizations by completion",
        "Top 3 organization units with the highest number of completions.",
    ),
    (
        "4. Top 3 orgs in each country by completion",
        "Top 3 organization units by completions in each country.",
    ),
    (
        "5. Bottom 3 organizations by completion",
        "Bottom 3 organization units with the least completions.",
    ),
    (
        "6. Bottom 3 orgs where registration is high but completion is low",
        "Bottom 3 orgs where registration is high but completion is low.",
    ),
    (
        "7. Top 3 platforms by registration and completion",
        "Top 3 platforms with the highest registrations and completions.",
    ),
    (
        "8. Bottom 3 platforms where registration is high but completion is low",
        "Bottom 3 platforms where registration is high but completion is low.",
    ),
    (
        "9. Top 3 employee roles by completions",
        "Top 3 employee roles based on number of completions.",
    ),
    (
        "10. Split of completion by course level",
        "Split of completions across different course levels.",
    ),
    (
        "11. Course level with high registration but low completion",
        "Which course levels have high registration but low completion?",
    ),
];

/// Resolve a catalog entry from a full label or its leading number
/// (e.g. "3" and "3. Top 3 organizations by completion" both match).
pub fn lookup(label: &str) -> Option<(&'static str, &'static str)> {
    let label = label.trim();
    INSIGHT_CATALOG
        .iter()
        .find(|(name, _)| {
            *name == label || name.split('.').next() == Some(label)
        })
        .copied()
}
