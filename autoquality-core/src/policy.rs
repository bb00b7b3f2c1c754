//! Quality selection policy.
//!
//! Pure decision logic: given a sanitized configuration and the options
//! discovered in one attempt, pick at most one option. Both policies share a
//! single total order so tie-breaking is identical everywhere.

use std::cmp::Ordering;
use std::fmt;

use crate::discovery::QualityOption;
use crate::quality::QualityId;
use crate::settings::{Configuration, Mode};

/// Which rule produced a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionRule {
    /// Highest rank overall.
    Maximum,
    /// First preference with a matching option.
    Priority(QualityId),
    /// Priority mode found no match and degraded to the maximum.
    PriorityFallback,
}

impl fmt::Display for SelectionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionRule::Maximum => write!(f, "maximum"),
            SelectionRule::Priority(id) => write!(f, "priority {id}"),
            SelectionRule::PriorityFallback => write!(f, "priority fallback to maximum"),
        }
    }
}

/// A chosen option and the rule that chose it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection<'a> {
    pub option: &'a QualityOption,
    pub rule: SelectionRule,
}

/// Orders options best-first: higher rank, then enhanced, then earlier in
/// the menu. Unknown ranks sort after every known rank.
pub fn compare_options(a: &QualityOption, b: &QualityOption) -> Ordering {
    b.rank
        .cmp(&a.rank)
        .then_with(|| b.is_enhanced.cmp(&a.is_enhanced))
        .then_with(|| a.menu_index.cmp(&b.menu_index))
}

/// Returns the best option under [`compare_options`], or `None` if empty.
pub fn choose_best<'a, I>(options: I) -> Option<&'a QualityOption>
where
    I: IntoIterator<Item = &'a QualityOption>,
{
    options.into_iter().min_by(|a, b| compare_options(a, b))
}

/// Applies the configured policy.
///
/// Returns `None` only when `options` is empty; priority mode falls back to
/// the maximum when no preference matches.
pub fn select<'a>(
    configuration: &Configuration,
    options: &'a [QualityOption],
) -> Option<Selection<'a>> {
    if options.is_empty() {
        return None;
    }

    if configuration.mode == Mode::Priority {
        for wanted in &configuration.priority_order {
            let matching = options
                .iter()
                .filter(|option| option.id.canonical() == Some(*wanted));
            if let Some(option) = choose_best(matching) {
                return Some(Selection {
                    option,
                    rule: SelectionRule::Priority(*wanted),
                });
            }
        }

        tracing::debug!("No preferred quality offered, falling back to maximum");
        return choose_best(options).map(|option| Selection {
            option,
            rule: SelectionRule::PriorityFallback,
        });
    }

    choose_best(options).map(|option| Selection {
        option,
        rule: SelectionRule::Maximum,
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::menu::{ElementHandle, QualityRow};

    fn options(labels: &[&str]) -> Vec<QualityOption> {
        labels
            .iter()
            .enumerate()
            .map(|(index, label)| {
                QualityOption::parse(
                    &QualityRow {
                        element: ElementHandle(index as u64),
                        text: label.to_string(),
                        aria_checked: None,
                        classes: Vec::new(),
                    },
                    index,
                )
            })
            .collect()
    }

    fn priority(order: &[QualityId]) -> Configuration {
        Configuration::new(Mode::Priority, order.iter().copied())
    }

    #[test]
    fn test_empty_options_select_nothing() {
        assert!(select(&Configuration::default(), &[]).is_none());
        assert!(select(&priority(&[QualityId::P720]), &[]).is_none());
    }

    #[test]
    fn test_maximum_prefers_rank_then_enhanced() {
        let opts = options(&["720p", "1080p", "1080p Premium", "Auto"]);
        let selection = select(&Configuration::default(), &opts).unwrap();

        assert_eq!(selection.option.label, "1080p Premium");
        assert_eq!(selection.rule, SelectionRule::Maximum);
    }

    #[test]
    fn test_maximum_ties_resolve_to_first_in_menu() {
        let opts = options(&["480p", "720p", "Auto (720p)"]);
        let best = choose_best(&opts).unwrap();
        assert_eq!(best.menu_index, 1);
    }

    #[test]
    fn test_priority_overrides_rank_order() {
        let opts = options(&["1080p", "720p"]);
        let selection = select(&priority(&[QualityId::P720, QualityId::P1080]), &opts).unwrap();

        assert_eq!(selection.option.label, "720p");
        assert_eq!(selection.rule, SelectionRule::Priority(QualityId::P720));
    }

    #[test]
    fn test_priority_skips_unavailable_preferences() {
        let opts = options(&["1440p", "1080p", "720p"]);
        let config = priority(&[QualityId::P1080Enhanced, QualityId::P1080, QualityId::P720]);
        let selection = select(&config, &opts).unwrap();

        assert_eq!(selection.option.label, "1080p");
        assert_eq!(selection.rule, SelectionRule::Priority(QualityId::P1080));
    }

    #[test]
    fn test_priority_without_match_falls_back_to_maximum() {
        let opts = options(&["480p", "360p", "Auto"]);
        let config = priority(&[QualityId::P1080, QualityId::P720]);
        let selection = select(&config, &opts).unwrap();

        assert_eq!(selection.option.label, "480p");
        assert_eq!(selection.rule, SelectionRule::PriorityFallback);
        assert_eq!(
            Some(selection.option),
            select(&Configuration::default(), &opts).map(|s| s.option)
        );
    }

    #[test]
    fn test_unknown_rows_never_match_priority() {
        let opts = options(&["Auto", "Something"]);
        let selection = select(&priority(&[QualityId::P144]), &opts).unwrap();

        assert_eq!(selection.rule, SelectionRule::PriorityFallback);
        assert_eq!(selection.option.menu_index, 0);
    }

    fn label_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("Auto".to_string()),
            (
                prop::sample::select(vec![144u32, 240, 360, 480, 540, 720, 1080, 1440, 2160]),
                any::<bool>()
            )
                .prop_map(|(rank, premium)| if premium {
                    format!("{rank}p Premium")
                } else {
                    format!("{rank}p")
                }),
        ]
    }

    proptest! {
        #[test]
        fn prop_maximum_winner_is_not_dominated(labels in prop::collection::vec(label_strategy(), 1..10)) {
            let refs: Vec<&str> = labels.iter().map(String::as_str).collect();
            let opts = options(&refs);
            let config = Configuration::default();

            let first = select(&config, &opts).unwrap().option;
            let second = select(&config, &opts).unwrap().option;
            prop_assert_eq!(first, second);

            for other in &opts {
                prop_assert!(other.rank <= first.rank);
                if other.rank == first.rank && !first.is_enhanced {
                    prop_assert!(!other.is_enhanced);
                }
            }
        }
    }
}
