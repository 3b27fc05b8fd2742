use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use tracing::{debug, warn};

use super::location::normalize_country;
use crate::models::{FilterSpec, LocationValue, Record, RecordColumn};
use crate::query_builder::Condition;

/// Compiled form of a filter specification.
///
/// An empty filter (no category and no location criteria) means "match nothing";
/// it never widens into a full-table export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFilter {
    predicate: Option<Condition>,
    clause_count: usize,
}

impl CompiledFilter {
    pub fn match_nothing() -> Self {
        Self {
            predicate: None,
            clause_count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.predicate.is_none()
    }

    pub fn predicate(&self) -> Option<&Condition> {
        self.predicate.as_ref()
    }

    /// Number of category clauses OR-ed together
    pub fn clause_count(&self) -> usize {
        self.clause_count
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.predicate
            .as_ref()
            .is_some_and(|predicate| predicate.matches(record))
    }
}

impl fmt::Display for CompiledFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.predicate {
            Some(predicate) => write!(f, "{predicate}"),
            None => f.write_str("<match nothing>"),
        }
    }
}

/// Sub-subcategory labels collected under one category/subcategory pair
struct LabelGroup {
    category: String,
    subcategory: String,
    labels: BTreeSet<String>,
}

pub struct FilterCompiler;

impl FilterCompiler {
    /// Compile a filter specification.
    ///
    /// One clause is produced per distinct category, category/subcategory pair and
    /// category/subcategory label group; clauses are OR-ed and the location constraints
    /// are AND-ed over the whole disjunction. Malformed entries are skipped.
    pub fn compile(spec: &FilterSpec) -> CompiledFilter {
        let mut clauses: Vec<Condition> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for entry in &spec.categories {
            let category = entry.trim();
            if category.is_empty() {
                warn!(entry = %entry, "Skipping empty category entry");
                continue;
            }
            if seen.insert(format!("c|{}", category.to_lowercase())) {
                clauses.push(Condition::equals_ignore_case(RecordColumn::Category, category));
            }
        }

        for entry in &spec.subcategories {
            let Some((category, subcategory)) = split_subcategory(entry) else {
                warn!(entry = %entry, "Skipping malformed subcategory entry");
                continue;
            };
            let key = format!(
                "s|{}|{}",
                category.to_lowercase(),
                subcategory.to_lowercase()
            );
            if seen.insert(key) {
                clauses.push(Condition::All(vec![
                    Condition::equals_ignore_case(RecordColumn::Category, category),
                    Condition::equals_ignore_case(RecordColumn::Subcategory, subcategory),
                ]));
            }
        }

        for group in group_sub_subcategories(&spec.sub_subcategories) {
            clauses.push(Condition::All(vec![
                Condition::equals_ignore_case(RecordColumn::Category, group.category),
                Condition::equals_ignore_case(RecordColumn::Subcategory, group.subcategory),
                Condition::labels_intersect(RecordColumn::SubSubcategories, group.labels),
            ]));
        }

        let clause_count = clauses.len();
        let mut parts: Vec<Condition> = Vec::new();
        if !clauses.is_empty() {
            parts.push(Condition::Any(clauses));
        }

        if let Some(country) = location_value(&spec.country) {
            parts.push(Condition::equals(
                RecordColumn::Country,
                normalize_country(country),
            ));
        }
        if let Some(state) = location_value(&spec.state) {
            parts.push(Condition::equals(RecordColumn::State, state));
        }
        if let Some(city) = location_value(&spec.city) {
            parts.push(Condition::equals(RecordColumn::City, city));
        }

        let predicate = match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(Condition::All(parts)),
        };

        let compiled = CompiledFilter {
            predicate,
            clause_count,
        };
        debug!(clauses = clause_count, predicate = %compiled, "Compiled order filter");
        compiled
    }
}

/// `category:subcategory`, split on the first colon
fn split_subcategory(entry: &str) -> Option<(&str, &str)> {
    let (category, subcategory) = entry.split_once(':')?;
    let (category, subcategory) = (category.trim(), subcategory.trim());
    if category.is_empty() || subcategory.is_empty() {
        return None;
    }
    Some((category, subcategory))
}

/// `category:subcategory:label`, split on the first two colons
fn split_sub_subcategory(entry: &str) -> Option<(&str, &str, &str)> {
    let mut parts = entry.splitn(3, ':').map(str::trim);
    let category = parts.next()?;
    let subcategory = parts.next()?;
    let label = parts.next()?;
    if category.is_empty() || subcategory.is_empty() || label.is_empty() {
        return None;
    }
    Some((category, subcategory, label))
}

/// Group labels by their parent pair, keeping first-seen order of the pairs
fn group_sub_subcategories(entries: &[String]) -> Vec<LabelGroup> {
    let mut groups: Vec<LabelGroup> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for entry in entries {
        let Some((category, subcategory, label)) = split_sub_subcategory(entry) else {
            warn!(entry = %entry, "Skipping malformed sub-subcategory entry");
            continue;
        };
        let key = (category.to_lowercase(), subcategory.to_lowercase());
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(LabelGroup {
                category: category.to_string(),
                subcategory: subcategory.to_string(),
                labels: BTreeSet::new(),
            });
            groups.len() - 1
        });
        groups[slot].labels.insert(label.to_string());
    }

    groups
}

fn location_value(location: &Option<LocationValue>) -> Option<&str> {
    location
        .as_ref()
        .map(|location| location.value.trim())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::CANONICAL_US;
    use uuid::Uuid;

    fn spec() -> FilterSpec {
        FilterSpec::default()
    }

    fn record(category: &str, subcategory: Option<&str>, labels: Option<&str>) -> Record {
        Record {
            record_id: Uuid::new_v4(),
            business_name: "Acme".to_string(),
            country: Some(CANONICAL_US.to_string()),
            state: Some("Texas".to_string()),
            city: Some("Austin".to_string()),
            address: None,
            phone: None,
            category: category.to_string(),
            subcategory: subcategory.map(str::to_string),
            categories: labels.map(str::to_string),
            attributes: None,
        }
    }

    #[test]
    fn test_empty_spec_matches_nothing() {
        let compiled = FilterCompiler::compile(&spec());
        assert!(compiled.is_empty());
        assert!(!compiled.matches(&record("Bars", None, None)));
        assert_eq!(compiled.to_string(), "<match nothing>");
    }

    #[test]
    fn test_only_malformed_entries_match_nothing() {
        let mut spec = spec();
        spec.categories = vec!["   ".to_string()];
        spec.subcategories = vec!["NoColon".to_string(), ":Pizza".to_string()];
        spec.sub_subcategories = vec!["Bars:Pubs".to_string(), "Bars::Irish".to_string()];
        let compiled = FilterCompiler::compile(&spec);
        assert!(compiled.is_empty());
    }

    #[test]
    fn test_malformed_entries_are_skipped_not_fatal() {
        let mut spec = spec();
        spec.subcategories = vec!["broken".to_string(), "Restaurants:Pizza".to_string()];
        let compiled = FilterCompiler::compile(&spec);
        assert_eq!(compiled.clause_count(), 1);
        assert!(compiled.matches(&record("restaurants", Some("PIZZA"), None)));
        assert!(!compiled.matches(&record("Restaurants", Some("Sushi"), None)));
    }

    #[test]
    fn test_sub_subcategories_grouped_per_parent_pair() {
        let mut spec = spec();
        spec.sub_subcategories = vec![
            "Bars:Pubs:Irish".to_string(),
            "bars:pubs:Sports".to_string(),
            "Bars:Lounges:Jazz".to_string(),
        ];
        let compiled = FilterCompiler::compile(&spec);
        assert_eq!(compiled.clause_count(), 2);

        assert!(compiled.matches(&record("Bars", Some("Pubs"), Some("Sports, Karaoke"))));
        assert!(compiled.matches(&record("Bars", Some("Lounges"), Some("Jazz"))));
        // label from another pair's group does not leak across
        assert!(!compiled.matches(&record("Bars", Some("Lounges"), Some("Irish"))));
    }

    #[test]
    fn test_label_may_contain_colon() {
        let mut spec = spec();
        spec.sub_subcategories = vec!["Shops:Books:Used: Rare".to_string()];
        let compiled = FilterCompiler::compile(&spec);
        assert!(compiled.matches(&record("Shops", Some("Books"), Some("Used: Rare"))));
    }

    #[test]
    fn test_duplicate_clauses_collapse() {
        let mut spec = spec();
        spec.categories = vec!["Bars".to_string(), " bars ".to_string()];
        spec.subcategories = vec!["Bars:Pubs".to_string(), "BARS: pubs".to_string()];
        let compiled = FilterCompiler::compile(&spec);
        assert_eq!(compiled.clause_count(), 2);
    }

    #[test]
    fn test_location_applies_over_whole_disjunction() {
        let mut spec = spec();
        spec.categories = vec!["Bars".to_string(), "Cafes".to_string()];
        spec.country = Some(LocationValue::new("USA"));
        spec.city = Some(LocationValue::new(" Austin "));
        let compiled = FilterCompiler::compile(&spec);

        assert!(compiled.matches(&record("Cafes", None, None)));

        let mut elsewhere = record("Cafes", None, None);
        elsewhere.city = Some("Dallas".to_string());
        assert!(!compiled.matches(&elsewhere));

        match compiled.predicate() {
            Some(Condition::All(parts)) => {
                assert!(matches!(parts[0], Condition::Any(ref clauses) if clauses.len() == 2));
                assert_eq!(parts.len(), 3);
            }
            other => panic!("unexpected predicate shape: {other:?}"),
        }
    }

    #[test]
    fn test_location_only_filter() {
        let mut spec = spec();
        spec.state = Some(LocationValue::new("Texas"));
        spec.country = Some(LocationValue::new("  "));
        let compiled = FilterCompiler::compile(&spec);
        assert!(!compiled.is_empty());
        assert_eq!(compiled.clause_count(), 0);
        assert!(compiled.matches(&record("Anything", None, None)));
    }
}
